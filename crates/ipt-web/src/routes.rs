use axum::{
    Form, Json, Router,
    async_trait,
    extract::{FromRequestParts, Multipart, Path, State},
    http::request::Parts,
    response::{Html, Redirect},
    routing::{get, post},
};
use ipt_core::{NatRequest, Table, TableListing};
use ipt_exec::{Capability, FirewallReader};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::forms::{ChainForm, DeleteRuleForm, NatForm, PolicyForm, RuleForm};
use crate::render::{self, DashboardView};
use crate::state::AppState;

/// Proof that the privilege probe passed for this request.
pub struct Privileged(pub Capability);

#[async_trait]
impl FromRequestParts<AppState> for Privileged {
    type Rejection = ApiError;

    async fn from_request_parts(_parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Capability::acquire(state.runner())
            .await
            .map(Privileged)
            .map_err(|_| {
                state.metrics().record_privilege_denied();
                ApiError::Forbidden
            })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/get_rules/:table/:chain", get(get_rules))
        .route("/api/tables/:table", get(table_listing))
        .route("/add_rule", post(add_rule))
        .route("/delete_rule", post(delete_rule))
        .route("/add_nat_rule", post(add_nat_rule))
        .route("/create_chain", post(create_chain))
        .route("/delete_chain", post(delete_chain))
        .route("/set_policy", post(set_policy))
        .route("/save_rules", post(save_rules))
        .route("/restore_rules", post(restore_rules))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Rules fragment for one chain, or the error in its place.
async fn rules_fragment(state: &AppState, reader: &FirewallReader<'_>, table: Table, chain: &str) -> String {
    match reader.rule_listing(table, chain).await {
        Ok(listing) => {
            state
                .metrics()
                .record_listing(table, chain, listing.rows.len(), listing.rejected.len());
            render::rules_table(table, chain, &listing)
        }
        Err(e) => render::status_error(&format!("Error getting rules: {e}")),
    }
}

async fn index(State(state): State<AppState>) -> Html<String> {
    // The page still renders without privilege; the listings just come back empty.
    let capability = Capability::acquire(state.runner()).await.ok();
    let reader = state.reader(capability);

    let filter_headers = reader.chain_headers(Table::Filter).await;
    let chains: Vec<String> = filter_headers.iter().map(|h| h.name.clone()).collect();
    let overview = reader
        .overview_reusing(&state.settings().tables, Table::Filter, &filter_headers)
        .await;
    let rules_table = rules_fragment(&state, &reader, Table::Filter, "INPUT").await;
    let nat_rules = match reader.raw_listing(Table::Nat).await {
        Ok(output) => render::nat_rules(&output),
        Err(e) => render::status_error(&format!("Error getting NAT rules: {e}")),
    };

    Html(render::dashboard(&DashboardView {
        chains: &chains,
        overview: &overview,
        rules_table,
        nat_rules,
    }))
}

async fn get_rules(
    Privileged(capability): Privileged,
    State(state): State<AppState>,
    Path((table, chain)): Path<(String, String)>,
) -> Json<Value> {
    let html = match table.parse::<Table>() {
        Ok(table) => {
            let reader = state.reader(Some(capability));
            rules_fragment(&state, &reader, table, &chain).await
        }
        Err(e) => render::status_error(&format!("Error getting rules: {e}")),
    };
    Json(json!({ "html": html }))
}

async fn table_listing(
    Privileged(capability): Privileged,
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<TableListing>, ApiError> {
    let table: Table = table.parse().map_err(ApiError::invalid("listing table"))?;
    let listing = state.reader(Some(capability)).table_listing(table).await;
    for chain in &listing.chains {
        state
            .metrics()
            .record_listing(table, &chain.name, chain.rows.len(), chain.rejected.len());
    }
    Ok(Json(listing))
}

async fn add_rule(
    Privileged(capability): Privileged,
    State(state): State<AppState>,
    Form(form): Form<RuleForm>,
) -> Result<Redirect, ApiError> {
    let spec = form.into_spec().map_err(ApiError::invalid("adding rule"))?;
    let _guard = state.lock_mutations().await;
    state
        .control(capability)
        .add_rule(&spec)
        .await
        .map_err(ApiError::command("adding rule"))?;
    Ok(Redirect::to("/"))
}

async fn delete_rule(
    Privileged(capability): Privileged,
    State(state): State<AppState>,
    Form(form): Form<DeleteRuleForm>,
) -> Result<Redirect, ApiError> {
    let table = form.table().map_err(ApiError::invalid("deleting rule"))?;
    let number = form.number().map_err(ApiError::invalid("deleting rule"))?;
    let _guard = state.lock_mutations().await;
    state
        .control(capability)
        .delete_rule(table, &form.chain, number)
        .await
        .map_err(ApiError::command("deleting rule"))?;
    Ok(Redirect::to("/"))
}

async fn add_nat_rule(
    Privileged(capability): Privileged,
    State(state): State<AppState>,
    Form(form): Form<NatForm>,
) -> Result<Redirect, ApiError> {
    let request = NatRequest::from(form);
    let _guard = state.lock_mutations().await;
    state
        .control(capability)
        .add_rule(&request.to_rule_spec())
        .await
        .map_err(ApiError::command("adding NAT rule"))?;
    Ok(Redirect::to("/"))
}

async fn create_chain(
    Privileged(capability): Privileged,
    State(state): State<AppState>,
    Form(form): Form<ChainForm>,
) -> Result<Redirect, ApiError> {
    let table = form.table().map_err(ApiError::invalid("creating chain"))?;
    let _guard = state.lock_mutations().await;
    state
        .control(capability)
        .create_chain(table, &form.chain)
        .await
        .map_err(ApiError::command("creating chain"))?;
    Ok(Redirect::to("/"))
}

async fn delete_chain(
    Privileged(capability): Privileged,
    State(state): State<AppState>,
    Form(form): Form<ChainForm>,
) -> Result<Redirect, ApiError> {
    let table = form.table().map_err(ApiError::invalid("deleting chain"))?;
    let _guard = state.lock_mutations().await;
    state
        .control(capability)
        .delete_chain(table, &form.chain)
        .await
        .map_err(ApiError::command("deleting chain"))?;
    Ok(Redirect::to("/"))
}

async fn set_policy(
    Privileged(capability): Privileged,
    State(state): State<AppState>,
    Form(form): Form<PolicyForm>,
) -> Result<Redirect, ApiError> {
    let table = form.table().map_err(ApiError::invalid("setting policy"))?;
    let _guard = state.lock_mutations().await;
    state
        .control(capability)
        .set_policy(table, &form.chain, &form.policy)
        .await
        .map_err(ApiError::command("setting policy"))?;
    Ok(Redirect::to("/"))
}

async fn save_rules(
    Privileged(capability): Privileged,
    State(state): State<AppState>,
) -> Result<Html<String>, ApiError> {
    let _guard = state.lock_mutations().await;
    state
        .control(capability)
        .save()
        .await
        .map_err(ApiError::command("saving rules"))?;
    Ok(Html(render::status_success("Rules saved successfully")))
}

async fn restore_rules(
    Privileged(capability): Privileged,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Error restoring rules: {e}")))?
    {
        if field.name() != Some("rules_file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let contents = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Error restoring rules: {e}")))?;
        upload = Some((file_name, contents));
        break;
    }

    let Some((file_name, contents)) = upload else {
        return Err(ApiError::BadRequest("No file uploaded".into()));
    };
    if file_name.is_empty() {
        return Err(ApiError::BadRequest("No file selected".into()));
    }

    info!("restoring rules from upload {:?} ({} bytes)", file_name, contents.len());
    let _guard = state.lock_mutations().await;
    state
        .control(capability)
        .restore(&contents)
        .await
        .map_err(ApiError::command("restoring rules"))?;
    Ok(Redirect::to("/"))
}

async fn metrics(State(state): State<AppState>) -> String {
    match state.metrics().render_metrics() {
        Ok(metrics) => metrics,
        Err(e) => {
            warn!("failed to render metrics: {}", e);
            format!("# Error rendering metrics: {}", e)
        }
    }
}
