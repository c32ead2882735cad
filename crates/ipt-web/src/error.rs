use axum::Json;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use ipt_core::CoreError;
use ipt_exec::ExecError;
use serde_json::json;
use thiserror::Error;

use crate::render;

/// Handler failures. Everything except the privilege refusal is rendered as
/// an HTML status fragment.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Sudo privileges required")]
    Forbidden,

    /// `doing` reads like "adding rule" and prefixes the tool's message.
    #[error("Error {doing}: {source}")]
    Command {
        doing: &'static str,
        #[source]
        source: ExecError,
    },

    /// A form field that does not map onto the command line.
    #[error("Error {doing}: {source}")]
    Invalid {
        doing: &'static str,
        #[source]
        source: CoreError,
    },

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn command(doing: &'static str) -> impl FnOnce(ExecError) -> Self {
        move |source| ApiError::Command { doing, source }
    }

    pub fn invalid(doing: &'static str) -> impl FnOnce(CoreError) -> Self {
        move |source| ApiError::Invalid { doing, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Forbidden => {
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "error": self.to_string() })),
                )
                    .into_response();
            }
            ApiError::Command { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Invalid { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Html(render::status_error(&self.to_string()))).into_response()
    }
}
