//! Browser console for the local iptables rule set.
//!
//! Every read goes straight to the tool and every write is applied to the
//! live kernel immediately; the console keeps no copy of the rules.

pub mod error;
pub mod forms;
pub mod render;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{Privileged, router};
pub use state::AppState;

use anyhow::{Context, Result};
use tracing::info;

/// Bind `addr` and serve the console until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("iptables console listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
