use tracing::warn;

use crate::error::ExecError;
use crate::runner::CommandRunner;

/// Proof that the privilege probe succeeded for the current request.
///
/// Elevated invocations and the mutating [`crate::FirewallControl`] surface
/// can only be built from one of these. The token is minted per request and
/// never cached: `sudo` credentials can expire between requests.
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    _private: (),
}

impl Capability {
    pub async fn acquire(runner: &dyn CommandRunner) -> Result<Self, ExecError> {
        match runner.probe_privilege().await {
            Ok(()) => Ok(Self { _private: () }),
            Err(e) => {
                warn!("privilege probe refused: {}", e);
                Err(ExecError::PrivilegeDenied)
            }
        }
    }

    #[cfg(any(test, feature = "testing"))]
    pub fn assume_for_tests() -> Self {
        Self { _private: () }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    #[tokio::test]
    async fn acquire_follows_probe() {
        let runner = ScriptedRunner::new();
        assert!(Capability::acquire(&runner).await.is_ok());

        let denied = ScriptedRunner::unprivileged();
        let err = Capability::acquire(&denied).await.unwrap_err();
        assert!(matches!(err, ExecError::PrivilegeDenied));
        assert_eq!(err.to_string(), "Sudo privileges required");
    }
}
