use thiserror::Error;

/// Failure of a tool invocation. The `Display` text is what users see.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed ({status}): {stderr}")]
    Exit {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("Sudo privileges required")]
    PrivilegeDenied,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
