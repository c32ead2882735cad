use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown table '{0}' (expected filter, nat, mangle or raw)")]
    UnknownTable(String),

    #[error("Invalid rule number '{0}'")]
    InvalidRuleNumber(String),

    #[error("Failed to read settings from {path}: {source}")]
    SettingsIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings from {path}: {source}")]
    SettingsParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
