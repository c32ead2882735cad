use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::table::Table;

pub const DEFAULT_SETTINGS_FILE: &str = "iptweb.yaml";

/// How tool invocations obtain root rights
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Elevation {
    /// Prefix every invocation with `sudo -n`; probe with `sudo -n true`.
    #[default]
    Sudo,
    /// The server already runs as root.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind: String,
    pub elevation: Elevation,
    pub iptables: String,
    pub iptables_save: String,
    pub iptables_restore: String,
    pub saved_rules_path: PathBuf,
    pub restore_upload_path: PathBuf,
    pub tables: Vec<Table>,
    pub command_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            elevation: Elevation::Sudo,
            iptables: "iptables".to_string(),
            iptables_save: "iptables-save".to_string(),
            iptables_restore: "iptables-restore".to_string(),
            saved_rules_path: PathBuf::from("/etc/iptables/rules.v4"),
            restore_upload_path: PathBuf::from("/tmp/iptables_restore.rules"),
            tables: Table::ALL.to_vec(),
            command_timeout_secs: None,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str, origin: &str) -> Result<Self, CoreError> {
        serde_yaml::from_str(yaml).map_err(|source| CoreError::SettingsParse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::SettingsIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content, &path.display().to_string())
    }

    /// Like [`Settings::from_file`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, CoreError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("settings file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml(
            "bind: 127.0.0.1:8080\nelevation: none\ntables: [filter, nat]\ncommand_timeout_secs: 5\n",
            "inline",
        )
        .unwrap();

        assert_eq!(settings.bind, "127.0.0.1:8080");
        assert_eq!(settings.elevation, Elevation::None);
        assert_eq!(settings.tables, vec![Table::Filter, Table::Nat]);
        assert_eq!(settings.command_timeout_secs, Some(5));
        assert_eq!(settings.iptables, "iptables");
        assert_eq!(settings.saved_rules_path, PathBuf::from("/etc/iptables/rules.v4"));
    }

    #[test]
    fn unknown_table_is_a_parse_error() {
        let err = Settings::from_yaml("tables: [security]\n", "inline").unwrap_err();
        assert!(matches!(err, CoreError::SettingsParse { .. }));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let settings =
            Settings::load_or_default(Path::new("/nonexistent/iptweb-settings.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
