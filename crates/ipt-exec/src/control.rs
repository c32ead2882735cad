use ipt_core::{
    RuleSpec, Settings, Table, delete_chain_args, delete_rule_args, flush_chain_args,
    new_chain_args, set_policy_args,
};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ExecError;
use crate::privilege::Capability;
use crate::runner::{CommandRunner, Invocation, Tool};

/// Where saved rules go and where uploads are staged before a restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesFiles {
    pub saved_rules: PathBuf,
    pub restore_upload: PathBuf,
}

impl RulesFiles {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            saved_rules: settings.saved_rules_path.clone(),
            restore_upload: settings.restore_upload_path.clone(),
        }
    }
}

/// Mutating operations. Each one changes live kernel state immediately;
/// there is no dry run and no rollback.
pub struct FirewallControl<'a> {
    runner: &'a dyn CommandRunner,
    capability: Capability,
    files: RulesFiles,
}

impl<'a> FirewallControl<'a> {
    pub fn new(runner: &'a dyn CommandRunner, capability: Capability, files: RulesFiles) -> Self {
        Self {
            runner,
            capability,
            files,
        }
    }

    async fn run(&self, tool: Tool, args: Vec<String>) -> Result<String, ExecError> {
        let invocation = Invocation::elevated(tool, args, &self.capability);
        self.runner.run(&invocation).await
    }

    pub async fn add_rule(&self, spec: &RuleSpec) -> Result<(), ExecError> {
        self.run(Tool::Iptables, spec.append_args()).await?;
        info!("appended {} rule to {}/{}", spec.action, spec.table, spec.chain);
        Ok(())
    }

    /// Delete by position. The caller must have fresh state: positions shift
    /// whenever an earlier rule is added or removed.
    pub async fn delete_rule(&self, table: Table, chain: &str, number: u32) -> Result<(), ExecError> {
        self.run(Tool::Iptables, delete_rule_args(table, chain, number))
            .await?;
        info!("deleted rule {} from {}/{}", number, table, chain);
        Ok(())
    }

    pub async fn create_chain(&self, table: Table, chain: &str) -> Result<(), ExecError> {
        self.run(Tool::Iptables, new_chain_args(table, chain)).await?;
        info!("created chain {}/{}", table, chain);
        Ok(())
    }

    /// Flush, then delete. The delete is not attempted if the flush fails.
    pub async fn delete_chain(&self, table: Table, chain: &str) -> Result<(), ExecError> {
        self.run(Tool::Iptables, flush_chain_args(table, chain))
            .await?;
        self.run(Tool::Iptables, delete_chain_args(table, chain))
            .await?;
        info!("deleted chain {}/{}", table, chain);
        Ok(())
    }

    pub async fn set_policy(&self, table: Table, chain: &str, policy: &str) -> Result<(), ExecError> {
        self.run(Tool::Iptables, set_policy_args(table, chain, policy))
            .await?;
        info!("set policy of {}/{} to {}", table, chain, policy);
        Ok(())
    }

    /// `iptables-save -f <saved rules path>`.
    pub async fn save(&self) -> Result<&Path, ExecError> {
        let path = self.files.saved_rules.as_path();
        self.run(Tool::Save, vec!["-f".into(), path.display().to_string()])
            .await?;
        info!("saved rules to {}", path.display());
        Ok(path)
    }

    /// Stage the uploaded rules file, then `iptables-restore <path>`.
    pub async fn restore(&self, contents: &[u8]) -> Result<(), ExecError> {
        let path = self.files.restore_upload.as_path();
        tokio::fs::write(path, contents).await?;
        self.run(Tool::Restore, vec![path.display().to_string()])
            .await?;
        info!("restored rules from {}", path.display());
        Ok(())
    }
}
