//! Form bodies posted by the dashboard.
//!
//! Browsers submit empty inputs as empty strings; those are treated as absent.

use ipt_core::{CoreError, NatRequest, RuleSpec, Table};
use serde::Deserialize;

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct RuleForm {
    pub table: String,
    pub chain: String,
    pub action: String,
    pub protocol: Option<String>,
    pub source_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub source_port: Option<String>,
    pub dest_port: Option<String>,
    pub in_interface: Option<String>,
    pub out_interface: Option<String>,
    pub to_source: Option<String>,
    pub to_destination: Option<String>,
}

impl RuleForm {
    pub fn into_spec(self) -> Result<RuleSpec, CoreError> {
        let table: Table = self.table.parse()?;
        Ok(RuleSpec {
            protocol: present(self.protocol),
            source: present(self.source_ip),
            destination: present(self.dest_ip),
            source_port: present(self.source_port),
            destination_port: present(self.dest_port),
            in_interface: present(self.in_interface),
            out_interface: present(self.out_interface),
            to_source: present(self.to_source),
            to_destination: present(self.to_destination),
            ..RuleSpec::new(table, self.chain, self.action)
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NatForm {
    pub nat_type: String,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub to_source: Option<String>,
    pub to_destination: Option<String>,
}

impl From<NatForm> for NatRequest {
    fn from(form: NatForm) -> Self {
        NatRequest {
            nat_type: form.nat_type,
            source: present(form.source),
            destination: present(form.destination),
            to_source: present(form.to_source),
            to_destination: present(form.to_destination),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteRuleForm {
    pub table: String,
    pub chain: String,
    pub rule_number: String,
}

impl DeleteRuleForm {
    pub fn table(&self) -> Result<Table, CoreError> {
        self.table.parse()
    }

    /// Rule positions start at 1.
    pub fn number(&self) -> Result<u32, CoreError> {
        match self.rule_number.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(CoreError::InvalidRuleNumber(self.rule_number.clone())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChainForm {
    pub table: String,
    pub chain: String,
}

impl ChainForm {
    pub fn table(&self) -> Result<Table, CoreError> {
        self.table.parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct PolicyForm {
    pub table: String,
    pub chain: String,
    pub policy: String,
}

impl PolicyForm {
    pub fn table(&self) -> Result<Table, CoreError> {
        self.table.parse()
    }
}
