use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::listing::ChainHeader;

/// Netfilter tables the console knows how to list and edit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    #[default]
    Filter,
    Nat,
    Mangle,
    Raw,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Filter, Table::Nat, Table::Mangle, Table::Raw];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Filter => "filter",
            Table::Nat => "nat",
            Table::Mangle => "mangle",
            Table::Raw => "raw",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Table {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filter" => Ok(Table::Filter),
            "nat" => Ok(Table::Nat),
            "mangle" => Ok(Table::Mangle),
            "raw" => Ok(Table::Raw),
            other => Err(CoreError::UnknownTable(other.to_string())),
        }
    }
}

/// Names treated as kernel hook chains when classifying custom chains.
pub const BUILTIN_CHAINS: [&str; 5] = ["INPUT", "OUTPUT", "FORWARD", "PREROUTING", "POSTROUTING"];

/// A chain is custom unless its name contains one of the built-in names.
///
/// The check is a substring match, so `MY_INPUT_EXT` counts as built-in.
pub fn is_custom_chain(name: &str) -> bool {
    !BUILTIN_CHAINS.iter().any(|builtin| name.contains(builtin))
}

/// A user-defined chain found while scanning a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomChain {
    pub table: Table,
    pub name: String,
}

/// Default policy of a built-in chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub table: Table,
    pub chain: String,
    pub policy: String,
}

/// Custom chains among the headers of one table's listing.
pub fn custom_chains(table: Table, headers: &[ChainHeader]) -> Vec<CustomChain> {
    headers
        .iter()
        .filter(|h| is_custom_chain(&h.name))
        .map(|h| CustomChain {
            table,
            name: h.name.clone(),
        })
        .collect()
}

/// Policies of the chains that declare one.
pub fn policies(table: Table, headers: &[ChainHeader]) -> Vec<PolicyEntry> {
    headers
        .iter()
        .filter_map(|h| {
            h.policy.as_ref().map(|policy| PolicyEntry {
                table,
                chain: h.name.clone(),
                policy: policy.clone(),
            })
        })
        .collect()
}
