use serde::{Deserialize, Serialize};

use crate::table::Table;

/// A rule as submitted from the dashboard. Only table, chain and action are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub table: Table,
    pub chain: String,
    pub action: String,
    pub protocol: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub source_port: Option<String>,
    pub destination_port: Option<String>,
    pub in_interface: Option<String>,
    pub out_interface: Option<String>,
    pub to_source: Option<String>,
    pub to_destination: Option<String>,
}

impl RuleSpec {
    pub fn new(table: Table, chain: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            table,
            chain: chain.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    /// Arguments for `iptables` that append this rule to its chain.
    ///
    /// Matches are emitted in a fixed order. SNAT/DNAT without a target
    /// address fall through to a bare `-j SNAT` / `-j DNAT`, which the tool
    /// rejects.
    pub fn append_args(&self) -> Vec<String> {
        let mut args = table_scope(self.table);
        args.push("-A".into());
        args.push(self.chain.clone());

        let matches = [
            ("-p", &self.protocol),
            ("-s", &self.source),
            ("-d", &self.destination),
            ("--sport", &self.source_port),
            ("--dport", &self.destination_port),
            ("-i", &self.in_interface),
            ("-o", &self.out_interface),
        ];
        for (flag, value) in matches {
            if let Some(value) = present(value) {
                args.push(flag.into());
                args.push(value.to_string());
            }
        }

        match (self.action.as_str(), present(&self.to_source), present(&self.to_destination)) {
            ("SNAT", Some(to), _) => {
                args.extend(["-j", "SNAT", "--to-source", to].map(String::from));
            }
            ("DNAT", _, Some(to)) => {
                args.extend(["-j", "DNAT", "--to-destination", to].map(String::from));
            }
            (action, _, _) => {
                args.push("-j".into());
                args.push(action.to_string());
            }
        }

        args
    }
}

/// Shortcut form for the NAT tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatRequest {
    pub nat_type: String,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub to_source: Option<String>,
    pub to_destination: Option<String>,
}

impl NatRequest {
    /// DNAT happens before routing, everything else after.
    pub fn chain(&self) -> &'static str {
        match self.nat_type.as_str() {
            "DNAT" => "PREROUTING",
            _ => "POSTROUTING",
        }
    }

    pub fn to_rule_spec(&self) -> RuleSpec {
        RuleSpec {
            source: self.source.clone(),
            destination: self.destination.clone(),
            to_source: self.to_source.clone(),
            to_destination: self.to_destination.clone(),
            ..RuleSpec::new(Table::Nat, self.chain(), self.nat_type.clone())
        }
    }
}

/// `-t <table> -D <chain> <number>`.
///
/// The number is the position shown when the listing was rendered; it is used
/// as given.
pub fn delete_rule_args(table: Table, chain: &str, number: u32) -> Vec<String> {
    chain_command(table, "-D", chain, Some(number.to_string()))
}

pub fn new_chain_args(table: Table, chain: &str) -> Vec<String> {
    chain_command(table, "-N", chain, None)
}

pub fn flush_chain_args(table: Table, chain: &str) -> Vec<String> {
    chain_command(table, "-F", chain, None)
}

pub fn delete_chain_args(table: Table, chain: &str) -> Vec<String> {
    chain_command(table, "-X", chain, None)
}

pub fn set_policy_args(table: Table, chain: &str, policy: &str) -> Vec<String> {
    chain_command(table, "-P", chain, Some(policy.to_string()))
}

/// Flavours of `iptables -L` the console issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// `-n`: chain headers and compact rows.
    Plain,
    /// `-n -v`: adds packet/byte counters and interfaces.
    Counters,
    /// `-n --line-numbers -v`: the layout rule rows are parsed from.
    Numbered,
}

/// `-t <table> -L [<chain>] -n ...`
pub fn list_args(table: Table, chain: Option<&str>, mode: ListMode) -> Vec<String> {
    let mut args = table_scope(table);
    args.push("-L".into());
    if let Some(chain) = chain {
        args.push(chain.to_string());
    }
    args.push("-n".into());
    match mode {
        ListMode::Plain => {}
        ListMode::Counters => args.push("-v".into()),
        ListMode::Numbered => {
            args.push("--line-numbers".into());
            args.push("-v".into());
        }
    }
    args
}

fn table_scope(table: Table) -> Vec<String> {
    vec!["-t".into(), table.as_str().into()]
}

fn chain_command(table: Table, op: &str, chain: &str, operand: Option<String>) -> Vec<String> {
    let mut args = table_scope(table);
    args.push(op.into());
    args.push(chain.to_string());
    args.extend(operand);
    args
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(args: Vec<String>) -> String {
        args.join(" ")
    }

    #[test]
    fn drop_ssh_rule() {
        let spec = RuleSpec {
            protocol: Some("tcp".into()),
            destination_port: Some("22".into()),
            ..RuleSpec::new(Table::Filter, "INPUT", "DROP")
        };
        assert_eq!(
            joined(spec.append_args()),
            "-t filter -A INPUT -p tcp --dport 22 -j DROP"
        );
    }

    #[test]
    fn matches_follow_fixed_order() {
        let spec = RuleSpec {
            protocol: Some("udp".into()),
            source: Some("10.0.0.0/8".into()),
            destination: Some("192.0.2.1".into()),
            source_port: Some("1024:65535".into()),
            destination_port: Some("53".into()),
            in_interface: Some("eth0".into()),
            out_interface: Some("eth1".into()),
            ..RuleSpec::new(Table::Filter, "FORWARD", "ACCEPT")
        };
        assert_eq!(
            joined(spec.append_args()),
            "-t filter -A FORWARD -p udp -s 10.0.0.0/8 -d 192.0.2.1 \
             --sport 1024:65535 --dport 53 -i eth0 -o eth1 -j ACCEPT"
        );
    }

    #[test]
    fn empty_fields_are_skipped() {
        let spec = RuleSpec {
            protocol: Some(String::new()),
            source: Some(String::new()),
            ..RuleSpec::new(Table::Mangle, "OUTPUT", "ACCEPT")
        };
        assert_eq!(joined(spec.append_args()), "-t mangle -A OUTPUT -j ACCEPT");
    }

    #[test]
    fn snat_and_dnat_with_targets() {
        let snat = RuleSpec {
            to_source: Some("203.0.113.5".into()),
            ..RuleSpec::new(Table::Nat, "POSTROUTING", "SNAT")
        };
        assert_eq!(
            joined(snat.append_args()),
            "-t nat -A POSTROUTING -j SNAT --to-source 203.0.113.5"
        );

        let dnat = RuleSpec {
            protocol: Some("tcp".into()),
            destination_port: Some("8080".into()),
            to_destination: Some("10.0.0.10:80".into()),
            ..RuleSpec::new(Table::Nat, "PREROUTING", "DNAT")
        };
        assert_eq!(
            joined(dnat.append_args()),
            "-t nat -A PREROUTING -p tcp --dport 8080 -j DNAT --to-destination 10.0.0.10:80"
        );
    }

    #[test]
    fn snat_without_target_degrades_to_bare_jump() {
        let spec = RuleSpec::new(Table::Nat, "POSTROUTING", "SNAT");
        assert_eq!(joined(spec.append_args()), "-t nat -A POSTROUTING -j SNAT");
    }

    #[test]
    fn dnat_ignores_to_source() {
        let spec = RuleSpec {
            to_source: Some("203.0.113.5".into()),
            ..RuleSpec::new(Table::Nat, "PREROUTING", "DNAT")
        };
        assert_eq!(joined(spec.append_args()), "-t nat -A PREROUTING -j DNAT");
    }

    #[test]
    fn delete_uses_the_given_position_verbatim() {
        // Rules 1..=3 were displayed; another client inserted one since.
        // The builder has no view of that and must not adjust the number.
        let first = delete_rule_args(Table::Filter, "INPUT", 2);
        let again = delete_rule_args(Table::Filter, "INPUT", 2);
        assert_eq!(first, again);
        assert_eq!(joined(first), "-t filter -D INPUT 2");
    }

    #[test]
    fn chain_and_policy_commands() {
        assert_eq!(joined(new_chain_args(Table::Raw, "TRACE_ME")), "-t raw -N TRACE_ME");
        assert_eq!(joined(flush_chain_args(Table::Filter, "LOGGING")), "-t filter -F LOGGING");
        assert_eq!(joined(delete_chain_args(Table::Filter, "LOGGING")), "-t filter -X LOGGING");
        assert_eq!(
            joined(set_policy_args(Table::Filter, "FORWARD", "DROP")),
            "-t filter -P FORWARD DROP"
        );
    }

    #[test]
    fn list_commands() {
        assert_eq!(joined(list_args(Table::Nat, None, ListMode::Plain)), "-t nat -L -n");
        assert_eq!(joined(list_args(Table::Nat, None, ListMode::Counters)), "-t nat -L -n -v");
        assert_eq!(
            joined(list_args(Table::Filter, Some("INPUT"), ListMode::Numbered)),
            "-t filter -L INPUT -n --line-numbers -v"
        );
    }

    #[test]
    fn nat_request_picks_chain_by_type() {
        let masq = NatRequest {
            nat_type: "MASQUERADE".into(),
            source: Some("10.33.0.0/24".into()),
            ..Default::default()
        };
        assert_eq!(
            joined(masq.to_rule_spec().append_args()),
            "-t nat -A POSTROUTING -s 10.33.0.0/24 -j MASQUERADE"
        );

        let dnat = NatRequest {
            nat_type: "DNAT".into(),
            destination: Some("203.0.113.5".into()),
            to_destination: Some("10.33.0.10".into()),
            ..Default::default()
        };
        assert_eq!(
            joined(dnat.to_rule_spec().append_args()),
            "-t nat -A PREROUTING -d 203.0.113.5 -j DNAT --to-destination 10.33.0.10"
        );
    }
}
