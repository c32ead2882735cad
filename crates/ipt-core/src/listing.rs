//! Parser for the plain-text output of `iptables -L -n [--line-numbers -v]`.
//!
//! The grammar is line oriented:
//!
//! ```text
//! Chain INPUT (policy ACCEPT 0 packets, 0 bytes)      <- chain header
//! num   pkts bytes target  prot opt in  out  source     destination   <- column header
//! 1       12   720 ACCEPT  tcp  --  *   *    0.0.0.0/0  0.0.0.0/0   tcp dpt:22   <- rule row
//! ```
//!
//! Rows need at least eight whitespace-separated tokens. Under the verbose
//! header they must also fill both interface columns, with a blank target
//! allowed. Lines that do not fit are returned as [`RejectedLine`]s so callers
//! can surface format drift instead of losing it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::table::Table;

/// Minimum token count for a rule row.
pub const MIN_ROW_TOKENS: usize = 8;

/// Token count of a verbose row with a target and no match details.
const VERBOSE_ROW_TOKENS: usize = 10;

static CHAIN_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^Chain\s+(?P<name>\S+)(?:\s+\((?:policy\s+(?P<policy>[^\s)]+)|(?P<refs>\d+)\s+references?)[^)]*\))?",
    )
    .expect("chain header pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHeader {
    pub name: String,
    /// Only built-in chains carry a policy.
    pub policy: Option<String>,
    /// Only user chains carry a reference count.
    pub references: Option<u32>,
}

/// Column arrangement announced by the listing's column header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnLayout {
    /// `num pkts bytes target prot opt in out source destination`
    Verbose,
    /// No interface columns: source and destination follow `opt` directly.
    #[default]
    Compact,
}

impl ColumnLayout {
    pub fn from_header(line: &str) -> Self {
        let mut tokens = line.split_whitespace();
        let has_in = tokens.clone().any(|t| t == "in");
        let has_out = tokens.any(|t| t == "out");
        if has_in && has_out {
            ColumnLayout::Verbose
        } else {
            ColumnLayout::Compact
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRow {
    pub num: String,
    pub pkts: String,
    pub bytes: String,
    pub target: String,
    pub prot: String,
    pub opt: String,
    pub in_iface: Option<String>,
    pub out_iface: Option<String>,
    pub source: String,
    pub destination: String,
    /// Match details printed after the addresses, e.g. `tcp dpt:22`.
    pub extra: String,
}

impl RuleRow {
    /// Current position of the rule in its chain, if the first column is numeric.
    pub fn number(&self) -> Option<u32> {
        self.num.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedLine {
    /// 1-based line number within the parsed text.
    pub line_no: usize,
    pub text: String,
}

/// One chain's worth of `--line-numbers -v` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleListing {
    pub header: Option<ChainHeader>,
    pub layout: ColumnLayout,
    pub rows: Vec<RuleRow>,
    pub rejected: Vec<RejectedLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainListing {
    pub name: String,
    pub policy: Option<String>,
    pub references: Option<u32>,
    pub rows: Vec<RuleRow>,
    pub rejected: Vec<RejectedLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableListing {
    pub table: Table,
    pub chains: Vec<ChainListing>,
}

impl TableListing {
    pub fn empty(table: Table) -> Self {
        Self {
            table,
            chains: vec![],
        }
    }

    pub fn chain(&self, name: &str) -> Option<&ChainListing> {
        self.chains.iter().find(|c| c.name == name)
    }

    pub fn rejected_count(&self) -> usize {
        self.chains.iter().map(|c| c.rejected.len()).sum()
    }
}

/// Parse a `Chain ...` line. Returns `None` for anything else.
pub fn parse_chain_header(line: &str) -> Option<ChainHeader> {
    let caps = CHAIN_HEADER.captures(line)?;
    Some(ChainHeader {
        name: caps["name"].to_string(),
        policy: caps.name("policy").map(|m| m.as_str().to_string()),
        references: caps.name("refs").and_then(|m| m.as_str().parse().ok()),
    })
}

/// Every chain header in a listing, in output order.
pub fn chain_headers(text: &str) -> Vec<ChainHeader> {
    text.lines()
        .filter(|line| line.starts_with("Chain"))
        .filter_map(parse_chain_header)
        .collect()
}

/// Split a row into named fields. `None` when the row does not fit the layout.
pub fn parse_rule_row(line: &str, layout: ColumnLayout) -> Option<RuleRow> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < MIN_ROW_TOKENS {
        return None;
    }

    match layout {
        ColumnLayout::Verbose => parse_verbose_row(&tokens),
        ColumnLayout::Compact => Some(row_from(&tokens, tokens[3], 4, None)),
    }
}

/// Verbose rows always carry both interface columns. A rule without `-j`
/// prints a blank target, which leaves the row one token short; that shape
/// is recognised by the `opt` column landing where `prot` should be.
fn parse_verbose_row(tokens: &[&str]) -> Option<RuleRow> {
    if tokens.len() >= VERBOSE_ROW_TOKENS - 1 && is_opt_column(tokens[4]) {
        return Some(row_from(tokens, "", 3, Some(5)));
    }
    if tokens.len() >= VERBOSE_ROW_TOKENS {
        return Some(row_from(tokens, tokens[3], 4, Some(6)));
    }
    None
}

/// `--`, or the fragment flag `-f` / `!f`.
fn is_opt_column(token: &str) -> bool {
    matches!(token, "--" | "-f" | "!f")
}

/// Build a row whose `prot` column sits at `prot_at`. With `ifaces_at` the
/// two interface columns follow `opt`.
fn row_from(tokens: &[&str], target: &str, prot_at: usize, ifaces_at: Option<usize>) -> RuleRow {
    let (in_iface, out_iface, addr_at) = match ifaces_at {
        Some(at) => (Some(tokens[at].to_string()), Some(tokens[at + 1].to_string()), at + 2),
        None => (None, None, prot_at + 2),
    };

    RuleRow {
        num: tokens[0].to_string(),
        pkts: tokens[1].to_string(),
        bytes: tokens[2].to_string(),
        target: target.to_string(),
        prot: tokens[prot_at].to_string(),
        opt: tokens[prot_at + 1].to_string(),
        in_iface,
        out_iface,
        source: tokens[addr_at].to_string(),
        destination: tokens[addr_at + 1].to_string(),
        extra: tokens[addr_at + 2..].join(" "),
    }
}

/// Parse the listing of a single chain.
///
/// The first two lines are always consumed as the chain and column headers.
pub fn parse_rule_listing(text: &str) -> RuleListing {
    let lines: Vec<&str> = text.lines().collect();
    parse_section(&lines, 1)
}

/// Parse a verbose listing of a whole table into its chains.
pub fn parse_table_listing(table: Table, text: &str) -> TableListing {
    let mut sections: Vec<(usize, Vec<&str>)> = vec![];

    for (idx, line) in text.lines().enumerate() {
        if line.starts_with("Chain") {
            sections.push((idx + 1, vec![line]));
        } else if let Some((_, lines)) = sections.last_mut() {
            lines.push(line);
        }
    }

    let chains = sections
        .into_iter()
        .filter_map(|(first_line_no, lines)| {
            let listing = parse_section(&lines, first_line_no);
            let header = listing.header?;
            Some(ChainListing {
                name: header.name,
                policy: header.policy,
                references: header.references,
                rows: listing.rows,
                rejected: listing.rejected,
            })
        })
        .collect();

    TableListing { table, chains }
}

fn parse_section(lines: &[&str], first_line_no: usize) -> RuleListing {
    let header = lines.first().and_then(|line| parse_chain_header(line));
    let layout = lines
        .get(1)
        .map(|line| ColumnLayout::from_header(line))
        .unwrap_or_default();

    let mut rows = vec![];
    let mut rejected = vec![];

    for (offset, line) in lines.iter().enumerate().skip(2) {
        if line.trim().is_empty() {
            continue;
        }
        match parse_rule_row(line, layout) {
            Some(row) => rows.push(row),
            None => rejected.push(RejectedLine {
                line_no: first_line_no + offset,
                text: line.to_string(),
            }),
        }
    }

    RuleListing {
        header,
        layout,
        rows,
        rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT_VERBOSE: &str = "\
Chain INPUT (policy DROP 1024 packets, 61440 bytes)
num   pkts bytes target     prot opt in     out     source               destination
1     1520 98812 ACCEPT     all  --  lo     *       0.0.0.0/0            0.0.0.0/0
2      312 20112 ACCEPT     tcp  --  eth0   *       10.0.0.0/8           0.0.0.0/0            tcp dpt:22
3        0     0 LOGGING    all  --  *      *       0.0.0.0/0            0.0.0.0/0
";

    #[test]
    fn chain_header_with_policy() {
        let header = parse_chain_header("Chain FOO (policy DROP)").unwrap();
        assert_eq!(header.name, "FOO");
        assert_eq!(header.policy.as_deref(), Some("DROP"));
        assert_eq!(header.references, None);
    }

    #[test]
    fn chain_header_without_policy_clause() {
        let header = parse_chain_header("Chain FOO").unwrap();
        assert_eq!(header.name, "FOO");
        assert!(header.policy.is_none());
    }

    #[test]
    fn chain_header_with_verbose_counters_and_references() {
        let builtin =
            parse_chain_header("Chain INPUT (policy ACCEPT 0 packets, 0 bytes)").unwrap();
        assert_eq!(builtin.policy.as_deref(), Some("ACCEPT"));

        let user = parse_chain_header("Chain LOGGING (2 references)").unwrap();
        assert_eq!(user.name, "LOGGING");
        assert!(user.policy.is_none());
        assert_eq!(user.references, Some(2));
    }

    #[test]
    fn non_header_lines_are_not_chains() {
        assert!(parse_chain_header("target     prot opt source").is_none());
        assert!(parse_chain_header("  Chain indented").is_none());
    }

    #[test]
    fn chain_headers_scans_whole_listing() {
        let text = "\
Chain INPUT (policy ACCEPT)
target     prot opt source               destination

Chain FORWARD (policy DROP)
target     prot opt source               destination

Chain LOGGING (0 references)
target     prot opt source               destination
";
        let names: Vec<_> = chain_headers(text).into_iter().map(|h| h.name).collect();
        assert_eq!(names, ["INPUT", "FORWARD", "LOGGING"]);
    }

    #[test]
    fn verbose_rows_keep_order_and_named_columns() {
        let listing = parse_rule_listing(INPUT_VERBOSE);

        assert_eq!(listing.layout, ColumnLayout::Verbose);
        assert_eq!(listing.header.unwrap().policy.as_deref(), Some("DROP"));
        assert_eq!(listing.rows.len(), 3);
        assert!(listing.rejected.is_empty());

        let ssh = &listing.rows[1];
        assert_eq!(ssh.number(), Some(2));
        assert_eq!(ssh.target, "ACCEPT");
        assert_eq!(ssh.in_iface.as_deref(), Some("eth0"));
        assert_eq!(ssh.source, "10.0.0.0/8");
        assert_eq!(ssh.destination, "0.0.0.0/0");
        assert_eq!(ssh.extra, "tcp dpt:22");

        let nums: Vec<_> = listing.rows.iter().map(|r| r.num.as_str()).collect();
        assert_eq!(nums, ["1", "2", "3"]);
    }

    #[test]
    fn short_rows_are_rejected_without_affecting_row_count() {
        let text = "\
Chain INPUT (policy ACCEPT 0 packets, 0 bytes)
num   pkts bytes target     prot opt in     out     source               destination
1        0     0 ACCEPT     all  --  *      *       0.0.0.0/0            0.0.0.0/0
garbage line here
2        0     0 DROP       all  --  *      *       192.0.2.1            0.0.0.0/0
";
        let listing = parse_rule_listing(text);
        assert_eq!(listing.rows.len(), 2);
        assert_eq!(listing.rows[1].target, "DROP");
        assert_eq!(
            listing.rejected,
            vec![RejectedLine {
                line_no: 4,
                text: "garbage line here".into()
            }]
        );
    }

    #[test]
    fn verbose_row_with_blank_target_shifts_columns() {
        let text = "\
Chain INPUT (policy ACCEPT 0 packets, 0 bytes)
num   pkts bytes target     prot opt in     out     source               destination
1        0     0            all  --  *      *       192.0.2.9            0.0.0.0/0
2        7   420            tcp  --  eth0   *       0.0.0.0/0            0.0.0.0/0            tcp dpt:80
";
        let listing = parse_rule_listing(text);
        assert!(listing.rejected.is_empty());
        assert_eq!(listing.rows.len(), 2);

        let bare = &listing.rows[0];
        assert_eq!(bare.target, "");
        assert_eq!(bare.prot, "all");
        assert_eq!(bare.opt, "--");
        assert_eq!(bare.in_iface.as_deref(), Some("*"));
        assert_eq!(bare.source, "192.0.2.9");
        assert_eq!(bare.destination, "0.0.0.0/0");
        assert_eq!(bare.extra, "");

        let web = &listing.rows[1];
        assert_eq!(web.target, "");
        assert_eq!(web.in_iface.as_deref(), Some("eth0"));
        assert_eq!(web.extra, "tcp dpt:80");
    }

    #[test]
    fn verbose_rows_missing_interface_columns_are_rejected() {
        let text = "\
Chain INPUT (policy ACCEPT 0 packets, 0 bytes)
num   pkts bytes target     prot opt in     out     source               destination
1        0     0 ACCEPT     all  --  0.0.0.0/0            0.0.0.0/0
2        0     0 ACCEPT     all  --  *      0.0.0.0/0            0.0.0.0/0
";
        let listing = parse_rule_listing(text);
        assert!(listing.rows.is_empty());
        let lines: Vec<_> = listing.rejected.iter().map(|r| r.line_no).collect();
        assert_eq!(lines, [3, 4]);
    }

    #[test]
    fn eight_token_rows_use_positional_addresses() {
        let text = "h1\nh2\n1 2 3 ACCEPT tcp -- 10.0.0.1 10.0.0.2\n";
        let listing = parse_rule_listing(text);
        assert!(listing.header.is_none());
        assert_eq!(listing.rows.len(), 1);
        assert_eq!(listing.rows[0].source, "10.0.0.1");
        assert_eq!(listing.rows[0].destination, "10.0.0.2");
        assert!(listing.rows[0].in_iface.is_none());
        assert_eq!(listing.rows[0].extra, "");
    }

    #[test]
    fn header_lines_are_never_rows() {
        let listing = parse_rule_listing("");
        assert!(listing.rows.is_empty());

        // Both headers long enough to look like rows are still consumed.
        let text = "a b c d e f g h i j\nk l m n o p q r s t\n";
        assert!(parse_rule_listing(text).rows.is_empty());
    }

    #[test]
    fn table_listing_splits_sections_per_chain() {
        let text = format!(
            "{INPUT_VERBOSE}\n\
Chain OUTPUT (policy ACCEPT 0 packets, 0 bytes)\n\
num   pkts bytes target     prot opt in     out     source               destination\n\
\n\
Chain LOGGING (1 references)\n\
num   pkts bytes target     prot opt in     out     source               destination\n\
1        0     0 LOG        all  --  *      *       0.0.0.0/0            0.0.0.0/0            LOG flags 0 level 4\n\
oops\n"
        );

        let listing = parse_table_listing(Table::Filter, &text);
        let names: Vec<_> = listing.chains.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["INPUT", "OUTPUT", "LOGGING"]);

        assert_eq!(listing.chain("INPUT").unwrap().rows.len(), 3);
        assert!(listing.chain("OUTPUT").unwrap().rows.is_empty());

        let logging = listing.chain("LOGGING").unwrap();
        assert_eq!(logging.references, Some(1));
        assert_eq!(logging.rows[0].extra, "LOG flags 0 level 4");
        assert_eq!(logging.rejected.len(), 1);
        assert_eq!(logging.rejected[0].line_no, 13);
        assert_eq!(listing.rejected_count(), 1);
    }
}
