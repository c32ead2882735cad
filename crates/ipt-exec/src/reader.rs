use ipt_core::{
    ChainHeader, CustomChain, ListMode, PolicyEntry, RuleListing, Table, TableListing,
    chain_headers, custom_chains, list_args, parse_rule_listing, parse_table_listing, policies,
};
use serde::Serialize;
use tracing::warn;

use crate::error::ExecError;
use crate::privilege::Capability;
use crate::runner::{CommandRunner, Invocation, Tool};

/// Chains and policies gathered from one pass over a set of tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub custom_chains: Vec<CustomChain>,
    pub policies: Vec<PolicyEntry>,
}

impl Overview {
    fn add(&mut self, table: Table, headers: &[ChainHeader]) {
        self.custom_chains.extend(custom_chains(table, headers));
        self.policies.extend(policies(table, headers));
    }
}

/// Read-only queries. Without a capability the listings run unelevated and
/// usually come back empty.
pub struct FirewallReader<'a> {
    runner: &'a dyn CommandRunner,
    capability: Option<Capability>,
}

impl<'a> FirewallReader<'a> {
    pub fn new(runner: &'a dyn CommandRunner, capability: Option<Capability>) -> Self {
        Self { runner, capability }
    }

    async fn list(&self, table: Table, chain: Option<&str>, mode: ListMode) -> Result<String, ExecError> {
        let invocation = Invocation::with_capability(
            Tool::Iptables,
            list_args(table, chain, mode),
            self.capability.as_ref(),
        );
        self.runner.run(&invocation).await
    }

    /// Chain headers of a table. Failures yield an empty list.
    pub async fn chain_headers(&self, table: Table) -> Vec<ChainHeader> {
        match self.list(table, None, ListMode::Plain).await {
            Ok(output) => chain_headers(&output),
            Err(e) => {
                warn!("Error getting chains for {}: {}", table, e);
                vec![]
            }
        }
    }

    /// Custom chains and built-in policies across `tables`, one listing per table.
    pub async fn overview(&self, tables: &[Table]) -> Overview {
        let mut overview = Overview::default();
        for &table in tables {
            overview.add(table, &self.chain_headers(table).await);
        }
        overview
    }

    /// Same as [`overview`](Self::overview), but `known` is not listed again;
    /// `headers` already holds its chains.
    pub async fn overview_reusing(
        &self,
        tables: &[Table],
        known: Table,
        headers: &[ChainHeader],
    ) -> Overview {
        let mut overview = Overview::default();
        for &table in tables {
            if table == known {
                overview.add(table, headers);
            } else {
                overview.add(table, &self.chain_headers(table).await);
            }
        }
        overview
    }

    pub async fn custom_chains(&self, tables: &[Table]) -> Vec<CustomChain> {
        self.overview(tables).await.custom_chains
    }

    pub async fn policies(&self, tables: &[Table]) -> Vec<PolicyEntry> {
        self.overview(tables).await.policies
    }

    /// Numbered rule listing of one chain. The error is passed through so the
    /// dashboard can show it in place of the table.
    pub async fn rule_listing(&self, table: Table, chain: &str) -> Result<RuleListing, ExecError> {
        let output = self.list(table, Some(chain), ListMode::Numbered).await?;
        let listing = parse_rule_listing(&output);
        for line in &listing.rejected {
            warn!(
                "{}/{}: skipped unparseable line {}: {:?}",
                table, chain, line.line_no, line.text
            );
        }
        Ok(listing)
    }

    /// Every chain of a table with its rows. Failures yield an empty listing.
    pub async fn table_listing(&self, table: Table) -> TableListing {
        match self.list(table, None, ListMode::Numbered).await {
            Ok(output) => {
                let listing = parse_table_listing(table, &output);
                if listing.rejected_count() > 0 {
                    warn!(
                        "{}: skipped {} unparseable line(s)",
                        table,
                        listing.rejected_count()
                    );
                }
                listing
            }
            Err(e) => {
                warn!("Error listing table {}: {}", table, e);
                TableListing::empty(table)
            }
        }
    }

    /// Unparsed `-L -n -v` output, shown verbatim on the NAT tab.
    pub async fn raw_listing(&self, table: Table) -> Result<String, ExecError> {
        self.list(table, None, ListMode::Counters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    const FILTER_PLAIN: &str = "\
Chain INPUT (policy DROP)
target     prot opt source               destination
ACCEPT     all  --  0.0.0.0/0            0.0.0.0/0

Chain FORWARD (policy ACCEPT)
target     prot opt source               destination

Chain OUTPUT (policy ACCEPT)
target     prot opt source               destination

Chain LOGGING (0 references)
target     prot opt source               destination

Chain MY_INPUT_EXT (0 references)
target     prot opt source               destination
";

    const NAT_PLAIN: &str = "\
Chain PREROUTING (policy ACCEPT)
target     prot opt source               destination

Chain POSTROUTING (policy ACCEPT)
target     prot opt source               destination

Chain DOCKER (2 references)
target     prot opt source               destination
";

    fn scripted() -> ScriptedRunner {
        let runner = ScriptedRunner::new();
        runner
            .respond(Tool::Iptables, &["-t", "filter", "-L", "-n"], FILTER_PLAIN)
            .respond(Tool::Iptables, &["-t", "nat", "-L", "-n"], NAT_PLAIN);
        runner
    }

    #[tokio::test]
    async fn chains_lists_every_header() {
        let runner = scripted();
        let reader = FirewallReader::new(&runner, None);
        let names: Vec<_> = reader
            .chain_headers(Table::Filter)
            .await
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, ["INPUT", "FORWARD", "OUTPUT", "LOGGING", "MY_INPUT_EXT"]);
    }

    #[tokio::test]
    async fn overview_collects_custom_chains_and_policies() {
        let runner = scripted();
        let reader = FirewallReader::new(&runner, Some(Capability::assume_for_tests()));

        let overview = reader.overview(&[Table::Filter, Table::Nat]).await;

        let custom: Vec<_> = overview
            .custom_chains
            .iter()
            .map(|c| format!("{}/{}", c.table, c.name))
            .collect();
        // MY_INPUT_EXT is hidden by the substring check.
        assert_eq!(custom, ["filter/LOGGING", "nat/DOCKER"]);

        let policies: Vec<_> = overview
            .policies
            .iter()
            .map(|p| format!("{}/{}={}", p.table, p.chain, p.policy))
            .collect();
        assert_eq!(
            policies,
            [
                "filter/INPUT=DROP",
                "filter/FORWARD=ACCEPT",
                "filter/OUTPUT=ACCEPT",
                "nat/PREROUTING=ACCEPT",
                "nat/POSTROUTING=ACCEPT"
            ]
        );

        assert!(runner.calls().iter().all(|c| c.elevated));
    }

    #[tokio::test]
    async fn overview_reusing_skips_the_known_table() {
        let runner = scripted();
        let reader = FirewallReader::new(&runner, None);

        let headers = reader.chain_headers(Table::Filter).await;
        let reused = reader
            .overview_reusing(&[Table::Filter, Table::Nat], Table::Filter, &headers)
            .await;

        assert_eq!(reused, reader.overview(&[Table::Filter, Table::Nat]).await);
        let filter_listings = runner
            .command_lines()
            .iter()
            .filter(|line| line.as_str() == "iptables -t filter -L -n")
            .count();
        // One from chain_headers, one from the plain overview.
        assert_eq!(filter_listings, 2);
    }

    #[tokio::test]
    async fn failed_listing_reads_as_empty() {
        let runner = ScriptedRunner::new();
        runner.fail(
            Tool::Iptables,
            &["-t", "raw", "-L", "-n"],
            "iptables: Permission denied (you must be root).",
        );
        let reader = FirewallReader::new(&runner, None);

        assert!(reader.chain_headers(Table::Raw).await.is_empty());
        assert_eq!(reader.overview(&[Table::Raw]).await, Overview::default());
        assert!(!runner.calls()[0].elevated);
    }

    #[tokio::test]
    async fn rule_listing_uses_numbered_verbose_output() {
        let runner = ScriptedRunner::new();
        runner.respond(
            Tool::Iptables,
            &["-t", "filter", "-L", "INPUT", "-n", "--line-numbers", "-v"],
            "Chain INPUT (policy ACCEPT 0 packets, 0 bytes)\n\
             num   pkts bytes target     prot opt in     out     source               destination\n\
             1        4   240 ACCEPT     tcp  --  *      *       0.0.0.0/0            0.0.0.0/0            tcp dpt:22\n\
             short\n",
        );
        let reader = FirewallReader::new(&runner, None);

        let listing = reader.rule_listing(Table::Filter, "INPUT").await.unwrap();
        assert_eq!(listing.rows.len(), 1);
        assert_eq!(listing.rows[0].extra, "tcp dpt:22");
        assert_eq!(listing.rejected.len(), 1);
    }

    #[tokio::test]
    async fn rule_listing_passes_errors_through() {
        let runner = ScriptedRunner::new();
        runner.fail(
            Tool::Iptables,
            &["-t", "filter", "-L", "NOPE", "-n", "--line-numbers", "-v"],
            "iptables: No chain/target/match by that name.",
        );
        let reader = FirewallReader::new(&runner, None);

        let err = reader.rule_listing(Table::Filter, "NOPE").await.unwrap_err();
        assert!(err.to_string().contains("No chain/target/match by that name"));
    }

    #[tokio::test]
    async fn raw_listing_uses_counters_mode() {
        let runner = ScriptedRunner::new();
        runner.respond(Tool::Iptables, &["-t", "nat", "-L", "-n", "-v"], NAT_PLAIN);
        let reader = FirewallReader::new(&runner, None);

        assert_eq!(reader.raw_listing(Table::Nat).await.unwrap(), NAT_PLAIN);
    }

    #[tokio::test]
    async fn failed_table_listing_is_empty() {
        let runner = ScriptedRunner::new();
        runner.fail(
            Tool::Iptables,
            &["-t", "mangle", "-L", "-n", "--line-numbers", "-v"],
            "boom",
        );
        let reader = FirewallReader::new(&runner, None);

        assert_eq!(
            reader.table_listing(Table::Mangle).await,
            TableListing::empty(Table::Mangle)
        );
    }
}
