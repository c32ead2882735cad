use anyhow::Context;
use clap::{Parser, Subcommand};
use ipt_core::{DEFAULT_SETTINGS_FILE, Settings, Table, is_custom_chain};
use ipt_exec::{Capability, CommandRunner, FirewallReader, SystemRunner, has_errors, preflight};
use ipt_metrics::{InstrumentedRunner, MetricsCollector};
use ipt_web::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "iptweb")]
#[command(version, about = "Web console for the local iptables rule set", long_about = None)]
struct Cli {
    /// Settings file; missing means defaults
    #[arg(short, long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web console
    Serve {
        /// Listen address, overrides `bind` from the settings file
        #[arg(long)]
        bind: Option<String>,
    },
    /// List chains, marking user-defined ones
    Chains {
        #[arg(short, long)]
        table: Option<Table>,
    },
    /// Show default policies of built-in chains
    Policies,
    /// Show the rules of one chain
    Rules {
        #[arg(short, long, default_value = "filter")]
        table: Table,
        #[arg(short, long, default_value = "INPUT")]
        chain: String,
    },
    /// Check tools and privileges
    Doctor,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let settings = Settings::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    let metrics = Arc::new(MetricsCollector::new()?);
    let runner = InstrumentedRunner::new(SystemRunner::from_settings(&settings), metrics.clone());

    tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            Commands::Serve { bind } => {
                let addr = bind.unwrap_or_else(|| settings.bind.clone());
                let state = AppState::new(Arc::new(runner), settings, metrics);
                ipt_web::serve(state, &addr).await
            }
            Commands::Chains { table } => {
                let tables = table.map(|t| vec![t]).unwrap_or_else(|| settings.tables.clone());
                show_chains(&runner, &tables).await
            }
            Commands::Policies => show_policies(&runner, &settings.tables).await,
            Commands::Rules { table, chain } => show_rules(&runner, table, &chain).await,
            Commands::Doctor => run_doctor(&runner).await,
        }
    })
}

/// Listings work unelevated too, they just tend to come back empty.
async fn reader(runner: &dyn CommandRunner) -> FirewallReader<'_> {
    FirewallReader::new(runner, Capability::acquire(runner).await.ok())
}

async fn show_chains(runner: &dyn CommandRunner, tables: &[Table]) -> anyhow::Result<()> {
    let reader = reader(runner).await;

    for &table in tables {
        println!("📋 {}:", table);
        let headers = reader.chain_headers(table).await;
        if headers.is_empty() {
            println!("  (no chains listed)");
        }
        for header in headers {
            let kind = if is_custom_chain(&header.name) { "custom" } else { "built-in" };
            match (&header.policy, header.references) {
                (Some(policy), _) => println!("  {:<24} {:<9} policy {}", header.name, kind, policy),
                (None, Some(refs)) => println!("  {:<24} {:<9} {} references", header.name, kind, refs),
                (None, None) => println!("  {:<24} {}", header.name, kind),
            }
        }
        println!();
    }

    Ok(())
}

async fn show_policies(runner: &dyn CommandRunner, tables: &[Table]) -> anyhow::Result<()> {
    let policies = reader(runner).await.policies(tables).await;

    if policies.is_empty() {
        println!("No policies found (is the privilege probe passing? try `iptweb doctor`)");
        return Ok(());
    }

    println!("Default policies ({}):\n", policies.len());
    for entry in policies {
        println!("  {:<8} {:<12} {}", entry.table, entry.chain, entry.policy);
    }
    Ok(())
}

async fn show_rules(runner: &dyn CommandRunner, table: Table, chain: &str) -> anyhow::Result<()> {
    let listing = reader(runner)
        .await
        .rule_listing(table, chain)
        .await
        .with_context(|| format!("Failed to list {}/{}", table, chain))?;

    println!("📜 {}/{} ({} rules)\n", table, chain, listing.rows.len());
    println!(
        "  {:>4} {:>8} {:>8} {:<12} {:<5} {:<4} {:<8} {:<8} {:<18} {:<18} {}",
        "num", "pkts", "bytes", "target", "prot", "opt", "in", "out", "source", "destination", ""
    );
    for row in &listing.rows {
        println!(
            "  {:>4} {:>8} {:>8} {:<12} {:<5} {:<4} {:<8} {:<8} {:<18} {:<18} {}",
            row.num,
            row.pkts,
            row.bytes,
            row.target,
            row.prot,
            row.opt,
            row.in_iface.as_deref().unwrap_or("-"),
            row.out_iface.as_deref().unwrap_or("-"),
            row.source,
            row.destination,
            row.extra
        );
    }

    if !listing.rejected.is_empty() {
        eprintln!("\n⚠️  {} line(s) did not parse as rules:", listing.rejected.len());
        for line in &listing.rejected {
            eprintln!("   {}: {}", line.line_no, line.text);
        }
    }

    Ok(())
}

async fn run_doctor(runner: &dyn CommandRunner) -> anyhow::Result<()> {
    println!("🩺 Checking iptables tooling...\n");

    let results = preflight(runner).await;
    for result in &results {
        println!("{}\n", result);
    }

    if has_errors(&results) {
        anyhow::bail!("preflight checks failed");
    }
    println!("✅ All checks passed");
    Ok(())
}
