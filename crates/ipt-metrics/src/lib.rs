use anyhow::Result;
use async_trait::async_trait;
use ipt_core::Table;
use ipt_exec::{CommandRunner, ExecError, Invocation};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector for the console
pub struct MetricsCollector {
    registry: Arc<Registry>,

    // Tool invocations
    invocations: IntCounterVec,

    // Listing parser
    rejected_lines: IntCounterVec,
    listed_rules: IntGaugeVec,

    // Privilege probe
    privilege_denied: IntCounter,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let invocations = IntCounterVec::new(
            Opts::new(
                "iptweb_invocations_total",
                "Tool invocations by tool, verb and outcome",
            ),
            &["tool", "verb", "outcome"],
        )?;
        registry.register(Box::new(invocations.clone()))?;

        let rejected_lines = IntCounterVec::new(
            Opts::new(
                "iptweb_rejected_lines_total",
                "Listing lines that did not parse as rule rows",
            ),
            &["table"],
        )?;
        registry.register(Box::new(rejected_lines.clone()))?;

        let listed_rules = IntGaugeVec::new(
            Opts::new(
                "iptweb_listed_rules",
                "Rule rows in the most recent listing of a chain",
            ),
            &["table", "chain"],
        )?;
        registry.register(Box::new(listed_rules.clone()))?;

        let privilege_denied = IntCounter::new(
            "iptweb_privilege_denied_total",
            "Requests refused because the privilege probe failed",
        )?;
        registry.register(Box::new(privilege_denied.clone()))?;

        Ok(Self {
            registry,
            invocations,
            rejected_lines,
            listed_rules,
            privilege_denied,
        })
    }

    pub fn record_invocation(&self, invocation: &Invocation, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        self.invocations
            .with_label_values(&[invocation.tool.label(), invocation.verb(), outcome])
            .inc();
    }

    /// Record the result of parsing one chain's listing
    pub fn record_listing(&self, table: Table, chain: &str, rows: usize, rejected: usize) {
        self.listed_rules
            .with_label_values(&[table.as_str(), chain])
            .set(rows as i64);
        if rejected > 0 {
            self.rejected_lines
                .with_label_values(&[table.as_str()])
                .inc_by(rejected as u64);
        }
    }

    pub fn record_privilege_denied(&self) {
        self.privilege_denied.inc();
    }

    /// Render metrics in Prometheus text format
    pub fn render_metrics(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Wraps a runner and counts every invocation it performs.
pub struct InstrumentedRunner<R> {
    inner: R,
    metrics: Arc<MetricsCollector>,
}

impl<R: CommandRunner> InstrumentedRunner<R> {
    pub fn new(inner: R, metrics: Arc<MetricsCollector>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl<R: CommandRunner> CommandRunner for InstrumentedRunner<R> {
    async fn run(&self, invocation: &Invocation) -> Result<String, ExecError> {
        let result = self.inner.run(invocation).await;
        self.metrics.record_invocation(invocation, result.is_ok());
        result
    }

    // Denials are counted where a request is refused.
    async fn probe_privilege(&self) -> Result<(), ExecError> {
        self.inner.probe_privilege().await
    }
}
