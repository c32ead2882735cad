use ipt_core::Settings;
use ipt_exec::{Capability, CommandRunner, FirewallControl, FirewallReader, RulesFiles};
use ipt_metrics::MetricsCollector;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    runner: Arc<dyn CommandRunner>,
    settings: Arc<Settings>,
    metrics: Arc<MetricsCollector>,
    // Serializes mutations; rule positions shift under concurrent edits.
    mutations: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        settings: Settings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            runner,
            settings: Arc::new(settings),
            metrics,
            mutations: Arc::new(Mutex::new(())),
        }
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn reader(&self, capability: Option<Capability>) -> FirewallReader<'_> {
        FirewallReader::new(self.runner(), capability)
    }

    pub fn control(&self, capability: Capability) -> FirewallControl<'_> {
        FirewallControl::new(
            self.runner(),
            capability,
            RulesFiles::from_settings(&self.settings),
        )
    }

    pub async fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.mutations.lock().await
    }
}
