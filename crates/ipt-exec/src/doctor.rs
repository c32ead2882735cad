use serde::Serialize;
use std::fmt;

use crate::privilege::Capability;
use crate::runner::{CommandRunner, Invocation, Tool};

/// Severity level for a preflight finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticLevel::Info => "INFO",
            DiagnosticLevel::Warning => "WARN",
            DiagnosticLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticResult {
    pub level: DiagnosticLevel,
    pub title: String,
    pub details: String,
    pub suggestion: Option<String>,
}

impl DiagnosticResult {
    pub fn new(level: DiagnosticLevel, title: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            details: details.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for DiagnosticResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}\n  {}", self.level, self.title, self.details)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

/// Check that every tool answers `--version` and that elevation works.
pub async fn preflight(runner: &dyn CommandRunner) -> Vec<DiagnosticResult> {
    let mut results = Vec::new();

    for tool in Tool::ALL {
        let invocation = Invocation::plain(tool, vec!["--version".into()]);
        match runner.run(&invocation).await {
            Ok(version) => results.push(DiagnosticResult::new(
                DiagnosticLevel::Info,
                format!("{} found", tool.label()),
                version.lines().next().unwrap_or("").trim().to_string(),
            )),
            Err(e) => results.push(
                DiagnosticResult::new(
                    DiagnosticLevel::Error,
                    format!("{} not usable", tool.label()),
                    e.to_string(),
                )
                .with_suggestion("Install the iptables package or fix the path in iptweb.yaml"),
            ),
        }
    }

    match Capability::acquire(runner).await {
        Ok(_) => results.push(DiagnosticResult::new(
            DiagnosticLevel::Info,
            "Privilege probe passed",
            "Mutating endpoints are available",
        )),
        Err(e) => results.push(
            DiagnosticResult::new(
                DiagnosticLevel::Warning,
                "Privilege probe failed",
                format!("{} - every mutating endpoint will answer 403", e),
            )
            .with_suggestion("Grant passwordless sudo for the iptables binaries, or run as root with `elevation: none`"),
        ),
    }

    results
}

pub fn has_errors(results: &[DiagnosticResult]) -> bool {
    results.iter().any(|r| r.level >= DiagnosticLevel::Error)
}
