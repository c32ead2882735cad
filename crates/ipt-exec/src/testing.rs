//! Scripted [`CommandRunner`] for tests.
//!
//! Answers invocations with canned stdout keyed by tool and arguments, and
//! records every call so tests can assert on the exact command lines issued.
//! Unscripted invocations succeed with empty output.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::ExecError;
use crate::runner::{CommandRunner, Invocation, Tool};

#[derive(Debug, Default)]
struct Script {
    responses: HashMap<(Tool, Vec<String>), Result<String, String>>,
    calls: Vec<Invocation>,
    denied: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    script: Arc<Mutex<Script>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner whose privilege probe always fails.
    pub fn unprivileged() -> Self {
        let runner = Self::default();
        runner.lock().denied = true;
        runner
    }

    pub fn respond(&self, tool: Tool, args: &[&str], stdout: &str) -> &Self {
        self.lock()
            .responses
            .insert(key(tool, args), Ok(stdout.to_string()));
        self
    }

    pub fn fail(&self, tool: Tool, args: &[&str], stderr: &str) -> &Self {
        self.lock()
            .responses
            .insert(key(tool, args), Err(stderr.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.lock().calls.clone()
    }

    /// Recorded calls rendered as `tool arg arg ...`, without the sudo prefix.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|inv| {
                std::iter::once(inv.tool.label().to_string())
                    .chain(inv.args)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn key(tool: Tool, args: &[&str]) -> (Tool, Vec<String>) {
    (tool, args.iter().map(|a| a.to_string()).collect())
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<String, ExecError> {
        let mut script = self.lock();
        script.calls.push(invocation.clone());

        match script
            .responses
            .get(&(invocation.tool, invocation.args.clone()))
        {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(stderr)) => Err(ExecError::Exit {
                command: invocation.to_string(),
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            }),
            None => Ok(String::new()),
        }
    }

    async fn probe_privilege(&self) -> Result<(), ExecError> {
        if self.lock().denied {
            Err(ExecError::PrivilegeDenied)
        } else {
            Ok(())
        }
    }
}
