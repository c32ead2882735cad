//! Execution port for the iptables tool family.
//!
//! Everything that spawns a process goes through [`CommandRunner`]. Production
//! code uses [`SystemRunner`]; tests substitute a scripted runner that answers
//! with fixture text.

use async_trait::async_trait;
use ipt_core::{Elevation, Settings};
use std::fmt;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::ExecError;
use crate::privilege::Capability;

/// Which binary an invocation targets. Paths come from [`Settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Iptables,
    Save,
    Restore,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Iptables, Tool::Save, Tool::Restore];

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Iptables => "iptables",
            Tool::Save => "iptables-save",
            Tool::Restore => "iptables-restore",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: Tool,
    pub args: Vec<String>,
    /// Set only when a [`Capability`] was presented.
    pub elevated: bool,
}

impl Invocation {
    /// Run with the server's own rights.
    pub fn plain(tool: Tool, args: Vec<String>) -> Self {
        Self {
            tool,
            args,
            elevated: false,
        }
    }

    /// Run with elevated rights, proven by the capability.
    pub fn elevated(tool: Tool, args: Vec<String>, _capability: &Capability) -> Self {
        Self {
            tool,
            args,
            elevated: true,
        }
    }

    pub fn with_capability(tool: Tool, args: Vec<String>, capability: Option<&Capability>) -> Self {
        match capability {
            Some(cap) => Self::elevated(tool, args, cap),
            None => Self::plain(tool, args),
        }
    }

    /// The first argument, used as the metrics verb (`-A`, `-L`, `-f`, ...).
    pub fn verb(&self) -> &str {
        self.args
            .iter()
            .find(|a| a.starts_with('-') && a.as_str() != "-t")
            .map(String::as_str)
            .unwrap_or("-")
    }
}

/// Logical form, `sudo` marking elevation. [`SystemRunner`] reports the
/// concrete command line it spawns instead.
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elevated {
            f.write_str("sudo ")?;
        }
        f.write_str(self.tool.label())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the invocation to completion and return its stdout.
    ///
    /// A non-zero exit status is an error.
    async fn run(&self, invocation: &Invocation) -> Result<String, ExecError>;

    /// Check whether elevated invocations are possible right now.
    async fn probe_privilege(&self) -> Result<(), ExecError>;
}

/// Spawns the configured binaries with `tokio::process`.
pub struct SystemRunner {
    iptables: String,
    iptables_save: String,
    iptables_restore: String,
    elevation: Elevation,
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            iptables: settings.iptables.clone(),
            iptables_save: settings.iptables_save.clone(),
            iptables_restore: settings.iptables_restore.clone(),
            elevation: settings.elevation,
            timeout: settings.command_timeout_secs.map(Duration::from_secs),
        }
    }

    fn program(&self, tool: Tool) -> &str {
        match tool {
            Tool::Iptables => &self.iptables,
            Tool::Save => &self.iptables_save,
            Tool::Restore => &self.iptables_restore,
        }
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let program = self.program(invocation.tool);
        let mut cmd = if invocation.elevated && self.elevation == Elevation::Sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg("-n").arg(program);
            cmd
        } else {
            Command::new(program)
        };
        cmd.args(&invocation.args).kill_on_drop(true);
        cmd
    }

    async fn output(&self, mut cmd: Command, command: &str) -> Result<std::process::Output, ExecError> {
        let spawn_err = |source: std::io::Error| ExecError::Spawn {
            command: command.to_string(),
            source,
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| ExecError::Timeout {
                    command: command.to_string(),
                    secs: limit.as_secs(),
                })?
                .map_err(spawn_err),
            None => cmd.output().await.map_err(spawn_err),
        }
    }
}

/// The program and arguments exactly as they will be spawned.
fn command_line(cmd: &Command) -> String {
    let std = cmd.as_std();
    std::iter::once(std.get_program())
        .chain(std.get_args())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<String, ExecError> {
        let cmd = self.command(invocation);
        let command = command_line(&cmd);
        debug!(%command, "running");

        let output = self.output(cmd, &command).await?;

        if !output.status.success() {
            return Err(ExecError::Exit {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn probe_privilege(&self) -> Result<(), ExecError> {
        if self.elevation == Elevation::None {
            return Ok(());
        }

        let mut cmd = Command::new("sudo");
        cmd.arg("-n").arg("true").kill_on_drop(true);

        match self.output(cmd, "sudo -n true").await {
            Ok(output) if output.status.success() => Ok(()),
            Ok(_) => Err(ExecError::PrivilegeDenied),
            Err(e) => {
                debug!("privilege probe failed: {}", e);
                Err(ExecError::PrivilegeDenied)
            }
        }
    }
}
