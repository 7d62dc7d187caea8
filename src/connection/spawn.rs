use crate::config::HelperConfig;
use crate::error::{BridgeError, Result};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

/// Starts the helper server when nothing is listening on the socket.
///
/// Spawning is fire-and-forget: the caller never waits for the server to
/// come up, the next connect attempt simply finds it (or not).
#[derive(Debug)]
pub struct HelperSpawner {
    argv: Vec<String>,
    cooldown: Duration,
    last_spawn: Option<Instant>,
}

impl HelperSpawner {
    /// Create a spawner for a shell-style command line
    pub fn new(command_line: &str, cooldown: Duration) -> Result<Self> {
        let argv = shlex::split(command_line)
            .filter(|argv| !argv.is_empty())
            .ok_or_else(|| {
                BridgeError::ConfigError(format!("Invalid helper server command: {command_line}"))
            })?;

        Ok(Self {
            argv,
            cooldown,
            last_spawn: None,
        })
    }

    /// Spawner for the configured server, or `None` when auto-spawn is off
    pub fn from_config(config: &HelperConfig) -> Result<Option<Self>> {
        if !config.auto_spawn {
            return Ok(None);
        }
        Self::new(&config.server_command, config.spawn_cooldown()).map(Some)
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether a spawn attempted now would be skipped
    pub fn cooling_down(&self) -> bool {
        self.last_spawn
            .is_some_and(|last| last.elapsed() < self.cooldown)
    }

    /// Spawn the server unless one was attempted within the cooldown.
    ///
    /// Returns whether a process was started. A failed attempt still starts
    /// the cooldown.
    pub fn maybe_spawn(&mut self) -> Result<bool> {
        if self.cooling_down() {
            debug!("Helper server spawn skipped, still cooling down");
            return Ok(false);
        }
        self.last_spawn = Some(Instant::now());

        let child = self.create_command().spawn().map_err(|e| {
            BridgeError::SpawnError(format!("Failed to spawn {}: {e}", self.program()))
        })?;

        info!(
            "Helper server spawned: {} (pid {:?})",
            self.program(),
            child.id()
        );

        // Detached: the runtime reaps the child once it exits
        drop(child);
        Ok(true)
    }

    /// Create command for the helper server (extracted for testing)
    pub fn create_command(&self) -> Command {
        let mut cmd = Command::new(self.program());
        cmd.args(self.args())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .stdin(Stdio::null());
        cmd
    }
}
