
use crate::bridge::{BridgeHandle, Collaborators, HelperBridge};
use crate::cli::commands::{CliResult, Commands, ConfigAction};
use crate::config::BridgeConfig;
use crate::connection::{ConnectionManager, ConnectionState, HelperSpawner, UnixConnector};
use crate::dispatch::{Delivery, MessageSink};
use crate::error::Result;
use crate::protocol::OutboundMessage;
use crate::session::{
    MemoryFocusTracker, MemoryRegistry, MemorySession, SessionId, SessionRegistry, StaticCatalog,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Executes `imhelper` subcommands against the loaded configuration
pub struct CliHandler {
    pub config: BridgeConfig,
    pub config_path: PathBuf,
    pub socket_override: Option<PathBuf>,
    pub verbose: bool,
}

impl CliHandler {
    pub fn new(config: BridgeConfig, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
            socket_override: None,
            verbose: false,
        }
    }

    pub fn with_socket(mut self, socket_path: Option<PathBuf>) -> Self {
        self.socket_override = socket_path;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// `--socket`, then the config file, then the per-user default
    pub fn socket_path(&self) -> PathBuf {
        self.socket_override
            .clone()
            .unwrap_or_else(|| self.config.resolve_socket_path())
    }

    /// Main entry point for handling CLI commands
    pub async fn handle_command(&mut self, command: Commands) -> Result<CliResult> {
        match command {
            Commands::Watch {
                sessions,
                input_method,
            } => {
                self.watch(sessions, input_method.as_deref(), async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::warn!("Failed to listen for Ctrl-C: {e}");
                        std::future::pending::<()>().await;
                    }
                })
                .await
            }
            Commands::Send { command, args } => self.send_raw(&command, &args),
            Commands::ImList { selected } => Ok(self.im_list(selected.as_deref())),
            Commands::Config { action } => self.handle_config(action).await,
        }
    }

    /// Run the bridge with in-memory sessions until `shutdown` resolves
    pub async fn watch<F>(
        &self,
        sessions: u64,
        input_method: Option<&str>,
        shutdown: F,
    ) -> Result<CliResult>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let initial = input_method
            .map(str::to_string)
            .or_else(|| self.config.input_methods.first().map(|im| im.name.clone()))
            .unwrap_or_else(|| "direct".to_string());

        let focus = Arc::new(MemoryFocusTracker::new());
        let registry = Arc::new(MemoryRegistry::new());
        for id in 1..=sessions {
            registry.add(MemorySession::new(SessionId(id), &initial).into_handle());
        }
        let catalog = Arc::new(StaticCatalog::new(self.config.input_methods.clone()));

        let spawner = HelperSpawner::from_config(&self.config.helper)?;
        let socket_path = self.socket_path();
        info!("Watching helper socket {}", socket_path.display());
        if self.verbose {
            eprintln!("Connecting to helper at {}", socket_path.display());
        }

        let (bridge, handle) = HelperBridge::unix(
            socket_path,
            spawner,
            Collaborators::new(focus.clone(), registry.clone(), catalog),
        );

        if let Some(first) = registry.all().first() {
            focus.focus(first.clone());
            handle.focus_in(first.id());
        }

        let ticker = tokio::spawn(reconnect_ticker(
            handle.clone(),
            self.config.helper.reconnect_interval(),
        ));
        let stopper = {
            let handle = handle.clone();
            tokio::spawn(async move {
                shutdown.await;
                handle.shutdown();
            })
        };
        drop(handle);

        let stats = bridge.run().await;
        ticker.abort();
        stopper.abort();

        Ok(CliResult::Success(format!(
            "Bridge stopped\n{}",
            serde_json::to_string_pretty(&stats)?
        )))
    }

    /// Send one raw record and disconnect
    fn send_raw(&self, command: &str, args: &[String]) -> Result<CliResult> {
        let message = OutboundMessage::raw(command, args)?;
        let socket_path = self.socket_path();

        // Nothing is read back, so no watcher needs to receive events
        let (events, _) = tokio::sync::mpsc::unbounded_channel();
        let mut connection = ConnectionManager::new(UnixConnector::new(socket_path.clone(), &events));

        if connection.ensure_connected() == ConnectionState::Disconnected {
            return Ok(CliResult::Error(format!(
                "Helper daemon is not reachable at {}",
                socket_path.display()
            )));
        }

        match connection.send(&message) {
            Delivery::Sent => Ok(CliResult::Success(format!("Sent {command}"))),
            Delivery::Dropped => Ok(CliResult::Error(format!(
                "Failed to send {command} to the helper daemon"
            ))),
        }
    }

    fn im_list(&self, selected: Option<&str>) -> CliResult {
        if let Some(name) = selected {
            if !self.config.input_methods.iter().any(|im| im.name == name) {
                return CliResult::Error(format!("Unknown input method: {name}"));
            }
        }

        let message = OutboundMessage::im_list(self.config.input_methods.clone(), selected);
        CliResult::Success(message.encode().trim_end().to_string())
    }

    async fn handle_config(&self, action: ConfigAction) -> Result<CliResult> {
        match action {
            ConfigAction::Init { force } => {
                if self.config_path.exists() && !force {
                    return Ok(CliResult::Error(format!(
                        "Configuration already exists at {} (use --force to overwrite)",
                        self.config_path.display()
                    )));
                }

                BridgeConfig::default().save_to_path(&self.config_path).await?;
                Ok(CliResult::Success(format!(
                    "Wrote default configuration to {}",
                    self.config_path.display()
                )))
            }
            ConfigAction::Show { json } => {
                let rendered = if json {
                    serde_json::to_string_pretty(&self.config)?
                } else {
                    toml::to_string_pretty(&self.config)?
                };
                Ok(CliResult::Success(rendered.trim_end().to_string()))
            }
            ConfigAction::Path => Ok(CliResult::Success(self.config_path.display().to_string())),
        }
    }
}

/// Ask the bridge to reconnect on every tick until it stops listening
async fn reconnect_ticker(handle: BridgeHandle, period: std::time::Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately and the bridge connects on start
    interval.tick().await;

    loop {
        interval.tick().await;
        if !handle.reconnect() {
            break;
        }
    }
}
