use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use std::path::PathBuf;
use std::sync::Once;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, registry::Registry};

static LOGGER_INIT: Once = Once::new();

/// Initialize the logging system for a specific component
fn init_component_logging(
    config: &BridgeConfig,
    component: &str,
    log_to_stderr: bool,
) -> Result<()> {
    let mut init_result = Ok(());

    LOGGER_INIT.call_once(|| {
        init_result = init_component_logging_internal(config, component, log_to_stderr);
    });

    init_result
}

/// Internal logging initialization (only called once)
fn init_component_logging_internal(
    config: &BridgeConfig,
    component: &str,
    log_to_stderr: bool,
) -> Result<()> {
    let log_level = config.logging.level.to_lowercase();

    let log_dir = if config.logging.file_enabled {
        let log_dir = config.get_log_dir();
        std::fs::create_dir_all(&log_dir).map_err(|e| {
            BridgeError::ConfigError(format!("Failed to create log directory: {e}"))
        })?;
        Some(log_dir)
    } else {
        None
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .map_err(|e| BridgeError::ConfigError(format!("Invalid log level '{log_level}': {e}")))?;

    let registry = Registry::default().with(filter);
    let file_name = format!("{component}.log");

    let installed = match (log_dir.as_ref(), log_to_stderr) {
        (Some(dir), true) => {
            let file_layer = fmt::layer()
                .with_writer(tracing_appender::rolling::never(dir, &file_name))
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            let stderr_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false);

            registry.with(file_layer).with(stderr_layer).try_init()
        }
        (Some(dir), false) => {
            let file_layer = fmt::layer()
                .with_writer(tracing_appender::rolling::never(dir, &file_name))
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);

            registry.with(file_layer).try_init()
        }
        (None, true) => {
            let stderr_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false);

            registry.with(stderr_layer).try_init()
        }
        (None, false) => {
            return Err(BridgeError::ConfigError(
                "File logging must be enabled for components that don't log to stderr"
                    .to_string(),
            ));
        }
    };
    installed.map_err(|e| BridgeError::ConfigError(format!("Failed to install subscriber: {e}")))?;

    info!("{} logging initialized with level: {}", component, log_level);
    if let Some(dir) = log_dir {
        info!("Log file: {}", dir.join(file_name).display());
    }

    Ok(())
}

/// Initialize logging for the long-running `watch` bridge
pub fn init_watch_logging(config: &BridgeConfig) -> Result<()> {
    init_component_logging(config, "watch", true)?;
    debug!("Watch logging initialized");
    Ok(())
}

/// Initialize logging for one-shot CLI commands
pub fn init_cli_logging(config: &BridgeConfig, verbose: bool) -> Result<()> {
    let mut cli_config = config.clone();

    // Quiet unless asked for more
    if verbose {
        cli_config.logging.level = "debug".to_string();
    } else if !matches!(
        cli_config.logging.level.to_lowercase().as_str(),
        "debug" | "trace"
    ) {
        cli_config.logging.level = "warn".to_string();
    }

    init_component_logging(&cli_config, "cli", true)?;
    debug!("CLI logging initialized");
    Ok(())
}

/// Resolve the file a component would log to, if file logging is on
pub fn component_log_file(config: &BridgeConfig, component: &str) -> Option<PathBuf> {
    config
        .logging
        .file_enabled
        .then(|| config.get_log_dir().join(format!("{component}.log")))
}

/// Log a structured message for helper connection events
pub fn log_helper_event(event: &str, details: &str) {
    info!(target: "helper", event = event, details = details);
}

/// Log a structured message for per-session actions
pub fn log_session_event(session: &str, event: &str, details: &str) {
    debug!(target: "session", session = session, event = event, details = details);
}

/// Log an error with context
pub fn log_error(component: &str, error: &str, context: Option<&str>) {
    if let Some(ctx) = context {
        error!(component = component, error = error, context = ctx);
    } else {
        error!(component = component, error = error);
    }
}

/// Log a warning with context
pub fn log_warning(component: &str, warning: &str, context: Option<&str>) {
    if let Some(ctx) = context {
        warn!(component = component, warning = warning, context = ctx);
    } else {
        warn!(component = component, warning = warning);
    }
}

/// Log debug information
pub fn log_debug(component: &str, message: &str, context: Option<&str>) {
    if let Some(ctx) = context {
        debug!(component = component, message = message, context = ctx);
    } else {
        debug!(component = component, message = message);
    }
}
