use clap::Parser;
use imhelper::cli::{CliArgs, CliHandler, CliResult, Commands};
use imhelper::config::{BridgeConfig, get_config_path};
use imhelper::logging;
use std::path::PathBuf;
use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = CliArgs::parse();

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => get_config_path().unwrap_or_else(|_| PathBuf::from(".imhelper/config.toml")),
    };

    // Load configuration, falling back to defaults so `config init` can repair it
    let config = match BridgeConfig::load_from_path(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Failed to load configuration ({e}), using defaults");
            BridgeConfig::default()
        }
    };

    let logging_result = match args.command {
        Commands::Watch { .. } => logging::init_watch_logging(&config),
        _ => logging::init_cli_logging(&config, args.verbose),
    };
    if let Err(e) = logging_result {
        eprintln!("Warning: Failed to initialize logging: {e}");
    }

    let mut handler = CliHandler::new(config, config_path)
        .with_socket(args.socket)
        .with_verbose(args.verbose);

    let result = match handler.handle_command(args.command).await {
        Ok(result) => result,
        Err(e) => CliResult::Error(format!("Failed to execute command: {e}")),
    };

    // Print result and set exit code
    match result {
        CliResult::Success(msg) => {
            println!("{msg}");
            process::exit(0);
        }
        CliResult::Error(msg) => {
            eprintln!("{msg}");
            process::exit(1);
        }
    }
}
