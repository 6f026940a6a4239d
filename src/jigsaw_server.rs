// src/jigsaw_server.rs
//
// Jigsaw arena server: pairs players into rooms, serves the shared piece
// stream and arbitrates every round.
//
// Operator controls:
// - Ctrl-C: stop the server
// - "stop" on stdin: stop the server
//
// CLI Options override the values read from the configuration file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use jigsaw_arena::archive::{JsonFileArchive, MemoryArchive, ResultArchive};
use jigsaw_arena::config::{SERVER_CONFIG_PATH, ServerConfig, parse_players};
use jigsaw_arena::error::ConfigError;
use jigsaw_arena::logging::{LogLevel, log_error_stderr, log_info, log_warning, set_min_level};
use jigsaw_arena::server::start_server;

#[derive(Parser)]
#[command(name = env!("CARGO_BIN_NAME"))]
#[command(about = "Jigsaw Arena Server - matchmaking and round arbitration for jigsaw players")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Configuration file to read
    #[arg(long, default_value = SERVER_CONFIG_PATH)]
    config: PathBuf,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port for player connections
    #[arg(long)]
    port: Option<u16>,

    /// Players per room (1 or 2)
    #[arg(long)]
    players: Option<String>,

    /// Round length in seconds
    #[arg(long)]
    round_seconds: Option<u64>,

    /// Port for the HTTP status endpoint
    #[arg(long)]
    status_port: Option<u16>,

    /// Result archive file
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Keep results in memory only
    #[arg(long)]
    memory: bool,

    /// Leaderboard size
    #[arg(long)]
    top_count: Option<usize>,

    /// Maximum simultaneous player connections
    #[arg(long)]
    max_connections: Option<usize>,

    /// Minimum log level (debug, info, warning, error)
    #[arg(long)]
    log_level: Option<LogLevel>,
}

fn load_config(args: &Args) -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::load_or_default(&args.config)?;

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(players) = &args.players {
        config.players = parse_players(players)?;
    }
    if let Some(round_seconds) = args.round_seconds {
        config.round_seconds = round_seconds;
    }
    if let Some(status_port) = args.status_port {
        config.status_port = Some(status_port);
    }
    if let Some(archive) = &args.archive {
        config.archive_path = archive.clone();
    }
    if let Some(top_count) = args.top_count {
        config.top_count = top_count;
    }
    if let Some(max_connections) = args.max_connections {
        config.max_connections = max_connections;
    }
    if let Some(log_level) = args.log_level {
        config.log_level = log_level;
    }

    config.validate()?;
    Ok(config)
}

/// Resolves on Ctrl-C or when the operator types "stop"
async fn wait_for_stop() {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut signal_armed = true;

    loop {
        if !signal_armed && !stdin_open {
            log_warning("Neither Ctrl-C nor stdin is available; running until killed");
            std::future::pending::<()>().await;
        }
        tokio::select! {
            signal = &mut ctrl_c, if signal_armed => match signal {
                Ok(()) => {
                    log_info("Interrupted");
                    return;
                }
                Err(e) => {
                    log_warning(&format!("Could not listen for Ctrl-C: {e}"));
                    signal_armed = false;
                }
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().eq_ignore_ascii_case("stop") => return,
                Ok(Some(line)) if !line.trim().is_empty() => {
                    log_info(&format!("Unknown command '{}'; type 'stop' to shut down", line.trim()));
                }
                Ok(Some(_)) => {}
                // detached from a terminal: only the signal can stop us now
                Ok(None) | Err(_) => stdin_open = false,
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log_error_stderr(&format!("Invalid configuration: {e}"));
            return ExitCode::FAILURE;
        }
    };
    set_min_level(config.log_level);

    let archive: Arc<dyn ResultArchive> = if args.memory {
        log_info("Results are kept in memory only");
        Arc::new(MemoryArchive::new())
    } else {
        match JsonFileArchive::open(&config.archive_path) {
            Ok(archive) => {
                log_info(&format!("Archiving results to {}", archive.path().display()));
                Arc::new(archive)
            }
            Err(e) => {
                log_error_stderr(&format!(
                    "Cannot use result archive {}: {e}",
                    config.archive_path.display()
                ));
                return ExitCode::FAILURE;
            }
        }
    };

    let server = match start_server(config, archive).await {
        Ok(server) => server,
        Err(e) => {
            log_error_stderr(&format!("Failed to start arena server: {e}"));
            return ExitCode::FAILURE;
        }
    };

    wait_for_stop().await;

    server.shutdown();
    server.stopped().await;
    log_info("Arena server stopped.");
    ExitCode::SUCCESS
}
