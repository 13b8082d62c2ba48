//! SFTP server binary
//!
//! NIST 800-53: AU-9 (Protection of Audit Information), AU-12 (Audit
//! Generation)
//! Implementation: CLI bootstrap with JSON logging for SIEM integration
//!
//! Run with: cargo run --bin wharf-sftp-server

use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wharf_sftp::{AuditSink, Config, LogFormat, Server};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(short, long, default_value = "2222")]
    port: u16,

    /// Base directory for user home directories
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// User accounts file
    #[arg(short, long)]
    users: Option<PathBuf>,

    /// Host key path
    #[arg(long)]
    host_key: Option<PathBuf>,

    /// Audit log path
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Verbose logging (debug level, per-packet trace)
    #[arg(short, long)]
    verbose: bool,

    /// Log format (json or text)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Log file path
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = if let Some(config_path) = args.config {
        match Config::from_file(&config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    config.bind_address = args.bind;
    config.port = args.port;
    config.verbose = args.verbose;
    if let Some(root) = args.root {
        config.root_dir = root;
    }
    if let Some(users) = args.users {
        config.users_file = users;
    }
    if let Some(host_key) = args.host_key {
        config.host_key_path = host_key;
    }
    if let Some(audit_log) = args.audit_log {
        config.audit_log = audit_log;
    }
    if let Some(log_format) = args.log_format {
        config.logging.format = log_format;
    }
    if let Some(log_file) = args.log_file {
        config.logging.file = Some(log_file);
    }
    if args.verbose {
        config.logging.level = "debug".to_string();
    }

    let _log_guard = init_logging(&mut config);

    info!(
        event = "server_starting",
        version = env!("CARGO_PKG_VERSION"),
        "Starting Wharf SFTP server"
    );

    if !config.root_dir.exists() {
        if let Err(e) = std::fs::create_dir_all(&config.root_dir) {
            error!(
                event = "root_directory_creation_failed",
                directory = ?config.root_dir,
                error = %e,
                "Failed to create base directory"
            );
            std::process::exit(1);
        }
    }

    info!(
        event = "server_configuration",
        bind_address = %config.bind_address,
        port = config.port,
        root_dir = ?config.root_dir,
        users_file = ?config.users_file,
        audit_log = ?config.audit_log,
        max_connections = config.max_connections,
        idle_timeout_secs = config.idle_timeout_secs,
        max_upload_bytes = config.max_upload_bytes,
        "Server configuration"
    );

    let (audit, audit_writer) = AuditSink::spawn(config.audit_log.clone());

    let server = match Server::new(config, audit).await {
        Ok(s) => s,
        Err(e) => {
            error!(
                event = "server_creation_failed",
                error = %e,
                "Failed to create server"
            );
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(event = "signal_received", "Interrupt received, shutting down");
            signal_token.cancel();
        }
    });

    if let Err(e) = server.run(shutdown).await {
        error!(
            event = "server_error",
            error = %e,
            "Server encountered an error"
        );
        std::process::exit(1);
    }

    // Let the audit writer drain before exiting; sessions still alive
    // hold producer handles, so bound the wait.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), audit_writer).await;

    info!(event = "server_stopped", "SFTP server shutdown complete");
}

/// Initialize tracing with optional file appender; returns the appender
/// guard that must stay alive for the process lifetime.
fn init_logging(config: &mut Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if let Some(log_file) = config.logging.file.clone() {
        if let Some(parent) = log_file.parent() {
            if !parent.exists() && std::fs::create_dir_all(parent).is_err() {
                eprintln!("Warning: failed to create log directory, logging to stderr");
                config.logging.file = None;
            }
        }

        if config.logging.file.is_some() {
            let directory = log_file.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file_name = log_file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "wharf-sftp.log".to_string());
            let file_appender = tracing_appender::rolling::daily(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            match config.logging.format {
                LogFormat::Json => {
                    tracing_subscriber::fmt()
                        .json()
                        .with_env_filter(EnvFilter::new(config.logging.level.clone()))
                        .with_writer(non_blocking)
                        .init();
                }
                LogFormat::Text => {
                    tracing_subscriber::fmt()
                        .with_env_filter(EnvFilter::new(config.logging.level.clone()))
                        .with_writer(non_blocking)
                        .init();
                }
            }
            return Some(guard);
        }
    }

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(EnvFilter::new(config.logging.level.clone()))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(config.logging.level.clone()))
                .init();
        }
    }
    None
}
