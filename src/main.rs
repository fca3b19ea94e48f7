use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;

use prometheus_slurm_sd::common::config::{Overrides, load_config};
use prometheus_slurm_sd::server::server::{server_start, wait_for_signal};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Prometheus service discovery for Slurm clusters
#[derive(Debug, Parser)]
#[command(name = "prometheus-slurm-sd", version)]
struct Args {
    /// Config file path
    #[arg(long = "config.file", default_value = "config.yaml")]
    config_file: String,

    /// Log level; RUST_LOG takes precedence when set
    #[arg(long = "log.level", value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Address to listen on for HTTP requests
    #[arg(long = "web.listen-address")]
    listen_address: Option<String>,

    /// Slurm REST API endpoint
    #[arg(long = "slurm.api-endpoint")]
    slurm_api_endpoint: Option<String>,

    /// Slurm REST API version
    #[arg(long = "slurm.api-version")]
    slurm_api_version: Option<String>,

    /// Slurm REST API username
    #[arg(long = "slurm.api-username")]
    slurm_api_username: Option<String>,

    /// Slurm REST API token
    #[arg(long = "slurm.api-token")]
    slurm_api_token: Option<String>,

    /// Update interval for fetching Slurm data, e.g. 30s or 5m
    #[arg(long = "update.interval")]
    update_interval: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level.as_filter()))
        .init();

    let mut config = match load_config(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load config {}: {}", args.config_file, e);
            std::process::exit(1);
        }
    };
    config.apply_overrides(Overrides {
        listen_address: args.listen_address,
        slurm_api_endpoint: args.slurm_api_endpoint,
        slurm_api_version: args.slurm_api_version,
        slurm_api_username: args.slurm_api_username,
        slurm_api_token: args.slurm_api_token,
        update_interval: args.update_interval,
    });
    if let Err(e) = config.validate() {
        log::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    if let Err(e) = server_start(config, shutdown).await {
        log::error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}
