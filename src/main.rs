use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use ephemeral_store::config::{Overrides, ServerConfig};
use ephemeral_store::server;

#[derive(Parser, Debug)]
#[command(name = "ephemeral-store", version)]
#[command(about = "Ephemeral key-value store for IoT values")]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "EPHEMERAL_STORE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "EPHEMERAL_STORE_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "EPHEMERAL_STORE_BIND")]
    bind: Option<String>,

    /// Directory holding the store
    #[arg(long, env = "EPHEMERAL_STORE_PATH")]
    store: Option<PathBuf>,

    /// Retention after the last write, e.g. 24h, 90m, 1h30m
    #[arg(long, env = "EPHEMERAL_STORE_PERSIST_FOR")]
    persist_values_for: Option<String>,

    /// Keep records in memory only
    #[arg(long, env = "EPHEMERAL_STORE_IN_MEMORY")]
    in_memory: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "EPHEMERAL_STORE_LOG_FORMAT")]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port,
            bind: self.bind.clone(),
            store_path: self.store.clone(),
            persist_for: self.persist_values_for.clone(),
            in_memory: self.in_memory,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = ServerConfig::resolve(cli.config.as_deref(), cli.overrides())?;
    server::serve(config).await
}

fn init_logging(format: LogFormat) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}
