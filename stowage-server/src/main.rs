mod config;
mod server;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use server::run_server;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "stowage")]
#[command(about = "Base64 blob storage over filesystem, SQLite, S3 or FTP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Server {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stowage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server { config } => {
            tracing::info!("Starting Stowage server with config: {}", config);

            let cfg = Config::from_file(&config)
                .with_context(|| format!("failed to load config {}", config))?;

            tracing::info!(
                "Backend: {}, Bind: {}, Database: {:?}",
                cfg.storage.backend.as_str(),
                cfg.bind_addr,
                cfg.database.path
            );

            run_server(cfg).await.context("server error")?;
        }
    }

    Ok(())
}
