use std::sync::Arc;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gator::cli::Cli;
use gator::commands::{self, State};
use gator::config::Config;
use gator::db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load_or_default(&cli.config)?;
    debug!("Loaded configuration from {}", cli.config.display());

    // Initialize database
    let db = Database::new(&config.db_url).await?;
    db.initialize().await?;

    let mut state = State::new(Arc::new(db), config, cli.config);
    commands::run(&mut state, cli.command).await
}
