use std::path::PathBuf;

use clap::Parser;
use duelhost::prelude::*;
use tracing_subscriber::EnvFilter;

/// Card-game duel session server.
#[derive(Debug, Parser)]
#[command(name = "duelhost-server", version)]
struct Args {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listen address, overriding the config file.
    #[arg(long)]
    bind: Option<String>,

    /// Log filter used when RUST_LOG is unset, overriding the config file.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn load_config(&self) -> Result<ServerConfig, DuelhostError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = &self.bind {
            config.bind_addr = bind.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok(config)
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = args.load_config()?;
    init_tracing(&config.log_level);

    let builder = DuelhostServerBuilder::from_config(&config);
    let builder = match &config.redis_url {
        Some(url) => builder.repository(RedisMatchRepository::connect(url).await?),
        None => {
            tracing::warn!("no redis_url configured, match records are kept in memory");
            builder.repository(InMemoryMatchRepository::new())
        }
    };

    let server = builder.build().await?;
    tracing::info!(
        addr = %config.bind_addr,
        engine = %config.engine.program.display(),
        "starting duelhost"
    );
    server.run().await?;
    Ok(())
}
