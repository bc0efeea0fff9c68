use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use aggregator_core::{Aggregator, Config, ProviderConfig, ProviderId, StatsCollector};
use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, Text};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    api::{self, AppState},
    telemetry::LogFormat,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "aggregator", version, about = "Location weather and news aggregator")]
pub struct Cli {
    /// Config file; defaults to the platform config directory.
    #[arg(long, global = true, env = "AGGREGATOR_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty, env = "AGGREGATOR_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service.
    Serve {
        /// Listen address, overriding `[server] bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Aggregate one location and print the result as JSON.
    Aggregate {
        /// Place name, e.g. "Athens".
        location: String,

        /// News search terms; defaults to the resolved place name.
        #[arg(long)]
        news_query: Option<String>,
    },

    /// Configure credentials and thresholds for a provider.
    Configure {
        /// Provider short name: geocoding, openweather, newsapi or weatherstack.
        provider: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command {
            Command::Serve { bind } => serve(&path, bind).await,
            Command::Aggregate { location, news_query } => {
                aggregate_once(&path, &location, news_query.as_deref()).await
            }
            Command::Configure { provider } => configure(&path, &provider),
        }
    }
}

fn load_validated(path: &Path) -> anyhow::Result<(Config, Aggregator, Arc<StatsCollector>)> {
    let config = Config::load_from(path)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    let stats = Arc::new(StatsCollector::new(config.thresholds()));
    let aggregator = Aggregator::from_config(&config, Arc::clone(&stats))?;

    Ok((config, aggregator, stats))
}

async fn serve(path: &Path, bind: Option<String>) -> anyhow::Result<()> {
    let (config, aggregator, stats) = load_validated(path)?;
    let bind = bind.unwrap_or(config.server.bind);

    let state = AppState { aggregator: Arc::new(aggregator), stats };
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    info!(addr = %bind, "aggregator listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("HTTP server failed")
}

async fn aggregate_once(
    path: &Path,
    location: &str,
    news_query: Option<&str>,
) -> anyhow::Result<()> {
    let (_, aggregator, _) = load_validated(path)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match aggregator.aggregate(location, news_query, &cancel).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(err) => Err(anyhow!("{} ({})", err.message, err.code)),
    }
}

fn configure(path: &Path, provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load_from(path)?;

    let current = config
        .provider_config(id)
        .cloned()
        .unwrap_or_else(|| ProviderConfig::with_defaults(id, String::new()));

    let base_url = Text::new("Base URL:").with_default(&current.base_url).prompt()?;

    let api_key = Password::new(&format!("API key for {}:", id.display_name()))
        .without_confirmation()
        .prompt()?;
    if api_key.trim().is_empty() {
        bail!("API key for '{id}' must not be empty");
    }

    let fast = CustomType::<u64>::new("Fast response threshold (ms):")
        .with_default(current.fast_response_time_ms_threshold)
        .prompt()?;
    let average = CustomType::<u64>::new("Average response threshold (ms):")
        .with_default(current.average_response_time_ms_threshold)
        .prompt()?;
    if fast > average {
        bail!("Fast threshold ({fast} ms) must not exceed average threshold ({average} ms)");
    }

    config.upsert_provider(
        id,
        ProviderConfig {
            base_url,
            api_key,
            fast_response_time_ms_threshold: fast,
            average_response_time_ms_threshold: average,
        },
    );
    config.save_to(path)?;

    println!("Saved configuration for '{id}' to {}", path.display());
    Ok(())
}
