use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, api_key_from_env, init_config, resolve_config_dir, show_config};
use crate::engine::{RagEngine, Session};
use crate::server;

/// Load `config.toml` from the chosen directory, falling back to defaults
#[inline]
pub fn load_config(config_dir: Option<PathBuf>) -> Result<Config> {
    let config_dir = resolve_config_dir(config_dir).context("Failed to locate config directory")?;
    Config::load(&config_dir)
}

/// Command-line overrides for the listen address
#[inline]
pub fn apply_server_overrides(config: &mut Config, host: Option<String>, port: Option<u16>) {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
}

async fn build_engine(config: &Config) -> Result<RagEngine> {
    let api_key = api_key_from_env()?;
    RagEngine::from_config(config, &api_key)
        .await
        .context("Failed to initialise the RAG engine")
}

/// Run the HTTP API until interrupted
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    config.validate().context("Configuration validation failed")?;

    let engine = build_engine(config).await?;
    let session = Session::new(Arc::new(engine));

    server::serve(config, session)
        .await
        .context("HTTP server failed")
}

/// Ingest one PDF and answer one question about it
#[inline]
pub async fn ask(config: &Config, pdf: &Path, question: &str) -> Result<String> {
    let engine = build_engine(config).await?;

    let ingested = engine
        .ingest(pdf)
        .await
        .with_context(|| format!("Failed to ingest {}", pdf.display()))?;
    eprintln!(
        "{} {} ({} pages, {} chunks)",
        style("Indexed").green().bold(),
        pdf.display(),
        ingested.page_count,
        ingested.chunk_count
    );

    let answer = engine.query(&ingested.handle, question).await;

    if let Err(e) = engine.release(&ingested.handle).await {
        warn!("Failed to clean up index for {}: {}", ingested.handle, e);
    }

    let answer = answer.context("Failed to answer question")?;
    info!("Answered question about {}", pdf.display());
    Ok(answer)
}

/// `config --init` writes defaults; `config` alone or with `--show` prints
/// the effective configuration
#[inline]
pub fn configure(config_dir: Option<PathBuf>, show: bool, init: bool) -> Result<()> {
    let config_dir = resolve_config_dir(config_dir).context("Failed to locate config directory")?;

    if init {
        init_config(config_dir.clone())?;
    }

    if show || !init {
        let config = Config::load(&config_dir)?;
        show_config(&config)?;
    }

    Ok(())
}
