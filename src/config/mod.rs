// Configuration management module
// TOML settings plus the environment-provided API credential

pub mod settings;


use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;

pub use settings::{
    API_KEY_ENV, Config, ConfigError, GeminiConfig, OcrConfig, RetrievalConfig, ServerConfig,
    api_key_from_env, api_key_from_lookup,
};

/// Pick the explicit directory if given, otherwise the platform default
#[inline]
pub fn resolve_config_dir(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    explicit.map_or_else(Config::config_dir, Ok)
}

/// Write a default `config.toml` unless one already exists
#[inline]
pub fn init_config(config_dir: PathBuf) -> Result<PathBuf> {
    let config = Config {
        base_dir: config_dir,
        ..Config::default()
    };
    let config_path = config.config_file_path();

    if config_path.exists() {
        eprintln!(
            "{}",
            style("Configuration file already exists, leaving it untouched.").yellow()
        );
        return Ok(config_path);
    }

    config.save().context("Failed to save default configuration")?;
    eprintln!(
        "Configuration written to: {}",
        style(config_path.display()).cyan()
    );
    Ok(config_path)
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Gemini:").bold().yellow());
    match config.gemini.api_url() {
        Ok(url) => eprintln!("  API URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  API URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  API Version: {}", style(&config.gemini.api_version).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.gemini.embedding_model).cyan()
    );
    eprintln!("  Chat Model: {}", style(&config.gemini.chat_model).cyan());
    eprintln!("  Temperature: {}", style(config.gemini.temperature).cyan());
    eprintln!(
        "  API Key ({}): {}",
        API_KEY_ENV,
        if api_key_from_env().is_ok() {
            style("set").green()
        } else {
            style("missing").red()
        }
    );

    eprintln!();
    eprintln!("{}", style("Ingestion:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!(
        "  OCR Threshold: {} chars",
        style(config.ocr.min_text_chars).cyan()
    );
    eprintln!(
        "  OCR Tools: {} / {}",
        style(&config.ocr.pdftoppm_cmd).cyan(),
        style(&config.ocr.tesseract_cmd).cyan()
    );
    eprintln!("  Retrieval Top-K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!("{}", style("Server:").bold().yellow());
    eprintln!(
        "  Listen: {}",
        style(format!("{}:{}", config.server.host, config.server.port)).cyan()
    );
    eprintln!(
        "  Uploads: {}",
        style(config.server.upload_dir.display()).cyan()
    );
    eprintln!(
        "  Index: {}",
        style(config.server.index_dir.display()).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}
