use thiserror::Error;

use crate::extraction::ExtractionError;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    UnsupportedInput(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    /// Whether the caller supplied something we refuse to process
    #[inline]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnsupportedInput(_))
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod engine;
pub mod extraction;
pub mod gemini;
pub mod server;

#[cfg(test)]
mod testing;
