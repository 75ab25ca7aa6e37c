// Test doubles for the PDF reader and the remote models

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::Result;
use crate::embeddings::Embedder;
use crate::engine::ChatModel;
use crate::extraction::{ExtractionError, PageRecord, TextExtractor};

pub const PHOTOSYNTHESIS: &str =
    "Photosynthesis converts light energy into chemical energy stored in glucose.";
pub const CHLOROPLASTS: &str = "Chloroplasts contain chlorophyll.";
pub const VOLCANOES: &str =
    "Volcanoes form where magma from the mantle reaches the surface of the crust.";

/// Serves page text registered per file name
pub struct Bookshelf {
    books: HashMap<String, Vec<String>>,
}

impl Bookshelf {
    pub fn new(books: Vec<(&str, Vec<&str>)>) -> Self {
        Self {
            books: books
                .into_iter()
                .map(|(name, pages)| {
                    (
                        name.to_string(),
                        pages.into_iter().map(ToString::to_string).collect(),
                    )
                })
                .collect(),
        }
    }

    /// `biology.pdf` (three pages, one blank), `geology.pdf` and `blank.pdf`
    pub fn standard() -> Self {
        Self::new(vec![
            ("biology.pdf", vec![PHOTOSYNTHESIS, "", CHLOROPLASTS]),
            ("geology.pdf", vec![VOLCANOES]),
            ("blank.pdf", vec!["   ", "\n\n"]),
        ])
    }
}

#[async_trait]
impl TextExtractor for Bookshelf {
    fn name(&self) -> &str {
        "bookshelf"
    }

    async fn extract(&self, path: &Path) -> std::result::Result<Vec<PageRecord>, ExtractionError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pages = self.books.get(&name).ok_or(ExtractionError::NoContent)?;

        Ok(pages
            .iter()
            .enumerate()
            .map(|(i, text)| PageRecord {
                page: u32::try_from(i).expect("few pages"),
                text: text.clone(),
                source: path.display().to_string(),
            })
            .collect())
    }
}

/// Letter-frequency vectors; similar wording lands close together
pub struct LetterEmbedder;

pub fn letter_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; 26];
    for ch in text.chars().filter(char::is_ascii_alphabetic) {
        let slot = usize::from(ch.to_ascii_lowercase() as u8 - b'a');
        vector[slot] += 1.0;
    }
    vector
}

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(letter_vector(text))
    }
}

/// Records every prompt and replies with a canned answer
pub struct RecordingModel {
    answer: String,
    calls: Mutex<Vec<(String, f32)>>,
}

impl RecordingModel {
    pub fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, f32)> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn last_prompt(&self) -> String {
        self.calls()
            .pop()
            .map(|(prompt, _)| prompt)
            .expect("model was called")
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("lock").len()
    }
}

#[async_trait]
impl ChatModel for RecordingModel {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.calls
            .lock()
            .expect("lock")
            .push((prompt.to_string(), temperature));
        Ok(self.answer.clone())
    }
}
