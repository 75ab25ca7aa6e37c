#![allow(
    dead_code,
    reason = "each integration test binary uses a subset of the helpers"
)]

//! Shared fixtures: real PDFs built with lopdf plus offline stand-ins for
//! the embedding and chat models.

use async_trait::async_trait;
use book_agent::Result;
use book_agent::embeddings::Embedder;
use book_agent::engine::ChatModel;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const DIMENSION: usize = 64;

/// Build a PDF with one Helvetica text line per page
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 11.into()]),
                Operation::new("Td", vec![50.into(), 780.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let encoded = content.encode().expect("content stream should encode");
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).expect("page count fits");
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("PDF should serialize");
    bytes
}

pub fn write_pdf(path: &Path, pages: &[&str]) {
    std::fs::write(path, pdf_bytes(pages)).expect("PDF should be written");
}

/// Unit-length bag-of-words vectors: each lowercase word lands in a fixed
/// bucket, so texts sharing vocabulary end up close together
pub struct WordBucketEmbedder;

pub fn word_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; DIMENSION];
    for word in text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() > 3)
    {
        let bucket = word
            .to_ascii_lowercase()
            .bytes()
            .fold(7_usize, |acc, b| acc.wrapping_mul(31).wrapping_add(usize::from(b)))
            % DIMENSION;
        if let Some(slot) = vector.get_mut(bucket) {
            *slot += 1.0;
        }
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

#[async_trait]
impl Embedder for WordBucketEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| word_vector(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(word_vector(text))
    }
}

/// Answers every prompt with the same text and remembers what it was asked
pub struct ScriptedModel {
    answer: String,
    prompts: Mutex<Vec<(String, f32)>>,
}

impl ScriptedModel {
    pub fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<(String, f32)> {
        self.prompts.lock().expect("lock should not be poisoned").clone()
    }

    pub fn last_prompt(&self) -> String {
        self.prompts()
            .pop()
            .map(|(prompt, _)| prompt)
            .expect("model should have been called")
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .push((prompt.to_string(), temperature));
        Ok(self.answer.clone())
    }
}
