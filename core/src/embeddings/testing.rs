//! Deterministic embedding doubles for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{model::EmbeddingModel, EmbedderError};

const DIMENSIONS: usize = 1024;

// Words mapped onto a shared concept so paraphrases land close together.
const CONCEPTS: &[(&str, &str)] = &[
    ("neural", "deep"),
    ("networks", "model"),
    ("learning", "model"),
    ("models", "model"),
    ("require", "need"),
    ("requires", "need"),
    ("large", "big"),
    ("datasets", "data"),
];

/// Bag-of-concepts embedding that counts how often it is called.
#[derive(Default)]
pub(crate) struct ConceptEmbedding {
    calls: AtomicUsize,
    fail_on: Option<String>,
}

impl ConceptEmbedding {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails any batch containing a text with `needle` in it.
    pub(crate) fn failing_on(needle: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(needle.to_string()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn vector(text: &str) -> Vec<f64> {
        let mut vector = vec![0.0; DIMENSIONS];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let concept = CONCEPTS
                .iter()
                .find(|(word, _)| *word == token)
                .map_or(token.as_str(), |&(_, concept)| concept);
            vector[fnv1a(concept) % DIMENSIONS] += 1.0;
        }
        vector
    }
}

fn fnv1a(s: &str) -> usize {
    let hash = s.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    });
    hash as usize
}

#[async_trait]
impl EmbeddingModel for ConceptEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbedderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(needle) = &self.fail_on {
            if texts.iter().any(|t| t.contains(needle.as_str())) {
                return Err(EmbedderError::RequestError(format!("refusing `{needle}`")));
            }
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}
