//! Scores candidate documents against a source document.
//!
//! Two granularities are supported:
//!
//! - **document level** ([`SimilarityEngine::rank_documents`]): title and
//!   abstract are embedded once per document and their cosine similarities
//!   are combined with [`FieldWeights`] into one score per candidate.
//! - **sentence level** ([`SimilarityEngine::find_similar_sentences`]): every
//!   abstract sentence is embedded and every (source, candidate) sentence
//!   pair at or above a threshold becomes a [`Finding`].
//!
//! Each document's texts go to the embedding model in a single batch, so a
//! run makes at most one call per document.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    document::Document,
    embeddings::{cosine_similarity, model::EmbeddingModel, EmbedderError},
};

/// What to do when embedding a candidate document fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole pass with the embedding error.
    #[default]
    Abort,
    /// Log the failure and continue without that candidate.
    #[serde(rename = "skip")]
    SkipDocument,
}

/// Weights of the per-field similarities in the combined document score.
///
/// The combination is only a convex one when `title + abstract_text == 1`;
/// callers are responsible for that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldWeights {
    pub title: f64,
    pub abstract_text: f64,
}

impl FieldWeights {
    pub fn new(title: f64, abstract_text: f64) -> Self {
        Self { title, abstract_text }
    }

    pub fn combine(&self, title_score: f64, abstract_score: f64) -> f64 {
        self.title * title_score + self.abstract_text * abstract_score
    }
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self::new(0.3, 0.7)
    }
}

/// A sentence of a document, by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    pub index: usize,
    pub text: String,
}

/// One retained (source sentence, candidate sentence) match.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub source_unit: TextUnit,
    pub candidate_unit: TextUnit,
    pub score: f64,
    /// Id of the corpus document the candidate sentence belongs to.
    pub source_document_id: String,
    pub source_document_title: String,
}

/// A candidate document scored at document level.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub document: Document,
    pub score: f64,
    pub title_score: f64,
    pub abstract_score: f64,
    /// 1-based position after sorting.
    pub rank: usize,
}

pub struct SimilarityEngine<'a, M: EmbeddingModel + ?Sized> {
    model: &'a M,
    failure_policy: FailurePolicy,
}

impl<'a, M: EmbeddingModel + ?Sized> SimilarityEngine<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self {
            model,
            failure_policy: FailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Ranks `candidates` by weighted title/abstract similarity to `source`.
    ///
    /// The sort is stable: candidates with equal scores keep their input order.
    pub async fn rank_documents(
        &self,
        source: &Document,
        candidates: &[Document],
        weights: FieldWeights,
    ) -> Result<Vec<RankedResult>, EmbedderError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let (source_title, source_abstract) = self.embed_fields(source).await?;
        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some((title, abstract_vec)) = self.isolate(candidate, self.embed_fields(candidate).await)?
            else {
                continue;
            };
            let title_score = cosine_similarity(&source_title, &title);
            let abstract_score = cosine_similarity(&source_abstract, &abstract_vec);
            results.push(RankedResult {
                document: candidate.clone(),
                score: weights.combine(title_score, abstract_score),
                title_score,
                abstract_score,
                rank: 0,
            });
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        for (position, result) in results.iter_mut().enumerate() {
            result.rank = position + 1;
        }
        info!(candidates = candidates.len(), ranked = results.len(), "ranked documents");
        Ok(results)
    }

    /// Collects every sentence pair scoring at least `threshold`.
    ///
    /// Findings are ordered by descending score; equal scores keep generation
    /// order (candidate, then source sentence, then candidate sentence).
    pub async fn find_similar_sentences(
        &self,
        source: &Document,
        candidates: &[Document],
        threshold: f64,
    ) -> Result<Vec<Finding>, EmbedderError> {
        if candidates.is_empty() || source.sentences().is_empty() {
            return Ok(Vec::new());
        }

        let mut source_vectors: Option<Vec<Vec<f64>>> = None;
        let mut findings = Vec::new();
        for candidate in candidates {
            if candidate.sentences().is_empty() {
                debug!(id = %candidate.id, "skipping candidate without sentences");
                continue;
            }
            if source_vectors.is_none() {
                source_vectors = Some(self.embed_all(source.sentences()).await?);
            }
            let Some(candidate_vectors) =
                self.isolate(candidate, self.embed_all(candidate.sentences()).await)?
            else {
                continue;
            };

            let embedded_source = source_vectors.as_deref().unwrap_or_default();
            for (i, source_vector) in embedded_source.iter().enumerate() {
                for (j, candidate_vector) in candidate_vectors.iter().enumerate() {
                    let score = cosine_similarity(source_vector, candidate_vector);
                    if score >= threshold {
                        findings.push(Finding {
                            source_unit: TextUnit {
                                index: i,
                                text: source.sentences()[i].clone(),
                            },
                            candidate_unit: TextUnit {
                                index: j,
                                text: candidate.sentences()[j].clone(),
                            },
                            score,
                            source_document_id: candidate.id.clone(),
                            source_document_title: candidate.title.clone(),
                        });
                    }
                }
            }
        }

        findings.sort_by(|a, b| b.score.total_cmp(&a.score));
        info!(
            candidates = candidates.len(),
            findings = findings.len(),
            threshold,
            "sentence comparison finished"
        );
        Ok(findings)
    }

    async fn embed_fields(&self, document: &Document) -> Result<(Vec<f64>, Vec<f64>), EmbedderError> {
        let mut vectors = self
            .embed_all(&[document.title.clone(), document.abstract_text.clone()])
            .await?;
        let abstract_vec = vectors.pop().unwrap_or_default();
        let title = vectors.pop().unwrap_or_default();
        Ok((title, abstract_vec))
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbedderError> {
        let vectors = self.model.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(EmbedderError::CountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            });
        }
        Ok(vectors)
    }

    /// Applies the failure policy to a candidate's embedding result.
    /// `Ok(None)` means the candidate is skipped.
    fn isolate<T>(
        &self,
        candidate: &Document,
        result: Result<T, EmbedderError>,
    ) -> Result<Option<T>, EmbedderError> {
        match (result, self.failure_policy) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(e), FailurePolicy::Abort) => Err(e),
            (Err(e), FailurePolicy::SkipDocument) => {
                warn!(id = %candidate.id, error = %e, "embedding failed, skipping candidate");
                Ok(None)
            }
        }
    }
}

/// Keeps the ranked results scoring at least `min_score`, at most `limit` of them.
pub fn retain_ranked(results: Vec<RankedResult>, min_score: f64, limit: Option<usize>) -> Vec<RankedResult> {
    results
        .into_iter()
        .filter(|r| r.score >= min_score)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}
