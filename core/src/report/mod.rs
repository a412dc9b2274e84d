//! Turns ranked results and findings into reports.
//!
//! Source attribution is decided here, before any rendering: every unique
//! source gets one [`Marker`] (a citation number and a color) in first-seen
//! order, and each source sentence is attributed to at most one source.

pub mod json;
pub mod pdf;

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::{
    document::Document,
    similarity::{Finding, RankedResult},
};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report asset not found: {}", path.display())]
    MissingAsset { path: PathBuf },
    #[error("Report asset {} is unusable: {reason}", path.display())]
    InvalidAsset { path: PathBuf, reason: String },
    #[error("Failed to write {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("PDF error: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub(crate) fn components(self) -> [f32; 3] {
        [self.0, self.1, self.2].map(|c| f32::from(c) / 255.0)
    }
}

/// `n` pastel colors with evenly spaced hues, `hue = i / n`.
pub fn palette(n: usize) -> Vec<Rgb> {
    (0..n)
        .map(|i| hls_to_rgb(i as f64 / n as f64, 0.9, 0.95))
        .collect()
}

fn hls_to_rgb(h: f64, l: f64, s: f64) -> Rgb {
    let to_byte = |v: f64| (v * 255.0) as u8;
    if s == 0.0 {
        let v = to_byte(l);
        return Rgb(v, v, v);
    }
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let m1 = 2.0 * l - m2;
    let channel = |hue: f64| {
        let hue = hue.rem_euclid(1.0);
        if hue < 1.0 / 6.0 {
            m1 + (m2 - m1) * hue * 6.0
        } else if hue < 0.5 {
            m2
        } else if hue < 2.0 / 3.0 {
            m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
        } else {
            m1
        }
    };
    Rgb(
        to_byte(channel(h + 1.0 / 3.0)),
        to_byte(channel(h)),
        to_byte(channel(h - 1.0 / 3.0)),
    )
}

/// Citation number (1-based) and highlight color of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub number: usize,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Highest score seen for this source.
    pub best_score: f64,
    pub marker: Marker,
}

/// Unique sources of one report in first-seen order.
///
/// Markers are fixed when the index is built and never reassigned.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    entries: Vec<SourceEntry>,
    positions: HashMap<String, usize>,
}

impl SourceIndex {
    /// Indexes the sources of `findings` in the order they first appear.
    pub fn from_findings(findings: &[Finding]) -> Self {
        Self::build(findings.iter().map(|f| {
            (
                f.source_document_id.as_str(),
                f.source_document_title.as_str(),
                f.source_document_id.as_str(),
                f.score,
            )
        }))
    }

    /// Indexes ranked documents in rank order, scored by their combined score.
    pub fn from_ranked(results: &[RankedResult]) -> Self {
        Self::build(results.iter().map(|r| {
            (
                r.document.id.as_str(),
                r.document.title.as_str(),
                r.document.display_url(),
                r.score,
            )
        }))
    }

    fn build<'a>(sources: impl Iterator<Item = (&'a str, &'a str, &'a str, f64)>) -> Self {
        let mut entries: Vec<SourceEntry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (id, title, url, score) in sources {
            if let Some(&pos) = positions.get(id) {
                let entry = &mut entries[pos];
                entry.best_score = entry.best_score.max(score);
                continue;
            }
            positions.insert(id.to_string(), entries.len());
            entries.push(SourceEntry {
                id: id.to_string(),
                title: title.to_string(),
                url: url.to_string(),
                best_score: score,
                marker: Marker {
                    number: entries.len() + 1,
                    color: Rgb(0, 0, 0),
                },
            });
        }
        for (entry, color) in entries.iter_mut().zip(palette(positions.len())) {
            entry.marker.color = color;
        }
        Self { entries, positions }
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&SourceEntry> {
        self.positions.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The source a sentence is attributed to, with the score of the match.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub source_id: String,
    pub marker: Marker,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributedSentence {
    pub text: String,
    pub attribution: Option<Attribution>,
}

/// Attributes each sentence of `source` to its best-scoring indexed source.
///
/// Only findings scoring at least `display_threshold` count; on equal scores
/// the earlier finding wins.
pub fn attribute_sentences(
    source: &Document,
    findings: &[Finding],
    display_threshold: f64,
    index: &SourceIndex,
) -> Vec<AttributedSentence> {
    let mut best: Vec<Option<&Finding>> = vec![None; source.sentences().len()];
    for finding in findings {
        if finding.score < display_threshold || index.get(&finding.source_document_id).is_none() {
            continue;
        }
        let Some(slot) = best.get_mut(finding.source_unit.index) else {
            continue;
        };
        if slot.is_none_or(|current| finding.score > current.score) {
            *slot = Some(finding);
        }
    }

    source
        .sentences()
        .iter()
        .zip(best)
        .map(|(text, finding)| AttributedSentence {
            text: text.clone(),
            attribution: finding.and_then(|f| {
                index.get(&f.source_document_id).map(|entry| Attribution {
                    source_id: entry.id.clone(),
                    marker: entry.marker,
                    score: f.score,
                })
            }),
        })
        .collect()
}
