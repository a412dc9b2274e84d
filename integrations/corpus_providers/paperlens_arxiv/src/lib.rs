//! A remote corpus implementing `paperlens::corpus::CorpusSource` on top of the
//! [arXiv API](https://info.arxiv.org/help/api/user-manual.html).
//!
//! Searches are paged, with a fixed delay between requests as the arXiv API
//! terms of use ask, and every request is bounded by a timeout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use paperlens::corpus::{CorpusError, CorpusSource, SearchQuery};
use paperlens::document::{Document, PaperMetadata};
use paperlens::text::normalize_whitespace;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_API_URL: &str = "https://export.arxiv.org/api/query";
// The API returns at most this many entries per request.
const MAX_PAGE_SIZE: usize = 2000;

/// Configuration of the arXiv source, deserialized from JSON.
///
/// Every field is optional:
/// ```json
/// {
///     "api_url": "https://export.arxiv.org/api/query",
///     "page_size": 100,
///     "request_delay_secs": 3,
///     "timeout_secs": 30
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ArxivConfig {
    pub api_url: String,
    pub page_size: usize,
    pub request_delay_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            page_size: 100,
            request_delay_secs: 3,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArxivConfigError {
    #[error("Invalid arXiv config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid arXiv API url `{url}`: {reason}")]
    Url { url: String, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Searches arXiv and turns the Atom entries into [`Document`]s.
///
/// Document ids are the PDF links of the papers; the arXiv id, authors,
/// publication date and PDF link go into the document metadata.
pub struct ArxivSource {
    api_url: Url,
    page_size: usize,
    request_delay: Duration,
    timeout: Duration,
    client: Client,
}

impl ArxivSource {
    pub fn new(config: ArxivConfig) -> Result<Self, ArxivConfigError> {
        let api_url = Url::parse(&config.api_url).map_err(|e| ArxivConfigError::Url {
            url: config.api_url.clone(),
            reason: e.to_string(),
        })?;
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = Client::builder()
            .user_agent(concat!("paperlens/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_url,
            page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
            request_delay: Duration::from_secs(config.request_delay_secs),
            timeout,
            client,
        })
    }

    /// Creates a source from a JSON configuration string.
    ///
    /// # Errors
    /// Fails when the JSON is malformed, contains unknown fields or names an
    /// invalid API url.
    pub fn from_json(json_str: &str) -> Result<Self, ArxivConfigError> {
        Self::new(serde_json::from_str(json_str)?)
    }

    fn page_url(&self, search_query: &str, start: usize, max_results: usize) -> Url {
        let mut url = self.api_url.clone();
        url.query_pairs_mut()
            .append_pair("search_query", search_query)
            .append_pair("start", &start.to_string())
            .append_pair("max_results", &max_results.to_string())
            .append_pair("sortBy", "relevance");
        url
    }

    /// Fetches one page, returning the number of entries in it and the
    /// entries that could be turned into documents.
    async fn fetch_page(
        &self,
        search_query: &str,
        start: usize,
        max_results: usize,
    ) -> Result<(usize, Vec<Document>), CorpusError> {
        let url = self.page_url(search_query, start, max_results);
        debug!(%url, "querying arXiv");
        let response = self.client.get(url).send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CorpusError::RemoteSearchFailure(format!(
                "arXiv query failed: HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        let feed = feed_rs::parser::parse(&body[..])
            .map_err(|e| CorpusError::RemoteSearchFailure(format!("Failed to parse arXiv Atom feed: {e}")))?;

        let entries = feed.entries.len();
        let documents = feed.entries.into_iter().filter_map(entry_to_document).collect();
        Ok((entries, documents))
    }

    fn request_error(&self, e: reqwest::Error) -> CorpusError {
        if e.is_timeout() {
            CorpusError::RemoteSearchFailure(format!(
                "arXiv request timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            CorpusError::RemoteSearchFailure(format!("arXiv request failed: {e}"))
        }
    }
}

#[async_trait]
impl CorpusSource for ArxivSource {
    async fn search(&self, query: &SearchQuery, limit: usize) -> Result<Vec<Document>, CorpusError> {
        let search_query = query.to_arxiv_query();
        if search_query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        info!(query = %search_query, limit, "searching arXiv");

        let mut documents: Vec<Document> = Vec::new();
        let mut seen = HashSet::new();
        let mut start = 0;
        while documents.len() < limit {
            if start > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            let wanted = (limit - documents.len()).min(self.page_size);
            let (entries, page) = self.fetch_page(&search_query, start, wanted).await?;
            documents.extend(page.into_iter().filter(|d| seen.insert(d.id.clone())));
            if entries < wanted {
                break;
            }
            start += entries;
        }
        documents.truncate(limit);
        info!(papers = documents.len(), "arXiv search finished");
        Ok(documents)
    }
}

/// The id part of an arXiv abstract URL, e.g. `2401.00001v2` or `cs/9901001v1`.
fn arxiv_id_from_url(url: &str) -> Option<String> {
    let url = url.trim();
    let start = url.rfind("/abs/")? + "/abs/".len();
    let id = url[start..].trim_matches('/');
    (!id.is_empty()).then(|| id.to_string())
}

fn arxiv_pdf_url(id: &str) -> String {
    format!("https://arxiv.org/pdf/{id}")
}

fn published(entry: &Entry) -> Option<DateTime<Utc>> {
    entry.published.or(entry.updated)
}

fn entry_to_document(entry: Entry) -> Option<Document> {
    let title = normalize_whitespace(entry.title.as_ref().map_or("", |t| t.content.as_str()));
    let abstract_text = normalize_whitespace(entry.summary.as_ref().map_or("", |s| s.content.as_str()));
    if title.is_empty() || abstract_text.is_empty() {
        debug!(id = %entry.id, "skipping arXiv entry without title or abstract");
        return None;
    }

    let arxiv_id = arxiv_id_from_url(&entry.id);
    let pdf_url = entry
        .links
        .iter()
        .find(|l| l.media_type.as_deref() == Some("application/pdf") || l.title.as_deref() == Some("pdf"))
        .map(|l| l.href.clone())
        .or_else(|| arxiv_id.as_deref().map(arxiv_pdf_url));
    let abs_url = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .map(|l| l.href.clone());
    let id = pdf_url
        .clone()
        .or(abs_url)
        .unwrap_or_else(|| entry.id.clone());

    let metadata = PaperMetadata {
        arxiv_id,
        authors: entry
            .authors
            .iter()
            .map(|a| normalize_whitespace(&a.name))
            .filter(|name| !name.is_empty())
            .collect(),
        submitted_date: published(&entry),
        pdf_url,
    };
    Some(Document::new(id, title, abstract_text).with_metadata(metadata))
}
