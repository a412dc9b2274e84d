//! One end-to-end run: load the source, build the corpus, score, report.

use std::path::PathBuf;
use tracing::{info, warn};

use crate::{
    completion::{correct_title, CompletionModel},
    config::{ConfigError, Mode, PipelineConfig},
    corpus::{local_corpus, remote_corpus, CorpusSource, SearchQuery},
    document::Document,
    embeddings::model::EmbeddingModel,
    error::Result,
    loader::load_document,
    report::{
        attribute_sentences,
        json::{finding_records, paper_records, write_records},
        pdf::write_pdf,
        SourceIndex,
    },
    similarity::{retain_ranked, Finding, RankedResult, SimilarityEngine},
    text::extract_keywords,
};

/// What a run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub source: Document,
    pub keywords: Vec<String>,
    pub corpus_size: usize,
    /// Retained ranked documents (document mode only).
    pub ranked: Vec<RankedResult>,
    /// Sentence findings; in document mode these are the PDF highlights.
    pub findings: Vec<Finding>,
    pub json_path: Option<PathBuf>,
    pub pdf_path: Option<PathBuf>,
}

pub struct Pipeline<'a> {
    config: PipelineConfig,
    model: &'a dyn EmbeddingModel,
    remote: Option<&'a dyn CorpusSource>,
    title_corrector: Option<&'a dyn CompletionModel>,
}

impl<'a> Pipeline<'a> {
    /// `remote` is required when `use_arxiv_corpus` is set.
    pub fn new(config: PipelineConfig, model: &'a dyn EmbeddingModel, remote: Option<&'a dyn CorpusSource>) -> Self {
        Self {
            config,
            model,
            remote,
            title_corrector: None,
        }
    }

    /// Corrects the extracted source title with `corrector` before the corpus
    /// is searched.
    #[must_use]
    pub fn with_title_corrector(mut self, corrector: &'a dyn CompletionModel) -> Self {
        self.title_corrector = Some(corrector);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<PipelineOutcome> {
        let config = &self.config;
        config.validate()?;

        let mut source = load_document(&config.input_doc_path)?;
        info!(title = %source.title, sentences = source.sentences().len(), "loaded source document");
        if let Some(corrector) = self.title_corrector {
            source.title = correct_title(corrector, &source.title).await;
        }

        let keywords = extract_keywords(
            &format!("{}\n{}", source.title, source.abstract_text),
            config.num_keywords,
        );
        info!(keywords = %keywords.join(", "), "extracted keywords");

        let corpus = self.build_corpus(&source, &keywords).await?;
        let engine = SimilarityEngine::new(self.model).with_failure_policy(config.on_embedding_failure);

        let mut outcome = PipelineOutcome {
            corpus_size: corpus.len(),
            source,
            keywords,
            ranked: Vec::new(),
            findings: Vec::new(),
            json_path: None,
            pdf_path: None,
        };

        match config.mode {
            Mode::Document => {
                let ranked = engine
                    .rank_documents(&outcome.source, &corpus, config.weights())
                    .await?;
                let ranked = retain_ranked(ranked, config.min_similarity, config.top_n);
                info!(
                    retained = ranked.len(),
                    min_similarity = config.min_similarity,
                    top_n = ?config.top_n,
                    "ranked corpus"
                );

                if config.output_format.writes_json() {
                    let path = config.json_output_path();
                    write_records(&path, &paper_records(&ranked))?;
                    info!(path = %path.display(), "wrote JSON report");
                    outcome.json_path = Some(path);
                }
                if config.output_format.writes_pdf() {
                    if ranked.is_empty() {
                        warn!("no documents passed min_similarity, skipping PDF report");
                    } else {
                        let retained: Vec<Document> = ranked.iter().map(|r| r.document.clone()).collect();
                        let findings = engine
                            .find_similar_sentences(&outcome.source, &retained, config.display_threshold)
                            .await?;
                        let index = SourceIndex::from_ranked(&ranked);
                        outcome.pdf_path = Some(self.write_pdf_report(&outcome.source, &findings, &index)?);
                        outcome.findings = findings;
                    }
                }
                outcome.ranked = ranked;
            }
            Mode::Sentence => {
                let findings = engine
                    .find_similar_sentences(&outcome.source, &corpus, config.similarity_threshold)
                    .await?;
                if findings.is_empty() {
                    info!(threshold = config.similarity_threshold, "no similar sentences found");
                }

                if config.output_format.writes_json() {
                    let path = config.json_output_path();
                    write_records(&path, &finding_records(&findings))?;
                    info!(path = %path.display(), "wrote JSON report");
                    outcome.json_path = Some(path);
                }
                if config.output_format.writes_pdf() && !findings.is_empty() {
                    let index = SourceIndex::from_findings(&findings);
                    outcome.pdf_path = Some(self.write_pdf_report(&outcome.source, &findings, &index)?);
                }
                outcome.findings = findings;
            }
        }
        Ok(outcome)
    }

    async fn build_corpus(&self, source: &Document, keywords: &[String]) -> Result<Vec<Document>> {
        let config = &self.config;
        if !config.use_arxiv_corpus {
            let mut corpus = local_corpus(&config.corpus_dir, source)?;
            if let Some(limit) = config.max_papers_limit() {
                corpus.truncate(limit);
            }
            return Ok(corpus);
        }
        let remote = self.remote.ok_or(ConfigError::InvalidValue {
            key: "use_arxiv_corpus",
            reason: "no remote corpus source is configured".to_string(),
        })?;
        let query = SearchQuery::new(source.title.clone(), keywords.to_vec());
        let limit = config.max_papers_limit().unwrap_or(usize::MAX);
        Ok(remote_corpus(remote, &query, limit, source).await?)
    }

    fn write_pdf_report(&self, source: &Document, findings: &[Finding], index: &SourceIndex) -> Result<PathBuf> {
        let path = self.config.pdf_output_path();
        let sentences = attribute_sentences(source, findings, self.config.display_threshold, index);
        write_pdf(&path, source, &sentences, index, &self.config.pdf_options())?;
        info!(path = %path.display(), sources = index.len(), "wrote PDF report");
        Ok(path)
    }
}
