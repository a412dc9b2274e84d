use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use paperlens::{
    config::{Mode, OutputFormat, PipelineConfig, ProviderKind},
    corpus::CorpusSource,
    embeddings::model::EmbeddingModel,
    pipeline::{Pipeline, PipelineOutcome},
    providers::{completions::OllamaCompletionModel, embeddings::OpenAIEmbedding},
};
use paperlens_arxiv::{ArxivConfig, ArxivSource};
use paperlens_voyageai::VoyageAIEmbedding;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "paperlens", author, version, about = "Find papers semantically similar to a document", long_about = None)]
struct Args {
    /// Input document (.txt, .md, .pdf) or a .yaml/.yml configuration file
    input: PathBuf,

    /// Number of keywords used to query the corpus
    #[arg(long)]
    num_keywords: Option<usize>,

    /// Maximum number of corpus papers, -1 for unlimited
    #[arg(long, allow_negative_numbers = true)]
    max_results: Option<i64>,

    /// Number of most similar papers kept in the report (document mode)
    #[arg(long)]
    top_n: Option<usize>,

    /// JSON output file; the PDF is written next to it
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output directory, used when --output is not given
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    title_weight: Option<f64>,

    #[arg(long)]
    abstract_weight: Option<f64>,

    /// Sentence similarity threshold (sentence mode)
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum score of highlighted sentences in the PDF
    #[arg(long)]
    display_threshold: Option<f64>,

    /// Minimum document score kept in the report (document mode), in [-1, 1]
    #[arg(long, allow_negative_numbers = true)]
    min_similarity: Option<f64>,

    /// Embedding model name
    #[arg(long)]
    model: Option<String>,

    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Directory or glob of local corpus documents
    #[arg(long)]
    corpus_dir: Option<String>,

    /// Search arXiv instead of the local corpus
    #[arg(long)]
    arxiv: bool,

    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// Embedding endpoint, e.g. a local OpenAI-compatible server
    #[arg(long)]
    api_url: Option<String>,

    /// Ollama model used to correct the extracted title
    #[arg(long, requires = "ollama_url")]
    llm_model: Option<String>,

    /// Ollama generate endpoint, e.g. http://localhost:11434/api/generate
    #[arg(long, requires = "llm_model")]
    ollama_url: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Document,
    Sentence,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Pdf,
    Both,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Openai,
    Voyageai,
}

fn is_config_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

/// Reads the configuration file, if one was given, and applies the flags on top.
fn resolve_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = if is_config_path(&args.input) {
        PipelineConfig::from_yaml_file(&args.input)
            .with_context(|| format!("loading configuration from {}", args.input.display()))?
    } else {
        PipelineConfig {
            input_doc_path: args.input.clone(),
            ..PipelineConfig::default()
        }
    };

    if let Some(n) = args.num_keywords {
        config.num_keywords = n;
    }
    if let Some(n) = args.max_results {
        config.max_papers = n;
    }
    if let Some(n) = args.top_n {
        config.top_n = Some(n);
    }
    if let Some(path) = &args.output {
        config.output_file = Some(path.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(w) = args.title_weight {
        config.title_weight = w;
    }
    if let Some(w) = args.abstract_weight {
        config.abstract_weight = w;
    }
    if let Some(t) = args.threshold {
        config.similarity_threshold = t;
    }
    if let Some(t) = args.display_threshold {
        config.display_threshold = t;
    }
    if let Some(t) = args.min_similarity {
        config.min_similarity = t;
    }
    if let Some(model) = &args.model {
        config.similarity_model = model.clone();
    }
    if let Some(mode) = args.mode {
        config.mode = match mode {
            ModeArg::Document => Mode::Document,
            ModeArg::Sentence => Mode::Sentence,
        };
    }
    if let Some(format) = args.format {
        config.output_format = match format {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Pdf => OutputFormat::Pdf,
            FormatArg::Both => OutputFormat::Both,
        };
    }
    if let Some(dir) = &args.corpus_dir {
        config.corpus_dir = dir.clone();
    }
    if args.arxiv {
        config.use_arxiv_corpus = true;
    }
    if let Some(provider) = args.provider {
        config.embedding_provider = match provider {
            ProviderArg::Openai => ProviderKind::OpenAI,
            ProviderArg::Voyageai => ProviderKind::VoyageAI,
        };
    }
    if let Some(url) = &args.api_url {
        config.embedding_api_url = Some(url.clone());
    }
    if let Some(model) = &args.llm_model {
        config.llm_model = Some(model.clone());
    }
    if let Some(url) = &args.ollama_url {
        config.ollama_url = Some(url.clone());
    }
    Ok(config)
}

fn embedding_model(config: &PipelineConfig) -> Result<Box<dyn EmbeddingModel>> {
    match config.embedding_provider {
        ProviderKind::OpenAI => {
            let key_var = config
                .embedding_api_key_var
                .as_deref()
                .unwrap_or(DEFAULT_OPENAI_KEY_VAR);
            let api_key = std::env::var(key_var).unwrap_or_else(|_| {
                warn!(var = key_var, "API key variable not set, sending unauthenticated requests");
                String::new()
            });
            let api_url = config
                .embedding_api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
            let model = OpenAIEmbedding::new(api_key, api_url, config.similarity_model.clone())?;
            Ok(Box::new(model))
        }
        ProviderKind::VoyageAI => {
            let mut voyage = serde_json::json!({ "model": config.similarity_model });
            if let Some(var) = &config.embedding_api_key_var {
                voyage["api_key_var"] = var.clone().into();
            }
            if let Some(url) = &config.embedding_api_url {
                voyage["api_url"] = url.clone().into();
            }
            Ok(Box::new(VoyageAIEmbedding::new(Some(&voyage.to_string()))?))
        }
    }
}

fn arxiv_source(config: &PipelineConfig) -> Result<Option<ArxivSource>> {
    if !config.use_arxiv_corpus {
        return Ok(None);
    }
    let source = ArxivSource::new(ArxivConfig {
        request_delay_secs: config.arxiv_request_delay_secs,
        timeout_secs: config.arxiv_timeout_secs,
        ..ArxivConfig::default()
    })?;
    Ok(Some(source))
}

fn title_corrector(config: &PipelineConfig) -> Result<Option<OllamaCompletionModel>> {
    let Some((model, url)) = config.title_correction() else {
        return Ok(None);
    };
    Ok(Some(OllamaCompletionModel::new(url.to_string(), model.to_string())?))
}

fn print_summary(outcome: &PipelineOutcome) {
    println!("Source: {}", outcome.source.title);
    println!("Keywords: {}", outcome.keywords.join(", "));
    println!("Corpus: {} documents", outcome.corpus_size);
    for result in outcome.ranked.iter().take(10) {
        println!("{:>4}  {:.3}  {}", result.rank, result.score, result.document.title);
    }
    if outcome.ranked.is_empty() {
        println!("Similar sentences: {}", outcome.findings.len());
    }
    for path in outcome.json_path.iter().chain(&outcome.pdf_path) {
        println!("Wrote {}", path.display());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = resolve_config(&args)?;
    info!(input = %config.input_doc_path.display(), mode = ?config.mode, "starting");

    let model = embedding_model(&config)?;
    let arxiv = arxiv_source(&config)?;
    let remote = arxiv.as_ref().map(|source| source as &dyn CorpusSource);
    let corrector = title_corrector(&config)?;

    let mut pipeline = Pipeline::new(config, model.as_ref(), remote);
    if let Some(corrector) = &corrector {
        pipeline = pipeline.with_title_corrector(corrector);
    }
    let outcome = pipeline.run().await?;
    print_summary(&outcome);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn document_argument_uses_defaults() {
        let args = Args::try_parse_from(["paperlens", "paper.pdf"]).unwrap();
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.input_doc_path, PathBuf::from("paper.pdf"));
        assert_eq!(config.mode, Mode::Document);
        assert!(!config.use_arxiv_corpus);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.YAML");
        std::fs::write(
            &path,
            "input_doc_path: draft.txt\nnum_keywords: 8\nmode: document\nmax_papers: 20\n",
        )
        .unwrap();

        let args = Args::try_parse_from([
            "paperlens",
            path.to_str().unwrap(),
            "--mode",
            "sentence",
            "--max-results",
            "-1",
            "--threshold",
            "0.8",
            "--format",
            "json",
            "--arxiv",
            "--provider",
            "voyageai",
            "--top-n",
            "3",
            "--min-similarity",
            "-0.25",
            "--llm-model",
            "llama3",
            "--ollama-url",
            "http://localhost:11434/api/generate",
        ])
        .unwrap();
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.input_doc_path, PathBuf::from("draft.txt"));
        assert_eq!(config.num_keywords, 8);
        assert_eq!(config.mode, Mode::Sentence);
        assert_eq!(config.max_papers_limit(), None);
        assert_eq!(config.similarity_threshold, 0.8);
        assert_eq!(config.output_format, OutputFormat::Json);
        assert!(config.use_arxiv_corpus);
        assert_eq!(config.embedding_provider, ProviderKind::VoyageAI);
        assert_eq!(config.top_n, Some(3));
        assert_eq!(config.max_papers, -1);
        assert_eq!(config.min_similarity, -0.25);
        assert!(title_corrector(&config).unwrap().is_some());
    }

    #[test]
    fn title_correction_needs_model_and_url() {
        assert!(Args::try_parse_from(["paperlens", "paper.pdf", "--llm-model", "llama3"]).is_err());
        let args = Args::try_parse_from(["paperlens", "paper.pdf"]).unwrap();
        assert!(title_corrector(&resolve_config(&args).unwrap()).unwrap().is_none());
    }

    #[test]
    fn invalid_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "input_doc_path: [unclosed\n").unwrap();
        let args = Args::try_parse_from(["paperlens", path.to_str().unwrap()]).unwrap();
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn arxiv_source_only_when_enabled() {
        let mut config = PipelineConfig::default();
        assert!(arxiv_source(&config).unwrap().is_none());
        config.use_arxiv_corpus = true;
        assert!(arxiv_source(&config).unwrap().is_some());
    }
}
