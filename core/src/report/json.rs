//! JSON reports: ranked papers in document mode, findings in sentence mode.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::ReportError;
use crate::similarity::{Finding, RankedResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// arXiv identifier, or the document id for local papers.
    pub arxiv_id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub submitted_date: Option<DateTime<Utc>>,
    pub pdf_url: String,
    pub similarity_score: f64,
}

impl From<&RankedResult> for PaperRecord {
    fn from(result: &RankedResult) -> Self {
        let document = &result.document;
        Self {
            arxiv_id: document
                .metadata
                .arxiv_id
                .clone()
                .unwrap_or_else(|| document.id.clone()),
            title: document.title.clone(),
            abstract_text: document.abstract_text.clone(),
            authors: document.metadata.authors.clone(),
            submitted_date: document.metadata.submitted_date,
            pdf_url: document.display_url().to_string(),
            similarity_score: result.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub source_sentence: String,
    pub matched_sentence: String,
    pub similarity_score: f64,
    pub source_id: String,
    pub source_title: String,
}

impl From<&Finding> for FindingRecord {
    fn from(finding: &Finding) -> Self {
        Self {
            source_sentence: finding.source_unit.text.clone(),
            matched_sentence: finding.candidate_unit.text.clone(),
            similarity_score: finding.score,
            source_id: finding.source_document_id.clone(),
            source_title: finding.source_document_title.clone(),
        }
    }
}

pub fn paper_records(results: &[RankedResult]) -> Vec<PaperRecord> {
    results.iter().map(PaperRecord::from).collect()
}

pub fn finding_records(findings: &[Finding]) -> Vec<FindingRecord> {
    findings.iter().map(FindingRecord::from).collect()
}

/// Writes `records` as a pretty-printed JSON array, creating parent directories.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n").map_err(io_err)?;
    writer.flush().map_err(io_err)
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ReportError> {
    let file = File::open(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Parses a document-mode report back into its records, in file order.
pub fn read_paper_records(path: &Path) -> Result<Vec<PaperRecord>, ReportError> {
    read_records(path)
}

pub fn read_finding_records(path: &Path) -> Result<Vec<FindingRecord>, ReportError> {
    read_records(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, PaperMetadata};
    use crate::report::tests::finding;
    use chrono::TimeZone;

    fn ranked() -> Vec<RankedResult> {
        let arxiv = Document::new(
            "https://arxiv.org/pdf/2401.00001v2",
            "Überblick: Lernen",
            "Ein kurzer Überblick. Second sentence.",
        )
        .with_metadata(PaperMetadata {
            arxiv_id: Some("2401.00001v2".to_string()),
            authors: vec!["A. Author".to_string(), "B. Author".to_string()],
            submitted_date: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
            pdf_url: Some("https://arxiv.org/pdf/2401.00001v2".to_string()),
        });
        let local = Document::new("corpus/local.txt", "Local", "Local abstract.");
        vec![
            RankedResult {
                document: arxiv,
                score: 0.8123456789,
                title_score: 0.7,
                abstract_score: 0.85,
                rank: 1,
            },
            RankedResult {
                document: local,
                score: -0.125,
                title_score: 0.0,
                abstract_score: -0.2,
                rank: 2,
            },
        ]
    }

    #[test]
    fn paper_records_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        let results = ranked();
        write_records(&path, &paper_records(&results)).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"abstract\": \"Ein kurzer Überblick. Second sentence.\""));
        assert!(raw.contains("\"submitted_date\": \"2024-01-02T03:04:05Z\""));

        let records = read_paper_records(&path).unwrap();
        let pairs: Vec<(&str, f64)> = records
            .iter()
            .map(|r| (r.arxiv_id.as_str(), r.similarity_score))
            .collect();
        assert_eq!(pairs, vec![("2401.00001v2", 0.8123456789), ("corpus/local.txt", -0.125)]);
        assert_eq!(records[1].pdf_url, "corpus/local.txt");
        assert_eq!(records[1].submitted_date, None);
        assert_eq!(records[0].authors.len(), 2);
    }

    #[test]
    fn finding_records_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("findings.json");
        let findings = vec![finding(1, "x", 0.9), finding(0, "y", 0.7)];
        write_records(&path, &finding_records(&findings)).unwrap();

        let records = read_finding_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_id, "x");
        assert_eq!(records[0].source_sentence, "source sentence 1");
        assert_eq!(records[1].matched_sentence, "sentence from y");
    }

    #[test]
    fn empty_findings_write_an_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        write_records::<FindingRecord>(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }
}
