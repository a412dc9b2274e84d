//! Text completion support, used to clean up titles extracted from PDFs
//! before they are used as search queries.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("Provider error -> HTTP Status {0}: {1}")]
    ProviderError(u16, String),
    #[error("RequestError: {0}")]
    RequestError(String),
    #[error("ParseError: {0}")]
    ParseError(String),
    #[error("Invalid completion model configuration: {0}")]
    Config(String),
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Returns the model's answer to a single prompt.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

fn title_correction_prompt(title: &str) -> String {
    format!(
        r#"You are a text correction system. Your task is to fix common spelling and ordering errors in a short text.
Given the input string, return only the most probable corrected output, without any extra explanation.

Example 1:
Input: "HELOLO WRLD"
Output: "HELLO WORLD"

Example 2:
Input: "tetsng framewrok"
Output: "TESTING FRAMEWORK"

Input: "{title}"
Output:"#
    )
}

/// Asks `model` to fix spelling and ordering errors in `title`.
///
/// Any failure, or an empty answer, keeps the title as extracted.
pub async fn correct_title(model: &dyn CompletionModel, title: &str) -> String {
    let answer = match model.complete(&title_correction_prompt(title)).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!(error = %e, "title correction failed, keeping the extracted title");
            return title.to_string();
        }
    };
    let corrected = answer
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("Output:").trim().trim_matches('"').trim())
        .unwrap_or_default();
    if corrected.is_empty() {
        warn!("title correction returned nothing, keeping the extracted title");
        return title.to_string();
    }
    info!(raw = title, corrected, "corrected title");
    corrected.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Result<String, CompletionError>);

    #[async_trait]
    impl CompletionModel for Canned {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            assert!(prompt.contains("Input: \"Atention Is Al You Need\""));
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn answer_is_unquoted_and_trimmed() {
        let model = Canned(Ok("\n  \"Attention Is All You Need\"\nbecause ...".to_string()));
        assert_eq!(correct_title(&model, "Atention Is Al You Need").await, "Attention Is All You Need");
    }

    #[tokio::test]
    async fn failures_keep_the_raw_title() {
        let failing = Canned(Err(CompletionError::RequestError("connection refused".to_string())));
        assert_eq!(correct_title(&failing, "Atention Is Al You Need").await, "Atention Is Al You Need");

        let empty = Canned(Ok("   \n".to_string()));
        assert_eq!(correct_title(&empty, "Atention Is Al You Need").await, "Atention Is Al You Need");
    }
}
