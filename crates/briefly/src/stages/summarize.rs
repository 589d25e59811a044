//! Summaries through the Gemini `generateContent` API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::SummarizerConfig;
use crate::error::{BrieflyError, StageError};
use crate::sanitize::truncate_for_log;
use crate::secrets::SecretSource;

use super::Summarizer;

pub struct GeminiSummarizer {
    http: HttpClient,
    endpoint: String,
    model: String,
    api_key: SecretString,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Instruction sent ahead of the extracted content.
pub(crate) fn build_prompt(text: &str, source_description: &str) -> String {
    format!(
        "You summarize content for busy readers.\n\
         The content below was extracted from: {source}\n\n\
         Write a clear, concise summary in plain prose paragraphs. Keep the core ideas, \
         key facts and conclusions. Leave out filler, timestamps, speaker labels and \
         metadata. If the content is spoken, explain it as you would to someone who \
         has not heard it. Group multiple topics logically. Do not use markdown, lists \
         or headings.\n\n\
         Content:\n{text}\n\n\
         Return only the summary.",
        source = source_description,
        text = text,
    )
}

/// Concatenates the text parts of every candidate.
fn collect_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .collect::<String>()
}

impl GeminiSummarizer {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, StageError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StageError::SummarizationFailed(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    /// Builds the client from config, falling back to `GEMINI_API_KEY` when no
    /// key source is configured.
    pub fn from_config(config: &SummarizerConfig) -> Result<Self, BrieflyError> {
        let source = if config.api_key.is_configured() {
            config.api_key.clone()
        } else {
            SecretSource::from_env_var("GEMINI_API_KEY")
        };
        let api_key = source.resolve()?;
        Ok(Self::new(
            &config.endpoint,
            &config.model,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?)
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, text: &str, source_description: &str) -> Result<String, StageError> {
        if text.trim().is_empty() {
            return Err(StageError::SummarizationFailed(
                "nothing to summarize".to_string(),
            ));
        }

        let prompt = build_prompt(text, source_description);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: &prompt }],
            }],
        };

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| StageError::SummarizationFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StageError::SummarizationFailed(format!(
                "{} returned {}: {}",
                self.model,
                status,
                truncate_for_log(&detail, 300)
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| StageError::SummarizationFailed(format!("invalid response: {}", e)))?;

        let summary = collect_text(parsed).trim().to_string();
        if summary.is_empty() {
            return Err(StageError::SummarizationFailed(
                "model returned an empty summary".to_string(),
            ));
        }
        tracing::debug!(model = %self.model, chars = summary.len(), "summary generated");
        Ok(summary)
    }
}
