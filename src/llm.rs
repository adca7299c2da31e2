//! Socratic tutor LLM client.
//!
//! The [`TutorClient`] trait is the seam between the HTTP layer and the
//! language model. Two implementations ship:
//!
//! - **[`DisabledTutor`]**: always fails; used when `llm.provider = "disabled"`.
//! - **[`OpenAiTutor`]**: calls an OpenAI-compatible chat completions API in
//!   JSON mode and parses the three response fields.
//!
//! # Retry Strategy
//!
//! `OpenAiTutor` retries transient failures with exponential backoff
//! (1s, 2s, 4s, … capped at 32s):
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Other 4xx → fail immediately
//! - Network errors → retry

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use socratic_tutor_core::models::{Level, Subject};

use crate::config::LlmConfig;

const SYSTEM_PROMPT: &str = "You are a Socratic tutor. Never give the answer directly. \
Guide the student with questions and subtle hints that point toward the relevant concepts, \
adapted to their level. When reference passages are supplied, ground your guidance in them. \
Respond with a JSON object with exactly these string keys: \
\"clarifying_question\" (a thoughtful question that prompts deeper consideration), \
\"concept_hint\" (a hint about what to think about, without explaining the answer), \
\"feedback\" (encouraging and supportive feedback).";

#[derive(Debug, Error)]
pub enum TutorError {
    #[error("LLM provider is disabled; set [llm] provider in the config")]
    Disabled,
    #[error("LLM request failed: {0}")]
    Request(String),
    #[error("LLM response malformed: {0}")]
    Malformed(String),
}

/// A retrieved passage handed to the tutor as context.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextPassage {
    /// Where the text came from, e.g. `"newton.md (passage 2)"`.
    pub source: String,
    pub text: String,
}

/// One student question plus any retrieved context.
#[derive(Debug, Clone)]
pub struct TutorRequest {
    pub question: String,
    pub subject: Subject,
    pub level: Level,
    pub passages: Vec<ContextPassage>,
}

/// The tutor's three-part reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocraticResponse {
    pub clarifying_question: String,
    pub concept_hint: String,
    pub feedback: String,
}

#[async_trait]
pub trait TutorClient: Send + Sync {
    /// Short identifier for logs and `/health`.
    fn name(&self) -> &str;

    async fn respond(&self, request: &TutorRequest) -> Result<SocraticResponse, TutorError>;
}

pub struct DisabledTutor;

#[async_trait]
impl TutorClient for DisabledTutor {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn respond(&self, _request: &TutorRequest) -> Result<SocraticResponse, TutorError> {
        Err(TutorError::Disabled)
    }
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiTutor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_retries: u32,
}

impl OpenAiTutor {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TutorClient for OpenAiTutor {
    fn name(&self) -> &str {
        &self.model
    }

    async fn respond(&self, request: &TutorRequest) -> Result<SocraticResponse, TutorError> {
        let body = serde_json::json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(request) },
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| TutorError::Malformed(e.to_string()))?;
                        debug!(model = %self.model, attempt, "tutor response received");
                        return parse_completion(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "LLM request failed, will retry");
                        last_err = Some(format!("API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429): don't retry
                    return Err(TutorError::Request(format!(
                        "API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    warn!(error = %e, attempt, "LLM request error, will retry");
                    last_err = Some(e.to_string());
                }
            }
        }

        Err(TutorError::Request(format!(
            "retries exhausted: {}",
            last_err.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

fn user_prompt(request: &TutorRequest) -> String {
    let mut prompt = format!(
        "Subject: {}\nLevel: {}\nStudent question: {}\n",
        request.subject, request.level, request.question
    );
    if request.passages.is_empty() {
        prompt.push_str("\nNo reference passages were found; give a general Socratic response.\n");
        return prompt;
    }
    prompt.push_str("\nReference passages:\n");
    for (i, passage) in request.passages.iter().enumerate() {
        prompt.push_str(&format!("[{}] ({}) {}\n", i + 1, passage.source, passage.text));
    }
    prompt
}

/// Pull the JSON object out of `choices[0].message.content`.
fn parse_completion(json: &serde_json::Value) -> Result<SocraticResponse, TutorError> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| TutorError::Malformed("missing choices[0].message.content".to_string()))?;

    serde_json::from_str(content).map_err(|e| TutorError::Malformed(e.to_string()))
}

/// Build the tutor client selected by `[llm].provider`.
pub fn create_tutor(config: &LlmConfig) -> anyhow::Result<Box<dyn TutorClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledTutor)),
        "openai" => Ok(Box::new(OpenAiTutor::new(config)?)),
        other => anyhow::bail!("Unknown llm provider: {}", other),
    }
}
