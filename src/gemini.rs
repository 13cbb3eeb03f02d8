// src/gemini.rs
//! Thin adapter over the Gemini generateContent HTTP API.
//!
//! The ladder only depends on the `TextGenClient` trait; the concrete client
//! here owns the request envelope, timeouts and response unwrapping. Network
//! failures and non-2xx statuses surface as `Err` and are absorbed by the
//! caller as a failed attempt, never as a batch-fatal error.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;

/// How the service finished producing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural stop. The text is complete.
    Stop,
    /// Output-token cap hit. The text is truncated but often still carries
    /// the price, so it is worth parsing.
    MaxTokens,
    /// Moderation block. Terminal for this prompt wording.
    Safety,
    Other,
}

/// One generation response: whatever text came back plus how it ended.
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    pub finish_reason: FinishReason,
}

#[async_trait]
pub trait TextGenClient: Send + Sync {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<Generated>;
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(cfg: &GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("dealwatch/0.1 (+github.com/dealwatch/dealwatch)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            http,
            api_url: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<SafetySetting<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

// Low temperature: we want factual lookups, not creative writing.
#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "candidateCount")]
    candidate_count: u32,
}

#[derive(Serialize)]
struct SafetySetting<'a> {
    category: &'a str,
    threshold: &'a str,
}

fn default_safety_settings() -> Vec<SafetySetting<'static>> {
    [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: "BLOCK_ONLY_HIGH",
    })
    .collect()
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

fn map_finish_reason(raw: Option<&str>) -> FinishReason {
    match raw.unwrap_or("") {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::MaxTokens,
        "SAFETY" => FinishReason::Safety,
        _ => FinishReason::Other,
    }
}

#[async_trait]
impl TextGenClient for GeminiClient {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<Generated> {
        let req = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                top_k: 1,
                top_p: 0.8,
                max_output_tokens,
                candidate_count: 1,
            },
            safety_settings: default_safety_settings(),
        };

        let url = format!("{}?key={}", self.api_url, self.api_key);
        let resp = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .context("gemini request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("gemini returned {status}");
        }

        let body: GenerateResponse = resp.json().await.context("decode gemini response")?;

        // A prompt-level block carries no candidates at all.
        if let Some(fb) = &body.prompt_feedback {
            if fb.block_reason.is_some() {
                return Ok(Generated {
                    text: String::new(),
                    finish_reason: FinishReason::Safety,
                });
            }
        }

        let candidate = match body.candidates.first() {
            Some(c) => c,
            None => {
                return Ok(Generated {
                    text: String::new(),
                    finish_reason: FinishReason::Other,
                })
            }
        };

        let finish_reason = map_finish_reason(candidate.finish_reason.as_deref());
        let text = candidate
            .content
            .as_ref()
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .unwrap_or("")
            .trim()
            .to_string();

        Ok(Generated { text, finish_reason })
    }
}
