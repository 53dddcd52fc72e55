//! Clients for an OpenAI-compatible backend: chat completions, embeddings
//! and audio transcription.

use serde::{Deserialize, Serialize};

use super::{ChatModel, LlmError, Transcriber};
use crate::config::Settings;
use crate::knowledge::embedding::Embedder;

fn map_reqwest_error(base_url: &str, timeout_secs: u64, e: reqwest::Error) -> LlmError {
    if e.is_connect() {
        LlmError::Connection(base_url.to_string())
    } else if e.is_timeout() {
        LlmError::Timeout(timeout_secs)
    } else {
        LlmError::ResponseParsing(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.as_u16() == 429 {
        return Err(LlmError::RateLimited);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiChat {
    pub fn new(settings: &Settings) -> Self {
        Self::with_model(settings, &settings.chat_model)
    }

    pub fn with_model(settings: &Settings, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            api_key: settings.openai_api_key.clone(),
            model: model.to_string(),
            timeout_secs: settings.request_timeout_secs,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.3,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&self.base_url, self.timeout_secs, e))?;
        let response = check_status(response).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::ResponseParsing("empty choices".into()))
    }
}

/// Embeddings client.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiEmbedder {
    pub fn new(settings: &Settings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            api_key: settings.openai_api_key.clone(),
            model: settings.embedding_model.clone(),
            timeout_secs: settings.request_timeout_secs,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&self.base_url, self.timeout_secs, e))?;
        let response = check_status(response).await?;

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(LlmError::ResponseParsing(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Audio transcription client (black box: audio in, text out).
#[derive(Debug, Clone)]
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiTranscriber {
    pub fn new(settings: &Settings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            api_key: settings.openai_api_key.clone(),
            model: settings.stt_model.clone(),
            timeout_secs: settings.request_timeout_secs,
        }
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, LlmError> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        let mime = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string();
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str(&mime)
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&self.base_url, self.timeout_secs, e))?;
        let response = check_status(response).await?;

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;
        Ok(parsed.text)
    }
}
