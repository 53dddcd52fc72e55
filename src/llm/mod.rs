//! Model-backend clients and the retry policy shared by all of them.

pub mod openai;

use std::time::Duration;

pub use openai::{OpenAiChat, OpenAiEmbedder, OpenAiTranscriber};

/// Errors from chat, embedding and transcription backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("Cannot reach model backend at {0}")]
    Connection(String),
    #[error("Model request timed out after {0}s")]
    Timeout(u64),
    #[error("Model backend rate limited the request")]
    RateLimited,
    #[error("Model backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Failed to parse model response: {0}")]
    ResponseParsing(String),
}

impl LlmError {
    /// Transient failures are retried with backoff; the rest surface at once.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            Self::ResponseParsing(_) => false,
        }
    }
}

/// Text generation seam for the analysis workflow.
#[allow(async_fn_in_trait)]
pub trait ChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Speech-to-text seam. Treated as a black box returning plain text.
#[allow(async_fn_in_trait)]
pub trait Transcriber {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, LlmError>;
}

/// Retry a call with bounded exponential backoff on transient failures.
///
/// `max_attempts` counts the first call; permanent errors surface
/// immediately without consuming the budget.
pub async fn call_with_backoff<T, F, Fut>(
    mut call: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0u32;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                let delay = base_delay * 2u32.saturating_pow(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient model failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{ChatModel, LlmError};

    /// Scripted chat double. Returns responses in order; once the script is
    /// exhausted the final entry repeats.
    pub struct MockChat {
        script: Vec<Result<String, LlmError>>,
        cursor: AtomicUsize,
    }

    impl MockChat {
        pub fn scripted(script: Vec<Result<String, LlmError>>) -> Self {
            assert!(!script.is_empty());
            Self {
                script,
                cursor: AtomicUsize::new(0),
            }
        }

        pub fn always(response: &str) -> Self {
            Self::scripted(vec![Ok(response.to_string())])
        }

        pub fn calls(&self) -> usize {
            self.cursor.load(Ordering::SeqCst)
        }
    }

    impl ChatModel for MockChat {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            let i = self.cursor.fetch_add(1, Ordering::SeqCst);
            self.script[i.min(self.script.len() - 1)].clone()
        }
    }
}
