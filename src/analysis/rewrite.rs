//! Query rewriting: condense a conversation into one retrieval query.
//!
//! Rewriting is best effort. Any model failure falls back to the raw
//! customer text so a rewrite outage can never fail an analysis request.

use super::prompt;
use crate::llm::ChatModel;
use crate::models::Conversation;

/// Hard cap on the rewritten query; anything longer is a model going off
/// script and gets replaced by the fallback.
const MAX_QUERY_CHARS: usize = 300;

pub async fn rewrite_query<C: ChatModel>(chat: &C, conversation: &Conversation) -> String {
    let fallback = conversation.customer_text();

    match chat
        .complete(prompt::REWRITE_SYSTEM, &prompt::rewrite_user_prompt(conversation))
        .await
    {
        Ok(raw) => {
            let query = sanitize(&raw);
            if query.is_empty() || query.len() > MAX_QUERY_CHARS {
                tracing::warn!(len = query.len(), "Rewritten query unusable, using raw customer text");
                fallback
            } else {
                tracing::debug!(query = %query, "Query rewritten");
                query
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Query rewrite failed, using raw customer text");
            fallback
        }
    }
}

/// First non-empty line, stripped of wrapping quotes.
fn sanitize(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockChat;
    use crate::llm::LlmError;
    use crate::models::{Speaker, Turn};

    fn conversation() -> Conversation {
        Conversation::new(vec![
            Turn {
                speaker: Speaker::Customer,
                message: "um hi so my package never showed up".into(),
                timestamp: None,
            },
            Turn {
                speaker: Speaker::Agent,
                message: "Let me look into that.".into(),
                timestamp: None,
            },
        ])
    }

    #[tokio::test]
    async fn uses_model_rewrite_when_available() {
        let chat = MockChat::always("missing package delivery status");
        let query = rewrite_query(&chat, &conversation()).await;
        assert_eq!(query, "missing package delivery status");
    }

    #[tokio::test]
    async fn falls_back_on_model_failure() {
        let chat = MockChat::scripted(vec![Err(LlmError::RateLimited)]);
        let query = rewrite_query(&chat, &conversation()).await;
        assert_eq!(query, "um hi so my package never showed up");
    }

    #[tokio::test]
    async fn falls_back_on_empty_rewrite() {
        let chat = MockChat::always("   \n  ");
        let query = rewrite_query(&chat, &conversation()).await;
        assert_eq!(query, "um hi so my package never showed up");
    }

    #[tokio::test]
    async fn falls_back_on_runaway_rewrite() {
        let chat = MockChat::always(&"word ".repeat(200));
        let query = rewrite_query(&chat, &conversation()).await;
        assert_eq!(query, "um hi so my package never showed up");
    }

    #[tokio::test]
    async fn strips_quotes_and_extra_lines() {
        let chat = MockChat::always("\"refund policy window\"\nSecond line ignored");
        let query = rewrite_query(&chat, &conversation()).await;
        assert_eq!(query, "refund policy window");
    }
}
