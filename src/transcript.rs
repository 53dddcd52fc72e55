//! Deterministic transcript parsing: raw uploaded text -> Conversation.
//!
//! Recognizes `speaker: message` lines with common labels for the agent
//! and customer sides. Unlabeled lines continue the previous turn.

use crate::models::{Conversation, Speaker, Turn};

/// Maximum accepted transcript length in characters (~25K tokens).
pub const MAX_TRANSCRIPT_CHARS: usize = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("Transcript is empty")]
    Empty,
    #[error("Transcript exceeds {MAX_TRANSCRIPT_CHARS} characters")]
    TooLong,
    #[error("No agent/customer turns could be recognized")]
    NoTurns,
}

const AGENT_LABELS: &[&str] = &["agent", "rep", "representative", "support", "cs", "advisor"];
const CUSTOMER_LABELS: &[&str] = &["customer", "client", "caller", "user", "shopper"];

fn speaker_for_label(label: &str) -> Option<Speaker> {
    let label = label.trim().to_ascii_lowercase();
    if AGENT_LABELS.contains(&label.as_str()) {
        Some(Speaker::Agent)
    } else if CUSTOMER_LABELS.contains(&label.as_str()) {
        Some(Speaker::Customer)
    } else {
        None
    }
}

/// Split a line into a recognized speaker label and the rest, if labeled.
fn split_labeled_line(line: &str) -> Option<(Speaker, &str)> {
    let (label, rest) = line.split_once(':')?;
    // Labels are short words; anything longer is message text with a colon.
    if label.trim().len() > 20 {
        return None;
    }
    let speaker = speaker_for_label(label)?;
    Some((speaker, rest.trim()))
}

/// Parse raw text into an ordered Conversation.
pub fn parse(raw: &str) -> Result<Conversation, TranscriptError> {
    if raw.trim().is_empty() {
        return Err(TranscriptError::Empty);
    }
    if raw.chars().count() > MAX_TRANSCRIPT_CHARS {
        return Err(TranscriptError::TooLong);
    }

    let mut turns: Vec<Turn> = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match split_labeled_line(line) {
            Some((speaker, message)) => {
                if message.is_empty() {
                    continue;
                }
                turns.push(Turn {
                    speaker,
                    message: message.to_string(),
                    timestamp: None,
                });
            }
            None => {
                // Continuation of the previous turn.
                if let Some(last) = turns.last_mut() {
                    last.message.push(' ');
                    last.message.push_str(line);
                }
            }
        }
    }

    if turns.is_empty() {
        return Err(TranscriptError::NoTurns);
    }

    Ok(Conversation::new(turns))
}
