//! Deterministic grounding gate for generated drafts.
//!
//! Every `FAQ #n` citation in the feedback must point at a reference the
//! generator was actually shown. No model call happens here; verification
//! is pure syntax over the draft text.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{DraftResult, Verdict};
use crate::models::Reference;

static CITATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"FAQ #(\d+)").unwrap());

/// Check a draft against the references it was generated from.
pub fn verify_draft(draft: &DraftResult, references: &[Reference]) -> Verdict {
    if !draft.scores.in_range() {
        return Verdict::Regenerate {
            reason: format!("scores out of range: {:?}", draft.scores.as_array()),
        };
    }

    let mut cited: Vec<u64> = Vec::new();
    for text in citation_surfaces(draft) {
        for capture in CITATION.captures_iter(text) {
            if let Ok(n) = capture[1].parse::<u64>() {
                cited.push(n);
            }
        }
    }

    if references.is_empty() && !cited.is_empty() {
        return Verdict::Regenerate {
            reason: "cites FAQ references but none were provided".into(),
        };
    }

    let max = references.len() as u64;
    if let Some(&bad) = cited.iter().find(|&&n| n == 0 || n > max) {
        return Verdict::Regenerate {
            reason: format!("cites FAQ #{bad} but only {max} references exist"),
        };
    }

    Verdict::Accepted
}

/// Every text field a citation may legitimately appear in.
fn citation_surfaces(draft: &DraftResult) -> impl Iterator<Item = &str> {
    std::iter::once(draft.overall_feedback.as_str())
        .chain(draft.strengths.iter().map(|s| s.as_str()))
        .chain(draft.improvements.iter().flat_map(|i| {
            [i.issue.as_str(), i.suggested.as_str(), i.reason.as_str()]
        }))
}
