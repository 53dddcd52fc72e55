//! Prompt assembly for query rewriting and draft generation.

use std::fmt::Write;

use crate::models::{Conversation, Reference};

pub const REWRITE_SYSTEM: &str = "\
You turn a customer-service conversation into one short search query for a \
company knowledge base. Reply with the query only: no quotes, no explanation, \
one line.";

pub const GENERATE_SYSTEM: &str = "\
You are a customer-service quality coach. You assess how well an agent \
handled a conversation, scoring six dimensions from 1 to 10: clarification, \
empathy_tone, solution_accuracy, actionability, confirmation_closure and \
compliance_safety. You reply with a single JSON object and nothing else, \
matching exactly this shape:

{
  \"scores\": {
    \"clarification\": 1-10,
    \"empathy_tone\": 1-10,
    \"solution_accuracy\": 1-10,
    \"actionability\": 1-10,
    \"confirmation_closure\": 1-10,
    \"compliance_safety\": 1-10
  },
  \"strengths\": [\"...\"],
  \"improvements\": [
    {
      \"issue\": \"...\",
      \"original\": \"what the agent said\",
      \"suggested\": \"what the agent should have said\",
      \"reason\": \"...\",
      \"priority\": \"critical\" | \"important\" | \"nice_to_have\"
    }
  ],
  \"overall_feedback\": \"...\"
}

When company FAQ references are provided, judge solution_accuracy against \
them and cite the ones you rely on as FAQ #1, FAQ #2 and so on, using only \
the numbers provided. When no references are provided, cite nothing.";

pub fn rewrite_user_prompt(conversation: &Conversation) -> String {
    let mut prompt = String::from("Conversation:\n");
    render_transcript(&mut prompt, conversation);
    prompt.push_str("\nSearch query:");
    prompt
}

pub fn generate_user_prompt(conversation: &Conversation, references: &[Reference]) -> String {
    let mut prompt = String::new();

    if references.is_empty() {
        prompt.push_str("No company FAQ references are available for this conversation.\n\n");
    } else {
        prompt.push_str("Company FAQ references:\n\n");
        for (i, reference) in references.iter().enumerate() {
            let _ = writeln!(
                prompt,
                "FAQ #{} (source: {})\n{}\n",
                i + 1,
                reference.source_name,
                reference.content.trim()
            );
        }
    }

    prompt.push_str("Conversation to assess:\n");
    render_transcript(&mut prompt, conversation);
    prompt.push_str("\nAssess the agent's handling and reply with the JSON object.");
    prompt
}

fn render_transcript(out: &mut String, conversation: &Conversation) {
    for turn in &conversation.turns {
        let _ = writeln!(out, "{}: {}", turn.speaker, turn.message);
    }
}
