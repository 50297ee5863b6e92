//! Heuristic intent inference from free text.
//!
//! Deliberately isolated behind one pure function so it can be unit-tested
//! apart from routing and budget logic. The result is a guess, never
//! authoritative: explicit `metadata.intent` always wins upstream of this.

use super::Intent;
use crate::api::types::ChatMessage;
use std::collections::HashMap;

/// Built-in markers suggesting the message carries image content.
const VISION_MARKERS: &[&str] = &["data:image", "image_url", "screenshot", "attached image"];

/// Built-in coding keywords checked when no fenced block is present.
const CODE_KEYWORDS: &[&str] = &[
    "stack trace",
    "compile",
    "refactor",
    "unit test",
    "fn ",
    "def ",
    "class ",
    "regex",
    "segfault",
];

/// Built-in multi-step/planning keywords for long-form reasoning.
const REASONING_KEYWORDS: &[&str] = &[
    "step by step",
    "break down",
    "think through",
    "trade-off",
    "tradeoff",
    "pros and cons",
    "plan out",
    "architecture",
];

/// Minimum length before long-form text is considered for `reasoning`.
const REASONING_MIN_CHARS: usize = 600;

/// Classify the latest user message.
///
/// Order: configured keyword lists, then vision markers, then code, then
/// long-form reasoning. Ties and everything unmatched resolve to `chat`.
pub fn infer(messages: &[ChatMessage], extra_keywords: &HashMap<String, Vec<String>>) -> Intent {
    let Some(last_user) = messages.iter().rev().find(|m| m.role == "user") else {
        return Intent::Chat;
    };
    let content = last_user.content.to_lowercase();

    for (intent, keywords) in extra_keywords {
        if let Ok(intent) = intent.parse::<Intent>() {
            if keywords.iter().any(|kw| content.contains(&kw.to_lowercase())) {
                return intent;
            }
        }
    }

    if VISION_MARKERS.iter().any(|m| content.contains(m)) {
        return Intent::Vision;
    }

    if content.contains("```") || CODE_KEYWORDS.iter().any(|kw| content.contains(kw)) {
        return Intent::Code;
    }

    if content.len() >= REASONING_MIN_CHARS
        && REASONING_KEYWORDS.iter().any(|kw| content.contains(kw))
    {
        return Intent::Reasoning;
    }

    Intent::Chat
}
