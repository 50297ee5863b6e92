//! Context-window compaction with pinning and summarization.
//!
//! Reduces an incoming message list to fit token budgets. Loss is bounded
//! and ordered: noise first, then rolling summaries of the oldest spans,
//! then outright drops, and only as a documented last resort pinned
//! content. System messages are never touched.

pub mod journal;
pub mod pins;
pub mod summarize;

pub use journal::{SummaryEntry, SummaryJournal};
pub use pins::{PinStore, PinnedItem};
pub use summarize::{Summarizer, TierSummarizer};

use crate::api::types::ChatMessage;
use crate::config::{ContextConfig, TokenLimits, TokensConfig};
use crate::estimate;
use crate::registry::Tier;
use crate::routing::Priority;
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Content prefix tagging a synthetic summary message.
pub const SUMMARY_MARKER: &str = "[Conversation summary]";

/// Reduction step applied during one compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompactionMethod {
    Keep,
    Summarize,
    Drop,
}

/// What one compaction did, for logging and assertions.
#[derive(Debug, Clone, Serialize)]
pub struct CompactionStats {
    pub tokens_before: u32,
    pub tokens_after: u32,
    /// Ordered sequence of steps applied.
    pub methods: Vec<CompactionMethod>,
    /// Whether every pinned item that entered compaction is still present.
    pub pinned_included: bool,
    /// Whether the hard backstop had to drop pinned content.
    pub pinned_dropped: bool,
    pub summarizer_tier: Option<Tier>,
}

pub struct Compactor {
    context: ContextConfig,
    tokens: TokensConfig,
    pins: Arc<PinStore>,
    journal: Arc<SummaryJournal>,
    summarizer: Arc<dyn Summarizer>,
    banners: Vec<Regex>,
}

impl Compactor {
    pub fn new(
        context: ContextConfig,
        tokens: TokensConfig,
        pins: Arc<PinStore>,
        journal: Arc<SummaryJournal>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        // Patterns were validated at startup; a bad one here is skipped.
        let banners = context
            .banner_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            context,
            tokens,
            pins,
            journal,
            summarizer,
            banners,
        }
    }

    fn is_protected(message: &ChatMessage) -> bool {
        message.is_system() || message.is_pinned()
    }

    fn is_summary(message: &ChatMessage) -> bool {
        message.role == "assistant" && message.content.starts_with(SUMMARY_MARKER)
    }

    /// Oldest contiguous run of summarizable messages, as (start, len).
    fn oldest_span(&self, working: &[ChatMessage]) -> Option<(usize, usize)> {
        let candidate = |m: &ChatMessage| !Self::is_protected(m) && !Self::is_summary(m);
        let start = working.iter().position(candidate)?;
        let len = working[start..]
            .iter()
            .take_while(|m| candidate(m))
            .take(self.context.span_max_messages)
            .count();
        Some((start, len))
    }

    /// Compact `messages` to fit `limits`.
    ///
    /// Never fails: summarizer trouble degrades to dropping, and the hard
    /// backstop guarantees progress. The caller logs the returned stats.
    pub async fn compact(
        &self,
        messages: &[ChatMessage],
        limits: TokenLimits,
        priority: Priority,
    ) -> (Vec<ChatMessage>, CompactionStats) {
        let margin = self.tokens.safety_margin_percent;

        // Capture any newly pinned messages into durable storage.
        for message in messages.iter().filter(|m| m.is_pinned()) {
            if let Err(e) = self.pins.record(&message.content).await {
                tracing::warn!(error = %e, "Failed to persist pin");
            }
        }

        // Working list: behavior snapshot, stored pins missing from the
        // conversation, then the conversation itself.
        let mut working: Vec<ChatMessage> = Vec::new();
        if !self.context.behavior_rules.is_empty() {
            working.push(ChatMessage::system(self.context.behavior_rules.clone()));
        }
        let present: HashSet<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        for pin in self.pins.all().await {
            if !present.contains(pin.text.as_str()) {
                working.push(ChatMessage::user(pin.text));
            }
        }
        working.extend(messages.iter().cloned());

        let tokens_before = estimate::approx_message_tokens(&working, margin);
        let entering_pins: Vec<String> = working
            .iter()
            .filter(|m| m.is_pinned() && !m.is_system())
            .map(|m| m.content.clone())
            .collect();

        // Noise pass: duplicate assistant bodies, oversized blocks, banners.
        let mut seen_assistant: HashSet<String> = HashSet::new();
        let max_block_chars = self.context.max_block_chars;
        let banners = &self.banners;
        working.retain(|m| {
            if Self::is_protected(m) {
                return true;
            }
            if banners.iter().any(|re| re.is_match(&m.content)) {
                return false;
            }
            if m.content.len() > max_block_chars {
                return false;
            }
            if m.role == "assistant" && !seen_assistant.insert(m.content.clone()) {
                return false;
            }
            true
        });

        let mut tokens = estimate::approx_message_tokens(&working, margin);
        let mut methods = Vec::new();
        let mut summarizer_tier = None;
        let mut pinned_dropped = false;

        if tokens <= limits.target_input_tokens {
            methods.push(CompactionMethod::Keep);
        } else {
            // Rolling summaries over the oldest spans.
            let tier = match priority {
                Priority::High => self.context.summarizer_tier_high,
                _ => self.context.summarizer_tier,
            };
            while tokens > limits.target_input_tokens {
                let Some((start, len)) = self.oldest_span(&working) else {
                    break;
                };
                if len < 2 {
                    break;
                }
                let span_text = working[start..start + len]
                    .iter()
                    .map(|m| format!("{}: {}", m.role, m.content))
                    .collect::<Vec<_>>()
                    .join("\n");

                match self
                    .summarizer
                    .summarize(
                        &span_text,
                        tier,
                        self.tokens.summary_min_tokens,
                        self.tokens.summary_max_tokens,
                    )
                    .await
                {
                    Ok(text) => {
                        let entry = SummaryEntry {
                            written_at: Utc::now(),
                            span_messages: len,
                            tier,
                            text: text.clone(),
                        };
                        if let Err(e) = self.journal.append(&entry).await {
                            tracing::warn!(error = %e, "Failed to journal summary");
                        }

                        let summary =
                            ChatMessage::assistant(format!("{} {}", SUMMARY_MARKER, text.trim()));
                        working.splice(start..start + len, [summary]);
                        methods.push(CompactionMethod::Summarize);
                        summarizer_tier = Some(tier);

                        let after = estimate::approx_message_tokens(&working, margin);
                        if after >= tokens {
                            // Summary did not shrink the span; stop before looping.
                            tokens = after;
                            break;
                        }
                        tokens = after;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e.sanitized(), "Summarization unavailable, degrading to drop");
                        break;
                    }
                }
            }

            // Drop oldest unprotected content down to the target.
            let mut dropped = false;
            while tokens > limits.target_input_tokens {
                let Some(idx) = working.iter().position(|m| !Self::is_protected(m)) else {
                    break;
                };
                working.remove(idx);
                dropped = true;
                tokens = estimate::approx_message_tokens(&working, margin);
            }

            // Hard backstop: pinned content goes last, and loudly.
            while tokens > limits.hard_max_input_tokens {
                if let Some(idx) = working.iter().position(|m| !Self::is_protected(m)) {
                    working.remove(idx);
                    dropped = true;
                } else if let Some(idx) = working
                    .iter()
                    .position(|m| m.is_pinned() && !m.is_system())
                {
                    tracing::warn!(
                        hard_max = limits.hard_max_input_tokens,
                        "Dropping pinned content to honor hard token ceiling"
                    );
                    working.remove(idx);
                    dropped = true;
                    pinned_dropped = true;
                } else {
                    // Only system content remains; the pathological case.
                    break;
                }
                tokens = estimate::approx_message_tokens(&working, margin);
            }

            if dropped {
                methods.push(CompactionMethod::Drop);
            }
            if methods.is_empty() {
                // Nothing was applicable (everything protected, under hard max).
                methods.push(CompactionMethod::Keep);
            }
        }

        let pinned_included = entering_pins
            .iter()
            .all(|content| working.iter().any(|m| &m.content == content));

        let stats = CompactionStats {
            tokens_before,
            tokens_after: tokens,
            methods,
            pinned_included,
            pinned_dropped,
            summarizer_tier,
        };
        (working, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use async_trait::async_trait;

    struct StubSummarizer {
        fail: bool,
    }

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize(
            &self,
            _text: &str,
            _tier: Tier,
            _min_tokens: u32,
            _max_tokens: u32,
        ) -> Result<String, ProviderError> {
            if self.fail {
                Err(ProviderError::Upstream {
                    status: 500,
                    message: "down".to_string(),
                })
            } else {
                Ok("Earlier the user and assistant discussed ongoing work.".to_string())
            }
        }
    }

    async fn compactor_with(
        context: ContextConfig,
        fail_summarizer: bool,
        dir: &tempfile::TempDir,
    ) -> Compactor {
        let pins = Arc::new(
            PinStore::load(dir.path().join("pins.jsonl")).await.unwrap(),
        );
        let journal = Arc::new(SummaryJournal::new(dir.path().join("summaries")));
        Compactor::new(
            context,
            TokensConfig::default(),
            pins,
            journal,
            Arc::new(StubSummarizer {
                fail: fail_summarizer,
            }),
        )
    }

    fn limits(target: u32, hard: u32) -> TokenLimits {
        TokenLimits {
            target_input_tokens: target,
            hard_max_input_tokens: hard,
        }
    }

    /// Alternating user/assistant turns totalling roughly `chars` characters.
    fn conversation(chars: usize, turn_chars: usize) -> Vec<ChatMessage> {
        let turns = chars.div_ceil(turn_chars);
        (0..turns)
            .map(|i| {
                let body = format!("turn {} {}", i, "lorem ipsum ".repeat(turn_chars / 12));
                if i % 2 == 0 {
                    ChatMessage::user(body)
                } else {
                    ChatMessage::assistant(body)
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn small_context_is_kept_verbatim() {
        // ~12,000 chars ≈ 3,300 tokens with margin: well under the target.
        let dir = tempfile::tempdir().unwrap();
        let compactor = compactor_with(ContextConfig::default(), false, &dir).await;

        let mut messages = conversation(12_000, 400);
        messages.push(ChatMessage::user("[PIN] the garage code is 4912"));

        let (out, stats) = compactor
            .compact(&messages, limits(6000, 10_000), Priority::Normal)
            .await;

        assert_eq!(stats.methods, vec![CompactionMethod::Keep]);
        assert!(stats.pinned_included);
        assert!(!stats.pinned_dropped);
        assert!(out.iter().any(|m| m.content.contains("garage code")));
        assert!(stats.tokens_after <= 6000);
    }

    #[tokio::test]
    async fn oversized_context_is_summarized_under_hard_max() {
        // ~145,000 chars ≈ 40,000 tokens with margin.
        let dir = tempfile::tempdir().unwrap();
        let compactor = compactor_with(ContextConfig::default(), false, &dir).await;

        let mut messages = conversation(145_000, 1400);
        messages.push(ChatMessage::user("[PIN] rent is due on the 3rd"));
        messages.push(ChatMessage::user("what did we decide about the server?"));

        let (out, stats) = compactor
            .compact(&messages, limits(6000, 10_000), Priority::Normal)
            .await;

        assert!(stats.tokens_before > 30_000);
        assert!(stats.tokens_after <= 10_000);
        assert!(stats.methods.contains(&CompactionMethod::Summarize));
        assert_eq!(stats.summarizer_tier, Some(Tier::FallbackCheap));
        assert!(stats.pinned_included);
        assert!(out.iter().any(|m| m.content.starts_with(SUMMARY_MARKER)));
        assert!(out.iter().any(|m| m.content.contains("rent is due")));
    }

    #[tokio::test]
    async fn high_priority_uses_configured_higher_tier() {
        let dir = tempfile::tempdir().unwrap();
        let compactor = compactor_with(ContextConfig::default(), false, &dir).await;

        let messages = conversation(60_000, 1000);
        let (_, stats) = compactor
            .compact(&messages, limits(6000, 10_000), Priority::High)
            .await;

        assert_eq!(stats.summarizer_tier, Some(Tier::CheapChat));
    }

    #[tokio::test]
    async fn summarizer_failure_degrades_to_drop() {
        let dir = tempfile::tempdir().unwrap();
        let compactor = compactor_with(ContextConfig::default(), true, &dir).await;

        let messages = conversation(60_000, 1000);
        let (_, stats) = compactor
            .compact(&messages, limits(6000, 10_000), Priority::Normal)
            .await;

        assert!(stats.methods.contains(&CompactionMethod::Drop));
        assert!(!stats.methods.contains(&CompactionMethod::Summarize));
        assert!(stats.tokens_after <= 6000);
    }

    #[tokio::test]
    async fn stored_pins_are_injected_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let compactor = compactor_with(ContextConfig::default(), false, &dir).await;

        // First request captures the pin, second arrives without it.
        let first = vec![ChatMessage::user("[PIN] allergy: penicillin")];
        compactor
            .compact(&first, limits(6000, 10_000), Priority::Normal)
            .await;

        let second = vec![ChatMessage::user("anything I should tell the doctor?")];
        let (out, stats) = compactor
            .compact(&second, limits(6000, 10_000), Priority::Normal)
            .await;

        assert!(out.iter().any(|m| m.content.contains("penicillin")));
        assert!(stats.pinned_included);
    }

    #[tokio::test]
    async fn behavior_rules_are_injected_as_system_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let context = ContextConfig {
            behavior_rules: "Be brief. Never share credentials.".to_string(),
            ..Default::default()
        };
        let compactor = compactor_with(context, false, &dir).await;

        let (out, _) = compactor
            .compact(
                &[ChatMessage::user("hi")],
                limits(6000, 10_000),
                Priority::Normal,
            )
            .await;

        assert!(out[0].is_system());
        assert!(out[0].content.contains("Never share credentials"));
    }

    #[tokio::test]
    async fn noise_pass_strips_duplicates_banners_and_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let context = ContextConfig {
            banner_patterns: vec!["^=+ session start =+$".to_string()],
            max_block_chars: 500,
            ..Default::default()
        };
        let compactor = compactor_with(context, false, &dir).await;

        let messages = vec![
            ChatMessage::user("== session start =="),
            ChatMessage::assistant("same answer"),
            ChatMessage::assistant("same answer"),
            ChatMessage::assistant("x".repeat(900)),
            ChatMessage::user("real question"),
        ];
        let (out, _) = compactor
            .compact(&messages, limits(6000, 10_000), Priority::Normal)
            .await;

        assert_eq!(
            out.iter().filter(|m| m.content == "same answer").count(),
            1
        );
        assert!(!out.iter().any(|m| m.content.contains("session start")));
        assert!(!out.iter().any(|m| m.content.len() > 500));
        assert!(out.iter().any(|m| m.content == "real question"));
    }

    #[tokio::test]
    async fn backstop_drops_pinned_content_last_and_flags_it() {
        let dir = tempfile::tempdir().unwrap();
        let context = ContextConfig {
            // Keep oversized-block stripping out of the way: pins are huge here.
            max_block_chars: 100_000,
            ..Default::default()
        };
        let compactor = compactor_with(context, false, &dir).await;

        // Three pins of ~20k chars each ≈ 5,500 tokens apiece.
        let mut messages: Vec<ChatMessage> = (0..3)
            .map(|i| ChatMessage::user(format!("[PIN] {} {}", i, "huge note ".repeat(2000))))
            .collect();
        messages.push(ChatMessage::user("small question"));

        let (out, stats) = compactor
            .compact(&messages, limits(6000, 10_000), Priority::Normal)
            .await;

        assert!(stats.pinned_dropped);
        assert!(!stats.pinned_included);
        assert!(stats.tokens_after <= 10_000);
        // The oldest pin goes first.
        assert!(!out.iter().any(|m| m.content.starts_with("[PIN] 0")));
    }
}
