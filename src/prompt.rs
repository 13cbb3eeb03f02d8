// src/prompt.rs
//! Prompt strategy ladder: ordered fallback from the richest prompt to the
//! tersest one, stopping at the first response the parser can use.
//!
//! Richer prompts are more likely to return a parseable answer; terser ones
//! are cheaper and less likely to be refused or truncated. Token budgets are
//! non-increasing down the ladder so a failed rung never costs more than the
//! one before it.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::gemini::{FinishReason, TextGenClient};
use crate::model::PriceSearchResult;
use crate::parse;

/// One concrete prompt to send: text, budget, and a label for diagnostics.
#[derive(Debug, Clone)]
pub struct PromptAttempt {
    pub prompt: String,
    pub max_output_tokens: u32,
    pub label: &'static str,
}

/// A rung of the ladder. `build` may decline (e.g. nothing usable is left
/// of the name after cleaning); the ladder then moves on.
pub trait PromptStrategy: Send + Sync {
    fn label(&self) -> &'static str;
    fn build(&self, product_name: &str) -> Option<PromptAttempt>;
}

static STOP_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:with|and|for|the|in|on|at|of|by|from)\b").expect("stop-word regex")
});
static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("non-alnum regex"));
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Strip stop-words and punctuation, collapse whitespace.
pub fn clean_product_name(name: &str) -> String {
    let no_stop = STOP_WORDS.replace_all(name, "");
    let alnum = NON_ALNUM.replace_all(&no_stop, "");
    MULTI_SPACE.replace_all(&alnum, " ").trim().to_string()
}

/// Clip to at most `max_chars`, cutting at word boundaries.
fn clip_words(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for word in s.split_whitespace() {
        let needed = if out.is_empty() { word.len() } else { word.len() + 1 };
        if out.len() + needed > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    // A single over-long word still has to yield something.
    if out.is_empty() {
        out = s.chars().take(max_chars).collect();
    }
    out.trim().to_string()
}

/// Full request naming the target retailers and asking for a buy link.
pub struct StandardPrompt;

impl PromptStrategy for StandardPrompt {
    fn label(&self) -> &'static str {
        "standard"
    }

    fn build(&self, product_name: &str) -> Option<PromptAttempt> {
        let clean = clean_product_name(product_name);
        if clean.is_empty() {
            return None;
        }
        Some(PromptAttempt {
            prompt: format!(
                "find lowest current price {clean} online shopping Flipkart Amazon Myntra Nykaa Ajio Blinkit Mamaearth Shopsy with buy link"
            ),
            max_output_tokens: 400,
            label: self.label(),
        })
    }
}

/// Bare name plus a currency symbol.
pub struct MinimalPrompt;

impl PromptStrategy for MinimalPrompt {
    fn label(&self) -> &'static str {
        "minimal"
    }

    fn build(&self, product_name: &str) -> Option<PromptAttempt> {
        let clean = clean_product_name(product_name);
        if clean.is_empty() {
            return None;
        }
        Some(PromptAttempt {
            prompt: format!("{clean} ₹"),
            max_output_tokens: 200,
            label: self.label(),
        })
    }
}

/// Cleaned name clipped to 40 characters.
pub struct TruncatedPrompt;

impl PromptStrategy for TruncatedPrompt {
    fn label(&self) -> &'static str {
        "truncated"
    }

    fn build(&self, product_name: &str) -> Option<PromptAttempt> {
        let clean = clean_product_name(product_name);
        if clean.is_empty() {
            return None;
        }
        Some(PromptAttempt {
            prompt: format!("{} ₹", clip_words(&clean, 40)),
            max_output_tokens: 150,
            label: self.label(),
        })
    }
}

/// First three words of the cleaned name.
pub struct FirstWordsPrompt;

impl PromptStrategy for FirstWordsPrompt {
    fn label(&self) -> &'static str {
        "first-words"
    }

    fn build(&self, product_name: &str) -> Option<PromptAttempt> {
        let clean = clean_product_name(product_name);
        let head: Vec<&str> = clean.split_whitespace().take(3).collect();
        if head.is_empty() {
            return None;
        }
        Some(PromptAttempt {
            prompt: format!("{} price", head.join(" ")),
            max_output_tokens: 120,
            label: self.label(),
        })
    }
}

/// Single most distinctive (longest) word of the cleaned name.
pub struct DistinctiveWordPrompt;

impl PromptStrategy for DistinctiveWordPrompt {
    fn label(&self) -> &'static str {
        "distinctive-word"
    }

    fn build(&self, product_name: &str) -> Option<PromptAttempt> {
        let clean = clean_product_name(product_name);
        let word = clean.split_whitespace().max_by_key(|w| w.len())?;
        Some(PromptAttempt {
            prompt: format!("{word} price India"),
            max_output_tokens: 100,
            label: self.label(),
        })
    }
}

/// The ladder itself: tries each strategy in order, short-circuiting on the
/// first response that yields a plausible price.
pub struct PriceSearchLadder {
    client: Arc<dyn TextGenClient>,
    strategies: Vec<Box<dyn PromptStrategy>>,
}

impl PriceSearchLadder {
    /// Default rung order, richest first.
    pub fn new(client: Arc<dyn TextGenClient>) -> Self {
        Self::with_strategies(
            client,
            vec![
                Box::new(StandardPrompt),
                Box::new(MinimalPrompt),
                Box::new(TruncatedPrompt),
                Box::new(FirstWordsPrompt),
                Box::new(DistinctiveWordPrompt),
            ],
        )
    }

    /// Custom rungs, used by tests and by callers that want a shorter ladder.
    pub fn with_strategies(
        client: Arc<dyn TextGenClient>,
        strategies: Vec<Box<dyn PromptStrategy>>,
    ) -> Self {
        Self { client, strategies }
    }

    pub async fn search(&self, product_name: &str) -> PriceSearchResult {
        for strategy in &self.strategies {
            let Some(attempt) = strategy.build(product_name) else {
                debug!(strategy = strategy.label(), "strategy declined to build a prompt");
                continue;
            };

            let generated = match self
                .client
                .generate(&attempt.prompt, attempt.max_output_tokens)
                .await
            {
                Ok(g) => g,
                Err(e) => {
                    warn!(
                        strategy = attempt.label,
                        product = product_name,
                        error = %e,
                        "generation attempt failed"
                    );
                    continue;
                }
            };

            match generated.finish_reason {
                FinishReason::Safety => {
                    // Same wording will block again; the next rung rephrases.
                    debug!(strategy = attempt.label, "safety block, trying next wording");
                    continue;
                }
                FinishReason::MaxTokens => {
                    debug!(strategy = attempt.label, "truncated response, parsing partial text");
                }
                FinishReason::Stop | FinishReason::Other => {}
            }

            if generated.text.is_empty() {
                continue;
            }

            if let Some(price) = parse::extract_price(&generated.text) {
                let platform = parse::extract_platform(&generated.text).map(str::to_string);
                let deep_link = parse::extract_deep_link(&generated.text);
                info!(
                    strategy = attempt.label,
                    product = product_name,
                    price,
                    platform = platform.as_deref().unwrap_or("-"),
                    "price found"
                );
                return PriceSearchResult::found(price, platform, deep_link);
            }
        }

        PriceSearchResult::failed()
    }
}
