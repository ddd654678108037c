
use super::{ChatMessage, GenerationRequest};
use crate::retrieval::RetrievalResult;

pub const STRICT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Answer the user's question based ONLY on the provided context.";

pub const OPEN_SYSTEM_PROMPT: &str = "You are a creative AI assistant. Use the provided context to answer the user's question, but you can also add your own insights.";

/// Answer given in strict mode when nothing was retrieved
pub const NO_INFORMATION_RESPONSE: &str =
    "I couldn't find any relevant information in your documents to answer this question.";

pub const DEFAULT_HISTORY_WINDOW: usize = 5;

/// What the builder decided for one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    /// Strict mode with no retrieved context; answer without calling the model
    NoContext,
    /// Send this request to the model
    Request(GenerationRequest),
}

/// Assembles model requests from retrieved context and recent history
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    history_window: usize,
}

impl Default for PromptBuilder {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl PromptBuilder {
    #[inline]
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    #[inline]
    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Build the request: system instruction, the most recent history turns
    /// in their original order, then the context-bearing user turn
    #[inline]
    pub fn build(
        &self,
        question: &str,
        results: &[RetrievalResult],
        history: &[ChatMessage],
        strict: bool,
    ) -> PromptOutcome {
        if strict && results.is_empty() {
            return PromptOutcome::NoContext;
        }

        let system = if strict {
            STRICT_SYSTEM_PROMPT
        } else {
            OPEN_SYSTEM_PROMPT
        };

        let recent = &history[history.len().saturating_sub(self.history_window)..];

        let mut messages = Vec::with_capacity(recent.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend_from_slice(recent);
        messages.push(ChatMessage::user(user_turn(question, results)));

        PromptOutcome::Request(GenerationRequest { messages })
    }
}

/// `Source (<name>): <text>` blocks separated by blank lines
#[inline]
pub fn format_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| format!("Source ({}): {}", r.source, r.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn user_turn(question: &str, results: &[RetrievalResult]) -> String {
    format!(
        "Context:\n{}\n\nUser Question: {}\n",
        format_context(results),
        question
    )
}
