//! Prompt assembly and answer generation.
//!
//! [`build_prompt`] is a pure function from (question, history,
//! retrieved chunks, budget) to the final prompt string plus the list
//! of chunk ids that actually made it in. [`AnswerAssembler`] wraps it
//! around a [`Generator`] and maintains the in-memory conversation.
//!
//! # Budget
//!
//! When the rendered prompt exceeds `max_prompt_chars`, content is
//! dropped in a fixed order until it fits: lowest-scoring chunks
//! first, then the oldest history turns. The question itself is never
//! truncated or dropped. Citations cover exactly the chunks included
//! in the final prompt, so an answer never cites context the model
//! did not see.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::config::PromptConfig;
use crate::error::Result;
use crate::llm::Generator;
use crate::models::{ConversationTurn, RetrievedChunk};

const SYSTEM_PROMPT: &str = "You are a precise assistant that answers questions using only the \
provided document excerpts. Cite which document each claim comes from. If the excerpts do not \
contain the answer, say so plainly instead of guessing.";

const NO_CONTEXT_NOTICE: &str = "No relevant information was found in the document index.";

/// Render the final prompt within the character budget.
///
/// Returns the prompt and the citation ids of the chunks it includes,
/// in descending score order.
pub fn build_prompt(
    question: &str,
    history: &[ConversationTurn],
    hits: &[RetrievedChunk],
    config: &PromptConfig,
) -> (String, Vec<String>) {
    // One chunk per document: the highest-scoring one, since hits
    // arrive sorted by descending score.
    let mut seen = HashSet::new();
    let mut kept: Vec<&RetrievedChunk> = hits
        .iter()
        .filter(|h| seen.insert(h.document_id.clone()))
        .collect();

    let start = history.len().saturating_sub(config.history_turns);
    let mut window: Vec<&ConversationTurn> = history[start..].iter().collect();

    loop {
        let prompt = render(question, &window, &kept);
        if prompt.chars().count() <= config.max_prompt_chars {
            let cited = kept.iter().map(|c| c.id()).collect();
            return (prompt, cited);
        }
        // kept is in descending score order, so pop drops the weakest.
        if kept.pop().is_some() {
            continue;
        }
        if !window.is_empty() {
            window.remove(0);
            continue;
        }
        // Only the question remains; emit it regardless of budget.
        let prompt = render(question, &window, &kept);
        return (prompt, Vec::new());
    }
}

fn render(question: &str, history: &[&ConversationTurn], chunks: &[&RetrievedChunk]) -> String {
    let mut out = String::from(SYSTEM_PROMPT);
    out.push_str("\n\nContext:\n");

    if chunks.is_empty() {
        out.push_str(NO_CONTEXT_NOTICE);
        out.push('\n');
    } else {
        for (i, chunk) in chunks.iter().enumerate() {
            let _ = write!(
                out,
                "[Document {}]\nSource: {}\nRelevance: {:.2}\nContent:\n{}\n\n",
                i + 1,
                chunk.document_id,
                chunk.score,
                chunk.text
            );
        }
    }

    if !history.is_empty() {
        out.push_str("\nConversation so far:\n");
        for turn in history {
            let _ = write!(out, "Q: {}\nA: {}\n", turn.question, turn.answer);
        }
    }

    let _ = write!(out, "\nQuestion: {}\nAnswer:", question);
    out
}

/// A generated answer with the chunks it was grounded on.
#[derive(Debug)]
pub struct Answer {
    pub text: String,
    /// `"document_id#chunk_index"` for each chunk in the prompt.
    pub cited_chunk_ids: Vec<String>,
}

/// Turns retrieved chunks into an answer via the generation backend.
pub struct AnswerAssembler<'a> {
    generator: &'a dyn Generator,
    config: &'a PromptConfig,
}

impl<'a> AnswerAssembler<'a> {
    pub fn new(generator: &'a dyn Generator, config: &'a PromptConfig) -> Self {
        Self { generator, config }
    }

    /// Build the prompt, call the model, and record the turn.
    ///
    /// On generation failure the error propagates and `history` is
    /// left untouched, so a retry re-asks with identical context.
    pub async fn answer(
        &self,
        question: &str,
        history: &mut Vec<ConversationTurn>,
        hits: &[RetrievedChunk],
    ) -> Result<Answer> {
        let (prompt, cited_chunk_ids) = build_prompt(question, history, hits, self.config);
        tracing::debug!(
            prompt_chars = prompt.chars().count(),
            cited = cited_chunk_ids.len(),
            "sending prompt"
        );

        let text = self.generator.generate(&prompt).await?;

        history.push(ConversationTurn {
            question: question.to_string(),
            answer: text.clone(),
            cited_chunk_ids: cited_chunk_ids.clone(),
        });

        Ok(Answer {
            text,
            cited_chunk_ids,
        })
    }
}
