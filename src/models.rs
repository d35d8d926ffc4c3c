//! Core data models shared by the retrieval and answering pipeline.
//!
//! These types represent the facts, retrieval hits, model spans, and answers
//! that flow from the knowledge base to the HTTP response.

use serde::{Deserialize, Serialize};

/// Returned when no fact clears the similarity threshold.
pub const NO_INFORMATION_ANSWER: &str = "I don't have information about this in my UPM database.";

/// Returned while the pipeline is not ready.
pub const MODEL_NOT_LOADED_ANSWER: &str = "System Error: Model not loaded.";

/// Returned when the QA model fails on a retrieved fact.
pub const EXTRACTION_FAILED_ANSWER: &str = "System Error: Could not extract an answer.";

/// One knowledge-base entry, identified by its position in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub index: usize,
    pub text: String,
}

/// Best-matching fact for a question.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub fact: Fact,
    pub similarity: f32,
}

/// A ranked answer span proposed by the QA model, sliced from the context.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanCandidate {
    pub text: String,
    pub score: f32,
}

/// Result of one predict call, serialized as the `/predict` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub score: f32,
    pub context: Option<String>,
}

impl Answer {
    pub fn no_information() -> Self {
        Self::fixed(NO_INFORMATION_ANSWER)
    }

    pub fn model_not_loaded() -> Self {
        Self::fixed(MODEL_NOT_LOADED_ANSWER)
    }

    pub fn extraction_failed() -> Self {
        Self::fixed(EXTRACTION_FAILED_ANSWER)
    }

    fn fixed(text: &str) -> Self {
        Self {
            answer: text.to_string(),
            score: 0.0,
            context: None,
        }
    }
}
