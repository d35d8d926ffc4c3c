//! Extractive question answering over a single retrieved fact.
//!
//! Defines the [`SpanModel`] trait (a pretrained model that proposes ranked
//! answer spans inside a context), the [`ModelLoader`] trait that builds one,
//! and [`AnswerExtractor`], which wraps a model with the post-processing the
//! service relies on:
//!
//! - the fact is shown to the model as `"<label>: <fact>"`;
//! - candidates whose cleaned text is implausibly short are skipped;
//! - the label is stripped from the returned answer, and the returned
//!   context is the bare fact.
//!
//! # Backends
//!
//! | Loader | Feature |
//! |--------|---------|
//! | `OnnxModelLoader` | `local-qa-tract` (ONNX via tract + tokenizers) |
//! | [`UnavailableLoader`] | used when no backend is compiled in |

#[cfg(feature = "local-qa-tract")]
mod local_tract;

#[cfg(feature = "local-qa-tract")]
pub use local_tract::{OnnxModelLoader, OnnxQaModel};

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::config::ModelConfig;
use crate::models::{Answer, SpanCandidate};

/// A pretrained model that selects answer spans from a context.
pub trait SpanModel: Send + Sync {
    /// Up to `top_k` candidate spans, each at most `max_answer_len` tokens.
    fn spans(
        &self,
        question: &str,
        context: &str,
        top_k: usize,
        max_answer_len: usize,
    ) -> Result<Vec<SpanCandidate>>;
}

/// Builds a [`SpanModel`] from the `[model]` config section.
pub trait ModelLoader: Send + Sync {
    fn load(&self, config: &ModelConfig) -> Result<Arc<dyn SpanModel>>;
}

/// Loader that always fails; used when no model backend is compiled in.
pub struct UnavailableLoader;

impl ModelLoader for UnavailableLoader {
    fn load(&self, _config: &ModelConfig) -> Result<Arc<dyn SpanModel>> {
        bail!("QA model support requires --features local-qa-tract")
    }
}

/// The loader for the compiled-in backend.
pub fn default_loader() -> Arc<dyn ModelLoader> {
    #[cfg(feature = "local-qa-tract")]
    {
        Arc::new(OnnxModelLoader)
    }
    #[cfg(not(feature = "local-qa-tract"))]
    {
        Arc::new(UnavailableLoader)
    }
}

/// Post-processing knobs taken from [`ModelConfig`].
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub top_k: usize,
    pub max_answer_len: usize,
    pub min_answer_chars: usize,
    pub context_label: String,
}

impl From<&ModelConfig> for ExtractionSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            top_k: config.top_k,
            max_answer_len: config.max_answer_len,
            min_answer_chars: config.min_answer_chars,
            context_label: config.context_label.clone(),
        }
    }
}

pub struct AnswerExtractor {
    model: Arc<dyn SpanModel>,
    settings: ExtractionSettings,
}

impl AnswerExtractor {
    pub fn new(model: Arc<dyn SpanModel>, settings: ExtractionSettings) -> Self {
        Self { model, settings }
    }

    /// Answer `question` from `fact`.
    ///
    /// Fails when the model errors or proposes nothing.
    pub fn extract(&self, question: &str, fact: &str) -> Result<Answer> {
        let context = labelled_context(&self.settings.context_label, fact);
        let mut candidates = self.model.spans(
            question,
            &context,
            self.settings.top_k,
            self.settings.max_answer_len,
        )?;
        if candidates.is_empty() {
            bail!("QA model returned no candidate spans");
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let label = &self.settings.context_label;
        let chosen = candidates
            .iter()
            .find(|c| clean_answer(&c.text, label).chars().count() > self.settings.min_answer_chars)
            .unwrap_or(&candidates[0]);

        Ok(Answer {
            answer: clean_answer(&chosen.text, label),
            score: chosen.score,
            context: Some(fact.to_string()),
        })
    }
}

fn labelled_context(label: &str, fact: &str) -> String {
    if label.is_empty() {
        fact.to_string()
    } else {
        format!("{}: {}", label, fact)
    }
}

/// Strip the context label and stray `:`/whitespace from a model span.
pub fn clean_answer(raw: &str, label: &str) -> String {
    let trimmed = raw.trim();
    let without_label = if label.is_empty() {
        trimmed
    } else {
        trimmed.strip_prefix(label).unwrap_or(trimmed)
    };
    without_label
        .trim_matches(|c: char| c == ':' || c.is_whitespace())
        .to_string()
}

/// Rank answer spans from per-token start/end probabilities.
///
/// Only tokens flagged in `context_mask` may start or end a span. Spans
/// satisfy `start <= end` and `end - start + 1 <= max_answer_len`; the score of
/// a span is `p_start[start] * p_end[end]`. Returns up to `top_k` token index
/// pairs, best first.
pub fn decode_spans(
    start_probs: &[f32],
    end_probs: &[f32],
    context_mask: &[bool],
    top_k: usize,
    max_answer_len: usize,
) -> Vec<(usize, usize, f32)> {
    let n = start_probs.len().min(end_probs.len()).min(context_mask.len());
    let mut spans = Vec::new();
    for s in (0..n).filter(|&i| context_mask[i]) {
        let last = (s + max_answer_len).min(n);
        for e in (s..last).filter(|&i| context_mask[i]) {
            spans.push((s, e, start_probs[s] * end_probs[e]));
        }
    }
    spans.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    spans.truncate(top_k);
    spans
}

/// Start or end probabilities for span decoding.
///
/// CLS (token 0) is part of the normalisation, then zeroed so it can never
/// be chosen. Other tokens outside `context_mask` get no mass.
pub fn span_probabilities(logits: &[f32], context_mask: &[bool]) -> Vec<f32> {
    let mask: Vec<bool> = context_mask
        .iter()
        .enumerate()
        .map(|(i, &m)| m || i == 0)
        .collect();
    let mut probs = masked_softmax(logits, &mask);
    if let (Some(cls), Some(false)) = (probs.first_mut(), context_mask.first()) {
        *cls = 0.0;
    }
    probs
}

/// Softmax over the logits with masked positions excluded.
pub fn masked_softmax(logits: &[f32], mask: &[bool]) -> Vec<f32> {
    let max = logits
        .iter()
        .zip(mask)
        .filter(|&(_, &m)| m)
        .map(|(&l, _)| l)
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f32> = logits
        .iter()
        .zip(mask)
        .map(|(&l, &m)| if m { (l - max).exp() } else { 0.0 })
        .collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum).collect()
}
