//! Tract-based extractive QA model.
//!
//! Pure-Rust path: loads an ONNX question-answering model (start/end logits
//! heads) with tract-onnx and tokenizes with the tokenizers crate. No ONNX
//! Runtime or system deps. Callers run it inside `spawn_blocking`.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams, TruncationStrategy};
use tract_onnx::prelude::*;

use super::{decode_spans, span_probabilities, ModelLoader, SpanModel};
use crate::config::ModelConfig;
use crate::models::SpanCandidate;

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";

type RunFn = dyn Fn(TVec<TValue>) -> TractResult<TVec<TValue>> + Send + Sync;

/// Loads `model.onnx` + `tokenizer.json` from `[model].dir`.
pub struct OnnxModelLoader;

impl ModelLoader for OnnxModelLoader {
    fn load(&self, config: &ModelConfig) -> Result<Arc<dyn SpanModel>> {
        Ok(Arc::new(OnnxQaModel::from_dir(&config.dir, config.max_seq_len)?))
    }
}

pub struct OnnxQaModel {
    tokenizer: Tokenizer,
    run: Box<RunFn>,
    input_count: usize,
}

impl OnnxQaModel {
    pub fn from_dir(dir: &Path, max_seq_len: usize) -> Result<Self> {
        let onnx_path = dir.join(MODEL_FILE);
        let tokenizer_path = dir.join(TOKENIZER_FILE);
        for path in [&onnx_path, &tokenizer_path] {
            if !path.exists() {
                bail!("Model file not found: {}", path.display());
            }
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Load tokenizer {}: {}", tokenizer_path.display(), e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_seq_len,
                strategy: TruncationStrategy::OnlySecond,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Configure truncation: {}", e))?;

        let model = tract_onnx::onnx()
            .model_for_path(&onnx_path)
            .with_context(|| format!("Load ONNX: {}", onnx_path.display()))?
            .into_optimized()
            .map_err(|e| anyhow!("Optimize: {}", e))?;
        let input_count = model
            .input_outlets()
            .map_err(|e| anyhow!("Inspect model inputs: {}", e))?
            .len();
        if !(2..=3).contains(&input_count) {
            bail!(
                "Expected a QA model with 2 or 3 inputs (input_ids, attention_mask[, token_type_ids]), found {}",
                input_count
            );
        }
        let plan = model
            .into_runnable()
            .map_err(|e| anyhow!("Build tract runnable: {}", e))?;

        Ok(Self {
            tokenizer,
            run: Box::new(move |inputs| plan.run(inputs)),
            input_count,
        })
    }

    fn logits(&self, encoding: &tokenizers::Encoding) -> Result<(Vec<f32>, Vec<f32>)> {
        let len = encoding.get_ids().len();
        let to_tensor = |values: &[u32]| -> Result<TValue> {
            let data: Vec<i64> = values.iter().map(|&v| v as i64).collect();
            let array = ndarray::Array2::from_shape_vec((1, len), data)
                .map_err(|e| anyhow!("Input shape: {}", e))?;
            let tensor: Tensor = array.into();
            Ok(tensor.into())
        };

        let mut inputs: TVec<TValue> = tvec!(
            to_tensor(encoding.get_ids())?,
            to_tensor(encoding.get_attention_mask())?
        );
        if self.input_count == 3 {
            inputs.push(to_tensor(encoding.get_type_ids())?);
        }

        let outputs = (self.run)(inputs).map_err(|e| anyhow!("QA inference: {}", e))?;
        if outputs.len() < 2 {
            bail!("Expected start and end logits, got {} outputs", outputs.len());
        }
        let flatten = |value: &TValue| -> Result<Vec<f32>> {
            let view = value
                .to_array_view::<f32>()
                .map_err(|e| anyhow!("Output to array: {}", e))?;
            Ok(view.iter().copied().collect())
        };
        Ok((flatten(&outputs[0])?, flatten(&outputs[1])?))
    }
}

impl SpanModel for OnnxQaModel {
    fn spans(
        &self,
        question: &str,
        context: &str,
        top_k: usize,
        max_answer_len: usize,
    ) -> Result<Vec<SpanCandidate>> {
        let encoding = self
            .tokenizer
            .encode((question, context), true)
            .map_err(|e| anyhow!("Tokenize: {}", e))?;

        // Only context tokens can be part of an answer; CLS is never eligible.
        let context_mask: Vec<bool> = encoding
            .get_sequence_ids()
            .iter()
            .map(|id| *id == Some(1))
            .collect();

        let (start_logits, end_logits) = self.logits(&encoding)?;
        if start_logits.len() != context_mask.len() || end_logits.len() != context_mask.len() {
            bail!(
                "Logit length {} does not match sequence length {}",
                start_logits.len(),
                context_mask.len()
            );
        }
        let start_probs = span_probabilities(&start_logits, &context_mask);
        let end_probs = span_probabilities(&end_logits, &context_mask);

        let offsets = encoding.get_offsets();
        let candidates = decode_spans(&start_probs, &end_probs, &context_mask, top_k, max_answer_len)
            .into_iter()
            .filter_map(|(s, e, score)| {
                context
                    .get(offsets[s].0..offsets[e].1)
                    .map(|text| SpanCandidate {
                        text: text.to_string(),
                        score,
                    })
            })
            .collect();

        Ok(candidates)
    }
}
