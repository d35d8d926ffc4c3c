//! The question-answering service: retrieval followed by span extraction.
//!
//! [`QaService`] owns the fitted [`Retriever`], the loaded QA model, and the
//! [`ScoreHistory`]. One instance is built by the process entry point and
//! shared by handle with every request handler.
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded ──load()──▶ Ready
//!     │                  ▲ │
//!     │ failure          │ │ load() again (reload)
//!     ▼                  │ ▼
//!  Degraded ──load()─────┘
//! ```
//!
//! `predict` only produces real answers in `Ready`. In any other state it
//! first retries the load once, then answers with
//! [`MODEL_NOT_LOADED_ANSWER`](crate::models::MODEL_NOT_LOADED_ANSWER).

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::extraction::{AnswerExtractor, ExtractionSettings, ModelLoader};
use crate::history::ScoreHistory;
use crate::knowledge::load_facts;
use crate::models::Answer;
use crate::retriever::Retriever;

/// Everything needed to answer a question, published atomically.
struct Pipeline {
    retriever: Retriever,
    extractor: AnswerExtractor,
}

enum LoadState {
    Unloaded,
    Degraded { reason: String },
    Ready(Arc<Pipeline>),
}

/// Snapshot of the load state for logging and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    Unloaded,
    Degraded { reason: String },
    Ready { facts: usize },
}

/// What a successful load produced.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub facts: usize,
    pub vocabulary_size: usize,
}

pub struct QaService {
    config: Config,
    loader: Arc<dyn ModelLoader>,
    state: RwLock<LoadState>,
    load_lock: tokio::sync::Mutex<()>,
    /// Finished load attempts, successful or not.
    attempts: AtomicU64,
    history: Arc<ScoreHistory>,
}

impl QaService {
    pub fn new(config: Config, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            config,
            loader,
            state: RwLock::new(LoadState::Unloaded),
            load_lock: tokio::sync::Mutex::new(()),
            attempts: AtomicU64::new(0),
            history: Arc::new(ScoreHistory::new()),
        }
    }

    pub fn history(&self) -> Arc<ScoreHistory> {
        self.history.clone()
    }

    pub fn status(&self) -> LoadStatus {
        match &*self.state.read() {
            LoadState::Unloaded => LoadStatus::Unloaded,
            LoadState::Degraded { reason } => LoadStatus::Degraded {
                reason: reason.clone(),
            },
            LoadState::Ready(p) => LoadStatus::Ready {
                facts: p.retriever.len(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.state.read(), LoadState::Ready(_))
    }

    /// Read the knowledge base, fit the retriever, and load the model.
    ///
    /// On failure the error is logged, the service becomes `Degraded`, and
    /// the error is returned. A previously `Ready` pipeline is replaced only
    /// on success.
    pub async fn load(&self) -> Result<LoadReport> {
        let _guard = self.load_lock.lock().await;
        self.load_locked().await
    }

    /// Load once if not `Ready`.
    ///
    /// Callers queued behind an attempt that finished while they waited take
    /// its outcome instead of loading again.
    pub async fn ensure_loaded(&self) -> bool {
        let seen = self.attempts.load(Ordering::Acquire);
        let _guard = self.load_lock.lock().await;
        if self.is_ready() {
            return true;
        }
        if self.attempts.load(Ordering::Acquire) != seen {
            return false;
        }
        self.load_locked().await.is_ok()
    }

    async fn load_locked(&self) -> Result<LoadReport> {
        tracing::info!(
            knowledge_base = %self.config.knowledge_base.path.display(),
            model = %self.config.model.dir.display(),
            "loading QA pipeline"
        );

        let config = self.config.clone();
        let loader = self.loader.clone();
        let result = tokio::task::spawn_blocking(move || build_pipeline(&config, loader.as_ref()))
            .await
            .context("pipeline load task failed")
            .and_then(|r| r);
        self.attempts.fetch_add(1, Ordering::Release);

        match result {
            Ok(pipeline) => {
                let report = LoadReport {
                    facts: pipeline.retriever.len(),
                    vocabulary_size: pipeline.retriever.vocabulary_size(),
                };
                if report.facts == 0 {
                    tracing::warn!("knowledge base is empty; every question will go unanswered");
                }
                tracing::info!(
                    facts = report.facts,
                    vocabulary = report.vocabulary_size,
                    "QA pipeline ready"
                );
                *self.state.write() = LoadState::Ready(Arc::new(pipeline));
                Ok(report)
            }
            Err(e) => {
                tracing::error!("QA pipeline failed to load: {:#}", e);
                let mut state = self.state.write();
                if !matches!(&*state, LoadState::Ready(_)) {
                    *state = LoadState::Degraded {
                        reason: format!("{:#}", e),
                    };
                }
                Err(e)
            }
        }
    }

    fn pipeline(&self) -> Option<Arc<Pipeline>> {
        match &*self.state.read() {
            LoadState::Ready(p) => Some(p.clone()),
            _ => None,
        }
    }

    /// Answer `question`.
    ///
    /// Degraded states, unmatched questions, and model failures all produce
    /// a fixed answer with score 0. `Err` is reserved for unexpected failures
    /// such as a panicked inference task.
    pub async fn predict(&self, question: &str) -> Result<Answer> {
        let pipeline = match self.pipeline() {
            Some(p) => p,
            None => {
                self.ensure_loaded().await;
                match self.pipeline() {
                    Some(p) => p,
                    None => return Ok(Answer::model_not_loaded()),
                }
            }
        };

        let hit = match pipeline.retriever.query(question) {
            Some(hit) => hit,
            None => return Ok(Answer::no_information()),
        };

        let question_owned = question.to_string();
        let fact = hit.fact.text;
        let outcome = tokio::task::spawn_blocking(move || {
            pipeline.extractor.extract(&question_owned, &fact)
        })
        .await
        .context("answer extraction task failed")?;

        match outcome {
            Ok(answer) => {
                self.history.record(answer.score);
                Ok(answer)
            }
            Err(e) => {
                tracing::error!("answer extraction failed: {:#}", e);
                Ok(Answer::extraction_failed())
            }
        }
    }
}

fn build_pipeline(config: &Config, loader: &dyn ModelLoader) -> Result<Pipeline> {
    let facts = load_facts(&config.knowledge_base.path)?;
    let retriever = Retriever::fit(facts, &config.retrieval);
    let model = loader
        .load(&config.model)
        .with_context(|| format!("Failed to load QA model from {}", config.model.dir.display()))?;
    Ok(Pipeline {
        retriever,
        extractor: AnswerExtractor::new(model, ExtractionSettings::from(&config.model)),
    })
}
