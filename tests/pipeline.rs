//! Orchestrator behaviour with stub QA models.
//!
//! The stubs count how often the model is loaded and queried so the tests
//! can prove when inference is (and is not) reached.

use anyhow::{bail, Result};
use axiomus::config::{Config, ModelConfig};
use axiomus::extraction::{ModelLoader, SpanModel};
use axiomus::models::{
    SpanCandidate, EXTRACTION_FAILED_ANSWER, MODEL_NOT_LOADED_ANSWER, NO_INFORMATION_ANSWER,
};
use axiomus::service::{LoadStatus, QaService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ─── Stubs ──────────────────────────────────────────────────────────

/// Answers with the last word of the context.
struct LastWordModel {
    calls: Arc<AtomicUsize>,
    contexts: Arc<parking_lot::Mutex<Vec<String>>>,
    fail: bool,
}

impl SpanModel for LastWordModel {
    fn spans(&self, _q: &str, context: &str, _k: usize, _l: usize) -> Result<Vec<SpanCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().push(context.to_string());
        if self.fail {
            bail!("inference exploded");
        }
        let word = context
            .split_whitespace()
            .last()
            .unwrap_or("")
            .trim_end_matches('.');
        Ok(vec![SpanCandidate {
            text: word.to_string(),
            score: 0.8,
        }])
    }
}

#[derive(Default)]
struct StubLoader {
    loads: Arc<AtomicUsize>,
    spans: Arc<AtomicUsize>,
    contexts: Arc<parking_lot::Mutex<Vec<String>>>,
    /// Number of initial load attempts that fail.
    failures: usize,
    model_fails: bool,
    load_delay: Duration,
}

impl ModelLoader for StubLoader {
    fn load(&self, _config: &ModelConfig) -> Result<Arc<dyn SpanModel>> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.load_delay);
        if attempt < self.failures {
            bail!("model files missing");
        }
        Ok(Arc::new(LastWordModel {
            calls: self.spans.clone(),
            contexts: self.contexts.clone(),
            fail: self.model_fails,
        }))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn write_kb(tmp: &TempDir, facts: &[&str]) -> Config {
    let path = tmp.path().join("knowledge_base.json");
    let records: Vec<_> = facts
        .iter()
        .map(|t| serde_json::json!({ "text": t }))
        .collect();
    std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();
    let mut cfg = Config::minimal();
    cfg.knowledge_base.path = path;
    cfg
}

fn service(cfg: Config, loader: StubLoader) -> (QaService, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let loads = loader.loads.clone();
    let spans = loader.spans.clone();
    (QaService::new(cfg, Arc::new(loader)), loads, spans)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_answers_from_single_fact() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_kb(&tmp, &["The ETSII is located in Madrid."]);
    let loader = StubLoader::default();
    let contexts = loader.contexts.clone();
    let (svc, _, spans) = service(cfg, loader);

    let report = svc.load().await.unwrap();
    assert_eq!(report.facts, 1);

    let answer = svc.predict("Where is ETSII?").await.unwrap();
    assert!(answer.answer.contains("Madrid"));
    assert!(answer.score > 0.0);
    assert_eq!(answer.context.as_deref(), Some("The ETSII is located in Madrid."));
    assert_eq!(spans.load(Ordering::SeqCst), 1);
    assert_eq!(
        contexts.lock().as_slice(),
        ["Agent: The ETSII is located in Madrid.".to_string()]
    );
    assert_eq!(svc.history().len(), 1);
}

#[tokio::test]
async fn test_unrelated_question_skips_model() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_kb(&tmp, &["The ETSII is located in Madrid."]);
    let (svc, _, spans) = service(cfg, StubLoader::default());
    svc.load().await.unwrap();

    let answer = svc.predict("What is the capital of France?").await.unwrap();
    assert_eq!(answer.answer, NO_INFORMATION_ANSWER);
    assert_eq!(answer.score, 0.0);
    assert!(answer.context.is_none());
    assert_eq!(spans.load(Ordering::SeqCst), 0);
    assert!(svc.history().is_empty());
}

#[tokio::test]
async fn test_history_counts_successful_predictions() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_kb(
        &tmp,
        &["The ETSII is located in Madrid.", "UPM was founded in 1971."],
    );
    let (svc, _, spans) = service(cfg, StubLoader::default());
    svc.load().await.unwrap();

    for q in ["Where is ETSII?", "When was UPM founded?", "capital of France", "ETSII"] {
        svc.predict(q).await.unwrap();
    }
    assert_eq!(svc.history().len(), 3);
    assert_eq!(spans.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_missing_model_degrades_and_retries_lazily() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_kb(&tmp, &["The ETSII is located in Madrid."]);
    let loader = StubLoader {
        failures: 2,
        ..Default::default()
    };
    let (svc, loads, spans) = service(cfg, loader);

    assert!(svc.load().await.is_err());
    assert!(matches!(svc.status(), LoadStatus::Degraded { .. }));

    // Second attempt (lazy retry) still fails.
    let answer = svc.predict("Where is ETSII?").await.unwrap();
    assert_eq!(answer.answer, MODEL_NOT_LOADED_ANSWER);
    assert_eq!(answer.score, 0.0);
    assert!(answer.context.is_none());
    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert_eq!(spans.load(Ordering::SeqCst), 0);

    // Third attempt succeeds and the question is answered.
    let answer = svc.predict("Where is ETSII?").await.unwrap();
    assert!(answer.answer.contains("Madrid"));
    assert_eq!(svc.status(), LoadStatus::Ready { facts: 1 });
    assert_eq!(loads.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_predict_before_load_loads_once() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_kb(&tmp, &["The ETSII is located in Madrid."]);
    let (svc, loads, _) = service(cfg, StubLoader::default());
    assert_eq!(svc.status(), LoadStatus::Unloaded);

    let svc = Arc::new(svc);
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.predict("Where is ETSII?").await.unwrap() })
        })
        .collect();
    for t in tasks {
        assert!(t.await.unwrap().answer.contains("Madrid"));
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(svc.history().len(), 8);
}

#[tokio::test]
async fn test_failed_lazy_load_is_shared_by_waiters() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_kb(&tmp, &["The ETSII is located in Madrid."]);
    let loader = StubLoader {
        failures: usize::MAX,
        load_delay: Duration::from_millis(200),
        ..Default::default()
    };
    let (svc, loads, _) = service(cfg, loader);

    let svc = Arc::new(svc);
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.predict("Where is ETSII?").await.unwrap() })
        })
        .collect();
    for t in tasks {
        assert_eq!(t.await.unwrap().answer, MODEL_NOT_LOADED_ANSWER);
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(matches!(svc.status(), LoadStatus::Degraded { .. }));

    // A later caller gets a fresh attempt.
    svc.predict("Where is ETSII?").await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_ask_attempts_a_missing_model_once() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_kb(&tmp, &["The ETSII is located in Madrid."]);
    let loader = StubLoader {
        failures: usize::MAX,
        ..Default::default()
    };
    let (svc, loads, _) = service(cfg, loader);

    axiomus::ask::run_ask_with_service(&Arc::new(svc), "Where is ETSII?")
        .await
        .unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_knowledge_base_degrades() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = Config::minimal();
    cfg.knowledge_base.path = tmp.path().join("absent.json");
    let (svc, _, _) = service(cfg, StubLoader::default());

    let err = svc.load().await.unwrap_err();
    assert!(format!("{:#}", err).contains("absent.json"));
    let answer = svc.predict("anything").await.unwrap();
    assert_eq!(answer.answer, MODEL_NOT_LOADED_ANSWER);
}

#[tokio::test]
async fn test_empty_knowledge_base_answers_no_information() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_kb(&tmp, &[]);
    let (svc, _, spans) = service(cfg, StubLoader::default());
    assert_eq!(svc.load().await.unwrap().facts, 0);

    let answer = svc.predict("Where is ETSII?").await.unwrap();
    assert_eq!(answer.answer, NO_INFORMATION_ANSWER);
    assert_eq!(spans.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_extractor_failure_becomes_system_error() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_kb(&tmp, &["The ETSII is located in Madrid."]);
    let loader = StubLoader {
        model_fails: true,
        ..Default::default()
    };
    let (svc, _, spans) = service(cfg, loader);
    svc.load().await.unwrap();

    let answer = svc.predict("Where is ETSII?").await.unwrap();
    assert_eq!(answer.answer, EXTRACTION_FAILED_ANSWER);
    assert_eq!(answer.score, 0.0);
    assert_eq!(spans.load(Ordering::SeqCst), 1);
    assert!(svc.history().is_empty());
}

#[tokio::test]
async fn test_reload_gives_identical_results() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_kb(
        &tmp,
        &[
            "The ETSII is located in Madrid.",
            "UPM was founded in 1971.",
            "The rector is elected every four years.",
        ],
    );
    let (svc, loads, _) = service(cfg, StubLoader::default());
    let questions = ["Where is ETSII?", "When was UPM founded?", "rector", "France"];

    svc.load().await.unwrap();
    let mut first = Vec::new();
    for q in questions {
        first.push(svc.predict(q).await.unwrap());
    }

    assert_eq!(svc.load().await.unwrap().facts, 3);
    for (q, expected) in questions.iter().zip(first) {
        assert_eq!(svc.predict(q).await.unwrap(), expected);
    }
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}
