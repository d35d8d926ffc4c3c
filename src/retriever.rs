//! Nearest-fact retrieval over a TF-IDF index.

use crate::config::RetrievalConfig;
use crate::models::{Fact, RetrievalHit};
use crate::tfidf::{Analyzer, SparseVector, TfidfVectorizer};

/// Fitted index over the knowledge base. Rebuilt only by a full reload.
pub struct Retriever {
    facts: Vec<Fact>,
    index: Option<(TfidfVectorizer, Vec<SparseVector>)>,
    min_similarity: f32,
}

impl Retriever {
    /// An unfitted retriever; every query misses.
    pub fn empty() -> Self {
        Self {
            facts: Vec::new(),
            index: None,
            min_similarity: 0.0,
        }
    }

    pub fn fit(facts: Vec<Fact>, config: &RetrievalConfig) -> Self {
        if facts.is_empty() {
            return Self {
                min_similarity: config.min_similarity,
                ..Self::empty()
            };
        }

        let texts: Vec<&str> = facts.iter().map(|f| f.text.as_str()).collect();
        let index = TfidfVectorizer::fit_transform(Analyzer::from_config(config), &texts);
        Self {
            facts,
            index: Some(index),
            min_similarity: config.min_similarity,
        }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.index
            .as_ref()
            .map(|(v, _)| v.vocabulary_size())
            .unwrap_or(0)
    }

    /// Similarity of `question` to every fact, in fact order.
    pub fn scores(&self, question: &str) -> Vec<f32> {
        match &self.index {
            Some((vectorizer, vectors)) => {
                let q = vectorizer.transform(question);
                vectors.iter().map(|v| q.cosine(v)).collect()
            }
            None => Vec::new(),
        }
    }

    /// Best fact for `question`, or `None` when nothing clears the threshold.
    ///
    /// Ties go to the lowest index.
    pub fn query(&self, question: &str) -> Option<RetrievalHit> {
        let scores = self.scores(question);
        let (best, similarity) = scores
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((i, s)),
            })?;

        tracing::debug!(similarity, fact = best, "best match");

        if similarity <= self.min_similarity {
            return None;
        }
        Some(RetrievalHit {
            fact: self.facts[best].clone(),
            similarity,
        })
    }
}
