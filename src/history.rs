//! Process-wide record of answer confidence scores.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreRecord {
    pub score: f32,
    pub recorded_at: DateTime<Utc>,
}

/// Count/mean/max/min over the recorded scores.
#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
    pub count: usize,
    pub mean: f32,
    pub max: f32,
    pub min: f32,
    pub first_at: DateTime<Utc>,
    pub last_at: DateTime<Utc>,
}

/// Append-only, safe to share across request handlers.
#[derive(Debug, Default)]
pub struct ScoreHistory {
    records: Mutex<Vec<ScoreRecord>>,
}

impl ScoreHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, score: f32) {
        self.records.lock().push(ScoreRecord {
            score,
            recorded_at: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn scores(&self) -> Vec<f32> {
        self.records.lock().iter().map(|r| r.score).collect()
    }

    pub fn summary(&self) -> Option<HistorySummary> {
        let records = self.records.lock();
        let first = records.first()?;
        let last = records.last()?;
        let count = records.len();
        let sum: f32 = records.iter().map(|r| r.score).sum();
        let max = records.iter().map(|r| r.score).fold(f32::MIN, f32::max);
        let min = records.iter().map(|r| r.score).fold(f32::MAX, f32::min);
        Some(HistorySummary {
            count,
            mean: sum / count as f32,
            max,
            min,
            first_at: first.recorded_at,
            last_at: last.recorded_at,
        })
    }
}
