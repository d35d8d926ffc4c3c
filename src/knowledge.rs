//! Knowledge base loading.
//!
//! The knowledge base is a JSON array of objects, each carrying a `text`
//! field. Array order defines fact indices.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::models::Fact;

#[derive(Deserialize)]
struct FactRecord {
    text: String,
}

/// Read every fact from the JSON file at `path`.
pub fn load_facts(path: &Path) -> Result<Vec<Fact>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Knowledge base file not found at {}", path.display()))?;
    parse_facts(&content).with_context(|| format!("Invalid knowledge base: {}", path.display()))
}

/// Parse the JSON body of a knowledge base file.
pub fn parse_facts(content: &str) -> Result<Vec<Fact>> {
    let items: Vec<serde_json::Value> =
        serde_json::from_str(content).context("expected a JSON array of fact records")?;

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let record: FactRecord = serde_json::from_value(item)
                .with_context(|| format!("element {} has no string `text` field", index))?;
            Ok(Fact {
                index,
                text: record.text,
            })
        })
        .collect()
}
