//! One-shot question answering from the command line (`axiomus ask`).

use anyhow::Result;
use std::sync::Arc;

use crate::bot::confidence_bar;
use crate::config::Config;
use crate::extraction::default_loader;
use crate::service::QaService;

pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let service = QaService::new(config.clone(), default_loader());
    run_ask_with_service(&Arc::new(service), question).await
}

/// Predict once and print the answer. The first predict loads the pipeline;
/// a failed load only shows up as the model-not-loaded answer.
pub async fn run_ask_with_service(service: &Arc<QaService>, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        println!("No question.");
        return Ok(());
    }

    let answer = service.predict(question).await?;

    println!("Answer:     {}", answer.answer);
    println!("Confidence: {} ({:.4})", confidence_bar(answer.score), answer.score);
    match answer.context {
        Some(context) => println!("Context:    {}", context),
        None => println!("Context:    -"),
    }
    Ok(())
}
