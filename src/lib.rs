//! # Axiomus
//!
//! Retrieval-augmented question answering over a small knowledge base of
//! short facts.
//!
//! A TF-IDF retriever narrows each question to the single most similar fact,
//! and an extractive QA model picks the answer span out of that fact.
//! Questions that match nothing never reach the model.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌─────────────┐
//! │ knowledge  │──▶│ retriever │──▶│ extraction  │
//! │ base JSON  │   │  TF-IDF   │   │ ONNX QA     │
//! └────────────┘   └───────────┘   └──────┬──────┘
//!                                         │
//!                      ┌──────────────────┤
//!                      ▼                  ▼
//!                 ┌──────────┐      ┌───────────┐
//!                 │   HTTP   │◀─────│ Telegram  │
//!                 │ /predict │      │    bot    │
//!                 └──────────┘      └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! axiomus serve                      # HTTP service on [server].bind
//! axiomus ask "Where is ETSII?"      # one answer, in-process
//! TELEGRAM_TOKEN=... axiomus bot     # chat front end
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and fixed answers |
//! | [`knowledge`] | Knowledge base loading |
//! | [`tfidf`] | Sparse TF-IDF vectorization |
//! | [`retriever`] | Nearest-fact retrieval |
//! | [`extraction`] | QA model abstraction and answer post-processing |
//! | [`service`] | The load/predict orchestrator |
//! | [`history`] | Confidence score history |
//! | [`analytics`] | PNG analytics chart |
//! | [`server`] | HTTP service |
//! | [`client`] | HTTP client for the service |
//! | [`telegram`] | Telegram Bot API |
//! | [`bot`] | Chat front end |

pub mod analytics;
pub mod ask;
pub mod bot;
pub mod client;
pub mod config;
pub mod extraction;
pub mod history;
pub mod knowledge;
pub mod models;
pub mod retriever;
pub mod server;
pub mod service;
pub mod telegram;
pub mod tfidf;
