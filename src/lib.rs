//! Grammar flashcard deck generation.
//!
//! Sentences are analysed by an LLM in batches, scored per language,
//! retried or rebuilt by rule when the score is too low, and exported as
//! colour-coded Anki cards with audio and images.

pub mod analysis;
pub mod config;
pub mod deck;
pub mod error;
pub mod generator;
pub mod language;
pub mod llm;
pub mod media;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod retry;
