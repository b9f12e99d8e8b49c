//! Core library: embedding generation, similarity ranking, and the
//! per-entity parse/embed pipeline.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod vectorstore;
