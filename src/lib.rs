//! Earnings relay: earnings-call transcript intake and analysis.
//!
//! Transcripts (PDF or plain text) are reduced to normalized text, stored in
//! SQLite, and analyzed by an LLM that walks an ordered list of candidate
//! models until one returns a valid structured analysis.

pub mod cli;
pub mod config;
pub mod extract;
pub mod llm;
pub mod models;
pub mod repository;
pub mod schema;
pub mod server;
pub mod services;
