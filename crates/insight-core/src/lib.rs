//! Configuration, ingestion, and grounded answering on top of the memory and
//! provider crates.

pub mod answer;
pub mod bootstrap;
pub mod config;
pub mod ingest;
pub mod prompt;
pub mod secret;

pub use answer::{AnswerEnvelope, AnswerError, Answerer};
pub use config::Config;
pub use ingest::{IngestError, IngestReport, run_ingestion};
