//! Live adapters for real external interactions.

pub mod anthropic;
pub mod clock;
pub mod filesystem;
pub mod ollama;
