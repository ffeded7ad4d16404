//! Gemini REST integration: structured, search-grounded and streamed generation.

pub mod client;
pub mod sse;
pub mod types;

pub use client::GeminiClient;

pub(crate) const SERVICE: &str = "gemini";
