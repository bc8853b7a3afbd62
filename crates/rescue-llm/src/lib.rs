//! CI Rescue LLM - failure summarization via OpenRouter
//!
//! Turns a `FailureRecord` into a markdown analysis comment. The prompt
//! embeds the extracted error context and instructs the model to append a
//! sentinel-delimited JSON annotations payload, which `rescue-core`
//! parses back out.

pub mod openrouter;

pub use openrouter::{LlmError, OpenRouterClient};
