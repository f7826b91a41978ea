//! Concrete LLM provider implementations

pub mod openrouter;

pub use openrouter::{ModelInfo, OpenRouterConfig, OpenRouterProvider};
