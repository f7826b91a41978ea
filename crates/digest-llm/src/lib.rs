//! LLM provider abstraction layer for xhs-digest
//!
//! This crate provides provider-agnostic types for asking a Large Language
//! Model to write text. It includes:
//!
//! - Message types for chat-style prompts
//! - Completion request/response types
//! - The [`LLMProvider`] trait
//! - An OpenAI-compatible provider (behind the `openai` feature), used
//!   against OpenRouter, with model catalogue listing

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(feature = "openai")]
pub mod providers;
