//! Shared utilities for xhs-digest
//!
//! This crate provides functionality used across the workspace: tracing
//! setup and small helpers for reading optional environment variables.

pub mod env;
pub mod logging;

pub use env::{env_or, env_var};
pub use logging::{LogFormat, init_tracing};
