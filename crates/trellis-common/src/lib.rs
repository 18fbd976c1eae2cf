//! Shared utilities for trellis crates.
//!
//! This crate provides common utilities used across the trellis workspace,
//! including Polars value helpers and path-safe name sanitization.

pub mod polars;
pub mod sanitize;

// Re-export commonly used functions at crate root for convenience
pub use polars::{any_to_string, format_numeric};
pub use sanitize::{extension_of, sanitize, sanitize_key};
