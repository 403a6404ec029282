//! Data models
//!
//! Shared between the directory client and any UI layer.

pub mod member;

// Re-exports
pub use member::*;
