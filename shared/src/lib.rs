//! Shared types for the membership directory
//!
//! Member model, record codec, validation and the pure query functions.
//! Nothing in this crate performs I/O.

pub mod codec;
pub mod error;
pub mod models;
pub mod query;
pub mod validation;

// Re-exports
pub use codec::{Fields, RawDocument};
pub use error::{CodecError, ValidationError};
pub use serde::{Deserialize, Serialize};
