//! pictag Core
//!
//! Types and rules shared by the pictag vision and server crates.
//!
//! This crate provides:
//! - The error type and result alias used across the workspace
//! - Prediction and response types
//! - Label formatting and the fixed confidence verdict rule

pub mod error;
pub mod labels;
pub mod types;

pub use error::{DecodeErrorKind, Error, Result};
pub use labels::{pretty_label, top1, verdict_message, CONFIDENCE_THRESHOLD};
pub use types::{ClassificationResult, Prediction};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{DecodeErrorKind, Error, Result};
    pub use crate::types::{ClassificationResult, Prediction};
}
