//! Utility modules
//!
//! This module contains utilities and helpers:
//! - Error and result types for evaluation and tree reading
//! - Diagnostics recorded by the environment

pub mod error;

// Re-export commonly used items
pub use error::{
    Diagnostic, DiagnosticSeverity, EvalError, EvalErrorKind, EvalResult, ParseError,
};
