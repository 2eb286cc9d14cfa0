//! Error handling for the typesetting environment
//!
//! Evaluation errors never escape `exec`: they are turned into `(error ...)`
//! trees and recorded as [`Diagnostic`]s on the environment. The types here
//! describe what went wrong on the way.

use std::fmt;

use thiserror::Error;

use crate::tree::Tree;

/// The kind of evaluation error.
#[derive(Debug, Clone, Error)]
pub enum EvalErrorKind {
    /// An operand had the wrong shape
    #[error("type mismatch in {op}: expected {expected}, got {got}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        got: String,
    },
    /// A primitive received the wrong number of children
    #[error("bad {op}: expected {expected} argument(s), got {got}")]
    WrongArity {
        op: String,
        expected: String,
        got: usize,
    },
    /// A user tag with no macro definition (strict mode only)
    #[error("undefined macro: {0}")]
    UndefinedMacro(String),
    /// Division or modulo by zero
    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),
    /// Invalid operation
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// Index out of bounds
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    /// `while` iteration cap reached
    #[error("loop seems infinite (more than {0} iterations)")]
    TooManyIterations(usize),
    /// Macro application depth cap reached
    #[error("recursion depth exceeded maximum ({max_depth}) while expanding {name}")]
    RecursionLimitExceeded { max_depth: usize, name: String },
    /// A nested reference to the target under the `error` rewrite policy
    #[error("nested reference to {0} inside its own expansion")]
    NestedInactiveReference(String),
    /// A string was required
    #[error("expected a string, got {0}")]
    NotAString(String),
    /// An operand was already an error tree
    #[error("{}", .0.error_message())]
    Propagated(Tree),
}

/// An evaluation error, optionally tagged with the primitive it occurred in.
#[derive(Debug, Clone)]
pub struct EvalError {
    /// The kind of error
    pub kind: EvalErrorKind,
    /// Name of the tag being evaluated when the error occurred
    pub context: Option<String>,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.context) {
            (EvalErrorKind::Propagated(_), _) | (_, None) => write!(f, "{}", self.kind),
            (kind, Some(ctx)) => write!(f, "{} (in {})", kind, ctx),
        }
    }
}

impl std::error::Error for EvalError {}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Attach the name of the tag being evaluated.
    pub fn in_context(mut self, context: impl Into<String>) -> Self {
        if self.context.is_none() {
            self.context = Some(context.into());
        }
        self
    }

    pub fn type_mismatch(op: &'static str, expected: &'static str, got: &Tree) -> Self {
        Self::new(EvalErrorKind::TypeMismatch {
            op,
            expected,
            got: describe(got),
        })
    }

    pub fn wrong_arity(op: impl Into<String>, expected: impl Into<String>, got: usize) -> Self {
        Self::new(EvalErrorKind::WrongArity {
            op: op.into(),
            expected: expected.into(),
            got,
        })
    }

    pub fn undefined_macro(name: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::UndefinedMacro(name.into()))
    }

    pub fn div_zero(op: &'static str) -> Self {
        Self::new(EvalErrorKind::DivisionByZero(op))
    }

    pub fn invalid_op(msg: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::InvalidOperation(msg.into()))
    }

    pub fn index_oob(index: i64, len: usize) -> Self {
        Self::new(EvalErrorKind::IndexOutOfBounds { index, len })
    }

    pub fn too_many_iterations(max: usize) -> Self {
        Self::new(EvalErrorKind::TooManyIterations(max))
    }

    pub fn recursion_limit(max_depth: usize, name: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::RecursionLimitExceeded {
            max_depth,
            name: name.into(),
        })
    }

    pub fn nested_reference(target: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::NestedInactiveReference(target.into()))
    }

    pub fn not_a_string(got: &Tree) -> Self {
        Self::new(EvalErrorKind::NotAString(describe(got)))
    }

    /// Wrap an existing error tree so it travels up unchanged.
    pub fn propagated(tree: Tree) -> Self {
        Self::new(EvalErrorKind::Propagated(tree))
    }

    pub fn kind(&self) -> &EvalErrorKind {
        &self.kind
    }

    /// Whether this error only carries an error tree produced elsewhere.
    pub fn is_propagated(&self) -> bool {
        matches!(self.kind, EvalErrorKind::Propagated(_))
    }

    /// The `(error ...)` tree standing in for the failed evaluation.
    pub fn to_tree(&self) -> Tree {
        match &self.kind {
            EvalErrorKind::Propagated(tree) => tree.clone(),
            _ => Tree::error(self.to_string()),
        }
    }
}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Result type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;

/// Short description of a tree for error messages.
fn describe(tree: &Tree) -> String {
    match tree {
        Tree::Atom(s) if s.chars().count() > 24 => {
            let head: String = s.chars().take(24).collect();
            format!("\"{}...\"", head)
        }
        Tree::Atom(s) => format!("\"{}\"", s),
        Tree::Node(node) => format!("<{}>", node.tag),
    }
}

/// Errors from the tree reader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected ')' at offset {offset}")]
    UnexpectedClose { offset: usize },
    #[error("node at offset {offset} has no tag")]
    MissingTag { offset: usize },
    #[error("node opened at offset {offset} is never closed")]
    Unclosed { offset: usize },
    #[error("string starting at offset {offset} is never terminated")]
    UnterminatedString { offset: usize },
    #[error("unexpected input after tree at offset {offset}")]
    TrailingInput { offset: usize },
    #[error("node at offset {offset} is nested too deeply")]
    TooDeep { offset: usize },
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticSeverity {
    /// Informational, e.g. a rewrite that stopped at its depth limit
    Info,
    /// Recoverable oddities, e.g. a macro called with too few arguments
    Warning,
    /// Evaluation failed and produced an error tree
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticSeverity::Info => "info",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Error => "error",
        })
    }
}

/// A problem recorded during evaluation or rewriting.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    /// The tag or macro being processed, if known
    pub location: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: DiagnosticSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Info, message)
    }

    /// Add location context.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }

    /// Get ANSI color code for this diagnostic's severity.
    pub fn color_code(&self) -> &'static str {
        match self.severity {
            DiagnosticSeverity::Error => "\x1b[31m",   // red
            DiagnosticSeverity::Warning => "\x1b[33m", // yellow
            DiagnosticSeverity::Info => "\x1b[36m",    // cyan
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "[{}] {}: {}", self.severity, loc, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_with_context() {
        let err = EvalError::div_zero("divide").in_context("divide");
        assert_eq!(err.to_string(), "division by zero in divide (in divide)");
        let err = EvalError::wrong_arity("plus", "at least 1", 0);
        assert!(err.to_string().contains("bad plus"));
    }

    #[test]
    fn test_context_is_kept_from_innermost() {
        let err = EvalError::invalid_op("x").in_context("inner").in_context("outer");
        assert_eq!(err.context.as_deref(), Some("inner"));
    }

    #[test]
    fn test_propagated_error_keeps_tree() {
        let tree = Tree::error("bad plus");
        let err = EvalError::propagated(tree.clone()).in_context("times");
        assert!(err.is_propagated());
        assert_eq!(err.to_tree(), tree);
        assert_eq!(err.to_string(), "bad plus");
    }

    #[test]
    fn test_to_tree_wraps_message() {
        let err = EvalError::index_oob(4, 2);
        assert_eq!(err.to_tree(), Tree::error("index 4 out of bounds for length 2"));
    }

    #[test]
    fn test_describe_truncates() {
        let long = Tree::atom("a".repeat(40));
        let err = EvalError::not_a_string(&long);
        assert!(err.to_string().contains("..."));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::warning("too few arguments").with_location("theorem");
        assert_eq!(d.to_string(), "[warning] theorem: too few arguments");
        assert!(!d.is_error());
    }
}
