//! Evaluation configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum number of `while` iterations (infinite loop protection).
const MAX_ITERATIONS: usize = 10_000;

/// How nested references are treated by the inactive rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecursionPolicy {
    /// Expand nested occurrences too, up to the rewrite depth limit
    Recurse,
    /// Leave nested occurrences as they are
    Once,
    /// Report nested occurrences as errors
    Error,
}

/// Layout and recursion policy of the inactive rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InactiveMode {
    #[default]
    InlineRecurse,
    InlineOnce,
    InlineError,
    BlockRecurse,
    BlockOnce,
    BlockError,
}

impl InactiveMode {
    pub const ALL: [InactiveMode; 6] = [
        InactiveMode::InlineRecurse,
        InactiveMode::InlineOnce,
        InactiveMode::InlineError,
        InactiveMode::BlockRecurse,
        InactiveMode::BlockOnce,
        InactiveMode::BlockError,
    ];

    /// Numeric code, `0..=5`, as stored in the `inactive-mode` variable.
    pub fn code(self) -> usize {
        match self {
            InactiveMode::InlineRecurse => 0,
            InactiveMode::InlineOnce => 1,
            InactiveMode::InlineError => 2,
            InactiveMode::BlockRecurse => 3,
            InactiveMode::BlockOnce => 4,
            InactiveMode::BlockError => 5,
        }
    }

    pub fn from_code(code: usize) -> Option<Self> {
        Self::ALL.get(code).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            InactiveMode::InlineRecurse => "inline-recurse",
            InactiveMode::InlineOnce => "inline-once",
            InactiveMode::InlineError => "inline-error",
            InactiveMode::BlockRecurse => "block-recurse",
            InactiveMode::BlockOnce => "block-once",
            InactiveMode::BlockError => "block-error",
        }
    }

    /// Accepts both the kebab-case name and the numeric code.
    pub fn from_name(name: &str) -> Option<Self> {
        if let Ok(code) = name.trim().parse::<usize>() {
            return Self::from_code(code);
        }
        Self::ALL.iter().copied().find(|mode| mode.name() == name)
    }

    pub fn is_block(self) -> bool {
        self.code() >= 3
    }

    pub fn policy(self) -> RecursionPolicy {
        match self.code() % 3 {
            0 => RecursionPolicy::Recurse,
            1 => RecursionPolicy::Once,
            _ => RecursionPolicy::Error,
        }
    }
}

impl fmt::Display for InactiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InactiveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown inactive mode: {}", s))
    }
}

/// Configuration for the evaluation environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// If true, applying a user tag with no macro definition is an error.
    /// If false, the node is rebuilt with its children evaluated.
    pub strict: bool,
    /// Maximum nesting of macro applications.
    pub max_recursion_depth: usize,
    /// Maximum iterations for `while` (infinite loop protection).
    pub max_iterations: usize,
    /// Maximum expansion depth of the inactive rewriter under the recurse policy.
    pub max_rewrite_depth: usize,
    /// Rewrite policy used until the `inactive-mode` variable says otherwise.
    pub inactive_mode: InactiveMode,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            strict: false,
            // Every macro level costs several native stack frames
            max_recursion_depth: 64,
            max_iterations: MAX_ITERATIONS,
            max_rewrite_depth: 16,
            inactive_mode: InactiveMode::default(),
        }
    }
}

impl EvalConfig {
    /// Create a strict configuration (fail on undefined macros).
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mode_codes_and_policies() {
        for (code, mode) in InactiveMode::ALL.iter().enumerate() {
            assert_eq!(mode.code(), code);
            assert_eq!(InactiveMode::from_name(mode.name()), Some(*mode));
        }
        assert!(InactiveMode::BlockOnce.is_block());
        assert!(!InactiveMode::InlineError.is_block());
        assert_eq!(InactiveMode::BlockOnce.policy(), RecursionPolicy::Once);
        assert_eq!(InactiveMode::InlineError.policy(), RecursionPolicy::Error);
        assert_eq!(InactiveMode::from_name("4"), Some(InactiveMode::BlockOnce));
        assert_eq!(InactiveMode::from_name("6"), None);
    }

    #[test]
    fn test_config_json_defaults() {
        let config = EvalConfig::from_json(r#"{"strict": true, "inactive_mode": "block-error"}"#)
            .unwrap();
        assert!(config.strict);
        assert_eq!(config.inactive_mode, InactiveMode::BlockError);
        assert_eq!(config.max_recursion_depth, 64);
        assert_eq!(config.max_iterations, 10_000);
    }

    #[test]
    fn test_strict_constructor() {
        let config = EvalConfig::strict();
        assert!(config.strict);
        assert_eq!(config.max_rewrite_depth, 16);
    }
}
