//! # typeset-env
//!
//! The evaluation environment behind structured document typesetting.
//!
//! A document is a [`Tree`]. Rendering walks it with [`Env::exec`], which
//! resolves variables and macro arguments against a scoped environment and
//! evaluates the small expression language embedded in markup (arithmetic,
//! logic, comparisons, control flow, list operations). Style editing uses
//! [`Env::rewrite_inactive`] instead, which turns a macro body into a
//! non-executing source view highlighting one reference.
//!
//! ## Features
//!
//! - Variable store with transactional write-back (`local_start`/`local_end`)
//! - Macro application with dynamic scoping and a recursion cap
//! - Derived state (font, colour, mode, frame, clipping, page geometry)
//!   refreshed through named update hooks
//! - Conservative dependency analysis for incremental re-layout
//! - Inactive rewriting with inline/block and recurse/once/error policies
//!
//! ## Example
//!
//! ```
//! use typeset_env::{DrdTable, Env, RefTables, Tree};
//!
//! let drd = DrdTable::new();
//! let mut env = Env::new(Default::default(), &drd, "doc.tm", RefTables::empty());
//! env.write_default_env();
//!
//! let t = Tree::parse("(with font-size 12 (plus (value font-size) 1))").unwrap();
//! assert_eq!(env.exec(&t).to_string(), "(with font-size 12 13)");
//! ```

pub mod env;
pub mod tree;
pub mod utils;

pub use env::{
    DisplayContext, DrdTable, Env, EvalConfig, InactiveMode, RefTables, StateConsumer,
    VirtualFileSystem,
};
pub use tree::{Path, Tag, Tree};
pub use utils::error::{Diagnostic, DiagnosticSeverity, EvalError, EvalErrorKind, ParseError};
