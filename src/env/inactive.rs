//! Source view of macro bodies.
//!
//! The inactive rewriter turns a tree into a non-executing rendering made
//! of `src-*`, `inline-tag`, `open-tag` and `close-tag` nodes, so a style
//! author sees the structure of a macro instead of its result. Occurrences
//! of one *target* (an argument, a variable or a macro) are highlighted
//! and shown together with their expansion:
//!
//! ```text
//! (src-expand (src-highlight <reference>) <rewritten expansion>)
//! ```
//!
//! Inside an expansion the target may occur again. The [`RecursionPolicy`]
//! of the mode decides whether such nested occurrences are expanded again
//! (up to `max_rewrite_depth`), left literal, or reported as errors.

use tracing::{debug, instrument};

use super::config::{InactiveMode, RecursionPolicy};
use super::derived::{SrcClose, SrcCompact, SrcSpecial};
use super::Env;
use crate::tree::{Tag, Tree};
use crate::utils::error::{Diagnostic, EvalError};

/// What is being highlighted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// `(arg x)`
    Arg(String),
    /// `(value x)`
    Value(String),
    /// A macro name
    Macro(String),
}

impl Target {
    fn decode(t: &Tree) -> Option<Target> {
        if let Some(name) = t.as_str() {
            return (!name.is_empty()).then(|| Target::Macro(name.to_string()));
        }
        let name = t.child(0)?.as_str()?.to_string();
        match t.tag()? {
            Tag::Arg => Some(Target::Arg(name)),
            Tag::Value => Some(Target::Value(name)),
            _ => None,
        }
    }

    fn name(&self) -> &str {
        match self {
            Target::Arg(name) | Target::Value(name) | Target::Macro(name) => name,
        }
    }

    fn matches(&self, t: &Tree) -> bool {
        let first = t.child(0).and_then(Tree::as_str);
        match (self, t.tag()) {
            (Target::Arg(x), Some(Tag::Arg)) | (Target::Value(x), Some(Tag::Value)) => {
                first == Some(x.as_str())
            }
            (Target::Macro(m), Some(Tag::User(name))) => name.as_ref() == m.as_str(),
            (Target::Macro(m), Some(Tag::Compound)) => first == Some(m.as_str()),
            _ => false,
        }
    }
}

/// Layout of the position being rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    /// The position is a line of a document
    block: bool,
    /// Closing tags go on a line of their own
    flush: bool,
}

impl Layout {
    const INLINE: Layout = Layout {
        block: false,
        flush: false,
    };
    const LINE: Layout = Layout {
        block: true,
        flush: true,
    };
}

impl<'a> Env<'a> {
    /// Source view of `t` highlighting `target`, with the current
    /// `inactive-mode`.
    pub fn rewrite_inactive(&mut self, t: &Tree, target: &Tree) -> Tree {
        let mode = self.derived.inactive_mode;
        self.rewrite_inactive_with(t, target, mode)
    }

    /// Source view of `t` highlighting `target` under `mode`.
    ///
    /// A `target` that is neither `(arg x)`, `(value x)` nor a macro name
    /// has no occurrences; the view is produced all the same.
    #[instrument(level = "debug", skip_all, fields(target = %target, mode = %mode))]
    pub fn rewrite_inactive_with(&mut self, t: &Tree, target: &Tree, mode: InactiveMode) -> Tree {
        let target = Target::decode(target);
        if target.is_none() {
            debug!("target cannot occur in a tree");
        }
        let layout = Layout {
            block: mode.is_block(),
            flush: true,
        };
        let mut rewriter = Rewriter {
            env: self,
            target,
            policy: mode.policy(),
            depth: 0,
        };
        rewriter.rewrite(t, layout)
    }
}

struct Rewriter<'e, 'a> {
    env: &'e mut Env<'a>,
    target: Option<Target>,
    policy: RecursionPolicy,
    /// Number of expansions we are inside of
    depth: usize,
}

impl<'e, 'a> Rewriter<'e, 'a> {
    fn rewrite(&mut self, t: &Tree, layout: Layout) -> Tree {
        if self.target.as_ref().map_or(false, |target| target.matches(t)) {
            return self.occurrence(t, layout);
        }
        self.view(t, layout)
    }

    /// The rendering of `t` by node category.
    fn view(&mut self, t: &Tree, layout: Layout) -> Tree {
        let tag = match t.tag() {
            None => return t.clone(),
            Some(tag) => tag,
        };
        let raw = self.env.derived.src_special == SrcSpecial::Raw;
        match tag {
            Tag::Arg => Tree::node(Tag::SrcArg, t.children().to_vec()),
            Tag::Value => Tree::node(Tag::SrcValue, t.children().to_vec()),
            Tag::Symbol => Tree::node(Tag::SrcSymbol, t.children().to_vec()),
            Tag::Hybrid => Tree::node(Tag::SrcHybrid, t.children().to_vec()),
            Tag::RawData => {
                let bytes = t.child(0).and_then(Tree::as_str).map_or(0, str::len);
                Tree::node(Tag::SrcRaw, vec![Tree::atom(format!("{} bytes", bytes))])
            }
            Tag::Document if !raw => {
                let lines = t
                    .children()
                    .iter()
                    .map(|line| self.rewrite(line, Layout::LINE))
                    .collect();
                t.with_children(lines)
            }
            Tag::Concat if !raw => {
                let items = t
                    .children()
                    .iter()
                    .map(|item| self.rewrite(item, Layout::INLINE))
                    .collect();
                t.with_children(items)
            }
            Tag::User(name) => self.tag_view(name, t.children(), layout),
            Tag::Compound => match t.child(0).and_then(Tree::as_str) {
                Some(name) => self.tag_view(name, &t.children()[1..], layout),
                None => self.tag_view("compound", t.children(), layout),
            },
            Tag::Tuple | Tag::Point | Tag::Document | Tag::Concat => {
                self.tag_view(tag.name(), t.children(), layout)
            }
            _ if tag.is_active() => self.tag_view(tag.name(), t.children(), layout),
            _ => t.clone(),
        }
    }

    /// Render a tag with its arguments, inline or as a block.
    fn tag_view(&mut self, name: &str, args: &[Tree], layout: Layout) -> Tree {
        let has_document = args.iter().any(|a| a.is(&Tag::Document));
        let block = match self.env.derived.src_compact {
            SrcCompact::All => false,
            SrcCompact::Inline => has_document,
            SrcCompact::Normal => layout.block && has_document,
            SrcCompact::None => layout.block,
        };

        if !block {
            let mut children = vec![Tree::atom(name)];
            children.extend(args.iter().map(|a| self.rewrite(a, Layout::INLINE)));
            return Tree::node(Tag::InlineTag, children);
        }

        let rewritten: Vec<Tree> = args
            .iter()
            .map(|a| {
                let arg_layout = if a.is(&Tag::Document) {
                    Layout::LINE
                } else {
                    Layout::INLINE
                };
                self.rewrite(a, arg_layout)
            })
            .collect();
        let close = self.close_tag(name, &rewritten);
        let mut lines = vec![Tree::node(Tag::OpenTag, vec![Tree::atom(name)])];
        lines.extend(rewritten);
        if layout.flush {
            lines.push(close);
        } else if let Some(last) = lines.pop() {
            lines.push(Tree::node(Tag::Concat, vec![last, close]));
        }
        Tree::node(Tag::Document, lines)
    }

    fn close_tag(&self, name: &str, args: &[Tree]) -> Tree {
        let children = match self.env.derived.src_close {
            SrcClose::Compact => Vec::new(),
            SrcClose::Long => vec![Tree::atom(name)],
            SrcClose::Repeat => {
                let mut children = vec![Tree::atom(name)];
                children.extend(args.first().cloned());
                children
            }
        };
        Tree::node(Tag::CloseTag, children)
    }

    /// Highlight an occurrence of the target and show its expansion.
    fn occurrence(&mut self, t: &Tree, layout: Layout) -> Tree {
        if self.depth > 0 {
            match self.policy {
                RecursionPolicy::Once => return self.view(t, layout),
                RecursionPolicy::Error => {
                    let name = self.target.as_ref().map_or("", Target::name).to_string();
                    let err = EvalError::nested_reference(name).in_context("rewrite-inactive");
                    return self.env.absorb(err);
                }
                RecursionPolicy::Recurse => {}
            }
        }

        let highlighted = Tree::node(Tag::SrcHighlight, vec![self.view(t, layout)]);
        let max_depth = self.env.config.max_rewrite_depth;
        if self.depth >= max_depth {
            self.env.report(
                Diagnostic::info(format!("expansion stopped at depth {}", max_depth))
                    .with_location("rewrite-inactive"),
            );
            return highlighted;
        }
        let expansion = match self.expansion(t) {
            Some(expansion) => expansion,
            None => return highlighted,
        };

        self.depth += 1;
        let expanded = self.rewrite(&expansion, layout);
        self.depth -= 1;
        Tree::node(Tag::SrcExpand, vec![highlighted, expanded])
    }

    /// What an occurrence stands for: the bound argument, the variable's
    /// value, or the macro body with the arguments substituted.
    fn expansion(&mut self, t: &Tree) -> Option<Tree> {
        match self.target.as_ref()? {
            Target::Arg(name) => {
                let mut value = self.env.scopes.get(name)?.clone();
                for index in &t.children()[1..] {
                    let i = index.as_str()?.parse::<usize>().ok()?;
                    value = value.child(i)?.clone();
                }
                Some(value)
            }
            Target::Value(name) => {
                let value = self.env.store.read(name);
                (!value.is_uninit()).then(|| value)
            }
            Target::Macro(_) => {
                let expansion = self.env.expand(t);
                (expansion != *t).then(|| expansion)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::env::{DisplayContext, DrdTable, Env, EvalConfig, InactiveMode, RefTables};
    use crate::tree::Tree;

    fn env(drd: &DrdTable) -> Env<'_> {
        let mut env = Env::new(DisplayContext::default(), drd, "doc.tm", RefTables::empty());
        env.write_default_env();
        env
    }

    fn rewrite(env: &mut Env<'_>, source: &str, target: &str, mode: InactiveMode) -> String {
        let t = Tree::parse(source).unwrap();
        let target = Tree::parse(target).unwrap();
        env.rewrite_inactive_with(&t, &target, mode).to_string()
    }

    #[test]
    fn test_source_view_without_occurrences() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        assert_eq!(
            rewrite(
                &mut env,
                "(concat a (value x) (arg y 1) (plus 1 2) (raw-data abcd))",
                "(value z)",
                InactiveMode::InlineRecurse,
            ),
            "(concat a (src-value x) (src-arg y 1) (inline-tag plus 1 2) (src-raw \"4 bytes\"))"
        );
        assert_eq!(
            rewrite(&mut env, "(theorem (symbol alpha))", "zzz", InactiveMode::InlineOnce),
            "(inline-tag theorem (src-symbol alpha))"
        );
    }

    #[test]
    fn test_default_rule_keeps_unknown_shapes() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        assert_eq!(
            rewrite(&mut env, "(concat (error oops) (uninit))", "(value x)", InactiveMode::InlineRecurse),
            "(concat (error oops) (uninit))"
        );
        assert!(env.diagnostics().is_empty());
    }

    #[test]
    fn test_invalid_target_has_no_occurrences() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        assert_eq!(
            rewrite(&mut env, "(value x)", "(tuple x)", InactiveMode::InlineRecurse),
            "(src-value x)"
        );
    }

    #[test]
    fn test_value_occurrence_is_expanded() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        env.write("x", Tree::parse("(concat a (value y))").unwrap());
        assert_eq!(
            rewrite(&mut env, "(concat (value x) b)", "(value x)", InactiveMode::InlineRecurse),
            "(concat (src-expand (src-highlight (src-value x)) (concat a (src-value y))) b)"
        );
        assert_eq!(
            rewrite(&mut env, "(value x)", "(value unset)", InactiveMode::InlineRecurse),
            "(src-value x)"
        );
        assert_eq!(
            rewrite(&mut env, "(value unset)", "(value unset)", InactiveMode::InlineRecurse),
            "(src-highlight (src-value unset))"
        );
    }

    #[test]
    fn test_macro_occurrence_shows_substituted_body() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        env.write("twice", Tree::parse("(macro x (concat (arg x) (arg x)))").unwrap());
        assert_eq!(
            rewrite(&mut env, "(twice a)", "twice", InactiveMode::InlineOnce),
            "(src-expand (src-highlight (inline-tag twice a)) (concat a a))"
        );
    }

    #[test]
    fn test_block_layout() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        // src-compact normal: block only when an argument is a document
        assert_eq!(
            rewrite(
                &mut env,
                "(document (proof (document a b)) (em x))",
                "zzz",
                InactiveMode::BlockRecurse,
            ),
            "(document \
             (document (open-tag proof) (document a b) (close-tag proof)) \
             (inline-tag em x))"
        );

        env.write_update("src-compact", Tree::atom("none"));
        env.write_update("src-close", Tree::atom("compact"));
        assert_eq!(
            rewrite(&mut env, "(document (em x))", "zzz", InactiveMode::BlockRecurse),
            "(document (document (open-tag em) x (close-tag)))"
        );

        env.write_update("src-compact", Tree::atom("all"));
        assert_eq!(
            rewrite(&mut env, "(document (proof (document a)))", "zzz", InactiveMode::BlockRecurse),
            "(document (inline-tag proof (document a)))"
        );
    }

    #[test]
    fn test_close_tag_on_last_line_when_not_flush() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        env.write_update("src-compact", Tree::atom("inline"));
        env.write_update("src-close", Tree::atom("repeat"));
        assert_eq!(
            rewrite(&mut env, "(concat (proof (document a)) b)", "zzz", InactiveMode::InlineRecurse),
            "(concat (document (open-tag proof) (concat (document a) (close-tag proof (document a)))) b)"
        );
    }

    #[test]
    fn test_mode_comes_from_environment() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        env.write("m", Tree::parse("(macro (concat x (m)))").unwrap());
        env.write_update("inactive-mode", Tree::atom("inline-once"));
        let t = Tree::parse("(m)").unwrap();
        assert_eq!(
            env.rewrite_inactive(&t, &Tree::atom("m")).to_string(),
            "(src-expand (src-highlight (inline-tag m)) (concat x (inline-tag m)))"
        );
    }

    #[test]
    fn test_nested_occurrence_policies() {
        let drd = DrdTable::new();
        let config = EvalConfig {
            max_rewrite_depth: 2,
            ..Default::default()
        };
        let mut env = env(&drd).with_config(config);
        env.write("m", Tree::parse("(macro (concat x (m)))").unwrap());

        assert_eq!(
            rewrite(&mut env, "(m)", "m", InactiveMode::InlineOnce),
            "(src-expand (src-highlight (inline-tag m)) (concat x (inline-tag m)))"
        );
        assert!(env.take_diagnostics().is_empty());

        let errored = rewrite(&mut env, "(m)", "m", InactiveMode::InlineError);
        assert_eq!(
            errored,
            "(src-expand (src-highlight (inline-tag m)) \
             (concat x (error \"nested reference to m inside its own expansion (in rewrite-inactive)\")))"
        );
        let diagnostics = env.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());

        assert_eq!(
            rewrite(&mut env, "(m)", "m", InactiveMode::InlineRecurse),
            "(src-expand (src-highlight (inline-tag m)) \
             (concat x (src-expand (src-highlight (inline-tag m)) \
             (concat x (src-highlight (inline-tag m))))))"
        );
        let diagnostics = env.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
    }

    #[test]
    fn test_argument_occurrence_uses_binding() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        env.write(
            "show",
            Tree::parse("(macro body (rewrite-inactive (concat (arg body) !) (arg body)))").unwrap(),
        );
        assert_eq!(
            env.exec(&Tree::parse("(show (tuple a b))").unwrap()).to_string(),
            "(concat (src-expand (src-highlight (src-arg body)) (inline-tag tuple a b)) !)"
        );
    }
}
