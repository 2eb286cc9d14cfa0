//! Dependency analysis for incremental re-layout.

use super::derived::{VarKind, UNIT_DEPENDENT};
use super::Env;
use crate::tree::{Tag, Tree};

impl<'a> Env<'a> {
    /// Whether evaluating `t` could read the variable `name`.
    ///
    /// Macro bodies are followed down `level` applications. The answer errs
    /// on the side of `true`: computed variable names and computed macro
    /// heads count as reading everything.
    pub fn depends(&self, t: &Tree, name: &str, level: usize) -> bool {
        let tag = match t.tag() {
            None => return false,
            Some(tag) => tag,
        };
        let children = t.children();
        match tag {
            Tag::Value | Tag::Arg => match children.first().map(Tree::as_str) {
                Some(Some(var)) if var == name => true,
                Some(None) => true,
                _ => self.any_child(children, name, level),
            },
            Tag::User(macro_name) => {
                self.macro_depends(macro_name, name, level)
                    || self.any_child(children, name, level)
            }
            Tag::Compound => match children.first().map(Tree::as_str) {
                Some(Some(macro_name)) => {
                    self.macro_depends(macro_name, name, level)
                        || self.any_child(&children[1..], name, level)
                }
                _ => true,
            },
            Tag::Provides | Tag::EvalArgs => match children.first().map(Tree::as_str) {
                Some(Some(var)) => var == name,
                Some(None) => true,
                None => false,
            },
            Tag::RewriteInactive => {
                REWRITE_VARIABLES.contains(&name)
                    || children.get(1).and_then(Tree::as_str) == Some(name)
                    || self.any_child(children, name, level)
            }
            // The included file may read anything
            Tag::Include => true,
            Tag::Translate | Tag::Date if name == "language" => true,
            _ if reads_units(tag) && is_unit_variable(name) => true,
            _ => self.any_child(children, name, level),
        }
    }

    fn any_child(&self, children: &[Tree], name: &str, level: usize) -> bool {
        children.iter().any(|c| self.depends(c, name, level))
    }

    /// A macro application reads the variable holding the macro, and at
    /// `level > 0` whatever its body reads.
    pub(super) fn macro_depends(&self, macro_name: &str, name: &str, level: usize) -> bool {
        if macro_name == name {
            return true;
        }
        if level == 0 {
            return false;
        }
        let definition = self.store.read(macro_name);
        if !(definition.is(&Tag::Macro) || definition.is(&Tag::XMacro)) {
            return false;
        }
        match definition.children().last() {
            Some(body) => self.depends(body, name, level - 1),
            None => false,
        }
    }
}

/// Style variables consulted by the source view.
const REWRITE_VARIABLES: [&str; 4] = ["inactive-mode", "src-compact", "src-close", "src-special"];

/// Primitives whose operands may be lengths in state-dependent units.
fn reads_units(tag: &Tag) -> bool {
    matches!(
        tag,
        Tag::Plus
            | Tag::Minus
            | Tag::Times
            | Tag::Over
            | Tag::Equal
            | Tag::Unequal
            | Tag::Less
            | Tag::Lesseq
            | Tag::Greater
            | Tag::Greatereq
    )
}

fn is_unit_variable(name: &str) -> bool {
    UNIT_DEPENDENT.contains(&name) || VarKind::of(name).map_or(false, VarKind::affects_units)
}
