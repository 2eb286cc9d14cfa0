//! The type/arity registry consulted for macro applications.
//!
//! The environment only reads from it: arities and default arguments
//! for `exec_compound`, named properties for `drd-props`.

use fxhash::FxHashMap;
use indexmap::IndexMap;

use crate::tree::{Arity, Tree};

/// Type and arity information about tags.
pub trait Drd {
    /// Allowed number of arguments of `tag`, if registered.
    fn arity(&self, tag: &str) -> Option<Arity>;

    /// The value used when argument `index` of `tag` is missing.
    fn default_arg(&self, tag: &str, index: usize) -> Option<Tree>;

    /// A named property of `tag`.
    fn property(&self, tag: &str, property: &str) -> Option<Tree>;
}

/// What the registry knows about one tag.
#[derive(Debug, Clone, Default)]
pub struct DrdEntry {
    pub arity: Option<Arity>,
    pub defaults: FxHashMap<usize, Tree>,
    pub properties: IndexMap<String, Tree>,
}

/// A registry held in memory.
#[derive(Debug, Clone, Default)]
pub struct DrdTable {
    entries: FxHashMap<String, DrdEntry>,
}

impl DrdTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, tag: &str) -> &mut DrdEntry {
        self.entries.entry(tag.to_string()).or_default()
    }

    pub fn set_arity(&mut self, tag: &str, min: usize, max: Option<usize>) -> &mut Self {
        self.entry(tag).arity = Some((min, max));
        self
    }

    pub fn set_default(&mut self, tag: &str, index: usize, value: Tree) -> &mut Self {
        self.entry(tag).defaults.insert(index, value);
        self
    }

    pub fn set_property(&mut self, tag: &str, property: &str, value: Tree) -> &mut Self {
        self.entry(tag)
            .properties
            .insert(property.to_string(), value);
        self
    }

    pub fn get(&self, tag: &str) -> Option<&DrdEntry> {
        self.entries.get(tag)
    }
}

impl Drd for DrdTable {
    fn arity(&self, tag: &str) -> Option<Arity> {
        self.entries.get(tag).and_then(|entry| entry.arity)
    }

    fn default_arg(&self, tag: &str, index: usize) -> Option<Tree> {
        self.entries
            .get(tag)
            .and_then(|entry| entry.defaults.get(&index).cloned())
    }

    fn property(&self, tag: &str, property: &str) -> Option<Tree> {
        self.entries
            .get(tag)
            .and_then(|entry| entry.properties.get(property).cloned())
    }
}
