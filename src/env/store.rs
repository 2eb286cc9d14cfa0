//! Variable storage with a write-back log.
//!
//! The store is a flat map from variable names to trees. Each
//! `local_start` opens a write-back frame; monitored writes record the value
//! a name had when the frame was opened, and `local_end` puts those values
//! back. Writes outside any frame are not logged.

use fxhash::FxHashMap;
use indexmap::IndexMap;

use crate::tree::Tree;

/// Values overwritten since a frame was opened. `None` marks a name that was
/// absent, so restoring removes it.
pub type WriteBack = IndexMap<String, Option<Tree>>;

#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    vars: FxHashMap<String, Tree>,
    back: Vec<WriteBack>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value of `name`, or `(uninit)` if it was never set.
    pub fn read(&self, name: &str) -> Tree {
        self.vars.get(name).cloned().unwrap_or_else(Tree::uninit)
    }

    pub fn get(&self, name: &str) -> Option<&Tree> {
        self.vars.get(name)
    }

    pub fn provides(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Overwrite without logging.
    pub fn write(&mut self, name: &str, value: Tree) {
        self.vars.insert(name.to_string(), value);
    }

    /// Remove without logging.
    pub fn remove(&mut self, name: &str) -> Option<Tree> {
        self.vars.remove(name)
    }

    /// Overwrite, logging the prior value in the current frame.
    ///
    /// Only the first write of a name in a frame is logged: that is the
    /// value the frame has to restore.
    pub fn monitored_write(&mut self, name: &str, value: Tree) {
        if let Some(frame) = self.back.last_mut() {
            if !frame.contains_key(name) {
                frame.insert(name.to_string(), self.vars.get(name).cloned());
            }
        }
        self.write(name, value);
    }

    /// Open a write-back frame.
    pub fn local_start(&mut self) {
        self.back.push(WriteBack::new());
    }

    /// Close the current write-back frame and restore every logged value.
    ///
    /// Returns the restored names in the order they were first written.
    ///
    /// # Panics
    ///
    /// Panics if no frame is open. Unbalanced scopes are a caller bug and
    /// would leave the environment in an undefined state.
    pub fn local_end(&mut self) -> Vec<String> {
        let frame = match self.back.pop() {
            Some(frame) => frame,
            None => panic!("local_end called without a matching local_start"),
        };
        let mut restored = Vec::with_capacity(frame.len());
        for (name, old) in frame {
            match old {
                Some(value) => {
                    self.vars.insert(name.clone(), value);
                }
                None => {
                    self.vars.remove(&name);
                }
            }
            restored.push(name);
        }
        restored
    }

    /// Names written since the innermost frame was opened.
    pub fn written(&self) -> impl Iterator<Item = &str> {
        self.back
            .last()
            .into_iter()
            .flat_map(|frame| frame.keys().map(String::as_str))
    }

    /// Number of open write-back frames.
    pub fn depth(&self) -> usize {
        self.back.len()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variable names in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// All variables, sorted by name.
    pub fn snapshot(&self) -> IndexMap<String, Tree> {
        let mut entries: Vec<_> = self
            .vars
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().collect()
    }

    /// Replace the whole contents. Open frames are kept.
    pub fn replace(&mut self, vars: FxHashMap<String, Tree>) {
        self.vars = vars;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_unset_is_uninit() {
        let store = VariableStore::new();
        assert!(store.read("nothing").is_uninit());
        assert!(!store.provides("nothing"));
    }

    #[test]
    fn test_local_end_restores_values() {
        let mut store = VariableStore::new();
        store.write("mode", Tree::atom("math"));

        store.local_start();
        store.monitored_write("mode", Tree::atom("text"));
        store.monitored_write("mode", Tree::atom("prog"));
        store.monitored_write("fresh", Tree::atom("1"));
        assert_eq!(store.read("mode"), Tree::atom("prog"));

        let restored = store.local_end();
        assert_eq!(restored, vec!["mode".to_string(), "fresh".to_string()]);
        assert_eq!(store.read("mode"), Tree::atom("math"));
        assert!(!store.provides("fresh"));
        assert_eq!(store.depth(), 0);
    }

    #[test]
    fn test_nested_frames() {
        let mut store = VariableStore::new();
        store.local_start();
        store.monitored_write("x", Tree::atom("1"));
        store.local_start();
        store.monitored_write("x", Tree::atom("2"));
        store.local_end();
        assert_eq!(store.read("x"), Tree::atom("1"));
        store.local_end();
        assert!(!store.provides("x"));
    }

    #[test]
    fn test_unmonitored_write_is_not_restored() {
        let mut store = VariableStore::new();
        store.local_start();
        store.write("x", Tree::atom("1"));
        assert!(store.local_end().is_empty());
        assert_eq!(store.read("x"), Tree::atom("1"));
    }

    #[test]
    #[should_panic(expected = "without a matching local_start")]
    fn test_unbalanced_local_end_panics() {
        let mut store = VariableStore::new();
        store.local_end();
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let mut store = VariableStore::new();
        store.write("b", Tree::atom("2"));
        store.write("a", Tree::atom("1"));
        let keys: Vec<_> = store.snapshot().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
