//! Macro argument frames.
//!
//! Applying a macro pushes one [`Frame`] binding all formal arguments.
//! Lookup searches the innermost frame first; names bound in no frame fall
//! through to the variable store, which is the caller's business.

use indexmap::IndexMap;

use crate::tree::{Path, Tree};

/// The bindings of one macro application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// Argument values (IndexMap preserves formal order)
    args: IndexMap<String, Tree>,
    /// Where each argument came from in the caller's tree
    paths: IndexMap<String, Path>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an argument with no known source position.
    pub fn bind(&mut self, name: impl Into<String>, value: Tree) {
        self.args.insert(name.into(), value);
    }

    /// Bind an argument and record its source path.
    pub fn bind_at(&mut self, name: impl Into<String>, value: Tree, path: Path) {
        let name = name.into();
        self.paths.insert(name.clone(), path);
        self.args.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Tree> {
        self.args.get(name)
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.paths.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.args.contains_key(name)
    }

    pub fn bindings(&self) -> &IndexMap<String, Tree> {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// A stack of argument frames.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    stack: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a macro body.
    pub fn enter(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    /// Leave the innermost macro body.
    pub fn exit(&mut self) -> Option<Frame> {
        self.stack.pop()
    }

    /// Look up an argument, innermost frame first.
    pub fn get(&self, name: &str) -> Option<&Tree> {
        self.lookup(name).map(|(_, value)| value)
    }

    /// Look up an argument together with the index of the frame binding it.
    pub fn lookup(&self, name: &str) -> Option<(usize, &Tree)> {
        self.stack
            .iter()
            .enumerate()
            .rev()
            .find_map(|(level, frame)| frame.get(name).map(|value| (level, value)))
    }

    /// Source path of the innermost binding of `name`.
    pub fn source_path(&self, name: &str) -> Option<&Path> {
        self.stack
            .iter()
            .rev()
            .find(|frame| frame.contains(name))
            .and_then(|frame| frame.path(name))
    }

    /// Temporarily remove every frame from `level` upwards.
    ///
    /// Used to evaluate a delayed argument in the frames that were current
    /// where it was written. Hand the result back to [`ScopeStack::resume`].
    pub fn suspend_from(&mut self, level: usize) -> Vec<Frame> {
        let level = level.min(self.stack.len());
        self.stack.split_off(level)
    }

    pub fn resume(&mut self, frames: Vec<Frame>) {
        self.stack.extend(frames);
    }

    /// Number of frames (0 outside any macro body).
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn current(&self) -> Option<&Frame> {
        self.stack.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pairs: &[(&str, &str)]) -> Frame {
        let mut frame = Frame::new();
        for (name, value) in pairs {
            frame.bind(*name, Tree::atom(value));
        }
        frame
    }

    #[test]
    fn test_innermost_frame_wins() {
        let mut scopes = ScopeStack::new();
        scopes.enter(frame(&[("x", "outer"), ("y", "only-outer")]));
        scopes.enter(frame(&[("x", "inner")]));

        assert_eq!(scopes.get("x"), Some(&Tree::atom("inner")));
        assert_eq!(scopes.get("y"), Some(&Tree::atom("only-outer")));
        assert_eq!(scopes.lookup("y").map(|(level, _)| level), Some(0));

        scopes.exit();
        assert_eq!(scopes.get("x"), Some(&Tree::atom("outer")));
        scopes.exit();
        assert_eq!(scopes.get("x"), None);
    }

    #[test]
    fn test_suspend_and_resume() {
        let mut scopes = ScopeStack::new();
        scopes.enter(frame(&[("x", "caller")]));
        scopes.enter(frame(&[("x", "callee")]));

        let suspended = scopes.suspend_from(1);
        assert_eq!(scopes.get("x"), Some(&Tree::atom("caller")));
        scopes.resume(suspended);
        assert_eq!(scopes.get("x"), Some(&Tree::atom("callee")));
        assert_eq!(scopes.depth(), 2);
    }

    #[test]
    fn test_source_paths() {
        let mut f = Frame::new();
        f.bind_at("body", Tree::atom("text"), vec![1]);
        let mut scopes = ScopeStack::new();
        scopes.enter(f);
        assert_eq!(scopes.source_path("body"), Some(&vec![1]));
        assert_eq!(scopes.source_path("other"), None);
    }
}
