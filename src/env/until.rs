//! Partial evaluation up to a position in the document.

use tracing::instrument;

use super::Env;
use crate::tree::{Tag, Tree};

impl<'a> Env<'a> {
    /// Bring the environment into the state it has at `path` inside `t`.
    ///
    /// Earlier siblings in documents and concatenations are executed for
    /// their assignments, and `with` bindings enclosing the position are
    /// applied. Macro arguments on the way are entered in the caller's
    /// context. All writes are monitored, so a surrounding
    /// `local_start`/`local_end` undoes them.
    #[instrument(level = "trace", skip_all, fields(path = ?path))]
    pub fn exec_until(&mut self, t: &Tree, path: &[usize]) {
        self.exec_along(t, path, None);
    }

    /// [`Env::exec_until`], also telling whether the state at `path` may
    /// involve `var`.
    ///
    /// That is the case when `var` is written on the way, when an executed
    /// sibling or `with` binding reads it, or when a macro applied along
    /// the path reads it within `level` applications. A `false` answer
    /// means a change of `var` leaves the state at `path` as it is.
    #[instrument(level = "trace", skip_all, fields(path = ?path, var))]
    pub fn exec_until_var(&mut self, t: &Tree, path: &[usize], var: &str, level: usize) -> bool {
        let before = self.store.get(var).cloned();
        let involved = self.exec_along(t, path, Some((var, level)));
        involved || self.store.get(var) != before.as_ref()
    }

    fn exec_along(&mut self, t: &Tree, path: &[usize], watch: Option<(&str, usize)>) -> bool {
        let (&index, rest) = match path.split_first() {
            Some(split) => split,
            None => return false,
        };
        let child = match t.child(index) {
            Some(child) => child,
            None => return false,
        };
        let reads = |env: &Self, t: &Tree| {
            watch.map_or(false, |(var, level)| env.depends(t, var, level))
        };
        let mut involved = false;
        match t.tag() {
            Some(Tag::Document | Tag::Concat) => {
                for sibling in &t.children()[..index] {
                    involved |= reads(self, sibling);
                    self.exec(sibling);
                }
            }
            Some(Tag::With) if index + 1 == t.arity() => {
                involved |= self.bind_with_variables(t, watch);
            }
            Some(Tag::User(name)) => {
                involved |= watch.map_or(false, |(var, level)| self.macro_depends(name, var, level));
            }
            _ => {}
        }
        let deeper = self.exec_along(child, rest, watch);
        involved || deeper
    }

    fn bind_with_variables(&mut self, t: &Tree, watch: Option<(&str, usize)>) -> bool {
        let mut involved = false;
        let bindings = &t.children()[..t.arity() - 1];
        for pair in bindings.chunks_exact(2) {
            if let Some((var, level)) = watch {
                involved |= self.depends(&pair[1], var, level);
            }
            if let Ok(name) = self.exec_string(&pair[0]) {
                if watch.map_or(false, |(var, _)| var == name) {
                    involved = true;
                }
                let value = self.exec(&pair[1]);
                self.monitored_write_update(&name, value);
            }
        }
        involved
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::env::{DisplayContext, DrdTable, Env, RefTables};
    use crate::tree::Tree;

    fn env(drd: &DrdTable) -> Env<'_> {
        let mut env = Env::new(DisplayContext::default(), drd, "doc.tm", RefTables::empty());
        env.write_default_env();
        env
    }

    #[test]
    fn test_runs_preceding_side_effects() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        let doc = Tree::parse(
            "(document (assign x 1) \
               (with font-size 2 (concat (assign y 2) here (assign z 3))) \
               (assign w 4))",
        )
        .unwrap();

        env.local_start();
        env.exec_until(&doc, &[1, 2, 1]);
        assert_eq!(env.read("x"), Tree::atom("1"));
        assert_eq!(env.read("y"), Tree::atom("2"));
        assert_eq!(env.read("font-size"), Tree::atom("2"));
        assert_eq!(env.derived().font.size, 2.0);
        assert!(!env.provides("z"));
        assert!(!env.provides("w"));

        env.local_end();
        assert!(!env.provides("x"));
        assert!(!env.provides("y"));
        assert_eq!(env.read("font-size"), Tree::atom("1"));
        assert_eq!(env.derived().font.size, 1.0);
    }

    #[test]
    fn test_with_bindings_only_apply_inside_the_body() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        let t = Tree::parse("(with mode math (concat a b))").unwrap();
        env.exec_until(&t, &[1]);
        assert_eq!(env.read("mode"), Tree::atom("text"));
        env.exec_until(&t, &[2, 1]);
        assert_eq!(env.read("mode"), Tree::atom("math"));
    }

    #[test]
    fn test_tracks_a_variable_along_the_path() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        env.write("strong", Tree::parse("(macro x (with font-series (value weight) (arg x)))").unwrap());
        let doc = Tree::parse(
            "(document (assign n 1) \
               (concat (if (value draft) a b) (strong here)) \
               (with color red (concat c d)))",
        )
        .unwrap();

        env.local_start();
        assert!(env.exec_until_var(&doc, &[1, 1, 0], "draft", 0));
        env.local_end();

        env.local_start();
        assert!(!env.exec_until_var(&doc, &[1, 1, 0], "weight", 0));
        env.local_end();

        env.local_start();
        assert!(env.exec_until_var(&doc, &[1, 1, 0], "weight", 1));
        env.local_end();

        env.local_start();
        assert!(env.exec_until_var(&doc, &[1, 0], "n", 0));
        assert_eq!(env.read("n"), Tree::atom("1"));
        env.local_end();

        env.local_start();
        assert!(env.exec_until_var(&doc, &[2, 2, 0], "color", 0));
        assert!(!env.exec_until_var(&doc, &[2, 2, 0], "mode", 0));
        env.local_end();
        assert!(env.is_balanced());
    }

    #[test]
    fn test_bad_paths_do_nothing() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        let doc = Tree::parse("(document (assign x 1) y)").unwrap();
        env.exec_until(&doc, &[]);
        env.exec_until(&doc, &[7, 0]);
        assert!(!env.provides("x"));
    }
}
