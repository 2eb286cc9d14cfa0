//! Property-based tests for the typesetting environment.
//!
//! 1. Assigning the same value twice updates the variable at most once
//! 2. `local_start`/`local_end` restores every variable and derived field
//! 3. `depends` reports every variable read outside macro bodies
//! 4. Evaluating a tree twice in the same environment gives the same result

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use typeset_env::{DisplayContext, DrdTable, Env, RefTables, StateConsumer, Tag, Tree};

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<String>>>);

impl StateConsumer for Recorder {
    fn recompute(&mut self, name: &str, _value: &Tree) {
        self.0.borrow_mut().push(name.to_string());
    }
}

fn default_env(drd: &DrdTable) -> Env<'_> {
    let mut env = Env::new(DisplayContext::default(), drd, "doc.tm", RefTables::empty());
    env.write_default_env();
    env
}

// -- Strategies --

/// A variable together with a value it may legitimately hold.
///
/// Lengths stay in absolute or font units so no derived field depends on
/// another unit-dependent field.
fn assignment_strategy() -> impl Strategy<Value = (String, String)> {
    let pick = |name: &'static str, values: &'static [&'static str]| {
        prop::sample::select(values).prop_map(move |v| (name.to_string(), v.to_string()))
    };
    prop_oneof![
        pick("mode", &["text", "math", "prog"]),
        pick("font-size", &["0.5", "1", "1.2", "2"]),
        pick("magnification", &["1", "1.5"]),
        pick("color", &["red", "blue", "#00ff00"]),
        pick("par-width", &["10cm", "4in", "30em"]),
        pick("line-width", &["1px", "0.5mm", "2px"]),
        pick("math-level", &["0", "1", "2"]),
        pick("inactive-mode", &["inline-once", "block-error"]),
        pick("gr-clip-lim2", &["(point 3cm 4cm)", "(point 1in 1in)"]),
        "[a-z]{1,6}".prop_map(|v| ("user-var".to_string(), v)),
    ]
}

static NAMES: [&str; 4] = ["a", "b", "c", "d"];

/// Trees mixing markup and primitives with leaves that read a variable.
fn tree_strategy() -> impl Strategy<Value = Tree> {
    let leaf = prop_oneof![
        "[a-z]{1,4}".prop_map(Tree::atom),
        prop::sample::select(&NAMES[..])
            .prop_map(|n| Tree::node(Tag::Value, vec![Tree::atom(n)])),
        prop::sample::select(&NAMES[..])
            .prop_map(|n| Tree::node(Tag::Provides, vec![Tree::atom(n)])),
        prop::sample::select(&NAMES[..])
            .prop_map(|n| Tree::node(Tag::EvalArgs, vec![Tree::atom(n)])),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        let tags = prop::sample::select(vec!["concat", "document", "tuple", "if", "theorem"]);
        (tags, prop::collection::vec(inner, 1..4))
            .prop_map(|(tag, children)| Tree::node(Tag::from_name(tag), children))
    })
}

fn referenced_values(t: &Tree, out: &mut Vec<String>) {
    if t.is(&Tag::Value) || t.is(&Tag::Provides) || t.is(&Tag::EvalArgs) {
        if let Some(name) = t.child(0).and_then(Tree::as_str) {
            out.push(name.to_string());
        }
    }
    for child in t.children() {
        referenced_values(child, out);
    }
}

// -- Properties --

proptest! {
    #[test]
    fn repeated_assignment_is_a_no_op((name, value) in assignment_strategy()) {
        let drd = DrdTable::new();
        let recorder = Recorder::default();
        let mut env = default_env(&drd);
        env.add_consumer(recorder.clone());
        let t = Tree::parse(&value).unwrap();

        let changes = env.read(&name) != t;
        env.assign(&name, &t);
        let after_first = recorder.0.borrow().len();
        prop_assert_eq!(after_first, usize::from(changes));

        env.assign(&name, &t);
        prop_assert_eq!(recorder.0.borrow().len(), after_first);
    }

    #[test]
    fn local_frame_restores_everything(
        assignments in prop::collection::vec(assignment_strategy(), 0..12)
    ) {
        let drd = DrdTable::new();
        let mut env = default_env(&drd);
        let vars = env.read_env();
        let derived = env.derived().clone();

        env.local_start();
        for (name, value) in &assignments {
            env.assign(name, &Tree::parse(value).unwrap());
        }
        env.local_end();

        prop_assert_eq!(env.read_env(), vars);
        prop_assert_eq!(env.derived(), &derived);
        prop_assert!(env.is_balanced());
    }

    #[test]
    fn nested_with_restores_everything(
        assignments in prop::collection::vec(assignment_strategy(), 1..6)
    ) {
        let drd = DrdTable::new();
        let mut env = default_env(&drd);
        let vars = env.read_env();
        let derived = env.derived().clone();

        let mut body = Tree::atom("body");
        for (name, value) in assignments.iter().rev() {
            body = Tree::node(
                Tag::With,
                vec![Tree::atom(name), Tree::parse(value).unwrap(), body],
            );
        }
        env.exec(&body);

        prop_assert_eq!(env.read_env(), vars);
        prop_assert_eq!(env.derived(), &derived);
    }

    #[test]
    fn depends_reports_direct_references(t in tree_strategy()) {
        let drd = DrdTable::new();
        let env = default_env(&drd);
        let mut referenced = Vec::new();
        referenced_values(&t, &mut referenced);
        for name in &referenced {
            prop_assert!(env.depends(&t, name, 0), "{} in {}", name, t);
        }
    }

    #[test]
    fn evaluation_is_repeatable(t in tree_strategy()) {
        let drd = DrdTable::new();
        let mut env = default_env(&drd);
        env.write("a", Tree::atom("true"));
        env.write("b", Tree::parse("(tuple x y)").unwrap());
        let first = env.exec(&t);
        let second = env.exec(&t);
        prop_assert_eq!(first, second);
    }
}
