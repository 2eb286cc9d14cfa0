//! The typesetting environment.
//!
//! An [`Env`] owns the variable store, the macro argument frames and the
//! derived state of one document pass. Evaluation ([`Env::exec`]), partial
//! evaluation ([`Env::exec_until`]), dependency analysis
//! ([`Env::depends`]) and inactive rewriting ([`Env::rewrite_inactive`])
//! are methods on it, defined in the submodules.
//!
//! # Architecture
//!
//! ```text
//!   exec(tree) ──────► dispatch on Tag ──► handler
//!        │                    │                │
//!        │             ScopeStack frames   VariableStore
//!        │             (macro arguments)   (+ write-back log)
//!        │                                     │
//!        └──── assign / with ──► update(name) ─┴─► DerivedState
//!                                                  StateConsumers
//! ```

mod config;
mod depends;
mod derived;
mod drd;
mod exec;
mod inactive;
mod language;
mod library;
mod ops;
mod scope;
mod store;
mod units;
mod until;
mod vfs;

use std::sync::Arc;

use fxhash::FxHashMap;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use tracing::{info, trace, warn};

pub use config::{EvalConfig, InactiveMode, RecursionPolicy};
pub use derived::{
    DerivedState, FontSpec, Frame as GraphicsFrame, Mode, PageGeometry, SrcClose, SrcCompact,
    SrcSpecial, SrcStyle, VarKind,
};
pub use drd::{Drd, DrdEntry, DrdTable};
pub use language::{NoTranslations, TranslationTable, Translator};
pub use ops::is_true;
pub use scope::{Frame, ScopeStack};
pub use store::{VariableStore, WriteBack};
pub use units::{format_length, is_length, Color, Space, Units, PIXEL};
pub use vfs::{MemoryVfs, NoopVfs, RealVfs, VfsError, VfsResult, VirtualFileSystem};

use derived::UNIT_DEPENDENT;

use crate::tree::{Tag, Tree};
use crate::utils::error::{Diagnostic, DiagnosticSeverity};

/// The output device the document is laid out for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayContext {
    /// Resolution in dots per inch
    pub dpi: i64,
}

impl Default for DisplayContext {
    fn default() -> Self {
        Self { dpi: 600 }
    }
}

lazy_static! {
    static ref NO_REFS: FxHashMap<String, Tree> = FxHashMap::default();
}

/// The reference and auxiliary tables of the document, borrowed from the
/// caller for the whole session.
#[derive(Debug, Clone, Copy)]
pub struct RefTables<'a> {
    pub local_ref: &'a FxHashMap<String, Tree>,
    pub global_ref: &'a FxHashMap<String, Tree>,
    pub local_aux: &'a FxHashMap<String, Tree>,
    pub global_aux: &'a FxHashMap<String, Tree>,
}

impl RefTables<'static> {
    /// Four empty tables.
    pub fn empty() -> Self {
        Self {
            local_ref: &NO_REFS,
            global_ref: &NO_REFS,
            local_aux: &NO_REFS,
            global_aux: &NO_REFS,
        }
    }
}

impl<'a> RefTables<'a> {
    /// A binding from the local table, else the global one.
    pub fn binding(&self, key: &str) -> Option<&'a Tree> {
        self.local_ref.get(key).or_else(|| self.global_ref.get(key))
    }

    /// An attachment from the local table, else the global one.
    pub fn attachment(&self, key: &str) -> Option<&'a Tree> {
        self.local_aux.get(key).or_else(|| self.global_aux.get(key))
    }
}

/// Receives every `update` of a variable, e.g. to rebuild a font or a
/// layout resource from the new value.
pub trait StateConsumer {
    fn recompute(&mut self, name: &str, value: &Tree);
}

/// The environment of one document-editing session.
pub struct Env<'a> {
    store: VariableStore,
    scopes: ScopeStack,
    derived: DerivedState,
    display: DisplayContext,
    drd: &'a dyn Drd,
    base: String,
    refs: RefTables<'a>,
    vfs: Arc<dyn VirtualFileSystem>,
    translator: Box<dyn Translator + 'a>,
    consumers: Vec<Box<dyn StateConsumer + 'a>>,
    config: EvalConfig,
    diagnostics: Vec<Diagnostic>,
    /// Current macro application depth (for runaway recursion protection)
    depth: usize,
}

impl<'a> Env<'a> {
    /// Create an empty environment. No variable is set; call
    /// [`Env::write_default_env`] for the standard values.
    pub fn new(
        display: DisplayContext,
        drd: &'a dyn Drd,
        base: impl Into<String>,
        refs: RefTables<'a>,
    ) -> Self {
        let config = EvalConfig::default();
        Self {
            store: VariableStore::new(),
            scopes: ScopeStack::new(),
            derived: DerivedState::new(display.dpi, config.inactive_mode),
            display,
            drd,
            base: base.into(),
            refs,
            vfs: Arc::new(NoopVfs),
            translator: Box::new(NoTranslations),
            consumers: Vec::new(),
            config,
            diagnostics: Vec::new(),
            depth: 0,
        }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.derived.set_default_inactive_mode(config.inactive_mode);
        self.config = config;
        self.update("inactive-mode");
        self
    }

    pub fn with_vfs(mut self, vfs: Arc<dyn VirtualFileSystem>) -> Self {
        self.vfs = vfs;
        self
    }

    pub fn with_translator(mut self, translator: impl Translator + 'a) -> Self {
        self.translator = Box::new(translator);
        self
    }

    /// Register a consumer notified on every update.
    pub fn add_consumer(&mut self, consumer: impl StateConsumer + 'a) {
        self.consumers.push(Box::new(consumer));
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn display(&self) -> DisplayContext {
        self.display
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn derived(&self) -> &DerivedState {
        &self.derived
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            DiagnosticSeverity::Error => warn!(%diagnostic, "evaluation error"),
            DiagnosticSeverity::Warning => warn!(%diagnostic),
            DiagnosticSeverity::Info => info!(%diagnostic),
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    // ------------------------------------------------------------------
    // Variable store
    // ------------------------------------------------------------------

    /// The value of `name`, or `(uninit)`.
    pub fn read(&self, name: &str) -> Tree {
        self.store.read(name)
    }

    pub fn provides(&self, name: &str) -> bool {
        self.store.provides(name)
    }

    /// Overwrite without logging and without refreshing derived state.
    pub fn write(&mut self, name: &str, value: Tree) {
        self.store.write(name, value);
    }

    pub fn write_update(&mut self, name: &str, value: Tree) {
        self.store.write(name, value);
        self.update(name);
    }

    /// Overwrite, logging the prior value in the current write-back frame.
    pub fn monitored_write(&mut self, name: &str, value: Tree) {
        self.store.monitored_write(name, value);
    }

    pub fn monitored_write_update(&mut self, name: &str, value: Tree) {
        self.store.monitored_write(name, value);
        self.update(name);
    }

    /// Evaluate `t` and store the result in `name`.
    ///
    /// Nothing is logged or updated when the value does not change.
    pub fn assign(&mut self, name: &str, t: &Tree) -> Tree {
        let value = self.exec(t);
        self.assign_value(name, value.clone());
        value
    }

    /// Store an evaluated value; returns whether anything changed.
    pub(crate) fn assign_value(&mut self, name: &str, value: Tree) -> bool {
        if self.store.get(name) == Some(&value) {
            trace!(name, "assignment leaves value unchanged");
            return false;
        }
        self.store.monitored_write(name, value);
        self.update(name);
        true
    }

    /// Open a write-back frame.
    pub fn local_start(&mut self) {
        self.store.local_start();
        trace!(depth = self.store.depth(), "local_start");
    }

    /// Close the current write-back frame, restoring and updating every
    /// variable written since the matching [`Env::local_start`].
    ///
    /// # Panics
    ///
    /// Panics without a matching `local_start`.
    pub fn local_end(&mut self) {
        let restored = self.store.local_end();
        trace!(depth = self.store.depth(), restored = restored.len(), "local_end");
        for name in restored {
            self.update(&name);
        }
    }

    /// Variables written since the innermost [`Env::local_start`] whose
    /// value differs from the one in `seen`.
    ///
    /// `seen` is brought up to date, so the next call only returns what
    /// changed in between. Unset variables compare as `(uninit)`.
    pub fn local_update(&self, seen: &mut IndexMap<String, Tree>) -> IndexMap<String, Tree> {
        let mut changes = IndexMap::new();
        for name in self.store.written() {
            let value = self.store.read(name);
            if seen.get(name).map_or(!value.is_uninit(), |old| *old != value) {
                seen.insert(name.to_string(), value.clone());
                changes.insert(name.to_string(), value);
            }
        }
        changes
    }

    /// Bind `name` to `value` until the matching [`Env::local_end_var`];
    /// returns the previous value, `None` if the name was unset.
    pub fn local_begin(&mut self, name: &str, value: Tree) -> Option<Tree> {
        let old = self.store.get(name).cloned();
        self.store.monitored_write(name, value);
        self.update(name);
        old
    }

    /// Undo a [`Env::local_begin`] given the value it returned.
    pub fn local_end_var(&mut self, name: &str, old: Option<Tree>) {
        match old {
            Some(value) => self.store.write(name, value),
            None => {
                self.store.remove(name);
            }
        }
        self.update(name);
    }

    /// Enter a sub- or superscript: the index level goes up by one.
    pub fn local_begin_script(&mut self) -> Option<Tree> {
        let level = self.derived.index_level + 1;
        self.local_begin("math-level", Tree::atom(level.to_string()))
    }

    pub fn local_end_script(&mut self, old: Option<Tree>) {
        self.local_end_var("math-level", old);
    }

    /// Whether every write-back frame and argument frame has been closed.
    pub fn is_balanced(&self) -> bool {
        self.store.depth() == 0 && self.scopes.is_empty()
    }

    // ------------------------------------------------------------------
    // Bulk access
    // ------------------------------------------------------------------

    /// Write the standard value of every system variable.
    pub fn write_default_env(&mut self) {
        for (name, value) in default_env(self.config.inactive_mode) {
            self.store.write(name, value);
        }
        self.update_all();
    }

    /// Replace the whole store.
    pub fn write_env(&mut self, vars: IndexMap<String, Tree>) {
        self.store.replace(vars.into_iter().collect());
        self.update_all();
    }

    /// Overwrite some variables without logging.
    pub fn patch_env(&mut self, patch: &IndexMap<String, Tree>) {
        for (name, value) in patch {
            self.write_update(name, value.clone());
        }
    }

    /// Overwrite some variables, logging prior values.
    pub fn monitored_patch_env(&mut self, patch: &IndexMap<String, Tree>) {
        for (name, value) in patch {
            self.monitored_write_update(name, value.clone());
        }
    }

    /// All variables, sorted by name.
    pub fn read_env(&self) -> IndexMap<String, Tree> {
        self.store.snapshot()
    }

    // ------------------------------------------------------------------
    // Derived state
    // ------------------------------------------------------------------

    /// Refresh whatever depends on `name` and notify the consumers.
    pub fn update(&mut self, name: &str) {
        let value = self.store.read(name);
        if let Some(kind) = VarKind::of(name) {
            self.derived.apply(kind, &value);
            if kind.affects_units() {
                self.reapply_unit_dependent(Some(name));
            }
            trace!(name, ?kind, "derived state updated");
        }
        for consumer in &mut self.consumers {
            consumer.recompute(name, &value);
        }
    }

    /// Refresh every derived field.
    pub fn update_all(&mut self) {
        let names: Vec<&'static str> = VarKind::names().collect();
        for name in names {
            let value = self.store.read(name);
            if let Some(kind) = VarKind::of(name) {
                self.derived.apply(kind, &value);
            }
        }
        self.reapply_unit_dependent(None);
    }

    fn reapply_unit_dependent(&mut self, skip: Option<&str>) {
        for name in UNIT_DEPENDENT {
            if Some(name) == skip {
                continue;
            }
            if let Some(kind) = VarKind::of(name) {
                let value = self.store.read(name);
                self.derived.apply(kind, &value);
            }
        }
    }

    // ------------------------------------------------------------------
    // Typed getters
    // ------------------------------------------------------------------

    pub fn get_bool(&self, name: &str) -> bool {
        is_true(&self.store.read(name))
    }

    /// Compound and malformed values read as 0.
    pub fn get_int(&self, name: &str) -> i64 {
        let value = self.store.read(name);
        let s = value.as_str().unwrap_or("").trim();
        s.parse::<i64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(|x| x as i64))
            .unwrap_or(0)
    }

    pub fn get_double(&self, name: &str) -> f64 {
        self.store
            .read(name)
            .as_str()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    /// Compound values read as the empty string.
    pub fn get_string(&self, name: &str) -> String {
        self.store
            .read(name)
            .as_str()
            .unwrap_or("")
            .to_string()
    }

    /// A length variable in tmpt.
    pub fn get_length(&self, name: &str) -> i64 {
        self.store
            .read(name)
            .as_str()
            .and_then(|s| self.decode_length(s))
            .unwrap_or(0)
    }

    /// A space variable; compound and malformed values read as no space.
    pub fn get_space(&self, name: &str) -> Space {
        self.store
            .read(name)
            .as_str()
            .and_then(|s| self.decode_space(s))
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Lengths
    // ------------------------------------------------------------------

    pub fn units(&self) -> Units {
        self.derived.units()
    }

    pub fn decode_length(&self, s: &str) -> Option<i64> {
        self.units().decode_length(s)
    }

    pub fn decode_point(&self, t: &Tree) -> Option<(i64, i64)> {
        self.units().decode_point(t)
    }

    pub fn decode_space(&self, s: &str) -> Option<Space> {
        self.units().decode_space(s)
    }

    pub fn add_lengths(&self, l1: &str, l2: &str) -> Option<String> {
        self.units().add_lengths(l1, l2)
    }

    pub fn multiply_length(&self, x: f64, l: &str) -> Option<String> {
        self.units().multiply_length(x, l)
    }

    pub fn divide_lengths(&self, l1: &str, l2: &str) -> Option<f64> {
        self.units().divide_lengths(l1, l2)
    }

    pub fn page_geometry(&self) -> PageGeometry {
        PageGeometry::decode(|name| self.store.read(name), &self.units())
    }
}

/// Standard values of the system variables.
fn default_env(inactive_mode: InactiveMode) -> Vec<(&'static str, Tree)> {
    let atom = |s: &str| Tree::atom(s);
    let point = |x: &str, y: &str| Tree::node(Tag::Point, vec![atom(x), atom(y)]);
    vec![
        ("magnification", atom("1")),
        ("mode", atom("text")),
        ("language", atom("english")),
        ("font", atom("roman")),
        ("font-family", atom("rm")),
        ("font-series", atom("medium")),
        ("font-shape", atom("right")),
        ("font-size", atom("1")),
        ("font-base-size", atom("10")),
        ("math-level", atom("0")),
        ("math-display", atom("false")),
        ("math-condensed", atom("false")),
        ("math-vpos", atom("0")),
        ("color", atom("black")),
        ("line-width", atom("1px")),
        ("par-width", atom("15cm")),
        ("preamble", atom("false")),
        (
            "gr-frame",
            Tree::node(
                Tag::Tuple,
                vec![
                    atom("scale"),
                    atom("1cm"),
                    Tree::node(Tag::Tuple, vec![atom("0cm"), atom("0cm")]),
                ],
            ),
        ),
        ("gr-clip-lim1", point("0cm", "0cm")),
        ("gr-clip-lim2", point("15cm", "10cm")),
        ("src-style", atom("angular")),
        ("src-special", atom("normal")),
        ("src-compact", atom("normal")),
        ("src-close", atom("long")),
        ("inactive-mode", atom(inactive_mode.name())),
        ("page-width", atom("21cm")),
        ("page-height", atom("29.7cm")),
        ("page-odd", atom("2.5cm")),
        ("page-even", atom("2.5cm")),
        ("page-right", atom("2.5cm")),
        ("page-top", atom("3cm")),
        ("page-bot", atom("3cm")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl StateConsumer for Recorder {
        fn recompute(&mut self, name: &str, _value: &Tree) {
            self.0.borrow_mut().push(name.to_string());
        }
    }

    fn env(drd: &DrdTable) -> Env<'_> {
        let mut env = Env::new(DisplayContext::default(), drd, "doc.tm", RefTables::empty());
        env.write_default_env();
        env
    }

    #[test]
    fn test_assign_then_scope_restores_mode() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        env.assign("mode", &Tree::atom("math"));
        assert_eq!(env.read("mode"), Tree::atom("math"));
        assert_eq!(env.derived().mode, Mode::Math);

        env.local_start();
        env.assign("mode", &Tree::atom("text"));
        assert_eq!(env.derived().mode, Mode::Text);
        env.local_end();

        assert_eq!(env.read("mode"), Tree::atom("math"));
        assert_eq!(env.derived().mode, Mode::Math);
        assert!(env.is_balanced());
    }

    #[test]
    fn test_repeated_assignment_updates_once() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        let log = Rc::new(RefCell::new(Vec::new()));
        env.add_consumer(Recorder(log.clone()));

        env.assign("color", &Tree::atom("red"));
        env.assign("color", &Tree::atom("red"));
        assert_eq!(*log.borrow(), vec!["color".to_string()]);
        assert_eq!(env.derived().color, Color::rgb(255, 0, 0));
    }

    #[test]
    fn test_local_begin_and_end_var() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        let old = env.local_begin("font-size", Tree::atom("2"));
        assert_eq!(env.derived().font.effective_size(), 20.0);
        env.local_end_var("font-size", old);
        assert_eq!(env.read("font-size"), Tree::atom("1"));
        assert_eq!(env.derived().font.effective_size(), 10.0);

        let old = env.local_begin("fresh", Tree::atom("x"));
        assert_eq!(old, None);
        env.local_end_var("fresh", old);
        assert!(!env.provides("fresh"));
    }

    #[test]
    fn test_explicit_uninit_survives_local_binding() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        env.write("blank", Tree::uninit());
        let old = env.local_begin("blank", Tree::atom("x"));
        assert_eq!(old, Some(Tree::uninit()));
        env.local_end_var("blank", old);
        assert!(env.provides("blank"));
        assert!(env.read("blank").is_uninit());
    }

    #[test]
    fn test_local_update_reports_changes_since_last_call() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        let mut seen = IndexMap::new();

        env.local_start();
        env.assign("mode", &Tree::atom("math"));
        env.assign("counter", &Tree::atom("1"));
        let changes = env.local_update(&mut seen);
        assert_eq!(changes.keys().collect::<Vec<_>>(), vec!["mode", "counter"]);
        assert_eq!(changes["mode"], Tree::atom("math"));

        env.assign("counter", &Tree::atom("2"));
        let changes = env.local_update(&mut seen);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["counter"], Tree::atom("2"));
        assert!(env.local_update(&mut seen).is_empty());
        env.local_end();

        assert!(env.local_update(&mut seen).is_empty());
    }

    #[test]
    fn test_get_space() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        env.write("gap", Tree::atom("10tmpt"));
        env.write("fill", Tree::atom("2fn*"));
        assert_eq!(env.get_space("gap"), Space::rigid(10));
        let fill = env.get_space("fill");
        assert_eq!((fill.min, fill.def), (0, 0));
        assert_eq!(fill.max, env.decode_length("2fn").unwrap());
        assert_eq!(env.get_space("gr-clip-lim1"), Space::default());
    }

    #[test]
    fn test_script_level() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        let outer = env.local_begin_script();
        let inner = env.local_begin_script();
        assert_eq!(env.derived().index_level, 2);
        env.local_end_script(inner);
        env.local_end_script(outer);
        assert_eq!(env.derived().index_level, 0);
    }

    #[test]
    fn test_font_change_rescales_dependent_lengths() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        env.write_update("line-width", Tree::atom("0.1fn"));
        let thin = env.derived().line_width;
        env.write_update("font-size", Tree::atom("2"));
        assert!((env.derived().line_width - 2 * thin).abs() <= 1);
    }

    #[test]
    fn test_typed_getters() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        env.write("n", Tree::atom("42"));
        env.write("x", Tree::atom("2.5"));
        env.write("t", Tree::parse("(tuple a)").unwrap());
        assert_eq!(env.get_int("n"), 42);
        assert_eq!(env.get_int("x"), 2);
        assert_eq!(env.get_double("x"), 2.5);
        assert_eq!(env.get_int("t"), 0);
        assert_eq!(env.get_string("t"), "");
        assert!(!env.get_bool("math-display"));
        assert_eq!(env.get_length("line-width"), PIXEL);
    }

    #[test]
    fn test_page_geometry_from_defaults() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        let standard = PageGeometry::standard(&env.units());
        assert_eq!(env.page_geometry(), standard);
        env.write("page-width", Tree::atom("100tmpt"));
        assert_eq!(env.page_geometry().width, 100);
    }

    #[test]
    fn test_patch_and_read_env() {
        let drd = DrdTable::new();
        let mut env = env(&drd);
        let mut patch = IndexMap::new();
        patch.insert("mode".to_string(), Tree::atom("src"));
        patch.insert("x".to_string(), Tree::atom("1"));

        env.local_start();
        env.monitored_patch_env(&patch);
        assert_eq!(env.derived().mode, Mode::Src);
        env.local_end();
        assert_eq!(env.derived().mode, Mode::Text);
        assert!(!env.read_env().contains_key("x"));

        env.patch_env(&patch);
        assert_eq!(env.read_env().get("x"), Some(&Tree::atom("1")));
    }
}
