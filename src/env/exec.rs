//! The tree evaluator.
//!
//! [`Env::exec`] dispatches on the tag of the root node. Handlers return
//! `EvalResult<Tree>` and use `?` on their operands; `exec` turns whatever
//! error reaches it into an `(error ...)` tree plus a diagnostic, so one
//! malformed macro never aborts the rest of the document.
//!
//! Structural nodes (documents, concatenations, unknown tags) evaluate
//! their children through `exec`, so an error stays local to the child.
//! Operands of primitives go through `eval` and carry errors upwards.

use tracing::{debug, instrument, trace};

use super::library;
use super::ops::{self, is_true};
use super::scope::Frame;
use super::Env;
use crate::tree::{Tag, Tree};
use crate::utils::error::{Diagnostic, EvalError, EvalResult};

impl<'a> Env<'a> {
    /// Evaluate `t` in the current environment.
    #[instrument(level = "trace", skip_all, fields(tag = %t.label()))]
    pub fn exec(&mut self, t: &Tree) -> Tree {
        match self.eval(t) {
            Ok(value) => value,
            Err(err) => self.absorb(err),
        }
    }

    /// Evaluate `t` where a plain string is required.
    pub fn exec_string(&mut self, t: &Tree) -> EvalResult<String> {
        let value = self.exec(t);
        if value.is_error() {
            return Err(EvalError::propagated(value));
        }
        match value.as_str() {
            Some(s) => Ok(s.to_string()),
            None => {
                let err = EvalError::not_a_string(&value);
                self.report(Diagnostic::error(err.to_string()).with_location("exec_string"));
                Err(err)
            }
        }
    }

    /// Record an error and return the tree standing in for the failed
    /// evaluation. Errors that only carry an existing error tree were
    /// reported where they arose.
    pub(crate) fn absorb(&mut self, err: EvalError) -> Tree {
        if !err.is_propagated() {
            let mut diagnostic = Diagnostic::error(err.kind().to_string());
            if let Some(context) = &err.context {
                diagnostic = diagnostic.with_location(context.clone());
            }
            self.report(diagnostic);
        }
        err.to_tree()
    }

    pub(crate) fn eval(&mut self, t: &Tree) -> EvalResult<Tree> {
        let tag = match t.tag() {
            None => return Ok(t.clone()),
            Some(tag) => tag.clone(),
        };
        if let Some((min, max)) = tag.arity() {
            let n = t.arity();
            if n < min || max.map_or(false, |max| n > max) {
                return Err(EvalError::wrong_arity(tag.name(), describe_arity(min, max), n)
                    .in_context(tag.name()));
            }
        }
        self.dispatch(&tag, t).map_err(|e| e.in_context(tag.name()))
    }

    fn dispatch(&mut self, tag: &Tag, t: &Tree) -> EvalResult<Tree> {
        let c = t.children();
        match tag {
            Tag::Uninit | Tag::Error | Tag::RawData | Tag::Symbol | Tag::Hybrid => Ok(t.clone()),
            Tag::Delay | Tag::Macro | Tag::XMacro => Ok(t.clone()),
            Tag::Value => self.exec_value(&c[0]),
            Tag::Arg => self.exec_arg(c),
            Tag::EvalArgs => self.exec_eval_args(&c[0]),
            Tag::Quote => Ok(c[0].clone()),
            Tag::Quasiquote => self.exec_quasiquote(&c[0]),
            // Outside a quasiquote there is nothing to splice into
            Tag::Unquote | Tag::UnquoteSplice => self.eval(&c[0]),
            Tag::User(name) => self.exec_user(name, t),
            Tag::Compound => self.exec_compound(c),
            Tag::Assign => self.exec_assign(&c[0], &c[1]),
            Tag::With => self.exec_with(c),
            Tag::Provides => self.exec_provides(&c[0]),
            Tag::DrdProps => self.exec_drd_props(&c[0], &c[1]),
            Tag::GetLabel => self.exec_get_label(&c[0]),
            Tag::GetArity => self.exec_get_arity(&c[0]),
            Tag::GetBinding => self.exec_get_binding(c),
            Tag::GetAttachment => self.exec_get_attachment(c),
            Tag::Or => self.exec_or(c),
            Tag::And => self.exec_and(c),
            Tag::Xor => self.exec_xor(&c[0], &c[1]),
            Tag::Not => self.exec_not(&c[0]),
            Tag::Plus | Tag::Minus | Tag::Times | Tag::Over | Tag::Divide | Tag::Modulo => {
                self.exec_arithmetic(tag, c)
            }
            Tag::Merge => self.exec_merge(c),
            Tag::Length => self.exec_length(&c[0]),
            Tag::Range => self.exec_range(c),
            Tag::Lookup => self.exec_lookup(&c[0], &c[1]),
            Tag::IsTuple => self.exec_is_tuple(&c[0]),
            Tag::Number => self.exec_number(&c[0], &c[1]),
            Tag::Date => self.exec_date(c),
            Tag::Translate => self.exec_translate(c),
            Tag::FindFile => self.exec_find_file(c),
            Tag::Include => self.exec_include(&c[0]),
            Tag::Equal | Tag::Unequal => self.exec_equal(tag, &c[0], &c[1]),
            Tag::Less | Tag::Lesseq | Tag::Greater | Tag::Greatereq => {
                self.exec_compare(tag, &c[0], &c[1])
            }
            Tag::If => self.exec_if(c),
            Tag::Case => self.exec_case(c),
            Tag::While => self.exec_while(&c[0], &c[1]),
            Tag::Point => self.exec_point(c),
            Tag::RewriteInactive => Ok(self.rewrite_inactive(&c[0], &c[1])),
            Tag::Document
            | Tag::Concat
            | Tag::Tuple
            | Tag::SrcArg
            | Tag::SrcValue
            | Tag::SrcSymbol
            | Tag::SrcHybrid
            | Tag::SrcRaw
            | Tag::SrcHighlight
            | Tag::SrcExpand
            | Tag::InlineTag
            | Tag::OpenTag
            | Tag::CloseTag => Ok(self.exec_children(t)),
        }
    }

    // ------------------------------------------------------------------
    // Operand helpers
    // ------------------------------------------------------------------

    /// Evaluate an operand; an error tree becomes an error.
    fn operand(&mut self, t: &Tree) -> EvalResult<Tree> {
        let value = self.eval(t)?;
        if value.is_error() {
            return Err(EvalError::propagated(value));
        }
        Ok(value)
    }

    fn operands(&mut self, ts: &[Tree]) -> EvalResult<Vec<Tree>> {
        ts.iter().map(|t| self.operand(t)).collect()
    }

    /// A variable or argument name: an atom as is, anything else evaluated.
    fn name_operand(&mut self, t: &Tree) -> EvalResult<String> {
        if let Some(name) = t.as_str() {
            return Ok(name.to_string());
        }
        let value = self.operand(t)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| EvalError::not_a_string(&value))
    }

    fn int_operand(&mut self, op: &'static str, t: &Tree) -> EvalResult<i64> {
        let value = self.operand(t)?;
        value
            .as_str()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| EvalError::type_mismatch(op, "integer", &value))
    }

    fn exec_children(&mut self, t: &Tree) -> Tree {
        let children = t.children().iter().map(|c| self.exec(c)).collect();
        t.with_children(children)
    }

    // ------------------------------------------------------------------
    // Variables and arguments
    // ------------------------------------------------------------------

    fn exec_value(&mut self, name: &Tree) -> EvalResult<Tree> {
        let name = self.name_operand(name)?;
        Ok(self.store.read(&name))
    }

    /// `(arg name i j ...)`: the innermost binding of `name`, falling back
    /// to the store, followed down the child indices.
    fn exec_arg(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        let name = self.name_operand(&c[0])?;
        let mut value = match self.scopes.lookup(&name) {
            Some((level, bound)) => {
                let bound = bound.clone();
                if bound.is(&Tag::Delay) || bound.is(&Tag::Quasiquote) {
                    self.force(level, &bound)?
                } else {
                    bound
                }
            }
            None => self.store.read(&name),
        };
        for index in &c[1..] {
            let i = self.int_operand("arg", index)?;
            value = usize::try_from(i)
                .ok()
                .and_then(|i| value.child(i).cloned())
                .ok_or_else(|| EvalError::index_oob(i, value.arity()))?;
        }
        Ok(value)
    }

    /// Evaluate a delayed argument in the frames below the one binding it,
    /// where it was written.
    fn force(&mut self, level: usize, bound: &Tree) -> EvalResult<Tree> {
        let body = match bound.child(0) {
            Some(body) => body.clone(),
            None => return Ok(Tree::uninit()),
        };
        let suspended = self.scopes.suspend_from(level);
        let result = if bound.is(&Tag::Delay) {
            self.eval(&body)
        } else {
            self.exec_quasiquote(&body)
        };
        self.scopes.resume(suspended);
        result
    }

    fn exec_eval_args(&mut self, name: &Tree) -> EvalResult<Tree> {
        let name = self.name_operand(name)?;
        let bound = match self.scopes.get(&name) {
            Some(bound) => bound.clone(),
            None => self.store.read(&name),
        };
        Ok(self.exec_children(&bound))
    }

    fn exec_quasiquote(&mut self, t: &Tree) -> EvalResult<Tree> {
        match t.tag() {
            None => Ok(t.clone()),
            Some(Tag::Unquote) => match t.child(0) {
                Some(inner) => self.eval(inner),
                None => Ok(t.clone()),
            },
            Some(_) => {
                let mut children = Vec::with_capacity(t.arity());
                for child in t.children() {
                    match (child.is(&Tag::UnquoteSplice), child.child(0)) {
                        (true, Some(inner)) => {
                            let spliced = self.operand(inner)?;
                            if spliced.is_atomic() {
                                children.push(spliced);
                            } else {
                                children.extend(spliced.children().iter().cloned());
                            }
                        }
                        _ => children.push(self.exec_quasiquote(child)?),
                    }
                }
                Ok(t.with_children(children))
            }
        }
    }

    // ------------------------------------------------------------------
    // Macro application
    // ------------------------------------------------------------------

    fn exec_user(&mut self, name: &str, t: &Tree) -> EvalResult<Tree> {
        let definition = self.store.read(name);
        if definition.is(&Tag::Macro) || definition.is(&Tag::XMacro) {
            return self.apply_macro(name, &definition, t.children());
        }
        if self.config.strict {
            return Err(EvalError::undefined_macro(name));
        }
        Ok(self.exec_children(t))
    }

    /// `(compound head args...)` where the head evaluates to a macro name
    /// or to a macro.
    fn exec_compound(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        let head = self.operand(&c[0])?;
        if let Some(name) = head.as_str() {
            let node = Tree::node(Tag::from_name(name), c[1..].to_vec());
            return self.eval(&node);
        }
        if head.is(&Tag::Macro) || head.is(&Tag::XMacro) {
            return self.apply_macro("compound", &head, &c[1..]);
        }
        Err(EvalError::type_mismatch(
            "compound",
            "a macro or a macro name",
            &head,
        ))
    }

    fn apply_macro(&mut self, name: &str, definition: &Tree, args: &[Tree]) -> EvalResult<Tree> {
        let max_depth = self.config.max_recursion_depth;
        if self.depth >= max_depth {
            return Err(EvalError::recursion_limit(max_depth, name));
        }
        let (body, formals) = match definition.children().split_last() {
            Some(split) => split,
            None => return Ok(Tree::uninit()),
        };
        let frame = if definition.is(&Tag::XMacro) {
            self.bind_whole_arguments(formals, args)?
        } else {
            self.bind_arguments(name, formals, args)?
        };

        self.scopes.enter(frame);
        self.depth += 1;
        trace!(name, depth = self.depth, "enter macro");
        let result = self.eval(body);
        self.depth -= 1;
        self.scopes.exit();
        result
    }

    /// Evaluate an actual argument, leaving delayed forms for `arg` to force.
    fn argument_value(&mut self, arg: &Tree) -> Tree {
        if arg.is(&Tag::Delay) || arg.is(&Tag::Quasiquote) {
            arg.clone()
        } else {
            self.exec(arg)
        }
    }

    fn bind_arguments(&mut self, name: &str, formals: &[Tree], args: &[Tree]) -> EvalResult<Frame> {
        let mut frame = Frame::new();
        for (i, formal) in formals.iter().enumerate() {
            let formal = formal
                .as_str()
                .ok_or_else(|| EvalError::type_mismatch("macro", "an argument name", formal))?;
            let value = match args.get(i) {
                Some(arg) => self.argument_value(arg),
                None => match self.drd.default_arg(name, i) {
                    Some(default) => self.exec(&default),
                    None => {
                        self.report(
                            Diagnostic::warning(format!("missing argument {} ({})", i, formal))
                                .with_location(name),
                        );
                        Tree::uninit()
                    }
                },
            };
            frame.bind_at(formal, value, vec![i]);
        }
        if args.len() > formals.len() {
            debug!(name, surplus = args.len() - formals.len(), "ignoring surplus arguments");
        }
        Ok(frame)
    }

    /// `xmacro` binds its single formal to the tuple of all arguments.
    fn bind_whole_arguments(&mut self, formals: &[Tree], args: &[Tree]) -> EvalResult<Frame> {
        let formal = match formals.first() {
            Some(formal) => formal,
            None => return Ok(Frame::new()),
        };
        let formal = formal
            .as_str()
            .ok_or_else(|| EvalError::type_mismatch("xmacro", "an argument name", formal))?;
        let values = args.iter().map(|arg| self.argument_value(arg)).collect();
        let mut frame = Frame::new();
        frame.bind(formal, Tree::node(Tag::Tuple, values));
        Ok(frame)
    }

    // ------------------------------------------------------------------
    // Assignment and scoped bindings
    // ------------------------------------------------------------------

    fn exec_assign(&mut self, name: &Tree, value: &Tree) -> EvalResult<Tree> {
        let name = self.name_operand(name)?;
        let value = self.operand(value)?;
        self.assign_value(&name, value.clone());
        Ok(Tree::node(
            Tag::Assign,
            vec![Tree::atom(&name), Tree::node(Tag::Quote, vec![value])],
        ))
    }

    fn exec_with(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        if c.len() % 2 == 0 {
            return Err(EvalError::wrong_arity("with", "an odd number of", c.len()));
        }
        let mut saved = Vec::new();
        let result = self.exec_with_bindings(c, &mut saved);
        // Restore even when a binding failed half way
        for (name, old) in saved.into_iter().rev() {
            self.local_end_var(&name, old);
        }
        result
    }

    fn exec_with_bindings(
        &mut self,
        c: &[Tree],
        saved: &mut Vec<(String, Option<Tree>)>,
    ) -> EvalResult<Tree> {
        let (body, pairs) = match c.split_last() {
            Some(split) => split,
            None => return Ok(Tree::empty()),
        };
        let mut out = Vec::with_capacity(c.len());
        for pair in pairs.chunks(2) {
            let name = self.name_operand(&pair[0])?;
            let value = self.exec(&pair[1]);
            let old = self.local_begin(&name, value.clone());
            saved.push((name.clone(), old));
            out.push(Tree::atom(name));
            out.push(value);
        }
        out.push(self.exec(body));
        Ok(Tree::node(Tag::With, out))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn exec_provides(&mut self, name: &Tree) -> EvalResult<Tree> {
        let name = self.name_operand(name)?;
        Ok(Tree::truth(self.store.provides(&name)))
    }

    fn exec_drd_props(&mut self, tag: &Tree, property: &Tree) -> EvalResult<Tree> {
        let tag = self.name_operand(tag)?;
        let property = self.name_operand(property)?;
        Ok(self
            .drd
            .property(&tag, &property)
            .unwrap_or_else(Tree::uninit))
    }

    fn exec_get_label(&mut self, t: &Tree) -> EvalResult<Tree> {
        Ok(Tree::atom(self.operand(t)?.label()))
    }

    fn exec_get_arity(&mut self, t: &Tree) -> EvalResult<Tree> {
        Ok(Tree::atom(self.operand(t)?.arity().to_string()))
    }

    /// `(get-binding key [i])`: a reference from the local table, else the
    /// global one. Bindings are `(tuple value page ...)`; without an index
    /// the value is returned. Unknown keys show as `?`.
    fn exec_get_binding(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        let key = self.name_operand(&c[0])?;
        let binding = match self.refs.binding(&key) {
            Some(binding) => binding.clone(),
            None => {
                debug!(key = %key, "undefined reference");
                return Ok(Tree::atom("?"));
            }
        };
        self.select_entry(binding, c.get(1))
    }

    /// `(get-attachment key [i])`: an entry of the auxiliary tables, or
    /// `(uninit)`.
    fn exec_get_attachment(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        let key = self.name_operand(&c[0])?;
        match self.refs.attachment(&key) {
            Some(entry) => {
                let entry = entry.clone();
                match c.get(1) {
                    Some(index) => self.select_entry(entry, Some(index)),
                    None => Ok(entry),
                }
            }
            None => Ok(Tree::uninit()),
        }
    }

    fn select_entry(&mut self, entry: Tree, index: Option<&Tree>) -> EvalResult<Tree> {
        match index {
            Some(index) => {
                let i = self.int_operand("get-binding", index)?;
                usize::try_from(i)
                    .ok()
                    .and_then(|i| entry.child(i).cloned())
                    .ok_or_else(|| EvalError::index_oob(i, entry.arity()))
            }
            None if entry.is_tuple() => Ok(entry.child(0).cloned().unwrap_or_else(Tree::empty)),
            None => Ok(entry),
        }
    }

    // ------------------------------------------------------------------
    // Logic and arithmetic
    // ------------------------------------------------------------------

    fn exec_or(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        for t in c {
            if is_true(&self.operand(t)?) {
                return Ok(Tree::truth(true));
            }
        }
        Ok(Tree::truth(false))
    }

    fn exec_and(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        for t in c {
            if !is_true(&self.operand(t)?) {
                return Ok(Tree::truth(false));
            }
        }
        Ok(Tree::truth(true))
    }

    fn exec_xor(&mut self, a: &Tree, b: &Tree) -> EvalResult<Tree> {
        let a = is_true(&self.operand(a)?);
        let b = is_true(&self.operand(b)?);
        Ok(Tree::truth(a != b))
    }

    fn exec_not(&mut self, t: &Tree) -> EvalResult<Tree> {
        Ok(Tree::truth(!is_true(&self.operand(t)?)))
    }

    fn exec_arithmetic(&mut self, tag: &Tag, c: &[Tree]) -> EvalResult<Tree> {
        let args = self.operands(c)?;
        let units = self.units();
        match tag {
            Tag::Plus => ops::plus(&args, &units),
            Tag::Minus => ops::minus(&args[0], args.get(1), &units),
            Tag::Times => ops::times(&args, &units),
            Tag::Over => ops::over(&args[0], &args[1], &units),
            Tag::Divide => ops::divide(&args[0], &args[1], &units),
            _ => ops::modulo(&args[0], &args[1], &units),
        }
    }

    fn exec_equal(&mut self, tag: &Tag, a: &Tree, b: &Tree) -> EvalResult<Tree> {
        let a = self.operand(a)?;
        let b = self.operand(b)?;
        let eq = ops::equal(&a, &b, &self.units());
        Ok(Tree::truth(if tag == &Tag::Equal { eq } else { !eq }))
    }

    fn exec_compare(&mut self, tag: &Tag, a: &Tree, b: &Tree) -> EvalResult<Tree> {
        let a = self.operand(a)?;
        let b = self.operand(b)?;
        ops::ordered(tag, &a, &b, &self.units()).map(Tree::truth)
    }

    // ------------------------------------------------------------------
    // Strings and tuples
    // ------------------------------------------------------------------

    fn exec_merge(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        let args = self.operands(c)?;
        ops::merge(&args)
    }

    fn exec_length(&mut self, t: &Tree) -> EvalResult<Tree> {
        Ok(library::length(&self.operand(t)?))
    }

    fn exec_range(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        let t = self.operand(&c[0])?;
        let start = self.int_operand("range", &c[1])?;
        let end = self.int_operand("range", &c[2])?;
        Ok(library::range(&t, start, end))
    }

    fn exec_lookup(&mut self, t: &Tree, index: &Tree) -> EvalResult<Tree> {
        let t = self.operand(t)?;
        let i = self.int_operand("lookup", index)?;
        library::lookup(&t, i)
    }

    fn exec_is_tuple(&mut self, t: &Tree) -> EvalResult<Tree> {
        Ok(Tree::truth(self.operand(t)?.is_tuple()))
    }

    fn exec_number(&mut self, n: &Tree, style: &Tree) -> EvalResult<Tree> {
        let n = self.int_operand("number", n)?;
        let style = self.name_operand(style)?;
        library::number(n, &style).map(Tree::atom)
    }

    fn exec_date(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        let format = match c.first() {
            Some(format) => self.name_operand(format)?,
            None => library::DEFAULT_DATE_FORMAT.to_string(),
        };
        if let Some(language) = c.get(1) {
            let language = self.name_operand(language)?;
            trace!(language = %language, "dates are not localized");
        }
        library::date(&format).map(Tree::atom)
    }

    fn exec_translate(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        let text = self.name_operand(&c[0])?;
        let from = self.name_operand(&c[1])?;
        let to = self.name_operand(&c[2])?;
        match self.translator.translate(&text, &from, &to) {
            Some(translation) => Ok(Tree::atom(translation)),
            None => {
                debug!(text = %text, from = %from, to = %to, "no translation");
                Ok(Tree::empty())
            }
        }
    }

    /// The first name that resolves to an existing file, or `""`.
    fn exec_find_file(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        for name in c {
            let name = self.name_operand(name)?;
            if let Ok(path) = self.vfs.resolve(&self.base, &name) {
                if self.vfs.exists(&path) {
                    return Ok(Tree::atom(path));
                }
            }
        }
        Ok(Tree::empty())
    }

    fn exec_include(&mut self, name: &Tree) -> EvalResult<Tree> {
        let name = self.name_operand(name)?;
        let text = match self
            .vfs
            .resolve(&self.base, &name)
            .and_then(|path| self.vfs.read_text(&path))
        {
            Ok(text) => text,
            Err(err) => {
                self.report(Diagnostic::warning(err.to_string()).with_location("include"));
                return Ok(Tree::empty());
            }
        };
        let tree = Tree::parse(&text)
            .map_err(|err| EvalError::invalid_op(format!("cannot parse {}: {}", name, err)))?;

        // Files may include each other; count inclusions like macro levels
        let max_depth = self.config.max_recursion_depth;
        if self.depth >= max_depth {
            return Err(EvalError::recursion_limit(max_depth, name));
        }
        self.depth += 1;
        let result = self.eval(&tree);
        self.depth -= 1;
        result
    }

    // ------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------

    /// Only the selected branch is evaluated.
    fn exec_if(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        if is_true(&self.operand(&c[0])?) {
            self.eval(&c[1])
        } else {
            match c.get(2) {
                Some(otherwise) => self.eval(otherwise),
                None => Ok(Tree::empty()),
            }
        }
    }

    /// `(case c1 r1 c2 r2 ... [default])`
    fn exec_case(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        let mut pairs = c.chunks_exact(2);
        for pair in pairs.by_ref() {
            if is_true(&self.operand(&pair[0])?) {
                return self.eval(&pair[1]);
            }
        }
        match pairs.remainder().first() {
            Some(default) => self.eval(default),
            None => Ok(Tree::uninit()),
        }
    }

    /// Returns the concatenation of the body results.
    fn exec_while(&mut self, condition: &Tree, body: &Tree) -> EvalResult<Tree> {
        let max_iterations = self.config.max_iterations;
        let mut results = Vec::new();
        while is_true(&self.operand(condition)?) {
            if results.len() >= max_iterations {
                return Err(EvalError::too_many_iterations(max_iterations));
            }
            results.push(self.exec(body));
        }
        Ok(Tree::node(Tag::Concat, results))
    }

    fn exec_point(&mut self, c: &[Tree]) -> EvalResult<Tree> {
        Ok(Tree::node(Tag::Point, self.operands(c)?))
    }

    // ------------------------------------------------------------------
    // Expansion
    // ------------------------------------------------------------------

    /// Substitute the arguments of a top-level macro application into the
    /// macro body, without evaluating anything. Other trees are returned
    /// unchanged.
    pub fn expand(&mut self, t: &Tree) -> Tree {
        let (name, args) = match t.tag() {
            Some(Tag::User(name)) => (name.to_string(), t.children()),
            Some(Tag::Compound) => match t.child(0).and_then(Tree::as_str) {
                Some(name) => (name.to_string(), &t.children()[1..]),
                None => return t.clone(),
            },
            _ => return t.clone(),
        };
        let definition = self.store.read(&name);
        if !(definition.is(&Tag::Macro) || definition.is(&Tag::XMacro)) {
            return t.clone();
        }
        let (body, formals) = match definition.children().split_last() {
            Some(split) => split,
            None => return t.clone(),
        };

        let mut frame = Frame::new();
        if definition.is(&Tag::XMacro) {
            if let Some(formal) = formals.first().and_then(Tree::as_str) {
                frame.bind(formal, Tree::node(Tag::Tuple, args.to_vec()));
            }
        } else {
            for (i, formal) in formals.iter().enumerate() {
                if let Some(formal) = formal.as_str() {
                    let value = match args.get(i) {
                        Some(arg) => arg.clone(),
                        None => self.drd.default_arg(&name, i).unwrap_or_else(Tree::uninit),
                    };
                    frame.bind_at(formal, value, vec![i]);
                }
            }
        }
        substitute(body, &frame)
    }
}

/// Replace `(arg x i ...)` by the bound tree, for literal indices.
/// Nested macro definitions and quotations are left alone.
fn substitute(t: &Tree, frame: &Frame) -> Tree {
    match t.tag() {
        None => t.clone(),
        Some(Tag::Macro | Tag::XMacro | Tag::Quote) => t.clone(),
        Some(Tag::Arg) => {
            let bound = t
                .child(0)
                .and_then(Tree::as_str)
                .and_then(|name| frame.get(name));
            let mut value = match bound {
                Some(bound) => bound.clone(),
                None => return t.clone(),
            };
            for index in &t.children()[1..] {
                let child = index
                    .as_str()
                    .and_then(|s| s.parse::<usize>().ok())
                    .and_then(|i| value.child(i).cloned());
                match child {
                    Some(child) => value = child,
                    None => return t.clone(),
                }
            }
            value
        }
        Some(_) => t.with_children(t.children().iter().map(|c| substitute(c, frame)).collect()),
    }
}

fn describe_arity(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{} to {}", min, max),
        None => format!("at least {}", min),
    }
}
