//! The special binding stack.
//!
//! Every dynamic binding and every pending cleanup is pushed here and undone
//! in strict LIFO order. A scope remembers the depth it started at and calls
//! [`Evaluator::unbind_to`] on the way out, whether it exits normally or
//! through a non-local exit.

use super::error::{signal, Flow, EvalResult};
use super::eval::Evaluator;
use super::intern::SymId;
use super::symbol::{Context, SymbolValue};
use super::value::Value;
use crate::buffer::BufferId;

/// Floor the binding ceiling is raised to before reporting overflow.
const MIN_SPECPDL_SIZE: i64 = 400;

pub type UnwindFn = Box<dyn FnOnce(&mut Evaluator) -> Result<(), Flow>>;

pub enum SpecBinding {
    /// Binding of a plain or globally forwarded symbol.
    Let {
        symbol: SymId,
        old_value: Option<Value>,
    },
    /// Binding of the buffer-local value `where_` had when it was made.
    LetLocal {
        symbol: SymId,
        old_value: Option<Value>,
        where_: BufferId,
    },
    /// Binding of the default value of a localized or per-buffer symbol.
    LetDefault {
        symbol: SymId,
        old_value: Option<Value>,
        where_: BufferId,
    },
    Unwind(UnwindFn),
}

impl SpecBinding {
    pub fn symbol(&self) -> Option<SymId> {
        match self {
            SpecBinding::Let { symbol, .. }
            | SpecBinding::LetLocal { symbol, .. }
            | SpecBinding::LetDefault { symbol, .. } => Some(*symbol),
            SpecBinding::Unwind(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            SpecBinding::Let { .. } => "let",
            SpecBinding::LetLocal { .. } => "let-local",
            SpecBinding::LetDefault { .. } => "let-default",
            SpecBinding::Unwind(_) => "unwind",
        }
    }
}

impl std::fmt::Debug for SpecBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.symbol() {
            Some(symbol) => write!(f, "{}({})", self.kind_name(), symbol),
            None => f.write_str(self.kind_name()),
        }
    }
}

#[derive(Debug, Default)]
pub struct SpecPdl {
    entries: Vec<SpecBinding>,
}

impl SpecPdl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn push(&mut self, entry: SpecBinding) {
        self.entries.push(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<SpecBinding> {
        self.entries.pop()
    }

    /// Entries from innermost to outermost.
    pub fn iter_innermost(&self) -> impl Iterator<Item = &SpecBinding> {
        self.entries.iter().rev()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [SpecBinding] {
        &mut self.entries
    }
}

impl Evaluator {
    pub fn specpdl_depth(&self) -> usize {
        self.specpdl.depth()
    }

    /// Make room for one more entry, raising a small ceiling to the floor
    /// before giving up.
    fn grow_specpdl(&mut self) -> Result<(), Flow> {
        let depth = self.specpdl.depth() as i64;
        if depth >= self.max_specpdl_size() {
            if self.max_specpdl_size() < MIN_SPECPDL_SIZE {
                self.vars.max_specpdl_size.set(MIN_SPECPDL_SIZE);
            }
            if depth >= self.max_specpdl_size() {
                tracing::debug!(depth, "binding stack ceiling reached");
                return Err(signal("excessive-variable-binding", vec![]));
            }
        }
        Ok(())
    }

    /// Bind `symbol` dynamically to `value` until the enclosing
    /// [`unbind_to`](Self::unbind_to).
    pub fn specbind(&mut self, symbol: SymId, value: Value) -> Result<(), Flow> {
        self.specbind_raw(symbol, value).map_err(|flow| self.route(flow))
    }

    fn specbind_raw(&mut self, symbol: SymId, value: Value) -> Result<(), Flow> {
        let sym = self.obarray.indirect_variable(symbol)?;
        match self.obarray.value_cell(sym) {
            SymbolValue::Plain(old_value) => {
                self.grow_specpdl()?;
                self.specpdl.push(SpecBinding::Let {
                    symbol: sym,
                    old_value,
                });
                if self.obarray.is_constant(sym) {
                    self.set_internal(sym, Some(value), None, true)
                } else {
                    self.obarray
                        .set_value_cell(sym, SymbolValue::Plain(Some(value)));
                    Ok(())
                }
            }
            SymbolValue::Localized(blv) if blv.borrow().frame_local => Err(
                super::error::error_message("Frame-local vars cannot be let-bound"),
            ),
            cell @ (SymbolValue::Localized(_) | SymbolValue::Forwarded(_)) => {
                let old_value = self.find_symbol_value(sym)?;
                let where_ = self.buffers.current_id();
                let entry = match &cell {
                    SymbolValue::Localized(blv) if !blv.borrow().found() => {
                        SpecBinding::LetDefault {
                            symbol: sym,
                            old_value,
                            where_,
                        }
                    }
                    SymbolValue::Forwarded(fwd) if fwd.buffer_slot().is_some() => {
                        if !self.local_variable_p(sym, None)? {
                            // No local value: bind the default, so every
                            // buffer without its own value sees the binding.
                            self.grow_specpdl()?;
                            self.specpdl.push(SpecBinding::LetDefault {
                                symbol: sym,
                                old_value,
                                where_,
                            });
                            return self.set_default(sym, Some(value));
                        }
                        SpecBinding::LetLocal {
                            symbol: sym,
                            old_value,
                            where_,
                        }
                    }
                    SymbolValue::Forwarded(_) => SpecBinding::Let {
                        symbol: sym,
                        old_value,
                    },
                    _ => SpecBinding::LetLocal {
                        symbol: sym,
                        old_value,
                        where_,
                    },
                };
                self.grow_specpdl()?;
                self.specpdl.push(entry);
                self.set_internal(sym, Some(value), None, true)
            }
            SymbolValue::Alias(_) => unreachable!("indirect_variable returned an alias"),
        }
    }

    /// Push a cleanup that runs when the stack unwinds past it.
    pub fn record_unwind_protect(&mut self, cleanup: UnwindFn) -> Result<(), Flow> {
        if let Err(flow) = self.grow_specpdl() {
            return Err(self.route(flow));
        }
        self.specpdl.push(SpecBinding::Unwind(cleanup));
        Ok(())
    }

    /// Pop and undo entries until the stack is `count` deep.
    ///
    /// Every entry above `count` is undone even if some cleanup exits
    /// non-locally; the last such exit is returned once the stack is back
    /// at `count`.
    pub fn unbind_to(&mut self, count: usize) -> Result<(), Flow> {
        let mut pending = None;
        while self.specpdl.depth() > count {
            let Some(entry) = self.specpdl.pop() else {
                break;
            };
            if let Err(flow) = self.unbind_once(entry) {
                pending = Some(self.route(flow));
            }
        }
        match pending {
            Some(flow) => Err(flow),
            None => Ok(()),
        }
    }

    /// [`unbind_to`](Self::unbind_to), then return `result` unless the
    /// unwinding itself exited non-locally.
    pub fn unbind_to_with(&mut self, count: usize, result: EvalResult) -> EvalResult {
        // Route first: handler search must see the bindings still in place.
        let result = result.map_err(|flow| self.route(flow));
        match self.unbind_to(count) {
            Ok(()) => result,
            Err(flow) => Err(flow),
        }
    }

    fn unbind_once(&mut self, entry: SpecBinding) -> Result<(), Flow> {
        tracing::trace!(entry = ?entry, depth = self.specpdl.depth(), "unbind");
        match entry {
            SpecBinding::Unwind(cleanup) => cleanup(self),
            SpecBinding::Let { symbol, old_value } => {
                // A symbol that is still plain is restored directly; one that
                // was localized meanwhile gets its default restored.
                if let SymbolValue::Plain(_) = self.obarray.value_cell(symbol) {
                    self.obarray
                        .set_value_cell(symbol, SymbolValue::Plain(old_value));
                    Ok(())
                } else {
                    self.set_default(symbol, old_value)
                }
            }
            SpecBinding::LetDefault {
                symbol, old_value, ..
            } => self.set_default(symbol, old_value),
            SpecBinding::LetLocal {
                symbol,
                old_value,
                where_,
            } => {
                // The local binding may have been killed meanwhile.
                if self.local_variable_p(symbol, Some(where_))? {
                    self.set_internal(symbol, old_value, Some(Context::Buffer(where_)), true)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Whether a `let` of `symbol` made in the current buffer is active.
    pub(crate) fn let_shadows_buffer_binding_p(&self, symbol: SymId) -> bool {
        let current = self.buffers.current_id();
        self.specpdl.iter_innermost().any(|entry| match entry {
            SpecBinding::LetLocal {
                symbol: s, where_, ..
            }
            | SpecBinding::LetDefault {
                symbol: s, where_, ..
            } => *s == symbol && *where_ == current,
            _ => false,
        })
    }

    /// Whether any `let` of `symbol` is active.
    pub(crate) fn let_shadows_global_binding_p(&self, symbol: SymId) -> bool {
        self.specpdl
            .iter_innermost()
            .any(|entry| entry.symbol() == Some(symbol))
    }

    /// Index of the outermost Let/LetDefault record of `symbol`.
    pub(crate) fn default_toplevel_binding(&self, symbol: SymId) -> Option<usize> {
        self.specpdl
            .entries
            .iter()
            .position(|entry| match entry {
                SpecBinding::Let { symbol: s, .. } | SpecBinding::LetDefault { symbol: s, .. } => {
                    *s == symbol
                }
                _ => false,
            })
    }

    /// Whether `symbol` is void outside the `let`s currently binding it.
    pub(crate) fn let_shadows_void_default(&self, symbol: SymId) -> bool {
        self.default_toplevel_binding(symbol).is_some_and(|idx| {
            matches!(
                &self.specpdl.entries[idx],
                SpecBinding::Let { old_value: None, .. }
                    | SpecBinding::LetDefault { old_value: None, .. }
            )
        })
    }

    /// `default-toplevel-value`: the value outside every `let`.
    pub fn default_toplevel_value(&mut self, symbol: SymId) -> EvalResult {
        let value = match self.default_toplevel_binding(symbol) {
            Some(idx) => match &self.specpdl.entries[idx] {
                SpecBinding::Let { old_value, .. } | SpecBinding::LetDefault { old_value, .. } => {
                    old_value.clone()
                }
                _ => None,
            },
            None => self.default_value(symbol)?,
        };
        value.ok_or_else(|| signal("void-variable", vec![Value::from_sym(symbol)]))
    }

    /// `set-default-toplevel-value`: rewrite the outermost saved value, or
    /// the default when `symbol` is not let-bound.
    pub fn set_default_toplevel_value(&mut self, symbol: SymId, value: Value) -> Result<(), Flow> {
        match self.default_toplevel_binding(symbol) {
            Some(idx) => {
                if let SpecBinding::Let { old_value, .. } | SpecBinding::LetDefault { old_value, .. } =
                    &mut self.specpdl.entries_mut()[idx]
                {
                    *old_value = Some(value);
                }
                Ok(())
            }
            None => self.set_default(symbol, Some(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elisp::intern::intern;
    use crate::elisp::tests_support::{eval_all, eval_with};
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn let_restores_plain_value() {
        let results = eval_all(
            "(setq x 1)
             (let ((x 2)) x)
             x",
        );
        assert_eq!(results, vec!["OK 1", "OK 2", "OK 1"]);
    }

    #[test]
    fn let_of_void_symbol_restores_void() {
        let results = eval_all(
            "(let ((fresh-var 5)) fresh-var)
             (boundp 'fresh-var)",
        );
        assert_eq!(results, vec!["OK 5", "OK nil"]);
    }

    #[test]
    fn unbind_restores_after_error() {
        let results = eval_all(
            "(defvar depth-marker 'outer)
             (condition-case nil
                 (let ((depth-marker 'inner)) (car 1))
               (wrong-type-argument depth-marker))",
        );
        assert_eq!(results[1], "OK outer");
    }

    #[test]
    fn cleanups_run_innermost_first() {
        let mut ev = Evaluator::new();
        let log: Rc<RefCell<Vec<usize>>> = Rc::default();
        let base = ev.specpdl_depth();
        for i in 0..4 {
            let log = Rc::clone(&log);
            ev.record_unwind_protect(Box::new(move |_| {
                log.borrow_mut().push(i);
                Ok(())
            }))
            .expect("room");
        }
        ev.unbind_to(base).expect("unbind");
        assert_eq!(*log.borrow(), vec![3, 2, 1, 0]);
        assert_eq!(ev.specpdl_depth(), base);
    }

    #[test]
    fn failing_cleanup_does_not_skip_deeper_cleanups() {
        let mut ev = Evaluator::new();
        let ran: Rc<RefCell<Vec<&'static str>>> = Rc::default();
        let base = ev.specpdl_depth();
        {
            let ran = Rc::clone(&ran);
            ev.record_unwind_protect(Box::new(move |_| {
                ran.borrow_mut().push("outer");
                Ok(())
            }))
            .expect("room");
        }
        {
            let ran = Rc::clone(&ran);
            ev.record_unwind_protect(Box::new(move |_| {
                ran.borrow_mut().push("failing");
                Err(signal("error", vec![Value::string("cleanup failed")]))
            }))
            .expect("room");
        }
        let result = ev.unbind_to(base);
        assert!(result.is_err());
        assert_eq!(*ran.borrow(), vec!["failing", "outer"]);
        assert_eq!(ev.specpdl_depth(), base);
    }

    #[test]
    fn unwind_protect_cleanup_runs_once_on_throw() {
        let results = eval_all(
            "(setq cleanup-count 0)
             (catch 'done
               (unwind-protect (throw 'done 'thrown)
                 (setq cleanup-count (1+ cleanup-count))))
             cleanup-count",
        );
        assert_eq!(results, vec!["OK 0", "OK thrown", "OK 1"]);
    }

    #[test]
    fn binding_depth_overflow_is_catchable() {
        let results = eval_with(
            |ev| ev.vars.max_specpdl_size.set(450),
            "(defun deep-bind (n) (let ((v n)) (deep-bind (1+ n))))
             (condition-case err (deep-bind 0) (excessive-variable-binding 'overflow))
             (let ((after 1)) after)",
        );
        assert_eq!(results[1], "OK overflow");
        assert_eq!(results[2], "OK 1");
    }

    #[test]
    fn small_ceiling_is_raised_to_floor() {
        let mut ev = Evaluator::new();
        ev.vars.max_specpdl_size.set(0);
        let base = ev.specpdl_depth();
        ev.specbind(intern("floor-var"), Value::Int(1)).expect("bind");
        assert_eq!(ev.max_specpdl_size(), MIN_SPECPDL_SIZE);
        ev.unbind_to(base).expect("unbind");
    }

    #[test]
    fn default_toplevel_value_sees_through_let() {
        let results = eval_all(
            "(defvar top-var 'global)
             (let ((top-var 'inner)) (default-toplevel-value 'top-var))
             (let ((top-var 'inner)) (set-default-toplevel-value 'top-var 'changed) top-var)
             top-var",
        );
        assert_eq!(results[1], "OK global");
        assert_eq!(results[2], "OK inner");
        assert_eq!(results[3], "OK changed");
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn nested_lets_restore_every_value(values in proptest::collection::vec(-50i64..50, 1..12)) {
            let mut ev = Evaluator::new();
            let sym = intern("prop-nested-let");
            ev.set_variable("prop-nested-let", Value::Int(-1000));
            let base = ev.specpdl_depth();
            for v in &values {
                ev.specbind(sym, Value::Int(*v)).expect("bind");
            }
            prop_assert_eq!(ev.symbol_value("prop-nested-let"), Some(Value::Int(*values.last().expect("non-empty"))));
            for (i, _) in values.iter().enumerate().rev() {
                ev.unbind_to(base + i).expect("unbind");
                let expected = if i == 0 { -1000 } else { values[i - 1] };
                prop_assert_eq!(ev.symbol_value("prop-nested-let"), Some(Value::Int(expected)));
            }
            prop_assert_eq!(ev.specpdl_depth(), base);
        }
    }
}
