//! Catch/throw, condition-case/signal and the top level.
//!
//! Handlers live on an explicit stack owned by the evaluator. Raising a
//! signal or making a throw never unwinds by itself: it *routes* the exit to
//! a handler id while the dynamic environment is still intact (so hooks and
//! the debugger see the bindings of the signaling code), and the resulting
//! `Flow::Transfer` is then returned up through every frame. Each frame
//! unbinds what it bound; the frame that pushed the target handler claims
//! the transfer and resumes.

use super::error::{
    error_message, memory_signal_data, signal, signal_value, EvalResult, Flow, SignalData,
    Transfer,
};
use super::eval::Evaluator;
use super::expr::Expr;
use super::intern::{intern, resolve_sym};
use super::print::{princ_value, print_value};
use super::value::{eq_value, list_to_vec, memq, Value};

/// Identity of one installed handler. Never reused within an evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    Catch,
    ConditionCase,
}

#[derive(Clone, Debug)]
pub struct Handler {
    pub id: HandlerId,
    pub kind: HandlerKind,
    /// Catch tag, or the condition list of one condition-case clause.
    pub tag: Value,
    /// Binding stack depth when the handler was installed.
    pub pdl_depth: usize,
    pub eval_depth: usize,
}

#[derive(Debug, Default)]
pub struct HandlerStack {
    handlers: Vec<Handler>,
    next_id: u64,
}

impl HandlerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn push(
        &mut self,
        kind: HandlerKind,
        tag: Value,
        pdl_depth: usize,
        eval_depth: usize,
    ) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push(Handler {
            id,
            kind,
            tag,
            pdl_depth,
            eval_depth,
        });
        id
    }

    /// Remove `id` and every handler installed after it.
    pub(crate) fn pop_through(&mut self, id: HandlerId) {
        if let Some(pos) = self.handlers.iter().rposition(|h| h.id == id) {
            self.handlers.truncate(pos);
        }
    }

    pub fn iter_innermost(&self) -> impl Iterator<Item = &Handler> {
        self.handlers.iter().rev()
    }

    /// Innermost catch whose tag is `eq` to `tag`.
    pub fn find_catch(&self, tag: &Value) -> Option<HandlerId> {
        self.iter_innermost()
            .find(|h| h.kind == HandlerKind::Catch && eq_value(&h.tag, tag))
            .map(|h| h.id)
    }
}

/// Outcome of a body run under condition handlers.
#[derive(Clone, Debug)]
pub enum Caught {
    Normal(Value),
    /// Clause `clause` (in declaration order) took the signal; `payload` is
    /// the error object `(SYMBOL . DATA)`.
    Handled { clause: usize, payload: Value },
}

/// Whether the condition list `handlers` of one handler accepts a signal
/// whose conditions are `conditions`. Returns the matching clause, or nil.
fn find_handler_clause(handlers: &Value, conditions: &Value) -> Value {
    // `t` and a bare `error` are installed by Rust callers to catch
    // everything; `error` additionally lets the debugger run.
    if matches!(handlers, Value::True) || handlers.is_symbol_named("error") {
        return Value::True;
    }
    let mut tail = handlers.clone();
    while let Value::Cons(_) = tail {
        let handler = tail.car();
        if memq(&handler, conditions).is_truthy() || matches!(handler, Value::True) {
            return handlers.clone();
        }
        tail = tail.cdr();
    }
    Value::Nil
}

impl Evaluator {
    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    /// Decide where a freshly raised signal goes. Already routed exits pass
    /// through unchanged.
    pub(crate) fn route(&mut self, flow: Flow) -> Flow {
        match flow {
            Flow::Signal(sig) => self.dispatch_signal(sig),
            routed => routed,
        }
    }

    fn dispatch_signal(&mut self, sig: SignalData) -> Flow {
        let unresumed = sig.clone();
        self.signal_or_quit(sig, false)
            .unwrap_or(Flow::Uncaught(unresumed))
    }

    /// Find the destination of `sig`, consulting the signal hook and the
    /// debugger on the way. `None` means the code that raised the signal
    /// should carry on: only a keyboard quit whose debugger returned does.
    #[tracing::instrument(level = "debug", skip_all, fields(symbol = %sig.symbol))]
    fn signal_or_quit(&mut self, sig: SignalData, keyboard_quit: bool) -> Option<Flow> {
        let memory_full = sig.is_memory_full();
        let real_symbol = if memory_full {
            sig.data.car().as_symbol_id().unwrap_or_else(|| intern("error"))
        } else {
            sig.symbol
        };

        if !memory_full {
            let hook = self.vars.signal_hook_function.borrow().clone();
            if hook.is_truthy() {
                if let Err(flow) = self.call_signal_hook(hook, &sig) {
                    return Some(flow);
                }
            }
        }

        let conditions = self
            .obarray
            .get_property(real_symbol, intern("error-conditions"));
        let mut target = None;
        let mut clause = Value::Nil;
        for handler in self.handlers.iter_innermost() {
            if handler.kind != HandlerKind::ConditionCase {
                continue;
            }
            clause = find_handler_clause(&handler.tag, &conditions);
            if clause.is_truthy() {
                target = Some((handler.id, handler.tag.clone()));
                break;
            }
        }

        let wants_debugger_check = !memory_full
            && (self.vars.debug_on_signal.borrow().is_truthy()
                || clause.is_nil()
                || (clause.is_cons() && memq(&Value::symbol("debug"), &clause).is_truthy())
                || target
                    .as_ref()
                    .is_some_and(|(_, tag)| tag.is_symbol_named("error")));
        if wants_debugger_check {
            match self.maybe_call_debugger(&conditions, &sig) {
                Ok(true) if keyboard_quit && real_symbol == intern("quit") => {
                    tracing::debug!("quit resumed after the debugger");
                    return None;
                }
                Ok(_) => {}
                Err(flow) => return Some(self.route(flow)),
            }
        }

        if let Some((id, _)) = target {
            return Some(Flow::Transfer(Transfer {
                target: id,
                value: sig.to_error_object(),
            }));
        }
        if let Some(id) = self.handlers.find_catch(&Value::symbol("top-level")) {
            tracing::debug!("unhandled signal thrown to top-level");
            return Some(Flow::Transfer(Transfer {
                target: id,
                value: Value::True,
            }));
        }
        tracing::debug!(data = %print_value(&sig.data), "signal not handled");
        Some(Flow::Uncaught(sig))
    }

    /// Run `signal-hook-function` with the ceilings raised. The hook stays
    /// bound, so a signal raised inside it reaches the hook again.
    fn call_signal_hook(&mut self, hook: Value, sig: &SignalData) -> Result<(), Flow> {
        let depth = self.depth as i64;
        if depth + 20 > self.max_lisp_eval_depth() {
            self.vars.max_lisp_eval_depth.set(depth + 20);
        }
        let pdl = self.specpdl_depth() as i64;
        if pdl + 40 > self.max_specpdl_size() {
            self.vars.max_specpdl_size.set(pdl + 40);
        }
        self.funcall(hook, vec![Value::from_sym(sig.symbol), sig.data.clone()])
            .map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Catch and throw
    // -----------------------------------------------------------------------

    /// Run `body` with a catch for `tag` installed.
    pub fn internal_catch<F>(&mut self, tag: Value, body: F) -> EvalResult
    where
        F: FnOnce(&mut Self) -> EvalResult,
    {
        let pdl = self.specpdl_depth();
        let depth = self.depth;
        let id = self.handlers.push(HandlerKind::Catch, tag, pdl, depth);
        let result = body(self).map_err(|flow| self.route(flow));
        let result = match result {
            Err(Flow::Transfer(transfer)) if transfer.target == id => {
                self.depth = depth;
                // The handler stays installed while unwinding, so a cleanup
                // may throw here again; the later value wins.
                match self.unbind_to(pdl) {
                    Ok(()) => Ok(transfer.value),
                    Err(Flow::Transfer(again)) if again.target == id => Ok(again.value),
                    Err(flow) => Err(flow),
                }
            }
            other => other,
        };
        self.handlers.pop_through(id);
        result
    }

    /// The exit `(throw TAG VALUE)` makes.
    pub fn throw(&mut self, tag: Value, value: Value) -> Flow {
        if !tag.is_nil() {
            if let Some(id) = self.handlers.find_catch(&tag) {
                return Flow::Transfer(Transfer { target: id, value });
            }
        }
        self.route(signal("no-catch", vec![tag, value]))
    }

    /// Run `body` under an implicit `top-level` catch. Unhandled signals
    /// throw there, and the call returns `t`.
    pub fn with_top_level<F>(&mut self, body: F) -> EvalResult
    where
        F: FnOnce(&mut Self) -> EvalResult,
    {
        self.internal_catch(Value::symbol("top-level"), body)
    }

    // -----------------------------------------------------------------------
    // Condition handlers
    // -----------------------------------------------------------------------

    /// Run `body` with one condition handler per entry of `conditions`.
    /// The first entry is innermost, so it wins when several match.
    pub fn with_condition_handlers<F>(
        &mut self,
        conditions: &[Value],
        body: F,
    ) -> Result<Caught, Flow>
    where
        F: FnOnce(&mut Self) -> EvalResult,
    {
        let pdl = self.specpdl_depth();
        let depth = self.depth;
        let ids: Vec<_> = conditions
            .iter()
            .rev()
            .map(|tag| {
                self.handlers
                    .push(HandlerKind::ConditionCase, tag.clone(), pdl, depth)
            })
            .collect();
        let result = body(self).map_err(|flow| self.route(flow));
        let outcome = match result {
            Ok(value) => Ok(Caught::Normal(value)),
            Err(Flow::Transfer(transfer)) => {
                match ids.iter().position(|id| *id == transfer.target) {
                    Some(pos) => {
                        self.depth = depth;
                        self.unbind_to(pdl).map(|()| Caught::Handled {
                            clause: conditions.len() - 1 - pos,
                            payload: transfer.value,
                        })
                    }
                    None => Err(Flow::Transfer(transfer)),
                }
            }
            Err(flow) => Err(flow),
        };
        if let Some(outermost) = ids.first() {
            self.handlers.pop_through(*outermost);
        }
        outcome
    }

    /// Run `body`; if a signal matching `handlers` escapes it, run
    /// `handler` on the error object instead. `handlers` is a condition
    /// list, `t` (everything) or `error` (everything, debugger allowed).
    pub fn internal_condition_case<B, H>(
        &mut self,
        handlers: Value,
        body: B,
        handler: H,
    ) -> EvalResult
    where
        B: FnOnce(&mut Self) -> EvalResult,
        H: FnOnce(&mut Self, Value) -> EvalResult,
    {
        match self.with_condition_handlers(&[handlers], body)? {
            Caught::Normal(value) => Ok(value),
            Caught::Handled { payload, .. } => handler(self, payload),
        }
    }

    // -----------------------------------------------------------------------
    // Lisp forms
    // -----------------------------------------------------------------------

    /// `(catch TAG BODY...)`
    pub(crate) fn sf_catch(&mut self, tail: &[Expr]) -> EvalResult {
        let Some((tag_form, body)) = tail.split_first() else {
            return Err(signal(
                "wrong-number-of-arguments",
                vec![Value::symbol("catch"), Value::Int(0)],
            ));
        };
        let tag = self.eval(tag_form)?;
        self.internal_catch(tag, |ev| ev.sf_progn(body))
    }

    /// `(unwind-protect BODYFORM UNWINDFORMS...)`
    pub(crate) fn sf_unwind_protect(&mut self, tail: &[Expr]) -> EvalResult {
        let Some((body, cleanup)) = tail.split_first() else {
            return Err(signal(
                "wrong-number-of-arguments",
                vec![Value::symbol("unwind-protect"), Value::Int(0)],
            ));
        };
        let count = self.specpdl_depth();
        let cleanup = cleanup.to_vec();
        let lexenv = self.lexenv.clone();
        self.record_unwind_protect(Box::new(move |ev| {
            let saved = std::mem::replace(&mut ev.lexenv, lexenv);
            let result = ev.sf_progn(&cleanup).map(|_| ());
            ev.lexenv = saved;
            result
        }))?;
        let result = self.eval(body);
        self.unbind_to_with(count, result)
    }

    /// `(condition-case VAR BODYFORM HANDLERS...)`
    pub(crate) fn sf_condition_case(&mut self, tail: &[Expr]) -> EvalResult {
        let Some((var_form, rest)) = tail.split_first() else {
            return Err(signal(
                "wrong-number-of-arguments",
                vec![Value::symbol("condition-case"), Value::Int(0)],
            ));
        };
        let var = match var_form {
            Expr::Symbol(id) => Value::from_sym(*id),
            Expr::List(items) if items.is_empty() => Value::Nil,
            other => {
                return Err(signal(
                    "wrong-type-argument",
                    vec![Value::symbol("symbolp"), super::eval::quote_to_value(other)],
                ))
            }
        };
        let (bodyform, clauses) = match rest.split_first() {
            Some((bodyform, clauses)) => (Some(bodyform), clauses),
            None => (None, rest),
        };

        let mut success: Option<&[Expr]> = None;
        let mut conditions = Vec::new();
        let mut bodies: Vec<&[Expr]> = Vec::new();
        for clause in clauses {
            let items: &[Expr] = match clause {
                Expr::List(items) | Expr::DottedList(items, _) => items,
                Expr::Symbol(id) if resolve_sym(*id) == "nil" => &[],
                _ => {
                    return Err(invalid_handler(clause));
                }
            };
            let Some(head) = items.first() else {
                // A nil clause matches nothing.
                conditions.push(Value::list(vec![Value::Nil]));
                bodies.push(&[]);
                continue;
            };
            if !matches!(head, Expr::Symbol(_) | Expr::Keyword(_) | Expr::List(_) | Expr::DottedList(..)) {
                return Err(invalid_handler(clause));
            }
            if matches!(head, Expr::Symbol(id) | Expr::Keyword(id) if resolve_sym(*id) == ":success") {
                success = Some(&items[1..]);
                continue;
            }
            let condition = super::eval::quote_to_value(head);
            conditions.push(if condition.is_cons() {
                condition
            } else {
                Value::list(vec![condition])
            });
            bodies.push(&items[1..]);
        }

        let caught = self.with_condition_handlers(&conditions, |ev| match bodyform {
            Some(form) => ev.eval(form),
            None => Ok(Value::Nil),
        })?;
        match caught {
            Caught::Normal(value) => match success {
                Some(body) => self.run_handler_body(&var, value, body),
                None => Ok(value),
            },
            Caught::Handled { clause, payload } => {
                tracing::trace!(clause, "condition-case handler");
                self.run_handler_body(&var, payload, bodies[clause])
            }
        }
    }

    /// Evaluate a handler body with `var` bound to `value`: lexically when a
    /// lexical environment is active, dynamically otherwise.
    fn run_handler_body(&mut self, var: &Value, value: Value, body: &[Expr]) -> EvalResult {
        if var.is_nil() {
            return self.sf_progn(body);
        }
        if self.lexenv.is_truthy() {
            let saved = self.lexenv.clone();
            self.lexenv = Value::cons(Value::cons(var.clone(), value), saved.clone());
            let result = self.sf_progn(body);
            self.lexenv = saved;
            return result;
        }
        let count = self.specpdl_depth();
        let Some(sym) = var.as_symbol_id() else {
            return Err(signal("wrong-type-argument", vec![Value::symbol("symbolp"), var.clone()]));
        };
        self.specbind(sym, value)?;
        let result = self.sf_progn(body);
        self.unbind_to_with(count, result)
    }

    // -----------------------------------------------------------------------
    // Quit
    // -----------------------------------------------------------------------

    /// Deliver a pending quit, if any and if quitting is not inhibited.
    pub fn maybe_quit(&mut self) -> Result<(), Flow> {
        if self.vars.quit_flag.borrow().is_nil() || self.vars.inhibit_quit.borrow().is_truthy() {
            return Ok(());
        }
        let flag = std::mem::replace(&mut *self.vars.quit_flag.borrow_mut(), Value::Nil);
        let throw_on_input = self.vars.throw_on_input.borrow().clone();
        if eq_value(&flag, &throw_on_input) {
            return Err(self.throw(throw_on_input, Value::True));
        }
        tracing::debug!("quit");
        match self.signal_or_quit(SignalData::new(intern("quit"), Value::Nil), true) {
            Some(flow) => Err(flow),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Error reporting
    // -----------------------------------------------------------------------

    /// The text the top level prints for the error object `obj`.
    pub fn error_message_string(&self, obj: &Value) -> String {
        let errname = obj.car();
        let (errmsg, data, file_error) = if errname.is_symbol_named("error") {
            let data = match obj.cdr() {
                data @ Value::Cons(_) => data,
                _ => Value::Nil,
            };
            (data.car(), data, false)
        } else {
            let (message, conditions) = match errname.as_symbol_id() {
                Some(sym) => (
                    self.obarray.get_property(sym, intern("error-message")),
                    self.obarray.get_property(sym, intern("error-conditions")),
                ),
                None => (Value::Nil, Value::Nil),
            };
            let file_error = memq(&Value::symbol("file-error"), &conditions).is_truthy();
            (message, obj.clone(), file_error)
        };

        let mut tail = data.cdr();
        let mut errmsg = errmsg;
        if file_error && tail.is_cons() {
            errmsg = tail.car();
            tail = tail.cdr();
        }

        let mut out = String::new();
        let mut sep = Some(": ");
        match &errmsg {
            Value::Str(s) if s.is_empty() => sep = None,
            Value::Str(s) => out.push_str(s),
            _ => out.push_str("peculiar error"),
        }
        let princ_items = file_error
            || errname.is_symbol_named("end-of-file")
            || errname.is_symbol_named("user-error");
        let items = list_to_vec(&tail).unwrap_or_else(|| vec![tail.clone()]);
        for item in items {
            if let Some(sep) = sep {
                out.push_str(sep);
            }
            sep = Some(", ");
            if princ_items {
                out.push_str(&princ_value(&item));
            } else {
                out.push_str(&print_value(&item));
            }
        }
        out
    }

    /// Signal `(error MESSAGE . ARG)`; an `arg` that is not a proper list is
    /// wrapped in one.
    pub fn signal_error(&mut self, message: &str, arg: Value) -> Flow {
        let mut tortoise = arg.clone();
        let mut hare = arg.clone();
        while hare.is_cons() {
            hare = hare.cdr();
            if !hare.is_cons() {
                break;
            }
            hare = hare.cdr();
            tortoise = tortoise.cdr();
            if eq_value(&hare, &tortoise) {
                break;
            }
        }
        let arg = if hare.is_nil() {
            arg
        } else {
            Value::list(vec![arg])
        };
        self.route(signal_value(
            intern("error"),
            Value::cons(Value::string(message), arg),
        ))
    }

    /// Raise the preallocated memory-exhaustion signal.
    pub fn memory_full(&mut self) -> Flow {
        self.route(signal_value(intern("nil"), memory_signal_data()))
    }
}

fn invalid_handler(clause: &Expr) -> Flow {
    let printed = print_value(&super::eval::quote_to_value(clause));
    error_message(format!("Invalid condition handler: {printed}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elisp::tests_support::{eval_all, eval_one, eval_with};
    use proptest::prelude::*;

    #[test]
    fn throw_through_three_calls_restores_stacks() {
        let results = eval_all(
            "(defun level-three () (throw 'tag 42))
             (defun level-two () (let ((inner-binding 2)) (level-three)))
             (defun level-one () (unwind-protect (level-two) (setq unwound t)))
             (catch 'tag (level-one))
             unwound",
        );
        assert_eq!(results[3], "OK 42");
        assert_eq!(results[4], "OK t");
    }

    #[test]
    fn catch_leaves_handler_and_binding_stacks_unchanged() {
        let mut ev = Evaluator::new();
        let forms = crate::elisp::parser::parse_forms(
            "(defun thrower (n) (let ((marker n)) (if (> n 2) (throw 'tag (* n 14)) (thrower (1+ n)))))
             (catch 'tag (thrower 0))",
        )
        .expect("parse");
        let pdl = ev.specpdl_depth();
        let handlers = ev.handlers.len();
        let results = ev.eval_forms(&forms);
        assert_eq!(results[1].as_ref().ok(), Some(&Value::Int(42)));
        assert_eq!(ev.specpdl_depth(), pdl);
        assert_eq!(ev.handlers.len(), handlers);
    }

    #[test]
    fn throw_without_catch_signals_no_catch() {
        assert_eq!(eval_one("(throw 'nowhere 7)"), "ERR (no-catch nowhere 7)");
        assert_eq!(
            eval_one("(condition-case err (throw 'nowhere 7) (no-catch (cdr err)))"),
            "OK (nowhere 7)"
        );
    }

    #[test]
    fn nil_tag_is_never_caught() {
        assert_eq!(eval_one("(catch nil (throw nil 1))"), "ERR (no-catch nil 1)");
    }

    #[test]
    fn inner_catch_with_same_tag_wins() {
        assert_eq!(
            eval_one("(catch 'x (+ 1 (catch 'x (throw 'x 10))))"),
            "OK 11"
        );
    }

    #[test]
    fn first_matching_clause_wins() {
        let results = eval_all(
            "(condition-case nil (/ 1 0) (arith-error 'h1) (error 'h2))
             (condition-case nil (car 1) (arith-error 'h1) (error 'h2))",
        );
        assert_eq!(results, vec!["OK h1", "OK h2"]);
    }

    #[test]
    fn handler_variable_receives_error_object() {
        assert_eq!(
            eval_one("(condition-case err (signal 'wrong-type-argument '(x 1)) (error err))"),
            "OK (wrong-type-argument x 1)"
        );
    }

    #[test]
    fn condition_lists_and_catch_all_clauses() {
        let results = eval_all(
            "(condition-case nil (car 1) ((void-variable wrong-type-argument) 'listed))
             (condition-case nil (car 1) (t 'everything))
             (condition-case nil (signal 'quit nil) (error 'not-this) (quit 'quit-clause))",
        );
        assert_eq!(results, vec!["OK listed", "OK everything", "OK quit-clause"]);
    }

    #[test]
    fn error_clause_does_not_catch_quit() {
        assert_eq!(
            eval_one("(condition-case nil (signal 'quit nil) (error 'caught))"),
            "ERR (quit)"
        );
    }

    #[test]
    fn success_clause_receives_body_value() {
        assert_eq!(
            eval_one("(condition-case v (+ 1 2) (error 'failed) (:success (* v 10)))"),
            "OK 30"
        );
    }

    #[test]
    fn invalid_handler_is_reported() {
        assert_eq!(
            eval_one("(condition-case nil 1 \"oops\")"),
            "ERR (error \"Invalid condition handler: \\\"oops\\\"\")"
        );
    }

    #[test]
    fn handler_runs_outside_the_condition_case() {
        assert_eq!(
            eval_one("(condition-case nil (car 1) (error (car 2)))"),
            "ERR (wrong-type-argument listp 2)"
        );
    }

    #[test]
    fn cleanup_error_during_unwind_supersedes() {
        let results = eval_all(
            "(setq order nil)
             (condition-case err
                 (unwind-protect
                     (unwind-protect (car 1)
                       (setq order (cons 'inner order))
                       (error \"cleanup failed\"))
                   (setq order (cons 'outer order)))
               (error (cadr err)))
             order",
        );
        assert_eq!(results[1], "OK \"cleanup failed\"");
        assert_eq!(results[2], "OK (outer inner)");
    }

    #[test]
    fn nested_cleanup_error_undoes_lower_entries_once() {
        let results = eval_all(
            "(defvar d1 'base1)
             (defvar d2 'base2)
             (setq log nil)
             (condition-case nil
                 (let ((d1 'one))
                   (unwind-protect
                       (let ((d2 'two))
                         (unwind-protect (throw 'missing nil)
                           (setq log (cons 'cleanup-3 log))
                           (error \"boom\")))
                     (setq log (cons (list 'cleanup-1 d1 d2) log))))
               (error 'handled))
             (list d1 d2 log)",
        );
        assert_eq!(results[3], "OK handled");
        assert_eq!(
            results[4],
            "OK (base1 base2 ((cleanup-1 one base2) cleanup-3))"
        );
    }

    #[test]
    fn signal_hook_sees_signal_before_handlers() {
        let results = eval_all(
            "(setq seen nil)
             (setq signal-hook-function (lambda (sym data) (setq seen (cons sym data))))
             (condition-case nil (car 1) (error 'handled))
             seen",
        );
        assert_eq!(results[2], "OK handled");
        assert_eq!(results[3], "OK (wrong-type-argument listp 1)");
    }

    #[test]
    fn signal_hook_stays_bound_while_it_runs() {
        let results = eval_all(
            "(setq hook-calls nil)
             (setq signal-hook-function
                   (lambda (sym data)
                     (setq hook-calls (cons (functionp signal-hook-function) hook-calls))
                     (when (eq sym 'wrong-type-argument)
                       (condition-case nil (signal 'arith-error nil) (arith-error nil)))))
             (condition-case nil (car 1) (error 'handled))
             hook-calls",
        );
        assert_eq!(results[2], "OK handled");
        // The nested arith-error reached the hook too.
        assert_eq!(results[3], "OK (t t)");
    }

    #[test]
    fn top_level_catch_receives_unhandled_signal() {
        let mut ev = Evaluator::new();
        let forms = crate::elisp::parser::parse_forms("(car 'x)").expect("parse");
        let result = ev.with_top_level(|ev| ev.eval(&forms[0]));
        assert_eq!(result.ok(), Some(Value::True));
        assert!(ev.handlers.is_empty());
    }

    #[test]
    fn internal_condition_case_with_error_tag_catches_everything_but_quit() {
        let mut ev = Evaluator::new();
        let caught = ev.internal_condition_case(
            Value::symbol("error"),
            |ev| Err(ev.signal_error("Bad thing", Value::Int(3))),
            |ev, err| Ok(Value::string(ev.error_message_string(&err))),
        );
        assert_eq!(caught.ok(), Some(Value::string("Bad thing: 3")));
    }

    #[test]
    fn signal_error_wraps_non_lists() {
        let mut ev = Evaluator::new();
        let circular = Value::list(vec![Value::Int(1), Value::Int(2)]);
        circular.cdr().set_cdr(circular.clone());
        let flow = ev.signal_error("Circular", circular.clone());
        let Flow::Uncaught(sig) = flow else {
            panic!("expected uncaught signal");
        };
        assert!(eq_value(&sig.data.cdr().car(), &circular));
        let flow = ev.signal_error("Listed", Value::list(vec![Value::Int(1)]));
        let Flow::Uncaught(sig) = flow else {
            panic!("expected uncaught signal");
        };
        assert_eq!(sig.data, Value::list(vec![Value::string("Listed"), Value::Int(1)]));
    }

    #[test]
    fn memory_full_payload_is_the_data() {
        let mut ev = Evaluator::new();
        let result = ev.internal_condition_case(
            Value::True,
            |ev| Err(ev.memory_full()),
            |_, err| Ok(err),
        );
        assert_eq!(result.ok(), Some(memory_signal_data()));
    }

    #[test]
    fn error_message_string_formats_like_the_top_level() {
        let results = eval_all(
            "(error-message-string '(error \"Plain\"))
             (error-message-string '(error \"With args\" 1 \"two\"))
             (error-message-string '(wrong-type-argument listp 1))
             (error-message-string '(user-error \"Quiet\"))
             (error-message-string '(file-missing \"Opening input file\" \"No such file\" \"/x\"))
             (error-message-string '(no-such-error 1))
             (error-message-string '(end-of-file \"eof\"))",
        );
        assert_eq!(results[0], "OK \"Plain\"");
        assert_eq!(results[1], "OK \"With args: 1, \\\"two\\\"\"");
        assert_eq!(results[2], "OK \"Wrong type argument: listp, 1\"");
        assert_eq!(results[3], "OK \"Quiet\"");
        assert_eq!(results[4], "OK \"Opening input file: No such file, /x\"");
        assert_eq!(results[5], "OK \"peculiar error: 1\"");
        assert_eq!(results[6], "OK \"End of file during parsing: eof\"");
    }

    #[test]
    fn pending_quit_is_delivered_and_cleared() {
        let results = eval_all(
            "(condition-case nil (progn (setq quit-flag t) 2) (quit 'quitted))
             quit-flag",
        );
        assert_eq!(results, vec!["OK quitted", "OK nil"]);
    }

    #[test]
    fn quit_resumes_after_the_debugger_returns() {
        let results = eval_all(
            "(setq entered nil)
             (setq debugger (lambda (&rest args) (setq entered args)))
             (setq debug-on-quit t)
             (progn (setq quit-flag t) 'resumed)
             entered
             quit-flag
             (condition-case nil (signal 'quit nil) (quit 'lisp-quit-still-exits))",
        );
        assert_eq!(results[3], "OK resumed");
        assert_eq!(results[4], "OK (error (quit))");
        assert_eq!(results[5], "OK nil");
        assert_eq!(results[6], "OK lisp-quit-still-exits");
    }

    #[test]
    fn inhibited_quit_stays_pending() {
        let results = eval_with(
            |ev| {
                *ev.vars.quit_flag.borrow_mut() = Value::True;
                *ev.vars.inhibit_quit.borrow_mut() = Value::True;
            },
            "(+ 1 2)
             quit-flag",
        );
        assert_eq!(results, vec!["OK 3", "OK t"]);
    }

    #[test]
    fn quit_flag_matching_throw_on_input_throws() {
        let results = eval_with(
            |ev| *ev.vars.throw_on_input.borrow_mut() = Value::symbol("input-tag"),
            "(catch 'input-tag (setq quit-flag 'input-tag) (while t nil))",
        );
        assert_eq!(results, vec!["OK t"]);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn throw_value_survives_nesting(depth in 0usize..12, value in -1000i64..1000) {
            let mut ev = Evaluator::new();
            ev.set_variable("throw-depth", Value::Int(depth as i64));
            let forms = crate::elisp::parser::parse_forms(&format!(
                "(defun nest (n) (let ((level n)) (if (<= n 0) (throw 'prop {value}) (nest (1- n)))))
                 (catch 'prop (nest throw-depth))"
            ))
            .expect("parse");
            let pdl = ev.specpdl_depth();
            let results = ev.eval_forms(&forms);
            prop_assert_eq!(results[1].as_ref().ok(), Some(&Value::Int(value)));
            prop_assert_eq!(ev.specpdl_depth(), pdl);
            prop_assert!(ev.handlers.is_empty());
        }
    }
}
