//! Debugger entry policy.
//!
//! A signal consults `debug-on-error` (or `debug-on-quit`),
//! `debug-ignored-errors` and the re-entry guard before the function in
//! `debugger` is called.

use regex::Regex;

use super::error::{Flow, SignalData};
use super::eval::Evaluator;
use super::intern::intern;
use super::print::print_value;
use super::value::{eq_value, memq, Value};

/// Whether `list` asks for the debugger on a signal with `conditions`:
/// any non-nil atom does, a list does if it names one of the conditions.
fn wants_debugger(list: &Value, conditions: &Value) -> bool {
    match list {
        Value::Nil => false,
        Value::Cons(_) => {
            let mut tail = conditions.clone();
            while tail.is_cons() {
                if memq(&tail.car(), list).is_truthy() {
                    return true;
                }
                tail = tail.cdr();
            }
            false
        }
        _ => true,
    }
}

impl Evaluator {
    /// Whether `debug-ignored-errors` excludes this signal. String entries
    /// are regexps matched against the error message, other entries are
    /// condition names.
    fn skip_debugger(&self, conditions: &Value, error_object: &Value) -> bool {
        let ignored = self.vars.debug_ignored_errors.borrow().clone();
        let mut message: Option<String> = None;
        let mut tail = ignored;
        while tail.is_cons() {
            let entry = tail.car();
            match &entry {
                Value::Str(pattern) => {
                    let text = message
                        .get_or_insert_with(|| self.error_message_string(error_object));
                    match Regex::new(pattern) {
                        Ok(re) if re.is_match(text) => return true,
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!(%err, pattern = &**pattern, "bad debug-ignored-errors pattern");
                        }
                    }
                }
                _ => {
                    let mut cond = conditions.clone();
                    while cond.is_cons() {
                        if eq_value(&entry, &cond.car()) {
                            return true;
                        }
                        cond = cond.cdr();
                    }
                }
            }
            tail = tail.cdr();
        }
        false
    }

    /// Call the debugger if the current settings want it for this signal.
    /// Returns whether it was called.
    pub(crate) fn maybe_call_debugger(
        &mut self,
        conditions: &Value,
        sig: &SignalData,
    ) -> Result<bool, Flow> {
        let error_object = sig.to_error_object();
        let is_quit = sig.symbol == intern("quit");
        let wanted = if is_quit {
            self.vars.debug_on_quit.get()
        } else {
            wants_debugger(&self.vars.debug_on_error.borrow(), conditions)
        };
        if self.vars.inhibit_debugger.borrow().is_truthy()
            || !wanted
            || self.skip_debugger(conditions, &error_object)
            || self.when_entered_debugger >= self.num_nonmacro_input_events
        {
            return Ok(false);
        }
        self.call_debugger(Value::list(vec![Value::symbol("error"), error_object]))?;
        Ok(true)
    }

    /// Apply `debugger` to the argument list `args`, with room on both
    /// stacks and further debugger entry inhibited.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn call_debugger(&mut self, args: Value) -> Result<Value, Flow> {
        let old_depth = self.max_lisp_eval_depth();
        let old_pdl = self.max_specpdl_size();
        let depth = self.depth as i64;
        if depth + 40 > old_depth {
            self.vars.max_lisp_eval_depth.set(depth + 40);
        }
        self.vars.max_specpdl_size.set(old_pdl + 40);

        let count = self.specpdl_depth();
        self.record_unwind_protect(Box::new(move |ev| {
            ev.vars.max_specpdl_size.set(old_pdl);
            ev.vars.max_lisp_eval_depth.set(old_depth);
            Ok(())
        }))?;
        self.when_entered_debugger = self.num_nonmacro_input_events;
        let result = self.run_debugger(args);
        self.unbind_to_with(count, result)
    }

    fn run_debugger(&mut self, args: Value) -> Result<Value, Flow> {
        self.specbind(intern("debugger-may-continue"), Value::True)?;
        self.specbind(intern("inhibit-debugger"), Value::True)?;
        let debugger = self.vars.debugger.borrow().clone();
        if debugger.is_nil() {
            tracing::info!(args = %print_value(&args), "debugger requested but none installed");
            self.message(format!("Debugger entered: {}", print_value(&args)));
            return Ok(Value::Nil);
        }
        self.apply(debugger, args)
    }

    /// Record one command-loop input event. Lets the debugger be entered
    /// again after it ran for an earlier event.
    pub fn note_input_event(&mut self) {
        self.num_nonmacro_input_events += 1;
    }
}
