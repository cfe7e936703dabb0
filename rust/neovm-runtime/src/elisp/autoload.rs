//! Autoload placeholders and the undo queue that makes a failed autoload
//! leave no trace.
//!
//! An autoload object is `(autoload FILE DOCSTRING INTERACTIVE TYPE)`,
//! stored in a function cell until the first call loads FILE. While such a
//! load runs, every function-cell overwrite and every `provide` pushes an
//! [`AutoloadUndo`] record; if the load exits abnormally the records are
//! replayed newest first.

use super::builtins::{arg_or_nil, expect_args, expect_range_args, expect_symbol};
use super::error::{error_message, wrong_type, EvalResult, Flow};
use super::eval::Evaluator;
use super::intern::{resolve_sym, SymId};
use super::print::princ_value;
use super::value::{equal_value, Value};

/// One change made by an in-progress autoload.
#[derive(Clone, Debug)]
pub enum AutoloadUndo {
    /// `symbol`'s function cell held `old` before it was overwritten.
    Function { symbol: SymId, old: Option<Value> },
    /// `features` before a `provide`.
    Features(Value),
}

/// Whether `object` is an autoload placeholder.
pub fn is_autoload(object: &Value) -> bool {
    object.is_cons() && object.car().is_symbol_named("autoload")
}

/// The TYPE field: `t` or `macro` for macros, `keymap`, or nil.
fn autoload_kind(fundef: &Value) -> Value {
    fundef.cdr().cdr().cdr().cdr().car()
}

fn is_macro_kind(kind: &Value) -> bool {
    matches!(kind, Value::True) || kind.is_symbol_named("macro")
}

impl Evaluator {
    /// Run `body` with a fresh autoload queue. On a normal return the
    /// changes stick; on a non-local exit they are rolled back while the
    /// binding stack unwinds.
    pub(crate) fn with_autoload_queue<F>(&mut self, body: F) -> EvalResult
    where
        F: FnOnce(&mut Self) -> EvalResult,
    {
        let count = self.specpdl_depth();
        let outer = self.autoload_queue.clone();
        self.record_unwind_protect(Box::new(move |ev| {
            ev.un_autoload(outer);
            Ok(())
        }))?;
        self.autoload_queue = Some(Vec::new());
        let result = body(self);
        if result.is_ok() {
            self.autoload_queue = Some(Vec::new());
        }
        self.unbind_to_with(count, result)
    }

    /// Reinstate `outer` as the queue, undoing what the current one holds.
    fn un_autoload(&mut self, outer: Option<Vec<AutoloadUndo>>) {
        let queue = std::mem::replace(&mut self.autoload_queue, outer);
        let undos = queue.unwrap_or_default();
        if !undos.is_empty() {
            tracing::debug!(count = undos.len(), "rolling back autoload");
        }
        for undo in undos.into_iter().rev() {
            match undo {
                AutoloadUndo::Function { symbol, old } => {
                    self.obarray.set_symbol_function(symbol, old);
                }
                AutoloadUndo::Features(old) => {
                    *self.vars.features.borrow_mut() = old;
                }
            }
        }
    }

    /// Note the current `features` before a `provide` changes it.
    pub(crate) fn record_features_undo(&mut self) {
        let features = self.vars.features.borrow().clone();
        if let Some(queue) = self.autoload_queue.as_mut() {
            queue.push(AutoloadUndo::Features(features));
        }
    }

    /// Load the file named by the autoload object `fundef` and return the
    /// definition of `funname` it installed.
    ///
    /// With `macro_only` equal to `macro`, only macro autoloads are loaded
    /// and anything else is returned untouched. A non-macro autoload loaded
    /// in that mode is best effort: load errors are ignored and nil is
    /// returned.
    #[tracing::instrument(level = "debug", skip_all, fields(function = %princ_value(&funname)))]
    pub fn autoload_do_load(
        &mut self,
        fundef: Value,
        funname: Value,
        macro_only: Value,
    ) -> EvalResult {
        if !is_autoload(&fundef) {
            return Ok(fundef);
        }
        let kind = autoload_kind(&fundef);
        let macro_kind = is_macro_kind(&kind);
        if macro_only.is_symbol_named("macro") && !macro_kind {
            return Ok(fundef);
        }
        if !funname.is_symbol() {
            return Err(wrong_type("symbolp", funname));
        }
        let ignore_errors = if macro_kind { Value::Nil } else { macro_only };
        let file = fundef.cdr().car();
        let noerror = ignore_errors.is_truthy();
        let loaded = self.with_autoload_queue(|ev| ev.load(&file, noerror, true, false, false))?;
        if funname.is_nil() || noerror {
            return Ok(Value::Nil);
        }
        let fun = self.indirect_function(&funname)?;
        if equal_value(&fun, &fundef, 0) {
            let file_name = match loaded {
                Value::Str(path) => path.to_string(),
                _ => princ_value(&file),
            };
            return Err(error_message(format!(
                "Autoloading file {file_name} failed to define function {}",
                princ_value(&funname)
            )));
        }
        Ok(fun)
    }

    /// `autoload`: install a placeholder unless `function` already has a
    /// real definition. Returns whether it was installed.
    pub fn autoload(
        &mut self,
        function: SymId,
        file: Value,
        docstring: Value,
        interactive: Value,
        kind: Value,
    ) -> Result<bool, Flow> {
        if self
            .obarray
            .symbol_function(function)
            .is_some_and(|def| def.is_truthy() && !is_autoload(&def))
        {
            return Ok(false);
        }
        let placeholder = Value::list(vec![
            Value::symbol("autoload"),
            file,
            docstring,
            interactive,
            kind,
        ]);
        tracing::trace!(function = resolve_sym(function), "autoload installed");
        self.defalias(function, placeholder)?;
        Ok(true)
    }
}

// ===========================================================================
// Builtins
// ===========================================================================

/// `(autoload FUNCTION FILE &optional DOCSTRING INTERACTIVE TYPE)`
pub(crate) fn builtin_autoload(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("autoload", &args, 2, 5)?;
    let function = expect_symbol(&args[0])?;
    if !args[1].is_string() {
        return Err(wrong_type("stringp", args[1].clone()));
    }
    let installed = eval.autoload(
        function,
        args[1].clone(),
        arg_or_nil(&args, 2),
        arg_or_nil(&args, 3),
        arg_or_nil(&args, 4),
    )?;
    Ok(if installed { args[0].clone() } else { Value::Nil })
}

/// `(autoload-do-load FUNDEF &optional FUNNAME MACRO-ONLY)`
pub(crate) fn builtin_autoload_do_load(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("autoload-do-load", &args, 1, 3)?;
    eval.autoload_do_load(args[0].clone(), arg_or_nil(&args, 1), arg_or_nil(&args, 2))
}

pub(crate) fn builtin_autoloadp(args: Vec<Value>) -> EvalResult {
    expect_args("autoloadp", &args, 1)?;
    Ok(Value::bool(is_autoload(&args[0])))
}

#[cfg(test)]
mod tests {
    use crate::elisp::tests_support::eval_with;
    use crate::elisp::value::Value;
    use std::fs;
    use tempfile::TempDir;

    /// A directory holding `files` and an evaluator whose `load-path` is it.
    fn run_in(files: &[(&str, &str)], src: &str) -> Vec<String> {
        let dir = TempDir::new().expect("temp dir");
        for (name, body) in files {
            fs::write(dir.path().join(name), body).expect("write fixture");
        }
        let path = dir.path().to_string_lossy().to_string();
        let results = eval_with(
            move |ev| {
                ev.set_variable("load-path", Value::list(vec![Value::string(path)]));
            },
            src,
        );
        drop(dir);
        results
    }

    #[test]
    fn first_call_loads_the_file() {
        let results = run_in(
            &[("lazy-lib.el", "(defun lazy-square (x) (* x x)) (provide 'lazy-lib)")],
            "(autoload 'lazy-square \"lazy-lib\")
             (autoloadp (symbol-function 'lazy-square))
             (lazy-square 7)
             (autoloadp (symbol-function 'lazy-square))
             (featurep 'lazy-lib)",
        );
        assert_eq!(results[0], "OK lazy-square");
        assert_eq!(results[1], "OK t");
        assert_eq!(results[2], "OK 49");
        assert_eq!(results[3], "OK nil");
        assert_eq!(results[4], "OK t");
    }

    #[test]
    fn autoload_keeps_real_definitions() {
        let results = run_in(
            &[],
            "(defun already-here () 'real)
             (autoload 'already-here \"never-loaded\")
             (already-here)",
        );
        assert_eq!(results[1], "OK nil");
        assert_eq!(results[2], "OK real");
    }

    #[test]
    fn failed_load_rolls_back_definitions_and_features() {
        let results = run_in(
            &[(
                "broken-lib.el",
                "(defun victim () 'replaced)
                 (provide 'broken-lib)
                 (car 1)",
            )],
            "(defun victim () 'original)
             (autoload 'broken-entry \"broken-lib\")
             (broken-entry)
             (victim)
             (featurep 'broken-lib)
             (autoloadp (symbol-function 'broken-entry))",
        );
        assert_eq!(results[2], "ERR (wrong-type-argument listp 1)");
        assert_eq!(results[3], "OK original");
        assert_eq!(results[4], "OK nil");
        assert_eq!(results[5], "OK t");
    }

    #[test]
    fn load_that_omits_the_function_is_an_error() {
        let results = run_in(
            &[("empty-lib.el", "(setq empty-lib-loaded t)")],
            "(autoload 'missing-fn \"empty-lib\")
             (condition-case err (missing-fn) (error (car err)))
             empty-lib-loaded",
        );
        assert_eq!(results[1], "OK error");
        assert_eq!(results[2], "OK t");
    }

    #[test]
    fn macro_only_mode_skips_plain_functions() {
        let results = run_in(
            &[(
                "macro-lib.el",
                "(defmacro lazy-when (c &rest body) (list 'if c (cons 'progn body)))",
            )],
            "(autoload 'lazy-fn \"never-loaded\")
             (autoloadp (autoload-do-load (symbol-function 'lazy-fn) 'lazy-fn 'macro))
             (autoload 'lazy-when \"macro-lib\" nil nil 'macro)
             (macroexpand '(lazy-when t 1))
             (lazy-when t 2)",
        );
        assert_eq!(results[1], "OK t");
        assert_eq!(results[3], "OK (if t (progn 1))");
        assert_eq!(results[4], "OK 2");
    }

    #[test]
    fn non_autoload_objects_pass_through() {
        let results = run_in(&[], "(autoload-do-load 'car) (autoloadp '(autoload \"x\"))");
        assert_eq!(results, vec!["OK car", "OK t"]);
    }
}
