//! File loading and the feature list (`load`, `provide`, `require`).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::builtins::{arg_or_nil, expect_range_args, expect_symbol};
use super::error::{error_message, signal, wrong_type, EvalResult, Flow};
use super::eval::Evaluator;
use super::expr::Expr;
use super::hooks::HookCondition;
use super::intern::{intern, resolve_sym, SymId};
use super::print::princ_value;
use super::symbol::{Obarray, SymbolValue};
use super::value::{equal_value, list_to_vec, memq, Value};

const LOAD_SUFFIX: &str = ".el";

/// Loading one file more often than this within itself is an error.
const MAX_NESTED_LOADS: usize = 3;
/// Same for `require` of one feature.
const MAX_NESTED_REQUIRES: usize = 3;

fn has_load_suffix(name: &str) -> bool {
    name.ends_with(LOAD_SUFFIX)
}

fn source_suffixed_path(base: &Path) -> PathBuf {
    let base_str = base.to_string_lossy();
    PathBuf::from(format!("{base_str}{LOAD_SUFFIX}"))
}

fn find_for_base(base: &Path, original_name: &str, no_suffix: bool, must_suffix: bool) -> Option<PathBuf> {
    if no_suffix || has_load_suffix(original_name) {
        return base.is_file().then(|| base.to_path_buf());
    }
    let suffixed = source_suffixed_path(base);
    if suffixed.is_file() {
        return Some(suffixed);
    }
    if !must_suffix && base.is_file() {
        return Some(base.to_path_buf());
    }
    None
}

/// Search for `name` the way `load` does.
///
/// - An absolute `name` is only tried as given.
/// - Otherwise each `load_path` directory is tried in order, and within a
///   directory `NAME.el` is preferred over the bare `NAME`.
/// - `no_suffix` tries only the exact name; `must_suffix` refuses the bare
///   name when `name` has no suffix.
pub fn find_file_in_load_path(
    name: &str,
    load_path: &[PathBuf],
    no_suffix: bool,
    must_suffix: bool,
) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return find_for_base(path, name, no_suffix, must_suffix);
    }
    load_path
        .iter()
        .find_map(|dir| find_for_base(&dir.join(name), name, no_suffix, must_suffix))
}

fn cookie_regex() -> &'static Regex {
    static COOKIE: OnceLock<Regex> = OnceLock::new();
    COOKIE.get_or_init(|| {
        Regex::new(r"-\*-.*\blexical-binding:\s*([^\s;]+)").expect("cookie pattern is valid")
    })
}

/// Whether the `-*-` line at the top of `source` turns on lexical binding.
fn lexical_cookie(source: &str) -> bool {
    let Some(first_line) = source.lines().next() else {
        return false;
    };
    cookie_regex()
        .captures(first_line)
        .and_then(|caps| caps.get(1))
        .is_some_and(|value| value.as_str() != "nil")
}

/// Define the plain variables the loader maintains.
pub(crate) fn install_load_vars(obarray: &mut Obarray) {
    for name in ["load-history", "after-load-functions"] {
        let sym = intern(name);
        obarray.set_special(sym, true);
        obarray.set_value_cell(sym, SymbolValue::Plain(Some(Value::Nil)));
    }
}

fn path_value(path: &Path) -> Value {
    Value::string(path.to_string_lossy())
}

impl Evaluator {
    /// Directories of `load-path`; a nil entry is the current directory.
    fn load_path_dirs(&self) -> Vec<PathBuf> {
        let load_path = self.vars.load_path.borrow().clone();
        list_to_vec(&load_path)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Nil => Some(PathBuf::from(".")),
                other => other.as_str().map(PathBuf::from),
            })
            .collect()
    }

    /// Find `file` and evaluate its forms. Returns the name of the file
    /// loaded, or nil when it was not found and `noerror` is set.
    #[tracing::instrument(level = "debug", skip(self, file), fields(file = %princ_value(file)))]
    pub fn load(
        &mut self,
        file: &Value,
        noerror: bool,
        nomessage: bool,
        nosuffix: bool,
        must_suffix: bool,
    ) -> EvalResult {
        let Some(name) = file.as_str() else {
            return Err(wrong_type("stringp", file.clone()));
        };
        let dirs = self.load_path_dirs();
        let Some(path) = find_file_in_load_path(name, &dirs, nosuffix, must_suffix) else {
            if noerror {
                return Ok(Value::Nil);
            }
            return Err(signal(
                "file-missing",
                vec![
                    Value::string("Cannot open load file"),
                    Value::string("No such file or directory"),
                    file.clone(),
                ],
            ));
        };
        let path = fs::canonicalize(&path).unwrap_or(path);

        let nested = self.loads_in_progress.iter().filter(|p| **p == path).count();
        if nested > MAX_NESTED_LOADS {
            let mut files = vec![path_value(&path)];
            files.extend(self.loads_in_progress.iter().rev().map(|p| path_value(p)));
            return Err(self.signal_error("Recursive load", Value::list(files)));
        }

        let source = fs::read_to_string(&path).map_err(|err| {
            signal(
                "file-error",
                vec![
                    Value::string("Opening input file"),
                    Value::string(err.to_string()),
                    path_value(&path),
                ],
            )
        })?;
        if !nomessage {
            tracing::info!(path = %path.display(), "loading");
        }
        let forms = super::parser::parse_forms(&source).map_err(|err| {
            signal(
                "invalid-read-syntax",
                vec![Value::string(err.message), path_value(&path)],
            )
        })?;

        let count = self.specpdl_depth();
        self.loads_in_progress.push(path.clone());
        self.record_unwind_protect(Box::new(|ev| {
            ev.loads_in_progress.pop();
            Ok(())
        }))?;
        let lexical = lexical_cookie(&source);
        self.specbind(intern("load-file-name"), path_value(&path))?;
        self.specbind(intern("load-in-progress"), Value::True)?;
        self.specbind(intern("lexical-binding"), Value::bool(lexical))?;
        let result = self.eval_loaded_forms(&forms, lexical);
        self.unbind_to_with(count, result)?;

        self.record_load_history(&path);
        self.run_hook_with_args(
            intern("after-load-functions"),
            &[path_value(&path)],
            HookCondition::All,
        )?;
        Ok(path_value(&path))
    }

    fn eval_loaded_forms(&mut self, forms: &[Expr], lexical: bool) -> EvalResult {
        let toplevel = if lexical {
            Value::list(vec![Value::True])
        } else {
            Value::Nil
        };
        let saved = std::mem::replace(&mut self.lexenv, toplevel);
        let mut result = Ok(Value::Nil);
        for form in forms {
            result = self.eval(form);
            if result.is_err() {
                break;
            }
        }
        self.lexenv = saved;
        result
    }

    fn record_load_history(&mut self, path: &Path) {
        let history_sym = intern("load-history");
        let history = match self.obarray.value_cell(history_sym) {
            SymbolValue::Plain(Some(value)) => value,
            _ => Value::Nil,
        };
        let entry = Value::list(vec![path_value(path)]);
        self.obarray.set_value_cell(
            history_sym,
            SymbolValue::Plain(Some(Value::cons(entry, history))),
        );
    }

    pub fn featurep(&self, feature: SymId, subfeature: &Value) -> bool {
        let features = self.vars.features.borrow().clone();
        if memq(&Value::from_sym(feature), &features).is_nil() {
            return false;
        }
        if subfeature.is_nil() {
            return true;
        }
        let subfeatures = self.obarray.get_property(feature, intern("subfeatures"));
        list_to_vec(&subfeatures)
            .unwrap_or_default()
            .iter()
            .any(|s| equal_value(s, subfeature, 0))
    }

    /// Add `feature` to `features`, noting the old list for an autoload
    /// rollback.
    pub fn provide(&mut self, feature: SymId, subfeatures: Value) -> Result<(), Flow> {
        if !subfeatures.is_list() {
            return Err(wrong_type("listp", subfeatures));
        }
        self.record_features_undo();
        let feature_value = Value::from_sym(feature);
        let features = self.vars.features.borrow().clone();
        if memq(&feature_value, &features).is_nil() {
            *self.vars.features.borrow_mut() = Value::cons(feature_value, features);
        }
        if subfeatures.is_truthy() {
            self.obarray
                .put_property(feature, intern("subfeatures"), subfeatures);
        }
        tracing::debug!(feature = resolve_sym(feature), "provided");
        Ok(())
    }

    /// Load the file for `feature` unless it is already provided. Returns
    /// false when the file is missing and `noerror` is set.
    pub fn require(&mut self, feature: SymId, filename: Value, noerror: bool) -> Result<bool, Flow> {
        if self.featurep(feature, &Value::Nil) {
            return Ok(true);
        }
        let nested = self.require_nesting.iter().filter(|f| **f == feature).count();
        if nested > MAX_NESTED_REQUIRES {
            return Err(error_message(format!(
                "Recursive `require' for feature `{}'",
                resolve_sym(feature)
            )));
        }
        let count = self.specpdl_depth();
        self.require_nesting.push(feature);
        self.record_unwind_protect(Box::new(|ev| {
            ev.require_nesting.pop();
            Ok(())
        }))?;
        let must_suffix = filename.is_nil();
        let file = if must_suffix {
            Value::string(resolve_sym(feature))
        } else {
            filename
        };
        let result = self.with_autoload_queue(|ev| {
            let loaded = ev.load(&file, noerror, true, false, must_suffix)?;
            if loaded.is_nil() || ev.featurep(feature, &Value::Nil) {
                return Ok(loaded);
            }
            let path = loaded.as_str().unwrap_or_default().to_string();
            Err(error_message(format!(
                "Loading file {path} failed to provide feature `{}'",
                resolve_sym(feature)
            )))
        });
        let loaded = self.unbind_to_with(count, result)?;
        Ok(loaded.is_truthy())
    }
}

// ===========================================================================
// Builtins
// ===========================================================================

/// `(load FILE &optional NOERROR NOMESSAGE NOSUFFIX MUST-SUFFIX)`
pub(crate) fn builtin_load(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("load", &args, 1, 5)?;
    let flag = |i: usize| arg_or_nil(&args, i).is_truthy();
    let loaded = eval.load(&args[0], flag(1), flag(2), flag(3), flag(4))?;
    Ok(Value::bool(loaded.is_truthy()))
}

/// `(provide FEATURE &optional SUBFEATURES)`
pub(crate) fn builtin_provide(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("provide", &args, 1, 2)?;
    let feature = expect_symbol(&args[0])?;
    eval.provide(feature, arg_or_nil(&args, 1))?;
    Ok(args[0].clone())
}

/// `(require FEATURE &optional FILENAME NOERROR)`
pub(crate) fn builtin_require(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("require", &args, 1, 3)?;
    let feature = expect_symbol(&args[0])?;
    let noerror = arg_or_nil(&args, 2).is_truthy();
    if eval.require(feature, arg_or_nil(&args, 1), noerror)? {
        Ok(args[0].clone())
    } else {
        Ok(Value::Nil)
    }
}

/// `(featurep FEATURE &optional SUBFEATURE)`
pub(crate) fn builtin_featurep(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("featurep", &args, 1, 2)?;
    let feature = expect_symbol(&args[0])?;
    Ok(Value::bool(eval.featurep(feature, &arg_or_nil(&args, 1))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elisp::tests_support::eval_with;
    use tempfile::TempDir;

    fn fixture_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().expect("temp dir");
        for (name, body) in files {
            fs::write(dir.path().join(name), body).expect("write fixture");
        }
        dir
    }

    /// Evaluate `src` with `load-path` set to a directory holding `files`.
    fn run_with_files(files: &[(&str, &str)], src: &str) -> Vec<String> {
        let dir = fixture_dir(files);
        let path = dir.path().to_string_lossy().to_string();
        eval_with(
            move |ev| ev.set_variable("load-path", Value::list(vec![Value::string(path)])),
            src,
        )
    }

    #[test]
    fn suffixed_file_wins_within_a_directory() {
        let dir = fixture_dir(&[("choice", "plain"), ("choice.el", "el")]);
        let load_path = vec![dir.path().to_path_buf()];
        let el = dir.path().join("choice.el");
        let plain = dir.path().join("choice");
        assert_eq!(find_file_in_load_path("choice", &load_path, false, false), Some(el.clone()));
        assert_eq!(find_file_in_load_path("choice", &load_path, true, false), Some(plain.clone()));
        assert_eq!(find_file_in_load_path("choice", &load_path, false, true), Some(el));
        assert_eq!(find_file_in_load_path("choice", &load_path, true, true), Some(plain));
        assert_eq!(find_file_in_load_path("absent", &load_path, false, false), None);
    }

    #[test]
    fn earlier_directory_wins_over_suffix() {
        let first = fixture_dir(&[("choice", "plain")]);
        let second = fixture_dir(&[("choice.el", "el")]);
        let load_path = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(
            find_file_in_load_path("choice", &load_path, false, false),
            Some(first.path().join("choice"))
        );
    }

    #[test]
    fn cookie_must_be_on_the_first_line() {
        assert!(lexical_cookie(";;; x.el --- demo -*- lexical-binding: t; -*-\n"));
        assert!(!lexical_cookie(";;; -*- lexical-binding: nil -*-"));
        assert!(!lexical_cookie("(setq a 1)\n;; -*- lexical-binding: t -*-"));
        assert!(!lexical_cookie(""));
    }

    #[test]
    fn missing_file_signals_file_missing() {
        let results = run_with_files(
            &[],
            "(load \"no-such-file\")
             (load \"no-such-file\" t)
             (condition-case err (load \"no-such-file\") (file-error (error-message-string err)))",
        );
        assert_eq!(
            results[0],
            "ERR (file-missing \"Cannot open load file\" \"No such file or directory\" \"no-such-file\")"
        );
        assert_eq!(results[1], "OK nil");
        assert_eq!(
            results[2],
            "OK \"Cannot open load file: No such file or directory, no-such-file\""
        );
    }

    #[test]
    fn load_binds_loader_variables_and_records_history() {
        let results = run_with_files(
            &[(
                "sample.el",
                "(setq seen-name load-file-name seen-progress load-in-progress)",
            )],
            "(setq after-count 0)
             (add-hook 'after-load-functions (lambda (f) (setq after-count (1+ after-count))))
             (load \"sample\")
             (list (stringp seen-name) seen-progress load-file-name load-in-progress)
             (equal seen-name (car (car load-history)))
             after-count",
        );
        assert_eq!(results[2], "OK t");
        assert_eq!(results[3], "OK (t t nil nil)");
        assert_eq!(results[4], "OK t");
        assert_eq!(results[5], "OK 1");
    }

    #[test]
    fn lexical_cookie_makes_closures() {
        let results = run_with_files(
            &[(
                "counter.el",
                ";; -*- lexical-binding: t -*-
                 (defun make-counter ()
                   (let ((n 0)) (lambda () (setq n (1+ n)))))",
            )],
            "(load \"counter\")
             (setq c (make-counter))
             (funcall c)
             (funcall c)
             lexical-binding",
        );
        assert_eq!(results[3], "OK 2");
        assert_eq!(results[4], "OK nil");
    }

    #[test]
    fn errors_inside_a_file_propagate_and_unwind() {
        let results = run_with_files(
            &[("bad.el", "(setq before-error t) (car 1) (setq after-error t)")],
            "(load \"bad\")
             before-error
             (boundp 'after-error)
             load-in-progress",
        );
        assert_eq!(results[0], "ERR (wrong-type-argument listp 1)");
        assert_eq!(results[1], "OK t");
        assert_eq!(results[2], "OK nil");
        assert_eq!(results[3], "OK nil");
    }

    #[test]
    fn self_loading_file_is_recursive_load() {
        let results = run_with_files(
            &[("loop.el", "(load \"loop\")")],
            "(condition-case err (load \"loop\") (error (car (cdr err))))",
        );
        assert_eq!(results[0], "OK \"Recursive load\"");
    }

    #[test]
    fn require_loads_once_and_checks_the_feature() {
        let results = run_with_files(
            &[
                ("mod-a.el", "(setq mod-a-loads (1+ mod-a-loads)) (provide 'mod-a '(fast))"),
                ("mod-b.el", "(defun mod-b-fn () 1)"),
            ],
            "(setq mod-a-loads 0)
             (require 'mod-a)
             (require 'mod-a)
             mod-a-loads
             (list (featurep 'mod-a) (featurep 'mod-a 'fast) (featurep 'mod-a 'slow))
             (condition-case err (require 'mod-b) (error 'not-provided))
             (fboundp 'mod-b-fn)
             (require 'mod-missing nil t)",
        );
        assert_eq!(results[1], "OK mod-a");
        assert_eq!(results[2], "OK mod-a");
        assert_eq!(results[3], "OK 1");
        assert_eq!(results[4], "OK (t t nil)");
        assert_eq!(results[5], "OK not-provided");
        // Only redefinitions are undone; a fresh definition survives.
        assert_eq!(results[6], "OK t");
        assert_eq!(results[7], "OK nil");
    }

    #[test]
    fn provide_outside_autoload_records_nothing() {
        let mut ev = Evaluator::new();
        ev.provide(intern("plain-feature"), Value::Nil)
            .expect("provide");
        assert!(ev.featurep(intern("plain-feature"), &Value::Nil));
        assert!(ev.autoload_queue.is_none());
    }
}
