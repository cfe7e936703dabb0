//! Variables the evaluator core reads on every step.
//!
//! Each one is a forwarded Lisp variable whose storage is shared with the
//! evaluator, so `(setq max-lisp-eval-depth 200)` and a Rust-side
//! `vars.max_lisp_eval_depth.set(200)` are the same write.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::config::EvaluatorConfig;
use super::symbol::Obarray;
use super::value::Value;

#[derive(Clone, Debug)]
pub struct CoreVars {
    pub max_specpdl_size: Rc<Cell<i64>>,
    pub max_lisp_eval_depth: Rc<Cell<i64>>,
    pub lexical_binding: Rc<Cell<bool>>,
    pub load_in_progress: Rc<Cell<bool>>,
    pub debug_on_quit: Rc<Cell<bool>>,
    pub debugger_may_continue: Rc<Cell<bool>>,
    pub debug_on_error: Rc<RefCell<Value>>,
    pub debug_ignored_errors: Rc<RefCell<Value>>,
    pub debug_on_signal: Rc<RefCell<Value>>,
    pub inhibit_debugger: Rc<RefCell<Value>>,
    pub debugger: Rc<RefCell<Value>>,
    pub signal_hook_function: Rc<RefCell<Value>>,
    pub quit_flag: Rc<RefCell<Value>>,
    pub inhibit_quit: Rc<RefCell<Value>>,
    pub throw_on_input: Rc<RefCell<Value>>,
    pub features: Rc<RefCell<Value>>,
    pub load_path: Rc<RefCell<Value>>,
    pub load_file_name: Rc<RefCell<Value>>,
}

fn obj(value: Value) -> Rc<RefCell<Value>> {
    Rc::new(RefCell::new(value))
}

impl CoreVars {
    pub fn new(config: &EvaluatorConfig) -> Self {
        let load_path = config
            .load_path
            .iter()
            .map(|dir| Value::string(dir.to_string_lossy()))
            .collect();
        let ignored = [
            "beginning-of-line",
            "beginning-of-buffer",
            "end-of-line",
            "end-of-buffer",
            "end-of-file",
            "buffer-read-only",
            "user-error",
        ]
        .iter()
        .map(Value::symbol)
        .collect();
        Self {
            max_specpdl_size: Rc::new(Cell::new(config.max_specpdl_size)),
            max_lisp_eval_depth: Rc::new(Cell::new(config.max_lisp_eval_depth)),
            lexical_binding: Rc::new(Cell::new(config.lexical_binding)),
            load_in_progress: Rc::new(Cell::new(false)),
            debug_on_quit: Rc::new(Cell::new(false)),
            debugger_may_continue: Rc::new(Cell::new(true)),
            debug_on_error: obj(Value::Nil),
            debug_ignored_errors: obj(Value::list(ignored)),
            debug_on_signal: obj(Value::Nil),
            inhibit_debugger: obj(Value::Nil),
            debugger: obj(Value::Nil),
            signal_hook_function: obj(Value::Nil),
            quit_flag: obj(Value::Nil),
            inhibit_quit: obj(Value::Nil),
            throw_on_input: obj(Value::Nil),
            features: obj(Value::Nil),
            load_path: obj(Value::list(load_path)),
            load_file_name: obj(Value::Nil),
        }
    }

    /// Define every variable as a forward onto this record's storage.
    pub(crate) fn install(&self, obarray: &mut Obarray) {
        obarray.defvar_int("max-specpdl-size", Rc::clone(&self.max_specpdl_size));
        obarray.defvar_int("max-lisp-eval-depth", Rc::clone(&self.max_lisp_eval_depth));
        obarray.defvar_bool("lexical-binding", Rc::clone(&self.lexical_binding));
        obarray.defvar_bool("load-in-progress", Rc::clone(&self.load_in_progress));
        obarray.defvar_bool("debug-on-quit", Rc::clone(&self.debug_on_quit));
        obarray.defvar_bool(
            "debugger-may-continue",
            Rc::clone(&self.debugger_may_continue),
        );
        let objects = [
            ("debug-on-error", &self.debug_on_error),
            ("debug-ignored-errors", &self.debug_ignored_errors),
            ("debug-on-signal", &self.debug_on_signal),
            ("inhibit-debugger", &self.inhibit_debugger),
            ("debugger", &self.debugger),
            ("signal-hook-function", &self.signal_hook_function),
            ("quit-flag", &self.quit_flag),
            ("inhibit-quit", &self.inhibit_quit),
            ("throw-on-input", &self.throw_on_input),
            ("features", &self.features),
            ("load-path", &self.load_path),
            ("load-file-name", &self.load_file_name),
        ];
        for (name, cell) in objects {
            obarray.defvar_lisp(name, Rc::clone(cell));
        }
    }
}
