//! Evaluator: special forms, function application and dispatch.
//!
//! The lexical environment is a Lisp alist held in [`Evaluator::lexenv`].
//! `nil` means dynamic scoping; a non-nil environment (at least `(t)`)
//! means `let` and lambda parameters bind lexically unless the variable is
//! special. Every other piece of state (value cells, the binding stack, the
//! handler stack) lives in its own module and is reached through methods.

use std::rc::Rc;

use super::autoload::AutoloadUndo;
use super::buffer_vars::register_buffer_vars;
use super::builtins;
use super::config::EvaluatorConfig;
use super::control::HandlerStack;
use super::error::*;
use super::eval_vars::CoreVars;
use super::expr::Expr;
use super::frame_vars::register_frame_vars;
use super::intern::{intern, resolve_sym, SymId};
use super::load::install_load_vars;
use super::specpdl::SpecPdl;
use super::stack::ensure_sufficient_stack;
use super::symbol::Obarray;
use super::value::*;
use crate::buffer::BufferManager;
use crate::window::FrameManager;

/// Floor `max-lisp-eval-depth` is raised to before nesting is reported.
const MIN_LISP_EVAL_DEPTH: i64 = 100;

/// Forms whose arguments are not evaluated, with their arity.
const SPECIAL_FORMS: &[(&str, usize, Option<usize>)] = &[
    ("quote", 1, Some(1)),
    ("function", 1, Some(1)),
    ("let", 1, None),
    ("let*", 1, None),
    ("setq", 0, None),
    ("if", 2, None),
    ("and", 0, None),
    ("or", 0, None),
    ("cond", 0, None),
    ("while", 1, None),
    ("progn", 0, None),
    ("prog1", 1, None),
    ("prog2", 2, None),
    ("when", 1, None),
    ("unless", 1, None),
    ("lambda", 1, None),
    ("defun", 2, None),
    ("defmacro", 2, None),
    ("defvar", 1, Some(3)),
    ("defconst", 2, Some(3)),
    ("defvar-local", 2, Some(3)),
    ("setq-default", 0, None),
    ("setq-local", 0, None),
    ("catch", 1, None),
    ("unwind-protect", 1, None),
    ("condition-case", 2, None),
    ("save-current-buffer", 0, None),
    ("with-current-buffer", 1, None),
    ("interactive", 0, None),
    ("declare", 0, None),
    ("`", 1, Some(1)),
    ("dolist", 1, None),
    ("dotimes", 1, None),
    ("ignore-errors", 0, None),
];

pub(crate) fn is_special_form(symbol: SymId) -> bool {
    let name = resolve_sym(symbol);
    SPECIAL_FORMS.iter().any(|(n, ..)| *n == name)
}

/// The Elisp evaluator.
pub struct Evaluator {
    /// Symbol table: value cells, function cells, plists.
    pub(crate) obarray: Obarray,
    /// Dynamic binding and cleanup stack.
    pub(crate) specpdl: SpecPdl,
    /// Active catch and condition-case handlers.
    pub(crate) handlers: HandlerStack,
    /// Lexical environment alist; nil when evaluating dynamically.
    pub(crate) lexenv: Value,
    pub(crate) buffers: BufferManager,
    pub(crate) frames: FrameManager,
    /// Storage shared with the forwarded core variables.
    pub(crate) vars: CoreVars,
    /// Current Lisp evaluation depth.
    pub(crate) depth: usize,
    /// Undo records of the autoload in progress, if any.
    pub(crate) autoload_queue: Option<Vec<AutoloadUndo>>,
    /// Files being loaded, innermost last.
    pub(crate) loads_in_progress: Vec<std::path::PathBuf>,
    /// Features whose `require` is in progress, innermost last.
    pub(crate) require_nesting: Vec<SymId>,
    /// Input event count when the debugger was last entered.
    pub(crate) when_entered_debugger: i64,
    pub(crate) num_nonmacro_input_events: i64,
    /// Echo-area log.
    messages: Vec<String>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_config(EvaluatorConfig::default())
    }

    pub fn with_config(config: EvaluatorConfig) -> Self {
        let vars = CoreVars::new(&config);
        let mut obarray = Obarray::new();
        let mut buffers = BufferManager::new();
        let mut frames = FrameManager::new();
        vars.install(&mut obarray);
        register_buffer_vars(&mut obarray, &mut buffers);
        register_frame_vars(&mut obarray, &mut frames);
        install_standard_errors(&mut obarray);
        install_load_vars(&mut obarray);
        builtins::install(&mut obarray);
        for (name, ..) in SPECIAL_FORMS {
            let sym = intern(name);
            obarray.set_symbol_function(sym, Some(Value::Subr(sym)));
        }
        tracing::debug!(?config, "evaluator created");
        Self {
            obarray,
            specpdl: SpecPdl::new(),
            handlers: HandlerStack::new(),
            lexenv: Value::Nil,
            buffers,
            frames,
            vars,
            depth: 0,
            autoload_queue: None,
            loads_in_progress: Vec::new(),
            require_nesting: Vec::new(),
            when_entered_debugger: -1,
            num_nonmacro_input_events: 0,
            messages: Vec::new(),
        }
    }

    pub fn obarray(&self) -> &Obarray {
        &self.obarray
    }

    pub fn max_specpdl_size(&self) -> i64 {
        self.vars.max_specpdl_size.get()
    }

    pub fn max_lisp_eval_depth(&self) -> i64 {
        self.vars.max_lisp_eval_depth.get()
    }

    /// Show `text` in the echo area, which here means the message log.
    pub fn message(&mut self, text: String) {
        tracing::info!(target: "neovm::message", "{text}");
        self.messages.push(text);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    // -----------------------------------------------------------------------
    // Public entry points
    // -----------------------------------------------------------------------

    /// Evaluate one top-level form. `lexical-binding` decides whether it
    /// starts with an empty lexical environment or none at all.
    pub fn eval_expr(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        let toplevel = self.toplevel_lexenv();
        let saved = std::mem::replace(&mut self.lexenv, toplevel);
        let result = self.eval(expr);
        self.lexenv = saved;
        result.map_err(|flow| map_flow(self.route(flow)))
    }

    pub fn eval_forms(&mut self, forms: &[Expr]) -> Vec<Result<Value, EvalError>> {
        forms.iter().map(|form| self.eval_expr(form)).collect()
    }

    fn toplevel_lexenv(&self) -> Value {
        if self.vars.lexical_binding.get() {
            Value::list(vec![Value::True])
        } else {
            Value::Nil
        }
    }

    /// Set a variable's current binding, as `set` would.
    pub fn set_variable(&mut self, name: &str, value: Value) {
        if let Err(flow) = self.set(intern(name), value) {
            tracing::warn!(name, ?flow, "set_variable failed");
        }
    }

    /// The current value of a variable, or None when it is void.
    pub fn symbol_value(&mut self, name: &str) -> Option<Value> {
        self.find_symbol_value(intern(name)).ok().flatten()
    }

    pub fn set_function(&mut self, name: &str, value: Value) {
        self.obarray.set_symbol_function(intern(name), Some(value));
    }

    // -----------------------------------------------------------------------
    // Core eval
    // -----------------------------------------------------------------------

    pub(crate) fn eval(&mut self, expr: &Expr) -> EvalResult {
        self.maybe_quit()?;
        self.depth += 1;
        let result = match self.check_eval_depth() {
            Ok(()) => ensure_sufficient_stack(|| self.eval_inner(expr)),
            Err(flow) => Err(flow),
        };
        self.depth -= 1;
        result.map_err(|flow| self.route(flow))
    }

    fn check_eval_depth(&mut self) -> Result<(), Flow> {
        let depth = self.depth as i64;
        if depth > self.max_lisp_eval_depth() {
            if self.max_lisp_eval_depth() < MIN_LISP_EVAL_DEPTH {
                self.vars.max_lisp_eval_depth.set(MIN_LISP_EVAL_DEPTH);
            }
            if depth > self.max_lisp_eval_depth() {
                tracing::debug!(depth, "eval depth ceiling reached");
                return Err(signal("excessive-lisp-nesting", vec![Value::Int(depth)]));
            }
        }
        Ok(())
    }

    fn eval_inner(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Float(v) => Ok(Value::Float(*v)),
            Expr::Str(s) => Ok(Value::string(s.clone())),
            Expr::Keyword(id) => Ok(Value::Keyword(*id)),
            Expr::Symbol(id) => match Value::from_sym(*id) {
                value @ (Value::Nil | Value::True | Value::Keyword(_)) => Ok(value),
                _ => self.eval_symbol(*id),
            },
            Expr::List(items) => self.eval_list(items),
            Expr::DottedList(..) => Err(wrong_type("listp", quote_to_value(expr))),
            Expr::Opaque(value) => Ok(value.clone()),
        }
    }

    fn eval_symbol(&mut self, symbol: SymId) -> EvalResult {
        if self.lexenv.is_truthy() {
            let binding = assq(&Value::from_sym(symbol), &self.lexenv);
            if binding.is_cons() {
                return Ok(binding.cdr());
            }
        }
        self.symbol_value_of(symbol)
    }

    fn eval_list(&mut self, items: &[Expr]) -> EvalResult {
        let Some((head, tail)) = items.split_first() else {
            return Ok(Value::Nil);
        };
        let original = match head {
            Expr::Symbol(id) => Value::from_sym(*id),
            Expr::List(inner) if inner.first().is_some_and(|h| h.is_symbol_named("lambda")) => {
                let fun = self.make_closure(&inner[1..])?;
                let args = self.eval_args(tail)?;
                return self.call_resolved(&fun, fun.clone(), args);
            }
            other => return Err(signal("invalid-function", vec![quote_to_value(other)])),
        };

        let mut fun = self.indirect_function(&original)?;
        loop {
            match &fun {
                Value::Nil => return Err(signal("void-function", vec![original])),
                Value::Subr(id) if is_special_form(*id) => return self.special_form(*id, tail),
                Value::Macro(data) => {
                    let data = Rc::clone(data);
                    let args = tail.iter().map(quote_to_value).collect();
                    let expansion = self.funcall_lambda(&fun, &data, args)?;
                    return self.eval(&value_to_expr(&expansion));
                }
                Value::Cons(_) if fun.car().is_symbol_named("macro") => {
                    let args = tail.iter().map(quote_to_value).collect();
                    let expansion = self.funcall(fun.cdr(), args)?;
                    return self.eval(&value_to_expr(&expansion));
                }
                Value::Cons(_) if fun.car().is_symbol_named("autoload") => {
                    self.autoload_do_load(fun.clone(), original.clone(), Value::Nil)?;
                    fun = self.indirect_function(&original)?;
                    if fun.car().is_symbol_named("autoload") {
                        return Err(signal("invalid-function", vec![original]));
                    }
                }
                _ => break,
            }
        }
        let args = self.eval_args(tail)?;
        self.call_resolved(&original, fun, args)
    }

    fn eval_args(&mut self, forms: &[Expr]) -> Result<Vec<Value>, Flow> {
        let mut args = Vec::with_capacity(forms.len());
        for form in forms {
            args.push(self.eval(form)?);
        }
        Ok(args)
    }

    /// Evaluate the Lisp object `form`. A cons `lexical` is used as the
    /// lexical environment, any other non-nil value means an empty one.
    pub fn eval_value(&mut self, form: &Value, lexical: &Value) -> EvalResult {
        let env = match lexical {
            Value::Nil => Value::Nil,
            Value::Cons(_) => lexical.clone(),
            _ => Value::list(vec![Value::True]),
        };
        let saved = std::mem::replace(&mut self.lexenv, env);
        let result = self.eval(&value_to_expr(form));
        self.lexenv = saved;
        result
    }

    // -----------------------------------------------------------------------
    // Function application
    // -----------------------------------------------------------------------

    /// Call `function` with already evaluated `args`.
    pub fn funcall(&mut self, function: Value, args: Vec<Value>) -> EvalResult {
        self.maybe_quit()?;
        self.depth += 1;
        let result = match self.check_eval_depth() {
            Ok(()) => ensure_sufficient_stack(|| self.funcall_inner(function, args)),
            Err(flow) => Err(flow),
        };
        self.depth -= 1;
        result.map_err(|flow| self.route(flow))
    }

    /// Call `function` with the elements of the list `args`.
    pub fn apply(&mut self, function: Value, args: Value) -> EvalResult {
        match list_to_vec(&args) {
            Some(args) => self.funcall(function, args),
            None => Err(self.route(wrong_type("listp", args))),
        }
    }

    fn funcall_inner(&mut self, original: Value, args: Vec<Value>) -> EvalResult {
        let fun = if original.is_symbol() {
            let fun = self.indirect_function(&original)?;
            if fun.is_nil() {
                return Err(signal("void-function", vec![original]));
            }
            fun
        } else {
            original.clone()
        };
        self.call_resolved(&original, fun, args)
    }

    /// Apply the function object `fun`, reached from `original`.
    fn call_resolved(&mut self, original: &Value, fun: Value, args: Vec<Value>) -> EvalResult {
        match &fun {
            Value::Subr(id) if is_special_form(*id) => {
                Err(signal("invalid-function", vec![original.clone()]))
            }
            Value::Subr(id) => builtins::call(self, *id, args),
            Value::Lambda(data) => {
                let data = Rc::clone(data);
                self.funcall_lambda(&fun, &data, args)
            }
            Value::Cons(_) if fun.car().is_symbol_named("lambda") => {
                let data = lambda_from_list(&fun)?;
                self.funcall_lambda(&fun, &data, args)
            }
            Value::Cons(_) if fun.car().is_symbol_named("autoload") && original.is_symbol() => {
                self.autoload_do_load(fun.clone(), original.clone(), Value::Nil)?;
                let loaded = self.indirect_function(original)?;
                if loaded.is_nil() || loaded.car().is_symbol_named("autoload") {
                    return Err(signal("invalid-function", vec![original.clone()]));
                }
                self.call_resolved(original, loaded, args)
            }
            _ => Err(signal("invalid-function", vec![original.clone()])),
        }
    }

    /// Bind the parameters of `data` to `args` and run its body. `fun` is
    /// the function object reported in arity errors.
    pub(crate) fn funcall_lambda(
        &mut self,
        fun: &Value,
        data: &LambdaData,
        args: Vec<Value>,
    ) -> EvalResult {
        let count = self.specpdl_depth();
        let saved = self.lexenv.clone();
        let result = match self.bind_parameters(fun, data, args) {
            Ok(lexenv) => {
                self.lexenv = lexenv;
                self.sf_progn(&data.body)
            }
            Err(flow) => Err(flow),
        };
        self.lexenv = saved;
        self.unbind_to_with(count, result)
    }

    /// Bind `data`'s formals to `args`. A closure binds them lexically on
    /// top of its captured environment, which is returned; a dynamic lambda
    /// binds them with `specbind` and gets an empty environment.
    pub fn bind_parameters(
        &mut self,
        fun: &Value,
        data: &LambdaData,
        args: Vec<Value>,
    ) -> Result<Value, Flow> {
        let params = &data.params;
        let nargs = args.len();
        if nargs < params.min_arity() || params.max_arity().is_some_and(|max| nargs > max) {
            return Err(wrong_number_of_arguments(fun.clone(), nargs));
        }
        let mut lexenv = data.env.clone().filter(Value::is_truthy).unwrap_or(Value::Nil);
        let lexical = lexenv.is_truthy();

        let mut actuals = args.into_iter();
        let mut bindings = Vec::with_capacity(params.required.len() + params.optional.len() + 1);
        for sym in params.required.iter().chain(&params.optional) {
            bindings.push((*sym, actuals.next().unwrap_or(Value::Nil)));
        }
        if let Some(rest) = params.rest {
            bindings.push((rest, Value::list(actuals.collect())));
        }
        for (sym, value) in bindings {
            if lexical {
                lexenv = Value::cons(Value::cons(Value::from_sym(sym), value), lexenv);
            } else {
                self.specbind(sym, value)?;
            }
        }
        Ok(lexenv)
    }

    /// Build a function from `(ARGS [DOC] BODY...)`, closing over the
    /// current lexical environment when there is one.
    fn make_closure(&mut self, tail: &[Expr]) -> EvalResult {
        let env = self.lexenv.is_truthy().then(|| self.lexenv.clone());
        make_lambda_data(tail, env).map(Value::make_lambda)
    }

    /// One step of macro expansion; `form` comes back unchanged when its
    /// head is not a macro.
    pub fn macroexpand_1(&mut self, form: &Value) -> EvalResult {
        let head = form.car();
        if !form.is_cons() || !head.is_symbol() {
            return Ok(form.clone());
        }
        let Some(args) = list_to_vec(&form.cdr()) else {
            return Ok(form.clone());
        };
        let mut fun = match self.indirect_function(&head) {
            Ok(fun) => fun,
            Err(_) => return Ok(form.clone()),
        };
        if fun.car().is_symbol_named("autoload") {
            fun = self.autoload_do_load(fun, head.clone(), Value::symbol("macro"))?;
        }
        match &fun {
            Value::Macro(data) => {
                let data = Rc::clone(data);
                self.funcall_lambda(&fun, &data, args)
            }
            Value::Cons(_) if fun.car().is_symbol_named("macro") => self.funcall(fun.cdr(), args),
            _ => Ok(form.clone()),
        }
    }

    /// Expand `form` until its head is no longer a macro.
    pub fn macroexpand(&mut self, form: &Value) -> EvalResult {
        let mut form = form.clone();
        loop {
            let expanded = self.macroexpand_1(&form)?;
            if eq_value(&expanded, &form) {
                return Ok(form);
            }
            form = expanded;
        }
    }

    // -----------------------------------------------------------------------
    // Special forms
    // -----------------------------------------------------------------------

    fn special_form(&mut self, name: SymId, tail: &[Expr]) -> EvalResult {
        let name_str = resolve_sym(name);
        if let Some((_, min, max)) = SPECIAL_FORMS.iter().find(|(n, ..)| *n == name_str) {
            if tail.len() < *min || max.is_some_and(|max| tail.len() > max) {
                return Err(wrong_number_of_arguments(Value::from_sym(name), tail.len()));
            }
        }
        match name_str {
            "quote" => Ok(quote_to_value(&tail[0])),
            "function" => self.sf_function(&tail[0]),
            "lambda" => self.make_closure(tail),
            "let" => self.sf_let(tail),
            "let*" => self.sf_let_star(tail),
            "setq" => self.sf_setq(tail),
            "if" => {
                if self.eval(&tail[0])?.is_truthy() {
                    self.eval(&tail[1])
                } else {
                    self.sf_progn(&tail[2..])
                }
            }
            "and" => {
                let mut value = Value::True;
                for form in tail {
                    value = self.eval(form)?;
                    if value.is_nil() {
                        break;
                    }
                }
                Ok(value)
            }
            "or" => {
                for form in tail {
                    let value = self.eval(form)?;
                    if value.is_truthy() {
                        return Ok(value);
                    }
                }
                Ok(Value::Nil)
            }
            "cond" => self.sf_cond(tail),
            "while" => {
                while self.eval(&tail[0])?.is_truthy() {
                    self.maybe_quit()?;
                    self.sf_progn(&tail[1..])?;
                }
                Ok(Value::Nil)
            }
            "progn" => self.sf_progn(tail),
            "prog1" => {
                let value = self.eval(&tail[0])?;
                self.sf_progn(&tail[1..])?;
                Ok(value)
            }
            "prog2" => {
                self.eval(&tail[0])?;
                let value = self.eval(&tail[1])?;
                self.sf_progn(&tail[2..])?;
                Ok(value)
            }
            "when" => {
                if self.eval(&tail[0])?.is_truthy() {
                    self.sf_progn(&tail[1..])
                } else {
                    Ok(Value::Nil)
                }
            }
            "unless" => {
                if self.eval(&tail[0])?.is_truthy() {
                    Ok(Value::Nil)
                } else {
                    self.sf_progn(&tail[1..])
                }
            }
            "defun" => self.sf_defun(tail, false),
            "defmacro" => self.sf_defun(tail, true),
            "defvar" => self.sf_defvar(tail),
            "defconst" => self.sf_defconst(tail),
            "defvar-local" => {
                let sym = self.sf_defvar(tail)?;
                self.make_variable_buffer_local(expr_symbol(&tail[0])?)?;
                Ok(sym)
            }
            "setq-default" => self.sf_setq_with(tail, |ev, sym, value| {
                ev.set_default(sym, Some(value))
            }),
            "setq-local" => self.sf_setq_with(tail, |ev, sym, value| {
                ev.make_local_variable(sym)?;
                ev.set(sym, value)
            }),
            "catch" => self.sf_catch(tail),
            "unwind-protect" => self.sf_unwind_protect(tail),
            "condition-case" => self.sf_condition_case(tail),
            "save-current-buffer" => {
                let count = self.specpdl_depth();
                self.record_unwind_current_buffer()?;
                let result = self.sf_progn(tail);
                self.unbind_to_with(count, result)
            }
            "with-current-buffer" => {
                let buffer = self.eval(&tail[0])?;
                let count = self.specpdl_depth();
                self.record_unwind_current_buffer()?;
                let result = match self.set_buffer(&buffer) {
                    Ok(_) => self.sf_progn(&tail[1..]),
                    Err(flow) => Err(flow),
                };
                self.unbind_to_with(count, result)
            }
            "interactive" | "declare" => Ok(Value::Nil),
            "`" => self.backquote(&tail[0], 1),
            "dolist" => self.sf_dolist(tail),
            "dotimes" => self.sf_dotimes(tail),
            "ignore-errors" => self.internal_condition_case(
                Value::list(vec![Value::symbol("error")]),
                |ev| ev.sf_progn(tail),
                |_, _| Ok(Value::Nil),
            ),
            _ => Err(signal("invalid-function", vec![Value::from_sym(name)])),
        }
    }

    pub(crate) fn sf_progn(&mut self, forms: &[Expr]) -> EvalResult {
        let mut value = Value::Nil;
        for form in forms {
            value = self.eval(form)?;
        }
        Ok(value)
    }

    fn sf_function(&mut self, arg: &Expr) -> EvalResult {
        match arg {
            Expr::List(items) if items.first().is_some_and(|h| h.is_symbol_named("lambda")) => {
                self.make_closure(&items[1..])
            }
            other => Ok(quote_to_value(other)),
        }
    }

    fn sf_cond(&mut self, clauses: &[Expr]) -> EvalResult {
        for clause in clauses {
            let items: &[Expr] = match clause {
                Expr::List(items) => items,
                Expr::Symbol(id) if resolve_sym(*id) == "nil" => continue,
                other => return Err(wrong_type("listp", quote_to_value(other))),
            };
            let Some((test, body)) = items.split_first() else {
                continue;
            };
            let value = self.eval(test)?;
            if value.is_truthy() {
                return if body.is_empty() {
                    Ok(value)
                } else {
                    self.sf_progn(body)
                };
            }
        }
        Ok(Value::Nil)
    }

    /// Whether `let` would bind `symbol` lexically here: a lexical
    /// environment is active and the variable is neither special nor
    /// declared locally special by `(defvar SYMBOL)`.
    fn binds_lexically(&self, symbol: SymId) -> bool {
        self.lexenv.is_truthy()
            && !self.obarray.is_special(symbol)
            && memq(&Value::from_sym(symbol), &self.lexenv).is_nil()
    }

    /// The entries of a `let` varlist.
    fn let_varlist<'a>(&self, spec: &'a Expr) -> Result<&'a [Expr], Flow> {
        match spec {
            Expr::List(entries) => Ok(entries),
            Expr::Symbol(id) if resolve_sym(*id) == "nil" => Ok(&[]),
            Expr::DottedList(_, last) => Err(wrong_type("listp", quote_to_value(last))),
            other => Err(wrong_type("listp", quote_to_value(other))),
        }
    }

    /// Evaluate one `let` entry: `VAR`, `(VAR)` or `(VAR VALUE)`.
    fn let_entry(&mut self, entry: &Expr) -> Result<(SymId, Value), Flow> {
        match entry {
            Expr::Symbol(id) => Ok((*id, Value::Nil)),
            Expr::List(items) => match items.as_slice() {
                [] => Ok((intern("nil"), Value::Nil)),
                [var] => Ok((expr_symbol(var)?, Value::Nil)),
                [var, form] => {
                    let sym = expr_symbol(var)?;
                    Ok((sym, self.eval(form)?))
                }
                _ => Err(self.signal_error(
                    "`let' bindings can have only one value-form",
                    quote_to_value(entry),
                )),
            },
            other => Err(wrong_type("listp", quote_to_value(other))),
        }
    }

    fn sf_let(&mut self, tail: &[Expr]) -> EvalResult {
        let (spec, body) = (&tail[0], &tail[1..]);
        let entries = self.let_varlist(spec)?;
        let mut bindings = Vec::with_capacity(entries.len());
        for entry in entries {
            bindings.push(self.let_entry(entry)?);
        }

        let count = self.specpdl_depth();
        let saved = self.lexenv.clone();
        let mut lexenv = saved.clone();
        let mut bound = Ok(());
        for (sym, value) in bindings {
            if self.binds_lexically(sym) {
                lexenv = Value::cons(Value::cons(Value::from_sym(sym), value), lexenv);
            } else if let Err(flow) = self.specbind(sym, value) {
                bound = Err(flow);
                break;
            }
        }
        let result = match bound {
            Ok(()) => {
                self.lexenv = lexenv;
                self.sf_progn(body)
            }
            Err(flow) => Err(flow),
        };
        self.lexenv = saved;
        self.unbind_to_with(count, result)
    }

    fn sf_let_star(&mut self, tail: &[Expr]) -> EvalResult {
        let (spec, body) = (&tail[0], &tail[1..]);
        let entries = self.let_varlist(spec)?;
        let count = self.specpdl_depth();
        let saved = self.lexenv.clone();
        let result = self.let_star_bind(entries).and_then(|()| self.sf_progn(body));
        self.lexenv = saved;
        self.unbind_to_with(count, result)
    }

    fn let_star_bind(&mut self, entries: &[Expr]) -> Result<(), Flow> {
        for entry in entries {
            let (sym, value) = self.let_entry(entry)?;
            if self.binds_lexically(sym) {
                self.lexenv = Value::cons(
                    Value::cons(Value::from_sym(sym), value),
                    self.lexenv.clone(),
                );
            } else {
                self.specbind(sym, value)?;
            }
        }
        Ok(())
    }

    fn sf_setq(&mut self, tail: &[Expr]) -> EvalResult {
        self.sf_setq_with(tail, |ev, sym, value| {
            if ev.lexenv.is_truthy() {
                let binding = assq(&Value::from_sym(sym), &ev.lexenv);
                if binding.set_cdr(value.clone()) {
                    return Ok(());
                }
            }
            ev.set(sym, value)
        })
    }

    /// Shared loop of the `setq` family: evaluate each VALUE and store it
    /// with `store`. Returns the last value.
    fn sf_setq_with<F>(&mut self, tail: &[Expr], store: F) -> EvalResult
    where
        F: Fn(&mut Self, SymId, Value) -> Result<(), Flow>,
    {
        if tail.len() % 2 != 0 {
            return Err(wrong_number_of_arguments(Value::symbol("setq"), tail.len()));
        }
        let mut value = Value::Nil;
        for pair in tail.chunks(2) {
            let sym = expr_symbol(&pair[0])?;
            value = self.eval(&pair[1])?;
            store(self, sym, value.clone())?;
        }
        Ok(value)
    }

    fn sf_defun(&mut self, tail: &[Expr], is_macro: bool) -> EvalResult {
        let sym = expr_symbol(&tail[0])?;
        let env = self.lexenv.is_truthy().then(|| self.lexenv.clone());
        let data = make_lambda_data(&tail[1..], env)?;
        let definition = if is_macro {
            Value::make_macro(data)
        } else {
            Value::make_lambda(data)
        };
        self.defalias(sym, definition)?;
        Ok(Value::from_sym(sym))
    }

    fn sf_defvar(&mut self, tail: &[Expr]) -> EvalResult {
        let sym = expr_symbol(&tail[0])?;
        let Some(init) = tail.get(1) else {
            // Declares the variable special for the rest of this scope only.
            if self.lexenv.is_truthy() && !self.obarray.is_special(sym) {
                self.lexenv = Value::cons(Value::from_sym(sym), self.lexenv.clone());
            }
            return Ok(Value::from_sym(sym));
        };
        self.obarray.set_special(sym, true);
        if self.default_value(sym)?.is_none() {
            let value = self.eval(init)?;
            self.set_default(sym, Some(value))?;
        } else if self.let_shadows_void_default(sym) {
            let value = self.eval(init)?;
            self.set_default_toplevel_value(sym, value)?;
        }
        self.put_variable_documentation(sym, tail.get(2));
        Ok(Value::from_sym(sym))
    }

    fn sf_defconst(&mut self, tail: &[Expr]) -> EvalResult {
        let sym = expr_symbol(&tail[0])?;
        let value = self.eval(&tail[1])?;
        self.set_default(sym, Some(value))?;
        self.obarray.set_special(sym, true);
        self.put_variable_documentation(sym, tail.get(2));
        self.obarray
            .put_property(sym, intern("risky-local-variable"), Value::True);
        Ok(Value::from_sym(sym))
    }

    fn put_variable_documentation(&mut self, sym: SymId, doc: Option<&Expr>) {
        if let Some(Expr::Str(doc)) = doc {
            self.obarray.put_property(
                sym,
                intern("variable-documentation"),
                Value::string(doc.clone()),
            );
        }
    }

    /// Run `body` with `var` bound to `value` the way `let` binds it.
    fn with_binding(&mut self, var: SymId, value: Value, body: &[Expr]) -> EvalResult {
        let count = self.specpdl_depth();
        let saved = self.lexenv.clone();
        let result = if self.binds_lexically(var) {
            self.lexenv = Value::cons(Value::cons(Value::from_sym(var), value), saved.clone());
            self.sf_progn(body)
        } else {
            match self.specbind(var, value) {
                Ok(()) => self.sf_progn(body),
                Err(flow) => Err(flow),
            }
        };
        self.lexenv = saved;
        self.unbind_to_with(count, result)
    }

    /// The `(VAR FORM [RESULT])` head of `dolist` and `dotimes`.
    fn loop_spec<'a>(&self, name: &str, spec: &'a Expr) -> Result<(SymId, &'a Expr, Option<&'a Expr>), Flow> {
        let Expr::List(items) = spec else {
            return Err(wrong_type("listp", quote_to_value(spec)));
        };
        match items.as_slice() {
            [var, form] => Ok((expr_symbol(var)?, form, None)),
            [var, form, result] => Ok((expr_symbol(var)?, form, Some(result))),
            _ => Err(wrong_number_of_arguments(Value::symbol(name), items.len())),
        }
    }

    fn sf_dolist(&mut self, tail: &[Expr]) -> EvalResult {
        let (var, list_form, result) = self.loop_spec("dolist", &tail[0])?;
        let body = &tail[1..];
        let mut rest = self.eval(list_form)?;
        while rest.is_cons() {
            self.with_binding(var, rest.car(), body)?;
            rest = rest.cdr();
        }
        match result {
            Some(form) => self.with_binding(var, Value::Nil, std::slice::from_ref(form)),
            None => Ok(Value::Nil),
        }
    }

    fn sf_dotimes(&mut self, tail: &[Expr]) -> EvalResult {
        let (var, count_form, result) = self.loop_spec("dotimes", &tail[0])?;
        let body = &tail[1..];
        let count = self.eval(count_form)?;
        let Some(n) = count.as_int() else {
            return Err(wrong_type("integerp", count));
        };
        for i in 0..n {
            self.with_binding(var, Value::Int(i), body)?;
        }
        match result {
            Some(form) => self.with_binding(var, Value::Int(n.max(0)), std::slice::from_ref(form)),
            None => Ok(Value::Nil),
        }
    }

    // -----------------------------------------------------------------------
    // Backquote
    // -----------------------------------------------------------------------

    fn backquote(&mut self, template: &Expr, depth: usize) -> EvalResult {
        match template {
            Expr::List(items) => {
                if let [Expr::Symbol(head), arg] = items.as_slice() {
                    match resolve_sym(*head) {
                        "," | ",@" if depth == 1 => return self.eval(arg),
                        "," | ",@" => {
                            let inner = self.backquote(arg, depth - 1)?;
                            return Ok(Value::list(vec![Value::from_sym(*head), inner]));
                        }
                        "`" => {
                            let inner = self.backquote(arg, depth + 1)?;
                            return Ok(Value::list(vec![Value::from_sym(*head), inner]));
                        }
                        _ => {}
                    }
                }
                self.backquote_list(items, None, depth)
            }
            Expr::DottedList(items, last) => self.backquote_list(items, Some(last), depth),
            other => Ok(quote_to_value(other)),
        }
    }

    fn backquote_list(&mut self, items: &[Expr], last: Option<&Expr>, depth: usize) -> EvalResult {
        let mut out = Vec::with_capacity(items.len());
        let mut tail = None;
        let mut i = 0;
        while i < items.len() {
            let item = &items[i];
            // `(a . ,b)` reads as `(a \, b)`.
            if depth == 1 && last.is_none() && i + 2 == items.len() && item.is_symbol_named(",") {
                tail = Some(self.eval(&items[i + 1])?);
                break;
            }
            if let Expr::List(inner) = item {
                if let [Expr::Symbol(head), arg] = inner.as_slice() {
                    if depth == 1 && resolve_sym(*head) == ",@" {
                        let spliced = self.eval(arg)?;
                        let Some(values) = list_to_vec(&spliced) else {
                            return Err(wrong_type("listp", spliced));
                        };
                        out.extend(values);
                        i += 1;
                        continue;
                    }
                }
            }
            out.push(self.backquote(item, depth)?);
            i += 1;
        }
        let tail = match (tail, last) {
            (Some(tail), _) => tail,
            (None, Some(last)) => self.backquote(last, depth)?,
            (None, None) => Value::Nil,
        };
        Ok(Value::list_with_tail(out, tail))
    }
}

// ---------------------------------------------------------------------------
// Lambda lists
// ---------------------------------------------------------------------------

fn invalid_lambda(tail: &[Expr]) -> Flow {
    let form = Value::cons(
        Value::symbol("lambda"),
        Value::list(tail.iter().map(quote_to_value).collect()),
    );
    signal("invalid-function", vec![form])
}

fn parse_lambda_params(spec: &Expr, tail: &[Expr]) -> Result<LambdaParams, Flow> {
    let items: &[Expr] = match spec {
        Expr::Symbol(id) if resolve_sym(*id) == "nil" => &[],
        Expr::List(items) => items,
        _ => return Err(invalid_lambda(tail)),
    };
    let mut params = LambdaParams::default();
    let mut optional = false;
    let mut iter = items.iter();
    while let Some(item) = iter.next() {
        let Expr::Symbol(id) = item else {
            return Err(invalid_lambda(tail));
        };
        match resolve_sym(*id) {
            "&optional" => optional = true,
            "&rest" => {
                let (Some(Expr::Symbol(rest)), None) = (iter.next(), iter.next()) else {
                    return Err(invalid_lambda(tail));
                };
                params.rest = Some(*rest);
            }
            _ if optional => params.optional.push(*id),
            _ => params.required.push(*id),
        }
    }
    Ok(params)
}

/// Parse `(ARGS [DOCSTRING] BODY...)`. A string is a docstring only when
/// more body forms follow it.
pub(crate) fn make_lambda_data(tail: &[Expr], env: Option<Value>) -> Result<LambdaData, Flow> {
    let Some((spec, body)) = tail.split_first() else {
        return Ok(LambdaData {
            params: LambdaParams::default(),
            body: Vec::new(),
            env,
            docstring: None,
        });
    };
    let params = parse_lambda_params(spec, tail)?;
    let (docstring, body) = match body {
        [Expr::Str(doc), rest @ ..] if !rest.is_empty() => (Some(doc.clone()), rest),
        _ => (None, body),
    };
    Ok(LambdaData {
        params,
        body: body.to_vec(),
        env,
        docstring,
    })
}

/// A dynamic lambda from the list `(lambda ARGS . BODY)`.
fn lambda_from_list(form: &Value) -> Result<LambdaData, Flow> {
    let Some(items) = list_to_vec(form) else {
        return Err(signal("invalid-function", vec![form.clone()]));
    };
    let tail: Vec<Expr> = items[1..].iter().map(value_to_expr).collect();
    make_lambda_data(&tail, None)
}

fn expr_symbol(expr: &Expr) -> Result<SymId, Flow> {
    match expr {
        Expr::Symbol(id) | Expr::Keyword(id) => Ok(*id),
        other => Err(wrong_type("symbolp", quote_to_value(other))),
    }
}

fn install_standard_errors(obarray: &mut Obarray) {
    for (name, message, parents) in STANDARD_ERRORS {
        let sym = intern(name);
        let mut conditions = vec![Value::symbol(name)];
        conditions.extend(parents.iter().map(Value::symbol));
        if !matches!(*name, "error" | "quit") {
            conditions.push(Value::symbol("error"));
        }
        obarray.put_property(sym, intern("error-conditions"), Value::list(conditions));
        obarray.put_property(sym, intern("error-message"), Value::string(*message));
    }
}

// ---------------------------------------------------------------------------
// Expr <-> Value
// ---------------------------------------------------------------------------

/// The value a quoted form denotes.
pub fn quote_to_value(expr: &Expr) -> Value {
    match expr {
        Expr::Int(v) => Value::Int(*v),
        Expr::Float(v) => Value::Float(*v),
        Expr::Str(s) => Value::string(s.clone()),
        Expr::Symbol(id) | Expr::Keyword(id) => Value::from_sym(*id),
        Expr::List(items) => Value::list(items.iter().map(quote_to_value).collect()),
        Expr::DottedList(items, last) => Value::list_with_tail(
            items.iter().map(quote_to_value).collect(),
            quote_to_value(last),
        ),
        Expr::Opaque(value) => value.clone(),
    }
}

/// The form a value denotes when evaluated. Objects without read syntax
/// are carried through as [`Expr::Opaque`].
pub(crate) fn value_to_expr(value: &Value) -> Expr {
    match value {
        Value::Nil => Expr::Symbol(intern("nil")),
        Value::True => Expr::Symbol(intern("t")),
        Value::Int(n) => Expr::Int(*n),
        Value::Float(f) => Expr::Float(*f),
        Value::Symbol(id) => Expr::Symbol(*id),
        Value::Keyword(id) => Expr::Keyword(*id),
        Value::Str(s) => Expr::Str(s.to_string()),
        Value::Cons(_) => {
            let mut items = Vec::new();
            let mut cursor = value.clone();
            while let Value::Cons(cell) = &cursor {
                let next = {
                    let cell = cell.borrow();
                    items.push(value_to_expr(&cell.car));
                    cell.cdr.clone()
                };
                cursor = next;
            }
            if cursor.is_nil() {
                Expr::List(items)
            } else {
                Expr::DottedList(items, Box::new(value_to_expr(&cursor)))
            }
        }
        other => Expr::Opaque(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elisp::tests_support::{eval_all, eval_lexical, eval_one, eval_with};

    #[test]
    fn basic_arithmetic_and_special_forms() {
        let results = eval_all(
            "(+ 1 2)
             (if nil 1 2 3)
             (and 1 2)
             (or nil 'x)
             (cond ((eq 1 2) 'no) ((+ 1 1)))
             (prog1 'first 'second)
             (prog2 'a 'b 'c)
             (when t 'yes)
             (unless t 'no)",
        );
        assert_eq!(
            results,
            vec![
                "OK 3", "OK 3", "OK 2", "OK x", "OK 2", "OK first", "OK b", "OK yes", "OK nil"
            ]
        );
    }

    #[test]
    fn special_form_arity_is_checked() {
        assert_eq!(eval_one("(if)"), "ERR (wrong-number-of-arguments if 0)");
        assert_eq!(eval_one("(quote a b)"), "ERR (wrong-number-of-arguments quote 2)");
        assert_eq!(eval_one("(setq a)"), "ERR (wrong-number-of-arguments setq 1)");
    }

    #[test]
    fn dynamic_let_is_visible_to_callees() {
        let results = eval_all(
            "(setq x 'global)
             (defun get-x () x)
             (let ((x 'dynamic)) (get-x))
             (get-x)",
        );
        assert_eq!(results[2], "OK dynamic");
        assert_eq!(results[3], "OK global");
    }

    #[test]
    fn lexical_let_is_invisible_to_callees() {
        let results = eval_lexical(
            "(defun y-bound-p () (boundp 'y))
             (let ((y 1)) (list y (y-bound-p)))
             (defvar z 'special)
             (defun get-z () z)
             (let ((z 'rebound)) (get-z))",
        );
        assert_eq!(results[1], "OK (1 nil)");
        assert_eq!(results[4], "OK rebound");
    }

    #[test]
    fn closures_share_captured_bindings() {
        let results = eval_lexical(
            "(defun make-counter () (let ((n 0)) (lambda () (setq n (1+ n)))))
             (setq counter (make-counter))
             (funcall counter)
             (funcall counter)
             (funcall (make-counter))",
        );
        assert_eq!(results[2], "OK 1");
        assert_eq!(results[3], "OK 2");
        assert_eq!(results[4], "OK 1");
    }

    #[test]
    fn local_defvar_makes_let_dynamic_in_scope() {
        let results = eval_lexical(
            "(defun peek () (and (boundp 'scoped) scoped))
             (let ((scoped 'lexical)) (peek))
             (let () (defvar scoped) (let ((scoped 'dynamic)) (peek)))
             (special-variable-p 'scoped)",
        );
        assert_eq!(results[1], "OK nil");
        assert_eq!(results[2], "OK dynamic");
        assert_eq!(results[3], "OK nil");
    }

    #[test]
    fn optional_and_rest_parameters() {
        let results = eval_all(
            "(defun params (a &optional b &rest c) (list a b c))
             (params 1)
             (params 1 2 3 4)
             (params)",
        );
        assert_eq!(results[1], "OK (1 nil nil)");
        assert_eq!(results[2], "OK (1 2 (3 4))");
        assert!(results[3].starts_with("ERR (wrong-number-of-arguments (lambda (a &optional b &rest c)"));
        assert!(results[3].ends_with(" 0)"));
    }

    #[test]
    fn parameters_bind_lexically_inside_closures() {
        let mut ev = Evaluator::new();
        let data = make_lambda_data(
            &crate::elisp::parser::parse_forms("(a &rest r) (list a r)").expect("parse"),
            Some(Value::list(vec![Value::True])),
        )
        .expect("lambda");
        let fun = Value::make_lambda(data.clone());
        let base = ev.specpdl_depth();
        let env = ev
            .bind_parameters(&fun, &data, vec![Value::Int(1), Value::Int(2), Value::Int(3)])
            .expect("bind");
        assert_eq!(ev.specpdl_depth(), base);
        assert_eq!(assq(&Value::symbol("a"), &env).cdr(), Value::Int(1));
        assert_eq!(
            assq(&Value::symbol("r"), &env).cdr(),
            Value::list(vec![Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn calling_non_functions_fails() {
        assert_eq!(eval_one("(funcall 'if t 1 2)"), "ERR (invalid-function if)");
        assert_eq!(eval_one("(no-such-fn 1)"), "ERR (void-function no-such-fn)");
        assert_eq!(eval_one("(1 2)"), "ERR (invalid-function 1)");
        assert_eq!(eval_one("((lambda (x) (* x 2)) 21)"), "OK 42");
        assert_eq!(eval_one("(funcall '(lambda (x) (list x)) 7)"), "OK (7)");
    }

    #[test]
    fn macros_expand_before_evaluation() {
        let results = eval_all(
            "(defmacro my-inc (var) (list 'setq var (list '1+ var)))
             (setq counter 1)
             (my-inc counter)
             counter
             (macroexpand '(my-inc counter))
             (macroexpand-1 '(car x))",
        );
        assert_eq!(results[2], "OK 2");
        assert_eq!(results[3], "OK 2");
        assert_eq!(results[4], "OK (setq counter (1+ counter))");
        assert_eq!(results[5], "OK (car x)");
    }

    #[test]
    fn backquote_splices_and_unquotes() {
        let results = eval_all(
            "(setq xs '(2 3))
             `(1 ,@xs ,(+ 1 3))
             `(a . ,(car xs))
             `(nested (x ,(car xs)) end)",
        );
        assert_eq!(results[1], "OK (1 2 3 4)");
        assert_eq!(results[2], "OK (a . 2)");
        assert_eq!(results[3], "OK (nested (x 2) end)");
    }

    #[test]
    fn loops_bind_their_variable() {
        let results = eval_all(
            "(let ((sum 0)) (dolist (x '(1 2 3) sum) (setq sum (+ sum x))))
             (let ((acc nil)) (dotimes (i 3 acc) (setq acc (cons i acc))))
             (boundp 'i)",
        );
        assert_eq!(results, vec!["OK 6", "OK (2 1 0)", "OK nil"]);
    }

    #[test]
    fn let_rejects_extra_value_forms() {
        assert_eq!(
            eval_one("(let ((a 1 2)) a)"),
            "ERR (error \"`let' bindings can have only one value-form\" a 1 2)"
        );
    }

    #[test]
    fn let_star_sees_earlier_bindings() {
        assert_eq!(eval_one("(let* ((a 1) (b (+ a 1))) (list a b))"), "OK (1 2)");
        assert_eq!(
            eval_lexical("(let* ((a 1) (f (lambda () a))) (funcall f))")[0],
            "OK 1"
        );
    }

    #[test]
    fn defvar_sets_only_void_defaults() {
        let results = eval_all(
            "(defvar dv 1 \"A variable.\")
             (defvar dv 2)
             dv
             (defconst dc 1)
             (defconst dc 2)
             dc
             (list (special-variable-p 'dv) (special-variable-p 'dc))
             (get 'dv 'variable-documentation)",
        );
        assert_eq!(results[0], "OK dv");
        assert_eq!(results[2], "OK 1");
        assert_eq!(results[5], "OK 2");
        assert_eq!(results[6], "OK (t t)");
        assert_eq!(results[7], "OK \"A variable.\"");
    }

    #[test]
    fn defvar_under_let_sets_the_toplevel_value() {
        let results = eval_all(
            "(let ((late 'bound)) (defvar late 'initial) late)
             late",
        );
        assert_eq!(results, vec!["OK bound", "OK initial"]);
    }

    #[test]
    fn runaway_recursion_is_catchable() {
        let results = eval_all(
            "(defun recurse (n) (recurse (1+ n)))
             (condition-case err (recurse 0) (excessive-lisp-nesting (car err)))
             (+ 1 1)",
        );
        assert_eq!(results[1], "OK excessive-lisp-nesting");
        assert_eq!(results[2], "OK 2");
    }

    #[test]
    fn runaway_recursion_is_catchable_on_a_default_thread_stack() {
        let results = std::thread::spawn(|| {
            let forms = crate::elisp::parser::parse_forms(
                "(setq max-lisp-eval-depth 1600)
                 (defun runaway (n) (runaway (1+ n)))
                 (condition-case e (runaway 0) (error (car e)))
                 (mapcar (lambda (x) (condition-case e (runaway x) (error (car e)))) '(0 1))",
            )
            .expect("source parses");
            let mut ev = Evaluator::new();
            ev.eval_forms(&forms)
                .iter()
                .map(format_eval_result)
                .collect::<Vec<_>>()
        })
        .join()
        .expect("evaluator thread survives deep recursion");
        assert_eq!(results[2], "OK excessive-lisp-nesting");
        assert_eq!(
            results[3],
            "OK (excessive-lisp-nesting excessive-lisp-nesting)"
        );
    }

    #[test]
    fn tiny_depth_ceiling_is_raised_to_floor() {
        let results = eval_with(
            |ev| ev.vars.max_lisp_eval_depth.set(5),
            "(defun nest (n) (if (> n 0) (nest (1- n)) 'bottom))
             (nest 20)
             max-lisp-eval-depth",
        );
        assert_eq!(results[1], "OK bottom");
        assert_eq!(results[2], "OK 100");
    }

    #[test]
    fn setq_local_and_defvar_local_make_buffer_bindings() {
        let results = eval_all(
            "(defvar-local per-buffer-mode 'off)
             (setq other (get-buffer-create \"other\"))
             (setq per-buffer-mode 'on)
             (with-current-buffer other per-buffer-mode)
             (setq plain-var 'global)
             (setq-local plain-var 'mine)
             (with-current-buffer other plain-var)
             (local-variable-p 'plain-var)",
        );
        assert_eq!(results[3], "OK off");
        assert_eq!(results[6], "OK global");
        assert_eq!(results[7], "OK t");
    }

    #[test]
    fn ignore_errors_returns_nil_on_error() {
        let results = eval_all(
            "(ignore-errors (car 1))
             (ignore-errors 1 2)
             (condition-case nil (ignore-errors (signal 'quit nil)) (quit 'quit-escaped))",
        );
        assert_eq!(results, vec!["OK nil", "OK 2", "OK quit-escaped"]);
    }

    #[test]
    fn eval_honors_the_lexical_argument() {
        let results = eval_all(
            "(eval '(let ((q 1)) (funcall (lambda () q))) t)
             (eval 'x-env '((x-env . 5)))
             (eval '(+ 1 2))",
        );
        assert_eq!(results, vec!["OK 1", "OK 5", "OK 3"]);
    }

    #[test]
    fn docstrings_need_a_following_body_form() {
        let mut ev = Evaluator::new();
        let forms = crate::elisp::parser::parse_forms("(() \"doc\" 1) (() \"only\")").expect("parse");
        let Expr::List(first) = &forms[0] else { panic!("list") };
        let Expr::List(second) = &forms[1] else { panic!("list") };
        let with_doc = make_lambda_data(first, None).expect("lambda");
        let without = make_lambda_data(second, None).expect("lambda");
        assert_eq!(with_doc.docstring.as_deref(), Some("doc"));
        assert_eq!(with_doc.body.len(), 1);
        assert!(without.docstring.is_none());
        assert_eq!(without.body.len(), 1);
        assert!(ev.eval_forms(&[]).is_empty());
    }
}
