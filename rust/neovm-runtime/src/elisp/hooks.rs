//! Hook variables: running them and editing their function lists.
//!
//! A hook's value is a single function or a list of functions. In a
//! buffer-local hook list the element `t` stands for the functions of the
//! global (default) value, which run at that point.

use super::builtins::{arg_or_nil, expect_min_args, expect_range_args, expect_symbol};
use super::error::{signal, wrong_type, EvalResult, Flow};
use super::eval::Evaluator;
use super::intern::{resolve_sym, SymId};
use super::value::{equal_value, list_to_vec, memq, Value};

/// When a hook run stops early.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookCondition {
    /// Call every function; the result is nil.
    All,
    /// Stop at the first non-nil result and return it.
    UntilSuccess,
    /// Stop at the first nil result and return nil; otherwise `t`.
    UntilFailure,
}

/// A hook value that is one function rather than a list of them.
fn is_single_function(value: &Value) -> bool {
    !value.is_list() || value.car().is_symbol_named("lambda")
}

fn contains_t(value: &Value) -> bool {
    value.is_cons() && memq(&Value::True, value).is_truthy()
}

impl Evaluator {
    /// Call `call` on each function of `hook` in order, stopping as soon as
    /// it returns `Some`.
    fn for_each_hook_function<F>(&mut self, hook: SymId, mut call: F) -> Result<Option<Value>, Flow>
    where
        F: FnMut(&mut Self, Value) -> Result<Option<Value>, Flow>,
    {
        let value = match self.find_symbol_value(hook)? {
            Some(value) if value.is_truthy() => value,
            _ => return Ok(None),
        };
        if is_single_function(&value) {
            return call(self, value);
        }
        let mut tail = value;
        while tail.is_cons() {
            let function = tail.car();
            tail = tail.cdr();
            if !matches!(function, Value::True) {
                if let Some(stop) = call(self, function)? {
                    return Ok(Some(stop));
                }
                continue;
            }
            // `t`: the global functions go here.
            let Some(global) = self.default_value(hook)? else {
                return Err(signal("void-variable", vec![Value::from_sym(hook)]));
            };
            if global.is_nil() {
                continue;
            }
            if is_single_function(&global) {
                if let Some(stop) = call(self, global)? {
                    return Ok(Some(stop));
                }
                continue;
            }
            let mut global_tail = global;
            while global_tail.is_cons() {
                let function = global_tail.car();
                global_tail = global_tail.cdr();
                if matches!(function, Value::True) {
                    continue;
                }
                if let Some(stop) = call(self, function)? {
                    return Ok(Some(stop));
                }
            }
        }
        Ok(None)
    }

    /// Call the functions of `hook` with `args`.
    #[tracing::instrument(level = "trace", skip_all, fields(hook = %resolve_sym(hook), ?until))]
    pub fn run_hook_with_args(
        &mut self,
        hook: SymId,
        args: &[Value],
        until: HookCondition,
    ) -> EvalResult {
        let stopped = self.for_each_hook_function(hook, |ev, function| {
            let result = ev.funcall(function, args.to_vec())?;
            Ok(match until {
                HookCondition::All => None,
                HookCondition::UntilSuccess => result.is_truthy().then_some(result),
                HookCondition::UntilFailure => result.is_nil().then_some(Value::Nil),
            })
        })?;
        Ok(match (until, stopped) {
            (HookCondition::All, _) => Value::Nil,
            (_, Some(value)) => value,
            (HookCondition::UntilSuccess, None) => Value::Nil,
            (HookCondition::UntilFailure, None) => Value::True,
        })
    }

    /// Run a normal hook: every function, no arguments.
    pub fn run_hook(&mut self, hook: SymId) -> Result<(), Flow> {
        self.run_hook_with_args(hook, &[], HookCondition::All)
            .map(|_| ())
    }

    /// Call `wrapper` with each function of `hook` followed by `args`,
    /// stopping at the first non-nil result.
    pub fn run_hook_wrapped(&mut self, hook: SymId, wrapper: Value, args: &[Value]) -> EvalResult {
        let stopped = self.for_each_hook_function(hook, |ev, function| {
            let mut call_args = Vec::with_capacity(args.len() + 1);
            call_args.push(function);
            call_args.extend_from_slice(args);
            let result = ev.funcall(wrapper.clone(), call_args)?;
            Ok(result.is_truthy().then_some(result))
        })?;
        Ok(stopped.unwrap_or(Value::Nil))
    }

    // -----------------------------------------------------------------------
    // Editing hook lists
    // -----------------------------------------------------------------------

    fn ensure_hook_bound(&mut self, hook: SymId) -> Result<(), Flow> {
        if !self.boundp(hook)? {
            self.set(hook, Value::Nil)?;
        }
        if self.default_value(hook)?.is_none() {
            self.set_default(hook, Some(Value::Nil))?;
        }
        Ok(())
    }

    fn hook_value(&mut self, hook: SymId, local: bool) -> EvalResult {
        if local {
            self.symbol_value_of(hook)
        } else {
            Ok(self.default_value(hook)?.unwrap_or(Value::Nil))
        }
    }

    fn store_hook_value(&mut self, hook: SymId, local: bool, value: Value) -> Result<(), Flow> {
        if local {
            self.set(hook, value)
        } else {
            self.set_default(hook, Some(value))
        }
    }

    /// Add `function` to `hook` unless it is already there (by `equal`).
    /// A `local` addition makes the hook buffer-local with `t` standing
    /// for the global functions.
    pub fn add_hook(
        &mut self,
        hook: SymId,
        function: Value,
        append: bool,
        local: bool,
    ) -> Result<(), Flow> {
        self.ensure_hook_bound(hook)?;
        let mut local = local;
        if local {
            if !self.local_variable_if_set_p(hook, None)? {
                self.make_local_variable(hook)?;
                self.set(hook, Value::list(vec![Value::True]))?;
            }
        } else if !contains_t(&self.symbol_value_of(hook)?) {
            // Without a `t` marker the current binding is the whole hook.
            local = true;
        }
        let mut value = self.hook_value(hook, local)?;
        if is_single_function(&value) {
            value = Value::list(vec![value]);
        }
        let mut functions = list_to_vec(&value).ok_or_else(|| wrong_type("listp", value.clone()))?;
        if !functions.iter().any(|f| equal_value(f, &function, 0)) {
            if append {
                functions.push(function);
            } else {
                functions.insert(0, function);
            }
        }
        self.store_hook_value(hook, local, Value::list(functions))
    }

    /// Remove `function` from `hook`. A local hook left holding only `t`
    /// stops being local.
    pub fn remove_hook(&mut self, hook: SymId, function: &Value, local: bool) -> Result<(), Flow> {
        self.ensure_hook_bound(hook)?;
        let mut local = local && self.local_variable_if_set_p(hook, None)?;
        if !local && self.local_variable_p(hook, None)? && !contains_t(&self.symbol_value_of(hook)?) {
            local = true;
        }
        let value = self.hook_value(hook, local)?;
        let value = if is_single_function(&value) {
            if equal_value(&value, function, 0) {
                Value::Nil
            } else {
                value
            }
        } else {
            let remaining = list_to_vec(&value)
                .unwrap_or_default()
                .into_iter()
                .filter(|f| !equal_value(f, function, 0))
                .collect();
            Value::list(remaining)
        };
        let only_t = value.is_cons() && matches!(value.car(), Value::True) && value.cdr().is_nil();
        if local && only_t {
            self.kill_local_variable(hook)
        } else {
            self.store_hook_value(hook, local, value)
        }
    }
}

// ===========================================================================
// Builtins
// ===========================================================================

fn run_hook_builtin(
    eval: &mut Evaluator,
    name: &str,
    args: Vec<Value>,
    until: HookCondition,
) -> EvalResult {
    expect_min_args(name, &args, 1)?;
    let hook = expect_symbol(&args[0])?;
    eval.run_hook_with_args(hook, &args[1..], until)
}

pub(crate) fn builtin_run_hooks(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    for hook in &args {
        let hook = expect_symbol(hook)?;
        eval.run_hook(hook)?;
    }
    Ok(Value::Nil)
}

pub(crate) fn builtin_run_hook_with_args(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    run_hook_builtin(eval, "run-hook-with-args", args, HookCondition::All)
}

pub(crate) fn builtin_run_hook_with_args_until_success(
    eval: &mut Evaluator,
    args: Vec<Value>,
) -> EvalResult {
    run_hook_builtin(
        eval,
        "run-hook-with-args-until-success",
        args,
        HookCondition::UntilSuccess,
    )
}

pub(crate) fn builtin_run_hook_with_args_until_failure(
    eval: &mut Evaluator,
    args: Vec<Value>,
) -> EvalResult {
    run_hook_builtin(
        eval,
        "run-hook-with-args-until-failure",
        args,
        HookCondition::UntilFailure,
    )
}

/// `(run-hook-wrapped HOOK WRAP-FUNCTION &rest ARGS)`
pub(crate) fn builtin_run_hook_wrapped(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("run-hook-wrapped", &args, 2)?;
    let hook = expect_symbol(&args[0])?;
    eval.run_hook_wrapped(hook, args[1].clone(), &args[2..])
}

/// `(add-hook HOOK FUNCTION &optional DEPTH LOCAL)`. A positive or
/// non-numeric non-nil DEPTH appends.
pub(crate) fn builtin_add_hook(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("add-hook", &args, 2, 4)?;
    let hook = expect_symbol(&args[0])?;
    let append = match arg_or_nil(&args, 2) {
        Value::Nil => false,
        depth if depth.is_number() => depth.as_number_f64().is_some_and(|d| d > 0.0),
        _ => true,
    };
    eval.add_hook(hook, args[1].clone(), append, arg_or_nil(&args, 3).is_truthy())?;
    Ok(Value::Nil)
}

/// `(remove-hook HOOK FUNCTION &optional LOCAL)`
pub(crate) fn builtin_remove_hook(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("remove-hook", &args, 2, 3)?;
    let hook = expect_symbol(&args[0])?;
    eval.remove_hook(hook, &args[1], arg_or_nil(&args, 2).is_truthy())?;
    Ok(Value::Nil)
}
