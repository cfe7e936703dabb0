use super::*;
use crate::elisp::autoload::AutoloadUndo;

// ===========================================================================
// Function cells
// ===========================================================================

impl Evaluator {
    /// Store `definition` in `symbol`'s function cell; nil makes it void.
    /// While an autoload runs, the definition being replaced is recorded so
    /// an aborted load can put it back.
    pub fn fset(&mut self, symbol: SymId, definition: Value) -> Result<(), Flow> {
        if resolve_sym(symbol) == "nil" && definition.is_truthy() {
            return Err(signal("setting-constant", vec![Value::Nil]));
        }
        let old = self.obarray.symbol_function(symbol);
        if let Some(queue) = self.autoload_queue.as_mut() {
            if old.as_ref().is_some_and(Value::is_truthy) {
                queue.push(AutoloadUndo::Function { symbol, old });
            }
        }
        let definition = if definition.is_nil() { None } else { Some(definition) };
        self.obarray.set_symbol_function(symbol, definition);
        Ok(())
    }

    /// `defalias`: `fset` for definitions made by `defun` and friends.
    pub fn defalias(&mut self, symbol: SymId, definition: Value) -> Result<(), Flow> {
        tracing::trace!(symbol = resolve_sym(symbol), "defalias");
        self.fset(symbol, definition)
    }
}

pub(crate) fn builtin_fset(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("fset", &args, 2)?;
    let sym = expect_symbol(&args[0])?;
    eval.fset(sym, args[1].clone())?;
    Ok(args[1].clone())
}

pub(crate) fn builtin_defalias(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("defalias", &args, 2, 3)?;
    let sym = expect_symbol(&args[0])?;
    eval.defalias(sym, args[1].clone())?;
    if let Some(doc) = args.get(2).filter(|d| d.is_truthy()) {
        eval.obarray
            .put_property(sym, intern("function-documentation"), doc.clone());
    }
    Ok(args[0].clone())
}

pub(crate) fn builtin_fboundp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("fboundp", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    let bound = eval
        .obarray
        .symbol_function(sym)
        .is_some_and(|f| f.is_truthy());
    Ok(Value::bool(bound))
}

pub(crate) fn builtin_fmakunbound(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("fmakunbound", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    if resolve_sym(sym) == "nil" || resolve_sym(sym) == "t" {
        return Err(signal("setting-constant", vec![args[0].clone()]));
    }
    eval.obarray.set_symbol_function(sym, None);
    Ok(args[0].clone())
}

pub(crate) fn builtin_symbol_function(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("symbol-function", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    Ok(eval.obarray.symbol_function(sym).unwrap_or(Value::Nil))
}

pub(crate) fn builtin_indirect_function(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("indirect-function", &args, 1, 2)?;
    eval.indirect_function(&args[0])
}

// ===========================================================================
// Property lists
// ===========================================================================

pub(crate) fn builtin_get(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("get", &args, 2)?;
    let sym = expect_symbol(&args[0])?;
    let prop = expect_symbol(&args[1])?;
    Ok(eval.obarray.get_property(sym, prop))
}

pub(crate) fn builtin_put(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("put", &args, 3)?;
    let sym = expect_symbol(&args[0])?;
    let prop = expect_symbol(&args[1])?;
    eval.obarray.put_property(sym, prop, args[2].clone());
    Ok(args[2].clone())
}

pub(crate) fn builtin_symbol_plist(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("symbol-plist", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    Ok(eval.obarray.symbol_plist(sym))
}

// ===========================================================================
// Variables
// ===========================================================================

fn void_variable(sym: SymId) -> Flow {
    signal("void-variable", vec![Value::from_sym(sym)])
}

pub(crate) fn builtin_symbol_value(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("symbol-value", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    eval.symbol_value_of(sym)
}

pub(crate) fn builtin_set(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("set", &args, 2)?;
    let sym = expect_symbol(&args[0])?;
    eval.set(sym, args[1].clone())?;
    Ok(args[1].clone())
}

pub(crate) fn builtin_boundp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("boundp", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    Ok(Value::bool(eval.boundp(sym)?))
}

pub(crate) fn builtin_makunbound(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("makunbound", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    eval.makunbound(sym)?;
    Ok(args[0].clone())
}

pub(crate) fn builtin_default_value(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("default-value", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    eval.default_value(sym)?.ok_or_else(|| void_variable(sym))
}

pub(crate) fn builtin_default_boundp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("default-boundp", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    Ok(Value::bool(eval.default_value(sym)?.is_some()))
}

pub(crate) fn builtin_set_default(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("set-default", &args, 2)?;
    let sym = expect_symbol(&args[0])?;
    eval.set_default(sym, Some(args[1].clone()))?;
    Ok(args[1].clone())
}

pub(crate) fn builtin_make_variable_buffer_local(
    eval: &mut Evaluator,
    args: Vec<Value>,
) -> EvalResult {
    expect_args("make-variable-buffer-local", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    eval.make_variable_buffer_local(sym)?;
    Ok(args[0].clone())
}

pub(crate) fn builtin_make_local_variable(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("make-local-variable", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    eval.make_local_variable(sym)?;
    Ok(args[0].clone())
}

pub(crate) fn builtin_kill_local_variable(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("kill-local-variable", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    eval.kill_local_variable(sym)?;
    Ok(args[0].clone())
}

pub(crate) fn builtin_make_variable_frame_local(
    eval: &mut Evaluator,
    args: Vec<Value>,
) -> EvalResult {
    expect_args("make-variable-frame-local", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    eval.make_variable_frame_local(sym)?;
    Ok(args[0].clone())
}

pub(crate) fn builtin_local_variable_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("local-variable-p", &args, 1, 2)?;
    let sym = expect_symbol(&args[0])?;
    let buffer = eval.optional_buffer_arg(&arg_or_nil(&args, 1))?;
    Ok(Value::bool(eval.local_variable_p(sym, buffer)?))
}

pub(crate) fn builtin_local_variable_if_set_p(
    eval: &mut Evaluator,
    args: Vec<Value>,
) -> EvalResult {
    expect_range_args("local-variable-if-set-p", &args, 1, 2)?;
    let sym = expect_symbol(&args[0])?;
    let buffer = eval.optional_buffer_arg(&arg_or_nil(&args, 1))?;
    Ok(Value::bool(eval.local_variable_if_set_p(sym, buffer)?))
}

pub(crate) fn builtin_variable_binding_locus(
    eval: &mut Evaluator,
    args: Vec<Value>,
) -> EvalResult {
    expect_args("variable-binding-locus", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    eval.variable_binding_locus(sym)
}

pub(crate) fn builtin_buffer_local_value(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("buffer-local-value", &args, 2)?;
    let sym = expect_symbol(&args[0])?;
    let buffer = eval.buffer_arg(&args[1])?;
    eval.buffer_local_value(sym, buffer)
}

pub(crate) fn builtin_buffer_local_variables(
    eval: &mut Evaluator,
    args: Vec<Value>,
) -> EvalResult {
    expect_range_args("buffer-local-variables", &args, 0, 1)?;
    let buffer = eval
        .optional_buffer_arg(&arg_or_nil(&args, 0))?
        .unwrap_or_else(|| eval.buffers.current_id());
    eval.buffer_local_variables(buffer)
}

pub(crate) fn builtin_defvaralias(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("defvaralias", &args, 2, 3)?;
    let new_alias = expect_symbol(&args[0])?;
    let base = expect_symbol(&args[1])?;
    eval.defvaralias(new_alias, base, arg_or_nil(&args, 2))?;
    Ok(args[1].clone())
}

pub(crate) fn builtin_indirect_variable(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("indirect-variable", &args, 1)?;
    match args[0].as_symbol_id() {
        Some(sym) => Ok(Value::from_sym(eval.obarray.indirect_variable(sym)?)),
        None => Ok(args[0].clone()),
    }
}

pub(crate) fn builtin_special_variable_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("special-variable-p", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    Ok(Value::bool(eval.obarray.is_special(sym)))
}

pub(crate) fn builtin_default_toplevel_value(
    eval: &mut Evaluator,
    args: Vec<Value>,
) -> EvalResult {
    expect_args("default-toplevel-value", &args, 1)?;
    let sym = expect_symbol(&args[0])?;
    eval.default_toplevel_value(sym)
}

pub(crate) fn builtin_set_default_toplevel_value(
    eval: &mut Evaluator,
    args: Vec<Value>,
) -> EvalResult {
    expect_args("set-default-toplevel-value", &args, 2)?;
    let sym = expect_symbol(&args[0])?;
    eval.set_default_toplevel_value(sym, args[1].clone())?;
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use crate::elisp::tests_support::eval_all;

    #[test]
    fn function_cells() {
        let results = eval_all(
            "(fboundp 'car)
             (fboundp 'never-defined)
             (defalias 'my-car #'car \"Alias of car.\")
             (my-car '(9))
             (get 'my-car 'function-documentation)
             (fmakunbound 'my-car)
             (fboundp 'my-car)
             (fset nil 'car)",
        );
        assert_eq!(results[0], "OK t");
        assert_eq!(results[1], "OK nil");
        assert_eq!(results[2], "OK my-car");
        assert_eq!(results[3], "OK 9");
        assert_eq!(results[4], "OK \"Alias of car.\"");
        assert_eq!(results[6], "OK nil");
        assert_eq!(results[7], "ERR (setting-constant nil)");
    }

    #[test]
    fn plists_and_void_defaults() {
        let results = eval_all(
            "(put 'plist-sym 'color 'red)
             (symbol-plist 'plist-sym)
             (default-boundp 'never-set)
             (default-value 'never-set)
             (symbol-value 'never-set)",
        );
        assert_eq!(results[1], "OK (color red)");
        assert_eq!(results[2], "OK nil");
        assert_eq!(results[3], "ERR (void-variable never-set)");
        assert_eq!(results[4], "ERR (void-variable never-set)");
    }

    #[test]
    fn indirect_variable_follows_aliases() {
        let results = eval_all(
            "(defvaralias 'alias-front 'alias-back)
             (indirect-variable 'alias-front)
             (indirect-variable 5)
             (list (special-variable-p 'alias-front) (special-variable-p 'alias-back))",
        );
        assert_eq!(results[0], "OK alias-back");
        assert_eq!(results[1], "OK alias-back");
        assert_eq!(results[2], "OK 5");
        assert_eq!(results[3], "OK (t t)");
    }
}
