use super::*;
use super::strings::format_string;
use crate::elisp::error::signal_value;

// ===========================================================================
// Signals and throws
// ===========================================================================

/// `(signal ERROR-SYMBOL DATA)`. A nil symbol is reserved for memory
/// exhaustion, so from Lisp it means the error object is DATA itself, and
/// `(signal nil nil)` is a plain `error`.
pub(crate) fn builtin_signal(_eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("signal", &args, 2)?;
    let (symbol, data) = match (&args[0], &args[1]) {
        (Value::Nil, Value::Nil) => (intern("error"), Value::Nil),
        (Value::Nil, object @ Value::Cons(_)) => (expect_symbol(&object.car())?, object.cdr()),
        (symbol, data) => (expect_symbol(symbol)?, data.clone()),
    };
    Err(signal_value(symbol, data))
}

/// `error` and `user-error`: format the message and signal it.
pub(crate) fn builtin_error(_eval: &mut Evaluator, name: &str, args: Vec<Value>) -> EvalResult {
    expect_min_args(name, &args, 1)?;
    let fmt = expect_string(&args[0])?;
    let message = format_string(&fmt, &args[1..])?;
    Err(signal(name, vec![Value::string(message)]))
}

pub(crate) fn builtin_throw(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("throw", &args, 2)?;
    let mut args = args.into_iter();
    let tag = args.next().unwrap_or(Value::Nil);
    let value = args.next().unwrap_or(Value::Nil);
    Err(eval.throw(tag, value))
}

pub(crate) fn builtin_error_message_string(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("error-message-string", &args, 1)?;
    let obj = &args[0];
    if !obj.is_list() {
        return Err(wrong_type("listp", obj.clone()));
    }
    Ok(Value::string(eval.error_message_string(obj)))
}

/// `(define-error NAME MESSAGE &optional PARENT)`
pub(crate) fn builtin_define_error(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("define-error", &args, 2, 3)?;
    let name = expect_symbol(&args[0])?;
    let parents = match arg_or_nil(&args, 2) {
        Value::Nil => vec![Value::symbol("error")],
        list @ Value::Cons(_) => expect_list(&list)?,
        single => vec![single],
    };
    let conditions_prop = intern("error-conditions");
    let mut conditions = vec![Value::from_sym(name)];
    for parent in parents {
        let parent_sym = expect_symbol(&parent)?;
        let inherited = eval.obarray.get_property(parent_sym, conditions_prop);
        if inherited.is_nil() {
            return Err(error_message_for_unknown(&parent));
        }
        for condition in std::iter::once(parent).chain(expect_list(&inherited)?) {
            if !conditions.iter().any(|c| eq_value(c, &condition)) {
                conditions.push(condition);
            }
        }
    }
    eval.obarray
        .put_property(name, conditions_prop, Value::list(conditions));
    if args[1].is_truthy() {
        eval.obarray
            .put_property(name, intern("error-message"), args[1].clone());
    }
    Ok(Value::Nil)
}

fn error_message_for_unknown(parent: &Value) -> Flow {
    let name = parent.as_symbol_name().unwrap_or_default();
    crate::elisp::error::error_message(format!("Unknown signal `{name}'"))
}

// ===========================================================================
// Calling and evaluating
// ===========================================================================

pub(crate) fn builtin_funcall(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("funcall", &args, 1)?;
    let mut args = args.into_iter();
    let function = args.next().unwrap_or(Value::Nil);
    eval.funcall(function, args.collect())
}

/// `(apply FUNCTION &rest ARGS)`: the last argument is a list spread onto
/// the others. With a single argument, it is `(FUNCTION . ARGS)`.
pub(crate) fn builtin_apply(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("apply", &args, 1)?;
    if args.len() == 1 {
        let call = &args[0];
        return eval.apply(call.car(), call.cdr());
    }
    let mut args = args;
    let spread = args.pop().unwrap_or(Value::Nil);
    let function = args.remove(0);
    args.extend(expect_list(&spread)?);
    eval.funcall(function, args)
}

pub(crate) fn builtin_eval(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("eval", &args, 1, 2)?;
    eval.eval_value(&args[0], &arg_or_nil(&args, 1))
}

pub(crate) fn builtin_macroexpand(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("macroexpand", &args, 1, 2)?;
    eval.macroexpand(&args[0])
}

pub(crate) fn builtin_macroexpand_1(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("macroexpand-1", &args, 1, 2)?;
    eval.macroexpand_1(&args[0])
}
