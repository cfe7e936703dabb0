use super::*;

// ===========================================================================
// Type predicates and equality
// ===========================================================================

fn predicate(name: &str, args: &[Value], test: fn(&Value) -> bool) -> EvalResult {
    expect_args(name, args, 1)?;
    Ok(Value::bool(test(&args[0])))
}

pub(crate) fn builtin_null(args: Vec<Value>) -> EvalResult {
    predicate("null", &args, Value::is_nil)
}

pub(crate) fn builtin_atom(args: Vec<Value>) -> EvalResult {
    predicate("atom", &args, |v| !v.is_cons())
}

pub(crate) fn builtin_consp(args: Vec<Value>) -> EvalResult {
    predicate("consp", &args, Value::is_cons)
}

pub(crate) fn builtin_listp(args: Vec<Value>) -> EvalResult {
    predicate("listp", &args, Value::is_list)
}

pub(crate) fn builtin_nlistp(args: Vec<Value>) -> EvalResult {
    predicate("nlistp", &args, |v| !v.is_list())
}

pub(crate) fn builtin_symbolp(args: Vec<Value>) -> EvalResult {
    predicate("symbolp", &args, Value::is_symbol)
}

pub(crate) fn builtin_keywordp(args: Vec<Value>) -> EvalResult {
    predicate("keywordp", &args, Value::is_keyword)
}

pub(crate) fn builtin_stringp(args: Vec<Value>) -> EvalResult {
    predicate("stringp", &args, Value::is_string)
}

pub(crate) fn builtin_integerp(args: Vec<Value>) -> EvalResult {
    predicate("integerp", &args, Value::is_integer)
}

pub(crate) fn builtin_numberp(args: Vec<Value>) -> EvalResult {
    predicate("numberp", &args, Value::is_number)
}

pub(crate) fn builtin_floatp(args: Vec<Value>) -> EvalResult {
    predicate("floatp", &args, |v| matches!(v, Value::Float(_)))
}

pub(crate) fn builtin_subrp(args: Vec<Value>) -> EvalResult {
    predicate("subrp", &args, |v| matches!(v, Value::Subr(_)))
}

pub(crate) fn builtin_bufferp(args: Vec<Value>) -> EvalResult {
    predicate("bufferp", &args, |v| matches!(v, Value::Buffer(_)))
}

pub(crate) fn builtin_framep(args: Vec<Value>) -> EvalResult {
    predicate("framep", &args, |v| matches!(v, Value::Frame(_)))
}

pub(crate) fn builtin_type_of(args: Vec<Value>) -> EvalResult {
    expect_args("type-of", &args, 1)?;
    Ok(Value::symbol(args[0].type_name()))
}

/// `functionp`: callable with `funcall`. Macros, special forms and
/// macro autoloads are not functions.
pub(crate) fn builtin_functionp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("functionp", &args, 1)?;
    let object = &args[0];
    let fun = if object.is_symbol() {
        if object.is_nil() {
            return Ok(Value::Nil);
        }
        eval.indirect_function(object)?
    } else {
        object.clone()
    };
    let callable = match &fun {
        Value::Subr(id) => !super::super::eval::is_special_form(*id),
        Value::Lambda(_) => true,
        Value::Cons(_) => {
            let head = fun.car();
            head.is_symbol_named("lambda")
                || head.is_symbol_named("closure")
                || (head.is_symbol_named("autoload") && {
                    let kind = fun.cdr().cdr().cdr().cdr().car();
                    kind.is_nil()
                })
        }
        _ => false,
    };
    Ok(Value::bool(callable))
}

pub(crate) fn builtin_eq(args: Vec<Value>) -> EvalResult {
    expect_args("eq", &args, 2)?;
    Ok(Value::bool(eq_value(&args[0], &args[1])))
}

/// `eql`: `eq`, except that floats compare by value.
pub(crate) fn builtin_eql(args: Vec<Value>) -> EvalResult {
    expect_args("eql", &args, 2)?;
    let same = match (&args[0], &args[1]) {
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        (a, b) => eq_value(a, b),
    };
    Ok(Value::bool(same))
}

pub(crate) fn builtin_equal(args: Vec<Value>) -> EvalResult {
    expect_args("equal", &args, 2)?;
    Ok(Value::bool(equal_value(&args[0], &args[1], 0)))
}
