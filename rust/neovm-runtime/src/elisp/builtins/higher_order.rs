use super::*;
use crate::elisp::print::princ_value;

// ===========================================================================
// Mapping over lists
// ===========================================================================

fn map_results(eval: &mut Evaluator, name: &str, args: &[Value]) -> Result<Vec<Value>, Flow> {
    let items = match &args[1] {
        Value::Str(s) => s.chars().map(|c| Value::Int(c as i64)).collect(),
        other => expect_list(other)?,
    };
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        results.push(eval.funcall(args[0].clone(), vec![item])?);
    }
    tracing::trace!(name, count = results.len(), "mapped");
    Ok(results)
}

pub(crate) fn builtin_mapcar(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("mapcar", &args, 2)?;
    Ok(Value::list(map_results(eval, "mapcar", &args)?))
}

/// `mapc`: call for side effects and return the list itself.
pub(crate) fn builtin_mapc(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("mapc", &args, 2)?;
    map_results(eval, "mapc", &args)?;
    Ok(args[1].clone())
}

pub(crate) fn builtin_mapconcat(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("mapconcat", &args, 2, 3)?;
    let separator = match args.get(2) {
        Some(Value::Nil) | None => String::new(),
        Some(sep) => expect_string(sep)?,
    };
    let parts: Vec<String> = map_results(eval, "mapconcat", &args)?
        .iter()
        .map(princ_value)
        .collect();
    Ok(Value::string(parts.join(&separator)))
}
