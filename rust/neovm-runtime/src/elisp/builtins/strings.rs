use super::*;
use crate::elisp::error::error_message;
use crate::elisp::print::{format_float, princ_value, print_value};

// ===========================================================================
// Formatting
// ===========================================================================

/// Expand `%s`, `%S`, `%d` and `%%` in `fmt` with `args`.
pub(crate) fn format_string(fmt: &str, args: &[Value]) -> Result<String, Flow> {
    let mut out = String::with_capacity(fmt.len());
    let mut args = args.iter();
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(spec) = chars.next() else {
            return Err(error_message("Format string ends in middle of format specifier"));
        };
        if spec == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.next() else {
            return Err(error_message("Not enough arguments for format string"));
        };
        match spec {
            's' => out.push_str(&princ_value(arg)),
            'S' => out.push_str(&print_value(arg)),
            'd' => match arg {
                Value::Int(n) => out.push_str(&n.to_string()),
                Value::Float(f) => out.push_str(&(f.trunc() as i64).to_string()),
                _ => {
                    return Err(error_message(
                        "Format specifier doesn\u{2019}t match argument type",
                    ))
                }
            },
            other => {
                return Err(error_message(format!("Invalid format operation %{other}")));
            }
        }
    }
    Ok(out)
}

pub(crate) fn builtin_format(args: Vec<Value>) -> EvalResult {
    expect_min_args("format", &args, 1)?;
    let fmt = expect_string(&args[0])?;
    Ok(Value::string(format_string(&fmt, &args[1..])?))
}

/// `message`: format and log the text; a nil format clears and returns nil.
pub(crate) fn builtin_message(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("message", &args, 1)?;
    if args[0].is_nil() {
        return Ok(Value::Nil);
    }
    let fmt = expect_string(&args[0])?;
    let text = format_string(&fmt, &args[1..])?;
    eval.message(text.clone());
    Ok(Value::string(text))
}

// ===========================================================================
// Strings and symbols
// ===========================================================================

pub(crate) fn builtin_concat(args: Vec<Value>) -> EvalResult {
    let mut out = String::new();
    for arg in &args {
        match arg {
            Value::Str(s) => out.push_str(s),
            Value::Nil => {}
            other => {
                for item in expect_list(other)? {
                    let code = expect_int(&item)?;
                    let c = u32::try_from(code)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| wrong_type("characterp", item.clone()))?;
                    out.push(c);
                }
            }
        }
    }
    Ok(Value::string(out))
}

fn string_designator(value: &Value) -> Result<String, Flow> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        other => other
            .as_symbol_name()
            .map(str::to_string)
            .ok_or_else(|| wrong_type("stringp", other.clone())),
    }
}

pub(crate) fn builtin_string_equal(args: Vec<Value>) -> EvalResult {
    expect_args("string=", &args, 2)?;
    Ok(Value::bool(
        string_designator(&args[0])? == string_designator(&args[1])?,
    ))
}

pub(crate) fn builtin_symbol_name(args: Vec<Value>) -> EvalResult {
    expect_args("symbol-name", &args, 1)?;
    Ok(Value::string(resolve_sym(expect_symbol(&args[0])?)))
}

pub(crate) fn builtin_intern(args: Vec<Value>) -> EvalResult {
    expect_range_args("intern", &args, 1, 2)?;
    let name = expect_string(&args[0])?;
    Ok(Value::symbol(name))
}

pub(crate) fn builtin_number_to_string(args: Vec<Value>) -> EvalResult {
    expect_args("number-to-string", &args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::string(n.to_string())),
        Value::Float(f) => Ok(Value::string(format_float(*f))),
        other => Err(wrong_type("numberp", other.clone())),
    }
}

pub(crate) fn builtin_prin1_to_string(args: Vec<Value>) -> EvalResult {
    expect_range_args("prin1-to-string", &args, 1, 3)?;
    let noescape = arg_or_nil(&args, 1).is_truthy();
    Ok(Value::string(if noescape {
        princ_value(&args[0])
    } else {
        print_value(&args[0])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elisp::tests_support::eval_all;

    #[test]
    fn format_directives() {
        let text = format_string(
            "%s=%S (%d%%)",
            &[Value::string("name"), Value::string("v"), Value::Float(42.9)],
        )
        .expect("format");
        assert_eq!(text, "name=\"v\" (42%)");
    }

    #[test]
    fn format_reports_missing_arguments() {
        assert!(format_string("%s %s", &[Value::Int(1)]).is_err());
        assert!(format_string("%q", &[Value::Int(1)]).is_err());
    }

    #[test]
    fn message_logs_formatted_text() {
        let results = eval_all(
            "(message \"loaded %s in %d steps\" 'init 3)
             (message nil)",
        );
        assert_eq!(results, vec!["OK \"loaded init in 3 steps\"", "OK nil"]);
    }

    #[test]
    fn symbol_and_string_conversions() {
        let results = eval_all(
            "(symbol-name 'abc)
             (eq (intern \"abc\") 'abc)
             (string= 'abc \"abc\")
             (concat \"a\" \"b\" '(99))
             (number-to-string 12)
             (prin1-to-string \"q\")",
        );
        assert_eq!(
            results,
            vec!["OK \"abc\"", "OK t", "OK t", "OK \"abc\"", "OK \"12\"", "OK \"\\\"q\\\"\""]
        );
    }
}
