//! Value printing (Lisp representation).

use super::intern::resolve_sym;
use super::value::{list_to_vec, LambdaData, Value};

/// Nesting depth past which a structure prints as `...`.
const PRINT_DEPTH_LIMIT: usize = 512;
/// Elements of one list printed before the rest is elided.
const PRINT_LENGTH_LIMIT: usize = 1 << 16;

/// Print a `Value` readably (`prin1`).
pub fn print_value(value: &Value) -> String {
    let mut out = String::new();
    print_into(value, true, 0, &mut out);
    out
}

/// Print a `Value` for humans (`princ`): strings without quotes.
pub fn princ_value(value: &Value) -> String {
    let mut out = String::new();
    print_into(value, false, 0, &mut out);
    out
}

fn print_into(value: &Value, escape: bool, depth: usize, out: &mut String) {
    if depth > PRINT_DEPTH_LIMIT {
        out.push_str("...");
        return;
    }
    match value {
        Value::Nil => out.push_str("nil"),
        Value::True => out.push('t'),
        Value::Int(v) => out.push_str(&v.to_string()),
        Value::Float(f) => out.push_str(&format_float(*f)),
        Value::Symbol(id) => {
            if escape {
                out.push_str(&format_symbol_name(resolve_sym(*id)));
            } else {
                out.push_str(resolve_sym(*id));
            }
        }
        Value::Keyword(id) => out.push_str(resolve_sym(*id)),
        Value::Str(s) => {
            if escape {
                out.push_str(&quote_string(s));
            } else {
                out.push_str(s);
            }
        }
        Value::Cons(_) => {
            if let Some((prefix, payload)) = list_shorthand(value) {
                out.push_str(prefix);
                print_into(&payload, escape, depth + 1, out);
                return;
            }
            out.push('(');
            print_cons(value, escape, depth, out);
            out.push(')');
        }
        Value::Lambda(data) => print_function("lambda", data, escape, depth, out),
        Value::Macro(data) => print_function("macro", data, escape, depth, out),
        Value::Subr(id) => {
            out.push_str("#<subr ");
            out.push_str(resolve_sym(*id));
            out.push('>');
        }
        Value::Buffer(id) => out.push_str(&format!("#<buffer {}>", id.0)),
        Value::Frame(id) => out.push_str(&format!("#<frame F{}>", id.0)),
        Value::Terminal(id) => out.push_str(&format!("#<terminal {}>", id.0)),
    }
}

fn print_function(head: &str, data: &LambdaData, escape: bool, depth: usize, out: &mut String) {
    out.push('(');
    if data.env.is_some() {
        out.push_str("closure ");
    } else {
        out.push_str(head);
        out.push(' ');
    }
    print_into(&data.params.to_value(), escape, depth + 1, out);
    for form in &data.body {
        out.push(' ');
        out.push_str(&super::expr::print_expr(form));
    }
    out.push(')');
}

fn print_cons(value: &Value, escape: bool, depth: usize, out: &mut String) {
    let mut cursor = value.clone();
    let mut first = true;
    let mut printed = 0usize;
    loop {
        match cursor {
            Value::Cons(cell) => {
                if !first {
                    out.push(' ');
                }
                // Bounds circular tails.
                if printed >= PRINT_LENGTH_LIMIT {
                    out.push_str("...");
                    return;
                }
                printed += 1;
                let (car, cdr) = {
                    let cell = cell.borrow();
                    (cell.car.clone(), cell.cdr.clone())
                };
                print_into(&car, escape, depth + 1, out);
                cursor = cdr;
                first = false;
            }
            Value::Nil => return,
            other => {
                out.push_str(" . ");
                print_into(&other, escape, depth + 1, out);
                return;
            }
        }
    }
}

fn list_shorthand(value: &Value) -> Option<(&'static str, Value)> {
    let items = list_to_vec(value)?;
    if items.len() != 2 {
        return None;
    }
    let prefix = match items[0].as_symbol_name()? {
        "quote" => "'",
        "function" => "#'",
        _ => return None,
    };
    Some((prefix, items[1].clone()))
}

fn format_symbol_name(name: &str) -> String {
    if name.is_empty() {
        return "##".to_string();
    }
    let mut out = String::with_capacity(name.len());
    for (idx, ch) in name.chars().enumerate() {
        let needs_escape = matches!(
            ch,
            ' ' | '\t' | '\n' | '(' | ')' | '"' | '\\' | ';' | '\'' | '`' | ','
        ) || (idx == 0 && matches!(ch, '?'));
        if needs_escape {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Quote a string with Lisp escapes.
pub(crate) fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        return if f.is_sign_negative() {
            "-0.0e+NaN".to_string()
        } else {
            "0.0e+NaN".to_string()
        };
    }
    if f.is_infinite() {
        return if f > 0.0 {
            "1.0e+INF".to_string()
        } else {
            "-1.0e+INF".to_string()
        };
    }
    if f == f.trunc() && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_basic_values() {
        assert_eq!(print_value(&Value::Nil), "nil");
        assert_eq!(print_value(&Value::True), "t");
        assert_eq!(print_value(&Value::Int(-4)), "-4");
        assert_eq!(print_value(&Value::Float(1.0)), "1.0");
        assert_eq!(print_value(&Value::Float(2.5)), "2.5");
        assert_eq!(print_value(&Value::keyword(":k")), ":k");
    }

    #[test]
    fn print_string_escapes_only_when_readable() {
        let s = Value::string("say \"hi\"");
        assert_eq!(print_value(&s), r#""say \"hi\"""#);
        assert_eq!(princ_value(&s), "say \"hi\"");
    }

    #[test]
    fn print_lists_and_dotted_pairs() {
        let list = Value::list(vec![Value::Int(1), Value::symbol("a"), Value::string("s")]);
        assert_eq!(print_value(&list), "(1 a \"s\")");
        let pair = Value::cons(Value::symbol("x"), Value::Int(2));
        assert_eq!(print_value(&pair), "(x . 2)");
    }

    #[test]
    fn print_quote_shorthand() {
        let quoted = Value::list(vec![Value::symbol("quote"), Value::symbol("x")]);
        assert_eq!(print_value(&quoted), "'x");
        let function = Value::list(vec![Value::symbol("function"), Value::symbol("car")]);
        assert_eq!(print_value(&function), "#'car");
    }

    #[test]
    fn print_symbol_escapes_reader_sensitive_chars() {
        assert_eq!(print_value(&Value::symbol("a b")), "a\\ b");
        assert_eq!(princ_value(&Value::symbol("a b")), "a b");
    }
}
