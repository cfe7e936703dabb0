use super::*;

// ===========================================================================
// Cons / List operations
// ===========================================================================

fn car_of(value: &Value) -> Result<Value, Flow> {
    match value {
        Value::Nil => Ok(Value::Nil),
        Value::Cons(_) => Ok(value.car()),
        other => Err(wrong_type("listp", other.clone())),
    }
}

fn cdr_of(value: &Value) -> Result<Value, Flow> {
    match value {
        Value::Nil => Ok(Value::Nil),
        Value::Cons(_) => Ok(value.cdr()),
        other => Err(wrong_type("listp", other.clone())),
    }
}

pub(crate) fn builtin_car(args: Vec<Value>) -> EvalResult {
    expect_args("car", &args, 1)?;
    car_of(&args[0])
}

pub(crate) fn builtin_cdr(args: Vec<Value>) -> EvalResult {
    expect_args("cdr", &args, 1)?;
    cdr_of(&args[0])
}

pub(crate) fn builtin_car_safe(args: Vec<Value>) -> EvalResult {
    expect_args("car-safe", &args, 1)?;
    Ok(args[0].car())
}

pub(crate) fn builtin_cdr_safe(args: Vec<Value>) -> EvalResult {
    expect_args("cdr-safe", &args, 1)?;
    Ok(args[0].cdr())
}

/// `caar` and friends. `path` lists the accessors innermost first, `true`
/// meaning car.
pub(crate) fn builtin_cxr(name: &str, args: Vec<Value>, path: &[bool]) -> EvalResult {
    expect_args(name, &args, 1)?;
    let mut value = args[0].clone();
    for &is_car in path.iter().rev() {
        value = if is_car { car_of(&value)? } else { cdr_of(&value)? };
    }
    Ok(value)
}

pub(crate) fn builtin_cons(args: Vec<Value>) -> EvalResult {
    expect_args("cons", &args, 2)?;
    let mut args = args.into_iter();
    let car = args.next().unwrap_or(Value::Nil);
    let cdr = args.next().unwrap_or(Value::Nil);
    Ok(Value::cons(car, cdr))
}

pub(crate) fn builtin_length(args: Vec<Value>) -> EvalResult {
    expect_args("length", &args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => list_length(other)
            .map(|n| Value::Int(n as i64))
            .ok_or_else(|| wrong_type("sequencep", other.clone())),
    }
}

fn nthcdr(n: i64, list: &Value) -> Result<Value, Flow> {
    let mut tail = list.clone();
    for _ in 0..n.max(0) {
        if tail.is_nil() {
            break;
        }
        tail = cdr_of(&tail)?;
    }
    Ok(tail)
}

pub(crate) fn builtin_nthcdr(args: Vec<Value>) -> EvalResult {
    expect_args("nthcdr", &args, 2)?;
    nthcdr(expect_int(&args[0])?, &args[1])
}

pub(crate) fn builtin_nth(args: Vec<Value>) -> EvalResult {
    expect_args("nth", &args, 2)?;
    car_of(&nthcdr(expect_int(&args[0])?, &args[1])?)
}

/// `append`: copy every argument but the last, which becomes the tail.
pub(crate) fn builtin_append(args: Vec<Value>) -> EvalResult {
    let Some((last, init)) = args.split_last() else {
        return Ok(Value::Nil);
    };
    let mut items = Vec::new();
    for arg in init {
        items.extend(expect_list(arg)?);
    }
    Ok(Value::list_with_tail(items, last.clone()))
}

pub(crate) fn builtin_reverse(args: Vec<Value>) -> EvalResult {
    expect_args("reverse", &args, 1)?;
    let mut items = expect_list(&args[0])?;
    items.reverse();
    Ok(Value::list(items))
}

/// `nreverse`: reverse by relinking the existing cells.
pub(crate) fn builtin_nreverse(args: Vec<Value>) -> EvalResult {
    expect_args("nreverse", &args, 1)?;
    expect_list(&args[0])?;
    let mut prev = Value::Nil;
    let mut tail = args[0].clone();
    while tail.is_cons() {
        let next = tail.cdr();
        tail.set_cdr(prev);
        prev = tail;
        tail = next;
    }
    Ok(prev)
}

fn find_tail(list: &Value, matches: impl Fn(&Value) -> bool) -> Result<Value, Flow> {
    let mut tail = list.clone();
    while tail.is_cons() {
        if matches(&tail.car()) {
            return Ok(tail);
        }
        tail = tail.cdr();
    }
    if tail.is_nil() {
        Ok(Value::Nil)
    } else {
        Err(wrong_type("listp", list.clone()))
    }
}

pub(crate) fn builtin_memq(args: Vec<Value>) -> EvalResult {
    expect_args("memq", &args, 2)?;
    find_tail(&args[1], |v| eq_value(v, &args[0]))
}

pub(crate) fn builtin_member(args: Vec<Value>) -> EvalResult {
    expect_args("member", &args, 2)?;
    find_tail(&args[1], |v| equal_value(v, &args[0], 0))
}

pub(crate) fn builtin_assq(args: Vec<Value>) -> EvalResult {
    expect_args("assq", &args, 2)?;
    Ok(assq(&args[0], &args[1]))
}

pub(crate) fn builtin_assoc(args: Vec<Value>) -> EvalResult {
    expect_range_args("assoc", &args, 2, 3)?;
    let tail = find_tail(&args[1], |entry| {
        entry.is_cons() && equal_value(&entry.car(), &args[0], 0)
    })?;
    Ok(tail.car())
}

/// Remove matching elements destructively, returning the new head.
fn delete_matching(list: &Value, matches: impl Fn(&Value) -> bool) -> Value {
    let mut head = list.clone();
    while head.is_cons() && matches(&head.car()) {
        head = head.cdr();
    }
    let mut prev = head.clone();
    while prev.is_cons() {
        let next = prev.cdr();
        if next.is_cons() && matches(&next.car()) {
            prev.set_cdr(next.cdr());
        } else {
            prev = next;
        }
    }
    head
}

pub(crate) fn builtin_delq(args: Vec<Value>) -> EvalResult {
    expect_args("delq", &args, 2)?;
    Ok(delete_matching(&args[1], |v| eq_value(v, &args[0])))
}

pub(crate) fn builtin_delete(args: Vec<Value>) -> EvalResult {
    expect_args("delete", &args, 2)?;
    Ok(delete_matching(&args[1], |v| equal_value(v, &args[0], 0)))
}

pub(crate) fn builtin_last(args: Vec<Value>) -> EvalResult {
    expect_range_args("last", &args, 1, 2)?;
    let n = match args.get(1) {
        Some(v) if v.is_truthy() => expect_int(v)?,
        _ => 1,
    };
    let len = list_length(&args[0]).ok_or_else(|| wrong_type("listp", args[0].clone()))? as i64;
    nthcdr((len - n).max(0), &args[0])
}

/// `nconc`: splice the arguments together destructively.
pub(crate) fn builtin_nconc(args: Vec<Value>) -> EvalResult {
    let mut result = Value::Nil;
    let mut last_cons = Value::Nil;
    for (i, arg) in args.iter().enumerate() {
        if arg.is_nil() {
            continue;
        }
        if last_cons.is_cons() {
            last_cons.set_cdr(arg.clone());
        } else {
            result = arg.clone();
        }
        if i + 1 < args.len() {
            if !arg.is_cons() {
                return Err(wrong_type("consp", arg.clone()));
            }
            let mut tail = arg.clone();
            while tail.cdr().is_cons() {
                tail = tail.cdr();
            }
            last_cons = tail;
        }
    }
    Ok(result)
}

pub(crate) fn builtin_setcar(args: Vec<Value>) -> EvalResult {
    expect_args("setcar", &args, 2)?;
    if !args[0].set_car(args[1].clone()) {
        return Err(wrong_type("consp", args[0].clone()));
    }
    Ok(args[1].clone())
}

pub(crate) fn builtin_setcdr(args: Vec<Value>) -> EvalResult {
    expect_args("setcdr", &args, 2)?;
    if !args[0].set_cdr(args[1].clone()) {
        return Err(wrong_type("consp", args[0].clone()));
    }
    Ok(args[1].clone())
}

pub(crate) fn builtin_plist_get(args: Vec<Value>) -> EvalResult {
    expect_args("plist-get", &args, 2)?;
    let mut tail = args[0].clone();
    while tail.is_cons() && tail.cdr().is_cons() {
        if eq_value(&tail.car(), &args[1]) {
            return Ok(tail.cdr().car());
        }
        tail = tail.cdr().cdr();
    }
    Ok(Value::Nil)
}

pub(crate) fn builtin_plist_put(args: Vec<Value>) -> EvalResult {
    expect_args("plist-put", &args, 3)?;
    let mut tail = args[0].clone();
    let mut last_value_cell = Value::Nil;
    while tail.is_cons() && tail.cdr().is_cons() {
        let value_cell = tail.cdr();
        if eq_value(&tail.car(), &args[1]) {
            value_cell.set_car(args[2].clone());
            return Ok(args[0].clone());
        }
        last_value_cell = value_cell.clone();
        tail = value_cell.cdr();
    }
    let addition = Value::list(vec![args[1].clone(), args[2].clone()]);
    if last_value_cell.is_cons() {
        last_value_cell.set_cdr(addition);
        Ok(args[0].clone())
    } else {
        Ok(addition)
    }
}

pub(crate) fn builtin_copy_sequence(args: Vec<Value>) -> EvalResult {
    expect_args("copy-sequence", &args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::string(s.to_string())),
        other => Ok(Value::list(expect_list(other)?)),
    }
}

#[cfg(test)]
mod tests {
    use crate::elisp::tests_support::eval_all;

    #[test]
    fn list_accessors() {
        let results = eval_all(
            "(car '(1 2))
             (cdr '(1 2))
             (cadr '(1 2 3))
             (cddr '(1 2 3))
             (nth 2 '(a b c))
             (nthcdr 5 '(a b))
             (car 'x)
             (last '(1 2 3))
             (length '(1 2 3))",
        );
        assert_eq!(
            results,
            vec![
                "OK 1",
                "OK (2)",
                "OK 2",
                "OK (3)",
                "OK c",
                "OK nil",
                "ERR (wrong-type-argument listp x)",
                "OK (3)",
                "OK 3"
            ]
        );
    }

    #[test]
    fn destructive_operations_share_structure() {
        let results = eval_all(
            "(setq xs (list 1 2 3))
             (nreverse xs)
             (setq ys (list 'a 'b 'a 'c))
             (delq 'a ys)
             (nconc (list 1) nil (list 2 3))
             (let ((cell (cons 1 2))) (setcdr cell 5) cell)",
        );
        assert_eq!(results[1], "OK (3 2 1)");
        assert_eq!(results[3], "OK (b c)");
        assert_eq!(results[4], "OK (1 2 3)");
        assert_eq!(results[5], "OK (1 . 5)");
    }

    #[test]
    fn searching_and_plists() {
        let results = eval_all(
            "(memq 'b '(a b c))
             (member \"b\" '(\"a\" \"b\"))
             (assoc \"k\" '((\"k\" . 1)))
             (plist-get '(:a 1 :b 2) :b)
             (plist-put (list :a 1) :b 2)
             (append '(1) '(2) 3)",
        );
        assert_eq!(
            results,
            vec![
                "OK (b c)",
                "OK (\"b\")",
                "OK (\"k\" . 1)",
                "OK 2",
                "OK (:a 1 :b 2)",
                "OK (1 2 . 3)"
            ]
        );
    }
}
