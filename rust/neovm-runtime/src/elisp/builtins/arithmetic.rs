use super::*;

// ===========================================================================
// Arithmetic
// ===========================================================================

fn has_float(args: &[Value]) -> bool {
    args.iter().any(|a| matches!(a, Value::Float(_)))
}

fn expect_number_f64(value: &Value) -> Result<f64, Flow> {
    value
        .as_number_f64()
        .ok_or_else(|| wrong_type("number-or-marker-p", value.clone()))
}

fn expect_integer(value: &Value) -> Result<i64, Flow> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(wrong_type("number-or-marker-p", other.clone())),
    }
}

fn overflow() -> Flow {
    signal("overflow-error", vec![])
}

/// Fold `args` with an integer operation, or a float one as soon as any
/// argument is a float.
fn fold_numbers(
    args: &[Value],
    init: i64,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult {
    if has_float(args) {
        let mut acc = init as f64;
        for a in args {
            acc = float_op(acc, expect_number_f64(a)?);
        }
        Ok(Value::Float(acc))
    } else {
        let mut acc = init;
        for a in args {
            acc = int_op(acc, expect_integer(a)?).ok_or_else(overflow)?;
        }
        Ok(Value::Int(acc))
    }
}

pub(crate) fn builtin_add(args: Vec<Value>) -> EvalResult {
    fold_numbers(&args, 0, i64::checked_add, |a, b| a + b)
}

pub(crate) fn builtin_mul(args: Vec<Value>) -> EvalResult {
    fold_numbers(&args, 1, i64::checked_mul, |a, b| a * b)
}

pub(crate) fn builtin_sub(args: Vec<Value>) -> EvalResult {
    match args.as_slice() {
        [] => Ok(Value::Int(0)),
        [Value::Float(f)] => Ok(Value::Float(-f)),
        [single] => Ok(Value::Int(
            expect_integer(single)?.checked_neg().ok_or_else(overflow)?,
        )),
        [first, rest @ ..] if has_float(&args) => {
            let mut acc = expect_number_f64(first)?;
            for a in rest {
                acc -= expect_number_f64(a)?;
            }
            Ok(Value::Float(acc))
        }
        [first, rest @ ..] => {
            let mut acc = expect_integer(first)?;
            for a in rest {
                acc = acc.checked_sub(expect_integer(a)?).ok_or_else(overflow)?;
            }
            Ok(Value::Int(acc))
        }
    }
}

pub(crate) fn builtin_div(args: Vec<Value>) -> EvalResult {
    expect_min_args("/", &args, 1)?;
    if has_float(&args) {
        let mut acc = expect_number_f64(&args[0])?;
        if args.len() == 1 {
            return Ok(Value::Float(1.0 / acc));
        }
        for a in &args[1..] {
            acc /= expect_number_f64(a)?;
        }
        return Ok(Value::Float(acc));
    }
    let mut acc = expect_integer(&args[0])?;
    let divisors: Vec<Value> = if args.len() == 1 {
        acc = 1;
        vec![args[0].clone()]
    } else {
        args[1..].to_vec()
    };
    for a in &divisors {
        let d = expect_integer(a)?;
        if d == 0 {
            return Err(signal("arith-error", vec![]));
        }
        acc = acc.checked_div(d).ok_or_else(overflow)?;
    }
    Ok(Value::Int(acc))
}

fn integer_pair(name: &str, args: &[Value]) -> Result<(i64, i64), Flow> {
    expect_args(name, args, 2)?;
    let a = expect_int(&args[0])?;
    let b = expect_int(&args[1])?;
    if b == 0 {
        return Err(signal("arith-error", vec![]));
    }
    Ok((a, b))
}

pub(crate) fn builtin_rem(args: Vec<Value>) -> EvalResult {
    let (a, b) = integer_pair("%", &args)?;
    Ok(Value::Int(a.checked_rem(b).ok_or_else(overflow)?))
}

/// `mod`: the result has the sign of the divisor.
pub(crate) fn builtin_mod(args: Vec<Value>) -> EvalResult {
    expect_args("mod", &args, 2)?;
    if has_float(&args) {
        let a = expect_number_f64(&args[0])?;
        let b = expect_number_f64(&args[1])?;
        let r = a % b;
        let r = if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r };
        return Ok(Value::Float(r));
    }
    let (a, b) = integer_pair("mod", &args)?;
    let r = a.checked_rem(b).ok_or_else(overflow)?;
    Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
}

pub(crate) fn builtin_add1(args: Vec<Value>) -> EvalResult {
    expect_args("1+", &args, 1)?;
    match &args[0] {
        Value::Float(f) => Ok(Value::Float(f + 1.0)),
        other => Ok(Value::Int(
            expect_integer(other)?.checked_add(1).ok_or_else(overflow)?,
        )),
    }
}

pub(crate) fn builtin_sub1(args: Vec<Value>) -> EvalResult {
    expect_args("1-", &args, 1)?;
    match &args[0] {
        Value::Float(f) => Ok(Value::Float(f - 1.0)),
        other => Ok(Value::Int(
            expect_integer(other)?.checked_sub(1).ok_or_else(overflow)?,
        )),
    }
}

/// Chained numeric comparison; `/=` takes exactly two arguments.
pub(crate) fn builtin_compare(op: &str, args: Vec<Value>) -> EvalResult {
    if op == "/=" {
        expect_args(op, &args, 2)?;
    } else {
        expect_min_args(op, &args, 1)?;
    }
    let mut nums = Vec::with_capacity(args.len());
    for a in &args {
        nums.push(expect_number_f64(a)?);
    }
    let holds = nums.windows(2).all(|pair| {
        let (a, b) = (pair[0], pair[1]);
        match op {
            "=" => a == b,
            "/=" => a != b,
            "<" => a < b,
            "<=" => a <= b,
            ">" => a > b,
            _ => a >= b,
        }
    });
    Ok(Value::bool(holds))
}

fn extremum(name: &str, args: Vec<Value>, pick_later: fn(f64, f64) -> bool) -> EvalResult {
    expect_min_args(name, &args, 1)?;
    let float = has_float(&args);
    let mut best = args[0].clone();
    let mut best_f = expect_number_f64(&best)?;
    for a in &args[1..] {
        let f = expect_number_f64(a)?;
        if pick_later(best_f, f) {
            best = a.clone();
            best_f = f;
        }
    }
    Ok(if float { Value::Float(best_f) } else { best })
}

pub(crate) fn builtin_max(args: Vec<Value>) -> EvalResult {
    extremum("max", args, |best, f| f > best)
}

pub(crate) fn builtin_min(args: Vec<Value>) -> EvalResult {
    extremum("min", args, |best, f| f < best)
}

pub(crate) fn builtin_abs(args: Vec<Value>) -> EvalResult {
    expect_args("abs", &args, 1)?;
    match &args[0] {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Ok(Value::Int(
            expect_integer(other)?.checked_abs().ok_or_else(overflow)?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|n| Value::Int(*n)).collect()
    }

    #[test]
    fn integer_division_truncates_and_rejects_zero() {
        assert_eq!(builtin_div(ints(&[7, 2])).ok(), Some(Value::Int(3)));
        assert_eq!(builtin_div(ints(&[-7, 2])).ok(), Some(Value::Int(-3)));
        assert!(builtin_div(ints(&[1, 0])).is_err());
    }

    #[test]
    fn floats_are_contagious() {
        assert_eq!(
            builtin_add(vec![Value::Int(1), Value::Float(0.5)]).ok(),
            Some(Value::Float(1.5))
        );
        assert_eq!(
            builtin_max(vec![Value::Int(3), Value::Float(1.0)]).ok(),
            Some(Value::Float(3.0))
        );
    }

    #[test]
    fn mod_takes_sign_of_divisor() {
        assert_eq!(builtin_mod(ints(&[-7, 3])).ok(), Some(Value::Int(2)));
        assert_eq!(builtin_rem(ints(&[-7, 3])).ok(), Some(Value::Int(-1)));
    }

    #[test]
    fn overflow_is_signaled() {
        assert!(builtin_add(ints(&[i64::MAX, 1])).is_err());
    }

    #[test]
    fn non_numbers_are_rejected() {
        assert!(builtin_compare("<", vec![Value::Int(1), Value::symbol("x")]).is_err());
    }

    proptest! {
        #[test]
        fn chained_less_than_matches_sortedness(values in proptest::collection::vec(-20i64..20, 1..6)) {
            let sorted = values.windows(2).all(|w| w[0] < w[1]);
            let result = builtin_compare("<", ints(&values)).expect("numbers");
            prop_assert_eq!(result.is_truthy(), sorted);
        }
    }
}
