//! Lisp value representation and fundamental operations.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::expr::Expr;
use super::intern::{intern, resolve_sym, SymId};
use crate::buffer::BufferId;
use crate::window::{FrameId, KboardId};

/// A mutable cons cell. Identity matters: `eq` compares cells by address.
#[derive(Clone, Debug)]
pub struct ConsCell {
    pub car: Value,
    pub cdr: Value,
}

/// Runtime Lisp value.
///
/// Heap objects are reference counted; cloning a `Value` never copies a
/// cons cell or a function body.
#[derive(Clone)]
pub enum Value {
    Nil,
    True,
    Int(i64),
    Float(f64),
    Symbol(SymId),
    Keyword(SymId),
    Str(Rc<str>),
    Cons(Rc<RefCell<ConsCell>>),
    Lambda(Rc<LambdaData>),
    Macro(Rc<LambdaData>),
    /// Built-in function reference, dispatched by name.
    Subr(SymId),
    Buffer(BufferId),
    Frame(FrameId),
    /// A terminal, identified by the keyboard it reads from.
    Terminal(KboardId),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        equal_value(self, other, 0)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::print::print_value(self))
    }
}

/// Shared representation for lambda and macro bodies.
#[derive(Clone, Debug)]
pub struct LambdaData {
    pub params: LambdaParams,
    pub body: Vec<Expr>,
    /// Captured lexical environment (an alist) for closures; `None` for
    /// dynamically scoped functions.
    pub env: Option<Value>,
    pub docstring: Option<String>,
}

/// Describes a lambda parameter list including &optional and &rest.
#[derive(Clone, Debug, Default)]
pub struct LambdaParams {
    pub required: Vec<SymId>,
    pub optional: Vec<SymId>,
    pub rest: Option<SymId>,
}

impl LambdaParams {
    pub fn simple(names: Vec<SymId>) -> Self {
        Self {
            required: names,
            optional: Vec::new(),
            rest: None,
        }
    }

    pub fn min_arity(&self) -> usize {
        self.required.len()
    }

    /// Total maximum arity (None = unbounded due to &rest).
    pub fn max_arity(&self) -> Option<usize> {
        if self.rest.is_some() {
            None
        } else {
            Some(self.required.len() + self.optional.len())
        }
    }

    /// The formals as a Lisp list, with lambda-list keywords restored.
    pub fn to_value(&self) -> Value {
        let mut items: Vec<Value> = self.required.iter().map(|s| Value::Symbol(*s)).collect();
        if !self.optional.is_empty() {
            items.push(Value::symbol("&optional"));
            items.extend(self.optional.iter().map(|s| Value::Symbol(*s)));
        }
        if let Some(rest) = self.rest {
            items.push(Value::symbol("&rest"));
            items.push(Value::Symbol(rest));
        }
        Value::list(items)
    }
}

impl Value {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    pub fn t() -> Self {
        Value::True
    }

    pub fn bool(b: bool) -> Self {
        if b {
            Value::True
        } else {
            Value::Nil
        }
    }

    /// A symbol by name. `nil` and `t` map to their dedicated variants.
    pub fn symbol(s: impl AsRef<str>) -> Self {
        Self::from_sym(intern(s.as_ref()))
    }

    pub fn from_sym(id: SymId) -> Self {
        match resolve_sym(id) {
            "nil" => Value::Nil,
            "t" => Value::True,
            name if name.starts_with(':') && name.len() > 1 => Value::Keyword(id),
            _ => Value::Symbol(id),
        }
    }

    pub fn keyword(s: impl AsRef<str>) -> Self {
        Value::Keyword(intern(s.as_ref()))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Rc::from(s.into()))
    }

    pub fn cons(car: Value, cdr: Value) -> Self {
        Value::Cons(Rc::new(RefCell::new(ConsCell { car, cdr })))
    }

    pub fn list(values: Vec<Value>) -> Self {
        Self::list_with_tail(values, Value::Nil)
    }

    pub fn list_with_tail(values: Vec<Value>, tail: Value) -> Self {
        values
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Value::cons(item, acc))
    }

    pub fn make_lambda(data: LambdaData) -> Self {
        Value::Lambda(Rc::new(data))
    }

    pub fn make_macro(data: LambdaData) -> Self {
        Value::Macro(Rc::new(data))
    }

    // -----------------------------------------------------------------------
    // Cons access
    // -----------------------------------------------------------------------

    /// `car` of a cons, nil for anything else.
    pub fn car(&self) -> Value {
        match self {
            Value::Cons(cell) => cell.borrow().car.clone(),
            _ => Value::Nil,
        }
    }

    /// `cdr` of a cons, nil for anything else.
    pub fn cdr(&self) -> Value {
        match self {
            Value::Cons(cell) => cell.borrow().cdr.clone(),
            _ => Value::Nil,
        }
    }

    /// Replace the car. Returns false if `self` is not a cons.
    pub fn set_car(&self, value: Value) -> bool {
        match self {
            Value::Cons(cell) => {
                cell.borrow_mut().car = value;
                true
            }
            _ => false,
        }
    }

    pub fn set_cdr(&self, value: Value) -> bool {
        match self {
            Value::Cons(cell) => {
                cell.borrow_mut().cdr = value;
                true
            }
            _ => false,
        }
    }

    // -----------------------------------------------------------------------
    // Type predicates
    // -----------------------------------------------------------------------

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_nil()
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::Nil | Value::Cons(_))
    }

    pub fn is_cons(&self) -> bool {
        matches!(self, Value::Cons(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(
            self,
            Value::Nil | Value::True | Value::Symbol(_) | Value::Keyword(_)
        )
    }

    pub fn is_keyword(&self) -> bool {
        matches!(self, Value::Keyword(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil | Value::True | Value::Symbol(_) | Value::Keyword(_) => "symbol",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Cons(_) => "cons",
            Value::Lambda(_) => "function",
            Value::Macro(_) => "macro",
            Value::Subr(_) => "subr",
            Value::Buffer(_) => "buffer",
            Value::Frame(_) => "frame",
            Value::Terminal(_) => "terminal",
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_number_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The symbol handle if this value is a symbol (including nil and t).
    pub fn as_symbol_id(&self) -> Option<SymId> {
        match self {
            Value::Nil => Some(intern("nil")),
            Value::True => Some(intern("t")),
            Value::Symbol(id) | Value::Keyword(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_symbol_name(&self) -> Option<&'static str> {
        self.as_symbol_id().map(resolve_sym)
    }

    pub fn is_symbol_named(&self, name: &str) -> bool {
        self.as_symbol_name() == Some(name)
    }
}

// ---------------------------------------------------------------------------
// Equality
// ---------------------------------------------------------------------------

/// Identity comparison (`eq`). Integers compare by value.
pub fn eq_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,
        (Value::True, Value::True) => true,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        (Value::Symbol(a), Value::Symbol(b)) => a == b,
        (Value::Keyword(a), Value::Keyword(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
        (Value::Cons(a), Value::Cons(b)) => Rc::ptr_eq(a, b),
        (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
        (Value::Macro(a), Value::Macro(b)) => Rc::ptr_eq(a, b),
        (Value::Subr(a), Value::Subr(b)) => a == b,
        (Value::Buffer(a), Value::Buffer(b)) => a == b,
        (Value::Frame(a), Value::Frame(b)) => a == b,
        (Value::Terminal(a), Value::Terminal(b)) => a == b,
        _ => false,
    }
}

/// Structural comparison (`equal`).
pub fn equal_value(left: &Value, right: &Value, depth: usize) -> bool {
    if depth > 4096 {
        return false;
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Cons(a), Value::Cons(b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            let (a, b) = (a.borrow(), b.borrow());
            equal_value(&a.car, &b.car, depth + 1) && equal_value(&a.cdr, &b.cdr, depth + 1)
        }
        _ => eq_value(left, right),
    }
}

// ---------------------------------------------------------------------------
// List helpers
// ---------------------------------------------------------------------------

/// Collect a proper list into a vector. Returns None for improper lists.
pub fn list_to_vec(value: &Value) -> Option<Vec<Value>> {
    let mut result = Vec::new();
    let mut cursor = value.clone();
    loop {
        match cursor {
            Value::Nil => return Some(result),
            Value::Cons(cell) => {
                let next = {
                    let cell = cell.borrow();
                    result.push(cell.car.clone());
                    cell.cdr.clone()
                };
                cursor = next;
            }
            _ => return None,
        }
    }
}

/// Length of a list. Returns None if improper.
pub fn list_length(value: &Value) -> Option<usize> {
    let mut len = 0;
    let mut cursor = value.clone();
    loop {
        match cursor {
            Value::Nil => return Some(len),
            Value::Cons(cell) => {
                len += 1;
                let next = cell.borrow().cdr.clone();
                cursor = next;
            }
            _ => return None,
        }
    }
}

/// `memq`: the tail of `list` starting at the first element `eq` to `item`.
pub fn memq(item: &Value, list: &Value) -> Value {
    let mut cursor = list.clone();
    while let Value::Cons(cell) = &cursor {
        let (car, cdr) = {
            let cell = cell.borrow();
            (cell.car.clone(), cell.cdr.clone())
        };
        if eq_value(&car, item) {
            return cursor;
        }
        cursor = cdr;
    }
    Value::Nil
}

/// `assq`: the first cons in `alist` whose car is `eq` to `key`.
pub fn assq(key: &Value, alist: &Value) -> Value {
    let mut cursor = alist.clone();
    while let Value::Cons(cell) = &cursor {
        let (entry, cdr) = {
            let cell = cell.borrow();
            (cell.car.clone(), cell.cdr.clone())
        };
        if let Value::Cons(pair) = &entry {
            if eq_value(&pair.borrow().car, key) {
                return entry;
            }
        }
        cursor = cdr;
    }
    Value::Nil
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_and_t_are_symbols() {
        assert!(Value::Nil.is_symbol());
        assert!(Value::symbol("t").is_symbol());
        assert!(matches!(Value::symbol("nil"), Value::Nil));
        assert!(matches!(Value::symbol(":kw"), Value::Keyword(_)));
        assert_eq!(Value::Nil.as_symbol_name(), Some("nil"));
    }

    #[test]
    fn cons_identity_vs_structure() {
        let a = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert!(!eq_value(&a, &b));
        assert!(equal_value(&a, &b, 0));
        assert!(eq_value(&a, &a.clone()));
    }

    #[test]
    fn set_car_is_visible_through_shared_handles() {
        let cell = Value::cons(Value::symbol("x"), Value::Int(1));
        let alias = cell.clone();
        assert!(cell.set_cdr(Value::Int(2)));
        assert_eq!(alias.cdr(), Value::Int(2));
        assert!(!Value::Int(3).set_car(Value::Nil));
    }

    #[test]
    fn memq_and_assq_find_entries() {
        let x = Value::symbol("x");
        let list = Value::list(vec![Value::symbol("a"), x.clone(), Value::symbol("b")]);
        assert_eq!(list_length(&memq(&x, &list)), Some(2));
        assert!(memq(&Value::symbol("zz"), &list).is_nil());

        let alist = Value::list(vec![
            Value::cons(Value::symbol("a"), Value::Int(1)),
            Value::cons(x.clone(), Value::Int(2)),
        ]);
        assert_eq!(assq(&x, &alist).cdr(), Value::Int(2));
    }

    #[test]
    fn improper_lists_are_rejected() {
        let dotted = Value::cons(Value::Int(1), Value::Int(2));
        assert!(list_to_vec(&dotted).is_none());
        assert!(list_length(&dotted).is_none());
    }
}
