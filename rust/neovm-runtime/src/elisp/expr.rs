//! Reader output: the syntax tree the evaluator walks.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use super::intern::{resolve_sym, SymId};
use super::value::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(SymId),
    Keyword(SymId),
    List(Vec<Expr>),
    DottedList(Vec<Expr>, Box<Expr>),
    /// A value with no read syntax spliced in by macro expansion or
    /// `eval`. Evaluates to itself.
    Opaque(Value),
}

impl Expr {
    pub fn as_symbol(&self) -> Option<SymId> {
        match self {
            Expr::Symbol(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_symbol_named(&self, name: &str) -> bool {
        matches!(self, Expr::Symbol(id) if resolve_sym(*id) == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at {}: {}", self.position, self.message)
    }
}

impl Error for ParseError {}

/// Render an expression back to reader syntax.
pub fn print_expr(expr: &Expr) -> String {
    match expr {
        Expr::Int(n) => n.to_string(),
        Expr::Float(f) => super::print::format_float(*f),
        Expr::Str(s) => super::print::quote_string(s),
        Expr::Symbol(id) | Expr::Keyword(id) => resolve_sym(*id).to_string(),
        Expr::List(items) => {
            if let [Expr::Symbol(head), quoted] = items.as_slice() {
                if resolve_sym(*head) == "quote" {
                    return format!("'{}", print_expr(quoted));
                }
            }
            let parts: Vec<String> = items.iter().map(print_expr).collect();
            format!("({})", parts.join(" "))
        }
        Expr::DottedList(items, last) => {
            let parts: Vec<String> = items.iter().map(print_expr).collect();
            format!("({} . {})", parts.join(" "), print_expr(last))
        }
        Expr::Opaque(value) => super::print::print_value(value),
    }
}
