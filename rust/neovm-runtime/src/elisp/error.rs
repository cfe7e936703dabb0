//! Non-local exits and the error value that escapes to embedders.
//!
//! Inside the evaluator every exit that is not a normal return travels as a
//! [`Flow`]. A freshly raised signal is `Flow::Signal`; once the handler
//! stack has been consulted it becomes either a `Flow::Transfer` aimed at a
//! specific handler or `Flow::Uncaught`. Frames between the raise point and
//! the target only unbind and pass the flow along.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use super::control::HandlerId;
use super::intern::{intern, resolve_sym, SymId};
use super::print::print_value;
use super::value::Value;

/// A raised condition before it has been routed.
#[derive(Clone, Debug)]
pub struct SignalData {
    /// Error symbol. `nil` marks the preallocated memory-exhaustion signal,
    /// whose real symbol is the car of `data`.
    pub symbol: SymId,
    pub data: Value,
}

impl SignalData {
    pub fn new(symbol: SymId, data: Value) -> Self {
        Self { symbol, data }
    }

    pub fn is_memory_full(&self) -> bool {
        resolve_sym(self.symbol) == "nil"
    }

    /// `(SYMBOL . DATA)`, the value a condition-case variable receives.
    pub fn to_error_object(&self) -> Value {
        if self.is_memory_full() {
            self.data.clone()
        } else {
            Value::cons(Value::from_sym(self.symbol), self.data.clone())
        }
    }
}

/// A routed exit: unwind to `target`, then deliver `value` there.
#[derive(Clone, Debug)]
pub struct Transfer {
    pub target: HandlerId,
    pub value: Value,
}

#[derive(Clone, Debug)]
pub enum Flow {
    /// Raised but not yet matched against the handler stack.
    Signal(SignalData),
    /// Matched to a catch or condition-case handler.
    Transfer(Transfer),
    /// No handler wanted it; propagates to the embedder.
    Uncaught(SignalData),
}

pub type EvalResult = Result<Value, Flow>;

/// Error returned across the public API.
#[derive(Clone, Debug)]
pub enum EvalError {
    Signal { symbol: SymId, data: Value },
    /// Memory exhaustion, reported without allocating.
    MemoryFull,
}

impl EvalError {
    /// The error object `(SYMBOL . DATA)`.
    pub fn to_error_object(&self) -> Value {
        match self {
            EvalError::Signal { symbol, data } => {
                Value::cons(Value::from_sym(*symbol), data.clone())
            }
            EvalError::MemoryFull => memory_signal_data(),
        }
    }
}

impl Display for EvalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Signal { symbol, data } => {
                write!(f, "signal {} {}", resolve_sym(*symbol), print_value(data))
            }
            EvalError::MemoryFull => f.write_str(MEMORY_FULL_MESSAGE),
        }
    }
}

impl Error for EvalError {}

pub(crate) const MEMORY_FULL_MESSAGE: &str =
    "Memory exhausted--use M-x save-some-buffers then exit and restart";

/// `(error MESSAGE)`, raised with a nil symbol when memory runs out.
pub(crate) fn memory_signal_data() -> Value {
    Value::list(vec![Value::symbol("error"), Value::string(MEMORY_FULL_MESSAGE)])
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

/// Raise `symbol` with `data` as the list of its arguments.
pub fn signal(symbol: &str, data: Vec<Value>) -> Flow {
    Flow::Signal(SignalData::new(intern(symbol), Value::list(data)))
}

/// Raise `symbol` with an arbitrary data object.
pub fn signal_value(symbol: SymId, data: Value) -> Flow {
    Flow::Signal(SignalData::new(symbol, data))
}

/// Plain `error` with a formatted message.
pub fn error_message(message: impl Into<String>) -> Flow {
    signal("error", vec![Value::string(message)])
}

pub fn wrong_type(predicate: &str, value: Value) -> Flow {
    signal("wrong-type-argument", vec![Value::symbol(predicate), value])
}

pub fn wrong_number_of_arguments(function: Value, count: usize) -> Flow {
    signal(
        "wrong-number-of-arguments",
        vec![function, Value::Int(count as i64)],
    )
}

/// Convert a routed exit into the embedder-facing error.
pub fn map_flow(flow: Flow) -> EvalError {
    match flow {
        Flow::Signal(sig) | Flow::Uncaught(sig) => {
            if sig.is_memory_full() {
                EvalError::MemoryFull
            } else {
                EvalError::Signal {
                    symbol: sig.symbol,
                    data: sig.data,
                }
            }
        }
        // A transfer only reaches the top when its handler is gone.
        Flow::Transfer(transfer) => EvalError::Signal {
            symbol: intern("no-catch"),
            data: Value::list(vec![Value::Nil, transfer.value]),
        },
    }
}

pub fn format_eval_result(result: &Result<Value, EvalError>) -> String {
    match result {
        Ok(value) => format!("OK {}", print_value(value)),
        Err(EvalError::Signal { symbol, data }) => {
            format!(
                "ERR {}",
                print_value(&Value::cons(Value::from_sym(*symbol), data.clone()))
            )
        }
        Err(EvalError::MemoryFull) => "ERR memory-full".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Standard conditions
// ---------------------------------------------------------------------------

/// `(name, message, parent conditions)`; every entry also inherits `error`
/// unless it is `quit`.
pub(crate) const STANDARD_ERRORS: &[(&str, &str, &[&str])] = &[
    ("error", "error", &[]),
    ("quit", "Quit", &[]),
    ("user-error", "", &[]),
    ("args-out-of-range", "Args out of range", &[]),
    ("arith-error", "Arithmetic error", &[]),
    ("overflow-error", "Arithmetic overflow error", &["arith-error"]),
    ("void-function", "Symbol's function definition is void", &[]),
    ("cyclic-function-indirection", "Symbol's chain of function indirections contains a loop", &[]),
    ("cyclic-variable-indirection", "Symbol's chain of variable indirections contains a loop", &[]),
    ("invalid-function", "Invalid function", &[]),
    ("no-catch", "No catch for tag", &[]),
    ("end-of-file", "End of file during parsing", &[]),
    ("invalid-read-syntax", "Invalid read syntax", &[]),
    ("setting-constant", "Attempt to set a constant symbol", &[]),
    ("void-variable", "Symbol's value as variable is void", &[]),
    ("wrong-number-of-arguments", "Wrong number of arguments", &[]),
    ("wrong-type-argument", "Wrong type argument", &[]),
    ("excessive-lisp-nesting", "Lisp nesting exceeds `max-lisp-eval-depth'", &[]),
    ("excessive-variable-binding", "Variable binding depth exceeds max-specpdl-size", &[]),
    ("file-error", "File error", &[]),
    ("file-missing", "Cannot open load file", &["file-error"]),
];
