//! Emacs Lisp core: symbols and value cells, the binding stack, non-local
//! exits and the evaluator built on them.

pub mod intern;
pub mod value;
pub mod expr;
pub mod parser;
pub mod print;
pub mod error;
pub mod symbol;
pub mod forward;
pub mod specpdl;
mod stack;
pub mod data;
pub mod control;
pub mod debug;
pub mod eval;
pub mod eval_vars;
pub mod builtins;
pub mod hooks;
pub mod autoload;
pub mod load;
pub mod config;
pub mod buffer_vars;
pub mod frame_vars;

#[cfg(test)]
pub(crate) mod tests_support;

pub use config::EvaluatorConfig;
pub use error::{format_eval_result, map_flow, EvalError, EvalResult, Flow};
pub use eval::Evaluator;
pub use expr::ParseError;
pub use parser::parse_forms;
pub use value::Value;
