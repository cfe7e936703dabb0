//! neovm-batch: evaluate Lisp files and expressions non-interactively.
//!
//! Options are processed in order, like `emacs --batch`:
//!
//!   -L, --directory DIR   prepend DIR to `load-path`
//!   -l, --load FILE       load FILE
//!   -e, --eval EXPR       evaluate EXPR
//!
//! The first error that reaches top level is printed to stderr and the
//! process exits with status 255.

use std::path::PathBuf;
use std::process::ExitCode;

use neovm_runtime::elisp::eval::quote_to_value;
use neovm_runtime::elisp::{map_flow, parse_forms, EvalResult, Evaluator, EvaluatorConfig, Value};
use tracing_subscriber::EnvFilter;

/// Deeply nested Lisp needs more stack than the main thread offers.
const EVAL_STACK_SIZE: usize = 64 * 1024 * 1024;

const ERROR_EXIT: u8 = 255;

#[derive(Debug)]
enum Action {
    Directory(PathBuf),
    Load(String),
    Eval(String),
}

fn parse_args() -> Result<Vec<Action>, String> {
    let mut actions = Vec::new();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut operand = |what: &str| {
            iter.next()
                .ok_or_else(|| format!("{arg} requires {what} argument"))
        };
        match arg.as_str() {
            "--directory" | "-L" => actions.push(Action::Directory(operand("a directory")?.into())),
            "--load" | "-l" => actions.push(Action::Load(operand("a file")?)),
            "--eval" | "-e" => actions.push(Action::Eval(operand("an expression")?)),
            "--batch" => {}
            other => return Err(format!("Unknown option: {other}")),
        }
    }
    Ok(actions)
}

/// Run `body` under a top-level `error` handler. Returns false after
/// reporting an error.
fn run_guarded<F>(ev: &mut Evaluator, body: F) -> bool
where
    F: FnOnce(&mut Evaluator) -> EvalResult,
{
    let mut failed = false;
    let result = ev.internal_condition_case(Value::symbol("error"), body, |ev, err| {
        eprintln!("{}", ev.error_message_string(&err));
        failed = true;
        Ok(Value::Nil)
    });
    if let Err(flow) = result {
        let err = map_flow(flow).to_error_object();
        eprintln!("{}", ev.error_message_string(&err));
        return false;
    }
    !failed
}

fn run(actions: Vec<Action>) -> bool {
    let mut ev = Evaluator::with_config(EvaluatorConfig::from_env());
    for action in actions {
        let ok = match action {
            Action::Directory(dir) => {
                let load_path = ev.symbol_value("load-path").unwrap_or(Value::Nil);
                let dir = Value::string(dir.to_string_lossy());
                ev.set_variable("load-path", Value::cons(dir, load_path));
                true
            }
            Action::Load(file) => {
                tracing::debug!(%file, "loading");
                run_guarded(&mut ev, |ev| ev.load(&Value::string(file), false, false, false, false))
            }
            Action::Eval(source) => match parse_forms(&source) {
                Ok(forms) => forms.iter().all(|form| {
                    let form = quote_to_value(form);
                    run_guarded(&mut ev, |ev| {
                        let lexical = ev.symbol_value("lexical-binding").unwrap_or(Value::Nil);
                        ev.eval_value(&form, &lexical)
                    })
                }),
                Err(err) => {
                    eprintln!("Invalid read syntax: {} at {}", err.message, err.position);
                    false
                }
            },
        };
        if !ok {
            return false;
        }
    }
    true
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let actions = match parse_args() {
        Ok(actions) => actions,
        Err(message) => {
            eprintln!("neovm-batch: {message}");
            return ExitCode::from(ERROR_EXIT);
        }
    };

    let worker = std::thread::Builder::new()
        .name("neovm-eval".into())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(move || run(actions));
    match worker.map(|handle| handle.join()) {
        Ok(Ok(true)) => ExitCode::SUCCESS,
        Ok(Ok(false)) => ExitCode::from(ERROR_EXIT),
        Ok(Err(_)) | Err(_) => {
            eprintln!("neovm-batch: evaluator thread failed");
            ExitCode::from(ERROR_EXIT)
        }
    }
}
