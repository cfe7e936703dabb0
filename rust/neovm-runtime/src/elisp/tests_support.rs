//! Helpers shared by the unit tests: evaluate source text in a fresh
//! evaluator and render each result with [`format_eval_result`].

use super::error::format_eval_result;
use super::eval::Evaluator;
use super::parser::parse_forms;

/// Deep recursion tests need more than the default test thread stack.
const TEST_STACK_SIZE: usize = 256 * 1024 * 1024;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Evaluate every form of `src` after `setup` has adjusted the evaluator.
pub(crate) fn eval_with<F>(setup: F, src: &str) -> Vec<String>
where
    F: FnOnce(&mut Evaluator) + Send + 'static,
{
    init_tracing();
    let src = src.to_string();
    std::thread::Builder::new()
        .stack_size(TEST_STACK_SIZE)
        .spawn(move || {
            let forms = parse_forms(&src).expect("test source parses");
            let mut ev = Evaluator::new();
            setup(&mut ev);
            ev.eval_forms(&forms)
                .iter()
                .map(format_eval_result)
                .collect::<Vec<_>>()
        })
        .expect("spawn evaluator thread")
        .join()
        .expect("evaluator thread panicked")
}

pub(crate) fn eval_all(src: &str) -> Vec<String> {
    eval_with(|_| {}, src)
}

pub(crate) fn eval_one(src: &str) -> String {
    eval_all(src).into_iter().next().expect("one form")
}

/// Like [`eval_all`] with `lexical-binding` enabled.
pub(crate) fn eval_lexical(src: &str) -> Vec<String> {
    eval_with(|ev| ev.vars.lexical_binding.set(true), src)
}
