//! Native stack headroom for the recursive evaluator.
//!
//! Every Lisp call level recurses through `eval` and `funcall`, so a deep
//! but legal nesting can outrun a small host thread stack long before
//! `max-lisp-eval-depth` is reached. Growing the stack on demand keeps that
//! ceiling the only limit, whatever thread the embedder evaluates on.

/// Headroom that must remain before the next evaluation step.
const RED_ZONE: usize = 256 * 1024;

/// Size of each additional stack segment.
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

/// Run `f`, first moving to a fresh stack segment if headroom is short.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
