//! A dynamically scoped Lisp runtime in the manner of the Emacs core.

pub mod buffer;
pub mod elisp;
pub mod window;
