//! Per-buffer variables forwarded into buffer slots.
//!
//! Flag slots track a default until a buffer sets its own value; always-local
//! slots give every buffer a value of its own from creation on.

use super::intern::intern;
use super::symbol::Obarray;
use super::value::Value;
use crate::buffer::BufferManager;

/// `(name, default, type predicate)` for slots that follow the default.
fn flag_vars() -> Vec<(&'static str, Value, Option<&'static str>)> {
    vec![
        ("fill-column", Value::Int(70), Some("integerp")),
        ("tab-width", Value::Int(8), Some("integerp")),
        ("left-margin", Value::Int(0), Some("integerp")),
        ("case-fold-search", Value::True, None),
        ("truncate-lines", Value::Nil, None),
        ("word-wrap", Value::Nil, None),
    ]
}

fn always_local_vars() -> Vec<(&'static str, Value, Option<&'static str>)> {
    vec![
        ("buffer-file-name", Value::Nil, Some("stringp")),
        ("major-mode", Value::symbol("fundamental-mode"), Some("symbolp")),
        ("mode-name", Value::string("Fundamental"), None),
        ("buffer-undo-list", Value::Nil, None),
    ]
}

/// Allocate the slots and define the forwarded variables.
pub fn register_buffer_vars(obarray: &mut Obarray, buffers: &mut BufferManager) {
    for (always_local, table) in [(false, flag_vars()), (true, always_local_vars())] {
        for (name, default, predicate) in table {
            let slot = buffers.register_slot(intern(name), default, always_local);
            obarray.defvar_per_buffer(name, slot, predicate);
        }
    }
    // Hook variables that only ever hold plain Lisp values.
    for hook in ["kill-buffer-hook", "buffer-list-update-hook"] {
        let sym = intern(hook);
        obarray.set_special(sym, true);
        obarray.set_value_cell(sym, super::symbol::SymbolValue::Plain(Some(Value::Nil)));
    }
}

#[cfg(test)]
mod tests {
    use crate::elisp::tests_support::eval_all;

    #[test]
    fn flag_slots_start_at_their_defaults() {
        let results = eval_all(
            "fill-column
             (local-variable-p 'fill-column)
             (local-variable-if-set-p 'fill-column)
             major-mode
             (local-variable-p 'major-mode)",
        );
        assert_eq!(
            results,
            vec!["OK 70", "OK nil", "OK t", "OK fundamental-mode", "OK t"]
        );
    }

    #[test]
    fn always_local_slots_are_independent_per_buffer() {
        let results = eval_all(
            "(setq major-mode 'text-mode)
             (with-current-buffer (get-buffer-create \"fresh\") major-mode)
             (default-value 'major-mode)",
        );
        assert_eq!(results[1], "OK fundamental-mode");
        assert_eq!(results[2], "OK fundamental-mode");
    }

    #[test]
    fn let_of_unset_flag_slot_binds_the_default() {
        let results = eval_all(
            "(setq other (get-buffer-create \"other\"))
             (let ((tab-width 4)) (with-current-buffer other tab-width))
             tab-width",
        );
        assert_eq!(results[1], "OK 4");
        assert_eq!(results[2], "OK 8");
    }
}
