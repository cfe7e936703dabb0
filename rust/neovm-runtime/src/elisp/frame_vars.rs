//! Per-keyboard variables forwarded into keyboard slots.

use super::symbol::Obarray;
use super::value::Value;
use crate::window::FrameManager;

const KBOARD_VARS: &[&str] = &[
    "last-command",
    "real-last-command",
    "prefix-arg",
    "last-prefix-arg",
    "overriding-terminal-local-map",
    "default-minibuffer-frame",
];

/// Allocate a slot in every keyboard for each variable; all start at nil.
pub fn register_frame_vars(obarray: &mut Obarray, frames: &mut FrameManager) {
    for name in KBOARD_VARS {
        let offset = frames.register_kboard_slot(Value::Nil);
        obarray.defvar_kboard(name, offset);
    }
}
