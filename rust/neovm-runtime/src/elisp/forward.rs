//! Native storage behind forwarded variables.
//!
//! Each forward kind is a handle injected when the variable is registered:
//! global integers, booleans and objects share a cell with the Rust code that
//! reads them, per-buffer variables name a slot in every buffer, and
//! per-keyboard variables name a slot in every keyboard.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::error::{wrong_type, Flow};
use super::value::Value;
use crate::buffer::{BufferId, BufferManager, BufferSlot};
use crate::window::FrameManager;

#[derive(Clone, Debug)]
pub enum Forward {
    Int(Rc<Cell<i64>>),
    Bool(Rc<Cell<bool>>),
    Obj(Rc<RefCell<Value>>),
    BufferObj {
        slot: BufferSlot,
        /// Type predicate checked on store, e.g. `integerp`.
        predicate: Option<&'static str>,
    },
    KboardObj {
        offset: usize,
    },
}

impl Forward {
    pub fn buffer_slot(&self) -> Option<BufferSlot> {
        match self {
            Forward::BufferObj { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    pub fn is_kboard(&self) -> bool {
        matches!(self, Forward::KboardObj { .. })
    }

    /// Current value, reading per-buffer storage from the current buffer and
    /// per-keyboard storage from the selected frame's keyboard.
    pub fn get(&self, buffers: &BufferManager, frames: &FrameManager) -> Value {
        match self {
            Forward::Int(cell) => Value::Int(cell.get()),
            Forward::Bool(cell) => Value::bool(cell.get()),
            Forward::Obj(cell) => cell.borrow().clone(),
            Forward::BufferObj { slot, .. } => buffers
                .current()
                .map(|b| b.slot(slot.offset))
                .unwrap_or(Value::Nil),
            Forward::KboardObj { offset } => frames
                .current_kboard()
                .map(|k| k.slot(*offset))
                .unwrap_or(Value::Nil),
        }
    }

    /// Store `value`. Per-buffer storage is written in `buffer`.
    pub fn store(
        &self,
        value: Value,
        buffer: BufferId,
        buffers: &mut BufferManager,
        frames: &mut FrameManager,
    ) -> Result<(), Flow> {
        match self {
            Forward::Int(cell) => match value {
                Value::Int(n) => cell.set(n),
                other => return Err(wrong_type("integerp", other)),
            },
            Forward::Bool(cell) => cell.set(value.is_truthy()),
            Forward::Obj(cell) => *cell.borrow_mut() = value,
            Forward::BufferObj { slot, predicate } => {
                if let Some(predicate) = predicate {
                    if !value.is_nil() && !predicate_holds(predicate, &value) {
                        return Err(wrong_type(predicate, value));
                    }
                }
                if let Some(buf) = buffers.get_mut(buffer) {
                    buf.set_slot(slot.offset, value);
                }
            }
            Forward::KboardObj { offset } => {
                if let Some(kboard) = frames.current_kboard_mut() {
                    kboard.set_slot(*offset, value);
                }
            }
        }
        Ok(())
    }

    /// Value and store for forwards that need no context. Used by localized
    /// variables, which only ever carry global forwards.
    pub(crate) fn get_global(&self) -> Option<Value> {
        match self {
            Forward::Int(cell) => Some(Value::Int(cell.get())),
            Forward::Bool(cell) => Some(Value::bool(cell.get())),
            Forward::Obj(cell) => Some(cell.borrow().clone()),
            Forward::BufferObj { .. } | Forward::KboardObj { .. } => None,
        }
    }

    pub(crate) fn store_global(&self, value: Value) -> Result<(), Flow> {
        match self {
            Forward::Int(cell) => match value {
                Value::Int(n) => cell.set(n),
                other => return Err(wrong_type("integerp", other)),
            },
            Forward::Bool(cell) => cell.set(value.is_truthy()),
            Forward::Obj(cell) => *cell.borrow_mut() = value,
            Forward::BufferObj { .. } | Forward::KboardObj { .. } => {}
        }
        Ok(())
    }
}

fn predicate_holds(predicate: &str, value: &Value) -> bool {
    match predicate {
        "integerp" => value.is_integer(),
        "numberp" => value.is_number(),
        "stringp" => value.is_string(),
        "symbolp" => value.is_symbol(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elisp::intern::intern;

    #[test]
    fn int_forward_rejects_non_integers() {
        let cell = Rc::new(Cell::new(3));
        let fwd = Forward::Int(Rc::clone(&cell));
        let mut buffers = BufferManager::new();
        let mut frames = FrameManager::new();
        let current = buffers.current_id();
        fwd.store(Value::Int(9), current, &mut buffers, &mut frames)
            .expect("integer store");
        assert_eq!(cell.get(), 9);
        assert!(fwd
            .store(Value::string("x"), current, &mut buffers, &mut frames)
            .is_err());
        assert_eq!(fwd.get(&buffers, &frames), Value::Int(9));
    }

    #[test]
    fn bool_forward_stores_truthiness() {
        let cell = Rc::new(Cell::new(false));
        let fwd = Forward::Bool(Rc::clone(&cell));
        fwd.store_global(Value::Int(0)).expect("store");
        assert!(cell.get());
        fwd.store_global(Value::Nil).expect("store");
        assert_eq!(fwd.get_global(), Some(Value::Nil));
    }

    #[test]
    fn buffer_forward_checks_predicate() {
        let mut buffers = BufferManager::new();
        let mut frames = FrameManager::new();
        let slot = buffers.register_slot(intern("fwd-test-column"), Value::Int(70), false);
        let fwd = Forward::BufferObj {
            slot,
            predicate: Some("integerp"),
        };
        let current = buffers.current_id();
        fwd.store(Value::Int(12), current, &mut buffers, &mut frames)
            .expect("store");
        assert_eq!(fwd.get(&buffers, &frames), Value::Int(12));
        assert!(fwd
            .store(Value::symbol("wide"), current, &mut buffers, &mut frames)
            .is_err());
    }
}
