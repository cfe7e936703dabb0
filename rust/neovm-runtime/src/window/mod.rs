//! Frames and keyboards as binding contexts.
//!
//! Frame-local variable bindings live in a frame's parameter alist. Each
//! frame belongs to one keyboard, and every keyboard carries a slot table for
//! variables forwarded into per-keyboard storage.

use crate::elisp::intern::SymId;
use crate::elisp::symbol::{make_binding_cell, BindingCell};
use crate::elisp::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KboardId(pub usize);

#[derive(Debug)]
pub struct Frame {
    pub id: FrameId,
    pub kboard: KboardId,
    /// Parameters, most recent first. Also holds frame-local bindings.
    params: Vec<BindingCell>,
}

impl Frame {
    pub fn param_binding(&self, symbol: SymId) -> Option<BindingCell> {
        self.params
            .iter()
            .find(|cell| cell.borrow().symbol == symbol)
            .cloned()
    }

    pub fn params(&self) -> &[BindingCell] {
        &self.params
    }

    /// Set a parameter, reusing its cell when one exists.
    pub fn set_param(&mut self, symbol: SymId, value: Value) {
        match self.param_binding(symbol) {
            Some(cell) => cell.borrow_mut().value = Some(value),
            None => self.params.insert(0, make_binding_cell(symbol, Some(value))),
        }
    }
}

/// Per-keyboard storage for forwarded variables.
#[derive(Debug, Default)]
pub struct Kboard {
    slots: Vec<Value>,
}

impl Kboard {
    pub fn slot(&self, offset: usize) -> Value {
        self.slots.get(offset).cloned().unwrap_or(Value::Nil)
    }

    pub(crate) fn set_slot(&mut self, offset: usize, value: Value) {
        if let Some(slot) = self.slots.get_mut(offset) {
            *slot = value;
        }
    }
}

/// Owns frames and keyboards and tracks the selected frame.
#[derive(Debug)]
pub struct FrameManager {
    frames: Vec<Frame>,
    selected: FrameId,
    next_id: u64,
    kboards: Vec<Kboard>,
    kboard_defaults: Vec<Value>,
}

impl Default for FrameManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameManager {
    /// One keyboard and one selected frame `F1`.
    pub fn new() -> Self {
        let mut manager = Self {
            frames: Vec::new(),
            selected: FrameId(0),
            next_id: 1,
            kboards: vec![Kboard::default()],
            kboard_defaults: Vec::new(),
        };
        let first = manager.create_frame(KboardId(0));
        manager.selected = first;
        manager
    }

    pub fn create_frame(&mut self, kboard: KboardId) -> FrameId {
        let id = FrameId(self.next_id);
        self.next_id += 1;
        let mut frame = Frame {
            id,
            kboard,
            params: Vec::new(),
        };
        frame.set_param(crate::elisp::intern::intern("name"), Value::string(format!("F{}", id.0)));
        self.frames.push(frame);
        id
    }

    /// A new keyboard whose slots start at the registered defaults.
    pub fn create_kboard(&mut self) -> KboardId {
        self.kboards.push(Kboard {
            slots: self.kboard_defaults.clone(),
        });
        KboardId(self.kboards.len() - 1)
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.iter().find(|f| f.id == id)
    }

    pub fn get_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.iter_mut().find(|f| f.id == id)
    }

    pub fn is_live(&self, id: FrameId) -> bool {
        self.get(id).is_some()
    }

    pub fn selected(&self) -> FrameId {
        self.selected
    }

    pub fn select(&mut self, id: FrameId) -> bool {
        if self.is_live(id) {
            self.selected = id;
            true
        } else {
            false
        }
    }

    pub fn ids(&self) -> Vec<FrameId> {
        self.frames.iter().map(|f| f.id).collect()
    }

    // -----------------------------------------------------------------------
    // Keyboard slots
    // -----------------------------------------------------------------------

    pub fn register_kboard_slot(&mut self, default: Value) -> usize {
        let offset = self.kboard_defaults.len();
        self.kboard_defaults.push(default.clone());
        for kboard in &mut self.kboards {
            kboard.slots.push(default.clone());
        }
        offset
    }

    /// The keyboard of the selected frame.
    pub fn current_kboard(&self) -> Option<&Kboard> {
        let kboard = self.get(self.selected)?.kboard;
        self.kboards.get(kboard.0)
    }

    pub fn current_kboard_mut(&mut self) -> Option<&mut Kboard> {
        let kboard = self.get(self.selected)?.kboard;
        self.kboards.get_mut(kboard.0)
    }
}
