//! Buffers as binding contexts.
//!
//! A buffer owns two kinds of per-buffer variable storage:
//! * an alist of shared binding cells for Lisp-level buffer-local variables,
//! * a slot table for variables forwarded into native per-buffer storage,
//!   each slot optionally paired with a "has local value" flag.
//!
//! Slot defaults live in the manager (`buffer_defaults`).

use crate::elisp::intern::SymId;
use crate::elisp::symbol::BindingCell;
use crate::elisp::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// Which per-buffer flag governs a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotIndex {
    /// Every buffer always has its own value; there is no flag.
    AlwaysLocal,
    /// Local only when the buffer's flag at this index is set.
    Flag(usize),
}

/// Location of a forwarded per-buffer variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferSlot {
    pub offset: usize,
    pub index: SlotIndex,
}

#[derive(Debug)]
pub struct Buffer {
    pub id: BufferId,
    pub name: String,
    /// Buffer-local bindings, most recent first.
    pub(crate) local_var_alist: Vec<BindingCell>,
    pub(crate) slots: Vec<Value>,
    pub(crate) local_flags: Vec<bool>,
}

impl Buffer {
    /// This buffer's own binding cell for `symbol`, if any.
    pub fn local_binding(&self, symbol: SymId) -> Option<BindingCell> {
        self.local_var_alist
            .iter()
            .find(|cell| cell.borrow().symbol == symbol)
            .cloned()
    }

    pub(crate) fn push_local_binding(&mut self, cell: BindingCell) {
        self.local_var_alist.insert(0, cell);
    }

    pub(crate) fn remove_local_binding(&mut self, symbol: SymId) -> Option<BindingCell> {
        let pos = self
            .local_var_alist
            .iter()
            .position(|cell| cell.borrow().symbol == symbol)?;
        Some(self.local_var_alist.remove(pos))
    }

    pub fn local_bindings(&self) -> &[BindingCell] {
        &self.local_var_alist
    }

    pub fn slot(&self, offset: usize) -> Value {
        self.slots.get(offset).cloned().unwrap_or(Value::Nil)
    }

    pub(crate) fn set_slot(&mut self, offset: usize, value: Value) {
        if let Some(slot) = self.slots.get_mut(offset) {
            *slot = value;
        }
    }

    pub fn local_flag(&self, index: usize) -> bool {
        self.local_flags.get(index).copied().unwrap_or(false)
    }

    pub(crate) fn set_local_flag(&mut self, index: usize, value: bool) {
        if let Some(flag) = self.local_flags.get_mut(index) {
            *flag = value;
        }
    }

    /// Whether the slot holds a value of this buffer's own.
    pub fn slot_is_local(&self, slot: BufferSlot) -> bool {
        match slot.index {
            SlotIndex::AlwaysLocal => true,
            SlotIndex::Flag(idx) => self.local_flag(idx),
        }
    }
}

/// Owns all live buffers and tracks the current one.
#[derive(Debug)]
pub struct BufferManager {
    buffers: Vec<Buffer>,
    current: BufferId,
    next_id: u64,
    /// `buffer_defaults`: default value of each per-buffer slot.
    defaults: Vec<Value>,
    /// Variable name of each slot, by offset.
    slot_names: Vec<SymId>,
    slot_kinds: Vec<SlotIndex>,
    flag_count: usize,
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferManager {
    /// A manager holding a single `*scratch*` buffer, which is current.
    pub fn new() -> Self {
        let mut manager = Self {
            buffers: Vec::new(),
            current: BufferId(0),
            next_id: 1,
            defaults: Vec::new(),
            slot_names: Vec::new(),
            slot_kinds: Vec::new(),
            flag_count: 0,
        };
        let scratch = manager.create_buffer("*scratch*");
        manager.current = scratch;
        manager
    }

    pub fn create_buffer(&mut self, name: &str) -> BufferId {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.buffers.push(Buffer {
            id,
            name: name.to_string(),
            local_var_alist: Vec::new(),
            slots: self.defaults.clone(),
            local_flags: vec![false; self.flag_count],
        });
        tracing::trace!(buffer = id.0, name, "created buffer");
        id
    }

    pub fn find_buffer_by_name(&self, name: &str) -> Option<BufferId> {
        self.buffers.iter().find(|b| b.name == name).map(|b| b.id)
    }

    pub fn get(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut Buffer> {
        self.buffers.iter_mut().find(|b| b.id == id)
    }

    pub fn is_live(&self, id: BufferId) -> bool {
        self.get(id).is_some()
    }

    pub fn current_id(&self) -> BufferId {
        self.current
    }

    pub fn current(&self) -> Option<&Buffer> {
        self.get(self.current)
    }

    pub fn current_mut(&mut self) -> Option<&mut Buffer> {
        let id = self.current;
        self.get_mut(id)
    }

    /// Make `id` current. Returns false for a dead buffer.
    pub fn set_current(&mut self, id: BufferId) -> bool {
        if self.is_live(id) {
            self.current = id;
            true
        } else {
            false
        }
    }

    pub fn ids(&self) -> Vec<BufferId> {
        self.buffers.iter().map(|b| b.id).collect()
    }

    /// Kill a buffer. The last live buffer cannot be killed; when the current
    /// buffer dies another one becomes current.
    pub fn kill_buffer(&mut self, id: BufferId) -> bool {
        if self.buffers.len() <= 1 {
            return false;
        }
        let Some(pos) = self.buffers.iter().position(|b| b.id == id) else {
            return false;
        };
        self.buffers.remove(pos);
        if self.current == id {
            self.current = self.buffers[0].id;
        }
        tracing::trace!(buffer = id.0, "killed buffer");
        true
    }

    // -----------------------------------------------------------------------
    // Per-buffer slot table
    // -----------------------------------------------------------------------

    /// Allocate a slot for a forwarded per-buffer variable, seeding every
    /// existing buffer with `default`.
    pub fn register_slot(&mut self, name: SymId, default: Value, always_local: bool) -> BufferSlot {
        let offset = self.defaults.len();
        let index = if always_local {
            SlotIndex::AlwaysLocal
        } else {
            let idx = self.flag_count;
            self.flag_count += 1;
            SlotIndex::Flag(idx)
        };
        self.defaults.push(default.clone());
        self.slot_names.push(name);
        self.slot_kinds.push(index);
        for buffer in &mut self.buffers {
            buffer.slots.push(default.clone());
            if matches!(index, SlotIndex::Flag(_)) {
                buffer.local_flags.push(false);
            }
        }
        BufferSlot { offset, index }
    }

    pub fn slot_default(&self, offset: usize) -> Value {
        self.defaults.get(offset).cloned().unwrap_or(Value::Nil)
    }

    /// Store a new default and propagate it to every buffer that does not
    /// hold a local value for the slot.
    pub fn set_slot_default(&mut self, slot: BufferSlot, value: Value) {
        if let Some(default) = self.defaults.get_mut(slot.offset) {
            *default = value.clone();
        }
        if let SlotIndex::Flag(idx) = slot.index {
            for buffer in &mut self.buffers {
                if !buffer.local_flag(idx) {
                    buffer.set_slot(slot.offset, value.clone());
                }
            }
        }
    }

    /// Every registered slot with its variable name.
    pub fn slots(&self) -> impl Iterator<Item = (SymId, BufferSlot)> + '_ {
        self.slot_names
            .iter()
            .zip(self.slot_kinds.iter())
            .enumerate()
            .map(|(offset, (name, index))| {
                (
                    *name,
                    BufferSlot {
                        offset,
                        index: *index,
                    },
                )
            })
    }
}
