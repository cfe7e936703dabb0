//! Symbol value resolution.
//!
//! Reads and writes go through here so that alias chains, buffer-local and
//! frame-local bindings and native forwards are all honored. Nothing outside
//! this module should look at a [`SymbolValue`] to find a variable's value.

use std::cell::RefCell;
use std::rc::Rc;

use super::error::{error_message, signal, wrong_type, EvalResult, Flow};
use super::eval::Evaluator;
use super::forward::Forward;
use super::intern::{intern, resolve_sym, SymId};
use super::symbol::{
    is_keyword, make_binding_cell, BindingCell, BufferLocalValue, Context, SymbolValue,
};
use super::value::{eq_value, Value};
use crate::buffer::{BufferId, SlotIndex};
use crate::window::FrameId;

type Blv = Rc<RefCell<BufferLocalValue>>;

pub(crate) fn context_value(context: Context) -> Value {
    match context {
        Context::Buffer(id) => Value::Buffer(id),
        Context::Frame(id) => Value::Frame(id),
    }
}

impl Evaluator {
    // -----------------------------------------------------------------------
    // Binding lookup
    // -----------------------------------------------------------------------

    /// The context a localized variable should currently see.
    fn requesting_context(&self, blv: &BufferLocalValue) -> Context {
        if blv.frame_local {
            Context::Frame(self.frames.selected())
        } else {
            Context::Buffer(self.buffers.current_id())
        }
    }

    fn context_binding(&self, symbol: SymId, context: Context) -> Option<BindingCell> {
        match context {
            Context::Buffer(id) => self.buffers.get(id)?.local_binding(symbol),
            Context::Frame(id) => self.frames.get(id)?.param_binding(symbol),
        }
    }

    /// Write the forwarded value back into the loaded cell.
    fn flush_blv_forward(blv: &BufferLocalValue) {
        if let Some(value) = blv.fwd.as_ref().and_then(Forward::get_global) {
            blv.valcell.borrow_mut().value = Some(value);
        }
    }

    /// Load the binding of the requesting context into `blv`, unless it is
    /// loaded already.
    pub(crate) fn swap_in_symval_forwarding(&mut self, symbol: SymId, blv: &Blv) -> Result<(), Flow> {
        let wanted = self.requesting_context(&blv.borrow());
        if blv.borrow().where_ == Some(wanted) {
            return Ok(());
        }
        let mut blv = blv.borrow_mut();
        Self::flush_blv_forward(&blv);
        let cell = self
            .context_binding(symbol, wanted)
            .unwrap_or_else(|| Rc::clone(&blv.defcell));
        blv.where_ = Some(wanted);
        blv.valcell = cell;
        if let Some(fwd) = &blv.fwd {
            if let Some(value) = blv.valcell.borrow().value.clone() {
                fwd.store_global(value)?;
            }
        }
        tracing::trace!(symbol = %symbol, context = ?wanted, found = blv.found(), "swapped in binding");
        Ok(())
    }

    /// Load the default binding, so a context's own binding can be changed
    /// without confusing the cache.
    pub(crate) fn swap_in_global_binding(&mut self, blv: &Blv) -> Result<(), Flow> {
        let mut blv = blv.borrow_mut();
        Self::flush_blv_forward(&blv);
        blv.valcell = Rc::clone(&blv.defcell);
        if let Some(fwd) = &blv.fwd {
            if let Some(value) = blv.defcell.borrow().value.clone() {
                fwd.store_global(value)?;
            }
        }
        blv.where_ = None;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Get / Set
    // -----------------------------------------------------------------------

    /// The value `symbol` currently has, or `None` when it is void.
    pub fn find_symbol_value(&mut self, symbol: SymId) -> Result<Option<Value>, Flow> {
        let sym = self.obarray.indirect_variable(symbol)?;
        match self.obarray.value_cell(sym) {
            SymbolValue::Plain(value) => Ok(value),
            SymbolValue::Localized(blv) => {
                self.swap_in_symval_forwarding(sym, &blv)?;
                let blv = blv.borrow();
                let value = match blv.fwd.as_ref().and_then(Forward::get_global) {
                    Some(value) => Some(value),
                    None => blv.valcell.borrow().value.clone(),
                };
                Ok(value)
            }
            SymbolValue::Forwarded(fwd) => Ok(Some(fwd.get(&self.buffers, &self.frames))),
            SymbolValue::Alias(_) => Ok(None),
        }
    }

    /// `symbol-value`.
    pub fn symbol_value_of(&mut self, symbol: SymId) -> EvalResult {
        self.find_symbol_value(symbol)?
            .ok_or_else(|| signal("void-variable", vec![Value::from_sym(symbol)]))
    }

    pub fn boundp(&mut self, symbol: SymId) -> Result<bool, Flow> {
        Ok(self.find_symbol_value(symbol)?.is_some())
    }

    /// Store `newval` (`None` makes the variable void) in the binding
    /// selected by `where_`, defaulting to the current buffer or the
    /// selected frame.
    ///
    /// With `bindflag` set a variable that is local-if-set does not grow a
    /// new buffer-local binding, so `let` never creates one.
    pub fn set_internal(
        &mut self,
        symbol: SymId,
        newval: Option<Value>,
        where_: Option<Context>,
        bindflag: bool,
    ) -> Result<(), Flow> {
        if self.obarray.is_constant(symbol) {
            let self_valued = is_keyword(symbol)
                && matches!(&newval, Some(v) if eq_value(v, &Value::Keyword(symbol)));
            if self_valued {
                return Ok(());
            }
            return Err(signal("setting-constant", vec![Value::from_sym(symbol)]));
        }
        let sym = self.obarray.indirect_variable(symbol)?;
        match self.obarray.value_cell(sym) {
            SymbolValue::Plain(_) | SymbolValue::Alias(_) => {
                self.obarray.set_value_cell(sym, SymbolValue::Plain(newval));
                Ok(())
            }
            SymbolValue::Localized(blv) => self.set_localized(sym, &blv, newval, where_, bindflag),
            SymbolValue::Forwarded(fwd) => {
                let buffer = match where_ {
                    Some(Context::Buffer(id)) => id,
                    _ => self.buffers.current_id(),
                };
                if let Some(slot) = fwd.buffer_slot() {
                    if let SlotIndex::Flag(idx) = slot.index {
                        if !bindflag && !self.let_shadows_buffer_binding_p(sym) {
                            if let Some(buf) = self.buffers.get_mut(buffer) {
                                buf.set_local_flag(idx, true);
                            }
                        }
                    }
                }
                match newval {
                    // Making a forwarded variable void detaches it from its
                    // native storage for good.
                    None => {
                        self.obarray.set_value_cell(sym, SymbolValue::Plain(None));
                        Ok(())
                    }
                    Some(value) => fwd.store(value, buffer, &mut self.buffers, &mut self.frames),
                }
            }
        }
    }

    fn set_localized(
        &mut self,
        sym: SymId,
        blv: &Blv,
        newval: Option<Value>,
        where_: Option<Context>,
        bindflag: bool,
    ) -> Result<(), Flow> {
        let where_ = match where_ {
            Some(context) => context,
            None => self.requesting_context(&blv.borrow()),
        };
        let stale = {
            let blv = blv.borrow();
            blv.where_ != Some(where_) || !blv.found()
        };
        if stale {
            let shadowed = self.let_shadows_buffer_binding_p(sym);
            let mut blv = blv.borrow_mut();
            Self::flush_blv_forward(&blv);
            let cell = match self.context_binding(sym, where_) {
                Some(cell) => cell,
                None if bindflag || !blv.local_if_set || shadowed => Rc::clone(&blv.defcell),
                None => {
                    // Local-if-set and really being set: this buffer gets a
                    // binding of its own, seeded from the default.
                    let cell = make_binding_cell(sym, blv.defcell.borrow().value.clone());
                    if let Context::Buffer(id) = where_ {
                        if let Some(buf) = self.buffers.get_mut(id) {
                            buf.push_local_binding(Rc::clone(&cell));
                        }
                    }
                    cell
                }
            };
            blv.where_ = Some(where_);
            blv.valcell = cell;
        }
        let mut blv = blv.borrow_mut();
        blv.valcell.borrow_mut().value = newval.clone();
        match newval {
            None => blv.fwd = None,
            Some(value) => {
                if let Some(fwd) = &blv.fwd {
                    fwd.store_global(value)?;
                }
            }
        }
        Ok(())
    }

    /// `set`.
    pub fn set(&mut self, symbol: SymId, value: Value) -> Result<(), Flow> {
        self.set_internal(symbol, Some(value), None, false)
    }

    pub fn makunbound(&mut self, symbol: SymId) -> Result<(), Flow> {
        self.set_internal(symbol, None, None, false)
    }

    // -----------------------------------------------------------------------
    // Default values
    // -----------------------------------------------------------------------

    /// The value seen by contexts without a binding of their own.
    pub fn default_value(&mut self, symbol: SymId) -> Result<Option<Value>, Flow> {
        let sym = self.obarray.indirect_variable(symbol)?;
        match self.obarray.value_cell(sym) {
            SymbolValue::Plain(value) => Ok(value),
            SymbolValue::Localized(blv) => {
                let blv = blv.borrow();
                // With the default loaded the forward may be fresher than the
                // cell, since a plain set only writes the forward.
                if !blv.found() {
                    if let Some(value) = blv.fwd.as_ref().and_then(Forward::get_global) {
                        return Ok(Some(value));
                    }
                }
                let value = blv.defcell.borrow().value.clone();
                Ok(value)
            }
            SymbolValue::Forwarded(fwd) => match fwd.buffer_slot() {
                Some(slot) if slot.index != SlotIndex::AlwaysLocal => {
                    Ok(Some(self.buffers.slot_default(slot.offset)))
                }
                _ => Ok(Some(fwd.get(&self.buffers, &self.frames))),
            },
            SymbolValue::Alias(_) => Ok(None),
        }
    }

    /// `set-default`: store the value seen by contexts without a binding of
    /// their own.
    pub fn set_default(&mut self, symbol: SymId, value: Option<Value>) -> Result<(), Flow> {
        if self.obarray.is_constant(symbol) {
            let current = self.default_value(symbol)?;
            let self_valued = is_keyword(symbol)
                && matches!((&value, &current), (Some(v), Some(c)) if eq_value(v, c));
            if self_valued {
                return Ok(());
            }
            return Err(signal("setting-constant", vec![Value::from_sym(symbol)]));
        }
        let sym = self.obarray.indirect_variable(symbol)?;
        match self.obarray.value_cell(sym) {
            SymbolValue::Plain(_) | SymbolValue::Alias(_) => {
                self.set_internal(symbol, value, None, false)
            }
            SymbolValue::Localized(blv) => {
                let blv = blv.borrow();
                blv.defcell.borrow_mut().value = value.clone();
                if !blv.found() {
                    if let (Some(fwd), Some(value)) = (&blv.fwd, value) {
                        fwd.store_global(value)?;
                    }
                }
                Ok(())
            }
            SymbolValue::Forwarded(fwd) => match fwd.buffer_slot() {
                Some(slot) => {
                    self.buffers
                        .set_slot_default(slot, value.unwrap_or(Value::Nil));
                    Ok(())
                }
                None => self.set_internal(symbol, value, None, false),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Making variables local
    // -----------------------------------------------------------------------

    fn warn_message(&mut self, text: String) {
        tracing::warn!("{}", text);
        self.message(text);
    }

    fn may_not_be(kind: &str, variable: SymId) -> Flow {
        error_message(format!("Symbol {} may not be {}", resolve_sym(variable), kind))
    }

    /// `make-variable-buffer-local`: the variable becomes local in any
    /// buffer where it is set.
    pub fn make_variable_buffer_local(&mut self, variable: SymId) -> Result<(), Flow> {
        let sym = self.obarray.indirect_variable(variable)?;
        let (existing, default, fwd) = match self.obarray.value_cell(sym) {
            SymbolValue::Plain(value) => (None, value.or(Some(Value::Nil)), None),
            SymbolValue::Localized(blv) => {
                if blv.borrow().frame_local {
                    return Err(Self::may_not_be("buffer-local", variable));
                }
                (Some(blv), None, None)
            }
            SymbolValue::Forwarded(fwd) => {
                if fwd.is_kboard() {
                    return Err(Self::may_not_be("buffer-local", variable));
                }
                if fwd.buffer_slot().is_some() {
                    return Ok(());
                }
                (None, fwd.get_global(), Some(fwd))
            }
            SymbolValue::Alias(_) => (None, Some(Value::Nil), None),
        };
        if self.obarray.is_constant(sym) {
            return Err(Self::may_not_be("buffer-local", variable));
        }
        let blv = match existing {
            Some(blv) => blv,
            None => {
                let blv = Rc::new(RefCell::new(BufferLocalValue::new(sym, default, fwd, false)));
                self.obarray
                    .set_value_cell(sym, SymbolValue::Localized(Rc::clone(&blv)));
                if self.let_shadows_global_binding_p(sym) {
                    self.warn_message(format!(
                        "Making {} buffer-local while let-bound!",
                        resolve_sym(variable)
                    ));
                }
                blv
            }
        };
        blv.borrow_mut().local_if_set = true;
        Ok(())
    }

    /// `make-local-variable`: give the current buffer a binding of its own,
    /// starting out with the value the variable had.
    pub fn make_local_variable(&mut self, variable: SymId) -> Result<(), Flow> {
        let sym = self.obarray.indirect_variable(variable)?;
        let (blv, seed, buffer_forward) = match self.obarray.value_cell(sym) {
            SymbolValue::Plain(value) => (None, (value, None), false),
            SymbolValue::Localized(blv) => {
                if blv.borrow().frame_local {
                    return Err(Self::may_not_be("buffer-local", variable));
                }
                (Some(blv), (None, None), false)
            }
            SymbolValue::Forwarded(fwd) => {
                if fwd.is_kboard() {
                    return Err(Self::may_not_be("buffer-local", variable));
                }
                let per_buffer = fwd.buffer_slot().is_some();
                (None, (fwd.get_global(), Some(fwd)), per_buffer)
            }
            SymbolValue::Alias(_) => (None, (None, None), false),
        };
        if self.obarray.is_constant(sym) {
            return Err(Self::may_not_be("buffer-local", variable));
        }

        let local_if_set = blv
            .as_ref()
            .map(|blv| blv.borrow().local_if_set)
            .unwrap_or(buffer_forward);
        if local_if_set {
            // Setting the variable to its own value creates the binding.
            let value = self.find_symbol_value(variable)?;
            return self.set_internal(variable, value, None, false);
        }

        let blv = match blv {
            Some(blv) => blv,
            None => {
                let (default, fwd) = seed;
                let blv = Rc::new(RefCell::new(BufferLocalValue::new(sym, default, fwd, false)));
                self.obarray
                    .set_value_cell(sym, SymbolValue::Localized(Rc::clone(&blv)));
                if self.let_shadows_global_binding_p(sym) {
                    let buffer_name = self
                        .buffers
                        .current()
                        .map(|b| b.name.clone())
                        .unwrap_or_default();
                    self.warn_message(format!(
                        "Making {} local to {} while let-bound!",
                        resolve_sym(variable),
                        buffer_name
                    ));
                }
                blv
            }
        };

        let current = self.buffers.current_id();
        if self.context_binding(sym, Context::Buffer(current)).is_none() {
            if self.let_shadows_buffer_binding_p(sym) {
                self.warn_message(format!(
                    "Making {} buffer-local while locally let-bound!",
                    resolve_sym(variable)
                ));
            }
            // Unload any other buffer's binding and record the current value.
            self.find_symbol_value(sym)?;
            let cell = make_binding_cell(sym, blv.borrow().defcell.borrow().value.clone());
            if let Some(buf) = self.buffers.current_mut() {
                buf.push_local_binding(cell);
            }
            let mut blv = blv.borrow_mut();
            if blv.where_ == Some(Context::Buffer(current)) {
                blv.where_ = None;
            }
        }

        let forwarded = blv.borrow().fwd.is_some();
        if forwarded {
            self.swap_in_symval_forwarding(sym, &blv)?;
        }
        Ok(())
    }

    /// `kill-local-variable`: drop the current buffer's own binding.
    pub fn kill_local_variable(&mut self, variable: SymId) -> Result<(), Flow> {
        let sym = self.obarray.indirect_variable(variable)?;
        let blv = match self.obarray.value_cell(sym) {
            SymbolValue::Plain(_) | SymbolValue::Alias(_) => return Ok(()),
            SymbolValue::Forwarded(fwd) => {
                if let Some(slot) = fwd.buffer_slot() {
                    if let SlotIndex::Flag(idx) = slot.index {
                        let default = self.buffers.slot_default(slot.offset);
                        if let Some(buf) = self.buffers.current_mut() {
                            buf.set_local_flag(idx, false);
                            buf.set_slot(slot.offset, default);
                        }
                    }
                }
                return Ok(());
            }
            SymbolValue::Localized(blv) => blv,
        };
        if blv.borrow().frame_local {
            return Ok(());
        }
        let current = self.buffers.current_id();
        if let Some(buf) = self.buffers.current_mut() {
            buf.remove_local_binding(sym);
        }
        let reload = blv.borrow().where_ == Some(Context::Buffer(current));
        if reload {
            // Forget the loaded binding and load the default right away, so
            // a forwarded variable sees the default at once.
            blv.borrow_mut().where_ = None;
            self.find_symbol_value(sym)?;
        }
        Ok(())
    }

    /// `make-variable-frame-local`: let frame parameters named like the
    /// variable act as its frame-local bindings.
    pub fn make_variable_frame_local(&mut self, variable: SymId) -> Result<(), Flow> {
        let sym = self.obarray.indirect_variable(variable)?;
        let (default, fwd) = match self.obarray.value_cell(sym) {
            SymbolValue::Plain(value) => (value.or(Some(Value::Nil)), None),
            SymbolValue::Localized(blv) => {
                if blv.borrow().frame_local {
                    return Ok(());
                }
                return Err(Self::may_not_be("frame-local", variable));
            }
            SymbolValue::Forwarded(fwd) => {
                if fwd.is_kboard() || fwd.buffer_slot().is_some() {
                    return Err(Self::may_not_be("frame-local", variable));
                }
                (fwd.get_global(), Some(fwd))
            }
            SymbolValue::Alias(_) => (Some(Value::Nil), None),
        };
        if self.obarray.is_constant(sym) {
            return Err(Self::may_not_be("frame-local", variable));
        }
        let blv = BufferLocalValue::new(sym, default, fwd, true);
        self.obarray
            .set_value_cell(sym, SymbolValue::Localized(Rc::new(RefCell::new(blv))));
        if self.let_shadows_global_binding_p(sym) {
            self.warn_message(format!(
                "Making {} frame-local while let-bound!",
                resolve_sym(variable)
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// `local-variable-p`: whether `buffer` (default current) has its own
    /// binding.
    pub fn local_variable_p(&self, variable: SymId, buffer: Option<BufferId>) -> Result<bool, Flow> {
        let buffer = buffer.unwrap_or_else(|| self.buffers.current_id());
        let sym = self.obarray.indirect_variable(variable)?;
        match self.obarray.value_cell(sym) {
            SymbolValue::Plain(_) | SymbolValue::Alias(_) => Ok(false),
            SymbolValue::Localized(blv) => {
                let blv = blv.borrow();
                if blv.where_ == Some(Context::Buffer(buffer)) {
                    return Ok(blv.found());
                }
                Ok(self
                    .buffers
                    .get(buffer)
                    .is_some_and(|b| b.local_binding(sym).is_some()))
            }
            SymbolValue::Forwarded(fwd) => Ok(match fwd.buffer_slot() {
                Some(slot) => self
                    .buffers
                    .get(buffer)
                    .is_some_and(|b| b.slot_is_local(slot)),
                None => false,
            }),
        }
    }

    /// `local-variable-if-set-p`.
    pub fn local_variable_if_set_p(&self, variable: SymId, buffer: Option<BufferId>) -> Result<bool, Flow> {
        let sym = self.obarray.indirect_variable(variable)?;
        match self.obarray.value_cell(sym) {
            SymbolValue::Localized(blv) => {
                if blv.borrow().local_if_set {
                    return Ok(true);
                }
                self.local_variable_p(sym, buffer)
            }
            SymbolValue::Forwarded(fwd) => Ok(fwd.buffer_slot().is_some()),
            SymbolValue::Plain(_) | SymbolValue::Alias(_) => Ok(false),
        }
    }

    /// The terminal object of `frame`'s keyboard.
    pub(crate) fn frame_terminal(&self, frame: FrameId) -> Value {
        self.frames
            .get(frame)
            .map_or(Value::Nil, |f| Value::Terminal(f.kboard))
    }

    /// `variable-binding-locus`: the buffer, frame or terminal whose binding
    /// is in effect, or nil for the global binding.
    pub fn variable_binding_locus(&mut self, variable: SymId) -> EvalResult {
        self.find_symbol_value(variable)?;
        let sym = self.obarray.indirect_variable(variable)?;
        match self.obarray.value_cell(sym) {
            SymbolValue::Plain(_) | SymbolValue::Alias(_) => Ok(Value::Nil),
            SymbolValue::Forwarded(fwd) if fwd.is_kboard() => {
                Ok(self.frame_terminal(self.frames.selected()))
            }
            SymbolValue::Forwarded(fwd) if fwd.buffer_slot().is_none() => Ok(Value::Nil),
            cell => {
                if self.local_variable_p(sym, None)? {
                    return Ok(Value::Buffer(self.buffers.current_id()));
                }
                if let SymbolValue::Localized(blv) = cell {
                    let blv = blv.borrow();
                    if blv.found() {
                        return Ok(blv.where_.map(context_value).unwrap_or(Value::Nil));
                    }
                }
                Ok(Value::Nil)
            }
        }
    }

    /// `buffer-local-value`: the value `variable` has in `buffer`.
    pub fn buffer_local_value(&mut self, variable: SymId, buffer: BufferId) -> EvalResult {
        let sym = self.obarray.indirect_variable(variable)?;
        let value = match self.obarray.value_cell(sym) {
            SymbolValue::Plain(value) => value,
            SymbolValue::Localized(blv) => {
                let cell = self.context_binding(sym, Context::Buffer(buffer));
                match cell {
                    Some(cell) => {
                        Self::flush_blv_forward(&blv.borrow());
                        let value = cell.borrow().value.clone();
                        value
                    }
                    None => self.default_value(sym)?,
                }
            }
            SymbolValue::Forwarded(fwd) => match fwd.buffer_slot() {
                Some(slot) => self.buffers.get(buffer).map(|b| b.slot(slot.offset)),
                None => self.default_value(sym)?,
            },
            SymbolValue::Alias(_) => None,
        };
        value.ok_or_else(|| signal("void-variable", vec![Value::from_sym(variable)]))
    }

    /// `buffer-local-variables`: an alist of `buffer`'s own bindings. Void
    /// bindings appear as bare symbols.
    pub fn buffer_local_variables(&mut self, buffer: BufferId) -> Result<Value, Flow> {
        let Some(buf) = self.buffers.get(buffer) else {
            return Err(wrong_type("buffer-live-p", Value::Buffer(buffer)));
        };
        let cells: Vec<BindingCell> = buf.local_bindings().to_vec();
        let mut items = Vec::new();
        for cell in cells {
            let symbol = cell.borrow().symbol;
            if let SymbolValue::Localized(blv) = self.obarray.value_cell(symbol) {
                let blv = blv.borrow();
                if Rc::ptr_eq(&blv.valcell, &cell) {
                    Self::flush_blv_forward(&blv);
                }
            }
            let binding = cell.borrow();
            items.push(match &binding.value {
                Some(value) => Value::cons(Value::from_sym(symbol), value.clone()),
                None => Value::from_sym(symbol),
            });
        }
        if let Some(buf) = self.buffers.get(buffer) {
            for (name, slot) in self.buffers.slots() {
                if buf.slot_is_local(slot) {
                    items.push(Value::cons(Value::from_sym(name), buf.slot(slot.offset)));
                }
            }
        }
        Ok(Value::list(items))
    }

    // -----------------------------------------------------------------------
    // Aliases and indirection
    // -----------------------------------------------------------------------

    /// `defvaralias`: make `new_alias` share `base`'s value.
    pub fn defvaralias(&mut self, new_alias: SymId, base: SymId, docstring: Value) -> Result<(), Flow> {
        if self.obarray.is_constant(new_alias) {
            return Err(error_message("Cannot make a constant an alias"));
        }
        match self.obarray.value_cell(new_alias) {
            SymbolValue::Forwarded(_) => {
                return Err(error_message("Cannot make an internal variable an alias"))
            }
            SymbolValue::Localized(_) => {
                return Err(error_message(
                    "Don't know how to make a localized variable an alias",
                ))
            }
            SymbolValue::Plain(_) | SymbolValue::Alias(_) => {}
        }
        // Code that set the alias before it was declared still counts.
        if !self.boundp(base)? {
            let value = self.find_symbol_value(new_alias)?;
            self.set_internal(base, value, None, true)?;
        }
        if self.let_shadows_global_binding_p(new_alias) {
            return Err(error_message(
                "Don't know how to make a let-bound variable an alias",
            ));
        }
        self.obarray.set_special(new_alias, true);
        self.obarray.set_special(base, true);
        self.obarray.set_value_cell(new_alias, SymbolValue::Alias(base));
        let constant = self.obarray.is_constant(base);
        self.obarray.set_constant(new_alias, constant);
        self.obarray
            .put_property(new_alias, intern("variable-documentation"), docstring);
        tracing::debug!(alias = %new_alias, base = %base, "defined variable alias");
        Ok(())
    }

    /// Follow function-cell indirections. A void end of the chain yields nil.
    pub fn indirect_function(&self, object: &Value) -> EvalResult {
        let step = |v: &Value| -> Option<Value> {
            match v {
                Value::Nil => None,
                other => {
                    let sym = other.as_symbol_id()?;
                    Some(self.obarray.symbol_function(sym).unwrap_or(Value::Nil))
                }
            }
        };
        let mut hare = object.clone();
        let mut tortoise = object.clone();
        loop {
            let Some(next) = step(&hare) else { break };
            hare = next;
            let Some(next) = step(&hare) else { break };
            hare = next;
            tortoise = step(&tortoise).unwrap_or(Value::Nil);
            if eq_value(&hare, &tortoise) {
                return Err(signal("cyclic-function-indirection", vec![object.clone()]));
            }
        }
        Ok(hare)
    }

    /// Store a frame parameter. A frame-local variable whose binding for
    /// this frame is loaded first falls back to its global binding, so the
    /// parameter can change underneath it safely.
    pub fn store_frame_param(&mut self, frame: FrameId, prop: SymId, value: Value) -> Result<(), Flow> {
        let sym = self.obarray.indirect_variable(prop)?;
        if let SymbolValue::Localized(blv) = self.obarray.value_cell(sym) {
            let loaded_here = {
                let blv = blv.borrow();
                blv.frame_local && blv.found() && blv.where_ == Some(Context::Frame(frame))
            };
            if loaded_here {
                self.swap_in_global_binding(&blv)?;
            }
        }
        match self.frames.get_mut(frame) {
            Some(f) => {
                f.set_param(prop, value);
                Ok(())
            }
            None => Err(wrong_type("frame-live-p", Value::Frame(frame))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elisp::tests_support::{eval_all, eval_one};
    use proptest::prelude::*;

    #[test]
    fn three_cycle_alias_is_cyclic_indirection() {
        let mut ev = Evaluator::new();
        let (a, b, c) = (intern("cyc-a"), intern("cyc-b"), intern("cyc-c"));
        ev.obarray.set_value_cell(a, SymbolValue::Alias(b));
        ev.obarray.set_value_cell(b, SymbolValue::Alias(c));
        ev.obarray.set_value_cell(c, SymbolValue::Alias(a));
        match ev.find_symbol_value(a) {
            Err(Flow::Signal(sig)) => {
                assert_eq!(resolve_sym(sig.symbol), "cyclic-variable-indirection");
                assert_eq!(sig.data, Value::list(vec![Value::from_sym(a)]));
            }
            other => panic!("expected cyclic indirection, got {:?}", other),
        }
    }

    #[test]
    fn found_flag_follows_cell_identity() {
        let mut ev = Evaluator::new();
        let sym = intern("found-check");
        ev.set(sym, Value::Int(1)).expect("set");
        ev.make_local_variable(sym).expect("make local");
        ev.set(sym, Value::Int(2)).expect("set local");
        let SymbolValue::Localized(blv) = ev.obarray.value_cell(sym) else {
            panic!("not localized");
        };
        assert!(blv.borrow().found());
        assert!(!Rc::ptr_eq(&blv.borrow().defcell, &blv.borrow().valcell));
        ev.kill_local_variable(sym).expect("kill");
        ev.find_symbol_value(sym).expect("get");
        assert!(!blv.borrow().found());
        assert!(Rc::ptr_eq(&blv.borrow().defcell, &blv.borrow().valcell));
        assert_eq!(ev.find_symbol_value(sym).expect("get"), Some(Value::Int(1)));
    }

    #[test]
    fn repeated_reads_do_not_duplicate_bindings() {
        let mut ev = Evaluator::new();
        let sym = intern("swap-twice");
        ev.make_variable_buffer_local(sym).expect("auto local");
        ev.set(sym, Value::Int(7)).expect("set");
        let first = ev.find_symbol_value(sym).expect("get");
        let second = ev.find_symbol_value(sym).expect("get");
        assert_eq!(first, second);
        let count = ev
            .buffers
            .current()
            .expect("buffer")
            .local_bindings()
            .iter()
            .filter(|cell| cell.borrow().symbol == sym)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn let_does_not_make_auto_local_variable_local() {
        let results = eval_all(
            "(defvar auto-var 'global)
             (make-variable-buffer-local 'auto-var)
             (let ((auto-var 'bound)) (local-variable-p 'auto-var))
             (progn (setq auto-var 'mine) (local-variable-p 'auto-var))
             (default-value 'auto-var)",
        );
        assert_eq!(results[2], "OK nil");
        assert_eq!(results[3], "OK t");
        assert_eq!(results[4], "OK global");
    }

    #[test]
    fn buffer_local_values_are_per_buffer() {
        let results = eval_all(
            "(setq shared 'default)
             (setq other (get-buffer-create \"other\"))
             (make-local-variable 'shared)
             (setq shared 'scratch-only)
             (with-current-buffer other shared)
             (buffer-local-value 'shared (current-buffer))
             (buffer-local-value 'shared other)",
        );
        assert_eq!(results[4], "OK default");
        assert_eq!(results[5], "OK scratch-only");
        assert_eq!(results[6], "OK default");
    }

    #[test]
    fn per_buffer_default_propagates_to_unset_buffers() {
        let results = eval_all(
            "(setq a (get-buffer-create \"a\") b (get-buffer-create \"b\"))
             (with-current-buffer a (setq fill-column 5))
             (setq-default fill-column 10)
             (with-current-buffer a fill-column)
             (with-current-buffer b fill-column)
             (with-current-buffer a (local-variable-p 'fill-column))
             (with-current-buffer b (local-variable-p 'fill-column))",
        );
        assert_eq!(results[3], "OK 5");
        assert_eq!(results[4], "OK 10");
        assert_eq!(results[5], "OK t");
        assert_eq!(results[6], "OK nil");
    }

    #[test]
    fn per_buffer_variable_rejects_wrong_type() {
        assert_eq!(
            eval_one("(setq fill-column \"wide\")"),
            "ERR (wrong-type-argument integerp \"wide\")"
        );
    }

    #[test]
    fn kill_local_variable_restores_slot_default() {
        let results = eval_all(
            "(setq fill-column 33)
             (kill-local-variable 'fill-column)
             fill-column",
        );
        assert_eq!(results[2], "OK 70");
    }

    #[test]
    fn setting_constants_fails_except_keywords_to_themselves() {
        assert_eq!(eval_one("(setq t 1)"), "ERR (setting-constant t)");
        assert_eq!(eval_one("(set :kw :kw)"), "OK :kw");
        assert_eq!(eval_one("(set :kw 2)"), "ERR (setting-constant :kw)");
    }

    #[test]
    fn makunbound_detaches_forwarded_variable() {
        let results = eval_all(
            "(makunbound 'tab-width)
             (boundp 'tab-width)
             (setq tab-width 'anything)
             tab-width",
        );
        assert_eq!(results[1], "OK nil");
        assert_eq!(results[3], "OK anything");
    }

    #[test]
    fn local_variable_refusals_name_the_symbol() {
        assert_eq!(
            eval_one("(make-local-variable 'last-command)"),
            "ERR (error \"Symbol last-command may not be buffer-local\")"
        );
        assert_eq!(
            eval_one("(make-variable-frame-local 'fill-column)"),
            "ERR (error \"Symbol fill-column may not be frame-local\")"
        );
        assert_eq!(
            eval_one("(make-local-variable 'nil)"),
            "ERR (error \"Symbol nil may not be buffer-local\")"
        );
    }

    #[test]
    fn let_bound_localization_warns_without_failing() {
        let mut ev = Evaluator::new();
        let sym = intern("warned-var");
        ev.set(sym, Value::Int(1)).expect("set");
        let base = ev.specpdl_depth();
        ev.specbind(sym, Value::Int(2)).expect("bind");
        ev.make_variable_buffer_local(sym).expect("localize");
        assert!(ev
            .messages()
            .iter()
            .any(|m| m == "Making warned-var buffer-local while let-bound!"));
        ev.unbind_to(base).expect("unbind");
        assert_eq!(ev.default_value(sym).expect("default"), Some(Value::Int(1)));
    }

    #[test]
    fn frame_local_binding_follows_selected_frame() {
        let results = eval_all(
            "(defvar per-frame 'global)
             (make-variable-frame-local 'per-frame)
             (setq f2 (make-frame))
             (modify-frame-parameters f2 '((per-frame . second)))
             per-frame
             (progn (select-frame f2) per-frame)
             (variable-binding-locus 'per-frame)
             (let ((per-frame 1)) per-frame)",
        );
        assert_eq!(results[4], "OK global");
        assert_eq!(results[5], "OK second");
        assert!(results[6].starts_with("OK #<frame"));
        assert_eq!(
            results[7],
            "ERR (error \"Frame-local vars cannot be let-bound\")"
        );
    }

    #[test]
    fn defvaralias_shares_value_and_refuses_forwards() {
        let results = eval_all(
            "(setq old-name 5)
             (defvaralias 'new-name 'base-name)
             (setq new-name 6)
             base-name
             (defvaralias 'fill-column 'x)
             (let ((lb 1)) (defvaralias 'lb 'y))
             (defvaralias 'old-name 'seeded-base)
             seeded-base",
        );
        assert_eq!(results[3], "OK 6");
        assert_eq!(
            results[4],
            "ERR (error \"Cannot make an internal variable an alias\")"
        );
        assert_eq!(
            results[5],
            "ERR (error \"Don't know how to make a let-bound variable an alias\")"
        );
        assert_eq!(results[7], "OK 5");
    }

    #[test]
    fn indirect_function_detects_cycles() {
        let results = eval_all(
            "(fset 'f-one 'f-two)
             (fset 'f-two 'f-one)
             (indirect-function 'f-one)
             (fset 'f-end 'car)
             (indirect-function 'f-end)",
        );
        assert_eq!(results[2], "ERR (cyclic-function-indirection f-one)");
        assert_eq!(results[4], "OK #<subr car>");
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn slot_default_reaches_only_unset_buffers(
            overrides in proptest::collection::vec(proptest::option::of(-100i64..100), 1..6),
            default in -100i64..100,
        ) {
            let mut ev = Evaluator::new();
            let sym = intern("fill-column");
            let mut ids = Vec::new();
            for (i, local) in overrides.iter().enumerate() {
                let id = ev.buffers.create_buffer(&format!("prop-{i}"));
                if let Some(v) = local {
                    ev.set_internal(sym, Some(Value::Int(*v)), Some(Context::Buffer(id)), false)
                        .expect("set local");
                }
                ids.push(id);
            }
            ev.set_default(sym, Some(Value::Int(default))).expect("set default");
            for (id, local) in ids.iter().zip(&overrides) {
                let seen = ev.buffer_local_value(sym, *id).expect("value");
                prop_assert_eq!(seen, Value::Int(local.unwrap_or(default)));
            }
        }
    }
}
