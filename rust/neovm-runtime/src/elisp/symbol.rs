//! The obarray: one record per symbol holding its value cell, function cell,
//! property list and declaration flags.
//!
//! A value cell is tagged by how the value is reached:
//! * `Plain` holds the value (or nothing, meaning void),
//! * `Alias` redirects to another symbol,
//! * `Localized` holds a [`BufferLocalValue`] cache of per-context bindings,
//! * `Forwarded` delegates to native storage through a [`Forward`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::error::{signal, Flow};
use super::forward::Forward;
use super::intern::{intern, resolve_sym, SymId};
use super::value::Value;
use crate::buffer::{BufferId, BufferSlot};
use crate::window::FrameId;

/// A `(symbol . value)` binding cell shared between a context's alist and
/// any [`BufferLocalValue`] that has it loaded. `None` means void.
#[derive(Debug)]
pub struct Binding {
    pub symbol: SymId,
    pub value: Option<Value>,
}

pub type BindingCell = Rc<RefCell<Binding>>;

pub fn make_binding_cell(symbol: SymId, value: Option<Value>) -> BindingCell {
    Rc::new(RefCell::new(Binding { symbol, value }))
}

/// What a localized variable's cache is currently loaded for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Context {
    Buffer(BufferId),
    Frame(FrameId),
}

/// Cache of the binding a localized variable currently sees.
///
/// `valcell` is either `defcell` (the default binding is loaded) or a cell
/// owned by the context named in `where_`.
#[derive(Debug)]
pub struct BufferLocalValue {
    pub(crate) where_: Option<Context>,
    pub(crate) defcell: BindingCell,
    pub(crate) valcell: BindingCell,
    pub(crate) frame_local: bool,
    /// Setting the variable in a context without a binding creates one.
    pub(crate) local_if_set: bool,
    /// Native storage that mirrors the loaded binding.
    pub(crate) fwd: Option<Forward>,
}

impl BufferLocalValue {
    /// A cache loaded with only the default binding.
    pub fn new(symbol: SymId, default: Option<Value>, fwd: Option<Forward>, frame_local: bool) -> Self {
        let defcell = make_binding_cell(symbol, default);
        Self {
            where_: None,
            valcell: Rc::clone(&defcell),
            defcell,
            frame_local,
            local_if_set: false,
            fwd,
        }
    }

    /// Whether the loaded binding belongs to `where_` rather than the default.
    pub fn found(&self) -> bool {
        !Rc::ptr_eq(&self.defcell, &self.valcell)
    }

    pub fn is_frame_local(&self) -> bool {
        self.frame_local
    }

    pub fn is_local_if_set(&self) -> bool {
        self.local_if_set
    }

    pub fn loaded_context(&self) -> Option<Context> {
        self.where_
    }
}

#[derive(Clone, Debug)]
pub enum SymbolValue {
    Plain(Option<Value>),
    Alias(SymId),
    Localized(Rc<RefCell<BufferLocalValue>>),
    Forwarded(Forward),
}

/// The four kinds of value cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Redirect {
    Plain,
    Alias,
    Localized,
    Forwarded,
}

#[derive(Clone, Debug)]
pub struct SymbolData {
    pub(crate) value: SymbolValue,
    /// `None` means the function cell is void.
    pub(crate) function: Option<Value>,
    pub(crate) plist: Vec<(SymId, Value)>,
    /// Declared special: `let` always binds it dynamically.
    pub(crate) special: bool,
    pub(crate) constant: bool,
}

impl SymbolData {
    fn fresh(symbol: SymId) -> Self {
        let keyword = is_keyword_name(resolve_sym(symbol));
        Self {
            value: if keyword {
                SymbolValue::Plain(Some(Value::Keyword(symbol)))
            } else {
                SymbolValue::Plain(None)
            },
            function: None,
            plist: Vec::new(),
            special: keyword,
            constant: keyword,
        }
    }
}

fn is_keyword_name(name: &str) -> bool {
    name.len() > 1 && name.starts_with(':')
}

pub fn is_keyword(symbol: SymId) -> bool {
    is_keyword_name(resolve_sym(symbol))
}

/// Symbol table keyed by interned name.
#[derive(Debug)]
pub struct Obarray {
    symbols: HashMap<SymId, SymbolData>,
}

impl Default for Obarray {
    fn default() -> Self {
        Self::new()
    }
}

impl Obarray {
    pub fn new() -> Self {
        let mut obarray = Self {
            symbols: HashMap::new(),
        };
        for (name, value) in [("nil", Value::Nil), ("t", Value::True)] {
            let data = obarray.entry(intern(name));
            data.value = SymbolValue::Plain(Some(value));
            data.special = true;
            data.constant = true;
        }
        obarray
    }

    pub fn get(&self, symbol: SymId) -> Option<&SymbolData> {
        self.symbols.get(&symbol)
    }

    /// The record for `symbol`, creating it on first use.
    pub(crate) fn entry(&mut self, symbol: SymId) -> &mut SymbolData {
        self.symbols
            .entry(symbol)
            .or_insert_with(|| SymbolData::fresh(symbol))
    }

    // -----------------------------------------------------------------------
    // Value cell
    // -----------------------------------------------------------------------

    pub fn value_cell(&self, symbol: SymId) -> SymbolValue {
        match self.symbols.get(&symbol) {
            Some(data) => data.value.clone(),
            None => SymbolData::fresh(symbol).value,
        }
    }

    pub(crate) fn set_value_cell(&mut self, symbol: SymId, value: SymbolValue) {
        self.entry(symbol).value = value;
    }

    pub fn redirect(&self, symbol: SymId) -> Redirect {
        match self.symbols.get(&symbol).map(|d| &d.value) {
            None | Some(SymbolValue::Plain(_)) => Redirect::Plain,
            Some(SymbolValue::Alias(_)) => Redirect::Alias,
            Some(SymbolValue::Localized(_)) => Redirect::Localized,
            Some(SymbolValue::Forwarded(_)) => Redirect::Forwarded,
        }
    }

    fn alias_target(&self, symbol: SymId) -> Option<SymId> {
        match self.symbols.get(&symbol).map(|d| &d.value) {
            Some(SymbolValue::Alias(target)) => Some(*target),
            _ => None,
        }
    }

    /// Follow variable aliases to the symbol that holds the value.
    ///
    /// Runs a tortoise and a hare down the chain so a cycle is detected in
    /// bounded steps and reported as `cyclic-variable-indirection`.
    pub fn indirect_variable(&self, symbol: SymId) -> Result<SymId, Flow> {
        let mut hare = symbol;
        let mut tortoise = symbol;
        while let Some(next) = self.alias_target(hare) {
            hare = next;
            let Some(next) = self.alias_target(hare) else {
                break;
            };
            hare = next;
            tortoise = self.alias_target(tortoise).unwrap_or(tortoise);
            if hare == tortoise {
                return Err(signal(
                    "cyclic-variable-indirection",
                    vec![Value::from_sym(symbol)],
                ));
            }
        }
        Ok(hare)
    }

    // -----------------------------------------------------------------------
    // Flags
    // -----------------------------------------------------------------------

    pub fn is_special(&self, symbol: SymId) -> bool {
        match self.symbols.get(&symbol) {
            Some(data) => data.special,
            None => is_keyword(symbol),
        }
    }

    pub fn set_special(&mut self, symbol: SymId, special: bool) {
        self.entry(symbol).special = special;
    }

    pub fn is_constant(&self, symbol: SymId) -> bool {
        match self.symbols.get(&symbol) {
            Some(data) => data.constant,
            None => is_keyword(symbol),
        }
    }

    pub fn set_constant(&mut self, symbol: SymId, constant: bool) {
        self.entry(symbol).constant = constant;
    }

    // -----------------------------------------------------------------------
    // Function cell and plist
    // -----------------------------------------------------------------------

    pub fn symbol_function(&self, symbol: SymId) -> Option<Value> {
        self.symbols.get(&symbol).and_then(|d| d.function.clone())
    }

    pub fn set_symbol_function(&mut self, symbol: SymId, function: Option<Value>) {
        self.entry(symbol).function = function;
    }

    pub fn get_property(&self, symbol: SymId, property: SymId) -> Value {
        self.symbols
            .get(&symbol)
            .and_then(|d| d.plist.iter().find(|(k, _)| *k == property))
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Nil)
    }

    pub fn put_property(&mut self, symbol: SymId, property: SymId, value: Value) {
        let plist = &mut self.entry(symbol).plist;
        match plist.iter_mut().find(|(k, _)| *k == property) {
            Some(entry) => entry.1 = value,
            None => plist.push((property, value)),
        }
    }

    /// The plist as a flat Lisp list.
    pub fn symbol_plist(&self, symbol: SymId) -> Value {
        let items = self
            .symbols
            .get(&symbol)
            .map(|d| {
                d.plist
                    .iter()
                    .flat_map(|(k, v)| [Value::from_sym(*k), v.clone()])
                    .collect()
            })
            .unwrap_or_default();
        Value::list(items)
    }

    // -----------------------------------------------------------------------
    // Forwarded variable registration
    // -----------------------------------------------------------------------

    fn install_forward(&mut self, name: &str, fwd: Forward) -> SymId {
        let symbol = intern(name);
        let data = self.entry(symbol);
        data.value = SymbolValue::Forwarded(fwd);
        data.special = true;
        symbol
    }

    pub fn defvar_int(&mut self, name: &str, cell: Rc<std::cell::Cell<i64>>) -> SymId {
        self.install_forward(name, Forward::Int(cell))
    }

    pub fn defvar_bool(&mut self, name: &str, cell: Rc<std::cell::Cell<bool>>) -> SymId {
        self.install_forward(name, Forward::Bool(cell))
    }

    pub fn defvar_lisp(&mut self, name: &str, cell: Rc<RefCell<Value>>) -> SymId {
        self.install_forward(name, Forward::Obj(cell))
    }

    pub fn defvar_per_buffer(&mut self, name: &str, slot: BufferSlot, predicate: Option<&'static str>) -> SymId {
        self.install_forward(name, Forward::BufferObj { slot, predicate })
    }

    pub fn defvar_kboard(&mut self, name: &str, offset: usize) -> SymId {
        self.install_forward(name, Forward::KboardObj { offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sym(name: &str) -> SymId {
        intern(name)
    }

    #[test]
    fn nil_t_and_keywords_are_constant() {
        let obarray = Obarray::new();
        assert!(obarray.is_constant(sym("nil")));
        assert!(obarray.is_constant(sym("t")));
        assert!(obarray.is_constant(sym(":some-keyword")));
        assert!(!obarray.is_constant(sym("plain-variable")));
        match obarray.value_cell(sym(":some-keyword")) {
            SymbolValue::Plain(Some(Value::Keyword(id))) => assert_eq!(id, sym(":some-keyword")),
            other => panic!("unexpected keyword cell {:?}", other),
        }
    }

    #[test]
    fn alias_chain_resolves_to_base() {
        let mut obarray = Obarray::new();
        obarray.set_value_cell(sym("alias-a"), SymbolValue::Alias(sym("alias-b")));
        obarray.set_value_cell(sym("alias-b"), SymbolValue::Alias(sym("alias-c")));
        assert_eq!(obarray.indirect_variable(sym("alias-a")).unwrap(), sym("alias-c"));
        assert_eq!(obarray.redirect(sym("alias-a")), Redirect::Alias);
        assert_eq!(obarray.redirect(sym("alias-c")), Redirect::Plain);
    }

    #[test]
    fn self_alias_is_a_cycle() {
        let mut obarray = Obarray::new();
        obarray.set_value_cell(sym("loop-self"), SymbolValue::Alias(sym("loop-self")));
        assert!(obarray.indirect_variable(sym("loop-self")).is_err());
    }

    #[test]
    fn found_tracks_loaded_cell() {
        let mut blv = BufferLocalValue::new(sym("blv-var"), Some(Value::Int(1)), None, false);
        assert!(!blv.found());
        blv.valcell = make_binding_cell(sym("blv-var"), Some(Value::Int(2)));
        assert!(blv.found());
    }

    #[test]
    fn properties_round_trip() {
        let mut obarray = Obarray::new();
        obarray.put_property(sym("p-sym"), sym("color"), Value::symbol("red"));
        obarray.put_property(sym("p-sym"), sym("color"), Value::symbol("blue"));
        assert_eq!(obarray.get_property(sym("p-sym"), sym("color")), Value::symbol("blue"));
        assert!(obarray.get_property(sym("p-sym"), sym("size")).is_nil());
    }

    fn expected_resolution(links: &[Option<usize>], start: usize) -> Option<usize> {
        let mut seen = vec![false; links.len()];
        let mut node = start;
        loop {
            if seen[node] {
                return None;
            }
            seen[node] = true;
            match links[node] {
                Some(next) => node = next,
                None => return Some(node),
            }
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn alias_resolution_terminates(
            links in proptest::collection::vec(proptest::option::of(0usize..8), 8),
            start in 0usize..8,
        ) {
            let mut obarray = Obarray::new();
            let names: Vec<SymId> = (0..8).map(|i| sym(&format!("prop-alias-{i}"))).collect();
            for (i, link) in links.iter().enumerate() {
                if let Some(target) = link {
                    obarray.set_value_cell(names[i], SymbolValue::Alias(names[*target]));
                }
            }
            let resolved = obarray.indirect_variable(names[start]);
            match expected_resolution(&links, start) {
                Some(end) => prop_assert_eq!(resolved.ok(), Some(names[end])),
                None => prop_assert!(resolved.is_err()),
            }
        }
    }
}
