//! String interner for symbol and keyword names.
//!
//! Provides `SymId(u32)`, a compact `Copy` handle into an append-only
//! `StringInterner`. Symbol identity in the runtime is `SymId` equality, so
//! two reads of the same name always produce the same handle.
//!
//! The interner is thread-local: one runtime lives on one thread, and every
//! `Value::Symbol` carries only the handle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// A compact handle to an interned name. Copy, 4 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymId(pub(crate) u32);

impl SymId {
    /// The interned name.
    pub fn name(self) -> &'static str {
        resolve_sym(self)
    }
}

impl fmt::Debug for SymId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymId({}:{})", self.0, resolve_sym(*self))
    }
}

impl fmt::Display for SymId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(resolve_sym(*self))
    }
}

/// Append-only string interner. Guarantees: same string -> same SymId.
///
/// Names are leaked once on first intern so resolution can hand out
/// `&'static str` without holding the interner borrow.
#[derive(Default)]
pub struct StringInterner {
    strings: Vec<&'static str>,
    map: HashMap<&'static str, u32>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its unique id.
    pub fn intern(&mut self, s: &str) -> SymId {
        if let Some(&idx) = self.map.get(s) {
            return SymId(idx);
        }
        let idx = self.strings.len() as u32;
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        self.strings.push(leaked);
        self.map.insert(leaked, idx);
        SymId(idx)
    }

    #[inline]
    pub fn resolve(&self, id: SymId) -> &'static str {
        self.strings.get(id.0 as usize).copied().unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Thread-local interner access
// ---------------------------------------------------------------------------

thread_local! {
    static INTERNER: RefCell<StringInterner> = RefCell::new(StringInterner::new());
}

/// Intern a name in the thread-local interner.
pub fn intern(s: &str) -> SymId {
    INTERNER.with(|interner| interner.borrow_mut().intern(s))
}

/// Resolve a handle produced by [`intern`] on this thread.
pub fn resolve_sym(id: SymId) -> &'static str {
    INTERNER.with(|interner| interner.borrow().resolve(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_id() {
        let a = intern("foo-bar");
        let b = intern("foo-bar");
        assert_eq!(a, b);
        assert_ne!(a, intern("foo-baz"));
    }

    #[test]
    fn resolve_roundtrips_name() {
        let id = intern("cyclic-variable-indirection");
        assert_eq!(resolve_sym(id), "cyclic-variable-indirection");
        assert_eq!(id.to_string(), "cyclic-variable-indirection");
    }

    #[test]
    fn fresh_interner_is_independent() {
        let mut interner = StringInterner::new();
        assert!(interner.is_empty());
        let first = interner.intern("x");
        let second = interner.intern("y");
        assert_eq!(interner.intern("x"), first);
        assert_eq!(interner.resolve(second), "y");
        assert_eq!(interner.len(), 2);
    }
}
