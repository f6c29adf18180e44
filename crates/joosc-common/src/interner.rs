//! String interning for identifier and string-literal deduplication.
//!
//! The constant folder interns every folded string literal into a dense
//! `StringId`; the binder and checker intern identifiers into `Atom`s so
//! name comparisons are integer comparisons.

use rustc_hash::FxHashMap;
use std::fmt;

/// An interned string handle. Cheap to copy and compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u32);

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({})", self.0)
    }
}

/// A simple string interner backed by a growable table.
#[derive(Default)]
pub struct Interner {
    strings: Vec<String>,
    lookup: FxHashMap<String, u32>,
}

impl Interner {
    pub fn new() -> Self {
        Interner::default()
    }

    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(&id) = self.lookup.get(s) {
            return Atom(id);
        }
        let id = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), id);
        Atom(id)
    }

    pub fn resolve(&self, atom: Atom) -> &str {
        &self.strings[atom.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Dense id for a folded string-literal constant, starting at 0. Interning
/// is append-only and idempotent: the same string text always yields the
/// same id within one compile session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub u32);

#[derive(Default)]
pub struct ConstStringMap {
    interner: Interner,
}

impl ConstStringMap {
    pub fn new() -> Self {
        ConstStringMap::default()
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        StringId(self.interner.intern(s).0)
    }

    pub fn resolve(&self, id: StringId) -> &str {
        self.interner.resolve(Atom(id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut i = Interner::new();
        let a = i.intern("foo");
        let b = i.intern("foo");
        assert_eq!(a, b);
        assert_eq!(i.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let mut i = Interner::new();
        let a = i.intern("foo");
        let b = i.intern("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn string_ids_start_at_zero_and_are_dense() {
        let mut m = ConstStringMap::new();
        let a = m.intern("a1true");
        assert_eq!(a, StringId(0));
        let b = m.intern("other");
        assert_eq!(b, StringId(1));
        assert_eq!(m.resolve(a), "a1true");
    }
}
