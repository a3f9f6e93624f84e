//! String interning.
//!
//! Identifiers, path components, macro capture names, and file names are
//! interned once and referred to by `Symbol` afterwards, so equality is an
//! integer compare and the backing text is a shared reference-counted string.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Handle to an interned string. Identity equality after interning.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

impl Symbol {
    pub const EMPTY: Symbol = Symbol(0);

    pub fn intern(s: &str) -> Symbol {
        STORE.with(|store| store.borrow_mut().intern(s))
    }

    /// The backing text, shared.
    pub fn resolve(self) -> Rc<str> {
        STORE.with(|store| store.borrow().resolve(self))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_empty(self) -> bool {
        self == Symbol::EMPTY
    }

    /// Compare against a plain string without interning it.
    pub fn is(self, s: &str) -> bool {
        &*self.resolve() == s
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Symbol::EMPTY
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resolve())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.resolve())
    }
}

struct Store {
    map: HashMap<Rc<str>, Symbol>,
    vec: Vec<Rc<str>>,
}

impl Store {
    fn new() -> Self {
        let empty: Rc<str> = Rc::from("");
        Store {
            map: HashMap::from([(empty.clone(), Symbol(0))]),
            vec: vec![empty],
        }
    }

    fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.map.get(s) {
            return sym;
        }
        let rc: Rc<str> = Rc::from(s);
        let sym = Symbol(self.vec.len() as u32);
        self.vec.push(rc.clone());
        self.map.insert(rc, sym);
        sym
    }

    fn resolve(&self, sym: Symbol) -> Rc<str> {
        self.vec[sym.0 as usize].clone()
    }
}

thread_local! {
    static STORE: RefCell<Store> = RefCell::new(Store::new());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_returns_same_symbol_for_same_string() {
        let s1 = Symbol::intern("hello");
        let s2 = Symbol::intern("hello");
        assert_eq!(s1, s2);
    }

    #[test]
    fn intern_returns_different_symbols_for_different_strings() {
        let s1 = Symbol::intern("hello");
        let s2 = Symbol::intern("world");
        assert_ne!(s1, s2);
    }

    #[test]
    fn resolve_returns_original_string() {
        let sym = Symbol::intern("test");
        assert_eq!(&*sym.resolve(), "test");
    }

    #[test]
    fn empty_symbol_resolves_to_empty_string() {
        assert_eq!(&*Symbol::EMPTY.resolve(), "");
        assert!(Symbol::EMPTY.is_empty());
    }

    #[test]
    fn symbols_are_copy() {
        let s1 = Symbol::intern("copy_test");
        let s2 = s1;
        assert_eq!(s1, s2);
    }

    #[test]
    fn symbol_is_matches_interned_string() {
        let sym = Symbol::intern("probe");
        assert!(sym.is("probe"));
        assert!(!sym.is("Probe"));
    }

    #[test]
    fn display_shows_text() {
        let sym = Symbol::intern("shown");
        assert_eq!(format!("{}", sym), "shown");
    }
}
