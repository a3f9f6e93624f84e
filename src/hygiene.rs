//! Macro hygiene scopes.
//!
//! Every identifier carries the scope that was active when it was lexed.
//! Scopes form a tree: entering a macro expansion (or any construct the
//! parser decides to isolate) creates a child scope, and leaving it returns
//! to the parent. Name resolution later walks the parent chain to tell
//! same-spelled names from different expansion contexts apart.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::intern::Symbol;

static NEXT_SCOPE: AtomicU32 = AtomicU32::new(1);

#[derive(Debug)]
struct ScopeData {
    index: u32,
    parent: Hygiene,
}

/// An opaque scope identity with a parent link.
#[derive(Clone, Debug, Default)]
pub struct Hygiene(Option<Rc<ScopeData>>);

impl Hygiene {
    /// The file-level scope marker: no scope at all.
    pub fn none() -> Hygiene {
        Hygiene(None)
    }

    /// A fresh root scope.
    pub fn new_scope() -> Hygiene {
        Hygiene::chained(Hygiene::none())
    }

    /// A fresh scope chained under `parent`.
    pub fn new_scope_chained(parent: &Hygiene) -> Hygiene {
        Hygiene::chained(parent.clone())
    }

    fn chained(parent: Hygiene) -> Hygiene {
        let index = NEXT_SCOPE.fetch_add(1, Ordering::Relaxed);
        Hygiene(Some(Rc::new(ScopeData { index, parent })))
    }

    pub fn parent(&self) -> Hygiene {
        match &self.0 {
            Some(data) => data.parent.clone(),
            None => Hygiene::none(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// True if `other` is this scope or one of its descendants.
    pub fn contains(&self, other: &Hygiene) -> bool {
        if self.is_none() {
            return true;
        }
        let mut cur = other.clone();
        loop {
            if cur == *self {
                return true;
            }
            if cur.is_none() {
                return false;
            }
            cur = cur.parent();
        }
    }
}

impl PartialEq for Hygiene {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => a.index == b.index,
            _ => false,
        }
    }
}
impl Eq for Hygiene {}

impl fmt::Display for Hygiene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => write!(f, "{{file}}"),
            Some(data) => write!(f, "{{{}}}", data.index),
        }
    }
}

/// An identifier: interned name plus the scope it was lexed under.
///
/// Equality compares the name only; token-level matching (macro patterns,
/// keyword-ish identifier checks) is hygiene-insensitive. Use
/// [`Ident::same_scope`] when resolution needs the full identity.
#[derive(Clone, Debug)]
pub struct Ident {
    pub name: Symbol,
    pub hygiene: Hygiene,
}

impl Ident {
    pub fn new(name: Symbol, hygiene: Hygiene) -> Ident {
        Ident { name, hygiene }
    }

    /// An identifier with no scope, for synthesized tokens.
    pub fn plain(name: &str) -> Ident {
        Ident {
            name: Symbol::intern(name),
            hygiene: Hygiene::none(),
        }
    }

    pub fn same_scope(&self, other: &Ident) -> bool {
        self.name == other.name && self.hygiene == other.hygiene
    }
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Ident {}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_scopes_are_distinct() {
        let a = Hygiene::new_scope();
        let b = Hygiene::new_scope();
        assert_ne!(a, b);
    }

    #[test]
    fn chained_scope_has_parent() {
        let parent = Hygiene::new_scope();
        let child = Hygiene::new_scope_chained(&parent);
        assert_eq!(child.parent(), parent);
        assert_ne!(child, parent);
    }

    #[test]
    fn contains_walks_parent_chain() {
        let root = Hygiene::new_scope();
        let mid = Hygiene::new_scope_chained(&root);
        let leaf = Hygiene::new_scope_chained(&mid);
        assert!(root.contains(&leaf));
        assert!(mid.contains(&leaf));
        assert!(!leaf.contains(&root));
    }

    #[test]
    fn none_scope_contains_everything() {
        let any = Hygiene::new_scope();
        assert!(Hygiene::none().contains(&any));
    }

    #[test]
    fn ident_equality_ignores_hygiene() {
        let a = Ident::new(Symbol::intern("x"), Hygiene::new_scope());
        let b = Ident::new(Symbol::intern("x"), Hygiene::new_scope());
        assert_eq!(a, b);
        assert!(!a.same_scope(&b));
    }
}
