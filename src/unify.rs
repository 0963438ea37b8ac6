//! Structural unification over atoms.
//!
//! Two atoms unify when there is a single assignment of their variables that
//! makes them structurally equal. [`unify`] returns that assignment as
//! [`Bindings`], which can then be applied to any other atom.
//!
//! - Symbols unify iff equal.
//! - A variable unifies with any atom that does not contain it (occurs-check).
//! - Expressions unify iff they have the same arity and every child pair unifies
//!   under one consistent set of bindings.

use std::collections::HashMap;
use std::sync::Arc;

use crate::atom::Atom;

/// Variable assignments discovered by unification.
///
/// Values may themselves mention bound variables; [`Bindings::apply`] follows
/// those chains so the result never contains a variable that has a binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    map: HashMap<Arc<str>, Atom>,
}

impl Bindings {
    /// Create an empty set of bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw binding for a variable name (without `$`).
    pub fn get(&self, name: &str) -> Option<&Atom> {
        self.map.get(name)
    }

    /// Fully substituted value of a variable, if bound.
    pub fn resolve(&self, name: &str) -> Option<Atom> {
        self.get(name).map(|value| self.apply(value))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over raw `(name, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Atom)> {
        self.map.iter().map(|(name, value)| (&**name, value))
    }

    /// Substitute every bound variable in `atom`, producing a new atom.
    pub fn apply(&self, atom: &Atom) -> Atom {
        if self.map.is_empty() {
            return atom.clone();
        }
        match atom {
            Atom::Variable(name) => match self.map.get(name) {
                Some(value) => self.apply(value),
                None => atom.clone(),
            },
            Atom::Symbol(_) => atom.clone(),
            Atom::Expression(children) => {
                if atom.is_ground() {
                    return atom.clone();
                }
                Atom::expr(children.iter().map(|c| self.apply(c)).collect::<Vec<_>>())
            }
        }
    }

    /// Follow variable-to-variable chains to the representative atom.
    fn walk<'a>(&'a self, mut atom: &'a Atom) -> &'a Atom {
        while let Atom::Variable(name) = atom {
            match self.map.get(name) {
                Some(next) => atom = next,
                None => break,
            }
        }
        atom
    }

    /// Whether `name` occurs in `atom` once bindings are taken into account.
    fn occurs(&self, name: &str, atom: &Atom) -> bool {
        match self.walk(atom) {
            Atom::Variable(v) => &**v == name,
            Atom::Symbol(_) => false,
            Atom::Expression(children) => children.iter().any(|c| self.occurs(name, c)),
        }
    }

    fn unify_into(&mut self, a: &Atom, b: &Atom) -> bool {
        let a = self.walk(a).clone();
        let b = self.walk(b).clone();
        match (&a, &b) {
            _ if a == b => true,
            // Prefer binding the right-hand side when both are variables.
            (other, Atom::Variable(name)) | (Atom::Variable(name), other) => {
                if self.occurs(name, other) {
                    return false;
                }
                self.map.insert(Arc::clone(name), other.clone());
                true
            }
            (Atom::Expression(xs), Atom::Expression(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(x, y)| self.unify_into(x, y))
            }
            _ => false,
        }
    }
}

/// Unify two atoms, returning the bindings that make them equal.
pub fn unify(a: &Atom, b: &Atom) -> Option<Bindings> {
    let mut bindings = Bindings::new();
    bindings.unify_into(a, b).then_some(bindings)
}

/// Separates a variable name from its instantiation suffix. The reader
/// rejects it in variable names, so renamed variables never collide with
/// variables written in source text.
pub const RENAME_SEPARATOR: char = '#';

/// Rename every variable in `atom` apart by appending `#suffix`.
///
/// Gives each rule instantiation its own variable scope so rule-local
/// variables never capture variables of the query they are matched against.
pub fn rename_apart(atom: &Atom, suffix: u64) -> Atom {
    match atom {
        Atom::Variable(name) => Atom::var(format!("{name}{RENAME_SEPARATOR}{suffix}")),
        Atom::Symbol(_) => atom.clone(),
        Atom::Expression(children) => {
            if atom.is_ground() {
                return atom.clone();
            }
            Atom::expr(
                children
                    .iter()
                    .map(|c| rename_apart(c, suffix))
                    .collect::<Vec<_>>(),
            )
        }
    }
}
