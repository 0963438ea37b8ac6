//! Knowledge base: an append-only store of equality rules.
//!
//! Every rule is a `(pattern, body)` pair read as "pattern equals body".
//! [`KnowledgeBase::query`] returns the body of the earliest-inserted rule
//! whose pattern unifies with the query, with the unifying bindings applied.
//!
//! Rules are bucketed by head symbol and arity so a query only visits rules
//! that could possibly match. Rules whose pattern has a variable head can
//! match anything and live in a separate wildcard list; candidates from both
//! are merged by insertion index, which keeps first-match order exact.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::atom::Atom;
use crate::error::RuleError;
use crate::unify::{Bindings, rename_apart, unify};

/// Symbol heading every rule atom: `(= pattern body)`.
pub const EQUALITY: &str = "=";

/// A stored equality: `pattern` reduces to `body`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: Atom,
    pub body: Atom,
}

impl Rule {
    pub fn new(pattern: Atom, body: Atom) -> Self {
        Self { pattern, body }
    }

    /// Read a rule from its atom form `(= pattern body)`.
    pub fn from_equality(atom: &Atom) -> Result<Self, RuleError> {
        match atom.children() {
            [eq, pattern, body] if eq.as_symbol() == Some(EQUALITY) => {
                Ok(Self::new(pattern.clone(), body.clone()))
            }
            _ => Err(RuleError::Malformed {
                atom: atom.to_string(),
            }),
        }
    }

    /// The atom form `(= pattern body)`.
    pub fn to_atom(&self) -> Atom {
        Atom::expr(vec![
            Atom::sym(EQUALITY),
            self.pattern.clone(),
            self.body.clone(),
        ])
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(= {} {})", self.pattern, self.body)
    }
}

/// A successful query: which rule fired and what it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMatch {
    /// Insertion index of the matching rule.
    pub rule_index: usize,
    /// The rule body with bindings substituted.
    pub body: Atom,
    /// Bindings from unifying the query with the (renamed) rule pattern.
    pub bindings: Bindings,
}

/// Index key for rule patterns and queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum HeadKey {
    /// A bare symbol pattern such as `A`.
    Symbol(Arc<str>),
    /// An expression headed by a symbol, with its total arity.
    Expr { head: Arc<str>, arity: usize },
    /// `()`.
    Empty,
    /// An expression whose head is itself an expression.
    Nested { arity: usize },
}

impl HeadKey {
    /// `None` for atoms that can match across keys (variables, variable heads).
    fn of(atom: &Atom) -> Option<Self> {
        match atom {
            Atom::Symbol(name) => Some(HeadKey::Symbol(Arc::clone(name))),
            Atom::Variable(_) => None,
            Atom::Expression(children) => match children.first() {
                None => Some(HeadKey::Empty),
                Some(Atom::Symbol(head)) => Some(HeadKey::Expr {
                    head: Arc::clone(head),
                    arity: children.len(),
                }),
                Some(Atom::Expression(_)) => Some(HeadKey::Nested {
                    arity: children.len(),
                }),
                Some(Atom::Variable(_)) => None,
            },
        }
    }
}

/// Append-only rule store for one reasoning session.
///
/// Mutation goes through `&mut self`, so a knowledge base shared between
/// threads must sit behind a lock ([`SharedSpace`]); queries only need `&self`.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    rules: Vec<Rule>,
    index: HashMap<HeadKey, Vec<usize>>,
    wildcard: Vec<usize>,
    /// Suffix source for renaming rule variables apart on each instantiation.
    instantiations: AtomicU64,
}

/// A knowledge base shared by several interpreters.
pub type SharedSpace = Arc<RwLock<KnowledgeBase>>;

impl KnowledgeBase {
    /// Create an empty knowledge base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a knowledge base for sharing.
    pub fn shared(self) -> SharedSpace {
        Arc::new(RwLock::new(self))
    }

    /// Append a rule. Always succeeds.
    pub fn add_atom(&mut self, rule: Rule) {
        let position = self.rules.len();
        match HeadKey::of(&rule.pattern) {
            Some(key) => self.index.entry(key).or_default().push(position),
            None => self.wildcard.push(position),
        }
        tracing::debug!(index = position, rule = %rule, "rule added");
        self.rules.push(rule);
    }

    /// Append a rule given in atom form `(= pattern body)`.
    pub fn add_equality(&mut self, atom: &Atom) -> Result<(), RuleError> {
        self.add_atom(Rule::from_equality(atom)?);
        Ok(())
    }

    /// Find the first rule (by insertion order) whose pattern unifies with `pattern`.
    pub fn query(&self, pattern: &Atom) -> Option<QueryMatch> {
        for position in self.candidates(pattern) {
            let rule = &self.rules[position];
            let suffix = self.instantiations.fetch_add(1, Ordering::Relaxed);
            let renamed = rename_apart(&rule.pattern, suffix);
            if let Some(bindings) = unify(pattern, &renamed) {
                let body = bindings.apply(&rename_apart(&rule.body, suffix));
                tracing::debug!(query = %pattern, rule = position, result = %body, "rule matched");
                return Some(QueryMatch {
                    rule_index: position,
                    body,
                    bindings,
                });
            }
        }
        tracing::trace!(query = %pattern, "no rule matched");
        None
    }

    /// Rule positions that could match `pattern`, in insertion order.
    fn candidates(&self, pattern: &Atom) -> Vec<usize> {
        let Some(key) = HeadKey::of(pattern) else {
            return (0..self.rules.len()).collect();
        };
        let keyed = self.index.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        merge_sorted(keyed, &self.wildcard)
    }

    /// All rules in insertion order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rule at insertion index `i`.
    pub fn get(&self, i: usize) -> Option<&Rule> {
        self.rules.get(i)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Merge two ascending index lists.
fn merge_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            merged.push(a[i]);
            i += 1;
        } else {
            merged.push(b[j]);
            j += 1;
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_atom;

    fn atom(src: &str) -> Atom {
        parse_atom(src).unwrap()
    }

    fn kb(rules: &[&str]) -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        for rule in rules {
            kb.add_equality(&atom(rule)).unwrap();
        }
        kb
    }

    #[test]
    fn rule_from_equality_checks_shape() {
        let rule = Rule::from_equality(&atom("(= (f $x) (g $x))")).unwrap();
        assert_eq!(rule.pattern, atom("(f $x)"));
        assert_eq!(rule.body, atom("(g $x)"));
        assert_eq!(rule.to_atom(), atom("(= (f $x) (g $x))"));
        assert!(Rule::from_equality(&atom("(= a)")).is_err());
        assert!(Rule::from_equality(&atom("(== a b)")).is_err());
        assert!(Rule::from_equality(&atom("A")).is_err());
    }

    #[test]
    fn query_returns_body_with_bindings() {
        let kb = kb(&["(= (priority $data) (FundingPriority $data))"]);
        let hit = kb.query(&atom("(priority (PovertyRate 60))")).unwrap();
        assert_eq!(hit.rule_index, 0);
        assert_eq!(hit.body, atom("(FundingPriority (PovertyRate 60))"));
    }

    #[test]
    fn first_inserted_rule_wins() {
        let kb = kb(&["(= (weight HIGH) 0.30)", "(= (weight HIGH) 0.99)"]);
        assert_eq!(kb.query(&atom("(weight HIGH)")).unwrap().body, atom("0.30"));
    }

    #[test]
    fn wildcard_rules_keep_insertion_order() {
        let kb = kb(&[
            "(= ($f A) first)",
            "(= (g A) second)",
            "(= (g $x) third)",
        ]);
        assert_eq!(kb.query(&atom("(g A)")).unwrap().body, atom("first"));
        assert_eq!(kb.query(&atom("(g B)")).unwrap().body, atom("third"));
        assert_eq!(kb.query(&atom("(h A)")).unwrap().body, atom("first"));
    }

    #[test]
    fn symbol_patterns_match_symbols() {
        let kb = kb(&["(= A AA)"]);
        assert_eq!(kb.query(&atom("A")).unwrap().body, atom("AA"));
        assert!(kb.query(&atom("(A)")).is_none());
        assert!(kb.query(&atom("B")).is_none());
    }

    #[test]
    fn arity_is_part_of_the_key() {
        let kb = kb(&["(= (f $x) one)", "(= (f $x $y) two)"]);
        assert_eq!(kb.query(&atom("(f 1)")).unwrap().body, atom("one"));
        assert_eq!(kb.query(&atom("(f 1 2)")).unwrap().body, atom("two"));
        assert!(kb.query(&atom("(f)")).is_none());
    }

    #[test]
    fn variable_query_scans_all_rules() {
        let kb = kb(&["(= (f A) one)", "(= (g B) two)"]);
        let hit = kb.query(&atom("($h B)")).unwrap();
        assert_eq!(hit.body, atom("two"));
        assert_eq!(hit.bindings.resolve("h"), Some(atom("g")));
    }

    #[test]
    fn rule_variables_do_not_capture_query_variables() {
        // Rule-local $x must not collide with the caller's $x.
        let kb = kb(&["(= (wrap $x) (boxed $x $y))"]);
        let hit = kb.query(&atom("(wrap $x)")).unwrap();
        let children = hit.body.children();
        assert_eq!(children[1], atom("$x"));
        assert!(children[2].is_variable());
        assert_ne!(children[2], atom("$y"));
    }

    #[test]
    fn repeated_pattern_variables_require_equal_arguments() {
        let kb = kb(&["(= (same $x $x) yes)"]);
        assert!(kb.query(&atom("(same A A)")).is_some());
        assert!(kb.query(&atom("(same A B)")).is_none());
    }

    #[test]
    fn empty_expression_pattern() {
        let kb = kb(&["(= () nothing)"]);
        assert_eq!(kb.query(&atom("()")).unwrap().body, atom("nothing"));
    }

    #[test]
    fn introspection() {
        let kb = kb(&["(= A B)", "(= C D)"]);
        assert_eq!(kb.len(), 2);
        assert!(!kb.is_empty());
        assert_eq!(kb.get(1).unwrap().pattern, atom("C"));
        assert_eq!(kb.rules().len(), 2);
        assert!(KnowledgeBase::new().is_empty());
    }

    #[test]
    fn merge_preserves_order() {
        assert_eq!(merge_sorted(&[0, 3, 5], &[1, 4]), vec![0, 1, 3, 4, 5]);
        assert_eq!(merge_sorted(&[], &[2]), vec![2]);
    }
}
