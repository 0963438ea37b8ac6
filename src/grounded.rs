//! Grounded functions: native operations dispatched by head symbol.
//!
//! A grounded operation receives fully reduced argument atoms and returns an
//! atom. It never panics on bad data: wrong arity becomes `Error_Arity_<name>`
//! and a non-numeric argument becomes `Error_InvalidInput_<name>`.
//!
//! ## Built-in operations
//!
//! - **Arithmetic**: `+`, `-`, `*`, `/` over integer and float literals
//! - **Comparison**: `<`, `>`, `<=`, `>=`, `==`, returning `True` / `False`

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::atom::{Atom, ErrorKind, Number};

// ---------------------------------------------------------------------------
// Core trait
// ---------------------------------------------------------------------------

/// A native function callable from atoms.
pub trait GroundedOperation: Send + Sync + fmt::Debug {
    /// The head symbol this operation is registered under.
    fn name(&self) -> &str;

    /// Number of arguments the operation takes.
    fn arity(&self) -> usize {
        2
    }

    /// Run the operation. `args.len()` always equals [`arity`](Self::arity).
    fn execute(&self, args: &[Atom]) -> Atom;
}

// ---------------------------------------------------------------------------
// Built-in: arithmetic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Binary arithmetic over numeric literals.
///
/// Integer arithmetic is checked; overflow and division by zero are invalid
/// input. Inexact integer division yields a float.
#[derive(Debug)]
pub struct Arithmetic {
    name: &'static str,
    op: ArithOp,
}

impl Arithmetic {
    fn int(&self, a: i64, b: i64) -> Option<Number> {
        match self.op {
            ArithOp::Add => a.checked_add(b).map(Number::Int),
            ArithOp::Sub => a.checked_sub(b).map(Number::Int),
            ArithOp::Mul => a.checked_mul(b).map(Number::Int),
            ArithOp::Div => {
                if b == 0 {
                    None
                } else if a.checked_rem(b) == Some(0) {
                    a.checked_div(b).map(Number::Int)
                } else {
                    Some(Number::Float(a as f64 / b as f64))
                }
            }
        }
    }

    fn float(&self, a: f64, b: f64) -> Option<Number> {
        let result = match self.op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div if b == 0.0 => return None,
            ArithOp::Div => a / b,
        };
        result.is_finite().then_some(Number::Float(result))
    }
}

impl GroundedOperation for Arithmetic {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(&self, args: &[Atom]) -> Atom {
        let [a, b] = args else {
            return Atom::error(ErrorKind::Arity, self.name);
        };
        let invalid = || Atom::error(ErrorKind::InvalidInput, self.name);
        let (Some(a), Some(b)) = (a.as_number(), b.as_number()) else {
            return invalid();
        };
        let result = match (a, b) {
            (Number::Int(a), Number::Int(b)) => self.int(a, b),
            (a, b) => self.float(a.as_f64(), b.as_f64()),
        };
        result.map(Atom::number).unwrap_or_else(invalid)
    }
}

// ---------------------------------------------------------------------------
// Built-in: comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
}

/// Binary numeric comparison returning `True` or `False`.
#[derive(Debug)]
pub struct Comparison {
    name: &'static str,
    op: CmpOp,
}

impl GroundedOperation for Comparison {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(&self, args: &[Atom]) -> Atom {
        let [a, b] = args else {
            return Atom::error(ErrorKind::Arity, self.name);
        };
        let (Some(a), Some(b)) = (a.as_number(), b.as_number()) else {
            return Atom::error(ErrorKind::InvalidInput, self.name);
        };
        let ordering = match (a, b) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        };
        let Some(ordering) = ordering else {
            return Atom::error(ErrorKind::InvalidInput, self.name);
        };
        let holds = match self.op {
            CmpOp::Lt => ordering.is_lt(),
            CmpOp::Gt => ordering.is_gt(),
            CmpOp::Le => ordering.is_le(),
            CmpOp::Ge => ordering.is_ge(),
            CmpOp::Eq => ordering.is_eq(),
        };
        Atom::boolean(holds)
    }
}

// ---------------------------------------------------------------------------
// Closure-backed operations
// ---------------------------------------------------------------------------

type NativeFn = dyn Fn(&[Atom]) -> Atom + Send + Sync;

/// A grounded operation backed by a closure.
pub struct FnOperation {
    name: String,
    arity: usize,
    func: Box<NativeFn>,
}

impl FnOperation {
    pub fn new(
        name: impl Into<String>,
        arity: usize,
        func: impl Fn(&[Atom]) -> Atom + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for FnOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl GroundedOperation for FnOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn execute(&self, args: &[Atom]) -> Atom {
        (self.func)(args)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Symbol → grounded operation table.
///
/// Backed by a `DashMap`, so one registry can be shared through `Arc` by
/// several interpreters and still accept registrations.
pub struct GroundedRegistry {
    ops: DashMap<String, Arc<dyn GroundedOperation>>,
}

impl GroundedRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            ops: DashMap::new(),
        }
    }

    /// Create a registry holding the arithmetic and comparison builtins.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for (name, op) in [
            ("+", ArithOp::Add),
            ("-", ArithOp::Sub),
            ("*", ArithOp::Mul),
            ("/", ArithOp::Div),
        ] {
            registry.register(Arithmetic { name, op });
        }
        for (name, op) in [
            ("<", CmpOp::Lt),
            (">", CmpOp::Gt),
            ("<=", CmpOp::Le),
            (">=", CmpOp::Ge),
            ("==", CmpOp::Eq),
        ] {
            registry.register(Comparison { name, op });
        }
        registry
    }

    /// Register an operation, replacing any previous one with the same name.
    pub fn register(&self, op: impl GroundedOperation + 'static) -> Option<Arc<dyn GroundedOperation>> {
        let name = op.name().to_string();
        tracing::debug!(name = %name, arity = op.arity(), "grounded operation registered");
        self.ops.insert(name, Arc::new(op))
    }

    /// Register a closure under `name`.
    pub fn register_fn(
        &self,
        name: impl Into<String>,
        arity: usize,
        func: impl Fn(&[Atom]) -> Atom + Send + Sync + 'static,
    ) -> Option<Arc<dyn GroundedOperation>> {
        self.register(FnOperation::new(name, arity, func))
    }

    /// Look up an operation by symbol name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn GroundedOperation>> {
        self.ops.get(name).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ops.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Invoke `name` on already-reduced arguments.
    ///
    /// Returns `None` when no operation is registered under `name`. An error
    /// atom among the arguments is returned as-is instead of calling the op.
    pub fn call(&self, name: &str, args: &[Atom]) -> Option<Atom> {
        let op = self.get(name)?;
        if args.len() != op.arity() {
            return Some(Atom::error(ErrorKind::Arity, name));
        }
        if let Some(err) = args.iter().find(|a| a.is_error()) {
            return Some(err.clone());
        }
        let result = op.execute(args);
        tracing::debug!(op = name, result = %result, "grounded call");
        Some(result)
    }
}

impl Default for GroundedRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for GroundedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroundedRegistry")
            .field("ops", &self.names())
            .finish()
    }
}
