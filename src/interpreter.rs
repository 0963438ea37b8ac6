//! Interpreter facade: `eval`, `chain`, and `unify` over a knowledge base.
//!
//! The `Interpreter` holds one shared [`KnowledgeBase`] and one shared
//! [`GroundedRegistry`]. Every call is synchronous and runs to completion on
//! the calling thread. Recursion (grounded argument reduction, nested `chain`)
//! draws from a per-call step budget, so cyclic rules end in
//! `Error_StepLimit_<op>` instead of overflowing the stack. A `chain` in
//! continuation position runs in a loop, and atoms built by a step may not nest
//! deeper than [`MAX_NESTING`].
//!
//! ## Instructions
//!
//! [`Interpreter::execute`] understands three instruction forms:
//!
//! - `(eval X)`: one reduction step of `X`
//! - `(chain STEP $v CONT)`: run `STEP`, bind its result to `$v` in `CONT`, run `CONT`
//! - `(unify A B THEN ELSE)`: structural match selecting a branch

use std::sync::{Arc, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::atom::{Atom, EMPTY, ErrorKind, MAX_NESTING};
use crate::error::{PiperResult, RuleError};
use crate::grounded::GroundedRegistry;
use crate::parse::{Statement, parse_program};
use crate::space::{EQUALITY, KnowledgeBase, QueryMatch, Rule, SharedSpace};
use crate::unify::unify;

const EVAL: &str = "eval";
const CHAIN: &str = "chain";
const UNIFY: &str = "unify";

/// Configuration for the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Evaluation steps allowed per top-level call (default: 10,000).
    pub max_steps: usize,
    /// Maximum nesting of grounded argument reduction and `chain` steps (default: 256).
    pub max_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            max_depth: 256,
        }
    }
}

/// Step budget threaded through one top-level call.
#[derive(Debug)]
struct Fuel {
    remaining: usize,
    budget: usize,
    depth: usize,
    max_depth: usize,
    reported: bool,
}

impl Fuel {
    fn new(config: &InterpreterConfig) -> Self {
        Self {
            remaining: config.max_steps,
            budget: config.max_steps,
            depth: 0,
            max_depth: config.max_depth,
            reported: false,
        }
    }

    /// Consume one step. Returns `false` once the budget is spent.
    fn burn(&mut self, atom: &Atom) -> bool {
        if self.remaining == 0 {
            if !self.reported {
                tracing::warn!(budget = self.budget, at = %atom, "evaluation step limit exceeded");
                self.reported = true;
            }
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// Enter one nested call. Past `max_depth` yields `Error_StepLimit_<op>`.
    fn enter(&mut self, op: &str) -> Result<(), Atom> {
        if self.depth >= self.max_depth {
            tracing::warn!(max_depth = self.max_depth, op, "nesting limit exceeded");
            return Err(Atom::error(ErrorKind::StepLimit, op));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }
}

fn is_step_limit(atom: &Atom) -> bool {
    matches!(atom.as_error(), Some((ErrorKind::StepLimit, _)))
}

/// `atom`, unless it nests deeper than [`MAX_NESTING`].
fn bounded(atom: Atom, op: &str) -> Atom {
    if atom.exceeds_nesting(MAX_NESTING) {
        tracing::warn!(max_nesting = MAX_NESTING, op, "atom nesting limit exceeded");
        return Atom::error(ErrorKind::StepLimit, op);
    }
    atom
}

/// A decoded instruction form.
#[derive(Debug, Clone, Copy)]
enum Instruction<'a> {
    Eval(&'a Atom),
    Chain {
        step: &'a Atom,
        var: &'a Atom,
        body: &'a Atom,
    },
    Unify {
        left: &'a Atom,
        right: &'a Atom,
        then: &'a Atom,
        otherwise: &'a Atom,
    },
}

impl<'a> Instruction<'a> {
    /// `None` if `atom` is not headed by an instruction symbol; `Some(Err(_))`
    /// carries the error atom for a malformed instruction.
    fn decode(atom: &'a Atom) -> Option<Result<Self, Atom>> {
        let name = atom.head()?.as_symbol()?;
        let args = atom.tail();
        let decoded = match (name, args) {
            (EVAL, [x]) => Ok(Instruction::Eval(x)),
            (CHAIN, [step, var, body]) => Ok(Instruction::Chain { step, var, body }),
            (UNIFY, [left, right, then, otherwise]) => Ok(Instruction::Unify {
                left,
                right,
                then,
                otherwise,
            }),
            (EVAL | CHAIN | UNIFY, _) => Err(Atom::error(ErrorKind::Arity, name)),
            _ => return None,
        };
        Some(decoded)
    }
}

/// The minimal MeTTa interpreter.
#[derive(Debug, Clone)]
pub struct Interpreter {
    space: SharedSpace,
    registry: Arc<GroundedRegistry>,
    config: InterpreterConfig,
}

impl Interpreter {
    /// Create an interpreter with an empty knowledge base and the builtin operations.
    pub fn new(config: InterpreterConfig) -> Self {
        Self::with_parts(
            KnowledgeBase::new().shared(),
            Arc::new(GroundedRegistry::with_builtins()),
            config,
        )
    }

    /// Create an interpreter over an existing (possibly shared) knowledge base and registry.
    pub fn with_parts(
        space: SharedSpace,
        registry: Arc<GroundedRegistry>,
        config: InterpreterConfig,
    ) -> Self {
        tracing::debug!(max_steps = config.max_steps, "interpreter created");
        Self {
            space,
            registry,
            config,
        }
    }

    /// The shared knowledge base handle.
    pub fn space(&self) -> &SharedSpace {
        &self.space
    }

    /// The grounded operation registry.
    pub fn registry(&self) -> &GroundedRegistry {
        &self.registry
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    // Rules are immutable once appended, so a poisoned lock still holds a
    // consistent rule list.
    fn read_space(&self) -> RwLockReadGuard<'_, KnowledgeBase> {
        self.space.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_space(&self) -> RwLockWriteGuard<'_, KnowledgeBase> {
        self.space.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Knowledge base access
    // -----------------------------------------------------------------------

    /// Append a rule to the knowledge base.
    pub fn add_atom(&self, rule: Rule) {
        self.write_space().add_atom(rule);
    }

    /// Append a rule given as `(= pattern body)`.
    pub fn add_equality(&self, atom: &Atom) -> Result<(), RuleError> {
        self.write_space().add_equality(atom)
    }

    /// First rule whose pattern unifies with `pattern`, with its instantiated body.
    pub fn query(&self, pattern: &Atom) -> Option<QueryMatch> {
        self.read_space().query(pattern)
    }

    // -----------------------------------------------------------------------
    // Public instructions
    // -----------------------------------------------------------------------

    /// One reduction step.
    ///
    /// 1. An expression headed by a grounded symbol has its arguments reduced
    ///    to a fixpoint, then the operation is applied.
    /// 2. Otherwise the first matching rule's instantiated body is returned.
    /// 3. Otherwise `NotReducible`.
    pub fn eval(&self, atom: &Atom) -> Atom {
        self.eval_in(atom, &mut self.fuel())
    }

    /// Run `step`, bind its result to `var` in `continuation`, then run that.
    ///
    /// `step` must be an instruction (`eval`, `chain`, or `unify`); anything else
    /// yields `Error_InvalidInput_chain`. A continuation that is not an
    /// instruction is evaluated, and is returned unchanged if already irreducible.
    pub fn chain(&self, step: &Atom, var: &Atom, continuation: &Atom) -> Atom {
        self.chain_in(step, var, continuation, &mut self.fuel())
    }

    /// `then` with the unifying bindings applied if `left` and `right` unify,
    /// otherwise `otherwise` unchanged. Never evaluates anything.
    pub fn unify(&self, left: &Atom, right: &Atom, then: &Atom, otherwise: &Atom) -> Atom {
        match unify(left, right) {
            Some(bindings) => bindings.apply(then),
            None => otherwise.clone(),
        }
    }

    /// Run an instruction form; any other atom is evaluated one step.
    pub fn execute(&self, atom: &Atom) -> Atom {
        self.execute_in(atom, &mut self.fuel())
    }

    /// Repeat [`execute`](Self::execute) until no further progress is possible.
    pub fn reduce(&self, atom: &Atom) -> Atom {
        self.reduce_in(atom, &mut self.fuel())
    }

    /// Load and run a program: `(= p b)` statements become rules and each
    /// `!atom` is executed, with results returned in order.
    pub fn run_program(&self, src: &str) -> PiperResult<Vec<Atom>> {
        let mut results = Vec::new();
        for statement in parse_program(src)? {
            match statement {
                Statement::Assert(atom) => {
                    if atom.head().and_then(Atom::as_symbol) == Some(EQUALITY) {
                        self.add_equality(&atom)?;
                    } else {
                        tracing::warn!(atom = %atom, "skipping top-level atom that is not a rule");
                    }
                }
                Statement::Execute(atom) => results.push(self.execute(&atom)),
            }
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Fuel-threaded internals
    // -----------------------------------------------------------------------

    fn fuel(&self) -> Fuel {
        Fuel::new(&self.config)
    }

    fn eval_in(&self, atom: &Atom, fuel: &mut Fuel) -> Atom {
        if !fuel.burn(atom) {
            return Atom::error(ErrorKind::StepLimit, EVAL);
        }
        tracing::trace!(atom = %atom, "eval");
        match atom {
            Atom::Variable(_) => Atom::not_reducible(),
            Atom::Symbol(name) if &**name == EMPTY || atom.is_not_reducible() || atom.is_error() => {
                Atom::not_reducible()
            }
            Atom::Expression(children) if children.is_empty() => Atom::not_reducible(),
            _ => {
                if let Some(Atom::Symbol(head)) = atom.head() {
                    if self.registry.contains(head) {
                        return self.apply_grounded(head, atom.tail(), fuel);
                    }
                }
                match self.query(atom) {
                    Some(hit) => bounded(hit.body, EVAL),
                    None => Atom::not_reducible(),
                }
            }
        }
    }

    fn apply_grounded(&self, name: &str, args: &[Atom], fuel: &mut Fuel) -> Atom {
        if let Err(limit) = fuel.enter(name) {
            return limit;
        }
        let mut reduced = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.reduce_in(arg, fuel);
            if is_step_limit(&value) {
                fuel.leave();
                return value;
            }
            reduced.push(value);
        }
        fuel.leave();
        self.registry
            .call(name, &reduced)
            .unwrap_or_else(Atom::not_reducible)
    }

    fn reduce_in(&self, atom: &Atom, fuel: &mut Fuel) -> Atom {
        let mut current = atom.clone();
        loop {
            let next = self.execute_in(&current, fuel);
            if next.is_error() {
                return next;
            }
            if next.is_not_reducible() || next == current {
                return current;
            }
            current = next;
        }
    }

    fn execute_in(&self, atom: &Atom, fuel: &mut Fuel) -> Atom {
        match Instruction::decode(atom) {
            Some(Ok(instruction)) => self.run_instruction(instruction, fuel),
            Some(Err(error)) => error,
            None => self.eval_in(atom, fuel),
        }
    }

    fn run_instruction(&self, instruction: Instruction<'_>, fuel: &mut Fuel) -> Atom {
        match instruction {
            Instruction::Eval(x) => self.eval_in(x, fuel),
            Instruction::Chain { step, var, body } => self.chain_in(step, var, body, fuel),
            Instruction::Unify {
                left,
                right,
                then,
                otherwise,
            } => bounded(self.unify(left, right, then, otherwise), UNIFY),
        }
    }

    fn chain_in(&self, step: &Atom, var: &Atom, continuation: &Atom, fuel: &mut Fuel) -> Atom {
        let (mut step, mut var, mut continuation) =
            (step.clone(), var.clone(), continuation.clone());
        // A chain in continuation position starts the next iteration.
        loop {
            if !fuel.burn(&step) {
                return Atom::error(ErrorKind::StepLimit, EVAL);
            }
            let Some(name) = var.as_variable() else {
                return Atom::error(ErrorKind::InvalidInput, CHAIN);
            };
            let value = match Instruction::decode(&step) {
                Some(Ok(instruction)) => {
                    if let Err(limit) = fuel.enter(CHAIN) {
                        return limit;
                    }
                    let value = self.run_instruction(instruction, fuel);
                    fuel.leave();
                    value
                }
                Some(Err(error)) => return error,
                None => return Atom::error(ErrorKind::InvalidInput, CHAIN),
            };
            if is_step_limit(&value) {
                return value;
            }
            tracing::debug!(var = name, value = %value, "chain bind");
            let next = bounded(substitute_free(&continuation, name, &value), CHAIN);
            match Instruction::decode(&next) {
                Some(Ok(Instruction::Chain {
                    step: next_step,
                    var: next_var,
                    body,
                })) => {
                    (step, var, continuation) = (next_step.clone(), next_var.clone(), body.clone());
                }
                Some(Ok(instruction)) => return self.run_instruction(instruction, fuel),
                Some(Err(error)) => return error,
                None => {
                    let result = self.eval_in(&next, fuel);
                    return if result.is_not_reducible() { next } else { result };
                }
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

/// Replace free occurrences of `$name` with `value`.
///
/// A nested `(chain STEP $name CONT)` rebinds `$name`, so only its `STEP` is
/// substituted.
fn substitute_free(atom: &Atom, name: &str, value: &Atom) -> Atom {
    match atom {
        Atom::Variable(v) if &**v == name => value.clone(),
        Atom::Variable(_) | Atom::Symbol(_) => atom.clone(),
        Atom::Expression(children) => {
            if !atom.contains_variable(name) {
                return atom.clone();
            }
            if let [head, step, binder, body] = &children[..] {
                if head.as_symbol() == Some(CHAIN) && binder.as_variable() == Some(name) {
                    return Atom::expr(vec![
                        head.clone(),
                        substitute_free(step, name, value),
                        binder.clone(),
                        body.clone(),
                    ]);
                }
            }
            Atom::expr(
                children
                    .iter()
                    .map(|c| substitute_free(c, name, value))
                    .collect::<Vec<_>>(),
            )
        }
    }
}
