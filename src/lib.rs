// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # piper-metta
//!
//! A minimal MeTTa interpreter: atoms, an append-only knowledge base of
//! equality rules, and the `eval` / `chain` / `unify` instructions.
//!
//! ## Architecture
//!
//! - **Atoms** (`atom`): immutable, reference-counted symbols, variables, and expressions
//! - **Reader** (`parse`): s-expression surface syntax for atoms and programs
//! - **Unification** (`unify`): structural matching with occurs-check
//! - **Knowledge base** (`space`): first-match rule store with a head-symbol index
//! - **Grounded functions** (`grounded`): host arithmetic and comparisons
//! - **Interpreter** (`interpreter`): one-step `eval`, sequencing `chain`, branching `unify`
//! - **Seed packs** (`seeds`): TOML rule bundles applied at startup
//!
//! Data-driven failures are ordinary atoms (`NotReducible`, `Error_<Kind>_<ctx>`);
//! only host-level faults surface as [`error::PiperError`].
//!
//! ## Library usage
//!
//! ```
//! use piper_metta::interpreter::Interpreter;
//! use piper_metta::parse::parse_atom;
//!
//! let interp = Interpreter::default();
//! interp
//!     .add_equality(&parse_atom("(= (priority $data) (FundingPriority $data))").unwrap())
//!     .unwrap();
//! let result = interp.eval(&parse_atom("(priority (PovertyRate 60))").unwrap());
//! assert_eq!(result.to_string(), "(FundingPriority (PovertyRate 60))");
//! ```

pub mod atom;
pub mod config;
pub mod error;
pub mod export;
pub mod grounded;
pub mod interpreter;
pub mod parse;
pub mod seeds;
pub mod space;
pub mod unify;

pub use atom::{Atom, ErrorKind, Number};
pub use error::{PiperError, PiperResult};
pub use interpreter::{Interpreter, InterpreterConfig};
pub use space::{KnowledgeBase, Rule, SharedSpace};
