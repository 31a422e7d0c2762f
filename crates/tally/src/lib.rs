//! # tally
//!
//! An embeddable stack-machine expression engine.
//!
//! Tally evaluates whitespace-separated postfix expressions against a
//! persistent register store, substitutes `$variables` from a pluggable
//! value provider, and runs batches of named expressions in dependency
//! order.
//!
//! ## Features
//!
//! - Postfix arithmetic, trigonometry, rounding and whole-stack reductions
//! - Named registers with `ldr` / `str` / `cpr` and a folding `eachreg`
//! - Conditional skip blocks (`jmpz` / `jmpnz` ... `}`)
//! - Batch evaluation with cycle detection
//! - Ledger recalculation with per-section subtotals
//!
//! ## Example
//!
//! ```rust
//! use tally::prelude::*;
//!
//! let mut session = Session::new();
//!
//! // Plain expressions
//! assert_eq!(session.evaluate("2 3 +"), 5.0);
//!
//! // Registers persist for the life of the session
//! session.evaluate("200 ~base str");
//! assert_eq!(session.evaluate("~base ldr 10 %+"), 220.0);
//!
//! // Batches run in dependency order
//! let nodes = vec![
//!     NodeSpec::named("gross", "$net $vat +"),
//!     NodeSpec::named("net", "50"),
//!     NodeSpec::named("vat", "$net 20 %"),
//! ];
//! let output = session.evaluate_batch(&nodes, &EmptyProvider, None).unwrap();
//! assert_eq!(output.get("gross"), Some(60.0));
//! ```

pub mod calculation;
pub mod ledger;
pub mod prelude;
pub mod session;

// Re-export calculation types
pub use calculation::{CalculatedValue, CalculationOptions, CalculationReport};

// Re-export ledger types
pub use ledger::{Column, Ledger, LedgerReport, Line, Section};

pub use session::{Session, SharedSession};

// Re-export core types
pub use tally_core::{
    is_reserved, number, EmptyProvider, Entry, MemoryProvider, RawValue, RegisterStore,
    ValueProvider, INTERMEDIATE, LAST,
};

// Re-export formula types
pub use tally_formula::{
    evaluate_batch, execute, parse_program, substitute, validate, variable_references, Batch,
    BatchOutput, FormulaError, FormulaResult, Machine, NodeSpec, Value,
};
