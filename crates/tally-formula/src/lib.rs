//! # tally-formula
//!
//! Expression engine for tally.
//!
//! This crate provides:
//! - Tokenizing and decoding (text → opcodes)
//! - The stack machine (opcodes → number)
//! - Variable substitution against a value provider
//! - Dependency tracking and batch evaluation
//!
//! ## Example
//!
//! ```rust
//! use tally_core::RegisterStore;
//! use tally_formula::execute;
//!
//! let mut registers = RegisterStore::new();
//! assert_eq!(execute("5 ~x str", &mut registers), 5.0);
//! assert_eq!(execute("~x ldr 2 *", &mut registers), 10.0);
//! ```

pub mod batch;
pub mod dependency;
pub mod error;
pub mod functions;
pub mod machine;
pub mod opcode;
pub mod parser;
pub mod variables;

pub use batch::{evaluate_batch, Batch, BatchOutput, NodeSpec};
pub use dependency::{Dependencies, DependencyGraph, Symbol};
pub use error::{FormulaError, FormulaResult};
pub use machine::{execute, Machine, Value};
pub use opcode::Opcode;
pub use parser::{parse_program, validate, Program};
pub use variables::{substitute, variable_references};
