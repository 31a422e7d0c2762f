//! Prelude module - common imports for tally users
//!
//! ```rust
//! use tally::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationOptions,
    CalculationReport,

    // Ledger types
    Column,
    Ledger,
    Line,
    Section,

    // Value providers
    EmptyProvider,
    MemoryProvider,
    ValueProvider,

    // Error types
    FormulaError,
    FormulaResult,

    // Main types
    BatchOutput,
    NodeSpec,
    RegisterStore,
    Session,
    SharedSession,
};
