//! # tally-core
//!
//! Core data structures for the tally expression engine.
//!
//! This crate provides the fundamental types used throughout tally:
//! - [`RegisterStore`] - Named numeric registers shared across evaluations
//! - [`ValueProvider`] - Source of `$variable` values, and the in-memory [`MemoryProvider`]
//! - [`number`] - Lenient number parsing and formatting
//!
//! ## Example
//!
//! ```rust
//! use tally_core::{RegisterStore, LAST};
//!
//! let mut registers = RegisterStore::new();
//! registers.set("total", 42.0);
//!
//! assert_eq!(registers.get("total"), Some(42.0));
//! assert_eq!(registers.get(LAST), Some(0.0));
//! ```

pub mod number;
pub mod provider;
pub mod registers;

// Re-exports for convenience
pub use provider::{EmptyProvider, Entry, MemoryProvider, RawValue, ValueProvider};
pub use registers::{is_reserved, RegisterStore, INTERMEDIATE, LAST};
