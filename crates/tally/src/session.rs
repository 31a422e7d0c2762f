//! Evaluation sessions
//!
//! A [`Session`] owns the register store that every evaluation reads and
//! writes. [`SharedSession`] puts one behind a mutex for hosts that evaluate
//! from several threads.

use crate::calculation::{CalculationOptions, CalculationReport};
use crate::ledger::{self, Ledger, LedgerReport};
use parking_lot::Mutex;
use std::sync::Arc;
use tally_core::{RegisterStore, ValueProvider};
use tally_formula::{substitute, Batch, BatchOutput, FormulaResult, Machine, NodeSpec};

/// Register namespace plus the operations that use it
#[derive(Debug, Clone, Default)]
pub struct Session {
    registers: RegisterStore,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing register values
    pub fn with_registers(registers: RegisterStore) -> Self {
        Self { registers }
    }

    pub fn registers(&self) -> &RegisterStore {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterStore {
        &mut self.registers
    }

    pub fn into_registers(self) -> RegisterStore {
        self.registers
    }

    /// Evaluate an expression with no variables
    pub fn evaluate(&mut self, expression: &str) -> f64 {
        Machine::new(&mut self.registers).execute(expression)
    }

    /// Substitute variables from `provider`, then evaluate
    pub fn evaluate_with(&mut self, expression: &str, provider: &dyn ValueProvider) -> f64 {
        let expression = substitute(expression, provider);
        self.evaluate(&expression)
    }

    /// Evaluate a batch in dependency order
    pub fn evaluate_batch(
        &mut self,
        nodes: &[NodeSpec],
        local: &dyn ValueProvider,
        outer: Option<&dyn ValueProvider>,
    ) -> FormulaResult<BatchOutput> {
        Batch::new(nodes.to_vec()).evaluate(&mut self.registers, local, outer)
    }

    /// Evaluate a batch and render its values
    pub fn calculate(
        &mut self,
        nodes: &[NodeSpec],
        local: &dyn ValueProvider,
        outer: Option<&dyn ValueProvider>,
        options: &CalculationOptions,
    ) -> FormulaResult<CalculationReport> {
        let output = self.evaluate_batch(nodes, local, outer)?;
        Ok(CalculationReport::from_output(&output, options))
    }

    /// Recalculate every column of a ledger, storing section subtotals
    pub fn recalculate_ledger(
        &mut self,
        ledger: &Ledger,
        options: &CalculationOptions,
    ) -> LedgerReport {
        ledger::recalculate(ledger, &mut self.registers, options)
    }

    /// Clear all registers
    pub fn reset(&mut self) {
        self.registers.reset();
    }
}

/// A [`Session`] shared between threads
///
/// Every call locks the session for its whole duration, so evaluations from
/// different threads never interleave.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_session(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` with exclusive access to the session
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.inner.lock();
        f(&mut *session)
    }

    pub fn evaluate(&self, expression: &str) -> f64 {
        self.with(|session| session.evaluate(expression))
    }

    pub fn evaluate_with(&self, expression: &str, provider: &dyn ValueProvider) -> f64 {
        self.with(|session| session.evaluate_with(expression, provider))
    }

    pub fn evaluate_batch(
        &self,
        nodes: &[NodeSpec],
        local: &dyn ValueProvider,
        outer: Option<&dyn ValueProvider>,
    ) -> FormulaResult<BatchOutput> {
        self.with(|session| session.evaluate_batch(nodes, local, outer))
    }

    pub fn calculate(
        &self,
        nodes: &[NodeSpec],
        local: &dyn ValueProvider,
        outer: Option<&dyn ValueProvider>,
        options: &CalculationOptions,
    ) -> FormulaResult<CalculationReport> {
        self.with(|session| session.calculate(nodes, local, outer, options))
    }

    pub fn recalculate_ledger(&self, ledger: &Ledger, options: &CalculationOptions) -> LedgerReport {
        self.with(|session| session.recalculate_ledger(ledger, options))
    }

    pub fn reset(&self) {
        self.with(Session::reset)
    }

    /// Copy of the current registers
    pub fn registers(&self) -> RegisterStore {
        self.with(|session| session.registers().clone())
    }
}
