//! Ledger recalculation
//!
//! A ledger is a list of sections, each holding lines of raw fields and
//! computed columns. Columns are evaluated line by line; the sum of every
//! column in section `k` is stored in register `IVALUE{k}` once the section
//! is done, so later sections can read earlier subtotals with
//! `~IVALUE0 ldr`.

use crate::calculation::CalculationOptions;
use serde::{Deserialize, Serialize};
use tally_core::number::format_number;
use tally_core::{Entry, MemoryProvider, RawValue, RegisterStore};
use tally_formula::{substitute, Machine};
use tracing::debug;

/// Register holding the subtotal of section `index`
pub fn subtotal_register(index: usize) -> String {
    format!("IVALUE{index}")
}

/// A computed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub expression: String,
    /// Deleted columns evaluate to `0`
    #[serde(default)]
    pub deleted: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            deleted: false,
        }
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Raw field values, visible to column expressions as `$name`
    #[serde(default)]
    pub fields: Vec<Entry>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Line {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Entry {
            name: name.into(),
            scope: Vec::new(),
            raw: RawValue::new(value),
        });
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    fn provider(&self) -> MemoryProvider {
        let mut provider = MemoryProvider::new();
        for entry in &self.fields {
            provider.insert_scoped(entry.scope.iter().cloned(), entry.name.clone(), entry.raw.clone());
        }
        provider
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub lines: Vec<Line>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, line: Line) -> Self {
        self.lines.push(line);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }
}

/// Value of one column after recalculation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnValue {
    pub name: String,
    #[serde(serialize_with = "tally_core::number::json::serialize")]
    pub value: f64,
    pub rendered: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineReport {
    pub columns: Vec<ColumnValue>,
}

impl LineReport {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Register the subtotal was stored in
    pub register: String,
    #[serde(serialize_with = "tally_core::number::json::serialize")]
    pub subtotal: f64,
    pub lines: Vec<LineReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerReport {
    pub sections: Vec<SectionReport>,
}

impl LedgerReport {
    /// Subtotal of section `index`
    pub fn subtotal(&self, index: usize) -> Option<f64> {
        self.sections.get(index).map(|s| s.subtotal)
    }
}

/// Recalculate every column of the ledger against `registers`
pub fn recalculate(
    ledger: &Ledger,
    registers: &mut RegisterStore,
    options: &CalculationOptions,
) -> LedgerReport {
    let mut machine = Machine::new(registers);
    let mut sections = Vec::with_capacity(ledger.sections.len());

    for (index, section) in ledger.sections.iter().enumerate() {
        let mut subtotal = 0.0;
        let mut lines = Vec::with_capacity(section.lines.len());

        for line in &section.lines {
            let mut scope = line.provider();
            let mut columns = Vec::with_capacity(line.columns.len());

            for column in &line.columns {
                let value = if column.deleted {
                    0.0
                } else {
                    let expression = substitute(&column.expression, &scope);
                    machine.execute(&expression)
                };
                // Later columns read the rendered text, not the raw value
                let rendered = options.render(value);
                scope.set(&column.name, rendered.as_str());
                subtotal += value;
                columns.push(ColumnValue {
                    name: column.name.clone(),
                    value,
                    rendered,
                });
            }
            lines.push(LineReport { columns });
        }

        let register = subtotal_register(index);
        machine.execute(&format!("{} ~{register} str", format_number(subtotal)));
        debug!(section = index, subtotal, register = %register, "section subtotal");

        sections.push(SectionReport {
            name: section.name.clone(),
            register,
            subtotal,
            lines,
        });
    }

    LedgerReport { sections }
}
