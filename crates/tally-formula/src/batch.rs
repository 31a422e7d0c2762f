//! Batch evaluation
//!
//! A batch is an ordered list of named expressions. Nodes are evaluated
//! after everything they depend on, and each committed value is visible to
//! later nodes as a `$name` variable.

use crate::dependency::{Dependencies, DependencyGraph};
use crate::error::FormulaResult;
use crate::machine::Machine;
use crate::variables::substitute;
use ahash::AHashMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tally_core::number::JsonNumber;
use tally_core::{RawValue, RegisterStore, ValueProvider};
use tracing::trace;

/// One expression in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Output name; unnamed nodes only have register side effects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub expression: String,
}

impl NodeSpec {
    pub fn named(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            expression: expression.into(),
        }
    }

    pub fn unnamed(expression: impl Into<String>) -> Self {
        Self {
            name: None,
            expression: expression.into(),
        }
    }

    /// Name used in cycle reports
    fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{index}"),
        }
    }
}

/// Values committed by a batch, in commit order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutput {
    values: Vec<(String, f64)>,
    positions: AHashMap<String, usize>,
    evaluated: usize,
}

impl BatchOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed value for `name`
    pub fn get(&self, name: &str) -> Option<f64> {
        self.positions.get(name).map(|&i| self.values[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Number of named values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of nodes run, named or not
    pub fn evaluated(&self) -> usize {
        self.evaluated
    }

    /// Commit a value. A repeated name keeps its first position.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.positions.get(&name) {
            Some(&i) => self.values[i].1 = value,
            None => {
                self.positions.insert(name.clone(), self.values.len());
                self.values.push((name, value));
            }
        }
    }

    fn record(&mut self, name: Option<&str>, value: f64) {
        self.evaluated += 1;
        if let Some(name) = name {
            self.insert(name, value);
        }
    }
}

impl Serialize for BatchOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, &JsonNumber(*value))?;
        }
        map.end()
    }
}

/// Local scope with committed node values layered on top
struct Committed<'a> {
    output: &'a BatchOutput,
    local: &'a dyn ValueProvider,
}

impl ValueProvider for Committed<'_> {
    fn values_for(&self, name: &str) -> Vec<RawValue> {
        match self.output.get(name) {
            Some(value) => vec![RawValue::from(value)],
            None => self.local.values_for(name),
        }
    }

    fn scoped_values_for(&self, parent: &str, child: &str) -> Vec<RawValue> {
        self.local.scoped_values_for(parent, child)
    }

    fn global_values_for(&self, child: &str) -> Vec<RawValue> {
        self.local.global_values_for(child)
    }
}

/// A batch with its dependency graph resolved
#[derive(Debug, Clone)]
pub struct Batch {
    nodes: Vec<NodeSpec>,
    graph: DependencyGraph,
}

impl Batch {
    pub fn new(nodes: impl Into<Vec<NodeSpec>>) -> Self {
        let nodes = nodes.into();
        let dependencies: Vec<Dependencies> = nodes
            .iter()
            .map(|node| Dependencies::analyze(node.name.as_deref(), &node.expression))
            .collect();
        let labels = nodes.iter().enumerate().map(|(i, node)| node.label(i)).collect();
        let graph = DependencyGraph::new(labels, &dependencies);
        Self { nodes, graph }
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Evaluate into `output`. On a cycle the values committed so far stay
    /// in `output`.
    pub fn evaluate_into(
        &self,
        registers: &mut RegisterStore,
        local: &dyn ValueProvider,
        outer: Option<&dyn ValueProvider>,
        output: &mut BatchOutput,
    ) -> FormulaResult<()> {
        let mut machine = Machine::new(registers);

        self.graph.walk(|index| {
            let node = &self.nodes[index];
            let mut expression = substitute(
                &node.expression,
                &Committed {
                    output: &*output,
                    local,
                },
            );
            if let Some(outer) = outer {
                expression = substitute(&expression, outer);
            }

            let value = machine.execute(&expression);
            trace!(
                node = %node.label(index),
                expression = %expression,
                value,
                "evaluated batch node"
            );
            output.record(node.name.as_deref(), value);
        })
    }

    /// Evaluate into a fresh output
    pub fn evaluate(
        &self,
        registers: &mut RegisterStore,
        local: &dyn ValueProvider,
        outer: Option<&dyn ValueProvider>,
    ) -> FormulaResult<BatchOutput> {
        let mut output = BatchOutput::new();
        self.evaluate_into(registers, local, outer, &mut output)?;
        Ok(output)
    }
}

/// Evaluate a list of nodes in dependency order
///
/// # Example
/// ```rust
/// use tally_core::{EmptyProvider, RegisterStore};
/// use tally_formula::{evaluate_batch, NodeSpec};
///
/// let nodes = vec![
///     NodeSpec::named("total", "$net $tax +"),
///     NodeSpec::named("net", "100"),
///     NodeSpec::named("tax", "$net 20 %"),
/// ];
/// let mut registers = RegisterStore::new();
/// let output = evaluate_batch(&nodes, &mut registers, &EmptyProvider, None).unwrap();
/// assert_eq!(output.get("total"), Some(120.0));
/// ```
pub fn evaluate_batch(
    nodes: &[NodeSpec],
    registers: &mut RegisterStore,
    local: &dyn ValueProvider,
    outer: Option<&dyn ValueProvider>,
) -> FormulaResult<BatchOutput> {
    Batch::new(nodes.to_vec()).evaluate(registers, local, outer)
}
