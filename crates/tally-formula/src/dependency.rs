//! Dependency tracking for batch evaluation
//!
//! Each expression is scanned for the symbols it reads (`requires`) and
//! writes (`provides`). Nodes are kept in an index arena and ordered with a
//! depth-first walk that reports cycles instead of looping.

use crate::error::{FormulaError, FormulaResult};
use crate::opcode::Opcode;
use crate::parser::tokenize;
use crate::variables::variable_names;
use ahash::AHashMap;
use tally_core::is_reserved;
use tally_core::number::{format_number, parse_float};
use tracing::debug;

/// Largest `eachreg` range whose registers are tracked as requirements
pub const MAX_TRACKED_RANGE: i64 = 1024;

/// Something a node reads or writes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    /// Named value, read through `$name` and written by a node's output name
    Value(String),
    /// Register, read through `ldr`/`cpr`/`eachreg` and written by `str`/`cpr`
    Register(String),
}

/// Symbols read and written by one expression, deduplicated in order of
/// first appearance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    pub requires: Vec<Symbol>,
    pub provides: Vec<Symbol>,
}

impl Dependencies {
    /// Scan an expression. `name` is the node's output name, if any.
    pub fn analyze(name: Option<&str>, expression: &str) -> Self {
        let mut deps = Dependencies::default();

        if let Some(name) = name {
            deps.provide(Symbol::Value(name.to_string()));
        }
        for variable in variable_names(expression) {
            deps.require(Symbol::Value(variable.to_string()));
        }

        let tokens: Vec<&str> = tokenize(expression).collect();
        let register_at = |index: Option<usize>| register_operand(&tokens, index);

        let mut capture_start: Option<usize> = None;
        for (i, token) in tokens.iter().enumerate() {
            match Opcode::from_token(token) {
                Opcode::Load => {
                    if let Some(register) = register_at(i.checked_sub(1)) {
                        deps.require(Symbol::Register(register));
                    }
                }
                Opcode::Store => {
                    if let Some(register) = register_at(i.checked_sub(1)) {
                        deps.provide(Symbol::Register(register));
                    }
                }
                Opcode::CopyRegister => {
                    if let Some(source) = register_at(i.checked_sub(2)) {
                        deps.require(Symbol::Register(source));
                    }
                    if let Some(destination) = register_at(i.checked_sub(1)) {
                        deps.provide(Symbol::Register(destination));
                    }
                }
                Opcode::Capture => match capture_start.take() {
                    None => capture_start = Some(i),
                    Some(start) => {
                        let followed_by_fold = tokens
                            .get(i + 1)
                            .is_some_and(|next| matches!(Opcode::from_token(next), Opcode::EachReg));
                        if followed_by_fold {
                            deps.require_range(&tokens[start + 1..i]);
                        }
                    }
                },
                _ => {}
            }
        }

        deps
    }

    fn require(&mut self, symbol: Symbol) {
        if !self.requires.contains(&symbol) {
            self.requires.push(symbol);
        }
    }

    fn provide(&mut self, symbol: Symbol) {
        if !self.provides.contains(&symbol) {
            self.provides.push(symbol);
        }
    }

    /// Registers `base{start}..=base{end}` read by a literal `eachreg` template
    fn require_range(&mut self, template: &[&str]) {
        let [base, start, end, ..] = template else {
            return;
        };
        let base = base.trim_start_matches('~');
        let (Some(start), Some(end)) = (parse_float(start), parse_float(end)) else {
            return;
        };
        if !start.is_finite() || !end.is_finite() {
            return;
        }
        let (start, end) = (start.trunc() as i64, end.trunc() as i64);
        if end.saturating_sub(start) >= MAX_TRACKED_RANGE {
            debug!(base, start, end, "eachreg range too large to track");
            return;
        }
        for index in start..=end {
            let register = format!("{base}{index}");
            if !is_reserved(&register) {
                self.require(Symbol::Register(register));
            }
        }
    }
}

/// Register key of the operand at `index`, keyed the way the machine keys
/// it: `~name` and `$name` by name, numbers in canonical form. Reserved
/// registers and anything else yield `None`.
fn register_operand(tokens: &[&str], index: Option<usize>) -> Option<String> {
    let token = tokens.get(index?)?;
    let key = match Opcode::from_token(token) {
        Opcode::Name(name) => name,
        Opcode::Number(n) => format_number(n),
        _ => return None,
    };
    (!is_reserved(&key)).then_some(key)
}

/// Fixed-size bit set over node indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet {
    words: Vec<u64>,
}

impl NodeSet {
    /// Empty set able to hold indices `0..len`
    pub fn with_len(len: usize) -> Self {
        Self {
            words: vec![0u64; (len + 63) / 64],
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|word| word & (1u64 << (index % 64)) != 0)
    }

    pub fn insert(&mut self, index: usize) {
        self.words[index / 64] |= 1u64 << (index % 64);
    }

    pub fn remove(&mut self, index: usize) {
        self.words[index / 64] &= !(1u64 << (index % 64));
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }
}

/// Dependency graph over an arena of nodes
///
/// `edges[i]` lists every other node that provides something node `i`
/// requires, in arena order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    labels: Vec<String>,
    edges: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph. `labels` name the nodes in cycle reports.
    pub fn new(labels: Vec<String>, dependencies: &[Dependencies]) -> Self {
        let mut providers: AHashMap<&Symbol, Vec<usize>> = AHashMap::new();
        for (index, deps) in dependencies.iter().enumerate() {
            for symbol in &deps.provides {
                providers.entry(symbol).or_default().push(index);
            }
        }

        let edges = dependencies
            .iter()
            .enumerate()
            .map(|(index, deps)| {
                let mut targets: Vec<usize> = deps
                    .requires
                    .iter()
                    .filter_map(|symbol| providers.get(symbol))
                    .flatten()
                    .copied()
                    .filter(|&target| target != index)
                    .collect();
                targets.sort_unstable();
                targets.dedup();
                targets
            })
            .collect();

        Self { labels, edges }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Nodes that `index` depends on
    pub fn precedents(&self, index: usize) -> &[usize] {
        self.edges.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn label(&self, index: usize) -> &str {
        self.labels.get(index).map_or("", String::as_str)
    }

    /// Walk roots in arena order, calling `visit` on each node after all of
    /// its precedents. Stops at the first cycle; nodes already visited stay
    /// visited.
    pub fn walk<F>(&self, mut visit: F) -> FormulaResult<()>
    where
        F: FnMut(usize),
    {
        let mut visited = NodeSet::with_len(self.len());
        let mut on_stack = NodeSet::with_len(self.len());
        // (node, next edge to follow)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.len() {
            if visited.contains(root) {
                continue;
            }
            on_stack.insert(root);
            stack.push((root, 0));

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                match self.edges[node].get(top.1).copied() {
                    Some(next) => {
                        top.1 += 1;
                        if visited.contains(next) {
                            continue;
                        }
                        if on_stack.contains(next) {
                            return Err(self.cycle_error(&stack, next));
                        }
                        on_stack.insert(next);
                        stack.push((next, 0));
                    }
                    None => {
                        stack.pop();
                        on_stack.remove(node);
                        visited.insert(node);
                        visit(node);
                    }
                }
            }
        }

        Ok(())
    }

    /// Evaluation order for the whole graph
    pub fn topological_order(&self) -> FormulaResult<Vec<usize>> {
        let mut order = Vec::with_capacity(self.len());
        self.walk(|index| order.push(index))?;
        Ok(order)
    }

    fn cycle_error(&self, stack: &[(usize, usize)], node: usize) -> FormulaError {
        let start = stack.iter().position(|&(index, _)| index == node).unwrap_or(0);
        let chain: Vec<String> = stack[start..]
            .iter()
            .map(|&(index, _)| self.label(index).to_string())
            .chain(std::iter::once(self.label(node).to_string()))
            .collect();
        debug!(node = self.label(node), chain = ?chain, "cyclic dependency");
        FormulaError::CyclicDependency {
            node: self.label(node).to_string(),
            chain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn value(name: &str) -> Symbol {
        Symbol::Value(name.to_string())
    }

    fn register(name: &str) -> Symbol {
        Symbol::Register(name.to_string())
    }

    fn graph(nodes: &[(&str, &str)]) -> DependencyGraph {
        let deps: Vec<Dependencies> = nodes
            .iter()
            .map(|(name, expression)| Dependencies::analyze(Some(name), expression))
            .collect();
        let labels = nodes.iter().map(|(name, _)| name.to_string()).collect();
        DependencyGraph::new(labels, &deps)
    }

    #[test]
    fn test_analyze_variables() {
        let deps = Dependencies::analyze(Some("total"), "$price $qty * $price +");
        assert_eq!(deps.requires, vec![value("price"), value("qty")]);
        assert_eq!(deps.provides, vec![value("total")]);
    }

    #[test]
    fn test_analyze_registers() {
        let deps = Dependencies::analyze(None, "~a ldr 2 * ~b str ~c ~d cpr ~LAST ldr");
        assert_eq!(deps.requires, vec![register("a"), register("c")]);
        assert_eq!(deps.provides, vec![register("b"), register("d")]);
    }

    #[test]
    fn test_analyze_bare_register_operands() {
        let deps = Dependencies::analyze(None, "$slot ldr 7 str 2.50 ~total cpr");
        assert_eq!(deps.requires, vec![value("slot"), register("slot"), register("2.5")]);
        assert_eq!(deps.provides, vec![register("7"), register("total")]);

        let deps = Dependencies::analyze(None, "$LAST ldr 1 + pop");
        assert_eq!(deps.requires, vec![value("LAST")]);
    }

    #[test]
    fn test_analyze_ignores_reserved() {
        let deps = Dependencies::analyze(None, "~INTERMEDIATE ldr 1 ~LAST str");
        assert!(deps.requires.is_empty());
        assert!(deps.provides.is_empty());
    }

    #[test]
    fn test_analyze_eachreg_range() {
        let deps = Dependencies::analyze(None, "| ~R 1 3 0 + | eachreg");
        assert_eq!(deps.requires, vec![register("R1"), register("R2"), register("R3")]);

        // Not folded, not tracked
        let deps = Dependencies::analyze(None, "| ~R 1 3 0 + |");
        assert!(deps.requires.is_empty());

        let deps = Dependencies::analyze(None, "| ~R 0 5000 0 + | eachreg");
        assert!(deps.requires.is_empty());
    }

    #[test]
    fn test_node_set() {
        let mut set = NodeSet::with_len(130);
        set.insert(0);
        set.insert(64);
        set.insert(129);
        assert!(set.contains(64));
        assert!(!set.contains(63));
        assert!(!set.contains(500));
        assert_eq!(set.count(), 3);
        set.remove(64);
        assert!(!set.contains(64));
        assert_eq!(set.count(), 2);
    }

    #[test]
    fn test_dependencies_first() {
        let graph = graph(&[("c", "$a $b +"), ("a", "1"), ("b", "$a 1 +")]);
        assert_eq!(graph.precedents(0), &[1, 2]);
        assert_eq!(graph.topological_order().unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn test_independent_nodes_keep_list_order() {
        let graph = graph(&[("x", "1"), ("y", "2"), ("z", "3")]);
        assert_eq!(graph.topological_order().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let graph = graph(&[("d", "$b $c +"), ("b", "$a"), ("c", "$a"), ("a", "1")]);
        assert_eq!(graph.topological_order().unwrap(), vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_self_reference_has_no_edge() {
        let graph = graph(&[("a", "$a 1 +")]);
        assert!(graph.precedents(0).is_empty());
        assert_eq!(graph.topological_order().unwrap(), vec![0]);
    }

    #[test]
    fn test_cycle_reports_chain() {
        let graph = graph(&[("a", "$b"), ("b", "$c"), ("c", "$a")]);
        let err = graph.topological_order().unwrap_err();
        assert_eq!(
            err,
            FormulaError::CyclicDependency {
                node: "a".into(),
                chain: vec!["a".into(), "b".into(), "c".into(), "a".into()],
            }
        );
    }

    #[test]
    fn test_walk_keeps_visits_before_cycle() {
        let graph = graph(&[("ok", "1"), ("a", "$b"), ("b", "$a")]);
        let mut seen = Vec::new();
        assert!(graph.walk(|index| seen.push(index)).is_err());
        assert_eq!(seen, vec![0]);
    }

    #[test]
    fn test_register_edges() {
        let graph = graph(&[("reader", "~x ldr"), ("writer", "5 ~x str")]);
        assert_eq!(graph.topological_order().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_numeric_and_dollar_register_edges() {
        let graph = graph(&[("reader", "7 ldr"), ("writer", "9 7 str")]);
        assert_eq!(graph.topological_order().unwrap(), vec![1, 0]);

        let graph = self::graph(&[("reader", "$slot ldr"), ("writer", "4 $slot str")]);
        assert_eq!(graph.topological_order().unwrap(), vec![1, 0]);

        // `7.0` and `7` name the same register
        let graph = self::graph(&[("reader", "7.0 ldr"), ("writer", "9 7 str")]);
        assert_eq!(graph.precedents(0), &[1]);
    }
}
