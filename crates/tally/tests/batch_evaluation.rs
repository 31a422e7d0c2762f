//! Tests for dependency-ordered batch evaluation

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeMap;
use tally::prelude::*;

fn quote() -> Vec<NodeSpec> {
    vec![
        NodeSpec::named("total", "$subtotal $shipping +"),
        NodeSpec::named("subtotal", "$hours $rate *"),
        NodeSpec::named("shipping", "$subtotal 10 %"),
        NodeSpec::named("hours", "$*.hours"),
        NodeSpec::unnamed("$total ~quoted str"),
        NodeSpec::named("deposit", "~quoted ldr 30 %"),
    ]
}

fn values(output: &BatchOutput) -> BTreeMap<String, f64> {
    output
        .iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn scopes() -> (MemoryProvider, MemoryProvider) {
    let local = MemoryProvider::from_pairs([("rate", "40")]);
    let outer = MemoryProvider::from_pairs([("hours", "3")]);
    (local, outer)
}

/// Test a batch whose nodes are listed out of order
#[test]
fn test_batch_resolves_dependencies() {
    let (local, outer) = scopes();
    let mut session = Session::new();

    let output = session
        .evaluate_batch(&[NodeSpec::named("hours", "3")], &local, Some(&outer))
        .unwrap();
    assert_eq!(output.get("hours"), Some(3.0));

    let nodes = vec![
        NodeSpec::named("total", "$subtotal $tax +"),
        NodeSpec::named("tax", "$subtotal 25 %"),
        NodeSpec::named("subtotal", "$hours $rate *"),
        NodeSpec::named("hours", "3"),
    ];
    let output = session.evaluate_batch(&nodes, &local, None).unwrap();
    assert_eq!(output.get("subtotal"), Some(120.0));
    assert_eq!(output.get("tax"), Some(30.0));
    assert_eq!(output.get("total"), Some(150.0));
}

/// Test register writes ordering register reads
#[test]
fn test_batch_register_dependencies() {
    let (local, outer) = scopes();
    let mut session = Session::new();
    let nodes = vec![
        NodeSpec::named("deposit", "~quoted ldr 30 %"),
        NodeSpec::unnamed("$total ~quoted str"),
        NodeSpec::named("total", "$*.hours $rate *"),
    ];
    let output = session.evaluate_batch(&nodes, &local, Some(&outer)).unwrap();

    assert_eq!(output.get("total"), Some(120.0));
    assert_eq!(output.get("deposit"), Some(36.0));
    assert_eq!(session.registers().get("quoted"), Some(120.0));
}

/// Test that a cycle is reported and nothing past it is committed
#[test]
fn test_batch_cycle() {
    let mut session = Session::new();
    let nodes = vec![
        NodeSpec::named("a", "$b 1 +"),
        NodeSpec::named("b", "$a 1 +"),
    ];

    let err = session
        .evaluate_batch(&nodes, &EmptyProvider, None)
        .unwrap_err();
    match err {
        FormulaError::CyclicDependency { node, chain } => {
            assert_eq!(node, "a");
            assert_eq!(chain, vec!["a", "b", "a"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err_message(&nodes), "Cyclic dependency detected at a (a -> b -> a)");
}

fn err_message(nodes: &[NodeSpec]) -> String {
    let mut registers = RegisterStore::new();
    tally::evaluate_batch(nodes, &mut registers, &EmptyProvider, None)
        .unwrap_err()
        .to_string()
}

/// Test rendering with a fixed precision
#[test]
fn test_calculate_with_precision() {
    let mut session = Session::new();
    let nodes = vec![
        NodeSpec::named("third", "$one 3 /"),
        NodeSpec::named("one", "1"),
    ];

    let report = session
        .calculate(
            &nodes,
            &EmptyProvider,
            None,
            &CalculationOptions::with_precision(4),
        )
        .unwrap();
    assert_eq!(report.rendered("one"), Some("1.0000"));
    assert_eq!(report.rendered("third"), Some("0.3333"));
    assert_eq!(report.evaluated, 2);
}

/// Evaluating the same batch twice gives the same values
#[test]
fn test_batch_idempotent() {
    let (local, outer) = scopes();
    let mut session = Session::new();
    let nodes = quote();

    let first = session.evaluate_batch(&nodes, &local, Some(&outer)).unwrap();
    let second = session.evaluate_batch(&nodes, &local, Some(&outer)).unwrap();
    assert_eq!(values(&first), values(&second));
    assert_eq!(first.get("total"), Some(132.0));
}

proptest! {
    /// Reordering an acyclic batch never changes its values
    #[test]
    fn prop_batch_order_independent(nodes in Just(quote()).prop_shuffle()) {
        let (local, outer) = scopes();
        let expected = Session::new()
            .evaluate_batch(&quote(), &local, Some(&outer))
            .unwrap();
        let actual = Session::new()
            .evaluate_batch(&nodes, &local, Some(&outer))
            .unwrap();
        prop_assert_eq!(values(&expected), values(&actual));
    }
}
