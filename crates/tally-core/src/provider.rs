//! Value providers
//!
//! Expressions reference outside data through `$name`, `$parent.child` and
//! `$*.child`. The data itself lives with whoever hosts the expressions (a
//! form, a document, a database row); it is reached only through the
//! [`ValueProvider`] trait.
//!
//! [`MemoryProvider`] is a plain in-memory implementation: a flat list of
//! named entries, each with the chain of scope names it is nested in.

use crate::number::parse_or_zero;
use serde::{Deserialize, Serialize};

/// A raw datum as held by the host
///
/// `value` is the primary datum. When it is absent or blank the previously
/// `stored` value is used instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored: Option<String>,
}

impl RawValue {
    /// Raw value with only a primary datum
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            stored: None,
        }
    }

    /// Raw value with only a stored fallback
    pub fn stored(stored: impl Into<String>) -> Self {
        Self {
            value: None,
            stored: Some(stored.into()),
        }
    }

    /// The text that will be parsed: primary unless blank, else the stored one
    pub fn effective(&self) -> Option<&str> {
        match self.value.as_deref() {
            Some(value) if !value.is_empty() => Some(value),
            _ => self.stored.as_deref(),
        }
    }

    /// Numeric reading, `0` when missing or unparsable
    pub fn to_number(&self) -> f64 {
        self.effective().map(parse_or_zero).unwrap_or(0.0)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::new(value)
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::new(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::new(crate::number::format_number(value))
    }
}

/// Source of variable values for expressions
pub trait ValueProvider {
    /// All values named `name` in this scope, in document order
    fn values_for(&self, name: &str) -> Vec<RawValue>;

    /// Values named `child` nested somewhere under an element named `parent`
    fn scoped_values_for(&self, parent: &str, child: &str) -> Vec<RawValue>;

    /// Values named `child` anywhere, ignoring this provider's scope
    fn global_values_for(&self, child: &str) -> Vec<RawValue>;
}

impl<P: ValueProvider + ?Sized> ValueProvider for &P {
    fn values_for(&self, name: &str) -> Vec<RawValue> {
        (**self).values_for(name)
    }

    fn scoped_values_for(&self, parent: &str, child: &str) -> Vec<RawValue> {
        (**self).scoped_values_for(parent, child)
    }

    fn global_values_for(&self, child: &str) -> Vec<RawValue> {
        (**self).global_values_for(child)
    }
}

/// Provider that knows nothing; every lookup is empty
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyProvider;

impl ValueProvider for EmptyProvider {
    fn values_for(&self, _name: &str) -> Vec<RawValue> {
        Vec::new()
    }

    fn scoped_values_for(&self, _parent: &str, _child: &str) -> Vec<RawValue> {
        Vec::new()
    }

    fn global_values_for(&self, _child: &str) -> Vec<RawValue> {
        Vec::new()
    }
}

/// A named value plus the names of the scopes enclosing it (outermost first)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
    #[serde(flatten)]
    pub raw: RawValue,
}

/// In-memory [`ValueProvider`]
///
/// ```rust
/// use tally_core::{MemoryProvider, ValueProvider};
///
/// let mut values = MemoryProvider::new();
/// values.insert("price", "10");
/// values.insert_scoped(["line1"], "qty", "2");
///
/// assert_eq!(values.values_for("price")[0].to_number(), 10.0);
/// assert_eq!(values.scoped_values_for("line1", "qty")[0].to_number(), 2.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryProvider {
    #[serde(default)]
    entries: Vec<Entry>,
    /// Document-wide provider used for `$*.child`; falls back to `self`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    global: Option<Box<MemoryProvider>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a provider from `(name, value)` pairs at the top level
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<RawValue>,
    {
        let mut provider = Self::new();
        for (name, value) in pairs {
            provider.insert(name, value);
        }
        provider
    }

    /// Add a top-level value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RawValue>) -> &mut Self {
        self.entries.push(Entry {
            name: name.into(),
            scope: Vec::new(),
            raw: value.into(),
        });
        self
    }

    /// Add a value nested under the given scope names (outermost first)
    pub fn insert_scoped<S, I>(
        &mut self,
        scope: I,
        name: impl Into<String>,
        value: impl Into<RawValue>,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.push(Entry {
            name: name.into(),
            scope: scope.into_iter().map(Into::into).collect(),
            raw: value.into(),
        });
        self
    }

    /// Replace the value of every entry named `name`, or add one at the top
    /// level when none exists
    pub fn set(&mut self, name: &str, value: impl Into<RawValue>) -> &mut Self {
        let value = value.into();
        let mut found = false;
        for entry in self.entries.iter_mut().filter(|e| e.name == name) {
            entry.raw = value.clone();
            found = true;
        }
        if !found {
            self.insert(name, value);
        }
        self
    }

    /// Attach the provider consulted by `$*.child` lookups
    pub fn with_global(mut self, global: MemoryProvider) -> Self {
        self.global = Some(Box::new(global));
        self
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, name: &str) -> Vec<RawValue> {
        self.entries
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.raw.clone())
            .collect()
    }
}

impl ValueProvider for MemoryProvider {
    fn values_for(&self, name: &str) -> Vec<RawValue> {
        self.lookup(name)
    }

    fn scoped_values_for(&self, parent: &str, child: &str) -> Vec<RawValue> {
        self.entries
            .iter()
            .filter(|e| e.name == child && e.scope.iter().any(|s| s == parent))
            .map(|e| e.raw.clone())
            .collect()
    }

    fn global_values_for(&self, child: &str) -> Vec<RawValue> {
        match &self.global {
            Some(global) => global.lookup(child),
            None => self.lookup(child),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbers(values: Vec<RawValue>) -> Vec<f64> {
        values.iter().map(RawValue::to_number).collect()
    }

    #[test]
    fn test_raw_value_fallback() {
        assert_eq!(RawValue::new("4").to_number(), 4.0);
        assert_eq!(RawValue::stored("7").to_number(), 7.0);
        assert_eq!(
            RawValue {
                value: Some(String::new()),
                stored: Some("3".into()),
            }
            .to_number(),
            3.0
        );
        assert_eq!(RawValue::new("abc").to_number(), 0.0);
        assert_eq!(RawValue::default().to_number(), 0.0);
    }

    #[test]
    fn test_lookup_in_document_order() {
        let mut values = MemoryProvider::new();
        values
            .insert("amount", "1")
            .insert_scoped(["line2"], "amount", "2")
            .insert("other", "9");

        assert_eq!(numbers(values.values_for("amount")), vec![1.0, 2.0]);
        assert_eq!(numbers(values.scoped_values_for("line2", "amount")), vec![2.0]);
        assert!(values.scoped_values_for("line3", "amount").is_empty());
    }

    #[test]
    fn test_scoped_lookup_matches_any_ancestor() {
        let mut values = MemoryProvider::new();
        values.insert_scoped(["invoice", "line1"], "qty", "5");

        assert_eq!(numbers(values.scoped_values_for("invoice", "qty")), vec![5.0]);
        assert_eq!(numbers(values.scoped_values_for("line1", "qty")), vec![5.0]);
    }

    #[test]
    fn test_global_lookup() {
        let local = MemoryProvider::from_pairs([("rate", "1")]);
        assert_eq!(numbers(local.global_values_for("rate")), vec![1.0]);

        let global = MemoryProvider::from_pairs([("rate", "2"), ("rate", "3")]);
        let local = local.with_global(global);
        assert_eq!(numbers(local.global_values_for("rate")), vec![2.0, 3.0]);
        assert_eq!(numbers(local.values_for("rate")), vec![1.0]);
    }

    #[test]
    fn test_set_replaces_or_inserts() {
        let mut values = MemoryProvider::from_pairs([("a", "1")]);
        values.set("a", 5.0).set("b", 6.0);
        assert_eq!(numbers(values.values_for("a")), vec![5.0]);
        assert_eq!(numbers(values.values_for("b")), vec![6.0]);
    }

    #[test]
    fn test_deserialize_entries() {
        let json = r#"{
            "entries": [
                { "name": "price", "value": "12" },
                { "name": "qty", "scope": ["line1"], "stored": "3" }
            ]
        }"#;
        let values: MemoryProvider = serde_json::from_str(json).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(numbers(values.scoped_values_for("line1", "qty")), vec![3.0]);
    }
}
