//! Named numeric registers shared across evaluations
//!
//! A [`RegisterStore`] outlives individual expression evaluations: values
//! written by `str` in one expression can be read by `ldr` in the next. Two
//! reserved registers are maintained by the machine itself:
//!
//! - [`INTERMEDIATE`] - side result of `%+`, `%-`, `mround`, `fix` and `avg`
//! - [`LAST`] - result of the most recent evaluation

use crate::number::JsonNumber;
use ahash::AHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Register holding the side result of the last rounding/percentage operation
pub const INTERMEDIATE: &str = "INTERMEDIATE";

/// Register holding the result of the most recent evaluation
pub const LAST: &str = "LAST";

/// Returns true for the registers maintained by the machine itself
pub fn is_reserved(name: &str) -> bool {
    name == INTERMEDIATE || name == LAST
}

/// Mutable name → number store
///
/// Keys are only ever removed by [`RegisterStore::reset`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterStore {
    values: AHashMap<String, f64>,
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterStore {
    /// Create a store holding only the reserved registers (both 0)
    pub fn new() -> Self {
        let mut store = Self {
            values: AHashMap::new(),
        };
        store.seed_reserved();
        store
    }

    fn seed_reserved(&mut self) {
        self.values.insert(INTERMEDIATE.to_string(), 0.0);
        self.values.insert(LAST.to_string(), 0.0);
    }

    /// Read a register
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Write a register
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Check whether a register has ever been written since the last reset
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Copy `source` into `destination`.
    ///
    /// A missing source stores NaN, which reads back as a non-number.
    pub fn copy(&mut self, source: &str, destination: impl Into<String>) {
        let value = self.get(source).unwrap_or(f64::NAN);
        self.set(destination, value);
    }

    /// Clear every register, then re-seed `INTERMEDIATE` and `LAST` with 0
    pub fn reset(&mut self) {
        self.values.clear();
        self.seed_reserved();
    }

    /// Current `INTERMEDIATE` value
    pub fn intermediate(&self) -> f64 {
        self.get(INTERMEDIATE).unwrap_or(0.0)
    }

    pub fn set_intermediate(&mut self, value: f64) {
        self.set(INTERMEDIATE, value);
    }

    /// Current `LAST` value
    pub fn last(&self) -> f64 {
        self.get(LAST).unwrap_or(0.0)
    }

    pub fn set_last(&mut self, value: f64) {
        self.set(LAST, value);
    }

    /// Number of registers, reserved ones included
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over registers in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Sorted copy of the store, for display and serialization
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect()
    }
}

/// Sorted name → number object; NaN and infinities are written as strings
impl Serialize for RegisterStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let values: BTreeMap<&str, JsonNumber> = self
            .values
            .iter()
            .map(|(name, value)| (name.as_str(), JsonNumber(*value)))
            .collect();
        values.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RegisterStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = BTreeMap::<String, JsonNumber>::deserialize(deserializer)?;
        let mut store = RegisterStore::new();
        for (name, JsonNumber(value)) in values {
            store.set(name, value);
        }
        Ok(store)
    }
}

impl FromIterator<(String, f64)> for RegisterStore {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut store = RegisterStore::new();
        for (name, value) in iter {
            store.set(name, value);
        }
        store
    }
}
