//! Calculation options and reports
//!
//! A batch commits raw `f64` values. [`CalculationReport`] pairs each of
//! them with its rendered text according to [`CalculationOptions`].
//!
//! # Example
//!
//! ```rust
//! use tally::prelude::*;
//!
//! let mut session = Session::new();
//! let nodes = vec![NodeSpec::named("third", "1 3 /")];
//! let options = CalculationOptions::with_precision(2);
//!
//! let report = session.calculate(&nodes, &EmptyProvider, None, &options).unwrap();
//! assert_eq!(report.rendered("third"), Some("0.33"));
//! ```

use serde::{Deserialize, Serialize};
use tally_core::number::{format_fixed, format_number};
use tally_formula::BatchOutput;

/// Options for rendering calculated values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationOptions {
    /// Fixed number of decimals; `None` prints the shortest exact form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<usize>,
}

impl CalculationOptions {
    pub fn with_precision(precision: usize) -> Self {
        Self {
            precision: Some(precision),
        }
    }

    /// Render a value
    pub fn render(&self, value: f64) -> String {
        match self.precision {
            Some(precision) => format_fixed(value, precision),
            None => format_number(value),
        }
    }
}

/// A committed value and its rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculatedValue {
    pub name: String,
    #[serde(serialize_with = "tally_core::number::json::serialize")]
    pub value: f64,
    pub rendered: String,
}

/// Results of a calculation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalculationReport {
    /// Named values in commit order
    pub values: Vec<CalculatedValue>,
    /// Number of nodes evaluated, including unnamed ones
    pub evaluated: usize,
}

impl CalculationReport {
    /// Render a batch output
    pub fn from_output(output: &BatchOutput, options: &CalculationOptions) -> Self {
        let values = output
            .iter()
            .map(|(name, value)| CalculatedValue {
                name: name.to_string(),
                value,
                rendered: options.render(value),
            })
            .collect();
        Self {
            values,
            evaluated: output.evaluated(),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.find(name).map(|v| v.value)
    }

    pub fn rendered(&self, name: &str) -> Option<&str> {
        self.find(name).map(|v| v.rendered.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn find(&self, name: &str) -> Option<&CalculatedValue> {
        self.values.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render() {
        let options = CalculationOptions::default();
        assert_eq!(options.render(2.5), "2.5");
        assert_eq!(options.render(3.0), "3");

        let options = CalculationOptions::with_precision(2);
        assert_eq!(options.render(2.5), "2.50");
        assert_eq!(options.render(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_report_from_output() {
        let mut output = BatchOutput::new();
        output.insert("a", 1.0 / 3.0);
        output.insert("b", 2.0);

        let report = CalculationReport::from_output(&output, &CalculationOptions::with_precision(3));
        assert_eq!(report.len(), 2);
        assert_eq!(report.rendered("a"), Some("0.333"));
        assert_eq!(report.rendered("b"), Some("2.000"));
        assert_eq!(report.get("b"), Some(2.0));
        assert_eq!(report.get("c"), None);
    }

    #[test]
    fn test_options_json() {
        let options: CalculationOptions = serde_json::from_str(r#"{"precision":2}"#).unwrap();
        assert_eq!(options, CalculationOptions::with_precision(2));
        let options: CalculationOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.precision, None);
    }

    #[test]
    fn test_report_json_non_finite() {
        let mut output = BatchOutput::new();
        output.insert("ratio", f64::INFINITY);

        let report = CalculationReport::from_output(&output, &CalculationOptions::default());
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"values":[{"name":"ratio","value":"Infinity","rendered":"Infinity"}],"evaluated":0}"#
        );
    }
}
