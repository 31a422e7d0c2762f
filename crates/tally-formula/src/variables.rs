//! Variable resolution
//!
//! Rewrites `$name`, `$parent.child` and `$*.child` references into numeric
//! literals before an expression reaches the stack machine.

use lazy_regex::{lazy_regex, Lazy};
use regex::{Captures, Regex};
use tally_core::number::format_number;
use tally_core::{RawValue, ValueProvider};

/// `$` followed by name characters, dots and wildcards
static VARIABLE: Lazy<Regex> = lazy_regex!(r"\$[A-Za-z0-9_\-.*]+");

/// A parsed variable reference (without the leading `$`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableRef<'a> {
    /// `$name`
    Local(&'a str),
    /// `$parent.child`
    Scoped { parent: &'a str, child: &'a str },
    /// `$*.child`
    Global(&'a str),
}

impl<'a> VariableRef<'a> {
    /// Parse a reference body. Only the first two dot-separated segments
    /// are significant.
    pub fn parse(reference: &'a str) -> Self {
        let mut segments = reference.split('.');
        let first = segments.next().unwrap_or_default();
        match segments.next() {
            None => VariableRef::Local(first),
            Some(child) if first == "*" => VariableRef::Global(child),
            Some(child) => VariableRef::Scoped {
                parent: first,
                child,
            },
        }
    }

    /// Query the provider for this reference
    pub fn lookup(&self, provider: &dyn ValueProvider) -> Vec<RawValue> {
        match *self {
            VariableRef::Local(name) => provider.values_for(name),
            VariableRef::Scoped { parent, child } => provider.scoped_values_for(parent, child),
            VariableRef::Global(child) => provider.global_values_for(child),
        }
    }
}

/// All variable references in order of appearance, `$` included
pub fn variable_references(expression: &str) -> Vec<&str> {
    VARIABLE.find_iter(expression).map(|m| m.as_str()).collect()
}

/// Distinct variable names (without `$`) in order of first appearance
pub fn variable_names(expression: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for reference in variable_references(expression) {
        let name = &reference[1..];
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Resolve a single reference body to numbers
pub fn resolve(reference: &str, provider: &dyn ValueProvider) -> Vec<f64> {
    VariableRef::parse(reference)
        .lookup(provider)
        .iter()
        .map(RawValue::to_number)
        .collect()
}

/// Replace every variable reference with the values the provider returns
///
/// Each occurrence is looked up on its own. A reference that matches no
/// value is left in place.
///
/// # Example
/// ```rust
/// use tally_core::MemoryProvider;
/// use tally_formula::substitute;
///
/// let values = MemoryProvider::from_pairs([("qty", "3"), ("price", "2.5")]);
/// assert_eq!(substitute("$qty $price *", &values), "3 2.5 *");
/// assert_eq!(substitute("$missing 1 +", &values), "$missing 1 +");
/// ```
pub fn substitute(expression: &str, provider: &dyn ValueProvider) -> String {
    VARIABLE
        .replace_all(expression, |caps: &Captures| {
            let reference = &caps[0];
            let values = resolve(&reference[1..], provider);
            if values.is_empty() {
                reference.to_string()
            } else {
                values
                    .into_iter()
                    .map(format_number)
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        })
        .into_owned()
}
