//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during expression validation or batch evaluation
///
/// Numeric defects (bad literals, stack underflow, NaN) are not errors: they
/// evaluate to `0`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// A node was reached again while its own dependencies were being evaluated
    #[error("Cyclic dependency detected at {node} ({})", .chain.join(" -> "))]
    CyclicDependency {
        /// Label of the node that closed the cycle
        node: String,
        /// Labels of the nodes on the traversal path, ending with `node`
        chain: Vec<String>,
    },

    /// Token that is neither an opcode, a name, nor a numeric literal
    #[error("Unknown token '{token}' at position {position}")]
    UnknownToken { token: String, position: usize },
}
