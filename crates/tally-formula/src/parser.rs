//! Expression tokenizer
//!
//! Expressions are split on whitespace and every token is decoded once into
//! an [`Opcode`]. Decoding never fails: unknown tokens become
//! [`Opcode::Unknown`] and evaluate to `0`. [`validate`] is the strict
//! counterpart for callers that want to reject them up front.

use crate::error::{FormulaError, FormulaResult};
use crate::opcode::Opcode;

/// A decoded token along with its source text
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction<'a> {
    pub op: Opcode,
    pub token: &'a str,
}

/// A decoded expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program<'a> {
    instructions: Vec<Instruction<'a>>,
}

impl<'a> Program<'a> {
    pub fn instructions(&self) -> &[Instruction<'a>] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction<'a>> {
        self.instructions.iter()
    }

    /// Tokens that did not decode to an opcode, operand or literal
    pub fn unknown_tokens(&self) -> impl Iterator<Item = (usize, &'a str)> + '_ {
        self.instructions
            .iter()
            .enumerate()
            .filter(|(_, instruction)| instruction.op.is_unknown())
            .map(|(position, instruction)| (position, instruction.token))
    }
}

impl<'p, 'a> IntoIterator for &'p Program<'a> {
    type Item = &'p Instruction<'a>;
    type IntoIter = std::slice::Iter<'p, Instruction<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

/// Split an expression into tokens
pub fn tokenize(expression: &str) -> impl Iterator<Item = &str> {
    expression.split_whitespace()
}

/// Decode an expression
///
/// # Example
/// ```rust
/// use tally_formula::parse_program;
/// use tally_formula::opcode::{BinaryOperator, Opcode};
///
/// let program = parse_program("2 3 +");
/// assert_eq!(program.len(), 3);
/// assert_eq!(program.instructions()[2].op, Opcode::Binary(BinaryOperator::Add));
/// ```
pub fn parse_program(expression: &str) -> Program<'_> {
    let instructions = tokenize(expression)
        .map(|token| Instruction {
            op: Opcode::from_token(token),
            token,
        })
        .collect();
    Program { instructions }
}

/// Decode an expression, rejecting the first unknown token
///
/// Captured templates (between `|` delimiters) are checked too, except for
/// their leading register base name, which may be a bare word.
pub fn validate(expression: &str) -> FormulaResult<Program<'_>> {
    let program = parse_program(expression);

    let mut capturing = false;
    let mut template_position = 0;
    for (position, instruction) in program.iter().enumerate() {
        if matches!(instruction.op, Opcode::Capture) {
            capturing = !capturing;
            template_position = 0;
            continue;
        }
        let is_base_name = capturing && template_position == 0;
        if capturing {
            template_position += 1;
        }
        if instruction.op.is_unknown() && !is_base_name {
            return Err(FormulaError::UnknownToken {
                token: instruction.token.to_string(),
                position,
            });
        }
    }

    Ok(program)
}
