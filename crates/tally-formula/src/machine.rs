//! Stack machine
//!
//! Executes decoded expressions against an operand stack and a
//! [`RegisterStore`]. Evaluation never fails: missing operands read as
//! [`Value::Undefined`], arithmetic on anything that is not a number yields
//! NaN, and a final non-number result is reported as `0`.

use crate::functions::{self, math};
use crate::opcode::Opcode;
use crate::parser::{parse_program, Program};
use tally_core::number::{format_number, parse_float, parse_or_zero};
use tally_core::RegisterStore;
use tracing::{debug, warn};

/// Upper bound on the number of fold steps a single `eachreg` may run
pub const MAX_FOLD_STEPS: i64 = 1_000_000;

/// Operand stack entry
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    /// Register name, block label or captured template
    Text(String),
    /// Read past the bottom of the stack, or an unset register
    Undefined,
}

impl Value {
    /// Arithmetic reading: text must be a complete number, `Undefined` is NaN
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    0.0
                } else {
                    text.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Undefined => f64::NAN,
        }
    }

    /// Register key: text as-is, numbers in canonical decimal form
    pub fn to_key(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Text(text) => text.clone(),
            Value::Undefined => "undefined".to_string(),
        }
    }

    /// Final-result reading; `None` when there is no usable number
    fn to_result(&self) -> Option<f64> {
        let n = match self {
            Value::Number(n) => *n,
            Value::Text(text) => parse_float(text)?,
            Value::Undefined => return None,
        };
        (!n.is_nan()).then_some(n)
    }

    fn is_zero(&self) -> bool {
        matches!(self, Value::Number(n) if *n == 0.0)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Option<f64>> for Value {
    fn from(n: Option<f64>) -> Self {
        n.map_or(Value::Undefined, Value::Number)
    }
}

/// Per-call interpreter state
struct Frame<'a> {
    stack: Vec<Value>,
    /// Set by `jmpz`/`jmpnz`, cleared by the next `}`
    skipping: bool,
    /// Tokens buffered since an opening `|`
    capture: Option<Vec<&'a str>>,
}

impl Frame<'_> {
    fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::Undefined)
    }

    fn pop_number(&mut self) -> f64 {
        self.pop().to_number()
    }

    fn push(&mut self, value: impl Into<Value>) {
        self.stack.push(value.into());
    }
}

/// Stack machine bound to a register store
pub struct Machine<'r> {
    registers: &'r mut RegisterStore,
}

impl<'r> Machine<'r> {
    pub fn new(registers: &'r mut RegisterStore) -> Self {
        Self { registers }
    }

    pub fn registers(&self) -> &RegisterStore {
        self.registers
    }

    /// Evaluate an expression on an empty stack
    pub fn execute(&mut self, expression: &str) -> f64 {
        self.execute_with_stack(expression, Vec::new())
    }

    /// Evaluate an expression on top of a pre-seeded stack
    pub fn execute_with_stack(&mut self, expression: &str, seed: Vec<Value>) -> f64 {
        let program = parse_program(expression);
        self.run(&program, seed)
    }

    /// Run a decoded program, store its result in `LAST` and return it
    pub fn run(&mut self, program: &Program<'_>, seed: Vec<Value>) -> f64 {
        let mut frame = Frame {
            stack: seed,
            skipping: false,
            capture: None,
        };

        for instruction in program {
            if let Some(buffer) = frame.capture.as_mut() {
                if matches!(instruction.op, Opcode::Capture) {
                    let template = buffer.join(" ");
                    frame.capture = None;
                    frame.push(Value::Text(template));
                } else {
                    buffer.push(instruction.token);
                }
                continue;
            }

            if frame.skipping {
                if matches!(instruction.op, Opcode::BlockClose) {
                    frame.skipping = false;
                }
                continue;
            }

            self.step(&instruction.op, &mut frame);
        }

        if let Some(buffer) = frame.capture {
            debug!(tokens = buffer.len(), "discarding unclosed capture");
        }

        let result = frame
            .stack
            .pop()
            .and_then(|value| value.to_result())
            .unwrap_or(0.0);
        self.registers.set_last(result);
        result
    }

    fn step(&mut self, op: &Opcode, frame: &mut Frame<'_>) {
        match op {
            // === Operands ===
            Opcode::Number(n) => frame.push(*n),
            Opcode::Name(name) => frame.push(Value::Text(name.clone())),
            Opcode::BlockOpen(label) => frame.push(Value::Text(label.clone())),
            Opcode::Unknown(_) => frame.push(0.0),

            // === Arithmetic ===
            Opcode::Binary(operator) => {
                let a = frame.pop_number();
                let b = frame.pop_number();
                frame.push(operator.apply(b, a));
            }
            Opcode::Unary(function) => {
                let a = frame.pop_number();
                frame.push(math::apply_unary(*function, a));
            }
            Opcode::Constant(constant) => frame.push(constant.value()),
            Opcode::Percent => {
                let a = frame.pop_number();
                let b = frame.pop_number();
                frame.push(math::percent(b, a));
            }
            Opcode::PercentAdd | Opcode::PercentSub => {
                let a = frame.pop_number();
                let b = frame.pop_number();
                let part = math::percent(b, a);
                self.registers.set_intermediate(part);
                if matches!(op, Opcode::PercentAdd) {
                    frame.push(b + part);
                } else {
                    frame.push(b - part);
                }
            }
            Opcode::MRound => {
                let step = frame.pop_number();
                let value = frame.pop_number();
                let (rounded, delta) = math::mround(value, step);
                self.registers.set_intermediate(delta);
                frame.push(rounded);
            }
            Opcode::Fix => {
                let decimals = frame.pop_number();
                let value = frame.pop_number();
                let (fixed, delta) = math::fix(value, decimals);
                self.registers.set_intermediate(delta);
                frame.push(fixed);
            }
            Opcode::Root => {
                let index = frame.pop_number();
                let base = frame.pop_number();
                frame.push(math::root(base, index));
            }
            Opcode::Reduce(reduction) => {
                let values: Vec<f64> = frame.stack.drain(..).map(|v| v.to_number()).collect();
                let reduced = functions::reduce(*reduction, &values);
                if let Some(count) = reduced.count {
                    self.registers.set_intermediate(count as f64);
                }
                frame.push(reduced.value);
            }

            // === Stack ===
            Opcode::Swap => {
                let a = frame.pop();
                let b = frame.pop();
                frame.push(a);
                frame.push(b);
            }
            Opcode::Copy => {
                let a = frame.pop();
                frame.push(a.clone());
                frame.push(a);
            }
            Opcode::Pop => {
                frame.pop();
            }

            // === Registers ===
            Opcode::Load => {
                let name = frame.pop().to_key();
                frame.push(self.registers.get(&name));
            }
            Opcode::Store => {
                let name = frame.pop().to_key();
                let value = frame.pop_number();
                self.registers.set(name, value);
                frame.push(value);
            }
            Opcode::CopyRegister => {
                let destination = frame.pop().to_key();
                let source = frame.pop().to_key();
                self.registers.copy(&source, destination);
            }
            Opcode::Reset => self.registers.reset(),

            // === Control ===
            Opcode::JumpIfZero | Opcode::JumpIfNotZero => {
                let _label = frame.pop();
                let condition = frame.pop();
                let jump_on_zero = matches!(op, Opcode::JumpIfZero);
                if condition.is_zero() == jump_on_zero {
                    frame.skipping = true;
                } else {
                    frame.push(condition);
                }
            }
            // Only meaningful while skipping
            Opcode::BlockClose => {}
            Opcode::Capture => frame.capture = Some(Vec::new()),
            Opcode::EachReg => {
                let template = frame.pop();
                let folded = self.fold_registers(&template);
                frame.push(folded);
            }
            Opcode::Debug => {
                debug!(stack = ?frame.stack, registers = ?self.registers.snapshot(), "machine state");
            }
        }
    }

    /// `eachreg`: `<base> <start> <end> <initial> <fold...>`
    ///
    /// Runs `fold` once per index with the seed stack `[accumulator,
    /// register(base + index)]`, threading the result into the next step.
    fn fold_registers(&mut self, template: &Value) -> Value {
        let Value::Text(template) = template else {
            return Value::Undefined;
        };

        let fields: Vec<&str> = template.split_whitespace().collect();
        if fields.len() < 5 {
            debug!(template = %template, "eachreg template needs at least five fields");
            return Value::Undefined;
        }

        let base = fields[0].trim_start_matches('~');
        let (Some(start), Some(end)) = (parse_float(fields[1]), parse_float(fields[2])) else {
            return Value::Undefined;
        };
        if !start.is_finite() || !end.is_finite() {
            return Value::Undefined;
        }
        let (start, end) = (start.trunc() as i64, end.trunc() as i64);
        if end.saturating_sub(start) >= MAX_FOLD_STEPS {
            warn!(start, end, "eachreg range too large, skipping");
            return Value::Undefined;
        }

        let fold = fields[4..].join(" ");
        let program = parse_program(&fold);

        let mut accumulator = parse_or_zero(fields[3]);
        for index in start..=end {
            let register = self.registers.get(&format!("{base}{index}"));
            accumulator = self.run(&program, vec![accumulator.into(), register.into()]);
        }
        Value::Number(accumulator)
    }
}

/// Evaluate an expression against a register store
///
/// # Example
/// ```rust
/// use tally_core::RegisterStore;
/// use tally_formula::execute;
///
/// let mut registers = RegisterStore::new();
/// assert_eq!(execute("10 3 -", &mut registers), 7.0);
/// assert_eq!(registers.last(), 7.0);
/// ```
pub fn execute(expression: &str, registers: &mut RegisterStore) -> f64 {
    Machine::new(registers).execute(expression)
}
