//! Expression opcode vocabulary

use tally_core::number::parse_float;

/// A single decoded token
#[derive(Debug, Clone, PartialEq)]
pub enum Opcode {
    // === Operands ===
    /// Numeric literal
    Number(f64),
    /// Register or label name (`~name` or an unresolved `$name`), without prefix
    Name(String),
    /// Legacy block opener (`{` or `{label`), pushed verbatim
    BlockOpen(String),
    /// Anything else; evaluates to `0`
    Unknown(String),

    // === Arithmetic ===
    Binary(BinaryOperator),
    Unary(UnaryFunction),
    Constant(Constant),
    /// `%`: `b / 100 * a`
    Percent,
    /// `%+`: `b + b / 100 * a`
    PercentAdd,
    /// `%-`: `b - b / 100 * a`
    PercentSub,
    /// `mround`: round to the nearest multiple of a step
    MRound,
    /// `fix`: round to a number of decimals
    Fix,
    /// `root`: `base ^ (1 / index)`
    Root,
    /// Whole-stack reductions
    Reduce(Reduction),

    // === Stack ===
    Swap,
    Copy,
    Pop,

    // === Registers ===
    /// `ldr`
    Load,
    /// `str`
    Store,
    /// `cpr`
    CopyRegister,
    /// `reset`
    Reset,

    // === Control ===
    /// `jmpz`
    JumpIfZero,
    /// `jmpnz`
    JumpIfNotZero,
    /// `}`: ends skip mode
    BlockClose,
    /// `|`: toggles template capture
    Capture,
    /// `eachreg`: fold a captured template over a register range
    EachReg,
    /// `debug`: log the machine state
    Debug,
}

/// Binary arithmetic operators
///
/// Operands are applied as `b OP a` where `a` is the top of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Modulo,
}

impl BinaryOperator {
    pub fn apply(self, b: f64, a: f64) -> f64 {
        match self {
            BinaryOperator::Add => b + a,
            BinaryOperator::Subtract => b - a,
            BinaryOperator::Multiply => b * a,
            BinaryOperator::Divide => b / a,
            BinaryOperator::Power => b.powf(a),
            BinaryOperator::Modulo => b % a,
        }
    }
}

/// Unary math functions over the top of the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryFunction {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    /// Natural logarithm (keyword `log`)
    NaturalLog,
    /// Base 10 logarithm (keyword `ln`)
    Log10,
    Exp,
    Abs,
    Floor,
    Ceil,
    Round,
    Sign,
    Negate,
}

/// Named constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }
}

/// Reductions that consume the entire stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Average,
    Min,
    Max,
    Count,
}

impl Opcode {
    /// Decode one whitespace-free token
    pub fn from_token(token: &str) -> Opcode {
        if let Some(op) = keyword(token) {
            return op;
        }

        if token.starts_with('}') {
            return Opcode::BlockClose;
        }
        if token.starts_with('|') {
            return Opcode::Capture;
        }
        if let Some(name) = token.strip_prefix('~').or_else(|| token.strip_prefix('$')) {
            return Opcode::Name(name.to_string());
        }
        if token.starts_with('{') {
            return Opcode::BlockOpen(token.to_string());
        }

        match parse_float(token) {
            Some(n) => Opcode::Number(n),
            None => Opcode::Unknown(token.to_string()),
        }
    }

    /// True for tokens that decoded to nothing meaningful
    pub fn is_unknown(&self) -> bool {
        matches!(self, Opcode::Unknown(_))
    }
}

fn keyword(token: &str) -> Option<Opcode> {
    use BinaryOperator as B;
    use UnaryFunction as U;

    let op = match token {
        "+" => Opcode::Binary(B::Add),
        "-" => Opcode::Binary(B::Subtract),
        "*" => Opcode::Binary(B::Multiply),
        "/" => Opcode::Binary(B::Divide),
        "^" => Opcode::Binary(B::Power),
        "mod" => Opcode::Binary(B::Modulo),

        "swap" => Opcode::Swap,
        "cpy" => Opcode::Copy,
        "pop" => Opcode::Pop,

        "%" => Opcode::Percent,
        "%+" => Opcode::PercentAdd,
        "%-" => Opcode::PercentSub,

        "sin" => Opcode::Unary(U::Sin),
        "cos" => Opcode::Unary(U::Cos),
        "tan" => Opcode::Unary(U::Tan),
        "asin" => Opcode::Unary(U::Asin),
        "acos" => Opcode::Unary(U::Acos),
        "atan" => Opcode::Unary(U::Atan),
        "log" => Opcode::Unary(U::NaturalLog),
        "ln" => Opcode::Unary(U::Log10),
        "exp" => Opcode::Unary(U::Exp),
        "abs" => Opcode::Unary(U::Abs),
        "floor" => Opcode::Unary(U::Floor),
        "ceil" => Opcode::Unary(U::Ceil),
        "round" => Opcode::Unary(U::Round),
        "sign" => Opcode::Unary(U::Sign),
        "negate" => Opcode::Unary(U::Negate),

        "pi" => Opcode::Constant(Constant::Pi),
        "e" => Opcode::Constant(Constant::E),

        "ldr" => Opcode::Load,
        "str" => Opcode::Store,
        "cpr" => Opcode::CopyRegister,
        "reset" => Opcode::Reset,

        "mround" => Opcode::MRound,
        "fix" => Opcode::Fix,
        "root" => Opcode::Root,

        "sum" => Opcode::Reduce(Reduction::Sum),
        "avg" => Opcode::Reduce(Reduction::Average),
        "min" => Opcode::Reduce(Reduction::Min),
        "max" => Opcode::Reduce(Reduction::Max),
        "count" => Opcode::Reduce(Reduction::Count),

        "jmpz" => Opcode::JumpIfZero,
        "jmpnz" => Opcode::JumpIfNotZero,
        "eachreg" => Opcode::EachReg,
        "debug" => Opcode::Debug,

        _ => return None,
    };
    Some(op)
}
