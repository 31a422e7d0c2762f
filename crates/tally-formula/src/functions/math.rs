//! Math functions
//!
//! Everything here works on plain `f64` and never fails: a NaN input gives a
//! NaN output, which the machine turns into `0` at the very end.

use crate::opcode::UnaryFunction;
use tally_core::number::round_half_up;

/// Apply a unary function to the top of the stack
pub fn apply_unary(function: UnaryFunction, x: f64) -> f64 {
    match function {
        UnaryFunction::Sin => x.sin(),
        UnaryFunction::Cos => x.cos(),
        UnaryFunction::Tan => x.tan(),
        UnaryFunction::Asin => x.asin(),
        UnaryFunction::Acos => x.acos(),
        UnaryFunction::Atan => x.atan(),
        UnaryFunction::NaturalLog => x.ln(),
        UnaryFunction::Log10 => x.log10(),
        UnaryFunction::Exp => x.exp(),
        UnaryFunction::Abs => x.abs(),
        UnaryFunction::Floor => x.floor(),
        UnaryFunction::Ceil => x.ceil(),
        UnaryFunction::Round => round_half_up(x),
        UnaryFunction::Sign => sign(x),
        UnaryFunction::Negate => -x,
    }
}

/// -1, 1, or the input itself for ±0 and NaN
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x
    }
}

/// `percent(200, 10) == 20`
pub fn percent(base: f64, rate: f64) -> f64 {
    base / 100.0 * rate
}

/// Round `value` to the nearest multiple of `step`.
///
/// Returns the rounded value and the adjustment (`rounded - value`).
pub fn mround(value: f64, step: f64) -> (f64, f64) {
    let rounded = round_half_up(value / step) * step;
    (rounded, rounded - value)
}

/// Round `value` to `decimals` decimal places.
///
/// Returns the rounded value and the adjustment (`rounded - value`).
pub fn fix(value: f64, decimals: f64) -> (f64, f64) {
    let scale = 10_f64.powf(decimals);
    let fixed = round_half_up(value * scale) / scale;
    (fixed, fixed - value)
}

/// `index`-th root of `base`
pub fn root(base: f64, index: f64) -> f64 {
    base.powf(1.0 / index)
}
