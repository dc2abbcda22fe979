use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Catalog quantities and module effects are stored in this form so that
/// folding bonuses gives the same coefficients on every platform.
pub type Fixed64 = I32F32;

/// Convert an f64 to Fixed64. Use when reading catalog data.
///
/// Out-of-range values saturate and NaN maps to zero.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    if v.is_nan() {
        return Fixed64::ZERO;
    }
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Used when handing coefficients to the solver.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Larger of two fixed-point values.
#[inline]
pub fn max_fixed(a: Fixed64, b: Fixed64) -> Fixed64 {
    if a >= b { a } else { b }
}
