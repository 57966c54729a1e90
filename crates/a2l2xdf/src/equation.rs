//! Conversion-equation translation.
//!
//! A2L compu-methods express raw-to-physical as the rational polynomial
//! `f(x) = (a*x^2 + b*x + c) / (d*x^2 + e*x + f)`. The definition file
//! wants the inverse direction, physical-to-raw, written in the dialect
//! the tuning software evaluates with `X` as the variable.

use crate::text::format_decimal;
use a2l2xdf_symbols::{Coefficients, CompuMethod};

/// Equation text emitted when the compu-method has a quadratic term.
///
/// Kept as a visible marker in the output rather than a hard error, so
/// one odd characteristic does not sink a whole conversion run.
pub const NOT_INVERTIBLE: &str =
    "Cannot handle polynomial ratfunc because we do not know how to invert!";

/// Identity equation used when no coefficients are present.
pub const IDENTITY: &str = "X";

/// Invert a rational compu-method.
///
/// With `a` and `d` both zero the function is the linear rational
/// `(b*x + c)/(e*x + f)`, whose inverse is `(f*X - c) / (b - e*X)`.
/// Anything with a quadratic term yields [`NOT_INVERTIBLE`] verbatim.
/// The zero tests compare numeric values, never formatted strings.
pub fn invert_rational(coeffs: &Coefficients) -> String {
    if coeffs.a == 0.0 && coeffs.d == 0.0 {
        format!(
            "(({} * X) - {} ) / ({} - ({} * X))",
            format_decimal(coeffs.f),
            format_decimal(coeffs.c),
            format_decimal(coeffs.b),
            format_decimal(coeffs.e),
        )
    } else {
        NOT_INVERTIBLE.to_owned()
    }
}

/// Equation for a characteristic or axis conversion. Compu-methods
/// without coefficients (tabular, verbal) are identity conversions.
pub fn conversion_equation(method: &CompuMethod) -> String {
    match &method.coeffs {
        Some(coeffs) => invert_rational(coeffs),
        None => IDENTITY.to_owned(),
    }
}
