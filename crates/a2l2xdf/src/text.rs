//! Text conventions of the emitted document.
//!
//! Every title, unit, and numeric string that reaches the output passes
//! through one of these helpers, so the rules live in exactly one place.

/// Replace the Unicode replacement character with the degree sign.
///
/// The upstream A2L export mangles `°` in unit and title strings into
/// U+FFFD. Nothing else is rewritten.
pub fn repair_degree_sign(s: &str) -> String {
    s.replace('\u{FFFD}', "\u{00B0}")
}

/// Render a limit or coefficient for the output document.
///
/// Integral values keep one fractional digit (`2` becomes `"2.0"`) so
/// generated files diff cleanly against the existing definition corpus.
pub fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
