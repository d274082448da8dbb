//! Locale-tolerant numeric text parsing.
//!
//! Signal texts mix thousands separators and decimal marks freely
//! (`1 234,56`, `1,234.56`, `1.234,56`, `2,123`). Everything is mapped to a
//! plain `Decimal`.

use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse numeric text whose separators depend on the author's locale.
///
/// Rules:
/// - All Unicode whitespace (including NBSP, thin and narrow no-break spaces)
///   is removed.
/// - When both `,` and `.` appear, the one occurring last is the decimal mark
///   and the other is a thousands separator.
/// - When only one kind appears, `,` is read as a decimal mark.
/// - Anything other than digits, `.` and `-` is discarded.
///
/// # Errors
/// Returns `InvalidNumber` when nothing numeric is left or the remainder is
/// not a well-formed decimal (e.g. `1.2.3`).
pub fn normalize_number(text: &str) -> Result<Decimal> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    let unified = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        _ => compact.replace(',', "."),
    };

    let cleaned: String = unified
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(CoreError::InvalidNumber(format!(
            "bad numeric string: {text:?}"
        )));
    }

    Decimal::from_str(&cleaned)
        .map_err(|e| CoreError::InvalidNumber(format!("bad numeric string: {text:?}: {e}")))
}
