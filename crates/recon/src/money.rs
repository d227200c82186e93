//! Monetary amounts as integer minor units.
//!
//! Every cost in the engine is an `i64` count of cents. Strings coming from
//! spreadsheets and portals carry currency symbols and thousands separators
//! (`"$1,080.47"`); [`parse_money`] strips those before converting.

/// Parse a decimal amount string to i64 minor units (cents).
///
/// Handles `"1234.56"`, `"1,234.5"`, `"$1234"`, `"-$5.00"`, `"$-5.00"`.
/// Returns `Ok(None)` for an empty cell so callers can pick their default.
pub fn parse_money(s: &str) -> Result<Option<i64>, String> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    let s = cleaned.trim();
    if s.is_empty() {
        return Ok(None);
    }

    let negative = s.starts_with('-');
    let s = s.trim_start_matches('-').trim_start_matches('+');
    if s.is_empty() {
        return Err("missing digits".to_string());
    }

    let (whole, frac) = match s.find('.') {
        Some(dot) => (&s[..dot], &s[dot + 1..]),
        None => (s, ""),
    };
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("not a number: {s}"));
    }
    if whole.is_empty() && frac.is_empty() {
        return Err(format!("not a number: {s}"));
    }

    let dollars: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|e| format!("bad dollars: {e}"))?
    };
    let cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|e| format!("bad cents: {e}"))? * 10,
        2 => frac.parse().map_err(|e| format!("bad cents: {e}"))?,
        _ => return Err(format!("too many decimal places: {s}")),
    };

    let minor = dollars
        .checked_mul(100)
        .and_then(|d| d.checked_add(cents))
        .ok_or_else(|| format!("amount out of range: {s}"))?;
    Ok(Some(if negative { -minor } else { minor }))
}

/// Format cents as a plain decimal string (`-1.00`, `15.00`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
