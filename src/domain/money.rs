use thiserror::Error;

/// Money is represented as integer cents; there is a single implicit currency.
/// 1 unit = 100 cents, so 50.00 = 5000 cents.
pub type Cents = i64;

/// Format cents as a decimal string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("invalid amount format: {0:?}")]
    InvalidFormat(String),

    #[error("amount has more than two decimal places: {0:?}")]
    TooPrecise(String),

    #[error("amount must be positive: {0:?}")]
    NotPositive(String),

    #[error("amount is too large: {0:?}")]
    Overflow(String),
}

/// Parse a user-supplied amount into positive cents.
///
/// Accepts "50", "50.5", "50.05" and ".50". Negative, zero and
/// sub-cent amounts are rejected rather than truncated, because every
/// ledger entry must carry a positive amount.
pub fn parse_amount(input: &str) -> Result<Cents, ParseAmountError> {
    let raw = input.trim();
    let invalid = || ParseAmountError::InvalidFormat(raw.to_string());

    if raw.is_empty() || raw.starts_with('-') || raw.starts_with('+') {
        return Err(if raw.starts_with('-') {
            ParseAmountError::NotPositive(raw.to_string())
        } else {
            invalid()
        });
    }

    let (units_str, fraction_str) = match raw.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (raw, ""),
    };

    if fraction_str.len() > 2 {
        return Err(ParseAmountError::TooPrecise(raw.to_string()));
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !fraction_str.chars().all(|c| c.is_ascii_digit())
        || (units_str.is_empty() && fraction_str.is_empty())
    {
        return Err(invalid());
    }

    let units: Cents = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseAmountError::Overflow(raw.to_string()))?
    };
    let fraction: Cents = match fraction_str.len() {
        0 => 0,
        1 => fraction_str.parse::<Cents>().map_err(|_| invalid())? * 10,
        _ => fraction_str.parse().map_err(|_| invalid())?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(|| ParseAmountError::Overflow(raw.to_string()))?;

    if cents == 0 {
        return Err(ParseAmountError::NotPositive(raw.to_string()));
    }
    Ok(cents)
}
