use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Money is a fixed-point decimal. Stored amounts carry two fractional digits
/// (kopecks/cents); intermediate per-share values keep full precision.
pub type Amount = Decimal;

/// Number of fractional digits of the currency's minor unit.
pub const MINOR_UNIT_DP: u32 = 2;

/// Largest amount accepted for a single expense (10^15). Keeps sums and
/// percentage maths of any realistic trip far from `Decimal` overflow.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// Largest deviation from zero accepted when checking that balances net out.
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// Round to the minor unit, half away from zero.
pub fn round_to_minor(amount: Amount) -> Amount {
    amount.round_dp_with_strategy(MINOR_UNIT_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount as a human-readable currency string.
/// Example: 50 -> "50.00", -12.345 -> "-12.35"
pub fn format_amount(amount: Amount) -> String {
    let rounded = round_to_minor(amount);
    // Avoid printing "-0.00" for tiny negative residues.
    if rounded.is_zero() {
        return "0.00".to_string();
    }
    format!("{:.2}", rounded)
}

/// Parse a user-supplied amount. Negative, non-numeric or larger than
/// [`MAX_AMOUNT`] input is rejected; extra fractional digits are rounded to the minor unit.
/// Example: "50" -> 50.00, "12.5" -> 12.50, "0.005" -> 0.01
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::InvalidFormat);
    }

    let value = Decimal::from_str(input).map_err(|_| ParseAmountError::InvalidFormat)?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ParseAmountError::Negative);
    }

    if value > MAX_AMOUNT {
        return Err(ParseAmountError::TooLarge);
    }

    let mut stored = round_to_minor(value.abs());
    stored.rescale(MINOR_UNIT_DP);
    Ok(stored)
}

/// True if `amount` is within [`BALANCE_TOLERANCE`] of zero.
pub fn is_settled(amount: Amount) -> bool {
    amount.abs() <= BALANCE_TOLERANCE
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
    Negative,
    TooLarge,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid money format"),
            ParseAmountError::Negative => write!(f, "amount must not be negative"),
            ParseAmountError::TooLarge => write!(f, "amount must not exceed {}", MAX_AMOUNT),
        }
    }
}

impl std::error::Error for ParseAmountError {}
