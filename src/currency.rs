//! Currencies and amounts in minor units.
//!
//! Every monetary value in the application is an integer number of the
//! currency's minor units (cents for USD), so no arithmetic is ever done on
//! floating point amounts except where a formula demands it.

use serde::Serialize;
use validator::ValidationError;

/// Largest amount, in minor units, accepted as input or produced by a
/// calculation. Sums over many such amounts still fit in an `i64`.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

/// Whether `amount` is within [`MAX_AMOUNT`] in either direction.
pub fn amount_in_range(amount: i64) -> bool {
    amount.unsigned_abs() <= MAX_AMOUNT.unsigned_abs()
}

pub(crate) fn amount_too_large(code: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(format!("Amounts may not exceed {}.", MAX_AMOUNT).into());
    error
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    code: String,
    symbol: String,
    minor_units: i16,
}

#[derive(Debug, Eq, PartialEq)]
pub enum CurrencyParseError {
    /// The provided amount could not be parsed as a number.
    InvalidNumber(String),
    /// The provided amount included more decimal places than the currency's
    /// minor units allow. The second value is the number of decimals given.
    TooManyDecimals(Currency, usize),
}

impl std::fmt::Display for CurrencyParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber(raw) => write!(f, "'{}' is not a valid amount", raw),
            Self::TooManyDecimals(currency, decimals) => write!(
                f,
                "{} allows {} decimal places but {} were given",
                currency.code, currency.minor_units, decimals
            ),
        }
    }
}

impl Currency {
    /// Construct a new currency.
    ///
    /// # Examples
    ///
    /// ```
    /// # use expense_tracker_api::currency::Currency;
    /// let usd = Currency::new("USD", "$", 2);
    /// assert_eq!("12.50", usd.format_value(1250));
    /// ```
    pub fn new(code: &str, symbol: &str, minor_units: u8) -> Self {
        Self {
            code: code.to_owned(),
            symbol: symbol.to_owned(),
            minor_units: minor_units.into(),
        }
    }

    pub fn usd() -> Self {
        Self::new("USD", "$", 2)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn minor_units(&self) -> usize {
        usize::try_from(self.minor_units).unwrap_or(0)
    }

    /// Parse an amount from a string representation.
    ///
    /// The amount may include whitespace, `,` separators and a leading
    /// currency symbol. The result is an integer in the currency's minor
    /// units: `amount * 10^n` where `n` is the currency's minor units.
    pub fn parse_amount(&self, raw_amount: &str) -> Result<i64, CurrencyParseError> {
        let cleaned_amount: String = raw_amount
            .trim()
            .trim_start_matches(self.symbol.as_str())
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();

        let number_to_parse = match cleaned_amount.rsplit_once('.') {
            // The number has no decimals, so pad it with the appropriate number
            // of zeroes for the currency.
            None => format!("{}{}", cleaned_amount, "0".repeat(self.minor_units())),
            Some((whole_part, decimal_part)) => {
                if decimal_part.len() > self.minor_units() {
                    return Err(CurrencyParseError::TooManyDecimals(
                        self.clone(),
                        decimal_part.len(),
                    ));
                }

                format!(
                    "{}{:0<width$}",
                    whole_part,
                    decimal_part,
                    width = self.minor_units(),
                )
            }
        };

        let number_to_parse = match number_to_parse.as_str() {
            "-" | "" => "0".to_owned(),
            _ => number_to_parse,
        };

        number_to_parse
            .parse()
            .map_err(|_| CurrencyParseError::InvalidNumber(raw_amount.to_owned()))
    }

    /// Format a minor-unit value as a plain decimal string, eg `-0.07`.
    pub fn format_value(&self, value: i64) -> String {
        let sign = if value.is_negative() { "-" } else { "" };
        let amount_str = value.unsigned_abs().to_string();

        if self.minor_units() == 0 {
            return format!("{}{}", sign, amount_str);
        }

        // Pad so there is always at least one whole digit before the decimal
        // point.
        let padded = format!("{:0>width$}", amount_str, width = self.minor_units() + 1);
        let decimal_location = padded.len() - self.minor_units();

        format!(
            "{}{}.{}",
            sign,
            &padded[..decimal_location],
            &padded[decimal_location..]
        )
    }

    /// Format with the currency symbol, eg `-$12.50`.
    pub fn display(&self, value: i64) -> String {
        let formatted = self.format_value(value.abs());

        if value.is_negative() {
            format!("-{}{}", self.symbol, formatted)
        } else {
            format!("{}{}", self.symbol, formatted)
        }
    }

    /// Round a floating point amount that is already expressed in minor units
    /// to the nearest whole minor unit.
    pub fn round_minor(value: f64) -> i64 {
        value.round() as i64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn currency(minor_units: u8) -> Currency {
        match minor_units {
            0 => Currency::new("JPY", "¥", 0),
            2 => Currency::usd(),
            units => Currency::new("XXM", "", units),
        }
    }

    #[test]
    fn format_value_pads_small_amounts() {
        assert_eq!("0.07", currency(2).format_value(7));
        assert_eq!("0.70", currency(2).format_value(70));
        assert_eq!("123.45", currency(2).format_value(12345));
    }

    #[test]
    fn format_negative_decimal() {
        assert_eq!("-0.07", currency(2).format_value(-7));
    }

    #[test]
    fn format_without_minor_units() {
        assert_eq!("1500", currency(0).format_value(1500));
    }

    #[test]
    fn display_places_sign_before_symbol() {
        assert_eq!("-$12.50", currency(2).display(-1250));
        assert_eq!("$0.00", currency(2).display(0));
    }

    #[test]
    fn parse_amount_whole_number_is_padded() {
        assert_eq!(1200, currency(2).parse_amount("12").unwrap());
        assert_eq!(12, currency(0).parse_amount("12").unwrap());
    }

    #[test]
    fn parse_amount_strips_symbol_and_separators() {
        assert_eq!(123450, currency(2).parse_amount(" $1,234.50 ").unwrap());
        assert_eq!(8675309, currency(0).parse_amount("8 675 309").unwrap());
    }

    #[test]
    fn parse_amount_partial_decimals() {
        assert_eq!(7, currency(2).parse_amount(".07").unwrap());
        assert_eq!(10, currency(2).parse_amount("0.1").unwrap());
        assert_eq!(-3142, currency(3).parse_amount("-3.142").unwrap());
    }

    #[test]
    fn parse_amount_invalid_number() {
        assert_eq!(
            CurrencyParseError::InvalidNumber("squirrel".to_owned()),
            currency(2).parse_amount("squirrel").unwrap_err()
        );
    }

    #[test]
    fn parse_amount_too_many_decimals() {
        let usd = currency(2);

        assert_eq!(
            CurrencyParseError::TooManyDecimals(usd.clone(), 3),
            usd.parse_amount("1.005").unwrap_err()
        );
    }
}
