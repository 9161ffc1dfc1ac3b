use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

use thiserror::Error;

/// Fixed-point decimal with 4 decimal places, stored as a scaled integer.
///
/// Split sums are compared on the scaled integers, so `30.00 + 30.00 + 30.00`
/// is exactly `90.00` and `89.99` never equals it.
///
/// The operators saturate at the `i64` bounds. Use [`Amount::checked_add`]
/// where an exact sum is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

/// Errors produced when parsing an [`Amount`] from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseAmountError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount '{0}'")]
    Invalid(String),
    #[error("amount '{0}' has more than {places} decimal places", places = Amount::PLACES)]
    TooPrecise(String),
    #[error("amount '{0}' is out of range")]
    Overflow(String),
}

impl Amount {
    const SCALE: i64 = 10_000;
    const PLACES: usize = 4;

    pub const ZERO: Amount = Amount(0);

    /// Largest magnitude accepted when parsing: `999999999999.9999`.
    pub const MAX: Amount = Amount(9_999_999_999_999_999);

    pub fn from_scaled(value: i64) -> Self {
        Amount(value)
    }

    /// Whole units, e.g. `Amount::from_units(25)` is `25.0000`.
    pub fn from_units(value: i64) -> Self {
        Amount(value.saturating_mul(Self::SCALE))
    }

    pub fn scaled(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// `None` on overflow.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Divide evenly into `parts`, rounding half away from zero on the last place.
    ///
    /// Returns `None` when `parts` is zero.
    pub fn checked_div(self, parts: usize) -> Option<Amount> {
        if parts == 0 {
            return None;
        }
        let value = i128::from(self.0);
        let parts = parts as i128;
        let mut quotient = value / parts;
        if (value % parts).abs() * 2 >= parts {
            quotient += value.signum();
        }
        // |quotient| <= |self|
        i64::try_from(quotient).ok().map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / Self::SCALE as u64;
        let frac = abs % Self::SCALE as u64;
        write!(f, "{sign}{whole}.{frac:04}")
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    /// Parse a plain decimal (`"12"`, `"-0.5"`, `"89.99"`) without going through floats.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseAmountError::Empty);
        }

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(ParseAmountError::Invalid(s.to_string()));
        }
        if frac.len() > Self::PLACES {
            return Err(ParseAmountError::TooPrecise(s.to_string()));
        }

        let overflow = || ParseAmountError::Overflow(s.to_string());
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            // right-pad so ".5" means 5000 scaled units
            format!("{frac:0<width$}", width = Self::PLACES)
                .parse()
                .map_err(|_| overflow())?
        };

        let scaled = whole
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(frac))
            .filter(|&scaled| scaled <= Self::MAX.0)
            .ok_or_else(overflow)?;
        Ok(Amount(if negative { -scaled } else { scaled }))
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, amount| acc + amount)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Amount {
        s.parse().unwrap()
    }

    #[test]
    fn from_units_scales() {
        assert_eq!(Amount::from_units(25), Amount::from_scaled(250_000));
    }

    #[test]
    fn parses_integers_and_decimals() {
        assert_eq!(parse("100"), Amount::from_scaled(1_000_000));
        assert_eq!(parse("1.5"), Amount::from_scaled(15_000));
        assert_eq!(parse("0.0001"), Amount::from_scaled(1));
        assert_eq!(parse(".25"), Amount::from_scaled(2_500));
        assert_eq!(parse("7."), Amount::from_units(7));
        assert_eq!(parse(" 89.99 "), Amount::from_scaled(899_900));
    }

    #[test]
    fn parses_signs() {
        assert_eq!(parse("-50.25"), Amount::from_scaled(-502_500));
        assert_eq!(parse("+3"), Amount::from_units(3));
    }

    #[test]
    fn parse_is_exact_where_floats_drift() {
        // 0.1 + 0.2 != 0.3 in f64
        assert_eq!(parse("0.1") + parse("0.2"), parse("0.3"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!("".parse::<Amount>(), Err(ParseAmountError::Empty));
        assert!(matches!("abc".parse::<Amount>(), Err(ParseAmountError::Invalid(_))));
        assert!(matches!("1.2.3".parse::<Amount>(), Err(ParseAmountError::Invalid(_))));
        assert!(matches!(".".parse::<Amount>(), Err(ParseAmountError::Invalid(_))));
        assert!(matches!("1e5".parse::<Amount>(), Err(ParseAmountError::Invalid(_))));
    }

    #[test]
    fn parse_rejects_extra_precision() {
        assert!(matches!(
            "1.23456".parse::<Amount>(),
            Err(ParseAmountError::TooPrecise(_))
        ));
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(matches!(
            "99999999999999999999".parse::<Amount>(),
            Err(ParseAmountError::Overflow(_))
        ));
    }

    #[test]
    fn parse_rejects_beyond_max() {
        assert_eq!(parse("999999999999.9999"), Amount::MAX);
        assert_eq!(parse("-999999999999.9999"), Amount::ZERO - Amount::MAX);
        assert!(matches!(
            "1000000000000".parse::<Amount>(),
            Err(ParseAmountError::Overflow(_))
        ));
        assert!(matches!(
            "614891469123651.7205".parse::<Amount>(),
            Err(ParseAmountError::Overflow(_))
        ));
    }

    #[test]
    fn display_formats_positive() {
        assert_eq!(Amount::from_scaled(1_000_000).to_string(), "100.0000");
        assert_eq!(Amount::from_scaled(15_000).to_string(), "1.5000");
        assert_eq!(Amount::from_scaled(1).to_string(), "0.0001");
        assert_eq!(Amount::from_scaled(0).to_string(), "0.0000");
    }

    #[test]
    fn display_formats_negative() {
        assert_eq!(Amount::from_scaled(-502_500).to_string(), "-50.2500");
        assert_eq!(Amount::from_scaled(-1).to_string(), "-0.0001");
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Amount::default(), Amount::ZERO);
        assert!(Amount::default().is_zero());
    }

    #[test]
    fn arithmetic() {
        let mut a = Amount::from_scaled(100);
        a += Amount::from_scaled(50);
        assert_eq!(a, Amount::from_scaled(150));
        a -= Amount::from_scaled(30);
        assert_eq!(a, Amount::from_scaled(120));
        assert_eq!(a - Amount::from_scaled(200), Amount::from_scaled(-80));
    }

    #[test]
    fn operators_saturate() {
        let big = Amount::from_scaled(i64::MAX - 1);
        assert_eq!(big + Amount::from_scaled(5), Amount::from_scaled(i64::MAX));
        assert_eq!(
            Amount::from_scaled(i64::MIN + 1) - Amount::from_scaled(5),
            Amount::from_scaled(i64::MIN)
        );

        let mut acc = big;
        acc += big;
        assert_eq!(acc, Amount::from_scaled(i64::MAX));
        assert_eq!([big, big, big].iter().sum::<Amount>(), Amount::from_scaled(i64::MAX));
        assert_eq!(Amount::from_units(i64::MAX), Amount::from_scaled(i64::MAX));
    }

    #[test]
    fn checked_add_reports_overflow() {
        let big = Amount::from_scaled(i64::MAX - 1);
        assert_eq!(big.checked_add(Amount::from_scaled(1)), Some(Amount::from_scaled(i64::MAX)));
        assert_eq!(big.checked_add(Amount::from_scaled(2)), None);
    }

    #[test]
    fn sums_owned_and_borrowed() {
        let amounts = [Amount::from_units(30), Amount::from_units(30), Amount::from_units(30)];
        assert_eq!(amounts.iter().sum::<Amount>(), Amount::from_units(90));
        assert_eq!(amounts.into_iter().sum::<Amount>(), Amount::from_units(90));
        assert_eq!(std::iter::empty::<Amount>().sum::<Amount>(), Amount::ZERO);
    }

    #[test]
    fn checked_div_exact() {
        assert_eq!(Amount::from_units(100).checked_div(4), Some(Amount::from_units(25)));
    }

    #[test]
    fn checked_div_rounds_half_away_from_zero() {
        // 100 / 3 = 33.33333...
        assert_eq!(Amount::from_units(100).checked_div(3), Some(Amount::from_scaled(333_333)));
        // 0.0005 / 2 = 0.00025 -> 0.0003
        assert_eq!(Amount::from_scaled(5).checked_div(2), Some(Amount::from_scaled(3)));
        assert_eq!(Amount::from_scaled(-5).checked_div(2), Some(Amount::from_scaled(-3)));
    }

    #[test]
    fn checked_div_by_zero_is_none() {
        assert_eq!(Amount::from_units(100).checked_div(0), None);
    }

    #[test]
    fn checked_div_by_huge_counts() {
        assert_eq!(Amount::from_units(100).checked_div(usize::MAX), Some(Amount::ZERO));
        assert_eq!(Amount::from_scaled(i64::MIN).checked_div(1), Some(Amount::from_scaled(i64::MIN)));
    }

    #[test]
    fn negative_ordering() {
        let negative = Amount::from_scaled(-100);
        let positive = Amount::from_scaled(100);
        assert!(negative < Amount::ZERO);
        assert!(Amount::ZERO < positive);
        assert!(positive.is_positive());
        assert!(!Amount::ZERO.is_positive());
    }
}
