//! Currency rounding.
//!
//! RULE: amounts are `Decimal`, never `f64`.
//! Only final amounts are rounded; intermediate bases stay exact.

use rust_decimal::{Decimal, RoundingStrategy};

/// Largest single amount accepted on input (one trillion). Sums and
/// products of bounded inputs stay far inside `Decimal` range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Sum that reports overflow as `None` instead of panicking.
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts.into_iter().try_fold(Decimal::ZERO, Decimal::checked_add)
}

/// Round to the cent, half away from zero (`0.005 -> 0.01`).
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Clamp a value to be non-negative.
pub fn floor_zero(amount: Decimal) -> Decimal {
    amount.max(Decimal::ZERO)
}

/// Render an amount as `$1,234.50` for human-facing explanations.
pub fn format_usd(amount: Decimal) -> String {
    let rounded = round2(amount);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}.{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn round2_is_half_up() {
        assert_eq!(round2(d("1.005")), d("1.01"));
        assert_eq!(round2(d("1.004")), d("1.00"));
        assert_eq!(round2(d("1319.9999")), d("1320.00"));
        assert_eq!(round2(d("-2.345")), d("-2.35"));
    }

    #[test]
    fn floor_zero_clamps_negatives() {
        assert_eq!(floor_zero(d("-3")), Decimal::ZERO);
        assert_eq!(floor_zero(d("3000")), d("3000"));
    }

    #[test]
    fn max_amount_is_one_trillion() {
        assert_eq!(MAX_AMOUNT, d("1000000000000"));
    }

    #[test]
    fn checked_sum_reports_overflow() {
        assert_eq!(checked_sum([d("1.50"), d("2.25")]), Some(d("3.75")));
        assert_eq!(checked_sum(Vec::<Decimal>::new()), Some(Decimal::ZERO));
        assert_eq!(checked_sum([Decimal::MAX, Decimal::ONE]), None);
    }

    #[test]
    fn format_usd_groups_thousands() {
        assert_eq!(format_usd(d("0")), "$0.00");
        assert_eq!(format_usd(d("75.25")), "$75.25");
        assert_eq!(format_usd(d("1370")), "$1,370.00");
        assert_eq!(format_usd(d("1234567.891")), "$1,234,567.89");
        assert_eq!(format_usd(d("-50")), "-$50.00");
    }
}
