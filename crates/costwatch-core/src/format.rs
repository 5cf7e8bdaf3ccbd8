//! Display helpers for amounts and percentages

use costwatch_types::Metric;
use rust_decimal::{Decimal, RoundingStrategy};

fn round(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// `$1,234.50` for USD, `1,234.50 EUR` for anything else
pub fn currency(amount: Decimal, unit: &str) -> String {
    let rounded = round(amount, 2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let body = group_thousands(&format!("{:.2}", rounded.abs()));

    if unit.eq_ignore_ascii_case("USD") {
        format!("{}${}", sign, body)
    } else {
        format!("{}{} {}", sign, body, unit)
    }
}

/// `12.3%`, or `N/A` when the value is not computable
pub fn percentage(value: &Metric<Decimal>) -> String {
    match value.as_option() {
        Some(v) => format!("{:.1}%", round(*v, 1)),
        None => "N/A".to_string(),
    }
}

/// `+12.3%` / `-4.0%`, or `N/A`
pub fn signed_percentage(value: &Metric<Decimal>) -> String {
    match value.as_option() {
        Some(v) => {
            let rounded = round(*v, 1);
            if rounded > Decimal::ZERO {
                format!("+{:.1}%", rounded)
            } else {
                format!("{:.1}%", rounded)
            }
        }
        None => "N/A".to_string(),
    }
}

fn group_thousands(fixed: &str) -> String {
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed, ""));
    let digits = int_part.as_bytes();
    let mut out = String::with_capacity(fixed.len() + digits.len() / 3);

    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*digit as char);
    }

    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use costwatch_types::Unavailability;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency() {
        assert_eq!(currency(dec!(1234.5), "USD"), "$1,234.50");
        assert_eq!(currency(dec!(0.005), "USD"), "$0.01");
        assert_eq!(currency(dec!(-15), "usd"), "-$15.00");
        assert_eq!(currency(dec!(999), "EUR"), "999.00 EUR");
        assert_eq!(currency(dec!(1000000), "EUR"), "1,000,000.00 EUR");
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(&Metric::value(dec!(71.739))), "71.7%");
        assert_eq!(percentage(&Metric::value(dec!(0.05))), "0.1%");
        assert_eq!(
            percentage(&Metric::not_computable(Unavailability::ZeroBudget)),
            "N/A"
        );
    }

    #[test]
    fn test_signed_percentage() {
        assert_eq!(signed_percentage(&Metric::value(dec!(12.34))), "+12.3%");
        assert_eq!(signed_percentage(&Metric::value(dec!(-4))), "-4.0%");
        assert_eq!(signed_percentage(&Metric::value(dec!(0))), "0.0%");
    }
}
