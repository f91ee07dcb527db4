//! Pure formatting helpers: truncation, thousands grouping, and
//! fixed-point rendering of high-precision decimals. No module above this
//! one should need to hand-roll number formatting.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Truncate a string to `max_len` characters, appending `"..."` if it was
/// longer. Never panics on multi-byte input: truncation happens on `char`
/// boundaries.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{truncated}...")
}

/// Insert `,` thousands separators into the integer part of a formatted
/// number string, leaving any fractional part untouched.
pub fn group_thousands(s: &str) -> String {
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    let digits: Vec<char> = int_part.chars().collect();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Render a decimal scaled by `10^18` (a native-unit balance) as a
/// fixed-point string with `decimals` fractional digits. Never truncates
/// the underlying value; only the rendered string is rounded.
pub fn render_scaled(raw: Decimal, scale: u32, decimals: u32) -> String {
    let divisor = Decimal::from(10u64.pow(scale.min(18)));
    let value = raw / divisor;
    format!("{:.*}", decimals as usize, value)
}

/// Render a gas price in wei as `"<f2> Gwei"` for a transaction record.
pub fn gas_price_gwei(wei: u128) -> String {
    let gwei = Decimal::from(wei) / Decimal::from(1_000_000_000u64);
    format!("{gwei:.2} Gwei")
}

/// Render a fiat price with a fixed number of decimals, e.g. for the UI's
/// `fiat_decimals` setting.
pub fn render_fiat(value: f64, decimals: u32) -> String {
    format!("{value:.*}", decimals as usize)
}

/// Best-effort conversion from [`Decimal`] to [`f64`], used only where a
/// collaborator genuinely needs a float (e.g. a UI sparkline); never used
/// on the hot path that must preserve 10^18-scale exactness.
pub fn decimal_to_f64_lossy(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_string_is_unchanged() {
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn truncate_long_string_gets_ellipsis() {
        assert_eq!(truncate("abcdefghij", 5), "ab...");
    }

    #[test]
    fn group_thousands_handles_fraction() {
        assert_eq!(group_thousands("1234567.89"), "1,234,567.89");
    }

    #[test]
    fn group_thousands_handles_small_number() {
        assert_eq!(group_thousands("42"), "42");
    }

    #[test]
    fn group_thousands_handles_negative() {
        assert_eq!(group_thousands("-1234"), "-1,234");
    }

    #[test]
    fn render_scaled_rounds_to_requested_decimals() {
        // 2.5 * 10^18 wei, rendered at 4 decimals.
        let raw = Decimal::from(2_500_000_000_000_000_000u128);
        assert_eq!(render_scaled(raw, 18, 4), "2.5000");
    }

    #[test]
    fn gas_price_gwei_renders_two_decimals() {
        assert_eq!(gas_price_gwei(20_000_000_000), "20.00 Gwei");
    }
}
