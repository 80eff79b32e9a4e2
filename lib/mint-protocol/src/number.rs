//! Number formatting for metric payloads.
//!
//! Values are written with at most 12 significant digits, without trailing zeros, and always with `.` as the decimal
//! separator. Very large and very small magnitudes switch to scientific notation (`1.5E+15`, `1E-07`).

use std::fmt::Write as _;

/// Maximum number of significant digits written for a value.
pub const SIGNIFICANT_DIGITS: usize = 12;

// Decimal exponents outside of `[MIN_PLAIN_EXPONENT, SIGNIFICANT_DIGITS)` are written in scientific notation.
const MIN_PLAIN_EXPONENT: i32 = -5;

/// Writes `value` to `buf`.
///
/// Non-finite values are written as `NaN`, `Infinity`, or `-Infinity`; callers that need to reject them must do so
/// beforehand.
pub fn write_number(buf: &mut String, value: f64) {
    if value.is_nan() {
        buf.push_str("NaN");
        return;
    }

    if value.is_infinite() {
        buf.push_str(if value > 0.0 { "Infinity" } else { "-Infinity" });
        return;
    }

    // This also covers negative zero.
    if value == 0.0 {
        buf.push('0');
        return;
    }

    // Let the standard formatter do the rounding to the desired number of significant digits, and then lay out the
    // resulting digits ourselves.
    let scientific = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent = exponent.parse::<i32>().unwrap_or(0);

    let digits = mantissa
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>();
    let digits = digits.trim_end_matches('0');

    if value < 0.0 {
        buf.push('-');
    }

    if !(MIN_PLAIN_EXPONENT..SIGNIFICANT_DIGITS as i32).contains(&exponent) {
        let (leading, rest) = digits.split_at(1);
        buf.push_str(leading);
        if !rest.is_empty() {
            buf.push('.');
            buf.push_str(rest);
        }
        buf.push('E');
        buf.push(if exponent < 0 { '-' } else { '+' });
        let _ = write!(buf, "{:02}", exponent.unsigned_abs());
    } else if exponent < 0 {
        buf.push_str("0.");
        for _ in 0..(-exponent - 1) {
            buf.push('0');
        }
        buf.push_str(digits);
    } else {
        let integer_len = exponent as usize + 1;
        if digits.len() <= integer_len {
            buf.push_str(digits);
            for _ in digits.len()..integer_len {
                buf.push('0');
            }
        } else {
            let (integer, fraction) = digits.split_at(integer_len);
            buf.push_str(integer);
            buf.push('.');
            buf.push_str(fraction);
        }
    }
}

/// Formats `value` as a string.
///
/// See [`write_number`].
pub fn format_number(value: f64) -> String {
    let mut buf = String::new();
    write_number(&mut buf, value);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(-42.0), "-42");
        assert_eq!(format_number(123456789012.0), "123456789012");
    }

    #[test]
    fn fractions() {
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(21.1), "21.1");
        assert_eq!(format_number(-0.25), "-0.25");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(3.14159265358979), "3.14159265359");
        assert_eq!(format_number(0.0001), "0.0001");
        assert_eq!(format_number(0.00001), "0.00001");
    }

    #[test]
    fn scientific() {
        assert_eq!(format_number(1.5e15), "1.5E+15");
        assert_eq!(format_number(1e12), "1E+12");
        assert_eq!(format_number(1234567890123.0), "1.23456789012E+12");
        assert_eq!(format_number(1e-7), "1E-07");
        assert_eq!(format_number(-2.5e-10), "-2.5E-10");
        assert_eq!(format_number(1e100), "1E+100");
    }

    #[test]
    fn rounding_carries_into_exponent() {
        // Rounding to 12 significant digits bumps the exponent, which the standard formatter already accounts for.
        assert_eq!(format_number(999999999999.9), "1E+12");
        assert_eq!(format_number(9.9999999999999), "10");
    }

    #[test]
    fn non_finite() {
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }
}
