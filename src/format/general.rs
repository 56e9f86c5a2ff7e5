//! General number format and serial date conversion.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

/// Significant digits shown by the General format.
const GENERAL_PRECISION: i32 = 10;

/// Formats a number the way the General format displays it.
///
/// Integers print without decimals. Other values keep up to 10 significant
/// digits with trailing zeros removed. Magnitudes of 1e11 and above, and
/// non-zero magnitudes below 1e-9, use scientific notation (`1.23457E+11`).
pub fn format_general(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let abs = value.abs();
    if !(1e-9..1e11).contains(&abs) {
        return format_scientific(value, 5);
    }

    if value.fract() == 0.0 {
        return format!("{}", value as i64);
    }

    let magnitude = abs.log10().floor() as i32;
    let decimals = (GENERAL_PRECISION - 1 - magnitude).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, value))
}

/// `1.23457E+11` style notation with at most `decimals` mantissa decimals.
fn format_scientific(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*E}", decimals, value);
    let (mantissa, exponent) = match formatted.split_once('E') {
        Some(parts) => parts,
        None => return formatted,
    };
    let mantissa = trim_fraction(mantissa);
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}E{}{:02}", mantissa, sign, exponent.abs())
}

/// Strips trailing zeros, and a dangling decimal point, from a fixed-point string.
fn trim_fraction(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Converts an Excel serial date to a date-time, at millisecond precision.
///
/// The 1900 system counts from 1899-12-31 for serials below 60 and from
/// 1899-12-30 afterwards, absorbing the fictitious 1900-02-29. The 1904
/// system counts from 1904-01-01. Negative serials have no date.
pub fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }

    let epoch = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if serial < 60.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };

    let millis = (serial * 86_400_000.0).round();
    if millis > i64::MAX as f64 {
        return None;
    }
    epoch
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::milliseconds(millis as i64))
}

/// Rounds a date-time to the nearest whole second.
pub fn round_to_second(datetime: NaiveDateTime) -> NaiveDateTime {
    let millis = datetime.nanosecond() / 1_000_000;
    let truncated = datetime.with_nanosecond(0).unwrap_or(datetime);
    if millis >= 500 {
        truncated
            .checked_add_signed(Duration::seconds(1))
            .unwrap_or(truncated)
    } else {
        truncated
    }
}

/// ISO rendering for date cells without a usable format string.
///
/// Whole serials render as `YYYY-MM-DD`, serials below one day as
/// `HH:MM:SS` and everything else as `YYYY-MM-DD HH:MM:SS`.
pub fn format_iso(serial: f64, is_1904: bool) -> Option<String> {
    let datetime = round_to_second(serial_to_datetime(serial, is_1904)?);
    let text = if serial.fract() == 0.0 {
        datetime.format("%Y-%m-%d").to_string()
    } else if serial < 1.0 {
        datetime.format("%H:%M:%S").to_string()
    } else {
        datetime.format("%Y-%m-%d %H:%M:%S").to_string()
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_integers() {
        assert_eq!(format_general(0.0), "0");
        assert_eq!(format_general(7.0), "7");
        assert_eq!(format_general(-42.0), "-42");
        assert_eq!(format_general(12345678901.0), "12345678901");
    }

    #[test]
    fn test_general_decimals() {
        assert_eq!(format_general(3.5), "3.5");
        assert_eq!(format_general(0.1 + 0.2), "0.3");
        assert_eq!(format_general(-0.25), "-0.25");
        assert_eq!(format_general(1.0 / 3.0), "0.3333333333");
        assert_eq!(format_general(123.456), "123.456");
    }

    #[test]
    fn test_general_scientific() {
        assert_eq!(format_general(123456789012.0), "1.23457E+11");
        assert_eq!(format_general(1e15), "1E+15");
        assert_eq!(format_general(0.000000000123), "1.23E-10");
        assert_eq!(format_general(-2.5e20), "-2.5E+20");
    }

    #[test]
    fn test_serial_to_datetime_1900() {
        let dt = serial_to_datetime(1.0, false).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "1900-01-01");

        let dt = serial_to_datetime(59.0, false).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "1900-02-28");

        let dt = serial_to_datetime(61.0, false).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "1900-03-01");

        let dt = serial_to_datetime(45000.0, false).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2023-03-15");
    }

    #[test]
    fn test_serial_to_datetime_1904() {
        let dt = serial_to_datetime(0.0, true).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "1904-01-01");
        let dt = serial_to_datetime(1.0, true).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "1904-01-02");
    }

    #[test]
    fn test_serial_to_datetime_negative() {
        assert!(serial_to_datetime(-1.0, false).is_none());
        assert!(serial_to_datetime(f64::NAN, false).is_none());
    }

    #[test]
    fn test_format_iso() {
        assert_eq!(format_iso(45000.0, false).unwrap(), "2023-03-15");
        assert_eq!(format_iso(0.5, false).unwrap(), "12:00:00");
        assert_eq!(format_iso(45000.75, false).unwrap(), "2023-03-15 18:00:00");
    }

    #[test]
    fn test_round_to_second() {
        // 0.4 seconds short of noon
        let dt = serial_to_datetime(0.5 - 0.4 / 86400.0, false).unwrap();
        assert_eq!(round_to_second(dt).format("%H:%M:%S").to_string(), "12:00:00");
    }
}
