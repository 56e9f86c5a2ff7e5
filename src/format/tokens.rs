//! Format tokens
//!
//! Tokens produced by splitting one section of an Excel number format string.

/// Kind of digit placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Digit {
    /// `0`: always shows a digit, padding with zero
    Zero,
    /// `#`: shows significant digits only
    Hash,
    /// `?`: pads insignificant digits with a space
    Space,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FormatToken {
    /// `yy` / `yyyy`
    Year(usize),
    /// `m`, `mm`, `mmm`, `mmmm`, `mmmmm`
    Month(usize),
    /// `d`, `dd`, `ddd`, `dddd`
    Day(usize),
    Hour(usize),
    /// Created from `Month` when the `m` run sits next to an hour or a second.
    Minute(usize),
    Second(usize),
    /// Fractional seconds after `ss` (e.g. `ss.00` -> 2).
    SubSecond(usize),
    /// `[h]`, `[mm]`, `[ss]`: elapsed time in the given unit.
    ElapsedHours(usize),
    ElapsedMinutes(usize),
    ElapsedSeconds(usize),
    /// `AM/PM` or `A/P`, keeping the spelling of the format string.
    AmPm { am: String, pm: String },

    /// Integer-part digit placeholder (before the decimal point).
    IntegerDigit(Digit),
    /// Fraction-part digit placeholder (after the decimal point).
    DecimalDigit(Digit),
    DecimalPoint,
    ThousandSeparator,
    Percent,
    /// `E+00` / `E-0`: scientific exponent.
    Exponent { show_plus: bool, digits: usize },

    Literal(String),
    /// `[Red]` and friends. Colors do not affect text.
    Color(String),
    /// `@`
    TextPlaceholder,
    /// `General` used inside a section.
    General,
}

impl FormatToken {
    pub fn is_datetime(&self) -> bool {
        matches!(
            self,
            FormatToken::Year(_)
                | FormatToken::Month(_)
                | FormatToken::Day(_)
                | FormatToken::Hour(_)
                | FormatToken::Minute(_)
                | FormatToken::Second(_)
                | FormatToken::SubSecond(_)
                | FormatToken::ElapsedHours(_)
                | FormatToken::ElapsedMinutes(_)
                | FormatToken::ElapsedSeconds(_)
                | FormatToken::AmPm { .. }
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FormatToken::IntegerDigit(_)
                | FormatToken::DecimalDigit(_)
                | FormatToken::DecimalPoint
                | FormatToken::Percent
                | FormatToken::Exponent { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_datetime() {
        assert!(FormatToken::Year(4).is_datetime());
        assert!(FormatToken::Minute(2).is_datetime());
        assert!(FormatToken::ElapsedHours(1).is_datetime());
        assert!(FormatToken::AmPm {
            am: "AM".to_string(),
            pm: "PM".to_string()
        }
        .is_datetime());
        assert!(!FormatToken::IntegerDigit(Digit::Zero).is_datetime());
        assert!(!FormatToken::Literal("$".to_string()).is_datetime());
    }

    #[test]
    fn test_is_numeric() {
        assert!(FormatToken::IntegerDigit(Digit::Hash).is_numeric());
        assert!(FormatToken::DecimalDigit(Digit::Zero).is_numeric());
        assert!(FormatToken::Percent.is_numeric());
        assert!(FormatToken::Exponent {
            show_plus: true,
            digits: 2
        }
        .is_numeric());
        assert!(!FormatToken::ThousandSeparator.is_numeric());
        assert!(!FormatToken::Day(2).is_numeric());
    }
}
