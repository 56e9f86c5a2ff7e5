//! Format parser
//!
//! Parses an Excel number format string into sections and applies it to a
//! numeric cell value.

use chrono::{Datelike, Timelike};

use crate::error::XlteError;

use super::general::{format_general, round_to_second, serial_to_datetime};
use super::sections::{FormatSection, SectionKind};
use super::tokens::{Digit, FormatToken};

/// Parsed number format string.
#[derive(Debug, Clone)]
pub(crate) struct FormatParser {
    sections: Vec<FormatSection>,
}

impl FormatParser {
    /// Parses `format_string`.
    ///
    /// Fails on an unterminated quoted literal or bracket.
    pub fn parse(format_string: &str) -> Result<Self, XlteError> {
        let section_strs = Self::split_sections(format_string)?;

        let mut sections = Vec::new();
        for (idx, section_str) in section_strs.iter().enumerate() {
            let Some(kind) = SectionKind::from_index(idx) else {
                break;
            };
            sections.push(Self::parse_section(section_str, kind)?);
        }

        if sections.is_empty() {
            let mut section = FormatSection::new(SectionKind::Positive);
            section.tokens.push(FormatToken::General);
            sections.push(section);
        }

        Ok(Self { sections })
    }

    /// Whether the positive section renders a date or a time.
    pub fn is_datetime(&self) -> bool {
        self.sections
            .first()
            .is_some_and(|section| section.is_datetime())
    }

    /// Splits on `;` outside quotes, brackets and backslash escapes.
    ///
    /// Empty sections are kept: `0;-0;;@` hides zero values.
    fn split_sections(format_string: &str) -> Result<Vec<String>, XlteError> {
        let mut sections = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_brackets = false;
        let mut chars = format_string.chars();

        while let Some(ch) = chars.next() {
            match ch {
                '"' if !in_brackets => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '\\' if !in_quotes && !in_brackets => {
                    current.push(ch);
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                '[' if !in_quotes => {
                    in_brackets = true;
                    current.push(ch);
                }
                ']' if !in_quotes => {
                    in_brackets = false;
                    current.push(ch);
                }
                ';' if !in_quotes && !in_brackets => {
                    sections.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            }
        }

        if in_quotes {
            return Err(XlteError::NumberFormat(format!(
                "Unterminated quoted text in format: {}",
                format_string
            )));
        }

        if !format_string.is_empty() {
            sections.push(current);
        }

        Ok(sections)
    }

    fn parse_section(section_str: &str, kind: SectionKind) -> Result<FormatSection, XlteError> {
        let mut section = FormatSection::new(kind);
        let chars: Vec<char> = section_str.chars().collect();
        let mut after_decimal = false;
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            i += 1;
            match ch {
                '"' => {
                    let start = i;
                    while i < chars.len() && chars[i] != '"' {
                        i += 1;
                    }
                    let literal: String = chars[start..i].iter().collect();
                    // closing quote
                    i += 1;
                    if !literal.is_empty() {
                        section.tokens.push(FormatToken::Literal(literal));
                    }
                }
                '\\' => {
                    if let Some(&next) = chars.get(i) {
                        section.tokens.push(FormatToken::Literal(next.to_string()));
                        i += 1;
                    }
                }
                '_' => {
                    // padding as wide as the next character
                    i += 1;
                    section.tokens.push(FormatToken::Literal(" ".to_string()));
                }
                '*' => {
                    // repeat-to-fill has no width to fill in plain text
                    i += 1;
                }
                '[' => {
                    let start = i;
                    while i < chars.len() && chars[i] != ']' {
                        i += 1;
                    }
                    if i >= chars.len() {
                        return Err(XlteError::NumberFormat(format!(
                            "Unterminated bracket in format section: {}",
                            section_str
                        )));
                    }
                    let content: String = chars[start..i].iter().collect();
                    i += 1;
                    if let Some(token) = Self::parse_bracket(&content) {
                        section.tokens.push(token);
                    }
                }
                '0' | '#' | '?' => {
                    let digit = match ch {
                        '0' => Digit::Zero,
                        '#' => Digit::Hash,
                        _ => Digit::Space,
                    };
                    if after_decimal {
                        section.tokens.push(FormatToken::DecimalDigit(digit));
                    } else {
                        section.tokens.push(FormatToken::IntegerDigit(digit));
                    }
                }
                '.' if !after_decimal => {
                    after_decimal = true;
                    section.tokens.push(FormatToken::DecimalPoint);
                }
                ',' => section.tokens.push(FormatToken::ThousandSeparator),
                '%' => section.tokens.push(FormatToken::Percent),
                '@' => section.tokens.push(FormatToken::TextPlaceholder),
                'E' | 'e' if matches!(chars.get(i), Some('+') | Some('-')) => {
                    let show_plus = chars[i] == '+';
                    i += 1;
                    let mut digits = 0;
                    while i < chars.len() && matches!(chars[i], '0' | '#' | '?') {
                        digits += 1;
                        i += 1;
                    }
                    section.tokens.push(FormatToken::Exponent {
                        show_plus,
                        digits: digits.max(1),
                    });
                }
                'y' | 'Y' => {
                    let count = 1 + Self::run_length(&chars, &mut i, 'y');
                    section.tokens.push(FormatToken::Year(count));
                }
                'm' | 'M' => {
                    let count = 1 + Self::run_length(&chars, &mut i, 'm');
                    section.tokens.push(FormatToken::Month(count));
                }
                'd' | 'D' => {
                    let count = 1 + Self::run_length(&chars, &mut i, 'd');
                    section.tokens.push(FormatToken::Day(count));
                }
                'h' | 'H' => {
                    let count = 1 + Self::run_length(&chars, &mut i, 'h');
                    section.tokens.push(FormatToken::Hour(count));
                }
                's' | 'S' => {
                    let count = 1 + Self::run_length(&chars, &mut i, 's');
                    section.tokens.push(FormatToken::Second(count));
                }
                'A' | 'a' if Self::starts_with_ci(&chars, i - 1, "am/pm") => {
                    let am: String = chars[i - 1..i + 1].iter().collect();
                    let pm: String = chars[i + 2..i + 4].iter().collect();
                    i += 4;
                    section.tokens.push(FormatToken::AmPm { am, pm });
                }
                'A' | 'a' if Self::starts_with_ci(&chars, i - 1, "a/p") => {
                    let am = chars[i - 1].to_string();
                    let pm = chars[i + 1].to_string();
                    i += 2;
                    section.tokens.push(FormatToken::AmPm { am, pm });
                }
                'G' | 'g' if Self::starts_with_ci(&chars, i - 1, "general") => {
                    i += 6;
                    section.tokens.push(FormatToken::General);
                }
                _ => section.tokens.push(FormatToken::Literal(ch.to_string())),
            }
        }

        Self::resolve_minutes(&mut section.tokens);
        Self::resolve_subseconds(&mut section.tokens);

        Ok(section)
    }

    /// Interprets `[...]` content: elapsed time, currency, color or condition.
    fn parse_bracket(content: &str) -> Option<FormatToken> {
        let lower = content.to_ascii_lowercase();
        if lower.is_empty() {
            return None;
        }
        if lower.chars().all(|c| c == 'h') {
            return Some(FormatToken::ElapsedHours(lower.len()));
        }
        if lower.chars().all(|c| c == 'm') {
            return Some(FormatToken::ElapsedMinutes(lower.len()));
        }
        if lower.chars().all(|c| c == 's') {
            return Some(FormatToken::ElapsedSeconds(lower.len()));
        }
        if let Some(currency) = content.strip_prefix('$') {
            // [$€-407]: symbol, then locale id
            let symbol = currency.split('-').next().unwrap_or_default();
            if symbol.is_empty() {
                return None;
            }
            return Some(FormatToken::Literal(symbol.to_string()));
        }
        if content.starts_with(char::is_alphabetic) {
            return Some(FormatToken::Color(content.to_string()));
        }
        // conditions such as [>100] do not change the rendered text
        None
    }

    /// Counts and consumes further occurrences of `target` (case-insensitive).
    fn run_length(chars: &[char], i: &mut usize, target: char) -> usize {
        let mut count = 0;
        while *i < chars.len() && chars[*i].to_ascii_lowercase() == target {
            *i += 1;
            count += 1;
        }
        count
    }

    fn starts_with_ci(chars: &[char], at: usize, pattern: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        chars.len() >= at + pattern.len()
            && chars[at..at + pattern.len()]
                .iter()
                .zip(&pattern)
                .all(|(c, p)| c.to_ascii_lowercase() == *p)
    }

    /// `m`/`mm` next to an hour or a second means minutes, not months.
    fn resolve_minutes(tokens: &mut [FormatToken]) {
        let is_skippable = |t: &FormatToken| {
            matches!(t, FormatToken::Literal(_) | FormatToken::ThousandSeparator)
        };

        for idx in 0..tokens.len() {
            let count = match tokens[idx] {
                FormatToken::Month(count) if count <= 2 => count,
                _ => continue,
            };

            let after_hour = tokens[..idx]
                .iter()
                .rev()
                .find(|&t| !is_skippable(t))
                .is_some_and(|t| matches!(t, FormatToken::Hour(_) | FormatToken::ElapsedHours(_)));
            let before_second = tokens[idx + 1..]
                .iter()
                .find(|&t| !is_skippable(t))
                .is_some_and(|t| {
                    matches!(t, FormatToken::Second(_) | FormatToken::ElapsedSeconds(_))
                });

            if after_hour || before_second {
                tokens[idx] = FormatToken::Minute(count);
            }
        }
    }

    /// `ss.00`: zeros after a decimal point that follows seconds are
    /// fractional seconds.
    fn resolve_subseconds(tokens: &mut Vec<FormatToken>) {
        let has_seconds = tokens
            .iter()
            .any(|t| matches!(t, FormatToken::Second(_) | FormatToken::ElapsedSeconds(_)));
        if !has_seconds {
            return;
        }
        let Some(point) = tokens.iter().position(|t| *t == FormatToken::DecimalPoint) else {
            return;
        };
        let digits = tokens[point + 1..]
            .iter()
            .take_while(|t| matches!(t, FormatToken::DecimalDigit(_)))
            .count();
        if digits == 0 {
            return;
        }
        tokens.splice(
            point..point + 1 + digits,
            [
                FormatToken::Literal(".".to_string()),
                FormatToken::SubSecond(digits),
            ],
        );
    }

    /// Formats `value` with the section that applies to it.
    ///
    /// Date sections interpret `value` as a serial date in the given epoch.
    pub fn format_number(&self, value: f64, is_1904: bool) -> Result<String, XlteError> {
        if !value.is_finite() {
            return Err(XlteError::NumberFormat(format!(
                "Cannot format non-finite value: {}",
                value
            )));
        }

        let (section, magnitude, minus) = self.select_section(value);

        if section.is_general() {
            let body = format_general(magnitude);
            return Ok(if minus { format!("-{}", body) } else { body });
        }

        if section.is_datetime() {
            if minus {
                return Err(XlteError::NumberFormat(format!(
                    "Negative serial {} cannot be shown as a date",
                    value
                )));
            }
            return Self::format_datetime(magnitude, section, is_1904);
        }

        if section.is_numeric() {
            return Self::format_numeric(magnitude, section, minus);
        }

        let literal = section.literal_text();
        Ok(if minus && !literal.is_empty() {
            format!("-{}", literal)
        } else {
            literal
        })
    }

    /// Picks the section for `value`.
    ///
    /// Returns the section, the value to render and whether a minus sign must
    /// be added. A dedicated negative section renders the absolute value and
    /// supplies its own sign through literals.
    fn select_section(&self, value: f64) -> (&FormatSection, f64, bool) {
        let numeric: Vec<&FormatSection> = self
            .sections
            .iter()
            .filter(|s| s.kind != SectionKind::Text)
            .collect();
        let first = &self.sections[0];

        if value < 0.0 {
            match numeric.get(1) {
                Some(&negative) => (negative, value.abs(), false),
                None => (first, value.abs(), true),
            }
        } else if value == 0.0 {
            match numeric.get(2) {
                Some(&zero) => (zero, 0.0, false),
                None => (first, 0.0, false),
            }
        } else {
            (first, value, false)
        }
    }

    fn format_datetime(
        serial: f64,
        section: &FormatSection,
        is_1904: bool,
    ) -> Result<String, XlteError> {
        let raw = serial_to_datetime(serial, is_1904).ok_or_else(|| {
            XlteError::NumberFormat(format!("Serial value {} is not a valid date", serial))
        })?;

        let has_subsecond = section
            .tokens
            .iter()
            .any(|t| matches!(t, FormatToken::SubSecond(_)));
        let datetime = if has_subsecond {
            raw
        } else {
            round_to_second(raw)
        };
        let has_ampm = section
            .tokens
            .iter()
            .any(|t| matches!(t, FormatToken::AmPm { .. }));
        let total_seconds = if has_subsecond {
            (serial * 86_400.0).floor() as i64
        } else {
            (serial * 86_400.0).round() as i64
        };

        let mut result = String::new();
        for token in &section.tokens {
            match token {
                FormatToken::Year(count) => {
                    if *count <= 2 {
                        result.push_str(&format!("{:02}", datetime.year() % 100));
                    } else {
                        result.push_str(&format!("{:04}", datetime.year()));
                    }
                }
                FormatToken::Month(count) => match count {
                    1 => result.push_str(&datetime.month().to_string()),
                    2 => result.push_str(&format!("{:02}", datetime.month())),
                    3 => result.push_str(&datetime.format("%b").to_string()),
                    4 => result.push_str(&datetime.format("%B").to_string()),
                    _ => {
                        let name = datetime.format("%B").to_string();
                        result.extend(name.chars().next());
                    }
                },
                FormatToken::Day(count) => match count {
                    1 => result.push_str(&datetime.day().to_string()),
                    2 => result.push_str(&format!("{:02}", datetime.day())),
                    3 => result.push_str(&datetime.format("%a").to_string()),
                    _ => result.push_str(&datetime.format("%A").to_string()),
                },
                FormatToken::Hour(count) => {
                    let hour = if has_ampm {
                        match datetime.hour() % 12 {
                            0 => 12,
                            h => h,
                        }
                    } else {
                        datetime.hour()
                    };
                    Self::push_padded(&mut result, hour as i64, *count);
                }
                FormatToken::Minute(count) => {
                    Self::push_padded(&mut result, datetime.minute() as i64, *count)
                }
                FormatToken::Second(count) => {
                    Self::push_padded(&mut result, datetime.second() as i64, *count)
                }
                FormatToken::SubSecond(count) => {
                    let digits = (*count).min(3);
                    let millis = datetime.nanosecond() / 1_000_000;
                    let scale = 10u32.pow(3 - digits as u32);
                    let max = 10u32.pow(digits as u32) - 1;
                    let value = ((millis as f64 / scale as f64).round() as u32).min(max);
                    result.push_str(&format!("{:0width$}", value, width = digits));
                }
                FormatToken::ElapsedHours(count) => {
                    Self::push_padded(&mut result, total_seconds / 3600, *count)
                }
                FormatToken::ElapsedMinutes(count) => {
                    Self::push_padded(&mut result, total_seconds / 60, *count)
                }
                FormatToken::ElapsedSeconds(count) => {
                    Self::push_padded(&mut result, total_seconds, *count)
                }
                FormatToken::AmPm { am, pm } => {
                    if datetime.hour() < 12 {
                        result.push_str(am);
                    } else {
                        result.push_str(pm);
                    }
                }
                FormatToken::Literal(s) => result.push_str(s),
                FormatToken::DecimalPoint => result.push('.'),
                FormatToken::ThousandSeparator => result.push(','),
                _ => {}
            }
        }

        Ok(result)
    }

    fn push_padded(result: &mut String, value: i64, width: usize) {
        if width >= 2 {
            result.push_str(&format!("{:0width$}", value, width = width));
        } else {
            result.push_str(&value.to_string());
        }
    }

    fn format_numeric(
        value: f64,
        section: &FormatSection,
        minus: bool,
    ) -> Result<String, XlteError> {
        let tokens = &section.tokens;
        let layout = NumericLayout::from_tokens(tokens);

        let scaled = value * 100f64.powi(layout.percent_count)
            / 1000f64.powi(layout.scale_commas);

        let (mantissa, exponent) = match layout.exponent_step {
            Some(step) => {
                let (mantissa, exponent) = Self::split_exponent(scaled, step, layout.decimal_places);
                (mantissa, Some(exponent))
            }
            None => (scaled, None),
        };

        let (int_digits, frac_digits) = Self::split_rounded(mantissa, layout.decimal_places);

        let int_slots = Self::integer_slots(&layout.integer_kinds, &int_digits, layout.grouping);
        let frac_slots = Self::fraction_slots(&layout.decimal_kinds, &frac_digits);

        let mut result = String::new();
        let mut int_idx = 0;
        let mut frac_idx = 0;
        let mut leftover_int = layout.integer_kinds.is_empty() && !int_digits.is_empty();

        for token in tokens {
            match token {
                FormatToken::IntegerDigit(_) => {
                    if let Some(slot) = int_slots.get(int_idx) {
                        result.push_str(slot);
                    }
                    int_idx += 1;
                }
                FormatToken::DecimalPoint => {
                    if leftover_int {
                        result.push_str(&int_digits);
                        leftover_int = false;
                    }
                    result.push('.');
                }
                FormatToken::DecimalDigit(_) => {
                    if let Some(slot) = frac_slots.get(frac_idx) {
                        result.push_str(slot);
                    }
                    frac_idx += 1;
                }
                FormatToken::Percent => result.push('%'),
                FormatToken::Exponent { show_plus, digits } => {
                    let exponent = exponent.unwrap_or(0);
                    result.push('E');
                    if exponent < 0 {
                        result.push('-');
                    } else if *show_plus {
                        result.push('+');
                    }
                    result.push_str(&format!(
                        "{:0width$}",
                        exponent.abs(),
                        width = *digits
                    ));
                }
                FormatToken::Literal(s) => result.push_str(s),
                _ => {}
            }
        }

        if leftover_int {
            result.insert_str(0, &int_digits);
        }

        let shows_nonzero = result.chars().any(|c| c.is_ascii_digit() && c != '0');
        if minus && shows_nonzero {
            result.insert(0, '-');
        }

        Ok(result)
    }

    /// Splits `value` into mantissa and exponent for `E+00` formats.
    ///
    /// `step` is the number of integer placeholders when the format
    /// groups exponents (engineering notation like `##0.0E+0`), else 1.
    fn split_exponent(value: f64, step: i32, decimal_places: usize) -> (f64, i32) {
        if value == 0.0 {
            return (0.0, 0);
        }
        let magnitude = value.log10().floor() as i32;
        let mut exponent = magnitude - magnitude.rem_euclid(step);
        let mut mantissa = value / 10f64.powi(exponent);

        let factor = 10f64.powi(decimal_places as i32);
        if (mantissa * factor).round() / factor >= 10f64.powi(step) {
            exponent += step;
            mantissa = value / 10f64.powi(exponent);
        }
        (mantissa, exponent)
    }

    /// Rounds half away from zero and returns the integer digits (empty for
    /// zero) and exactly `places` fraction digits.
    fn split_rounded(value: f64, places: usize) -> (String, String) {
        let factor = 10f64.powi(places as i32);
        let rounded = if value.abs() < 1e15 {
            (value * factor).round() / factor
        } else {
            value
        };
        let text = format!("{:.*}", places, rounded);
        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i.to_string(), f.to_string()),
            None => (text, String::new()),
        };
        let int_part = if int_part == "0" { String::new() } else { int_part };
        (int_part, frac_part)
    }

    /// Distributes integer digits over placeholders from the right.
    ///
    /// Extra digits go to the leftmost placeholder. With grouping, the whole
    /// grouped number is placed in the first slot.
    fn integer_slots(kinds: &[Digit], digits: &str, grouping: bool) -> Vec<String> {
        let digits: Vec<char> = digits.chars().collect();
        let k = kinds.len();
        let mut slots = vec![String::new(); k];
        if k == 0 {
            return slots;
        }

        for j in 0..k {
            let slot = k - 1 - j;
            if j < digits.len() {
                slots[slot].push(digits[digits.len() - 1 - j]);
            } else {
                match kinds[slot] {
                    Digit::Zero => slots[slot].push('0'),
                    Digit::Space => slots[slot].push(' '),
                    Digit::Hash => {}
                }
            }
        }
        if digits.len() > k {
            let extra: String = digits[..digits.len() - k].iter().collect();
            slots[0].insert_str(0, &extra);
        }

        if grouping {
            let joined: String = slots.concat();
            let body = joined.trim_start_matches(' ');
            let padding = &joined[..joined.len() - body.len()];
            let mut grouped = vec![String::new(); k];
            grouped[0] = format!("{}{}", padding, Self::add_thousand_separators(body));
            return grouped;
        }

        slots
    }

    /// Fraction digits per placeholder; trailing insignificant zeros vanish
    /// under `#` and become spaces under `?`.
    fn fraction_slots(kinds: &[Digit], digits: &str) -> Vec<String> {
        let digits: Vec<char> = digits.chars().collect();
        let last_significant = (0..kinds.len())
            .rev()
            .find(|&i| kinds[i] == Digit::Zero || digits.get(i).is_some_and(|&d| d != '0'));

        kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                if last_significant.is_some_and(|last| i <= last) {
                    digits.get(i).map(|d| d.to_string()).unwrap_or_default()
                } else {
                    match kind {
                        Digit::Space => " ".to_string(),
                        _ => String::new(),
                    }
                }
            })
            .collect()
    }

    fn add_thousand_separators(s: &str) -> String {
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len();
        let mut result = String::with_capacity(len + len / 3);

        for (i, ch) in chars.iter().enumerate() {
            result.push(*ch);
            let remaining = len - i - 1;
            if remaining > 0 && remaining % 3 == 0 {
                result.push(',');
            }
        }

        result
    }
}

/// Digit layout of a numeric section.
#[derive(Debug, Default)]
struct NumericLayout {
    integer_kinds: Vec<Digit>,
    decimal_kinds: Vec<Digit>,
    decimal_places: usize,
    percent_count: i32,
    /// Commas after the last digit placeholder divide by 1000 each.
    scale_commas: i32,
    grouping: bool,
    exponent_step: Option<i32>,
}

impl NumericLayout {
    fn from_tokens(tokens: &[FormatToken]) -> Self {
        let mut layout = NumericLayout::default();

        let int_positions: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(t, FormatToken::IntegerDigit(_)))
            .map(|(i, _)| i)
            .collect();
        let first_int = int_positions.first().copied();
        let last_int = int_positions.last().copied();

        for (idx, token) in tokens.iter().enumerate() {
            match token {
                FormatToken::IntegerDigit(kind) => layout.integer_kinds.push(*kind),
                FormatToken::DecimalDigit(kind) => layout.decimal_kinds.push(*kind),
                FormatToken::Percent => layout.percent_count += 1,
                FormatToken::ThousandSeparator => {
                    let between = matches!(
                        (first_int, last_int),
                        (Some(first), Some(last)) if first < idx && idx < last
                    );
                    let trailing = idx > 0
                        && matches!(
                            tokens[idx - 1],
                            FormatToken::IntegerDigit(_)
                                | FormatToken::DecimalDigit(_)
                                | FormatToken::ThousandSeparator
                        );
                    if between {
                        layout.grouping = true;
                    } else if trailing {
                        layout.scale_commas += 1;
                    }
                }
                FormatToken::Exponent { .. } => {
                    let hashes = layout
                        .integer_kinds
                        .iter()
                        .any(|k| *k == Digit::Hash);
                    let count = layout.integer_kinds.len().max(1) as i32;
                    layout.exponent_step = Some(if hashes { count } else { 1 });
                }
                _ => {}
            }
        }

        layout.decimal_places = layout.decimal_kinds.len();
        // a scientific mantissa is never grouped
        if layout.exponent_step.is_some() {
            layout.grouping = false;
        }
        layout
    }
}
