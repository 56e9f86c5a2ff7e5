//! Cell Value Resolver
//!
//! Maps one cell of the document model to its trimmed display string. An
//! empty result means the cell has no textual content and must be skipped.

use log::debug;

use crate::error::XlteError;
use crate::format::{format_general, format_iso, is_date_format, FormatParser};
use crate::model::{Cell, CellValue};

/// Cell value resolver.
///
/// Facade over the number and date formatters. One resolver serves a whole
/// workbook because the date epoch is a workbook-level setting.
#[derive(Debug)]
pub struct CellResolver {
    is_1904: bool,
    date_formatter: DateFormatter,
    number_formatter: NumberFormatter,
}

impl CellResolver {
    pub fn new(is_1904: bool) -> Self {
        Self {
            is_1904,
            date_formatter: DateFormatter,
            number_formatter: NumberFormatter,
        }
    }

    /// Resolves a cell to its trimmed display string.
    ///
    /// - strings are returned unmodified (apart from trimming)
    /// - numbers use the cell's number format, falling back to General
    /// - booleans become `true` / `false`
    /// - formulas show their cached value, or the formula text when no
    ///   cached value was stored
    /// - blanks and standalone error values are empty
    pub fn resolve(&self, cell: &Cell) -> String {
        let format = cell.number_format.as_deref();
        let display = match &cell.value {
            CellValue::Formula { text, cached } => {
                self.resolve_formula(text, cached.as_deref(), format)
            }
            value => self.display(value, format),
        };
        display.trim().to_string()
    }

    fn display(&self, value: &CellValue, format: Option<&str>) -> String {
        match value {
            CellValue::String(s) => s.clone(),
            CellValue::Number(n) => self.number_formatter.format(*n, format, self.is_1904),
            CellValue::DateTime(serial) => {
                self.date_formatter.format(*serial, format, self.is_1904)
            }
            CellValue::Bool(b) => b.to_string(),
            CellValue::Formula { .. } | CellValue::Error(_) | CellValue::Blank => String::new(),
        }
    }

    fn resolve_formula(&self, text: &str, cached: Option<&CellValue>, format: Option<&str>) -> String {
        match cached {
            None | Some(CellValue::Blank) => {
                debug!("No cached value for formula {}, using formula text", text);
                text.to_string()
            }
            Some(CellValue::Error(literal)) => literal.clone(),
            Some(value) => self.display(value, format),
        }
    }
}

/// Date formatter.
///
/// Renders serial dates with the cell's format string, or as ISO text when
/// the cell has no date format.
#[derive(Debug)]
pub(crate) struct DateFormatter;

impl DateFormatter {
    pub fn format(&self, serial: f64, format: Option<&str>, is_1904: bool) -> String {
        let formatted = match format {
            Some(format) if is_date_format(format) => {
                FormatParser::parse(format).and_then(|p| p.format_number(serial, is_1904))
            }
            _ => format_iso(serial, is_1904).ok_or_else(|| {
                XlteError::NumberFormat(format!("Serial value {} is not a valid date", serial))
            }),
        };

        formatted.unwrap_or_else(|e| {
            debug!("Date rendering failed ({}), using General", e);
            format_general(serial)
        })
    }
}

/// Number formatter.
///
/// Applies the number format string when present and falls back to the
/// General format when the format is missing or cannot be applied.
#[derive(Debug)]
pub(crate) struct NumberFormatter;

impl NumberFormatter {
    pub fn format(&self, value: f64, format: Option<&str>, is_1904: bool) -> String {
        let Some(format) = format else {
            return format_general(value);
        };

        match FormatParser::parse(format).and_then(|p| p.format_number(value, is_1904)) {
            Ok(formatted) => formatted,
            Err(e) => {
                debug!("Number format '{}' failed ({}), using General", format, e);
                format_general(value)
            }
        }
    }
}

impl Default for CellResolver {
    fn default() -> Self {
        Self::new(false)
    }
}
