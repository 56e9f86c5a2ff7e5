//! Error Types Module
//!
//! Structured error type shared by the decoder, the extractors and the file
//! processor. `thiserror` provides the `From` conversions and message formats.

use thiserror::Error;

/// Error type used throughout the xlte crate.
///
/// Every failure that can happen while a document is being opened, decoded
/// or extracted is expressed through this enum. Input validation failures of
/// the command line pipeline use [`crate::pipeline::InputError`] instead.
///
/// # Variants
///
/// - `Io`: reading the file failed
/// - `Parse`: calamine could not decode the workbook
/// - `Zip` / `Xml`: the OOXML package or one of its parts is malformed
/// - `Biff`: a legacy `.xls` record stream is malformed
/// - `UnsupportedFormat`: the bytes are not a supported spreadsheet document
/// - `SecurityViolation`: a size or path limit was exceeded
///
/// # Example
///
/// ```rust,no_run
/// use xlte::XlteError;
/// use std::fs::File;
///
/// fn open(path: &str) -> Result<File, XlteError> {
///     let file = File::open(path)?; // io::Error converts automatically
///     Ok(file)
/// }
/// ```
#[derive(Error, Debug)]
pub enum XlteError {
    /// I/O failure while reading the document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// calamine failed to decode the workbook.
    ///
    /// Raised for corrupt files, wrong formats and encrypted workbooks.
    #[error("Failed to parse Excel file: {0}")]
    Parse(#[from] calamine::Error),

    /// UTF-8 conversion failed while reading XML attributes.
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The XLSX ZIP container could not be read.
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// An XML part inside the package is malformed.
    #[error("XML error: {0}")]
    Xml(String),

    /// A BIFF record stream of a legacy `.xls` file is malformed.
    #[error("BIFF record error: {0}")]
    Biff(String),

    /// A numeric attribute could not be parsed.
    #[error("Number parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// A number format string or a value it was applied to is not supported.
    #[error("Number format error: {0}")]
    NumberFormat(String),

    /// The document is not in one of the supported spreadsheet formats.
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// A security limit was violated.
    ///
    /// Raised for oversized inputs, ZIP bombs and path traversal attempts
    /// inside the package.
    ///
    /// ```rust,no_run
    /// use xlte::XlteError;
    ///
    /// let error = XlteError::SecurityViolation(
    ///     "File size exceeds maximum allowed size".to_string()
    /// );
    /// ```
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl From<zip::result::ZipError> for XlteError {
    fn from(err: zip::result::ZipError) -> Self {
        XlteError::Zip(err.to_string())
    }
}

impl From<quick_xml::Error> for XlteError {
    fn from(err: quick_xml::Error) -> Self {
        XlteError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for XlteError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        XlteError::Xml(format!("XML attribute error: {}", err))
    }
}
