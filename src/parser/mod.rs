//! Parser Module
//!
//! Decodes `.xls`, `.xlsx` and `.xlsm` documents into the document model.
//! calamine reads cell values and formulas; the package and BIFF readers
//! supply number formats and the drawing layer.

mod biff;
mod drawing;
mod package;
mod workbook;

pub(crate) use workbook::WorkbookParser;
