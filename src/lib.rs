//! xlte - Excel text extractor
//!
//! Extracts the text of cells and text boxes from Excel files (`.xls`,
//! `.xlsx`, `.xlsm`) and renders it either for a human reading a terminal or
//! as tab-separated records for other tools.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use xlte::{FileProcessor, OutputFormatter};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let items = FileProcessor::new().process_file(Path::new("report.xlsx"))?;
//!     print!("{}", OutputFormatter::Tsv.format(&items));
//!     Ok(())
//! }
//! ```
//!
//! Every item carries the file path, the sheet name, the cell address (or
//! `Shape` for text boxes) and the trimmed display text:
//!
//! ```text
//! report.xlsx	Sheet1	A1	Revenue
//! report.xlsx	Sheet1	B1	1,234.50
//! report.xlsx	Sheet1	Shape	Note: figures are preliminary
//! ```
//!
//! # Processing a Directory
//!
//! ```rust,no_run
//! use xlte::{InputMode, OutputFormatter, Pipeline};
//!
//! let mode = InputMode::from_args(None, Some("reports".into()), true).unwrap();
//! let status = Pipeline::new(OutputFormatter::Terminal).run(
//!     &mode,
//!     &mut std::io::stdout(),
//!     &mut std::io::stderr(),
//! );
//! std::process::exit(status);
//! ```
//!
//! # In-memory Documents
//!
//! The extractors operate on the document model only, so a workbook can be
//! built by hand:
//!
//! ```rust
//! use xlte::model::{CellValue, Sheet, Workbook};
//! use xlte::WorkbookExtractor;
//!
//! let workbook = Workbook::new(vec![Sheet::new("Sheet1")
//!     .with_cell(0, 0, CellValue::Number(3.5))
//!     .with_cell(0, 1, CellValue::formula("=A1*2", Some(CellValue::Number(7.0))))]);
//!
//! let items = WorkbookExtractor.extract(&workbook, "a.xlsx");
//! assert_eq!(items[1].address(), "B1");
//! assert_eq!(items[1].content(), "7");
//! ```

pub mod cli;
mod error;
mod extractor;
mod format;
pub mod model;
mod output;
mod parser;
mod pipeline;
mod processor;
mod resolver;
mod security;
mod types;

pub use error::XlteError;
pub use extractor::{SheetExtractor, WorkbookExtractor};
pub use output::{escape_text, OutputFormatter, TerminalFormatter, TsvFormatter};
pub use pipeline::{find_excel_files, is_supported_extension, InputError, InputMode, Pipeline};
pub use processor::FileProcessor;
pub use resolver::CellResolver;
pub use security::SecurityConfig;
pub use types::{CellCoord, CellItem, ExtractedItem, ShapeItem, SHAPE_ADDRESS};
