//! File Processor
//!
//! Opens one document, decodes it and runs the workbook extractor over it.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use crate::error::XlteError;
use crate::extractor::WorkbookExtractor;
use crate::parser::WorkbookParser;
use crate::security::SecurityConfig;
use crate::types::ExtractedItem;

/// File processor.
///
/// The file handle and the decoder are owned by the call and dropped before
/// it returns, on success and on every error path.
#[derive(Debug, Default)]
pub struct FileProcessor {
    security: SecurityConfig,
}

impl FileProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses custom security limits.
    pub fn with_security(security: SecurityConfig) -> Self {
        Self { security }
    }

    /// Extracts the items of the document at `path`.
    ///
    /// The item file paths are `path` as given. A document without any text
    /// yields an empty list.
    pub fn process_file(&self, path: &Path) -> Result<Vec<ExtractedItem>, XlteError> {
        let file = File::open(path)?;
        let file_path = path.to_string_lossy();
        let items = self.process_reader(BufReader::new(file), &file_path)?;
        debug!("Extracted {} items from {}", items.len(), file_path);
        Ok(items)
    }

    /// Extracts the items of a document read from `reader`, tagging them
    /// with `file_path`.
    pub fn process_reader<R: Read>(
        &self,
        reader: R,
        file_path: &str,
    ) -> Result<Vec<ExtractedItem>, XlteError> {
        let workbook = WorkbookParser::open(reader, &self.security)?.into_workbook()?;
        Ok(WorkbookExtractor.extract(&workbook, file_path))
    }
}
