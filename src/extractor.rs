//! Extractors
//!
//! Walk the decoded document model and produce [`ExtractedItem`]s. Nothing
//! in this module performs I/O, so it can be driven by hand-built models.

use log::debug;

use crate::model::{Drawing, Sheet, TextBearingShape, Workbook};
use crate::resolver::CellResolver;
use crate::types::{CellItem, ExtractedItem, ShapeItem};

/// Sheet extractor.
///
/// Produces the items of one sheet: non-empty cells in row-major order,
/// followed by the text of the sheet's shapes in drawing order.
pub struct SheetExtractor<'a> {
    file_path: &'a str,
    sheet_name: &'a str,
    resolver: &'a CellResolver,
}

impl<'a> SheetExtractor<'a> {
    pub fn new(file_path: &'a str, sheet_name: &'a str, resolver: &'a CellResolver) -> Self {
        Self {
            file_path,
            sheet_name,
            resolver,
        }
    }

    pub fn extract(&self, sheet: &Sheet) -> Vec<ExtractedItem> {
        let mut items = self.extract_cells(sheet);
        items.extend(self.extract_shapes(sheet));
        items
    }

    /// Items for every cell that resolves to non-empty text.
    pub fn extract_cells(&self, sheet: &Sheet) -> Vec<ExtractedItem> {
        sheet
            .cells
            .iter()
            .filter_map(|cell| {
                let content = self.resolver.resolve(cell);
                CellItem::new(
                    self.file_path,
                    self.sheet_name,
                    cell.coord.to_a1_notation(),
                    &content,
                )
            })
            .map(ExtractedItem::from)
            .collect()
    }

    /// Items for the text-bearing shapes of the drawing layer, if any.
    pub fn extract_shapes(&self, sheet: &Sheet) -> Vec<ExtractedItem> {
        match &sheet.drawing {
            Some(Drawing::Legacy(shapes)) => self.collect_shapes(shapes),
            Some(Drawing::Modern(shapes)) => self.collect_shapes(shapes),
            None => Vec::new(),
        }
    }

    fn collect_shapes<S: TextBearingShape>(&self, shapes: &[S]) -> Vec<ExtractedItem> {
        let mut skipped = 0usize;
        let items: Vec<ExtractedItem> = shapes
            .iter()
            .filter_map(|shape| match shape.display_text() {
                Some(text) => ShapeItem::new(self.file_path, self.sheet_name, text),
                None => {
                    skipped += 1;
                    None
                }
            })
            .map(ExtractedItem::from)
            .collect();

        if skipped > 0 {
            debug!(
                "Skipped {} shapes without text on sheet '{}'",
                skipped, self.sheet_name
            );
        }
        items
    }
}

/// Workbook extractor: the items of every sheet, in sheet order.
pub struct WorkbookExtractor;

impl WorkbookExtractor {
    pub fn extract(&self, workbook: &Workbook, file_path: &str) -> Vec<ExtractedItem> {
        let resolver = CellResolver::new(workbook.is_1904);
        workbook
            .sheets
            .iter()
            .flat_map(|sheet| {
                let items = SheetExtractor::new(file_path, &sheet.name, &resolver).extract(sheet);
                debug!("Sheet '{}': {} items", sheet.name, items.len());
                items
            })
            .collect()
    }
}
