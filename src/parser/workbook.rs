//! Workbook Decoder
//!
//! Combines calamine (cell values and formulas) with the package and record
//! readers of this module (number formats, 1904 flag, drawing layer) into the
//! document model of [`crate::model`].

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use calamine::{open_workbook_auto_from_rs, Data, Reader, SheetType, Sheets};
use log::{debug, warn};

use crate::error::XlteError;
use crate::model::{Cell, CellValue, Drawing, Sheet, Workbook};
use crate::security::SecurityConfig;
use crate::types::CellCoord;

use super::biff::{read_legacy, LegacyWorkbook};
use super::package::PackageMetadata;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Data read next to calamine, depending on the container format.
#[derive(Debug)]
enum Metadata {
    Package(PackageMetadata),
    Legacy(LegacyWorkbook),
    Unavailable,
}

/// Workbook parser.
///
/// Holds the whole document in memory: calamine needs a cloneable reader and
/// the metadata readers open the same bytes a second time.
pub(crate) struct WorkbookParser {
    sheets: Sheets<Cursor<Vec<u8>>>,
    metadata: Metadata,
}

impl WorkbookParser {
    /// Reads and opens a document.
    ///
    /// # Errors
    ///
    /// - `SecurityViolation` when the input or the package exceeds `security`
    /// - `UnsupportedFormat` when the bytes are neither a ZIP package nor a
    ///   compound document
    /// - `Parse` when calamine cannot open the workbook
    pub fn open<R: Read>(mut reader: R, security: &SecurityConfig) -> Result<Self, XlteError> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        security.check_input_size(buffer.len() as u64)?;

        let metadata = if buffer.starts_with(ZIP_MAGIC) {
            Metadata::Package(PackageMetadata::open(Cursor::new(buffer.as_slice()), security)?)
        } else if buffer.starts_with(CFB_MAGIC) {
            match read_legacy(Cursor::new(buffer.as_slice())) {
                Ok(legacy) => Metadata::Legacy(legacy),
                Err(e) => {
                    warn!("Could not read drawing objects and formats: {}", e);
                    Metadata::Unavailable
                }
            }
        } else {
            return Err(XlteError::UnsupportedFormat(
                "not an Excel workbook (expected an OOXML package or a compound document)"
                    .to_string(),
            ));
        };

        let sheets = open_workbook_auto_from_rs(Cursor::new(buffer))?;
        Ok(Self { sheets, metadata })
    }

    /// Names of the worksheets in workbook order. Chart sheets are excluded.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets
            .sheets_metadata()
            .iter()
            .filter(|sheet| sheet.typ == SheetType::WorkSheet)
            .map(|sheet| sheet.name.clone())
            .collect()
    }

    pub fn is_1904(&self) -> bool {
        match &self.metadata {
            Metadata::Package(package) => package.is_1904(),
            Metadata::Legacy(legacy) => legacy.is_1904,
            Metadata::Unavailable => false,
        }
    }

    /// Decodes every worksheet into the document model.
    pub fn into_workbook(mut self) -> Result<Workbook, XlteError> {
        let is_1904 = self.is_1904();
        let mut sheets = Vec::new();
        for name in self.sheet_names() {
            sheets.push(self.parse_sheet(&name)?);
        }
        Ok(Workbook { sheets, is_1904 })
    }

    fn parse_sheet(&mut self, name: &str) -> Result<Sheet, XlteError> {
        let values = self.sheets.worksheet_range(name)?;

        let mut cells: BTreeMap<CellCoord, CellValue> = BTreeMap::new();
        let (row0, col0) = values.start().unwrap_or((0, 0));
        for (row, col, data) in values.used_cells() {
            let coord = CellCoord::new(row0 + row as u32, col0 + col as u32);
            cells.insert(coord, convert_data(data));
        }

        match self.sheets.worksheet_formula(name) {
            Ok(formulas) => {
                let (row0, col0) = formulas.start().unwrap_or((0, 0));
                for (row, col, text) in formulas.used_cells() {
                    let coord = CellCoord::new(row0 + row as u32, col0 + col as u32);
                    let cached = cells.remove(&coord).filter(|v| *v != CellValue::Blank);
                    cells.insert(coord, CellValue::formula(format!("={}", text), cached));
                }
            }
            Err(e) => warn!("Could not read formulas of sheet '{}': {}", name, e),
        }

        let (mut sheet, formats) = match &mut self.metadata {
            Metadata::Package(package) => {
                let part = package.take_sheet(name).unwrap_or_default();
                let formats: BTreeMap<CellCoord, String> = part
                    .style_ids
                    .iter()
                    .filter_map(|(coord, style)| {
                        package
                            .format_string(*style)
                            .map(|format| (*coord, format.to_string()))
                    })
                    .collect();
                let mut sheet = Sheet::new(name);
                sheet.drawing = part.drawing.filter(|s| !s.is_empty()).map(Drawing::Modern);
                (sheet, formats)
            }
            Metadata::Legacy(legacy) => {
                let part = legacy.sheets.remove(name).unwrap_or_default();
                let mut sheet = Sheet::new(name);
                if !part.shapes.is_empty() {
                    sheet.drawing = Some(Drawing::Legacy(part.shapes));
                }
                (sheet, part.cell_formats.into_iter().collect())
            }
            Metadata::Unavailable => (Sheet::new(name), BTreeMap::new()),
        };

        sheet.cells = cells
            .into_iter()
            .map(|(coord, value)| Cell {
                coord,
                value,
                number_format: formats.get(&coord).cloned(),
            })
            .collect();

        debug!(
            "Decoded sheet '{}': {} cells, drawing: {}",
            name,
            sheet.cells.len(),
            sheet.drawing.is_some()
        );
        Ok(sheet)
    }
}

/// Maps a calamine cell to the document model.
fn convert_data(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
        Data::Empty => CellValue::Blank,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModernShape;
    use rust_xlsxwriter::{Format, Formula, Shape};

    fn xlsx_bytes() -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();

        let sheet = workbook.add_worksheet();
        sheet.set_name("Data").unwrap();
        sheet.write_string(0, 0, "hello").unwrap();
        sheet
            .write_number_with_format(1, 0, 1234.5, &Format::new().set_num_format("#,##0.00"))
            .unwrap();
        sheet
            .write_formula(2, 0, Formula::new("=A2*2").set_result("2469"))
            .unwrap();
        sheet.write_boolean(3, 1, true).unwrap();
        sheet
            .insert_shape(5, 1, &Shape::textbox().set_text("Note:\nRemember"))
            .unwrap();

        let second = workbook.add_worksheet();
        second.set_name("Empty").unwrap();

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_decode_xlsx() {
        let parser = WorkbookParser::open(Cursor::new(xlsx_bytes()), &SecurityConfig::default())
            .unwrap();
        assert_eq!(parser.sheet_names(), vec!["Data", "Empty"]);
        assert!(!parser.is_1904());

        let workbook = parser.into_workbook().unwrap();
        assert_eq!(workbook.sheets.len(), 2);

        let data = &workbook.sheets[0];
        let coords: Vec<String> = data.cells.iter().map(|c| c.coord.to_a1_notation()).collect();
        assert_eq!(coords, vec!["A1", "A2", "A3", "B4"]);

        assert_eq!(data.cells[0].value, CellValue::String("hello".into()));
        assert_eq!(data.cells[1].value, CellValue::Number(1234.5));
        assert_eq!(data.cells[1].number_format.as_deref(), Some("#,##0.00"));
        match &data.cells[2].value {
            CellValue::Formula { text, cached } => {
                assert_eq!(text, "=A2*2");
                assert!(matches!(
                    cached.as_deref(),
                    Some(CellValue::Number(_)) | Some(CellValue::String(_))
                ));
            }
            other => panic!("expected a formula, got {:?}", other),
        }
        assert_eq!(data.cells[3].value, CellValue::Bool(true));

        assert_eq!(
            data.drawing,
            Some(Drawing::Modern(vec![ModernShape::simple("Note:\nRemember")]))
        );

        assert!(workbook.sheets[1].cells.is_empty());
        assert!(workbook.sheets[1].drawing.is_none());
    }

    #[test]
    fn test_unsupported_bytes() {
        let result = WorkbookParser::open(
            Cursor::new(b"just some text".to_vec()),
            &SecurityConfig::default(),
        );
        assert!(matches!(result, Err(XlteError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_input_size_limit() {
        let config = SecurityConfig {
            max_input_file_size: 16,
            ..SecurityConfig::default()
        };
        let result = WorkbookParser::open(Cursor::new(xlsx_bytes()), &config);
        assert!(matches!(result, Err(XlteError::SecurityViolation(_))));
    }

    #[test]
    fn test_corrupt_package_is_error() {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        assert!(WorkbookParser::open(Cursor::new(bytes), &SecurityConfig::default()).is_err());
    }

    #[test]
    fn test_convert_data() {
        assert_eq!(convert_data(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(convert_data(&Data::Empty), CellValue::Blank);
        assert_eq!(
            convert_data(&Data::Error(calamine::CellErrorType::Div0)),
            CellValue::Error("#DIV/0!".into())
        );
        assert_eq!(
            convert_data(&Data::DateTimeIso("2024-01-01T00:00:00".into())),
            CellValue::String("2024-01-01T00:00:00".into())
        );
    }
}
