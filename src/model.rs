//! Document Model
//!
//! In-memory view of a decoded spreadsheet: sheets in workbook order, the
//! cells of each sheet in row-major order, and an optional drawing layer.
//! The decoder in [`crate::parser`] builds it; the extractors read it
//! without doing any I/O, so tests can construct it directly.

use crate::types::CellCoord;

/// A decoded spreadsheet document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    /// Worksheets in ascending sheet-index order.
    pub sheets: Vec<Sheet>,
    /// Whether serial dates count from 1904-01-01.
    pub is_1904: bool,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self {
            sheets,
            is_1904: false,
        }
    }
}

/// One worksheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    /// Present cells, ordered row by row then column by column.
    pub cells: Vec<Cell>,
    pub drawing: Option<Drawing>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: Vec::new(),
            drawing: None,
        }
    }

    /// Appends a cell without a number format.
    pub fn with_cell(mut self, row: u32, col: u32, value: CellValue) -> Self {
        self.cells.push(Cell::new(CellCoord::new(row, col), value));
        self
    }

    pub fn with_drawing(mut self, drawing: Drawing) -> Self {
        self.drawing = Some(drawing);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub coord: CellCoord,
    pub value: CellValue,
    /// Number format string of the cell's style, when known.
    pub number_format: Option<String>,
}

impl Cell {
    pub fn new(coord: CellCoord, value: CellValue) -> Self {
        Self {
            coord,
            value,
            number_format: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.number_format = Some(format.into());
        self
    }
}

/// Typed cell content.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Blank,
    String(String),
    Number(f64),
    /// Serial date value of a cell the decoder recognised as a date.
    DateTime(f64),
    Bool(bool),
    /// Error literal such as `#DIV/0!`.
    Error(String),
    /// Formula text (with the leading `=`) and its cached result, if stored.
    Formula {
        text: String,
        cached: Option<Box<CellValue>>,
    },
}

impl CellValue {
    pub fn formula(text: impl Into<String>, cached: Option<CellValue>) -> Self {
        CellValue::Formula {
            text: text.into(),
            cached: cached.map(Box::new),
        }
    }
}

/// The drawing layer of a sheet, in one of its two object models.
#[derive(Debug, Clone, PartialEq)]
pub enum Drawing {
    /// Objects of a binary `.xls` sheet.
    Legacy(Vec<LegacyShape>),
    /// DrawingML shapes of an `.xlsx`/`.xlsm` sheet, groups flattened.
    Modern(Vec<ModernShape>),
}

/// Capability shared by both shape models: the shape's display text, or
/// `None` when the shape carries no text or cannot expose it.
pub trait TextBearingShape {
    fn display_text(&self) -> Option<&str>;
}

/// Object type of a legacy drawing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyObjectKind {
    Group,
    Line,
    Rectangle,
    Oval,
    Arc,
    Chart,
    TextBox,
    Button,
    Picture,
    Polygon,
    Comment,
    /// Form controls and other object types.
    Other(u16),
}

impl LegacyObjectKind {
    /// Maps the `ot` field of an object's common data.
    pub fn from_object_type(ot: u16) -> Self {
        match ot {
            0x00 => LegacyObjectKind::Group,
            0x01 => LegacyObjectKind::Line,
            0x02 => LegacyObjectKind::Rectangle,
            0x03 => LegacyObjectKind::Oval,
            0x04 => LegacyObjectKind::Arc,
            0x05 => LegacyObjectKind::Chart,
            0x06 => LegacyObjectKind::TextBox,
            0x07 => LegacyObjectKind::Button,
            0x08 => LegacyObjectKind::Picture,
            0x09 => LegacyObjectKind::Polygon,
            0x19 => LegacyObjectKind::Comment,
            other => LegacyObjectKind::Other(other),
        }
    }

    /// Every object except pictures, charts and groups. Notes, buttons and
    /// form controls show their text record like a text box does.
    pub fn is_simple(self) -> bool {
        !matches!(
            self,
            LegacyObjectKind::Group | LegacyObjectKind::Chart | LegacyObjectKind::Picture
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyShape {
    pub object_id: u16,
    pub kind: LegacyObjectKind,
    /// Text from the object's text record; `None` when no record is attached.
    pub text: Option<String>,
}

impl TextBearingShape for LegacyShape {
    fn display_text(&self) -> Option<&str> {
        if !self.kind.is_simple() {
            return None;
        }
        self.text.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModernShapeKind {
    /// `sp`: a shape with optional text body.
    Simple,
    Picture,
    /// `graphicFrame`: charts, tables and other embedded graphics.
    GraphicFrame,
    Connector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModernShape {
    pub kind: ModernShapeKind,
    /// Paragraphs of the text body joined by `\n`.
    pub text: Option<String>,
}

impl ModernShape {
    pub fn simple(text: impl Into<String>) -> Self {
        Self {
            kind: ModernShapeKind::Simple,
            text: Some(text.into()),
        }
    }
}

impl TextBearingShape for ModernShape {
    fn display_text(&self) -> Option<&str> {
        match self.kind {
            ModernShapeKind::Simple => self.text.as_deref(),
            _ => None,
        }
    }
}
