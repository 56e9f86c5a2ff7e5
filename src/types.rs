//! Types Module
//!
//! Item types produced by extraction and the cell coordinate type used to
//! build spreadsheet-style addresses.

/// Address token reported for every shape item.
pub const SHAPE_ADDRESS: &str = "Shape";

/// Cell coordinate (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Converts to A1 notation (e.g. (0, 0) -> "A1", (4, 2) -> "C5")
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        format!("{}{}", Self::col_index_to_letter(self.col), self.row + 1)
    }

    /// Parses an A1 reference such as `"B12"` or `"$AA$3"`.
    ///
    /// Returns `None` when the column letters or the row number are missing,
    /// or when the row is 0.
    pub fn from_a1_notation(reference: &str) -> Option<Self> {
        let reference = reference.replace('$', "");
        let split = reference
            .find(|c: char| c.is_ascii_digit())
            .filter(|&idx| idx > 0)?;
        let (letters, digits) = reference.split_at(split);

        let mut col: u32 = 0;
        for ch in letters.chars() {
            if !ch.is_ascii_alphabetic() {
                return None;
            }
            let value = (ch.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
            col = col.checked_mul(26)?.checked_add(value)?;
        }

        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }

        Some(Self::new(row - 1, col - 1))
    }

    /// Column index to letters (0 -> "A", 25 -> "Z", 26 -> "AA")
    fn col_index_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            let remainder = col % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }
}

/// Text extracted from one worksheet cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellItem {
    file_path: String,
    sheet_name: String,
    cell_address: String,
    content: String,
}

impl CellItem {
    /// Builds a cell item, trimming `content`.
    ///
    /// Returns `None` when the trimmed content is empty, so a `CellItem`
    /// never carries blank text.
    pub fn new(
        file_path: impl Into<String>,
        sheet_name: impl Into<String>,
        cell_address: impl Into<String>,
        content: &str,
    ) -> Option<Self> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        Some(Self {
            file_path: file_path.into(),
            sheet_name: sheet_name.into(),
            cell_address: cell_address.into(),
            content: content.to_string(),
        })
    }

    pub fn cell_address(&self) -> &str {
        &self.cell_address
    }
}

/// Text extracted from a text-bearing drawing shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeItem {
    file_path: String,
    sheet_name: String,
    content: String,
}

impl ShapeItem {
    /// Builds a shape item, trimming `content`. Returns `None` for blank text.
    pub fn new(
        file_path: impl Into<String>,
        sheet_name: impl Into<String>,
        content: &str,
    ) -> Option<Self> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        Some(Self {
            file_path: file_path.into(),
            sheet_name: sheet_name.into(),
            content: content.to_string(),
        })
    }
}

/// One piece of text extracted from a spreadsheet document.
///
/// Items are immutable values. Their `content` is always trimmed and
/// non-empty because both constructors reject blank text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedItem {
    Cell(CellItem),
    Shape(ShapeItem),
}

impl ExtractedItem {
    /// Path of the document the item was extracted from.
    pub fn file_path(&self) -> &str {
        match self {
            ExtractedItem::Cell(cell) => &cell.file_path,
            ExtractedItem::Shape(shape) => &shape.file_path,
        }
    }

    pub fn sheet_name(&self) -> &str {
        match self {
            ExtractedItem::Cell(cell) => &cell.sheet_name,
            ExtractedItem::Shape(shape) => &shape.sheet_name,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ExtractedItem::Cell(cell) => &cell.content,
            ExtractedItem::Shape(shape) => &shape.content,
        }
    }

    /// The cell address for cells, [`SHAPE_ADDRESS`] for shapes.
    pub fn address(&self) -> &str {
        match self {
            ExtractedItem::Cell(cell) => &cell.cell_address,
            ExtractedItem::Shape(_) => SHAPE_ADDRESS,
        }
    }
}

impl From<CellItem> for ExtractedItem {
    fn from(item: CellItem) -> Self {
        ExtractedItem::Cell(item)
    }
}

impl From<ShapeItem> for ExtractedItem {
    fn from(item: ShapeItem) -> Self {
        ExtractedItem::Shape(item)
    }
}
