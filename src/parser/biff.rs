//! BIFF8 Record Reader
//!
//! Reads the parts of a legacy `.xls` workbook that calamine does not
//! expose: the drawing objects of each worksheet with their text, the number
//! format of every numeric cell and the 1904 date flag.
//!
//! The workbook stream is a flat sequence of records (`id: u16`,
//! `len: u16`, payload). The globals substream lists the sheets with the
//! stream offset of their own substream. Embedded charts open nested
//! `BOF`/`EOF` pairs, which are skipped.

use std::collections::HashMap;
use std::io::{Read, Seek};

use log::debug;

use crate::error::XlteError;
use crate::format::builtin_format;
use crate::model::{LegacyObjectKind, LegacyShape};
use crate::types::CellCoord;

const RECORD_BOF: u16 = 0x0809;
const RECORD_EOF: u16 = 0x000A;
const RECORD_CONTINUE: u16 = 0x003C;
const RECORD_FILEPASS: u16 = 0x002F;
const RECORD_BOUNDSHEET: u16 = 0x0085;
const RECORD_DATEMODE: u16 = 0x0022;
const RECORD_FORMAT: u16 = 0x041E;
const RECORD_XF: u16 = 0x00E0;
const RECORD_NUMBER: u16 = 0x0203;
const RECORD_RK: u16 = 0x027E;
const RECORD_FORMULA: u16 = 0x0006;
const RECORD_MULRK: u16 = 0x00BD;
const RECORD_OBJ: u16 = 0x005D;
const RECORD_TXO: u16 = 0x01B6;

const BIFF8_VERSION: u16 = 0x0600;
const SHEET_TYPE_WORKSHEET: u8 = 0x00;
/// `ftCmo` sub-record of `OBJ`: object type and id.
const SUBRECORD_CMO: u16 = 0x0015;

/// Legacy workbook data keyed by sheet name.
#[derive(Debug, Default)]
pub(crate) struct LegacyWorkbook {
    pub is_1904: bool,
    pub sheets: HashMap<String, LegacySheet>,
}

#[derive(Debug, Default)]
pub(crate) struct LegacySheet {
    /// Drawing objects in record order, cell notes included.
    pub shapes: Vec<LegacyShape>,
    /// Number format of numeric cells whose style is not General.
    pub cell_formats: HashMap<CellCoord, String>,
}

/// Reads the workbook stream of a compound document.
pub(crate) fn read_legacy<R: Read + Seek>(reader: R) -> Result<LegacyWorkbook, XlteError> {
    let mut compound = cfb::CompoundFile::open(reader)?;
    let path = if compound.exists("/Workbook") {
        "/Workbook"
    } else if compound.exists("/Book") {
        "/Book"
    } else {
        return Err(XlteError::Biff("No workbook stream found".to_string()));
    };

    let mut stream = compound.open_stream(path)?;
    let mut data = Vec::new();
    stream.read_to_end(&mut data)?;
    parse_workbook_stream(&data)
}

#[derive(Debug, Clone, Copy)]
struct Record<'a> {
    id: u16,
    data: &'a [u8],
}

/// Sequential reader over the records of a stream.
struct RecordReader<'a> {
    stream: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    fn at(stream: &'a [u8], pos: usize) -> Self {
        Self { stream, pos }
    }

    fn next_record(&mut self) -> Result<Option<Record<'a>>, XlteError> {
        if self.pos >= self.stream.len() {
            return Ok(None);
        }
        let header = self
            .stream
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| truncated(self.pos))?;
        let id = u16::from_le_bytes([header[0], header[1]]);
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;
        let start = self.pos + 4;
        let data = self
            .stream
            .get(start..start + len)
            .ok_or_else(|| truncated(self.pos))?;
        self.pos = start + len;
        Ok(Some(Record { id, data }))
    }
}

fn truncated(offset: usize) -> XlteError {
    XlteError::Biff(format!("Truncated record at offset {}", offset))
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decodes `count` characters stored compressed (Latin-1) or as UTF-16LE.
fn decode_chars(bytes: &[u8], count: usize, wide: bool) -> String {
    if wide {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .take(count)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().take(count).map(|&b| b as char).collect()
    }
}

#[derive(Debug)]
struct SheetEntry {
    offset: usize,
    name: String,
}

/// Global workbook data.
#[derive(Debug, Default)]
struct Globals {
    is_1904: bool,
    sheets: Vec<SheetEntry>,
    /// ifmt -> format string of user-defined formats
    formats: HashMap<u16, String>,
    /// ifmt of every XF record
    xfs: Vec<u16>,
}

impl Globals {
    fn format_for_xf(&self, ixfe: u16) -> Option<String> {
        let ifmt = *self.xfs.get(ixfe as usize)?;
        let format = match self.formats.get(&ifmt) {
            Some(custom) => custom.as_str(),
            None => builtin_format(ifmt as u32)?,
        };
        if format.eq_ignore_ascii_case("General") {
            None
        } else {
            Some(format.to_string())
        }
    }
}

pub(crate) fn parse_workbook_stream(stream: &[u8]) -> Result<LegacyWorkbook, XlteError> {
    let mut reader = RecordReader::at(stream, 0);
    match reader.next_record()? {
        Some(Record { id: RECORD_BOF, data }) => {
            if read_u16(data, 0) != Some(BIFF8_VERSION) {
                debug!("Workbook stream is older than BIFF8, drawing objects not read");
                return Ok(LegacyWorkbook::default());
            }
        }
        _ => return Err(XlteError::Biff("Workbook stream does not start with BOF".to_string())),
    }

    let globals = parse_globals(&mut reader)?;

    let mut workbook = LegacyWorkbook {
        is_1904: globals.is_1904,
        sheets: HashMap::new(),
    };
    for entry in &globals.sheets {
        let sheet = parse_sheet(stream, entry.offset, &globals)?;
        debug!(
            "Sheet '{}': {} drawing objects, {} formatted cells",
            entry.name,
            sheet.shapes.len(),
            sheet.cell_formats.len()
        );
        workbook.sheets.insert(entry.name.clone(), sheet);
    }
    Ok(workbook)
}

fn parse_globals(reader: &mut RecordReader<'_>) -> Result<Globals, XlteError> {
    let mut globals = Globals::default();

    while let Some(record) = reader.next_record()? {
        match record.id {
            RECORD_EOF => break,
            RECORD_FILEPASS => {
                return Err(XlteError::Biff("Workbook is encrypted".to_string()));
            }
            RECORD_DATEMODE => globals.is_1904 = read_u16(record.data, 0) == Some(1),
            RECORD_BOUNDSHEET => {
                // lbPlyPos u32, hsState u8, dt u8, ShortXLUnicodeString
                let data = record.data;
                let (Some(offset), Some(&sheet_type), Some(&cch), Some(&flags)) =
                    (read_u32(data, 0), data.get(5), data.get(6), data.get(7))
                else {
                    return Err(XlteError::Biff("Malformed BOUNDSHEET record".to_string()));
                };
                if sheet_type != SHEET_TYPE_WORKSHEET {
                    continue;
                }
                let name = decode_chars(&data[8..], cch as usize, flags & 0x01 != 0);
                globals.sheets.push(SheetEntry {
                    offset: offset as usize,
                    name,
                });
            }
            RECORD_FORMAT => {
                // ifmt u16, XLUnicodeString (cch u16, flags u8, chars)
                let data = record.data;
                let (Some(ifmt), Some(cch), Some(&flags)) =
                    (read_u16(data, 0), read_u16(data, 2), data.get(4))
                else {
                    continue;
                };
                let format = decode_chars(&data[5..], cch as usize, flags & 0x01 != 0);
                globals.formats.insert(ifmt, format);
            }
            RECORD_XF => globals.xfs.push(read_u16(record.data, 2).unwrap_or(0)),
            _ => {}
        }
    }

    Ok(globals)
}

/// Text of a `TXO` record being collected from its `CONTINUE` records.
#[derive(Debug)]
struct PendingText {
    /// Index of the shape the text belongs to; `None` when no object precedes it.
    target: Option<usize>,
    remaining: usize,
    text: String,
}

fn parse_sheet(stream: &[u8], offset: usize, globals: &Globals) -> Result<LegacySheet, XlteError> {
    let mut reader = RecordReader::at(stream, offset);
    let mut sheet = LegacySheet::default();
    let mut depth = 0usize;
    // shape the next TXO belongs to
    let mut last_object: Option<usize> = None;
    let mut pending: Option<PendingText> = None;

    while let Some(record) = reader.next_record()? {
        if record.id != RECORD_CONTINUE {
            if let Some(text) = pending.take() {
                attach_text(&mut sheet.shapes, text);
            }
        }

        match record.id {
            RECORD_BOF => {
                depth += 1;
                continue;
            }
            RECORD_EOF => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
                continue;
            }
            _ if depth != 1 => continue,
            _ => {}
        }

        match record.id {
            RECORD_NUMBER | RECORD_RK | RECORD_FORMULA => {
                if let (Some(row), Some(col), Some(ixfe)) = (
                    read_u16(record.data, 0),
                    read_u16(record.data, 2),
                    read_u16(record.data, 4),
                ) {
                    add_cell_format(&mut sheet, globals, row, col, ixfe);
                }
            }
            RECORD_MULRK => {
                // rw, colFirst, [ixfe u16, rk u32]*, colLast
                let data = record.data;
                if let (Some(row), Some(first_col)) = (read_u16(data, 0), read_u16(data, 2)) {
                    let cells = data.len().saturating_sub(6) / 6;
                    for i in 0..cells {
                        if let Some(ixfe) = read_u16(data, 4 + i * 6) {
                            add_cell_format(&mut sheet, globals, row, first_col.saturating_add(i as u16), ixfe);
                        }
                    }
                }
            }
            RECORD_OBJ => {
                last_object = None;
                if let Some((kind, object_id)) = parse_object(record.data) {
                    sheet.shapes.push(LegacyShape {
                        object_id,
                        kind,
                        text: None,
                    });
                    last_object = Some(sheet.shapes.len() - 1);
                }
            }
            RECORD_TXO => {
                let length = read_u16(record.data, 10)
                    .or_else(|| read_u16(record.data, 6))
                    .unwrap_or(0) as usize;
                pending = Some(PendingText {
                    target: last_object.take(),
                    remaining: length,
                    text: String::new(),
                });
            }
            RECORD_CONTINUE => {
                // fragments after the text hold formatting runs
                if let Some(text) = pending.as_mut().filter(|t| t.remaining > 0) {
                    if let Some((&flags, chars)) = record.data.split_first() {
                        let wide = flags & 0x01 != 0;
                        let available = if wide { chars.len() / 2 } else { chars.len() };
                        let count = available.min(text.remaining);
                        text.text.push_str(&decode_chars(chars, count, wide));
                        text.remaining -= count;
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(text) = pending.take() {
        attach_text(&mut sheet.shapes, text);
    }
    Ok(sheet)
}

fn add_cell_format(sheet: &mut LegacySheet, globals: &Globals, row: u16, col: u16, ixfe: u16) {
    if let Some(format) = globals.format_for_xf(ixfe) {
        sheet
            .cell_formats
            .insert(CellCoord::new(row as u32, col as u32), format);
    }
}

fn attach_text(shapes: &mut [LegacyShape], pending: PendingText) {
    if let Some(shape) = pending.target.and_then(|index| shapes.get_mut(index)) {
        shape.text = Some(pending.text);
    }
}

/// Object type and id from the `ftCmo` sub-record, which comes first.
fn parse_object(data: &[u8]) -> Option<(LegacyObjectKind, u16)> {
    if read_u16(data, 0)? != SUBRECORD_CMO {
        return None;
    }
    let object_type = read_u16(data, 4)?;
    let object_id = read_u16(data, 6)?;
    Some((LegacyObjectKind::from_object_type(object_type), object_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextBearingShape;
    use std::io::{Cursor, Write};

    fn record(id: u16, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + 4);
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    fn bof() -> Vec<u8> {
        let mut data = vec![0u8; 16];
        data[0..2].copy_from_slice(&BIFF8_VERSION.to_le_bytes());
        record(RECORD_BOF, &data)
    }

    fn boundsheet(offset: u32, sheet_type: u8, name: &str) -> Vec<u8> {
        let mut data = offset.to_le_bytes().to_vec();
        data.extend_from_slice(&[0, sheet_type, name.len() as u8, 0]);
        data.extend_from_slice(name.as_bytes());
        record(RECORD_BOUNDSHEET, &data)
    }

    fn format(ifmt: u16, code: &str) -> Vec<u8> {
        let mut data = ifmt.to_le_bytes().to_vec();
        data.extend_from_slice(&(code.len() as u16).to_le_bytes());
        data.push(0);
        data.extend_from_slice(code.as_bytes());
        record(RECORD_FORMAT, &data)
    }

    fn xf(ifmt: u16) -> Vec<u8> {
        let mut data = vec![0u8; 20];
        data[2..4].copy_from_slice(&ifmt.to_le_bytes());
        record(RECORD_XF, &data)
    }

    fn number(row: u16, col: u16, ixfe: u16, value: f64) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&row.to_le_bytes());
        data.extend_from_slice(&col.to_le_bytes());
        data.extend_from_slice(&ixfe.to_le_bytes());
        data.extend_from_slice(&value.to_le_bytes());
        record(RECORD_NUMBER, &data)
    }

    fn obj(object_type: u16, object_id: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&SUBRECORD_CMO.to_le_bytes());
        data.extend_from_slice(&18u16.to_le_bytes());
        data.extend_from_slice(&object_type.to_le_bytes());
        data.extend_from_slice(&object_id.to_le_bytes());
        data.extend_from_slice(&[0u8; 14]);
        // ftEnd
        data.extend_from_slice(&[0u8; 4]);
        record(RECORD_OBJ, &data)
    }

    fn txo(text: &str, wide: bool) -> Vec<Vec<u8>> {
        let chars: Vec<u16> = text.encode_utf16().collect();
        let mut header = vec![0u8; 18];
        header[10..12].copy_from_slice(&(chars.len() as u16).to_le_bytes());
        header[12..14].copy_from_slice(&16u16.to_le_bytes());

        let mut fragment = vec![if wide { 1 } else { 0 }];
        if wide {
            for unit in &chars {
                fragment.extend_from_slice(&unit.to_le_bytes());
            }
        } else {
            fragment.extend(text.bytes());
        }
        // formatting runs
        let runs = vec![0u8; 16];
        vec![
            record(RECORD_TXO, &header),
            record(RECORD_CONTINUE, &fragment),
            record(RECORD_CONTINUE, &runs),
        ]
    }

    /// Globals with one custom format (164) on XF 1 and one worksheet.
    fn workbook_stream(sheet_records: Vec<Vec<u8>>, date_mode: u16) -> Vec<u8> {
        let globals_without_sheets: Vec<Vec<u8>> = vec![
            bof(),
            record(RECORD_DATEMODE, &date_mode.to_le_bytes()),
            format(164, "0.000"),
            xf(0),
            xf(164),
            xf(14),
        ];
        let chart_sheet = boundsheet(0, 0x02, "Chart1");
        let placeholder = boundsheet(0, SHEET_TYPE_WORKSHEET, "Data");
        let eof = record(RECORD_EOF, &[]);

        let globals_len: usize = globals_without_sheets.iter().map(Vec::len).sum::<usize>()
            + chart_sheet.len()
            + placeholder.len()
            + eof.len();

        let mut stream: Vec<u8> = globals_without_sheets.concat();
        stream.extend(chart_sheet);
        stream.extend(boundsheet(globals_len as u32, SHEET_TYPE_WORKSHEET, "Data"));
        stream.extend(eof);
        stream.extend(bof());
        for r in sheet_records {
            stream.extend(r);
        }
        stream.extend(record(RECORD_EOF, &[]));
        stream
    }

    #[test]
    fn test_text_box_text() {
        let mut records = vec![obj(0x06, 1)];
        records.extend(txo("Note:\nRemember", false));
        let workbook = parse_workbook_stream(&workbook_stream(records, 0)).unwrap();

        let sheet = &workbook.sheets["Data"];
        assert_eq!(sheet.shapes.len(), 1);
        assert_eq!(sheet.shapes[0].kind, LegacyObjectKind::TextBox);
        assert_eq!(sheet.shapes[0].object_id, 1);
        assert_eq!(sheet.shapes[0].text.as_deref(), Some("Note:\nRemember"));
        assert!(!workbook.sheets.contains_key("Chart1"));
    }

    #[test]
    fn test_wide_text_and_shape_order() {
        let mut records = vec![obj(0x02, 1)];
        records.extend(txo("矩形", true));
        records.push(obj(0x08, 2));
        records.push(obj(0x03, 3));
        let workbook = parse_workbook_stream(&workbook_stream(records, 0)).unwrap();

        let shapes = &workbook.sheets["Data"].shapes;
        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[0].text.as_deref(), Some("矩形"));
        assert_eq!(shapes[1].kind, LegacyObjectKind::Picture);
        assert_eq!(shapes[2].kind, LegacyObjectKind::Oval);
        assert_eq!(shapes[2].text, None);
    }

    #[test]
    fn test_notes_and_buttons_keep_their_text() {
        let mut records = vec![obj(0x19, 1)];
        records.extend(txo("author: note", false));
        records.push(obj(0x07, 2));
        records.extend(txo("Run", false));
        records.push(obj(0x06, 3));
        records.extend(txo("box", false));
        let workbook = parse_workbook_stream(&workbook_stream(records, 0)).unwrap();

        let shapes = &workbook.sheets["Data"].shapes;
        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[0].kind, LegacyObjectKind::Comment);
        assert_eq!(shapes[0].display_text(), Some("author: note"));
        assert_eq!(shapes[1].kind, LegacyObjectKind::Button);
        assert_eq!(shapes[1].display_text(), Some("Run"));
        assert_eq!(shapes[2].display_text(), Some("box"));
    }

    #[test]
    fn test_group_children_follow_the_group() {
        let mut records = vec![obj(0x00, 1), obj(0x06, 2)];
        records.extend(txo("inside", false));
        records.push(obj(0x02, 3));
        let workbook = parse_workbook_stream(&workbook_stream(records, 0)).unwrap();

        let shapes = &workbook.sheets["Data"].shapes;
        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[0].kind, LegacyObjectKind::Group);
        assert_eq!(shapes[0].display_text(), None);
        assert_eq!(shapes[1].display_text(), Some("inside"));
        assert_eq!(shapes[2].display_text(), None);
    }

    #[test]
    fn test_cell_formats_and_date_mode() {
        let records = vec![number(0, 0, 1, 1.5), number(1, 2, 2, 45000.0), number(2, 0, 0, 3.0)];
        let workbook = parse_workbook_stream(&workbook_stream(records, 1)).unwrap();

        assert!(workbook.is_1904);
        let formats = &workbook.sheets["Data"].cell_formats;
        assert_eq!(formats.get(&CellCoord::new(0, 0)).map(String::as_str), Some("0.000"));
        assert_eq!(formats.get(&CellCoord::new(1, 2)).map(String::as_str), Some("m/d/yy"));
        assert!(!formats.contains_key(&CellCoord::new(2, 0)));
    }

    #[test]
    fn test_mulrk_formats() {
        let mut data = Vec::new();
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        for ixfe in [1u16, 0, 2] {
            data.extend_from_slice(&ixfe.to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());
        }
        data.extend_from_slice(&3u16.to_le_bytes());
        let workbook =
            parse_workbook_stream(&workbook_stream(vec![record(RECORD_MULRK, &data)], 0)).unwrap();

        let formats = &workbook.sheets["Data"].cell_formats;
        assert_eq!(formats.len(), 2);
        assert!(formats.contains_key(&CellCoord::new(4, 1)));
        assert!(formats.contains_key(&CellCoord::new(4, 3)));
    }

    #[test]
    fn test_embedded_chart_substream_is_skipped() {
        let mut records = vec![obj(0x05, 1), bof(), obj(0x06, 9), record(RECORD_EOF, &[])];
        records.push(obj(0x06, 2));
        records.extend(txo("after chart", false));
        let workbook = parse_workbook_stream(&workbook_stream(records, 0)).unwrap();

        let shapes = &workbook.sheets["Data"].shapes;
        let ids: Vec<u16> = shapes.iter().map(|s| s.object_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(shapes[1].text.as_deref(), Some("after chart"));
    }

    #[test]
    fn test_truncated_stream_is_error() {
        let mut stream = workbook_stream(vec![obj(0x06, 1)], 0);
        stream.truncate(stream.len() - 3);
        assert!(matches!(parse_workbook_stream(&stream), Err(XlteError::Biff(_))));
    }

    #[test]
    fn test_encrypted_workbook_is_error() {
        let stream = [bof(), record(RECORD_FILEPASS, &[0u8; 6])].concat();
        assert!(matches!(parse_workbook_stream(&stream), Err(XlteError::Biff(_))));
    }

    #[test]
    fn test_biff5_has_no_objects() {
        let mut data = vec![0u8; 8];
        data[0..2].copy_from_slice(&0x0500u16.to_le_bytes());
        let stream = record(RECORD_BOF, &data);
        let workbook = parse_workbook_stream(&stream).unwrap();
        assert!(workbook.sheets.is_empty());
    }

    #[test]
    fn test_read_legacy_from_compound_file() {
        let mut records = vec![obj(0x06, 1)];
        records.extend(txo("in a compound file", false));
        let stream = workbook_stream(records, 0);

        let mut compound = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        {
            let mut writer = compound.create_stream("/Workbook").unwrap();
            writer.write_all(&stream).unwrap();
            writer.flush().unwrap();
        }
        compound.flush().unwrap();
        let mut cursor = compound.into_inner();
        cursor.set_position(0);

        let workbook = read_legacy(cursor).unwrap();
        assert_eq!(
            workbook.sheets["Data"].shapes[0].text.as_deref(),
            Some("in a compound file")
        );
    }

    #[test]
    fn test_read_legacy_rejects_non_compound_input() {
        assert!(read_legacy(Cursor::new(b"not a compound file".to_vec())).is_err());
    }
}
