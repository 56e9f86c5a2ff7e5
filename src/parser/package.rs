//! OOXML Package Reader
//!
//! Reads what calamine does not expose from an `.xlsx`/`.xlsm` package:
//! number formats of cells (`xl/styles.xml` and the `s` attribute of every
//! worksheet cell), the 1904 date flag and the DrawingML shapes of each sheet.
//!
//! Security limits are enforced on the whole archive before any part is
//! read. After that, a part that is missing or malformed only degrades the
//! result (no formats, no drawing) and is logged.

use std::collections::HashMap;
use std::io::{Read, Seek};

use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::XlteError;
use crate::format::builtin_format;
use crate::model::ModernShape;
use crate::security::SecurityConfig;
use crate::types::CellCoord;

use super::drawing::parse_drawing;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const STYLES_PART: &str = "xl/styles.xml";

/// First id of user-defined number formats.
const FIRST_CUSTOM_FORMAT_ID: u32 = 164;

/// Per-sheet data read from the package.
#[derive(Debug, Default)]
pub(crate) struct SheetPart {
    /// Cell coordinate -> index into `cellXfs`
    pub style_ids: HashMap<CellCoord, u32>,
    /// Shapes of the sheet's drawing part, if it has one.
    pub drawing: Option<Vec<ModernShape>>,
}

#[derive(Debug, Default)]
struct WorkbookPart {
    is_1904: bool,
    /// Sheet name and worksheet part path, in workbook order.
    sheets: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct Styles {
    /// numFmtId -> formatCode
    num_formats: HashMap<u32, String>,
    /// numFmtId of every cellXfs entry
    cell_xfs: Vec<u32>,
}

/// Metadata of an OOXML spreadsheet package.
#[derive(Debug, Default)]
pub(crate) struct PackageMetadata {
    is_1904: bool,
    styles: Styles,
    sheets: HashMap<String, SheetPart>,
}

impl PackageMetadata {
    /// Opens the package, enforces `security` and reads all metadata.
    pub fn open<R: Read + Seek>(reader: R, security: &SecurityConfig) -> Result<Self, XlteError> {
        let mut archive = ZipArchive::new(reader)?;
        security.check_archive(&mut archive)?;

        let styles = degrade("styles", Self::load_styles(&mut archive));
        let workbook = degrade("workbook", Self::load_workbook(&mut archive));

        let mut sheets = HashMap::new();
        for (name, part_path) in workbook.sheets {
            let part = degrade(
                &format!("worksheet '{}'", name),
                Self::load_sheet(&mut archive, &part_path),
            );
            sheets.insert(name, part);
        }

        Ok(Self {
            is_1904: workbook.is_1904,
            styles,
            sheets,
        })
    }

    pub fn is_1904(&self) -> bool {
        self.is_1904
    }

    /// Removes and returns the data of one sheet.
    pub fn take_sheet(&mut self, name: &str) -> Option<SheetPart> {
        self.sheets.remove(name)
    }

    /// Format string of a `cellXfs` entry, `None` for General or unknown ids.
    pub fn format_string(&self, style_id: u32) -> Option<&str> {
        let num_fmt_id = *self.styles.cell_xfs.get(style_id as usize)?;
        let format = match self.styles.num_formats.get(&num_fmt_id) {
            Some(custom) => custom.as_str(),
            None => builtin_format(num_fmt_id)?,
        };
        if format.eq_ignore_ascii_case("General") {
            None
        } else {
            Some(format)
        }
    }

    /// Parses `xl/styles.xml`: `<numFmts>` and `<cellXfs>`.
    fn load_styles<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Styles, XlteError> {
        let Some(xml) = read_part(archive, STYLES_PART)? else {
            return Ok(Styles::default());
        };

        let mut reader = Reader::from_reader(xml.as_slice());
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut styles = Styles::default();
        let mut in_cell_xfs = false;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"numFmt" => {
                        // <numFmt numFmtId="165" formatCode="0.000"/>
                        let mut id = None;
                        let mut code = None;
                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.local_name().as_ref() {
                                b"numFmtId" => id = Some(std::str::from_utf8(&attr.value)?.parse::<u32>()?),
                                b"formatCode" => {
                                    code = Some(attr.decode_and_unescape_value(&reader)?.into_owned())
                                }
                                _ => {}
                            }
                        }
                        if let (Some(id), Some(code)) = (id, code) {
                            styles.num_formats.insert(id, code);
                        }
                    }
                    b"cellXfs" => in_cell_xfs = true,
                    b"xf" if in_cell_xfs => {
                        // <xf numFmtId="14" fontId="0" fillId="0" borderId="0" applyNumberFormat="1"/>
                        let mut num_fmt_id = 0u32;
                        for attr in e.attributes() {
                            let attr = attr?;
                            if attr.key.local_name().as_ref() == b"numFmtId" {
                                num_fmt_id = std::str::from_utf8(&attr.value)?.parse::<u32>()?;
                            }
                        }
                        styles.cell_xfs.push(num_fmt_id);
                    }
                    _ => {}
                },
                Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        debug!(
            "Read {} custom number formats and {} cell styles",
            styles
                .num_formats
                .keys()
                .filter(|id| **id >= FIRST_CUSTOM_FORMAT_ID)
                .count(),
            styles.cell_xfs.len()
        );
        Ok(styles)
    }

    /// Parses `xl/workbook.xml` and its relationships into sheet parts.
    fn load_workbook<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<WorkbookPart, XlteError> {
        let Some(xml) = read_part(archive, WORKBOOK_PART)? else {
            return Ok(WorkbookPart::default());
        };

        let mut reader = Reader::from_reader(xml.as_slice());
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut is_1904 = false;
        let mut sheet_ids = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"workbookPr" => {
                        for attr in e.attributes() {
                            let attr = attr?;
                            if attr.key.local_name().as_ref() == b"date1904" {
                                let value = std::str::from_utf8(&attr.value)?;
                                is_1904 = value == "1" || value == "true";
                            }
                        }
                    }
                    b"sheet" => {
                        // <sheet name="Sheet1" sheetId="1" r:id="rId1"/>
                        let mut name = None;
                        let mut rel_id = None;
                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.local_name().as_ref() {
                                b"name" => {
                                    name = Some(attr.decode_and_unescape_value(&reader)?.into_owned())
                                }
                                b"id" => {
                                    rel_id = Some(attr.decode_and_unescape_value(&reader)?.into_owned())
                                }
                                _ => {}
                            }
                        }
                        if let (Some(name), Some(rel_id)) = (name, rel_id) {
                            sheet_ids.push((name, rel_id));
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        let relationships = match read_part(archive, &rels_path(WORKBOOK_PART))? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        let sheets = sheet_ids
            .into_iter()
            .filter_map(|(name, rel_id)| {
                let target = relationships.get(&rel_id)?;
                Some((name, resolve_target(parent_dir(WORKBOOK_PART), target)))
            })
            .collect();

        Ok(WorkbookPart { is_1904, sheets })
    }

    /// Reads cell styles and the drawing of one worksheet part.
    fn load_sheet<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        part_path: &str,
    ) -> Result<SheetPart, XlteError> {
        let Some(xml) = read_part(archive, part_path)? else {
            return Ok(SheetPart::default());
        };
        let (style_ids, drawing_rel) = parse_worksheet(&xml)?;

        let drawing = match drawing_rel {
            Some(rel_id) => Self::load_drawing(archive, part_path, &rel_id)?,
            None => None,
        };

        Ok(SheetPart { style_ids, drawing })
    }

    fn load_drawing<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        sheet_part: &str,
        rel_id: &str,
    ) -> Result<Option<Vec<ModernShape>>, XlteError> {
        let Some(rels) = read_part(archive, &rels_path(sheet_part))? else {
            return Ok(None);
        };
        let relationships = parse_relationships(&rels)?;
        let Some(target) = relationships.get(rel_id) else {
            debug!("Drawing relationship {} not found for {}", rel_id, sheet_part);
            return Ok(None);
        };

        let drawing_path = resolve_target(parent_dir(sheet_part), target);
        let Some(xml) = read_part(archive, &drawing_path)? else {
            return Ok(None);
        };
        Ok(Some(parse_drawing(&xml)?))
    }
}

/// Logs a part-level failure and substitutes the empty value.
fn degrade<T: Default>(what: &str, result: Result<T, XlteError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("Could not read {}: {}", what, e);
            T::default()
        }
    }
}

/// Reads a package part into memory. A missing part is `Ok(None)`.
fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, XlteError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut content)?;
    Ok(Some(content))
}

/// Parses a worksheet part: style index of every styled cell and the
/// relationship id of its `<drawing>`.
fn parse_worksheet(xml: &[u8]) -> Result<(HashMap<CellCoord, u32>, Option<String>), XlteError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut style_ids = HashMap::new();
    let mut drawing = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"c" => {
                    // <c r="B2" s="3" t="n">
                    let mut coord = None;
                    let mut style = None;
                    for attr in e.attributes() {
                        let attr = attr?;
                        match attr.key.local_name().as_ref() {
                            b"r" => {
                                coord = CellCoord::from_a1_notation(std::str::from_utf8(&attr.value)?)
                            }
                            b"s" => style = Some(std::str::from_utf8(&attr.value)?.parse::<u32>()?),
                            _ => {}
                        }
                    }
                    if let (Some(coord), Some(style)) = (coord, style) {
                        if style != 0 {
                            style_ids.insert(coord, style);
                        }
                    }
                }
                b"drawing" => {
                    for attr in e.attributes() {
                        let attr = attr?;
                        if attr.key.local_name().as_ref() == b"id" {
                            drawing = Some(attr.decode_and_unescape_value(&reader)?.into_owned());
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((style_ids, drawing))
}

/// Parses a `.rels` part into relationship id -> target.
fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, XlteError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut relationships = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                let mut external = false;
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.local_name().as_ref() {
                        b"Id" => {
                            id = Some(attr.decode_and_unescape_value(&reader)?.into_owned())
                        }
                        b"Target" => {
                            target = Some(attr.decode_and_unescape_value(&reader)?.into_owned())
                        }
                        b"TargetMode" => external = attr.value.as_ref() == b"External",
                        _ => {}
                    }
                }
                if let (Some(id), Some(target), false) = (id, target, external) {
                    relationships.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

fn parent_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolves a relationship target against the directory of its source part.
///
/// Absolute targets (`/xl/...`) are taken from the package root. `..`
/// segments never climb above the root.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
