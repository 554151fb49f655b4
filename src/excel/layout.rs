//! XLSX package reader for everything calamine does not expose:
//! per-cell style indices, column widths, row heights and merged ranges.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use zip::ZipArchive;

use super::styles::{attr, StyleTable};
use crate::error::{SplitterError, SplitterResult};

/// A rectangular cell range, 0-based and inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
}

impl CellRange {
    pub fn new(first_row: u32, first_col: u16, last_row: u32, last_col: u16) -> Self {
        Self {
            first_row,
            first_col,
            last_row,
            last_col,
        }
    }

    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}:{}{}",
            column_letter(self.first_col),
            self.first_row + 1,
            column_letter(self.last_col),
            self.last_row + 1
        )
    }
}

impl FromStr for CellRange {
    type Err = SplitterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s.split_once(':').unwrap_or((s, s));
        let (first_row, first_col) = parse_cell_ref(start)
            .ok_or_else(|| SplitterError::Workbook(format!("bad cell range: {}", s)))?;
        let (last_row, last_col) = parse_cell_ref(end)
            .ok_or_else(|| SplitterError::Workbook(format!("bad cell range: {}", s)))?;
        Ok(Self::new(
            first_row.min(last_row),
            first_col.min(last_col),
            first_row.max(last_row),
            first_col.max(last_col),
        ))
    }
}

/// Convert column index to Excel column letter (0→A, 25→Z, 26→AA)
pub fn column_letter(col: u16) -> String {
    let mut result = String::new();
    let mut num = col as u32;
    loop {
        result.insert(0, (b'A' + (num % 26) as u8) as char);
        if num < 26 {
            break;
        }
        num = num / 26 - 1;
    }
    result
}

/// Parse an A1 reference (absolute markers allowed) into 0-based (row, col).
pub fn parse_cell_ref(reference: &str) -> Option<(u32, u16)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        if col > 16_384 {
            return None;
        }
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 || row > 1_048_576 {
        return None;
    }
    Some((row - 1, (col - 1) as u16))
}

/// Layout of one worksheet as stored in the package.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetLayout {
    /// `cellXfs` index of every cell with a non-default style, keyed by (row, col).
    pub cell_styles: BTreeMap<(u32, u16), u32>,
    /// Raw `<col width>` values.
    pub column_widths: BTreeMap<u16, f64>,
    /// Raw `<row ht>` values, in points.
    pub row_heights: BTreeMap<u32, f64>,
    pub merges: Vec<CellRange>,
}

/// Read-side view of an `.xlsx` package.
pub struct XlsxPackage<R: Read + Seek> {
    archive: ZipArchive<R>,
    sheet_parts: HashMap<String, String>,
    styles: StyleTable,
}

impl XlsxPackage<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> SplitterResult<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> XlsxPackage<R> {
    pub fn from_reader(reader: R) -> SplitterResult<Self> {
        let mut archive = ZipArchive::new(reader)?;

        let sheets = read_workbook_sheets(&mut archive)?;
        let rels = read_workbook_rels(&mut archive)?;
        let sheet_parts = sheets
            .into_iter()
            .filter_map(|(name, r_id)| rels.get(&r_id).map(|part| (name, part.clone())))
            .collect();

        let styles = match archive.by_name("xl/styles.xml") {
            Ok(file) => StyleTable::read(file)?,
            Err(_) => StyleTable::default(),
        };

        Ok(Self {
            archive,
            sheet_parts,
            styles,
        })
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    /// Read the layout of the sheet called `name`.
    pub fn sheet_layout(&mut self, name: &str) -> SplitterResult<SheetLayout> {
        let part = self
            .sheet_parts
            .get(name)
            .ok_or_else(|| SplitterError::SheetNotFound(name.to_string()))?
            .clone();
        let file = self
            .archive
            .by_name(&part)
            .map_err(|_| SplitterError::Workbook(format!("missing part {}", part)))?;
        read_sheet_layout(file)
    }
}

/// Sheet names and relationship ids from `xl/workbook.xml`, in workbook order.
fn read_workbook_sheets<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> SplitterResult<Vec<(String, String)>> {
    let file = archive
        .by_name("xl/workbook.xml")
        .map_err(|_| SplitterError::Workbook("missing xl/workbook.xml".into()))?;

    let mut xml_reader = Reader::from_reader(BufReader::new(file));
    xml_reader.trim_text(true);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                // r:id is namespaced; match on the local part.
                if let (Some(name), Some(r_id)) = (attr(&e, b"name"), attr(&e, b"id")) {
                    sheets.push((name, r_id));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Worksheet relationship targets from `xl/_rels/workbook.xml.rels`, keyed by id.
fn read_workbook_rels<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> SplitterResult<HashMap<String, String>> {
    let file = archive
        .by_name("xl/_rels/workbook.xml.rels")
        .map_err(|_| SplitterError::Workbook("missing xl/_rels/workbook.xml.rels".into()))?;

    let mut xml_reader = Reader::from_reader(BufReader::new(file));
    xml_reader.trim_text(true);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attr(&e, b"Id");
                let target = attr(&e, b"Target");
                let is_sheet = attr(&e, b"Type").is_some_and(|t| t.ends_with("/worksheet"));
                if let (Some(id), Some(target), true) = (id, target, is_sheet) {
                    rels.insert(id, resolve_target(&target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

#[derive(Default)]
struct LayoutParser {
    layout: SheetLayout,
    in_sheet_data: bool,
    row: u32,
    next_col: u16,
}

impl LayoutParser {
    fn open(&mut self, e: &BytesStart) {
        match e.local_name().as_ref() {
            b"sheetData" => {
                self.in_sheet_data = true;
                self.row = 0;
            }
            b"col" => self.open_col(e),
            b"row" if self.in_sheet_data => self.open_row(e),
            b"c" if self.in_sheet_data => self.open_cell(e),
            b"mergeCell" => {
                if let Some(range) = attr(e, b"ref").and_then(|r| r.parse().ok()) {
                    self.layout.merges.push(range);
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"sheetData" => self.in_sheet_data = false,
            b"row" if self.in_sheet_data => self.row += 1,
            _ => {}
        }
    }

    fn open_col(&mut self, e: &BytesStart) {
        let min: Option<u16> = attr(e, b"min").and_then(|v| v.parse().ok());
        let max: Option<u16> = attr(e, b"max").and_then(|v| v.parse().ok());
        let width: Option<f64> = attr(e, b"width").and_then(|v| v.parse().ok());
        if let (Some(min), Some(max), Some(width)) = (min, max, width) {
            if min == 0 || width <= 0.0 {
                return;
            }
            for col in min..=max.min(16_384) {
                self.layout.column_widths.insert(col - 1, width);
            }
        }
    }

    fn open_row(&mut self, e: &BytesStart) {
        // `r` is optional; a row without it follows the previous one.
        if let Some(r) = attr(e, b"r").and_then(|v| v.parse::<u32>().ok()) {
            self.row = r.saturating_sub(1);
        }
        self.next_col = 0;
        if let Some(height) = attr(e, b"ht").and_then(|v| v.parse::<f64>().ok()) {
            if height > 0.0 {
                self.layout.row_heights.insert(self.row, height);
            }
        }
    }

    fn open_cell(&mut self, e: &BytesStart) {
        let (row, col) = attr(e, b"r")
            .and_then(|r| parse_cell_ref(&r))
            .unwrap_or((self.row, self.next_col));
        self.next_col = col.saturating_add(1);

        if let Some(style) = attr(e, b"s").and_then(|v| v.parse::<u32>().ok()) {
            if style != 0 {
                self.layout.cell_styles.insert((row, col), style);
            }
        }
    }
}

/// Parse a worksheet part.
pub fn read_sheet_layout<R: Read>(reader: R) -> SplitterResult<SheetLayout> {
    let mut xml_reader = Reader::from_reader(BufReader::new(reader));
    xml_reader.trim_text(true);

    let mut parser = LayoutParser::default();
    let mut buf = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Start(e) => parser.open(&e),
            Event::Empty(e) => {
                parser.open(&e);
                parser.close(e.local_name().as_ref());
            }
            Event::End(e) => parser.close(e.local_name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(parser.layout)
}

/// Convert a stored `<col width>` into the character width the writer expects.
///
/// The writer pads widths by 5 px of a 7 px digit on output; undoing that
/// keeps the width stable across a copy.
pub fn stored_width_to_character_width(stored: f64) -> f64 {
    const DIGIT_PX: f64 = 7.0;
    const PADDING_PX: f64 = 5.0;
    if stored >= (DIGIT_PX + PADDING_PX) / DIGIT_PX {
        stored - PADDING_PX / DIGIT_PX
    } else {
        stored * DIGIT_PX / (DIGIT_PX + PADDING_PX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <dimension ref="A1:C3"/>
  <cols>
    <col min="1" max="1" width="20.7109375" customWidth="1"/>
    <col min="3" max="4" width="9.140625" style="2"/>
  </cols>
  <sheetData>
    <row r="1" spans="1:3" ht="30" customHeight="1">
      <c r="A1" s="1" t="s"><v>0</v></c>
      <c r="B1" s="0"><v>1</v></c>
      <c r="C1" s="3"/>
    </row>
    <row r="3">
      <c r="B3" t="str"><f>SUM(1,2)</f><v>3</v></c>
      <c s="4"/>
    </row>
    <row>
      <c s="5"/>
    </row>
  </sheetData>
  <mergeCells count="2">
    <mergeCell ref="A1:B2"/>
    <mergeCell ref="D5:E5"/>
  </mergeCells>
</worksheet>"#;

    #[test]
    fn test_read_sheet_layout() {
        let layout = read_sheet_layout(SHEET.as_bytes()).unwrap();

        let styles: Vec<((u32, u16), u32)> = layout.cell_styles.into_iter().collect();
        assert_eq!(
            styles,
            vec![((0, 0), 1), ((0, 2), 3), ((2, 2), 4), ((3, 0), 5)]
        );

        assert_eq!(layout.column_widths.get(&0), Some(&20.7109375));
        assert_eq!(layout.column_widths.get(&1), None);
        assert_eq!(layout.column_widths.get(&2), Some(&9.140625));
        assert_eq!(layout.column_widths.get(&3), Some(&9.140625));

        assert_eq!(layout.row_heights.len(), 1);
        assert_eq!(layout.row_heights.get(&0), Some(&30.0));

        assert_eq!(
            layout.merges,
            vec![CellRange::new(0, 0, 1, 1), CellRange::new(4, 3, 4, 4)]
        );
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("$B$3"), Some((2, 1)));
        assert_eq!(parse_cell_ref("AA10"), Some((9, 26)));
        assert_eq!(parse_cell_ref("XFD1048576"), Some((1_048_575, 16_383)));
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("1A"), None);
        assert_eq!(parse_cell_ref("XFE1"), None);
    }

    #[test]
    fn test_cell_range_round_trip_display() {
        let range: CellRange = "C4:A1".parse().unwrap();
        assert_eq!(range, CellRange::new(0, 0, 3, 2));
        assert_eq!(range.to_string(), "A1:C4");

        let single: CellRange = "B2".parse().unwrap();
        assert!(single.is_single_cell());
        assert!("nonsense".parse::<CellRange>().is_err());
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_stored_width_conversion() {
        // 20 characters are stored as 20 + 5/7.
        let stored = 20.0 + 5.0 / 7.0;
        assert!((stored_width_to_character_width(stored) - 20.0).abs() < 1e-9);
        // Narrow columns scale by 12 px per character.
        let narrow = 0.5 * 12.0 / 7.0;
        assert!((stored_width_to_character_width(narrow) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
    }
}
