//! Cell style model and `xl/styles.xml` reader
//!
//! Only the six facets that survive a sheet split are modelled: font, border,
//! fill, number format, alignment and protection. Enumerated values (border
//! line styles, pattern types, alignment keywords) are kept as the raw OOXML
//! strings; they are validated when a facet is applied to a destination
//! format, so a value the writer does not know only costs that facet.

use std::collections::HashMap;
use std::io::{BufReader, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::SplitterResult;

/// A color reference as stored in the package.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpec {
    Auto,
    /// `0xRRGGBB`, alpha dropped.
    Rgb(u32),
    Indexed(u32),
    Theme { index: u32, tint: f64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontSpec {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    /// `single`, `double`, `singleAccounting`, `doubleAccounting` or `none`.
    pub underline: Option<String>,
    /// `superscript`, `subscript` or `baseline`.
    pub vert_align: Option<String>,
    pub color: Option<ColorSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BorderEdgeSpec {
    pub style: String,
    pub color: Option<ColorSpec>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BorderSpec {
    pub left: Option<BorderEdgeSpec>,
    pub right: Option<BorderEdgeSpec>,
    pub top: Option<BorderEdgeSpec>,
    pub bottom: Option<BorderEdgeSpec>,
    pub diagonal: Option<BorderEdgeSpec>,
    pub diagonal_up: bool,
    pub diagonal_down: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillSpec {
    Pattern {
        pattern: String,
        fg: Option<ColorSpec>,
        bg: Option<ColorSpec>,
    },
    Gradient,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumberFormatSpec {
    BuiltIn(u32),
    Custom(String),
}

impl Default for NumberFormatSpec {
    fn default() -> Self {
        NumberFormatSpec::BuiltIn(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentSpec {
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    /// Raw OOXML rotation: 0-90 counter-clockwise, 91-180 clockwise, 255 stacked.
    pub text_rotation: Option<u32>,
    pub wrap_text: bool,
    pub shrink_to_fit: bool,
    pub indent: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionSpec {
    pub locked: bool,
    pub hidden: bool,
}

impl Default for ProtectionSpec {
    fn default() -> Self {
        Self {
            locked: true,
            hidden: false,
        }
    }
}

/// One resolved `cellXfs` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStyle {
    pub font: Option<FontSpec>,
    pub border: Option<BorderSpec>,
    pub fill: Option<FillSpec>,
    pub number_format: NumberFormatSpec,
    pub alignment: Option<AlignmentSpec>,
    pub protection: Option<ProtectionSpec>,
}

/// Resolved cell formats of a workbook, indexed by the `s` attribute of a cell.
#[derive(Debug, Clone, Default)]
pub struct StyleTable {
    xfs: Vec<CellStyle>,
}

impl StyleTable {
    pub fn new(xfs: Vec<CellStyle>) -> Self {
        Self { xfs }
    }

    pub fn get(&self, index: u32) -> Option<&CellStyle> {
        self.xfs.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.xfs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xfs.is_empty()
    }

    /// Parse a `styles.xml` stream.
    pub fn read<R: Read>(reader: R) -> SplitterResult<Self> {
        let mut xml_reader = Reader::from_reader(BufReader::new(reader));
        xml_reader.trim_text(true);

        let mut parser = StylesParser::default();
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

        Ok(parser.finish())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Section {
    #[default]
    None,
    NumFmts,
    Fonts,
    Fills,
    Borders,
    CellXfs,
    Ignored,
}

#[derive(Debug, Default)]
struct RawXf {
    num_fmt_id: u32,
    font_id: Option<usize>,
    fill_id: Option<usize>,
    border_id: Option<usize>,
    alignment: Option<AlignmentSpec>,
    protection: Option<ProtectionSpec>,
}

#[derive(Default)]
struct StylesParser {
    section: Section,
    num_fmts: HashMap<u32, String>,
    fonts: Vec<FontSpec>,
    fills: Vec<FillSpec>,
    borders: Vec<BorderSpec>,
    xfs: Vec<RawXf>,

    font: Option<FontSpec>,
    fill: Option<FillSpec>,
    border: Option<BorderSpec>,
    edge: Option<&'static str>,
    xf: Option<RawXf>,
}

impl StylesParser {
    fn open(&mut self, e: &BytesStart) {
        let name = e.local_name();
        let name = name.as_ref();
        match name {
            b"numFmts" => self.section = Section::NumFmts,
            b"fonts" => self.section = Section::Fonts,
            b"fills" => self.section = Section::Fills,
            b"borders" => self.section = Section::Borders,
            b"cellXfs" => self.section = Section::CellXfs,
            b"cellStyleXfs" | b"cellStyles" | b"dxfs" | b"tableStyles" | b"colors" | b"extLst" => {
                self.section = Section::Ignored
            }
            _ => match self.section {
                Section::NumFmts => self.open_num_fmt(name, e),
                Section::Fonts => self.open_font(name, e),
                Section::Fills => self.open_fill(name, e),
                Section::Borders => self.open_border(name, e),
                Section::CellXfs => self.open_xf(name, e),
                Section::None | Section::Ignored => {}
            },
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"numFmts" | b"fonts" | b"fills" | b"borders" | b"cellXfs" | b"cellStyleXfs"
            | b"cellStyles" | b"dxfs" | b"tableStyles" | b"colors" | b"extLst" => {
                self.section = Section::None
            }
            b"font" if self.section == Section::Fonts => {
                self.fonts.push(self.font.take().unwrap_or_default());
            }
            b"fill" if self.section == Section::Fills => {
                self.fills.push(self.fill.take().unwrap_or(FillSpec::Pattern {
                    pattern: "none".to_string(),
                    fg: None,
                    bg: None,
                }));
            }
            b"border" if self.section == Section::Borders => {
                self.borders.push(self.border.take().unwrap_or_default());
            }
            b"left" | b"start" | b"right" | b"end" | b"top" | b"bottom" | b"diagonal"
                if self.section == Section::Borders =>
            {
                self.edge = None;
            }
            b"xf" if self.section == Section::CellXfs => {
                if let Some(xf) = self.xf.take() {
                    self.xfs.push(xf);
                }
            }
            _ => {}
        }
    }

    fn open_num_fmt(&mut self, name: &[u8], e: &BytesStart) {
        if name != b"numFmt" {
            return;
        }
        let id = attr(e, b"numFmtId").and_then(|v| v.parse().ok());
        let code = attr(e, b"formatCode");
        if let (Some(id), Some(code)) = (id, code) {
            self.num_fmts.insert(id, code);
        }
    }

    fn open_font(&mut self, name: &[u8], e: &BytesStart) {
        if name == b"font" {
            self.font = Some(FontSpec::default());
            return;
        }
        let Some(font) = self.font.as_mut() else {
            return;
        };
        match name {
            b"b" => font.bold = flag(e),
            b"i" => font.italic = flag(e),
            b"strike" => font.strike = flag(e),
            b"u" => font.underline = Some(attr(e, b"val").unwrap_or_else(|| "single".into())),
            b"vertAlign" => font.vert_align = attr(e, b"val"),
            b"sz" => font.size = attr(e, b"val").and_then(|v| v.parse().ok()),
            b"name" | b"rFont" => font.name = attr(e, b"val"),
            b"color" => font.color = parse_color(e),
            _ => {}
        }
    }

    fn open_fill(&mut self, name: &[u8], e: &BytesStart) {
        match name {
            b"patternFill" => {
                self.fill = Some(FillSpec::Pattern {
                    pattern: attr(e, b"patternType").unwrap_or_else(|| "none".into()),
                    fg: None,
                    bg: None,
                });
            }
            b"gradientFill" => self.fill = Some(FillSpec::Gradient),
            b"fgColor" => {
                if let Some(FillSpec::Pattern { fg, .. }) = self.fill.as_mut() {
                    *fg = parse_color(e);
                }
            }
            b"bgColor" => {
                if let Some(FillSpec::Pattern { bg, .. }) = self.fill.as_mut() {
                    *bg = parse_color(e);
                }
            }
            _ => {}
        }
    }

    fn open_border(&mut self, name: &[u8], e: &BytesStart) {
        if name == b"border" {
            self.border = Some(BorderSpec {
                diagonal_up: attr(e, b"diagonalUp").is_some_and(|v| is_true(&v)),
                diagonal_down: attr(e, b"diagonalDown").is_some_and(|v| is_true(&v)),
                ..BorderSpec::default()
            });
            return;
        }
        let Some(border) = self.border.as_mut() else {
            return;
        };
        let edge_name = match name {
            b"left" | b"start" => "left",
            b"right" | b"end" => "right",
            b"top" => "top",
            b"bottom" => "bottom",
            b"diagonal" => "diagonal",
            b"color" => {
                if let Some(edge) = self.edge {
                    if let Some(spec) = edge_mut(border, edge).as_mut() {
                        spec.color = parse_color(e);
                    }
                }
                return;
            }
            _ => return,
        };
        self.edge = Some(edge_name);
        *edge_mut(border, edge_name) = attr(e, b"style")
            .filter(|style| style != "none")
            .map(|style| BorderEdgeSpec { style, color: None });
    }

    fn open_xf(&mut self, name: &[u8], e: &BytesStart) {
        match name {
            b"xf" => {
                let id = |key: &[u8]| attr(e, key).and_then(|v| v.parse::<usize>().ok());
                self.xf = Some(RawXf {
                    num_fmt_id: attr(e, b"numFmtId")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0),
                    font_id: id(b"fontId"),
                    fill_id: id(b"fillId"),
                    border_id: id(b"borderId"),
                    alignment: None,
                    protection: None,
                });
            }
            b"alignment" => {
                if let Some(xf) = self.xf.as_mut() {
                    xf.alignment = Some(AlignmentSpec {
                        horizontal: attr(e, b"horizontal"),
                        vertical: attr(e, b"vertical"),
                        text_rotation: attr(e, b"textRotation").and_then(|v| v.parse().ok()),
                        wrap_text: attr(e, b"wrapText").is_some_and(|v| is_true(&v)),
                        shrink_to_fit: attr(e, b"shrinkToFit").is_some_and(|v| is_true(&v)),
                        indent: attr(e, b"indent").and_then(|v| v.parse().ok()),
                    });
                }
            }
            b"protection" => {
                if let Some(xf) = self.xf.as_mut() {
                    xf.protection = Some(ProtectionSpec {
                        locked: attr(e, b"locked").map_or(true, |v| is_true(&v)),
                        hidden: attr(e, b"hidden").is_some_and(|v| is_true(&v)),
                    });
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> StyleTable {
        let xfs = self
            .xfs
            .into_iter()
            .map(|xf| CellStyle {
                font: xf.font_id.and_then(|i| self.fonts.get(i).cloned()),
                border: xf.border_id.and_then(|i| self.borders.get(i).cloned()),
                fill: xf.fill_id.and_then(|i| self.fills.get(i).cloned()),
                number_format: match self.num_fmts.get(&xf.num_fmt_id) {
                    Some(code) => NumberFormatSpec::Custom(code.clone()),
                    None => NumberFormatSpec::BuiltIn(xf.num_fmt_id),
                },
                alignment: xf.alignment,
                protection: xf.protection,
            })
            .collect();
        StyleTable::new(xfs)
    }
}

fn edge_mut<'a>(border: &'a mut BorderSpec, edge: &str) -> &'a mut Option<BorderEdgeSpec> {
    match edge {
        "left" => &mut border.left,
        "right" => &mut border.right,
        "top" => &mut border.top,
        "bottom" => &mut border.bottom,
        _ => &mut border.diagonal,
    }
}

/// Unescaped value of attribute `key`, if present.
pub(crate) fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

pub(crate) fn is_true(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Boolean font toggles: `<b/>` is on, `<b val="0"/>` is off.
fn flag(e: &BytesStart) -> bool {
    attr(e, b"val").map_or(true, |v| is_true(&v))
}

fn parse_color(e: &BytesStart) -> Option<ColorSpec> {
    if let Some(rgb) = attr(e, b"rgb") {
        if !rgb.is_ascii() {
            return None;
        }
        let hex = if rgb.len() == 8 { rgb.get(2..)? } else { rgb.as_str() };
        return u32::from_str_radix(hex, 16).ok().map(ColorSpec::Rgb);
    }
    if let Some(theme) = attr(e, b"theme").and_then(|v| v.parse().ok()) {
        let tint = attr(e, b"tint")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);
        return Some(ColorSpec::Theme { index: theme, tint });
    }
    if let Some(indexed) = attr(e, b"indexed").and_then(|v| v.parse().ok()) {
        return Some(ColorSpec::Indexed(indexed));
    }
    if attr(e, b"auto").is_some_and(|v| is_true(&v)) {
        return Some(ColorSpec::Auto);
    }
    None
}
