//! Style facet application: source [`CellStyle`] → destination [`Format`]
//!
//! Each facet is applied on its own. A facet that cannot be expressed by the
//! writer returns a [`FacetError`] and the caller keeps the format as it was
//! before that facet, so one odd border never costs the font or the fill.

use std::fmt;

use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatDiagonalBorder, FormatPattern, FormatScript,
    FormatUnderline,
};
use thiserror::Error;

use super::styles::{
    AlignmentSpec, BorderEdgeSpec, BorderSpec, CellStyle, ColorSpec, FillSpec, FontSpec,
    NumberFormatSpec, ProtectionSpec,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FacetError {
    #[error("unsupported color: {0}")]
    Color(String),

    #[error("unsupported underline: {0}")]
    Underline(String),

    #[error("unsupported vertical alignment of text: {0}")]
    Script(String),

    #[error("unsupported border style: {0}")]
    Border(String),

    #[error("unsupported fill pattern: {0}")]
    Pattern(String),

    #[error("gradient fills are not supported")]
    Gradient,

    #[error("unknown built-in number format: {0}")]
    NumberFormat(u32),

    #[error("unsupported alignment: {0}")]
    Alignment(String),

    #[error("unsupported text rotation: {0}")]
    Rotation(u32),

    #[error("unsupported indent: {0}")]
    Indent(u32),
}

/// The independently copied parts of a cell style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Font,
    Border,
    Fill,
    NumberFormat,
    Alignment,
    Protection,
}

impl Facet {
    pub const ALL: [Facet; 6] = [
        Facet::Font,
        Facet::Border,
        Facet::Fill,
        Facet::NumberFormat,
        Facet::Alignment,
        Facet::Protection,
    ];

    /// Apply this facet of `style` on top of `format`.
    ///
    /// A missing facet leaves the format unchanged.
    pub fn apply(self, format: Format, style: &CellStyle) -> Result<Format, FacetError> {
        match self {
            Facet::Font => match &style.font {
                Some(font) => apply_font(format, font),
                None => Ok(format),
            },
            Facet::Border => match &style.border {
                Some(border) => apply_border(format, border),
                None => Ok(format),
            },
            Facet::Fill => match &style.fill {
                Some(fill) => apply_fill(format, fill),
                None => Ok(format),
            },
            Facet::NumberFormat => apply_number_format(format, &style.number_format),
            Facet::Alignment => match &style.alignment {
                Some(alignment) => apply_alignment(format, alignment),
                None => Ok(format),
            },
            Facet::Protection => match &style.protection {
                Some(protection) => Ok(apply_protection(format, protection)),
                None => Ok(format),
            },
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Facet::Font => "font",
            Facet::Border => "border",
            Facet::Fill => "fill",
            Facet::NumberFormat => "number format",
            Facet::Alignment => "alignment",
            Facet::Protection => "protection",
        };
        f.write_str(name)
    }
}

/// Outcome of building a destination format from a source style.
#[derive(Debug, Clone)]
pub struct BuiltFormat {
    pub format: Format,
    pub skipped: Vec<(Facet, FacetError)>,
}

/// Build a format from every facet of `style`, skipping facets that fail.
pub fn build_format(style: &CellStyle) -> BuiltFormat {
    let mut format = Format::new();
    let mut skipped = Vec::new();

    for facet in Facet::ALL {
        match facet.apply(format.clone(), style) {
            Ok(next) => format = next,
            Err(e) => skipped.push((facet, e)),
        }
    }

    BuiltFormat { format, skipped }
}

fn apply_font(mut format: Format, font: &FontSpec) -> Result<Format, FacetError> {
    if let Some(name) = &font.name {
        format = format.set_font_name(name);
    }
    if let Some(size) = font.size {
        format = format.set_font_size(size);
    }
    if font.bold {
        format = format.set_bold();
    }
    if font.italic {
        format = format.set_italic();
    }
    if font.strike {
        format = format.set_font_strikethrough();
    }
    if let Some(underline) = &font.underline {
        format = format.set_underline(to_underline(underline)?);
    }
    if let Some(script) = &font.vert_align {
        format = format.set_font_script(to_script(script)?);
    }
    if let Some(color) = &font.color {
        format = format.set_font_color(to_color(color)?);
    }
    Ok(format)
}

fn apply_border(mut format: Format, border: &BorderSpec) -> Result<Format, FacetError> {
    type Setter = fn(Format, FormatBorder) -> Format;
    type ColorSetter = fn(Format, Color) -> Format;

    let edges: [(&Option<BorderEdgeSpec>, Setter, ColorSetter); 4] = [
        (&border.left, Format::set_border_left, |f, c| f.set_border_left_color(c)),
        (&border.right, Format::set_border_right, |f, c| f.set_border_right_color(c)),
        (&border.top, Format::set_border_top, |f, c| f.set_border_top_color(c)),
        (&border.bottom, Format::set_border_bottom, |f, c| f.set_border_bottom_color(c)),
    ];

    for (edge, set_style, set_color) in edges {
        if let Some(edge) = edge {
            format = set_style(format, to_border(&edge.style)?);
            if let Some(color) = &edge.color {
                format = set_color(format, to_color(color)?);
            }
        }
    }

    if let Some(diagonal) = &border.diagonal {
        let direction = match (border.diagonal_up, border.diagonal_down) {
            (true, true) => Some(FormatDiagonalBorder::BorderUpDown),
            (true, false) => Some(FormatDiagonalBorder::BorderUp),
            (false, true) => Some(FormatDiagonalBorder::BorderDown),
            (false, false) => None,
        };
        if let Some(direction) = direction {
            format = format
                .set_border_diagonal(to_border(&diagonal.style)?)
                .set_border_diagonal_type(direction);
            if let Some(color) = &diagonal.color {
                format = format.set_border_diagonal_color(to_color(color)?);
            }
        }
    }

    Ok(format)
}

fn apply_fill(format: Format, fill: &FillSpec) -> Result<Format, FacetError> {
    let (pattern, fg, bg) = match fill {
        FillSpec::Gradient => return Err(FacetError::Gradient),
        FillSpec::Pattern { pattern, fg, bg } => (to_pattern(pattern)?, fg, bg),
    };

    match pattern {
        FormatPattern::None => Ok(format),
        // The writer treats the background color as the visible color of a
        // solid fill and stores it as fgColor itself.
        FormatPattern::Solid => {
            let mut format = format.set_pattern(FormatPattern::Solid);
            if let Some(color) = fg {
                format = format.set_background_color(to_color(color)?);
            }
            Ok(format)
        }
        pattern => {
            let mut format = format.set_pattern(pattern);
            if let Some(color) = fg {
                format = format.set_foreground_color(to_color(color)?);
            }
            if let Some(color) = bg {
                format = format.set_background_color(to_color(color)?);
            }
            Ok(format)
        }
    }
}

fn apply_number_format(format: Format, number_format: &NumberFormatSpec) -> Result<Format, FacetError> {
    match number_format {
        NumberFormatSpec::Custom(code) => Ok(format.set_num_format(code)),
        NumberFormatSpec::BuiltIn(0) => Ok(format),
        NumberFormatSpec::BuiltIn(id) if *id < 164 => Ok(format.set_num_format_index(*id as u8)),
        NumberFormatSpec::BuiltIn(id) => Err(FacetError::NumberFormat(*id)),
    }
}

fn apply_alignment(mut format: Format, alignment: &AlignmentSpec) -> Result<Format, FacetError> {
    if let Some(horizontal) = &alignment.horizontal {
        format = format.set_align(to_horizontal(horizontal)?);
    }
    if let Some(vertical) = &alignment.vertical {
        format = format.set_align(to_vertical(vertical)?);
    }
    if let Some(rotation) = alignment.text_rotation.filter(|r| *r != 0) {
        format = format.set_rotation(to_rotation(rotation)?);
    }
    if alignment.wrap_text {
        format = format.set_text_wrap();
    }
    if alignment.shrink_to_fit {
        format = format.set_shrink();
    }
    if let Some(indent) = alignment.indent.filter(|i| *i != 0) {
        let indent = u8::try_from(indent).map_err(|_| FacetError::Indent(indent))?;
        format = format.set_indent(indent);
    }
    Ok(format)
}

fn apply_protection(mut format: Format, protection: &ProtectionSpec) -> Format {
    if !protection.locked {
        format = format.set_unlocked();
    }
    if protection.hidden {
        format = format.set_hidden();
    }
    format
}

/// Legacy 64-entry palette, entries 8-63. Entries 0-7 repeat 8-15.
const INDEXED_PALETTE: [u32; 56] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF, //
    0x800000, 0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080, //
    0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF, //
    0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF, //
    0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99, //
    0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696, //
    0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993366, 0x333399, 0x333333, //
];

pub(crate) fn to_color(color: &ColorSpec) -> Result<Color, FacetError> {
    match color {
        ColorSpec::Auto => Ok(Color::Automatic),
        ColorSpec::Rgb(rgb) => Ok(Color::RGB(*rgb)),
        ColorSpec::Indexed(i @ 0..=7) => Ok(Color::RGB(INDEXED_PALETTE[*i as usize])),
        ColorSpec::Indexed(i @ 8..=63) => Ok(Color::RGB(INDEXED_PALETTE[*i as usize - 8])),
        ColorSpec::Indexed(64 | 65) => Ok(Color::Automatic),
        ColorSpec::Indexed(i) => Err(FacetError::Color(format!("indexed {}", i))),
        ColorSpec::Theme { index, tint } if *index <= 9 => {
            Ok(Color::Theme(*index as u8, theme_shade(*tint)))
        }
        ColorSpec::Theme { index, .. } => Err(FacetError::Color(format!("theme {}", index))),
    }
}

/// Nearest writer shade for an OOXML tint: 0 base, 1-3 lighter 80/60/40 %,
/// 4-5 darker 25/50 %.
fn theme_shade(tint: f64) -> u8 {
    match tint {
        t if t >= 0.7 => 1,
        t if t >= 0.5 => 2,
        t if t >= 0.2 => 3,
        t if t <= -0.4 => 5,
        t if t <= -0.1 => 4,
        _ => 0,
    }
}

fn to_underline(value: &str) -> Result<FormatUnderline, FacetError> {
    match value {
        "none" => Ok(FormatUnderline::None),
        "single" => Ok(FormatUnderline::Single),
        "double" => Ok(FormatUnderline::Double),
        "singleAccounting" => Ok(FormatUnderline::SingleAccounting),
        "doubleAccounting" => Ok(FormatUnderline::DoubleAccounting),
        other => Err(FacetError::Underline(other.to_string())),
    }
}

fn to_script(value: &str) -> Result<FormatScript, FacetError> {
    match value {
        "baseline" => Ok(FormatScript::None),
        "superscript" => Ok(FormatScript::Superscript),
        "subscript" => Ok(FormatScript::Subscript),
        other => Err(FacetError::Script(other.to_string())),
    }
}

fn to_border(value: &str) -> Result<FormatBorder, FacetError> {
    match value {
        "none" => Ok(FormatBorder::None),
        "thin" => Ok(FormatBorder::Thin),
        "medium" => Ok(FormatBorder::Medium),
        "dashed" => Ok(FormatBorder::Dashed),
        "dotted" => Ok(FormatBorder::Dotted),
        "thick" => Ok(FormatBorder::Thick),
        "double" => Ok(FormatBorder::Double),
        "hair" => Ok(FormatBorder::Hair),
        "mediumDashed" => Ok(FormatBorder::MediumDashed),
        "dashDot" => Ok(FormatBorder::DashDot),
        "mediumDashDot" => Ok(FormatBorder::MediumDashDot),
        "dashDotDot" => Ok(FormatBorder::DashDotDot),
        "mediumDashDotDot" => Ok(FormatBorder::MediumDashDotDot),
        "slantDashDot" => Ok(FormatBorder::SlantDashDot),
        other => Err(FacetError::Border(other.to_string())),
    }
}

fn to_pattern(value: &str) -> Result<FormatPattern, FacetError> {
    match value {
        "none" => Ok(FormatPattern::None),
        "solid" => Ok(FormatPattern::Solid),
        "mediumGray" => Ok(FormatPattern::MediumGray),
        "darkGray" => Ok(FormatPattern::DarkGray),
        "lightGray" => Ok(FormatPattern::LightGray),
        "darkHorizontal" => Ok(FormatPattern::DarkHorizontal),
        "darkVertical" => Ok(FormatPattern::DarkVertical),
        "darkDown" => Ok(FormatPattern::DarkDown),
        "darkUp" => Ok(FormatPattern::DarkUp),
        "darkGrid" => Ok(FormatPattern::DarkGrid),
        "darkTrellis" => Ok(FormatPattern::DarkTrellis),
        "lightHorizontal" => Ok(FormatPattern::LightHorizontal),
        "lightVertical" => Ok(FormatPattern::LightVertical),
        "lightDown" => Ok(FormatPattern::LightDown),
        "lightUp" => Ok(FormatPattern::LightUp),
        "lightGrid" => Ok(FormatPattern::LightGrid),
        "lightTrellis" => Ok(FormatPattern::LightTrellis),
        "gray125" => Ok(FormatPattern::Gray125),
        "gray0625" => Ok(FormatPattern::Gray0625),
        other => Err(FacetError::Pattern(other.to_string())),
    }
}

fn to_horizontal(value: &str) -> Result<FormatAlign, FacetError> {
    match value {
        "general" => Ok(FormatAlign::General),
        "left" => Ok(FormatAlign::Left),
        "center" => Ok(FormatAlign::Center),
        "right" => Ok(FormatAlign::Right),
        "fill" => Ok(FormatAlign::Fill),
        "justify" => Ok(FormatAlign::Justify),
        "centerContinuous" => Ok(FormatAlign::CenterAcross),
        "distributed" => Ok(FormatAlign::Distributed),
        other => Err(FacetError::Alignment(other.to_string())),
    }
}

fn to_vertical(value: &str) -> Result<FormatAlign, FacetError> {
    match value {
        "top" => Ok(FormatAlign::Top),
        "center" => Ok(FormatAlign::VerticalCenter),
        "bottom" => Ok(FormatAlign::Bottom),
        "justify" => Ok(FormatAlign::VerticalJustify),
        "distributed" => Ok(FormatAlign::VerticalDistributed),
        other => Err(FacetError::Alignment(other.to_string())),
    }
}

/// OOXML stores clockwise angles as 91-180 and stacked text as 255; the
/// writer takes -90..=90 and 270.
fn to_rotation(rotation: u32) -> Result<i16, FacetError> {
    match rotation {
        0..=90 => Ok(rotation as i16),
        91..=180 => Ok(90 - rotation as i16),
        255 => Ok(270),
        other => Err(FacetError::Rotation(other)),
    }
}
