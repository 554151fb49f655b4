//! Workbook fixtures built on the fly with rust_xlsxwriter.

#![allow(dead_code)]

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, FormatPattern, Formula, Workbook};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Width of column A in the Sales fixture, in characters.
pub const SALES_COLUMN_A_WIDTH: f64 = 20.0;
/// Height of the Sales header row, in points.
pub const SALES_HEADER_HEIGHT: f64 = 30.0;

pub fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::RGB(0xFF0000))
        .set_background_color(Color::RGB(0xFFFF00))
        .set_pattern(FormatPattern::Solid)
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
}

/// `Sales` and `Expenses`, in that order.
///
/// Sales carries a styled header row, numbers, a formula with a cached
/// result, a merged title range, an explicit column width and row height.
pub fn two_sheet_workbook(dir: &Path, filename: &str) -> PathBuf {
    let path = dir.join(filename);
    let mut workbook = Workbook::new();

    let header = header_format();
    let money = Format::new().set_num_format("#,##0.00");

    let sales = workbook.add_worksheet();
    sales.set_name("Sales").unwrap();
    sales.write_string_with_format(0, 0, "Region", &header).unwrap();
    sales.write_string_with_format(0, 1, "Amount", &header).unwrap();
    sales.write_string(1, 0, "North").unwrap();
    sales.write_number_with_format(1, 1, 100.0, &money).unwrap();
    sales.write_string(2, 0, "South").unwrap();
    sales.write_number_with_format(2, 1, 250.5, &money).unwrap();
    sales.write_string(3, 0, "Total").unwrap();
    sales
        .write_formula_with_format(3, 1, Formula::new("=SUM(B2:B3)").set_result("350.5"), &money)
        .unwrap();
    sales
        .merge_range(4, 0, 4, 2, "Quarterly sales", &Format::new().set_italic())
        .unwrap();
    sales.write_boolean(5, 0, true).unwrap();
    sales.set_column_width(0, SALES_COLUMN_A_WIDTH).unwrap();
    sales.set_row_height(0, SALES_HEADER_HEIGHT).unwrap();

    let expenses = workbook.add_worksheet();
    expenses.set_name("Expenses").unwrap();
    expenses.write_string(0, 0, "Item").unwrap();
    expenses.write_string(0, 1, "Cost").unwrap();
    expenses.write_string(1, 0, "Rent").unwrap();
    expenses.write_number(1, 1, 1200.0).unwrap();

    workbook.save(&path).unwrap();
    path
}

/// One sheet per name, each with its name in A1.
pub fn named_sheets_workbook(dir: &Path, filename: &str, names: &[&str]) -> PathBuf {
    let path = dir.join(filename);
    let mut workbook = Workbook::new();
    for name in names {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        sheet.write_string(0, 0, *name).unwrap();
    }
    workbook.save(&path).unwrap();
    path
}

/// Replace the package part `part` of the workbook at `path` with `contents`.
pub fn rewrite_part(path: &Path, part: &str, contents: &[u8]) {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        entries.push((entry.name().to_string(), bytes));
    }
    drop(archive);

    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, bytes) in entries {
        writer.start_file(name.as_str(), SimpleFileOptions::default()).unwrap();
        if name == part {
            writer.write_all(contents).unwrap();
        } else {
            writer.write_all(&bytes).unwrap();
        }
    }
    writer.finish().unwrap();
}

/// Checked-in BIFF8 workbook with sheets `Summary` and `Detail`.
///
/// Summary: A1 "Item", B1 100, A2 "Extra", B2 250.5, A3 "Total",
/// B3 `B1+B2` (cached 350.5), A5 "Quarterly" merged over A5:C5.
/// Detail: A1 "Note".
pub fn legacy_workbook() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/ledger.xls")
}
