//! Sheet extraction tests
//!
//! Fixtures are written with rust_xlsxwriter, extracted, then re-read with
//! calamine and the package layout reader.

mod common;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use pretty_assertions::assert_eq;
use sheet_splitter::excel::layout::{CellRange, XlsxPackage};
use sheet_splitter::excel::{
    extract, extract_path, read_sheet_names, CellValue, ExtractedFile, SkipReason, SourceFormat,
    SourceWorkbook,
};
use sheet_splitter::SplitterError;
use std::fs::File;
use std::io::{BufReader, Cursor};
use tempfile::TempDir;

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn read_output(file: &ExtractedFile) -> Xlsx<Cursor<Vec<u8>>> {
    open_workbook_from_rs(Cursor::new(file.bytes.clone())).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// SOURCE WORKBOOK TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_sheet_inventory_preserves_order() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "sample_2sheets.xlsx");

    let workbook = SourceWorkbook::open(&path).unwrap();
    assert_eq!(workbook.sheet_names(), &["Sales", "Expenses"]);
    assert!(workbook.contains("Sales"));
    assert!(!workbook.contains("sales"));
}

#[test]
fn test_source_sheet_reads_formula_and_layout() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "book.xlsx");
    let mut workbook = SourceWorkbook::open(&path).unwrap();

    let sheet = workbook.sheet("Sales").unwrap();
    assert_eq!(
        sheet.cells[&(3, 1)].value,
        CellValue::Formula {
            text: "SUM(B2:B3)".to_string(),
            cached: Box::new(CellValue::Number(350.5)),
        }
    );
    assert!(sheet.cells[&(0, 0)].style.is_some());
    assert_eq!(sheet.merges, vec![CellRange::new(4, 0, 4, 2)]);
    assert!(sheet.column_widths.contains_key(&0));
    assert_eq!(sheet.row_heights.get(&0), Some(&common::SALES_HEADER_HEIGHT));
}

#[test]
fn test_unknown_sheet_is_not_found() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "book.xlsx");
    let mut workbook = SourceWorkbook::open(&path).unwrap();

    assert!(matches!(
        workbook.sheet("Ghost"),
        Err(SplitterError::SheetNotFound(_))
    ));
}

#[test]
fn test_corrupt_workbook_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.xlsx");
    std::fs::write(&path, b"this is not a zip archive").unwrap();

    assert!(matches!(
        SourceWorkbook::open(&path),
        Err(SplitterError::Workbook(_))
    ));
}

// ═══════════════════════════════════════════════════════════════════════════
// EXTRACTION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_extract_both_sheets() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "sample_2sheets.xlsx");
    let mut workbook = SourceWorkbook::open(&path).unwrap();

    let extraction = extract(&mut workbook, &strings(&["Sales", "Expenses"]), "sample_2sheets");

    assert_eq!(
        extraction.names(),
        vec!["sample_2sheets_Sales.xlsx", "sample_2sheets_Expenses.xlsx"]
    );
    assert!(extraction.skipped.is_empty());
}

#[test]
fn test_extract_skips_absent_sheet() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "book.xlsx");
    let mut workbook = SourceWorkbook::open(&path).unwrap();

    let extraction = extract(&mut workbook, &strings(&["Missing", "Sales"]), "book");

    assert_eq!(extraction.names(), vec!["book_Sales.xlsx"]);
    assert_eq!(extraction.skipped.len(), 1);
    assert_eq!(extraction.skipped[0].sheet, "Missing");
    assert_eq!(extraction.skipped[0].reason, SkipReason::NotFound);
}

#[test]
fn test_extract_only_absent_sheets_is_empty() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "book.xlsx");
    let mut workbook = SourceWorkbook::open(&path).unwrap();

    let extraction = extract(&mut workbook, &strings(&["Ghost", "Phantom"]), "book");
    assert!(extraction.is_empty());
    assert_eq!(extraction.skipped.len(), 2);

    assert!(matches!(
        extract_path(&path, &strings(&["Ghost"]), "book"),
        Err(SplitterError::NothingToExtract)
    ));
}

#[test]
fn test_broken_sheet_does_not_abort_batch() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "book.xlsx");
    // Expenses is the second worksheet part; cut it off inside sheetData.
    common::rewrite_part(
        &path,
        "xl/worksheets/sheet2.xml",
        br#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1"><v>1</v></c>"#,
    );
    let mut workbook = SourceWorkbook::open(&path).unwrap();

    let extraction = extract(&mut workbook, &strings(&["Expenses", "Sales"]), "book");

    assert_eq!(extraction.names(), vec!["book_Sales.xlsx"]);
    assert_eq!(extraction.skipped.len(), 1);
    assert_eq!(extraction.skipped[0].sheet, "Expenses");
    assert!(matches!(extraction.skipped[0].reason, SkipReason::Failed(_)));
}

#[test]
fn test_extract_duplicate_request_gets_numbered_name() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "book.xlsx");
    let mut workbook = SourceWorkbook::open(&path).unwrap();

    let extraction = extract(&mut workbook, &strings(&["Sales", "Sales", "Sales"]), "book");
    assert_eq!(
        extraction.names(),
        vec!["book_Sales.xlsx", "book_Sales(1).xlsx", "book_Sales(2).xlsx"]
    );
}

#[test]
fn test_sanitized_names_that_collide_are_resolved() {
    let dir = TempDir::new().unwrap();
    let path = common::named_sheets_workbook(dir.path(), "book.xlsx", &["Q1 Data", "Q1_Data"]);
    let mut workbook = SourceWorkbook::open(&path).unwrap();

    let extraction = extract(&mut workbook, &strings(&["Q1 Data", "Q1_Data"]), "book");
    assert_eq!(
        extraction.names(),
        vec!["book_Q1_Data.xlsx", "book_Q1_Data(1).xlsx"]
    );
}

#[test]
fn test_long_sheet_name_kept_whole() {
    let dir = TempDir::new().unwrap();
    let name = "A".repeat(31);
    let path = common::named_sheets_workbook(dir.path(), "book.xlsx", &[name.as_str()]);

    let extraction = extract_path(&path, &[name.clone()], "book").unwrap();
    let output = read_output(&extraction.files[0]);
    assert_eq!(output.sheet_names(), vec![name]);
}

// ═══════════════════════════════════════════════════════════════════════════
// CLONE FIDELITY TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cloned_values_and_formulas_match_source() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "book.xlsx");

    let extraction = extract_path(&path, &strings(&["Sales"]), "book").unwrap();
    let mut output = read_output(&extraction.files[0]);
    assert_eq!(output.sheet_names(), vec!["Sales".to_string()]);

    let values = output.worksheet_range("Sales").unwrap();
    assert_eq!(values.get_value((0, 0)), Some(&Data::String("Region".to_string())));
    assert_eq!(values.get_value((1, 1)), Some(&Data::Float(100.0)));
    assert_eq!(values.get_value((2, 1)), Some(&Data::Float(250.5)));
    assert_eq!(values.get_value((5, 0)), Some(&Data::Bool(true)));
    assert_eq!(
        values.get_value((4, 0)),
        Some(&Data::String("Quarterly sales".to_string()))
    );

    let formulas = output.worksheet_formula("Sales").unwrap();
    assert_eq!(formulas.get_value((3, 1)), Some(&"SUM(B2:B3)".to_string()));
}

#[test]
fn test_cloned_layout_matches_source() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "book.xlsx");

    let mut source = XlsxPackage::open(&path).unwrap();
    let source_layout = source.sheet_layout("Sales").unwrap();

    let extraction = extract_path(&path, &strings(&["Sales"]), "book").unwrap();
    let mut cloned = XlsxPackage::from_reader(Cursor::new(extraction.files[0].bytes.clone())).unwrap();
    let cloned_layout = cloned.sheet_layout("Sales").unwrap();

    assert_eq!(cloned_layout.merges, source_layout.merges);
    assert_eq!(cloned_layout.row_heights, source_layout.row_heights);

    let source_width = source_layout.column_widths[&0];
    let cloned_width = cloned_layout.column_widths[&0];
    assert!(
        (source_width - cloned_width).abs() < 0.01,
        "width drifted: {} -> {}",
        source_width,
        cloned_width
    );
}

#[test]
fn test_cloned_styles_match_source() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "book.xlsx");

    let mut source = XlsxPackage::open(&path).unwrap();
    let source_layout = source.sheet_layout("Sales").unwrap();

    let extraction = extract_path(&path, &strings(&["Sales"]), "book").unwrap();
    let mut cloned = XlsxPackage::from_reader(Cursor::new(extraction.files[0].bytes.clone())).unwrap();
    let cloned_layout = cloned.sheet_layout("Sales").unwrap();

    for cell in [(0, 0), (0, 1), (1, 1), (3, 1)] {
        let source_style = source
            .styles()
            .get(source_layout.cell_styles[&cell])
            .unwrap()
            .clone();
        let cloned_style = cloned
            .styles()
            .get(cloned_layout.cell_styles[&cell])
            .unwrap()
            .clone();

        assert_eq!(cloned_style.fill, source_style.fill, "fill at {:?}", cell);
        assert_eq!(cloned_style.border, source_style.border, "border at {:?}", cell);
        assert_eq!(
            cloned_style.number_format, source_style.number_format,
            "number format at {:?}",
            cell
        );
        assert_eq!(cloned_style.alignment, source_style.alignment, "alignment at {:?}", cell);

        let source_font = source_style.font.unwrap_or_default();
        let cloned_font = cloned_style.font.unwrap_or_default();
        assert_eq!(cloned_font.bold, source_font.bold, "bold at {:?}", cell);
        assert_eq!(cloned_font.color, source_font.color, "font color at {:?}", cell);
    }
}

#[test]
fn test_source_file_untouched_by_extraction() {
    let dir = TempDir::new().unwrap();
    let path = common::two_sheet_workbook(dir.path(), "book.xlsx");
    let before = std::fs::read(&path).unwrap();

    extract_path(&path, &strings(&["Sales", "Expenses"]), "book").unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), before);
    let reader = BufReader::new(File::open(&path).unwrap());
    let workbook: Xlsx<_> = Xlsx::new(reader).unwrap();
    assert_eq!(workbook.sheet_names().len(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════
// LEGACY XLS TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_xls_sheet_inventory() {
    let path = common::legacy_workbook();
    assert_eq!(SourceFormat::from_path(&path), Some(SourceFormat::Xls));
    assert_eq!(read_sheet_names(&path).unwrap(), vec!["Summary", "Detail"]);
}

#[test]
fn test_xls_source_sheet() {
    let mut workbook = SourceWorkbook::open(common::legacy_workbook()).unwrap();
    let sheet = workbook.sheet("Summary").unwrap();

    assert_eq!(sheet.cells[&(0, 0)].value, CellValue::Text("Item".to_string()));
    assert_eq!(sheet.cells[&(1, 1)].value, CellValue::Number(250.5));
    assert_eq!(
        sheet.cells[&(2, 1)].value,
        CellValue::Formula {
            text: "B1+B2".to_string(),
            cached: Box::new(CellValue::Number(350.5)),
        }
    );
    assert_eq!(sheet.merges, vec![CellRange::new(4, 0, 4, 2)]);
    assert!(sheet.cells.values().all(|cell| cell.style.is_none()));
}

#[test]
fn test_xls_extraction_keeps_values_formula_and_merge() {
    let path = common::legacy_workbook();
    let extraction = extract_path(&path, &strings(&["Summary"]), "ledger").unwrap();
    assert_eq!(extraction.names(), vec!["ledger_Summary.xlsx"]);

    let mut output = read_output(&extraction.files[0]);
    let values = output.worksheet_range("Summary").unwrap();
    assert_eq!(values.get_value((0, 0)), Some(&Data::String("Item".to_string())));
    assert_eq!(values.get_value((0, 1)), Some(&Data::Float(100.0)));
    assert_eq!(
        values.get_value((4, 0)),
        Some(&Data::String("Quarterly".to_string()))
    );

    let formulas = output.worksheet_formula("Summary").unwrap();
    assert_eq!(formulas.get_value((2, 1)), Some(&"B1+B2".to_string()));

    let mut package =
        XlsxPackage::from_reader(Cursor::new(extraction.files[0].bytes.clone())).unwrap();
    let layout = package.sheet_layout("Summary").unwrap();
    assert_eq!(layout.merges, vec![CellRange::new(4, 0, 4, 2)]);
}
