use crate::api::{run_api_server, ApiConfig};
use crate::archive;
use crate::error::SplitterResult;
use crate::excel::{
    extract, read_sheet_names, validate_selection, SkipReason, SourceWorkbook,
    MAX_SHEETS_PER_REQUEST,
};
use crate::naming;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Stem of the workbook's file name, used as the output prefix.
fn base_name(file: &Path) -> String {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    naming::file_stem(&name).to_string()
}

/// Execute the sheets command
pub fn sheets(file: PathBuf) -> SplitterResult<()> {
    println!("{}", "📑 Sheet Splitter - Sheets".bold().green());
    println!("   File: {}\n", file.display());

    let names = read_sheet_names(&file)?;
    if names.is_empty() {
        println!("{}", "⚠️  Workbook has no sheets".yellow());
        return Ok(());
    }

    for (i, name) in names.iter().enumerate() {
        println!("   {:>3}. {}", i + 1, name.bright_blue());
    }
    println!("\n   {} sheet(s)", names.len());
    Ok(())
}

/// Execute the split command
pub fn split(
    file: PathBuf,
    sheets: Vec<String>,
    output_dir: PathBuf,
    zip: bool,
    verbose: bool,
) -> SplitterResult<Vec<PathBuf>> {
    println!("{}", "📑 Sheet Splitter - Split".bold().green());
    println!("   File:   {}", file.display());
    println!("   Output: {}\n", output_dir.display());

    validate_selection(&sheets, MAX_SHEETS_PER_REQUEST)?;

    if verbose {
        println!("{}", "📖 Reading workbook...".cyan());
    }
    let mut workbook = SourceWorkbook::open(&file)?;
    if verbose {
        println!("   Found {} sheet(s)\n", workbook.sheet_names().len());
    }

    let base = base_name(&file);
    let extraction = extract(&mut workbook, &sheets, &base);

    for skipped in &extraction.skipped {
        let reason = match &skipped.reason {
            SkipReason::NotFound => "not found".to_string(),
            SkipReason::Failed(e) => e.clone(),
        };
        println!(
            "{}",
            format!("⚠️  Skipped {}: {}", skipped.sheet, reason).yellow()
        );
    }

    let extraction = extraction.require_output()?;
    fs::create_dir_all(&output_dir)?;

    let mut written = Vec::new();
    if zip {
        let path = output_dir.join(archive::archive_name(&base));
        fs::write(&path, archive::zip_files(&extraction.files)?)?;
        if verbose {
            for file in &extraction.files {
                println!("   📄 {} → {}", file.sheet.bright_blue(), file.name);
            }
        }
        written.push(path);
    } else {
        for file in &extraction.files {
            let path = output_dir.join(&file.name);
            fs::write(&path, &file.bytes)?;
            if verbose {
                println!("   📄 {} → {}", file.sheet.bright_blue(), file.name);
            }
            written.push(path);
        }
    }

    println!(
        "\n{}",
        format!("✅ Extracted {} sheet(s)", extraction.len()).bold().green()
    );
    for path in &written {
        println!("   {}", path.display());
    }
    Ok(written)
}

/// Execute the serve command
pub fn serve(config: ApiConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_api_server(config))
}
