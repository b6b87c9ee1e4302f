use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use super::{ArchiveReport, ScanReport};
use crate::models::ArchiveKind;

/// Render a colored terminal report.
pub fn render(report: &ScanReport, path: &Path, verbose: bool, quiet: bool) -> Result<()> {
    let total = report.archives.len();
    let top_level = report.archives.iter().filter(|a| a.parent.is_none()).count();
    let nested = total - top_level;
    let failed = report.failures.len();
    let classes: usize = report.archives.iter().map(|a| a.classes).sum();

    if quiet {
        println!(
            "Archives: {}  Nested: {}  Classes: {}  Failed: {}",
            total,
            nested,
            classes,
            if failed > 0 {
                failed.to_string().red()
            } else {
                failed.to_string().green()
            },
        );
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "archive-checkr".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Scanning: {}\n", path.display());

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("Archives analyzed  : {:>4}", report.analyzed));
    println!(" │  {:<48} │", format!("   top-level       : {:>4}", top_level));
    println!(" │  {:<48} │", format!("   nested          : {:>4}", nested));
    println!(" │  {:<48} │", format!("Classes            : {:>4}", classes));
    println!(
        " │  {:<48} │",
        format!("{}  Failed          : {:>4}", "✗".red(), failed)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    if report.interrupted {
        println!(
            " {} Analysis was interrupted, results are incomplete\n",
            "[WARN]".yellow().bold()
        );
    }

    let shown: Vec<&ArchiveReport> = report
        .archives
        .iter()
        .filter(|a| verbose || a.parent.is_none())
        .collect();
    if !shown.is_empty() {
        println!(" {} Archives:\n", "[INFO]".cyan().bold());
        render_archives(&shown, path);
        println!();
    }

    if failed > 0 {
        println!(" {} Archives that could not be analyzed:\n", "[ERROR]".red().bold());
        render_failures(report, path);
        println!();
    }

    Ok(())
}

fn render_archives(archives: &[&ArchiveReport], root: &Path) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Archive").add_attribute(Attribute::Bold),
            Cell::new("Kind").add_attribute(Attribute::Bold),
            Cell::new("Parent").add_attribute(Attribute::Bold),
            Cell::new("Classes").add_attribute(Attribute::Bold),
            Cell::new("Nested").add_attribute(Attribute::Bold),
            Cell::new("Coordinates").add_attribute(Attribute::Bold),
            Cell::new("Instrumented").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for archive in archives {
        let kind_color = match archive.kind {
            ArchiveKind::Plain => Color::Cyan,
            ArchiveKind::Web => Color::Blue,
            ArchiveKind::Android => Color::Green,
        };
        let (status, status_color) = if archive.analyzed {
            ("✓ done", Color::Green)
        } else {
            ("✗ missing", Color::Red)
        };

        table.add_row(vec![
            Cell::new(relative(&archive.path, root)),
            Cell::new(archive.kind.to_string()).fg(kind_color),
            Cell::new(
                archive
                    .parent
                    .as_deref()
                    .map(|p| relative(p, root))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(archive.classes).set_alignment(CellAlignment::Right),
            Cell::new(archive.nested).set_alignment(CellAlignment::Right),
            Cell::new(archive.coordinates.as_deref().unwrap_or("-")),
            Cell::new(
                archive
                    .instrumented
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(status)
                .fg(status_color)
                .set_alignment(CellAlignment::Center),
        ]);
    }

    println!("{}", table);
}

fn render_failures(report: &ScanReport, root: &Path) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Archive").add_attribute(Attribute::Bold),
            Cell::new("Kind").add_attribute(Attribute::Bold),
            Cell::new("Message").add_attribute(Attribute::Bold),
        ]);

    for failure in &report.failures {
        table.add_row(vec![
            Cell::new(relative(&failure.path, root)),
            Cell::new(failure.kind.to_string()).fg(Color::Red),
            Cell::new(&failure.message),
        ]);
    }

    println!("{}", table);
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
