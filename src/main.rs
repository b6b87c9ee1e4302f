//! `archive-checkr` — analyze Java archives, fingerprint their constructs and
//! optionally instrument them.
//!
//! # Flow
//! 1. Parse CLI arguments and set up logging.
//! 2. Load config (`config::load_config`) and apply CLI overrides.
//! 3. Discover archives (`detector::discover_archives`).
//! 4. Analyze them on a bounded pool (`manager::AnalysisManager`).
//! 5. Optionally compare against a baseline archive (`sign`).
//! 6. Render the requested report (`report`).
//! 7. Exit `0` (clean) or `1` (at least one archive failed).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use archive_checkr::cli::{Cli, ReportFormat};
use archive_checkr::config::load_config;
use archive_checkr::detector::discover_archives;
use archive_checkr::manager::AnalysisManager;
use archive_checkr::report::{self, ScanReport};
use archive_checkr::sign::{ConstructStatus, ElementComparator, Signature};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Resolve project path
    let path = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| cli.path.clone());
    let project = if path.is_dir() {
        path.clone()
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    let mut config = load_config(&project, cli.config.as_deref())?;
    let analysis = &mut config.analysis;
    if let Some(n) = cli.pool_size {
        analysis.pool_size = n;
    }
    analysis.instrument |= cli.instrument;
    analysis.rename |= cli.rename;
    if cli.work_dir.is_some() {
        analysis.work_dir = cli.work_dir.clone();
    }
    if cli.lib_dir.is_some() {
        analysis.lib_dir = cli.lib_dir.clone();
    }
    if cli.include_dir.is_some() {
        analysis.include_dir = cli.include_dir.clone();
    }

    let archives = discover_archives(&path);
    if archives.is_empty() {
        eprintln!("No JAR, WAR or AAR archives found in {}", path.display());
        std::process::exit(1);
    }
    if !cli.quiet {
        eprintln!("  {} {} archives", "→".cyan(), archives.len());
    }

    let mut manager = AnalysisManager::new(
        config.analysis.pool_size,
        config.analysis.instrument,
        config.application.clone(),
    );
    manager.set_rename(config.analysis.rename);
    if let Some(dir) = &config.analysis.work_dir {
        manager.set_work_dir(dir, true);
    }
    if let Some(dir) = &config.analysis.temp_dir {
        manager.set_temp_root(dir);
    }
    if let Some(dir) = &config.analysis.lib_dir {
        manager.set_lib_dir(dir);
    }
    if let Some(dir) = &config.analysis.include_dir {
        manager.set_include_dir(dir);
    }
    manager.set_dependencies(config.dependency_map(&project));
    manager.set_classpath_policy(config.analysis.classpath_policy);
    manager.set_poll_interval(Duration::from_secs(config.analysis.poll_interval_secs.max(1)));

    let pb = if !cli.quiet {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos}/{len} {msg}")?,
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("analyzing");
        let sink = pb.clone();
        manager.on_progress(move |p| {
            sink.set_length(p.total as u64);
            sink.set_position(p.completed as u64);
        });
        Some(pb)
    } else {
        None
    };

    let interrupt = manager.interrupt_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.interrupt();
        }
    });

    let paths: HashMap<PathBuf, Option<_>> = archives.into_iter().map(|p| (p, None)).collect();
    manager
        .schedule_if_absent(paths, None)
        .await
        .context("archive analysis failed")?;

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    if let Some(baseline) = &cli.baseline {
        compare_with_baseline(&manager, baseline).await?;
    }

    let scan = ScanReport::from_manager(&manager);
    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(&scan, &project, cli.verbose, cli.quiet)?;
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&scan)?);
        }
    }

    if scan.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

/// Analyze `baseline` on its own and print how the scanned archive with the
/// same file name differs from it.
async fn compare_with_baseline(manager: &AnalysisManager, baseline: &Path) -> Result<()> {
    let mut base = AnalysisManager::new(1, false, None);
    base.analyze(&[baseline.to_path_buf()], None)
        .await
        .context("baseline analysis failed")?;

    let analyzed = base
        .get(baseline)
        .filter(|a| a.is_analyzed())
        .with_context(|| format!("could not analyze baseline {}", baseline.display()))?;
    let name = analyzed.file_name();
    let baseline_signature = analyzed.signature().unwrap_or_else(|| Signature::new(&name));

    let candidate = manager
        .find_by_suffix(Path::new(&name))
        .and_then(|a| a.signature());

    let (status, change) =
        ConstructStatus::classify(&ElementComparator, &baseline_signature, candidate.as_ref());
    eprintln!("  {} {} is {}", "→".cyan(), name, status.to_string().bold());
    if let Some(change) = change {
        println!("{}", change.to_json()?);
    }
    Ok(())
}
