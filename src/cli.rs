use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "archive-checkr",
    about = "Analyze Java archives and fingerprint the code constructs they contain",
    version
)]
pub struct Cli {
    /// Directory or archive to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file [default: ./.archive-checkr/config.toml, fallback ~/.config/archive-checkr/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Number of archives analyzed in parallel
    #[arg(long, value_name = "N")]
    pub pool_size: Option<usize>,

    /// Instrument classes and write the rewritten archives to the work dir
    #[arg(long)]
    pub instrument: bool,

    /// Rename instrumented archives to <name>-vulas[-<group>-<artifact>-<version>].<ext>
    #[arg(long)]
    pub rename: bool,

    /// Output directory for instrumented archives (created if missing)
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Directory whose .jar files are added to the classpath
    #[arg(long, value_name = "DIR")]
    pub lib_dir: Option<PathBuf>,

    /// Nested-library directory honoured inside WAR and AAR archives
    #[arg(long, value_name = "DIR")]
    pub include_dir: Option<PathBuf>,

    /// Compare the scanned archive against this baseline archive
    #[arg(long, value_name = "ARCHIVE")]
    pub baseline: Option<PathBuf>,

    /// Show every archive (not just top-level ones) and info logs
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}
