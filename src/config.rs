use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

use crate::classpath::ClasspathPolicy;
use crate::models::{Application, Dependency};

/// Root configuration structure, deserialized from `.archive-checkr/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// How archives are analyzed.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Identity of the scanned application, used when renaming instrumented archives.
    pub application: Option<Application>,
    /// Known build coordinates, keyed by archive path.
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    /// Number of archives analyzed in parallel. Defaults to the number of CPUs.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default)]
    pub instrument: bool,
    #[serde(default)]
    pub rename: bool,
    /// Output directory for instrumented archives; a temporary one is created when unset.
    pub work_dir: Option<PathBuf>,
    /// Parent of the temporary work directory used when `work_dir` is unset.
    pub temp_dir: Option<PathBuf>,
    /// Extra `.jar` files added to the classpath, searched recursively.
    pub lib_dir: Option<PathBuf>,
    /// Only nested archives below this directory of a WAR/AAR are analyzed.
    pub include_dir: Option<PathBuf>,
    /// Seconds between progress messages while waiting for the pool.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub classpath_policy: ClasspathPolicy,
}

fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_poll_interval_secs() -> u64 {
    10
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            pool_size: default_pool_size(),
            instrument: false,
            rename: false,
            work_dir: None,
            temp_dir: None,
            lib_dir: None,
            include_dir: None,
            poll_interval_secs: default_poll_interval_secs(),
            classpath_policy: ClasspathPolicy::default(),
        }
    }
}

/// One `[[dependencies]]` table: an archive path plus its coordinates.
#[derive(Debug, Deserialize)]
pub struct DependencyEntry {
    pub path: PathBuf,
    #[serde(flatten)]
    pub dependency: Dependency,
}

impl Config {
    /// Dependency map keyed by archive path; relative paths are resolved
    /// against `project_path`.
    pub fn dependency_map(&self, project_path: &Path) -> HashMap<PathBuf, Dependency> {
        self.dependencies
            .iter()
            .map(|entry| {
                let path = if entry.path.is_relative() {
                    project_path.join(&entry.path)
                } else {
                    entry.path.clone()
                };
                (path, entry.dependency.clone())
            })
            .collect()
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.archive-checkr/config.toml`
/// 3. `~/.config/archive-checkr/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        let content = std::fs::read_to_string(path)?;
        return Ok(toml::from_str(&content)?);
    }

    let project_config = project_path.join(".archive-checkr").join("config.toml");
    if project_config.exists() {
        let content = std::fs::read_to_string(&project_config)?;
        return Ok(toml::from_str(&content)?);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("archive-checkr")
            .join("config.toml");
        if home_config.exists() {
            let content = std::fs::read_to_string(&home_config)?;
            return Ok(toml::from_str(&content)?);
        }
    }

    Ok(Config::default())
}
