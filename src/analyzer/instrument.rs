use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::classpath::Classpath;
use crate::error::ArchiveError;
use crate::models::Application;

use super::sha256_hex;

/// Rewrites the bytecode of a single class.
///
/// The transformation itself is provided by the embedding application; the
/// analyzer only feeds classes in and repackages whatever comes back.
pub trait Instrumentor: Send + Sync {
    fn instrument(
        &self,
        class_name: &str,
        bytecode: &[u8],
        classpath: &Classpath,
    ) -> anyhow::Result<Vec<u8>>;
}

/// Returns every class unchanged. Used when no instrumentor is configured.
pub struct Passthrough;

impl Instrumentor for Passthrough {
    fn instrument(&self, _class_name: &str, bytecode: &[u8], _classpath: &Classpath) -> anyhow::Result<Vec<u8>> {
        Ok(bytecode.to_vec())
    }
}

/// File name of an instrumented archive.
///
/// With `rename` the name follows `<name>-vulas-<group>-<artifact>-<version>.<ext>`
/// when an application context is known, `<name>-vulas.<ext>` otherwise.
/// Without `rename` the original file name is kept.
pub fn output_name(file_name: &str, rename: bool, app: Option<&Application>) -> String {
    if !rename {
        return file_name.to_string();
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (file_name, None),
    };
    let base = match app {
        Some(app) => format!("{}-vulas-{}-{}-{}", stem, app.group, app.artifact, app.version),
        None => format!("{}-vulas", stem),
    };
    match ext {
        Some(ext) => format!("{}.{}", base, ext),
        None => base,
    }
}

/// Where the instrumented copy of `archive` is written.
///
/// Archives are grouped below `work_dir` by a digest of the directory that
/// holds them, so equally named archives from different places (or nested in
/// different containers) never share a target.
pub fn output_path(work_dir: &Path, archive: &Path, rename: bool, app: Option<&Application>) -> PathBuf {
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = archive.parent().unwrap_or_else(|| Path::new(""));
    let digest = sha256_hex(dir.as_os_str().as_encoded_bytes());
    work_dir
        .join(&digest[..16])
        .join(output_name(&file_name, rename, app))
}

/// Write `source` to `target`, replacing the entries found in `rewritten`.
pub fn repackage(
    source: &[u8],
    rewritten: &HashMap<String, Vec<u8>>,
    target: &Path,
) -> Result<(), ArchiveError> {
    let mut zip = ZipArchive::new(Cursor::new(source))?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(File::create(target)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let name = entry.name().to_string();
        if entry.is_dir() {
            writer.add_directory(name, options)?;
            continue;
        }
        writer.start_file(name.clone(), options)?;
        match rewritten.get(&name) {
            Some(bytes) => writer.write_all(bytes)?,
            None => {
                std::io::copy(&mut entry, &mut writer)?;
            }
        }
    }

    writer.finish()?;
    Ok(())
}
