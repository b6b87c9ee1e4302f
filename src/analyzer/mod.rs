//! Analysis of a single Java archive.
//!
//! An [`ArchiveAnalyzer`] owns one archive's bytes and turns them into
//! [`ArchiveContents`]: class and package constructs, manifest, embedded Maven
//! coordinates, and the nested archives it contains. Kind-specific rules live
//! behind [`ArchiveLayout`]:
//!
//! - [`plain`] — `.jar`
//! - [`web`] — `.war`
//! - [`android`] — `.aar`
//!
//! Nested archives are surfaced, not analyzed inline; the
//! [`AnalysisManager`](crate::manager::AnalysisManager) schedules them.

pub mod android;
pub mod instrument;
pub mod manifest;
pub mod plain;
pub mod pom;
pub mod web;

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::classpath::Classpath;
use crate::error::ArchiveError;
use crate::models::{Application, ArchiveKind, Dependency};
use crate::sign::{self, Signature};

use instrument::{output_path, repackage, Instrumentor, Passthrough};
use manifest::{Manifest, MANIFEST_ENTRY};

/// Where classes and nested archives live inside one kind of archive.
pub trait ArchiveLayout: Sync {
    /// Fully qualified class name for a class entry, `None` for anything else.
    fn class_name(&self, entry: &str) -> Option<String>;

    /// Whether a nested archive at `entry` should be analyzed as a child.
    fn accepts_nested(&self, entry: &str, include_dir: Option<&Path>) -> bool;
}

impl ArchiveKind {
    pub fn layout(self) -> &'static dyn ArchiveLayout {
        match self {
            ArchiveKind::Plain => &plain::PlainLayout,
            ArchiveKind::Web => &web::WebLayout,
            ArchiveKind::Android => &android::AndroidLayout,
        }
    }
}

/// `com/acme/Foo.class` → `com.acme.Foo`. Module and package descriptors and
/// everything below `META-INF/` are skipped.
fn class_name(entry: &str) -> Option<String> {
    if entry.starts_with("META-INF/") {
        return None;
    }
    let stem = entry.strip_suffix(".class")?;
    let simple = stem.rsplit('/').next().unwrap_or(stem);
    if simple.is_empty() || simple == "module-info" || simple == "package-info" {
        return None;
    }
    Some(stem.replace('/', "."))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructKind {
    Package,
    Class,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Construct {
    pub kind: ConstructKind,
    pub name: String,
    pub digest: String,
}

/// An archive found inside another one, waiting to be scheduled.
pub struct NestedArchive {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveContents {
    pub digest: String,
    pub constructs: Vec<Construct>,
    pub manifest: Manifest,
    pub embedded: Option<Dependency>,
    pub children: Vec<PathBuf>,
    pub instrumented: Option<PathBuf>,
}

impl ArchiveContents {
    pub fn count(&self, kind: ConstructKind) -> usize {
        self.constructs.iter().filter(|c| c.kind == kind).count()
    }
}

/// Where the bytes of an archive come from.
enum Source {
    /// Read from the archive path when the analyzer runs.
    File,
    /// Already in memory, as for archives nested in another one.
    Memory(Vec<u8>),
}

/// Analyzer for one archive, runnable on any worker thread.
///
/// Configuration is fixed at construction; the outcome is published once when
/// [`run`](Self::run) finishes and can be read concurrently afterwards.
pub struct ArchiveAnalyzer {
    path: PathBuf,
    kind: ArchiveKind,
    source: Mutex<Option<Source>>,
    instrument: bool,
    rename: bool,
    work_dir: Option<PathBuf>,
    include_dir: Option<PathBuf>,
    parent: Option<PathBuf>,
    dependency: Option<Dependency>,
    app: Option<Arc<Application>>,
    classpath: Arc<Classpath>,
    classpath_issue: Option<String>,
    instrumentor: Arc<dyn Instrumentor>,
    contents: OnceLock<ArchiveContents>,
    nested: Mutex<Vec<NestedArchive>>,
}

impl std::fmt::Debug for ArchiveAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveAnalyzer")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("analyzed", &self.is_analyzed())
            .finish()
    }
}

impl ArchiveAnalyzer {
    /// Analyzer over bytes already in memory.
    pub fn new(path: PathBuf, kind: ArchiveKind, bytes: Vec<u8>) -> Self {
        Self::with_source(path, kind, Source::Memory(bytes))
    }

    /// Analyzer that reads `path` itself once it runs.
    pub fn from_file(path: PathBuf, kind: ArchiveKind) -> Self {
        Self::with_source(path, kind, Source::File)
    }

    fn with_source(path: PathBuf, kind: ArchiveKind, source: Source) -> Self {
        ArchiveAnalyzer {
            path,
            kind,
            source: Mutex::new(Some(source)),
            instrument: false,
            rename: false,
            work_dir: None,
            include_dir: None,
            parent: None,
            dependency: None,
            app: None,
            classpath: Arc::new(Classpath::new()),
            classpath_issue: None,
            instrumentor: Arc::new(Passthrough),
            contents: OnceLock::new(),
            nested: Mutex::new(Vec::new()),
        }
    }

    pub fn with_instrument(mut self, instrument: bool) -> Self {
        self.instrument = instrument;
        self
    }

    pub fn with_rename(mut self, rename: bool) -> Self {
        self.rename = rename;
        self
    }

    pub fn with_work_dir(mut self, work_dir: Option<PathBuf>) -> Self {
        self.work_dir = work_dir;
        self
    }

    pub fn with_include_dir(mut self, include_dir: Option<PathBuf>) -> Self {
        self.include_dir = include_dir;
        self
    }

    pub fn with_parent(mut self, parent: Option<PathBuf>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_dependency(mut self, dependency: Option<Dependency>) -> Self {
        self.dependency = dependency;
        self
    }

    pub fn with_app(mut self, app: Option<Arc<Application>>) -> Self {
        self.app = app;
        self
    }

    pub fn with_classpath(mut self, classpath: Arc<Classpath>) -> Self {
        self.classpath = classpath;
        self
    }

    /// Block instrumentation because the classpath could not be completed.
    pub fn with_classpath_issue(mut self, issue: Option<String>) -> Self {
        self.classpath_issue = issue;
        self
    }

    pub fn with_instrumentor(mut self, instrumentor: Arc<dyn Instrumentor>) -> Self {
        self.instrumentor = instrumentor;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    pub fn parent(&self) -> Option<&Path> {
        self.parent.as_deref()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn contents(&self) -> Option<&ArchiveContents> {
        self.contents.get()
    }

    pub fn is_analyzed(&self) -> bool {
        self.contents.get().is_some()
    }

    /// Paths of the archives nested in this one; empty until analyzed.
    pub fn children(&self) -> &[PathBuf] {
        self.contents()
            .map(|c| c.children.as_slice())
            .unwrap_or_default()
    }

    /// Coordinates from the dependency map, else those embedded by Maven.
    pub fn dependency(&self) -> Option<&Dependency> {
        self.dependency
            .as_ref()
            .or_else(|| self.contents().and_then(|c| c.embedded.as_ref()))
    }

    /// Known library identifier, falling back to the archive digest.
    pub fn library_id(&self) -> Option<String> {
        self.dependency()
            .and_then(|d| d.library_id.clone())
            .or_else(|| self.contents().map(|c| c.digest.clone()))
    }

    pub fn signature(&self) -> Option<Signature> {
        self.contents()
            .map(|c| sign::archive_signature(&self.file_name(), &c.constructs))
    }

    /// Hand over the nested archives found by [`run`](Self::run). Drains them.
    pub fn take_nested(&self) -> Vec<NestedArchive> {
        std::mem::take(&mut *self.nested.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Unpack, optionally instrument and repackage. Runs at most once.
    ///
    /// Contents are published even when instrumentation fails; the error is
    /// returned afterwards.
    pub fn run(&self) -> Result<(), ArchiveError> {
        let source = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ArchiveError::AlreadyAnalyzed)?;
        let bytes = match source {
            Source::Memory(bytes) => bytes,
            Source::File => std::fs::read(&self.path).map_err(ArchiveError::Read)?,
        };

        debug!(path = %self.path.display(), kind = %self.kind, "Analyzing archive");
        let layout = self.kind.layout();
        let mut zip = ZipArchive::new(Cursor::new(bytes.as_slice()))?;

        let mut classes: BTreeMap<String, String> = BTreeMap::new();
        let mut code: Vec<(String, String, Vec<u8>)> = Vec::new();
        let mut manifest = Manifest::default();
        let mut properties = Vec::new();
        let mut poms = Vec::new();
        let mut children = Vec::new();
        let mut nested = Vec::new();

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let enclosed = entry.enclosed_name().filter(|p| stays_inside(p));
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;

            if name == MANIFEST_ENTRY {
                manifest = Manifest::parse(&buf);
            } else if pom::is_pom_properties(&name) {
                properties.push(String::from_utf8_lossy(&buf).into_owned());
            } else if pom::is_pom_xml(&name) {
                poms.push(String::from_utf8_lossy(&buf).into_owned());
            } else if let Some(class) = layout.class_name(&name) {
                classes.insert(class.clone(), sha256_hex(&buf));
                if self.instrument {
                    code.push((name, class, buf));
                }
            } else if ArchiveKind::from_path(Path::new(&name)).is_some()
                && layout.accepts_nested(&name, self.include_dir.as_deref())
            {
                let Some(relative) = enclosed else {
                    warn!(path = %self.path.display(), entry = %name, "Skipping nested archive outside of its container");
                    continue;
                };
                let child = self.path.join(relative);
                children.push(child.clone());
                nested.push(NestedArchive {
                    path: child,
                    bytes: buf,
                });
            }
        }
        drop(zip);

        let embedded = match (properties.as_slice(), poms.as_slice()) {
            ([props], _) => pom::from_pom_properties(props),
            ([], [xml]) => pom::from_pom_xml(xml),
            _ => None,
        };

        let mut failure = None;
        let mut instrumented = None;
        if self.instrument {
            match self.instrument_classes(&bytes, code) {
                Ok(target) => instrumented = Some(target),
                Err(e) => failure = Some(e),
            }
        }

        let contents = ArchiveContents {
            digest: sha256_hex(&bytes),
            constructs: constructs(classes),
            manifest,
            embedded,
            children,
            instrumented,
        };

        *self.nested.lock().unwrap_or_else(PoisonError::into_inner) = nested;
        // the source can only be taken once, so the cell is always empty here
        let _ = self.contents.set(contents);

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn instrument_classes(
        &self,
        bytes: &[u8],
        code: Vec<(String, String, Vec<u8>)>,
    ) -> Result<PathBuf, ArchiveError> {
        if let Some(issue) = &self.classpath_issue {
            return Err(ArchiveError::ClasspathIncomplete(issue.clone()));
        }
        let work_dir = self.work_dir.as_deref().ok_or(ArchiveError::MissingWorkDir)?;

        let mut rewritten = HashMap::new();
        for (entry, class, bytecode) in code {
            let out = self
                .instrumentor
                .instrument(&class, &bytecode, &self.classpath)
                .map_err(|e| ArchiveError::Instrumentation {
                    class: class.clone(),
                    message: format!("{e:#}"),
                })?;
            rewritten.insert(entry, out);
        }

        let target = output_path(work_dir, &self.path, self.rename, self.app.as_deref());
        repackage(bytes, &rewritten, &target)?;
        info!(
            path = %self.path.display(),
            target = %target.display(),
            classes = rewritten.len(),
            "Instrumented archive written"
        );
        Ok(target)
    }
}

/// Only plain components, so joining onto the container cannot leave it.
fn stays_inside(entry: &Path) -> bool {
    entry
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Class constructs plus one package construct per package, whose digest
/// covers the sorted digests of its classes.
fn constructs(classes: BTreeMap<String, String>) -> Vec<Construct> {
    let mut packages: BTreeMap<String, Sha256> = BTreeMap::new();
    for (class, digest) in &classes {
        if let Some((package, _)) = class.rsplit_once('.') {
            packages
                .entry(package.to_string())
                .or_default()
                .update(format!("{}={}\n", class, digest).as_bytes());
        }
    }

    let mut out: Vec<Construct> = packages
        .into_iter()
        .map(|(name, hasher)| Construct {
            kind: ConstructKind::Package,
            name,
            digest: format!("{:x}", hasher.finalize()),
        })
        .collect();
    out.extend(classes.into_iter().map(|(name, digest)| Construct {
        kind: ConstructKind::Class,
        name,
        digest,
    }));
    out
}
