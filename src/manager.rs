//! Concurrent, deduplicated analysis of many archives.
//!
//! The [`AnalysisManager`] keeps an arena of analyzers keyed by archive path.
//! Each call to [`analyze`](AnalysisManager::analyze) extends the classpath,
//! registers one analyzer per new path, runs them on a bounded pool and waits.
//! Nested archives reported by finished analyzers are scheduled in follow-up
//! rounds of the same call, so only the manager ever submits work.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::analyzer::instrument::{Instrumentor, Passthrough};
use crate::analyzer::ArchiveAnalyzer;
use crate::classpath::{jars_under, Classpath, ClasspathPolicy};
use crate::error::{AnalysisError, ArchiveError};
use crate::models::{Application, ArchiveKind, Dependency, FailureRecord, Progress};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

/// Stops the manager from waiting on its pool.
///
/// Tasks that already run are left to finish in the background; tasks still
/// queued for a pool slot skip their work.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    async fn interrupted(&self) {
        let notified = self.notify.notified();
        if self.is_interrupted() {
            return;
        }
        notified.await;
    }
}

/// An archive waiting for an analyzer. Nested archives carry their bytes.
struct Pending {
    path: PathBuf,
    bytes: Option<Vec<u8>>,
    parent: Option<PathBuf>,
}

enum Waited {
    Interrupted,
    TimedOut,
    Drained,
    Joined(Result<(tokio::task::Id, Result<(), ArchiveError>), tokio::task::JoinError>),
}

pub struct AnalysisManager {
    permits: Arc<Semaphore>,
    instrument: bool,
    rename: bool,
    app: Option<Arc<Application>>,
    work_dir: Option<PathBuf>,
    temp_root: Option<PathBuf>,
    lib_dir: Option<PathBuf>,
    include_dir: Option<PathBuf>,
    dependencies: HashMap<PathBuf, Dependency>,
    classpath: Classpath,
    classpath_policy: ClasspathPolicy,
    poll_interval: Duration,
    instrumentor: Arc<dyn Instrumentor>,
    progress: Option<ProgressFn>,
    interrupt: InterruptHandle,
    interrupted: bool,
    analyzers: BTreeMap<PathBuf, Arc<ArchiveAnalyzer>>,
    failures: Vec<FailureRecord>,
    count: usize,
}

impl AnalysisManager {
    pub fn new(pool_size: usize, instrument: bool, app: Option<Application>) -> Self {
        AnalysisManager {
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
            instrument,
            rename: false,
            app: app.map(Arc::new),
            work_dir: None,
            temp_root: None,
            lib_dir: None,
            include_dir: None,
            dependencies: HashMap::new(),
            classpath: Classpath::new(),
            classpath_policy: ClasspathPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            instrumentor: Arc::new(Passthrough),
            progress: None,
            interrupt: InterruptHandle::default(),
            interrupted: false,
            analyzers: BTreeMap::new(),
            failures: Vec::new(),
            count: 0,
        }
    }

    /// Set the directory for instrumented archives, creating it on request.
    /// A creation failure is logged; instrumentation will then fail per archive.
    pub fn set_work_dir(&mut self, path: &Path, create: bool) {
        if create {
            if let Err(e) = std::fs::create_dir_all(path) {
                error!(dir = %path.display(), error = %e, "Error while creating work dir");
            }
        }
        info!(dir = %path.display(), "Work dir set");
        self.work_dir = Some(path.to_path_buf());
    }

    /// Parent of the temporary work directory created when none is set.
    pub fn set_temp_root(&mut self, path: &Path) {
        self.temp_root = Some(path.to_path_buf());
    }

    pub fn set_lib_dir(&mut self, path: &Path) {
        info!(dir = %path.display(), "Lib dir set");
        self.lib_dir = Some(path.to_path_buf());
    }

    pub fn set_include_dir(&mut self, path: &Path) {
        info!(dir = %path.display(), "Include dir set");
        self.include_dir = Some(path.to_path_buf());
    }

    /// Rename instrumented archives, see
    /// [`output_name`](crate::analyzer::instrument::output_name).
    pub fn set_rename(&mut self, rename: bool) {
        self.rename = rename;
    }

    /// Coordinates attached to the analyzers of matching paths.
    pub fn set_dependencies(&mut self, dependencies: HashMap<PathBuf, Dependency>) {
        self.dependencies = dependencies;
    }

    pub fn set_classpath_policy(&mut self, policy: ClasspathPolicy) {
        self.classpath_policy = policy;
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn set_instrumentor(&mut self, instrumentor: Arc<dyn Instrumentor>) {
        self.instrumentor = instrumentor;
    }

    pub fn on_progress(&mut self, callback: impl Fn(Progress) + Send + Sync + 'static) {
        self.progress = Some(Arc::new(callback));
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    pub fn classpath(&self) -> &Classpath {
        &self.classpath
    }

    /// Archives of a supported kind dispatched by the last call, nested ones included.
    pub fn analyzed_count(&self) -> usize {
        self.count
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Whether the last call stopped waiting because of an interrupt.
    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Analyze every path mapped to `None`; paths that already have an analyzer
    /// are merged into the arena as they are.
    pub async fn schedule_if_absent(
        &mut self,
        paths: HashMap<PathBuf, Option<Arc<ArchiveAnalyzer>>>,
        parent: Option<&Path>,
    ) -> Result<(), AnalysisError> {
        let total = paths.len();
        let mut not_yet_analyzed = Vec::new();
        for (path, analyzer) in paths {
            match analyzer {
                Some(analyzer) => {
                    self.analyzers.insert(path, analyzer);
                }
                None => not_yet_analyzed.push(path),
            }
        }

        if not_yet_analyzed.is_empty() {
            info!(
                analyzed = self.analyzers.len(),
                total, "All archives have been analyzed already"
            );
            return Ok(());
        }

        not_yet_analyzed.sort();
        info!(
            analyzed = self.analyzers.len(),
            total,
            remaining = not_yet_analyzed.len(),
            "Some archives were analyzed already, analyzing the remaining ones now"
        );
        self.analyze(&not_yet_analyzed, parent).await
    }

    /// Analyze the given archives and everything nested in them.
    ///
    /// Only a work directory that cannot be created fails the call. Problems
    /// with single archives end up in [`failures`](Self::failures).
    pub async fn analyze(
        &mut self,
        paths: &[PathBuf],
        parent: Option<&Path>,
    ) -> Result<(), AnalysisError> {
        self.count = 0;
        self.interrupted = false;
        self.interrupt.reset();

        let mut pending: Vec<Pending> = paths
            .iter()
            .map(|p| Pending {
                path: p.clone(),
                bytes: None,
                parent: parent.map(Path::to_path_buf),
            })
            .collect();

        while !pending.is_empty() {
            let submitted = self.run_round(pending).await?;
            if self.interrupted {
                break;
            }
            pending = submitted
                .iter()
                .flat_map(|analyzer| {
                    analyzer.take_nested().into_iter().map(move |nested| Pending {
                        path: nested.path,
                        bytes: Some(nested.bytes),
                        parent: Some(analyzer.path().to_path_buf()),
                    })
                })
                .collect();
            if !pending.is_empty() {
                debug!(nested = pending.len(), "Scheduling nested archives");
            }
        }

        info!(count = self.count, "A total of [{}] archives analyzed", self.count);
        Ok(())
    }

    async fn run_round(&mut self, pending: Vec<Pending>) -> Result<Vec<Arc<ArchiveAnalyzer>>, AnalysisError> {
        let classpath_issues = self.extend_classpath(&pending);

        if self.instrument && self.work_dir.is_none() {
            let dir = match &self.temp_root {
                Some(root) => tempfile::Builder::new().prefix("jar_analysis_").tempdir_in(root),
                None => tempfile::Builder::new().prefix("jar_analysis_").tempdir(),
            }
            .map_err(AnalysisError::WorkDir)?;
            let dir = dir.keep();
            info!(dir = %dir.display(), "Created temporary work dir");
            self.work_dir = Some(dir);
        }

        // Workers get a frozen copy; the manager keeps accumulating.
        let classpath = Arc::new(self.classpath.clone());
        let mut tasks = JoinSet::new();
        let mut task_paths = HashMap::new();
        let mut submitted = Vec::new();

        for item in pending {
            let Some(kind) = ArchiveKind::from_path(&item.path) else {
                warn!(path = %item.path.display(), "File extension not supported (only JAR, WAR, AAR)");
                continue;
            };
            if self.analyzers.contains_key(&item.path) {
                debug!(path = %item.path.display(), "Archive already registered, skipping");
                continue;
            }
            self.count += 1;

            let issue = match self.classpath_policy {
                ClasspathPolicy::FailInstrumentation if self.instrument => {
                    classpath_issues.get(&item.path).cloned()
                }
                _ => None,
            };

            // Files on disk are read by the worker, not here
            let analyzer = match item.bytes {
                Some(bytes) => ArchiveAnalyzer::new(item.path.clone(), kind, bytes),
                None => ArchiveAnalyzer::from_file(item.path.clone(), kind),
            };
            let analyzer = Arc::new(
                analyzer
                    .with_instrument(self.instrument)
                    .with_rename(self.rename)
                    .with_work_dir(self.work_dir.clone())
                    .with_include_dir(self.include_dir.clone())
                    .with_parent(item.parent)
                    .with_dependency(self.dependencies.get(&item.path).cloned())
                    .with_app(self.app.clone())
                    .with_classpath(Arc::clone(&classpath))
                    .with_classpath_issue(issue)
                    .with_instrumentor(Arc::clone(&self.instrumentor)),
            );
            self.analyzers.insert(item.path.clone(), Arc::clone(&analyzer));

            let permits = Arc::clone(&self.permits);
            let interrupt = self.interrupt.clone();
            let task = Arc::clone(&analyzer);
            let handle = tasks.spawn(async move {
                let permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(ArchiveError::Cancelled),
                };
                if interrupt.is_interrupted() {
                    return Err(ArchiveError::Cancelled);
                }
                let outcome = tokio::task::spawn_blocking(move || task.run())
                    .await
                    .unwrap_or_else(|e| Err(ArchiveError::Task(e.to_string())));
                drop(permit);
                outcome
            });
            task_paths.insert(handle.id(), item.path);
            submitted.push(analyzer);
        }

        self.wait(tasks, task_paths).await;
        Ok(submitted)
    }

    /// Add the archives of this round and the extra library jars to the
    /// classpath. Returns the archives whose entry could not be added.
    fn extend_classpath(&mut self, pending: &[Pending]) -> HashMap<PathBuf, String> {
        let mut issues = HashMap::new();
        for item in pending {
            if let Err(e) = self.classpath.insert(&item.path) {
                // Harmless unless instrumentation needs to resolve symbols
                error!(path = %item.path.display(), error = %e, "Error while updating the classpath");
                issues.insert(item.path.clone(), e.to_string());
            }
        }

        if let Some(lib_dir) = self.lib_dir.as_deref().filter(|d| d.exists()) {
            for jar in jars_under(lib_dir) {
                if let Err(e) = self.classpath.insert(&jar) {
                    error!(
                        lib = %lib_dir.display(),
                        error = %e,
                        "Error while updating the classpath from lib dir"
                    );
                }
            }
        }
        issues
    }

    async fn wait(
        &mut self,
        mut tasks: JoinSet<Result<(), ArchiveError>>,
        task_paths: HashMap<tokio::task::Id, PathBuf>,
    ) {
        let interrupt = self.interrupt.clone();
        let poll_interval = self.poll_interval;
        let total = tasks.len();
        let mut completed = 0;

        while !tasks.is_empty() {
            let event = tokio::select! {
                biased;
                _ = interrupt.interrupted() => Waited::Interrupted,
                joined = tokio::time::timeout(poll_interval, tasks.join_next_with_id()) => match joined {
                    Err(_) => Waited::TimedOut,
                    Ok(None) => Waited::Drained,
                    Ok(Some(joined)) => Waited::Joined(joined),
                },
            };

            match event {
                Waited::Interrupted => {
                    error!(outstanding = tasks.len(), "Interrupted while waiting for analysis threads");
                    self.interrupted = true;
                    tasks.detach_all();
                    break;
                }
                Waited::TimedOut => {
                    info!(outstanding = tasks.len(), "Wait for the completion of analysis threads ...");
                }
                Waited::Drained => break,
                Waited::Joined(Ok((_, Ok(())))) => completed += 1,
                Waited::Joined(Ok((id, Err(e)))) => {
                    completed += 1;
                    let path = task_paths.get(&id).cloned().unwrap_or_default();
                    error!(path = %path.display(), error = %e, "Error while analyzing archive");
                    self.failures.push(e.into_record(path));
                }
                Waited::Joined(Err(e)) => {
                    completed += 1;
                    let path = task_paths.get(&e.id()).cloned().unwrap_or_default();
                    error!(path = %path.display(), error = %e, "Analysis task failed");
                    self.failures.push(ArchiveError::Task(e.to_string()).into_record(path));
                }
            }
            if let Some(progress) = &self.progress {
                progress(Progress { completed, total });
            }
        }
    }

    /// Every registered analyzer plus all archives nested in them, once each.
    pub fn aggregated_analyzers(&self) -> Vec<Arc<ArchiveAnalyzer>> {
        let mut seen: HashSet<&Path> = HashSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<&Path> = self.analyzers.keys().rev().map(PathBuf::as_path).collect();

        while let Some(path) = stack.pop() {
            if !seen.insert(path) {
                continue;
            }
            if let Some(analyzer) = self.analyzers.get(path) {
                out.push(Arc::clone(analyzer));
                stack.extend(analyzer.children().iter().rev().map(PathBuf::as_path));
            }
        }
        out
    }

    /// First analyzer (in path order) whose path ends with `suffix`.
    pub fn find_by_suffix(&self, suffix: &Path) -> Option<Arc<ArchiveAnalyzer>> {
        self.analyzers
            .iter()
            .find(|(path, _)| path.ends_with(suffix))
            .map(|(_, analyzer)| Arc::clone(analyzer))
    }

    pub fn get(&self, path: &Path) -> Option<Arc<ArchiveAnalyzer>> {
        self.analyzers.get(path).cloned()
    }

    /// Analyzers for the `Class-Path` references in the manifest of `path`.
    pub fn resolve_class_path(&self, path: &Path) -> Vec<Arc<ArchiveAnalyzer>> {
        let Some(contents) = self.analyzers.get(path).and_then(|a| a.contents()) else {
            return Vec::new();
        };
        contents
            .manifest
            .class_path()
            .iter()
            .filter_map(|reference| self.find_by_suffix(Path::new(reference)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath::Classpath;
    use crate::models::FailureKind;
    use crate::testutil::{archive_bytes, read_entry, write_archive};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn jar(dir: &Path, name: &str, class: &str) -> PathBuf {
        write_archive(dir, name, &[(class, b"bytecode".as_slice())])
    }

    #[tokio::test]
    async fn test_mixed_extensions() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "A.jar", "a/A.class");
        let b = write_archive(
            dir.path(),
            "B.war",
            &[("WEB-INF/classes/b/B.class", b"b".as_slice())],
        );
        let c = dir.path().join("C.txt");
        std::fs::write(&c, b"text").unwrap();

        let mut manager = AnalysisManager::new(2, false, None);
        manager.analyze(&[a.clone(), b.clone(), c.clone()], None).await.unwrap();

        assert_eq!(manager.analyzed_count(), 2);
        assert!(manager.get(&a).unwrap().is_analyzed());
        assert!(manager.get(&b).unwrap().is_analyzed());
        assert!(manager.get(&c).is_none());
        assert_eq!(manager.aggregated_analyzers().len(), 2);
        assert!(manager.failures().is_empty());
    }

    #[tokio::test]
    async fn test_nested_archive_is_a_child() {
        let dir = TempDir::new().unwrap();
        let inner = archive_bytes(&[("d/D.class", b"d".as_slice())]);
        let a = write_archive(
            dir.path(),
            "A.jar",
            &[("a/A.class", b"a".as_slice()), ("lib/D.jar", inner.as_slice())],
        );

        let mut manager = AnalysisManager::new(2, false, None);
        manager.analyze(&[a.clone()], None).await.unwrap();

        let d = manager.find_by_suffix(Path::new("D.jar")).unwrap();
        assert_eq!(d.parent(), Some(a.as_path()));
        assert!(d.is_analyzed());
        assert_eq!(manager.analyzed_count(), 2);

        let all = manager.aggregated_analyzers();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|x| x.path() == a));
        assert!(all.iter().any(|x| x.path() == d.path()));
    }

    #[tokio::test]
    async fn test_deeply_nested_closure() {
        let dir = TempDir::new().unwrap();
        let leaf = archive_bytes(&[("l/L.class", b"l".as_slice())]);
        let lib = archive_bytes(&[("m/M.class", b"m".as_slice()), ("inner/leaf.jar", leaf.as_slice())]);
        let war = write_archive(dir.path(), "app.war", &[("WEB-INF/lib/mid.jar", lib.as_slice())]);

        let mut manager = AnalysisManager::new(1, false, None);
        manager.analyze(&[war.clone()], None).await.unwrap();

        let leaf = manager.find_by_suffix(Path::new("leaf.jar")).unwrap();
        let mid = manager.find_by_suffix(Path::new("WEB-INF/lib/mid.jar")).unwrap();
        assert_eq!(leaf.parent(), Some(mid.path()));
        assert_eq!(mid.parent(), Some(war.as_path()));

        let all = manager.aggregated_analyzers();
        assert_eq!(all.len(), 3);
        let unique: HashSet<&Path> = all.iter().map(|a| a.path()).collect();
        assert_eq!(unique.len(), 3);
    }

    #[tokio::test]
    async fn test_schedule_if_absent_skips_known() {
        let dir = TempDir::new().unwrap();
        let known = jar(dir.path(), "known.jar", "k/K.class");
        let fresh = jar(dir.path(), "fresh.jar", "f/F.class");

        let sentinel = Arc::new(ArchiveAnalyzer::new(known.clone(), ArchiveKind::Plain, Vec::new()));
        let mut paths = HashMap::new();
        paths.insert(known.clone(), Some(Arc::clone(&sentinel)));
        paths.insert(fresh.clone(), None);

        let mut manager = AnalysisManager::new(2, false, None);
        manager.schedule_if_absent(paths, None).await.unwrap();

        assert_eq!(manager.analyzed_count(), 1);
        let stored = manager.get(&known).unwrap();
        assert!(Arc::ptr_eq(&stored, &sentinel));
        assert!(!stored.is_analyzed());
        assert!(manager.get(&fresh).unwrap().is_analyzed());
    }

    #[tokio::test]
    async fn test_schedule_if_absent_noop_when_all_known() {
        let mut manager = AnalysisManager::new(1, false, None);
        let path = PathBuf::from("/nowhere/x.jar");
        let sentinel = Arc::new(ArchiveAnalyzer::new(path.clone(), ArchiveKind::Plain, Vec::new()));
        let mut paths = HashMap::new();
        paths.insert(path.clone(), Some(sentinel));

        manager.schedule_if_absent(paths, None).await.unwrap();
        assert_eq!(manager.analyzed_count(), 0);
        assert!(manager.classpath().is_empty());
        assert!(manager.get(&path).is_some());
    }

    #[tokio::test]
    async fn test_same_path_is_never_analyzed_twice() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "A.jar", "a/A.class");

        let mut manager = AnalysisManager::new(2, false, None);
        manager.analyze(&[a.clone()], None).await.unwrap();
        let first = manager.get(&a).unwrap();

        manager.analyze(&[a.clone()], None).await.unwrap();
        assert_eq!(manager.analyzed_count(), 0);
        assert!(Arc::ptr_eq(&first, &manager.get(&a).unwrap()));
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let good = jar(dir.path(), "good.jar", "g/G.class");
        let corrupt = dir.path().join("corrupt.jar");
        std::fs::write(&corrupt, b"this is not a zip").unwrap();
        let missing = dir.path().join("missing.jar");

        let mut manager = AnalysisManager::new(2, false, None);
        manager
            .analyze(&[good.clone(), corrupt.clone(), missing.clone()], None)
            .await
            .unwrap();

        assert!(manager.get(&good).unwrap().is_analyzed());
        assert!(!manager.get(&corrupt).unwrap().is_analyzed());
        assert!(!manager.get(&missing).unwrap().is_analyzed());
        assert_eq!(manager.analyzed_count(), 3);

        let kinds: HashMap<&Path, FailureKind> = manager
            .failures()
            .iter()
            .map(|f| (f.path.as_path(), f.kind))
            .collect();
        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[corrupt.as_path()], FailureKind::Archive);
        assert_eq!(kinds[missing.as_path()], FailureKind::Read);
    }

    #[tokio::test]
    async fn test_parent_and_dependency_are_attached() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "A.jar", "a/A.class");
        let owner = dir.path().join("owner.war");

        let mut deps = HashMap::new();
        deps.insert(a.clone(), Dependency::new("org.acme", "a", "1.0"));

        let mut manager = AnalysisManager::new(1, false, None);
        manager.set_dependencies(deps);
        manager.analyze(&[a.clone()], Some(&owner)).await.unwrap();

        let analyzer = manager.get(&a).unwrap();
        assert_eq!(analyzer.parent(), Some(owner.as_path()));
        assert_eq!(analyzer.dependency().unwrap().coordinates(), "org.acme:a:1.0");
    }

    #[tokio::test]
    async fn test_classpath_includes_inputs_and_lib_dir() {
        let dir = TempDir::new().unwrap();
        let libs = TempDir::new().unwrap();
        std::fs::create_dir_all(libs.path().join("nested")).unwrap();
        let extra = jar(&libs.path().join("nested"), "extra.jar", "e/E.class");
        let a = jar(dir.path(), "A.jar", "a/A.class");

        let mut manager = AnalysisManager::new(1, false, None);
        manager.set_lib_dir(libs.path());
        manager.analyze(&[a.clone()], None).await.unwrap();

        assert!(manager.classpath().contains(&a));
        assert!(manager.classpath().contains(&extra));
        // lib jars land on the classpath only; they are not analyzed
        assert!(manager.get(&extra).is_none());
    }

    #[tokio::test]
    async fn test_instrumentation_creates_temp_work_dir() {
        let root = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "lib.jar", "p/A.class");

        let mut manager = AnalysisManager::new(1, true, Some(Application::new("g", "a", "1.0")));
        manager.set_temp_root(root.path());
        manager.set_rename(true);
        manager.analyze(&[a.clone()], None).await.unwrap();

        let work_dir = manager.work_dir().unwrap().to_path_buf();
        assert!(work_dir.starts_with(root.path()));
        let target = manager.get(&a).unwrap().contents().unwrap().instrumented.clone().unwrap();
        assert!(target.starts_with(&work_dir));
        assert_eq!(target.file_name().unwrap(), "lib-vulas-g-a-1.0.jar");
        assert!(target.exists());
        assert!(manager.failures().is_empty());
    }

    #[tokio::test]
    async fn test_same_file_names_get_distinct_outputs() {
        let dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("x")).unwrap();
        std::fs::create_dir_all(dir.path().join("y")).unwrap();
        let a = jar(&dir.path().join("x"), "lib.jar", "x/A.class");
        let b = jar(&dir.path().join("y"), "lib.jar", "y/B.class");

        let mut manager = AnalysisManager::new(2, true, None);
        manager.set_work_dir(work.path(), false);
        manager.set_rename(true);
        manager.analyze(&[a.clone(), b.clone()], None).await.unwrap();

        let out_a = manager.get(&a).unwrap().contents().unwrap().instrumented.clone().unwrap();
        let out_b = manager.get(&b).unwrap().contents().unwrap().instrumented.clone().unwrap();
        assert_ne!(out_a, out_b);
        assert_eq!(read_entry(&std::fs::read(&out_a).unwrap(), "x/A.class"), b"bytecode");
        assert_eq!(read_entry(&std::fs::read(&out_b).unwrap(), "y/B.class"), b"bytecode");
        assert!(manager.failures().is_empty());
    }

    #[tokio::test]
    async fn test_nested_entry_cannot_claim_another_archive() {
        let dir = TempDir::new().unwrap();
        let victim = jar(dir.path(), "victim.jar", "real/Real.class");
        let fake = archive_bytes(&[("evil/Fake.class", b"x".as_slice())]);
        let entry = victim.to_string_lossy().into_owned();
        let attacker = write_archive(dir.path(), "attacker.jar", &[(entry.as_str(), fake.as_slice())]);

        let mut manager = AnalysisManager::new(1, false, None);
        manager.analyze(&[attacker.clone()], None).await.unwrap();
        assert!(manager.get(&victim).is_none());
        assert_eq!(manager.aggregated_analyzers().len(), 1);

        manager.analyze(&[victim.clone()], None).await.unwrap();
        assert_eq!(manager.analyzed_count(), 1);
        let analyzer = manager.get(&victim).unwrap();
        assert_eq!(analyzer.parent(), None);
        let names: Vec<&str> = analyzer
            .contents()
            .unwrap()
            .constructs
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert!(names.contains(&"real.Real"));
        assert!(!names.contains(&"evil.Fake"));
    }

    #[tokio::test]
    async fn test_work_dir_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("file");
        std::fs::write(&not_a_dir, b"").unwrap();
        let a = jar(dir.path(), "A.jar", "a/A.class");

        let mut manager = AnalysisManager::new(1, true, None);
        manager.set_temp_root(&not_a_dir);
        let err = manager.analyze(&[a.clone()], None).await.unwrap_err();

        assert!(matches!(err, AnalysisError::WorkDir(_)));
        assert!(manager.get(&a).is_none());
        assert_eq!(manager.analyzed_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_classpath_policy() {
        let dir = TempDir::new().unwrap();
        // ':' separates classpath entries, so this archive cannot be added
        let odd = jar(dir.path(), "odd:name.jar", "p/A.class");

        let work = TempDir::new().unwrap();
        let mut lenient = AnalysisManager::new(1, true, None);
        lenient.set_work_dir(work.path(), false);
        lenient.analyze(&[odd.clone()], None).await.unwrap();
        assert!(lenient.failures().is_empty());
        assert!(lenient.get(&odd).unwrap().contents().unwrap().instrumented.is_some());

        let work = TempDir::new().unwrap();
        let mut strict = AnalysisManager::new(1, true, None);
        strict.set_work_dir(work.path(), false);
        strict.set_classpath_policy(ClasspathPolicy::FailInstrumentation);
        strict.analyze(&[odd.clone()], None).await.unwrap();
        assert_eq!(strict.failures().len(), 1);
        assert_eq!(strict.failures()[0].kind, FailureKind::Classpath);
        let analyzer = strict.get(&odd).unwrap();
        assert!(analyzer.is_analyzed());
        assert!(analyzer.contents().unwrap().instrumented.is_none());
    }

    #[tokio::test]
    async fn test_resolve_manifest_class_path() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        let dep = jar(&dir.path().join("lib"), "dep.jar", "d/D.class");
        let app = write_archive(
            dir.path(),
            "app.jar",
            &[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\nClass-Path: lib/dep.jar absent.jar\n".as_slice())],
        );

        let mut manager = AnalysisManager::new(2, false, None);
        manager.analyze(&[app.clone(), dep.clone()], None).await.unwrap();

        let resolved = manager.resolve_class_path(&app);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].path(), dep.as_path());
    }

    struct Gate {
        reached: mpsc::UnboundedSender<()>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl Instrumentor for Gate {
        fn instrument(&self, class: &str, bytecode: &[u8], _cp: &Classpath) -> anyhow::Result<Vec<u8>> {
            if class == "s.Slow" {
                let _ = self.reached.send(());
                let _ = self.release.lock().unwrap().recv();
            }
            Ok(bytecode.to_vec())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_interrupt_returns_completed_snapshot() {
        let dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let fast = jar(dir.path(), "fast.jar", "f/Fast.class");
        let slow = jar(dir.path(), "slow.jar", "s/Slow.class");

        let (reached_tx, mut reached_rx) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

        let mut manager = AnalysisManager::new(2, true, None);
        manager.set_work_dir(work.path(), false);
        manager.set_poll_interval(Duration::from_millis(20));
        manager.set_instrumentor(Arc::new(Gate {
            reached: reached_tx,
            release: Mutex::new(release_rx),
        }));
        manager.on_progress(move |p| {
            let _ = progress_tx.send(p);
        });
        let interrupt = manager.interrupt_handle();

        let paths = vec![fast.clone(), slow.clone()];
        let run = tokio::spawn(async move {
            let result = manager.analyze(&paths, None).await;
            (manager, result)
        });

        reached_rx.recv().await.unwrap();
        loop {
            let progress = progress_rx.recv().await.unwrap();
            if progress.completed == 1 {
                break;
            }
        }
        interrupt.interrupt();

        let (manager, result) = run.await.unwrap();
        assert!(result.is_ok());
        assert!(manager.was_interrupted());
        assert!(manager.get(&fast).unwrap().is_analyzed());
        assert!(!manager.get(&slow).unwrap().is_analyzed());
        assert!(manager.failures().is_empty());

        // the slow task was never killed; let it finish in the background
        release_tx.send(()).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_progress_reported_on_poll_interval() {
        let dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let slow = jar(dir.path(), "slow.jar", "s/Slow.class");

        let (reached_tx, mut reached_rx) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

        let mut manager = AnalysisManager::new(1, true, None);
        manager.set_work_dir(work.path(), false);
        manager.set_poll_interval(Duration::from_millis(20));
        manager.set_instrumentor(Arc::new(Gate {
            reached: reached_tx,
            release: Mutex::new(release_rx),
        }));
        manager.on_progress(move |p| {
            let _ = progress_tx.send(p);
        });

        let paths = vec![slow.clone()];
        let run = tokio::spawn(async move {
            let result = manager.analyze(&paths, None).await;
            (manager, result)
        });

        reached_rx.recv().await.unwrap();
        // the task is held, so only poll intervals can report
        let progress = progress_rx.recv().await.unwrap();
        assert_eq!(progress, Progress { completed: 0, total: 1 });
        release_tx.send(()).unwrap();

        let (manager, result) = run.await.unwrap();
        assert!(result.is_ok());
        assert!(manager.get(&slow).unwrap().is_analyzed());

        let mut last = progress;
        while let Ok(p) = progress_rx.try_recv() {
            last = p;
        }
        assert_eq!(last, Progress { completed: 1, total: 1 });
    }

    #[tokio::test]
    async fn test_progress_reports_every_completion() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "A.jar", "a/A.class");
        let b = jar(dir.path(), "B.jar", "b/B.class");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut manager = AnalysisManager::new(2, false, None);
        manager.on_progress(move |p| sink.lock().unwrap().push(p));
        manager.analyze(&[a, b], None).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&Progress { completed: 2, total: 2 }));
    }
}
