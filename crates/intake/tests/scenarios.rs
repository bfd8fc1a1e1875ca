use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tagdrop_config::{Config, DuplicatePolicy, ReadinessConfig};
use tagdrop_intake::{
    ContextStore, EventKind, IntakeEvent, ManualClock, MoveOutcome, Pipeline, Readiness, ReadinessProbe, Verdict,
};
use tagdrop_storage::backend::{FileInfoStream, LocalBackend, StorageBackend};
use tagdrop_storage::error::{ErrorKind as StorageErrorKind, Result as StorageResult};
use tagdrop_storage::BackendHandle;
use tempfile::TempDir;
use time::macros::datetime;

/// Delegates to another probe and counts how often it was asked.
struct Counting {
    inner: Arc<dyn Readiness>,
    calls: AtomicUsize,
}
impl Counting {
    fn ready() -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(ReadinessProbe::new(Duration::from_millis(5), Duration::from_secs(2), 1)),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
#[async_trait]
impl Readiness for Counting {
    async fn is_ready(&self, path: &Path) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.is_ready(path).await
    }
}

/// A local backend with selected write operations failing.
struct Faulty {
    inner: LocalBackend,
    delete_fails: bool,
    import_fails: bool,
}
impl Faulty {
    fn handle(root: &Path, delete_fails: bool, import_fails: bool) -> BackendHandle {
        Arc::new(Self {
            inner: LocalBackend::new("output", root).unwrap(),
            delete_fails,
            import_fails,
        })
    }
}
#[async_trait]
impl StorageBackend for Faulty {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream(&self, recursive: bool) -> FileInfoStream<'_> {
        self.inner.list_stream(recursive)
    }

    async fn exists(&self, path: &Path) -> StorageResult<bool> {
        self.inner.exists(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        self.inner.create_dir_all(path).await
    }

    async fn delete(&self, path: &Path) -> StorageResult<()> {
        if self.delete_fails {
            exn::bail!(StorageErrorKind::PermissionDenied(path.to_path_buf()));
        }
        self.inner.delete(path).await
    }

    async fn import(&self, source: &Path, to: &Path) -> StorageResult<()> {
        if self.import_fails {
            exn::bail!(StorageErrorKind::PermissionDenied(to.to_path_buf()));
        }
        self.inner.import(source, to).await
    }
}

struct World {
    intake: TempDir,
    output: TempDir,
    clock: Arc<ManualClock>,
    probe: Arc<Counting>,
    pipeline: Pipeline,
}
impl World {
    fn new(edit: impl FnOnce(&mut Config)) -> Self {
        Self::build(edit, |root| -> BackendHandle { Arc::new(LocalBackend::new("output", root).unwrap()) })
    }

    fn build(edit: impl FnOnce(&mut Config), backend: impl FnOnce(&Path) -> BackendHandle) -> Self {
        let intake = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let mut config = Config {
            intake_dir: intake.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            ..Config::default()
        };
        edit(&mut config);
        let config = config.finalize().unwrap();

        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 09:30:00 UTC)));
        let context = Arc::new(ContextStore::new(clock.clone(), config.fallback_label.clone()));
        let probe = Counting::ready();
        let pipeline = Pipeline::new(config, context, backend(output.path())).unwrap().with_readiness(probe.clone());
        Self { intake, output, clock, probe, pipeline }
    }

    fn drop_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.intake.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    async fn ingest(&self, path: &Path) -> MoveOutcome {
        self.pipeline.ingest(IntakeEvent::new(path, EventKind::Created)).await
    }

    fn output_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, root: &Path, found: &mut Vec<PathBuf>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(&path, root, found);
                } else {
                    found.push(path.strip_prefix(root).unwrap().to_path_buf());
                }
            }
        }
        let mut found = Vec::new();
        walk(self.output.path(), self.output.path(), &mut found);
        found.sort();
        found
    }
}

#[tokio::test]
async fn scenario_a_fresh_label_is_applied() {
    let world = World::new(|c| c.context_ttl = 180);
    world.pipeline.context().set("Team Chat");
    world.clock.advance(Duration::from_secs(10));
    let source = world.drop_file("photo.jpg", b"jpeg");

    let outcome = world.ingest(&source).await;

    let expected = world.output.path().join("Team Chat/images/202405010930__Team Chat__images__photo.jpg");
    assert_eq!(outcome.verdict, Verdict::Moved);
    assert_eq!(outcome.destination.as_deref(), Some(expected.as_path()));
    assert_eq!(outcome.label.as_deref(), Some("Team Chat"));
    assert_eq!(outcome.category.as_deref(), Some("images"));
    assert_eq!(outcome.size, 4);
    assert_eq!(std::fs::read(&expected).unwrap(), b"jpeg");
    assert!(!source.exists());
    assert_eq!(
        outcome.to_string(),
        format!("MOVED {} -> {}", source.display(), expected.display())
    );
}

#[tokio::test]
async fn scenario_b_stale_label_falls_back() {
    let world = World::new(|c| c.context_ttl = 5);
    world.pipeline.context().set("Team Chat");
    world.clock.advance(Duration::from_secs(10));
    let source = world.drop_file("photo.jpg", b"jpeg");

    let outcome = world.ingest(&source).await;

    assert!(outcome.is_moved(), "{outcome}");
    assert_eq!(outcome.label.as_deref(), Some("uncategorized"));
    assert_eq!(
        world.output_files(),
        vec![PathBuf::from("uncategorized/images/202405010930__uncategorized__images__photo.jpg")]
    );
}

#[tokio::test]
async fn scenario_c_ignored_extension_is_never_probed() {
    let world = World::new(|_| {});
    let source = world.drop_file("movie.mp4.crdownload", b"partial");

    let outcome = world.ingest(&source).await;

    assert_eq!(outcome.verdict, Verdict::Skipped("ignored extension .crdownload".to_string()));
    assert_eq!(world.probe.calls(), 0);
    assert!(source.exists());
    assert!(world.output_files().is_empty());
}

#[tokio::test]
async fn scenario_d_excluded_extension_has_its_own_reason() {
    let world = World::new(|c| c.excluded_extensions = vec![".EXE".to_string()]);
    let source = world.drop_file("setup.exe", b"MZ");

    let outcome = world.ingest(&source).await;

    assert_eq!(outcome.verdict, Verdict::Skipped("excluded extension .exe".to_string()));
    assert_ne!(outcome.reason(), Some("ignored extension .exe"));
    assert_eq!(world.probe.calls(), 0);
    assert!(source.exists());
    assert!(world.output_files().is_empty());
}

#[tokio::test]
async fn scenario_e_identical_names_are_both_kept() {
    let world = World::new(|c| c.duplicates = DuplicatePolicy::Rename);
    world.pipeline.context().set("Team Chat");
    let elsewhere = tempfile::tempdir().unwrap();
    let first = world.drop_file("report.pdf", b"first");
    let second = elsewhere.path().join("report.pdf");
    std::fs::write(&second, b"second").unwrap();

    assert!(world.ingest(&first).await.is_moved());
    assert!(world.ingest(&second).await.is_moved());

    let dir = world.output.path().join("Team Chat/documents");
    let name = "202405010930__Team Chat__documents__report";
    assert_eq!(std::fs::read(dir.join(format!("{name}.pdf"))).unwrap(), b"first");
    assert_eq!(std::fs::read(dir.join(format!("{name}(1).pdf"))).unwrap(), b"second");
    assert_eq!(world.output_files().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_f_growing_file_is_not_ready() {
    let mut world = World::new(|_| {});
    let probe = ReadinessProbe::from_config(&ReadinessConfig {
        interval_ms: 20,
        timeout_secs: 1,
        stable_polls: 3,
    });
    world.pipeline = world.pipeline.with_readiness(Arc::new(probe));
    let source = world.intake.path().join("stream.mkv");
    let mut file = std::fs::File::create(&source).unwrap();
    file.write_all(b"x").unwrap();
    let writer = std::thread::spawn(move || {
        for _ in 0..300 {
            file.write_all(b"growing").unwrap();
            file.flush().unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }
    });

    let outcome = world.ingest(&source).await;
    writer.join().unwrap();

    assert_eq!(outcome.verdict, Verdict::Skipped("not ready".to_string()));
    assert_eq!(outcome.to_string(), format!("SKIP not ready: {}", source.display()));
    assert!(source.exists());
    assert!(world.output_files().is_empty());
}

#[tokio::test]
async fn skip_policy_never_touches_the_existing_file() {
    let world = World::new(|c| {
        c.duplicates = DuplicatePolicy::Skip;
        c.template = "{original}".to_string();
    });
    let existing = world.output.path().join("uncategorized/documents/notes.txt");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, b"old").unwrap();
    let source = world.drop_file("notes.txt", b"new");

    let outcome = world.ingest(&source).await;

    assert!(outcome.is_skipped());
    assert!(outcome.reason().unwrap().starts_with("duplicate at"), "{outcome}");
    assert_eq!(std::fs::read(&existing).unwrap(), b"old");
    assert_eq!(std::fs::read(&source).unwrap(), b"new");
}

#[tokio::test]
async fn overwrite_policy_replaces_the_content() {
    let world = World::new(|c| {
        c.duplicates = DuplicatePolicy::Overwrite;
        c.template = "{original}".to_string();
    });
    let existing = world.output.path().join("uncategorized/documents/notes.txt");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, b"old").unwrap();
    let source = world.drop_file("notes.txt", b"new");

    let outcome = world.ingest(&source).await;

    assert!(outcome.is_moved(), "{outcome}");
    assert_eq!(std::fs::read(&existing).unwrap(), b"new");
    assert!(!source.exists());
    assert_eq!(world.output_files().len(), 1);
}

#[tokio::test]
async fn failed_overwrite_is_a_failure_and_leaves_the_source() {
    let world = World::build(
        |c| {
            c.duplicates = DuplicatePolicy::Overwrite;
            c.template = "{original}".to_string();
        },
        |root| Faulty::handle(root, true, false),
    );
    let existing = world.output.path().join("uncategorized/documents/notes.txt");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, b"old").unwrap();
    let source = world.drop_file("notes.txt", b"new");

    let outcome = world.ingest(&source).await;

    assert!(outcome.is_failed(), "{outcome}");
    assert!(outcome.reason().unwrap().contains("permission denied"), "{outcome}");
    assert_eq!(std::fs::read(&existing).unwrap(), b"old");
    assert_eq!(std::fs::read(&source).unwrap(), b"new");
}

#[tokio::test]
async fn rename_policy_suffixes_repeated_names() {
    let world = World::new(|c| c.template = "{original}".to_string());

    let first = world.drop_file("foo.txt", b"1");
    assert!(world.ingest(&first).await.is_moved());
    let second = world.drop_file("foo.txt", b"2");
    assert!(world.ingest(&second).await.is_moved());

    assert_eq!(
        world.output_files(),
        vec![
            PathBuf::from("uncategorized/documents/foo(1).txt"),
            PathBuf::from("uncategorized/documents/foo.txt"),
        ]
    );
}

#[tokio::test]
async fn failed_move_is_reported_and_leaves_the_source() {
    let world = World::build(
        |c| c.template = "{original}".to_string(),
        |root| Faulty::handle(root, false, true),
    );
    let source = world.drop_file("notes.txt", b"new");

    let outcome = world.ingest(&source).await;

    assert!(outcome.is_failed(), "{outcome}");
    assert!(outcome.reason().unwrap().starts_with("move failed: "), "{outcome}");
    assert_eq!(outcome.to_string(), format!("FAIL {}: {}", outcome.reason().unwrap(), source.display()));
    assert_eq!(std::fs::read(&source).unwrap(), b"new");
    assert!(world.output_files().is_empty());
}

#[tokio::test]
async fn source_removed_before_the_move_is_a_failure() {
    /// Reports ready, then lets the file disappear before the move.
    struct VanishesAfterProbe;
    #[async_trait]
    impl Readiness for VanishesAfterProbe {
        async fn is_ready(&self, path: &Path) -> bool {
            std::fs::remove_file(path).unwrap();
            true
        }
    }

    let mut world = World::new(|c| c.template = "{original}".to_string());
    world.pipeline = world.pipeline.with_readiness(Arc::new(VanishesAfterProbe));
    let source = world.drop_file("notes.txt", b"new");

    let outcome = world.ingest(&source).await;

    assert!(outcome.is_failed(), "{outcome}");
    assert!(outcome.reason().unwrap().starts_with("move failed: "), "{outcome}");
    assert!(world.output_files().is_empty());
}
