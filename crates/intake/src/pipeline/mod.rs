//! The per-event intake state machine.
//!
//! Every [`IntakeEvent`] walks the same steps, stopping at the first one
//! that rejects it:
//!
//! 1. **Filter**: ignored and excluded extensions, directories, vanished
//!    sources. No readiness probing happens for anything rejected here.
//! 2. **Readiness**: the file must stop changing before the timeout.
//! 3. **Context**: the captured label if still fresh, otherwise the fallback
//!    label; excluded labels stop here.
//! 4. **Classify**: extension to category; excluded categories stop here.
//! 5. **Resolve**: template, sanitize, duplicate policy.
//! 6. **Move**: into the output tree.
//!
//! Whatever happens, exactly one [`MoveOutcome`] comes out and is logged.
//! Per-file failures never propagate past [`Pipeline::ingest`].

mod dispatch;
mod event;
mod locks;
mod outcome;
mod sweep;

pub use self::dispatch::Dispatcher;
pub use self::event::{EventKind, IntakeEvent};
pub use self::outcome::{MoveOutcome, Verdict};
pub use self::sweep::{SweepEvent, sweep};

use self::locks::KeyedLocks;
use crate::classify::Classifier;
use crate::context::ContextStore;
use crate::error::{ErrorKind, Exclusion, Result};
use crate::readiness::{Readiness, ReadinessProbe};
use crate::report::{History, Statistics};
use crate::resolve::DestinationResolver;
use crate::sanitize::sanitize;
use exn::ResultExt;
use std::ffi::OsStr;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagdrop_config::{Config, normalize_extension};
use tagdrop_storage::{BackendHandle, validate_segment};

pub struct Pipeline {
    config: Config,
    context: Arc<ContextStore>,
    readiness: Arc<dyn Readiness>,
    classifier: Classifier,
    resolver: DestinationResolver,
    locks: KeyedLocks,
    statistics: Option<Arc<dyn Statistics>>,
    history: Option<Arc<dyn History>>,
}
impl Pipeline {
    /// Builds a pipeline moving files into `backend`, which must be rooted at
    /// the configured output directory.
    ///
    /// # Errors
    /// [`ErrorKind::Config`] if the naming template does not compile or uses
    /// an unknown placeholder.
    pub fn new(config: Config, context: Arc<ContextStore>, backend: BackendHandle) -> Result<Self> {
        let resolver = DestinationResolver::from_config(backend, &config)?;
        Ok(Self {
            readiness: Arc::new(ReadinessProbe::from_config(&config.readiness)),
            classifier: Classifier::from_config(&config),
            resolver,
            context,
            config,
            locks: KeyedLocks::default(),
            statistics: None,
            history: None,
        })
    }

    pub fn with_readiness(mut self, readiness: Arc<dyn Readiness>) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn with_statistics(mut self, statistics: Arc<dyn Statistics>) -> Self {
        self.statistics = Some(statistics);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn History>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &Arc<ContextStore> {
        &self.context
    }

    /// Processes one event to completion and reports how it ended.
    #[tracing::instrument(skip_all, fields(path = %event.path.display()))]
    pub async fn ingest(&self, event: IntakeEvent) -> MoveOutcome {
        let mut outcome = MoveOutcome::new(&event.path);
        if let Err(err) = self.process(&event.path, &mut outcome).await {
            let reason = err.deref().to_string();
            outcome.verdict = if err.is_skip() {
                Verdict::Skipped(reason)
            } else {
                Verdict::Failed(reason)
            };
            if outcome.is_failed() {
                tracing::warn!(kind = %event.kind, error = ?err, "{outcome}");
            } else {
                tracing::info!(kind = %event.kind, "{outcome}");
            }
            return outcome;
        }

        tracing::info!(kind = %event.kind, size = outcome.size, "{outcome}");
        if let (Some(label), Some(category), Some(destination)) =
            (&outcome.label, &outcome.category, &outcome.destination)
        {
            if let Some(statistics) = &self.statistics {
                statistics.record_file(label, category, outcome.size);
            }
            if let Some(history) = &self.history {
                history.record_move(&outcome.source, destination, label, category);
            }
        }
        outcome
    }

    async fn process(&self, path: &Path, outcome: &mut MoveOutcome) -> Result<()> {
        let extension = path.extension().and_then(OsStr::to_str).map(normalize_extension).unwrap_or_default();
        if self.config.ignored_extensions.contains(&extension) {
            exn::bail!(ErrorKind::Excluded(Exclusion::IgnoredExtension(extension)));
        }
        if self.config.excluded_extensions.contains(&extension) {
            exn::bail!(ErrorKind::Excluded(Exclusion::ExcludedExtension(extension)));
        }
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            exn::bail!(ErrorKind::Excluded(Exclusion::Directory));
        };
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_dir() => exn::bail!(ErrorKind::Excluded(Exclusion::Directory)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => exn::bail!(ErrorKind::Vanished),
            // Anything else is for the readiness probe to judge.
            _ => {},
        }

        if !self.readiness.is_ready(path).await {
            exn::bail!(ErrorKind::NotReady);
        }

        let context = self.context.get(self.config.context_ttl());
        let label = self.label_for(&context.label);
        outcome.label = Some(label.clone());
        if self.config.excluded_labels.iter().any(|l| sanitize(l, self.config.max_name_length) == label) {
            exn::bail!(ErrorKind::Excluded(Exclusion::Label(label)));
        }

        let category = self.classifier.category_for(&extension).to_string();
        outcome.category = Some(category.clone());
        if self.config.excluded_categories.contains(&category) {
            exn::bail!(ErrorKind::Excluded(Exclusion::Category(category)));
        }

        let original = sanitize(&file_name, self.config.max_name_length);
        outcome.size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);

        let directory = PathBuf::from(&label).join(&category);
        let _guard = self.locks.lock(&directory).await;
        let resolution = self.resolver.resolve(&label, &category, &original, context.captured_at).await?;
        if let Err(e) = self.resolver.backend().import(path, &resolution.path).await {
            let cause = e.deref().to_string();
            return Err(e).or_raise(|| ErrorKind::Move(cause.clone()));
        }
        outcome.destination = Some(self.config.output_dir.join(&resolution.path));
        Ok(())
    }

    /// Sanitizes a captured label, falling back when nothing usable remains.
    fn label_for(&self, captured: &str) -> String {
        let label = sanitize(captured, self.config.max_name_length);
        match validate_segment(&label) {
            Ok(_) => label,
            Err(_) => self.config.fallback_label.clone(),
        }
    }
}
