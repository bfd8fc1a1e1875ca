//! Destination naming and duplicate handling.

use crate::error::{ErrorKind, Result};
use crate::sanitize::{DEFAULT_MAX_LENGTH, sanitize};
use crate::template::{NameFields, NameTemplate};
use exn::ResultExt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tagdrop_config::{Config, DuplicatePolicy};
use tagdrop_storage::{BackendHandle, validate_segment};
use time::OffsetDateTime;
use tracing::instrument;

/// Default cap on `(n)` suffixes tried under [`DuplicatePolicy::Rename`].
pub const DEFAULT_RENAME_LIMIT: u32 = 10_000;

/// A free destination, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: PathBuf,
    /// An existing file was deleted to make room (overwrite policy).
    pub replaced: bool,
}

/// Computes where an incoming file goes: `<label>/<category>/<rendered name>`.
///
/// On success the returned path is free. Besides creating the destination
/// directory, the only mutation ever performed is deleting an occupant under
/// [`DuplicatePolicy::Overwrite`].
///
/// Not atomic with the move that follows; callers running concurrently must
/// serialize resolve-and-move per destination directory.
pub struct DestinationResolver {
    backend: BackendHandle,
    template: NameTemplate,
    policy: DuplicatePolicy,
    rename_limit: u32,
    max_length: usize,
}
impl std::fmt::Debug for DestinationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationResolver")
            .field("template", &self.template)
            .field("policy", &self.policy)
            .field("rename_limit", &self.rename_limit)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}
impl DestinationResolver {
    pub fn new(backend: BackendHandle, template: NameTemplate, policy: DuplicatePolicy) -> Self {
        Self {
            backend,
            template,
            policy,
            rename_limit: DEFAULT_RENAME_LIMIT,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    /// Compiles the configured template; an unusable template is a
    /// [`ErrorKind::Config`] error.
    pub fn from_config(backend: BackendHandle, config: &Config) -> Result<Self> {
        let template: NameTemplate = config.template.parse()?;
        Ok(Self::new(backend, template, config.duplicates)
            .with_rename_limit(config.rename_limit)
            .with_max_length(config.max_name_length))
    }

    pub fn with_rename_limit(mut self, limit: u32) -> Self {
        self.rename_limit = limit;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Renders the file name and finds a free spot for it.
    ///
    /// `label` and `original` are expected to be sanitized already; the
    /// rendered name is sanitized again since the template may add
    /// characters of its own.
    #[instrument(level = "debug", skip(self, timestamp))]
    pub async fn resolve(
        &self,
        label: &str,
        category: &str,
        original: &str,
        timestamp: OffsetDateTime,
    ) -> Result<Resolution> {
        let rendered = self.template.render(&NameFields {
            timestamp,
            label,
            category,
            original,
        })?;
        let name = sanitize(&rendered, self.max_length);
        validate_segment(&name).or_raise(|| ErrorKind::Template)?;
        validate_segment(label).or_raise(|| ErrorKind::Storage)?;
        validate_segment(category).or_raise(|| ErrorKind::Storage)?;

        let directory = Path::new(label).join(category);
        self.backend.create_dir_all(&directory).await.or_raise(|| ErrorKind::Storage)?;

        let candidate = directory.join(&name);
        if !self.is_taken(&candidate).await? {
            return Ok(Resolution { path: candidate, replaced: false });
        }
        match self.policy {
            DuplicatePolicy::Skip => exn::bail!(ErrorKind::Collision(candidate)),
            DuplicatePolicy::Overwrite => {
                if let Err(e) = self.backend.delete(&candidate).await {
                    let cause = e.deref().to_string();
                    return Err(e).or_raise(|| ErrorKind::Overwrite(cause.clone()));
                }
                tracing::debug!(path = %candidate.display(), "Removed existing file to overwrite it");
                Ok(Resolution { path: candidate, replaced: true })
            },
            DuplicatePolicy::Rename => {
                for n in 1..=self.rename_limit {
                    let renamed = directory.join(numbered(&name, n, self.max_length));
                    if !self.is_taken(&renamed).await? {
                        return Ok(Resolution { path: renamed, replaced: false });
                    }
                }
                exn::bail!(ErrorKind::Exhausted(candidate))
            },
        }
    }

    async fn is_taken(&self, path: &Path) -> Result<bool> {
        self.backend.exists(path).await.or_raise(|| ErrorKind::Storage)
    }
}

/// `photo.jpg` becomes `photo(n).jpg`; names without a usable stem get the
/// suffix at the end. The stem is shortened so the result stays within
/// `max_length` characters unless the suffix and extension alone exceed it.
fn numbered(name: &str, n: u32, max_length: usize) -> String {
    let suffix = format!("({n})");
    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (name, None),
    };
    let reserved = suffix.chars().count() + extension.map_or(0, |e| e.chars().count() + 1);
    let stem: String = stem.chars().take(max_length.saturating_sub(reserved)).collect();
    let stem = stem.trim_end();
    match extension {
        Some(extension) => format!("{stem}{suffix}.{extension}"),
        None => format!("{stem}{suffix}"),
    }
}
