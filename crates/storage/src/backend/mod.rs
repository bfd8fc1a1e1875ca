//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait: the handful of operations
//! the intake pipeline needs on the destination tree. Sources live outside
//! any backend (they are absolute paths in the intake folder) and are brought
//! in with [`StorageBackend::import`].

mod local;
mod ro;

pub use self::local::LocalBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths (except import sources) are relative to the storage root and
/// must be validated using [`validate_path`](crate::validate_path) before use.
/// Implementations should enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tagdrop_storage::{backend::StorageBackend, error::Result};
///
/// async fn file_into(backend: &dyn StorageBackend, download: &Path) -> Result<()> {
///     let target = Path::new("Team Chat/images/photo.jpg");
///     if !backend.exists(target).await? {
///         backend.import(download, target).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List all files, optionally descending into subdirectories.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, recursive: bool) -> Result<Vec<FileInfo>> {
        self.list_stream(recursive).try_collect().await
    }

    /// Stream file metadata, yielding results incrementally.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use tagdrop_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream(false);
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.path.display(), info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream(&self, recursive: bool) -> FileInfoStream<'_>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all of its missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Move a file from an absolute `source` path outside the backend to the
    /// relative path `to` inside it.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    /// - The destination is never overwritten; an occupied destination
    ///   returns [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists).
    /// - If the move fails, the source must still exist afterwards.
    async fn import(&self, source: &Path, to: &Path) -> Result<()>;
}
