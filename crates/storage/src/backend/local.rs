//! Local filesystem storage backend.
//!
//! Files are stored in a configured directory and accessed using standard
//! filesystem operations via `tokio::fs` for async I/O.

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::{FileInfo, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// All paths are relative to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use tagdrop_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("output", "/home/me/Documents/Tagdrop")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend, creating `root` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }

        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }

        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for a relative storage path.
    ///
    /// Validates the path and joins it with the root directory.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    /// Convert an absolute path back to a relative storage path.
    fn relative_path(&self, absolute: impl AsRef<Path>) -> Result<PathBuf> {
        let absolute = absolute.as_ref();
        if !absolute.is_absolute() {
            exn::bail!(ErrorKind::BackendError(format!(
                "attempting to get relative path of non-absolute path `{:?}`",
                absolute
            )))
        }
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        Ok(validate_path(relative)?)
    }

    fn metadata(path: &Path, metadata: Metadata) -> FileInfo {
        FileInfo::new(path, metadata.len())
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn process_entry(&self, entry: DirEntry, recursive: bool) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        if metadata.is_dir() {
            return Ok(match recursive {
                true => WalkEntry::Descend(path),
                false => WalkEntry::Skip,
            });
        }
        if metadata.is_file() {
            let relative = self.relative_path(&path)?;
            return Ok(WalkEntry::File(Self::metadata(&relative, metadata)));
        }
        // Note: silently drop what is most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }

    /// Moving across filesystems can't be done atomically: copy the source
    /// next to the destination, then remove the source. A failed copy never
    /// touches the source, and never leaves a truncated destination behind.
    async fn copy_across_devices(source: &Path, target: &Path, relative: &Path) -> Result<()> {
        if let Err(e) = fs::copy(source, target).await {
            _ = fs::remove_file(target).await;
            exn::bail!(Self::map_io_error(e, relative));
        }
        if let Err(e) = fs::remove_file(source).await {
            // Data is safe at the destination; the leftover is only a duplicate.
            tracing::warn!(source = %source.display(), error = %e, "Copied across devices but could not remove source");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self, recursive: bool) -> FileInfoStream<'_> {
        let mut stack = vec![self.root.clone()];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // A directory that vanished mid-walk has no files in it.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };

                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'entries; },
                    };
                    match self.process_entry(entry, recursive).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::create_dir_all(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::remove_file(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn import(&self, source: &Path, to: &Path) -> Result<()> {
        let to_path = self.absolute_path(to)?;
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, to))?;
        }
        // `rename` silently replaces an existing file on Unix.
        if fs::try_exists(&to_path).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::AlreadyExists(to.to_path_buf()));
        }
        match fs::rename(source, &to_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
                tracing::debug!(source = %source.display(), target = %to.display(), "Copying across devices");
                Self::copy_across_devices(source, &to_path, to).await
            },
            Err(e) => exn::bail!(Self::map_io_error(e, source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    use super::*;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("Documents/Tagdrop");
        LocalBackend::new("name", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let expected = temp_dir.path().join("Team Chat/images/photo.jpg");
        assert_eq!(backend.absolute_path(Path::new("Team Chat/images/photo.jpg")).unwrap(), expected);
        // Path traversal is prevented
        assert!(backend.absolute_path(Path::new("../etc/passwd")).is_err());
    }

    #[test]
    fn test_relative_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let abs = temp_dir.path().join("Team Chat/images/photo.jpg");
        assert_eq!(backend.relative_path(&abs).unwrap(), Path::new("Team Chat/images/photo.jpg"));
        // Path outside root fails
        let outside = PathBuf::from("/other/file.txt");
        assert!(backend.relative_path(&outside).is_err());
    }

    #[tokio::test]
    async fn test_import_moves_file() {
        let inbox = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", output.path()).unwrap();
        let source = inbox.path().join("photo.jpg");
        std::fs::write(&source, b"jpeg bytes").unwrap();

        backend.import(&source, Path::new("Team Chat/images/photo.jpg")).await.unwrap();
        assert!(!source.exists());
        let moved = std::fs::read(output.path().join("Team Chat/images/photo.jpg")).unwrap();
        assert_eq!(moved, b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_import_never_overwrites() {
        let inbox = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", output.path()).unwrap();
        let source = inbox.path().join("notes.txt");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(output.path().join("notes.txt"), b"old").unwrap();

        let err = backend.import(&source, Path::new("notes.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
        assert!(source.exists());
        assert_eq!(std::fs::read(output.path().join("notes.txt")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_import_missing_source() {
        let inbox = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", output.path()).unwrap();
        let source = inbox.path().join("gone.txt");

        let err = backend.import(&source, Path::new("gone.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(p) if p == &source));
        assert!(!backend.exists(Path::new("gone.txt")).await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_across_devices_moves_file() {
        let inbox = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let source = inbox.path().join("photo.jpg");
        let target = output.path().join("photo.jpg");
        std::fs::write(&source, b"jpeg bytes").unwrap();

        LocalBackend::copy_across_devices(&source, &target, Path::new("photo.jpg")).await.unwrap();
        assert!(!source.exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_failed_copy_keeps_source_and_removes_partial_target() {
        let inbox = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        // A directory cannot be copied as a file.
        let source = inbox.path().join("album.jpg");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(source.join("inside.jpg"), b"jpeg bytes").unwrap();
        let target = output.path().join("album.jpg");
        std::fs::write(&target, b"jp").unwrap();

        let err = LocalBackend::copy_across_devices(&source, &target, Path::new("album.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        assert!(!target.exists());
        assert_eq!(std::fs::read(source.join("inside.jpg")).unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_create_dir_all_and_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.create_dir_all(Path::new("a/b/c")).await.unwrap();
        assert!(temp_dir.path().join("a/b/c").is_dir());
        assert!(backend.exists(Path::new("a/b/c")).await.unwrap());
        assert!(!backend.exists(Path::new("a/b/d")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        std::fs::write(temp_dir.path().join("file.txt"), b"data").unwrap();
        assert!(backend.exists(Path::new("file.txt")).await.unwrap());
        backend.delete(Path::new("file.txt")).await.unwrap();
        assert!(!backend.exists(Path::new("file.txt")).await.unwrap());
        // Deleting nonexistent file returns error
        let err = backend.delete(Path::new("nonexistent.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_top_level_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), b"data").unwrap();
        std::fs::write(temp_dir.path().join("b.pdf"), b"data").unwrap();
        std::fs::write(temp_dir.path().join("sub/c.txt"), b"data").unwrap();

        let mut top: Vec<_> = backend.list(false).await.unwrap().into_iter().map(|f| f.path).collect();
        top.sort();
        assert_eq!(top, vec![PathBuf::from("a.txt"), PathBuf::from("b.pdf")]);
        assert_eq!(backend.list(true).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_empty_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.list(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_path_security() {
        let inbox = tempfile::tempdir().unwrap();
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let source = inbox.path().join("x.txt");
        std::fs::write(&source, b"data").unwrap();
        // Attempts to escape the root should fail
        assert!(backend.import(&source, Path::new("../escaped.txt")).await.is_err());
        assert!(backend.create_dir_all(Path::new("../../dir")).await.is_err());
        assert!(backend.delete(Path::new("../../file")).await.is_err());
        assert!(source.exists());
    }
}
