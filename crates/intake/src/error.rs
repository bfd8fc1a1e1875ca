//! Intake Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Not every "error" here is a failure. A pipeline invocation stops at the
//! first raised [`ErrorKind`], and [`ErrorKind::is_skip`] decides whether the
//! file is reported as skipped (a deliberate decision) or failed.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An intake error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for intake operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a file was deliberately left alone.
#[derive(Debug, Clone, Display, PartialEq, Eq)]
pub enum Exclusion {
    #[display("directory")]
    Directory,
    #[display("ignored extension .{_0}")]
    IgnoredExtension(String),
    #[display("excluded extension .{_0}")]
    ExcludedExtension(String),
    #[display("excluded label {_0}")]
    Label(String),
    #[display("excluded category {_0}")]
    Category(String),
}

/// ### Skips
/// - [`ErrorKind::NotReady`]
/// - [`ErrorKind::Excluded`]
/// - [`ErrorKind::Collision`]
/// - [`ErrorKind::Vanished`]
///
/// ### Failures
/// - [`ErrorKind::Overwrite`], [`ErrorKind::Exhausted`]
/// - [`ErrorKind::Move`]
/// - [`ErrorKind::Storage`], [`ErrorKind::Template`]
///
/// ### Fatal
/// - [`ErrorKind::Config`] - only ever raised while constructing a pipeline.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The naming template (or another setting) is unusable.
    #[display("invalid configuration: {_0}")]
    Config(#[error(not(source))] String),
    /// The file did not stop changing before the readiness timeout.
    #[display("not ready")]
    NotReady,
    /// A policy filter matched.
    #[display("{_0}")]
    Excluded(#[error(not(source))] Exclusion),
    /// The source was gone before processing started.
    #[display("source vanished")]
    Vanished,
    /// The destination is taken and the duplicate policy is `skip`.
    #[display("duplicate at {}", _0.display())]
    Collision(#[error(not(source))] PathBuf),
    /// The destination is taken, the policy is `overwrite`, and the existing
    /// file could not be removed.
    #[display("could not replace existing file: {_0}")]
    Overwrite(#[error(not(source))] String),
    /// Every `(n)` suffix up to the configured limit is taken.
    #[display("no free name left for {}", _0.display())]
    Exhausted(#[error(not(source))] PathBuf),
    /// The final move failed; the source is left untouched.
    #[display("move failed: {_0}")]
    Move(#[error(not(source))] String),
    /// Inspecting or preparing the destination tree failed.
    #[display("destination storage error")]
    Storage,
    /// The file name could not be rendered.
    #[display("could not render file name")]
    Template,
}

impl ErrorKind {
    /// Returns `true` if the file was deliberately left alone rather than
    /// failing.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::NotReady | Self::Excluded(_) | Self::Vanished | Self::Collision(_))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady | Self::Move(_) | Self::Storage)
    }
}
