//! Configuration for tagdrop.
//!
//! A [`Config`] is an immutable snapshot, loaded once at startup by layering
//! (lowest priority first):
//!
//! 1. the built-in defaults of [`Config::default`],
//! 2. `config.toml` in the platform's project configuration directory,
//! 3. an explicit file passed on the command-line (TOML, YAML or JSON,
//!    chosen by file extension),
//! 4. environment variables prefixed with `TAGDROP_`, where nested keys are
//!    separated by a double underscore (`TAGDROP_READINESS__TIMEOUT_SECS=30`).
//!
//! After extraction the snapshot is [validated](Config::finalize): directories
//! left on `AUTO` are resolved, extensions are normalized and limits checked.

pub mod error;
mod load;
mod model;

pub use crate::load::default_config_path;
pub use crate::model::{CaptureConfig, Category, Config, DuplicatePolicy, ReadinessConfig};

/// Characters that may never appear in a path segment produced from user
/// influenced text, on any platform we care about.
pub const RESERVED_CHARACTERS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Normalizes a file extension for comparison: surrounding whitespace and any
/// leading dots are removed, and the result is lowercased.
///
/// ```
/// use tagdrop_config::normalize_extension;
/// assert_eq!(normalize_extension(" .JPG "), "jpg");
/// assert_eq!(normalize_extension("tar.gz"), "tar.gz");
/// assert_eq!(normalize_extension(""), "");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}
