use crate::error::{ErrorKind, Result};
use crate::{Config, RESERVED_CHARACTERS, normalize_extension};
use directories::{ProjectDirs, UserDirs};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Placeholder for directories that should be detected from the platform.
pub(crate) const AUTO: &str = "AUTO";
const ENV_PREFIX: &str = "TAGDROP_";
const OUTPUT_FOLDER_NAME: &str = "Tagdrop";
/// Upper bound on `readiness.timeout_secs` (one day).
pub(crate) const MAX_READINESS_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Location of the implicit configuration file, if the platform has a notion
/// of per-user configuration directories.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "tagdrop").map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Loads the layered configuration and validates it.
    ///
    /// The implicit per-user configuration file is optional, but an `explicit`
    /// file that does not exist is an error: somebody asked for it.
    #[instrument]
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = default_config_path() {
            tracing::debug!(path = %path.display(), "Merging user configuration file (if present)");
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            figment = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extracts and validates a configuration from an arbitrary [`Figment`].
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.finalize()
    }

    /// Resolves `AUTO` directories, normalizes every extension list and
    /// rejects values the pipeline cannot work with.
    pub fn finalize(mut self) -> Result<Self> {
        self.intake_dir = resolve_directory(&self.intake_dir, "intake", || {
            UserDirs::new().and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        })?;
        self.output_dir = resolve_directory(&self.output_dir, "output", || {
            UserDirs::new().and_then(|dirs| dirs.document_dir().map(|d| d.join(OUTPUT_FOLDER_NAME)))
        })?;
        if self.intake_dir == self.output_dir {
            exn::bail!(ErrorKind::Invalid("`intake_dir` and `output_dir` must differ".to_string()));
        }

        for category in &mut self.categories {
            category.name = category.name.trim().to_string();
            check_plain_name("category", &category.name)?;
            category.extensions = normalize_all(&category.extensions);
        }
        self.default_category = self.default_category.trim().to_string();
        check_plain_name("default_category", &self.default_category)?;
        self.fallback_label = self.fallback_label.trim().to_string();
        check_plain_name("fallback_label", &self.fallback_label)?;
        self.ignored_extensions = normalize_all(&self.ignored_extensions);
        self.excluded_extensions = normalize_all(&self.excluded_extensions);

        if self.max_name_length == 0 {
            exn::bail!(ErrorKind::Invalid("`max_name_length` must be at least 1".to_string()));
        }
        if self.rename_limit == 0 {
            exn::bail!(ErrorKind::Invalid("`rename_limit` must be at least 1".to_string()));
        }
        if self.readiness.interval_ms == 0 || self.readiness.timeout_secs == 0 || self.readiness.stable_polls == 0 {
            exn::bail!(ErrorKind::Invalid("`readiness` settings must all be positive".to_string()));
        }
        if self.readiness.timeout_secs > MAX_READINESS_TIMEOUT_SECS {
            exn::bail!(ErrorKind::Invalid(format!(
                "`readiness.timeout_secs` must be at most {MAX_READINESS_TIMEOUT_SECS}"
            )));
        }
        if self.readiness.interval() >= self.readiness.timeout() {
            exn::bail!(ErrorKind::Invalid(
                "`readiness.interval_ms` must be shorter than `readiness.timeout_secs`".to_string()
            ));
        }
        Ok(self)
    }
}

fn resolve_directory(
    configured: &Path,
    which: &'static str,
    detect: impl FnOnce() -> Option<PathBuf>,
) -> Result<PathBuf> {
    let raw = configured.as_os_str().to_string_lossy();
    let path = if raw.trim().is_empty() || raw.trim().eq_ignore_ascii_case(AUTO) {
        let Some(detected) = detect() else {
            exn::bail!(ErrorKind::Directories(which));
        };
        tracing::debug!(directory = which, path = %detected.display(), "Detected default directory");
        detected
    } else {
        configured.to_path_buf()
    };
    std::path::absolute(&path).or_raise(|| ErrorKind::Invalid(format!("unusable {which} directory `{}`", path.display())))
}

fn normalize_all(extensions: &[String]) -> Vec<String> {
    extensions.iter().map(|e| normalize_extension(e)).filter(|e| !e.is_empty()).collect()
}

/// Category names and the fallback label become directory names verbatim.
fn check_plain_name(field: &str, name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(RESERVED_CHARACTERS) {
        exn::bail!(ErrorKind::Invalid(format!("`{field}` value {name:?} is not a usable directory name")));
    }
    Ok(())
}
