use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What to do when the destination file name is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Append `(1)`, `(2)`, … before the extension until a free name is found.
    #[default]
    Rename,
    /// Leave the incoming file where it is.
    Skip,
    /// Delete the existing file, then move the incoming file in its place.
    Overwrite,
}

/// A named bucket of file extensions.
///
/// Categories are kept as an ordered list (not a map) because the first
/// category containing an extension wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub extensions: Vec<String>,
}
impl Category {
    pub fn new(name: impl Into<String>, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Settings for detecting files that are still being written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Delay between two size polls.
    pub interval_ms: u64,
    /// Give up on a file that has not settled after this long.
    pub timeout_secs: u64,
    /// Number of consecutive unchanged polls before a file counts as settled.
    pub stable_polls: u32,
}
impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            timeout_secs: 20,
            stable_polls: 3,
        }
    }
}
impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for turning a captured window title into a label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Application names stripped from the end of captured titles, such as
    /// `" - KakaoTalk"`.
    pub strip_suffixes: Vec<String>,
}

/// The complete, immutable configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder watched for newly arrived files. Empty or `AUTO` resolves to
    /// the user's download folder.
    pub intake_dir: PathBuf,
    /// Root of the sorted tree. Empty or `AUTO` resolves to `Tagdrop` inside
    /// the user's documents folder.
    pub output_dir: PathBuf,
    /// Seconds for which a captured label may still be applied.
    pub context_ttl: u64,
    /// File name template, with `{timestamp}`, `{label}`, `{category}` and
    /// `{original}` placeholders.
    pub template: String,
    pub categories: Vec<Category>,
    pub default_category: String,
    /// Label used when no fresh capture exists.
    pub fallback_label: String,
    /// Extensions of files that are never touched (partial downloads, etc).
    pub ignored_extensions: Vec<String>,
    /// Extensions of files the user chose not to sort.
    pub excluded_extensions: Vec<String>,
    pub excluded_labels: Vec<String>,
    pub excluded_categories: Vec<String>,
    pub duplicates: DuplicatePolicy,
    /// Maximum length, in characters, of any generated path segment.
    pub max_name_length: usize,
    /// Highest `(n)` suffix tried under [`DuplicatePolicy::Rename`].
    pub rename_limit: u32,
    pub readiness: ReadinessConfig,
    pub capture: CaptureConfig,
    pub statistics: bool,
    pub history: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            intake_dir: PathBuf::from(crate::load::AUTO),
            output_dir: PathBuf::from(crate::load::AUTO),
            context_ttl: 180,
            template: "{timestamp}__{label}__{category}__{original}".to_string(),
            categories: vec![
                Category::new("images", ["jpg", "jpeg", "png", "gif", "webp", "heic", "bmp", "svg"]),
                Category::new("videos", ["mp4", "mov", "avi", "mkv", "webm"]),
                Category::new("audio", ["mp3", "m4a", "wav", "flac", "ogg"]),
                Category::new("documents", ["pdf", "doc", "docx", "hwp", "hwpx", "txt", "rtf", "odt", "md"]),
                Category::new("spreadsheets", ["xls", "xlsx", "csv", "ods"]),
                Category::new("presentations", ["ppt", "pptx", "key", "odp"]),
                Category::new("archives", ["zip", "7z", "rar", "tar", "gz", "bz2", "xz"]),
            ],
            default_category: "other".to_string(),
            fallback_label: "uncategorized".to_string(),
            ignored_extensions: ["crdownload", "part", "partial", "download", "tmp"].map(String::from).to_vec(),
            excluded_extensions: vec![],
            excluded_labels: vec![],
            excluded_categories: vec![],
            duplicates: DuplicatePolicy::default(),
            max_name_length: 140,
            rename_limit: 10_000,
            readiness: ReadinessConfig::default(),
            capture: CaptureConfig::default(),
            statistics: true,
            history: true,
        }
    }
}

impl Config {
    pub fn context_ttl(&self) -> Duration {
        Duration::from_secs(self.context_ttl)
    }
}
