use derive_more::Display;
use std::fmt;
use std::path::PathBuf;

/// How a single pipeline invocation ended.
#[derive(Debug, Clone, Display, PartialEq, Eq)]
pub enum Verdict {
    #[display("MOVED")]
    Moved,
    #[display("SKIP {_0}")]
    Skipped(String),
    #[display("FAIL {_0}")]
    Failed(String),
}

/// The report produced for every ingested event.
///
/// Fields are filled in as far as the pipeline got: a file skipped by an
/// extension filter has no label, category or destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub source: PathBuf,
    /// Absolute destination; only set once the move succeeded.
    pub destination: Option<PathBuf>,
    pub label: Option<String>,
    pub category: Option<String>,
    pub size: u64,
    pub verdict: Verdict,
}
impl MoveOutcome {
    pub(crate) fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: None,
            label: None,
            category: None,
            size: 0,
            verdict: Verdict::Moved,
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self.verdict, Verdict::Moved)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.verdict, Verdict::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.verdict, Verdict::Failed(_))
    }

    /// Why the file was skipped or failed.
    pub fn reason(&self) -> Option<&str> {
        match &self.verdict {
            Verdict::Moved => None,
            Verdict::Skipped(reason) | Verdict::Failed(reason) => Some(reason),
        }
    }
}

/// The log line: `MOVED <source> -> <destination>`, `SKIP <reason>: <source>`
/// or `FAIL <reason>: <source>`.
impl fmt::Display for MoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.verdict, &self.destination) {
            (Verdict::Moved, Some(destination)) => {
                write!(f, "MOVED {} -> {}", self.source.display(), destination.display())
            },
            (Verdict::Moved, None) => write!(f, "MOVED {}", self.source.display()),
            (verdict, _) => write!(f, "{verdict}: {}", self.source.display()),
        }
    }
}
