use derive_more::Display;
use std::path::PathBuf;

/// The kind of file-system notification that produced an [`IntakeEvent`].
#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
pub enum EventKind {
    #[display("created")]
    Created,
    #[display("modified")]
    Modified,
    /// Renamed or moved into the intake folder.
    #[display("moved-in")]
    MovedIn,
}

/// One notification about one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeEvent {
    pub path: PathBuf,
    pub kind: EventKind,
}
impl IntakeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: EventKind) -> Self {
        Self { path: path.into(), kind }
    }
}
