//! Moving freshly downloaded files into a sorted tree.
//!
//! A [`Pipeline`] takes one [`IntakeEvent`] at a time and decides whether the
//! file is finished, which label applies (from the [`ContextStore`]), which
//! category its extension belongs to, and what it should be called, before
//! moving it to `<output>/<label>/<category>/<name>`.

pub mod capture;
mod classify;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod readiness;
pub mod report;
pub mod resolve;
mod sanitize;
pub mod template;

pub use crate::classify::Classifier;
pub use crate::context::{Clock, ClockHandle, Context, ContextStore, ManualClock, SystemClock};
pub use crate::pipeline::{Dispatcher, EventKind, IntakeEvent, MoveOutcome, Pipeline, SweepEvent, Verdict, sweep};
pub use crate::readiness::{Readiness, ReadinessProbe};
pub use crate::resolve::{DestinationResolver, Resolution};
pub use crate::sanitize::{DEFAULT_MAX_LENGTH, sanitize};

/// Files processed at once by a [`sweep`].
pub const MAX_PROCESS_CONCURRENCY: usize = 16;
