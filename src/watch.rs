//! File-system notifications into the intake pipeline.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use notify::event::{EventKind as NotifyKind, ModifyKind, RenameMode};
use notify::{RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagdrop_intake::{Dispatcher, EventKind, IntakeEvent, Pipeline};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const QUEUE_CAPACITY: usize = 1024;

/// Creates the intake directory if needed and returns its canonical path.
///
/// Notifiers report resolved paths (`/private/tmp` on macOS, the target of a
/// symlinked Downloads folder), so events are matched against this.
pub async fn prepare_intake(intake: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(intake).await.or_raise(|| ErrorKind::Watch)?;
    tokio::fs::canonicalize(intake).await.or_raise(|| ErrorKind::Watch)
}

/// Translates one raw notification into intake events for files directly
/// inside `intake`, which must be canonical.
pub fn intake_events(intake: &Path, event: notify::Event) -> Vec<IntakeEvent> {
    let (kind, paths) = match event.kind {
        NotifyKind::Create(_) => (EventKind::Created, event.paths),
        NotifyKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => (EventKind::Modified, event.paths),
        NotifyKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => (EventKind::MovedIn, event.paths),
        // `[from, to]`: only the destination is of interest.
        NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            (EventKind::MovedIn, event.paths.into_iter().last().into_iter().collect())
        },
        _ => return vec![],
    };
    paths
        .into_iter()
        .filter(|path| path.parent() == Some(intake))
        .map(|path| IntakeEvent::new(path, kind))
        .collect()
}

/// Watches the intake directory and feeds every notification to the
/// pipeline until `cancel` fires, then waits for in-flight files.
pub async fn watch(pipeline: Arc<Pipeline>, cancel: CancellationToken) -> Result<()> {
    let intake = prepare_intake(&pipeline.config().intake_dir).await?;
    let (sender, mut receiver) = mpsc::channel(QUEUE_CAPACITY);

    let root = intake.clone();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| match result {
        Ok(event) => {
            for event in intake_events(&root, event) {
                if let Err(e) = sender.blocking_send(event) {
                    tracing::debug!(error = %e, "Watch loop has stopped, dropping notification");
                }
            }
        },
        Err(e) => tracing::warn!(error = %e, "Watch error"),
    })
    .or_raise(|| ErrorKind::Watch)?;
    watcher.watch(&intake, RecursiveMode::NonRecursive).or_raise(|| ErrorKind::Watch)?;
    tracing::info!(path = %intake.display(), "Watching for new files");

    let dispatcher = Dispatcher::new(pipeline);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = receiver.recv() => match event {
                Some(event) => {
                    tracing::debug!(path = %event.path.display(), kind = %event.kind, "Notification");
                    dispatcher.dispatch(event);
                },
                None => break,
            },
        }
    }

    drop(watcher);
    tracing::info!("Waiting for files in flight");
    dispatcher.shutdown().await;
    Ok(())
}
