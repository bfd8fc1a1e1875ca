use crate::MAX_PROCESS_CONCURRENCY;
use crate::error::{ErrorKind, Result};
use crate::pipeline::{EventKind, IntakeEvent, MoveOutcome, Pipeline};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use tagdrop_storage::BackendHandle;
use tokio_util::sync::CancellationToken;

/// Progress events emitted by [`sweep`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete), exactly once, with the
///    number of files found.
/// 3. [`Processed`](Self::Processed), once per file that was started.
/// 4. [`Complete`](Self::Complete), exactly once.
///
/// Listing the intake folder is the only thing that can fail; per-file
/// problems are reported in the [`MoveOutcome`].
#[derive(Debug)]
pub enum SweepEvent {
    Started,
    DiscoveryComplete(u64),
    Processed(MoveOutcome),
    Complete,
}

/// Ingests every file already sitting at the top level of the intake folder.
///
/// `intake` must be rooted at the configured intake directory. Files are
/// processed up to [`MAX_PROCESS_CONCURRENCY`] at a time. Once `cancel` fires
/// no further files are started, but those already in flight run to
/// completion and are reported before [`SweepEvent::Complete`].
pub fn sweep<'a>(
    pipeline: &'a Pipeline,
    intake: &'a BackendHandle,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<SweepEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(SweepEvent::Started);

        let files = match intake.list(false).await.or_raise(|| ErrorKind::Storage) {
            Ok(files) => files,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        yield Ok(SweepEvent::DiscoveryComplete(u64::try_from(files.len()).unwrap_or(0)));

        let root = pipeline.config().intake_dir.clone();
        let mut pending: Vec<_> = files
            .into_iter()
            .map(|file| pipeline.ingest(IntakeEvent::new(root.join(&file.path), EventKind::Created)))
            .collect();
        let mut processing = FuturesUnordered::new();
        if !cancel.is_cancelled() {
            processing.extend(pending.drain(..MAX_PROCESS_CONCURRENCY.min(pending.len())));
        }
        while let Some(outcome) = processing.next().await {
            yield Ok(SweepEvent::Processed(outcome));
            // FIFO, so files are started in listing order.
            if !pending.is_empty() && !cancel.is_cancelled() {
                processing.push(pending.remove(0));
            }
        }
        if !pending.is_empty() {
            tracing::info!(remaining = pending.len(), "Sweep cancelled, leaving remaining files in place");
        }

        yield Ok(SweepEvent::Complete);
    })
}
