//! Capture signals from standard input.
//!
//! Whatever produces captures (a hotkey daemon reading the frontmost window
//! title, a shell alias) writes one title per line.

use std::sync::Arc;
use tagdrop_intake::ContextStore;
use tagdrop_intake::capture::extract_label;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

/// Sets the context for every usable line until the input closes or
/// `cancel` fires.
///
/// A line that is not valid UTF-8 is dropped and the loop carries on; only a
/// failing read ends it.
pub async fn capture<R>(
    mut input: R,
    context: Arc<ContextStore>,
    suffixes: Vec<String>,
    max_length: usize,
    cancel: CancellationToken,
) where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        tokio::select! {
            () = cancel.cancelled() => break,
            read = input.read_until(b'\n', &mut line) => match read {
                Ok(0) => {
                    tracing::debug!("Capture input closed");
                    break;
                },
                Ok(_) => match std::str::from_utf8(&line) {
                    Ok(title) => match extract_label(title, &suffixes, max_length) {
                        Some(label) => {
                            tracing::info!(%label, "Captured");
                            context.set(label);
                        },
                        None => tracing::debug!(title = title.trim_end(), "Nothing usable in capture, ignoring"),
                    },
                    Err(e) => {
                        let title = String::from_utf8_lossy(&line);
                        tracing::warn!(error = %e, title = title.trim_end(), "Capture is not valid UTF-8, ignoring");
                    },
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Could not read capture input");
                    break;
                },
            },
        }
    }
}
