use crate::pipeline::{IntakeEvent, MoveOutcome, Pipeline};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_util::task::TaskTracker;

type Queues = Arc<Mutex<HashMap<PathBuf, UnboundedSender<IntakeEvent>>>>;

/// Feeds events into a [`Pipeline`].
///
/// Events for the same path are processed one at a time in arrival order.
/// Different paths are processed concurrently, each on its own task, so a
/// slow readiness probe only holds up its own file.
pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    queues: Queues,
    tracker: TaskTracker,
    outcomes: Option<UnboundedSender<MoveOutcome>>,
}
impl Dispatcher {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            queues: Arc::default(),
            tracker: TaskTracker::new(),
            outcomes: None,
        }
    }

    /// Also send every outcome to `outcomes`.
    pub fn with_outcomes(mut self, outcomes: UnboundedSender<MoveOutcome>) -> Self {
        self.outcomes = Some(outcomes);
        self
    }

    /// Queues `event` behind any pending events for the same path.
    ///
    /// Returns `false` if the dispatcher is shutting down and the event was
    /// dropped.
    pub fn dispatch(&self, event: IntakeEvent) -> bool {
        if self.tracker.is_closed() {
            tracing::debug!(path = %event.path.display(), "Shutting down, dropping event");
            return false;
        }
        let mut queues = lock(&*self.queues);
        let event = match queues.get(&event.path) {
            Some(queue) => match queue.send(event) {
                Ok(()) => return true,
                // The worker is gone; start a new one below.
                Err(returned) => returned.0,
            },
            None => event,
        };

        let (sender, receiver) = unbounded_channel();
        let path = event.path.clone();
        // Cannot fail: the receiver is still in scope.
        _ = sender.send(event);
        queues.insert(path.clone(), sender);
        drop(queues);

        self.tracker.spawn(worker(
            path,
            receiver,
            self.pipeline.clone(),
            self.queues.clone(),
            self.outcomes.clone(),
        ));
        true
    }

    /// Stops accepting events and waits for everything already queued.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn worker(
    path: PathBuf,
    mut receiver: UnboundedReceiver<IntakeEvent>,
    pipeline: Arc<Pipeline>,
    queues: Queues,
    outcomes: Option<UnboundedSender<MoveOutcome>>,
) {
    loop {
        let event = match receiver.try_recv() {
            Ok(event) => event,
            Err(_) => {
                // Events are only ever queued while holding this lock, so an
                // empty queue seen under it is really empty.
                let mut queues = lock(&*queues);
                match receiver.try_recv() {
                    Ok(event) => event,
                    Err(_) => {
                        queues.remove(&path);
                        return;
                    },
                }
            },
        };
        let outcome = pipeline.ingest(event).await;
        if let Some(outcomes) = &outcomes {
            _ = outcomes.send(outcome);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
