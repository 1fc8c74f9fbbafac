use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream::{self, Stream};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::estimation::batch::ProgressSink;
use crate::estimation::pipeline::RepoEstimate;
use crate::models::EstimationResult;
use crate::stream::event::ProgressEvent;

pub const DEFAULT_CAPACITY: usize = 64;

/// Creates the writer half handed to the pipeline and the reader half handed to the consumer.
pub fn progress_channel(capacity: usize) -> (ProgressSender, ProgressStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ProgressSender {
            tx,
            connected: AtomicBool::new(true),
            terminated: false,
        },
        ProgressStream { rx },
    )
}

/// Write side of a progress stream.
///
/// Non-terminal events go through `&self`; `complete` and `fail` take `self`,
/// so at most one terminal event can be sent. Dropping the sender without
/// either sends a best-effort `error` event.
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressEvent>,
    connected: AtomicBool,
    terminated: bool,
}

impl ProgressSender {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed) && !self.tx.is_closed()
    }

    async fn send(&self, event: ProgressEvent) {
        if !self.connected.load(Ordering::Relaxed) {
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.connected.store(false, Ordering::Relaxed);
            tracing::info!("Progress consumer disconnected; further events are dropped");
        }
    }

    pub async fn log(&self, message: impl Into<String>) {
        self.send(ProgressEvent::Log {
            message: message.into(),
        })
        .await;
    }

    pub async fn complete(mut self, estimate: RepoEstimate) {
        self.send(ProgressEvent::Complete {
            summary: estimate.summary,
            estimations: estimate.results,
            csv_content: estimate.csv_content,
        })
        .await;
        self.terminated = true;
    }

    pub async fn fail(mut self, message: impl Into<String>) {
        self.send(ProgressEvent::Error {
            message: message.into(),
        })
        .await;
        self.terminated = true;
    }

    /// Sends the terminal event matching `outcome`.
    pub async fn finish(self, outcome: Result<RepoEstimate>) {
        match outcome {
            Ok(estimate) => self.complete(estimate).await,
            Err(e) => {
                tracing::warn!("Estimation run failed: {}", e);
                self.fail(e.to_string()).await
            }
        }
    }
}

impl Drop for ProgressSender {
    fn drop(&mut self) {
        if !self.terminated && self.connected.load(Ordering::Relaxed) {
            let fallback = ProgressEvent::Error {
                message: "Estimation run ended unexpectedly".to_string(),
            };
            match self.tx.try_send(fallback) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!("Progress channel full; consumer will not see why the run ended");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!("Progress consumer gone before the run ended");
                }
            }
        }
    }
}

#[async_trait]
impl ProgressSink for ProgressSender {
    async fn log(&self, message: &str) {
        ProgressSender::log(self, message).await;
    }

    async fn on_group_complete(&self, processed: usize, total: usize, group: &[EstimationResult]) {
        self.send(ProgressEvent::Progress { processed, total }).await;

        let first_index = processed - group.len();
        for (offset, result) in group.iter().enumerate() {
            self.send(ProgressEvent::Result {
                result: result.clone(),
                index: first_index + offset,
                total,
            })
            .await;
        }
    }
}

/// Read side of a progress stream; yields events in emission order and ends after the terminal one.
pub struct ProgressStream {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl ProgressStream {
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        stream::unfold((self.rx, false), |(mut rx, done)| async move {
            if done {
                return None;
            }
            let event = rx.recv().await?;
            let done = event.is_terminal();
            Some((event, (rx, done)))
        })
    }
}
