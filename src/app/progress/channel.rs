//! Ordered progress conduit between the transfer thread and the relay
//!
//! The producer side lives on a blocking thread and sends with backpressure;
//! the consumer side lives on the async runtime. Exactly one
//! [`ProgressEvent::Terminal`] is observed by the consumer, always last: either
//! the one enqueued by [`ProgressSender::finish`] or one synthesized when every
//! sender has been dropped (error and panic paths).

use tokio::sync::mpsc;
use tracing::trace;

/// A single item travelling through the progress channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Raw byte counts; `total == 0` means the size is not known yet
    Progress { transferred: u64, total: u64 },
    /// No further events will arrive
    Terminal,
}

/// Create a bounded progress channel
///
/// A capacity of zero is bumped to one.
pub fn progress_channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ProgressSender { tx },
        ProgressReceiver {
            rx,
            terminated: false,
        },
    )
}

/// Producer half, owned by the transfer worker
#[derive(Debug)]
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressSender {
    /// Send from a synchronous context, blocking while the channel is full
    ///
    /// Must not be called from inside the async runtime. Returns `false` once
    /// the consumer has gone away; the transfer carries on regardless.
    pub fn send_blocking(&self, transferred: u64, total: u64) -> bool {
        match self
            .tx
            .blocking_send(ProgressEvent::Progress { transferred, total })
        {
            Ok(()) => true,
            Err(_) => {
                trace!("Progress consumer gone, dropping {}/{}", transferred, total);
                false
            }
        }
    }

    /// Send from an async context, waiting while the channel is full
    pub async fn send(&self, transferred: u64, total: u64) -> bool {
        self.tx
            .send(ProgressEvent::Progress { transferred, total })
            .await
            .is_ok()
    }

    /// Enqueue the terminal marker from a synchronous context
    pub fn finish_blocking(self) {
        let _ = self.tx.blocking_send(ProgressEvent::Terminal);
    }

    /// Enqueue the terminal marker from an async context
    pub async fn finish(self) {
        let _ = self.tx.send(ProgressEvent::Terminal).await;
    }
}

/// Consumer half, owned by the progress relay
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::Receiver<ProgressEvent>,
    terminated: bool,
}

impl ProgressReceiver {
    /// Receive the next event in FIFO order
    ///
    /// Returns `Some(Terminal)` exactly once and `None` afterwards.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        if self.terminated {
            return None;
        }

        match self.rx.recv().await {
            Some(event @ ProgressEvent::Progress { .. }) => Some(event),
            Some(ProgressEvent::Terminal) | None => {
                self.terminated = true;
                // Unblock any producer still waiting for capacity
                self.rx.close();
                Some(ProgressEvent::Terminal)
            }
        }
    }

    /// Whether the terminal marker has been delivered
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Stop accepting events; blocked producers are released
    pub fn close(&mut self) {
        self.rx.close();
    }
}
