//! Bounded FIFO between the listener and the worker pool.

use crate::error::EnqueueError;
use crate::server::Request;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Fixed-capacity request queue.
///
/// Producers never wait: a full queue rejects the request. Consumers wait
/// for the next request or for `shutdown`, whichever comes first.
#[derive(Clone)]
pub struct RequestQueue {
    tx: mpsc::Sender<Request>,
    rx: Arc<Mutex<mpsc::Receiver<Request>>>,
    shutdown: CancellationToken,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self::with_cancellation(capacity, CancellationToken::new())
    }

    pub fn with_cancellation(capacity: usize, shutdown: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            shutdown,
        }
    }

    pub fn enqueue(&self, request: Request) -> Result<(), EnqueueError> {
        if self.shutdown.is_cancelled() {
            return Err(EnqueueError::Closed);
        }
        self.tx.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Waits for the next request. `None` means the queue was shut down.
    pub async fn dequeue(&self) -> Option<Request> {
        let mut rx = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return None,
            rx = self.rx.lock() => rx,
        };
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            request = rx.recv() => request,
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
