use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{KeyValueStore, StoreError};

enum WriteOp {
    Set { key: &'static str, value: String },
    Remove(Vec<&'static str>),
    Flush(oneshot::Sender<Option<StoreError>>),
}

/// Handle to the write-behind queue.
///
/// Mutations enqueue full snapshots and return immediately; a single writer
/// task applies them to the store in order. Failed writes are logged and
/// dropped, the next snapshot for the same key supersedes them.
#[derive(Debug, Clone)]
pub struct Persister {
    sender: mpsc::UnboundedSender<WriteOp>,
}

impl Persister {
    /// Start the writer task on the current tokio runtime.
    ///
    /// The task stops once every clone of the returned handle is dropped.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(store, receiver));
        (Self { sender }, handle)
    }

    /// A handle whose writes go nowhere, for purely in-memory use.
    pub fn disconnected() -> Self {
        let (sender, _receiver) = mpsc::unbounded_channel();
        Self { sender }
    }

    /// Serialize `value` now and queue it for `key`.
    pub fn save<T: Serialize + ?Sized>(&self, key: &'static str, value: &T) {
        match serde_json::to_string(value) {
            Ok(value) => self.enqueue(WriteOp::Set { key, value }),
            Err(source) => {
                let error = StoreError::Encode { key, source };
                warn!(key, error = %error, "snapshot not persisted");
            }
        }
    }

    pub fn remove(&self, keys: &[&'static str]) {
        self.enqueue(WriteOp::Remove(keys.to_vec()));
    }

    /// Wait until every write queued before this call reached the store.
    ///
    /// Returns the first failure since the previous flush, if any.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let (reply, done) = oneshot::channel();
        if self.sender.send(WriteOp::Flush(reply)).is_err() {
            return Err(StoreError::WriterClosed);
        }
        match done.await {
            Ok(None) => Ok(()),
            Ok(Some(error)) => Err(error),
            Err(_) => Err(StoreError::WriterClosed),
        }
    }

    fn enqueue(&self, op: WriteOp) {
        if self.sender.send(op).is_err() {
            debug!("storage writer not running, write dropped");
        }
    }
}

async fn run_writer(store: Arc<dyn KeyValueStore>, mut receiver: mpsc::UnboundedReceiver<WriteOp>) {
    let mut first_failure: Option<StoreError> = None;

    while let Some(op) = receiver.recv().await {
        let result = match op {
            WriteOp::Set { key, value } => store.set(key, value).await,
            WriteOp::Remove(keys) => store.multi_remove(&keys).await,
            WriteOp::Flush(reply) => {
                // the caller may have given up waiting
                let _ = reply.send(first_failure.take());
                continue;
            }
        };

        if let Err(error) = result {
            warn!(error = %error, "background write failed");
            if first_failure.is_none() {
                first_failure = Some(error);
            }
        }
    }

    debug!("storage writer stopped");
}
