//! Collects a push-based backend listing into one all-or-nothing result.

use super::error_classifier::{GatewayError, Operation, classify};
use crate::storage::{BackendError, ListObserver, ObjectBackend};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, instrument};

type Outcome = Result<Vec<String>, BackendError>;

/// Gathers keys until the terminal signal, then resolves the waiting caller.
struct Accumulator {
    keys: Vec<String>,
    done: oneshot::Sender<Outcome>,
}

impl ListObserver for Accumulator {
    fn on_object(&mut self, key: String) {
        self.keys.push(key);
    }

    fn on_error(self: Box<Self>, err: BackendError) {
        let _ = self.done.send(Err(err));
    }

    fn on_completed(self: Box<Self>) {
        let Accumulator { keys, done } = *self;
        let _ = done.send(Ok(keys));
    }

    fn is_closed(&self) -> bool {
        self.done.is_closed()
    }
}

#[derive(Clone)]
pub struct ObjectLister {
    backend: Arc<dyn ObjectBackend>,
}

impl ObjectLister {
    pub fn new(backend: Arc<dyn ObjectBackend>) -> Self {
        Self { backend }
    }

    /// Every key under `prefix`, recursively. Any failure discards the keys
    /// gathered so far.
    #[instrument(skip(self))]
    pub async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, GatewayError> {
        let (done, outcome) = oneshot::channel();
        self.backend.list_objects_recursive(
            bucket,
            prefix,
            Box::new(Accumulator {
                keys: Vec::new(),
                done,
            }),
        );

        let outcome = outcome.await.unwrap_or_else(|_| {
            Err(BackendError::other(
                "listing ended without a completion signal",
            ))
        });

        match outcome {
            Ok(keys) => {
                info!(count = keys.len(), "listed objects");
                Ok(keys)
            }
            Err(err) => Err(classify(Operation::List, bucket, prefix, err)),
        }
    }
}
