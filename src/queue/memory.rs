//! In-memory queue double for unit tests: a plain vector behind a mutex
//! plus a broadcast channel standing in for the worker event stream.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::QueueError;

use super::{QueueBackend, WorkerEvent};

pub(crate) struct MemoryQueue {
    name: String,
    items: Mutex<Vec<Vec<u8>>>,
    events: broadcast::Sender<WorkerEvent>,
}

impl MemoryQueue {
    pub(crate) fn new(name: &str) -> Self {
        let (events, _rx) = broadcast::channel(64);
        Self {
            name: name.to_string(),
            items: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Appends a raw message (oldest stays first).
    pub(crate) fn push(&self, raw: Vec<u8>) {
        self.items.lock().unwrap().push(raw);
    }

    /// Removes and returns the oldest message, simulating a worker drain.
    pub(crate) fn take_front(&self) -> Option<Vec<u8>> {
        let mut items = self.items.lock().unwrap();
        if items.is_empty() {
            None
        } else {
            Some(items.remove(0))
        }
    }

    /// Emits a worker liveness event.
    pub(crate) fn emit(&self, kind: &str, task_id: Option<&str>) {
        let _ = self.events.send(WorkerEvent {
            kind: kind.to_string(),
            task_id: task_id.map(str::to_string),
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn enqueued_items(&self) -> Result<Vec<Vec<u8>>, QueueError> {
        Ok(self.items.lock().unwrap().clone())
    }

    async fn enqueue(&self, raw: Vec<u8>) -> Result<(), QueueError> {
        self.push(raw);
        Ok(())
    }

    async fn worker_events(&self) -> Result<broadcast::Receiver<WorkerEvent>, QueueError> {
        Ok(self.events.subscribe())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
