use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use observability_deps::tracing::warn;
use parking_lot::Mutex;
use repl_tracker::IdGenerator;
use repl_types::WorkerName;

use crate::worker_queue::{self, WorkerQueueHandle};
use crate::{MessengerError, Transport};

/// Single point every outbound request passes through on its way to a
/// worker. One ordered queue is maintained per worker: within a worker,
/// delivery is strict FIFO, and `priority` only reorders items still
/// waiting in that queue. It never reorders past whatever is already in
/// flight, and it has no visibility across workers at all.
#[derive(Debug)]
pub struct Messenger {
    transport: Arc<dyn Transport>,
    queues: Mutex<HashMap<WorkerName, WorkerQueueHandle>>,
    seq: IdGenerator,
}

impl Messenger {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            queues: Mutex::new(HashMap::new()),
            seq: IdGenerator::default(),
        }
    }

    fn handle_for(&self, worker: &WorkerName) -> WorkerQueueHandle {
        let mut queues = self.queues.lock();
        queues
            .entry(worker.clone())
            .or_insert_with(|| worker_queue::spawn(worker.clone(), Arc::clone(&self.transport)))
            .clone()
    }

    /// Enqueues `body` for delivery to `worker` and awaits the matched
    /// response. Two requests to the same worker with equal priority are
    /// delivered in the order `send` was called; a higher-priority request
    /// queued later still cuts ahead of lower-priority work still waiting.
    pub async fn send(
        &self,
        worker: &WorkerName,
        request_id: impl Into<String>,
        body: Bytes,
        priority: i32,
    ) -> Result<Bytes, MessengerError> {
        let handle = self.handle_for(worker);
        let seq = self.seq.next();
        let reply_rx = handle.send(request_id.into(), body, priority, seq)?;
        reply_rx.await.map_err(|_| MessengerError::ChannelClosed)?
    }

    /// Removes `request_id` from `worker`'s queue if it is still waiting,
    /// and best-effort notifies the worker in case it is already in
    /// flight. A request that has already completed is a silent no-op:
    /// the caller's `send` future has already resolved by then.
    pub async fn cancel(&self, worker: &WorkerName, request_id: &str) -> Result<(), MessengerError> {
        let handle = {
            let queues = self.queues.lock();
            queues.get(worker).cloned()
        };
        if let Some(handle) = handle {
            // Errors here just mean the item already left the queue
            // (dispatched or already completed); that's not a failure of
            // cancellation, it just means there is nothing left to cancel.
            let _ = handle.cancel(request_id.to_string());
        }
        if let Err(err) = self.transport.send_stop(worker, request_id).await {
            warn!(%worker, request_id, %err, "best-effort stop notification failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Debug)]
    struct RecordingTransport {
        order: AsyncMutex<Vec<String>>,
        delay: Duration,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, _worker: &WorkerName, body: Bytes) -> Result<Bytes, MessengerError> {
            tokio::time::sleep(self.delay).await;
            let label = String::from_utf8(body.to_vec()).unwrap();
            self.order.lock().await.push(label.clone());
            Ok(Bytes::from(label))
        }

        async fn send_stop(&self, _worker: &WorkerName, _target_request_id: &str) -> Result<(), MessengerError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn same_worker_sends_are_fifo() {
        let transport = Arc::new(RecordingTransport {
            order: AsyncMutex::new(Vec::new()),
            delay: Duration::from_millis(5),
        });
        let messenger = Messenger::new(transport.clone());
        let worker = WorkerName::new("worker-1");

        let a = messenger.send(&worker, "a", Bytes::from_static(b"a"), 0);
        let b = messenger.send(&worker, "b", Bytes::from_static(b"b"), 0);
        let c = messenger.send(&worker, "c", Bytes::from_static(b"c"), 0);
        let (ra, rb, rc) = tokio::join!(a, b, c);
        ra.unwrap();
        rb.unwrap();
        rc.unwrap();

        assert_eq!(*transport.order.lock().await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn higher_priority_cuts_ahead_of_queued_not_in_flight() {
        let transport = Arc::new(RecordingTransport {
            order: AsyncMutex::new(Vec::new()),
            delay: Duration::from_millis(20),
        });
        let messenger = Arc::new(Messenger::new(transport.clone()));
        let worker = WorkerName::new("worker-1");

        // First send starts immediately and occupies the single in-flight
        // slot; the next two are queued while it runs.
        let first = {
            let messenger = messenger.clone();
            let worker = worker.clone();
            tokio::spawn(async move { messenger.send(&worker, "low-0", Bytes::from_static(b"low-0"), 0).await })
        };
        tokio::time::sleep(Duration::from_millis(2)).await;

        let low = {
            let messenger = messenger.clone();
            let worker = worker.clone();
            tokio::spawn(async move { messenger.send(&worker, "low-1", Bytes::from_static(b"low-1"), 0).await })
        };
        let high = {
            let messenger = messenger.clone();
            let worker = worker.clone();
            tokio::spawn(async move { messenger.send(&worker, "high", Bytes::from_static(b"high"), 10).await })
        };

        first.await.unwrap().unwrap();
        low.await.unwrap().unwrap();
        high.await.unwrap().unwrap();

        let order = transport.order.lock().await.clone();
        assert_eq!(order[0], "low-0");
        assert_eq!(order[1], "high");
        assert_eq!(order[2], "low-1");
    }

    #[tokio::test]
    async fn cancel_removes_a_still_queued_item() {
        let transport = Arc::new(RecordingTransport {
            order: AsyncMutex::new(Vec::new()),
            delay: Duration::from_millis(20),
        });
        let messenger = Arc::new(Messenger::new(transport.clone()));
        let worker = WorkerName::new("worker-1");

        let _first = {
            let messenger = messenger.clone();
            let worker = worker.clone();
            tokio::spawn(async move { messenger.send(&worker, "first", Bytes::from_static(b"first"), 0).await })
        };
        tokio::time::sleep(Duration::from_millis(2)).await;

        let messenger2 = messenger.clone();
        let worker2 = worker.clone();
        let cancelled = tokio::spawn(async move {
            messenger2.send(&worker2, "to-cancel", Bytes::from_static(b"to-cancel"), 0).await
        });
        tokio::time::sleep(Duration::from_millis(2)).await;
        messenger.cancel(&worker, "to-cancel").await.unwrap();

        let result = cancelled.await.unwrap();
        assert!(matches!(result, Err(MessengerError::Cancelled)));
    }

    #[tokio::test]
    async fn distinct_workers_do_not_block_each_other() {
        let calls = Arc::new(AtomicUsize::new(0));
        #[derive(Debug)]
        struct CountingTransport {
            calls: Arc<AtomicUsize>,
        }
        #[async_trait]
        impl Transport for CountingTransport {
            async fn send(&self, _worker: &WorkerName, body: Bytes) -> Result<Bytes, MessengerError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(body)
            }
            async fn send_stop(&self, _worker: &WorkerName, _target_request_id: &str) -> Result<(), MessengerError> {
                Ok(())
            }
        }

        let transport = Arc::new(CountingTransport { calls: calls.clone() });
        let messenger = Messenger::new(transport);
        let w1 = WorkerName::new("worker-1");
        let w2 = WorkerName::new("worker-2");

        let a = messenger.send(&w1, "a", Bytes::from_static(b"a"), 0);
        let b = messenger.send(&w2, "b", Bytes::from_static(b"b"), 0);
        let (ra, rb) = tokio::join!(a, b);
        ra.unwrap();
        rb.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
