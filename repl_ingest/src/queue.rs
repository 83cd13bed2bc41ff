use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use repl_types::ContributionId;
use tokio::sync::Notify;

use crate::request::ContributionRequest;

struct Entry {
    priority: i32,
    sequence: u64,
    id: ContributionId,
    request: ContributionRequest,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    /// `BinaryHeap` is a max-heap: higher priority pops first, ties broken
    /// in submission order (earlier sequence wins, so same-priority
    /// requests run FIFO).
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority).then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// The in-memory ready queue ASYNC-mode worker tasks drain. Not persisted:
/// on process restart, any contribution left `InProgress` without a
/// corresponding queue entry is a known gap (see `DESIGN.md`).
#[derive(Debug, Default)]
pub struct Queue {
    heap: Mutex<BinaryHeap<Entry>>,
    notify: Notify,
    next_sequence: AtomicU64,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, id: ContributionId, request: ContributionRequest) {
        let sequence = self.next_sequence.fetch_add(1, AtomicOrdering::Relaxed);
        self.heap.lock().push(Entry { priority: request.priority, sequence, id, request });
        self.notify.notify_one();
    }

    /// Removes `id` if it is still queued (not yet dispatched to a worker).
    pub fn remove(&self, id: ContributionId) -> bool {
        let mut heap = self.heap.lock();
        let before = heap.len();
        let retained: BinaryHeap<Entry> = heap.drain().filter(|e| e.id != id).collect();
        *heap = retained;
        heap.len() != before
    }

    /// Pops the highest-priority ready request, waiting if the queue is
    /// empty.
    pub async fn pop(&self) -> (ContributionId, ContributionRequest) {
        loop {
            if let Some(entry) = self.heap.lock().pop() {
                return (entry.id, entry.request);
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repl_types::{ChunkNumber, Dialect, TransactionId, WorkerName};

    fn request(priority: i32) -> ContributionRequest {
        ContributionRequest {
            transaction_id: TransactionId::new(1),
            worker: WorkerName::from("w1"),
            table: "Object".into(),
            chunk: ChunkNumber::new(1),
            is_overlap: false,
            url: "file:///tmp/x.csv".into(),
            dialect: Dialect::default(),
            priority,
            retry_budget: 0,
        }
    }

    #[tokio::test]
    async fn higher_priority_pops_first() {
        let queue = Queue::new();
        queue.push(ContributionId::new(1), request(0));
        queue.push(ContributionId::new(2), request(5));
        let (id, _) = queue.pop().await;
        assert_eq!(id, ContributionId::new(2));
    }

    #[tokio::test]
    async fn same_priority_is_fifo() {
        let queue = Queue::new();
        queue.push(ContributionId::new(1), request(0));
        queue.push(ContributionId::new(2), request(0));
        let (first, _) = queue.pop().await;
        let (second, _) = queue.pop().await;
        assert_eq!(first, ContributionId::new(1));
        assert_eq!(second, ContributionId::new(2));
    }

    #[tokio::test]
    async fn remove_drops_a_still_queued_entry() {
        let queue = Queue::new();
        queue.push(ContributionId::new(1), request(0));
        assert!(queue.remove(ContributionId::new(1)));
        assert!(queue.is_empty());
        assert!(!queue.remove(ContributionId::new(1)));
    }

    #[tokio::test]
    async fn pop_waits_for_a_push() {
        let queue = std::sync::Arc::new(Queue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::task::yield_now().await;
        queue.push(ContributionId::new(7), request(0));
        let (id, _) = waiter.await.unwrap();
        assert_eq!(id, ContributionId::new(7));
    }
}
