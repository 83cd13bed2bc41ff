use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use bytes::Bytes;
use observability_deps::tracing::{debug, warn};
use repl_types::WorkerName;
use tokio::sync::{mpsc, oneshot};

use crate::{MessengerError, Transport};

/// One queued send, ordered by priority then by arrival (`seq`), so that
/// priority only ever reorders items still waiting behind the one
/// currently in flight.
struct QueueItem {
    request_id: String,
    body: Bytes,
    priority: i32,
    seq: u64,
    reply: oneshot::Sender<Result<Bytes, MessengerError>>,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority first, and for equal
        // priority the earlier (smaller) seq wins, i.e. FIFO.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub(crate) enum QueueCommand {
    Send(QueueItem),
    Cancel { request_id: String },
}

/// Handle to a running worker queue task. Dropping the last handle closes
/// the command channel, which unblocks the task's receive loop and lets
/// it drain.
#[derive(Debug, Clone)]
pub(crate) struct WorkerQueueHandle {
    tx: mpsc::UnboundedSender<QueueCommand>,
}

impl WorkerQueueHandle {
    pub(crate) fn send(
        &self,
        request_id: String,
        body: Bytes,
        priority: i32,
        seq: u64,
    ) -> Result<oneshot::Receiver<Result<Bytes, MessengerError>>, MessengerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(QueueCommand::Send(QueueItem {
                request_id,
                body,
                priority,
                seq,
                reply: reply_tx,
            }))
            .map_err(|_| MessengerError::ChannelClosed)?;
        Ok(reply_rx)
    }

    pub(crate) fn cancel(&self, request_id: String) -> Result<(), MessengerError> {
        self.tx
            .send(QueueCommand::Cancel { request_id })
            .map_err(|_| MessengerError::ChannelClosed)
    }
}

/// Spawns the actor task owning `worker`'s outbound queue and returns a
/// handle to it. One task per worker is the whole of the per-worker FIFO
/// guarantee: as long as a single task owns the single in-flight send,
/// no second send can race ahead of it.
pub(crate) fn spawn(worker: WorkerName, transport: Arc<dyn Transport>) -> WorkerQueueHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(worker, transport, rx));
    WorkerQueueHandle { tx }
}

async fn run(worker: WorkerName, transport: Arc<dyn Transport>, mut rx: mpsc::UnboundedReceiver<QueueCommand>) {
    let mut heap: BinaryHeap<QueueItem> = BinaryHeap::new();

    loop {
        // Block for at least one command when idle; once something is
        // queued, drain every command already sitting in the channel
        // before picking the next item to send, so a burst of cancels
        // sent just after the matching sends never races the dispatch.
        let Some(cmd) = rx.recv().await else {
            break;
        };
        apply(cmd, &mut heap);
        while let Ok(cmd) = rx.try_recv() {
            apply(cmd, &mut heap);
        }

        let Some(item) = heap.pop() else {
            continue;
        };

        debug!(%worker, request_id = %item.request_id, priority = item.priority, "dispatching to worker");
        let outcome = transport.send(&worker, item.body).await;
        if item.reply.send(outcome).is_err() {
            warn!(%worker, request_id = %item.request_id, "reply receiver dropped before response delivered");
        }
    }

    // Channel closed: fail everything left waiting rather than dropping
    // the reply silently, so a caller awaiting a oneshot always resolves.
    while let Some(item) = heap.pop() {
        let _ = item.reply.send(Err(MessengerError::ChannelClosed));
    }
}

fn apply(cmd: QueueCommand, heap: &mut BinaryHeap<QueueItem>) {
    match cmd {
        QueueCommand::Send(item) => heap.push(item),
        QueueCommand::Cancel { request_id } => {
            let mut items: Vec<QueueItem> = std::mem::take(heap).into_vec();
            if let Some(pos) = items.iter().position(|i| i.request_id == request_id) {
                let item = items.remove(pos);
                let _ = item.reply.send(Err(MessengerError::Cancelled));
            }
            *heap = items.into();
        }
    }
}
