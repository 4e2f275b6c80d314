// Bounded inter-stage queue with drop-oldest overflow (§5).
//
// crossbeam_channel's `bounded` gives us the FIFO + multi-producer/consumer
// plumbing; it does not give drop-oldest semantics on a full channel (a plain
// `try_send` just fails). We get drop-oldest by popping one element off the
// receive side before retrying the send — this is the only back-pressure
// policy in the system: no stage ever blocks on a full downstream queue.

use crossbeam_channel::{Receiver, Sender, TrySendError};

#[derive(Clone)]
pub struct DropOldestSender<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

/// Creates a bounded queue that overflows by dropping the oldest queued item.
pub fn bounded<T>(capacity: usize) -> (DropOldestSender<T>, Receiver<T>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (
        DropOldestSender {
            tx,
            rx: rx.clone(),
        },
        rx,
    )
}

impl<T> DropOldestSender<T> {
    /// Enqueue `item`, dropping the oldest queued element if the queue is
    /// full. Returns the number of elements evicted to make room (0 or 1 in
    /// the common case; more if a consumer is not draining at all and
    /// `capacity` changed concurrently, which cannot happen here since
    /// capacity is fixed at construction).
    pub fn send(&self, item: T) -> usize {
        let mut evicted = 0;
        let mut item = item;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return evicted,
                Err(TrySendError::Full(returned)) => {
                    item = returned;
                    // Best-effort: another thread may drain concurrently, in
                    // which case this recv() either removes the oldest item
                    // (as intended) or races with the consumer and removes
                    // nothing useful — either way the subsequent try_send
                    // either succeeds or the loop retries.
                    if self.rx.try_recv().is_ok() {
                        evicted += 1;
                    }
                }
                Err(TrySendError::Disconnected(_)) => return evicted,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}
