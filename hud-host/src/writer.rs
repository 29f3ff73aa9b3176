use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::error::HudError;
use crate::listener::HudListener;
use crate::transport::HudTransport;

/// The three outbound channels, ordered low-to-high priority. CTRL frames
/// (reboot, reinit) always jump ahead of telemetry and map data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Ctrl,
    Msgf,
    Imgf,
}

impl Channel {
    fn priority(self) -> u8 {
        match self {
            Channel::Ctrl => 0,
            Channel::Msgf => 1,
            Channel::Imgf => 2,
        }
    }
}

/// A fully-encoded frame waiting to be written, plus enough metadata for the
/// priority queue and the per-channel replacement policies.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub channel: Channel,
    pub bytes: Vec<u8>,
    order: u64,
}

impl PartialEq for OutboundFrame {
    fn eq(&self, other: &Self) -> bool {
        self.channel.priority() == other.channel.priority() && self.order == other.order
    }
}
impl Eq for OutboundFrame {}

impl Ord for OutboundFrame {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert both fields so that lower
        // priority number and lower order (older, FIFO within a channel)
        // sort to the top.
        other
            .channel
            .priority()
            .cmp(&self.channel.priority())
            .then_with(|| other.order.cmp(&self.order))
    }
}
impl PartialOrd for OutboundFrame {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct WriterCounters {
    pub sent_msg: AtomicU64,
    pub sent_img: AtomicU64,
    pub sent_cmd: AtomicU64,
    pub dropped: AtomicU64,
    pub errors: AtomicU64,
}

struct Queue {
    heap: BinaryHeap<OutboundFrame>,
    next_order: u64,
}

/// Single outstanding MSGF telemetry frame and single outstanding IMGF
/// frame, plus an unbounded CTRL backlog, served strictly by channel
/// priority and drained by one background writer task.
///
/// CTRL always appends (commands must not be lost to a replacement
/// policy). MSGF keeps only the newest snapshot — an older one queued
/// behind it is stale the instant a fresher one lands. IMGF is a short
/// bounded queue; once full, the oldest queued image is evicted to make
/// room for the new one rather than blocking the scheduler.
pub struct PrioritizedWriter {
    queue: Mutex<Queue>,
    notify: Notify,
    img_capacity: usize,
    counters: WriterCounters,
    listener: Arc<dyn HudListener>,
}

impl PrioritizedWriter {
    pub fn new(img_capacity: usize, listener: Arc<dyn HudListener>) -> Self {
        Self {
            queue: Mutex::new(Queue { heap: BinaryHeap::new(), next_order: 0 }),
            notify: Notify::new(),
            img_capacity,
            counters: WriterCounters::default(),
            listener,
        }
    }

    pub fn counters(&self) -> &WriterCounters {
        &self.counters
    }

    /// Queue depth across all channels, for diagnostics.
    pub fn queue_depth(&self) -> usize {
        self.queue.lock().unwrap().heap.len()
    }

    fn push(&self, channel: Channel, bytes: Vec<u8>) {
        let mut q = self.queue.lock().unwrap();
        let order = q.next_order;
        q.next_order += 1;
        q.heap.push(OutboundFrame { channel, bytes, order });
        drop(q);
        self.notify.notify_one();
    }

    /// CTRL frames always append; the backlog is small by construction
    /// (commands are rare) so it is never trimmed.
    pub fn enqueue_ctrl(&self, bytes: Vec<u8>) {
        self.push(Channel::Ctrl, bytes);
    }

    /// MSGF keeps at most one queued frame: a newly enqueued snapshot
    /// replaces any snapshot still waiting to be written, and the
    /// replaced one counts as dropped rather than sent.
    pub fn enqueue_msgf(&self, bytes: Vec<u8>) {
        let mut q = self.queue.lock().unwrap();
        let mut replaced = false;
        q.heap.retain(|f| {
            if f.channel == Channel::Msgf {
                replaced = true;
                false
            } else {
                true
            }
        });
        let order = q.next_order;
        q.next_order += 1;
        q.heap.push(OutboundFrame { channel: Channel::Msgf, bytes, order });
        drop(q);
        if replaced {
            self.counters.dropped.fetch_add(1, AtomicOrdering::Relaxed);
            trace!("replaced a still-queued msgf frame with a newer one");
            self.listener.on_error(&HudError::FrameDropped {
                channel: Channel::Msgf,
                reason: "replace old snapshot",
            });
        }
        self.notify.notify_one();
    }

    /// IMGF is a bounded FIFO of `img_capacity` frames. Once full, the
    /// oldest queued image is evicted to make room for the new one.
    pub fn enqueue_imgf(&self, bytes: Vec<u8>) {
        let mut q = self.queue.lock().unwrap();
        let queued_imgf = q.heap.iter().filter(|f| f.channel == Channel::Imgf).count();
        if queued_imgf >= self.img_capacity {
            // Evict the oldest (lowest order) queued imgf frame.
            let mut rest: Vec<OutboundFrame> = Vec::with_capacity(q.heap.len());
            let mut oldest: Option<OutboundFrame> = None;
            for f in q.heap.drain() {
                if f.channel == Channel::Imgf
                    && oldest.as_ref().map_or(true, |o| f.order < o.order)
                {
                    if let Some(prev) = oldest.take() {
                        rest.push(prev);
                    }
                    oldest = Some(f);
                } else {
                    rest.push(f);
                }
            }
            q.heap = rest.into_iter().collect();
            self.counters.dropped.fetch_add(1, AtomicOrdering::Relaxed);
            self.listener.on_error(&HudError::FrameDropped {
                channel: Channel::Imgf,
                reason: "drop old image",
            });
        }
        let order = q.next_order;
        q.next_order += 1;
        q.heap.push(OutboundFrame { channel: Channel::Imgf, bytes, order });
        drop(q);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<OutboundFrame> {
        self.queue.lock().unwrap().heap.pop()
    }

    /// Drain the queue against `transport` until it is empty or
    /// `stop.notified()` fires, whichever the caller selects on. Intended
    /// to run as a single background task for the lifetime of the SDK.
    pub async fn run(&self, transport: &(dyn HudTransport + Send + Sync)) {
        loop {
            let Some(frame) = self.pop() else {
                self.notify.notified().await;
                continue;
            };
            let channel = frame.channel;
            match transport.write(&frame.bytes).await {
                Ok(()) => {
                    match channel {
                        Channel::Ctrl => self.counters.sent_cmd.fetch_add(1, AtomicOrdering::Relaxed),
                        Channel::Msgf => self.counters.sent_msg.fetch_add(1, AtomicOrdering::Relaxed),
                        Channel::Imgf => self.counters.sent_img.fetch_add(1, AtomicOrdering::Relaxed),
                    };
                    debug!(?channel, bytes = frame.bytes.len(), "frame written");
                }
                Err(e) => {
                    self.counters.errors.fetch_add(1, AtomicOrdering::Relaxed);
                    warn!(?channel, error = %e, "transport write failed");
                    self.listener.on_error(&HudError::TransportWrite(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::mock::RecordingListener;

    fn writer(img_capacity: usize) -> (PrioritizedWriter, Arc<RecordingListener>) {
        let listener = Arc::new(RecordingListener::default());
        (PrioritizedWriter::new(img_capacity, listener.clone()), listener)
    }

    #[test]
    fn ctrl_outranks_msgf_and_imgf() {
        let (w, _listener) = writer(4);
        w.enqueue_imgf(vec![3]);
        w.enqueue_msgf(vec![2]);
        w.enqueue_ctrl(vec![1]);
        assert_eq!(w.pop().unwrap().channel, Channel::Ctrl);
        assert_eq!(w.pop().unwrap().channel, Channel::Msgf);
        assert_eq!(w.pop().unwrap().channel, Channel::Imgf);
    }

    #[test]
    fn fifo_within_same_channel() {
        let (w, _listener) = writer(4);
        w.enqueue_ctrl(vec![1]);
        w.enqueue_ctrl(vec![2]);
        assert_eq!(w.pop().unwrap().bytes, vec![1]);
        assert_eq!(w.pop().unwrap().bytes, vec![2]);
    }

    #[test]
    fn msgf_replace_keeps_only_newest() {
        let (w, listener) = writer(4);
        w.enqueue_msgf(vec![1]);
        w.enqueue_msgf(vec![2]);
        w.enqueue_msgf(vec![3]);
        assert_eq!(w.queue_depth(), 1);
        assert_eq!(w.pop().unwrap().bytes, vec![3]);
        assert_eq!(w.counters().dropped.load(AtomicOrdering::Relaxed), 2);
        assert_eq!(listener.errors.lock().unwrap().len(), 2);
    }

    #[test]
    fn imgf_bounded_queue_evicts_oldest() {
        let (w, listener) = writer(2);
        w.enqueue_imgf(vec![1]);
        w.enqueue_imgf(vec![2]);
        w.enqueue_imgf(vec![3]);
        assert_eq!(w.queue_depth(), 2);
        assert_eq!(w.pop().unwrap().bytes, vec![2]);
        assert_eq!(w.pop().unwrap().bytes, vec![3]);
        assert_eq!(w.counters().dropped.load(AtomicOrdering::Relaxed), 1);
        assert_eq!(listener.errors.lock().unwrap().len(), 1);
    }
}
