use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::ReceiverConfig;
use crate::error::{ReceiverBuildError, RouterError};
use crate::receiver::Receiver;

/// What to do when a new IMGF frame arrives and both buffer slots are
/// already occupied (one `Ready`, one still `Reading`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImgOverwritePolicy {
    /// Overwrite the slot holding the older `Ready` image — the consumer
    /// never sees it. Appropriate when only the latest map image matters.
    DropOld,
    /// Keep both existing slots untouched and drop the incoming frame.
    /// Appropriate when a consumer is mid-render and a torn frame would
    /// be worse than a stale one.
    DropNew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Writing,
    Ready,
    Reading,
}

struct Slot {
    state: SlotState,
    len: usize,
    buf: Vec<u8>,
    seq: u32,
    generation: u32,
}

/// An opaque handle to a loaned `Reading` slot. Carries a generation
/// counter so a [`ImgfReceiver::release`] call against a slot that has
/// since been recycled is rejected instead of silently corrupting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImgToken {
    slot: usize,
    generation: u32,
}

/// Zero-copy double buffer for incoming map images: the router writes
/// directly into a preallocated slot, the consumer (render task) takes a
/// borrow of a `Ready` slot without copying, and releases it back to
/// `Free` when done.
///
/// Exactly two slots. No slot is ever resized after construction — the
/// `max_len` passed to [`ImgfReceiver::new`] must already match the
/// router's payload buffer bound for this magic.
pub struct ImgfReceiver {
    magic: u32,
    require_crc: bool,
    slots: Mutex<[Slot; 2]>,
}

impl ImgfReceiver {
    pub fn new(magic: u32, require_crc: bool, max_len: usize) -> Result<Self, ReceiverBuildError> {
        if max_len == 0 {
            return Err(ReceiverBuildError::BufferTooSmall);
        }
        Ok(Self {
            magic,
            require_crc,
            slots: Mutex::new([
                Slot { state: SlotState::Free, len: 0, buf: vec![0u8; max_len], seq: 0, generation: 0 },
                Slot { state: SlotState::Free, len: 0, buf: vec![0u8; max_len], seq: 0, generation: 0 },
            ]),
        })
    }

    /// Build from a [`ReceiverConfig`]. `queue_depth` is ignored — this
    /// receiver is always exactly two slots, per its double-buffer
    /// contract.
    pub fn from_config(magic: u32, config: &ReceiverConfig) -> Result<Self, ReceiverBuildError> {
        config.validate()?;
        Self::new(magic, config.require_crc, config.max_len)
    }

    /// Try to hand out the newest `Ready` slot without copying, moving it
    /// to `Reading`. Returns `None` if no slot is ready.
    pub fn try_take(&self) -> Option<(ImgToken, u32, Vec<u8>)> {
        let mut slots = self.slots.lock().unwrap();
        let idx = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state == SlotState::Ready)
            .max_by_key(|(_, s)| s.seq)
            .map(|(i, _)| i)?;
        slots[idx].state = SlotState::Reading;
        let token = ImgToken { slot: idx, generation: slots[idx].generation };
        let seq = slots[idx].seq;
        let bytes = slots[idx].buf[..slots[idx].len].to_vec();
        Some((token, seq, bytes))
    }

    /// Return a previously taken slot to `Free`. A token from a slot that
    /// has since been recycled (generation mismatch) is ignored rather
    /// than panicking — the consumer is racing a buffer it no longer owns.
    pub fn release(&self, token: ImgToken) {
        let mut slots = self.slots.lock().unwrap();
        let slot = &mut slots[token.slot];
        if slot.generation == token.generation && slot.state == SlotState::Reading {
            slot.state = SlotState::Free;
        }
    }

    fn write_into(&self, policy: ImgOverwritePolicy, seq: u32, payload: &[u8]) -> Result<(), RouterError> {
        let mut slots = self.slots.lock().unwrap();

        let target = slots.iter().position(|s| s.state == SlotState::Free).or_else(|| {
            match policy {
                ImgOverwritePolicy::DropOld => slots
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.state == SlotState::Ready)
                    .min_by_key(|(_, s)| s.seq)
                    .map(|(i, _)| i),
                ImgOverwritePolicy::DropNew => None,
            }
        });

        let Some(idx) = target else {
            trace!(seq, "no free imgf slot, dropping incoming frame (DropNew policy)");
            return Err(RouterError::NoBuffer);
        };

        let slot = &mut slots[idx];
        slot.state = SlotState::Writing;
        slot.buf[..payload.len()].copy_from_slice(payload);
        slot.len = payload.len();
        slot.seq = seq;
        slot.generation = slot.generation.wrapping_add(1);
        slot.state = SlotState::Ready;
        Ok(())
    }
}

/// Adapter implementing [`Receiver`] over a fixed [`ImgOverwritePolicy`],
/// since the trait itself carries no per-call arguments beyond the frame.
pub struct PolicedImgfReceiver {
    pub inner: std::sync::Arc<ImgfReceiver>,
    pub policy: ImgOverwritePolicy,
}

impl PolicedImgfReceiver {
    /// Build an [`ImgfReceiver`] plus its policy wrapper from a single
    /// [`ReceiverConfig`], taking `drop_policy` from the config instead
    /// of requiring a separate argument.
    pub fn from_config(magic: u32, config: &ReceiverConfig) -> Result<Self, ReceiverBuildError> {
        let inner = std::sync::Arc::new(ImgfReceiver::from_config(magic, config)?);
        Ok(Self { inner, policy: config.drop_policy })
    }
}

impl Receiver for PolicedImgfReceiver {
    fn magic(&self) -> u32 {
        self.inner.magic
    }

    fn require_crc(&self) -> bool {
        self.inner.require_crc
    }

    fn on_frame(&mut self, seq: u32, payload: &[u8]) -> Result<(), RouterError> {
        if payload.len() > self.inner.slots.lock().unwrap()[0].buf.len() {
            return Err(RouterError::BadLen(payload.len() as u32));
        }
        self.inner.write_into(self.policy, seq, payload)
    }
}
