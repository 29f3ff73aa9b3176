use std::sync::Mutex;

use crate::config::ReceiverConfig;
use crate::error::{ReceiverBuildError, RouterError};
use crate::receiver::Receiver;

struct Slot {
    occupied: bool,
    len: usize,
    buf: Vec<u8>,
    seq: u32,
}

/// Fixed pool of message slots, written round-robin as MSGF frames
/// arrive and drained in the same order by `pop`. Unlike
/// [`crate::imgf::ImgfReceiver`] there is no exclusive loan: a full
/// slot is simply overwritten once the write cursor comes back around,
/// so a slow consumer silently loses the oldest unread message rather
/// than blocking the router.
pub struct MsgfReceiver {
    magic: u32,
    require_crc: bool,
    slots: Mutex<Vec<Slot>>,
    write_cursor: Mutex<usize>,
    read_cursor: Mutex<usize>,
}

impl MsgfReceiver {
    pub fn new(magic: u32, require_crc: bool, slot_count: usize, max_len: usize) -> Result<Self, ReceiverBuildError> {
        if slot_count == 0 {
            return Err(ReceiverBuildError::ZeroSlots);
        }
        if max_len == 0 {
            return Err(ReceiverBuildError::BufferTooSmall);
        }
        let slots = (0..slot_count)
            .map(|_| Slot { occupied: false, len: 0, buf: vec![0u8; max_len], seq: 0 })
            .collect();
        Ok(Self {
            magic,
            require_crc,
            slots: Mutex::new(slots),
            write_cursor: Mutex::new(0),
            read_cursor: Mutex::new(0),
        })
    }

    /// Build from a [`ReceiverConfig`]; `queue_depth` becomes the slot
    /// count, `drop_policy` is ignored (this receiver's overwrite rule
    /// is fixed: oldest unread slot loses).
    pub fn from_config(magic: u32, config: &ReceiverConfig) -> Result<Self, ReceiverBuildError> {
        config.validate()?;
        Self::new(magic, config.require_crc, config.queue_depth, config.max_len)
    }

    fn write(&self, seq: u32, payload: &[u8]) -> Result<(), RouterError> {
        let mut slots = self.slots.lock().unwrap();
        if payload.len() > slots[0].buf.len() {
            return Err(RouterError::BadLen(payload.len() as u32));
        }
        let mut cursor = self.write_cursor.lock().unwrap();
        let slot = &mut slots[*cursor];
        slot.buf[..payload.len()].copy_from_slice(payload);
        slot.len = payload.len();
        slot.seq = seq;
        slot.occupied = true;
        *cursor = (*cursor + 1) % slots.len();
        Ok(())
    }

    /// Non-blocking pop of the oldest unread slot, following the write
    /// cursor's rotation. Returns `None` if the read cursor has caught up
    /// to an empty (never-written or already-read) slot.
    pub fn pop(&self) -> Option<(u32, Vec<u8>)> {
        let mut slots = self.slots.lock().unwrap();
        let mut cursor = self.read_cursor.lock().unwrap();
        let slot = &mut slots[*cursor];
        if !slot.occupied {
            return None;
        }
        let seq = slot.seq;
        let bytes = slot.buf[..slot.len].to_vec();
        slot.occupied = false;
        *cursor = (*cursor + 1) % slots.len();
        Some((seq, bytes))
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().iter().filter(|s| s.occupied).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Receiver for MsgfReceiver {
    fn magic(&self) -> u32 {
        self.magic
    }

    fn require_crc(&self) -> bool {
        self.require_crc
    }

    fn on_frame(&mut self, seq: u32, payload: &[u8]) -> Result<(), RouterError> {
        self.write(seq, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_returns_frames_in_write_order() {
        let mut recv = MsgfReceiver::new(1, false, 3, 16).unwrap();
        recv.on_frame(1, b"a").unwrap();
        recv.on_frame(2, b"b").unwrap();
        assert_eq!(recv.pop().unwrap().1, b"a");
        assert_eq!(recv.pop().unwrap().1, b"b");
        assert!(recv.pop().is_none());
    }

    #[test]
    fn overfull_pool_overwrites_the_oldest_unread_slot() {
        let mut recv = MsgfReceiver::new(1, false, 2, 16).unwrap();
        recv.on_frame(1, b"a").unwrap();
        recv.on_frame(2, b"b").unwrap();
        recv.on_frame(3, b"c").unwrap(); // overwrites slot holding "a"
        assert_eq!(recv.pop().unwrap().1, b"c");
        assert_eq!(recv.pop().unwrap().1, b"b");
        assert!(recv.pop().is_none());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut recv = MsgfReceiver::new(1, false, 2, 4).unwrap();
        assert_eq!(recv.on_frame(1, b"too long"), Err(RouterError::BadLen(8)));
    }
}
