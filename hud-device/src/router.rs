use std::collections::HashMap;

use hud_wire::{FrameHeader, HEADER_LEN};
use tracing::{trace, warn};

use crate::config::RouterConfig;
use crate::error::{ReceiverBuildError, RouterError};
use crate::receiver::Receiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Sync,
    Header,
    Payload,
}

/// A byte-at-a-time framer sitting in front of the magic-keyed receiver
/// registry. Feeds raw bytes in from whatever physical transport the
/// embedding firmware uses and dispatches a complete frame to the
/// matching [`Receiver`] once one has been reassembled.
///
/// Three states: `Sync` scans for a recognized 4-byte magic one byte at
/// a time (so a single corrupted byte mid-stream costs at most one
/// resync, not a whole frame); `Header` accumulates the remaining
/// header bytes once a magic has been matched; `Payload` accumulates
/// `header.len` payload bytes into a buffer sized once at construction.
/// A payload that would not fit is a [`RouterError::BadLen`] and the
/// router resyncs rather than reading past its buffer.
pub struct StreamRouter {
    state: State,
    header_buf: [u8; HEADER_LEN],
    header_filled: usize,
    payload_buf: Vec<u8>,
    payload_filled: usize,
    header: Option<FrameHeader>,
    receivers: HashMap<u32, Box<dyn Receiver + Send>>,
    default_receiver: Option<Box<dyn Receiver + Send>>,
    resync_count: u64,
    frames_ok: u64,
    frames_bad: u64,
}

impl StreamRouter {
    /// `max_payload_len` bounds the preallocated payload buffer; any
    /// frame declaring a longer payload is rejected with `BadLen`
    /// without ever growing the buffer.
    pub fn new(max_payload_len: usize) -> Result<Self, ReceiverBuildError> {
        if max_payload_len == 0 {
            return Err(ReceiverBuildError::BufferTooSmall);
        }
        Ok(Self {
            state: State::Sync,
            header_buf: [0u8; HEADER_LEN],
            header_filled: 0,
            payload_buf: vec![0u8; max_payload_len],
            payload_filled: 0,
            header: None,
            receivers: HashMap::new(),
            default_receiver: None,
            resync_count: 0,
            frames_ok: 0,
            frames_bad: 0,
        })
    }

    /// Build a router from a [`RouterConfig`] rather than a bare length.
    pub fn from_config(config: &RouterConfig) -> Result<Self, ReceiverBuildError> {
        config.validate()?;
        Self::new(config.max_payload_len)
    }

    pub fn register(&mut self, receiver: Box<dyn Receiver + Send>) {
        self.receivers.insert(receiver.magic(), receiver);
    }

    /// Register a fallback receiver invoked for any magic with no exact
    /// match in the registry, instead of returning `NoReceiver`.
    pub fn register_default(&mut self, receiver: Box<dyn Receiver + Send>) {
        self.default_receiver = Some(receiver);
    }

    pub fn resync_count(&self) -> u64 {
        self.resync_count
    }

    pub fn frames_ok(&self) -> u64 {
        self.frames_ok
    }

    pub fn frames_bad(&self) -> u64 {
        self.frames_bad
    }

    fn resync(&mut self) {
        self.state = State::Sync;
        self.header_filled = 0;
        self.payload_filled = 0;
        self.header = None;
        self.resync_count += 1;
    }

    /// Feed one incoming byte. Called from the firmware's RX interrupt
    /// handler or read loop; never allocates. Returns `Ok(())` for a byte
    /// that didn't complete a frame as well as for one that completed and
    /// dispatched cleanly — only a reassembled-but-rejected frame is an
    /// `Err`, after which the router has already resynced.
    pub fn feed_byte(&mut self, byte: u8) -> Result<(), RouterError> {
        match self.state {
            State::Sync => {
                if self.header_filled == 0 && !matches!(byte, b'M' | b'I') {
                    return Ok(());
                }
                self.header_buf[self.header_filled] = byte;
                self.header_filled += 1;
                if self.header_filled == 4 {
                    if self.header_buf[0..4] == hud_wire::MAGIC_MSGF.to_le_bytes()[..]
                        || self.header_buf[0..4] == hud_wire::MAGIC_IMGF.to_le_bytes()[..]
                    {
                        self.state = State::Header;
                    } else {
                        // Slide the window by one byte rather than
                        // discarding all four: a partial match can still
                        // complete starting at byte index 1.
                        self.header_buf.copy_within(1..4, 0);
                        self.header_filled = 3;
                    }
                }
                Ok(())
            }
            State::Header => {
                self.header_buf[self.header_filled] = byte;
                self.header_filled += 1;
                if self.header_filled != HEADER_LEN {
                    return Ok(());
                }
                let header = match FrameHeader::parse(&self.header_buf) {
                    Ok(header) => header,
                    Err(_) => {
                        self.frames_bad += 1;
                        self.resync();
                        // An unparseable header only happens if a magic
                        // matched bytes that then fail range checks hud-wire
                        // doesn't actually impose today; kept as a guard
                        // against a future stricter `FrameHeader::parse`.
                        return Ok(());
                    }
                };
                if header.len == 0 || header.len as usize > self.payload_buf.len() {
                    warn!(len = header.len, "frame rejected by length, resyncing");
                    self.frames_bad += 1;
                    self.resync();
                    return Err(RouterError::BadLen(header.len));
                }
                self.header = Some(header);
                self.state = State::Payload;
                Ok(())
            }
            State::Payload => {
                self.payload_buf[self.payload_filled] = byte;
                self.payload_filled += 1;
                // Payload is only ever entered right after `self.header`
                // is set; `None` here would mean the state machine itself
                // is broken, so resync rather than trust a bad header.
                let Some(header) = self.header else {
                    self.resync();
                    return Err(RouterError::NoBuffer);
                };
                if self.payload_filled == header.len as usize {
                    let result = self.dispatch(header, &self.payload_buf[..self.payload_filled]);
                    self.resync_clean();
                    result
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Feed a run of bytes, stopping neither at a resync nor at a
    /// per-frame error — each byte is still delivered to the parser, but
    /// only the last frame's outcome in this slice is returned.
    pub fn feed_slice(&mut self, bytes: &[u8]) -> Result<(), RouterError> {
        let mut last = Ok(());
        for &b in bytes {
            let r = self.feed_byte(b);
            if r.is_err() {
                last = r;
            }
        }
        last
    }

    /// Reset parser state for the next frame without counting it as a
    /// resync — used after a clean dispatch, as opposed to [`Self::resync`]
    /// which is the error-recovery path.
    fn resync_clean(&mut self) {
        self.state = State::Sync;
        self.header_filled = 0;
        self.payload_filled = 0;
        self.header = None;
    }

    fn dispatch(&mut self, header: FrameHeader, payload: &[u8]) -> Result<(), RouterError> {
        let receiver: &mut (dyn Receiver + Send) = if self.receivers.contains_key(&header.magic) {
            self.receivers.get_mut(&header.magic).unwrap().as_mut()
        } else if let Some(default) = self.default_receiver.as_mut() {
            default.as_mut()
        } else {
            warn!(magic = header.magic, "no receiver registered for magic");
            self.frames_bad += 1;
            return Err(RouterError::NoReceiver(header.magic));
        };
        if receiver.require_crc() {
            let computed = crc32fast::hash(payload);
            if header.crc32 == 0 || header.crc32 != computed {
                warn!(expected = header.crc32, computed, "crc mismatch, dropping frame");
                self.frames_bad += 1;
                return Err(RouterError::BadCrc { expected: header.crc32, computed });
            }
        }
        match receiver.on_frame(header.seq, payload) {
            Ok(()) => {
                self.frames_ok += 1;
                trace!(magic = header.magic, seq = header.seq, "frame dispatched");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "receiver rejected frame");
                self.frames_bad += 1;
                Err(e)
            }
        }
    }
}
