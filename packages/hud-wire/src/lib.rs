//! # hud-wire
//!
//! Shared on-wire frame format for the HUD host/device pipeline.
//!
//! These types are used by:
//! - `hud-host`: building MSGF/IMGF frames for the outbound writer
//! - `hud-device`: decoding frames off the stream router
//!
//! ## Wire layout
//!
//! Every frame is a fixed 20-byte little-endian header followed by
//! `header.len` payload bytes. See [`FrameHeader`] for the field layout
//! and [`encode_msgf_snapshot`]/[`encode_msgf_reboot`]/[`encode_imgf`]
//! for the payload shapes of each channel.
//!
//! Nothing in this crate spawns a thread or touches I/O — it is pure
//! encode/decode, shared so the bit layout cannot drift between the two
//! independent processes that produce and consume it.

mod frame;
mod header;
mod snapshot;

pub use frame::{decode_frame, encode_imgf, encode_msgf_reboot, encode_msgf_snapshot, DecodedFrame};
pub use header::{FrameHeader, WireError, HEADER_LEN, MAGIC_IMGF, MAGIC_MSGF};
pub use snapshot::VehicleSnapshot;

/// MSGF payload command bytes (first byte of every MSGF payload).
pub mod msgf_cmd {
    /// Vehicle snapshot, followed by 26 bytes (see [`super::VehicleSnapshot`]).
    pub const SNAPSHOT: u8 = 0x00;
    /// Reboot request, no further payload bytes.
    pub const REBOOT: u8 = 0x01;
}
