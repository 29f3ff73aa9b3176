use crate::error::RouterError;

/// Per-channel handler the [`crate::router::StreamRouter`] dispatches a
/// fully reassembled frame to. Implementations own their receive buffers
/// and allocate nothing on this path — every buffer they touch here was
/// sized once at construction.
pub trait Receiver {
    /// Wire magic this receiver claims, e.g. `hud_wire::MAGIC_MSGF`.
    fn magic(&self) -> u32;

    /// Whether the router must reject a zero or mismatched CRC for this
    /// channel before calling [`Receiver::on_frame`].
    fn require_crc(&self) -> bool;

    /// Handle one reassembled frame's payload.
    fn on_frame(&mut self, seq: u32, payload: &[u8]) -> Result<(), RouterError>;
}
