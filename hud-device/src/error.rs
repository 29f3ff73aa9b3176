/// Per-frame router failures. Returned by value, not boxed — the router
/// runs on the receive path and these are expected steady-state noise
/// (a corrupted byte on the wire), not something worth the indirection
/// of an allocating error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("declared payload length {0} exceeds the receiver's buffer")]
    BadLen(u32),
    #[error("crc mismatch: header={expected:#010x} computed={computed:#010x}")]
    BadCrc { expected: u32, computed: u32 },
    #[error("no free buffer available to accept this frame")]
    NoBuffer,
    #[error("no receiver registered for magic {0:#010x}")]
    NoReceiver(u32),
}

/// Failure constructing a [`crate::receiver::Receiver`] at startup — e.g.
/// an invalid slot count. Distinct from [`RouterError`] because it can
/// only happen once, before any frame is ever parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReceiverBuildError {
    #[error("slot count must be >= 1")]
    ZeroSlots,
    #[error("buffer size must be >= header length")]
    BufferTooSmall,
}
