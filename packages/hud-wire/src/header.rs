use std::convert::TryInto;

/// `MSGF` read as a little-endian u32 (vehicle state / short commands).
pub const MAGIC_MSGF: u32 = 0x4647_534D;
/// `IMGF` read as a little-endian u32 (PNG track images).
pub const MAGIC_IMGF: u32 = 0x4647_4D49;

/// Size in bytes of the fixed frame header, before the payload.
pub const HEADER_LEN: usize = 20;

/// Errors that can occur while decoding a frame header or payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("header too short: need {HEADER_LEN} bytes, got {0}")]
    HeaderTooShort(usize),
    #[error("frame shorter than header.len: need {need} payload bytes, got {got}")]
    PayloadTooShort { need: u32, got: usize },
    #[error("unrecognized magic {0:#010x}")]
    UnknownMagic(u32),
    #[error("crc mismatch: header says {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch { expected: u32, computed: u32 },
}

/// The fixed 20-byte frame header, little-endian on the wire.
///
/// ```text
///  0: magic    u32
///  4: type     u8   (reserved, 0)
///  5: flags    u8   (reserved, 0)
///  6: rsv      u16  (reserved, 0)
///  8: len      u32  (payload bytes)
/// 12: crc32    u32  (IEEE over payload, or 0)
/// 16: seq      u32  (monotonic per sender)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u32,
    pub frame_type: u8,
    pub flags: u8,
    pub rsv: u16,
    pub len: u32,
    pub crc32: u32,
    pub seq: u32,
}

impl FrameHeader {
    /// Build a header for a fresh outbound frame. `frame_type`, `flags` and
    /// `rsv` are always zero on this side of the protocol — the wire format
    /// reserves them for a future revision.
    pub fn new(magic: u32, payload_len: u32, crc32: u32, seq: u32) -> Self {
        Self { magic, frame_type: 0, flags: 0, rsv: 0, len: payload_len, crc32, seq }
    }

    /// Serialize into the wire's 20-byte little-endian layout.
    pub fn write_to(&self, out: &mut [u8; HEADER_LEN]) {
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4] = self.frame_type;
        out[5] = self.flags;
        out[6..8].copy_from_slice(&self.rsv.to_le_bytes());
        out[8..12].copy_from_slice(&self.len.to_le_bytes());
        out[12..16].copy_from_slice(&self.crc32.to_le_bytes());
        out[16..20].copy_from_slice(&self.seq.to_le_bytes());
    }

    /// Parse a header from the first [`HEADER_LEN`] bytes of `bytes`.
    /// Extra trailing bytes (the payload) are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < HEADER_LEN {
            return Err(WireError::HeaderTooShort(bytes.len()));
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let frame_type = bytes[4];
        let flags = bytes[5];
        let rsv = u16::from_le_bytes(bytes[6..8].try_into().unwrap());
        let len = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let crc32 = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        let seq = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        Ok(Self { magic, frame_type, flags, rsv, len, crc32, seq })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let hdr = FrameHeader::new(MAGIC_MSGF, 27, 0xdead_beef, 7);
        let mut buf = [0u8; HEADER_LEN];
        hdr.write_to(&mut buf);
        let parsed = FrameHeader::parse(&buf).unwrap();
        assert_eq!(parsed, hdr);
    }

    #[test]
    fn magic_bytes_are_ascii() {
        assert_eq!(MAGIC_MSGF.to_le_bytes(), *b"MSGF");
        assert_eq!(MAGIC_IMGF.to_le_bytes(), *b"IMGF");
    }
}
