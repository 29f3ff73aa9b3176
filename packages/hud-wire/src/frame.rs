use crate::header::{FrameHeader, WireError, HEADER_LEN, MAGIC_IMGF, MAGIC_MSGF};
use crate::msgf_cmd;
use crate::snapshot::VehicleSnapshot;

/// A frame fully decoded off the wire: header plus the payload slice that
/// follows it, borrowed from the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub header: FrameHeader,
    pub payload: &'a [u8],
}

fn ieee_crc32(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

fn build_frame(magic: u32, payload: &[u8], seq: u32, enable_crc: bool) -> Vec<u8> {
    let crc = if enable_crc { ieee_crc32(payload) } else { 0 };
    let header = FrameHeader::new(magic, payload.len() as u32, crc, seq);
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    let mut hdr_bytes = [0u8; HEADER_LEN];
    header.write_to(&mut hdr_bytes);
    out.extend_from_slice(&hdr_bytes);
    out.extend_from_slice(payload);
    out
}

/// Encode a MSGF snapshot frame: command byte `0x00` followed by the
/// 26-byte clamped snapshot payload.
pub fn encode_msgf_snapshot(snapshot: &VehicleSnapshot, seq: u32, enable_crc: bool) -> Vec<u8> {
    let mut payload = Vec::with_capacity(1 + crate::snapshot::SNAPSHOT_PAYLOAD_LEN);
    payload.push(msgf_cmd::SNAPSHOT);
    payload.extend_from_slice(&snapshot.encode());
    build_frame(MAGIC_MSGF, &payload, seq, enable_crc)
}

/// Encode a MSGF reboot command frame: a single command byte `0x01`.
pub fn encode_msgf_reboot(seq: u32, enable_crc: bool) -> Vec<u8> {
    build_frame(MAGIC_MSGF, &[msgf_cmd::REBOOT], seq, enable_crc)
}

/// Encode an IMGF frame carrying raw PNG bytes as the payload.
pub fn encode_imgf(png: &[u8], seq: u32, enable_crc: bool) -> Vec<u8> {
    build_frame(MAGIC_IMGF, png, seq, enable_crc)
}

/// Decode a full frame (header + payload) from `bytes`.
///
/// `require_crc` mirrors the device router's `receiver.require_crc`: when
/// set, a zero or mismatched CRC is rejected even though a CRC of zero
/// would otherwise "match" an unset header field.
pub fn decode_frame(bytes: &[u8], require_crc: bool) -> Result<DecodedFrame<'_>, WireError> {
    let header = FrameHeader::parse(bytes)?;
    if !matches!(header.magic, MAGIC_MSGF | MAGIC_IMGF) {
        return Err(WireError::UnknownMagic(header.magic));
    }
    let payload_end = HEADER_LEN + header.len as usize;
    if bytes.len() < payload_end {
        return Err(WireError::PayloadTooShort { need: header.len, got: bytes.len() - HEADER_LEN });
    }
    let payload = &bytes[HEADER_LEN..payload_end];

    if require_crc {
        let computed = ieee_crc32(payload);
        if header.crc32 == 0 || header.crc32 != computed {
            return Err(WireError::CrcMismatch { expected: header.crc32, computed });
        }
    }

    Ok(DecodedFrame { header, payload })
}
