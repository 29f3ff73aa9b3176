use serde::{Deserialize, Serialize};

use crate::error::ReceiverBuildError;
use crate::imgf::ImgOverwritePolicy;

/// Tunables for the [`crate::router::StreamRouter`] itself, independent
/// of any particular receiver. Constructed by the caller; this crate
/// never reads one from disk or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// Upper bound on a single frame's payload. A frame declaring a
    /// longer `len` is rejected with `BadLen` without growing anything.
    pub max_payload_len: usize,
    /// Size of the read buffer `spawn_reader` passes to the transport
    /// on each call.
    pub read_chunk: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { max_payload_len: 128 * 1024, read_chunk: 256 }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<(), ReceiverBuildError> {
        if self.max_payload_len == 0 || self.read_chunk == 0 {
            return Err(ReceiverBuildError::BufferTooSmall);
        }
        Ok(())
    }
}

/// Tunables shared by the MSGF and IMGF receivers. Not every field
/// applies to every receiver (`drop_policy` is meaningless to
/// [`crate::msgf::MsgfReceiver`], which always overwrites the oldest
/// unread slot); it's one aggregate struct because that's how the host
/// side's `HudHostConfig` aggregates its own per-component tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverConfig {
    pub max_len: usize,
    pub require_crc: bool,
    /// Slot count for `MsgfReceiver`. `ImgfReceiver` is always exactly
    /// two slots regardless of this value.
    pub queue_depth: usize,
    pub drop_policy: ImgOverwritePolicy,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self { max_len: 64 * 1024, require_crc: true, queue_depth: 4, drop_policy: ImgOverwritePolicy::DropOld }
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<(), ReceiverBuildError> {
        if self.max_len == 0 {
            return Err(ReceiverBuildError::BufferTooSmall);
        }
        if self.queue_depth == 0 {
            return Err(ReceiverBuildError::ZeroSlots);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        RouterConfig::default().validate().unwrap();
        ReceiverConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_max_len_rejected() {
        let cfg = ReceiverConfig { max_len: 0, ..ReceiverConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_queue_depth_rejected() {
        let cfg = ReceiverConfig { queue_depth: 0, ..ReceiverConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
