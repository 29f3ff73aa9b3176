use std::fmt;

use crate::writer::Channel;

/// Errors surfaced by the host dispatch engine.
///
/// Every variant here corresponds to a row of the error-handling table:
/// the engine never crashes on an individual frame failure, it reports
/// through [`crate::listener::HudListener`] and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum HudError {
    /// `transport.write()` or `transport.flush()` failed. The writer moves
    /// on to the next queued frame.
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] std::io::Error),

    /// `transport.close()` failed during shutdown. Reported best-effort.
    #[error("transport close failed: {0}")]
    TransportClose(#[source] std::io::Error),

    /// The configured [`crate::map_coordinator::MapImageProvider`] failed
    /// to produce an image. Drives exponential backoff.
    #[error("map image provider failed: {0}")]
    ProviderFailure(String),

    /// The map coordinator could not schedule a fetch this tick (e.g. no
    /// provider configured). The `pending` flag is preserved for the next
    /// trigger evaluation.
    #[error("map fetch could not be scheduled: {0}")]
    ScheduleReject(String),

    /// Rejected at construction time — a programmer error, not a runtime
    /// condition.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A frame was dropped by an enqueue policy rather than written.
    #[error("frame dropped on {channel:?}: {reason}")]
    FrameDropped { channel: Channel, reason: &'static str },
}

impl HudError {
    /// Stage tag used when reporting through [`crate::listener::HudListener::on_error`],
    /// e.g. `"msg.tick"` for a scheduler-side failure.
    pub fn stage(&self) -> &'static str {
        match self {
            HudError::TransportWrite(_) => "writer.write",
            HudError::TransportClose(_) => "sdk.close",
            HudError::ProviderFailure(_) => "map.fetch",
            HudError::ScheduleReject(_) => "map.schedule",
            HudError::InvalidConfig(_) => "sdk.new",
            HudError::FrameDropped { .. } => "writer.enqueue",
        }
    }
}

/// Reason a GPS point was filtered during ingestion. Not an error — reported
/// through [`crate::listener::HudListener::on_gps_filtered`] for observability
/// only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsFilterReason {
    NonFiniteCoordinate,
    OutOfRange,
    NonMonotonicTimestamp,
    TooFrequent,
    PoorAccuracy,
    TooClose,
}

impl fmt::Display for GpsFilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GpsFilterReason::NonFiniteCoordinate => "non-finite coordinate",
            GpsFilterReason::OutOfRange => "lat/lon out of range",
            GpsFilterReason::NonMonotonicTimestamp => "timestamp not after last ingest",
            GpsFilterReason::TooFrequent => "interval<gpsMinIntervalMs",
            GpsFilterReason::PoorAccuracy => "accuracy>gpsAccuracyThresholdM",
            GpsFilterReason::TooClose => "distance<gpsMinDistanceM",
        };
        f.write_str(s)
    }
}
