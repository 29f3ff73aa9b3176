use tracing::{error, info, warn};

use crate::error::{GpsFilterReason, HudError};
use crate::writer::Channel;

/// Observability hook for the dispatch engine. Every method has a no-op
/// default, so embedding applications only override what they care about.
///
/// None of these calls may block or perform I/O — they run on the hot
/// path (writer task, scheduler tick, GPS ingest) and holding a lock or
/// blocking here would stall frame delivery.
pub trait HudListener: Send + Sync {
    fn on_error(&self, _err: &HudError) {}

    fn on_gps_filtered(&self, _lat: f64, _lon: f64, _reason: GpsFilterReason) {}

    fn on_frame_sent(&self, _channel: Channel, _bytes: usize) {}
}

/// Default listener: every callback logs through `tracing` at a level
/// matching its severity. Installed automatically when the SDK is built
/// without an explicit listener.
#[derive(Debug, Default)]
pub struct TracingListener;

impl HudListener for TracingListener {
    fn on_error(&self, err: &HudError) {
        error!(stage = err.stage(), error = %err, "hud error");
    }

    fn on_gps_filtered(&self, lat: f64, lon: f64, reason: GpsFilterReason) {
        warn!(lat, lon, %reason, "gps point filtered");
    }

    fn on_frame_sent(&self, channel: Channel, bytes: usize) {
        info!(?channel, bytes, "frame sent");
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingListener {
        pub errors: Mutex<Vec<String>>,
        pub gps_filtered: Mutex<Vec<GpsFilterReason>>,
        pub frames_sent: Mutex<Vec<(Channel, usize)>>,
    }

    impl HudListener for RecordingListener {
        fn on_error(&self, err: &HudError) {
            self.errors.lock().unwrap().push(err.to_string());
        }

        fn on_gps_filtered(&self, _lat: f64, _lon: f64, reason: GpsFilterReason) {
            self.gps_filtered.lock().unwrap().push(reason);
        }

        fn on_frame_sent(&self, channel: Channel, bytes: usize) {
            self.frames_sent.lock().unwrap().push((channel, bytes));
        }
    }
}
