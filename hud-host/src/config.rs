use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::HudError;

/// Every tunable of the host dispatch engine. Constructed by the
/// embedding application — this crate never reads config from disk or
/// environment itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HudHostConfig {
    /// MSG Scheduler tick rate while the store is dirty, in Hz.
    pub msg_rate_hz: f64,
    /// Idle keep-alive rate when the store has no new data, in Hz.
    pub msg_idle_rate_hz: f64,
    /// Opportunistically tick the scheduler from every `setField` call.
    pub burst_on_vehicle_data_change: bool,
    /// Whether outbound frames carry a non-zero IEEE CRC-32 over the payload.
    pub enable_crc: bool,

    /// Minimum interval between accepted GPS samples, in milliseconds.
    pub gps_min_interval_ms: i64,
    /// Reject points whose reported accuracy is worse than this, in meters.
    pub gps_accuracy_threshold_m: f32,
    /// Minimum distance between consecutive accepted points, in meters.
    pub gps_min_distance_m: f64,
    /// Minimum circular bearing delta that allows a turn to bypass
    /// `gps_min_distance_m`, in degrees.
    pub gps_turn_angle_deg: f32,
    /// Bounded track length; oldest points are evicted once exceeded.
    pub track_max_points: usize,

    /// Trigger a map render after this many newly accepted points.
    pub map_trigger_point_count: u32,
    /// Trigger a map render after this many milliseconds since the last one.
    pub map_trigger_interval_ms: i64,
    /// Trigger a map render after this much cumulative distance, in meters.
    pub map_trigger_distance_m: f64,
    /// Initial retry backoff after a provider failure, in milliseconds.
    pub map_retry_backoff_initial_ms: u64,
    /// Backoff ceiling — doubling never exceeds this, in milliseconds.
    pub map_retry_backoff_max_ms: u64,

    /// Bounded IMGF queue depth in the prioritized writer.
    pub img_queue_capacity: usize,
    /// Maximum PNG size this host will enqueue, in bytes.
    pub max_png_bytes: usize,
}

impl Default for HudHostConfig {
    fn default() -> Self {
        Self {
            msg_rate_hz: 24.0,
            msg_idle_rate_hz: 2.0,
            burst_on_vehicle_data_change: true,
            enable_crc: true,

            gps_min_interval_ms: 250,
            gps_accuracy_threshold_m: 30.0,
            gps_min_distance_m: 5.0,
            gps_turn_angle_deg: 20.0,
            track_max_points: 200,

            map_trigger_point_count: 5,
            map_trigger_interval_ms: 2000,
            map_trigger_distance_m: 30.0,
            map_retry_backoff_initial_ms: 1000,
            map_retry_backoff_max_ms: 15_000,

            img_queue_capacity: 2,
            max_png_bytes: 128 * 1024,
        }
    }
}

impl HudHostConfig {
    /// Validate tunables that would otherwise manifest as silent
    /// misbehavior (division by zero, an always-true/always-false trigger).
    /// Refused at construction, matching `InvalidConfig`'s "programmer
    /// error" disposition.
    pub fn validate(&self) -> Result<(), HudError> {
        if self.msg_rate_hz <= 0.0 {
            return Err(HudError::InvalidConfig("msg_rate_hz must be > 0".into()));
        }
        if self.msg_idle_rate_hz <= 0.0 {
            return Err(HudError::InvalidConfig("msg_idle_rate_hz must be > 0".into()));
        }
        if self.track_max_points < 2 {
            return Err(HudError::InvalidConfig("track_max_points must be >= 2".into()));
        }
        if self.map_retry_backoff_initial_ms == 0 {
            return Err(HudError::InvalidConfig("map_retry_backoff_initial_ms must be > 0".into()));
        }
        if self.map_retry_backoff_max_ms < self.map_retry_backoff_initial_ms {
            return Err(HudError::InvalidConfig(
                "map_retry_backoff_max_ms must be >= map_retry_backoff_initial_ms".into(),
            ));
        }
        if self.img_queue_capacity == 0 {
            return Err(HudError::InvalidConfig("img_queue_capacity must be >= 1".into()));
        }
        Ok(())
    }

    pub fn msg_tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.msg_rate_hz)
    }

    pub fn msg_idle_period_ms(&self) -> i64 {
        (1000.0 / self.msg_idle_rate_hz) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        HudHostConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_rate_rejected() {
        let mut cfg = HudHostConfig::default();
        cfg.msg_rate_hz = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn backoff_ceiling_below_initial_rejected() {
        let mut cfg = HudHostConfig::default();
        cfg.map_retry_backoff_max_ms = 10;
        cfg.map_retry_backoff_initial_ms = 1000;
        assert!(cfg.validate().is_err());
    }
}
