use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::HudHostConfig;
use crate::error::HudError;
use crate::gps::GpsPoint;

/// Supplies a rendered map image for a given center point and track.
/// Swappable so tests never make a real HTTP call.
#[async_trait]
pub trait MapImageProvider: Send + Sync {
    async fn fetch(&self, center: GpsPoint, track: &[GpsPoint]) -> Result<Vec<u8>, HudError>;
}

/// Default provider: requests a rendered PNG from a tile/static-map HTTP
/// endpoint. The response body is returned as-is — this crate does not
/// decode or re-encode the image.
pub struct HttpMapImageProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMapImageProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[async_trait]
impl MapImageProvider for HttpMapImageProvider {
    async fn fetch(&self, center: GpsPoint, track: &[GpsPoint]) -> Result<Vec<u8>, HudError> {
        let path: Vec<String> = track.iter().map(|p| format!("{:.6},{:.6}", p.lat, p.lon)).collect();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("lat", center.lat.to_string()), ("lon", center.lon.to_string())])
            .query(&[("path", path.join("|"))])
            .send()
            .await
            .map_err(|e| HudError::ProviderFailure(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(HudError::ProviderFailure(format!("status {}", resp.status())));
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| HudError::ProviderFailure(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchState {
    Idle,
    Scheduled,
    InFlight,
    Backoff,
}

struct Inner {
    state: FetchState,
    pending: bool,
    points_since_last: u32,
    distance_since_last_m: f64,
    last_fetch_ms: i64,
    backoff_ms: u64,
}

/// Drives when a map render is worth asking the provider for, and backs
/// off exponentially after a failure so a flaky network doesn't turn
/// into a hot retry loop.
///
/// State machine: `Idle -> Scheduled` when a trigger fires, `Scheduled ->
/// InFlight` when the single outstanding fetch task is spawned,
/// `InFlight -> Idle` on success or `InFlight -> Backoff` on failure.
/// Only one fetch is ever in flight; triggers that land while
/// `Scheduled`/`InFlight`/`Backoff` set `pending` so the coordinator
/// re-evaluates as soon as it returns to `Idle`.
pub struct MapFetchCoordinator {
    inner: Mutex<Inner>,
    config_trigger_points: u32,
    config_trigger_interval_ms: i64,
    config_trigger_distance_m: f64,
    backoff_initial_ms: u64,
    backoff_max_ms: u64,
    attempts: AtomicU64,
    failures: AtomicU64,
}

impl MapFetchCoordinator {
    pub fn new(config: &HudHostConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: FetchState::Idle,
                pending: false,
                points_since_last: 0,
                distance_since_last_m: 0.0,
                last_fetch_ms: 0,
                backoff_ms: config.map_retry_backoff_initial_ms,
            }),
            config_trigger_points: config.map_trigger_point_count,
            config_trigger_interval_ms: config.map_trigger_interval_ms,
            config_trigger_distance_m: config.map_trigger_distance_m,
            backoff_initial_ms: config.map_retry_backoff_initial_ms,
            backoff_max_ms: config.map_retry_backoff_max_ms,
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Called once per newly accepted GPS point. `now_ms` and
    /// `cumulative_distance_delta_m` let the caller drive the interval
    /// and distance triggers without this type owning a clock or a track.
    pub fn note_point_accepted(&self, now_ms: i64, distance_delta_m: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.points_since_last += 1;
        inner.distance_since_last_m += distance_delta_m;
        if self.should_trigger_locked(&inner, now_ms) {
            inner.pending = true;
            if inner.state == FetchState::Idle {
                inner.state = FetchState::Scheduled;
            }
        }
    }

    fn should_trigger_locked(&self, inner: &Inner, now_ms: i64) -> bool {
        inner.points_since_last >= self.config_trigger_points
            || now_ms - inner.last_fetch_ms >= self.config_trigger_interval_ms
            || inner.distance_since_last_m >= self.config_trigger_distance_m
    }

    /// Whether a fetch is ready to be spawned right now: `Scheduled` with
    /// nothing currently in flight, or `Backoff` whose timer has elapsed.
    pub fn ready_to_fetch(&self, now_ms: i64, last_attempt_ms: i64) -> bool {
        let inner = self.inner.lock().unwrap();
        match inner.state {
            FetchState::Scheduled => true,
            FetchState::Backoff => now_ms - last_attempt_ms >= inner.backoff_ms as i64,
            FetchState::Idle | FetchState::InFlight => false,
        }
    }

    pub fn mark_in_flight(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = FetchState::InFlight;
        self.attempts.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn mark_success(&self, now_ms: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = FetchState::Idle;
        inner.pending = false;
        inner.points_since_last = 0;
        inner.distance_since_last_m = 0.0;
        inner.last_fetch_ms = now_ms;
        inner.backoff_ms = self.backoff_initial_ms;
        debug!("map fetch succeeded, backoff reset");
    }

    pub fn mark_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.backoff_ms = (inner.backoff_ms.saturating_mul(2)).min(self.backoff_max_ms);
        inner.state = FetchState::Backoff;
        self.failures.fetch_add(1, AtomicOrdering::Relaxed);
        warn!(next_backoff_ms = inner.backoff_ms, "map fetch failed, backing off");
    }

    pub fn current_backoff(&self) -> Duration {
        Duration::from_millis(self.inner.lock().unwrap().backoff_ms)
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(AtomicOrdering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(AtomicOrdering::Relaxed)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> HudHostConfig {
        HudHostConfig {
            map_trigger_point_count: 3,
            map_trigger_interval_ms: 10_000,
            map_trigger_distance_m: 1_000.0,
            map_retry_backoff_initial_ms: 100,
            map_retry_backoff_max_ms: 800,
            ..HudHostConfig::default()
        }
    }

    #[test]
    fn point_count_trigger_schedules_a_fetch() {
        let c = MapFetchCoordinator::new(&cfg());
        c.note_point_accepted(0, 0.0);
        c.note_point_accepted(1, 0.0);
        assert!(!c.ready_to_fetch(1, 0));
        c.note_point_accepted(2, 0.0);
        assert!(c.ready_to_fetch(2, 0));
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let c = MapFetchCoordinator::new(&cfg());
        c.mark_in_flight();
        c.mark_failure();
        assert_eq!(c.current_backoff(), Duration::from_millis(200));
        c.mark_in_flight();
        c.mark_failure();
        assert_eq!(c.current_backoff(), Duration::from_millis(400));
        c.mark_in_flight();
        c.mark_failure();
        assert_eq!(c.current_backoff(), Duration::from_millis(800));
        c.mark_in_flight();
        c.mark_failure();
        // Doubling past the ceiling saturates instead of overflowing past it.
        assert_eq!(c.current_backoff(), Duration::from_millis(800));
    }

    #[test]
    fn success_resets_backoff_and_counters() {
        let c = MapFetchCoordinator::new(&cfg());
        c.mark_in_flight();
        c.mark_failure();
        assert!(c.current_backoff() > Duration::from_millis(100));
        c.note_point_accepted(0, 0.0);
        c.mark_in_flight();
        c.mark_success(5000);
        assert_eq!(c.current_backoff(), Duration::from_millis(100));
        assert!(!c.ready_to_fetch(5000, 5000));
    }

    /// Four consecutive failures under the default config back off
    /// 1s, 2s, 4s, 8s, capping at the default 15s ceiling on the fifth.
    #[test]
    fn backoff_sequence_matches_default_config_doubling() {
        let c = MapFetchCoordinator::new(&HudHostConfig::default());
        let expected_ms = [2_000, 4_000, 8_000, 15_000, 15_000];
        for want in expected_ms {
            c.mark_in_flight();
            c.mark_failure();
            assert_eq!(c.current_backoff(), Duration::from_millis(want));
        }
    }

    #[tokio::test]
    async fn mock_provider_fails_then_succeeds() {
        use mock::MockProvider;
        let provider = MockProvider::new(vec![1, 2, 3], 2);
        let center = GpsPoint { lat: 0.0, lon: 0.0, accuracy_m: 5.0, timestamp_ms: 0 };
        assert!(provider.fetch(center, &[]).await.is_err());
        assert!(provider.fetch(center, &[]).await.is_err());
        assert_eq!(provider.fetch(center, &[]).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(provider.calls(), 3);
    }
}
