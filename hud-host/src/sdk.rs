use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

/// Milliseconds since the Unix epoch, the clock every `now_ms` parameter
/// in this crate expects. Exposed so embedding applications and `main.rs`
/// share the same clock the background map-fetch task uses internally.
pub fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

/// How often the background map-fetch task re-checks the coordinator
/// between trigger notifications — bounds the latency of a backoff timer
/// expiring with no new GPS point to wake the task early.
const MAP_FETCH_POLL_INTERVAL: Duration = Duration::from_millis(200);

use crate::config::HudHostConfig;
use crate::error::HudError;
use crate::gps::{GpsCandidate, TrackBuffer};
use crate::listener::{HudListener, TracingListener};
use crate::map_coordinator::{HttpMapImageProvider, MapFetchCoordinator, MapImageProvider};
use crate::scheduler::MsgScheduler;
use crate::state_store::StateStore;
use crate::transport::HudTransport;
use crate::writer::{Channel, PrioritizedWriter};

/// Everything needed to construct a [`HudHostSdk`] that the caller does
/// not want to default. `transport` is the only field without a usable
/// default.
pub struct HudHostSdkBuilder {
    config: HudHostConfig,
    listener: Option<Arc<dyn HudListener>>,
    map_provider: Option<Arc<dyn MapImageProvider>>,
}

impl Default for HudHostSdkBuilder {
    fn default() -> Self {
        Self { config: HudHostConfig::default(), listener: None, map_provider: None }
    }
}

impl HudHostSdkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: HudHostConfig) -> Self {
        self.config = config;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn HudListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn map_provider(mut self, provider: Arc<dyn MapImageProvider>) -> Self {
        self.map_provider = Some(provider);
        self
    }

    pub fn build(
        self,
        transport: Arc<dyn HudTransport + Send + Sync>,
    ) -> Result<HudHostSdk, HudError> {
        self.config.validate()?;
        let listener = self.listener.unwrap_or_else(|| Arc::new(TracingListener));
        let map_provider = self
            .map_provider
            .unwrap_or_else(|| Arc::new(HttpMapImageProvider::new("https://maps.invalid/render")));
        Ok(HudHostSdk::new(self.config, transport, listener, map_provider))
    }
}

/// Top-level handle for the host dispatch engine: owns the State Store,
/// Track Buffer, Prioritized Writer, MSG Scheduler and Map Fetch
/// Coordinator, and the background tasks that drive them.
///
/// `start`/`stop` are idempotent — calling either while already in that
/// state is a no-op, guarded by `running`.
pub struct HudHostSdk {
    config: HudHostConfig,
    transport: Arc<dyn HudTransport + Send + Sync>,
    listener: Arc<dyn HudListener>,
    store: Arc<StateStore>,
    track: Arc<TrackBuffer>,
    writer: Arc<PrioritizedWriter>,
    map_coordinator: Arc<MapFetchCoordinator>,
    map_provider: Arc<dyn MapImageProvider>,
    burst: Arc<Notify>,
    map_trigger: Arc<Notify>,
    running: Arc<AtomicBool>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    seq: std::sync::atomic::AtomicU32,
}

impl HudHostSdk {
    pub fn builder() -> HudHostSdkBuilder {
        HudHostSdkBuilder::new()
    }

    fn new(
        config: HudHostConfig,
        transport: Arc<dyn HudTransport + Send + Sync>,
        listener: Arc<dyn HudListener>,
        map_provider: Arc<dyn MapImageProvider>,
    ) -> Self {
        let track = Arc::new(TrackBuffer::new(config.track_max_points));
        let writer = Arc::new(PrioritizedWriter::new(config.img_queue_capacity, listener.clone()));
        let map_coordinator = Arc::new(MapFetchCoordinator::new(&config));
        Self {
            store: Arc::new(StateStore::new()),
            track,
            writer,
            map_coordinator,
            map_provider,
            burst: Arc::new(Notify::new()),
            map_trigger: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
            tasks: std::sync::Mutex::new(Vec::new()),
            seq: std::sync::atomic::AtomicU32::new(0),
            config,
            transport,
            listener,
        }
    }

    pub fn set_field(&self, field: &str, value: i32) {
        if self.store.set_field(field, value) {
            if self.config.burst_on_vehicle_data_change {
                self.burst.notify_one();
            }
        } else {
            warn!(field, "set_field: unrecognized field name");
        }
    }

    /// Validate and filter a GPS fix through the configured thresholds.
    /// Accepted points are pushed onto the Track Buffer and fed to the
    /// Map Fetch Coordinator's triggers; rejected points are reported
    /// through the listener and otherwise ignored.
    pub fn ingest_gps(&self, candidate: GpsCandidate, now_ms: i64) {
        let filter = crate::gps::GpsFilter::new(&self.track, &self.config);
        match filter.ingest(candidate) {
            Ok(point) => {
                let distance_delta = self
                    .track
                    .second_last()
                    .map(|prev| crate::gps::haversine_distance_m(prev, point))
                    .unwrap_or(0.0);
                self.map_coordinator.note_point_accepted(now_ms, distance_delta);
                self.map_trigger.notify_one();
            }
            Err(reason) => {
                self.listener.on_gps_filtered(candidate.lat, candidate.lon, reason);
            }
        }
    }

    /// Enqueue a reboot command ahead of any queued telemetry or map data.
    pub fn send_reboot(&self) {
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        let bytes = hud_wire::encode_msgf_reboot(seq, self.config.enable_crc);
        self.writer.enqueue_ctrl(bytes);
    }

    /// Attempt a map fetch right now if the coordinator says one is due,
    /// driving its state machine through the fetch and reporting the
    /// outcome through the listener.
    pub async fn poll_map_fetch(&self, now_ms: i64, last_attempt_ms: i64) {
        if !self.map_coordinator.ready_to_fetch(now_ms, last_attempt_ms) {
            return;
        }
        self.map_coordinator.mark_in_flight();
        let center = match self.track.last() {
            Some(p) => p,
            None => return,
        };
        let points = self.track.snapshot();
        match self.map_provider.fetch(center, &points).await {
            Ok(png) => {
                if png.is_empty() {
                    self.listener.on_error(&HudError::FrameDropped {
                        channel: Channel::Imgf,
                        reason: "empty image",
                    });
                    self.map_coordinator.mark_failure();
                    return;
                }
                if png.len() > self.config.max_png_bytes {
                    self.listener.on_error(&HudError::FrameDropped {
                        channel: Channel::Imgf,
                        reason: "image too large",
                    });
                    self.map_coordinator.mark_failure();
                    return;
                }
                let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
                let bytes = hud_wire::encode_imgf(&png, seq, self.config.enable_crc);
                self.writer.enqueue_imgf(bytes);
                self.map_coordinator.mark_success(now_ms);
                self.listener.on_frame_sent(Channel::Imgf, png.len());
            }
            Err(err) => {
                self.listener.on_error(&err);
                self.map_coordinator.mark_failure();
            }
        }
    }

    /// Start the background writer and scheduler tasks. A second call
    /// while already running is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, AtomicOrdering::SeqCst) {
            return;
        }
        info!("hud host sdk starting");

        let writer = self.writer.clone();
        let transport = self.transport.clone();
        let writer_task = tokio::spawn(async move {
            writer.run(transport.as_ref()).await;
        });

        let scheduler = Arc::new(MsgScheduler::new(
            self.store.clone(),
            self.writer.clone(),
            self.config.clone(),
            self.burst.clone(),
        ));
        let scheduler_task = tokio::spawn(async move { scheduler.run().await });

        let map_task = {
            let sdk = self.clone();
            tokio::spawn(async move {
                let mut last_attempt_ms = 0i64;
                loop {
                    tokio::select! {
                        _ = sleep(MAP_FETCH_POLL_INTERVAL) => {}
                        _ = sdk.map_trigger.notified() => {}
                    }
                    let now = now_ms();
                    if sdk.map_coordinator.ready_to_fetch(now, last_attempt_ms) {
                        sdk.poll_map_fetch(now, last_attempt_ms).await;
                        last_attempt_ms = now;
                    }
                }
            })
        };

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(writer_task);
        tasks.push(scheduler_task);
        tasks.push(map_task);
    }

    /// Stop background tasks and close the transport. A second call while
    /// already stopped is a no-op. Best-effort: a transport close failure
    /// is reported through the listener rather than returned, since the
    /// caller has already committed to shutting down.
    pub async fn stop(self: &Arc<Self>) {
        if !self.running.swap(false, AtomicOrdering::SeqCst) {
            return;
        }
        info!("hud host sdk stopping");
        let tasks: Vec<_> = self.tasks.lock().unwrap().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        if let Err(e) = self.transport.close().await {
            self.listener.on_error(&HudError::TransportClose(e));
        }
    }

    pub fn writer_counters(&self) -> &crate::writer::WriterCounters {
        self.writer.counters()
    }

    pub fn config(&self) -> &HudHostConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::mock::RecordingListener;
    use crate::transport::mock::MockTransport;
    use std::sync::atomic::Ordering;

    fn sdk_with_mock_transport() -> (Arc<HudHostSdk>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let sdk = HudHostSdk::builder()
            .config(HudHostConfig::default())
            .build(transport.clone())
            .unwrap();
        (Arc::new(sdk), transport)
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let (sdk, _transport) = sdk_with_mock_transport();
        sdk.start();
        sdk.start();
        assert!(sdk.running.load(Ordering::SeqCst));
        assert_eq!(sdk.tasks.lock().unwrap().len(), 3);
        sdk.stop().await;
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let (sdk, transport) = sdk_with_mock_transport();
        sdk.stop().await;
        assert!(!*transport.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn reboot_is_enqueued_on_ctrl_channel() {
        let (sdk, _transport) = sdk_with_mock_transport();
        sdk.send_reboot();
        assert_eq!(sdk.writer.queue_depth(), 1);
    }

    #[tokio::test]
    async fn empty_png_is_dropped_and_reported_not_enqueued() {
        use crate::map_coordinator::mock::MockProvider;

        let transport = Arc::new(MockTransport::new());
        let listener = Arc::new(RecordingListener::default());
        let provider = Arc::new(MockProvider::new(Vec::new(), 0));
        let sdk = Arc::new(
            HudHostSdk::builder()
                .config(HudHostConfig::default())
                .listener(listener.clone())
                .map_provider(provider)
                .build(transport)
                .unwrap(),
        );

        sdk.ingest_gps(
            GpsCandidate { lat: 37.0, lon: -122.0, accuracy_m: 5.0, timestamp_ms: 3000 },
            3000,
        );
        sdk.poll_map_fetch(3000, 0).await;

        assert_eq!(sdk.writer.queue_depth(), 0);
        assert!(listener.errors.lock().unwrap().iter().any(|e| e.contains("empty image")));
    }

    #[tokio::test]
    async fn oversized_png_is_dropped_and_reported_not_enqueued() {
        use crate::map_coordinator::mock::MockProvider;

        let transport = Arc::new(MockTransport::new());
        let listener = Arc::new(RecordingListener::default());
        let cfg = HudHostConfig { max_png_bytes: 4, ..HudHostConfig::default() };
        let provider = Arc::new(MockProvider::new(vec![0u8; 16], 0));
        let sdk = Arc::new(
            HudHostSdk::builder()
                .config(cfg)
                .listener(listener.clone())
                .map_provider(provider)
                .build(transport)
                .unwrap(),
        );

        sdk.ingest_gps(
            GpsCandidate { lat: 37.0, lon: -122.0, accuracy_m: 5.0, timestamp_ms: 3000 },
            3000,
        );
        sdk.poll_map_fetch(3000, 0).await;

        assert_eq!(sdk.writer.queue_depth(), 0);
        assert!(listener.errors.lock().unwrap().iter().any(|e| e.contains("image too large")));
    }

    #[tokio::test]
    async fn rejected_gps_point_is_reported_to_listener() {
        let transport = Arc::new(MockTransport::new());
        let listener = Arc::new(RecordingListener::default());
        let sdk = Arc::new(
            HudHostSdk::builder()
                .config(HudHostConfig::default())
                .listener(listener.clone())
                .build(transport)
                .unwrap(),
        );
        sdk.ingest_gps(GpsCandidate { lat: 200.0, lon: 0.0, accuracy_m: 1.0, timestamp_ms: 0 }, 0);
        assert_eq!(listener.gps_filtered.lock().unwrap().len(), 1);
    }
}
