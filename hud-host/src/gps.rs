use std::collections::VecDeque;
use std::sync::Mutex;

use crate::config::HudHostConfig;
use crate::error::GpsFilterReason;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Minimum distance a turn-preservation exception requires before it can
/// bypass `gps_min_distance_m` — a sharp bearing delta on sub-3m jitter is
/// still jitter, not a turn.
const TURN_PRESERVATION_MIN_DISTANCE_M: f64 = 3.0;

/// One accepted GPS fix, carried in the Track Buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPoint {
    pub lat: f64,
    pub lon: f64,
    pub accuracy_m: f32,
    pub timestamp_ms: i64,
}

/// Great-circle distance between two points, meters.
pub fn haversine_distance_m(a: GpsPoint, b: GpsPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Initial compass bearing from `a` to `b`, degrees in `[0, 360)`.
fn bearing_deg(a: GpsPoint, b: GpsPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlon = (b.lon - a.lon).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Smallest angle between two bearings, degrees in `[0, 180]`.
fn bearing_delta_deg(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Bounded FIFO of accepted GPS points, oldest evicted once
/// `track_max_points` is exceeded.
#[derive(Default)]
pub struct TrackBuffer {
    points: Mutex<VecDeque<GpsPoint>>,
    max_points: usize,
}

impl TrackBuffer {
    pub fn new(max_points: usize) -> Self {
        Self { points: Mutex::new(VecDeque::with_capacity(max_points)), max_points }
    }

    pub fn push(&self, point: GpsPoint) {
        let mut pts = self.points.lock().unwrap();
        pts.push_back(point);
        while pts.len() > self.max_points {
            pts.pop_front();
        }
    }

    pub fn last(&self) -> Option<GpsPoint> {
        self.points.lock().unwrap().back().copied()
    }

    pub fn second_last(&self) -> Option<GpsPoint> {
        let pts = self.points.lock().unwrap();
        let len = pts.len();
        if len >= 2 {
            Some(pts[len - 2])
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.points.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<GpsPoint> {
        self.points.lock().unwrap().iter().copied().collect()
    }
}

/// Candidate point offered to the filter before it is known to be
/// accepted into the track.
#[derive(Debug, Clone, Copy)]
pub struct GpsCandidate {
    pub lat: f64,
    pub lon: f64,
    pub accuracy_m: f32,
    pub timestamp_ms: i64,
}

/// Syntactic and spatial gate in front of the Track Buffer. Two
/// consecutive points bootstrap the track unconditionally — the spatial
/// checks need at least one prior accepted point plus a heading to
/// evaluate, so there is nothing to compare the first point against.
pub struct GpsFilter<'a> {
    track: &'a TrackBuffer,
    config: &'a HudHostConfig,
}

impl<'a> GpsFilter<'a> {
    pub fn new(track: &'a TrackBuffer, config: &'a HudHostConfig) -> Self {
        Self { track, config }
    }

    /// Run `candidate` through validation and, if accepted, push it onto
    /// the track. Returns `Ok(point)` on acceptance or `Err(reason)` on
    /// rejection — rejection is not an error, it is expected steady-state
    /// behavior for noisy fixes.
    pub fn ingest(&self, candidate: GpsCandidate) -> Result<GpsPoint, GpsFilterReason> {
        if !candidate.lat.is_finite() || !candidate.lon.is_finite() {
            return Err(GpsFilterReason::NonFiniteCoordinate);
        }
        if !(-90.0..=90.0).contains(&candidate.lat) || !(-180.0..=180.0).contains(&candidate.lon) {
            return Err(GpsFilterReason::OutOfRange);
        }

        let point = GpsPoint {
            lat: candidate.lat,
            lon: candidate.lon,
            accuracy_m: candidate.accuracy_m,
            timestamp_ms: candidate.timestamp_ms,
        };

        let Some(last) = self.track.last() else {
            self.track.push(point);
            return Ok(point);
        };

        if point.timestamp_ms <= last.timestamp_ms {
            return Err(GpsFilterReason::NonMonotonicTimestamp);
        }
        if point.timestamp_ms - last.timestamp_ms < self.config.gps_min_interval_ms {
            return Err(GpsFilterReason::TooFrequent);
        }
        if candidate.accuracy_m > self.config.gps_accuracy_threshold_m {
            return Err(GpsFilterReason::PoorAccuracy);
        }

        // Bootstrap exception: with only one prior point there is no
        // established heading to preserve through a turn, so the second
        // point is accepted on the syntactic checks alone.
        if self.track.len() < 2 {
            self.track.push(point);
            return Ok(point);
        }

        let distance = haversine_distance_m(last, point);
        if distance < self.config.gps_min_distance_m {
            let prev = self.track.second_last().unwrap_or(last);
            let established = bearing_deg(prev, last);
            let candidate_bearing = bearing_deg(last, point);
            let delta = bearing_delta_deg(established, candidate_bearing);
            let turn_preserved =
                distance >= TURN_PRESERVATION_MIN_DISTANCE_M && delta >= self.config.gps_turn_angle_deg as f64;
            if !turn_preserved {
                return Err(GpsFilterReason::TooClose);
            }
        }

        self.track.push(point);
        Ok(point)
    }
}
