use std::sync::Mutex;

use hud_wire::VehicleSnapshot;

/// Holds the latest value of every vehicle field plus a dirty bit marking
/// whether anything has changed since the last snapshot was read out by
/// the scheduler.
///
/// A plain `std::sync::Mutex` guards the snapshot: callers only ever hold
/// it for the duration of a field write or a copy-out, never across a
/// provider call or a transport write.
pub struct StateStore {
    inner: Mutex<Inner>,
}

struct Inner {
    snapshot: VehicleSnapshot,
    dirty: bool,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { snapshot: VehicleSnapshot::boot_default(), dirty: false }) }
    }

    /// Take a consistent copy of the current snapshot and clear the dirty
    /// bit, reporting whether it had been set. The scheduler uses the
    /// returned flag to decide between the idle tick rate and the active
    /// tick rate.
    pub fn take_snapshot(&self) -> (VehicleSnapshot, bool) {
        let mut inner = self.inner.lock().unwrap();
        let was_dirty = inner.dirty;
        inner.dirty = false;
        (inner.snapshot, was_dirty)
    }

    pub fn snapshot(&self) -> VehicleSnapshot {
        self.inner.lock().unwrap().snapshot
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock().unwrap().dirty
    }

    /// Replace the whole snapshot at once, e.g. from a bulk update.
    pub fn update_snapshot(&self, snapshot: VehicleSnapshot) {
        let mut inner = self.inner.lock().unwrap();
        inner.snapshot = snapshot;
        inner.dirty = true;
    }

    /// Set a single field by name, matching the embedding application's
    /// per-signal ingestion calls. Returns `false` for an unrecognized
    /// field name rather than erroring — an unknown field is a caller
    /// typo, not a runtime fault worth propagating through `HudError`.
    ///
    /// Only dirties the store when the new value actually differs from
    /// the stored one — re-sending the same reading every tick must not
    /// look like a change to the scheduler.
    pub fn set_field(&self, field: &str, value: i32) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let changed = {
            let s = &mut inner.snapshot;
            let slot: &mut i32 = match field {
                "speed_kmh" => &mut s.speed_kmh,
                "rpm" => &mut s.rpm,
                "odo_m" => &mut s.odo_m,
                "trip_odo_m" => &mut s.trip_odo_m,
                "outside_temp_dc" => &mut s.outside_temp_dc,
                "inside_temp_dc" => &mut s.inside_temp_dc,
                "battery_mv" => &mut s.battery_mv,
                "current_time_min" => &mut s.current_time_min,
                "trip_time_min" => &mut s.trip_time_min,
                "fuel_left_dl" => &mut s.fuel_left_dl,
                "fuel_total_dl" => &mut s.fuel_total_dl,
                _ => return false,
            };
            if *slot != value {
                *slot = value;
                true
            } else {
                false
            }
        };
        if changed {
            inner.dirty = true;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boots_with_default_battery_and_clean_dirty_bit() {
        let store = StateStore::new();
        assert_eq!(store.snapshot().battery_mv, hud_wire::VehicleSnapshot::boot_default().battery_mv);
        assert!(!store.is_dirty());
    }

    #[test]
    fn set_field_marks_dirty_and_take_snapshot_clears_it() {
        let store = StateStore::new();
        assert!(store.set_field("speed_kmh", 42));
        assert!(store.is_dirty());
        let (snap, was_dirty) = store.take_snapshot();
        assert_eq!(snap.speed_kmh, 42);
        assert!(was_dirty);
        assert!(!store.is_dirty());
    }

    #[test]
    fn unknown_field_is_rejected_without_dirtying() {
        let store = StateStore::new();
        assert!(!store.set_field("not_a_field", 1));
        assert!(!store.is_dirty());
    }

    #[test]
    fn resetting_the_same_value_does_not_redirty() {
        let store = StateStore::new();
        assert!(store.set_field("rpm", 2500));
        let (_, was_dirty) = store.take_snapshot();
        assert!(was_dirty);
        assert!(!store.is_dirty());

        assert!(store.set_field("rpm", 2500));
        assert!(!store.is_dirty());
    }
}
