use serde::{Deserialize, Serialize};

/// Size in bytes of the encoded snapshot payload that follows the
/// `msgf_cmd::SNAPSHOT` command byte.
pub const SNAPSHOT_PAYLOAD_LEN: usize = 26;

/// Fixed-shape record of the latest vehicle field values.
///
/// Held wide (`i32`) on the host side so [`crate::VehicleSnapshot`] can
/// accumulate arbitrary caller-supplied values without losing information
/// before [`VehicleSnapshot::encode`] saturating-clamps each field down to
/// its wire width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    /// Speed, km/h.
    pub speed_kmh: i32,
    /// Engine RPM.
    pub rpm: i32,
    /// Odometer, meters.
    pub odo_m: i32,
    /// Trip odometer, meters.
    pub trip_odo_m: i32,
    /// Outside temperature, tenths of a degree C.
    pub outside_temp_dc: i32,
    /// Inside temperature, tenths of a degree C.
    pub inside_temp_dc: i32,
    /// Battery voltage, millivolts.
    pub battery_mv: i32,
    /// Current time of day, minutes since midnight (clamped to `[0, 1439]`).
    pub current_time_min: i32,
    /// Trip elapsed time, minutes.
    pub trip_time_min: i32,
    /// Fuel remaining, tenths of a liter.
    pub fuel_left_dl: i32,
    /// Fuel tank capacity, tenths of a liter.
    pub fuel_total_dl: i32,
}

/// Battery defaults to a plausible resting voltage rather than zero, so a
/// freshly constructed store never reports an implausible dead battery
/// before the first real sample arrives.
pub const DEFAULT_BATTERY_MV: i32 = 12_000;

impl VehicleSnapshot {
    /// A snapshot with every field zeroed except `battery_mv`, matching the
    /// State Store's boot defaults.
    pub fn boot_default() -> Self {
        Self { battery_mv: DEFAULT_BATTERY_MV, ..Self::default() }
    }

    /// Encode into the 26-byte little-endian snapshot payload, saturating
    /// every field to its declared wire range.
    pub fn encode(&self) -> [u8; SNAPSHOT_PAYLOAD_LEN] {
        let mut out = [0u8; SNAPSHOT_PAYLOAD_LEN];
        out[0..2].copy_from_slice(&clamp_i16(self.speed_kmh).to_le_bytes());
        out[2..4].copy_from_slice(&clamp_i16(self.rpm).to_le_bytes());
        out[4..8].copy_from_slice(&self.odo_m.to_le_bytes());
        out[8..12].copy_from_slice(&self.trip_odo_m.to_le_bytes());
        out[12..14].copy_from_slice(&clamp_i16(self.outside_temp_dc).to_le_bytes());
        out[14..16].copy_from_slice(&clamp_i16(self.inside_temp_dc).to_le_bytes());
        out[16..18].copy_from_slice(&clamp_i16(self.battery_mv).to_le_bytes());
        out[18..20].copy_from_slice(&clamp_current_time_min(self.current_time_min).to_le_bytes());
        out[20..22].copy_from_slice(&clamp_u16(self.trip_time_min).to_le_bytes());
        out[22..24].copy_from_slice(&clamp_u16(self.fuel_left_dl).to_le_bytes());
        out[24..26].copy_from_slice(&clamp_u16(self.fuel_total_dl).to_le_bytes());
        out
    }
}

fn clamp_i16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn clamp_u16(v: i32) -> u16 {
    v.clamp(0, u16::MAX as i32) as u16
}

fn clamp_current_time_min(v: i32) -> u16 {
    v.clamp(0, 1439) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A concrete snapshot encodes to the exact wire byte layout, field by
    /// field, rather than just round-tripping through its own decoder.
    #[test]
    fn encode_snapshot_matches_wire_bytes() {
        let snap = VehicleSnapshot {
            speed_kmh: 80,
            rpm: 1800,
            odo_m: 123_456,
            trip_odo_m: 789,
            outside_temp_dc: -5,
            inside_temp_dc: 220,
            battery_mv: 12_800,
            current_time_min: 754,
            trip_time_min: 42,
            fuel_left_dl: 35,
            fuel_total_dl: 450,
        };
        let bytes = snap.encode();
        assert_eq!(&bytes[0..2], &80i16.to_le_bytes());
        assert_eq!(&bytes[2..4], &1800i16.to_le_bytes());
        assert_eq!(&bytes[4..8], &123_456i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &789i32.to_le_bytes());
        assert_eq!(&bytes[12..14], &(-5i16).to_le_bytes());
        assert_eq!(&bytes[14..16], &220i16.to_le_bytes());
        assert_eq!(&bytes[16..18], &12_800i16.to_le_bytes());
        assert_eq!(&bytes[18..20], &754u16.to_le_bytes());
        assert_eq!(&bytes[20..22], &42u16.to_le_bytes());
        assert_eq!(&bytes[22..24], &35u16.to_le_bytes());
        assert_eq!(&bytes[24..26], &450u16.to_le_bytes());
    }

    #[test]
    fn clamping_saturates_instead_of_wrapping() {
        let snap = VehicleSnapshot {
            speed_kmh: 1_000_000,
            rpm: -1_000_000,
            current_time_min: 5000,
            fuel_left_dl: -10,
            ..VehicleSnapshot::default()
        };
        let bytes = snap.encode();
        assert_eq!(i16::from_le_bytes(bytes[0..2].try_into().unwrap()), i16::MAX);
        assert_eq!(i16::from_le_bytes(bytes[2..4].try_into().unwrap()), i16::MIN);
        assert_eq!(u16::from_le_bytes(bytes[18..20].try_into().unwrap()), 1439);
        assert_eq!(u16::from_le_bytes(bytes[22..24].try_into().unwrap()), 0);
    }
}
