//! Volume conversion between percent, dB and native receiver units
//!
//! Every zone has its own dB range and step. Native units count steps above
//! the zone minimum and travel on the wire as fixed width decimals.

use crate::error::{ProtocolError, Result};
use crate::model::{ModelProperties, ZoneProperties};

/// Converts volumes for the zones of one model.
///
/// Zone numbers are 1-based. Passing a zone outside the model is a caller
/// bug and panics.
#[derive(Debug, Clone)]
pub struct VolumeConverter {
    zones: Vec<ZoneProperties>,
}

impl VolumeConverter {
    pub fn new(model: &ModelProperties) -> Self {
        Self {
            zones: model.zones().to_vec(),
        }
    }

    pub fn nb_zones(&self) -> u8 {
        self.zones.len() as u8
    }

    fn zone(&self, zone: u8) -> &ZoneProperties {
        assert!(
            zone >= 1 && usize::from(zone) <= self.zones.len(),
            "zone {zone} out of range 1..={}",
            self.zones.len()
        );
        &self.zones[usize::from(zone) - 1]
    }

    /// Native steps between the zone minimum and maximum, plus one
    fn native_span(&self, zone: u8) -> f64 {
        let zone = self.zone(zone);
        (zone.max_db - zone.min_db) * zone.units_per_db() + 1.0
    }

    pub fn max_native(&self, zone: u8) -> u32 {
        self.zone(zone).max_native()
    }

    pub fn percent_to_db(&self, percent: f64, zone: u8) -> f64 {
        let zone = self.zone(zone);
        zone.min_db + percent.clamp(0.0, 100.0) / 100.0 * (zone.max_db - zone.min_db)
    }

    pub fn db_to_percent(&self, db: f64, zone: u8) -> f64 {
        let zone = self.zone(zone);
        (db.clamp(zone.min_db, zone.max_db) - zone.min_db) / (zone.max_db - zone.min_db) * 100.0
    }

    pub fn db_to_native(&self, db: f64, zone: u8) -> u32 {
        let zone = self.zone(zone);
        ((db.clamp(zone.min_db, zone.max_db) - zone.min_db) * zone.units_per_db()).round() as u32
    }

    pub fn native_to_db(&self, native: u32, zone: u8) -> f64 {
        let zone = self.zone(zone);
        zone.min_db + f64::from(native) / zone.units_per_db()
    }

    pub fn percent_to_native(&self, percent: f64, zone: u8) -> u32 {
        (percent.clamp(0.0, 100.0) * self.native_span(zone) / 100.0).round() as u32
    }

    pub fn native_to_percent(&self, native: u32, zone: u8) -> f64 {
        f64::from(native) * 100.0 / self.native_span(zone)
    }

    /// Zero padded wire form of a native value
    pub fn format_native(&self, native: u32, zone: u8) -> String {
        let width = self.zone(zone).native_width();
        format!("{native:0width$}")
    }

    pub fn parse_native(&self, value: &str) -> Result<u32> {
        value
            .trim()
            .parse()
            .map_err(|_| ProtocolError::InvalidNumber(value.to_string()))
    }

    pub fn percent_to_wire(&self, percent: f64, zone: u8) -> String {
        self.format_native(self.percent_to_native(percent, zone), zone)
    }

    pub fn db_to_wire(&self, db: f64, zone: u8) -> String {
        self.format_native(self.db_to_native(db, zone), zone)
    }

    pub fn wire_to_percent(&self, value: &str, zone: u8) -> Result<f64> {
        Ok(self.native_to_percent(self.parse_native(value)?, zone))
    }

    pub fn wire_to_db(&self, value: &str, zone: u8) -> Result<f64> {
        Ok(self.native_to_db(self.parse_native(value)?, zone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn converter() -> VolumeConverter {
        VolumeConverter::new(&ModelProperties::configurable())
    }

    #[test]
    fn test_half_volume_on_main_zone() {
        let converter = converter();
        assert_eq!(converter.percent_to_native(50.0, 1), 93);
        assert_eq!(converter.percent_to_wire(50.0, 1), "093");

        let percent = converter.wire_to_percent("093", 1).unwrap();
        assert!((percent - 50.0).abs() < 1.0);
    }

    #[rstest]
    #[case(1, -80.0, "000")]
    #[case(1, 0.0, "160")]
    #[case(1, 12.0, "184")]
    #[case(1, -33.5, "093")]
    #[case(2, -80.0, "00")]
    #[case(2, -40.0, "40")]
    #[case(4, 0.0, "80")]
    fn test_db_to_wire(#[case] zone: u8, #[case] db: f64, #[case] wire: &str) {
        assert_eq!(converter().db_to_wire(db, zone), wire);
    }

    #[test]
    fn test_wire_to_db() {
        let converter = converter();
        assert_eq!(converter.wire_to_db("093", 1).unwrap(), -33.5);
        assert_eq!(converter.wire_to_db("40", 2).unwrap(), -40.0);
        assert!(converter.wire_to_db("x1", 2).is_err());
    }

    #[test]
    fn test_inputs_are_clamped() {
        let converter = converter();
        assert_eq!(converter.percent_to_native(-5.0, 2), 0);
        assert_eq!(converter.percent_to_native(150.0, 2), 81);
        assert_eq!(converter.db_to_native(20.0, 1), 184);
        assert_eq!(converter.db_to_percent(-100.0, 1), 0.0);
    }

    #[test]
    fn test_percent_db_interpolation() {
        let converter = converter();
        assert_eq!(converter.percent_to_db(0.0, 1), -80.0);
        assert_eq!(converter.percent_to_db(100.0, 1), 12.0);
        assert_eq!(converter.percent_to_db(50.0, 2), -40.0);
        assert_eq!(converter.db_to_percent(-40.0, 3), 50.0);
    }

    #[test]
    #[should_panic(expected = "zone 5 out of range")]
    fn test_zone_out_of_range_panics() {
        converter().percent_to_native(10.0, 5);
    }

    #[test]
    #[should_panic(expected = "zone 0 out of range")]
    fn test_zone_zero_panics() {
        converter().native_to_db(10, 0);
    }
}
