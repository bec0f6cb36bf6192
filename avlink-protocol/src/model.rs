//! Receiver model properties
//!
//! A [`ModelProperties`] value describes what one receiver model can do: how
//! many zones it has, the dB range of each zone's volume, which sources can be
//! selected, and how volume changes must be sent. Known models come from a
//! small catalogue; user configuration is merged on top with
//! [`ModelProperties::with_overrides`], which always produces a new value.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Highest zone number the protocol defines (main, zone 2, zone 3, HD zone)
pub const MAX_ZONES: u8 = 4;

pub const DEFAULT_MIN_DB: [f64; 4] = [-80.0, -80.0, -80.0, -80.0];
pub const DEFAULT_MAX_DB: [f64; 4] = [12.0, 0.0, 0.0, 0.0];
pub const DEFAULT_STEP_DB: [f64; 4] = [0.5, 1.0, 1.0, 1.0];
pub const DEFAULT_BURST_DELAY: Duration = Duration::from_millis(10);

// ============================================================================
// Input sources
// ============================================================================

/// A selectable source and its two digit wire code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputSource {
    pub code: &'static str,
    pub name: &'static str,
}

impl InputSource {
    const fn new(code: &'static str, name: &'static str) -> Self {
        Self { code, name }
    }

    /// Every source the protocol defines
    pub const ALL: [InputSource; 21] = [
        InputSource::new("04", "DVD"),
        InputSource::new("25", "BD"),
        InputSource::new("05", "TV/SAT"),
        InputSource::new("15", "DVR/BDR"),
        InputSource::new("10", "VIDEO 1"),
        InputSource::new("14", "VIDEO 2"),
        InputSource::new("19", "HDMI 1"),
        InputSource::new("20", "HDMI 2"),
        InputSource::new("21", "HDMI 3"),
        InputSource::new("22", "HDMI 4"),
        InputSource::new("23", "HDMI 5"),
        InputSource::new("26", "HOME MEDIA GALLERY"),
        InputSource::new("17", "iPod/USB"),
        InputSource::new("18", "XM RADIO"),
        InputSource::new("01", "CD"),
        InputSource::new("03", "CD-R/TAPE"),
        InputSource::new("02", "TUNER"),
        InputSource::new("00", "PHONO"),
        InputSource::new("12", "MULTI CH IN"),
        InputSource::new("33", "ADAPTER PORT"),
        InputSource::new("27", "SIRIUS"),
    ];

    pub fn by_code(code: &str) -> Option<InputSource> {
        Self::ALL.iter().copied().find(|source| source.code == code)
    }

    /// Case-insensitive lookup by display name
    pub fn by_name(name: &str) -> Option<InputSource> {
        Self::ALL
            .iter()
            .copied()
            .find(|source| source.name.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Zones
// ============================================================================

/// Volume range and selectable sources of one zone
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneProperties {
    pub min_db: f64,
    pub max_db: f64,
    pub step_db: f64,
    pub input_sources: Vec<InputSource>,
}

impl ZoneProperties {
    /// Factory values for a zone number in 1..=4
    pub fn default_for(zone: u8) -> Self {
        let index = usize::from(zone.clamp(1, MAX_ZONES)) - 1;
        Self {
            min_db: DEFAULT_MIN_DB[index],
            max_db: DEFAULT_MAX_DB[index],
            step_db: DEFAULT_STEP_DB[index],
            input_sources: InputSource::ALL.to_vec(),
        }
    }

    pub fn units_per_db(&self) -> f64 {
        1.0 / self.step_db
    }

    /// Native value at `max_db`
    pub fn max_native(&self) -> u32 {
        ((self.max_db - self.min_db) * self.units_per_db()).round() as u32
    }

    /// Number of digits of the native volume on the wire
    pub fn native_width(&self) -> usize {
        self.max_native().to_string().len()
    }

    fn validate(&self, zone: u8) -> Result<()> {
        if !(self.step_db > 0.0) {
            return Err(ProtocolError::InvalidConfiguration(format!(
                "zone {zone}: volume step must be positive, got {}",
                self.step_db
            )));
        }
        if !(self.min_db < self.max_db) {
            return Err(ProtocolError::InvalidConfiguration(format!(
                "zone {zone}: minimum volume {} dB must be below maximum {} dB",
                self.min_db, self.max_db
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Model properties
// ============================================================================

/// Immutable description of a receiver model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProperties {
    model_name: String,
    description: String,
    zones: Vec<ZoneProperties>,
    set_volume_enabled: bool,
    db_channels_enabled: bool,
    burst_mode_enabled: bool,
    burst_delay: Duration,
}

impl ModelProperties {
    pub const VSX_1120: &'static str = "VSX-1120";
    pub const CONFIGURABLE: &'static str = "ConfigurablePioneerAVR";

    pub fn builder(model_name: impl Into<String>, nb_zones: u8) -> ModelPropertiesBuilder {
        ModelPropertiesBuilder::new(model_name, nb_zones)
    }

    /// Two zone receiver with factory volume ranges
    pub fn vsx_1120() -> Self {
        Self::builder(Self::VSX_1120, 2).build_unchecked()
    }

    /// Generic four zone receiver meant to be tuned through overrides
    pub fn configurable() -> Self {
        Self::builder(Self::CONFIGURABLE, 4)
            .description("An unknown AVR model. Parameter of this model can be modified on the fly.")
            .db_channels(false)
            .burst_delay(DEFAULT_BURST_DELAY)
            .build_unchecked()
    }

    /// Look up a catalogue model by name
    pub fn for_model(name: &str) -> Option<Self> {
        match name {
            Self::VSX_1120 => Some(Self::vsx_1120()),
            Self::CONFIGURABLE => Some(Self::configurable()),
            _ => None,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn nb_zones(&self) -> u8 {
        self.zones.len() as u8
    }

    pub fn is_zone_supported(&self, zone: u8) -> bool {
        zone >= 1 && zone <= self.nb_zones()
    }

    /// Properties of `zone`.
    ///
    /// # Panics
    ///
    /// Panics when `zone` is outside `1..=nb_zones()`.
    pub fn zone(&self, zone: u8) -> &ZoneProperties {
        assert!(
            self.is_zone_supported(zone),
            "zone {zone} out of range 1..={} for model {}",
            self.nb_zones(),
            self.model_name
        );
        &self.zones[usize::from(zone) - 1]
    }

    pub fn zones(&self) -> &[ZoneProperties] {
        &self.zones
    }

    pub fn input_sources(&self, zone: u8) -> &[InputSource] {
        &self.zone(zone).input_sources
    }

    /// Resolve a wire code or display name among the sources of `zone`
    pub fn find_input_source(&self, zone: u8, text: &str) -> Option<InputSource> {
        let text = text.trim();
        InputSource::by_code(text)
            .or_else(|| InputSource::by_name(text))
            .filter(|source| self.input_sources(zone).contains(source))
    }

    pub fn is_set_volume_enabled(&self) -> bool {
        self.set_volume_enabled
    }

    pub fn are_db_channels_enabled(&self) -> bool {
        self.db_channels_enabled
    }

    pub fn is_burst_mode_enabled(&self) -> bool {
        self.burst_mode_enabled
    }

    pub fn burst_delay(&self) -> Duration {
        self.burst_delay
    }

    /// Merge user overrides into a copy of these properties.
    ///
    /// Zones added by a larger zone count get factory values. Per-zone volume
    /// overrides for zones beyond the resulting count are ignored.
    pub fn with_overrides(&self, overrides: &ModelOverrides) -> Result<Self> {
        overrides.validate()?;

        let nb_zones = overrides.zones.unwrap_or(self.nb_zones());
        let mut builder = ModelPropertiesBuilder {
            properties: self.clone(),
        };
        builder.properties.zones = (1..=nb_zones)
            .map(|zone| {
                self.zones
                    .get(usize::from(zone) - 1)
                    .cloned()
                    .unwrap_or_else(|| ZoneProperties::default_for(zone))
            })
            .collect();

        if let Some(enabled) = overrides.set_volume {
            builder = builder.set_volume(enabled);
        }
        if let Some(enabled) = overrides.burst_mode {
            builder = builder.burst_mode(enabled);
        }
        if let Some(delay) = overrides.burst_delay_ms {
            builder = builder.burst_delay(Duration::from_millis(delay));
        }

        for (zone, volume) in &overrides.volume {
            if *zone > nb_zones {
                tracing::warn!(
                    "Ignoring volume override for zone {} of a {} zone model",
                    zone,
                    nb_zones
                );
                continue;
            }
            let properties = &mut builder.properties.zones[usize::from(*zone) - 1];
            if let Some(min_db) = volume.min_db {
                properties.min_db = min_db;
            }
            if let Some(max_db) = volume.max_db {
                properties.max_db = max_db;
            }
            if let Some(step_db) = volume.step_db {
                properties.step_db = step_db;
            }
        }

        builder.build()
    }
}

/// Builds a [`ModelProperties`] starting from factory defaults
#[derive(Debug, Clone)]
pub struct ModelPropertiesBuilder {
    properties: ModelProperties,
}

impl ModelPropertiesBuilder {
    pub fn new(model_name: impl Into<String>, nb_zones: u8) -> Self {
        let model_name = model_name.into();
        Self {
            properties: ModelProperties {
                description: format!("A Pioneer AVR {model_name}"),
                model_name,
                zones: (1..=nb_zones.min(MAX_ZONES))
                    .map(ZoneProperties::default_for)
                    .collect(),
                set_volume_enabled: true,
                db_channels_enabled: true,
                burst_mode_enabled: true,
                burst_delay: DEFAULT_BURST_DELAY,
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.properties.description = description.into();
        self
    }

    /// Replace the properties of one zone; zones outside the model are ignored
    pub fn zone(mut self, zone: u8, properties: ZoneProperties) -> Self {
        if let Some(slot) = usize::from(zone)
            .checked_sub(1)
            .and_then(|index| self.properties.zones.get_mut(index))
        {
            *slot = properties;
        }
        self
    }

    pub fn set_volume(mut self, enabled: bool) -> Self {
        self.properties.set_volume_enabled = enabled;
        self
    }

    pub fn db_channels(mut self, enabled: bool) -> Self {
        self.properties.db_channels_enabled = enabled;
        self
    }

    pub fn burst_mode(mut self, enabled: bool) -> Self {
        self.properties.burst_mode_enabled = enabled;
        self
    }

    pub fn burst_delay(mut self, delay: Duration) -> Self {
        self.properties.burst_delay = delay;
        self
    }

    /// Validate the zone table and produce the properties
    pub fn build(self) -> Result<ModelProperties> {
        if self.properties.zones.is_empty() {
            return Err(ProtocolError::InvalidConfiguration(
                "a model needs at least one zone".to_string(),
            ));
        }
        for (index, zone) in self.properties.zones.iter().enumerate() {
            zone.validate(index as u8 + 1)?;
        }
        Ok(self.properties)
    }

    /// Catalogue models use factory values that are known to be valid
    fn build_unchecked(self) -> ModelProperties {
        self.properties
    }
}

// ============================================================================
// User overrides
// ============================================================================

/// Volume range override for one zone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeOverride {
    pub min_db: Option<f64>,
    pub max_db: Option<f64>,
    pub step_db: Option<f64>,
}

/// User supplied changes to a catalogue model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOverrides {
    /// Number of zones, 1..=4
    pub zones: Option<u8>,
    pub set_volume: Option<bool>,
    pub burst_mode: Option<bool>,
    pub burst_delay_ms: Option<u64>,
    /// Volume range per zone number
    pub volume: BTreeMap<u8, VolumeOverride>,
}

impl ModelOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(zones) = self.zones {
            if zones == 0 || zones > MAX_ZONES {
                return Err(ProtocolError::InvalidConfiguration(format!(
                    "zone count must be between 1 and {MAX_ZONES}, got {zones}"
                )));
            }
        }
        if let Some(zone) = self
            .volume
            .keys()
            .find(|zone| **zone == 0 || **zone > MAX_ZONES)
        {
            return Err(ProtocolError::InvalidConfiguration(format!(
                "volume override for unknown zone {zone}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vsx_1120_defaults() {
        let model = ModelProperties::vsx_1120();
        assert_eq!(model.model_name(), "VSX-1120");
        assert_eq!(model.description(), "A Pioneer AVR VSX-1120");
        assert_eq!(model.nb_zones(), 2);
        assert!(model.is_set_volume_enabled());
        assert!(model.are_db_channels_enabled());
        assert!(model.is_burst_mode_enabled());
        assert_eq!(model.burst_delay(), Duration::from_millis(10));

        let main = model.zone(1);
        assert_eq!((main.min_db, main.max_db, main.step_db), (-80.0, 12.0, 0.5));
        assert_eq!(main.max_native(), 184);
        assert_eq!(main.native_width(), 3);

        let zone2 = model.zone(2);
        assert_eq!((zone2.min_db, zone2.max_db, zone2.step_db), (-80.0, 0.0, 1.0));
        assert_eq!(zone2.native_width(), 2);
    }

    #[test]
    fn test_configurable_model() {
        let model = ModelProperties::configurable();
        assert_eq!(model.nb_zones(), 4);
        assert!(!model.are_db_channels_enabled());
        assert!(ModelProperties::for_model("ConfigurablePioneerAVR").is_some());
        assert!(ModelProperties::for_model("VSX-9999").is_none());
    }

    #[test]
    #[should_panic(expected = "zone 3 out of range")]
    fn test_zone_out_of_range_panics() {
        ModelProperties::vsx_1120().zone(3);
    }

    #[test]
    fn test_overrides_produce_new_value() {
        let base = ModelProperties::vsx_1120();
        let mut overrides = ModelOverrides {
            zones: Some(3),
            set_volume: Some(false),
            burst_delay_ms: Some(25),
            ..Default::default()
        };
        overrides.volume.insert(
            1,
            VolumeOverride {
                max_db: Some(0.0),
                ..Default::default()
            },
        );

        let merged = base.with_overrides(&overrides).unwrap();
        assert_eq!(merged.nb_zones(), 3);
        assert!(!merged.is_set_volume_enabled());
        assert_eq!(merged.burst_delay(), Duration::from_millis(25));
        assert_eq!(merged.zone(1).max_db, 0.0);
        assert_eq!(merged.zone(1).step_db, 0.5);
        assert_eq!(merged.zone(3), &ZoneProperties::default_for(3));

        // base untouched
        assert_eq!(base.nb_zones(), 2);
        assert_eq!(base.zone(1).max_db, 12.0);
    }

    #[test]
    fn test_overrides_shrink_zone_count() {
        let overrides = ModelOverrides {
            zones: Some(1),
            ..Default::default()
        };
        let merged = ModelProperties::configurable()
            .with_overrides(&overrides)
            .unwrap();
        assert_eq!(merged.nb_zones(), 1);
        assert!(!merged.is_zone_supported(2));
    }

    #[test]
    fn test_invalid_overrides() {
        let too_many = ModelOverrides {
            zones: Some(5),
            ..Default::default()
        };
        assert!(ModelProperties::vsx_1120().with_overrides(&too_many).is_err());

        let mut inverted = ModelOverrides::default();
        inverted.volume.insert(
            2,
            VolumeOverride {
                min_db: Some(10.0),
                ..Default::default()
            },
        );
        assert!(matches!(
            ModelProperties::vsx_1120().with_overrides(&inverted),
            Err(ProtocolError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_overrides_from_json() {
        let overrides: ModelOverrides = serde_json::from_str(
            r#"{ "zones": 2, "burst_mode": false, "volume": { "2": { "max_db": -10.0 } } }"#,
        )
        .unwrap();
        assert_eq!(overrides.zones, Some(2));
        assert_eq!(overrides.burst_mode, Some(false));
        assert_eq!(overrides.volume[&2].max_db, Some(-10.0));
        assert!(ModelOverrides::default().is_empty());
    }

    #[test]
    fn test_input_source_lookup() {
        assert_eq!(InputSource::by_code("19").map(|s| s.name), Some("HDMI 1"));
        assert_eq!(InputSource::by_name("tuner").map(|s| s.code), Some("02"));
        assert_eq!(InputSource::by_code("99"), None);
    }

    #[test]
    fn test_find_input_source_within_zone() {
        let tuner_only = ZoneProperties {
            input_sources: vec![InputSource::by_code("02").unwrap()],
            ..ZoneProperties::default_for(2)
        };
        let model = ModelProperties::builder("Test", 2)
            .zone(2, tuner_only)
            .build()
            .unwrap();

        assert_eq!(model.find_input_source(1, "HDMI 1").map(|s| s.code), Some("19"));
        assert_eq!(model.find_input_source(1, " 25 ").map(|s| s.name), Some("BD"));
        assert_eq!(model.find_input_source(2, "Tuner").map(|s| s.code), Some("02"));
        assert_eq!(model.find_input_source(2, "19"), None);
        assert_eq!(model.find_input_source(1, "GAME"), None);
    }
}
