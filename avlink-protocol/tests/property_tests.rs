//! Property-based tests for the receiver wire model
//!
//! Covers volume conversion round trips across every zone of the configurable
//! model and the independence of response matching from table order.

use proptest::prelude::*;

use avlink_protocol::avr::{Command, CommandType, Response, ResponseType};
use avlink_protocol::{ModelProperties, VolumeConverter};

// ============================================================================
// Test Helpers
// ============================================================================

fn converter() -> VolumeConverter {
    VolumeConverter::new(&ModelProperties::configurable())
}

/// Strategy for zone numbers valid on the configurable model
fn zone_strategy() -> impl Strategy<Value = u8> {
    1u8..=4
}

/// Strategy for (zone, native value) pairs within the zone's range
fn zone_native_strategy() -> impl Strategy<Value = (u8, u32)> {
    zone_strategy().prop_flat_map(|zone| {
        let max = converter().max_native(zone);
        (Just(zone), 0..=max)
    })
}

/// Strategy for lines that match exactly one response type and zone
fn response_line_strategy() -> impl Strategy<Value = (String, ResponseType, u8)> {
    prop_oneof![
        (1u8..=4, 0u8..=1).prop_map(|(zone, v)| {
            let prefix = ResponseType::PowerState.prefix(zone).unwrap_or_default();
            (format!("{prefix}{v}"), ResponseType::PowerState, zone)
        }),
        (1u8..=4, 0u32..=185).prop_map(|(zone, v)| {
            let prefix = ResponseType::VolumeLevel.prefix(zone).unwrap_or_default();
            (format!("{prefix}{v:03}"), ResponseType::VolumeLevel, zone)
        }),
        (1u8..=4, 0u8..=1).prop_map(|(zone, v)| {
            let prefix = ResponseType::MuteState.prefix(zone).unwrap_or_default();
            (format!("{prefix}{v}"), ResponseType::MuteState, zone)
        }),
        (1u8..=4, 0u8..=99).prop_map(|(zone, v)| {
            let prefix = ResponseType::InputSourceChannel.prefix(zone).unwrap_or_default();
            (format!("{prefix}{v:02}"), ResponseType::InputSourceChannel, zone)
        }),
        "[0-9A-F]{30}".prop_map(|hex| (format!("FL{hex}"), ResponseType::DisplayInformation, 1)),
    ]
}

// ============================================================================
// Volume conversion
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_native_db_round_trip((zone, native) in zone_native_strategy()) {
        let converter = converter();
        let db = converter.native_to_db(native, zone);
        let back = converter.db_to_native(db, zone);
        prop_assert!((i64::from(back) - i64::from(native)).abs() <= 1);
    }

    #[test]
    fn prop_percent_db_round_trip(zone in zone_strategy(), percent in 0.0f64..=100.0) {
        let converter = converter();
        let db = converter.percent_to_db(percent, zone);
        let back = converter.db_to_percent(db, zone);
        prop_assert!((back - percent).abs() < 1e-9);
    }

    #[test]
    fn prop_percent_wire_round_trip_within_one_unit(zone in zone_strategy(), percent in 0.0f64..=100.0) {
        let converter = converter();
        let wire = converter.percent_to_wire(percent, zone);
        let back = converter.wire_to_percent(&wire, zone).unwrap();
        let one_unit = 100.0 / f64::from(converter.max_native(zone) + 1);
        prop_assert!((back - percent).abs() <= one_unit);
    }

    #[test]
    fn prop_wire_width_is_fixed(zone in zone_strategy(), db in -80.0f64..=12.0) {
        let converter = converter();
        let wire = converter.db_to_wire(db, zone);
        let width = converter.max_native(zone).to_string().len();
        prop_assert_eq!(wire.len(), width);
        prop_assert!(Command::with_parameter(CommandType::VolumeSet, zone, wire).is_ok());
    }
}

// ============================================================================
// Response matching
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_parse_finds_the_single_matching_type((line, response_type, zone) in response_line_strategy()) {
        let response = Response::parse(&line).unwrap();
        prop_assert_eq!(response.response_type(), response_type);
        prop_assert_eq!(response.zone(), zone);
    }

    #[test]
    fn prop_matching_is_order_independent(
        (line, response_type, zone) in response_line_strategy(),
        order in Just(ResponseType::ALL.to_vec()).prop_shuffle(),
    ) {
        let found = order
            .iter()
            .find_map(|candidate| candidate.match_line(&line).map(|(z, _)| (*candidate, z)));
        prop_assert_eq!(found, Some((response_type, zone)));
    }

    #[test]
    fn prop_garbage_never_panics(line in "\\PC{0,40}") {
        let _ = Response::parse(&line);
    }
}
