mod common;

use common::{fleet, ready_session};
use fleet_map_core::engine::EngineEvent;
use fleet_map_core::layers::geofence::{GEOFENCE_LABEL_SOURCE, GEOFENCE_SOURCE, OUTLINE_LAYER};
use fleet_map_core::{FleetData, Geofence, Theme};

fn with_geofences(mut data: FleetData, areas: &[(i64, &str)]) -> FleetData {
    data.geofences = areas
        .iter()
        .map(|(id, area)| Geofence {
            id: *id,
            name: format!("Zone {}", id),
            description: None,
            area: area.to_string(),
        })
        .collect();
    data
}

fn ids(value: &serde_json::Value) -> Vec<i64> {
    value["features"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["properties"]["id"].as_i64())
        .collect()
}

#[test]
fn test_malformed_geofence_is_skipped() {
    let data = with_geofences(
        fleet(&[(1, 52.5, 13.4)]),
        &[
            (10, "CIRCLE (52.5 13.4, 250)"),
            (11, "POLYGON ((52 13, 52 14, 53 14"),
            (12, "POLYGON ((52 13, 52 14, 53 14, 52 13))"),
        ],
    );
    let session = ready_session(&data);
    let engine = session.engine().unwrap();

    assert_eq!(ids(engine.source_data(GEOFENCE_SOURCE).unwrap()), vec![10, 12]);
    assert_eq!(ids(engine.source_data(GEOFENCE_LABEL_SOURCE).unwrap()), vec![10, 12]);
}

#[test]
fn test_geofence_changes_are_pushed() {
    let data = with_geofences(fleet(&[]), &[(1, "LINESTRING (10 20, 11 21)")]);
    let mut session = ready_session(&data);

    let updated = with_geofences(fleet(&[]), &[(2, "CIRCLE (10 20, 100)")]);
    session.sync_geofences(&updated);

    let engine = session.engine().unwrap();
    assert_eq!(ids(engine.source_data(GEOFENCE_SOURCE).unwrap()), vec![2]);
}

#[test]
fn test_geofences_return_after_theme_switch() {
    let data = with_geofences(fleet(&[]), &[(1, "CIRCLE (10 20, 100)")]);
    let mut session = ready_session(&data);

    session.set_theme(Theme::Dark);
    assert!(session.engine().unwrap().source_data(GEOFENCE_SOURCE).is_none());

    session.handle_event(EngineEvent::StyleLoad, &data);
    let engine = session.engine().unwrap();
    assert!(engine.layer(OUTLINE_LAYER).is_some());
    assert_eq!(ids(engine.source_data(GEOFENCE_SOURCE).unwrap()), vec![1]);
}

#[test]
fn test_mistyped_geofence_in_snapshot_is_left_out() {
    let data: FleetData = serde_json::from_str(
        r#"{
            "geofences": [{"id": 1, "name": "Yard", "area": "CIRCLE (10 20, 100)"},
                          {"id": 2, "name": ["bad"], "area": {"wkt": "CIRCLE (1 2, 3)"}}]
        }"#,
    )
    .unwrap();
    let session = ready_session(&data);

    let engine = session.engine().unwrap();
    assert_eq!(ids(engine.source_data(GEOFENCE_SOURCE).unwrap()), vec![1]);
}
