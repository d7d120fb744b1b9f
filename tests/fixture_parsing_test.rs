//! Tests to verify replay fixtures parse correctly

use camscan_capture::{ReplayCamera, ReplayFixture};
use camscan_core::{BarcodeFormat, FacingMode};

#[test]
fn test_warehouse_fixture_parses() {
    let fixture = ReplayFixture::parse(include_str!("fixtures/replay/warehouse.toml")).unwrap();

    assert_eq!(fixture.devices.len(), 2);
    assert_eq!(fixture.frames.len(), 3);
    assert!(fixture.playback.looped);
    assert_eq!(fixture.playback.frame_interval_ms, 50);

    let second = &fixture.frames[2];
    assert_eq!(second.repeat, 4);
    assert_eq!(second.symbols[0].format, BarcodeFormat::QrCode);
}

#[test]
fn test_device_facing_inferred_from_labels() {
    let camera = ReplayCamera::new(
        ReplayFixture::parse(include_str!("fixtures/replay/warehouse.toml")).unwrap(),
    );
    let devices = camera.devices();

    assert_eq!(devices[0].id, "cam-front");
    assert_eq!(devices[0].facing, Some(FacingMode::User));
    assert_eq!(devices[1].facing, Some(FacingMode::Environment));
}

#[test]
fn test_fault_fixtures_parse() {
    let busy = ReplayFixture::parse(include_str!("fixtures/replay/busy_device.toml")).unwrap();
    assert_eq!(busy.faults.busy_attempts, 1000);
    assert!(busy.frames.is_empty());

    let denied =
        ReplayFixture::parse(include_str!("fixtures/replay/permission_denied.toml")).unwrap();
    assert!(denied.faults.permission_denied);

    let short = ReplayFixture::parse(include_str!("fixtures/replay/short_stream.toml")).unwrap();
    assert_eq!(short.faults.failing_engines, vec!["quagga".to_string()]);
    assert!(!short.playback.looped);
}

#[test]
fn test_ceiling_fixture_limits() {
    let fixture = ReplayFixture::parse(include_str!("fixtures/replay/hd_ceiling.toml")).unwrap();
    let device = &fixture.devices[0];

    assert_eq!((device.max_width, device.max_height), (960, 540));
    assert_eq!(device.max_frame_rate, 30);
    assert!(device.focus_modes.is_none());
}

#[test]
fn test_device_without_id_is_rejected() {
    let err = ReplayFixture::parse("[[devices]]\nid = \"\"\nlabel = \"Ghost\"\n").unwrap_err();
    assert!(err.to_string().contains("empty id"));
}
