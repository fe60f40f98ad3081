mod common;

use std::path::PathBuf;

use common::TestFrame;
use umbra_core::error::UmbraError;
use umbra_core::frame::FrameKind;
use umbra_core::scan::{read_frame_info, scan_roots};

#[test]
fn test_scan_collects_darks_recursively() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("session1");
    std::fs::create_dir(&nested).unwrap();
    TestFrame::dark("2024-01-10T20:00:00").write(dir.path(), "d1.fits");
    TestFrame::dark("2024-01-10T21:00:00").write(&nested, "d2.fit");

    let outcome = scan_roots(&[dir.path().to_path_buf()], None).unwrap();
    assert_eq!(outcome.frames.len(), 2);
    assert_eq!(outcome.skipped.len(), 0);
    assert!(outcome.frames.iter().all(|f| f.kind == FrameKind::Dark));
}

#[test]
fn test_scan_ignores_unrelated_extensions() {
    let dir = tempfile::tempdir().unwrap();
    TestFrame::dark("2024-01-10T20:00:00").write(dir.path(), "d1.fits");
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
    std::fs::write(dir.path().join("thumb.png"), [0u8; 64]).unwrap();

    let outcome = scan_roots(&[dir.path().to_path_buf()], None).unwrap();
    assert_eq!(outcome.files_seen(), 1);
    assert_eq!(outcome.frames.len(), 1);
}

#[test]
fn test_scan_skips_corrupt_file_but_continues() {
    let dir = tempfile::tempdir().unwrap();
    TestFrame::dark("2024-01-10T20:00:00").write(dir.path(), "good.fits");
    std::fs::write(dir.path().join("broken.fits"), vec![0u8; 128]).unwrap();

    let outcome = scan_roots(&[dir.path().to_path_buf()], None).unwrap();
    assert_eq!(outcome.frames.len(), 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.skipped[0]
        .path
        .to_string_lossy()
        .ends_with("broken.fits"));
}

#[test]
fn test_scan_skips_light_frames() {
    let dir = tempfile::tempdir().unwrap();
    TestFrame::dark("2024-01-10T20:00:00")
        .image_type(Some("Light"))
        .write(dir.path(), "light.fits");

    let outcome = scan_roots(&[dir.path().to_path_buf()], None).unwrap();
    assert!(outcome.frames.is_empty());
    assert_eq!(outcome.skipped.len(), 1);
}

#[test]
fn test_missing_root_is_fatal() {
    let err = scan_roots(&[PathBuf::from("/no/such/root")], None).unwrap_err();
    assert!(matches!(err, UmbraError::InputRootMissing(_)));
}

#[test]
fn test_exposure_fallback_bias_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let bias = TestFrame::dark("2024-01-10T20:00:00")
        .exposure(0.05)
        .image_type(None)
        .write(dir.path(), "maybe_bias.fits");
    let dark = TestFrame::dark("2024-01-10T20:01:00")
        .exposure(0.051)
        .image_type(None)
        .write(dir.path(), "maybe_dark.fits");

    assert_eq!(read_frame_info(&bias).unwrap().kind, FrameKind::Bias);
    assert_eq!(read_frame_info(&dark).unwrap().kind, FrameKind::Dark);
}

#[test]
fn test_frame_info_fields_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = TestFrame::dark("2024-01-10T20:00:00")
        .temperature(-10.2)
        .gain(120)
        .write(dir.path(), "d.fits");

    let info = read_frame_info(&path).unwrap();
    assert_eq!(info.camera_id, common::CAMERA);
    assert_eq!(info.binning, (1, 1));
    assert_eq!(info.gain, 120);
    assert_eq!(info.exposure_s, 300.0);
    assert_eq!(info.temperature_c, -10.2);
    assert!(!info.is_cfa);
}

#[test]
fn test_age_window_keeps_recent_frames_only() {
    let dir = tempfile::tempdir().unwrap();
    TestFrame::dark("2023-06-01T20:00:00").write(dir.path(), "ancient.fits");
    TestFrame::dark("2024-01-08T20:00:00").write(dir.path(), "recent.fits");
    TestFrame::dark("2024-01-10T20:00:00").write(dir.path(), "newest.fits");

    let outcome = scan_roots(&[dir.path().to_path_buf()], Some(30)).unwrap();
    assert_eq!(outcome.frames.len(), 2);
    assert!(outcome
        .frames
        .iter()
        .all(|f| !f.path.to_string_lossy().contains("ancient")));
    assert_eq!(outcome.skipped.len(), 1);
}

#[test]
fn test_age_window_is_relative_to_newest_frame() {
    let dir = tempfile::tempdir().unwrap();
    // both frames are years in the past, but only 2 days apart
    TestFrame::dark("2020-01-01T20:00:00").write(dir.path(), "a.fits");
    TestFrame::dark("2020-01-03T20:00:00").write(dir.path(), "b.fits");

    let outcome = scan_roots(&[dir.path().to_path_buf()], Some(7)).unwrap();
    assert_eq!(outcome.frames.len(), 2);
}
