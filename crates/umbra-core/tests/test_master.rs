mod common;

use common::{frame_info, TestFrame};
use umbra_core::engine::StackParams;
use umbra_core::fits::FitsReader;
use umbra_core::group::GroupKey;
use umbra_core::header::{keys, parse_timestamp, HeaderView};
use umbra_core::master::{find_master, list_masters, read_master, write_master};
use umbra_core::scan::read_frame_info;

#[test]
fn test_write_master_stamps_group_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let intermediate = TestFrame::dark("2024-01-10T20:00:00").write(dir.path(), "stack_result.fits");

    let frames = vec![
        read_frame_info(&TestFrame::dark("2024-01-10T20:00:00").write(dir.path(), "a.fits")).unwrap(),
        read_frame_info(&TestFrame::dark("2024-01-10T20:05:00").write(dir.path(), "b.fits")).unwrap(),
    ];
    let key = GroupKey::new(&frames[0], 0.5);
    let final_path = dir.path().join(key.master_filename());
    let params = StackParams::default();

    let master = write_master(&intermediate, &final_path, &key, &frames, &params, "siril -s x.ssf")
        .unwrap();
    assert_eq!(master.n_frames_used, 2);
    assert_eq!(master.created_at, parse_timestamp("2024-01-10T20:05:00"));

    let reader = FitsReader::open(&final_path).unwrap();
    let view = HeaderView::new(&reader.header);
    assert_eq!(view.image_type(), Some("Master Dark"));
    assert_eq!(view.camera_id(), Some(common::CAMERA));
    assert_eq!(view.gain(), Some(100));
    assert_eq!(view.binning(), Some((1, 1)));
    assert_eq!(view.exposure_s(), Some(300.0));
    assert_eq!(view.temperature_c(), Some(-10.0));
    assert_eq!(view.n_frames_used(), 2);
    assert_eq!(view.stack_signature(), Some(params.signature().as_str()));
    assert_eq!(reader.header.get_str(keys::STACKCMD), Some("siril -s x.ssf"));

    // pixel data survives the header rewrite
    let original = FitsReader::open(&intermediate).unwrap().read_pixels().unwrap();
    let stamped = reader.read_pixels().unwrap();
    assert_eq!(original, stamped);
}

#[test]
fn test_write_master_leaves_no_temporary_behind() {
    let dir = tempfile::tempdir().unwrap();
    let intermediate = TestFrame::dark("2024-01-10T20:00:00").write(dir.path(), "stack_result.fits");
    let frames =
        vec![read_frame_info(&TestFrame::dark("2024-01-10T20:00:00").write(dir.path(), "a.fits"))
            .unwrap()];
    let key = GroupKey::new(&frames[0], 0.5);
    let final_path = dir.path().join(key.master_filename());

    write_master(
        &intermediate,
        &final_path,
        &key,
        &frames,
        &StackParams::default(),
        "cmd",
    )
    .unwrap();

    assert!(final_path.is_file());
    assert!(!final_path.with_extension("fits.tmp").exists());
}

#[test]
fn test_find_master_absent_and_present() {
    let dir = tempfile::tempdir().unwrap();
    let key = GroupKey::new(
        &frame_info("/x.fits", "2024-01-10T20:00:00", 300.0, -10.0),
        0.5,
    );
    assert!(find_master(dir.path(), &key).is_none());

    common::write_master_file(
        &dir.path().join(key.master_filename()),
        "2024-01-09T20:00:00",
        12,
        "sig",
    );
    let master = find_master(dir.path(), &key).expect("master found");
    assert_eq!(master.n_frames_used, 12);
    assert_eq!(master.stack_signature.as_deref(), Some("sig"));
}

#[test]
fn test_corrupt_master_reported_without_signature() {
    let dir = tempfile::tempdir().unwrap();
    let key = GroupKey::new(
        &frame_info("/x.fits", "2024-01-10T20:00:00", 300.0, -10.0),
        0.5,
    );
    std::fs::write(dir.path().join(key.master_filename()), b"garbage").unwrap();

    let master = find_master(dir.path(), &key).expect("present but unreadable");
    assert_eq!(master.stack_signature, None);
    assert_eq!(master.n_frames_used, 0);
}

#[test]
fn test_read_master_without_nstack_defaults_to_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = TestFrame::dark("2024-01-10T20:00:00")
        .image_type(Some("Master Dark"))
        .write(dir.path(), "master_dark_old.fits");
    let master = read_master(&path).unwrap();
    assert_eq!(master.n_frames_used, 0);
}

#[test]
fn test_list_masters_sorted_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    common::write_master_file(
        &dir.path().join("master_dark_b.fits"),
        "2024-01-09T20:00:00",
        5,
        "sig",
    );
    common::write_master_file(
        &dir.path().join("master_dark_a.fits"),
        "2024-01-09T20:00:00",
        7,
        "sig",
    );
    TestFrame::dark("2024-01-10T20:00:00").write(dir.path(), "raw_frame.fits");

    let masters = list_masters(dir.path()).unwrap();
    assert_eq!(masters.len(), 2);
    assert!(masters[0].path < masters[1].path);
}
