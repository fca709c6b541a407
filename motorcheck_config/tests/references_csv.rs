use std::fs::File;
use std::io::Write;

use motorcheck_config::{MAX_TEST_POINTS, TestPointRow, load_reference_csv};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("references.csv");
    let mut f = File::create(&path).expect("create");
    f.write_all(body.as_bytes()).expect("write");
    (dir, path)
}

#[rstest]
fn loads_four_point_table() {
    let (_dir, path) = write_csv(
        "drive_mv,settle_speed,settle_current\n\
         6000,117,70\n\
         12000, 237 ,160\n\
         -6000,-117,73\n\
         -12000,-236,156\n",
    );
    let rows = load_reference_csv(&path).expect("valid table");
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[1],
        TestPointRow {
            drive_mv: 12_000,
            settle_speed: 237.0,
            settle_current: 160,
        }
    );
    assert_eq!(rows[3].drive_mv, -12_000);
}

#[rstest]
#[case("drive,speed,current\n6000,117,70\n")]
#[case("settle_speed,drive_mv,settle_current\n117,6000,70\n")]
#[case("drive_mv,settle_speed\n6000,117\n")]
fn wrong_headers_are_rejected(#[case] body: &str) {
    let (_dir, path) = write_csv(body);
    let msg = load_reference_csv(&path).expect_err("bad headers").to_string();
    assert!(msg.contains("headers"), "{msg}");
}

#[rstest]
fn unparsable_row_reports_line() {
    let (_dir, path) = write_csv(
        "drive_mv,settle_speed,settle_current\n\
         6000,117,70\n\
         fast,237,160\n",
    );
    let msg = load_reference_csv(&path).expect_err("bad row").to_string();
    assert!(msg.contains("invalid CSV row 3"), "{msg}");
}

#[rstest]
fn sign_mismatch_is_rejected() {
    let (_dir, path) = write_csv("drive_mv,settle_speed,settle_current\n-6000,117,73\n");
    let msg = load_reference_csv(&path).expect_err("sign").to_string();
    assert!(msg.contains("sign"), "{msg}");
}

#[rstest]
fn header_only_file_is_empty_table() {
    let (_dir, path) = write_csv("drive_mv,settle_speed,settle_current\n");
    let msg = load_reference_csv(&path).expect_err("empty").to_string();
    assert!(msg.contains("at least one"), "{msg}");
}

#[rstest]
fn too_many_rows_are_rejected() {
    let mut body = String::from("drive_mv,settle_speed,settle_current\n");
    for _ in 0..=MAX_TEST_POINTS {
        body.push_str("6000,117,70\n");
    }
    let (_dir, path) = write_csv(&body);
    let msg = load_reference_csv(&path).expect_err("too long").to_string();
    assert!(msg.contains("at most"), "{msg}");
}

#[rstest]
fn missing_file_names_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("nope.csv");
    let msg = load_reference_csv(&path).expect_err("missing").to_string();
    assert!(msg.contains("nope.csv"), "{msg}");
}
