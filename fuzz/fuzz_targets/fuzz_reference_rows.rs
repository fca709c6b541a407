#![no_main]
use libfuzzer_sys::fuzz_target;
use motorcheck_config::{TestPointRow, validate_test_points};

fuzz_target!(|rows: Vec<(i32, f64, i32)>| {
    let rows: Vec<TestPointRow> = rows
        .into_iter()
        .map(|(drive_mv, settle_speed, settle_current)| TestPointRow {
            drive_mv,
            settle_speed,
            settle_current,
        })
        .collect();
    if validate_test_points(&rows).is_ok() {
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|r| r.drive_mv != 0 && r.settle_speed.is_finite()));
    }
});
