use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::Interval;

// 2024-01-01T00:00:00Z
const NEW_YEAR_2024: u64 = 1_704_067_200;

fn hour() -> Interval {
    Interval::from_secs(3600).unwrap()
}

fn before_epoch(secs: u64, nanos: u32) -> SystemTime {
    UNIX_EPOCH - Duration::new(secs, nanos)
}

#[test]
fn epoch_is_the_start_of_bucket_zero() {
    let range = hour().range_containing(UNIX_EPOCH);

    assert_eq!(hour().index(UNIX_EPOCH), 0);
    assert_eq!(range.start, UNIX_EPOCH);
    assert_eq!(range.end, UNIX_EPOCH + Duration::from_secs(3600));
}

#[test]
fn index_matches_wall_clock_hours() {
    let t = UNIX_EPOCH + Duration::from_secs(NEW_YEAR_2024 + 13 * 3600 + 59 * 60);

    assert_eq!(hour().index(t), 473_365);
    assert_eq!(
        hour().range_containing(t).start,
        UNIX_EPOCH + Duration::from_secs(NEW_YEAR_2024 + 13 * 3600)
    );
}

#[test]
fn index_floors_before_the_epoch() {
    let interval = hour();

    // Truncation towards zero would put these in bucket 0.
    assert_eq!(interval.index(before_epoch(0, 1)), -1);
    assert_eq!(interval.index(before_epoch(1, 0)), -1);
    assert_eq!(interval.index(before_epoch(3600, 0)), -1);
    assert_eq!(interval.index(before_epoch(3600, 1)), -2);

    let range = interval.range_containing(before_epoch(1, 0));
    assert_eq!(range.start, before_epoch(3600, 0));
    assert_eq!(range.end, UNIX_EPOCH);
}

#[test]
fn range_of_index_inverts_index() {
    for width in [1, 7, 60, 3600, 86_400] {
        let interval = Interval::from_secs(width).unwrap();

        for index in [-1_000_000, -2, -1, 0, 1, 2, 473_365, 1_000_000] {
            let range = interval.range_of_index(index).unwrap();

            assert_eq!(interval.index(range.start), index);
            assert_eq!(interval.index(range.end - Duration::from_nanos(1)), index);
            assert_eq!(interval.index(range.end), index + 1);
            assert_eq!(
                range.end.duration_since(range.start).unwrap(),
                interval.width()
            );
        }
    }
}

#[test]
fn range_containing_always_contains_the_timestamp() {
    let interval = Interval::from_secs(60).unwrap();

    let samples = [
        UNIX_EPOCH + Duration::new(NEW_YEAR_2024, 123_456_789),
        UNIX_EPOCH + Duration::from_secs(59),
        UNIX_EPOCH + Duration::from_secs(60),
        before_epoch(0, 999),
        before_epoch(61, 500_000_000),
        SystemTime::now(),
    ];

    for t in samples {
        let range = interval.range_containing(t);

        assert!(range.contains(t), "{range:?} should contain {t:?}");
        assert_eq!(interval.range_of_index(interval.index(t)), Some(range));
    }
}

#[test]
fn range_of_index_out_of_range_is_none() {
    assert_eq!(hour().range_of_index(i64::MAX), None);
    assert_eq!(hour().range_of_index(i64::MIN), None);
}

#[test]
fn range_is_half_open() {
    let range = hour().range_of_index(1).unwrap();

    assert!(range.contains(range.start));
    assert!(!range.contains(range.end));
    assert!(!range.contains(range.start - Duration::from_nanos(1)));
}
