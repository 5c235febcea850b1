use super::*;
use chrono::TimeZone;

#[test]
fn computes_next_midnight_utc() {
    let after = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let next = next_fire_after("0 0 * * *", None, after).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap());
}

#[test]
fn honors_named_timezone() {
    // 09:00 in America/New_York is 14:00 UTC during EST (UTC-5).
    let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let next = next_fire_after("0 9 * * *", Some("America/New_York"), after).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 14, 0, 0).unwrap());
}

#[test]
fn rejects_invalid_expression() {
    let after = Utc::now();
    let err = next_fire_after("not a cron expr", None, after).unwrap_err();
    assert!(matches!(err, CronError::InvalidExpression { .. }));
}

#[test]
fn rejects_unknown_timezone() {
    let after = Utc::now();
    let err = next_fire_after("0 0 * * *", Some("Nowhere/Imaginary"), after).unwrap_err();
    assert!(matches!(err, CronError::UnknownTimezone(_)));
}
