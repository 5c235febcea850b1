use super::*;

crate::define_id! {
    pub struct TestId;
}

#[test]
fn display_roundtrips_string() {
    let id = TestId::new("abc-123");
    assert_eq!(id.to_string(), "abc-123");
    assert_eq!(id.as_str(), "abc-123");
}

#[test]
fn short_truncates_when_longer() {
    let id = TestId::new("abcdefgh");
    assert_eq!(id.short(4), "abcd");
}

#[test]
fn short_returns_whole_string_when_shorter() {
    let id = TestId::new("ab");
    assert_eq!(id.short(4), "ab");
}

#[test]
fn equality_against_str() {
    let id = TestId::new("x");
    assert_eq!(id, "x");
    assert_eq!(id, *"x");
}

#[test]
fn random_suffix_has_requested_length() {
    let s = random_suffix(3);
    assert_eq!(s.len(), 3);
    assert!(s.chars().all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_uppercase()));
}
