use sentinel_core::identity::{
    is_valid_break_glass_id, is_valid_request_id, new_event_id, new_request_id, sanitize_user,
    SourceIdentity,
};

#[test]
fn sanitize_lowercases_and_strips() {
    assert_eq!(sanitize_user("Alice").unwrap(), "alice");
    assert_eq!(sanitize_user("al.ice-42").unwrap(), "alice42");
    assert_eq!(sanitize_user("ALICE@example.com").unwrap(), "aliceexamplecom");
}

#[test]
fn sanitize_is_idempotent() {
    let once = sanitize_user("Bob-The.Builder_99").unwrap();
    let twice = sanitize_user(&once).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn sanitize_truncates_to_twenty() {
    let twenty = "a".repeat(20);
    assert_eq!(sanitize_user(&twenty).unwrap(), twenty);

    let twenty_one = "a".repeat(21);
    assert_eq!(sanitize_user(&twenty_one).unwrap(), twenty);
}

#[test]
fn sanitize_rejects_empty_result() {
    assert!(sanitize_user("").is_err());
    assert!(sanitize_user("---").is_err());
    assert!(sanitize_user("日本語").is_err());
}

#[test]
fn request_ids_are_eight_lower_hex() {
    for _ in 0..50 {
        let id = new_request_id();
        assert!(is_valid_request_id(&id), "bad request id: {id}");
    }
}

#[test]
fn event_ids_are_sixteen_lower_hex() {
    for _ in 0..50 {
        let id = new_event_id();
        assert!(is_valid_break_glass_id(&id), "bad event id: {id}");
    }
}

#[test]
fn request_id_validation_boundaries() {
    assert!(is_valid_request_id("0123abcd"));
    assert!(!is_valid_request_id("0123abc"));
    assert!(!is_valid_request_id("0123abcde"));
    assert!(!is_valid_request_id("0123ABCD"));
    assert!(!is_valid_request_id("0123abcg"));
    assert!(!is_valid_request_id(""));
}

#[test]
fn direct_identity_formats_and_parses() {
    let si = SourceIdentity::new("Alice", None, "deadbeef").unwrap();
    let formatted = si.to_string();
    assert_eq!(formatted, "sentinel:alice:direct:deadbeef");

    let parsed = SourceIdentity::parse(&formatted).unwrap();
    assert_eq!(parsed, si);
    assert_eq!(parsed.approval_id(), None);
}

#[test]
fn approved_identity_round_trips() {
    let si = SourceIdentity::new("bob", Some("00112233445566aa"), "cafef00d").unwrap();
    let formatted = si.to_string();
    assert_eq!(formatted, "sentinel:bob:00112233445566aa:cafef00d");

    let parsed: SourceIdentity = formatted.parse().unwrap();
    assert_eq!(parsed, si);
    assert_eq!(parsed.approval_id(), Some("00112233445566aa"));
    assert_eq!(parsed.request_id(), "cafef00d");
}

#[test]
fn empty_approval_means_direct() {
    let si = SourceIdentity::new("carol", Some(""), "deadbeef").unwrap();
    assert_eq!(si.to_string(), "sentinel:carol:direct:deadbeef");
}

#[test]
fn formatted_length_stays_under_aws_limit() {
    let si = SourceIdentity::new(
        &"z".repeat(40),
        Some("ffffffffffffffff"),
        "ffffffff",
    )
    .unwrap();
    assert!(si.to_string().len() <= 64);
}

#[test]
fn compose_rejects_bad_components() {
    assert!(SourceIdentity::new("", None, "deadbeef").is_err());
    assert!(SourceIdentity::new("alice", None, "xyz").is_err());
    assert!(SourceIdentity::new("alice", Some("tooshort"), "deadbeef").is_err());
}

#[test]
fn parse_rejects_malformed_strings() {
    for bad in [
        "",
        "sentinel:alice:direct",
        "sentinel:alice:direct:deadbeef:extra",
        "other:alice:direct:deadbeef",
        "sentinel:Alice:direct:deadbeef",
        "sentinel:alice:direct:DEADBEEF",
        "sentinel::direct:deadbeef",
        "sentinel:alice:notanapproval:deadbeef",
    ] {
        assert!(SourceIdentity::parse(bad).is_err(), "accepted: {bad}");
    }
}
