// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `tinydns.rs`

use super::*;

#[test]
fn test_encode_soa_line() {
    let content = "ns1.example.org. hostmaster.example.org. 1700000001 300 60 691200 3600";
    let line = encode_line("example.org", RecordType::Soa, content, 0, 7200).unwrap();
    assert_eq!(
        line,
        "Zexample.org:ns1.example.org.:hostmaster.example.org.:1700000001:300:60:691200:3600:7200"
    );
}

#[test]
fn test_encode_soa_rejects_short_content() {
    assert_eq!(
        encode_line("example.org", RecordType::Soa, "ns1 hostmaster", 0, 7200),
        None
    );
}

#[test]
fn test_encode_basic_lines() {
    assert_eq!(
        encode_line("www.example.org", RecordType::A, "192.0.2.10", 0, 60).unwrap(),
        "+www.example.org:192.0.2.10:60"
    );
    assert_eq!(
        encode_line("example.org", RecordType::Ns, "a.ns.example.org", 0, 3600).unwrap(),
        "&example.org::a.ns.example.org:3600"
    );
    assert_eq!(
        encode_line("blog.example.org", RecordType::Cname, "www.example.org", 0, 60).unwrap(),
        "Cblog.example.org:www.example.org:60"
    );
    assert_eq!(
        encode_line("example.org", RecordType::Mx, "mail.example.org", 10, 60).unwrap(),
        "@example.org::mail.example.org:10:60"
    );
}

#[test]
fn test_encode_aaaa_as_hex() {
    assert_eq!(
        encode_line("www.example.org", RecordType::Aaaa, "2001:db8::1", 0, 60).unwrap(),
        "3www.example.org:20010db8000000000000000000000001:60"
    );
}

#[test]
fn test_encode_aaaa_rejects_bad_address() {
    assert_eq!(
        encode_line("www.example.org", RecordType::Aaaa, "not-an-address", 0, 60),
        None
    );
}

#[test]
fn test_encode_txt_escapes_colons() {
    assert_eq!(
        encode_line("example.org", RecordType::Txt, "v=spf1 ip4:192.0.2.0/24 -all", 0, 60).unwrap(),
        "'example.org:v=spf1 ip4\\072192.0.2.0/24 -all:60"
    );
}

#[test]
fn test_encode_generic_line_for_caa() {
    assert_eq!(
        encode_line("example.org", RecordType::Caa, "0 issue \"letsencrypt.org\"", 0, 60).unwrap(),
        ":example.org:257:0 issue \"letsencrypt.org\":60"
    );
}

#[test]
fn test_find_soa_serial() {
    let data = "\
# header\n\
Zexample.org:ns1.example.org.:hostmaster.example.org.:1700000001:300:60:691200:3600:7200\n\
+www.example.org:192.0.2.10:60\n\
Zother.org:ns1.example.org.:hostmaster.example.org.:1600000000:300:60:691200:3600:7200\n";

    assert_eq!(find_soa_serial(data, "example.org"), Some("1700000001"));
    assert_eq!(find_soa_serial(data, "other.org"), Some("1600000000"));
    assert_eq!(find_soa_serial(data, "missing.org"), None);
}

#[tokio::test]
async fn test_needs_update_missing_file_is_stale() {
    let dir = tempfile::tempdir().unwrap();
    let backend = TinydnsBackend::new(dir.path().join("data"));
    let handle = backend.zone_handle("example.org").await.unwrap();

    assert!(backend.needs_update(&handle, "1700000001").await.unwrap());
}

#[tokio::test]
async fn test_full_rewrite_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("data");
    let backend = TinydnsBackend::new(data_path.clone());
    let handle = backend.zone_handle("example.org").await.unwrap();

    backend.pre_batch().await.unwrap();
    backend
        .insert_record(
            &handle,
            "example.org",
            RecordType::Soa,
            "ns1.example.org. hostmaster.example.org. 1700000001 300 60 691200 3600",
            0,
            7200,
        )
        .await
        .unwrap();
    backend
        .insert_record(&handle, "www.example.org", RecordType::A, "192.0.2.10", 0, 60)
        .await
        .unwrap();

    let data = tokio::fs::read_to_string(&data_path).await.unwrap();
    assert!(data.starts_with("# zone data generated by zonesyncd"));
    assert!(data.contains("Zexample.org:"));
    assert!(data.contains("+www.example.org:192.0.2.10:60"));

    // The serial just written makes the zone current; any other is stale
    assert!(!backend.needs_update(&handle, "1700000001").await.unwrap());
    assert!(backend.needs_update(&handle, "1700000002").await.unwrap());
}

#[tokio::test]
async fn test_pre_batch_truncates_previous_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("data");
    let backend = TinydnsBackend::new(data_path.clone());
    let handle = backend.zone_handle("example.org").await.unwrap();

    backend.pre_batch().await.unwrap();
    backend
        .insert_record(&handle, "www.example.org", RecordType::A, "192.0.2.10", 0, 60)
        .await
        .unwrap();

    backend.pre_batch().await.unwrap();
    let data = tokio::fs::read_to_string(&data_path).await.unwrap();
    assert!(!data.contains("www.example.org"));
}

#[tokio::test]
async fn test_unsupported_record_is_dropped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("data");
    let backend = TinydnsBackend::new(data_path.clone());
    let handle = backend.zone_handle("example.org").await.unwrap();

    backend.pre_batch().await.unwrap();
    backend
        .insert_record(&handle, "www.example.org", RecordType::Aaaa, "bogus", 0, 60)
        .await
        .unwrap();

    let data = tokio::fs::read_to_string(&data_path).await.unwrap();
    assert!(!data.contains("bogus"));
}
