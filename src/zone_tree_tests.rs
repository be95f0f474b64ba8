// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `zone_tree.rs`

use super::*;
use serde_json::json;

fn rel(fqdn: &str, domain: &str) -> RelativeName {
    relative_name(fqdn, domain).unwrap()
}

#[test]
fn test_relative_name_apex() {
    assert_eq!(rel("example.org", "example.org"), RelativeName::Apex);
}

#[test]
fn test_relative_name_single_label() {
    assert_eq!(
        rel("www.example.org", "example.org"),
        RelativeName::Labels(vec!["www".to_string()])
    );
}

#[test]
fn test_relative_name_multi_label() {
    assert_eq!(
        rel("foo.www.example.org", "example.org"),
        RelativeName::Labels(vec!["foo".to_string(), "www".to_string()])
    );
}

#[test]
fn test_relative_name_not_inside_domain() {
    assert_eq!(relative_name("www.other.org", "example.org"), None);
}

#[test]
fn test_relative_name_no_substring_confusion() {
    // A label that textually contains the domain name is still compared
    // label by label, never by substring stripping.
    assert_eq!(relative_name("example.orgx", "example.org"), None);
    assert_eq!(
        rel("example.org.example.org", "example.org"),
        RelativeName::Labels(vec!["example".to_string(), "org".to_string()])
    );
}

#[test]
fn test_relative_name_case_insensitive() {
    assert_eq!(rel("WWW.Example.ORG", "example.org"), RelativeName::Labels(vec!["WWW".to_string()]));
}

#[test]
fn test_build_documented_example() {
    // Records for example.com: apex A, www A, foo.www TXT
    let mut root = ZoneNode::default();
    root.insert(&rel("example.com", "example.com"), RecordType::A, "1.2.3.4", 0);
    root.insert(&rel("www.example.com", "example.com"), RecordType::A, "1.2.3.4", 0);
    root.insert(
        &rel("foo.www.example.com", "example.com"),
        RecordType::Txt,
        "hello",
        0,
    );

    assert_eq!(
        root.slots.get(&RecordType::A),
        Some(&SlotValue::List(vec![RecordData::Address(
            "1.2.3.4".to_string()
        )]))
    );

    let www = root.children.get("www").unwrap();
    assert_eq!(
        www.slots.get(&RecordType::A),
        Some(&SlotValue::List(vec![RecordData::Address(
            "1.2.3.4".to_string()
        )]))
    );

    // First TXT value is stored bare, not wrapped in an inner list
    let foo = www.children.get("foo").unwrap();
    assert_eq!(
        foo.slots.get(&RecordType::Txt),
        Some(&SlotValue::Txt(TxtSlot::Single("hello".to_string())))
    );
}

#[test]
fn test_txt_shape_shift_on_second_value() {
    let mut node = ZoneNode::default();
    node.insert(&RelativeName::Apex, RecordType::Txt, "first", 0);
    node.insert(&RelativeName::Apex, RecordType::Txt, "second", 0);

    // Storage switches to a list of one-element lists, not a flat list
    assert_eq!(
        node.slots.get(&RecordType::Txt),
        Some(&SlotValue::Txt(TxtSlot::Nested(vec![
            "first".to_string(),
            "second".to_string()
        ])))
    );

    let served = node.to_zone_json();
    assert_eq!(
        served["TXT"],
        json!({"type": "static", "data": [["first"], ["second"]]})
    );
}

#[test]
fn test_txt_third_value_appends() {
    let mut node = ZoneNode::default();
    for value in ["a", "b", "c"] {
        node.insert(&RelativeName::Apex, RecordType::Txt, value, 0);
    }
    let served = node.to_zone_json();
    assert_eq!(
        served["TXT"]["data"],
        json!([["a"], ["b"], ["c"]])
    );
}

#[test]
fn test_txt_single_value_serving_shape() {
    let mut node = ZoneNode::default();
    node.insert(&RelativeName::Apex, RecordType::Txt, "hello", 0);
    assert_eq!(
        node.to_zone_json()["TXT"],
        json!({"type": "static", "data": ["hello"]})
    );
}

#[test]
fn test_cname_goes_to_any_slot() {
    let mut node = ZoneNode::default();
    node.insert(
        &RelativeName::Labels(vec!["www".to_string()]),
        RecordType::Cname,
        "target.example.org",
        0,
    );
    let www = node.children.get("www").unwrap();
    assert_eq!(www.alias.as_deref(), Some("target.example.org"));
    assert!(www.slots.is_empty());

    let served = node.to_zone_json();
    assert_eq!(
        served["child"]["www"]["ANY"],
        json!({"type": "CNAME", "data": "target.example.org"})
    );
}

#[test]
fn test_alias_node_refuses_other_records() {
    let mut node = ZoneNode::default();
    node.insert(&RelativeName::Apex, RecordType::Cname, "target.example.org", 0);
    node.insert(&RelativeName::Apex, RecordType::A, "192.0.2.1", 0);
    assert!(node.slots.is_empty());
    assert_eq!(node.alias.as_deref(), Some("target.example.org"));
}

#[test]
fn test_a_records_append() {
    let mut node = ZoneNode::default();
    node.insert(&RelativeName::Apex, RecordType::A, "192.0.2.1", 0);
    node.insert(&RelativeName::Apex, RecordType::A, "192.0.2.2", 0);
    assert_eq!(
        node.to_zone_json()["A"],
        json!({"type": "static", "data": ["192.0.2.1", "192.0.2.2"]})
    );
}

#[test]
fn test_srv_decodes_structured() {
    let mut node = ZoneNode::default();
    node.insert(
        &RelativeName::Apex,
        RecordType::Srv,
        "10 60 5060 sip.example.org",
        0,
    );
    assert_eq!(
        node.to_zone_json()["SRV"]["data"],
        json!([{"priority": 10, "weight": 60, "port": 5060, "target": "sip.example.org"}])
    );
}

#[test]
fn test_srv_bad_value_dropped() {
    let mut node = ZoneNode::default();
    node.insert(&RelativeName::Apex, RecordType::Srv, "10 60 sip.example.org", 0);
    assert!(node.is_empty());
}

#[test]
fn test_caa_decodes_structured() {
    let mut node = ZoneNode::default();
    node.insert(
        &RelativeName::Apex,
        RecordType::Caa,
        "0 issue \"letsencrypt.org\"",
        0,
    );
    assert_eq!(
        node.to_zone_json()["CAA"]["data"],
        json!([{
            "flags": 0,
            "tag": "issue",
            "value": "letsencrypt.org",
            "issuerCritical": true
        }])
    );
}

#[test]
fn test_mx_with_and_without_preference() {
    let mut node = ZoneNode::default();
    node.insert(&RelativeName::Apex, RecordType::Mx, "mail.example.org", 0);
    node.insert(&RelativeName::Apex, RecordType::Mx, "backup.example.org", 20);
    assert_eq!(
        node.to_zone_json()["MX"]["data"],
        json!([
            {"exchange": "mail.example.org"},
            {"preference": 20, "exchange": "backup.example.org"}
        ])
    );
}

#[test]
fn test_sshfp_decodes_structured() {
    let mut node = ZoneNode::default();
    node.insert(&RelativeName::Apex, RecordType::Sshfp, "4 2 deadbeef", 0);
    assert_eq!(
        node.to_zone_json()["SSHFP"]["data"],
        json!([{"algorithm": 4, "fingerprintType": 2, "fingerprint": "deadbeef"}])
    );
}

#[test]
fn test_uri_requires_three_fields() {
    let mut node = ZoneNode::default();
    node.insert(&RelativeName::Apex, RecordType::Uri, "10 1 target", 0);
    node.insert(&RelativeName::Apex, RecordType::Uri, "too short", 0);
    assert_eq!(
        node.to_zone_json()["URI"]["data"],
        json!([{"priority": 10, "weight": 1, "target": "target"}])
    );
}

#[test]
fn test_empty_node_serves_empty_object() {
    assert_eq!(ZoneNode::default().to_zone_json(), json!({}));
}

#[test]
fn test_build_state_round_trip() {
    // The staging format must survive a serialize/deserialize cycle so
    // record-by-record folding can resume from disk.
    let mut node = ZoneNode::default();
    node.insert(&RelativeName::Apex, RecordType::A, "192.0.2.1", 0);
    node.insert(&RelativeName::Apex, RecordType::Mx, "mail.example.org", 10);
    node.insert(&RelativeName::Apex, RecordType::Txt, "one", 0);
    node.insert(&RelativeName::Apex, RecordType::Txt, "two", 0);
    node.insert(
        &RelativeName::Labels(vec!["sip".to_string()]),
        RecordType::Srv,
        "10 60 5060 sip.example.org",
        0,
    );
    node.insert(
        &RelativeName::Labels(vec!["www".to_string()]),
        RecordType::Cname,
        "target.example.org",
        0,
    );

    let encoded = serde_json::to_string(&node).unwrap();
    let decoded: ZoneNode = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, node);
}
