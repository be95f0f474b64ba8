// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hierarchical zone tree builder.
//!
//! Folds a flat stream of validated records for one domain into a nested
//! per-label tree, the structure served by the JSON-tree backend. Each node
//! carries per-type slots, an exclusive alias (CNAME) slot and a `child` map
//! for deeper labels.
//!
//! Two serialized shapes exist:
//!
//! - the *build* shape (derived serde), used as staging state while a domain
//!   is being folded record by record;
//! - the *serving* shape ([`ZoneNode::to_zone_json`]), where every
//!   multi-value slot is wrapped as `{"type": "static", "data": [...]}` and
//!   the alias slot appears as `"ANY": {"type": "CNAME", "data": ...}`.
//!
//! The TXT slot shape-shifts: a single value is stored bare, and the moment
//! a second value arrives for the same node the slot becomes a list of
//! one-element lists. Downstream consumers depend on this exact behavior, so
//! it is preserved bit for bit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::record::RecordType;

/// A name relative to its zone apex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelativeName {
    /// The zone apex itself
    Apex,
    /// Labels below the apex, outermost last (`foo.www` → `["foo", "www"]`)
    Labels(Vec<String>),
}

/// Compute the relative label path of `fqdn` inside `domain`.
///
/// The comparison is done on explicit label lists, never on substrings, so a
/// label that happens to contain the domain name as text cannot confuse apex
/// detection. Labels compare ASCII case-insensitively. Returns `None` when
/// `fqdn` is not inside `domain` at all.
#[must_use]
pub fn relative_name(fqdn: &str, domain: &str) -> Option<RelativeName> {
    let fq: Vec<&str> = fqdn.split('.').collect();
    let dom: Vec<&str> = domain.split('.').collect();
    if fq.len() < dom.len() {
        return None;
    }
    let split = fq.len() - dom.len();
    let suffix_matches = fq[split..]
        .iter()
        .zip(dom.iter())
        .all(|(a, b)| a.eq_ignore_ascii_case(b));
    if !suffix_matches {
        return None;
    }
    if split == 0 {
        Some(RelativeName::Apex)
    } else {
        Some(RelativeName::Labels(
            fq[..split].iter().map(|s| (*s).to_string()).collect(),
        ))
    }
}

/// One node of the zone tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneNode {
    /// Exclusive CNAME slot; a node with an alias holds no other slots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Per-type record slots
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<RecordType, SlotValue>,

    /// Child nodes keyed by label
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, ZoneNode>,
}

/// The contents of one per-type slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlotValue {
    /// Last-write-wins scalar
    Scalar(String),
    /// The shape-shifting TXT slot
    Txt(TxtSlot),
    /// Appending multi-value slot
    List(Vec<RecordData>),
}

/// TXT storage, preserving the legacy downstream format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TxtSlot {
    /// Exactly one value, stored bare
    Single(String),
    /// Two or more values; serves as a list of one-element lists
    Nested(Vec<String>),
}

/// One decoded multi-value record entry.
///
/// Serialized untagged; variant order matters for deserialization of the
/// staging state (SRV carries a superset of URI's fields and must be tried
/// first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordData {
    /// Raw value string (A, AAAA, NS)
    Address(String),

    /// Decoded CAA entry
    #[serde(rename_all = "camelCase")]
    Caa {
        flags: u8,
        tag: String,
        value: String,
        issuer_critical: bool,
    },

    /// Decoded SRV entry
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },

    /// Decoded SSHFP entry
    #[serde(rename_all = "camelCase")]
    Sshfp {
        algorithm: u8,
        fingerprint_type: u8,
        fingerprint: String,
    },

    /// Decoded URI entry
    Uri {
        priority: u16,
        weight: u16,
        target: String,
    },

    /// Mail exchange; `preference` is omitted when the record carried none
    Mx {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preference: Option<u16>,
        exchange: String,
    },
}

impl ZoneNode {
    /// True when the node carries no records and no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alias.is_none() && self.slots.is_empty() && self.children.is_empty()
    }

    /// Insert one record at the given relative name, creating intermediate
    /// nodes as needed. Outermost labels are walked first.
    pub fn insert(&mut self, name: &RelativeName, rtype: RecordType, value: &str, priority: u16) {
        match name {
            RelativeName::Apex => self.handle_record(rtype, value, priority),
            RelativeName::Labels(labels) => {
                let mut node = self;
                for label in labels.iter().rev() {
                    node = node.children.entry(label.clone()).or_default();
                }
                node.handle_record(rtype, value, priority);
            }
        }
    }

    /// Apply one record's type-specific encoding at this node.
    fn handle_record(&mut self, rtype: RecordType, value: &str, priority: u16) {
        if rtype == RecordType::Cname {
            self.alias = Some(value.to_string());
            return;
        }
        if self.alias.is_some() {
            // The exclusivity pass upstream makes this unreachable for
            // snapshot records; guard anyway so the invariant cannot break.
            warn!(rtype = %rtype, "dropping record: node holds a CNAME");
            return;
        }

        match rtype {
            RecordType::Txt => {
                let next = match self.slots.remove(&RecordType::Txt) {
                    None => TxtSlot::Single(value.to_string()),
                    Some(SlotValue::Txt(TxtSlot::Single(first))) => {
                        TxtSlot::Nested(vec![first, value.to_string()])
                    }
                    Some(SlotValue::Txt(TxtSlot::Nested(mut values))) => {
                        values.push(value.to_string());
                        TxtSlot::Nested(values)
                    }
                    Some(_) => unreachable!("slot type is fixed per record type"),
                };
                self.slots.insert(RecordType::Txt, SlotValue::Txt(next));
            }
            RecordType::A | RecordType::Aaaa | RecordType::Ns => {
                self.push(rtype, RecordData::Address(value.to_string()));
            }
            RecordType::Caa => match decode_caa(value) {
                Some(data) => self.push(rtype, data),
                None => warn!(value, "dropping CAA record: undecodable value"),
            },
            RecordType::Mx => {
                self.push(
                    rtype,
                    RecordData::Mx {
                        preference: (priority != 0).then_some(priority),
                        exchange: value.to_string(),
                    },
                );
            }
            RecordType::Srv => match decode_srv(value) {
                Some(data) => self.push(rtype, data),
                None => warn!(value, "dropping SRV record: expected 4 fields"),
            },
            RecordType::Sshfp => match decode_sshfp(value) {
                Some(data) => self.push(rtype, data),
                None => warn!(value, "dropping SSHFP record: expected 3 fields"),
            },
            RecordType::Uri => match decode_uri(value) {
                Some(data) => self.push(rtype, data),
                None => warn!(value, "dropping URI record: expected 3 fields"),
            },
            RecordType::Cname => unreachable!("handled above"),
            RecordType::Soa => {
                self.slots
                    .insert(rtype, SlotValue::Scalar(value.to_string()));
            }
        }
    }

    fn push(&mut self, rtype: RecordType, data: RecordData) {
        match self
            .slots
            .entry(rtype)
            .or_insert_with(|| SlotValue::List(Vec::new()))
        {
            SlotValue::List(items) => items.push(data),
            _ => unreachable!("slot type is fixed per record type"),
        }
    }

    /// Serialize the node into the serving shape.
    ///
    /// Multi-value slots are wrapped as `{"type": "static", "data": [...]}`,
    /// the alias becomes the `ANY` slot, scalars stay bare and children nest
    /// under `"child"`.
    #[must_use]
    pub fn to_zone_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(target) = &self.alias {
            map.insert("ANY".to_string(), json!({"type": "CNAME", "data": target}));
        }
        for (rtype, slot) in &self.slots {
            map.insert(rtype.as_str().to_string(), slot.to_zone_json());
        }
        if !self.children.is_empty() {
            let mut child = Map::new();
            for (label, node) in &self.children {
                child.insert(label.clone(), node.to_zone_json());
            }
            map.insert("child".to_string(), Value::Object(child));
        }
        Value::Object(map)
    }
}

impl SlotValue {
    fn to_zone_json(&self) -> Value {
        match self {
            Self::Scalar(s) => json!(s),
            Self::Txt(TxtSlot::Single(value)) => json!({"type": "static", "data": [value]}),
            Self::Txt(TxtSlot::Nested(values)) => {
                let nested: Vec<Value> = values.iter().map(|v| json!([v])).collect();
                json!({"type": "static", "data": nested})
            }
            Self::List(items) => json!({"type": "static", "data": items}),
        }
    }
}

fn decode_caa(value: &str) -> Option<RecordData> {
    let captures = crate::record::caa_captures(value)?;
    Some(RecordData::Caa {
        flags: captures.0.parse().ok()?,
        tag: captures.1,
        value: captures.2,
        issuer_critical: true,
    })
}

fn decode_srv(value: &str) -> Option<RecordData> {
    let fields: Vec<&str> = value.split(' ').collect();
    if fields.len() != 4 {
        return None;
    }
    Some(RecordData::Srv {
        priority: fields[0].parse().ok()?,
        weight: fields[1].parse().ok()?,
        port: fields[2].parse().ok()?,
        target: fields[3].to_string(),
    })
}

fn decode_sshfp(value: &str) -> Option<RecordData> {
    let fields: Vec<&str> = value.split(' ').collect();
    if fields.len() != 3 {
        return None;
    }
    Some(RecordData::Sshfp {
        algorithm: fields[0].parse().ok()?,
        fingerprint_type: fields[1].parse().ok()?,
        fingerprint: fields[2].to_string(),
    })
}

fn decode_uri(value: &str) -> Option<RecordData> {
    let fields: Vec<&str> = value.split(' ').collect();
    if fields.len() != 3 {
        return None;
    }
    Some(RecordData::Uri {
        priority: fields[0].parse().ok()?,
        weight: fields[1].parse().ok()?,
        target: fields[2].to_string(),
    })
}

#[cfg(test)]
#[path = "zone_tree_tests.rs"]
mod zone_tree_tests;
