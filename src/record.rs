// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS record types, validation and normalization.
//!
//! Every record arriving in a snapshot is untrusted and passes through
//! [`validate`] before any backend sees it. Validation never fails a domain:
//! a bad record is rejected with a [`RejectReason`], logged by the caller and
//! dropped, and the remaining records continue. Partial success is
//! intentional.
//!
//! The module also hosts [`enforce_cname_exclusivity`], the whole-domain
//! consistency pass that runs after validation and before persistence for
//! every backend.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Maximum length of a record value in octets.
pub const MAX_VALUE_LEN: usize = 255;

/// Maximum length of a fully qualified name in octets.
pub const MAX_NAME_LEN: usize = 255;

/// Hostname label charset shared by record names and CNAME/NS targets.
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex"));

/// CAA value syntax: `<flags> <tag> "<value>"`.
static CAA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\d{1,3}) ([a-z0-9]+) "([A-Za-z0-9\-._@:;/= ]+)"$"#).expect("static regex")
});

/// The record types this daemon understands.
///
/// `SOA` is synthesized by the sync engine and never accepted from a
/// snapshot; the other ten form the validator's supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Txt,
    Ns,
    Caa,
    Mx,
    Srv,
    Sshfp,
    Uri,
    Soa,
}

impl RecordType {
    /// Wire name of the type, e.g. `"AAAA"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Cname => "CNAME",
            Self::Txt => "TXT",
            Self::Ns => "NS",
            Self::Caa => "CAA",
            Self::Mx => "MX",
            Self::Srv => "SRV",
            Self::Sshfp => "SSHFP",
            Self::Uri => "URI",
            Self::Soa => "SOA",
        }
    }

    /// Numeric RR type, used by the flat-file backend's generic lines.
    #[must_use]
    pub fn rr_number(self) -> u16 {
        match self {
            Self::A => 1,
            Self::Ns => 2,
            Self::Cname => 5,
            Self::Soa => 6,
            Self::Txt => 16,
            Self::Aaaa => 28,
            Self::Srv => 33,
            Self::Sshfp => 44,
            Self::Mx => 15,
            Self::Caa => 257,
            Self::Uri => 256,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "AAAA" => Ok(Self::Aaaa),
            "CNAME" => Ok(Self::Cname),
            "TXT" => Ok(Self::Txt),
            "NS" => Ok(Self::Ns),
            "CAA" => Ok(Self::Caa),
            "MX" => Ok(Self::Mx),
            "SRV" => Ok(Self::Srv),
            "SSHFP" => Ok(Self::Sshfp),
            "URI" => Ok(Self::Uri),
            "SOA" => Ok(Self::Soa),
            _ => Err(()),
        }
    }
}

/// A single untrusted record as it appears in the snapshot.
///
/// The type is kept as a free string at the wire so that one unknown record
/// type cannot fail decoding of the whole snapshot; [`validate`] parses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Label relative to the domain, `"@"` for the apex
    pub name: String,
    /// Declared record type, e.g. `"A"` or `"TXT"`
    #[serde(rename = "type")]
    pub rtype: String,
    /// Record value as free text
    pub value: String,
    /// Optional priority (MX and friends)
    #[serde(default)]
    pub priority: Option<u16>,
}

/// A record that passed validation, with its fully qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRecord {
    /// Fully qualified absolute name (no trailing dot)
    pub fqdn: String,
    /// Parsed record type
    pub rtype: RecordType,
    /// Normalized value (MX values have the priority token stripped)
    pub value: String,
    /// Priority, defaulted to 0
    pub priority: u16,
}

/// Why a record was rejected.
///
/// Rejections are logged and dropped; they never abort a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Type is not in the supported set (not an error, logged at debug)
    UnsupportedType,
    /// Value exceeds 255 octets
    ValueTooLong,
    /// A record value is not a parseable IPv4 address
    BadIpv4,
    /// AAAA record value is not a parseable IPv6 address
    BadIpv6,
    /// Value fails the type-specific syntax rule
    BadValue,
    /// CNAME or NS submitted for the apex
    ApexAlias,
    /// Record name contains characters outside the label charset
    BadLabel,
    /// Fully qualified name exceeds 255 octets
    NameTooLong,
}

impl RejectReason {
    /// Short machine-readable label, used for log fields and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedType => "unsupported_type",
            Self::ValueTooLong => "value_too_long",
            Self::BadIpv4 => "bad_ipv4",
            Self::BadIpv6 => "bad_ipv6",
            Self::BadValue => "bad_value",
            Self::ApexAlias => "apex_alias",
            Self::BadLabel => "bad_label",
            Self::NameTooLong => "name_too_long",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capture groups of a syntactically valid CAA value: flags, tag, unquoted
/// value. Used by the tree builder's structured CAA encoding.
pub(crate) fn caa_captures(value: &str) -> Option<(String, String, String)> {
    let caps = CAA_RE.captures(value)?;
    Some((caps[1].to_string(), caps[2].to_string(), caps[3].to_string()))
}

/// Validate and normalize one snapshot record for `domain`.
///
/// Rules are applied in a fixed order; the first violation wins. On success
/// the record comes back with its fully qualified name and a defaulted
/// priority. Ordering of accepted records is the caller's concern; this
/// function is stateless and safe to call concurrently.
///
/// # Errors
///
/// Returns the [`RejectReason`] for the first rule the record violates.
pub fn validate(domain: &str, raw: &RawRecord) -> Result<ValidatedRecord, RejectReason> {
    let rtype = match raw.rtype.parse::<RecordType>() {
        Ok(RecordType::Soa) | Err(()) => return Err(RejectReason::UnsupportedType),
        Ok(t) => t,
    };

    if raw.value.len() > MAX_VALUE_LEN {
        return Err(RejectReason::ValueTooLong);
    }

    let mut value = raw.value.clone();
    let mut priority = raw.priority.unwrap_or(0);

    match rtype {
        RecordType::A => {
            if value.parse::<Ipv4Addr>().is_err() {
                return Err(RejectReason::BadIpv4);
            }
        }
        RecordType::Aaaa => {
            if value.parse::<Ipv6Addr>().is_err() {
                return Err(RejectReason::BadIpv6);
            }
        }
        RecordType::Cname | RecordType::Ns => {
            if !LABEL_RE.is_match(&value) {
                return Err(RejectReason::BadValue);
            }
        }
        RecordType::Caa => {
            if !CAA_RE.is_match(&value) {
                return Err(RejectReason::BadValue);
            }
        }
        RecordType::Mx => {
            let tokens: Vec<String> = value.split(' ').map(str::to_string).collect();
            match tokens.as_slice() {
                [_] => {}
                [prio, exchange] => {
                    priority = prio.parse().map_err(|_| RejectReason::BadValue)?;
                    value = exchange.clone();
                }
                _ => return Err(RejectReason::BadValue),
            }
        }
        // SRV/SSHFP/URI syntax is enforced by the tree builder, which drops
        // undecodable values without failing the domain.
        _ => {}
    }

    if raw.name == "@" && matches!(rtype, RecordType::Cname | RecordType::Ns) {
        return Err(RejectReason::ApexAlias);
    }

    if raw.name != "@" && !LABEL_RE.is_match(&raw.name) {
        return Err(RejectReason::BadLabel);
    }

    let fqdn = if raw.name == "@" {
        domain.to_string()
    } else {
        format!("{}.{}", raw.name, domain)
    };
    if fqdn.len() > MAX_NAME_LEN {
        return Err(RejectReason::NameTooLong);
    }

    Ok(ValidatedRecord {
        fqdn,
        rtype,
        value,
        priority,
    })
}

/// Enforce CNAME exclusivity across a whole domain's validated records.
///
/// For every fully qualified name that received a CNAME, any other record
/// type for the same name is dropped with a warning, and any CNAME after the
/// first is dropped too. Input order is preserved for the survivors.
///
/// This runs once per domain, after validation and before any backend
/// insert, so the constraint holds for every backend variant.
#[must_use]
pub fn enforce_cname_exclusivity(records: Vec<ValidatedRecord>) -> Vec<ValidatedRecord> {
    let cname_names: Vec<String> = records
        .iter()
        .filter(|r| r.rtype == RecordType::Cname)
        .map(|r| r.fqdn.clone())
        .collect();
    if cname_names.is_empty() {
        return records;
    }

    let mut seen_cname: Vec<String> = Vec::new();
    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        if cname_names.contains(&record.fqdn) {
            if record.rtype != RecordType::Cname {
                warn!(
                    name = %record.fqdn,
                    rtype = %record.rtype,
                    "dropping record: name already holds a CNAME"
                );
                continue;
            }
            if seen_cname.contains(&record.fqdn) {
                warn!(name = %record.fqdn, "dropping duplicate CNAME");
                continue;
            }
            seen_cname.push(record.fqdn.clone());
        }
        kept.push(record);
    }
    kept
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod record_tests;
