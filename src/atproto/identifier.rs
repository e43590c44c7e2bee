//! Repository identifiers: handles and DIDs

use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// A handle (`alice.bsky.social`) or a DID (`did:plc:...`, `did:web:...`).
///
/// A DID always starts with `did:`; a handle never does.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Handle(String),
    Did(String),
}

impl Identifier {
    /// Classify a bare identifier string. `@` prefixes on handles are dropped.
    ///
    /// Returns `None` when the string is neither a syntactically valid DID nor handle.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.starts_with("did:") {
            return is_valid_did(raw).then(|| Identifier::Did(raw.to_string()));
        }

        let handle = raw.strip_prefix('@').unwrap_or(raw);
        is_valid_handle(handle).then(|| Identifier::Handle(handle.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Identifier::Handle(h) => h,
            Identifier::Did(d) => d,
        }
    }

    pub fn is_did(&self) -> bool {
        matches!(self, Identifier::Did(_))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The method part of a DID (`plc` for `did:plc:abc`)
pub fn did_method(did: &str) -> Option<&str> {
    let mut parts = did.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("did"), Some(method), Some(id)) if !method.is_empty() && !id.is_empty() => {
            Some(method)
        }
        _ => None,
    }
}

/// Structural DID check: `did:<method>:<id>` with no path or whitespace
pub fn is_valid_did(did: &str) -> bool {
    static DID_RE: OnceLock<Regex> = OnceLock::new();
    let re = DID_RE.get_or_init(|| {
        Regex::new(r"^did:[a-z]+:[a-zA-Z0-9._:%-]*[a-zA-Z0-9._-]$").expect("valid DID regex")
    });
    re.is_match(did)
}

/// Domain-like handle check: at least two labels, each alphanumeric with inner hyphens
pub fn is_valid_handle(handle: &str) -> bool {
    static HANDLE_RE: OnceLock<Regex> = OnceLock::new();
    let re = HANDLE_RE.get_or_init(|| {
        Regex::new(
            r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$",
        )
        .expect("valid handle regex")
    });
    handle.len() <= 253 && re.is_match(handle)
}
