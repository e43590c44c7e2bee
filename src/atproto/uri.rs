//! URI classification
//!
//! Turns the many ways people share ATProto content (AT URIs, app URLs, bare
//! handles and DIDs) into one `ParsedLocator`.

use crate::atproto::identifier::Identifier;
use serde::Serialize;
use thiserror::Error;
use url::Url;

pub const POST_COLLECTION: &str = "app.bsky.feed.post";
pub const LIST_COLLECTION: &str = "app.bsky.graph.list";

/// Why an input could not be classified. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("Nothing to resolve: the input is empty")]
    Empty,
    #[error("Invalid AT URI {input}: expected at://<identifier> or at://<identifier>/<collection>/<rkey>, found {segments} path segments")]
    SegmentCount { input: String, segments: usize },
    #[error("Invalid identifier {0:?}: expected a handle (alice.bsky.social) or a DID (did:plc:...)")]
    InvalidIdentifier(String),
    #[error("Unsupported URL {0}: expected a /profile/..., /p/... or /at://... link")]
    UnsupportedUrl(String),
    #[error("Invalid or unsupported URI: {0}")]
    Unrecognized(String),
}

/// Collection and record key of a single record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRef {
    pub collection: String,
    pub rkey: String,
}

/// A classified request target.
///
/// `record` is `None` for a profile locator. Collection and rkey travel together,
/// so a half-specified locator cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedLocator {
    pub identifier: Identifier,
    #[serde(flatten)]
    pub record: Option<RecordRef>,
}

impl ParsedLocator {
    pub fn profile(identifier: Identifier) -> Self {
        Self {
            identifier,
            record: None,
        }
    }

    pub fn record(identifier: Identifier, collection: &str, rkey: &str) -> Self {
        Self {
            identifier,
            record: Some(RecordRef {
                collection: collection.to_string(),
                rkey: rkey.to_string(),
            }),
        }
    }

    pub fn collection(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.collection.as_str())
    }

    pub fn rkey(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.rkey.as_str())
    }

    pub fn is_profile(&self) -> bool {
        self.record.is_none()
    }

    /// `at://<identifier>[/<collection>/<rkey>]`
    pub fn to_at_uri(&self) -> String {
        format!("at://{}", self.path())
    }

    /// Canonical site path without a leading slash
    pub fn path(&self) -> String {
        match &self.record {
            Some(r) => format!("{}/{}/{}", self.identifier, r.collection, r.rkey),
            None => self.identifier.to_string(),
        }
    }
}

/// Classify an input string.
///
/// Shapes are tried in order: AT URI, http(s) URL with a known path shape,
/// bare DID, bare handle. The first shape that claims the input decides the result.
pub fn classify(input: &str) -> Result<ParsedLocator, ClassificationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ClassificationError::Empty);
    }

    if input.starts_with("at://") {
        return parse_at_uri(input);
    }

    if let Ok(url) = Url::parse(input) {
        if matches!(url.scheme(), "http" | "https") {
            return parse_app_url(input, &url);
        }
    }

    if input.starts_with("did:") {
        return Identifier::parse(input)
            .map(ParsedLocator::profile)
            .ok_or_else(|| ClassificationError::InvalidIdentifier(input.to_string()));
    }

    if input.contains('.') && !input.contains('/') {
        return Identifier::parse(input)
            .map(ParsedLocator::profile)
            .ok_or_else(|| ClassificationError::InvalidIdentifier(input.to_string()));
    }

    Err(ClassificationError::Unrecognized(input.to_string()))
}

/// Parse `at://<identifier>[/<collection>/<rkey>]`
pub fn parse_at_uri(uri: &str) -> Result<ParsedLocator, ClassificationError> {
    let rest = uri.strip_prefix("at://").unwrap_or(uri);
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let rest = rest.strip_suffix('/').unwrap_or(rest);

    let segments: Vec<&str> = rest.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ClassificationError::SegmentCount {
            input: uri.to_string(),
            segments: segments.iter().filter(|s| !s.is_empty()).count(),
        });
    }

    let identifier = |raw: &str| {
        Identifier::parse(raw).ok_or_else(|| ClassificationError::InvalidIdentifier(raw.to_string()))
    };

    match segments.as_slice() {
        [id] => Ok(ParsedLocator::profile(identifier(*id)?)),
        [id, collection, rkey] => Ok(ParsedLocator::record(identifier(*id)?, collection, rkey)),
        other => Err(ClassificationError::SegmentCount {
            input: uri.to_string(),
            segments: other.len(),
        }),
    }
}

/// Match known app URL path shapes on any http(s) host
fn parse_app_url(input: &str, url: &Url) -> Result<ParsedLocator, ClassificationError> {
    let raw_path = url.path();

    // An AT URI carried in the path, e.g. https://pdsls.dev/at://did:plc:abc/...
    // Some intermediaries collapse the double slash, so accept `at:/` too.
    let trimmed = raw_path.trim_start_matches('/');
    if let Some(embedded) = trimmed
        .strip_prefix("at://")
        .or_else(|| trimmed.strip_prefix("at:/"))
    {
        let decoded = decode_segment(embedded);
        return parse_at_uri(&format!("at://{}", decoded));
    }

    let segments: Vec<String> = raw_path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect();
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    let identifier = |raw: &str| {
        Identifier::parse(raw).ok_or_else(|| ClassificationError::InvalidIdentifier(raw.to_string()))
    };

    match segments.as_slice() {
        ["profile", id] | ["p", id] => Ok(ParsedLocator::profile(identifier(*id)?)),
        ["profile", id, "post", rkey] => {
            Ok(ParsedLocator::record(identifier(*id)?, POST_COLLECTION, rkey))
        }
        ["profile", id, "lists", rkey] => {
            Ok(ParsedLocator::record(identifier(*id)?, LIST_COLLECTION, rkey))
        }
        _ => Err(ClassificationError::UnsupportedUrl(input.to_string())),
    }
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
