//! Waypoints: places a locator can be opened
//!
//! The registry is plain data handed to the recommender at construction, so
//! tests swap in their own catalogs.

pub mod catalog;
pub mod recommend;

use crate::atproto::uri::{ParsedLocator, LIST_COLLECTION, POST_COLLECTION};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What kind of thing a locator points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Post,
    Profile,
    List,
    Record,
    Unknown,
}

impl ContentType {
    pub fn for_locator(locator: &ParsedLocator) -> Self {
        match locator.collection() {
            None => ContentType::Profile,
            Some(POST_COLLECTION) => ContentType::Post,
            Some(LIST_COLLECTION) => ContentType::List,
            Some(_) => ContentType::Record,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Profile => "profile",
            ContentType::List => "list",
            ContentType::Record => "record",
            ContentType::Unknown => "unknown",
        }
    }

    /// Label shown above the featured waypoints
    pub fn recommendation_label(&self) -> &'static str {
        match self {
            ContentType::Post => "Recommended for posts",
            ContentType::Profile => "Recommended for profiles",
            ContentType::List => "Recommended for lists",
            ContentType::Record => "Recommended for records",
            ContentType::Unknown => "Recommended",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "post" => Ok(ContentType::Post),
            "profile" => Ok(ContentType::Profile),
            "list" => Ok(ContentType::List),
            "record" => Ok(ContentType::Record),
            "unknown" => Ok(ContentType::Unknown),
            other => Err(format!(
                "Unknown content type '{}': expected post, profile, list or record",
                other
            )),
        }
    }
}

/// Builds a destination URL for `(identifier, collection, rkey)`.
///
/// Returns `None` when the waypoint cannot show that target. This is the
/// authoritative compatibility check; `supported_types` only pre-filters.
pub type UrlRule = fn(&str, Option<&str>, Option<&str>) -> Option<String>;

/// A third-party destination
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'static str>,
    pub supported_types: &'static [ContentType],
    /// Collections this waypoint specialises in; featured first for them
    pub collections: &'static [&'static str],
    #[serde(skip)]
    pub url_rule: UrlRule,
}

impl Waypoint {
    pub fn supports(&self, content_type: ContentType) -> bool {
        self.supported_types.contains(&content_type)
    }

    pub fn specialises_in(&self, collection: &str) -> bool {
        self.collections.contains(&collection)
    }

    pub fn url_for(&self, locator: &ParsedLocator) -> Option<String> {
        (self.url_rule)(
            locator.identifier.as_str(),
            locator.collection(),
            locator.rkey(),
        )
    }
}

impl fmt::Debug for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waypoint")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("supported_types", &self.supported_types)
            .finish_non_exhaustive()
    }
}

/// Display grouping, optionally nested one level
#[derive(Debug, Clone, Serialize)]
pub struct WaypointCategory {
    pub id: &'static str,
    pub name: &'static str,
    /// Waypoint id featured for this category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subcategories: Vec<WaypointCategory>,
}

impl WaypointCategory {
    /// This category and all nested ones, depth first
    fn walk<'a>(&'a self, out: &mut Vec<&'a WaypointCategory>) {
        out.push(self);
        for sub in &self.subcategories {
            sub.walk(out);
        }
    }
}

/// Ordered, read-only catalog
#[derive(Debug, Clone)]
pub struct WaypointRegistry {
    waypoints: Vec<Waypoint>,
    categories: Vec<WaypointCategory>,
}

impl WaypointRegistry {
    pub fn new(waypoints: Vec<Waypoint>, categories: Vec<WaypointCategory>) -> Self {
        Self {
            waypoints,
            categories,
        }
    }

    /// The catalog shipped with the binary
    pub fn builtin() -> Self {
        Self::new(catalog::waypoints(), catalog::categories())
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn categories(&self) -> &[WaypointCategory] {
        &self.categories
    }

    pub fn get(&self, id: &str) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.id == id)
    }

    /// Every category at any depth
    pub fn all_categories(&self) -> Vec<&WaypointCategory> {
        let mut out = Vec::new();
        for category in &self.categories {
            category.walk(&mut out);
        }
        out
    }

    pub fn is_default(&self, waypoint_id: &str) -> bool {
        self.all_categories()
            .iter()
            .any(|c| c.default == Some(waypoint_id))
    }
}
