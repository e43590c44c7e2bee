//! Recommendation over a waypoint registry
//!
//! Ranking is declared order only: collection specialists, then category
//! defaults, then everything else in registry order.

use super::{ContentType, Waypoint, WaypointCategory, WaypointRegistry};
use crate::atproto::uri::ParsedLocator;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Size of the featured selection
pub const FEATURED_LIMIT: usize = 3;

const OTHER_CATEGORY_ID: &str = "other";
const OTHER_CATEGORY_NAME: &str = "Other";

/// Waypoints of one category that support a content type
#[derive(Debug, Serialize)]
pub struct CategoryGroup<'a> {
    pub id: &'static str,
    pub name: &'static str,
    pub waypoints: Vec<&'a Waypoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subcategories: Vec<CategoryGroup<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Recommendation<'a> {
    pub label: &'static str,
    pub waypoints: Vec<&'a Waypoint>,
}

/// A waypoint applied to a concrete locator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaypointLink {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub url: String,
}

impl WaypointLink {
    fn build(waypoint: &Waypoint, locator: &ParsedLocator) -> Option<Self> {
        waypoint.url_for(locator).map(|url| WaypointLink {
            id: waypoint.id,
            name: waypoint.name,
            description: waypoint.description,
            url,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeaturedLinks {
    pub label: &'static str,
    pub links: Vec<WaypointLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryLinks {
    pub id: &'static str,
    pub category: &'static str,
    pub links: Vec<WaypointLink>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subcategories: Vec<CategoryLinks>,
}

impl CategoryLinks {
    /// Links for a group, minus featured ids; `None` when nothing is left
    fn from_group(
        group: &CategoryGroup<'_>,
        locator: &ParsedLocator,
        featured: &HashSet<&str>,
    ) -> Option<Self> {
        let links: Vec<WaypointLink> = group
            .waypoints
            .iter()
            .filter(|w| !featured.contains(w.id))
            .filter_map(|w| WaypointLink::build(w, locator))
            .collect();
        let subcategories: Vec<CategoryLinks> = group
            .subcategories
            .iter()
            .filter_map(|sub| CategoryLinks::from_group(sub, locator, featured))
            .collect();

        if links.is_empty() && subcategories.is_empty() {
            return None;
        }
        Some(CategoryLinks {
            id: group.id,
            category: group.name,
            links,
            subcategories,
        })
    }
}

/// Everything a resolved page offers: featured links, then the rest by category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Destinations {
    pub recommended: FeaturedLinks,
    pub more: Vec<CategoryLinks>,
}

impl Destinations {
    pub fn is_empty(&self) -> bool {
        self.recommended.links.is_empty() && self.more.is_empty()
    }
}

#[derive(Clone)]
pub struct Recommender {
    registry: Arc<WaypointRegistry>,
}

impl Recommender {
    pub fn new(registry: Arc<WaypointRegistry>) -> Self {
        Self { registry }
    }

    /// Registry order, filtered to `content_type`
    pub fn waypoints_for_type(&self, content_type: ContentType) -> Vec<&Waypoint> {
        self.registry
            .waypoints()
            .iter()
            .filter(|w| w.supports(content_type))
            .collect()
    }

    /// Compatible waypoints grouped by category in declaration order.
    ///
    /// Empty categories are dropped; uncategorised waypoints go in a trailing
    /// "Other" group.
    pub fn categorized_waypoints(&self, content_type: ContentType) -> Vec<CategoryGroup<'_>> {
        let compatible = self.waypoints_for_type(content_type);
        let known: HashSet<&str> = self
            .registry
            .all_categories()
            .iter()
            .map(|c| c.id)
            .collect();

        let mut groups: Vec<CategoryGroup<'_>> = self
            .registry
            .categories()
            .iter()
            .filter_map(|category| build_group(category, &compatible))
            .collect();

        let other: Vec<&Waypoint> = compatible
            .iter()
            .copied()
            .filter(|w| w.category.map_or(true, |c| !known.contains(c)))
            .collect();
        if !other.is_empty() {
            groups.push(CategoryGroup {
                id: OTHER_CATEGORY_ID,
                name: OTHER_CATEGORY_NAME,
                waypoints: other,
                subcategories: Vec::new(),
            });
        }

        groups
    }

    /// The featured subset shown before "more options"
    pub fn recommended_waypoints(
        &self,
        content_type: ContentType,
        collection: Option<&str>,
    ) -> Recommendation<'_> {
        Recommendation {
            label: content_type.recommendation_label(),
            waypoints: self
                .ranked(content_type, collection)
                .into_iter()
                .take(FEATURED_LIMIT)
                .collect(),
        }
    }

    /// Apply URL rules to a concrete locator.
    ///
    /// Waypoints whose rule declines the locator are skipped, so the featured
    /// list fills from further down the ranking.
    pub fn destinations(&self, locator: &ParsedLocator) -> Destinations {
        let content_type = ContentType::for_locator(locator);

        let links: Vec<WaypointLink> = self
            .ranked(content_type, locator.collection())
            .into_iter()
            .filter_map(|w| WaypointLink::build(w, locator))
            .take(FEATURED_LIMIT)
            .collect();

        let featured: HashSet<&str> = links.iter().map(|l| l.id).collect();
        let more = self
            .categorized_waypoints(content_type)
            .iter()
            .filter_map(|group| CategoryLinks::from_group(group, locator, &featured))
            .collect();

        Destinations {
            recommended: FeaturedLinks {
                label: content_type.recommendation_label(),
                links,
            },
            more,
        }
    }

    fn ranked(&self, content_type: ContentType, collection: Option<&str>) -> Vec<&Waypoint> {
        let compatible = self.waypoints_for_type(content_type);
        let (mut ranked, rest): (Vec<&Waypoint>, Vec<&Waypoint>) = compatible
            .into_iter()
            .partition(|w| collection.is_some_and(|c| w.specialises_in(c)));
        let (defaults, others): (Vec<&Waypoint>, Vec<&Waypoint>) = rest
            .into_iter()
            .partition(|w| self.registry.is_default(w.id));

        ranked.extend(defaults);
        ranked.extend(others);
        ranked
    }
}

fn build_group<'a>(
    category: &WaypointCategory,
    compatible: &[&'a Waypoint],
) -> Option<CategoryGroup<'a>> {
    let waypoints: Vec<&'a Waypoint> = compatible
        .iter()
        .copied()
        .filter(|w| w.category == Some(category.id))
        .collect();
    let subcategories: Vec<CategoryGroup<'a>> = category
        .subcategories
        .iter()
        .filter_map(|sub| build_group(sub, compatible))
        .collect();

    if waypoints.is_empty() && subcategories.is_empty() {
        return None;
    }
    Some(CategoryGroup {
        id: category.id,
        name: category.name,
        waypoints,
        subcategories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atproto::identifier::Identifier;
    use crate::atproto::uri::POST_COLLECTION;
    use crate::waypoints::ContentType::{Post, Profile, Record};

    fn anything(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
        match (collection, rkey) {
            (Some(c), Some(r)) => Some(format!("https://any.example/{}/{}/{}", id, c, r)),
            _ => Some(format!("https://any.example/{}", id)),
        }
    }

    fn profiles_only(id: &str, collection: Option<&str>, _rkey: Option<&str>) -> Option<String> {
        collection
            .is_none()
            .then(|| format!("https://people.example/{}", id))
    }

    fn never(_id: &str, _collection: Option<&str>, _rkey: Option<&str>) -> Option<String> {
        None
    }

    fn waypoint(
        id: &'static str,
        category: Option<&'static str>,
        supported_types: &'static [ContentType],
        url_rule: crate::waypoints::UrlRule,
    ) -> Waypoint {
        Waypoint {
            id,
            name: id,
            description: "",
            category,
            supported_types,
            collections: &[],
            url_rule,
        }
    }

    fn category(
        id: &'static str,
        default: Option<&'static str>,
        subcategories: Vec<WaypointCategory>,
    ) -> WaypointCategory {
        WaypointCategory {
            id,
            name: id,
            default,
            subcategories,
        }
    }

    fn recommender() -> Recommender {
        let mut delta = waypoint("delta", None, &[Post, Record], anything);
        delta.collections = &["com.example.blog"];

        let waypoints = vec![
            waypoint("alpha", Some("a"), &[Post, Profile], anything),
            waypoint("beta", Some("a-sub"), &[Post], anything),
            waypoint("gamma", Some("b"), &[Profile], profiles_only),
            waypoint("zeta", Some("c"), &[Record], anything),
            delta,
            waypoint("epsilon", Some("b"), &[Post], never),
            waypoint("eta", Some("b"), &[Post], anything),
            waypoint("theta", Some("c"), &[Post], anything),
        ];
        let categories = vec![
            category("a", Some("alpha"), vec![category("a-sub", None, vec![])]),
            category("b", Some("epsilon"), vec![]),
            category("c", None, vec![]),
            category("d", None, vec![]),
        ];
        Recommender::new(Arc::new(WaypointRegistry::new(waypoints, categories)))
    }

    fn ids(waypoints: &[&Waypoint]) -> Vec<&'static str> {
        waypoints.iter().map(|w| w.id).collect()
    }

    fn post_locator() -> ParsedLocator {
        ParsedLocator::record(Identifier::Did("did:plc:abc".into()), POST_COLLECTION, "3p")
    }

    #[test]
    fn test_waypoints_for_type_keeps_registry_order() {
        let r = recommender();
        assert_eq!(
            ids(&r.waypoints_for_type(Post)),
            vec!["alpha", "beta", "delta", "epsilon", "eta", "theta"]
        );
        assert_eq!(ids(&r.waypoints_for_type(Profile)), vec!["alpha", "gamma"]);
        assert!(r.waypoints_for_type(ContentType::Unknown).is_empty());
    }

    #[test]
    fn test_categorized_groups_omit_empty_and_trail_other() {
        let r = recommender();
        let groups = r.categorized_waypoints(Post);
        let names: Vec<_> = groups.iter().map(|g| g.id).collect();
        assert_eq!(names, vec!["a", "b", "c", "other"]);

        assert_eq!(ids(&groups[0].waypoints), vec!["alpha"]);
        assert_eq!(groups[0].subcategories.len(), 1);
        assert_eq!(ids(&groups[0].subcategories[0].waypoints), vec!["beta"]);
        assert_eq!(ids(&groups[1].waypoints), vec!["epsilon", "eta"]);
        assert_eq!(ids(&groups[3].waypoints), vec!["delta"]);
    }

    #[test]
    fn test_categorized_drops_empty_subcategory() {
        let r = recommender();
        let groups = r.categorized_waypoints(Profile);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, "a");
        assert!(groups[0].subcategories.is_empty());
        assert_eq!(ids(&groups[1].waypoints), vec!["gamma"]);
    }

    #[test]
    fn test_recommended_prefers_defaults_and_limits() {
        let r = recommender();
        let rec = r.recommended_waypoints(Post, None);
        assert_eq!(rec.label, "Recommended for posts");
        assert_eq!(ids(&rec.waypoints), vec!["alpha", "epsilon", "beta"]);
    }

    #[test]
    fn test_recommended_features_collection_specialist() {
        let r = recommender();
        let rec = r.recommended_waypoints(Record, Some("com.example.blog"));
        assert_eq!(ids(&rec.waypoints), vec!["delta", "zeta"]);
        assert_eq!(rec.label, "Recommended for records");
    }

    #[test]
    fn test_unlisted_collection_uses_generic_record_set() {
        let r = recommender();
        let generic = r.recommended_waypoints(Record, None);
        let unlisted = r.recommended_waypoints(Record, Some("com.example.unlisted"));
        assert_eq!(ids(&unlisted.waypoints), ids(&generic.waypoints));
        assert_eq!(ids(&unlisted.waypoints), vec!["zeta", "delta"]);
    }

    #[test]
    fn test_destinations_skip_declined_rules() {
        let r = recommender();
        let destinations = r.destinations(&post_locator());

        let featured: Vec<_> = destinations.recommended.links.iter().map(|l| l.id).collect();
        assert_eq!(featured, vec!["alpha", "beta", "delta"]);
        assert_eq!(
            destinations.recommended.links[0].url,
            "https://any.example/did:plc:abc/app.bsky.feed.post/3p"
        );

        let more: Vec<_> = destinations
            .more
            .iter()
            .map(|c| (c.id, c.links.iter().map(|l| l.id).collect::<Vec<_>>()))
            .collect();
        assert_eq!(more, vec![("b", vec!["eta"]), ("c", vec!["theta"])]);
    }

    #[test]
    fn test_destinations_for_profile() {
        let r = recommender();
        let locator = ParsedLocator::profile(Identifier::Handle("alice.test".into()));
        let destinations = r.destinations(&locator);
        assert_eq!(destinations.recommended.label, "Recommended for profiles");
        let urls: Vec<_> = destinations.recommended.links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://any.example/alice.test", "https://people.example/alice.test"]
        );
        assert!(destinations.more.is_empty());
    }

    #[test]
    fn test_builtin_post_destinations() {
        let r = Recommender::new(Arc::new(WaypointRegistry::builtin()));
        let destinations = r.destinations(&post_locator());
        let featured: Vec<_> = destinations.recommended.links.iter().map(|l| l.id).collect();
        assert_eq!(featured, vec!["bluesky", "deer", "pdsls"]);

        let json = serde_json::to_value(&destinations).unwrap();
        assert_eq!(json["recommended"]["label"], "Recommended for posts");
        for group in json["more"].as_array().unwrap() {
            for link in group["links"].as_array().unwrap() {
                assert!(!featured.contains(&link["id"].as_str().unwrap()));
            }
        }
    }

    #[test]
    fn test_builtin_blog_entry_features_reader() {
        let r = Recommender::new(Arc::new(WaypointRegistry::builtin()));
        let locator = ParsedLocator::record(
            Identifier::Handle("alice.test".into()),
            "com.whtwnd.blog.entry",
            "3w",
        );
        let destinations = r.destinations(&locator);
        assert_eq!(destinations.recommended.links[0].id, "whitewind");
        assert_eq!(destinations.recommended.links[0].url, "https://whtwnd.com/alice.test/3w");
        assert!(destinations
            .recommended
            .links
            .iter()
            .all(|l| l.id != "bluesky"));
    }
}
