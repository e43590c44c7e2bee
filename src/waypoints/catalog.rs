//! Built-in waypoint catalog
//!
//! Order matters: it is the ranking within a content type.

use super::{ContentType, Waypoint, WaypointCategory};
use crate::atproto::uri::{LIST_COLLECTION, POST_COLLECTION};

const FEED_GENERATOR_COLLECTION: &str = "app.bsky.feed.generator";
const STARTER_PACK_COLLECTION: &str = "app.bsky.graph.starterpack";
const WHITEWIND_ENTRY: &str = "com.whtwnd.blog.entry";
const FRONTPAGE_POST: &str = "fyi.unravel.frontpage.post";
const SMOKESIGNAL_EVENT: &str = "events.smokesignal.calendar.event";
const LEXICON_EVENT: &str = "community.lexicon.calendar.event";

use super::ContentType::{List, Post, Profile, Record};

const EVERYTHING: &[ContentType] = &[Post, Profile, List, Record];

pub fn waypoints() -> Vec<Waypoint> {
    vec![
        Waypoint {
            id: "bluesky",
            name: "Bluesky",
            description: "The flagship Bluesky app",
            category: Some("apps"),
            supported_types: EVERYTHING,
            collections: &[],
            url_rule: bluesky,
        },
        Waypoint {
            id: "deer",
            name: "deer.social",
            description: "Bluesky fork with extra power-user settings",
            category: Some("bluesky-forks"),
            supported_types: EVERYTHING,
            collections: &[],
            url_rule: deer,
        },
        Waypoint {
            id: "blacksky",
            name: "Blacksky",
            description: "Community-run Bluesky client",
            category: Some("bluesky-forks"),
            supported_types: EVERYTHING,
            collections: &[],
            url_rule: blacksky,
        },
        Waypoint {
            id: "graysky",
            name: "Graysky",
            description: "Third-party Bluesky client",
            category: Some("apps"),
            supported_types: &[Post, Profile],
            collections: &[],
            url_rule: graysky,
        },
        Waypoint {
            id: "skythread",
            name: "Skythread",
            description: "Read a whole thread on one page",
            category: Some("readers"),
            supported_types: &[Post],
            collections: &[],
            url_rule: skythread,
        },
        Waypoint {
            id: "whitewind",
            name: "WhiteWind",
            description: "Markdown blogs on ATProto",
            category: Some("readers"),
            supported_types: &[Profile, Record],
            collections: &[WHITEWIND_ENTRY],
            url_rule: whitewind,
        },
        Waypoint {
            id: "frontpage",
            name: "Frontpage",
            description: "Link aggregator built on ATProto",
            category: Some("ecosystem"),
            supported_types: &[Profile, Record],
            collections: &[FRONTPAGE_POST],
            url_rule: frontpage,
        },
        Waypoint {
            id: "smokesignal",
            name: "Smoke Signal",
            description: "Events and RSVPs",
            category: Some("ecosystem"),
            supported_types: &[Profile, Record],
            collections: &[SMOKESIGNAL_EVENT, LEXICON_EVENT],
            url_rule: smokesignal,
        },
        Waypoint {
            id: "pdsls",
            name: "PDSls",
            description: "Browse the raw repository records",
            category: Some("tools"),
            supported_types: EVERYTHING,
            collections: &[],
            url_rule: pdsls,
        },
        Waypoint {
            id: "atptools",
            name: "atp.tools",
            description: "Explore records, blobs and identity",
            category: Some("tools"),
            supported_types: EVERYTHING,
            collections: &[],
            url_rule: atptools,
        },
        Waypoint {
            id: "clearsky",
            name: "Clearsky",
            description: "Block lists and moderation lookups",
            category: Some("tools"),
            supported_types: &[Profile],
            collections: &[],
            url_rule: clearsky,
        },
    ]
}

pub fn categories() -> Vec<WaypointCategory> {
    vec![
        WaypointCategory {
            id: "apps",
            name: "Bluesky apps",
            default: Some("bluesky"),
            subcategories: vec![WaypointCategory {
                id: "bluesky-forks",
                name: "Bluesky forks",
                default: Some("deer"),
                subcategories: vec![],
            }],
        },
        WaypointCategory {
            id: "readers",
            name: "Readers",
            default: None,
            subcategories: vec![],
        },
        WaypointCategory {
            id: "ecosystem",
            name: "ATProto apps",
            default: None,
            subcategories: vec![],
        },
        WaypointCategory {
            id: "tools",
            name: "Developer tools",
            default: Some("pdsls"),
            subcategories: vec![],
        },
    ]
}

/// URL layout shared by bsky.app and its forks
fn bluesky_style(base: &str, id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    match (collection, rkey) {
        (None, _) => Some(format!("{}/profile/{}", base, id)),
        (Some(POST_COLLECTION), Some(rkey)) => Some(format!("{}/profile/{}/post/{}", base, id, rkey)),
        (Some(LIST_COLLECTION), Some(rkey)) => Some(format!("{}/profile/{}/lists/{}", base, id, rkey)),
        (Some(FEED_GENERATOR_COLLECTION), Some(rkey)) => {
            Some(format!("{}/profile/{}/feed/{}", base, id, rkey))
        }
        (Some(STARTER_PACK_COLLECTION), Some(rkey)) => {
            Some(format!("{}/starter-pack/{}/{}", base, id, rkey))
        }
        _ => None,
    }
}

fn at_path(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    match (collection, rkey) {
        (Some(c), Some(r)) => Some(format!("{}/{}/{}", id, c, r)),
        (None, None) => Some(id.to_string()),
        _ => None,
    }
}

fn bluesky(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    bluesky_style("https://bsky.app", id, collection, rkey)
}

fn deer(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    bluesky_style("https://deer.social", id, collection, rkey)
}

fn blacksky(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    bluesky_style("https://blacksky.community", id, collection, rkey)
}

fn graysky(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    match collection {
        None | Some(POST_COLLECTION) => bluesky_style("https://graysky.app", id, collection, rkey),
        _ => None,
    }
}

fn skythread(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    match (collection, rkey) {
        (Some(POST_COLLECTION), Some(rkey)) => Some(format!(
            "https://blue.mackuba.eu/skythread/?author={}&post={}",
            urlencoding::encode(id),
            urlencoding::encode(rkey)
        )),
        _ => None,
    }
}

fn whitewind(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    match (collection, rkey) {
        (None, _) => Some(format!("https://whtwnd.com/{}", id)),
        (Some(WHITEWIND_ENTRY), Some(rkey)) => Some(format!("https://whtwnd.com/{}/{}", id, rkey)),
        _ => None,
    }
}

fn frontpage(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    match (collection, rkey) {
        (None, _) => Some(format!("https://frontpage.fyi/profile/{}", id)),
        (Some(FRONTPAGE_POST), Some(rkey)) => {
            Some(format!("https://frontpage.fyi/post/{}/{}", id, rkey))
        }
        _ => None,
    }
}

fn smokesignal(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    match (collection, rkey) {
        (None, _) => Some(format!("https://smokesignal.events/{}", id)),
        (Some(SMOKESIGNAL_EVENT | LEXICON_EVENT), Some(rkey)) => {
            Some(format!("https://smokesignal.events/{}/{}", id, rkey))
        }
        _ => None,
    }
}

fn pdsls(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    at_path(id, collection, rkey).map(|path| format!("https://pdsls.dev/at://{}", path))
}

fn atptools(id: &str, collection: Option<&str>, rkey: Option<&str>) -> Option<String> {
    at_path(id, collection, rkey).map(|path| format!("https://atp.tools/at:/{}", path))
}

fn clearsky(id: &str, collection: Option<&str>, _rkey: Option<&str>) -> Option<String> {
    collection
        .is_none()
        .then(|| format!("https://clearsky.app/{}", id))
}
