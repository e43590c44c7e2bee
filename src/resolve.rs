//! Request pipeline: classify → resolve identity → fetch → recommend
//!
//! Each stage either advances or ends the request with a terminal
//! `Resolution`. Nothing here returns `Err`; failures are data.

use crate::atproto::did::{IdentityResolver, ResolvedActor};
use crate::atproto::fetcher::RecordFetcher;
use crate::atproto::types::{ProfileView, RecordEnvelope};
use crate::atproto::uri::{classify, ParsedLocator, RecordRef};
use crate::config::Config;
use crate::error::AppError;
use crate::http::build_client;
use crate::link::LinkGenerator;
use crate::waypoints::recommend::{Destinations, Recommender};
use crate::waypoints::{ContentType, WaypointRegistry};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A successfully resolved locator with everything a page needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedContent {
    pub locator: ParsedLocator,
    pub link: String,
    pub actor: ResolvedActor,
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileView>,
    pub destinations: Destinations,
    pub og_image: String,
}

/// Outcome of one request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Invalid {
        input: String,
        message: String,
    },
    Unresolved {
        locator: ParsedLocator,
        message: String,
    },
    RecordMissing {
        locator: ParsedLocator,
        did: String,
        message: String,
    },
    Resolved(Box<ResolvedContent>),
}

impl Resolution {
    /// The failure this outcome represents, if any
    pub fn error(&self) -> Option<AppError> {
        match self {
            Resolution::Invalid { message, .. } => Some(AppError::InvalidInput(message.clone())),
            Resolution::Unresolved { locator, .. } => {
                Some(AppError::DidResolveFailed(locator.identifier.to_string()))
            }
            Resolution::RecordMissing { message, .. } => Some(AppError::NotFound(message.clone())),
            Resolution::Resolved(_) => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.error().map_or(0, |e| e.exit_code())
    }
}

pub struct ContentResolver {
    identity: Arc<IdentityResolver>,
    fetcher: RecordFetcher,
    recommender: Recommender,
    links: LinkGenerator,
    site_base: String,
}

impl ContentResolver {
    pub fn new(
        identity: Arc<IdentityResolver>,
        fetcher: RecordFetcher,
        recommender: Recommender,
        site_url: &str,
    ) -> Self {
        Self {
            identity,
            fetcher,
            recommender,
            links: LinkGenerator::new(site_url),
            site_base: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Wire up the live upstreams and the built-in catalog
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let client = build_client(config)?;
        let identity = Arc::new(IdentityResolver::new(client.clone(), config));
        let fetcher = RecordFetcher::new(client, identity.clone(), config);
        let recommender = Recommender::new(Arc::new(WaypointRegistry::builtin()));
        Ok(Self::new(identity, fetcher, recommender, &config.site_url))
    }

    pub fn identity(&self) -> &Arc<IdentityResolver> {
        &self.identity
    }

    pub fn recommender(&self) -> &Recommender {
        &self.recommender
    }

    pub fn links(&self) -> &LinkGenerator {
        &self.links
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, input: &str) -> Resolution {
        match classify(input) {
            Ok(locator) => self.resolve_locator(locator).await,
            Err(e) => {
                info!("Rejected input: {}", e);
                Resolution::Invalid {
                    input: input.to_string(),
                    message: e.to_string(),
                }
            }
        }
    }

    pub async fn resolve_locator(&self, locator: ParsedLocator) -> Resolution {
        let Some(actor) = self.identity.resolve_pds_endpoint(&locator.identifier).await else {
            return Resolution::Unresolved {
                message: format!("Could not resolve identifier: {}", locator.identifier),
                locator,
            };
        };
        if locator.identifier.is_did() {
            debug!("{} is hosted at {}", actor.did, actor.pds_endpoint);
        } else {
            debug!("Resolved {} to {} at {}", locator.identifier, actor.did, actor.pds_endpoint);
        }

        // The author profile does not depend on the record, so fetch both at once
        let (record, profile) = match locator.record.clone() {
            Some(r) => {
                let (record, profile) = futures::join!(
                    self.fetcher.fetch_record_data(&actor.did, &r.collection, &r.rkey),
                    self.fetcher.fetch_profile(&actor.did)
                );
                let Some(record) = record else {
                    return Resolution::RecordMissing {
                        message: format!("Record not found: {}", locator.to_at_uri()),
                        did: actor.did,
                        locator,
                    };
                };
                (Some(record), profile)
            }
            None => (None, self.fetcher.fetch_profile(&actor.did).await),
        };

        let content_type = ContentType::for_locator(&locator);
        let destinations = self.recommender.destinations(&locator);
        let og_image = og_image_url(&self.site_base, &actor.did, locator.record.as_ref());
        info!("Resolved {} as {}", locator.to_at_uri(), content_type);

        Resolution::Resolved(Box::new(ResolvedContent {
            link: self.links.link_for(&locator),
            locator,
            actor,
            content_type,
            record,
            profile,
            destinations,
            og_image,
        }))
    }
}

/// Preview image URL, always keyed by DID
pub fn og_image_url(site_base: &str, did: &str, record: Option<&RecordRef>) -> String {
    let mut url = format!("{}/og?did={}", site_base, urlencoding::encode(did));
    if let Some(r) = record {
        url.push_str(&format!(
            "&collection={}&rkey={}",
            urlencoding::encode(&r.collection),
            urlencoding::encode(&r.rkey)
        ));
    }
    url
}
