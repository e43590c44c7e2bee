//! Record fetching
//!
//! Posts go through the AppView thread endpoint to pick up author, embeds and
//! counts. Everything else is read with com.atproto.repo.getRecord from the
//! owner's PDS, then from the public aggregator.

use crate::atproto::did::IdentityResolver;
use crate::atproto::identifier::Identifier;
use crate::atproto::types::{
    GenericRecord, PostThread, ProfileView, RecordEnvelope, ThreadNode, ThreadResponse,
};
use crate::atproto::uri::POST_COLLECTION;
use crate::config::Config;
use crate::error::AppError;
use crate::http::{get_json, xrpc_url, RetryPolicy};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RecordFetcher {
    client: Client,
    identity: Arc<IdentityResolver>,
    appview: String,
    aggregator: String,
    retry: RetryPolicy,
}

impl RecordFetcher {
    pub fn new(client: Client, identity: Arc<IdentityResolver>, config: &Config) -> Self {
        Self {
            client,
            identity,
            appview: config.appview.clone(),
            aggregator: config.aggregator.clone(),
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Fetch the record at `repo`/`collection`/`rkey`.
    ///
    /// `app.bsky.feed.post` yields `RecordEnvelope::Post`; every other collection,
    /// lists included, yields `RecordEnvelope::Record`. `None` is the only failure signal.
    pub async fn fetch_record_data(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
    ) -> Option<RecordEnvelope> {
        if collection == POST_COLLECTION {
            self.fetch_post_thread(repo, rkey)
                .await
                .map(RecordEnvelope::Post)
        } else {
            self.fetch_generic_record(repo, collection, rkey)
                .await
                .map(RecordEnvelope::Record)
        }
    }

    /// Root post only, flattened to a one-element thread
    pub async fn fetch_post_thread(&self, repo: &str, rkey: &str) -> Option<PostThread> {
        let uri = format!("at://{}/{}/{}", repo, POST_COLLECTION, rkey);
        match self.try_fetch_post_thread(&uri).await {
            Ok(thread) => Some(thread),
            Err(e) => {
                warn!("Post thread fetch failed for {}: {}", uri, e);
                None
            }
        }
    }

    async fn try_fetch_post_thread(&self, uri: &str) -> Result<PostThread, AppError> {
        let url = xrpc_url(&self.appview, "app.bsky.feed.getPostThread");
        let response: ThreadResponse = get_json(
            &self.client,
            &url,
            &[("uri", uri), ("depth", "0"), ("parentHeight", "0")],
            self.retry,
        )
        .await?;

        normalize_thread(response.thread, uri)
    }

    /// Generic record with one fallback: owner's PDS first, then the aggregator
    pub async fn fetch_generic_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
    ) -> Option<GenericRecord> {
        let direct = match Identifier::parse(repo) {
            Some(identifier) => self.identity.resolve_pds_endpoint(&identifier).await,
            None => None,
        };

        if let Some(actor) = direct {
            match self
                .try_get_record(&actor.pds_endpoint, &actor.did, collection, rkey)
                .await
            {
                Ok(record) => return Some(record),
                Err(e) => warn!(
                    "PDS fetch failed for {}/{}/{} at {}: {}",
                    repo, collection, rkey, actor.pds_endpoint, e
                ),
            }
        } else {
            info!("No PDS for {}, falling back to aggregator", repo);
        }

        match self.try_get_record(&self.aggregator, repo, collection, rkey).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    "Aggregator fetch failed for {}/{}/{}: {}",
                    repo, collection, rkey, e
                );
                None
            }
        }
    }

    async fn try_get_record(
        &self,
        endpoint: &str,
        repo: &str,
        collection: &str,
        rkey: &str,
    ) -> Result<GenericRecord, AppError> {
        let url = xrpc_url(endpoint, "com.atproto.repo.getRecord");
        debug!("getRecord {}/{}/{} via {}", repo, collection, rkey, endpoint);
        get_json(
            &self.client,
            &url,
            &[("repo", repo), ("collection", collection), ("rkey", rkey)],
            self.retry,
        )
        .await
    }

    /// Profile view for the page preview; failure is not fatal to the caller
    pub async fn fetch_profile(&self, actor: &str) -> Option<ProfileView> {
        let url = xrpc_url(&self.appview, "app.bsky.actor.getProfile");
        match get_json(&self.client, &url, &[("actor", actor)], self.retry).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Profile fetch failed for {}: {}", actor, e);
                None
            }
        }
    }
}

/// Reduce a getPostThread node to the root post.
///
/// Missing, blocked and unrecognised nodes are fetch failures.
fn normalize_thread(node: ThreadNode, uri: &str) -> Result<PostThread, AppError> {
    match node {
        ThreadNode::Post { post } => Ok(PostThread { thread: vec![post] }),
        ThreadNode::NotFound { uri } => Err(AppError::NotFound(format!("Post not found: {}", uri))),
        ThreadNode::Blocked { uri } => {
            Err(AppError::RecordFetchFailed(format!("Post is blocked: {}", uri)))
        }
        ThreadNode::Unknown => Err(AppError::ParseError(format!(
            "Unrecognised thread node for {}",
            uri
        ))),
    }
}
