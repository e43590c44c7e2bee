//! Identity resolution
//!
//! handle → DID → DID document → PDS endpoint. Every public lookup degrades to
//! `None` after logging; callers render "could not resolve" instead of failing.

use crate::atproto::identifier::{did_method, Identifier};
use crate::atproto::types::{
    DidDocument, ResolveHandleResponse, PDS_SERVICE_ID, PDS_SERVICE_TYPE,
};
use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::AppError;
use crate::http::{get_json, xrpc_url, RetryPolicy};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

/// A DID with its PDS, ready for record fetches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedActor {
    pub did: String,
    pub pds_endpoint: String,
    pub did_document: DidDocument,
}

impl ResolvedActor {
    pub fn handle(&self) -> Option<&str> {
        self.did_document.handle()
    }
}

pub struct IdentityResolver {
    client: Client,
    handle_resolver: String,
    plc_directory: String,
    retry: RetryPolicy,
    handles: TtlCache<String, String>,
    documents: TtlCache<String, DidDocument>,
}

impl IdentityResolver {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            handle_resolver: config.handle_resolver.clone(),
            plc_directory: config.plc_directory.clone(),
            retry: RetryPolicy::from_config(config),
            handles: TtlCache::new(config.identity_cache_ttl()),
            documents: TtlCache::new(config.identity_cache_ttl()),
        }
    }

    /// Resolve a handle to its DID. DIDs pass through unchanged without a lookup.
    pub async fn resolve_handle_to_did(&self, handle: &str) -> Option<String> {
        match self.try_resolve_handle(handle).await {
            Ok(did) => Some(did),
            Err(e) => {
                warn!("Handle resolution failed for {}: {}", handle, e);
                None
            }
        }
    }

    /// Resolve any identifier to a DID
    pub async fn resolve_did(&self, identifier: &Identifier) -> Option<String> {
        match identifier {
            Identifier::Did(did) => Some(did.clone()),
            Identifier::Handle(handle) => self.resolve_handle_to_did(handle).await,
        }
    }

    /// Fetch the DID document for `did:plc` or `did:web`
    pub async fn fetch_did_document(&self, did: &str) -> Option<DidDocument> {
        match self.try_fetch_did_document(did).await {
            Ok(doc) => Some(doc),
            Err(AppError::UnsupportedDidMethod(method)) => {
                warn!("Unsupported DID method {:?} for {}", method, did);
                None
            }
            Err(e) => {
                warn!("DID document fetch failed for {}: {}", did, e);
                None
            }
        }
    }

    /// handle-or-DID → DID → document → PDS, all or nothing
    pub async fn resolve_pds_endpoint(&self, identifier: &Identifier) -> Option<ResolvedActor> {
        let did = self.resolve_did(identifier).await?;
        let document = self.fetch_did_document(&did).await?;
        let actor = actor_from_document(did, document);
        if actor.is_none() {
            warn!("No PDS endpoint in DID document for {}", identifier);
        }
        actor
    }

    /// Evict expired identity cache entries
    pub async fn purge_expired(&self) {
        self.handles.purge_expired().await;
        self.documents.purge_expired().await;
        debug!(
            "Identity cache holds {} handles and {} documents",
            self.handles.len().await,
            self.documents.len().await
        );
    }

    async fn try_resolve_handle(&self, handle: &str) -> Result<String, AppError> {
        if handle.starts_with("did:") {
            return Ok(handle.to_string());
        }

        let handle = handle.strip_prefix('@').unwrap_or(handle).to_ascii_lowercase();

        if let Some(did) = self.handles.get(&handle).await {
            debug!("DID cache hit for handle: {}", handle);
            return Ok(did);
        }

        let url = xrpc_url(&self.handle_resolver, "com.atproto.identity.resolveHandle");
        debug!("Resolving handle {} via {}", handle, url);

        let response: ResolveHandleResponse =
            get_json(&self.client, &url, &[("handle", handle.as_str())], self.retry).await?;

        if did_method(&response.did).is_none() {
            return Err(AppError::DidResolveFailed(format!(
                "Invalid DID format returned: {}",
                response.did
            )));
        }

        self.handles.insert(handle.clone(), response.did.clone()).await;
        debug!("Resolved handle {} to DID {}", handle, response.did);
        Ok(response.did)
    }

    async fn try_fetch_did_document(&self, did: &str) -> Result<DidDocument, AppError> {
        if let Some(doc) = self.documents.get(&did.to_string()).await {
            debug!("DID document cache hit for {}", did);
            return Ok(doc);
        }

        let url = did_document_url(did, &self.plc_directory)?;
        debug!("Fetching DID document for {} from {}", did, url);

        let document: DidDocument = get_json(&self.client, &url, &[], self.retry).await?;

        if document.id != did {
            return Err(AppError::DidResolveFailed(format!(
                "DID document id {} does not match {}",
                document.id, did
            )));
        }

        self.documents.insert(did.to_string(), document.clone()).await;
        Ok(document)
    }
}

/// Where the document for `did` lives.
///
/// `did:plc` is looked up in the PLC directory; `did:web` at the domain's
/// well-known path (a `%3A` in the domain encodes a port).
pub fn did_document_url(did: &str, plc_directory: &str) -> Result<String, AppError> {
    match did_method(did) {
        Some("plc") => Ok(format!("{}/{}", plc_directory.trim_end_matches('/'), did)),
        Some("web") => {
            let domain = did.trim_start_matches("did:web:").replace("%3A", ":");
            if domain.is_empty() || domain.contains(['/', ':']) && !is_host_with_port(&domain) {
                return Err(AppError::DidResolveFailed(format!("Invalid did:web domain: {}", did)));
            }
            Ok(format!("https://{}/.well-known/did.json", domain))
        }
        Some(method) => Err(AppError::UnsupportedDidMethod(method.to_string())),
        None => Err(AppError::InvalidInput(format!("Not a DID: {}", did))),
    }
}

fn is_host_with_port(domain: &str) -> bool {
    match domain.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !host.contains([':', '/']) && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}

/// The ATProto PDS endpoint declared in a DID document.
///
/// First service whose id is `#atproto_pds` (bare or DID-qualified) or whose type
/// is `AtprotoPersonalDataServer` and which carries a string endpoint.
pub fn extract_pds_endpoint(document: &DidDocument) -> Option<String> {
    document
        .service
        .iter()
        .filter(|s| s.id.ends_with(PDS_SERVICE_ID) || s.service_type == PDS_SERVICE_TYPE)
        .find_map(|s| s.service_endpoint.as_str())
        .map(|endpoint| endpoint.trim_end_matches('/').to_string())
}

/// Combine a DID and its document; `None` when the document names no PDS
pub fn actor_from_document(did: String, document: DidDocument) -> Option<ResolvedActor> {
    let pds_endpoint = extract_pds_endpoint(&document)?;
    Some(ResolvedActor {
        did,
        pds_endpoint,
        did_document: document,
    })
}
