//! Identity resolution and record fetching against stand-in upstreams

use crate::atproto::did::IdentityResolver;
use crate::atproto::fetcher::RecordFetcher;
use crate::atproto::identifier::Identifier;
use crate::atproto::types::RecordEnvelope;
use crate::config::Config;
use crate::http::build_client;
use crate::test_support::spawn_upstream;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
struct Hits {
    resolve_handle: Arc<AtomicUsize>,
    plc: Arc<AtomicUsize>,
    pds_get_record: Arc<AtomicUsize>,
    aggregator_get_record: Arc<AtomicUsize>,
}

impl Hits {
    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct Upstream {
    pds_base: String,
    hits: Hits,
}

type Params = Query<HashMap<String, String>>;

fn xrpc_error(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "InvalidRequest", "message": message })),
    )
        .into_response()
}

fn param<'a>(q: &'a HashMap<String, String>, key: &str) -> &'a str {
    q.get(key).map(String::as_str).unwrap_or_default()
}

fn record_body(repo: &str, collection: &str, rkey: &str, source: &str) -> Response {
    Json(json!({
        "uri": format!("at://{}/{}/{}", repo, collection, rkey),
        "cid": "bafyreicid",
        "value": { "$type": collection, "name": "Record", "source": source }
    }))
    .into_response()
}

async fn resolve_handle(State(up): State<Upstream>, Query(q): Params) -> Response {
    up.hits.resolve_handle.fetch_add(1, Ordering::SeqCst);
    match param(&q, "handle") {
        "alice.test" => Json(json!({ "did": "did:plc:alice" })).into_response(),
        "garbage.test" => Json(json!({ "did": "not-a-did" })).into_response(),
        _ => xrpc_error("Unable to resolve handle"),
    }
}

async fn plc_document(State(up): State<Upstream>, Path(did): Path<String>) -> Response {
    up.hits.plc.fetch_add(1, Ordering::SeqCst);
    let pds = json!([{
        "id": "#atproto_pds",
        "type": "AtprotoPersonalDataServer",
        "serviceEndpoint": up.pds_base
    }]);
    match did.as_str() {
        "did:plc:alice" => Json(json!({
            "id": did,
            "alsoKnownAs": ["at://alice.test"],
            "service": pds
        }))
        .into_response(),
        "did:plc:nopds" => Json(json!({
            "id": did,
            "alsoKnownAs": ["at://nopds.test"],
            "service": []
        }))
        .into_response(),
        "did:plc:liar" => Json(json!({ "id": "did:plc:someoneelse", "service": pds })).into_response(),
        _ => (StatusCode::NOT_FOUND, "DID not registered").into_response(),
    }
}

async fn post_thread(Query(q): Params) -> Response {
    if param(&q, "depth") != "0" {
        return xrpc_error("expected depth=0");
    }
    match param(&q, "uri") {
        "at://did:plc:alice/app.bsky.feed.post/3post" => Json(json!({
            "thread": {
                "$type": "app.bsky.feed.defs#threadViewPost",
                "post": {
                    "uri": "at://did:plc:alice/app.bsky.feed.post/3post",
                    "cid": "bafypost",
                    "author": { "did": "did:plc:alice", "handle": "alice.test", "displayName": "Alice" },
                    "record": { "$type": "app.bsky.feed.post", "text": "hello world", "createdAt": "2024-05-01T12:00:00Z" },
                    "embed": {
                        "$type": "app.bsky.embed.external#view",
                        "external": { "uri": "https://example.com", "title": "Example", "description": "An example" }
                    },
                    "likeCount": 7,
                    "replyCount": 2,
                    "repostCount": 1,
                    "quoteCount": 0,
                    "indexedAt": "2024-05-01T12:00:01Z"
                },
                "replies": []
            }
        }))
        .into_response(),
        "at://did:plc:alice/app.bsky.feed.post/missing" => Json(json!({
            "thread": {
                "$type": "app.bsky.feed.defs#notFoundPost",
                "uri": "at://did:plc:alice/app.bsky.feed.post/missing",
                "notFound": true
            }
        }))
        .into_response(),
        _ => xrpc_error("Post not found"),
    }
}

async fn get_profile(Query(q): Params) -> Response {
    match param(&q, "actor") {
        "did:plc:alice" => Json(json!({
            "did": "did:plc:alice",
            "handle": "alice.test",
            "displayName": "Alice",
            "description": "Testing things",
            "followersCount": 10,
            "followsCount": 5,
            "postsCount": 42
        }))
        .into_response(),
        _ => xrpc_error("Profile not found"),
    }
}

async fn aggregator_get_record(State(up): State<Upstream>, Query(q): Params) -> Response {
    up.hits.aggregator_get_record.fetch_add(1, Ordering::SeqCst);
    let (repo, collection, rkey) = (param(&q, "repo"), param(&q, "collection"), param(&q, "rkey"));
    match (repo, collection, rkey) {
        ("did:plc:nopds", _, _) | ("did:plc:alice", "com.whtwnd.blog.entry", "gone") => {
            record_body(repo, collection, rkey, "aggregator")
        }
        _ => xrpc_error("Could not locate record"),
    }
}

async fn pds_get_record(State(hits): State<Hits>, Query(q): Params) -> Response {
    hits.pds_get_record.fetch_add(1, Ordering::SeqCst);
    let (repo, collection, rkey) = (param(&q, "repo"), param(&q, "collection"), param(&q, "rkey"));
    match (repo, collection, rkey) {
        ("did:plc:alice", "app.bsky.graph.list", "3list") => record_body(repo, collection, rkey, "pds"),
        _ => xrpc_error("Could not locate record"),
    }
}

struct Harness {
    identity: Arc<IdentityResolver>,
    fetcher: RecordFetcher,
    hits: Hits,
}

async fn harness() -> Harness {
    let hits = Hits::default();

    let pds = Router::new()
        .route("/xrpc/com.atproto.repo.getRecord", get(pds_get_record))
        .with_state(hits.clone());
    let pds_base = spawn_upstream(pds).await;

    let upstream = Router::new()
        .route("/xrpc/com.atproto.identity.resolveHandle", get(resolve_handle))
        .route("/xrpc/app.bsky.feed.getPostThread", get(post_thread))
        .route("/xrpc/app.bsky.actor.getProfile", get(get_profile))
        .route("/xrpc/com.atproto.repo.getRecord", get(aggregator_get_record))
        .route("/:did", get(plc_document))
        .with_state(Upstream {
            pds_base,
            hits: hits.clone(),
        });
    let base = spawn_upstream(upstream).await;

    let config = Config {
        handle_resolver: base.clone(),
        plc_directory: base.clone(),
        appview: base.clone(),
        aggregator: base,
        retry_transient: false,
        ..Config::default()
    };
    let client = build_client(&config).unwrap();
    let identity = Arc::new(IdentityResolver::new(client.clone(), &config));
    let fetcher = RecordFetcher::new(client, identity.clone(), &config);

    Harness {
        identity,
        fetcher,
        hits,
    }
}

#[tokio::test]
async fn test_did_skips_handle_resolution() {
    let h = harness().await;
    let did = h.identity.resolve_handle_to_did("did:plc:alice").await;
    assert_eq!(did.as_deref(), Some("did:plc:alice"));

    let via_identifier = h
        .identity
        .resolve_did(&Identifier::Did("did:web:example.com".to_string()))
        .await;
    assert_eq!(via_identifier.as_deref(), Some("did:web:example.com"));
    assert_eq!(Hits::count(&h.hits.resolve_handle), 0);
}

#[tokio::test]
async fn test_handle_resolution_calls_endpoint_and_caches() {
    let h = harness().await;
    assert_eq!(
        h.identity.resolve_handle_to_did("alice.test").await.as_deref(),
        Some("did:plc:alice")
    );
    assert_eq!(Hits::count(&h.hits.resolve_handle), 1);

    assert_eq!(
        h.identity.resolve_handle_to_did("@Alice.test").await.as_deref(),
        Some("did:plc:alice")
    );
    assert_eq!(Hits::count(&h.hits.resolve_handle), 1, "second lookup served from cache");
}

#[tokio::test]
async fn test_unresolvable_handles() {
    let h = harness().await;
    assert_eq!(h.identity.resolve_handle_to_did("nobody.test").await, None);
    assert_eq!(h.identity.resolve_handle_to_did("garbage.test").await, None);
}

#[tokio::test]
async fn test_resolve_pds_endpoint_from_handle() {
    let h = harness().await;
    let actor = h
        .identity
        .resolve_pds_endpoint(&Identifier::Handle("alice.test".to_string()))
        .await
        .expect("alice resolves");
    assert_eq!(actor.did, "did:plc:alice");
    assert!(actor.pds_endpoint.starts_with("http://127.0.0.1:"));
    assert_eq!(actor.handle(), Some("alice.test"));
}

#[tokio::test]
async fn test_document_without_pds_is_not_partial() {
    let h = harness().await;
    let doc = h.identity.fetch_did_document("did:plc:nopds").await;
    assert!(doc.is_some(), "document itself is fetched");

    let actor = h
        .identity
        .resolve_pds_endpoint(&Identifier::Did("did:plc:nopds".to_string()))
        .await;
    assert_eq!(actor, None);
}

#[tokio::test]
async fn test_document_failures() {
    let h = harness().await;
    assert_eq!(h.identity.fetch_did_document("did:plc:unknown").await, None);
    assert_eq!(h.identity.fetch_did_document("did:plc:liar").await, None);

    let before = Hits::count(&h.hits.plc);
    assert_eq!(
        h.identity
            .fetch_did_document("did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK")
            .await,
        None
    );
    assert_eq!(Hits::count(&h.hits.plc), before, "unsupported methods make no request");
}

#[tokio::test]
async fn test_documents_are_cached() {
    let h = harness().await;
    h.identity.fetch_did_document("did:plc:alice").await.unwrap();
    h.identity.fetch_did_document("did:plc:alice").await.unwrap();
    assert_eq!(Hits::count(&h.hits.plc), 1);
}

#[tokio::test]
async fn test_list_is_generic_record_from_pds() {
    let h = harness().await;
    let envelope = h
        .fetcher
        .fetch_record_data("did:plc:alice", "app.bsky.graph.list", "3list")
        .await
        .expect("list record");

    match envelope {
        RecordEnvelope::Record(record) => {
            assert_eq!(record.uri, "at://did:plc:alice/app.bsky.graph.list/3list");
            assert_eq!(record.value["source"], "pds");
            assert_eq!(record.record_type(), Some("app.bsky.graph.list"));
        }
        RecordEnvelope::Post(_) => panic!("lists must never produce a post envelope"),
    }
    assert_eq!(Hits::count(&h.hits.pds_get_record), 1);
    assert_eq!(Hits::count(&h.hits.aggregator_get_record), 0);
}

#[tokio::test]
async fn test_falls_back_to_aggregator_without_pds() {
    let h = harness().await;
    let envelope = h
        .fetcher
        .fetch_record_data("did:plc:nopds", "com.example.thing", "self")
        .await
        .expect("aggregator record");
    match envelope {
        RecordEnvelope::Record(record) => assert_eq!(record.value["source"], "aggregator"),
        RecordEnvelope::Post(_) => panic!("unexpected post"),
    }
    assert_eq!(Hits::count(&h.hits.pds_get_record), 0);
    assert_eq!(Hits::count(&h.hits.aggregator_get_record), 1);
}

#[tokio::test]
async fn test_falls_back_once_after_pds_failure() {
    let h = harness().await;
    let envelope = h
        .fetcher
        .fetch_record_data("did:plc:alice", "com.whtwnd.blog.entry", "gone")
        .await;
    assert!(matches!(envelope, Some(RecordEnvelope::Record(_))));
    assert_eq!(Hits::count(&h.hits.pds_get_record), 1);
    assert_eq!(Hits::count(&h.hits.aggregator_get_record), 1);

    let missing = h
        .fetcher
        .fetch_record_data("did:plc:alice", "com.whtwnd.blog.entry", "never")
        .await;
    assert_eq!(missing, None);
    assert_eq!(Hits::count(&h.hits.aggregator_get_record), 2);
}

#[tokio::test]
async fn test_post_uses_thread_endpoint() {
    let h = harness().await;
    let envelope = h
        .fetcher
        .fetch_record_data("did:plc:alice", "app.bsky.feed.post", "3post")
        .await
        .expect("post thread");

    let RecordEnvelope::Post(thread) = envelope else {
        panic!("posts produce a post envelope");
    };
    assert_eq!(thread.thread.len(), 1);
    let root = thread.root().unwrap();
    assert_eq!(root.text(), "hello world");
    assert_eq!(root.like_count, 7);
    assert_eq!(root.author.display_name.as_deref(), Some("Alice"));
    assert!(root.embed.is_some());
    assert_eq!(Hits::count(&h.hits.pds_get_record), 0);
}

#[tokio::test]
async fn test_missing_post_has_no_fallback() {
    let h = harness().await;
    assert_eq!(
        h.fetcher
            .fetch_record_data("did:plc:alice", "app.bsky.feed.post", "missing")
            .await,
        None
    );
    assert_eq!(
        h.fetcher
            .fetch_record_data("did:plc:alice", "app.bsky.feed.post", "nope")
            .await,
        None
    );
    assert_eq!(Hits::count(&h.hits.aggregator_get_record), 0);
}

#[tokio::test]
async fn test_profile_view() {
    let h = harness().await;
    let profile = h.fetcher.fetch_profile("did:plc:alice").await.unwrap();
    assert_eq!(profile.display_name.as_deref(), Some("Alice"));
    assert_eq!(profile.posts_count, Some(42));
    assert_eq!(h.fetcher.fetch_profile("did:plc:nobody").await, None);
}

#[tokio::test]
async fn test_upstream_down_degrades_to_none() {
    let config = Config {
        handle_resolver: "http://127.0.0.1:9".to_string(),
        plc_directory: "http://127.0.0.1:9".to_string(),
        retry_transient: false,
        ..Config::default()
    };
    let identity = IdentityResolver::new(build_client(&config).unwrap(), &config);
    assert_eq!(identity.resolve_handle_to_did("alice.test").await, None);
    assert_eq!(identity.fetch_did_document("did:plc:alice").await, None);
}

