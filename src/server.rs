//! HTTP surface
//!
//! Thin routing over `ContentResolver`: JSON APIs under `/api`, canonical
//! content paths everywhere else, and a permanent redirect for literal
//! `at://` paths.

use crate::atproto::uri::{classify, parse_at_uri, ParsedLocator};
use crate::config::Config;
use crate::error::AppError;
use crate::resolve::{ContentResolver, Resolution};
use crate::waypoints::ContentType;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    resolver: Arc<ContentResolver>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AppError::DidResolveFailed(_) | AppError::UnsupportedDidMethod(_) | AppError::NotFound(_) => {
            StatusCode::NOT_FOUND
        }
        AppError::NetworkError(_)
        | AppError::UpstreamStatus(_)
        | AppError::RecordFetchFailed(_)
        | AppError::ParseError(_) => StatusCode::BAD_GATEWAY,
        AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AppError::ConfigError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }

        let body = ErrorBody {
            error: self.error_code(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for Resolution {
    fn into_response(self) -> Response {
        let status = self
            .error()
            .map_or(StatusCode::OK, |e| status_for(&e));
        (status, Json(self)).into_response()
    }
}

pub fn router(resolver: Arc<ContentResolver>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/resolve", get(api_resolve))
        .route("/api/link", get(api_link))
        .route("/api/waypoints", get(api_waypoints))
        .fallback(content_path)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { resolver })
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: &Config) -> Result<(), AppError> {
    let resolver = Arc::new(ContentResolver::from_config(config)?);
    let listener = TcpListener::bind(&config.bind)
        .await
        .map_err(|e| AppError::ConfigError(format!("Failed to bind {}: {}", config.bind, e)))?;

    info!(
        "Listening on http://{} (links under {})",
        listener.local_addr()?,
        config.site_base()
    );

    if !config.identity_cache_ttl().is_zero() {
        let identity = resolver.identity().clone();
        let every = config.identity_cache_ttl();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                identity.purge_expired().await;
            }
        });
    }

    axum::serve(listener, router(resolver))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct ResolveParams {
    uri: Option<String>,
}

async fn api_resolve(
    State(state): State<AppState>,
    Query(params): Query<ResolveParams>,
) -> Result<Resolution, AppError> {
    let uri = required(params.uri, "uri")?;
    Ok(state.resolver.resolve(&uri).await)
}

#[derive(Debug, Deserialize)]
struct LinkParams {
    url: Option<String>,
}

async fn api_link(
    State(state): State<AppState>,
    Query(params): Query<LinkParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let url = required(params.url, "url")?;
    let link = state.resolver.links().generate(&url)?;
    Ok(Json(json!({ "link": link })))
}

#[derive(Debug, Deserialize)]
struct WaypointParams {
    #[serde(rename = "type")]
    content_type: Option<String>,
    collection: Option<String>,
}

async fn api_waypoints(
    State(state): State<AppState>,
    Query(params): Query<WaypointParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let content_type: ContentType = required(params.content_type, "type")?
        .parse()
        .map_err(AppError::InvalidInput)?;

    let recommender = state.resolver.recommender();
    let recommended = recommender.recommended_waypoints(content_type, params.collection.as_deref());
    let categories = recommender.categorized_waypoints(content_type);
    Ok(Json(json!({
        "type": content_type,
        "recommended": recommended,
        "categories": categories,
    })))
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("Missing required query parameter: {}", name)))
}

/// `/<id>` and `/<id>/<collection>/<rkey>`, plus `/at://...` redirects
async fn content_path(State(state): State<AppState>, uri: Uri) -> Response {
    let raw = uri.path().trim_start_matches('/');
    let path = urlencoding::decode(raw)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| raw.to_string());

    if path.is_empty() {
        return AppError::NotFound("Nothing to resolve at /".to_string()).into_response();
    }

    if is_static_asset(&path) {
        return AppError::NotFound(format!("No such asset: /{}", path)).into_response();
    }

    if let Some(rest) = path
        .strip_prefix("at://")
        .or_else(|| path.strip_prefix("at:/"))
    {
        return match classify(&format!("at://{}", rest)) {
            Ok(locator) => canonical_redirect(&locator),
            Err(e) => AppError::from(e).into_response(),
        };
    }

    let locator = match parse_at_uri(&format!("at://{}", path)) {
        Ok(locator) => locator,
        Err(e) => return AppError::NotFound(e.to_string()).into_response(),
    };

    if locator.path() != path.trim_end_matches('/') {
        return canonical_redirect(&locator);
    }

    state.resolver.resolve_locator(locator).await.into_response()
}

/// File extensions that are never a handle TLD
const ASSET_EXTENSIONS: &[&str] = &[
    "ico", "png", "jpg", "jpeg", "gif", "svg", "webp", "txt", "xml", "json", "js", "css", "map",
    "webmanifest", "html",
];

/// Browser and crawler requests (`/favicon.ico`, `/robots.txt`, `/.well-known/...`)
/// that would otherwise be classified as handles and sent upstream
fn is_static_asset(path: &str) -> bool {
    if path.starts_with(".well-known/") || path == ".well-known" {
        return true;
    }
    if path.contains('/') {
        return false;
    }
    path.rsplit_once('.')
        .map(|(_, ext)| ASSET_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn canonical_redirect(locator: &ParsedLocator) -> Response {
    Redirect::permanent(&format!("/{}", locator.path())).into_response()
}
