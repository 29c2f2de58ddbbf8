use axum::{
    extract::{rejection::JsonRejection, State},
    BoxError, Json,
};
use tracing::{error, info, instrument, warn};

use crate::{
    error::ApiError,
    state::AppState,
    types::{HealthResponse, ResolveRequest, ResolveResponse, ServiceInfo},
    utils::{expires_at, parse_source_url, truncate_for_log, unix_now},
};

#[instrument]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: unix_now(),
    })
}

pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "URL Resolver Service",
        version: env!("CARGO_PKG_VERSION"),
        endpoint: "POST /resolve",
        description: "Resolves opaque URLs to temporary direct-download links",
    })
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Turns middleware failures (timeouts) into the JSON error body.
pub async fn middleware_error(err: BoxError) -> ApiError {
    ApiError::from(err)
}

#[instrument(skip(state, payload))]
pub async fn resolve_url(
    State(state): State<AppState>,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let Json(payload) = payload.inspect_err(|rejection| {
        error!(error = ?rejection, "JSON parsing error");
    })?;

    let source_url = payload.source_url.trim();
    if source_url.is_empty() {
        return Err(ApiError::BadRequest("source_url is required"));
    }

    let Some(source) = parse_source_url(source_url) else {
        error!(url = %source_url, "Invalid URL format");
        return Err(ApiError::BadRequest("Invalid URL format"));
    };

    if !source_url.starts_with(&*state.expected_source_prefix) {
        warn!(url = %source_url, "Unexpected source URL pattern");
    }

    // only fails once the semaphore is closed
    let _permit = state
        .permits
        .acquire()
        .await
        .map_err(|_| ApiError::Unavailable)?;

    let direct_download_url = state.resolver.resolve(&source).await.inspect_err(|e| {
        error!(url = %source_url, error = %e, "Failed to resolve URL");
    })?;

    info!(
        url = %source_url,
        resolved = %truncate_for_log(&direct_download_url),
        "Successfully resolved"
    );

    Ok(Json(ResolveResponse {
        direct_download_url,
        expires_at: expires_at(state.link_ttl),
    }))
}
