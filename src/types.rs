use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub source_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub direct_download_url: String,
    /// Unix timestamp (seconds) after which the link should be considered dead.
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoint: &'static str,
    pub description: &'static str,
}
