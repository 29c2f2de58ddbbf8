use std::{env, fmt, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use url::Url;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// resolved links are short-lived, a day is far beyond any provider's signature
const MAX_LINK_TTL_SECS: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown log format: {0}")]
pub struct UnknownLogFormat(String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(UnknownLogFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl LogFormat {
    /// Read ahead of [`Config::load`] so the subscriber exists before config warnings are emitted.
    pub fn from_env() -> Result<Self> {
        parse_or(&|var: &str| env::var(var).ok(), "LOG_FORMAT", Self::Pretty)
    }
}

/// Hosts the resolution chain walks through, in order.
#[derive(Debug, Clone)]
pub struct ChainHosts {
    pub portal: Url,
    pub cdn: Url,
    pub download: Url,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub link_ttl: Duration,
    pub request_timeout: Duration,
    pub upstream_timeout: Duration,
    pub max_concurrent_resolutions: usize,
    pub user_agent: String,
    pub expected_source_prefix: String,
    pub hosts: ChainHosts,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_with(|var| env::var(var).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn load_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_addr = match lookup("SERVER_ADDRESS") {
            Some(addr) => addr,
            None => {
                let default = match lookup("PORT") {
                    Some(port) => format!("0.0.0.0:{port}"),
                    None => "0.0.0.0:8080".to_string(),
                };
                get_or(&lookup, "SERVER_ADDRESS", &default)
            }
        };

        let link_ttl_secs = parse_or(&lookup, "LINK_TTL_SECS", 300)?;
        if link_ttl_secs > MAX_LINK_TTL_SECS {
            anyhow::bail!("LINK_TTL_SECS must be at most {MAX_LINK_TTL_SECS}");
        }
        let link_ttl = Duration::from_secs(link_ttl_secs);
        let request_timeout = Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 120)?);
        let upstream_timeout = Duration::from_secs(parse_or(&lookup, "UPSTREAM_TIMEOUT_SECS", 30)?);
        let max_concurrent_resolutions = parse_or(&lookup, "MAX_CONCURRENT_RESOLUTIONS", 4)?;
        if max_concurrent_resolutions == 0 {
            anyhow::bail!("MAX_CONCURRENT_RESOLUTIONS must be at least 1");
        }

        let hosts = ChainHosts {
            portal: parse_or(
                &lookup,
                "PORTAL_URL",
                Url::parse("https://tech.unblockedgames.world")?,
            )?,
            cdn: parse_or(&lookup, "CDN_URL", Url::parse("https://cdn.video-leech.pro")?)?,
            download: parse_or(
                &lookup,
                "DOWNLOAD_URL",
                Url::parse("https://video-downloads.googleusercontent.com")?,
            )?,
        };

        Ok(Self {
            server_addr,
            link_ttl,
            request_timeout,
            upstream_timeout,
            max_concurrent_resolutions,
            user_agent: get_or(&lookup, "USER_AGENT", DEFAULT_USER_AGENT),
            expected_source_prefix: get_or(
                &lookup,
                "EXPECTED_SOURCE_PREFIX",
                "https://links.modpro.blog",
            ),
            hosts,
        })
    }
}

fn get_or<F>(lookup: &F, var: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).unwrap_or_else(|| {
        tracing::warn!(
            "{} environment variable not set, using default: {}",
            var,
            default
        );
        default.to_string()
    })
}

// Missing values fall back with a warning; present but malformed values are fatal.
fn parse_or<F, T>(lookup: &F, var: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {var}: {raw:?}")),
        None => {
            tracing::warn!(
                "{} environment variable not set, using default: {}",
                var,
                default
            );
            Ok(default)
        }
    }
}
