use std::{sync::Arc, time::Duration};

use tokio::sync::Semaphore;

use crate::{config::Config, resolver::Resolve};

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<dyn Resolve>,
    pub permits: Arc<Semaphore>,
    pub link_ttl: Duration,
    pub expected_source_prefix: Arc<str>,
}

impl AppState {
    pub fn new(resolver: Arc<dyn Resolve>, config: &Config) -> Self {
        Self {
            resolver,
            permits: Arc::new(Semaphore::new(config.max_concurrent_resolutions)),
            link_ttl: config.link_ttl,
            expected_source_prefix: config.expected_source_prefix.as_str().into(),
        }
    }
}
