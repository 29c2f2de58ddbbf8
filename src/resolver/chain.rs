use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    config::{ChainHosts, Config},
    utils::truncate_for_log,
};

use super::{
    html::{self, Form},
    Resolve, ResolveError,
};

// interstitial pages a browser would pass through before the CDN link shows up
const MAX_CLIENT_REDIRECTS: usize = 3;

#[derive(Debug)]
struct Page {
    url: Url,
    body: String,
}

/// Walks source page -> portal -> verification form -> go link -> CDN page
/// and returns the download URL found on the last hop.
#[derive(Debug, Clone)]
pub struct ChainResolver {
    client: Client,
    hosts: ChainHosts,
    cdn_link: Regex,
    download_link: Regex,
}

impl ChainResolver {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str())
            .timeout(config.upstream_timeout)
            .build()?;

        let hosts = config.hosts.clone();
        let cdn_link = Regex::new(&format!(
            r"(?i){}/[a-f0-9:]+\b",
            regex::escape(&authority(&hosts.cdn))
        ))?;
        let download_link = Regex::new(&format!(
            r#"(?i){}/[^\s"'<>]+"#,
            regex::escape(&hosts.download.origin().ascii_serialization())
        ))?;

        Ok(Self {
            client,
            hosts,
            cdn_link,
            download_link,
        })
    }

    async fn fetch(&self, url: Url) -> Result<Page, ResolveError> {
        debug!(url = %truncate_for_log(url.as_str()), "GET");
        let request = self.client.get(url.clone());
        self.read(url, request).await
    }

    async fn submit(&self, page: &Page, form: &Form) -> Result<Page, ResolveError> {
        let target = match &form.action {
            Some(action) => page.url.join(action).unwrap_or_else(|_| page.url.clone()),
            None => page.url.clone(),
        };
        debug!(url = %truncate_for_log(target.as_str()), method = %form.method, "Submitting form");

        let request = if form.is_get() {
            self.client.get(target.clone()).query(&form.fields)
        } else {
            self.client.post(target.clone()).form(&form.fields)
        };
        self.read(target, request).await
    }

    async fn read(&self, url: Url, request: reqwest::RequestBuilder) -> Result<Page, ResolveError> {
        let request_error = |source| ResolveError::Request {
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::UpstreamStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // redirects are followed, keep the final location for relative links
        let url = response.url().clone();
        let body = response.text().await.map_err(request_error)?;
        Ok(Page { url, body })
    }

    fn portal_link(&self, page: &Page) -> Option<Url> {
        html::links(&page.url, &page.body)
            .into_iter()
            .find(|link| same_authority(link, &self.hosts.portal))
    }

    fn go_link(&self, token: &str) -> Url {
        let mut go = self.hosts.portal.clone();
        go.set_path("/");
        go.set_query(Some(&format!("go={token}")));
        go
    }

    fn cdn_link(&self, page: &Page) -> Option<Url> {
        let found = self.cdn_link.find(&page.body)?;
        Url::parse(&format!("{}://{}", self.hosts.cdn.scheme(), found.as_str())).ok()
    }

    async fn find_cdn_link(&self, mut page: Page) -> Result<Url, ResolveError> {
        for _ in 0..MAX_CLIENT_REDIRECTS {
            if let Some(link) = self.cdn_link(&page) {
                return Ok(link);
            }
            let Some(next) = html::client_redirect(&page.url, &page.body) else {
                break;
            };
            info!(link = %truncate_for_log(next.as_str()), "Following client-side redirect");
            page = self.fetch(next).await?;
        }
        self.cdn_link(&page).ok_or(ResolveError::CdnLinkNotFound)
    }

    fn download_link(&self, page: &Page) -> Option<String> {
        self.download_link
            .find(&page.body)
            .map(|found| html::decode_entities(found.as_str()))
    }
}

#[async_trait]
impl Resolve for ChainResolver {
    #[instrument(skip(self, source), fields(source = %source))]
    async fn resolve(&self, source: &Url) -> Result<String, ResolveError> {
        info!("Step 1: Accessing source page");
        let page = self.fetch(source.clone()).await?;

        info!("Step 2: Finding portal link");
        let portal_link = self
            .portal_link(&page)
            .ok_or_else(|| ResolveError::PortalLinkNotFound {
                host: authority(&self.hosts.portal),
            })?;
        info!(link = %truncate_for_log(portal_link.as_str()), "Found portal link");

        info!("Step 3: Accessing portal");
        let mut page = self.fetch(portal_link).await?;

        if html::has_landing_form(&page.body) {
            info!("Step 4: Submitting verification form");
            let verified = match html::landing_form(&page.body) {
                Some(form) => self
                    .submit(&page, &form)
                    .await
                    .inspect_err(|e| warn!(error = %e, "Could not submit form"))
                    .ok(),
                None => {
                    warn!("Could not submit form: landing form has no parsable markup");
                    None
                }
            };
            if let Some(verified) = verified {
                page = verified;
            }
        }

        info!("Step 5: Finding pepe- token");
        let token = html::find_token(&page.body)
            .ok_or(ResolveError::TokenNotFound)?
            .to_string();
        info!(token = %token, "Found pepe token");

        info!("Step 6: Following pepe- link");
        let page = self.fetch(self.go_link(&token)).await?;

        info!("Step 7: Extracting CDN link");
        let cdn_link = self.find_cdn_link(page).await?;
        info!(link = %cdn_link, "Found CDN link");

        info!("Step 8: Accessing CDN");
        let page = self.fetch(cdn_link).await?;

        info!("Step 9: Extracting download link");
        let download = self
            .download_link(&page)
            .ok_or(ResolveError::DownloadLinkNotFound)?;
        info!(link = %truncate_for_log(&download), "Successfully resolved");

        Ok(download)
    }
}

/// `host[:port]`, with the port omitted when it is the scheme default.
fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn same_authority(link: &Url, host: &Url) -> bool {
    link.host_str()
        .zip(host.host_str())
        .is_some_and(|(a, b)| a.eq_ignore_ascii_case(b))
        && link.port_or_known_default() == host.port_or_known_default()
}
