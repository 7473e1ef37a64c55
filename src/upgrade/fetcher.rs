//! Release fetcher.
//!
//! Asks the release API for the latest release of the configured repository
//! and turns the answer into a validated [`ReleaseInfo`]:
//!
//! - conditional request with the stored ETag; `304` serves the cached release
//! - `403`/`429` with an exhausted rate limit becomes [`UpdateError::RateLimited`]
//! - drafts and prereleases are rejected
//! - the canonical API URL and the release page must belong to the configured
//!   owner/repository
//! - the chosen asset must be served from a trusted host under
//!   `/{owner}/{repo}/releases/download/`
//!
//! A validated release and its ETag are written to the state store before
//! being returned. Failure counting is left to the caller's circuit breaker.
//! The fetcher is never run concurrently with itself; the updater's
//! `checking` guard enforces that.

use chrono::{DateTime, Utc};
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::UpdaterConfig;
use crate::constants::{
    DEFAULT_RATE_LIMIT_PAUSE, RELEASE_MEDIA_TYPE, RELEASE_WEB_HOST, TRUSTED_DOWNLOAD_HOSTS,
};
use crate::core::{Result, UpdateError};
use crate::upgrade::breaker::{CircuitBreaker, chrono_duration};
use crate::upgrade::release::{ReleaseInfo, ReleasePayload, select_asset};
use crate::upgrade::state::StateStore;
use crate::upgrade::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::version::VersionComparator;

/// The repository releases are expected to come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSource {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Application name, used for fuzzy asset matching.
    pub app_name: String,
    /// Expected asset file name.
    pub asset_name: Option<String>,
    /// Latest-release endpoint.
    pub api_url: String,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl ReleaseSource {
    /// Source described by `config`.
    pub fn from_config(config: &UpdaterConfig) -> Self {
        Self {
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            app_name: config.app_name.clone(),
            asset_name: config.asset_name.clone(),
            api_url: config.latest_release_url(),
            user_agent: config.user_agent(),
        }
    }
}

/// Fetches and validates the latest release.
pub struct ReleaseFetcher {
    source: ReleaseSource,
    transport: Arc<dyn HttpTransport>,
    store: Arc<StateStore>,
    breaker: CircuitBreaker,
}

impl ReleaseFetcher {
    /// Fetcher for `source`.
    pub fn new(source: ReleaseSource, transport: Arc<dyn HttpTransport>, store: Arc<StateStore>) -> Self {
        Self {
            source,
            transport,
            store,
            breaker: CircuitBreaker::default(),
        }
    }

    /// Repository this fetcher trusts.
    pub fn source(&self) -> &ReleaseSource {
        &self.source
    }

    /// Fetch the latest release.
    pub async fn fetch(&self) -> Result<ReleaseInfo> {
        let state = self.store.snapshot().await?;

        let mut request = HttpRequest::get(&self.source.api_url)
            .header("Accept", RELEASE_MEDIA_TYPE)
            .header("User-Agent", &self.source.user_agent);
        if let Some(etag) = &state.etag {
            request = request.header("If-None-Match", etag);
        }

        let response = self.transport.get(&request).await?;
        let now = Utc::now();

        match response.status {
            304 => {
                let Some(cached) = state.cached_release else {
                    warn!("Release API answered 304 but no release is cached");
                    // Drop the stale validator so the next request gets a full body.
                    self.store.update(|s| s.etag = None).await?;
                    return Err(UpdateError::MissingCachedRelease);
                };
                debug!("Release {} unchanged (304)", cached.version);
                let breaker = self.breaker;
                self.store.update(|s| breaker.record_success(s, now)).await?;
                Ok(cached)
            }
            403 | 429 if is_rate_limited(&response) => Err(UpdateError::RateLimited {
                until: rate_limit_reset(&response, now),
            }),
            status if !response.is_success() => Err(UpdateError::Http {
                status,
                url: self.source.api_url.clone(),
            }),
            _ => {
                let etag = response.header("etag").map(str::to_string);
                let payload: ReleasePayload = serde_json::from_slice(&response.body)?;
                let release = self.validate(payload)?;

                info!("Latest release is {}", release.version);
                let breaker = self.breaker;
                let cached = release.clone();
                self.store
                    .update(move |s| {
                        breaker.record_success(s, now);
                        s.cache_release(cached, etag);
                    })
                    .await?;
                Ok(release)
            }
        }
    }

    /// Run every trust check on a decoded payload.
    pub fn validate(&self, payload: ReleasePayload) -> Result<ReleaseInfo> {
        let version = VersionComparator::normalize(&payload.tag_name);

        if payload.draft {
            return Err(UpdateError::DraftRejected {
                version,
            });
        }
        if payload.prerelease {
            return Err(UpdateError::PrereleaseRejected {
                version,
            });
        }

        self.verify_api_url(&payload.url)?;
        self.verify_release_page(&payload.html_url)?;

        let asset = select_asset(&payload.assets, self.source.asset_name.as_deref(), &self.source.app_name);
        if let Some(asset) = asset {
            self.verify_download_url(&asset.browser_download_url)?;
            debug!("Selected asset {}", asset.name);
        } else {
            debug!("Release {} has no installable asset", version);
        }

        Ok(ReleaseInfo {
            title: payload.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| payload.tag_name.clone()),
            notes: payload.body.unwrap_or_default(),
            published_at: payload.published_at,
            release_url: payload.html_url,
            download_url: asset.map(|a| a.browser_download_url.clone()),
            asset_name: asset.map(|a| a.name.clone()),
            version,
        })
    }

    fn verify_api_url(&self, raw: &str) -> Result<()> {
        let url = parse_https(raw, "release API URL")?;
        let endpoint = Url::parse(&self.source.api_url).map_err(|e| invalid(format!("bad API endpoint: {e}")))?;
        if url.host_str() != endpoint.host_str() {
            return Err(invalid(format!(
                "release API URL host '{}' is not '{}'",
                url.host_str().unwrap_or_default(),
                endpoint.host_str().unwrap_or_default()
            )));
        }
        let segments = path_segments(&url);
        let shape_ok = segments.first().map(String::as_str) == Some("repos")
            && self.matches_repo(&segments, 1)
            && segments.get(3).map(String::as_str) == Some("releases");
        if !shape_ok {
            return Err(invalid(format!("release API URL {raw} does not belong to {}", self.slug())));
        }
        Ok(())
    }

    fn verify_release_page(&self, raw: &str) -> Result<()> {
        let url = parse_https(raw, "release page URL")?;
        if url.host_str() != Some(RELEASE_WEB_HOST) {
            return Err(invalid(format!("release page {raw} is not on {RELEASE_WEB_HOST}")));
        }
        let segments = path_segments(&url);
        if !self.matches_repo(&segments, 0) || segments.get(2).map(String::as_str) != Some("releases") {
            return Err(invalid(format!("release page {raw} does not belong to {}", self.slug())));
        }
        Ok(())
    }

    fn verify_download_url(&self, raw: &str) -> Result<()> {
        let url = parse_https(raw, "asset download URL")?;
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if !TRUSTED_DOWNLOAD_HOSTS.contains(&host.as_str()) {
            return Err(invalid(format!("asset host '{host}' is not trusted")));
        }
        let segments = path_segments(&url);
        let shape_ok = self.matches_repo(&segments, 0)
            && segments.get(2).map(String::as_str) == Some("releases")
            && segments.get(3).map(String::as_str) == Some("download")
            && segments.len() > 4;
        if !shape_ok {
            return Err(invalid(format!("asset URL {raw} is not a release download of {}", self.slug())));
        }
        Ok(())
    }

    /// `segments[offset..offset + 2]` equals owner/repo, ignoring case.
    fn matches_repo(&self, segments: &[String], offset: usize) -> bool {
        match (segments.get(offset), segments.get(offset + 1)) {
            (Some(owner), Some(repo)) => {
                owner.eq_ignore_ascii_case(&self.source.owner) && repo.eq_ignore_ascii_case(&self.source.repo)
            }
            _ => false,
        }
    }

    fn slug(&self) -> String {
        format!("{}/{}", self.source.owner, self.source.repo)
    }
}

fn invalid(reason: String) -> UpdateError {
    warn!("Rejecting release: {}", reason);
    UpdateError::InvalidReleaseSource {
        reason,
    }
}

fn parse_https(raw: &str, what: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| invalid(format!("{what} '{raw}' is not a URL: {e}")))?;
    // Plain http is tolerated only for a loopback API, which local mirrors use.
    let loopback = matches!(url.host_str(), Some("127.0.0.1" | "localhost"));
    if url.scheme() != "https" && !(url.scheme() == "http" && loopback) {
        return Err(invalid(format!("{what} '{raw}' is not served over https")));
    }
    Ok(url)
}

fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn is_rate_limited(response: &HttpResponse) -> bool {
    if response.header("x-ratelimit-remaining").map(str::trim) == Some("0") {
        return true;
    }
    String::from_utf8_lossy(&response.body).to_ascii_lowercase().contains("rate limit")
}

fn rate_limit_reset(response: &HttpResponse, now: DateTime<Utc>) -> DateTime<Utc> {
    response
        .header("x-ratelimit-reset")
        .and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .filter(|reset| *reset > now)
        .unwrap_or_else(|| now + chrono_duration(DEFAULT_RATE_LIMIT_PAUSE))
}
