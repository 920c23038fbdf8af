//! Direct-link resolver: treats the source URL as already fetchable.
//!
//! Hosting-site backends (API lookups, scrape-based resolvers) implement the
//! same trait; this one covers plain HTTP links and keeps the service usable
//! without any site credentials. A HEAD probe supplies the size hint.

use std::time::Duration;

use async_trait::async_trait;
use mrelay_core::error::RelayError;
use mrelay_core::resolver::{ResolvedMedia, Resolver};
use mrelay_core::transfer::http;

pub struct DirectResolver {
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl DirectResolver {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            probe_timeout,
        }
    }
}

#[async_trait]
impl Resolver for DirectResolver {
    async fn resolve(&self, source_url: &str) -> Result<ResolvedMedia, RelayError> {
        let size_hint = match http::probe(&self.client, source_url, self.probe_timeout).await {
            Ok(p) => p.content_length,
            // The probe is advisory; the download will classify real failures.
            Err(e) => {
                tracing::debug!(url = source_url, "resolve probe failed: {e}");
                None
            }
        };
        Ok(ResolvedMedia {
            direct_url: source_url.to_string(),
            size_hint,
            title: title_from_url(source_url),
        })
    }
}

/// Last non-empty path segment without its extension, or "media".
fn title_from_url(url: &str) -> String {
    let stem = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()?
                .filter(|s| !s.is_empty())
                .last()
                .map(str::to_string)
        })
        .map(|seg| seg.rsplit_once('.').map_or(seg.clone(), |(s, _)| s.to_string()));
    match stem {
        Some(s) if !s.is_empty() => s,
        _ => "media".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_comes_from_last_path_segment() {
        assert_eq!(title_from_url("https://cdn.example.com/v/clip.mp4"), "clip");
        assert_eq!(title_from_url("https://cdn.example.com/v/clip.mp4?sig=abc"), "clip");
        assert_eq!(title_from_url("https://cdn.example.com/raw"), "raw");
    }

    #[test]
    fn bare_host_falls_back() {
        assert_eq!(title_from_url("https://example.com/"), "media");
        assert_eq!(title_from_url("https://example.com"), "media");
    }
}
