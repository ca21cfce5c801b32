// src/remote/mod.rs

//! Release resolution and archive download
//!
//! The distribution site has no JSON API; the current release of an
//! addon is scraped from its files page, where the site embeds the
//! release metadata as a JSON blob in an anchor attribute. The blob's
//! file name doubles as the opaque version tag.

use crate::error::{Error, Result};
use regex::Regex;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

const DEFAULT_BASE_URL: &str = "https://www.curseforge.com/wow/addons";

/// A resolved release: the opaque version tag plus where to fetch its
/// archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: String,
    pub download_url: String,
}

/// Where addon releases come from.
///
/// `resolve_latest` is metadata-only so the up-to-date path never
/// transfers an archive.
pub trait PackageSource {
    fn resolve_latest(&self, addon: &str) -> Result<Release>;

    fn download(&self, release: &Release) -> Result<Vec<u8>>;
}

/// Release metadata blob embedded in the files page
#[derive(Debug, Deserialize)]
struct ReleaseBlob {
    #[serde(rename = "FileName")]
    file_name: String,
    #[serde(rename = "ProjectFileID")]
    project_file_id: u64,
}

/// HTTP client scraping the distribution site, with bounded retry.
pub struct CurseClient {
    client: Client,
    base_url: String,
    release_anchor: Regex,
    max_retries: u32,
}

impl CurseClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the client at a different site root. Used by tests against
    /// a local server.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;

        // The release anchor carries the metadata blob in its
        // data-action-value attribute.
        let release_anchor = Regex::new(r#"class="mg-r-05[^"]*"[^>]*data-action-value="([^"]*)""#)
            .expect("static regex");

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            release_anchor,
            max_retries: MAX_RETRIES,
        })
    }

    /// GET with retry on transport errors.
    fn get_with_retry(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(e.into());
                    }
                    warn!("Request attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    fn parse_files_page(&self, addon: &str, body: &str) -> Result<Release> {
        let blob = self
            .release_anchor
            .captures(body)
            .map(|c| c[1].to_string())
            .ok_or_else(|| Error::RemoteFormat {
                addon: addon.to_string(),
                reason: "release anchor not found".to_string(),
            })?;

        let blob: ReleaseBlob =
            serde_json::from_str(&unescape_entities(&blob)).map_err(|e| Error::RemoteFormat {
                addon: addon.to_string(),
                reason: format!("undecodable release metadata: {}", e),
            })?;

        Ok(Release {
            version: blob.file_name.trim().to_string(),
            download_url: format!(
                "{}/{}/download/{}/file",
                self.base_url, addon, blob.project_file_id
            ),
        })
    }
}

impl PackageSource for CurseClient {
    fn resolve_latest(&self, addon: &str) -> Result<Release> {
        let url = format!("{}/{}/files?sort=releasetype", self.base_url, addon);
        debug!("Resolving latest release of {} from {}", addon, url);

        let response = self.get_with_retry(&url)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::AddonNotFound(addon.to_string()));
        }
        let body = response.error_for_status()?.text()?;

        let release = self.parse_files_page(addon, &body)?;
        debug!("Latest release of {} is {}", addon, release.version);
        Ok(release)
    }

    fn download(&self, release: &Release) -> Result<Vec<u8>> {
        info!("Downloading {}", release.download_url);

        let response = self.get_with_retry(&release.download_url)?;
        let bytes = response.error_for_status()?.bytes()?;

        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Decode the handful of HTML entities the site uses in attribute
/// values.
fn unescape_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CurseClient {
        CurseClient::with_base_url("https://addons.example.com/wow/addons").unwrap()
    }

    #[test]
    fn test_parse_files_page_extracts_release() {
        let body = r#"
            <html><body>
            <a class="button" href="/elsewhere">other</a>
            <a class="mg-r-05 button--hollow" data-action="file-link"
               data-action-value="{&quot;FileName&quot;: &quot;Foo-1.0.zip &quot;, &quot;ProjectFileID&quot;: 271828}">
               Download</a>
            </body></html>
        "#;

        let release = client().parse_files_page("foo", body).unwrap();
        assert_eq!(release.version, "Foo-1.0.zip");
        assert_eq!(
            release.download_url,
            "https://addons.example.com/wow/addons/foo/download/271828/file"
        );
    }

    #[test]
    fn test_parse_files_page_without_anchor_is_remote_format() {
        let body = "<html><body>site redesign, nothing we expect</body></html>";

        let result = client().parse_files_page("foo", body);
        assert!(matches!(result, Err(Error::RemoteFormat { .. })));
    }

    #[test]
    fn test_parse_files_page_with_garbage_blob_is_remote_format() {
        let body = r#"<a class="mg-r-05" data-action-value="not json">x</a>"#;

        let result = client().parse_files_page("foo", body);
        assert!(matches!(result, Err(Error::RemoteFormat { .. })));
    }

    #[test]
    fn test_unescape_entities() {
        assert_eq!(
            unescape_entities("{&quot;a&quot;: &quot;b &amp; c&quot;}"),
            r#"{"a": "b & c"}"#
        );
        assert_eq!(unescape_entities("plain"), "plain");
    }
}
