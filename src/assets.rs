//! Content-addressed cache of fetched image assets.
//!
//! Maps an image URL to its inline `data:` URI form so composed documents
//! are self-contained and repeat renders never refetch. Entries are written
//! once and never evicted; the map grows with the set of distinct URLs seen
//! over the process lifetime.

use std::collections::HashMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::debug;
use parking_lot::RwLock;
use reqwest::header::CONTENT_TYPE;

use crate::{Error, RendererConfig, Result};

const DEFAULT_MIME: &str = "image/png";

/// Process-wide asset cache.
///
/// Owned by the renderer and shared by reference; concurrent resolves of the
/// same unresolved URL may both fetch, and the last successful write wins.
/// That is safe because a URL's payload is expected identical across fetches.
pub struct AssetCache {
    client: reqwest::Client,
    entries: RwLock<HashMap<String, String>>,
}

impl AssetCache {
    pub fn new(config: &RendererConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Resolve a URL to its inline payload, fetching on first sight.
    ///
    /// A hit returns the stored payload with no I/O. A miss performs one GET;
    /// non-success statuses and transport failures surface as
    /// [`Error::AssetFetch`] and leave the cache untouched, so a later call
    /// retries the fetch.
    pub async fn resolve(&self, url: &str) -> Result<String> {
        if let Some(hit) = self.entries.read().get(url) {
            return Ok(hit.clone());
        }

        let fetch_err = |source: reqwest::Error| Error::AssetFetch {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_err)?;

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_MIME)
            .to_string();
        let bytes = response.bytes().await.map_err(fetch_err)?;

        debug!("cached asset {} ({} bytes, {})", url, bytes.len(), mime);

        let payload = format!("data:{};base64,{}", mime, STANDARD.encode(&bytes));
        self.entries
            .write()
            .insert(url.to_string(), payload.clone());
        Ok(payload)
    }

    /// Number of distinct URLs cached so far.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // Single-pixel PNG used as the served asset body.
    fn png_fixture() -> Vec<u8> {
        let mut bytes = Vec::new();
        image::RgbaImage::new(1, 1)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Serve `png_fixture` on every request to /tile.png, 404 elsewhere,
    /// counting the hits on the PNG path.
    fn start_asset_server(hits: Arc<AtomicUsize>) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();

        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                let response = if request.url() == "/tile.png" {
                    hits.fetch_add(1, Ordering::SeqCst);
                    tiny_http::Response::from_data(png_fixture()).with_header(
                        "Content-Type: image/png".parse::<tiny_http::Header>().unwrap(),
                    )
                } else {
                    tiny_http::Response::from_data(b"not found".to_vec()).with_status_code(404)
                };
                let _ = request.respond(response);
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn second_resolve_hits_cache() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = start_asset_server(hits.clone());
        let cache = AssetCache::new(&RendererConfig::default()).unwrap();

        let url = format!("{base}/tile.png");
        let first = cache.resolve(&url).await.unwrap();
        let second = cache.resolve(&url).await.unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with("data:image/png;base64,"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = start_asset_server(hits.clone());
        let cache = AssetCache::new(&RendererConfig::default()).unwrap();

        let missing = format!("{base}/missing.png");
        let err = cache.resolve(&missing).await.unwrap_err();
        match err {
            Error::AssetFetch { url, .. } => assert_eq!(url, missing),
            other => panic!("expected AssetFetch, got {other:?}"),
        }
        assert!(cache.is_empty());

        // The failure did not poison the cache for other URLs.
        let ok = cache.resolve(&format!("{base}/tile.png")).await.unwrap();
        assert!(ok.starts_with("data:image/png;base64,"));
        assert_eq!(cache.len(), 1);
    }
}
