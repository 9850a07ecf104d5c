//! Image loading for a card surface: fetch every referenced URL
//! concurrently, decode it and classify the outcome, so painting never
//! starts while a load is still pending.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::DynamicImage;

use crate::descriptor::ImageKind;

/// Codec images smaller than this on either side are treated as malformed.
pub const MIN_CODEC_IMAGE_PX: u32 = 16;

/// Source of image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// Fetches `http(s)` URLs with reqwest and decodes `data:` URIs inline.
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        if url.starts_with("data:") {
            return parse_data_uri(url);
        }
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| format!("body read failed: {e}"))?;
        Ok(bytes.to_vec())
    }
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
pub fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URI".to_string())?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

/// Settled state of one image slot.
#[derive(Debug, Clone)]
pub enum LoadedImage {
    Ready(DynamicImage),
    Failed { reason: String },
}

impl LoadedImage {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadedImage::Ready(_))
    }
}

/// Outcomes keyed by URL. Every requested URL has an entry.
pub type LoadedImages = HashMap<String, LoadedImage>;

/// Load every `(url, kind)` pair, each bounded by `timeout`, and wait until
/// all of them have settled. Duplicate URLs are fetched once.
pub async fn load_all(
    fetcher: &dyn ImageFetcher,
    refs: &[(&str, ImageKind)],
    timeout: Duration,
) -> LoadedImages {
    let mut unique: Vec<(&str, ImageKind)> = Vec::new();
    for &(url, kind) in refs {
        if !unique.iter().any(|(u, _)| *u == url) {
            unique.push((url, kind));
        }
    }

    let loads = unique.iter().map(|&(url, kind)| async move {
        let outcome = match tokio::time::timeout(timeout, fetcher.fetch(url)).await {
            Err(_) => LoadedImage::Failed {
                reason: format!("timed out after {timeout:?}"),
            },
            Ok(Err(reason)) => LoadedImage::Failed { reason },
            Ok(Ok(bytes)) => decode(&bytes, kind),
        };
        if let LoadedImage::Failed { reason } = &outcome {
            log::warn!("{} image {url:?} unavailable: {reason}", kind.as_str());
        }
        (url.to_string(), outcome)
    });
    futures::future::join_all(loads).await.into_iter().collect()
}

fn decode(bytes: &[u8], kind: ImageKind) -> LoadedImage {
    match image::load_from_memory(bytes) {
        Ok(img) if kind.hide_on_failure()
            && (img.width() < MIN_CODEC_IMAGE_PX || img.height() < MIN_CODEC_IMAGE_PX) =>
        {
            LoadedImage::Failed {
                reason: format!("malformed {}x{} codec image", img.width(), img.height()),
            }
        }
        Ok(img) => LoadedImage::Ready(img),
        Err(e) => LoadedImage::Failed {
            reason: format!("decode error: {e}"),
        },
    }
}
