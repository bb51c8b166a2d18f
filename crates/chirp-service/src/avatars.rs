//! Avatar downloads, deduplicated and cached in memory.
//!
//! The [`AvatarService`] sits on top of a [`FetchCache`]: any number of
//! concurrent requests for the same avatar URL result in one HTTP download,
//! and every successfully decoded avatar is kept in memory for the lifetime
//! of the process. Failed downloads are retried on the next request.

use std::fmt;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use url::Url;

use chirp_cache::{FetchCache, FetchDriver, FetchError};

use crate::config::Config;

/// The image formats accepted for avatars.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG/JFIF.
    Jpeg,
    /// GIF 87a or 89a.
    Gif,
    /// RIFF-contained WebP.
    Webp,
}

impl ImageFormat {
    /// Determines the image format from the payload's magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        })
    }
}

/// A downloaded, format-checked avatar image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Avatar {
    /// The sniffed image format.
    pub format: ImageFormat,
    /// The raw image bytes.
    pub data: Bytes,
}

/// Downloads avatars over HTTP on behalf of the [`AvatarService`] cache.
#[derive(Clone, Debug)]
pub struct AvatarFetcher {
    client: Client,
    request_timeout: Duration,
}

impl AvatarFetcher {
    /// Creates a fetcher with timeouts and User-Agent from the configuration.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to create HTTP client")?;

        Ok(AvatarFetcher {
            client,
            request_timeout: config.request_timeout,
        })
    }

    async fn download(
        client: Client,
        request_timeout: Duration,
        url: Url,
    ) -> Result<Avatar, FetchError> {
        tracing::debug!("Fetching avatar from `{}`", url);

        let map_transport_error = |error: reqwest::Error| {
            if error.is_timeout() {
                FetchError::Timeout(request_timeout)
            } else {
                FetchError::Download(error.to_string())
            }
        };

        let response = client.get(url).send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Download(format!(
                "server responded with {status}"
            )));
        }

        let data = response.bytes().await.map_err(map_transport_error)?;
        let format = ImageFormat::sniff(&data)
            .ok_or_else(|| FetchError::Malformed("unrecognized image data".into()))?;

        Ok(Avatar { format, data })
    }
}

impl FetchDriver for AvatarFetcher {
    type Key = Url;
    type Value = Avatar;

    fn validate(&self, key: &Url) -> Result<(), FetchError> {
        match key.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(FetchError::InvalidKey(format!(
                "unsupported URL scheme `{scheme}`"
            ))),
        }
    }

    fn fetch(&self, key: Url) -> BoxFuture<'static, Result<Avatar, FetchError>> {
        let client = self.client.clone();
        let request_timeout = self.request_timeout;
        Self::download(client, request_timeout, key).boxed()
    }
}

/// Fetches avatars at most once per URL and serves repeats from memory.
#[derive(Clone, Debug)]
pub struct AvatarService {
    cache: FetchCache<AvatarFetcher>,
}

impl AvatarService {
    /// Creates the service from the application configuration.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(AvatarService {
            cache: FetchCache::new(AvatarFetcher::new(config)?),
        })
    }

    /// Returns the avatar at `url`, downloading it on first request.
    pub async fn avatar(&self, url: Url) -> Result<Avatar, FetchError> {
        self.cache.get(url).await
    }
}

#[cfg(test)]
mod tests {
    use chirp_test::{avatar_server, setup};

    use super::*;

    fn service() -> AvatarService {
        AvatarService::new(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_avatar() {
        setup();
        let server = avatar_server().await;
        let service = service();

        let avatar = service.avatar(server.url("/png")).await.unwrap();
        assert_eq!(avatar.format, ImageFormat::Png);
        assert!(!avatar.data.is_empty());
        assert_eq!(server.hits("/png"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_download_once() {
        setup();
        let server = avatar_server().await;
        let service = service();
        let url = server.url("/png");

        let (a, b) = futures::join!(service.avatar(url.clone()), service.avatar(url.clone()));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(server.hits("/png"), 1);

        // A later request is served from memory.
        service.avatar(url).await.unwrap();
        assert_eq!(server.hits("/png"), 1);
    }

    #[tokio::test]
    async fn test_missing_avatar_is_retried() {
        setup();
        let server = avatar_server().await;
        let service = service();
        let url = server.url("/missing");

        assert!(matches!(
            service.avatar(url.clone()).await,
            Err(FetchError::Download(_))
        ));
        assert!(matches!(
            service.avatar(url).await,
            Err(FetchError::Download(_))
        ));

        // The failure was not cached; both requests hit the server.
        assert_eq!(server.hits("/missing"), 2);
    }

    #[tokio::test]
    async fn test_garbage_payload_is_malformed() {
        setup();
        let server = avatar_server().await;
        let service = service();

        assert!(matches!(
            service.avatar(server.url("/garbage")).await,
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_non_http_urls() {
        setup();
        let service = service();

        let url = Url::parse("file:///etc/passwd").unwrap();
        assert!(matches!(
            service.avatar(url).await,
            Err(FetchError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_sniff() {
        assert_eq!(
            ImageFormat::sniff(b"\x89PNG\r\n\x1a\n0000"),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::sniff(b"GIF89a0000"), Some(ImageFormat::Gif));
        assert_eq!(
            ImageFormat::sniff(b"RIFF\x00\x00\x00\x00WEBP"),
            Some(ImageFormat::Webp)
        );
        assert_eq!(ImageFormat::sniff(b"<html></html>"), None);
        assert_eq!(ImageFormat::sniff(b""), None);
    }
}
