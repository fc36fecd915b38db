//! Image generation against an OpenAI-compatible `images/generations`
//! endpoint, and persistence of the returned bytes.

use crate::config::ImageSettings;
use crate::error::CallError;
use crate::output::atomic_write;
use crate::platform::Platform;
use crate::provider::{GeneratedImage, ImageProvider, ImageRequest};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// `POST {base_url}/images/generations` client.
#[derive(Debug, Clone)]
pub struct OpenAiImageProvider {
    client: reqwest::Client,
    settings: ImageSettings,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct GenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    style: &'a str,
    n: u32,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedDatum>,
}

#[derive(Debug, Deserialize)]
struct GeneratedDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

impl OpenAiImageProvider {
    pub fn new(settings: ImageSettings, timeout_secs: u64) -> Result<Self, CallError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CallError::Service {
                message: format!("HTTP client: {e}"),
                transient: false,
            })?;
        Ok(Self {
            client,
            settings,
            timeout_secs,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/images/generations",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn send_error(&self, e: reqwest::Error) -> CallError {
        if e.is_timeout() {
            CallError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            CallError::Service {
                message: e.to_string(),
                transient: e.is_connect(),
            }
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, CallError> {
        let response = self.client.get(url).send().await.map_err(|e| self.send_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, "image download"));
        }
        let bytes = response.bytes().await.map_err(|e| self.send_error(e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, CallError> {
        let size = self.settings.size.as_deref().unwrap_or(&request.size);
        let body = GenerationBody {
            model: &self.settings.model,
            prompt: &request.prompt,
            size,
            quality: &self.settings.quality,
            style: &self.settings.style,
            n: 1,
            response_format: "b64_json",
        };

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.settings.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(|e| self.send_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let parsed: GenerationResponse = response.json().await.map_err(|e| CallError::Service {
            message: format!("unreadable image response: {e}"),
            transient: false,
        })?;
        let datum = parsed.data.into_iter().next().ok_or(CallError::Empty)?;

        let bytes = match (datum.b64_json, datum.url) {
            (Some(b64), _) => base64::engine::general_purpose::STANDARD
                .decode(b64.trim())
                .map_err(|e| CallError::Service {
                    message: format!("invalid base64 image: {e}"),
                    transient: false,
                })?,
            (None, Some(url)) => self.fetch_url(&url).await?,
            (None, None) => return Err(CallError::Empty),
        };
        let format = detect_format(&bytes)?;
        debug!("Image generated: {} bytes ({}, {})", bytes.len(), format, size);
        Ok(GeneratedImage { bytes, format })
    }
}

fn status_error(status: reqwest::StatusCode, body: &str) -> CallError {
    let snippet: String = body.chars().take(200).collect();
    CallError::Service {
        message: format!("HTTP {}: {}", status.as_u16(), snippet.trim()),
        transient: status.as_u16() == 429 || status.is_server_error(),
    }
}

/// File extension for recognised image bytes.
pub fn detect_format(bytes: &[u8]) -> Result<String, CallError> {
    let format = image::guess_format(bytes).map_err(|_| CallError::Service {
        message: "response is not a recognised image".into(),
        transient: false,
    })?;
    Ok(format
        .extensions_str()
        .first()
        .copied()
        .unwrap_or("img")
        .to_string())
}

/// First 12 hex digits of the SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    digest[..12].to_string()
}

/// `{slug}_{platform}_{hash12}.{ext}`: descriptive, deterministic and
/// collision-free across platforms and contents.
pub fn image_file_name(slug: &str, platform: Platform, image: &GeneratedImage) -> String {
    format!(
        "{slug}_{platform}_{}.{}",
        content_hash(&image.bytes),
        image.format
    )
}

/// Write an image under `dir/images/` and return its path.
pub async fn persist_image(
    dir: &Path,
    slug: &str,
    platform: Platform,
    image: &GeneratedImage,
) -> std::io::Result<PathBuf> {
    let path = dir.join("images").join(image_file_name(slug, platform, image));
    atomic_write(&path, &image.bytes).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89,
    ];

    fn settings(base_url: String) -> ImageSettings {
        ImageSettings {
            base_url,
            api_key: Some("test-key".into()),
            ..ImageSettings::default()
        }
    }

    fn request() -> ImageRequest {
        ImageRequest {
            prompt: "abstract attention".into(),
            size: "1024x1024".into(),
        }
    }

    #[test]
    fn detects_png() {
        assert_eq!(detect_format(PNG_1X1).unwrap(), "png");
        assert!(detect_format(b"not an image").is_err());
    }

    #[test]
    fn file_name_is_deterministic() {
        let img = GeneratedImage {
            bytes: PNG_1X1.to_vec(),
            format: "png".into(),
        };
        let a = image_file_name("attention", Platform::Twitter, &img);
        let b = image_file_name("attention", Platform::Twitter, &img);
        assert_eq!(a, b);
        assert!(a.starts_with("attention_twitter_"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, image_file_name("attention", Platform::Linkedin, &img));
    }

    #[tokio::test]
    async fn decodes_b64_response() {
        let mut server = mockito::Server::new_async().await;
        let b64 = base64::engine::general_purpose::STANDARD.encode(PNG_1X1);
        let mock = server
            .mock("POST", "/images/generations")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "size": "1024x1024",
                "response_format": "b64_json"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::json!({ "data": [{ "b64_json": b64 }] }).to_string())
            .create_async()
            .await;

        let provider = OpenAiImageProvider::new(settings(server.url()), 10).unwrap();
        let image = provider.generate(&request()).await.unwrap();
        assert_eq!(image.format, "png");
        assert_eq!(image.bytes, PNG_1X1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn follows_url_response() {
        let mut server = mockito::Server::new_async().await;
        let url = format!("{}/files/img.png", server.url());
        server
            .mock("POST", "/images/generations")
            .with_status(200)
            .with_body(serde_json::json!({ "data": [{ "url": url }] }).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/files/img.png")
            .with_status(200)
            .with_body(PNG_1X1)
            .create_async()
            .await;

        let provider = OpenAiImageProvider::new(settings(server.url()), 10).unwrap();
        let image = provider.generate(&request()).await.unwrap();
        assert_eq!(image.bytes, PNG_1X1);
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/images/generations")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let provider = OpenAiImageProvider::new(settings(server.url()), 10).unwrap();
        let err = provider.generate(&request()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn policy_rejection_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/images/generations")
            .with_status(400)
            .with_body(r#"{"error":{"message":"content policy"}}"#)
            .create_async()
            .await;

        let provider = OpenAiImageProvider::new(settings(server.url()), 10).unwrap();
        let err = provider.generate(&request()).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn persist_writes_under_images() {
        let dir = tempfile::tempdir().unwrap();
        let img = GeneratedImage {
            bytes: PNG_1X1.to_vec(),
            format: "png".into(),
        };
        let path = persist_image(dir.path(), "paper", Platform::Facebook, &img)
            .await
            .unwrap();
        assert!(path.starts_with(dir.path().join("images")));
        assert_eq!(std::fs::read(&path).unwrap(), PNG_1X1);
    }
}
