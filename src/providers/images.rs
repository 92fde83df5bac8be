// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Product image hosting on Cloudinary.

use std::time::Duration;

use base64ct::{Base64, Encoding};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::CloudinaryConfig;

const DEFAULT_API_BASE_URL: &str = "https://api.cloudinary.com";
const UPLOAD_FOLDER: &str = "products";
/// Uploads above this size are rejected before contacting the host.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ImageHostError {
    #[error("image hosting is not configured")]
    NotConfigured,

    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),

    #[error("image is empty or larger than {} bytes", MAX_IMAGE_BYTES)]
    InvalidSize,

    #[error("image upload failed: {0}")]
    Request(String),

    #[error("image host response was invalid: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct CloudinaryClient {
    api_base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryClient {
    pub fn new(config: &CloudinaryConfig) -> Result<Self, ImageHostError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ImageHostError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            http,
        })
    }

    async fn upload(&self, public_id: &str, content_type: &str, bytes: &[u8]) -> Result<String, ImageHostError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[
                ("folder", UPLOAD_FOLDER),
                ("overwrite", "true"),
                ("public_id", public_id),
                ("timestamp", &timestamp),
            ],
            &self.api_secret,
        );
        let data_uri = format!("data:{content_type};base64,{}", Base64::encode_string(bytes));

        let form = [
            ("file", data_uri.as_str()),
            ("api_key", self.api_key.as_str()),
            ("folder", UPLOAD_FOLDER),
            ("overwrite", "true"),
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let url = format!("{}/v1_1/{}/image/upload", self.api_base_url, self.cloud_name);
        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ImageHostError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ImageHostError::Request(format!("upload returned {status}: {body}")));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| ImageHostError::InvalidResponse(e.to_string()))?;
        Ok(uploaded.secure_url)
    }
}

/// Cloudinary request signature: sorted `k=v` pairs joined by `&`, secret
/// appended, SHA-256, lowercase hex.
fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let digest = Sha256::digest(format!("{to_sign}{api_secret}").as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

pub enum ImageHost {
    Cloudinary(CloudinaryClient),
    Disabled,
}

impl ImageHost {
    pub fn from_config(config: Option<&CloudinaryConfig>) -> Result<Self, ImageHostError> {
        match config {
            Some(config) => Ok(ImageHost::Cloudinary(CloudinaryClient::new(config)?)),
            None => Ok(ImageHost::Disabled),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            ImageHost::Cloudinary(_) => "cloudinary",
            ImageHost::Disabled => "disabled",
        }
    }

    /// Upload an image and return its public URL.
    pub async fn upload(&self, public_id: &str, content_type: &str, bytes: &[u8]) -> Result<String, ImageHostError> {
        validate_image(content_type, bytes)?;
        match self {
            ImageHost::Cloudinary(client) => client.upload(public_id, content_type, bytes).await,
            ImageHost::Disabled => Err(ImageHostError::NotConfigured),
        }
    }
}

fn validate_image(content_type: &str, bytes: &[u8]) -> Result<(), ImageHostError> {
    if !content_type.starts_with("image/") {
        return Err(ImageHostError::UnsupportedContentType(content_type.to_string()));
    }
    if bytes.is_empty() || bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageHostError::InvalidSize);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_order_independent_hex() {
        let a = sign_params(&[("timestamp", "1"), ("folder", "products")], "secret");
        let b = sign_params(&[("folder", "products"), ("timestamp", "1")], "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let other = sign_params(&[("folder", "products"), ("timestamp", "1")], "other");
        assert_ne!(a, other);
    }

    #[test]
    fn image_validation() {
        assert!(validate_image("image/png", b"x").is_ok());
        assert!(matches!(
            validate_image("text/plain", b"x"),
            Err(ImageHostError::UnsupportedContentType(_))
        ));
        assert!(matches!(validate_image("image/png", b""), Err(ImageHostError::InvalidSize)));
    }

    #[tokio::test]
    async fn disabled_host_refuses_uploads() {
        let host = ImageHost::from_config(None).unwrap();
        assert_eq!(host.mode(), "disabled");
        let err = host.upload("p1", "image/png", b"png").await.unwrap_err();
        assert!(matches!(err, ImageHostError::NotConfigured));
    }
}
