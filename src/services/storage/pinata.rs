use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::{FileUpload, MetadataStore, StorageError};

pub const DEFAULT_PINATA_API_URL: &str = "https://api.pinata.cloud";
pub const DEFAULT_PINATA_GATEWAY_URL: &str = "https://gateway.pinata.cloud";

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Pinata IPFS pinning client
#[derive(Clone)]
pub struct PinataClient {
    client: reqwest::Client,
    jwt: String,
    api_url: String,
    gateway_url: String,
}

impl std::fmt::Debug for PinataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinataClient")
            .field("api_url", &self.api_url)
            .field("gateway_url", &self.gateway_url)
            .finish()
    }
}

impl PinataClient {
    pub fn new(jwt: String, api_url: String, gateway_url: String) -> Result<Self, StorageError> {
        if jwt.trim().is_empty() {
            return Err(StorageError::NotConfigured("Pinata JWT missing".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            jwt,
            api_url: api_url.trim_end_matches('/').to_string(),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
        })
    }

    fn gateway_uri(&self, hash: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_url, hash)
    }

    async fn read_pin(&self, response: reqwest::Response) -> Result<String, StorageError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let pin: PinResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        if pin.ipfs_hash.is_empty() {
            return Err(StorageError::InvalidResponse("empty IpfsHash".to_string()));
        }
        Ok(self.gateway_uri(&pin.ipfs_hash))
    }
}

#[async_trait]
impl MetadataStore for PinataClient {
    async fn upload_file(&self, file: FileUpload) -> Result<String, StorageError> {
        debug!("Pinning file {} ({} bytes)", file.file_name, file.bytes.len());

        let part = Part::bytes(file.bytes)
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/pinning/pinFileToIPFS", self.api_url))
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await?;

        let uri = self.read_pin(response).await?;
        info!("Pinned file {} at {}", file.file_name, uri);
        Ok(uri)
    }

    async fn upload_json(&self, name: &str, content: &serde_json::Value) -> Result<String, StorageError> {
        debug!("Pinning JSON document {}", name);

        let body = json!({
            "pinataContent": content,
            "pinataMetadata": { "name": name },
        });

        let response = self
            .client
            .post(format!("{}/pinning/pinJSONToIPFS", self.api_url))
            .bearer_auth(&self.jwt)
            .json(&body)
            .send()
            .await?;

        let uri = self.read_pin(response).await?;
        info!("Pinned JSON {} at {}", name, uri);
        Ok(uri)
    }
}
