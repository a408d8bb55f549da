use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::RwLock;
use url::Url;

use crate::config::AppConfig;

/// Write-once blob storage for uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `body` under `key` and returns the publicly fetchable URL.
    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<String>;
}

#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    public_base: Url,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let endpoint = config
            .s3_endpoint
            .clone()
            .ok_or_else(|| anyhow!("S3_ENDPOINT is required for the s3 blob backend"))?;
        let bucket = config
            .s3_bucket
            .clone()
            .ok_or_else(|| anyhow!("S3_BUCKET is required for the s3 blob backend"))?;
        let public_endpoint = config.s3_public_endpoint.as_deref().unwrap_or(&endpoint);
        let public_base = Url::parse(public_endpoint)
            .map_err(|err| anyhow!("invalid S3 public endpoint: {}", err))?;

        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(endpoint)
            .force_path_style(true);
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let s3_config = s3_builder.build();

        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket,
            public_base,
        })
    }
}

#[async_trait]
impl BlobStore for ObjectStorage {
    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await?;

        public_url(&self.public_base, &[self.bucket.as_str(), key])
    }
}

/// Blob store kept in process memory.
pub struct MemoryBlobStore {
    base: Url,
    objects: RwLock<HashMap<String, (String, Bytes)>>,
}

impl MemoryBlobStore {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Content type and body of a stored object.
    pub async fn get(&self, key: &str) -> Option<(String, Bytes)> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<String> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Err(anyhow!("object already exists: {}", key));
        }
        objects.insert(key.to_string(), (content_type.to_string(), body));
        public_url(&self.base, &[key])
    }
}

fn public_url(base: &Url, parts: &[&str]) -> Result<String> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow!("blob base URL cannot hold a path: {}", base))?;
        segments.pop_if_empty();
        for part in parts {
            segments.extend(part.split('/'));
        }
    }
    Ok(url.to_string())
}
