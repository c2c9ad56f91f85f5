use anyhow::{anyhow, Result};
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::time::Duration;
use url::Url;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    public_endpoint: Option<String>,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(config.s3_endpoint.clone())
            .force_path_style(true);
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let s3_config = s3_builder.build();

        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket: config.s3_bucket.clone(),
            public_endpoint: config.s3_public_endpoint.clone(),
        })
    }

    pub async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    /// Presigned GET URL, rewritten to the public endpoint when one is configured.
    pub async fn presigned_get_url(&self, key: &str, expires_in_seconds: u64) -> Result<String> {
        let presign_config = PresigningConfig::expires_in(Duration::from_secs(expires_in_seconds))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await?;

        let url = presigned.uri().to_string();
        match self.public_endpoint {
            Some(ref public_endpoint) => match rewrite_presigned_url(&url, public_endpoint) {
                Ok(rewritten) => Ok(rewritten),
                Err(err) => {
                    tracing::warn!(error = ?err, "failed to rewrite presigned image URL");
                    Ok(url)
                }
            },
            None => Ok(url),
        }
    }
}

fn rewrite_presigned_url(original: &str, public_endpoint: &str) -> Result<String> {
    let mut original_url = Url::parse(original)?;
    let public_url = if public_endpoint.contains("://") {
        Url::parse(public_endpoint)?
    } else {
        Url::parse(&format!("http://{}", public_endpoint))?
    };

    original_url
        .set_scheme(public_url.scheme())
        .map_err(|_| anyhow!("invalid scheme for public endpoint"))?;
    original_url
        .set_host(public_url.host_str())
        .map_err(|_| anyhow!("invalid host for public endpoint"))?;
    original_url.set_port(public_url.port()).ok();

    Ok(original_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::rewrite_presigned_url;

    #[test]
    fn rewrites_host_and_keeps_signature() {
        let rewritten = rewrite_presigned_url(
            "http://minio:9000/bucket/blog/a.jpg?X-Amz-Signature=abc",
            "https://cdn.example.com",
        )
        .unwrap();
        assert_eq!(
            rewritten,
            "https://cdn.example.com/bucket/blog/a.jpg?X-Amz-Signature=abc"
        );
    }

    #[test]
    fn accepts_endpoint_without_scheme() {
        let rewritten =
            rewrite_presigned_url("https://s3.local/bucket/k.png", "localhost:4566").unwrap();
        assert_eq!(rewritten, "http://localhost:4566/bucket/k.png");
    }
}
