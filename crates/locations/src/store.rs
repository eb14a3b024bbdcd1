//! Object storage client seam
//!
//! [`ObjectStore`] is the small set of S3 operations the object endpoint
//! needs. [`S3Store`] talks to AWS S3 (or any S3-compatible service);
//! [`crate::memory::MemoryStore`] keeps objects in memory.

use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use std::ops::Range;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Body of a ranged object read
pub type ObjectBody = Pin<Box<dyn AsyncRead + Send>>;

/// A part accepted by the store during a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: i32,
    pub e_tag: Option<String>,
}

/// Operations the S3 endpoint performs against an object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Size of the object in bytes
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64>;

    /// Read `range` (end exclusive) of the object
    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> Result<ObjectBody>;

    /// Store the whole object in one request
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    /// Start a multipart upload, returning its upload id
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String>;

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<UploadedPart>;

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<()>;

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()>;
}

/// Obtains an object store client when an S3 endpoint first needs one
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ObjectStore>>;
}

/// Connects to S3 using the ambient AWS configuration chain
///
/// Credentials and region come from the environment, shared config files or
/// instance metadata. The optional fields override what the chain resolves.
#[derive(Debug, Clone, Default)]
pub struct AwsConnector {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

#[async_trait]
impl StoreConnector for AwsConnector {
    async fn connect(&self) -> Result<Arc<dyn ObjectStore>> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        builder = builder.force_path_style(self.force_path_style);

        tracing::debug!(
            "Created S3 client (region: {:?}, endpoint: {:?})",
            sdk_config.region(),
            self.endpoint_url
        );

        Ok(Arc::new(S3Store::new(aws_sdk_s3::Client::from_conf(
            builder.build(),
        ))))
    }
}

/// [`ObjectStore`] backed by the AWS SDK
#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::storage("HeadObject", format!("{bucket}/{key}"), e))?;

        let length = response
            .content_length()
            .ok_or_else(|| Error::MissingMetadata {
                operation: "HeadObject",
                target: format!("{bucket}/{key}"),
                field: "content length",
            })?;

        Ok(length.max(0) as u64)
    }

    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> Result<ObjectBody> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(format!("bytes={}-{}", range.start, range.end - 1))
            .send()
            .await
            .map_err(|e| Error::storage("GetObject", format!("{bucket}/{key}"), e))?;

        Ok(Box::pin(response.body.into_async_read()))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Error::storage("PutObject", format!("{bucket}/{key}"), e))?;
        Ok(())
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::storage("CreateMultipartUpload", format!("{bucket}/{key}"), e))?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::MissingMetadata {
                operation: "CreateMultipartUpload",
                target: format!("{bucket}/{key}"),
                field: "upload id",
            })
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<UploadedPart> {
        let response = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Error::storage("UploadPart", format!("{bucket}/{key}"), e))?;

        Ok(UploadedPart {
            part_number,
            e_tag: response.e_tag().map(str::to_string),
        })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<()> {
        let parts = parts
            .into_iter()
            .map(|part| {
                CompletedPart::builder()
                    .set_e_tag(part.e_tag)
                    .part_number(part.part_number)
                    .build()
            })
            .collect();
        let multipart = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(multipart)
            .send()
            .await
            .map_err(|e| Error::storage("CompleteMultipartUpload", format!("{bucket}/{key}"), e))?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| Error::storage("AbortMultipartUpload", format!("{bucket}/{key}"), e))?;
        Ok(())
    }
}
