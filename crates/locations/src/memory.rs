//! In-memory object store for tests
//!
//! Keeps objects in a map and records every request it serves, so copies
//! against `s3://` locations can be tested without network access. Only
//! compiled for this crate's tests or with the `test-util` feature.

use crate::store::{ObjectBody, ObjectStore, StoreConnector, UploadedPart};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};

type ObjectKey = (String, String);

struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<i32, Vec<u8>>,
}

#[derive(Default)]
struct State {
    objects: HashMap<ObjectKey, Vec<u8>>,
    uploads: HashMap<String, PendingUpload>,
    next_upload: u64,
    requests: Vec<String>,
}

/// Object store keeping everything in process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.lock()
            .objects
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Operation names of every request served, in order
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Number of multipart uploads started but neither completed nor aborted
    pub fn pending_uploads(&self) -> usize {
        self.lock().uploads.len()
    }
}

fn not_found(bucket: &str, key: &str) -> Error {
    Error::storage(
        "GetObject",
        format!("{bucket}/{key}"),
        io::Error::new(io::ErrorKind::NotFound, "no such key"),
    )
}

fn no_such_upload(operation: &'static str, bucket: &str, key: &str) -> Error {
    Error::storage(
        operation,
        format!("{bucket}/{key}"),
        io::Error::new(io::ErrorKind::NotFound, "no such upload"),
    )
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        let mut state = self.lock();
        state.requests.push("HeadObject".to_string());
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|body| body.len() as u64)
            .ok_or_else(|| not_found(bucket, key))
    }

    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> Result<ObjectBody> {
        let mut state = self.lock();
        state.requests.push("GetObject".to_string());
        let body = state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| not_found(bucket, key))?;

        let end = (range.end as usize).min(body.len());
        let start = (range.start as usize).min(end);
        Ok(Box::pin(io::Cursor::new(body[start..end].to_vec())))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let mut state = self.lock();
        state.requests.push("PutObject".to_string());
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        let mut state = self.lock();
        state.requests.push("CreateMultipartUpload".to_string());
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<UploadedPart> {
        let mut state = self.lock();
        state.requests.push("UploadPart".to_string());
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| no_such_upload("UploadPart", bucket, key))?;
        upload.parts.insert(part_number, body);
        Ok(UploadedPart {
            part_number,
            e_tag: Some(format!("\"{upload_id}-{part_number}\"")),
        })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<()> {
        let mut state = self.lock();
        state.requests.push("CompleteMultipartUpload".to_string());
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| no_such_upload("CompleteMultipartUpload", bucket, key))?;

        let mut body = Vec::new();
        for part in &parts {
            let data = upload.parts.get(&part.part_number).ok_or_else(|| {
                no_such_upload("CompleteMultipartUpload", &upload.bucket, &upload.key)
            })?;
            body.extend_from_slice(data);
        }
        state.objects.insert((upload.bucket, upload.key), body);
        Ok(())
    }

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        let mut state = self.lock();
        state.requests.push("AbortMultipartUpload".to_string());
        state
            .uploads
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| no_such_upload("AbortMultipartUpload", bucket, key))
    }
}

#[async_trait]
impl StoreConnector for Arc<MemoryStore> {
    async fn connect(&self) -> Result<Arc<dyn ObjectStore>> {
        Ok(self.clone())
    }
}
