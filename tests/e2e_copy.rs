//! End-to-end copies through location strings, with S3 served from memory.

use s3copy::copy;
use s3copy::locations::memory::MemoryStore;
use s3copy::locations::{Destination, Output, Resolver, S3Options};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn resolver(store: &Arc<MemoryStore>, scratch: &Path) -> Resolver {
    Resolver::new(
        store.clone(),
        S3Options {
            download_part_size: 1024,
            upload_part_size: 4096,
            download_concurrency: 3,
            scratch_dir: Some(scratch.to_path_buf()),
            temp_prefix: S3Options::temp_prefix_for("s3copy"),
        },
    )
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn test_local_file_to_s3() {
    let work = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let resolver = resolver(&store, scratch.path());

    let local = work.path().join("localfile.txt");
    let contents = payload(10_000);
    std::fs::write(&local, &contents).unwrap();

    let written = copy(&resolver, &local, "s3://mybucket/key1")
        .await
        .unwrap();

    assert_eq!(written, 10_000);
    assert_eq!(store.object("mybucket", "key1").unwrap(), contents);
    assert!(store.requests().contains(&"CompleteMultipartUpload".to_string()));
    assert_eq!(store.pending_uploads(), 0);
}

#[tokio::test]
async fn test_s3_to_stream_removes_scratch_file() {
    let scratch = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let resolver = resolver(&store, scratch.path());
    let contents = payload(5_000);
    store.insert("mybucket", "key1", contents.clone());

    let mut source = resolver.source("s3://mybucket/key1").unwrap();
    let mut stdout = Output::new("stdout", "-", Vec::new());
    let written = stdout.write(source.as_mut()).await.unwrap();

    assert_eq!(written, 5_000);
    assert_eq!(stdout.into_inner(), contents);
    assert!(dir_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_s3_to_local_file() {
    let work = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let resolver = resolver(&store, scratch.path());
    store.insert("mybucket", "nested/path/key", "object body");

    let target = work.path().join("out.txt");
    let written = copy(&resolver, "s3://mybucket/nested/path/key", &target)
        .await
        .unwrap();

    assert_eq!(written, 11);
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "object body");
    assert!(dir_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_s3_to_s3() {
    let scratch = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let resolver = resolver(&store, scratch.path());
    store.insert("src", "a", "copied between buckets");

    let written = copy(&resolver, "s3://src/a", "s3://dst/b").await.unwrap();

    assert_eq!(written, 22);
    assert_eq!(store.object("dst", "b").unwrap(), b"copied between buckets");
    assert!(dir_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_local_round_trip_overwrites() {
    let work = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let resolver = resolver(&store, work.path());

    let input = work.path().join("in.bin");
    let output = work.path().join("out.bin");
    let contents = payload(70_000);
    std::fs::write(&input, &contents).unwrap();
    std::fs::write(&output, payload(90_000)).unwrap();

    let written = copy(&resolver, &input, &output)
        .await
        .unwrap();

    assert_eq!(written, 70_000);
    assert_eq!(std::fs::read(&output).unwrap(), contents);
    assert!(store.requests().is_empty());
}

#[tokio::test]
async fn test_missing_source_file() {
    let work = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let resolver = resolver(&store, work.path());

    let missing = work.path().join("missing.txt");
    let output = work.path().join("out.txt");
    let err = copy(&resolver, &missing, &output)
        .await
        .unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("Error writing to file from file"));
    assert!(message.contains("missing.txt"));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_empty_locations_fail_to_resolve() {
    let work = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let resolver = resolver(&store, work.path());

    let err = copy(&resolver, "", "out.txt").await.unwrap_err();
    assert!(format!("{err:#}").contains("Error resolving input source"));

    let input = work.path().join("in.txt");
    std::fs::write(&input, "x").unwrap();
    let err = copy(&resolver, &input, "").await.unwrap_err();
    assert!(format!("{err:#}").contains("Error resolving output destination"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_utf8_local_path_to_s3_and_back() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let work = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let resolver = resolver(&store, work.path());

    let input = work.path().join(OsStr::from_bytes(b"f\xff"));
    let output = work.path().join(OsStr::from_bytes(b"g\xfe"));
    std::fs::write(&input, "not utf-8 named").unwrap();

    let written = copy(&resolver, &input, "s3://mybucket/odd").await.unwrap();
    assert_eq!(written, 15);

    let written = copy(&resolver, "s3://mybucket/odd", &output).await.unwrap();
    assert_eq!(written, 15);
    assert_eq!(std::fs::read(&output).unwrap(), b"not utf-8 named");
}
