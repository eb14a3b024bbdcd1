//! Command-line and environment configuration.

pub mod size;

use anyhow::Context;
use clap::Parser;
use s3copy_locations::{AwsConnector, S3Options};
use size::parse_size_to_bytes;
use std::path::PathBuf;

/// Largest part S3 accepts in a multipart upload (5GiB)
const MAX_UPLOAD_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

#[derive(Parser, Clone, Debug)]
pub struct TransferOpts {
    /// Size of each ranged request when downloading from S3 (e.g. "2GiB", "64MiB")
    #[arg(long, default_value = "2GiB", env = "S3COPY_DOWNLOAD_PART_SIZE")]
    pub download_part_size: String,

    /// Size of each part when uploading to S3 (at least 5MiB)
    #[arg(long, default_value = "1GiB", env = "S3COPY_UPLOAD_PART_SIZE")]
    pub upload_part_size: String,

    /// Number of download parts fetched at once
    #[arg(long, default_value = "5", env = "S3COPY_DOWNLOAD_CONCURRENCY")]
    pub download_concurrency: usize,

    /// Directory for temporary download files (default: current directory)
    #[arg(long, value_name = "DIR", env = "S3COPY_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// AWS region, overriding the one from the environment or profile
    #[arg(long, env = "S3COPY_REGION")]
    pub region: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services
    #[arg(long, env = "S3COPY_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Address buckets by path instead of virtual host
    #[arg(long, env = "S3COPY_FORCE_PATH_STYLE")]
    pub force_path_style: bool,
}

impl TransferOpts {
    /// Validate the transfer settings and build S3 endpoint options
    pub fn s3_options(&self, program: &str) -> anyhow::Result<S3Options> {
        let download_part_size = parse_size_to_bytes(&self.download_part_size)
            .context("Invalid --download-part-size")?;
        anyhow::ensure!(download_part_size > 0, "--download-part-size must be positive");

        let upload_part_size = parse_size_to_bytes(&self.upload_part_size)
            .context("Invalid --upload-part-size")?;
        anyhow::ensure!(
            (s3copy_locations::MIN_UPLOAD_PART_SIZE as u64..=MAX_UPLOAD_PART_SIZE)
                .contains(&upload_part_size),
            "--upload-part-size must be between 5MiB and 5GiB, got {upload_part_size} bytes"
        );

        anyhow::ensure!(
            self.download_concurrency > 0,
            "--download-concurrency must be at least 1"
        );

        Ok(S3Options {
            download_part_size,
            upload_part_size: usize::try_from(upload_part_size)
                .context("--upload-part-size does not fit in memory on this platform")?,
            download_concurrency: self.download_concurrency,
            scratch_dir: self.scratch_dir.clone(),
            temp_prefix: S3Options::temp_prefix_for(program),
        })
    }

    pub fn connector(&self) -> AwsConnector {
        AwsConnector {
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
        }
    }
}
