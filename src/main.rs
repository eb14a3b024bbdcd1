//! Command-line interface for s3copy
//!
//! ```bash
//! s3copy <SOURCE> <DESTINATION>
//! ```
//!
//! Each location is `-` (stdin/stdout), `s3://bucket/key`, or a local path.
//! Progress is logged to stderr; set `RUST_LOG` to change verbosity.

use clap::Parser;
use s3copy::locations::Resolver;
use s3copy::{copy, program_name, TransferOpts};
use std::ffi::OsString;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "s3copy")]
#[command(about = "Copy a byte stream between local files, stdin/stdout and S3")]
#[command(long_about = None)]
struct Cli {
    /// Location to read from: a file path, `-` for stdin, or s3://bucket/key
    source: OsString,

    /// Location to write to: a file path, `-` for stdout, or s3://bucket/key
    destination: OsString,

    /// S3 transfer options
    #[command(flatten)]
    transfer: TransferOpts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Logs go to stderr; stdout may be carrying the copied bytes.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let program = program_name();

    info!("Starting {program}");

    let options = cli.transfer.s3_options(&program)?;
    let resolver = Resolver::new(cli.transfer.connector(), options);

    copy(&resolver, &cli.source, &cli.destination).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_source_and_destination() {
        let err = Cli::try_parse_from(["s3copy", "only-one"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert_ne!(err.exit_code(), 0);

        assert!(Cli::try_parse_from(["s3copy"]).is_err());
    }

    #[test]
    fn test_parses_positionals() {
        let cli = Cli::try_parse_from(["s3copy", "in.txt", "s3://bucket/key"]).unwrap();
        assert_eq!(cli.source, "in.txt");
        assert_eq!(cli.destination, "s3://bucket/key");
        assert_eq!(cli.transfer.download_concurrency, 5);
    }

    #[test]
    fn test_rejects_extra_positionals() {
        assert!(Cli::try_parse_from(["s3copy", "a", "b", "c"]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_accepts_non_utf8_paths() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let source = OsStr::from_bytes(b"/tmp/f\xff");
        let cli = Cli::try_parse_from([OsStr::new("s3copy"), source, OsStr::new("-")]).unwrap();
        assert_eq!(cli.source.as_os_str(), source);
        assert_eq!(cli.destination, "-");
    }
}
