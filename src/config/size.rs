//! Byte size parsing utilities.

use anyhow::Context;

/// Parse a size string like "2GiB", "64MiB", "5M", "1024" into bytes.
/// Supports:
/// - Plain numbers (interpreted as bytes): "1024"
/// - Binary suffixes: "K"/"KiB", "M"/"MiB", "G"/"GiB"
/// - Decimal suffixes: "KB", "MB", "GB"
/// - A trailing "B" on plain numbers: "512B"
///
/// Suffixes are case-insensitive.
pub fn parse_size_to_bytes(s: &str) -> anyhow::Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty size string");
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (num_str, suffix) = s.split_at(split);

    let multiplier: u64 = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kib" => 1024,
        "m" | "mib" => 1024 * 1024,
        "g" | "gib" => 1024 * 1024 * 1024,
        "kb" => 1000,
        "mb" => 1000 * 1000,
        "gb" => 1000 * 1000 * 1000,
        other => anyhow::bail!("Invalid size suffix '{other}' in: {s}"),
    };

    let value: u64 = num_str
        .parse()
        .with_context(|| format!("Invalid size value: {s}"))?;

    value
        .checked_mul(multiplier)
        .with_context(|| format!("Size too large: {s}"))
}
