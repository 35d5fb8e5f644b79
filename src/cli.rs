//! Pure helpers for the command-line driver: size parsing, level mapping
//! and suffix handling. Kept out of the binary so they can be unit tested.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Map the driver's gzip-style 1-9 levels onto zstd levels.
pub fn zstd_level(level: u8) -> i32 {
    match level {
        1 => 1,
        2 | 3 => 3,
        4..=6 => 7,
        _ => 19,
    }
}

/// Parse a byte size such as `512`, `64K`, `1.5M` or `2GiB`.
pub fn parse_byte_size(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    if number.is_empty() {
        bail!("no numeric value in {input:?}");
    }
    let value: f64 = number.parse().with_context(|| format!("parse {input:?}"))?;
    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1u64,
        "K" | "KB" | "KIB" => 1 << 10,
        "M" | "MB" | "MIB" => 1 << 20,
        "G" | "GB" | "GIB" => 1 << 30,
        other => bail!("unknown unit {other:?}"),
    };
    Ok((value * multiplier as f64) as u64)
}

/// Output name for a compressed file: the input name plus the suffix.
pub fn archive_name(file: &Path, suffix: &str) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn path_has_suffix(file: &Path, suffix: &str) -> bool {
    file.to_string_lossy().ends_with(suffix)
}

/// Output name for a decompressed file: the input name without the suffix,
/// or with `.out` appended when the suffix is absent.
pub fn strip_suffix(file: &Path, suffix: &str) -> String {
    let name = file.to_string_lossy();
    match name.strip_suffix(suffix) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => format!("{name}.out"),
    }
}
