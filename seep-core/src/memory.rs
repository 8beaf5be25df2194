//! Memory governance for the eager index cache.
//!
//! The cache trades memory for speed; these helpers pick a soft ceiling from
//! system RAM so preload never breaks CI boxes or small VPS instances.

use std::fs;

/// Lower bound for the cache soft limit.
pub const MIN_CACHE_LIMIT_MB: u64 = 512;

/// Upper bound for the cache soft limit.
pub const MAX_CACHE_LIMIT_MB: u64 = 16_384;

const DEFAULT_LIMIT_MB: u64 = 4_096;

/// Total system memory in MB, when detectable.
pub fn total_memory_mb() -> Option<u64> {
    read_meminfo_field("MemTotal:")
}

/// Available system memory in MB, when detectable.
pub fn available_memory_mb() -> Option<u64> {
    read_meminfo_field("MemAvailable:")
}

/// Recommended cache soft limit: half of total RAM, clamped to
/// [`MIN_CACHE_LIMIT_MB`, `MAX_CACHE_LIMIT_MB`]. Falls back to a fixed
/// default when RAM cannot be detected.
pub fn recommended_limit_mb() -> u64 {
    match total_memory_mb() {
        Some(total) => (total / 2).clamp(MIN_CACHE_LIMIT_MB, MAX_CACHE_LIMIT_MB),
        None => DEFAULT_LIMIT_MB,
    }
}

fn read_meminfo_field(field: &str) -> Option<u64> {
    let content = fs::read_to_string("/proc/meminfo").ok()?;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix(field) {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb / 1024);
        }
    }
    None
}
