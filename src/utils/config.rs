//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                config_filename: format!(".{pkg}.toml"),
            }
        })
    }

    /// Per-directory config file, e.g. `.treesum.toml`.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Names excluded from every walk by default (our own config file).
    pub fn default_exclude_patterns(&self) -> Vec<String> {
        vec![self.config_filename().to_string()]
    }
}

// ---- Pipeline ----

/// Pool sizes, channel capacity and progress cadence.
pub struct PipelineConsts;

impl PipelineConsts {
    /// Workers in the hashing pool and the crawler.
    pub const DEFAULT_WORKERS: usize = 20;
    /// Semaphore slots for open files / directory handles, before the FD-limit cap.
    pub const DEFAULT_OPEN_FILES: usize = 20;
    /// Capacity of channels between stages. Small: stages are meant to run in lockstep.
    pub const DEFAULT_CHANNEL_CAP: usize = 16;
    /// Progress report interval (milliseconds).
    pub const PROGRESS_TICK_MS: u64 = 500;
}

// ---- Hashing ----

/// Hashing I/O thresholds and buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// File size above which hashing uses memory-mapped I/O (bytes). 100 MB.
    pub const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// Chunk size for reading files below mmap threshold (bytes). 1 MB.
    pub const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;
}
