use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine configuration. Every field has a working default so hosts can run
/// with no config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding stored submission files.
    #[serde(default = "default_submission_dir")]
    pub submission_dir: PathBuf,
    /// Directory holding generated thumbnails, separate from submissions.
    #[serde(default = "default_thumbnail_dir")]
    pub thumbnail_dir: PathBuf,
    /// Number of image transform jobs allowed to run at once.
    #[serde(default = "default_transform_workers")]
    pub transform_workers: usize,
    /// Seconds a queued transform job may wait for a worker slot.
    #[serde(default = "default_transform_wait_secs")]
    pub transform_wait_secs: u64,
    /// Destinations posted to concurrently during dispatch.
    #[serde(default = "default_dispatch_fanout")]
    pub dispatch_fanout: usize,
}

fn default_submission_dir() -> PathBuf {
    PathBuf::from("submission_files")
}

fn default_thumbnail_dir() -> PathBuf {
    PathBuf::from("thumbnails")
}

fn default_transform_workers() -> usize {
    2
}

fn default_transform_wait_secs() -> u64 {
    60
}

fn default_dispatch_fanout() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            submission_dir: default_submission_dir(),
            thumbnail_dir: default_thumbnail_dir(),
            transform_workers: default_transform_workers(),
            transform_wait_secs: default_transform_wait_secs(),
            dispatch_fanout: default_dispatch_fanout(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = toml::from_str::<Config>(&raw)?;
        debug!("config loaded from {}: {config:?}", path.display());
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::load(path)
        } else {
            warn!(
                "config file {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }
}
