#![allow(async_fn_in_trait)]

use std::path::{Path, PathBuf};

use bytes::Bytes;
use log::debug;
use tokio::fs;

use crate::config::Config;
use crate::error::Result;
use crate::utils;

/// Storage of submission files and thumbnails behind opaque string
/// locations. Writes must be atomic from the reader's perspective: a read
/// never observes a partially written file.
pub trait FileStore: Send + Sync + Clone + 'static {
    async fn write(&self, location: &str, bytes: &[u8]) -> Result<()>;
    async fn read(&self, location: &str) -> Result<Bytes>;
    /// Removing a location that does not exist is not an error.
    async fn remove(&self, location: &str) -> Result<()>;
    async fn copy(&self, src: &str, dst: &str) -> Result<()>;

    /// Fresh location for a submission file of `id` with extension `ext`.
    fn submission_location(&self, id: &str, ext: &str) -> String;
    /// Fresh location for a thumbnail of `id` with extension `ext`.
    fn thumbnail_location(&self, id: &str, ext: &str) -> String;
}

/// Filesystem store keeping submission files and thumbnails in two separate
/// directories. Writes go to a temp name first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FsFileStore {
    submission_dir: PathBuf,
    thumbnail_dir: PathBuf,
}

impl FsFileStore {
    pub fn new(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.submission_dir)?;
        std::fs::create_dir_all(&config.thumbnail_dir)?;
        Ok(Self {
            submission_dir: config.submission_dir.clone(),
            thumbnail_dir: config.thumbnail_dir.clone(),
        })
    }
}

impl FileStore for FsFileStore {
    async fn write(&self, location: &str, bytes: &[u8]) -> Result<()> {
        let path = Path::new(location);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let tmp = format!("{location}.tmp-{}", utils::short_id());
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!("wrote {} bytes to {location}", bytes.len());
        Ok(())
    }

    async fn read(&self, location: &str) -> Result<Bytes> {
        Ok(fs::read(location).await.map(Bytes::from)?)
    }

    async fn remove(&self, location: &str) -> Result<()> {
        match fs::remove_file(location).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let tmp = format!("{dst}.tmp-{}", utils::short_id());
        fs::copy(src, &tmp).await?;
        if let Err(e) = fs::rename(&tmp, dst).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn submission_location(&self, id: &str, ext: &str) -> String {
        self.submission_dir
            .join(utils::stored_file_name(id, ext))
            .to_string_lossy()
            .into_owned()
    }

    fn thumbnail_location(&self, id: &str, ext: &str) -> String {
        self.thumbnail_dir
            .join(utils::stored_file_name(id, ext))
            .to_string_lossy()
            .into_owned()
    }
}
