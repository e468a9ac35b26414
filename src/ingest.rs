use std::path::Path;

use bytes::Bytes;
use chardetng::EncodingDetector;
use image::ImageFormat;
use log::{debug, info, warn};
use thiserror::Error;

use crate::error::{Context, Error, Result};
use crate::file_store::FileStore;
use crate::models::{FileKind, FileRecord, FileSubmission, UploadedFile};
use crate::transform::{self, TransformError, TransformPool};
use crate::utils;

pub const THUMBNAIL_MAX_PX: u32 = 300;
pub const THUMBNAIL_QUALITY: u8 = 99;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("could not produce a file icon: {0}")]
    Icon(String),
}

/// Host lookup of a representative icon for a path, used to thumbnail files
/// that are not images themselves.
pub trait IconSource: Send + Sync {
    fn icon_for(&self, path: &Path) -> Result<Bytes>;
}

/// Fallback icon source drawing a flat document glyph, so headless hosts get
/// deterministic thumbnails without asking the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderIconSource;

impl IconSource for PlaceholderIconSource {
    fn icon_for(&self, _path: &Path) -> Result<Bytes> {
        let side = 64u32;
        let img = image::RgbImage::from_fn(side, side, |x, y| {
            let border = x < 3 || y < 3 || x >= side - 3 || y >= side - 3;
            let fold = x + y >= side + side / 2;
            if border {
                image::Rgb([96, 96, 96])
            } else if fold {
                image::Rgb([176, 176, 176])
            } else {
                image::Rgb([236, 236, 236])
            }
        });
        let encoded = transform::encode(
            &image::DynamicImage::ImageRgb8(img),
            ImageFormat::Png,
            None,
        )?;
        Ok(Bytes::from(encoded))
    }
}

struct PreparedFile {
    submission: Bytes,
    mime_type: String,
    extension: String,
    thumbnail: Option<(Bytes, String)>,
}

/// Turns uploaded files into stored submission files plus thumbnails.
/// The ingester exclusively owns file placement; nothing is written until
/// every transform for the file has resolved.
#[derive(Debug, Clone)]
pub struct FileIngester<S: FileStore, I: IconSource> {
    store: S,
    pool: TransformPool,
    icons: I,
}

impl<S: FileStore, I: IconSource> FileIngester<S, I> {
    pub fn new(store: S, pool: TransformPool, icons: I) -> Self {
        Self { store, pool, icons }
    }

    /// Store `file` for submission `id`, producing the submission file and
    /// its thumbnail. `source_path` is only consulted for icon lookup of
    /// non-image files. Any failure aborts the whole operation with nothing
    /// recorded.
    pub async fn ingest(
        &self,
        id: &str,
        file: UploadedFile,
        source_path: Option<&Path>,
    ) -> Result<FileRecord> {
        let file = self.canonicalize_text(file);
        info!(
            "ingesting {} ({}, {} bytes)",
            file.name,
            file.mime_type,
            file.size()
        );

        let prepared = if file.mime_type.contains("gif") {
            self.prepare_gif(&file).await?
        } else if transform::supports_mime(&file.mime_type) {
            self.prepare_still_image(&file).await?
        } else if file.mime_type.starts_with("image/") {
            debug!(
                "no transform support for {}, storing verbatim",
                file.mime_type
            );
            self.prepare_untransformable_image(&file)
        } else {
            self.prepare_other(&file, source_path)?
        };

        self.commit(id, &file, prepared).await
    }

    /// Text files are never stored with an ambiguous encoding: foreign bytes
    /// are decoded by best guess and re-encoded as UTF-8.
    fn canonicalize_text(&self, file: UploadedFile) -> UploadedFile {
        let is_text = file.mime_type == "text/plain"
            || file.name.to_ascii_lowercase().ends_with(".txt");
        if !is_text || std::str::from_utf8(&file.buffer).is_ok() {
            return file;
        }

        let mut detector = EncodingDetector::new();
        detector.feed(&file.buffer, true);
        let encoding = detector.guess(None, true);
        let (text, _, had_errors) = encoding.decode(&file.buffer);
        if had_errors {
            warn!(
                "{}: some bytes did not decode cleanly as {}",
                file.name,
                encoding.name()
            );
        }
        debug!("re-encoded {} from {} to utf-8", file.name, encoding.name());
        UploadedFile {
            buffer: Bytes::from(text.into_owned().into_bytes()),
            ..file
        }
    }

    /// Gifs are stored byte-identical; only the thumbnail is derived, from
    /// the first animation frame.
    async fn prepare_gif(&self, file: &UploadedFile) -> Result<PreparedFile> {
        let thumb = self
            .pool
            .acquire(file.buffer.clone(), &file.mime_type)
            .resize(THUMBNAIL_MAX_PX)
            .quality(THUMBNAIL_QUALITY)
            .convert_to(ImageFormat::Jpeg)
            .materialize()
            .await
            .map_err(IngestionError::from)?;

        Ok(PreparedFile {
            submission: file.buffer.clone(),
            mime_type: file.mime_type.clone(),
            extension: self.original_extension(file),
            thumbnail: Some((thumb.buffer, "jpg".to_string())),
        })
    }

    async fn prepare_still_image(&self, file: &UploadedFile) -> Result<PreparedFile> {
        let mut job = self.pool.acquire(file.buffer.clone(), &file.mime_type);
        if file.mime_type == "image/tiff" {
            // Tiff is not suitable as a stored format.
            job = job.convert_to(ImageFormat::Png);
        }
        let main = job.materialize().await.map_err(IngestionError::from)?;

        let thumb = self
            .pool
            .acquire(main.buffer.clone(), &main.mime_type)
            .resize(THUMBNAIL_MAX_PX)
            .quality(THUMBNAIL_QUALITY)
            .materialize()
            .await
            .map_err(IngestionError::from)?;

        Ok(PreparedFile {
            submission: main.buffer,
            extension: utils::extension_for_mime(&main.mime_type).to_string(),
            thumbnail: Some((
                thumb.buffer,
                utils::extension_for_mime(&thumb.mime_type).to_string(),
            )),
            mime_type: main.mime_type,
        })
    }

    fn prepare_untransformable_image(&self, file: &UploadedFile) -> PreparedFile {
        let extension = self.original_extension(file);
        PreparedFile {
            submission: file.buffer.clone(),
            mime_type: file.mime_type.clone(),
            thumbnail: Some((file.buffer.clone(), extension.clone())),
            extension,
        }
    }

    fn prepare_other(
        &self,
        file: &UploadedFile,
        source_path: Option<&Path>,
    ) -> Result<PreparedFile> {
        let path = source_path.unwrap_or_else(|| Path::new(&file.name));
        let icon = self
            .icons
            .icon_for(path)
            .map_err(|e| IngestionError::Icon(e.to_string()))?;
        let thumb = transform::encode(&transform::decode(&icon)?, ImageFormat::Jpeg, Some(100))
            .map_err(IngestionError::from)?;

        Ok(PreparedFile {
            submission: file.buffer.clone(),
            mime_type: file.mime_type.clone(),
            extension: self.original_extension(file),
            thumbnail: Some((Bytes::from(thumb), "jpg".to_string())),
        })
    }

    fn original_extension(&self, file: &UploadedFile) -> String {
        utils::file_extension(&file.name)
            .unwrap_or_else(|| utils::extension_for_mime(&file.mime_type).to_string())
    }

    /// Durably write the prepared buffers. If the thumbnail write fails the
    /// just-written submission file is removed again, so no partial result
    /// remains.
    async fn commit(
        &self,
        id: &str,
        file: &UploadedFile,
        prepared: PreparedFile,
    ) -> Result<FileRecord> {
        let location = self.store.submission_location(id, &prepared.extension);
        self.store
            .write(&location, &prepared.submission)
            .await
            .context("storing submission file")?;

        let preview = match prepared.thumbnail {
            Some((bytes, ext)) => {
                let thumb_location = self.store.thumbnail_location(id, &ext);
                if let Err(e) = self
                    .store
                    .write(&thumb_location, &bytes)
                    .await
                    .context("storing thumbnail")
                {
                    let _ = self.store.remove(&location).await;
                    return Err(e);
                }
                Some(thumb_location)
            }
            None => None,
        };

        let kind = FileKind::from_mime(&prepared.mime_type, &file.name);
        info!("stored {} at {location}", file.name);
        Ok(FileRecord {
            location,
            preview,
            name: file.name.clone(),
            size: prepared.submission.len() as u64,
            mime_type: prepared.mime_type,
            kind,
            ignored_accounts: Vec::new(),
        })
    }

    /// Store a generated file (e.g. a rendered fallback) without any
    /// transformation or thumbnail.
    pub async fn store_alongside(&self, id: &str, name: &str, bytes: Bytes) -> Result<FileRecord> {
        let extension =
            utils::file_extension(name).unwrap_or_else(|| "bin".to_string());
        let mime_type = utils::mime_for_extension(&extension).to_string();
        let location = self.store.submission_location(id, &extension);
        self.store
            .write(&location, &bytes)
            .await
            .context("storing generated file")?;

        Ok(FileRecord {
            location,
            preview: None,
            name: name.to_string(),
            size: bytes.len() as u64,
            kind: FileKind::from_mime(&mime_type, name),
            mime_type,
            ignored_accounts: Vec::new(),
        })
    }

    /// Remove every stored file a submission references, previews included.
    /// Locations that are already gone are skipped silently.
    pub async fn remove_submission_files(&self, submission: &FileSubmission) -> Result<()> {
        let mut removed = 0usize;
        for record in submission.all_records() {
            self.store.remove(&record.location).await?;
            removed += 1;
            if let Some(preview) = &record.preview {
                self.store.remove(preview).await?;
                removed += 1;
            }
        }
        info!(
            "removed {removed} stored files for submission {}",
            submission.id
        );
        Ok(())
    }

    /// Duplicate a stored file (and its preview) under fresh locations for a
    /// new submission id.
    pub async fn copy_with_new_id(&self, new_id: &str, record: &FileRecord) -> Result<FileRecord> {
        let extension = utils::file_extension(&record.location)
            .unwrap_or_else(|| utils::extension_for_mime(&record.mime_type).to_string());
        let location = self.store.submission_location(new_id, &extension);
        self.store
            .copy(&record.location, &location)
            .await
            .context("copying submission file")?;

        let preview = match &record.preview {
            Some(old) => {
                let ext = utils::file_extension(old).unwrap_or_else(|| "jpg".to_string());
                let new = self.store.thumbnail_location(new_id, &ext);
                self.store.copy(old, &new).await.context("copying thumbnail")?;
                Some(new)
            }
            None => None,
        };

        Ok(FileRecord {
            location,
            preview,
            ..record.clone()
        })
    }
}

/// Shrink `file` until it fits `max_bytes`, for destinations that cap
/// uploads. CPU-bound, so it runs on the blocking pool.
pub async fn scale_to_byte_limit(file: UploadedFile, max_bytes: u64) -> Result<UploadedFile> {
    if file.size() <= max_bytes {
        return Ok(file);
    }
    tokio::task::spawn_blocking(move || transform::scale_down_to_size(&file, max_bytes))
        .await
        .map_err(|e| Error::Other(format!("scaling task failed: {e}")))?
}
