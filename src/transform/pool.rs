use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use image::ImageFormat;
use log::debug;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use super::{TransformError, decode, encode, format_for_mime, mime_for_format, shrink_to};
use crate::config::Config;

/// Bounded executor for image transforms. At most `workers` jobs decode and
/// encode at the same time; further callers queue on the semaphore. Permits
/// are only held inside `materialize`, so a job descriptor that is dropped
/// without materializing cannot distort the accounting.
#[derive(Debug, Clone)]
pub struct TransformPool {
    permits: Arc<Semaphore>,
    wait_timeout: Duration,
}

impl TransformPool {
    pub fn new(workers: usize, wait_timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            wait_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.transform_workers,
            Duration::from_secs(config.transform_wait_secs),
        )
    }

    /// Start describing a transform of `buffer`. Nothing runs until
    /// [`TransformJob::materialize`] is awaited.
    pub fn acquire(&self, buffer: Bytes, mime_type: &str) -> TransformJob {
        TransformJob {
            pool: self.clone(),
            buffer,
            mime_type: mime_type.to_string(),
            max_dimension: None,
            quality: None,
            convert_to: None,
        }
    }
}

/// Immutable description of one transform: optional downscale bound,
/// encoder quality and target format, consumed by a single `materialize`.
#[must_use]
#[derive(Debug, Clone)]
pub struct TransformJob {
    pool: TransformPool,
    buffer: Bytes,
    mime_type: String,
    max_dimension: Option<u32>,
    quality: Option<u8>,
    convert_to: Option<ImageFormat>,
}

#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub buffer: Bytes,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl TransformJob {
    pub fn resize(mut self, max_dimension: u32) -> Self {
        self.max_dimension = Some(max_dimension);
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality.min(100));
        self
    }

    pub fn convert_to(mut self, format: ImageFormat) -> Self {
        self.convert_to = Some(format);
        self
    }

    /// Wait for a worker slot, then decode, transform and re-encode on the
    /// blocking pool. The slot is released on every exit path.
    pub async fn materialize(self) -> Result<TransformOutput, TransformError> {
        let permit = timeout(self.pool.wait_timeout, self.pool.permits.clone().acquire_owned())
            .await
            .map_err(|_| TransformError::PoolTimeout)?
            .map_err(|_| TransformError::PoolClosed)?;

        let TransformJob {
            buffer,
            mime_type,
            max_dimension,
            quality,
            convert_to,
            ..
        } = self;

        let target = match convert_to {
            Some(format) => format,
            None => format_for_mime(&mime_type)
                .ok_or_else(|| TransformError::UnsupportedFormat(mime_type.clone()))?,
        };

        let output = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let image = decode(&buffer)?;
            let image = match max_dimension {
                Some(px) => shrink_to(image, px),
                None => image,
            };
            let encoded = encode(&image, target, quality)?;
            Ok(TransformOutput {
                width: image.width(),
                height: image.height(),
                buffer: Bytes::from(encoded),
                mime_type: mime_for_format(target).to_string(),
            })
        })
        .await
        .map_err(|e| TransformError::Worker(e.to_string()))??;

        debug!(
            "transformed {mime_type} -> {} ({}x{}, {} bytes)",
            output.mime_type,
            output.width,
            output.height,
            output.buffer.len()
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::test_image_bytes;
    use futures::future::join_all;

    fn pool() -> TransformPool {
        TransformPool::new(2, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_resize_and_reencode() {
        let buffer = test_image_bytes(600, 400, ImageFormat::Png);
        let out = pool()
            .acquire(buffer, "image/png")
            .resize(300)
            .materialize()
            .await
            .unwrap();
        assert!(out.width <= 300 && out.height <= 300);
        assert_eq!(out.mime_type, "image/png");
        assert!(image::load_from_memory(&out.buffer).is_ok());
    }

    #[tokio::test]
    async fn test_convert_to_jpeg_with_quality() {
        let buffer = test_image_bytes(64, 64, ImageFormat::Png);
        let out = pool()
            .acquire(buffer, "image/png")
            .quality(99)
            .convert_to(ImageFormat::Jpeg)
            .materialize()
            .await
            .unwrap();
        assert_eq!(out.mime_type, "image/jpeg");
        let decoded = image::load_from_memory(&out.buffer).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[tokio::test]
    async fn test_within_bounds_not_upscaled() {
        let buffer = test_image_bytes(100, 50, ImageFormat::Png);
        let out = pool()
            .acquire(buffer, "image/png")
            .resize(300)
            .materialize()
            .await
            .unwrap();
        assert_eq!((out.width, out.height), (100, 50));
    }

    #[tokio::test]
    async fn test_decode_failure_surfaces() {
        let result = pool()
            .acquire(Bytes::from_static(b"not an image"), "image/png")
            .materialize()
            .await;
        assert!(matches!(result, Err(TransformError::Decode(_))));
    }

    #[tokio::test]
    async fn test_unsupported_mime_without_target() {
        let result = pool()
            .acquire(Bytes::from_static(b"x"), "application/pdf")
            .materialize()
            .await;
        assert!(matches!(result, Err(TransformError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn test_queue_wait_times_out_when_workers_are_busy() {
        let pool = TransformPool::new(1, Duration::from_millis(50));
        let _held = pool.permits.clone().acquire_owned().await.unwrap();

        let result = pool
            .acquire(test_image_bytes(32, 32, ImageFormat::Png), "image/png")
            .materialize()
            .await;
        assert!(matches!(result, Err(TransformError::PoolTimeout)));
    }

    #[tokio::test]
    async fn test_permits_released_after_jobs() {
        let pool = pool();
        let jobs: Vec<_> = (0..8)
            .map(|_| {
                pool.acquire(test_image_bytes(64, 64, ImageFormat::Png), "image/png")
                    .resize(32)
                    .materialize()
            })
            .collect();
        for result in join_all(jobs).await {
            result.unwrap();
        }
        assert_eq!(pool.permits.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_dropped_job_holds_no_permit() {
        let pool = pool();
        let job = pool.acquire(test_image_bytes(32, 32, ImageFormat::Png), "image/png");
        drop(job);
        assert_eq!(pool.permits.available_permits(), 2);
    }
}
