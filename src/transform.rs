pub mod pool;

pub use pool::{TransformJob, TransformOutput, TransformPool};

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::models::UploadedFile;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("buffer could not be decoded: {0}")]
    Decode(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("no transform support for {0}")]
    UnsupportedFormat(String),

    #[error("timed out waiting for a transform worker")]
    PoolTimeout,

    #[error("transform pool is closed")]
    PoolClosed,

    #[error("transform worker failed: {0}")]
    Worker(String),
}

/// Mime types the engine can decode and re-encode. Gif is deliberately
/// absent: re-encoding would drop animation, so gifs bypass transformation.
pub fn supports_mime(mime: &str) -> bool {
    matches!(
        mime,
        "image/jpeg" | "image/jpg" | "image/png" | "image/tiff" | "image/webp" | "image/bmp"
    )
}

pub fn format_for_mime(mime: &str) -> Option<ImageFormat> {
    match mime {
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/png" => Some(ImageFormat::Png),
        "image/gif" => Some(ImageFormat::Gif),
        "image/tiff" => Some(ImageFormat::Tiff),
        "image/webp" => Some(ImageFormat::WebP),
        "image/bmp" => Some(ImageFormat::Bmp),
        _ => None,
    }
}

pub fn mime_for_format(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        _ => "application/octet-stream",
    }
}

pub(crate) fn decode(buffer: &[u8]) -> std::result::Result<DynamicImage, TransformError> {
    ImageReader::new(Cursor::new(buffer))
        .with_guessed_format()
        .map_err(|e| TransformError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| TransformError::Decode(e.to_string()))
}

pub(crate) fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    quality: Option<u8>,
) -> std::result::Result<Vec<u8>, TransformError> {
    let mut cursor = Cursor::new(Vec::new());
    let encoded = match format {
        ImageFormat::Jpeg => {
            // Jpeg carries no alpha channel.
            let rgb = image.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut cursor, quality.unwrap_or(100));
            rgb.write_with_encoder(encoder)
        }
        _ => image.write_to(&mut cursor, format),
    };
    encoded.map_err(|e| TransformError::Encode(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Downscale so neither dimension exceeds `max_px`, keeping aspect ratio.
/// Images already within bounds pass through unchanged.
pub(crate) fn shrink_to(image: DynamicImage, max_px: u32) -> DynamicImage {
    if image.width() <= max_px && image.height() <= max_px {
        image
    } else {
        image.resize(max_px, max_px, FilterType::Lanczos3)
    }
}

/// Scale an image so its controlling axis fits `max_px`: wide and square
/// images are controlled by width, tall ones by height. A file already
/// within bounds is returned as-is (same buffer). Scaled output is
/// re-encoded as jpeg at quality 100; the input is never mutated.
pub fn scale_to_fit(file: &UploadedFile, max_px: u32) -> Result<UploadedFile> {
    let image = decode(&file.buffer)?;
    let (width, height) = (image.width(), image.height());
    let ratio = width as f64 / height as f64;

    let (new_width, new_height) = if ratio >= 1.0 {
        if width <= max_px {
            return Ok(file.clone());
        }
        (max_px, ((max_px as f64 / ratio).round() as u32).max(1))
    } else {
        if height <= max_px {
            return Ok(file.clone());
        }
        (((max_px as f64 * ratio).round() as u32).max(1), max_px)
    };

    let scaled = image.resize_exact(new_width, new_height, FilterType::Lanczos3);
    let buffer = encode(&scaled, ImageFormat::Jpeg, Some(100))?;
    Ok(UploadedFile {
        name: file.name.clone(),
        mime_type: "image/jpeg".to_string(),
        buffer: Bytes::from(buffer),
    })
}

/// Repeatedly shrink an image until its encoded size fits `max_bytes`.
/// Pixel budget drops by 10% per round; giving up below a small floor keeps
/// a hopeless budget from looping forever.
pub fn scale_down_to_size(file: &UploadedFile, max_bytes: u64) -> Result<UploadedFile> {
    if file.size() <= max_bytes {
        return Ok(file.clone());
    }

    let image = decode(&file.buffer)?;
    let mut px = image.width().max(image.height());
    let mut current = file.clone();
    while current.size() > max_bytes {
        px = (px as f64 * 0.9) as u32;
        if px < 16 {
            return Err(Error::Other(format!(
                "cannot scale {} under {max_bytes} bytes",
                file.name
            )));
        }
        current = scale_to_fit(&current, px)?;
    }
    Ok(current)
}

#[cfg(test)]
pub(crate) fn test_image_bytes(width: u32, height: u32, format: ImageFormat) -> Bytes {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 31 % 256) as u8, (y * 17 % 256) as u8, ((x + y) % 256) as u8])
    });
    let encoded = encode(&DynamicImage::ImageRgb8(img), format, Some(100)).unwrap();
    Bytes::from(encoded)
}
