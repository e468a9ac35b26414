use uuid::Uuid;

pub fn mb_to_bytes(mb: u64) -> u64 {
    mb * 1024 * 1024
}

/// Lower-cased extension of a filename, without the dot.
pub fn file_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/tiff" => "tiff",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "text/plain" => "txt",
        "application/pdf" => "pdf",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "audio/mpeg" => "mp3",
        _ => "bin",
    }
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tiff" => "image/tiff",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Random suffix for stored-file names. A full v4 uuid keeps the collision
/// probability negligible across repeated ingests of the same submission.
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn stored_file_name(id: &str, ext: &str) -> String {
    format!("{id}-{}.{ext}", short_id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mb_to_bytes() {
        assert_eq!(mb_to_bytes(1), 1_048_576);
        assert_eq!(mb_to_bytes(20), 20 * 1024 * 1024);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("story.TXT"), Some("txt".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension(".hidden"), None);
    }

    #[test]
    fn test_stored_file_name_is_unique_per_call() {
        let a = stored_file_name("sub1", "jpg");
        let b = stored_file_name("sub1", "jpg");
        assert!(a.starts_with("sub1-"));
        assert!(a.ends_with(".jpg"));
        assert_ne!(a, b);
    }
}
