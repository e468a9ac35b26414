use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Broad content family of a file, derived from its declared mime type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Image,
    Text,
    Video,
    Audio,
    #[default]
    Unknown,
}

impl FileKind {
    pub fn from_mime(mime: &str, filename: &str) -> Self {
        if mime.starts_with("image/") {
            FileKind::Image
        } else if mime.starts_with("text/") || filename.to_ascii_lowercase().ends_with(".txt") {
            FileKind::Text
        } else if mime.starts_with("video/") {
            FileKind::Video
        } else if mime.starts_with("audio/") {
            FileKind::Audio
        } else {
            FileKind::Unknown
        }
    }
}

/// A file handed over by the host, not yet ingested. The buffer is owned by
/// the caller until ingestion stores it.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub buffer: Bytes,
}

impl UploadedFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        buffer: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            buffer: buffer.into(),
        }
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_mime(&self.mime_type, &self.name)
    }

    pub fn size(&self) -> u64 {
        self.buffer.len() as u64
    }
}

/// Metadata of an ingested file: where the stored submission file and its
/// thumbnail live, plus what the file is. Copied by value into submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub location: String,
    #[serde(default)]
    pub preview: Option<String>,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub kind: FileKind,
    /// Account ids this file is excluded from; only consulted for files in
    /// a submission's `additional` list.
    #[serde(default)]
    pub ignored_accounts: Vec<String>,
}

impl FileRecord {
    pub fn is_ignored_for(&self, account_id: &str) -> bool {
        self.ignored_accounts.iter().any(|id| id == account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mime() {
        assert_eq!(FileKind::from_mime("image/png", "a.png"), FileKind::Image);
        assert_eq!(FileKind::from_mime("text/plain", "a.txt"), FileKind::Text);
        assert_eq!(
            FileKind::from_mime("application/octet-stream", "story.TXT"),
            FileKind::Text
        );
        assert_eq!(FileKind::from_mime("video/mp4", "a.mp4"), FileKind::Video);
        assert_eq!(
            FileKind::from_mime("application/pdf", "a.pdf"),
            FileKind::Unknown
        );
    }

    #[test]
    fn test_ignored_accounts() {
        let record = FileRecord {
            location: "subs/x.png".into(),
            preview: None,
            name: "x.png".into(),
            mime_type: "image/png".into(),
            size: 10,
            kind: FileKind::Image,
            ignored_accounts: vec!["acc-2".into()],
        };
        assert!(record.is_ignored_for("acc-2"));
        assert!(!record.is_ignored_for("acc-1"));
    }
}
