use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::file_record::{FileKind, FileRecord};
use super::submission::parse_options;

/// Result of a login probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    pub logged_in: bool,
    pub username: Option<String>,
}

impl LoginResponse {
    pub fn logged_in(username: impl Into<String>) -> Self {
        Self {
            logged_in: true,
            username: Some(username.into()),
        }
    }

    pub fn logged_out() -> Self {
        Self::default()
    }
}

/// Per-platform upload limit, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct ScalingOptions {
    pub max_size: u64,
}

/// A stored file loaded back into memory for posting.
#[derive(Debug, Clone)]
pub struct PostedFile {
    pub name: String,
    pub mime_type: String,
    pub buffer: Bytes,
    pub kind: FileKind,
}

impl PostedFile {
    pub fn from_record(record: &FileRecord, buffer: Bytes) -> Self {
        Self {
            name: record.name.clone(),
            mime_type: record.mime_type.clone(),
            buffer,
            kind: record.kind,
        }
    }

    pub fn size(&self) -> u64 {
        self.buffer.len() as u64
    }
}

/// Everything an adapter needs to post one file submission to one account,
/// assembled by the dispatcher just before posting.
#[derive(Debug, Clone)]
pub struct FilePostData {
    pub submission_id: String,
    pub account_id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub primary: PostedFile,
    pub fallback: Option<PostedFile>,
    pub thumbnail: Option<PostedFile>,
    pub additional: Vec<PostedFile>,
    /// The destination's raw option bag; adapters parse their own view.
    pub options: serde_json::Value,
    /// The account's raw credential bag (webhook URLs and the like).
    pub account_data: serde_json::Value,
}

impl FilePostData {
    pub fn options<T: DeserializeOwned + Default>(&self) -> T {
        parse_options(&self.options)
    }

    pub fn account_data_as<T: DeserializeOwned + Default>(&self) -> T {
        parse_options(&self.account_data)
    }
}

/// Text-only variant of [`FilePostData`].
#[derive(Debug, Clone)]
pub struct PostData {
    pub submission_id: String,
    pub account_id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub options: serde_json::Value,
    pub account_data: serde_json::Value,
}

impl PostData {
    pub fn options<T: DeserializeOwned + Default>(&self) -> T {
        parse_options(&self.options)
    }

    pub fn account_data_as<T: DeserializeOwned + Default>(&self) -> T {
        parse_options(&self.account_data)
    }
}

/// Outcome of one accepted post attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    /// Canonical URL of the posted work, when the platform reports one.
    pub source: Option<String>,
    pub message: Option<String>,
    pub additional_info: Option<serde_json::Value>,
    pub posted_at: DateTime<Utc>,
}

impl PostResponse {
    pub fn new() -> Self {
        Self {
            source: None,
            message: None,
            additional_info: None,
            posted_at: Utc::now(),
        }
    }

    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::new()
        }
    }

    pub fn info(mut self, info: serde_json::Value) -> Self {
        self.additional_info = Some(info);
        self
    }
}

impl Default for PostResponse {
    fn default() -> Self {
        Self::new()
    }
}
