use log::warn;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::file_record::FileRecord;

/// A submission carrying files. `primary` is always present; `fallback` is
/// only meaningful when the primary is text (a substitute for platforms that
/// cannot take the text file itself).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSubmission {
    pub id: String,
    pub title: String,
    pub primary: FileRecord,
    #[serde(default)]
    pub fallback: Option<FileRecord>,
    #[serde(default)]
    pub thumbnail: Option<FileRecord>,
    #[serde(default)]
    pub additional: Vec<FileRecord>,
}

impl FileSubmission {
    /// All records owned by this submission, primary first.
    pub fn all_records(&self) -> Vec<&FileRecord> {
        let mut records = vec![&self.primary];
        records.extend(self.fallback.as_ref());
        records.extend(self.thumbnail.as_ref());
        records.extend(self.additional.iter());
        records
    }
}

/// A text-only (notification) submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub title: String,
}

/// Per-destination configuration: which account on which website, plus that
/// platform's option bag. Read-only during validation and dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionPart {
    pub account_id: String,
    pub website: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl SubmissionPart {
    pub fn new(account_id: impl Into<String>, website: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            website: website.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Typed view of the option bag. Unknown fields are ignored and missing
    /// fields take their defaults, so adapters only see what they recognize.
    pub fn options<T: DeserializeOwned + Default>(&self) -> T {
        parse_options(&self.data)
    }
}

/// Tolerant option-bag parse: a malformed bag degrades to defaults instead
/// of failing the destination.
pub fn parse_options<T: DeserializeOwned + Default>(data: &serde_json::Value) -> T {
    if data.is_null() {
        return T::default();
    }
    match serde_json::from_value(data.clone()) {
        Ok(options) => options,
        Err(e) => {
            warn!("malformed option bag, falling back to defaults: {e}");
            T::default()
        }
    }
}

/// Options common to every platform bag; adapters parse their own richer
/// structs from the same bag.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommonOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub auto_scale: Option<bool>,
}

impl CommonOptions {
    pub fn auto_scale(&self) -> bool {
        self.auto_scale.unwrap_or(true)
    }
}

/// Submission-wide defaults. Per-destination values override these when
/// present; tags extend rather than replace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl DefaultOptions {
    pub fn resolve_title(&self, part: &CommonOptions, submission_title: &str) -> String {
        part.title
            .clone()
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| submission_title.to_string())
    }

    pub fn resolve_description(&self, part: &CommonOptions) -> String {
        part.description
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_default()
    }

    pub fn resolve_tags(&self, part: &CommonOptions) -> Vec<String> {
        let mut tags = self.tags.clone();
        for tag in &part.tags {
            if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                tags.push(tag.clone());
            }
        }
        tags
    }
}
