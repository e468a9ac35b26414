use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::file_store::FileStore;
use crate::utils;

/// In-memory [`FileStore`] with the same location layout as the real one.
#[derive(Debug, Clone, Default)]
pub struct MockFileStore {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl MockFileStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, location: &str) -> Option<Bytes> {
        self.files.lock().unwrap().get(location).cloned()
    }

    pub fn put(&self, location: &str, bytes: impl Into<Bytes>) {
        self.files
            .lock()
            .unwrap()
            .insert(location.to_string(), bytes.into());
    }

    pub fn stored_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

impl FileStore for MockFileStore {
    async fn write(&self, location: &str, bytes: &[u8]) -> Result<()> {
        self.put(location, Bytes::copy_from_slice(bytes));
        Ok(())
    }

    async fn read(&self, location: &str) -> Result<Bytes> {
        self.get(location)
            .ok_or_else(|| Error::Other(format!("no stored file at {location}")))
    }

    async fn remove(&self, location: &str) -> Result<()> {
        self.files.lock().unwrap().remove(location);
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let bytes = self.read(src).await?;
        self.put(dst, bytes);
        Ok(())
    }

    fn submission_location(&self, id: &str, ext: &str) -> String {
        format!("subs/{}", utils::stored_file_name(id, ext))
    }

    fn thumbnail_location(&self, id: &str, ext: &str) -> String {
        format!("thumbs/{}", utils::stored_file_name(id, ext))
    }
}
