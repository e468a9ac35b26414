use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::submission::parse_options;

/// One configured account on one website. `data` is the platform credential
/// bag (webhook URLs, session markers); storing and protecting it is the
/// host's job, this crate only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub website: String,
    pub alias: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        website: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            website: website.into(),
            alias: alias.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Typed view of the credential bag, tolerant of missing fields.
    pub fn data_as<T: DeserializeOwned + Default>(&self) -> T {
        parse_options(&self.data)
    }
}
