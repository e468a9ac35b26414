use std::collections::HashMap;
use std::sync::Arc;

use super::{Aryion, Discord, Website};
use crate::error::{Error, Result};
use crate::http::ReqwestTransport;

/// Maps platform keys to their adapter instances. Adapters are registered
/// once at startup; lookups hand out shared references.
#[derive(Clone)]
pub struct WebsiteRegistry {
    websites: HashMap<String, Arc<dyn Website>>,
}

impl WebsiteRegistry {
    pub fn new() -> Self {
        Self {
            websites: HashMap::new(),
        }
    }

    /// Registry with the built-in adapter catalog, all sharing one
    /// transport.
    pub fn standard() -> Self {
        let transport = ReqwestTransport::new();
        let mut registry = Self::new();
        registry.register(Arc::new(Discord::new(transport.clone())));
        registry.register(Arc::new(Aryion::new(transport)));
        registry
    }

    pub fn register(&mut self, website: Arc<dyn Website>) {
        self.websites.insert(website.name().to_string(), website);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Website>> {
        self.websites.get(key).cloned()
    }

    pub fn resolve(&self, key: &str) -> Result<Arc<dyn Website>> {
        self.get(key)
            .ok_or_else(|| Error::UnknownWebsite(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.websites.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.websites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.websites.is_empty()
    }
}

impl Default for WebsiteRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_ships_builtin_adapters() {
        let registry = WebsiteRegistry::default();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("discord").is_some());
        assert!(registry.get("aryion").is_some());
    }

    #[test]
    fn test_resolve_unknown_key() {
        let registry = WebsiteRegistry::new();
        assert!(matches!(
            registry.resolve("nowhere"),
            Err(Error::UnknownWebsite(_))
        ));
    }
}
