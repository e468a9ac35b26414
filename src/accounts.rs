use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::{StreamExt, stream};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Account, LoginResponse};
use crate::websites::WebsiteRegistry;
use crate::websites::folder_tree::Folder;

/// Platform-side knowledge about one account, refreshed opportunistically by
/// login probes. Stale entries are acceptable until the next probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    pub username: Option<String>,
    pub folders: Vec<Folder>,
}

/// Account-id-keyed cache of [`AccountInfo`], owned by the engine layer and
/// handed into adapter calls by reference. Adapters themselves stay
/// stateless.
#[derive(Debug, Clone, Default)]
pub struct AccountInfoStore {
    inner: Arc<Mutex<HashMap<String, AccountInfo>>>,
}

impl AccountInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached info for `account_id`, empty defaults when nothing is known.
    pub fn get(&self, account_id: &str) -> Result<AccountInfo> {
        let inner = self.inner.lock()?;
        Ok(inner.get(account_id).cloned().unwrap_or_default())
    }

    pub fn set(&self, account_id: &str, info: AccountInfo) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.insert(account_id.to_string(), info);
        Ok(())
    }
}

/// Probes login state for configured accounts and keeps the info store
/// fresh. A probe failure marks that account logged out; it never aborts the
/// batch.
#[derive(Clone)]
pub struct LoginMonitor {
    registry: Arc<WebsiteRegistry>,
    info: AccountInfoStore,
    fanout: usize,
}

impl LoginMonitor {
    pub fn new(registry: Arc<WebsiteRegistry>, info: AccountInfoStore, fanout: usize) -> Self {
        Self {
            registry,
            info,
            fanout: fanout.max(1),
        }
    }

    pub async fn check_one(&self, account: &Account) -> LoginResponse {
        let Some(site) = self.registry.get(&account.website) else {
            warn!(
                "no adapter for website {} (account {})",
                account.website, account.id
            );
            return LoginResponse::logged_out();
        };

        match site.check_login(account).await {
            Ok((login, info)) => {
                info!(
                    "account {} on {}: logged_in={}",
                    account.id, account.website, login.logged_in
                );
                if login.logged_in
                    && let Err(e) = self.info.set(&account.id, info)
                {
                    warn!("could not cache account info for {}: {e}", account.id);
                }
                login
            }
            Err(e) => {
                warn!(
                    "login probe failed for account {} on {}: {e}",
                    account.id, account.website
                );
                LoginResponse::logged_out()
            }
        }
    }

    pub async fn check_all(&self, accounts: &[Account]) -> HashMap<String, LoginResponse> {
        stream::iter(accounts)
            .map(|account| async move { (account.id.clone(), self.check_one(account).await) })
            .buffer_unordered(self.fanout)
            .collect()
            .await
    }
}
