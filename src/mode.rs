//! Operating mode — manual vs auto dispatch, persisted across restarts.
//!
//! Replaces a process-global flag with a service object passed into the
//! dispatcher. The in-memory value is the source of truth for reads; every
//! mutation also writes through to the settings table so a restart resumes
//! the configured mode.

use std::str::FromStr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::Store;

/// Settings key under which the mode is persisted.
const MODE_KEY: &str = "mode";

/// Whether replies are actually transmitted or only queued for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    #[default]
    Manual,
    Auto,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Manual => "manual",
            OperatingMode::Auto => "auto",
        }
    }
}

impl FromStr for OperatingMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(OperatingMode::Auto),
            "manual" => Ok(OperatingMode::Manual),
            _ => Err(()),
        }
    }
}

/// Shared, persisted operating mode.
pub struct ModeService {
    current: RwLock<OperatingMode>,
    store: Arc<dyn Store>,
}

impl ModeService {
    /// Load the persisted mode from the store, defaulting to Manual.
    pub async fn load(store: Arc<dyn Store>) -> Result<Self, StoreError> {
        let mode = store
            .get_setting(MODE_KEY)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        Ok(Self {
            current: RwLock::new(mode),
            store,
        })
    }

    /// Current mode. Lock-scoped read; never stale across tasks.
    pub fn get(&self) -> OperatingMode {
        *self.current.read().expect("mode lock poisoned")
    }

    /// Update the mode and persist it.
    pub async fn set(&self, mode: OperatingMode) -> Result<(), StoreError> {
        self.store.set_setting(MODE_KEY, mode.as_str()).await?;
        *self.current.write().expect("mode lock poisoned") = mode;
        tracing::info!(mode = mode.as_str(), "Operating mode updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlStore;

    #[tokio::test]
    async fn defaults_to_manual() {
        let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let svc = ModeService::load(store).await.unwrap();
        assert_eq!(svc.get(), OperatingMode::Manual);
    }

    #[tokio::test]
    async fn set_is_visible_and_persisted() {
        let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());

        let svc = ModeService::load(Arc::clone(&store)).await.unwrap();
        svc.set(OperatingMode::Auto).await.unwrap();
        assert_eq!(svc.get(), OperatingMode::Auto);

        // A fresh service over the same store resumes the configured mode.
        let svc2 = ModeService::load(store).await.unwrap();
        assert_eq!(svc2.get(), OperatingMode::Auto);
    }

    #[tokio::test]
    async fn garbage_persisted_value_falls_back_to_manual() {
        let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        store.set_setting("mode", "turbo").await.unwrap();
        let svc = ModeService::load(store).await.unwrap();
        assert_eq!(svc.get(), OperatingMode::Manual);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("AUTO".parse::<OperatingMode>(), Ok(OperatingMode::Auto));
        assert_eq!("Manual".parse::<OperatingMode>(), Ok(OperatingMode::Manual));
        assert!("other".parse::<OperatingMode>().is_err());
    }

    #[test]
    fn mode_serde_wire_form() {
        assert_eq!(
            serde_json::to_string(&OperatingMode::Auto).unwrap(),
            "\"auto\""
        );
        let m: OperatingMode = serde_json::from_str("\"manual\"").unwrap();
        assert_eq!(m, OperatingMode::Manual);
    }
}
