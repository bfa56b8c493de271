//! Configuration loading and representation.
//!
//! Read from the process environment at startup:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `PANTRY_DATABASE_URL` | unset (in-memory) | Postgres connection string |
//! | `PANTRY_COLLECTION` | `inventory` | Collection the documents live in |
//! | `PANTRY_MUTATION_MODE` | `read-modify-write` | `read-modify-write` or `atomic` |
//! | `PANTRY_MAX_CONNECTIONS` | `5` | Postgres pool size |

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::inventory::{InventoryStore, MutationMode};
use crate::store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore, StoreError};

pub const DEFAULT_COLLECTION: &str = "inventory";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Where documents are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Process-local collection; lost on exit.
    InMemory,
    Postgres { url: String, max_connections: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: Backend,
    pub collection: String,
    pub mutation_mode: MutationMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::InMemory,
            collection: DEFAULT_COLLECTION.to_string(),
            mutation_mode: MutationMode::default(),
        }
    }
}

impl StoreConfig {
    /// Load from `PANTRY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source (used by `from_env` and tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |var: &str| get(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_connections = match non_empty("PANTRY_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| ConfigError::Invalid {
                var: "PANTRY_MAX_CONNECTIONS",
                reason: format!("expected a positive integer, got '{raw}'"),
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let backend = match non_empty("PANTRY_DATABASE_URL") {
            Some(url) => Backend::Postgres { url, max_connections },
            None => {
                tracing::warn!("PANTRY_DATABASE_URL not set; using in-memory document store");
                Backend::InMemory
            }
        };

        let collection = non_empty("PANTRY_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        let mutation_mode = match non_empty("PANTRY_MUTATION_MODE") {
            Some(raw) => raw.parse::<MutationMode>().map_err(|reason| ConfigError::Invalid {
                var: "PANTRY_MUTATION_MODE",
                reason,
            })?,
            None => MutationMode::default(),
        };

        Ok(Self {
            backend,
            collection,
            mutation_mode,
        })
    }

    /// Open the configured document store.
    ///
    /// For Postgres this connects the pool and creates the `documents` table
    /// if needed.
    pub async fn connect(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        match &self.backend {
            Backend::InMemory => Ok(Arc::new(InMemoryDocumentStore::new())),
            Backend::Postgres { url, max_connections } => {
                let pool = PgPoolOptions::new()
                    .max_connections(*max_connections)
                    .connect(url)
                    .await
                    .map_err(|e| StoreError::transport(format!("failed to connect to postgres: {e}")))?;

                let store = PostgresDocumentStore::new(pool, self.collection.clone());
                store.ensure_schema().await?;

                tracing::info!(collection = %self.collection, "connected to postgres document store");
                Ok(Arc::new(store))
            }
        }
    }

    /// Connect and wrap the store in an adapter using the configured mode.
    pub async fn open_inventory(&self) -> Result<InventoryStore<Arc<dyn DocumentStore>>, StoreError> {
        let store = self.connect().await?;
        Ok(InventoryStore::with_mode(store, self.mutation_mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<StoreConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        StoreConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn defaults_to_in_memory_inventory_collection() {
        let config = load(&[]).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.collection, "inventory");
        assert_eq!(config.mutation_mode, MutationMode::ReadModifyWrite);
    }

    #[test]
    fn reads_postgres_settings() {
        let config = load(&[
            ("PANTRY_DATABASE_URL", "postgres://localhost/pantry"),
            ("PANTRY_COLLECTION", "larder"),
            ("PANTRY_MUTATION_MODE", "atomic"),
            ("PANTRY_MAX_CONNECTIONS", "12"),
        ])
        .unwrap();

        assert_eq!(
            config.backend,
            Backend::Postgres {
                url: "postgres://localhost/pantry".to_string(),
                max_connections: 12,
            }
        );
        assert_eq!(config.collection, "larder");
        assert_eq!(config.mutation_mode, MutationMode::Atomic);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("PANTRY_DATABASE_URL", "  "), ("PANTRY_COLLECTION", "")]).unwrap();
        assert_eq!(config.backend, Backend::InMemory);
        assert_eq!(config.collection, DEFAULT_COLLECTION);
    }

    #[test]
    fn rejects_unknown_mode_and_bad_pool_size() {
        match load(&[("PANTRY_MUTATION_MODE", "eventual")]).unwrap_err() {
            ConfigError::Invalid { var, .. } => assert_eq!(var, "PANTRY_MUTATION_MODE"),
        }
        match load(&[("PANTRY_MAX_CONNECTIONS", "0")]).unwrap_err() {
            ConfigError::Invalid { var, .. } => assert_eq!(var, "PANTRY_MAX_CONNECTIONS"),
        }
    }

    #[tokio::test]
    async fn in_memory_config_opens_working_inventory() {
        let config = load(&[("PANTRY_MUTATION_MODE", "atomic")]).unwrap();
        let inventory = config.open_inventory().await.unwrap();
        assert_eq!(inventory.mode(), MutationMode::Atomic);

        let snapshot = inventory.add("oats").await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }
}
