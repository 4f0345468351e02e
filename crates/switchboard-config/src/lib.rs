//! Persistent per-provider state: env bundles and session aliases.

mod error;
mod model;
mod store;

pub use error::ConfigStoreError;
pub use model::{CURRENT_SCHEMA_VERSION, ProviderStoredConfig, ProviderSessionBindings};
pub use store::{ConfigStore, sanitize_env};

/// Normalize a provider or agent identifier: trim plus lowercase.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}
