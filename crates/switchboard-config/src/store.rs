//! File-backed store for provider env bundles and session bindings.

use crate::error::ConfigStoreError;
use crate::model::{CURRENT_SCHEMA_VERSION, ProviderStoredConfig, ProviderSessionBindings};
use crate::normalize_id;
use directories::BaseDirs;
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const STATE_DIR: &str = ".switchboard";
const PROVIDERS_DIR: &str = "providers";
const CONFIG_FILE: &str = "config.json";
const SESSIONS_DIR: &str = "sessions";

/// On-disk store scoped to one state root.
///
/// There is no cross-process locking here; each provider or
/// (provider, agent) scope is expected to have one logical owner at a
/// time and last-writer-wins at the file level.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    /// Create a store rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store at the default per-user state root.
    pub fn at_default_root() -> Result<Self, ConfigStoreError> {
        let root = match BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(STATE_DIR),
            None => std::env::current_dir()?.join(STATE_DIR),
        };
        Ok(Self::new(root))
    }

    /// Root directory backing this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn provider_config_path(&self, provider_id: &str) -> PathBuf {
        self.root
            .join(PROVIDERS_DIR)
            .join(provider_id)
            .join(CONFIG_FILE)
    }

    fn session_bindings_path(&self, provider_id: &str, agent_id: &str) -> PathBuf {
        self.root
            .join(PROVIDERS_DIR)
            .join(provider_id)
            .join(SESSIONS_DIR)
            .join(format!("{agent_id}.json"))
    }

    /// Load the stored config for a provider, if any.
    ///
    /// Fails when the record is malformed, fails schema validation,
    /// or names a different provider than the one requested.
    pub fn provider_config(
        &self,
        provider_id: &str,
    ) -> Result<Option<ProviderStoredConfig>, ConfigStoreError> {
        let provider_id = normalize_id(provider_id);
        let path = self.provider_config_path(&provider_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ConfigStoreError::Io(err)),
        };

        let value: Value = serde_json::from_str(&contents).map_err(|err| {
            ConfigStoreError::invalid(&provider_id, format!("malformed JSON: {err}"))
        })?;
        validate_provider_config(&provider_id, &value)?;
        let config: ProviderStoredConfig = serde_json::from_value(value)
            .map_err(|err| ConfigStoreError::invalid(&provider_id, err.to_string()))?;
        Ok(Some(config))
    }

    /// Write env for a provider, merging into existing env unless
    /// `replace` is set. Keys and values are trimmed; entries that
    /// become empty are dropped before the merge.
    pub fn set_provider_config(
        &self,
        provider_id: &str,
        env: &BTreeMap<String, String>,
        replace: bool,
    ) -> Result<ProviderStoredConfig, ConfigStoreError> {
        let provider_id = normalize_id(provider_id);
        let incoming = sanitize_env(env);

        let mut merged = if replace {
            BTreeMap::new()
        } else {
            self.provider_config(&provider_id)?
                .map(|config| config.env)
                .unwrap_or_default()
        };
        merged.extend(incoming);

        let config = ProviderStoredConfig {
            schema_version: CURRENT_SCHEMA_VERSION,
            provider_id: provider_id.clone(),
            env: merged,
            updated_at: chrono::Utc::now().to_rfc3339(),
        };
        let path = self.provider_config_path(&provider_id);
        write_json_atomic(&path, &config)?;
        debug!(
            "stored provider config (provider_id={}, keys={}, replace={})",
            provider_id,
            config.env.len(),
            replace
        );
        Ok(config)
    }

    /// Resolve the env an invocation of this provider receives:
    /// persisted env with the override layered on top, override wins
    /// key by key. Ambient process env is the caller's concern and is
    /// expected to be captured once at the invocation boundary.
    pub fn resolve_provider_env(
        &self,
        provider_id: &str,
        override_env: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, ConfigStoreError> {
        let mut env = self
            .provider_config(provider_id)?
            .map(|config| config.env)
            .unwrap_or_default();
        for (key, value) in override_env {
            env.insert(key.clone(), value.clone());
        }
        Ok(env)
    }

    /// Load the session-bindings table for a (provider, agent) pair.
    ///
    /// A missing or corrupt file self-heals to a fresh empty table;
    /// only hard IO failures surface as errors.
    pub fn session_bindings(
        &self,
        provider_id: &str,
        agent_id: &str,
    ) -> Result<ProviderSessionBindings, ConfigStoreError> {
        let provider_id = normalize_id(provider_id);
        let agent_id = normalize_id(agent_id);
        let path = self.session_bindings_path(&provider_id, &agent_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProviderSessionBindings::empty(&provider_id, &agent_id));
            }
            Err(err) => return Err(ConfigStoreError::Io(err)),
        };

        match serde_json::from_str::<ProviderSessionBindings>(&contents) {
            Ok(bindings) if bindings.schema_version == CURRENT_SCHEMA_VERSION => Ok(bindings),
            Ok(bindings) => {
                warn!(
                    "discarding session bindings with unexpected schema (provider_id={}, agent_id={}, schema_version={})",
                    provider_id, agent_id, bindings.schema_version
                );
                Ok(ProviderSessionBindings::empty(&provider_id, &agent_id))
            }
            Err(err) => {
                warn!(
                    "discarding corrupt session bindings (provider_id={}, agent_id={}): {err}",
                    provider_id, agent_id
                );
                Ok(ProviderSessionBindings::empty(&provider_id, &agent_id))
            }
        }
    }

    /// Persist a session-bindings table, skipping the write when the
    /// alias map is unchanged on disk. Returns whether a write
    /// happened.
    pub fn write_session_bindings(
        &self,
        bindings: &ProviderSessionBindings,
    ) -> Result<bool, ConfigStoreError> {
        let current = self.session_bindings(&bindings.provider_id, &bindings.agent_id)?;
        if current.bindings == bindings.bindings {
            debug!(
                "session bindings unchanged, skipping write (provider_id={}, agent_id={})",
                bindings.provider_id, bindings.agent_id
            );
            return Ok(false);
        }

        let record = ProviderSessionBindings {
            schema_version: CURRENT_SCHEMA_VERSION,
            provider_id: normalize_id(&bindings.provider_id),
            agent_id: normalize_id(&bindings.agent_id),
            updated_at: chrono::Utc::now().to_rfc3339(),
            bindings: bindings.bindings.clone(),
        };
        let path = self.session_bindings_path(&record.provider_id, &record.agent_id);
        write_json_atomic(&path, &record)?;
        debug!(
            "wrote session bindings (provider_id={}, agent_id={}, entries={})",
            record.provider_id,
            record.agent_id,
            record.bindings.len()
        );
        Ok(true)
    }
}

/// Trim keys and values, dropping entries that trim to empty.
pub fn sanitize_env(env: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    env.iter()
        .filter_map(|(key, value)| {
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Validate the raw shape of a provider config record.
fn validate_provider_config(provider_id: &str, value: &Value) -> Result<(), ConfigStoreError> {
    let object = value
        .as_object()
        .ok_or_else(|| ConfigStoreError::invalid(provider_id, "record is not an object"))?;

    match object.get("schemaVersion").and_then(Value::as_u64) {
        Some(version) if version == u64::from(CURRENT_SCHEMA_VERSION) => {}
        Some(version) => {
            return Err(ConfigStoreError::invalid(
                provider_id,
                format!("unsupported schemaVersion {version}"),
            ));
        }
        None => {
            return Err(ConfigStoreError::invalid(
                provider_id,
                "missing schemaVersion",
            ));
        }
    }

    if !object.get("env").is_some_and(Value::is_object) {
        return Err(ConfigStoreError::invalid(provider_id, "env is not an object"));
    }
    let stored_id = object
        .get("providerId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ConfigStoreError::invalid(provider_id, "missing providerId"))?;
    if normalize_id(stored_id) != provider_id {
        return Err(ConfigStoreError::invalid(
            provider_id,
            format!("record belongs to provider '{stored_id}'"),
        ));
    }
    let updated_at_present = object
        .get("updatedAt")
        .and_then(Value::as_str)
        .is_some_and(|stamp| !stamp.trim().is_empty());
    if !updated_at_present {
        return Err(ConfigStoreError::invalid(provider_id, "missing updatedAt"));
    }
    Ok(())
}

/// Serialize a record and write it via temp-file-then-rename so
/// readers never observe a partial file.
fn write_json_atomic<T: serde::Serialize>(path: &Path, record: &T) -> Result<(), ConfigStoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| ConfigStoreError::Io(std::io::Error::other("store path has no parent")))?;
    fs::create_dir_all(parent)?;

    let serialized = serde_json::to_string_pretty(record)?;
    let temp = path.with_extension("json.tmp");
    fs::write(&temp, serialized)?;
    fs::rename(&temp, path)?;
    Ok(())
}
