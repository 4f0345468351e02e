//! Provider registry: id to factory mapping with capability
//! metadata and memoized instantiation.

use crate::error::CoreError;
use crate::provider::{Provider, ProviderError};
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use switchboard_config::normalize_id;
use switchboard_protocol::{ProviderCapabilities, ProviderKind};
use tokio::sync::OnceCell;

use async_trait::async_trait;

/// Capability metadata for a registered provider.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Stable lowercase provider id.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Backend archetype.
    pub kind: ProviderKind,
    /// Declared capability flags.
    pub capabilities: ProviderCapabilities,
}

/// Setup guidance surfaced for a provider.
#[derive(Debug, Clone)]
pub struct OnboardingSpec {
    /// Short setup summary.
    pub summary: String,
    /// Env keys a working installation needs.
    pub required_env: Vec<String>,
    /// Optional documentation link.
    pub docs_url: Option<String>,
}

/// Factory that builds one live provider instance on demand.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn Provider>, ProviderError>;
}

/// Everything supplied when registering a provider.
pub struct ProviderRegistration {
    /// Capability metadata.
    pub info: ProviderInfo,
    /// Optional onboarding guidance.
    pub onboarding: Option<OnboardingSpec>,
    /// Instance factory.
    pub factory: Arc<dyn ProviderFactory>,
}

struct RegistryEntry {
    registration: ProviderRegistration,
    // Memoizes the in-flight factory future, not just its result, so
    // concurrent first callers share one initialization.
    instance: OnceCell<Arc<dyn Provider>>,
}

/// In-process provider registry. Registration order defines override
/// precedence: registering a duplicate id replaces the earlier entry
/// (last registration wins) and resets its memoized instance.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: RwLock<HashMap<String, Arc<RegistryEntry>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its normalized id.
    pub fn register(&self, mut registration: ProviderRegistration) {
        let id = normalize_id(&registration.info.id);
        registration.info.id = id.clone();
        let replaced = self
            .entries
            .write()
            .insert(
                id.clone(),
                Arc::new(RegistryEntry {
                    registration,
                    instance: OnceCell::new(),
                }),
            )
            .is_some();
        if replaced {
            info!("provider registration replaced (provider_id={id})");
        } else {
            debug!("provider registered (provider_id={id})");
        }
    }

    /// Whether a provider id is registered.
    pub fn contains(&self, provider_id: &str) -> bool {
        self.entries.read().contains_key(&normalize_id(provider_id))
    }

    /// Return the memoized instance for a provider, building it on
    /// first use. Repeated calls return semantically equivalent,
    /// independently operable instances; providers are stateless and
    /// callers must not rely on any stronger identity.
    pub async fn create(&self, provider_id: &str) -> Result<Arc<dyn Provider>, CoreError> {
        let normalized = normalize_id(provider_id);
        if normalized.is_empty() {
            return Err(CoreError::provider_not_found(provider_id));
        }
        let entry = self
            .entries
            .read()
            .get(&normalized)
            .cloned()
            .ok_or_else(|| CoreError::provider_not_found(normalized.clone()))?;

        let instance = entry
            .instance
            .get_or_try_init(|| entry.registration.factory.create())
            .await?;
        Ok(instance.clone())
    }

    /// Capability metadata for every registered provider, ordered by
    /// id.
    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        let mut infos: Vec<ProviderInfo> = self
            .entries
            .read()
            .values()
            .map(|entry| entry.registration.info.clone())
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Onboarding guidance for a provider, if registered with any.
    pub fn onboarding(&self, provider_id: &str) -> Option<OnboardingSpec> {
        self.entries
            .read()
            .get(&normalize_id(provider_id))
            .and_then(|entry| entry.registration.onboarding.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{ProviderFactory, ProviderInfo, ProviderRegistration, ProviderRegistry};
    use crate::error::CoreError;
    use crate::provider::{InvokeOptions, InvokeOutputSink, Provider, ProviderError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchboard_protocol::{InvokeOutcome, ProviderCapabilities, ProviderKind};

    struct FixedProvider {
        id: String,
        stdout: String,
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn id(&self) -> &str {
            &self.id
        }

        fn display_name(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Cli
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities::default()
        }

        async fn invoke(
            &self,
            _options: InvokeOptions,
            _sink: Option<&mut (dyn InvokeOutputSink + Send + '_)>,
        ) -> Result<InvokeOutcome, ProviderError> {
            Ok(InvokeOutcome {
                code: Some(0),
                stdout: self.stdout.clone(),
                ..InvokeOutcome::default()
            })
        }
    }

    struct CountingFactory {
        id: String,
        stdout: String,
        creations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProviderFactory for CountingFactory {
        async fn create(&self) -> Result<Arc<dyn Provider>, ProviderError> {
            self.creations.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FixedProvider {
                id: self.id.clone(),
                stdout: self.stdout.clone(),
            }))
        }
    }

    fn registration(id: &str, stdout: &str, creations: Arc<AtomicUsize>) -> ProviderRegistration {
        ProviderRegistration {
            info: ProviderInfo {
                id: id.to_string(),
                display_name: id.to_string(),
                kind: ProviderKind::Cli,
                capabilities: ProviderCapabilities::default(),
            },
            onboarding: None,
            // Providers report the stable lowercase id, matching what
            // registration normalizes to.
            factory: Arc::new(CountingFactory {
                id: id.to_lowercase(),
                stdout: stdout.to_string(),
                creations,
            }),
        }
    }

    #[tokio::test]
    async fn create_normalizes_and_memoizes() {
        let creations = Arc::new(AtomicUsize::new(0));
        let registry = ProviderRegistry::new();
        registry.register(registration("Claude", "ok", creations.clone()));

        let first = registry.create("  CLAUDE ").await.expect("create");
        let second = registry.create("claude").await.expect("create again");
        assert_eq!(first.id(), "claude");
        assert_eq!(second.id(), "claude");
        assert_eq!(creations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_rejects_unknown_and_empty_ids() {
        let registry = ProviderRegistry::new();
        let err = registry
            .create("missing")
            .await
            .map(|_| ())
            .expect_err("unknown");
        assert!(matches!(err, CoreError::ProviderNotFound { .. }));

        let err = registry
            .create("   ")
            .await
            .map(|_| ())
            .expect_err("empty");
        assert!(matches!(err, CoreError::ProviderNotFound { .. }));
    }

    #[tokio::test]
    async fn duplicate_registration_last_wins() {
        let creations = Arc::new(AtomicUsize::new(0));
        let registry = ProviderRegistry::new();
        registry.register(registration("claude", "first", creations.clone()));
        registry.register(registration("claude", "second", creations.clone()));

        let provider = registry.create("claude").await.expect("create");
        let outcome = provider
            .invoke(Default::default(), None)
            .await
            .expect("invoke");
        assert_eq!(outcome.stdout, "second");
        assert_eq!(registry.list_providers().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_callers_share_one_initialization() {
        let creations = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(registration("claude", "ok", creations.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.create("claude").await.map(|provider| {
                    provider.id().to_string()
                })
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.expect("join").expect("create"), "claude");
        }
        assert_eq!(creations.load(Ordering::SeqCst), 1);
    }
}
