//! Pluggable inbound authenticators.
//!
//! Providers are built from configuration through a process-wide
//! factory registry keyed by the `type` string, so new authenticator
//! kinds plug in without touching the dispatcher.

mod config_key;
mod reconcile;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use lmgate_common::AccessProviderConfig;

pub use config_key::{ConfigApiKeyProvider, CONFIG_API_KEY_TYPE};
pub use reconcile::{reconcile_providers, ReconcileReport};

/// The inbound request surface an authenticator can inspect.
pub struct AccessRequest<'a> {
    pub headers: &'a http::HeaderMap,
    pub query: Option<&'a str>,
}

impl<'a> AccessRequest<'a> {
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query?;
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=')?;
            if key == name {
                return Some(value.to_string());
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    Ok {
        provider: String,
        principal: String,
        metadata: HashMap<String, String>,
    },
    InvalidCredential,
    NoCredentials,
    NotHandled,
}

pub trait AccessProvider: Send + Sync {
    fn identifier(&self) -> &str;
    fn authenticate(&self, request: &AccessRequest<'_>) -> AccessOutcome;
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("access provider type {0:?} is not registered")]
    UnknownType(String),
    #[error("access provider {name:?} misconfigured: {message}")]
    Misconfigured { name: String, message: String },
}

pub type AccessFactory =
    fn(&AccessProviderConfig) -> Result<Arc<dyn AccessProvider>, AccessError>;

fn factories() -> &'static RwLock<HashMap<String, AccessFactory>> {
    static FACTORIES: OnceLock<RwLock<HashMap<String, AccessFactory>>> = OnceLock::new();
    FACTORIES.get_or_init(|| {
        let mut map: HashMap<String, AccessFactory> = HashMap::new();
        map.insert(CONFIG_API_KEY_TYPE.to_string(), config_key::build);
        RwLock::new(map)
    })
}

/// Registers a factory for a provider `type`; replaces any previous one.
pub fn register_factory(provider_type: &str, factory: AccessFactory) {
    if provider_type.is_empty() {
        return;
    }
    factories()
        .write()
        .expect("access factory registry poisoned")
        .insert(provider_type.to_string(), factory);
}

pub fn build_provider(
    config: &AccessProviderConfig,
) -> Result<Arc<dyn AccessProvider>, AccessError> {
    let factory = {
        let registry = factories().read().expect("access factory registry poisoned");
        registry.get(&config.provider_type).copied()
    };
    let factory = factory.ok_or_else(|| AccessError::UnknownType(config.provider_type.clone()))?;
    factory(config)
}

/// Ordered authenticator chain. The first provider that returns `Ok`
/// or `InvalidCredential` decides; `NotHandled` and `NoCredentials`
/// fall through to the next.
#[derive(Clone)]
pub struct AccessChain {
    providers: Vec<Arc<dyn AccessProvider>>,
}

impl AccessChain {
    pub fn new(providers: Vec<Arc<dyn AccessProvider>>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn providers(&self) -> &[Arc<dyn AccessProvider>] {
        &self.providers
    }

    pub fn authenticate(&self, request: &AccessRequest<'_>) -> AccessOutcome {
        let mut saw_no_credentials = false;
        for provider in &self.providers {
            match provider.authenticate(request) {
                AccessOutcome::Ok {
                    provider,
                    principal,
                    metadata,
                } => {
                    return AccessOutcome::Ok {
                        provider,
                        principal,
                        metadata,
                    }
                }
                AccessOutcome::InvalidCredential => return AccessOutcome::InvalidCredential,
                AccessOutcome::NoCredentials => saw_no_credentials = true,
                AccessOutcome::NotHandled => {}
            }
        }
        if saw_no_credentials {
            AccessOutcome::NoCredentials
        } else {
            AccessOutcome::NotHandled
        }
    }
}

/// Builds the chain from config; with no configured providers an inline
/// `config-api-key` provider is synthesized from the top-level key list.
pub fn build_chain(
    configs: &[AccessProviderConfig],
    inline_api_keys: &[String],
) -> Result<AccessChain, AccessError> {
    let mut providers = Vec::new();
    for config in configs {
        if config.provider_type.is_empty() {
            continue;
        }
        providers.push(build_provider(config)?);
    }
    if providers.is_empty() {
        if let Some(inline) = config_key::inline_provider_config(inline_api_keys) {
            providers.push(build_provider(&inline)?);
        }
    }
    Ok(AccessChain::new(providers))
}
