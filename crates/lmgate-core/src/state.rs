//! Process-wide gateway state: immutable config snapshots, the model
//! registry, the credential pool, and the dispatcher, wired from one
//! loaded configuration and re-wired on reload without dropping
//! in-flight requests.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use lmgate_common::{GatewayConfig, ProviderKind};
use lmgate_pool::{
    Credential, CredentialPool, CredentialStore, RefreshError, RefreshedToken, TokenRefresher,
};
use lmgate_registry::{
    builtin_claude_models, builtin_gemini_models, builtin_iflow_models, builtin_openai_models,
    builtin_qwen_models, ModelDescriptor, ModelRegistry, ThinkingSupport,
};
use lmgate_translate::TranslatorRegistry;

use crate::access::{build_chain, reconcile_providers, AccessChain, AccessOutcome, AccessRequest, ReconcileReport};
use crate::dispatch::Dispatcher;
use crate::executor::Executor;
use crate::upstream::{UpstreamBody, UpstreamClient, UpstreamRequest};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_CLIENT_ID: &str =
    "681255809395-oo8ft2oprdrnp9e3aqf6av3hmdib135j.apps.googleusercontent.com";
const GOOGLE_CLIENT_SECRET: &str = "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";
const OPENAI_TOKEN_URL: &str = "https://auth.openai.com/oauth/token";
const OPENAI_CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";
const ANTHROPIC_TOKEN_URL: &str = "https://console.anthropic.com/v1/oauth/token";
const ANTHROPIC_CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";
const QWEN_TOKEN_URL: &str = "https://chat.qwen.ai/api/v1/oauth2/token";
const IFLOW_TOKEN_URL: &str = "https://iflow.cn/oauth/token";

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("credential store: {0}")]
    Store(#[from] lmgate_pool::StoreError),
}

pub struct Gateway {
    config: ArcSwap<GatewayConfig>,
    access: ArcSwap<AccessChain>,
    pub models: Arc<ModelRegistry>,
    pub pool: Arc<CredentialPool>,
    pub dispatcher: Dispatcher,
}

impl Gateway {
    pub async fn new(
        config: GatewayConfig,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<Self, InitError> {
        let store = config
            .auth_dir
            .as_ref()
            .map(|dir| Arc::new(CredentialStore::new(dir)));
        let max_retry = Duration::from_secs(config.max_retry_interval_secs());
        let pool = Arc::new(match store.clone() {
            Some(store) => CredentialPool::with_store(max_retry, store),
            None => CredentialPool::new(max_retry),
        });

        let models = Arc::new(ModelRegistry::new());
        let translators = Arc::new(TranslatorRegistry::with_default_edges());

        let mut executor = Executor::new(
            pool.clone(),
            client.clone(),
            config.request_retry(),
            max_retry,
        );
        for (provider, refresher) in oauth_refreshers(client.clone()) {
            executor = executor.with_refresher(provider, refresher);
        }
        let dispatcher = Dispatcher::new(models.clone(), translators, Arc::new(executor));

        let access = build_chain(&config.access.providers, &config.api_keys)
            .unwrap_or_else(|err| {
                tracing::error!(error = %err, "failed to build access providers; denying all inbound requests");
                AccessChain::new(Vec::new())
            });

        let gateway = Self {
            config: ArcSwap::from_pointee(config),
            access: ArcSwap::from_pointee(access),
            models,
            pool,
            dispatcher,
        };
        gateway.seed_from_config(store.as_deref()).await?;
        Ok(gateway)
    }

    pub fn config(&self) -> Arc<GatewayConfig> {
        self.config.load_full()
    }

    pub fn authenticate(&self, request: &AccessRequest<'_>) -> AccessOutcome {
        self.access.load().authenticate(request)
    }

    /// Applies a new configuration snapshot. In-flight requests keep
    /// the snapshot they started with.
    pub async fn reload(&self, new_config: GatewayConfig) -> Result<ReconcileReport, InitError> {
        let old_config = self.config.load_full();
        let existing = self.access.load_full();
        let (chain, report) = reconcile_providers(
            &old_config.access.providers,
            &new_config.access.providers,
            &new_config.api_keys,
            &existing,
        )
        .unwrap_or_else(|err| {
            tracing::error!(error = %err, "access reconcile failed; keeping previous providers");
            ((*existing).clone(), ReconcileReport::default())
        });
        self.access.store(Arc::new(chain));
        tracing::info!(
            added = ?report.added,
            updated = ?report.updated,
            removed = ?report.removed,
            "access providers reconciled"
        );

        // Providers dropped from config lose their pool entries; new
        // requests only see the new provider set.
        for entry in &old_config.openai_compatibility {
            if !new_config
                .openai_compatibility
                .iter()
                .any(|candidate| candidate.name == entry.name)
            {
                self.pool
                    .remove_provider(&ProviderKind::OpenAiCompat(entry.name.clone()))
                    .await;
                self.models.unregister(&compat_namespace(&entry.name));
            }
        }

        let store = new_config
            .auth_dir
            .as_ref()
            .map(|dir| Arc::new(CredentialStore::new(dir)));
        self.config.store(Arc::new(new_config));
        self.seed_from_config(store.as_deref()).await?;
        Ok(report)
    }

    async fn seed_from_config(&self, store: Option<&CredentialStore>) -> Result<(), InitError> {
        let config = self.config.load_full();

        if let Some(store) = store {
            for credential in store.load_all()? {
                self.register_models_for(&credential.provider);
                self.pool.insert(credential).await;
            }
        }

        for (index, entry) in config.gemini_api_key.iter().enumerate() {
            self.register_models_for(&ProviderKind::AiStudio);
            self.pool
                .insert(Credential::api_key(
                    ProviderKind::AiStudio,
                    format!("aistudio-{index}"),
                    entry.api_key.clone(),
                ))
                .await;
        }

        for compat in &config.openai_compatibility {
            let provider = ProviderKind::OpenAiCompat(compat.name.clone());
            let namespace = compat_namespace(&compat.name);
            self.models.unregister(&namespace);
            let descriptors: Vec<ModelDescriptor> = compat
                .model_mappings
                .iter()
                .map(|mapping| {
                    ModelDescriptor::new(
                        mapping.from.clone(),
                        compat.name.clone(),
                        provider.clone(),
                        ThinkingSupport::None,
                    )
                })
                .collect();
            self.models.register(&namespace, descriptors);
            for (index, entry) in compat.api_key_entries.iter().enumerate() {
                self.pool
                    .insert(Credential::api_key(
                        provider.clone(),
                        format!("{}-{index}", compat.name),
                        entry.api_key.clone(),
                    ))
                    .await;
            }
        }

        if let Some(amp) = &config.ampcode {
            if let Some(key) = &amp.upstream_api_key {
                self.pool
                    .insert(Credential::api_key(ProviderKind::Amp, "amp-0", key.clone()))
                    .await;
            }
        }

        Ok(())
    }

    /// Adds one account at runtime (OAuth login flows, tests) and makes
    /// sure the provider's model set is registered.
    pub async fn add_credential(&self, credential: Credential) {
        self.register_models_for(&credential.provider);
        self.pool.insert(credential).await;
    }

    fn register_models_for(&self, provider: &ProviderKind) {
        let namespace = provider.as_str().to_string();
        self.models.unregister(&namespace);
        let models = match provider {
            ProviderKind::GeminiCli | ProviderKind::AiStudio => {
                builtin_gemini_models(provider.clone())
            }
            ProviderKind::ClaudeCode => builtin_claude_models(),
            ProviderKind::Codex => builtin_openai_models(),
            ProviderKind::Qwen => builtin_qwen_models(),
            ProviderKind::IFlow => builtin_iflow_models(),
            ProviderKind::Amp | ProviderKind::OpenAiCompat(_) => Vec::new(),
        };
        self.models.register(&namespace, models);
    }
}

fn compat_namespace(name: &str) -> String {
    format!("openai-compat:{name}")
}

fn oauth_refreshers(
    client: Arc<dyn UpstreamClient>,
) -> Vec<(&'static str, Arc<dyn TokenRefresher>)> {
    vec![
        (
            "gemini-cli",
            Arc::new(OAuthRefresher {
                client: client.clone(),
                token_url: GOOGLE_TOKEN_URL,
                client_id: GOOGLE_CLIENT_ID,
                client_secret: Some(GOOGLE_CLIENT_SECRET),
            }) as Arc<dyn TokenRefresher>,
        ),
        (
            "codex",
            Arc::new(OAuthRefresher {
                client: client.clone(),
                token_url: OPENAI_TOKEN_URL,
                client_id: OPENAI_CLIENT_ID,
                client_secret: None,
            }),
        ),
        (
            "claude-code",
            Arc::new(OAuthRefresher {
                client: client.clone(),
                token_url: ANTHROPIC_TOKEN_URL,
                client_id: ANTHROPIC_CLIENT_ID,
                client_secret: None,
            }),
        ),
        (
            "qwen",
            Arc::new(OAuthRefresher {
                client: client.clone(),
                token_url: QWEN_TOKEN_URL,
                client_id: "f0304373b74a44d2b584a3fb70ca9e56",
                client_secret: None,
            }),
        ),
        (
            "iflow",
            Arc::new(OAuthRefresher {
                client,
                token_url: IFLOW_TOKEN_URL,
                client_id: "10009311001",
                client_secret: None,
            }),
        ),
    ]
}

/// Standard `refresh_token` grant against a provider's token endpoint,
/// issued through the shared upstream client so egress proxying applies.
struct OAuthRefresher {
    client: Arc<dyn UpstreamClient>,
    token_url: &'static str,
    client_id: &'static str,
    client_secret: Option<&'static str>,
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, credential: &Credential) -> Result<RefreshedToken, RefreshError> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or(RefreshError::NoRefreshToken)?;

        let mut pairs = vec![
            ("grant_type", "refresh_token".to_string()),
            ("client_id", self.client_id.to_string()),
            ("refresh_token", refresh_token),
        ];
        if let Some(secret) = self.client_secret {
            pairs.push(("client_secret", secret.to_string()));
        }

        let response = self
            .client
            .send(UpstreamRequest {
                url: self.token_url.to_string(),
                headers: vec![(
                    "content-type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                )],
                body: Bytes::from(form_encode(&pairs)),
                stream: false,
            })
            .await
            .map_err(|err| RefreshError::Transport(err.to_string()))?;

        let body = match response.body {
            UpstreamBody::Bytes(bytes) => bytes,
            UpstreamBody::Stream(_) => {
                return Err(RefreshError::Transport(
                    "unexpected streaming token response".to_string(),
                ))
            }
        };
        if !(200..300).contains(&response.status) {
            return Err(RefreshError::Rejected(format!(
                "{}: {}",
                response.status,
                String::from_utf8_lossy(&body)
            )));
        }

        #[derive(serde::Deserialize)]
        struct TokenResponse {
            access_token: String,
            refresh_token: Option<String>,
            expires_in: Option<i64>,
        }
        let token: TokenResponse = serde_json::from_slice(&body)
            .map_err(|err| RefreshError::Rejected(err.to_string()))?;
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        Ok(RefreshedToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_in.map(|ttl| now + ttl),
        })
    }
}

fn form_encode(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={}", percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}
