use lmgate_common::ProviderKind;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// One upstream account, as persisted under `auth-dir/` (one JSON file
/// per account, rewritten atomically on refresh).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub provider: ProviderKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Plain API key accounts (AI Studio, openai-compat entries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl Credential {
    pub fn api_key(provider: ProviderKind, id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
            label: None,
            api_key: Some(key.into()),
            access_token: None,
            refresh_token: None,
            expires_at: None,
            scopes: None,
            project_id: None,
        }
    }

    pub fn oauth(
        provider: ProviderKind,
        id: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: Option<i64>,
    ) -> Self {
        Self {
            provider,
            id: id.into(),
            label: None,
            api_key: None,
            access_token: Some(access_token.into()),
            refresh_token,
            expires_at,
            scopes: None,
            project_id: None,
        }
    }

    /// Seconds until the access token expires; `None` when the
    /// credential has no expiry (API keys).
    pub fn expires_in(&self, now_unix: i64) -> Option<i64> {
        self.expires_at.map(|at| at - now_unix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    RateLimit,
    AuthExpired,
    QuotaExhausted,
    Upstream,
    RefreshFailed,
}

/// Runtime account lifecycle. `Fresh` means the entry has never served
/// a request; the distinction only matters for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    Fresh,
    Usable,
    Refreshing,
    CoolingDown {
        until: Instant,
        reason: UnavailableReason,
    },
    Retired,
}
