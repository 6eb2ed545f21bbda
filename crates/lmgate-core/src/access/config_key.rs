use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lmgate_common::AccessProviderConfig;

use super::{AccessError, AccessOutcome, AccessProvider, AccessRequest};

pub const CONFIG_API_KEY_TYPE: &str = "config-api-key";
pub const INLINE_PROVIDER_NAME: &str = "config-inline-api-key";

/// Matches an inline key list against the request's auth surfaces:
/// `Authorization: Bearer`, `X-Goog-Api-Key`, `X-Api-Key`, `?key=`,
/// `?auth_token=`.
pub struct ConfigApiKeyProvider {
    name: String,
    keys: HashSet<String>,
}

pub(super) fn build(
    config: &AccessProviderConfig,
) -> Result<Arc<dyn AccessProvider>, AccessError> {
    let name = if config.name.is_empty() {
        INLINE_PROVIDER_NAME.to_string()
    } else {
        config.name.clone()
    };
    let keys: HashSet<String> = config
        .api_keys
        .iter()
        .filter(|key| !key.is_empty())
        .cloned()
        .collect();
    Ok(Arc::new(ConfigApiKeyProvider { name, keys }))
}

pub fn inline_provider_config(api_keys: &[String]) -> Option<AccessProviderConfig> {
    if api_keys.iter().all(|key| key.is_empty()) {
        return None;
    }
    Some(AccessProviderConfig {
        provider_type: CONFIG_API_KEY_TYPE.to_string(),
        name: INLINE_PROVIDER_NAME.to_string(),
        api_keys: api_keys.to_vec(),
        config: None,
    })
}

impl AccessProvider for ConfigApiKeyProvider {
    fn identifier(&self) -> &str {
        &self.name
    }

    fn authenticate(&self, request: &AccessRequest<'_>) -> AccessOutcome {
        if self.keys.is_empty() {
            return AccessOutcome::NotHandled;
        }

        let bearer = request
            .header("authorization")
            .map(extract_bearer)
            .unwrap_or_default();
        let candidates = [
            (bearer, "authorization"),
            (
                request.header("x-goog-api-key").unwrap_or("").to_string(),
                "x-goog-api-key",
            ),
            (
                request.header("x-api-key").unwrap_or("").to_string(),
                "x-api-key",
            ),
            (
                request.query_param("key").unwrap_or_default(),
                "query-key",
            ),
            (
                request.query_param("auth_token").unwrap_or_default(),
                "query-auth-token",
            ),
        ];

        if candidates.iter().all(|(value, _)| value.is_empty()) {
            return AccessOutcome::NoCredentials;
        }

        for (value, source) in &candidates {
            if value.is_empty() {
                continue;
            }
            if self.keys.contains(value) {
                let mut metadata = HashMap::new();
                metadata.insert("source".to_string(), source.to_string());
                return AccessOutcome::Ok {
                    provider: self.name.clone(),
                    principal: value.clone(),
                    metadata,
                };
            }
        }

        AccessOutcome::InvalidCredential
    }
}

fn extract_bearer(header: &str) -> String {
    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim().to_string(),
        _ => header.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    fn provider(keys: &[&str]) -> Arc<dyn AccessProvider> {
        build(&AccessProviderConfig {
            provider_type: CONFIG_API_KEY_TYPE.to_string(),
            name: "test".to_string(),
            api_keys: keys.iter().map(|key| key.to_string()).collect(),
            config: None,
        })
        .unwrap()
    }

    fn request_with_header(name: &'static str, value: &str) -> (HeaderMap, Option<String>) {
        let mut headers = HeaderMap::new();
        headers.insert(name, value.parse().unwrap());
        (headers, None)
    }

    #[test]
    fn accepts_every_documented_credential_surface() {
        let provider = provider(&["sk-1"]);
        let cases = [
            request_with_header("authorization", "Bearer sk-1"),
            request_with_header("x-goog-api-key", "sk-1"),
            request_with_header("x-api-key", "sk-1"),
            (HeaderMap::new(), Some("key=sk-1".to_string())),
            (HeaderMap::new(), Some("auth_token=sk-1".to_string())),
        ];
        for (headers, query) in &cases {
            let outcome = provider.authenticate(&AccessRequest {
                headers,
                query: query.as_deref(),
            });
            assert!(matches!(outcome, AccessOutcome::Ok { .. }), "{query:?}");
        }
    }

    #[test]
    fn wrong_key_is_invalid_not_missing() {
        let provider = provider(&["sk-1"]);
        let (headers, _) = request_with_header("x-api-key", "sk-2");
        let outcome = provider.authenticate(&AccessRequest {
            headers: &headers,
            query: None,
        });
        assert_eq!(outcome, AccessOutcome::InvalidCredential);
    }

    #[test]
    fn absent_credentials_fall_through() {
        let provider = provider(&["sk-1"]);
        let headers = HeaderMap::new();
        let outcome = provider.authenticate(&AccessRequest {
            headers: &headers,
            query: None,
        });
        assert_eq!(outcome, AccessOutcome::NoCredentials);
    }
}
