use std::collections::HashMap;
use std::sync::Arc;

use lmgate_common::AccessProviderConfig;

use super::config_key::{inline_provider_config, INLINE_PROVIDER_NAME};
use super::{build_provider, AccessChain, AccessError, AccessProvider};

/// Identifier lists describing what a reload changed. The synthesized
/// inline provider never appears in the diff.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

/// Builds the new provider chain, reusing existing provider objects
/// whose configuration is structurally unchanged.
pub fn reconcile_providers(
    old_configs: &[AccessProviderConfig],
    new_configs: &[AccessProviderConfig],
    inline_api_keys: &[String],
    existing: &AccessChain,
) -> Result<(AccessChain, ReconcileReport), AccessError> {
    let existing_by_id: HashMap<&str, &Arc<dyn AccessProvider>> = existing
        .providers()
        .iter()
        .map(|provider| (provider.identifier(), provider))
        .collect();
    let old_by_name: HashMap<&str, &AccessProviderConfig> = old_configs
        .iter()
        .map(|config| (provider_name(config), config))
        .collect();

    let mut report = ReconcileReport::default();
    let mut providers: Vec<Arc<dyn AccessProvider>> = Vec::new();
    let mut final_ids: Vec<String> = Vec::new();

    let mut effective: Vec<AccessProviderConfig> = new_configs
        .iter()
        .filter(|config| !config.provider_type.is_empty())
        .cloned()
        .collect();
    if effective.is_empty() {
        if let Some(inline) = inline_provider_config(inline_api_keys) {
            effective.push(inline);
        }
    }

    for config in &effective {
        let name = provider_name(config);
        final_ids.push(name.to_string());

        if let Some(old_config) = old_by_name.get(name) {
            if *old_config == config {
                if let Some(reused) = existing_by_id.get(name) {
                    providers.push(Arc::clone(reused));
                    continue;
                }
            }
            providers.push(build_provider(config)?);
            record(&mut report.updated, name);
        } else {
            providers.push(build_provider(config)?);
            record(&mut report.added, name);
        }
    }

    for provider in existing.providers() {
        let id = provider.identifier();
        if !final_ids.iter().any(|kept| kept == id) {
            record(&mut report.removed, id);
        }
    }

    report.added.sort();
    report.updated.sort();
    report.removed.sort();
    Ok((AccessChain::new(providers), report))
}

fn provider_name(config: &AccessProviderConfig) -> &str {
    if config.name.is_empty() {
        INLINE_PROVIDER_NAME
    } else {
        &config.name
    }
}

fn record(list: &mut Vec<String>, name: &str) {
    if name.eq_ignore_ascii_case(INLINE_PROVIDER_NAME) {
        return;
    }
    list.push(name.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{build_chain, AccessOutcome, AccessRequest, CONFIG_API_KEY_TYPE};

    fn config(name: &str, keys: &[&str]) -> AccessProviderConfig {
        AccessProviderConfig {
            provider_type: CONFIG_API_KEY_TYPE.to_string(),
            name: name.to_string(),
            api_keys: keys.iter().map(|key| key.to_string()).collect(),
            config: None,
        }
    }

    #[test]
    fn reports_added_updated_removed() {
        let old = vec![config("alpha", &["k1"]), config("beta", &["k2"])];
        let chain = build_chain(&old, &[]).unwrap();

        let new = vec![config("alpha", &["k1", "k3"]), config("gamma", &["k4"])];
        let (next, report) = reconcile_providers(&old, &new, &[], &chain).unwrap();

        assert_eq!(report.added, vec!["gamma"]);
        assert_eq!(report.updated, vec!["alpha"]);
        assert_eq!(report.removed, vec!["beta"]);
        assert_eq!(next.providers().len(), 2);
    }

    #[test]
    fn unchanged_provider_object_is_reused() {
        let old = vec![config("alpha", &["k1"])];
        let chain = build_chain(&old, &[]).unwrap();
        let original = Arc::as_ptr(&chain.providers()[0]);

        let (next, report) = reconcile_providers(&old, &old.clone(), &[], &chain).unwrap();
        assert_eq!(report, ReconcileReport::default());
        assert_eq!(Arc::as_ptr(&next.providers()[0]), original);
    }

    #[test]
    fn inline_provider_is_synthesized_and_kept_out_of_diff() {
        let chain = build_chain(&[], &["sk-inline".to_string()]).unwrap();
        let (next, report) =
            reconcile_providers(&[], &[], &["sk-inline".to_string()], &chain).unwrap();
        assert_eq!(report, ReconcileReport::default());

        let mut headers = http::HeaderMap::new();
        headers.insert("x-api-key", "sk-inline".parse().unwrap());
        let outcome = next.authenticate(&AccessRequest {
            headers: &headers,
            query: None,
        });
        assert!(matches!(outcome, AccessOutcome::Ok { .. }));
    }
}
