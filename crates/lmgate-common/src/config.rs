use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("tls enabled but {0} is not set")]
    TlsIncomplete(&'static str),
}

/// Gateway configuration as loaded from the YAML file.
///
/// The running process holds this behind an `Arc` and swaps the whole
/// snapshot on reload; individual fields are never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GatewayConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsConfig>,
    /// Inline inbound keys; used to synthesize a `config-api-key`
    /// access provider when `access.providers` is empty.
    pub api_keys: Vec<String>,
    /// Directory holding one JSON credential file per upstream account.
    pub auth_dir: Option<String>,
    pub access: AccessConfig,
    pub proxy_url: Option<String>,
    pub request_retry: Option<u32>,
    /// Upper bound, in seconds, on any retry/cooldown wait.
    pub max_retry_interval: Option<u64>,
    pub gemini_api_key: Vec<GeminiApiKeyEntry>,
    pub openai_compatibility: Vec<OpenAiCompatConfig>,
    pub ampcode: Option<AmpConfig>,
}

impl GatewayConfig {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("0.0.0.0")
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(8317)
    }

    pub fn request_retry(&self) -> u32 {
        self.request_retry.unwrap_or(3)
    }

    pub fn max_retry_interval_secs(&self) -> u64 {
        self.max_retry_interval.unwrap_or(30)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(tls) = &self.tls {
            if tls.enable {
                if tls.cert.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::TlsIncomplete("tls.cert"));
                }
                if tls.key.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::TlsIncomplete("tls.key"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TlsConfig {
    pub enable: bool,
    pub cert: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AccessConfig {
    pub providers: Vec<AccessProviderConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AccessProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: String,
    pub name: String,
    pub api_keys: Vec<String>,
    /// Provider-specific opaque settings, passed to the factory verbatim.
    pub config: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GeminiApiKeyEntry {
    pub api_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OpenAiCompatConfig {
    pub name: String,
    pub base_url: String,
    pub api_key_entries: Vec<OpenAiCompatKeyEntry>,
    pub model_mappings: Vec<ModelMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OpenAiCompatKeyEntry {
    pub api_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ModelMapping {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AmpConfig {
    pub upstream_url: Option<String>,
    pub upstream_api_key: Option<String>,
    pub restrict_management_to_localhost: bool,
    pub model_mappings: Vec<ModelMapping>,
}

/// Load the configuration file, migrating legacy field names in place.
///
/// When migration changed anything the file is rewritten so the legacy
/// spelling disappears from disk.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut doc: Value = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let migrated = migrate_legacy_fields(&mut doc);
    let config: GatewayConfig =
        serde_yaml::from_value(doc.clone()).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;

    if migrated {
        let rendered = serde_yaml::to_string(&doc).unwrap_or(raw);
        std::fs::write(path, rendered).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    Ok(config)
}

/// Rewrite legacy field spellings into their current form.
///
/// Returns true when the document was modified:
/// - `generative-language-api-key: [string]` merges into
///   `gemini-api-key: [{api-key}]`
/// - `amp-upstream-url` / `amp-upstream-api-key` /
///   `amp-restrict-management-to-localhost` / `amp-model-mappings` ->
///   nested `ampcode` block
/// - `openai-compatibility[*].api-keys: [string]` merges into
///   `api-key-entries`
///
/// Legacy entries append to any new-style list already present;
/// duplicate keys are dropped, keeping the first occurrence.
pub fn migrate_legacy_fields(doc: &mut Value) -> bool {
    let Some(root) = doc.as_mapping_mut() else {
        return false;
    };
    let mut changed = false;

    if let Some(old) = root.remove(Value::from("generative-language-api-key")) {
        if let Some(keys) = old.as_sequence() {
            let existing = root
                .remove(Value::from("gemini-api-key"))
                .and_then(|value| value.as_sequence().cloned())
                .unwrap_or_default();
            let merged = merge_key_entries(existing, keys);
            root.insert(Value::from("gemini-api-key"), Value::Sequence(merged));
        }
        changed = true;
    }

    let amp_url = root.remove(Value::from("amp-upstream-url"));
    let amp_key = root.remove(Value::from("amp-upstream-api-key"));
    let amp_localhost = root.remove(Value::from("amp-restrict-management-to-localhost"));
    let amp_mappings = root.remove(Value::from("amp-model-mappings"));
    if amp_url.is_some() || amp_key.is_some() || amp_localhost.is_some() || amp_mappings.is_some()
    {
        let mut amp = match root.remove(Value::from("ampcode")) {
            Some(Value::Mapping(existing)) => existing,
            _ => serde_yaml::Mapping::new(),
        };
        if let Some(url) = amp_url {
            amp.entry(Value::from("upstream-url")).or_insert(url);
        }
        if let Some(key) = amp_key {
            amp.entry(Value::from("upstream-api-key")).or_insert(key);
        }
        if let Some(flag) = amp_localhost {
            amp.entry(Value::from("restrict-management-to-localhost"))
                .or_insert(flag);
        }
        if let Some(mappings) = amp_mappings {
            amp.entry(Value::from("model-mappings")).or_insert(mappings);
        }
        root.insert(Value::from("ampcode"), Value::Mapping(amp));
        changed = true;
    }

    if let Some(Value::Sequence(compat)) = root.get_mut(Value::from("openai-compatibility")) {
        for entry in compat.iter_mut() {
            let Some(map) = entry.as_mapping_mut() else {
                continue;
            };
            let Some(old) = map.remove(Value::from("api-keys")) else {
                continue;
            };
            if let Some(keys) = old.as_sequence() {
                let existing = map
                    .remove(Value::from("api-key-entries"))
                    .and_then(|value| value.as_sequence().cloned())
                    .unwrap_or_default();
                let merged = merge_key_entries(existing, keys);
                map.insert(Value::from("api-key-entries"), Value::Sequence(merged));
            }
            changed = true;
        }
    }

    changed
}

/// Appends legacy bare-string keys to existing `{api-key}` entries,
/// dropping duplicates by key value in first-seen order.
fn merge_key_entries(existing: Vec<Value>, legacy_keys: &[Value]) -> Vec<Value> {
    let mut seen: Vec<String> = Vec::new();
    let mut merged = Vec::new();
    for entry in existing {
        let Some(key) = entry
            .get("api-key")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
        else {
            merged.push(entry);
            continue;
        };
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        merged.push(entry);
    }
    for key in legacy_keys.iter().filter_map(|key| key.as_str()) {
        if seen.iter().any(|existing| existing == key) {
            continue;
        }
        seen.push(key.to_string());
        let mut entry = serde_yaml::Mapping::new();
        entry.insert(Value::from("api-key"), Value::from(key));
        merged.push(Value::Mapping(entry));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrates_generative_language_api_key() {
        let mut doc: Value =
            serde_yaml::from_str("generative-language-api-key:\n  - k1\n  - k2\n").unwrap();
        assert!(migrate_legacy_fields(&mut doc));
        let config: GatewayConfig = serde_yaml::from_value(doc).unwrap();
        assert_eq!(config.gemini_api_key.len(), 2);
        assert_eq!(config.gemini_api_key[0].api_key, "k1");
    }

    #[test]
    fn migrates_amp_fields_into_ampcode() {
        let yaml = "amp-upstream-url: https://amp.example\namp-restrict-management-to-localhost: true\n";
        let mut doc: Value = serde_yaml::from_str(yaml).unwrap();
        assert!(migrate_legacy_fields(&mut doc));
        let config: GatewayConfig = serde_yaml::from_value(doc).unwrap();
        let amp = config.ampcode.expect("ampcode block");
        assert_eq!(amp.upstream_url.as_deref(), Some("https://amp.example"));
        assert!(amp.restrict_management_to_localhost);
    }

    #[test]
    fn migrates_compat_api_keys_to_entries() {
        let yaml = concat!(
            "openai-compatibility:\n",
            "  - name: local\n",
            "    base-url: http://127.0.0.1:8000/v1\n",
            "    api-keys:\n",
            "      - sk-local\n",
        );
        let mut doc: Value = serde_yaml::from_str(yaml).unwrap();
        assert!(migrate_legacy_fields(&mut doc));
        let config: GatewayConfig = serde_yaml::from_value(doc).unwrap();
        assert_eq!(config.openai_compatibility[0].api_key_entries.len(), 1);
        assert_eq!(
            config.openai_compatibility[0].api_key_entries[0].api_key,
            "sk-local"
        );
    }

    #[test]
    fn mixed_legacy_and_new_gemini_keys_merge_without_duplicates() {
        let yaml = concat!(
            "gemini-api-key:\n",
            "  - api-key: unique-new-key\n",
            "generative-language-api-key:\n",
            "  - unique-new-key\n",
            "  - legacy-only-key\n",
        );
        let mut doc: Value = serde_yaml::from_str(yaml).unwrap();
        assert!(migrate_legacy_fields(&mut doc));
        let config: GatewayConfig = serde_yaml::from_value(doc).unwrap();
        let keys: Vec<&str> = config
            .gemini_api_key
            .iter()
            .map(|entry| entry.api_key.as_str())
            .collect();
        assert_eq!(keys, vec!["unique-new-key", "legacy-only-key"]);
    }

    #[test]
    fn mixed_legacy_and_new_compat_keys_merge_without_duplicates() {
        let yaml = concat!(
            "openai-compatibility:\n",
            "  - name: mixed\n",
            "    base-url: https://mixed.example.com\n",
            "    api-key-entries:\n",
            "      - api-key: new-entry\n",
            "    api-keys:\n",
            "      - legacy-entry\n",
            "      - new-entry\n",
        );
        let mut doc: Value = serde_yaml::from_str(yaml).unwrap();
        assert!(migrate_legacy_fields(&mut doc));
        let config: GatewayConfig = serde_yaml::from_value(doc).unwrap();
        let keys: Vec<&str> = config.openai_compatibility[0]
            .api_key_entries
            .iter()
            .map(|entry| entry.api_key.as_str())
            .collect();
        assert_eq!(keys, vec!["new-entry", "legacy-entry"]);
    }

    #[test]
    fn migrates_amp_model_mappings() {
        let yaml = concat!(
            "amp-upstream-url: https://amp.example\n",
            "amp-model-mappings:\n",
            "  - from: old-model\n",
            "    to: new-model\n",
        );
        let mut doc: Value = serde_yaml::from_str(yaml).unwrap();
        assert!(migrate_legacy_fields(&mut doc));
        let config: GatewayConfig = serde_yaml::from_value(doc).unwrap();
        let amp = config.ampcode.expect("ampcode block");
        assert_eq!(amp.model_mappings.len(), 1);
        assert_eq!(amp.model_mappings[0].from, "old-model");
        assert_eq!(amp.model_mappings[0].to, "new-model");
    }

    #[test]
    fn migration_is_idempotent_on_current_spelling() {
        let yaml = "gemini-api-key:\n  - api-key: k1\nport: 9000\n";
        let mut doc: Value = serde_yaml::from_str(yaml).unwrap();
        assert!(!migrate_legacy_fields(&mut doc));
    }

    #[test]
    fn tls_requires_cert_and_key() {
        let config = GatewayConfig {
            tls: Some(TlsConfig {
                enable: true,
                cert: Some("cert.pem".into()),
                key: None,
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TlsIncomplete("tls.key"))
        ));
    }
}
