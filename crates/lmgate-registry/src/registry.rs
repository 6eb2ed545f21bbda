use std::collections::HashMap;
use std::sync::RwLock;

use crate::descriptor::ModelDescriptor;

/// Process-wide model catalog.
///
/// Registrations are namespaced per client so a config reload can swap
/// one provider's model set atomically: `unregister(namespace)` removes
/// everything that namespace installed, then the new set is registered
/// under the same name. Listing order follows registration order.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Registration order of (namespace, descriptor) pairs.
    entries: Vec<(String, ModelDescriptor)>,
    /// Lookup index; first registration of an id wins.
    by_id: HashMap<String, ModelDescriptor>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, namespace: &str, models: Vec<ModelDescriptor>) {
        let mut inner = self.inner.write().expect("model registry poisoned");
        for model in models {
            inner
                .by_id
                .entry(model.id.clone())
                .or_insert_with(|| model.clone());
            inner.entries.push((namespace.to_string(), model));
        }
    }

    pub fn unregister(&self, namespace: &str) {
        let mut inner = self.inner.write().expect("model registry poisoned");
        inner.entries.retain(|(ns, _)| ns != namespace);
        inner.by_id.clear();
        let rebuilt: Vec<ModelDescriptor> =
            inner.entries.iter().map(|(_, model)| model.clone()).collect();
        for model in rebuilt {
            inner.by_id.entry(model.id.clone()).or_insert(model);
        }
    }

    /// Exact id, then case-insensitive, then normalized (underscores
    /// become hyphens).
    pub fn lookup(&self, id: &str) -> Option<ModelDescriptor> {
        let inner = self.inner.read().expect("model registry poisoned");
        if let Some(found) = inner.by_id.get(id) {
            return Some(found.clone());
        }
        let lowered = id.to_ascii_lowercase();
        if let Some(found) = inner
            .by_id
            .iter()
            .find(|(key, _)| key.to_ascii_lowercase() == lowered)
        {
            return Some(found.1.clone());
        }
        let normalized = lowered.replace('_', "-");
        inner
            .by_id
            .iter()
            .find(|(key, _)| key.to_ascii_lowercase().replace('_', "-") == normalized)
            .map(|(_, model)| model.clone())
    }

    /// Union across namespaces in registration order, de-duplicated by id.
    pub fn list(&self) -> Vec<ModelDescriptor> {
        let inner = self.inner.read().expect("model registry poisoned");
        let mut seen = std::collections::HashSet::new();
        inner
            .entries
            .iter()
            .filter(|(_, model)| seen.insert(model.id.clone()))
            .map(|(_, model)| model.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ThinkingSupport;
    use lmgate_common::ProviderKind;

    fn model(id: &str) -> ModelDescriptor {
        ModelDescriptor::new(id, "test", ProviderKind::Codex, ThinkingSupport::None)
    }

    #[test]
    fn lookup_falls_back_to_normalized_ids() {
        let registry = ModelRegistry::new();
        registry.register("ns", vec![model("gemini-3-pro-preview")]);
        assert!(registry.lookup("gemini-3-pro-preview").is_some());
        assert!(registry.lookup("GEMINI-3-PRO-PREVIEW").is_some());
        assert!(registry.lookup("gemini_3_pro_preview").is_some());
        assert!(registry.lookup("gemini-3-pro").is_none());
    }

    #[test]
    fn unregister_removes_only_that_namespace() {
        let registry = ModelRegistry::new();
        registry.register("a", vec![model("m1"), model("shared")]);
        registry.register("b", vec![model("m2"), model("shared")]);
        registry.unregister("a");
        assert!(registry.lookup("m1").is_none());
        assert!(registry.lookup("m2").is_some());
        // Still present through namespace "b".
        assert!(registry.lookup("shared").is_some());
    }

    #[test]
    fn list_is_union_in_registration_order() {
        let registry = ModelRegistry::new();
        registry.register("a", vec![model("m1")]);
        registry.register("b", vec![model("m2"), model("m1")]);
        let ids: Vec<String> = registry.list().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }
}
