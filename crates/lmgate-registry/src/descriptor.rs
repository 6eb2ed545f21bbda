use lmgate_common::ProviderKind;
use serde::{Deserialize, Serialize};

/// Canonical effort ladder shared by level-based models. Ordered
/// ascending; the rightmost entry is the highest.
pub const LEVEL_LADDER: &[(&str, i64)] = &[
    ("minimal", 512),
    ("low", 1024),
    ("medium", 8192),
    ("high", 24576),
    ("xhigh", 32768),
];

/// How a model expresses "how much to think".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThinkingSupport {
    /// Reasoning controls are not accepted and are stripped silently.
    None,
    /// Integer token budget. `-1` = dynamic, `0` = disabled.
    Budget { min: i64, max: i64, default: i64 },
    /// Ordered `(name, budget)` pairs; rightmost is the highest.
    Levels { levels: Vec<(String, i64)> },
}

impl ThinkingSupport {
    pub fn ladder(names: &[&str]) -> Self {
        let levels = names
            .iter()
            .filter_map(|name| {
                LEVEL_LADDER
                    .iter()
                    .find(|(ladder_name, _)| ladder_name == name)
                    .map(|(ladder_name, budget)| (ladder_name.to_string(), *budget))
            })
            .collect();
        ThinkingSupport::Levels { levels }
    }

    pub fn supports_thinking(&self) -> bool {
        !matches!(self, ThinkingSupport::None)
    }

    pub fn uses_levels(&self) -> bool {
        matches!(self, ThinkingSupport::Levels { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub owned_by: String,
    pub provider: ProviderKind,
    pub thinking: ThinkingSupport,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        owned_by: impl Into<String>,
        provider: ProviderKind,
        thinking: ThinkingSupport,
    ) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            owned_by: owned_by.into(),
            provider,
            thinking,
        }
    }
}
