//! Parsing and projection of reasoning-effort intent.
//!
//! A client names a model as `gpt-5(high)` or `gemini-2.5-pro(8192)`;
//! the suffix is parsed once into a [`ThinkingDirective`] and projected
//! onto whichever representation the upstream dialect understands:
//! a numeric budget (Gemini, Claude), a named effort level (OpenAI
//! Chat/Responses), or a Gemini-3 `thinkingLevel`.

use serde_json::{Map, Value};

use crate::descriptor::{ModelDescriptor, ThinkingSupport, LEVEL_LADDER};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThinkingDirective {
    Unset,
    Budget(i64),
    Effort(String),
    /// Unknown suffix, kept for logging; the base id is still used.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedModel {
    pub base: String,
    pub directive: ThinkingDirective,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ThinkingError {
    #[error("reasoning effort {effort:?} is not valid for model {model:?}")]
    InvalidEffort { model: String, effort: String },
}

/// Strips a trailing parenthesized thinking suffix from a model id.
///
/// `gpt-5(high)` -> effort, `gemini-2.5-pro(8192)` -> budget, unknown
/// words are preserved as [`ThinkingDirective::Raw`].
pub fn parse_model_suffix(model: &str) -> ParsedModel {
    let trimmed = model.trim();
    if let Some(open) = trimmed.rfind('(') {
        if let Some(inner) = trimmed[open..]
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let base = trimmed[..open].trim().to_string();
            let inner = inner.trim();
            if !base.is_empty() && !inner.is_empty() {
                let directive = if let Ok(budget) = inner.parse::<i64>() {
                    ThinkingDirective::Budget(budget)
                } else if is_known_effort_name(inner) {
                    ThinkingDirective::Effort(inner.to_ascii_lowercase())
                } else {
                    ThinkingDirective::Raw(inner.to_string())
                };
                return ParsedModel { base, directive };
            }
        }
    }
    ParsedModel {
        base: trimmed.to_string(),
        directive: ThinkingDirective::Unset,
    }
}

fn is_known_effort_name(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    lowered == "auto"
        || lowered == "none"
        || LEVEL_LADDER
            .iter()
            .any(|(ladder_name, _)| *ladder_name == lowered)
}

/// Maps a named effort onto a token budget for a budget-style model.
/// `auto` -> -1, `none` -> 0, ladder names -> their budget clamped into
/// the model's range. Unknown names map to nothing.
pub fn effort_to_budget(desc: &ModelDescriptor, effort: &str) -> Option<i64> {
    let lowered = effort.trim().to_ascii_lowercase();
    let raw = match lowered.as_str() {
        "" => return None,
        "auto" => -1,
        "none" => 0,
        name => {
            LEVEL_LADDER
                .iter()
                .find(|(ladder_name, _)| *ladder_name == name)?
                .1
        }
    };
    Some(clamp_budget(desc, raw))
}

/// Maps a token budget onto the model's effort ladder: `-1` -> `auto`,
/// `0` -> the smallest level, a positive budget -> the smallest level
/// whose budget covers it, saturating at the highest. Budgets below -1
/// map to nothing.
pub fn budget_to_effort(desc: Option<&ModelDescriptor>, budget: i64) -> Option<String> {
    let table = effort_table(desc);
    if budget == -1 {
        return Some("auto".to_string());
    }
    if budget < -1 {
        return None;
    }
    if budget == 0 {
        return table.first().map(|(name, _)| name.clone());
    }
    table
        .iter()
        .find(|(_, level_budget)| *level_budget >= budget)
        .or_else(|| table.last())
        .map(|(name, _)| name.clone())
}

fn effort_table(desc: Option<&ModelDescriptor>) -> Vec<(String, i64)> {
    match desc.map(|d| &d.thinking) {
        Some(ThinkingSupport::Levels { levels }) => levels.clone(),
        _ => LEVEL_LADDER
            .iter()
            .map(|(name, budget)| (name.to_string(), *budget))
            .collect(),
    }
}

/// Clamps into the model's `[min, max]`, preserving the `-1`/`0`
/// special values.
pub fn clamp_budget(desc: &ModelDescriptor, budget: i64) -> i64 {
    let ThinkingSupport::Budget { min, max, .. } = desc.thinking else {
        return budget;
    };
    if budget == -1 || budget == 0 {
        return budget;
    }
    budget.clamp(min, max)
}

/// Validates an effort name against the model's level table, returning
/// the lowercased canonical spelling.
pub fn normalize_effort_level(desc: &ModelDescriptor, effort: &str) -> Option<String> {
    let ThinkingSupport::Levels { levels } = &desc.thinking else {
        return None;
    };
    let lowered = effort.trim().to_ascii_lowercase();
    levels
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(name, _)| name.clone())
}

// ---- Gemini 3: named thinkingLevel instead of a numeric budget ----

pub fn is_gemini3_model(model: &str) -> bool {
    let normalized = model.to_ascii_lowercase().replace('_', "-");
    normalized.starts_with("gemini-3-")
}

pub fn is_gemini3_pro_model(model: &str) -> bool {
    is_gemini3_model(model) && model.to_ascii_lowercase().replace('_', "-").contains("-pro")
}

pub fn is_gemini3_flash_model(model: &str) -> bool {
    is_gemini3_model(model)
        && model
            .to_ascii_lowercase()
            .replace('_', "-")
            .contains("-flash")
}

fn gemini3_levels(model: &str) -> Option<&'static [&'static str]> {
    if is_gemini3_pro_model(model) {
        Some(&["low", "high"])
    } else if is_gemini3_flash_model(model) {
        Some(&["minimal", "low", "medium", "high"])
    } else {
        None
    }
}

/// Validates a `thinkingLevel` value for a Gemini 3 model.
pub fn validate_gemini3_level(model: &str, level: &str) -> Option<String> {
    let levels = gemini3_levels(model)?;
    let lowered = level.trim().to_ascii_lowercase();
    levels
        .iter()
        .find(|candidate| **candidate == lowered)
        .map(|candidate| candidate.to_string())
}

/// Model-specific numeric-to-level thresholds. Pro only distinguishes
/// low/high (the cut sits at the ladder's `medium` budget); Flash uses
/// the standard ladder.
pub fn gemini3_budget_to_level(model: &str, budget: i64) -> Option<String> {
    let levels = gemini3_levels(model)?;
    if budget == -1 {
        return levels.last().map(|name| name.to_string());
    }
    if budget < -1 {
        return None;
    }
    if is_gemini3_pro_model(model) {
        return Some(if budget <= 8192 { "low" } else { "high" }.to_string());
    }
    if budget == 0 {
        return levels.first().map(|name| name.to_string());
    }
    let chosen = LEVEL_LADDER
        .iter()
        .filter(|(name, _)| levels.contains(name))
        .find(|(_, level_budget)| *level_budget >= budget)
        .map(|(name, _)| *name)
        .unwrap_or("high");
    Some(chosen.to_string())
}

// ---- Projections onto provider-native payloads ----

/// Which JSON field a level dialect reads the effort from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffortField {
    /// OpenAI Chat `reasoning_effort`.
    TopLevel,
    /// OpenAI Responses / Codex `reasoning.effort`.
    Nested,
}

/// Projects the directive onto a Gemini payload
/// (`generationConfig.thinkingConfig`).
pub fn project_gemini(
    payload: &mut Value,
    base_model: &str,
    desc: Option<&ModelDescriptor>,
    directive: &ThinkingDirective,
) {
    if is_gemini3_model(base_model) {
        project_gemini3(payload, base_model, directive);
        return;
    }

    let Some(desc) = desc else {
        remove_thinking_config(payload);
        return;
    };
    match &desc.thinking {
        ThinkingSupport::Budget { .. } => {}
        _ => {
            remove_thinking_config(payload);
            return;
        }
    }

    let budget = match directive {
        ThinkingDirective::Budget(budget) => Some(clamp_budget(desc, *budget)),
        ThinkingDirective::Effort(effort) if effort == "none" => {
            remove_thinking_config(payload);
            return;
        }
        ThinkingDirective::Effort(effort) => effort_to_budget(desc, effort),
        ThinkingDirective::Unset | ThinkingDirective::Raw(_) => {
            // A budget already present in the payload is still clamped
            // into the model's range.
            if let Some(existing) = thinking_budget_mut(payload) {
                if let Some(current) = existing.as_i64() {
                    *existing = Value::from(clamp_budget(desc, current));
                }
            }
            return;
        }
    };

    match budget {
        Some(budget) => set_thinking_budget(payload, budget),
        None => {}
    }
}

fn project_gemini3(payload: &mut Value, base_model: &str, directive: &ThinkingDirective) {
    let level = match directive {
        ThinkingDirective::Budget(budget) => gemini3_budget_to_level(base_model, *budget),
        ThinkingDirective::Effort(effort) => match effort.as_str() {
            "auto" => gemini3_levels(base_model)
                .and_then(|levels| levels.last())
                .map(|name| name.to_string()),
            "none" => gemini3_levels(base_model)
                .and_then(|levels| levels.first())
                .map(|name| name.to_string()),
            name => validate_gemini3_level(base_model, name),
        },
        ThinkingDirective::Unset | ThinkingDirective::Raw(_) => {
            // Validate an explicit thinkingLevel if the payload carries one.
            let existing = thinking_config(payload)
                .and_then(|config| config.get("thinkingLevel"))
                .and_then(|value| value.as_str())
                .map(|value| value.to_string());
            if let Some(existing) = existing {
                match validate_gemini3_level(base_model, &existing) {
                    Some(valid) => set_thinking_level(payload, &valid),
                    None => remove_thinking_config(payload),
                }
            } else if let Some(budget) = thinking_budget_mut(payload).and_then(|v| v.as_i64()) {
                // Budget-style input against a level-only model.
                match gemini3_budget_to_level(base_model, budget) {
                    Some(level) => set_thinking_level(payload, &level),
                    None => remove_thinking_config(payload),
                }
            }
            return;
        }
    };
    match level {
        Some(level) => set_thinking_level(payload, &level),
        None => remove_thinking_config(payload),
    }
}

/// Projects the directive onto a Claude payload (`thinking` block).
pub fn project_claude(
    payload: &mut Value,
    desc: Option<&ModelDescriptor>,
    directive: &ThinkingDirective,
) {
    let Some(desc) = desc else {
        remove_key(payload, "thinking");
        return;
    };
    if !matches!(desc.thinking, ThinkingSupport::Budget { .. }) {
        remove_key(payload, "thinking");
        return;
    }

    let budget = match directive {
        ThinkingDirective::Budget(budget) if *budget > 0 => Some(clamp_budget(desc, *budget)),
        ThinkingDirective::Budget(_) => {
            remove_key(payload, "thinking");
            return;
        }
        ThinkingDirective::Effort(effort) => match effort.as_str() {
            "none" | "auto" => {
                remove_key(payload, "thinking");
                return;
            }
            name => effort_to_budget(desc, name).filter(|budget| *budget > 0),
        },
        ThinkingDirective::Unset | ThinkingDirective::Raw(_) => {
            let existing = payload
                .get("thinking")
                .and_then(|thinking| thinking.get("budget_tokens"))
                .and_then(|value| value.as_i64());
            if let Some(existing) = existing {
                let clamped = clamp_budget(desc, existing);
                if clamped != existing {
                    set_claude_thinking(payload, clamped);
                }
            }
            return;
        }
    };

    match budget {
        Some(budget) => set_claude_thinking(payload, budget),
        None => remove_key(payload, "thinking"),
    }
}

/// Projects the directive onto a level dialect (`reasoning_effort` /
/// `reasoning.effort`).
///
/// An effort already present in the payload wins over the directive.
/// `allow_compat` passes unknown-model efforts through verbatim
/// (lowercased); strict targets reject names missing from the level
/// table.
pub fn project_effort(
    payload: &mut Value,
    desc: Option<&ModelDescriptor>,
    directive: &ThinkingDirective,
    field: EffortField,
    allow_compat: bool,
) -> Result<(), ThinkingError> {
    let supports = desc.map(|d| d.thinking.supports_thinking()).unwrap_or(false);
    let uses_levels = desc.map(|d| d.thinking.uses_levels()).unwrap_or(false);

    if !supports && !allow_compat {
        remove_effort(payload, field);
        return Ok(());
    }

    // Explicit effort in the request body takes precedence.
    let explicit = get_effort(payload, field);
    let candidate = match explicit {
        Some(effort) => Some(effort),
        None => match directive {
            ThinkingDirective::Effort(effort) => Some(effort.clone()),
            ThinkingDirective::Budget(budget) => {
                match budget_to_effort(if uses_levels { desc } else { None }, *budget) {
                    Some(effort) => Some(effort),
                    None => {
                        remove_effort(payload, field);
                        return Ok(());
                    }
                }
            }
            ThinkingDirective::Unset | ThinkingDirective::Raw(_) => None,
        },
    };

    let Some(candidate) = candidate else {
        return Ok(());
    };
    let lowered = candidate.trim().to_ascii_lowercase();

    if allow_compat && !uses_levels {
        if lowered.is_empty() {
            remove_effort(payload, field);
        } else {
            set_effort(payload, field, &lowered);
        }
        return Ok(());
    }

    if !uses_levels {
        remove_effort(payload, field);
        return Ok(());
    }

    // `auto` is not a level; the field is simply dropped. `none`
    // degrades to the smallest configured level.
    if lowered == "auto" {
        remove_effort(payload, field);
        return Ok(());
    }
    let desc = desc.expect("level table checked above");
    if lowered == "none" {
        if let ThinkingSupport::Levels { levels } = &desc.thinking {
            if let Some((smallest, _)) = levels.first() {
                set_effort(payload, field, smallest);
            }
        }
        return Ok(());
    }

    match normalize_effort_level(desc, &lowered) {
        Some(valid) => {
            set_effort(payload, field, &valid);
            Ok(())
        }
        None => Err(ThinkingError::InvalidEffort {
            model: desc.id.clone(),
            effort: candidate,
        }),
    }
}

// ---- JSON plumbing ----

fn object_entry<'a>(value: &'a mut Value, key: &str) -> &'a mut Value {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value
        .as_object_mut()
        .expect("object ensured above")
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
}

fn thinking_config(payload: &Value) -> Option<&Value> {
    payload.get("generationConfig")?.get("thinkingConfig")
}

fn thinking_budget_mut(payload: &mut Value) -> Option<&mut Value> {
    payload
        .get_mut("generationConfig")?
        .get_mut("thinkingConfig")?
        .get_mut("thinkingBudget")
}

fn set_thinking_budget(payload: &mut Value, budget: i64) {
    let config = object_entry(object_entry(payload, "generationConfig"), "thinkingConfig");
    if let Some(object) = config.as_object_mut() {
        object.remove("thinkingLevel");
        object.insert("thinkingBudget".to_string(), Value::from(budget));
    }
}

fn set_thinking_level(payload: &mut Value, level: &str) {
    let config = object_entry(object_entry(payload, "generationConfig"), "thinkingConfig");
    if let Some(object) = config.as_object_mut() {
        object.remove("thinkingBudget");
        object.insert("thinkingLevel".to_string(), Value::from(level));
    }
}

fn remove_thinking_config(payload: &mut Value) {
    if let Some(config) = payload
        .get_mut("generationConfig")
        .and_then(|value| value.as_object_mut())
    {
        config.remove("thinkingConfig");
        if config.is_empty() {
            remove_key(payload, "generationConfig");
        }
    }
}

fn set_claude_thinking(payload: &mut Value, budget: i64) {
    if let Some(object) = payload.as_object_mut() {
        object.insert(
            "thinking".to_string(),
            serde_json::json!({"type": "enabled", "budget_tokens": budget}),
        );
    }
}

fn remove_key(payload: &mut Value, key: &str) {
    if let Some(object) = payload.as_object_mut() {
        object.remove(key);
    }
}

fn get_effort(payload: &Value, field: EffortField) -> Option<String> {
    let value = match field {
        EffortField::TopLevel => payload.get("reasoning_effort"),
        EffortField::Nested => payload.get("reasoning")?.get("effort"),
    };
    value
        .and_then(|value| value.as_str())
        .filter(|effort| !effort.trim().is_empty())
        .map(|effort| effort.to_string())
}

fn set_effort(payload: &mut Value, field: EffortField, effort: &str) {
    match field {
        EffortField::TopLevel => {
            if let Some(object) = payload.as_object_mut() {
                object.insert("reasoning_effort".to_string(), Value::from(effort));
            }
        }
        EffortField::Nested => {
            let reasoning = object_entry(payload, "reasoning");
            if let Some(object) = reasoning.as_object_mut() {
                object.insert("effort".to_string(), Value::from(effort));
            }
        }
    }
}

fn remove_effort(payload: &mut Value, field: EffortField) {
    match field {
        EffortField::TopLevel => remove_key(payload, "reasoning_effort"),
        EffortField::Nested => {
            if let Some(reasoning) = payload
                .get_mut("reasoning")
                .and_then(|value| value.as_object_mut())
            {
                reasoning.remove("effort");
                if reasoning.is_empty() {
                    remove_key(payload, "reasoning");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{builtin_gemini_models, builtin_openai_models};
    use lmgate_common::ProviderKind;
    use serde_json::json;

    fn gemini_pro() -> ModelDescriptor {
        builtin_gemini_models(ProviderKind::GeminiCli)
            .into_iter()
            .find(|model| model.id == "gemini-2.5-pro")
            .unwrap()
    }

    fn gpt5() -> ModelDescriptor {
        builtin_openai_models()
            .into_iter()
            .find(|model| model.id == "gpt-5")
            .unwrap()
    }

    fn gpt52() -> ModelDescriptor {
        builtin_openai_models()
            .into_iter()
            .find(|model| model.id == "gpt-5.2")
            .unwrap()
    }

    #[test]
    fn parses_effort_budget_and_raw_suffixes() {
        assert_eq!(
            parse_model_suffix("gpt-5(high)"),
            ParsedModel {
                base: "gpt-5".into(),
                directive: ThinkingDirective::Effort("high".into()),
            }
        );
        assert_eq!(
            parse_model_suffix("gemini-2.5-pro(8192)"),
            ParsedModel {
                base: "gemini-2.5-pro".into(),
                directive: ThinkingDirective::Budget(8192),
            }
        );
        assert_eq!(
            parse_model_suffix("gpt-5(turbo)"),
            ParsedModel {
                base: "gpt-5".into(),
                directive: ThinkingDirective::Raw("turbo".into()),
            }
        );
        assert_eq!(
            parse_model_suffix("gemini-2.5-pro"),
            ParsedModel {
                base: "gemini-2.5-pro".into(),
                directive: ThinkingDirective::Unset,
            }
        );
    }

    #[test]
    fn budget_to_effort_follows_the_ladder() {
        let gpt5 = gpt5();
        let cases = [
            (-1, Some("auto")),
            (0, Some("minimal")),
            (1, Some("low")),
            (1024, Some("low")),
            (1025, Some("medium")),
            (8192, Some("medium")),
            (8193, Some("high")),
            (24576, Some("high")),
            (64000, Some("high")),
            (-5, None),
        ];
        for (budget, want) in cases {
            assert_eq!(
                budget_to_effort(Some(&gpt5), budget).as_deref(),
                want,
                "budget {budget}"
            );
        }
        // A model whose ladder tops out at xhigh saturates there.
        assert_eq!(
            budget_to_effort(Some(&gpt52()), 64000).as_deref(),
            Some("xhigh")
        );
    }

    #[test]
    fn effort_to_budget_handles_specials_and_case() {
        let pro = gemini_pro();
        assert_eq!(effort_to_budget(&pro, "none"), Some(0));
        assert_eq!(effort_to_budget(&pro, "auto"), Some(-1));
        assert_eq!(effort_to_budget(&pro, "minimal"), Some(512));
        assert_eq!(effort_to_budget(&pro, "LOW"), Some(1024));
        assert_eq!(effort_to_budget(&pro, "xhigh"), Some(32768));
        assert_eq!(effort_to_budget(&pro, "ultra"), None);
        assert_eq!(effort_to_budget(&pro, ""), None);
    }

    #[test]
    fn clamp_preserves_specials_and_bounds() {
        let pro = gemini_pro();
        assert_eq!(clamp_budget(&pro, -1), -1);
        assert_eq!(clamp_budget(&pro, 0), 0);
        assert_eq!(clamp_budget(&pro, 64), 128);
        assert_eq!(clamp_budget(&pro, 8192), 8192);
        assert_eq!(clamp_budget(&pro, 999999), 32768);
    }

    #[test]
    fn gemini_projection_writes_clamped_budget() {
        let pro = gemini_pro();
        let mut payload = json!({"contents": []});
        project_gemini(
            &mut payload,
            "gemini-2.5-pro",
            Some(&pro),
            &ThinkingDirective::Budget(8192),
        );
        assert_eq!(
            payload["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            8192
        );
    }

    #[test]
    fn gemini_projection_suppresses_on_none_effort() {
        let pro = gemini_pro();
        let mut payload = json!({
            "contents": [],
            "generationConfig": {"thinkingConfig": {"thinkingBudget": 100}},
        });
        project_gemini(
            &mut payload,
            "gemini-2.5-pro",
            Some(&pro),
            &ThinkingDirective::Effort("none".into()),
        );
        assert!(payload.get("generationConfig").is_none());
    }

    #[test]
    fn gemini_projection_strips_unsupported_models() {
        let mut payload = json!({
            "contents": [],
            "generationConfig": {"thinkingConfig": {"thinkingBudget": 100}},
        });
        project_gemini(
            &mut payload,
            "qwen3-code-plus",
            None,
            &ThinkingDirective::Budget(1024),
        );
        assert!(payload.get("generationConfig").is_none());
    }

    #[test]
    fn gemini3_pro_levels_from_budget() {
        let cases = [
            (-1, Some("high")),
            (0, Some("low")),
            (1000, Some("low")),
            (8000, Some("low")),
            (20000, Some("high")),
            (50000, Some("high")),
        ];
        for (budget, want) in cases {
            assert_eq!(
                gemini3_budget_to_level("gemini-3-pro-preview", budget).as_deref(),
                want,
                "budget {budget}"
            );
        }
    }

    #[test]
    fn gemini3_flash_levels_from_budget() {
        let cases = [
            (-1, Some("high")),
            (0, Some("minimal")),
            (500, Some("minimal")),
            (1000, Some("low")),
            (20000, Some("high")),
            (50000, Some("high")),
        ];
        for (budget, want) in cases {
            assert_eq!(
                gemini3_budget_to_level("gemini-3-flash-preview", budget).as_deref(),
                want,
                "budget {budget}"
            );
        }
    }

    #[test]
    fn gemini3_projection_emits_thinking_level() {
        let mut payload = json!({"contents": []});
        project_gemini(
            &mut payload,
            "gemini-3-flash-preview",
            None,
            &ThinkingDirective::Effort("minimal".into()),
        );
        assert_eq!(
            payload["generationConfig"]["thinkingConfig"]["thinkingLevel"],
            "minimal"
        );
        assert!(payload["generationConfig"]["thinkingConfig"]
            .get("thinkingBudget")
            .is_none());
    }

    #[test]
    fn gemini3_pro_rejects_minimal() {
        assert_eq!(validate_gemini3_level("gemini-3-pro-preview", "minimal"), None);
        assert_eq!(
            validate_gemini3_level("gemini-3-pro-preview", "HIGH").as_deref(),
            Some("high")
        );
        assert_eq!(validate_gemini3_level("gemini-2.5-pro", "high"), None);
    }

    #[test]
    fn claude_projection_enables_with_positive_budget() {
        let pro = gemini_pro();
        let mut payload = json!({"messages": []});
        project_claude(&mut payload, Some(&pro), &ThinkingDirective::Budget(1025));
        assert_eq!(payload["thinking"]["type"], "enabled");
        assert_eq!(payload["thinking"]["budget_tokens"], 1025);
    }

    #[test]
    fn claude_projection_suppresses_zero_auto_and_none() {
        let pro = gemini_pro();
        for directive in [
            ThinkingDirective::Budget(0),
            ThinkingDirective::Budget(-1),
            ThinkingDirective::Effort("none".into()),
            ThinkingDirective::Effort("auto".into()),
        ] {
            let mut payload = json!({"messages": [], "thinking": {"type": "enabled"}});
            project_claude(&mut payload, Some(&pro), &directive);
            assert!(payload.get("thinking").is_none(), "directive {directive:?}");
        }
    }

    #[test]
    fn effort_projection_validates_and_lowercases() {
        let gpt5 = gpt5();
        let mut payload = json!({"messages": []});
        project_effort(
            &mut payload,
            Some(&gpt5),
            &ThinkingDirective::Effort("HIGH".into()),
            EffortField::TopLevel,
            false,
        )
        .unwrap();
        assert_eq!(payload["reasoning_effort"], "high");
    }

    #[test]
    fn effort_projection_rejects_unknown_on_strict_targets() {
        let gpt5 = gpt5();
        let mut payload = json!({});
        let err = project_effort(
            &mut payload,
            Some(&gpt5),
            &ThinkingDirective::Effort("xhigh".into()),
            EffortField::Nested,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ThinkingError::InvalidEffort { .. }));
    }

    #[test]
    fn effort_projection_passes_through_for_compat_models() {
        let mut payload = json!({});
        project_effort(
            &mut payload,
            None,
            &ThinkingDirective::Effort("Ultra".into()),
            EffortField::TopLevel,
            true,
        )
        .unwrap();
        assert_eq!(payload["reasoning_effort"], "ultra");
    }

    #[test]
    fn effort_projection_drops_auto_and_maps_budget() {
        let gpt5 = gpt5();
        let mut payload = json!({});
        project_effort(
            &mut payload,
            Some(&gpt5),
            &ThinkingDirective::Budget(-1),
            EffortField::TopLevel,
            false,
        )
        .unwrap();
        assert!(payload.get("reasoning_effort").is_none());

        let mut payload = json!({});
        project_effort(
            &mut payload,
            Some(&gpt5),
            &ThinkingDirective::Budget(8193),
            EffortField::Nested,
            false,
        )
        .unwrap();
        assert_eq!(payload["reasoning"]["effort"], "high");
    }

    #[test]
    fn explicit_effort_wins_over_directive_budget() {
        let gpt5 = gpt5();
        let mut payload = json!({"reasoning_effort": "low"});
        project_effort(
            &mut payload,
            Some(&gpt5),
            &ThinkingDirective::Budget(24576),
            EffortField::TopLevel,
            false,
        )
        .unwrap();
        assert_eq!(payload["reasoning_effort"], "low");
    }

    #[test]
    fn effort_projection_strips_for_non_thinking_models() {
        let mut payload = json!({"reasoning_effort": "high"});
        project_effort(
            &mut payload,
            None,
            &ThinkingDirective::Unset,
            EffortField::TopLevel,
            false,
        )
        .unwrap();
        assert!(payload.get("reasoning_effort").is_none());
    }

    #[test]
    fn projection_is_idempotent() {
        let pro = gemini_pro();
        let mut payload = json!({"contents": []});
        let directive = ThinkingDirective::Budget(8192);
        project_gemini(&mut payload, "gemini-2.5-pro", Some(&pro), &directive);
        let once = payload.clone();
        project_gemini(&mut payload, "gemini-2.5-pro", Some(&pro), &directive);
        assert_eq!(once, payload);
    }
}
