use crate::domain::flow_definition::{StepDefinition, StepType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Template expressions of the form `{{identifier}}` embedded in step data
static EXPRESSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[^{}]+\}\}").expect("expression pattern is valid"));

/// Classifier verdict for a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowMode {
    /// Fixed trigger/action flow with no per-step configuration
    Basic,
    /// Dynamic flow: at least one configured step or templated data value
    Advanced,
}

/// Classify a normalized step list as basic or advanced
///
/// A basic flow is made exclusively of unconfigured `action`/`trigger`
/// steps with no templated data. A single step with a non-empty `config`, a
/// custom step kind, or a `{{...}}` expression anywhere in a step's `data`
/// makes the whole flow advanced; the scan short-circuits on the first such
/// step. Classification is deterministic over the normalized list.
pub fn classify(steps: &[StepDefinition]) -> FlowMode {
    for step in steps {
        if !step.config.is_empty() {
            return FlowMode::Advanced;
        }

        if !matches!(step.step_type, StepType::Action | StepType::Trigger) {
            return FlowMode::Advanced;
        }

        if step.data.values().any(has_expressions) {
            return FlowMode::Advanced;
        }
    }

    FlowMode::Basic
}

/// Check whether a JSON-like value embeds a `{{...}}` template expression
///
/// Depth-first over nested objects and arrays; only string values are
/// matched against the expression pattern.
pub fn has_expressions(value: &Value) -> bool {
    match value {
        Value::String(text) => EXPRESSION_PATTERN.is_match(text),
        Value::Object(map) => map.values().any(has_expressions),
        Value::Array(items) => items.iter().any(has_expressions),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::flow_definition::normalize_steps;
    use serde_json::json;

    fn steps_from(config: serde_json::Value) -> Vec<StepDefinition> {
        normalize_steps(&config).unwrap()
    }

    #[test]
    fn test_unconfigured_trigger_action_flow_is_basic() {
        let steps = steps_from(json!({
            "steps": [
                {"id": "start", "type": "trigger"},
                {"id": "work", "type": "action"}
            ]
        }));

        assert_eq!(classify(&steps), FlowMode::Basic);
    }

    #[test]
    fn test_single_configured_step_makes_flow_advanced() {
        let steps = steps_from(json!({
            "steps": [
                {"id": "start", "type": "trigger"},
                {"id": "work", "type": "action", "config": {"retries": 3}}
            ]
        }));

        assert_eq!(classify(&steps), FlowMode::Advanced);
    }

    #[test]
    fn test_expression_in_step_data_makes_flow_advanced() {
        let steps = steps_from(json!({
            "steps": [
                {"id": "work", "type": "action", "data": {"target": "{{previous.output}}"}}
            ]
        }));

        assert_eq!(classify(&steps), FlowMode::Advanced);
    }

    #[test]
    fn test_classification_is_monotonic() {
        // Basic flow
        let basic = json!({
            "steps": [
                {"id": "a", "type": "action", "data": {"note": "plain"}},
                {"id": "b", "type": "action"}
            ]
        });
        assert_eq!(classify(&steps_from(basic)), FlowMode::Basic);

        // Adding a config to any step flips the verdict
        let configured = json!({
            "steps": [
                {"id": "a", "type": "action", "data": {"note": "plain"}},
                {"id": "b", "type": "action", "config": {"mode": "fast"}}
            ]
        });
        assert_eq!(classify(&steps_from(configured)), FlowMode::Advanced);

        // Stripping configs and expressions flips it back
        let stripped = json!({
            "steps": [
                {"id": "a", "type": "action", "data": {"note": "plain"}},
                {"id": "b", "type": "action"}
            ]
        });
        assert_eq!(classify(&steps_from(stripped)), FlowMode::Basic);
    }

    #[test]
    fn test_custom_step_kind_makes_flow_advanced() {
        let steps = steps_from(json!({
            "steps": [{"id": "a", "type": "enrich"}]
        }));

        assert_eq!(classify(&steps), FlowMode::Advanced);
    }

    #[test]
    fn test_has_expressions_flat() {
        assert!(has_expressions(&json!({"a": "{{x}}"})));
        assert!(!has_expressions(&json!({"a": "plain"})));
    }

    #[test]
    fn test_has_expressions_nested() {
        assert!(has_expressions(&json!({"a": {"b": "{{x}}"}})));
        assert!(has_expressions(&json!({"a": ["{{x}}"]})));
        assert!(has_expressions(&json!([{"deep": [{"deeper": "{{x.y}}"}]}])));
    }

    #[test]
    fn test_has_expressions_ignores_non_strings_and_braces() {
        assert!(!has_expressions(&json!({"a": 42, "b": true, "c": null})));
        // Unbalanced or empty braces are not expressions
        assert!(!has_expressions(&json!({"a": "{{}}"})));
        assert!(!has_expressions(&json!({"a": "{not an expression}"})));
    }

    #[test]
    fn test_flow_mode_serialization() {
        assert_eq!(serde_json::to_value(FlowMode::Basic).unwrap(), json!("basic"));
        assert_eq!(
            serde_json::to_value(FlowMode::Advanced).unwrap(),
            json!("advanced")
        );
    }
}
