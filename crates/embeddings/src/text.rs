//! Text rendering of a context for embedding.

use serde_json::Value;
use tof_core::context::{Context, ContextType};

/// Render the text encoded for a context.
///
/// `"{TYPE} {tags} {data as JSON}"` with tags in sorted order and object keys
/// sorted, so equal contexts always render equal text. A FEELING context with
/// a `mood` field renders its mood and insights instead of raw JSON.
pub fn render_context_text(context: &Context) -> String {
    let mut parts = vec![context.context_type().as_str().to_string()];
    parts.extend(context.metadata.tags.iter().cloned());

    match (context.context_type(), context.data.get("mood")) {
        (ContextType::Feeling, Some(mood)) => {
            parts.push(scalar_text(mood));
            if let Some(Value::Array(insights)) = context.data.get("insights") {
                parts.extend(insights.iter().map(scalar_text));
            }
        }
        _ => parts.push(Value::Object(context.data.clone()).to_string()),
    }

    parts.join(" ")
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(data: Value, context_type: ContextType, tags: &[&str]) -> Context {
        Context::new(
            "c1",
            data.as_object().cloned().unwrap(),
            context_type,
            tags.iter().map(|t| t.to_string()),
            None,
        )
    }

    #[test]
    fn renders_type_tags_and_sorted_json() {
        let c = ctx(json!({"b": 2, "a": 1}), ContextType::Tool, &["zeta", "alpha"]);
        assert_eq!(render_context_text(&c), r#"TOOL alpha zeta {"a":1,"b":2}"#);
    }

    #[test]
    fn renders_feeling_mood_and_insights() {
        let c = ctx(
            json!({"mood": "stressed", "insights": ["CPU high", "Memory low"], "confidence": 0.9}),
            ContextType::Feeling,
            &[],
        );
        assert_eq!(render_context_text(&c), "FEELING stressed CPU high Memory low");
    }

    #[test]
    fn feeling_without_mood_uses_json() {
        let c = ctx(json!({"note": "x"}), ContextType::Feeling, &[]);
        assert_eq!(render_context_text(&c), r#"FEELING {"note":"x"}"#);
    }

    #[test]
    fn empty_payload() {
        let c = ctx(json!({}), ContextType::Test, &[]);
        assert_eq!(render_context_text(&c), "TEST {}");
    }
}
