//! Helm values rendering and override merging

use crate::error::HelmError;
use serde_json::Value;

/// Renders a values document to the YAML passed to helm over stdin.
pub fn render(values: &Value) -> Result<String, HelmError> {
    Ok(serde_yaml::to_string(values)?)
}

/// Merges `overlay` into `base`. Maps merge recursively, anything else is
/// replaced by the overlay, so the override always wins on conflicts.
pub fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Applies YAML override documents in declaration order.
pub fn apply_overrides(base: &mut Value, overrides: &[String]) -> Result<(), HelmError> {
    for doc in overrides {
        if doc.trim().is_empty() {
            continue;
        }
        let overlay: Value = serde_yaml::from_str(doc)?;
        merge(base, &overlay);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overrides_nested_keys_and_keeps_the_rest() {
        let mut base = json!({
            "image": {"repository": "registry", "tag": "2.8.3"},
            "replicaCount": 1,
        });
        merge(
            &mut base,
            &json!({"image": {"tag": "2.9.0"}, "extra": true}),
        );
        assert_eq!(base["image"]["repository"], "registry");
        assert_eq!(base["image"]["tag"], "2.9.0");
        assert_eq!(base["replicaCount"], 1);
        assert_eq!(base["extra"], true);
    }

    #[test]
    fn merge_replaces_sequences_wholesale() {
        let mut base = json!({"args": ["one", "two"]});
        merge(&mut base, &json!({"args": ["three"]}));
        assert_eq!(base["args"], json!(["three"]));
    }

    #[test]
    fn apply_overrides_runs_in_declaration_order() {
        let mut base = json!({"replicaCount": 1});
        apply_overrides(
            &mut base,
            &[
                "replicaCount: 2".to_string(),
                String::new(),
                "replicaCount: 3\nservice:\n  type: NodePort".to_string(),
            ],
        )
        .unwrap();
        assert_eq!(base["replicaCount"], 3);
        assert_eq!(base["service"]["type"], "NodePort");
    }

    #[test]
    fn render_emits_yaml() {
        let rendered = render(&json!({"isAirgap": true})).unwrap();
        assert!(rendered.contains("isAirgap: true"));
    }
}
