// ─── Descriptor Merge ───
// Deep-merges a child version descriptor over its parent.

use serde_json::{Map, Value};

/// Merge `child` over `parent`, returning the combined document.
///
/// Per key:
/// - parent lacks the key (or holds `null`): child value is taken;
/// - both arrays: `[...child, ...parent]`;
/// - both objects: merged recursively with the same rule;
/// - anything else (same-typed scalars, or mismatched types): child wins.
pub fn merge_descriptors(parent: Value, child: Value) -> Value {
    match (parent, child) {
        (Value::Object(parent), Value::Object(child)) => {
            Value::Object(merge_objects(parent, child))
        }
        (Value::Array(parent), Value::Array(child)) => {
            Value::Array(concat_child_first(parent, child))
        }
        (_, child) => child,
    }
}

fn merge_objects(mut parent: Map<String, Value>, child: Map<String, Value>) -> Map<String, Value> {
    for (key, child_value) in child {
        let merged = match parent.remove(&key) {
            None | Some(Value::Null) => child_value,
            Some(parent_value) => merge_descriptors(parent_value, child_value),
        };
        parent.insert(key, merged);
    }
    parent
}

fn concat_child_first(parent: Vec<Value>, mut child: Vec<Value>) -> Vec<Value> {
    child.extend(parent);
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn disjoint_keys_are_united() {
        let merged = merge_descriptors(json!({"a": 1}), json!({"b": 2}));
        assert_eq!(merged, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn shared_arrays_put_child_items_first() {
        let parent = json!({"libraries": [{"name": "Y"}]});
        let child = json!({"libraries": [{"name": "X"}]});
        let merged = merge_descriptors(parent, child);
        assert_eq!(merged["libraries"], json!([{"name": "X"}, {"name": "Y"}]));
    }

    #[test]
    fn shared_scalars_take_the_child_value() {
        let merged = merge_descriptors(
            json!({"mainClass": "parent.Main", "minimumLauncherVersion": 21}),
            json!({"mainClass": "child.Main", "minimumLauncherVersion": 4}),
        );
        assert_eq!(merged["mainClass"], "child.Main");
        assert_eq!(merged["minimumLauncherVersion"], 4);
    }

    #[test]
    fn nested_objects_merge_recursively() {
        let parent = json!({"arguments": {"game": ["--parent"], "jvm": ["-Xss1M"]}});
        let child = json!({"arguments": {"game": ["--child"]}});
        let merged = merge_descriptors(parent, child);
        assert_eq!(merged["arguments"]["game"], json!(["--child", "--parent"]));
        assert_eq!(merged["arguments"]["jvm"], json!(["-Xss1M"]));
    }

    #[test]
    fn mismatched_types_let_the_child_win() {
        let merged = merge_descriptors(json!({"assets": {"id": "x"}}), json!({"assets": "legacy"}));
        assert_eq!(merged["assets"], "legacy");
    }

    #[test]
    fn null_parent_value_counts_as_absent() {
        let merged = merge_descriptors(json!({"logging": null}), json!({"logging": {"client": {}}}));
        assert_eq!(merged["logging"], json!({"client": {}}));
    }
}
