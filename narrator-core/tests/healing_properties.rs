//! Property tests for the JSON healing layer.

use narrator_core::json_heal::{parse_with_healing, repair};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
        any::<String>().prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z_][a-zA-Z0-9_ ]{0,8}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

proptest! {
    #[test]
    fn prop_valid_json_is_unchanged(value in arb_json()) {
        let compact = value.to_string();
        prop_assert_eq!(repair(&compact).unwrap(), compact.clone());

        let pretty = serde_json::to_string_pretty(&value).unwrap();
        prop_assert_eq!(repair(&pretty).unwrap(), pretty);
    }

    #[test]
    fn prop_fenced_json_heals_to_same_value(
        items in prop::collection::vec(arb_json(), 0..4),
        lang in "(json)?",
    ) {
        let text = Value::Array(items).to_string();
        prop_assume!(!text.contains("```"));
        let expected: Value = serde_json::from_str(&text).unwrap();

        let fenced = format!("Here it is:\n```{lang}\n{text}\n```\nEnjoy.");
        let healed: Value = parse_with_healing(&fenced).unwrap();
        prop_assert_eq!(healed, expected);
    }

    #[test]
    fn prop_repair_output_is_valid_and_stable(text in any::<String>()) {
        if let Ok(once) = repair(&text) {
            prop_assert!(serde_json::from_str::<Value>(&once).is_ok(), "not JSON: {}", once);
            prop_assert_eq!(repair(&once).unwrap(), once);
        }
    }

    #[test]
    fn prop_truncated_json_never_panics(value in arb_json(), cut in 0usize..512) {
        let text = value.to_string();
        let end = text
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= cut)
            .last()
            .unwrap_or(0);
        if let Ok(out) = repair(&text[..end]) {
            prop_assert!(serde_json::from_str::<Value>(&out).is_ok());
        }
    }
}
