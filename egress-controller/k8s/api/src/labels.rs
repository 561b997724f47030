use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Map = BTreeMap<String, String>;

pub type Expressions = Vec<Expression>;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Expression {
    pub key: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// A Kubernetes label selector, as carried by workload and node selectors.
#[derive(Clone, Debug, Eq, PartialEq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<Map>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Expressions>,
}

// === Selector ===

impl Selector {
    pub fn from_map(map: Map) -> Self {
        Self {
            match_labels: Some(map),
            match_expressions: None,
        }
    }

    /// Returns the value required for `key`, if the selector pins one.
    pub fn match_label(&self, key: &str) -> Option<&str> {
        self.match_labels.as_ref()?.get(key).map(String::as_str)
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::iter::FromIterator;

    #[test]
    fn match_label() {
        let selector = Selector::from_iter(Some(("kubernetes.io/hostname", "node-3")));
        assert_eq!(selector.match_label("kubernetes.io/hostname"), Some("node-3"));
        assert_eq!(selector.match_label("topology.kubernetes.io/zone"), None);
        assert_eq!(Selector::default().match_label("kubernetes.io/hostname"), None);
    }

    #[test]
    fn deserializes_expressions() {
        let selector = serde_json::from_value::<Selector>(serde_json::json!({
            "matchExpressions": [
                { "key": "egress", "operator": "Exists" },
                { "key": "zone", "operator": "In", "values": ["a", "b"] },
            ],
        }))
        .expect("selector must deserialize");
        assert_eq!(selector.match_labels, None);
        assert_eq!(
            selector.match_expressions,
            Some(vec![
                Expression {
                    key: "egress".to_string(),
                    operator: Operator::Exists,
                    values: None,
                },
                Expression {
                    key: "zone".to_string(),
                    operator: Operator::In,
                    values: Some(vec!["a".to_string(), "b".to_string()]),
                },
            ])
        );
    }
}
