//! Typed value carrier for prompts, transform outputs, and run-state entries.
//!
//! Transforms in the source system pass arbitrary language objects around. This crate
//! prefers a closed sum type so predicates and the scheduler can reason about shape
//! without downcasting: `Null | Bool | Number | Text | Sequence | Mapping | Opaque`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A value flowing through the graph: a node's `prompt`, the output it returns, or an
/// entry in the shared run state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Payload {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Sequence(Vec<Payload>),
    Mapping(BTreeMap<String, Payload>),
    /// Escape hatch for shapes the other variants don't model cleanly.
    Opaque(Value),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Null
    }
}

impl Payload {
    pub fn text(s: impl Into<String>) -> Self {
        Payload::Text(s.into())
    }

    pub fn number(n: impl Into<f64>) -> Self {
        Payload::Number(n.into())
    }

    pub fn sequence(items: impl IntoIterator<Item = Payload>) -> Self {
        Payload::Sequence(items.into_iter().collect())
    }

    /// Elements of `self` as an ordered slice, treating scalars as a singleton and
    /// `Null` as empty. Used by `Subset`/`Superset`/`Emptyset` matching.
    pub fn as_elements(&self) -> Vec<Payload> {
        match self {
            Payload::Null => Vec::new(),
            Payload::Sequence(items) => items.clone(),
            Payload::Opaque(Value::Array(items)) => {
                items.iter().cloned().map(Payload::Opaque).collect()
            }
            Payload::Opaque(Value::Null) => Vec::new(),
            other => vec![other.clone()],
        }
    }

    /// True if this value represents an empty ordered-sequence/set, or is absent.
    pub fn is_empty_set(&self) -> bool {
        match self {
            Payload::Null => true,
            Payload::Sequence(items) => items.is_empty(),
            Payload::Mapping(map) => map.is_empty(),
            Payload::Opaque(Value::Null) => true,
            Payload::Opaque(Value::Array(items)) => items.is_empty(),
            Payload::Opaque(Value::Object(map)) => map.is_empty(),
            _ => false,
        }
    }

    /// Length used by pre-transform functions such as `len`.
    pub fn len(&self) -> usize {
        self.as_elements().len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty_set()
    }

    /// Shallow merge: mappings combine key-by-key (right wins on conflict); anything
    /// else is wrapped into a two-element sequence. Used when a join node's upstream
    /// bundle needs to be folded into a single output.
    pub fn merge(&self, other: &Payload) -> Payload {
        match (self, other) {
            (Payload::Mapping(a), Payload::Mapping(b)) => {
                let mut merged = a.clone();
                for (k, v) in b {
                    merged.insert(k.clone(), v.clone());
                }
                Payload::Mapping(merged)
            }
            (Payload::Null, other) => other.clone(),
            (me, Payload::Null) => me.clone(),
            (Payload::Sequence(a), Payload::Sequence(b)) => {
                let mut merged = a.clone();
                merged.extend(b.clone());
                Payload::Sequence(merged)
            }
            (me, other) => Payload::Sequence(vec![me.clone(), other.clone()]),
        }
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Number(value as f64)
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Number(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<Vec<Payload>> for Payload {
    fn from(value: Vec<Payload>) -> Self {
        Payload::Sequence(value)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Opaque(value)
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Null => write!(f, "null"),
            Payload::Bool(b) => write!(f, "{b}"),
            Payload::Number(n) => write!(f, "{n}"),
            Payload::Text(t) => write!(f, "{t}"),
            Payload::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Payload::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Payload::Opaque(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_detection() {
        assert!(Payload::Null.is_empty_set());
        assert!(Payload::Sequence(vec![]).is_empty_set());
        assert!(!Payload::Sequence(vec![Payload::Number(1.0)]).is_empty_set());
    }

    #[test]
    fn scalar_coerces_to_singleton() {
        let scalar = Payload::text("get_weather");
        assert_eq!(scalar.as_elements(), vec![Payload::text("get_weather")]);
    }

    #[test]
    fn mapping_merge_prefers_right_on_conflict() {
        let mut left = BTreeMap::new();
        left.insert("a".to_string(), Payload::Number(1.0));
        let mut right = BTreeMap::new();
        right.insert("a".to_string(), Payload::Number(2.0));
        right.insert("b".to_string(), Payload::Number(3.0));
        let merged = Payload::Mapping(left).merge(&Payload::Mapping(right));
        assert_eq!(
            merged,
            Payload::Mapping(BTreeMap::from([
                ("a".to_string(), Payload::Number(2.0)),
                ("b".to_string(), Payload::Number(3.0)),
            ]))
        );
    }
}
