//! # Property Values
//!
//! [`Value`] is the property-bag type of a template. Besides plain scalars,
//! lists and maps it carries the cross-resource references the orchestrator
//! resolves at deploy time (`Ref`, `Fn::GetAtt`, pseudo-parameters).

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Values the orchestrator supplies at deploy time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoParameter {
    Region,
    AccountId,
    StackName,
    StackId,
}

impl PseudoParameter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Region => "AWS::Region",
            Self::AccountId => "AWS::AccountId",
            Self::StackName => "AWS::StackName",
            Self::StackId => "AWS::StackId",
        }
    }
}

/// A template property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Bool(bool),
    Integer(i64),
    List(Vec<Value>),
    /// Ordered key/value pairs; rendered in insertion order.
    Map(Vec<(String, Value)>),
    /// `Ref` to another resource by logical name. `template` is the id of the
    /// template whose handle produced it, `None` for hand-written references.
    Ref {
        resource: String,
        template: Option<u64>,
    },
    /// `Fn::GetAtt` on another resource.
    GetAtt {
        resource: String,
        attribute: String,
        template: Option<u64>,
    },
    Pseudo(PseudoParameter),
}

impl Value {
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// `Ref` by logical name, not tied to any template.
    pub fn reference(resource: impl Into<String>) -> Self {
        Value::Ref {
            resource: resource.into(),
            template: None,
        }
    }

    /// `Fn::GetAtt` by logical name, not tied to any template.
    pub fn get_att(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::GetAtt {
            resource: resource.into(),
            attribute: attribute.into(),
            template: None,
        }
    }

    /// Logical names this value points at, in the order they appear.
    pub fn references(&self) -> Vec<&str> {
        self.scoped_references()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    /// Like [`Value::references`], paired with the originating template id.
    pub(crate) fn scoped_references(&self) -> Vec<(&str, Option<u64>)> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<(&'a str, Option<u64>)>) {
        match self {
            Value::Ref { resource, template } | Value::GetAtt { resource, template, .. } => {
                out.push((resource, *template))
            }
            Value::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            Value::Map(entries) => entries.iter().for_each(|(_, v)| v.collect_references(out)),
            Value::String(_) | Value::Bool(_) | Value::Integer(_) | Value::Pseudo(_) => {}
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<PseudoParameter> for Value {
    fn from(value: PseudoParameter) -> Self {
        Value::Pseudo(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Ref { resource, .. } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", resource)?;
                map.end()
            }
            Value::GetAtt {
                resource,
                attribute,
                ..
            } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAtt", &[resource, attribute])?;
                map.end()
            }
            Value::Pseudo(param) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", param.as_str())?;
                map.end()
            }
        }
    }
}

/// Resource tags, rendered as a list of `{Key, Value}` maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tags(Vec<(String, String)>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for the single `Name` tag most resources carry.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new().with("Name", name)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Tags> for Value {
    fn from(tags: Tags) -> Self {
        Value::List(
            tags.0
                .into_iter()
                .map(|(key, value)| Value::map([("Key", key), ("Value", value)]))
                .collect(),
        )
    }
}

/// Property bag of a resource definition, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Vec<(String, Value)>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Like [`with`](Self::with) but skips `None`.
    pub fn with_opt<V: Into<Value>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    /// Skips empty tag sets so untagged resources render without a `Tags` key.
    pub fn with_tags(self, key: impl Into<String>, tags: Tags) -> Self {
        if tags.is_empty() {
            self
        } else {
            self.with(key, tags)
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_walk_nested_values() {
        let value = Value::map([
            ("VPCId", Value::reference("VPC")),
            ("VPCRegion", Value::Pseudo(PseudoParameter::Region)),
            (
                "Extra",
                Value::List(vec![Value::get_att("EIP", "AllocationId")]),
            ),
        ]);
        assert_eq!(value.references(), vec!["VPC", "EIP"]);
    }

    #[test]
    fn test_intrinsics_render_as_orchestrator_functions() {
        let value = Value::List(vec![
            Value::reference("VPC"),
            Value::get_att("EIP", "AllocationId"),
            Value::Pseudo(PseudoParameter::Region),
        ]);
        let yaml = serde_yaml::to_string(&value).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let expected: serde_yaml::Value = serde_yaml::from_str(
            "[{Ref: VPC}, {'Fn::GetAtt': [EIP, AllocationId]}, {Ref: 'AWS::Region'}]",
        )
        .unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_properties_insert_replaces_in_place() {
        let mut props = Properties::new().with("A", 1i64).with("B", "two");
        props.insert("A", 3i64);
        let keys: Vec<_> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(props.get("A"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_empty_tags_are_skipped() {
        let props = Properties::new().with_tags("Tags", Tags::new());
        assert!(props.is_empty());
    }
}
