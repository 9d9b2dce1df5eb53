use crate::vocabulary::CanonicalField;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Flat key/value map as returned by the OCR provider
pub type RawOcrFields = Map<String, Value>;

/// Normalized output of one scan: canonical fields plus an open bucket for
/// everything that did not resolve to a canonical name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalFieldMap {
    fields: BTreeMap<CanonicalField, String>,
    extras: BTreeMap<String, Value>,
}

impl CanonicalFieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Value of `field`, or the empty string when absent
    #[inline]
    pub fn get_or_empty(&self, field: CanonicalField) -> &str {
        self.get(field).unwrap_or("")
    }

    #[inline]
    pub fn contains(&self, field: CanonicalField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn insert(&mut self, field: CanonicalField, value: impl Into<String>) -> Option<String> {
        self.fields.insert(field, value.into())
    }

    pub fn insert_extra(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.extras.insert(key.into(), value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn extras(&self) -> &BTreeMap<String, Value> {
        &self.extras
    }

    pub fn len(&self) -> usize {
        self.fields.len() + self.extras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.extras.is_empty()
    }

    /// Flatten into a single JSON object; canonical fields shadow extras
    /// with the same key.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut out: Map<String, Value> = self
            .extras
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (field, value) in &self.fields {
            out.insert(field.as_str().to_string(), Value::String(value.clone()));
        }
        out
    }
}

impl Serialize for CanonicalFieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flattened_json() {
        let mut map = CanonicalFieldMap::new();
        map.insert(CanonicalField::Make, "DELL");
        map.insert_extra("firmware", json!("A01"));

        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(value, json!({"make": "DELL", "firmware": "A01"}));
    }

    #[test]
    fn test_missing_field_reads_empty() {
        let map = CanonicalFieldMap::new();
        assert_eq!(map.get_or_empty(CanonicalField::Psid), "");
        assert!(map.is_empty());
    }
}
