use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::enums::Value;
use crate::error::CoreError;

/// One row, keyed by column name in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(column.into(), value.into())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.shift_remove(column)
    }

    /// The integer `id` column, if present.
    pub fn id(&self) -> Option<i64> {
        self.get("id").and_then(Value::as_i64)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns a copy without the listed columns.
    pub fn without(&self, excluded: &[&str]) -> Record {
        self.iter()
            .filter(|(column, _)| !excluded.contains(column))
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect()
    }

    /// Builds a record from a serialized JSON object.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(column, value)| Ok((column, Value::from_json(value)?)))
                .collect(),
            other => Err(CoreError::Conversion(format!(
                "expected a JSON object for a record, got {other}"
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(column, value)| (column.to_string(), value.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record(iter.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let record = Record::new()
            .with("symbol", "IBM")
            .with("quantity", 100)
            .with("id", 7i64);
        assert_eq!(record.columns().collect::<Vec<_>>(), ["symbol", "quantity", "id"]);
        assert_eq!(record.id(), Some(7));
    }

    #[test]
    fn without_drops_listed_columns() {
        let record = Record::new()
            .with("id", 1)
            .with("symbol", "IBM")
            .with("created_at", "2023-01-01T00:00:00");
        let trimmed = record.without(&["id", "created_at"]);
        assert_eq!(trimmed, Record::new().with("symbol", "IBM"));
    }

    #[test]
    fn rejects_non_object_json() {
        assert!(Record::from_json(serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn serde_round_trip_keeps_date_text() {
        let record = Record::new()
            .with("date", "2024-01-19T00:00:00Z")
            .with("quantity", 100)
            .with("is_active", true);
        let json = serde_json::to_value(&record).unwrap();
        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.get("date"), Some(&Value::Text("2024-01-19T00:00:00Z".to_string())));
    }
}
