use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::Entity;

/// Schemaless JSON object entity, identified by its `id` field.
///
/// Used where no domain type exists, e.g. the command line front end.
/// A record without an `id` has an empty identifier, so all such records
/// share one cache slot; the command line rejects them up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Entity for Record {
  fn entity_id(&self) -> String {
    match self.0.get("id") {
      Some(Value::String(id)) => id.clone(),
      Some(Value::Null) | None => String::new(),
      Some(other) => other.to_string(),
    }
  }

  fn entity_type() -> &'static str {
    "record"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn record(value: Value) -> Record {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_entity_id_from_string_or_number() {
    assert_eq!(record(json!({"id": "abc"})).entity_id(), "abc");
    assert_eq!(record(json!({"id": 42})).entity_id(), "42");
    assert_eq!(record(json!({"name": "no id"})).entity_id(), "");
  }

  #[test]
  fn test_non_object_is_rejected() {
    assert!(serde_json::from_value::<Record>(json!([1, 2])).is_err());
  }
}
