//! Field extraction from raw API records
//!
//! Every accessor validates shape and returns a [`Reason`] on mismatch;
//! the caller attaches record index, identifier and field name.

use crate::fetcher::json_kind;
use obras_common::db::Centavos;
use serde_json::{Map, Value};
use std::fmt;

pub type Object = Map<String, Value>;

/// Why a raw record was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    NotAnObject,
    MissingIdentifier,
    InvalidIdentifier(String),
    NotAList(&'static str),
    MalformedEntry(String),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::NotAnObject => write!(f, "record is not a JSON object"),
            Reason::MissingIdentifier => write!(f, "identifier missing"),
            Reason::InvalidIdentifier(detail) => write!(f, "invalid identifier: {}", detail),
            Reason::NotAList(found) => write!(f, "expected a list, found {}", found),
            Reason::MalformedEntry(detail) => write!(f, "malformed entry: {}", detail),
        }
    }
}

/// Canonical single value of a list that may hold zero or more entries
pub fn first_or_null<T>(items: &[T]) -> Option<&T> {
    items.first()
}

/// Read the record identifier (`idUnico`): a non-blank string
pub fn identifier(record: &Object, field: &str) -> Result<String, Reason> {
    match record.get(field) {
        None | Some(Value::Null) => Err(Reason::MissingIdentifier),
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        Some(Value::String(_)) => Err(Reason::InvalidIdentifier("blank string".to_string())),
        Some(other) => Err(Reason::InvalidIdentifier(format!(
            "expected a string, found {}",
            json_kind(other)
        ))),
    }
}

/// Read a list-valued field; absent or null counts as an empty list
pub fn list<'a>(record: &'a Object, field: &str) -> Result<&'a [Value], Reason> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(Reason::NotAList(json_kind(other))),
    }
}

/// First entry of a list-valued field, which must be an object if present
pub fn first_entry<'a>(record: &'a Object, field: &str) -> Result<Option<&'a Object>, Reason> {
    first_or_null(list(record, field)?)
        .map(as_object)
        .transpose()
}

pub fn as_object(value: &Value) -> Result<&Object, Reason> {
    value
        .as_object()
        .ok_or_else(|| Reason::MalformedEntry(format!("expected an object, found {}", json_kind(value))))
}

/// Optional string attribute of a nested entry
pub fn opt_string(entry: &Object, key: &str) -> Result<Option<String>, Reason> {
    match entry.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Reason::MalformedEntry(format!(
            "`{}` should be a string, found {}",
            key,
            json_kind(other)
        ))),
    }
}

/// Optional integer attribute: a JSON integer or a string of digits.
///
/// A blank string counts as absent.
pub fn opt_integer(entry: &Object, key: &str) -> Result<Option<i64>, Reason> {
    let malformed = |found: &str| {
        Reason::MalformedEntry(format!("`{}` should be an integer, found {}", key, found))
    };

    match entry.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| malformed(&n.to_string())),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| malformed(&format!("{:?}", s))),
        Some(other) => Err(malformed(json_kind(other))),
    }
}

/// Required integer attribute (dimension identifiers)
pub fn integer(entry: &Object, key: &str) -> Result<i64, Reason> {
    opt_integer(entry, key)?
        .ok_or_else(|| Reason::MalformedEntry(format!("`{}` missing", key)))
}

/// Optional monetary attribute: a JSON number or a decimal string
pub fn opt_amount(entry: &Object, key: &str) -> Result<Option<Centavos>, Reason> {
    let malformed = |found: String| {
        Reason::MalformedEntry(format!("`{}` should be an amount, found {}", key, found))
    };

    match entry.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.to_string().parse::<Centavos>().map(Some).map_err(|_| malformed(n.to_string())),
        Some(Value::String(s)) => s.parse::<Centavos>().map(Some).map_err(|_| malformed(format!("{:?}", s))),
        Some(other) => Err(malformed(json_kind(other).to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Object {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_first_or_null() {
        let empty: [i32; 0] = [];
        assert_eq!(first_or_null(&empty), None);
        assert_eq!(first_or_null(&[7, 8, 9]), Some(&7));
    }

    #[test]
    fn test_list_absent_and_null_are_empty() {
        let record = obj(json!({"tomadores": null}));
        assert!(list(&record, "tomadores").unwrap().is_empty());
        assert!(list(&record, "executores").unwrap().is_empty());
    }

    #[test]
    fn test_list_rejects_non_list() {
        let record = obj(json!({"eixos": {"id": 1}}));
        assert_eq!(list(&record, "eixos").unwrap_err(), Reason::NotAList("object"));
    }

    #[test]
    fn test_first_entry_takes_first_only() {
        let record = obj(json!({"tomadores": [{"nome": "A"}, {"nome": "B"}]}));
        let first = first_entry(&record, "tomadores").unwrap().unwrap();
        assert_eq!(first["nome"], "A");

        let record = obj(json!({"tomadores": []}));
        assert!(first_entry(&record, "tomadores").unwrap().is_none());

        let record = obj(json!({"tomadores": ["A"]}));
        assert!(matches!(first_entry(&record, "tomadores"), Err(Reason::MalformedEntry(_))));
    }

    #[test]
    fn test_identifier_rules() {
        assert_eq!(identifier(&obj(json!({"idUnico": "A1"})), "idUnico").unwrap(), "A1");
        assert_eq!(identifier(&obj(json!({})), "idUnico").unwrap_err(), Reason::MissingIdentifier);
        assert_eq!(identifier(&obj(json!({"idUnico": null})), "idUnico").unwrap_err(), Reason::MissingIdentifier);
        assert!(matches!(identifier(&obj(json!({"idUnico": " "})), "idUnico"), Err(Reason::InvalidIdentifier(_))));
        assert!(matches!(identifier(&obj(json!({"idUnico": 12})), "idUnico"), Err(Reason::InvalidIdentifier(_))));
    }

    #[test]
    fn test_integer_accepts_digit_strings() {
        let entry = obj(json!({"codigo": "5300108", "id": 4, "bad": 1.5, "text": "abc"}));
        assert_eq!(opt_integer(&entry, "codigo").unwrap(), Some(5_300_108));
        assert_eq!(integer(&entry, "id").unwrap(), 4);
        assert!(opt_integer(&entry, "bad").is_err());
        assert!(opt_integer(&entry, "text").is_err());
        assert!(integer(&entry, "missing").is_err());
        assert_eq!(opt_integer(&entry, "missing").unwrap(), None);
    }

    #[test]
    fn test_blank_integer_string_is_absent() {
        let entry = obj(json!({"codigo": "", "padded": "   ", "id": ""}));
        assert_eq!(opt_integer(&entry, "codigo").unwrap(), None);
        assert_eq!(opt_integer(&entry, "padded").unwrap(), None);
        // Required identifiers stay required
        assert!(integer(&entry, "id").is_err());
    }

    #[test]
    fn test_amount_is_exact() {
        let entry = obj(json!({"a": 1000.0, "b": "2500.75", "c": 0.1, "d": true}));
        assert_eq!(opt_amount(&entry, "a").unwrap(), Some(Centavos(100_000)));
        assert_eq!(opt_amount(&entry, "b").unwrap(), Some(Centavos(250_075)));
        assert_eq!(opt_amount(&entry, "c").unwrap(), Some(Centavos(10)));
        assert!(opt_amount(&entry, "d").is_err());
        assert_eq!(opt_amount(&entry, "zz").unwrap(), None);
    }
}
