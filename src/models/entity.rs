// src/models/entity.rs

//! Reference entities served by the list protocol.
//!
//! Every entity knows the upstream `request` name, the `who` selector and the
//! field map used to build it from an upstream list item. The map pairs a
//! target field with the upstream source field it is copied from.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// An entity decodable from the list protocol.
pub trait ListEntity: Serialize + DeserializeOwned {
    /// Value of the `request` form field.
    const REQUEST: &'static str;

    /// Value of the `who` form field.
    const WHO: u32;

    /// `(target_field, source_field)` pairs.
    const FIELD_MAP: &'static [(&'static str, &'static str)];
}

/// An institute or faculty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faculty {
    #[serde(deserialize_with = "int_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
}

impl ListEntity for Faculty {
    const REQUEST: &'static str = "facult";
    const WHO: u32 = 1;
    const FIELD_MAP: &'static [(&'static str, &'static str)] =
        &[("id", "id"), ("name", "title"), ("short_name", "name")];
}

/// A study year (course) within a faculty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(deserialize_with = "int_id")]
    pub id: i64,
    pub name: String,
}

impl ListEntity for Course {
    const REQUEST: &'static str = "potok";
    const WHO: u32 = 1;
    const FIELD_MAP: &'static [(&'static str, &'static str)] = &[("id", "id"), ("name", "name")];
}

/// A student group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(deserialize_with = "int_id")]
    pub id: i64,
    pub name: String,
}

impl ListEntity for Group {
    const REQUEST: &'static str = "group";
    const WHO: u32 = 1;
    const FIELD_MAP: &'static [(&'static str, &'static str)] = &[("id", "id"), ("name", "name")];
}

/// A department (chair) within a faculty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    #[serde(deserialize_with = "int_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
}

impl ListEntity for Department {
    const REQUEST: &'static str = "kafedra";
    const WHO: u32 = 2;
    const FIELD_MAP: &'static [(&'static str, &'static str)] =
        &[("id", "id"), ("name", "title"), ("short_name", "name")];
}

/// A teacher attached to a department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    #[serde(deserialize_with = "int_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
}

impl ListEntity for Teacher {
    const REQUEST: &'static str = "prep";
    const WHO: u32 = 2;
    const FIELD_MAP: &'static [(&'static str, &'static str)] =
        &[("id", "id"), ("name", "title"), ("short_name", "name")];
}

/// Accept an id given either as a JSON integer or as a numeric string.
pub(crate) fn int_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid integer id '{text}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_from_string() {
        let faculty: Faculty =
            serde_json::from_value(json!({"id": "3", "name": "Eng", "short_name": "ENG"})).unwrap();
        assert_eq!(faculty.id, 3);
        assert_eq!(faculty.short_name.as_deref(), Some("ENG"));
    }

    #[test]
    fn test_id_from_int() {
        let group: Group = serde_json::from_value(json!({"id": 42, "name": "21ПИ-1"})).unwrap();
        assert_eq!(group.id, 42);
    }

    #[test]
    fn test_id_rejects_text() {
        let result: std::result::Result<Course, _> =
            serde_json::from_value(json!({"id": "abc", "name": "1 курс"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialized_id_is_integer() {
        let teacher = Teacher {
            id: 7,
            name: "Иванов Иван Иванович".to_string(),
            short_name: Some("Иванов И.И.".to_string()),
        };
        let value = serde_json::to_value(&teacher).unwrap();
        assert_eq!(value["id"], json!(7));
    }
}
