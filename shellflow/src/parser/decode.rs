//! Structural decoding of generic values into caller types.

use crate::errors::ParseError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Per-format key names for a destination type.
///
/// `serde` attributes give a type one set of field names. Types that are
/// decoded from several formats, where the same field is spelled
/// differently in each, implement this trait to map external keys to their
/// field names per tag.
///
/// ```rust,ignore
/// #[derive(Deserialize)]
/// struct Pod {
///     name: String,
///     restarts: String,
/// }
///
/// impl FieldTags for Pod {
///     fn field_tags(tag: &str) -> &'static [(&'static str, &'static str)] {
///         match tag {
///             "table" => &[("NAME", "name"), ("RESTARTS", "restarts")],
///             _ => &[],
///         }
///     }
/// }
/// ```
pub trait FieldTags {
    /// Returns `(external key, field name)` pairs for `tag`.
    fn field_tags(tag: &str) -> &'static [(&'static str, &'static str)];
}

impl<T: FieldTags> FieldTags for Vec<T> {
    fn field_tags(tag: &str) -> &'static [(&'static str, &'static str)] {
        T::field_tags(tag)
    }
}

impl<T: FieldTags> FieldTags for Option<T> {
    fn field_tags(tag: &str) -> &'static [(&'static str, &'static str)] {
        T::field_tags(tag)
    }
}

/// Decodes generic values using a tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoder {
    tag: String,
}

impl Decoder {
    /// Creates a decoder for `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// Returns the tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Decodes `value` into `T` using `T`'s serde field names.
    pub fn decode<T: DeserializeOwned>(&self, value: Value) -> Result<T, ParseError> {
        serde_json::from_value(value).map_err(|source| ParseError::Decode {
            tag: self.tag.clone(),
            source,
        })
    }

    /// Renames keys with `T::field_tags(tag)` and decodes into `T`.
    ///
    /// Renaming applies to a top-level object and to every object of a
    /// top-level array.
    pub fn decode_tagged<T>(&self, value: Value) -> Result<T, ParseError>
    where
        T: DeserializeOwned + FieldTags,
    {
        let tags = T::field_tags(&self.tag);
        let value = if tags.is_empty() {
            value
        } else {
            match value {
                Value::Object(map) => Value::Object(rename(map, tags)),
                Value::Array(items) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Value::Object(map) => Value::Object(rename(map, tags)),
                            other => other,
                        })
                        .collect(),
                ),
                other => other,
            }
        };
        self.decode(value)
    }
}

fn rename(map: Map<String, Value>, tags: &[(&str, &str)]) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            let key = tags
                .iter()
                .find(|(external, _)| *external == key)
                .map_or(key, |(_, field)| (*field).to_string());
            (key, value)
        })
        .collect()
}
