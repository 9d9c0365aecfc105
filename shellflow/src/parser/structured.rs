//! JSON and YAML documents.

use super::{shape_name, Parser};
use crate::errors::ParseError;
use serde_json::Value;

/// The top-level shape a structured parser accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Shape {
    /// Any document.
    #[default]
    Any,
    /// A mapping.
    Object,
    /// A sequence.
    Array,
}

impl Shape {
    fn check(self, format: &'static str, value: Value) -> Result<Value, ParseError> {
        let expected = match (self, &value) {
            (Self::Any, _) | (Self::Object, Value::Object(_)) | (Self::Array, Value::Array(_)) => {
                return Ok(value)
            }
            (Self::Object, _) => "object",
            (Self::Array, _) => "array",
        };
        Err(ParseError::Shape {
            format,
            expected,
            found: shape_name(&value),
        })
    }
}

/// Parses JSON documents.
#[derive(Debug, Clone)]
pub struct JsonParser {
    tag: String,
    shape: Shape,
}

impl JsonParser {
    /// Accepts any JSON document.
    pub fn new() -> Self {
        Self {
            tag: "json".to_string(),
            shape: Shape::Any,
        }
    }

    /// Accepts only a JSON object.
    pub fn object() -> Self {
        Self::new().with_shape(Shape::Object)
    }

    /// Accepts only a JSON array.
    pub fn array() -> Self {
        Self::new().with_shape(Shape::Array)
    }

    /// Sets the accepted shape.
    #[must_use]
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    /// Sets the decoding tag name.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for JsonParser {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn parse(&self, input: &[u8]) -> Result<Value, ParseError> {
        let value = serde_json::from_slice(input).map_err(|e| ParseError::syntax("json", e))?;
        self.shape.check("json", value)
    }
}

/// Parses YAML documents.
#[derive(Debug, Clone)]
pub struct YamlParser {
    tag: String,
    shape: Shape,
}

impl YamlParser {
    /// Accepts any YAML document.
    pub fn new() -> Self {
        Self {
            tag: "yaml".to_string(),
            shape: Shape::Any,
        }
    }

    /// Accepts only a YAML mapping.
    pub fn object() -> Self {
        Self::new().with_shape(Shape::Object)
    }

    /// Accepts only a YAML sequence.
    pub fn array() -> Self {
        Self::new().with_shape(Shape::Array)
    }

    /// Sets the accepted shape.
    #[must_use]
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    /// Sets the decoding tag name.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

impl Default for YamlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for YamlParser {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn parse(&self, input: &[u8]) -> Result<Value, ParseError> {
        let value = serde_yaml::from_slice(input).map_err(|e| ParseError::syntax("yaml", e))?;
        self.shape.check("yaml", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserExt;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_json_object() {
        let got: HashMap<String, i64> = JsonParser::object()
            .unmarshal(br#"{"FOO": 42, "BAR": 4242}"#)
            .unwrap();
        assert_eq!(got["FOO"], 42);
        assert_eq!(got["BAR"], 4242);
    }

    #[test]
    fn test_json_shape_mismatch() {
        let err = JsonParser::object().parse(b"[1, 2]").unwrap_err();
        assert_eq!(err.to_string(), "expected object from json input, got array");
        assert!(!err.is_decode());
    }

    #[test]
    fn test_json_syntax_error() {
        let err = JsonParser::new().parse(b"{not json").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { format: "json", .. }));
    }

    #[test]
    fn test_yaml_array_of_objects() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Item {
            name: String,
            port: u16,
        }

        let input = b"- name: web\n  port: 80\n- name: db\n  port: 5432\n";
        let items: Vec<Item> = YamlParser::array().unmarshal(input).unwrap();
        assert_eq!(
            items,
            vec![
                Item { name: "web".into(), port: 80 },
                Item { name: "db".into(), port: 5432 },
            ]
        );
    }

    #[test]
    fn test_yaml_object_shape() {
        let value = YamlParser::object().parse(b"a: 1\nb: [x, y]\n").unwrap();
        assert_eq!(value, json!({"a": 1, "b": ["x", "y"]}));
        assert!(YamlParser::object().parse(b"- 1\n").is_err());
    }
}
