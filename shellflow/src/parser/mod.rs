//! Structured-text parsers.
//!
//! A [`Parser`] turns raw bytes into a generic [`serde_json::Value`]: a
//! mapping, a sequence of mappings or a sequence of scalars. A [`Decoder`]
//! then maps that generic value into a caller's type. Each parser carries a
//! tag name, so one destination type can describe how its fields are named
//! in several formats (see [`FieldTags`]).
//!
//! | Parser | Output | Default tag |
//! |---|---|---|
//! | [`JsonParser`] | any, object or array | `json` |
//! | [`YamlParser`] | any, object or array | `yaml` |
//! | [`CsvParser`] | array of row objects | `csv` |
//! | [`DotenvParser`] | object of strings | `dotenv` |
//! | [`TokenParser`] | array of strings | `tokens` |
//! | [`TableParser`] | array of row objects | `table` |

mod decode;
mod delimited;
mod dotenv;
mod structured;
mod table;
mod tokens;

pub use decode::{Decoder, FieldTags};
pub use delimited::CsvParser;
pub use dotenv::DotenvParser;
pub use structured::{JsonParser, Shape, YamlParser};
pub use table::{columns_from_mask, TableHeader, TableParser};
pub use tokens::TokenParser;

use crate::errors::ParseError;
use serde::de::DeserializeOwned;

/// Converts raw bytes into a generic structured value.
pub trait Parser: Send + Sync {
    /// Returns the tag name used when decoding this parser's output.
    fn tag(&self) -> &str;

    /// Parses `input`.
    fn parse(&self, input: &[u8]) -> Result<serde_json::Value, ParseError>;
}

/// Parse-then-decode helpers available on every [`Parser`].
pub trait ParserExt: Parser {
    /// Parses `input` and decodes the result into `T`.
    fn unmarshal<T: DeserializeOwned>(&self, input: &[u8]) -> Result<T, ParseError> {
        Decoder::new(self.tag()).decode(self.parse(input)?)
    }

    /// Parses `input` and decodes the result into `T`, renaming keys with
    /// `T`'s field tags for this parser's tag name.
    fn unmarshal_tagged<T>(&self, input: &[u8]) -> Result<T, ParseError>
    where
        T: DeserializeOwned + FieldTags,
    {
        Decoder::new(self.tag()).decode_tagged(self.parse(input)?)
    }
}

impl<P: Parser + ?Sized> ParserExt for P {}

/// Returns the name of a JSON value's shape, for error messages.
pub(crate) const fn shape_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Decodes bytes as UTF-8 text.
pub(crate) fn utf8(input: &[u8]) -> Result<&str, ParseError> {
    Ok(std::str::from_utf8(input)?)
}
