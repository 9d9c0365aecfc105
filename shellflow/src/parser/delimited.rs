//! Comma-separated rows.

use super::Parser;
use crate::errors::ParseError;
use serde_json::{Map, Value};

/// Parses CSV into an array of row objects keyed by the header.
///
/// The first record is the header unless [`CsvParser::with_headers`]
/// supplies one, in which case every record is data and must have exactly
/// that many fields. Values are strings.
#[derive(Debug, Clone)]
pub struct CsvParser {
    tag: String,
    headers: Option<Vec<String>>,
    delimiter: u8,
}

impl CsvParser {
    /// Creates a parser that reads the header from the first record.
    pub fn new() -> Self {
        Self {
            tag: "csv".to_string(),
            headers: None,
            delimiter: b',',
        }
    }

    /// Supplies the header explicitly.
    #[must_use]
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the decoding tag name.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for CsvParser {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn parse(&self, input: &[u8]) -> Result<Value, ParseError> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .flexible(self.headers.is_some())
            .from_reader(input);
        let mut records = reader.records();

        let headers: Vec<String> = match &self.headers {
            Some(headers) => headers.clone(),
            None => match records.next() {
                Some(record) => record?.iter().map(str::to_string).collect(),
                None => return Ok(Value::Array(Vec::new())),
            },
        };

        let mut rows = Vec::new();
        for (index, record) in records.enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(ParseError::syntax(
                    "csv",
                    format!(
                        "record {index} has {} fields, expected {}",
                        record.len(),
                        headers.len()
                    ),
                ));
            }
            let row: Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(key, field)| (key.clone(), Value::String(field.to_string())))
                .collect();
            rows.push(Value::Object(row));
        }
        Ok(Value::Array(rows))
    }
}
