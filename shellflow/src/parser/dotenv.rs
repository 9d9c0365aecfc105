//! `KEY=VALUE` lines.

use super::{utf8, Parser};
use crate::errors::ParseError;
use serde_json::{Map, Value};

/// Parses dotenv files into an object of strings.
///
/// Parsing follows the usual dotenv rules: blank lines and `#` comments are
/// skipped, an `export ` prefix is accepted, single quotes are literal,
/// double quotes allow escapes and span lines, and `${VAR}` expands from the
/// process environment or from earlier lines. Later assignments override
/// earlier ones.
#[derive(Debug, Clone)]
pub struct DotenvParser {
    tag: String,
}

impl DotenvParser {
    /// Creates the parser.
    pub fn new() -> Self {
        Self {
            tag: "dotenv".to_string(),
        }
    }

    /// Sets the decoding tag name.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

impl Default for DotenvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for DotenvParser {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn parse(&self, input: &[u8]) -> Result<Value, ParseError> {
        let mut vars = Map::new();
        for entry in dotenvy::from_read_iter(utf8(input)?.as_bytes()) {
            let (key, value) = entry.map_err(|e| ParseError::syntax("dotenv", e))?;
            vars.insert(key, Value::String(value));
        }
        Ok(Value::Object(vars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserExt;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_empty_input() {
        let got: HashMap<String, String> = DotenvParser::new().unmarshal(b"").unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn test_simple_lines() {
        let got: HashMap<String, String> = DotenvParser::new()
            .unmarshal(b"FOO=BAR\nBAZ=QUX\n")
            .unwrap();
        assert_eq!(got["FOO"], "BAR");
        assert_eq!(got["BAZ"], "QUX");
    }

    #[test]
    fn test_quotes_comments_and_export() {
        let input = br##"
# database
export DB_HOST=localhost # trailing comment
DB_PASS='p#ss "word"'
GREETING="hello\nworld"
EMPTY=
"##;
        let got: HashMap<String, String> = DotenvParser::new().unmarshal(input).unwrap();
        assert_eq!(got["DB_HOST"], "localhost");
        assert_eq!(got["DB_PASS"], "p#ss \"word\"");
        assert_eq!(got["GREETING"], "hello\nworld");
        assert_eq!(got["EMPTY"], "");
    }

    #[test]
    fn test_multiline_double_quotes() {
        let got: HashMap<String, String> = DotenvParser::new()
            .unmarshal(b"KEY=\"line1\nline2\"\nNEXT=ok\n")
            .unwrap();
        assert_eq!(got["KEY"], "line1\nline2");
        assert_eq!(got["NEXT"], "ok");
    }

    #[test]
    fn test_expands_earlier_variables() {
        let got: HashMap<String, String> = DotenvParser::new()
            .unmarshal(b"SHELLFLOW_DOTENV_BASE=1\nSHELLFLOW_DOTENV_DERIVED=\"${SHELLFLOW_DOTENV_BASE}2\"\n")
            .unwrap();
        assert_eq!(got["SHELLFLOW_DOTENV_DERIVED"], "12");
    }

    #[test]
    fn test_invalid_lines() {
        let err = DotenvParser::new().parse(b"OK=1\nnot an assignment\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { format: "dotenv", .. }));
        assert!(DotenvParser::new().parse(b"A=\"open\n").is_err());
    }
}
