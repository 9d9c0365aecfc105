//! Whitespace words, lines, or regex-separated tokens.

use super::{utf8, Parser};
use crate::errors::ParseError;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

type TokenFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
enum Split {
    Words,
    Lines,
    Pattern(Regex),
}

/// Splits input into an array of string tokens.
///
/// Splits on runs of whitespace by default. Empty tokens produced by a
/// regex separator are kept, so a filter can decide what to drop.
#[derive(Clone)]
pub struct TokenParser {
    tag: String,
    split: Split,
    filter: Option<TokenFilter>,
}

impl TokenParser {
    /// Splits on whitespace.
    pub fn new() -> Self {
        Self {
            tag: "tokens".to_string(),
            split: Split::Words,
            filter: None,
        }
    }

    /// Splits on line endings (`\n` or `\r\n`).
    pub fn lines() -> Self {
        Self {
            split: Split::Lines,
            ..Self::new()
        }
    }

    /// Splits on matches of `pattern`.
    #[must_use]
    pub fn with_separator(mut self, pattern: Regex) -> Self {
        self.split = Split::Pattern(pattern);
        self
    }

    /// Keeps only tokens for which `filter` returns true.
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Sets the decoding tag name.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    fn keep(&self, token: &str) -> bool {
        self.filter.as_ref().map_or(true, |f| f(token))
    }
}

impl Default for TokenParser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenParser")
            .field("tag", &self.tag)
            .field("split", &self.split)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl Parser for TokenParser {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn parse(&self, input: &[u8]) -> Result<Value, ParseError> {
        let text = utf8(input)?;
        let tokens: Box<dyn Iterator<Item = &str> + '_> = match &self.split {
            Split::Words => Box::new(text.split_whitespace()),
            Split::Lines => Box::new(text.lines()),
            Split::Pattern(_) if text.is_empty() => Box::new(std::iter::empty()),
            Split::Pattern(re) => Box::new(re.split(text)),
        };
        Ok(Value::Array(
            tokens
                .filter(|t| self.keep(t))
                .map(|t| Value::String(t.to_string()))
                .collect(),
        ))
    }
}
