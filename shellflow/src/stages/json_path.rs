//! Path extraction over JSON input.

use super::{BoxStage, Stage};
use crate::context::RunContext;
use crate::errors::{Error, ParseError, Result};
use crate::parser::utf8;
use crate::value::Value;
use async_trait::async_trait;

/// Looks up a gjson `path` in the JSON document `json` and returns the raw
/// JSON text of the match.
///
/// The full gjson syntax applies: dotted keys, indexes, `#` for an array's
/// length, `#.key` projection, `#(...)` queries, `*`/`?` wildcards and
/// `|@modifier` pipes.
///
/// ```rust,ignore
/// let doc = r#"{"items": [{"id": 1}, {"id": 2}]}"#;
/// assert_eq!(select_path(doc, "items.#").as_deref(), Some("2"));
/// assert_eq!(select_path(doc, "items.#(id>1).id").as_deref(), Some("2"));
/// ```
pub fn select_path(json: &str, path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    let found = gjson::get(json, path);
    found.exists().then(|| found.json().to_string())
}

struct JsonPathStage {
    path: String,
}

#[async_trait]
impl Stage for JsonPathStage {
    fn name(&self) -> &str {
        "json_path"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        let document = match input {
            Value::Structured(document) => document.to_string(),
            other => {
                let bytes = other.into_bytes().await?;
                utf8(&bytes)?.to_string()
            }
        };
        if !gjson::valid(&document) {
            return Err(ParseError::syntax("json", "malformed document").into());
        }
        ctx.tracer().trace("json_path", std::slice::from_ref(&self.path));

        select_path(&document, &self.path)
            .map(Value::Text)
            .ok_or_else(|| Error::PathNotFound(self.path.clone()))
    }
}

/// Extracts a gjson `path` from JSON input and emits the raw JSON text of
/// the result. String results keep their quotes.
pub fn json_path(path: impl Into<String>) -> BoxStage {
    Box::new(JsonPathStage { path: path.into() })
}
