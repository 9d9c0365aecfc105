//! Whitespace-aligned tables, as printed by `ls -l`, `ps` or `kubectl get`.
//!
//! Column boundaries are inferred rather than declared. Every position of
//! the header and of every data line is marked occupied when it holds a
//! non-separator character; each maximal run of occupied positions is one
//! column. Using the union of all lines keeps a value that is wider than
//! its header label, or that sits under an empty label, inside its column.

use super::{utf8, Parser};
use crate::errors::ParseError;
use serde_json::{Map, Value};
use std::ops::Range;
use std::sync::Arc;

type SeparatorFn = Arc<dyn Fn(char) -> bool + Send + Sync>;
type LineFilter = Arc<dyn Fn(usize, &str) -> bool + Send + Sync>;
type CellTransform = Arc<dyn Fn(&str, &str) -> (String, String) + Send + Sync>;

/// A table header line and the column layout derived from it.
#[derive(Debug, Clone, Copy)]
pub struct TableHeader<'a> {
    text: &'a str,
}

impl<'a> TableHeader<'a> {
    /// Wraps a header line.
    pub const fn new(text: &'a str) -> Self {
        Self { text }
    }

    /// Returns the header text.
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Builds the occupancy mask of the header overlaid with `lines`.
    ///
    /// The mask is one position longer than the longest line, so the last
    /// position is always a separator.
    pub fn mask<F>(&self, is_separator: F, lines: &[&str]) -> Vec<bool>
    where
        F: Fn(char) -> bool,
    {
        let mut mask = Vec::new();
        for line in std::iter::once(self.text).chain(lines.iter().copied()) {
            if mask.len() < line.len() + 1 {
                mask.resize(line.len() + 1, false);
            }
            for (i, c) in line.char_indices() {
                if !is_separator(c) {
                    mask[i..i + c.len_utf8()].fill(true);
                }
            }
        }
        mask
    }

    /// Infers the column ranges of a table with this header and `lines`.
    pub fn columns<F>(&self, is_separator: F, lines: &[&str]) -> Result<Vec<Range<usize>>, ParseError>
    where
        F: Fn(char) -> bool,
    {
        columns_from_mask(&self.mask(is_separator, lines))
    }
}

/// Turns an occupancy mask into half-open column ranges.
///
/// A run still open at the end of the mask is an unterminated column and
/// fails with [`ParseError::InvalidTableHeader`].
pub fn columns_from_mask(mask: &[bool]) -> Result<Vec<Range<usize>>, ParseError> {
    let mut columns = Vec::new();
    let mut start = None;
    for (i, &occupied) in mask.iter().enumerate() {
        match (start, occupied) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                columns.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if start.is_some() {
        return Err(ParseError::InvalidTableHeader);
    }
    Ok(columns)
}

/// Slices `text` at `range`, clamped to its length and widened to the
/// nearest character boundaries.
fn cell<'t>(text: &'t str, range: &Range<usize>) -> &'t str {
    let mut end = range.end.min(text.len());
    let mut start = range.start.min(end);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    while !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}

/// Parses aligned tables into an array of row objects.
///
/// Each row maps the header cell of every column to the line's cell, both
/// trimmed of separator characters unless a transform is set. Without an
/// explicit header the first line that passes the filter is the header.
#[derive(Clone)]
pub struct TableParser {
    tag: String,
    separator: SeparatorFn,
    filter: Option<LineFilter>,
    transform: Option<CellTransform>,
    header: Option<String>,
}

impl TableParser {
    /// Creates a parser that separates columns on whitespace.
    pub fn new() -> Self {
        Self {
            tag: "table".to_string(),
            separator: Arc::new(char::is_whitespace),
            filter: None,
            transform: None,
            header: None,
        }
    }

    /// Sets the separator predicate.
    #[must_use]
    pub fn with_separator<F>(mut self, is_separator: F) -> Self
    where
        F: Fn(char) -> bool + Send + Sync + 'static,
    {
        self.separator = Arc::new(is_separator);
        self
    }

    /// Keeps only lines for which `filter(index, line)` returns true.
    ///
    /// Indexes count every input line, before filtering. The header is
    /// chosen after filtering.
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(usize, &str) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Replaces the default trimming of `(key, value)` cells.
    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str, &str) -> (String, String) + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Supplies the header line; every input line is then data.
    ///
    /// An empty header is ignored and the first line is used instead.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Sets the decoding tag name.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    fn is_separator(&self, c: char) -> bool {
        (self.separator)(c)
    }

    fn cells(&self, key: &str, value: &str) -> (String, String) {
        match &self.transform {
            Some(transform) => transform(key, value),
            None => (
                key.trim_matches(|c| self.is_separator(c)).to_string(),
                value.trim_matches(|c| self.is_separator(c)).to_string(),
            ),
        }
    }
}

impl Default for TableParser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TableParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableParser")
            .field("tag", &self.tag)
            .field("header", &self.header)
            .field("filtered", &self.filter.is_some())
            .field("transformed", &self.transform.is_some())
            .finish_non_exhaustive()
    }
}

impl Parser for TableParser {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn parse(&self, input: &[u8]) -> Result<Value, ParseError> {
        let mut lines: Vec<&str> = utf8(input)?
            .lines()
            .enumerate()
            .filter(|(i, line)| self.filter.as_ref().map_or(true, |f| f(*i, line)))
            .map(|(_, line)| line)
            .collect();

        let header = match self.header.as_deref().filter(|h| !h.is_empty()) {
            Some(header) => header,
            None if lines.is_empty() => return Ok(Value::Array(Vec::new())),
            None => lines.remove(0),
        };
        if lines.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }

        let columns = TableHeader::new(header).columns(|c| self.is_separator(c), &lines)?;
        let rows = lines
            .iter()
            .map(|line| {
                let row: Map<String, Value> = columns
                    .iter()
                    .map(|range| {
                        let (key, value) = self.cells(cell(header, range), cell(line, range));
                        (key, Value::String(value))
                    })
                    .collect();
                Value::Object(row)
            })
            .collect();
        Ok(Value::Array(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{FieldTags, ParserExt};
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::collections::HashMap;

    type Row = HashMap<String, String>;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn parse(parser: &TableParser, input: &str) -> Vec<Row> {
        parser.unmarshal(input.as_bytes()).unwrap()
    }

    #[test]
    fn test_simple_table() {
        let got = parse(&TableParser::new(), "FOO BAR\n42  4242\n");
        assert_eq!(got, vec![row(&[("FOO", "42"), ("BAR", "4242")])]);
    }

    #[test]
    fn test_value_wider_than_header_label() {
        let got = parse(&TableParser::new(), "A B\n1 2345");
        assert_eq!(got, vec![row(&[("A", "1"), ("B", "2345")])]);
    }

    #[test]
    fn test_column_under_empty_label() {
        let got = parse(&TableParser::new(), "A    B\n1  x  2\n");
        assert_eq!(got, vec![row(&[("A", "1"), ("", "x"), ("B", "2")])]);
    }

    #[test]
    fn test_empty_and_header_only() {
        assert!(parse(&TableParser::new(), "").is_empty());
        assert!(parse(&TableParser::new(), "NAME   AGE\n").is_empty());
        assert!(parse(&TableParser::new().with_header("NAME AGE"), "").is_empty());
    }

    #[test]
    fn test_unterminated_mask_is_invalid() {
        assert_eq!(columns_from_mask(&[true, false, true, true, false]).unwrap(), vec![0..1, 2..4]);
        let err = columns_from_mask(&[false, true, true]).unwrap_err();
        assert_eq!(err.to_string(), "invalid table header");
    }

    #[test]
    fn test_mask_is_union_of_lines() {
        let header = TableHeader::new("A B");
        let mask = header.mask(char::is_whitespace, &["1  22"]);
        assert_eq!(mask, vec![true, false, true, true, true, false]);
        assert_eq!(header.columns(char::is_whitespace, &["1  22"]).unwrap(), vec![0..1, 2..5]);
    }

    #[test]
    fn test_explicit_header_and_filter() {
        let parser = TableParser::new()
            .with_header("ID NAME")
            .with_filter(|_, line| !line.starts_with('#'));
        let got = parse(&parser, "# generated\n1  one\n2  two\n");
        assert_eq!(
            got,
            vec![
                row(&[("ID", "1"), ("NAME", "one")]),
                row(&[("ID", "2"), ("NAME", "two")]),
            ]
        );
    }

    #[test]
    fn test_empty_explicit_header_reads_first_line() {
        let got = parse(&TableParser::new().with_header(""), "ID NAME
1  one
");
        assert_eq!(got, vec![row(&[("ID", "1"), ("NAME", "one")])]);
    }

    #[test]
    fn test_custom_separator_and_transform() {
        let parser = TableParser::new()
            .with_separator(|c| c == '|' || c.is_whitespace())
            .with_transform(|k, v| (k.trim().to_lowercase(), v.trim().to_uppercase()));
        let got = parse(&parser, "Key|Val\na  |b\n");
        assert_eq!(got, vec![row(&[("key", "A"), ("val", "B")])]);
    }

    #[test]
    fn test_short_lines_are_clamped() {
        let got = parse(&TableParser::new(), "NAME STATUS\nweb  up\ndb\n");
        assert_eq!(
            got,
            vec![
                row(&[("NAME", "web"), ("STATUS", "up")]),
                row(&[("NAME", "db"), ("STATUS", "")]),
            ]
        );
    }

    #[test]
    fn test_eza_listing() {
        let rows = [
            ("drwxr-xr-x", "-", "21 Mar 09:58", "cmd"),
            ("drwxr-xr-x", "-", "21 Mar 09:42", "cmdx"),
            ("drwxr-xr-x", "-", "21 Mar 10:03", "execx"),
            (".rw-r--r--", "1.0k", "21 Mar 10:11", "go.mod"),
            (".rw-r--r--", "12k", "21 Mar 10:11", "go.sum"),
            (".rw-r--r--", "342", "21 Mar 09:59", "main.go"),
            (".rw-r--r--", "132", "21 Mar 09:42", "Makefile"),
            ("drwxr-xr-x", "-", "21 Mar 10:50", "parser"),
        ];
        let expected: Vec<Row> = rows
            .iter()
            .map(|(perm, size, date, name)| {
                row(&[
                    ("Permissions", perm),
                    ("Size", size),
                    ("User", "foo"),
                    ("Date Modified", date),
                    ("Name", name),
                ])
            })
            .collect();

        let got = parse(&TableParser::new(), include_str!("testdata/eza.txt"));
        assert_eq!(got, expected);
    }

    #[test]
    fn test_kubectl_pods() {
        let rows = [
            ("foofoofoofoofoofoofoofoo-74bc6cbf96-wgxn8", "1/1", "Running", "0", "2d13h"),
            ("foofoofoofoofoofoofoofoofoofoof-66b86b4ccf-7mnzd", "0/1", "CrashLoopBackOff", "495 (4m13s ago)", "42h"),
            ("foofoofoofoofoofoofoofoofoofoof-66b86b4ccf-lckbm", "0/1", "CrashLoopBackOff", "9063 (3m4s ago)", "39d"),
            ("foofoofoofoofoofoofoofoofoofoof-785fc5694b-82cll", "0/1", "CrashLoopBackOff", "734 (52s ago)", "2d15h"),
            ("foofoofoofoofoofoofoofoofoofoof-785fc5694b-r766g", "0/1", "CrashLoopBackOff", "472 (4m53s ago)", "40h"),
            ("foofoof-7c65b8458c-wmxc2", "1/1", "Running", "0", "40h"),
            ("foofoofoofoofoofoo-6ff6f5c957-9rmtv", "1/1", "Running", "0", "40h"),
            ("foofoofoofoofoofoofoofoofoofoof-28516525-sfb8g", "0/1", "Completed", "0", "13m"),
            ("foofoofoofoofoofoofoofoofoofoof-28516530-sxr74", "0/1", "Completed", "0", "8m9s"),
        ];
        let expected: Vec<Row> = rows
            .iter()
            .map(|(name, ready, status, restarts, age)| {
                row(&[
                    ("NAME", name),
                    ("READY", ready),
                    ("STATUS", status),
                    ("RESTARTS", restarts),
                    ("AGE", age),
                ])
            })
            .collect();

        let got = parse(&TableParser::new(), include_str!("testdata/kubectl.txt"));
        assert_eq!(got, expected);
    }

    #[test]
    fn test_decode_rows_with_field_tags() {
        #[derive(Debug, Deserialize)]
        struct Pod {
            name: String,
            restarts: String,
        }

        impl FieldTags for Pod {
            fn field_tags(tag: &str) -> &'static [(&'static str, &'static str)] {
                match tag {
                    "table" => &[("NAME", "name"), ("RESTARTS", "restarts")],
                    _ => &[],
                }
            }
        }

        let pods: Vec<Pod> = TableParser::new()
            .unmarshal_tagged(include_bytes!("testdata/kubectl.txt"))
            .unwrap();
        assert_eq!(pods.len(), 9);
        assert_eq!(pods[1].name, "foofoofoofoofoofoofoofoofoofoof-66b86b4ccf-7mnzd");
        assert_eq!(pods[1].restarts, "495 (4m13s ago)");
    }

    #[test]
    fn test_multibyte_cells() {
        let got = parse(&TableParser::new(), "CITY     NOTE\nZürich   café\n");
        assert_eq!(got, vec![row(&[("CITY", "Zürich"), ("NOTE", "café")])]);
    }
}
