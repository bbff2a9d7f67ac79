//! Field-path extraction from query text and resolution against nested records
//!
//! The selected field list is read once at startup and turned into [`FieldPath`]s
//! that every worker shares read-only. Resolution never fails: a missing branch,
//! a non-object intermediate node, or a JSON `null` all resolve to `None`.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{Error, Result};

#[allow(clippy::expect_used)]
static SELECT_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\s*SELECT\s+(.*?)\s+FROM\s+").expect("valid SELECT regex")
});

#[allow(clippy::expect_used)]
static FROM_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bFROM\s+(\w+)").expect("valid FROM regex"));

#[allow(clippy::expect_used)]
static TYPEOF_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*TYPEOF\s").expect("valid TYPEOF keyword regex"));

#[allow(clippy::expect_used)]
static TYPEOF_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^TYPEOF\s+(\w+)\s+WHEN\s+\w+\s+THEN\s+([\w.]+)")
        .expect("valid TYPEOF expression regex")
});

#[allow(clippy::expect_used)]
static END_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bEND\b").expect("valid END regex"));

/// A dotted address into a record's nested structure
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Build a path from dotted text (`"ContentDocument.LatestPublishedVersion.Id"`).
    pub fn parse(dotted: &str) -> Self {
        Self {
            segments: dotted.split('.').map(|s| s.trim().to_string()).collect(),
        }
    }

    /// Path segments in walk order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The field name at the end of the path
    pub fn last_segment(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Extract the ordered list of selected field paths from a query.
///
/// `TYPEOF parent WHEN Type THEN field[, ...] END` collapses to `parent.field`;
/// only the first field of the first branch survives.
pub fn extract_field_paths(query: &str) -> Result<Vec<FieldPath>> {
    let clause = SELECT_CLAUSE
        .captures(query)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| Error::MalformedQuery("no SELECT ... FROM clause found".to_string()))?;

    split_field_list(clause.as_str())
        .into_iter()
        .map(|raw| {
            let field = raw.trim();
            if field.is_empty() {
                return Err(Error::MalformedQuery(format!(
                    "empty field in select list '{}'",
                    clause.as_str().trim()
                )));
            }

            match TYPEOF_EXPR.captures(field) {
                Some(caps) => {
                    let parent = &caps[1];
                    let related = caps[2].split('.').next().unwrap_or_default();
                    Ok(FieldPath::parse(&format!("{parent}.{related}")))
                }
                None if TYPEOF_KEYWORD.is_match(field) => Err(
                    Error::MalformedQuery(format!("unrecognized TYPEOF expression '{field}'")),
                ),
                None => Ok(FieldPath::parse(field)),
            }
        })
        .collect()
}

/// Split the select list on commas, keeping each `TYPEOF ... END` block whole.
fn split_field_list(list: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut pending: Option<String> = None;

    for piece in list.split(',') {
        if let Some(mut open) = pending.take() {
            open.push(',');
            open.push_str(piece);
            if END_KEYWORD.is_match(piece) {
                fields.push(open);
            } else {
                pending = Some(open);
            }
            continue;
        }

        if TYPEOF_KEYWORD.is_match(piece) && !END_KEYWORD.is_match(piece) {
            pending = Some(piece.to_string());
        } else {
            fields.push(piece.to_string());
        }
    }

    // an unterminated TYPEOF is still handed to the parser so it can be reported
    if let Some(open) = pending {
        fields.push(open);
    }
    fields
}

/// Extract the object name following `FROM`.
pub fn extract_object_name(query: &str) -> Result<String> {
    FROM_OBJECT
        .captures(query)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| Error::MalformedQuery("unable to find the queried object".to_string()))
}

/// Walk `path` through `value`, returning `None` as soon as a branch is missing.
pub fn resolve_value<'a>(value: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.segments() {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

/// Render a resolved value as cell or filename text.
///
/// Strings are used verbatim, scalars use their JSON text and nested values
/// are rendered as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
