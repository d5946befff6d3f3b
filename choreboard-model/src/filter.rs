//! Store filter expressions.
//!
//! The store adapter accepts a small boolean expression language:
//! `field = "value"`, `field != "value"`, `field ~ "substring"`, joined by
//! `&&`. Filters are built through this typed builder so that every value
//! that reaches the rendered expression has passed through [`escape`] —
//! user-supplied text is never concatenated into a filter directly.
//!
//! The same filter evaluates structurally against JSON-shaped records,
//! which is what the in-memory store adapter uses.

use serde::{Deserialize, Serialize};

/// A value a filter clause compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    /// String comparison (the common case; ids, enums, names).
    Text(String),
    /// Boolean comparison (flags such as `is_swap`).
    Flag(bool),
    /// Matches a missing or explicitly null field.
    Null,
}

impl From<&str> for FilterValue {
    fn from(raw: &str) -> Self {
        Self::Text(raw.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(raw: String) -> Self {
        Self::Text(raw)
    }
}

impl From<bool> for FilterValue {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

/// Comparison operator of a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Eq,
    Ne,
    Contains,
}

/// One `field <op> value` clause.
#[derive(Debug, Clone, PartialEq)]
struct Clause {
    field: String,
    op: Cmp,
    value: FilterValue,
}

/// A conjunction of clauses. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// Creates an empty filter that matches every record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Adds a `field = value` clause.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            op: Cmp::Eq,
            value: value.into(),
        });
        self
    }

    /// Adds a `field != value` clause.
    #[must_use]
    pub fn ne(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            op: Cmp::Ne,
            value: value.into(),
        });
        self
    }

    /// Adds a `field ~ substring` clause.
    #[must_use]
    pub fn contains(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            op: Cmp::Contains,
            value: FilterValue::Text(value.into()),
        });
        self
    }

    /// Renders the filter in the adapter expression syntax.
    ///
    /// All text values are escaped; an empty filter renders as an empty
    /// string (adapters treat that as "no filter").
    #[must_use]
    pub fn render(&self) -> String {
        let parts: Vec<String> = self
            .clauses
            .iter()
            .map(|clause| {
                let op = match clause.op {
                    Cmp::Eq => "=",
                    Cmp::Ne => "!=",
                    Cmp::Contains => "~",
                };
                let value = match &clause.value {
                    FilterValue::Text(text) => format!("\"{}\"", escape(text)),
                    FilterValue::Flag(flag) => flag.to_string(),
                    FilterValue::Null => "null".to_string(),
                };
                format!("{} {op} {value}", clause.field)
            })
            .collect();
        parts.join(" && ")
    }

    /// Evaluates the filter against a JSON-shaped record.
    ///
    /// A missing field is treated as null. Non-object records match only
    /// the empty filter.
    #[must_use]
    pub fn matches(&self, record: &serde_json::Value) -> bool {
        if self.clauses.is_empty() {
            return true;
        }
        let Some(map) = record.as_object() else {
            return false;
        };
        self.clauses.iter().all(|clause| {
            let field = map.get(&clause.field).unwrap_or(&serde_json::Value::Null);
            match clause.op {
                Cmp::Eq => value_eq(field, &clause.value),
                Cmp::Ne => !value_eq(field, &clause.value),
                Cmp::Contains => match (&clause.value, field.as_str()) {
                    (FilterValue::Text(needle), Some(haystack)) => haystack.contains(needle),
                    _ => false,
                },
            }
        })
    }

    /// Returns `true` when the filter has no clauses.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

fn value_eq(field: &serde_json::Value, expected: &FilterValue) -> bool {
    match expected {
        FilterValue::Text(text) => field.as_str() == Some(text.as_str()),
        FilterValue::Flag(flag) => field.as_bool() == Some(*flag),
        FilterValue::Null => field.is_null(),
    }
}

/// Escapes a raw value for safe interpolation into a rendered filter.
///
/// Backslashes and double quotes are backslash-escaped, so a value coming
/// from end-user text cannot terminate the quoted literal early.
#[must_use]
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out
}
