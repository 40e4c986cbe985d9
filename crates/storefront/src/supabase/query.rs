//! Row query builder for the backend's PostgREST-style table endpoints.
//!
//! A [`RowQuery`] names a table and a conjunction of [`Filter`]s. It renders to
//! query-string pairs (`brand=eq.Honda`, `or=(model.ilike.*pan*,...)`) and can
//! also be evaluated locally against JSON rows, which keeps the in-memory
//! gateway and the real service in agreement about what a query selects.
//!
//! Search terms are literal substrings except for `*`, which the service always
//! treats as a wildcard. `%`, `_` and `\` are escaped.

use serde_json::Value;

/// Characters that force a value inside `or=(...)` to be double-quoted.
const RESERVED: &[char] = &[',', '.', ':', '(', ')', '"', '\\'];

/// A single row predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Exact, case-sensitive equality.
    Eq { column: String, value: String },
    /// Case-insensitive substring match.
    ILike { column: String, term: String },
    /// Any of the nested filters.
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn ilike(column: impl Into<String>, term: impl Into<String>) -> Self {
        Self::ILike {
            column: column.into(),
            term: term.into(),
        }
    }

    #[must_use]
    pub const fn or(filters: Vec<Self>) -> Self {
        Self::Or(filters)
    }

    /// Top-level `key=value` rendering.
    fn to_pair(&self) -> (String, String) {
        match self {
            Self::Eq { column, value } => (column.clone(), format!("eq.{value}")),
            Self::ILike { column, term } => {
                (column.clone(), format!("ilike.{}", like_pattern(term)))
            }
            Self::Or(filters) => ("or".to_string(), format!("({})", render_list(filters))),
        }
    }

    /// Rendering inside a logic tree: `column.op.value`.
    fn render_nested(&self) -> String {
        match self {
            Self::Eq { column, value } => format!("{column}.eq.{}", quote_if_reserved(value)),
            Self::ILike { column, term } => {
                format!("{column}.ilike.{}", quote_if_reserved(&like_pattern(term)))
            }
            Self::Or(filters) => format!("or({})", render_list(filters)),
        }
    }

    /// Evaluate the predicate against a JSON row. Missing and null columns
    /// never match.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Self::Eq { column, value } => column_text(row, column).is_some_and(|v| v == *value),
            Self::ILike { column, term } => {
                column_text(row, column).is_some_and(|v| contains_ignore_case(&v, term))
            }
            Self::Or(filters) => filters.iter().any(|f| f.matches(row)),
        }
    }
}

fn render_list(filters: &[Filter]) -> String {
    filters
        .iter()
        .map(Filter::render_nested)
        .collect::<Vec<_>>()
        .join(",")
}

/// Escape LIKE metacharacters and wrap the term in wildcards.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('*');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

fn quote_if_reserved(value: &str) -> String {
    if !value.contains(RESERVED) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn column_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Substring test matching `ILIKE '%term%'` where `*` in the term is a wildcard.
fn contains_ignore_case(haystack: &str, term: &str) -> bool {
    let haystack = haystack.to_lowercase();
    let term = term.to_lowercase();
    let mut rest = haystack.as_str();
    for part in term.split('*') {
        match rest.find(part) {
            Some(at) => rest = rest.get(at + part.len()..).unwrap_or_default(),
            None => return false,
        }
    }
    true
}

/// A select against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    table: String,
    select: String,
    filters: Vec<Filter>,
    limit: Option<usize>,
}

impl RowQuery {
    /// Select every column of `table`, unfiltered.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: "*".to_string(),
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Add a filter; all filters must hold.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    #[must_use]
    pub const fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Query-string pairs, unencoded. The caller percent-encodes them.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.select.clone())];
        pairs.extend(self.filters.iter().map(Filter::to_pair));
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    /// Whether `row` satisfies every filter.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}
