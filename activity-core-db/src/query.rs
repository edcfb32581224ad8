//! Composable parameterized predicates.
//!
//! Conditional WHERE fragments accumulate alongside their values; positions
//! are assigned from a shared counter so fragments compose without placeholder
//! collisions. Column names are developer-supplied constants; user values only
//! ever travel through the parameter list.

use chrono::{DateTime, Utc};

use crate::executor::SqlValue;

#[derive(Debug, Default)]
pub struct QueryBuilder {
    clauses: Vec<String>,
    params: Vec<SqlValue>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw positional parameter (LIMIT/OFFSET and friends) and
    /// return its placeholder number.
    pub fn bind(&mut self, value: impl Into<SqlValue>) -> usize {
        self.params.push(value.into());
        self.params.len()
    }

    /// Case-insensitive substring match OR-combined across display columns,
    /// sharing a single `%needle%` parameter.
    pub fn push_search(&mut self, needle: &str, columns: &[&str]) {
        if columns.is_empty() {
            return;
        }
        let position = self.bind(format!("%{needle}%"));
        let alternatives: Vec<String> = columns
            .iter()
            .map(|column| format!("{column} ILIKE ${position}"))
            .collect();
        self.clauses.push(format!("({})", alternatives.join(" OR ")));
    }

    pub fn push_eq(&mut self, column: &str, value: impl Into<SqlValue>) {
        let position = self.bind(value);
        self.clauses.push(format!("{column} = ${position}"));
    }

    pub fn push_min(&mut self, column: &str, value: impl Into<SqlValue>) {
        let position = self.bind(value);
        self.clauses.push(format!("{column} >= ${position}"));
    }

    pub fn push_max(&mut self, column: &str, value: impl Into<SqlValue>) {
        let position = self.bind(value);
        self.clauses.push(format!("{column} <= ${position}"));
    }

    /// Half-open `[from, to)` bound on a timestamp column; either side may be
    /// absent.
    pub fn push_range(
        &mut self,
        column: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) {
        if let Some(from) = from {
            let position = self.bind(from);
            self.clauses.push(format!("{column} >= ${position}"));
        }
        if let Some(to) = to {
            let position = self.bind(to);
            self.clauses.push(format!("{column} < ${position}"));
        }
    }

    pub fn push_is_null(&mut self, column: &str) {
        self.clauses.push(format!("{column} IS NULL"));
    }

    pub fn push_fragment(&mut self, fragment: impl Into<String>) {
        self.clauses.push(fragment.into());
    }

    /// `" WHERE a AND b"` with a leading space, or empty when nothing was
    /// pushed.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn into_params(self) -> Vec<SqlValue> {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_builder_has_no_where_clause() {
        let builder = QueryBuilder::new();
        assert_eq!(builder.where_clause(), "");
        assert!(builder.params().is_empty());
    }

    #[test]
    fn placeholders_increment_across_fragments() {
        let mut builder = QueryBuilder::new();
        builder.push_search("acme", &["name", "website"]);
        builder.push_eq("status", "active");
        builder.push_min("risk_score", SqlValue::Int(40));

        assert_eq!(
            builder.where_clause(),
            " WHERE (name ILIKE $1 OR website ILIKE $1) AND status = $2 AND risk_score >= $3"
        );
        assert_eq!(
            builder.params(),
            &[
                SqlValue::Text("%acme%".to_string()),
                SqlValue::Text("active".to_string()),
                SqlValue::Int(40),
            ]
        );
    }

    #[test]
    fn absent_values_are_simply_never_pushed() {
        let mut builder = QueryBuilder::new();
        builder.push_range("created_at", None, None);
        assert_eq!(builder.where_clause(), "");

        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        builder.push_range("created_at", Some(from), None);
        assert_eq!(builder.where_clause(), " WHERE created_at >= $1");
    }

    #[test]
    fn bind_returns_the_next_position() {
        let mut builder = QueryBuilder::new();
        builder.push_eq("status", "open");
        let limit_pos = builder.bind(50i64);
        let offset_pos = builder.bind(0i64);
        assert_eq!((limit_pos, offset_pos), (2, 3));
    }
}
