//! Query descriptions handed to a search backend
//!
//! A [`QuerySpec`] pairs a query language with the raw query text and an
//! ordered list of sort keys. It is built once by a session and never
//! mutated after it has been handed to a stream.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::QueryType;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
  Asc,
  Desc,
}

impl fmt::Display for SortDir {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SortDir::Asc => write!(f, "<"),
      SortDir::Desc => write!(f, ">"),
    }
  }
}

/// One sort criterion, e.g. `1=4` ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
  pub field: String,
  pub direction: SortDir,
}

impl SortKey {
  pub fn new(field: impl Into<String>, direction: SortDir) -> Self {
    Self {
      field: field.into(),
      direction,
    }
  }
}

impl fmt::Display for SortKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.field, self.direction)
  }
}

/// Query type, raw query string and sort criteria
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
  kind: QueryType,
  raw: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  sort: Vec<SortKey>,
}

impl QuerySpec {
  pub fn new(kind: QueryType, raw: impl Into<String>) -> Self {
    Self {
      kind,
      raw: raw.into(),
      sort: Vec::new(),
    }
  }

  /// Prefix (PQF) query, the default query language
  pub fn prefix(raw: impl Into<String>) -> Self {
    Self::new(QueryType::Prefix, raw)
  }

  pub fn cql(raw: impl Into<String>) -> Self {
    Self::new(QueryType::Cql, raw)
  }

  /// Append a sort key
  pub fn sort(mut self, field: impl Into<String>, direction: SortDir) -> Self {
    self.sort.push(SortKey::new(field, direction));
    self
  }

  pub fn kind(&self) -> QueryType {
    self.kind
  }

  pub fn raw(&self) -> &str {
    &self.raw
  }

  pub fn sort_keys(&self) -> &[SortKey] {
    &self.sort
  }

  /// Sort criteria in YAZ sort-spec form, `None` when unsorted
  pub fn sort_spec(&self) -> Option<String> {
    if self.sort.is_empty() {
      return None;
    }
    let parts: Vec<String> = self.sort.iter().map(|k| k.to_string()).collect();
    Some(parts.join(" "))
  }
}

impl fmt::Display for QuerySpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.kind, self.raw)?;
    if let Some(spec) = self.sort_spec() {
      write!(f, " sortby {}", spec)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_simple_query() {
    let q = QuerySpec::prefix("@attr 1=4 dinosaur");
    assert_eq!(q.kind(), QueryType::Prefix);
    assert_eq!(q.raw(), "@attr 1=4 dinosaur");
    assert!(q.sort_keys().is_empty());
    assert_eq!(q.sort_spec(), None);
  }

  #[test]
  fn test_sort_spec() {
    let q = QuerySpec::cql("title=dinosaur")
      .sort("1=4", SortDir::Asc)
      .sort("1=31", SortDir::Desc);
    assert_eq!(q.sort_spec().as_deref(), Some("1=4 < 1=31 >"));
    assert_eq!(q.to_string(), "cql:title=dinosaur sortby 1=4 < 1=31 >");
  }

  #[test]
  fn test_serialized_form() {
    let q = QuerySpec::prefix("@attr 1=4 x");
    let v = serde_json::to_value(&q).unwrap();
    assert_eq!(v["kind"], "prefix");
    assert!(v.get("sort").is_none());
  }
}
