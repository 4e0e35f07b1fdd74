//! Session and retrieval configuration.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::protocol::{keys, DEFAULT_PAGE_SIZE, DEFAULT_PORT, IMPLEMENTATION_NAME};

static HOST_PATTERN: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^(.+?)(?::(\d+))?(?:/(.+))?$").expect("host pattern is valid"));

/// Key/value options consumed by the backend at connect and search time.
///
/// Last write wins on duplicate keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
  values: HashMap<String, String>,
}

impl Default for SessionOptions {
  fn default() -> Self {
    let mut values = HashMap::new();
    values.insert(
      keys::IMPLEMENTATION_NAME.to_string(),
      IMPLEMENTATION_NAME.to_string(),
    );
    Self { values }
  }
}

impl SessionOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
    self.values.insert(key.into(), value.into());
    self
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.values.get(key).map(String::as_str)
  }

  pub fn remove(&mut self, key: &str) -> Option<String> {
    self.values.remove(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

/// Where a session connects, parsed from `host[:port][/database]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
  pub host: String,
  pub port: u16,
  pub database: Option<String>,
}

impl ConnectTarget {
  pub fn parse(input: &str) -> Result<Self> {
    let caps = HOST_PATTERN
      .captures(input)
      .ok_or_else(|| Error::InvalidOptions(format!("invalid host string: {:?}", input)))?;

    let host = caps[1].to_string();
    let port = match caps.get(2) {
      Some(m) => m
        .as_str()
        .parse::<u16>()
        .map_err(|_| Error::InvalidOptions(format!("invalid port: {}", m.as_str())))?,
      None => DEFAULT_PORT,
    };
    let database = caps.get(3).map(|m| m.as_str().to_string());

    Ok(Self {
      host,
      port,
      database,
    })
  }
}

/// Options accepted when a retrieval stream is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalOptions {
  /// Offset of the first record to emit
  pub start_index: usize,
  /// Records requested per page fetch
  pub page_size: usize,
}

impl Default for RetrievalOptions {
  fn default() -> Self {
    Self {
      start_index: 0,
      page_size: DEFAULT_PAGE_SIZE,
    }
  }
}

impl RetrievalOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn start_index(mut self, index: usize) -> Self {
    self.start_index = index;
    self
  }

  pub fn page_size(mut self, size: usize) -> Self {
    self.page_size = size;
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.page_size == 0 {
      return Err(Error::InvalidOptions("page_size must be > 0".to_string()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_options_carry_implementation_name() {
    let opts = SessionOptions::default();
    assert_eq!(opts.get(keys::IMPLEMENTATION_NAME), Some(IMPLEMENTATION_NAME));
  }

  #[test]
  fn test_last_write_wins() {
    let mut opts = SessionOptions::new();
    opts
      .set(keys::PREFERRED_RECORD_SYNTAX, "xml")
      .set(keys::PREFERRED_RECORD_SYNTAX, "usmarc");
    assert_eq!(opts.get(keys::PREFERRED_RECORD_SYNTAX), Some("usmarc"));
  }

  #[test]
  fn test_parse_full_target() {
    let t = ConnectTarget::parse("192.83.186.170:210/INNOPAC").unwrap();
    assert_eq!(t.host, "192.83.186.170");
    assert_eq!(t.port, 210);
    assert_eq!(t.database.as_deref(), Some("INNOPAC"));
  }

  #[test]
  fn test_parse_host_only() {
    let t = ConnectTarget::parse("z3950.loc.gov").unwrap();
    assert_eq!(t.host, "z3950.loc.gov");
    assert_eq!(t.port, DEFAULT_PORT);
    assert!(t.database.is_none());

    let t = ConnectTarget::parse("lx2.loc.gov/LCDB").unwrap();
    assert_eq!(t.host, "lx2.loc.gov");
    assert_eq!(t.database.as_deref(), Some("LCDB"));
  }

  #[test]
  fn test_parse_rejects_bad_input() {
    assert!(matches!(ConnectTarget::parse(""), Err(Error::InvalidOptions(_))));
    assert!(matches!(
      ConnectTarget::parse("host:99999"),
      Err(Error::InvalidOptions(_))
    ));
  }

  #[test]
  fn test_retrieval_options() {
    let opts = RetrievalOptions::default();
    assert_eq!(opts.start_index, 0);
    assert_eq!(opts.page_size, 20);
    assert!(opts.validate().is_ok());
    assert!(RetrievalOptions::new().page_size(0).validate().is_err());

    let parsed: RetrievalOptions = serde_json::from_str(r#"{"page_size": 5}"#).unwrap();
    assert_eq!(parsed, RetrievalOptions::new().page_size(5));
  }
}
