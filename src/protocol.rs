//! Protocol vocabulary shared by sessions, backends and streams.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registered Z39.50 port, used when a host string carries none
pub const DEFAULT_PORT: u16 = 210;

/// Records fetched per round trip unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Value sent as `implementationName` unless overridden
pub const IMPLEMENTATION_NAME: &str = "zoom-client";

/// Well-known session option keys
pub mod keys {
  pub const PREFERRED_RECORD_SYNTAX: &str = "preferredRecordSyntax";
  pub const DATABASE_NAME: &str = "databaseName";
  pub const IMPLEMENTATION_NAME: &str = "implementationName";
  pub const ELEMENT_SET_NAME: &str = "elementSetName";
  pub const USER: &str = "user";
  pub const PASSWORD: &str = "password";
}

/// Query languages a backend may accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
  /// Prefix query format (PQF), e.g. `@attr 1=4 dinosaur`
  Prefix,
  Cql,
  Ccl,
}

impl QueryType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Prefix => "prefix",
      Self::Cql => "cql",
      Self::Ccl => "ccl",
    }
  }
}

impl fmt::Display for QueryType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for QueryType {
  type Err = ();
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "prefix" => Ok(Self::Prefix),
      "cql" => Ok(Self::Cql),
      "ccl" => Ok(Self::Ccl),
      _ => Err(()),
    }
  }
}

/// Lifecycle phase of a retrieval stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
  #[default]
  Idle,
  Connecting,
  Searching,
  Fetching,
  Emitting,
  Terminated,
}

impl Phase {
  /// True while a backend call is outstanding
  pub fn is_in_flight(&self) -> bool {
    matches!(self, Self::Connecting | Self::Searching | Self::Fetching)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_query_type_round_trips_through_str() {
    for kind in [QueryType::Prefix, QueryType::Cql, QueryType::Ccl] {
      assert_eq!(kind.as_str().parse::<QueryType>(), Ok(kind));
    }
    assert!("rpn".parse::<QueryType>().is_err());
    assert!("PREFIX".parse::<QueryType>().is_err());
  }

  #[test]
  fn test_in_flight_phases() {
    assert!(Phase::Connecting.is_in_flight());
    assert!(Phase::Searching.is_in_flight());
    assert!(Phase::Fetching.is_in_flight());
    assert!(!Phase::Idle.is_in_flight());
    assert!(!Phase::Emitting.is_in_flight());
    assert!(!Phase::Terminated.is_in_flight());
  }
}
