//! Error types for the search client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Connection error: {0}")]
  Connection(String),

  #[error("Search error: {0}")]
  Search(String),

  #[error("Fetch error: {0}")]
  Fetch(String),

  #[error("Invalid query type: {0}")]
  InvalidQueryType(String),

  #[error("No active query")]
  NoActiveQuery,

  #[error("Pull issued while a previous pull is still pending")]
  ConcurrentPull,

  #[error("Invalid options: {0}")]
  InvalidOptions(String),

  #[error("Serialization error: {0}")]
  Serialization(String),
}

impl Error {
  /// Message carried by the error, without the kind prefix.
  pub fn message(&self) -> String {
    match self {
      Self::Connection(m)
      | Self::Search(m)
      | Self::Fetch(m)
      | Self::InvalidQueryType(m)
      | Self::InvalidOptions(m)
      | Self::Serialization(m) => m.clone(),
      other => other.to_string(),
    }
  }
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self {
    Self::Serialization(e.to_string())
  }
}

pub type Result<T> = std::result::Result<T, Error>;
