//! Seam between the client and whatever speaks the search protocol.
//!
//! A [`SearchBackend`] owns the transport: it connects, runs a query and hands
//! back a [`RemoteResultSet`], a handle to the records materialized on the
//! server. Records are only ever pulled through that handle in contiguous
//! ranges, one [`RecordPage`] per round trip.

pub mod memory;

use async_trait::async_trait;
use std::collections::VecDeque;

use crate::error::Result;
use crate::options::SessionOptions;
use crate::protocol::QueryType;
use crate::query::QuerySpec;
use crate::record::RawRecord;

/// Connects to a server and executes queries on it.
#[async_trait]
pub trait SearchBackend: Send + Sync {
  /// Query languages this backend accepts.
  fn supported_query_types(&self) -> &[QueryType] {
    &[QueryType::Prefix, QueryType::Cql]
  }

  /// Open the connection. Timeouts are the backend's business.
  async fn connect(&self, host: &str, port: u16, options: &SessionOptions) -> Result<()>;

  /// Run `query` on an open connection.
  async fn search(
    &self,
    query: &QuerySpec,
    options: &SessionOptions,
  ) -> Result<Box<dyn RemoteResultSet>>;
}

/// A result set materialized on the remote side.
#[async_trait]
pub trait RemoteResultSet: Send + Sync {
  /// Number of records the server reports for the search.
  fn total_count(&self) -> usize;

  /// Fetch records in `[offset, offset + count)`.
  ///
  /// A page may hold fewer records than asked for; callers must not treat
  /// a short page as an error.
  async fn fetch_range(&self, offset: usize, count: usize) -> Result<RecordPage>;

  /// Result-set level option, e.g. `schema` or `elementSetName`.
  fn option(&self, _key: &str) -> Option<String> {
    None
  }

  fn set_option(&mut self, _key: &str, _value: &str) {}
}

/// One-shot iterator over the records of one fetched range.
#[derive(Debug, Default)]
pub struct RecordPage {
  records: VecDeque<RawRecord>,
}

impl RecordPage {
  pub fn new(records: Vec<RawRecord>) -> Self {
    Self {
      records: records.into(),
    }
  }

  pub fn has_next(&self) -> bool {
    !self.records.is_empty()
  }

  pub fn remaining(&self) -> usize {
    self.records.len()
  }
}

impl Iterator for RecordPage {
  type Item = RawRecord;

  fn next(&mut self) -> Option<RawRecord> {
    self.records.pop_front()
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.records.len(), Some(self.records.len()))
  }
}

impl From<Vec<RawRecord>> for RecordPage {
  fn from(records: Vec<RawRecord>) -> Self {
    Self::new(records)
  }
}
