//! In-memory backend serving a fixed record list.
//!
//! Every call is logged and counted while in flight, failures can be
//! injected per phase, and each phase can be held open on a gate. Cloning
//! shares the same state, so a caller can keep a handle for inspection
//! after giving a clone to a [`Session`](crate::Session).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, Notify, Semaphore};

use super::{RecordPage, RemoteResultSet, SearchBackend};
use crate::error::{Error, Result};
use crate::options::SessionOptions;
use crate::protocol::QueryType;
use crate::query::QuerySpec;
use crate::record::RawRecord;

/// A backend call as observed by [`MemoryBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  Connect { host: String, port: u16 },
  Search { query: String },
  Fetch { offset: usize, count: usize },
}

#[derive(Default)]
struct Failures {
  connect: Option<String>,
  search: Option<String>,
  fetch_at: HashMap<usize, String>,
}

/// Holds calls of one phase until released
#[derive(Default)]
struct Gate {
  permits: Option<Semaphore>,
  started: Notify,
}

impl Gate {
  fn closed() -> Self {
    Self {
      permits: Some(Semaphore::new(0)),
      started: Notify::new(),
    }
  }

  async fn pass(&self) -> std::result::Result<(), AcquireError> {
    self.started.notify_one();
    if let Some(permits) = &self.permits {
      permits.acquire().await?.forget();
    }
    Ok(())
  }

  fn release(&self) {
    if let Some(permits) = &self.permits {
      permits.add_permits(1);
    }
  }
}

struct Inner {
  records: Vec<RawRecord>,
  reported_total: Option<usize>,
  query_types: Vec<QueryType>,
  latency: Option<Duration>,
  failures: Mutex<Failures>,
  calls: Mutex<Vec<Call>>,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
  connect_gate: Gate,
  search_gate: Gate,
  fetch_gate: Gate,
  live_result_sets: AtomicUsize,
}

impl Inner {
  fn enter(self: &Arc<Self>, call: Call) -> InFlight {
    self.calls.lock().push(call);
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    InFlight(self.clone())
  }

  async fn delay(&self) {
    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }
  }
}

struct InFlight(Arc<Inner>);

impl Drop for InFlight {
  fn drop(&mut self) {
    self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
  }
}

/// Builder for [`MemoryBackend`]
#[derive(Default)]
pub struct MemoryBackendBuilder {
  records: Vec<RawRecord>,
  reported_total: Option<usize>,
  query_types: Option<Vec<QueryType>>,
  latency: Option<Duration>,
  gate_connect: bool,
  gate_search: bool,
  gate_fetch: bool,
  failures: Failures,
}

impl MemoryBackendBuilder {
  pub fn records(mut self, records: Vec<RawRecord>) -> Self {
    self.records = records;
    self
  }

  /// Report a total that differs from the number of stored records
  pub fn reported_total(mut self, total: usize) -> Self {
    self.reported_total = Some(total);
    self
  }

  pub fn query_types(mut self, types: Vec<QueryType>) -> Self {
    self.query_types = Some(types);
    self
  }

  /// Delay every call by `latency`
  pub fn latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  /// Hold each fetch until [`MemoryBackend::release_fetch`] is called
  pub fn gated(mut self) -> Self {
    self.gate_fetch = true;
    self
  }

  /// Hold each connect until [`MemoryBackend::release_connect`] is called
  pub fn gated_connect(mut self) -> Self {
    self.gate_connect = true;
    self
  }

  /// Hold each search until [`MemoryBackend::release_search`] is called
  pub fn gated_search(mut self) -> Self {
    self.gate_search = true;
    self
  }

  pub fn fail_connect(mut self, message: impl Into<String>) -> Self {
    self.failures.connect = Some(message.into());
    self
  }

  pub fn fail_search(mut self, message: impl Into<String>) -> Self {
    self.failures.search = Some(message.into());
    self
  }

  pub fn fail_fetch_at(mut self, offset: usize, message: impl Into<String>) -> Self {
    self.failures.fetch_at.insert(offset, message.into());
    self
  }

  pub fn build(self) -> MemoryBackend {
    MemoryBackend {
      inner: Arc::new(Inner {
        records: self.records,
        reported_total: self.reported_total,
        query_types: self
          .query_types
          .unwrap_or_else(|| vec![QueryType::Prefix, QueryType::Cql]),
        latency: self.latency,
        failures: Mutex::new(self.failures),
        calls: Mutex::new(Vec::new()),
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
        connect_gate: gate(self.gate_connect),
        search_gate: gate(self.gate_search),
        fetch_gate: gate(self.gate_fetch),
        live_result_sets: AtomicUsize::new(0),
      }),
    }
  }
}

fn gate(closed: bool) -> Gate {
  if closed {
    Gate::closed()
  } else {
    Gate::default()
  }
}

/// Backend answering every query with the same records
#[derive(Clone)]
pub struct MemoryBackend {
  inner: Arc<Inner>,
}

impl MemoryBackend {
  pub fn builder() -> MemoryBackendBuilder {
    MemoryBackendBuilder::default()
  }

  /// Backend holding `records`, no failures, no latency
  pub fn with_records(records: Vec<RawRecord>) -> Self {
    Self::builder().records(records).build()
  }

  /// Every call made so far, in order
  pub fn calls(&self) -> Vec<Call> {
    self.inner.calls.lock().clone()
  }

  pub fn fetches(&self) -> Vec<(usize, usize)> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        Call::Fetch { offset, count } => Some((offset, count)),
        _ => None,
      })
      .collect()
  }

  pub fn in_flight(&self) -> usize {
    self.inner.in_flight.load(Ordering::SeqCst)
  }

  /// Highest number of concurrent calls ever observed
  pub fn max_in_flight(&self) -> usize {
    self.inner.max_in_flight.load(Ordering::SeqCst)
  }

  /// Result-set handles handed out and not yet dropped
  pub fn live_result_sets(&self) -> usize {
    self.inner.live_result_sets.load(Ordering::SeqCst)
  }

  /// Let one held connect complete
  pub fn release_connect(&self) {
    self.inner.connect_gate.release();
  }

  /// Let one held search complete
  pub fn release_search(&self) {
    self.inner.search_gate.release();
  }

  /// Let one held fetch complete
  pub fn release_fetch(&self) {
    self.inner.fetch_gate.release();
  }

  /// Resolves once a connect has been issued
  pub async fn connect_started(&self) {
    self.inner.connect_gate.started.notified().await;
  }

  /// Resolves once a search has been issued
  pub async fn search_started(&self) {
    self.inner.search_gate.started.notified().await;
  }

  /// Resolves once a fetch has been issued
  pub async fn fetch_started(&self) {
    self.inner.fetch_gate.started.notified().await;
  }

  /// Clear an injected connect failure
  pub fn heal_connect(&self) {
    self.inner.failures.lock().connect = None;
  }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
  fn supported_query_types(&self) -> &[QueryType] {
    &self.inner.query_types
  }

  async fn connect(&self, host: &str, port: u16, _options: &SessionOptions) -> Result<()> {
    let _guard = self.inner.enter(Call::Connect {
      host: host.to_string(),
      port,
    });
    self
      .inner
      .connect_gate
      .pass()
      .await
      .map_err(|e| Error::Connection(e.to_string()))?;
    self.inner.delay().await;

    let failure = self.inner.failures.lock().connect.clone();
    match failure {
      Some(message) => Err(Error::Connection(message)),
      None => Ok(()),
    }
  }

  async fn search(
    &self,
    query: &QuerySpec,
    _options: &SessionOptions,
  ) -> Result<Box<dyn RemoteResultSet>> {
    let _guard = self.inner.enter(Call::Search {
      query: query.to_string(),
    });
    self
      .inner
      .search_gate
      .pass()
      .await
      .map_err(|e| Error::Search(e.to_string()))?;
    self.inner.delay().await;

    let failure = self.inner.failures.lock().search.clone();
    if let Some(message) = failure {
      return Err(Error::Search(message));
    }

    self.inner.live_result_sets.fetch_add(1, Ordering::SeqCst);
    Ok(Box::new(MemoryResultSet {
      inner: self.inner.clone(),
      total: self
        .inner
        .reported_total
        .unwrap_or(self.inner.records.len()),
      options: HashMap::new(),
    }))
  }
}

struct MemoryResultSet {
  inner: Arc<Inner>,
  total: usize,
  options: HashMap<String, String>,
}

impl Drop for MemoryResultSet {
  fn drop(&mut self) {
    self.inner.live_result_sets.fetch_sub(1, Ordering::SeqCst);
  }
}

#[async_trait]
impl RemoteResultSet for MemoryResultSet {
  fn total_count(&self) -> usize {
    self.total
  }

  async fn fetch_range(&self, offset: usize, count: usize) -> Result<RecordPage> {
    let _guard = self.inner.enter(Call::Fetch { offset, count });
    self
      .inner
      .fetch_gate
      .pass()
      .await
      .map_err(|e| Error::Fetch(e.to_string()))?;
    self.inner.delay().await;

    let failure = self.inner.failures.lock().fetch_at.get(&offset).cloned();
    if let Some(message) = failure {
      return Err(Error::Fetch(message));
    }

    let records = &self.inner.records;
    let start = offset.min(records.len());
    let end = offset.saturating_add(count).min(records.len());
    Ok(RecordPage::new(records[start..end].to_vec()))
  }

  fn option(&self, key: &str) -> Option<String> {
    self.options.get(key).cloned()
  }

  fn set_option(&mut self, key: &str, value: &str) {
    self.options.insert(key.to_string(), value.to_string());
  }
}
