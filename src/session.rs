//! Sessions: connection handle, options and the active query.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::backend::{RecordPage, RemoteResultSet, SearchBackend};
use crate::error::{Error, Result};
use crate::options::{ConnectTarget, RetrievalOptions, SessionOptions};
use crate::protocol::{keys, QueryType};
use crate::query::{QuerySpec, SortDir};
use crate::record::Record;
use crate::stream::RecordStream;

/// Connection shared by every snapshot derived from one session
struct Connection {
  backend: Arc<dyn SearchBackend>,
  target: ConnectTarget,
  connected: AtomicBool,
}

impl Connection {
  async fn connect(&self, options: &SessionOptions) -> Result<()> {
    if self.connected.load(Ordering::SeqCst) {
      return Ok(());
    }

    debug!(host = %self.target.host, port = self.target.port, "connecting");
    self
      .backend
      .connect(&self.target.host, self.target.port, options)
      .await?;
    self.connected.store(true, Ordering::SeqCst);
    debug!(host = %self.target.host, port = self.target.port, "connected");
    Ok(())
  }
}

/// A configured connection to one search server, optionally carrying a query.
///
/// Cloning a session (or calling [`Session::query`]) yields a snapshot:
/// options and query are copied, the connection is shared. Connecting
/// through any snapshot marks all of them connected.
///
/// # Example
///
/// ```no_run
/// use zoom_client::backend::memory::MemoryBackend;
/// use zoom_client::{RetrievalOptions, Session};
///
/// # async fn run() -> zoom_client::Result<()> {
/// let session = Session::new(MemoryBackend::with_records(vec![]), "z3950.loc.gov:7090/Voyager")?
///   .set_option("preferredRecordSyntax", "usmarc");
///
/// let stream = session
///   .query("prefix", "@attr 1=4 dinosaur")?
///   .stream(RetrievalOptions::default())?;
///
/// while let Some(record) = stream.pull().await? {
///   println!("{}", record.json());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
  connection: Arc<Connection>,
  options: SessionOptions,
  query: Option<QuerySpec>,
}

impl Session {
  /// Create a session for `host[:port][/database]`. Nothing is sent yet.
  pub fn new(backend: impl SearchBackend + 'static, host: &str) -> Result<Self> {
    Self::with_backend(Arc::new(backend), host)
  }

  pub fn with_backend(backend: Arc<dyn SearchBackend>, host: &str) -> Result<Self> {
    let target = ConnectTarget::parse(host)?;
    let mut options = SessionOptions::default();
    if let Some(database) = &target.database {
      options.set(keys::DATABASE_NAME, database.clone());
    }

    Ok(Self {
      connection: Arc::new(Connection {
        backend,
        target,
        connected: AtomicBool::new(false),
      }),
      options,
      query: None,
    })
  }

  pub fn set_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.options.set(key, value);
    self
  }

  pub fn option(&self, key: &str) -> Option<&str> {
    self.options.get(key)
  }

  pub fn options(&self) -> &SessionOptions {
    &self.options
  }

  pub fn target(&self) -> &ConnectTarget {
    &self.connection.target
  }

  /// Snapshot of this session with a new query attached.
  ///
  /// `kind` is one of `prefix`, `cql` or `ccl` and must be supported by the
  /// backend. This session's own query slot is left untouched.
  pub fn query(&self, kind: &str, raw: impl Into<String>) -> Result<Session> {
    let kind = kind
      .parse::<QueryType>()
      .ok()
      .filter(|k| self.connection.backend.supported_query_types().contains(k))
      .ok_or_else(|| Error::InvalidQueryType(kind.to_string()))?;

    Ok(clone_with_query(self, QuerySpec::new(kind, raw)))
  }

  /// Snapshot with a prefix query attached
  pub fn prefix_query(&self, raw: impl Into<String>) -> Result<Session> {
    self.query(QueryType::Prefix.as_str(), raw)
  }

  /// Add a sort key to the active query. The session is left as it was
  /// when there is none.
  pub fn sort(&mut self, field: impl Into<String>, direction: SortDir) -> Result<&mut Self> {
    let query = self.query.take().ok_or(Error::NoActiveQuery)?;
    self.query = Some(query.sort(field, direction));
    Ok(self)
  }

  pub fn active_query(&self) -> Option<&QuerySpec> {
    self.query.as_ref()
  }

  pub fn is_connected(&self) -> bool {
    self.connection.connected.load(Ordering::SeqCst)
  }

  /// Connect unless the shared connection already is
  pub async fn connect(&self) -> Result<()> {
    self.connection.connect(&self.options).await
  }

  /// Connect if needed and run the active query.
  pub async fn search(&self) -> Result<ResultSet> {
    let query = self.query.as_ref().ok_or(Error::NoActiveQuery)?;
    self.connect().await?;

    debug!(query = %query, "searching");
    let inner = self
      .connection
      .backend
      .search(query, &self.options)
      .await?;
    debug!(query = %query, total = inner.total_count(), "search complete");
    Ok(ResultSet { inner })
  }

  /// Lazily paginated stream over the active query's results.
  ///
  /// No I/O happens until the first pull.
  pub fn stream(&self, options: RetrievalOptions) -> Result<RecordStream> {
    let query = self.query.clone().ok_or(Error::NoActiveQuery)?;
    options.validate()?;
    Ok(RecordStream::new(self.clone(), query, options))
  }

  pub(crate) fn backend(&self) -> &dyn SearchBackend {
    self.connection.backend.as_ref()
  }
}

impl fmt::Debug for Session {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Session")
      .field("target", &self.connection.target)
      .field("connected", &self.is_connected())
      .field("options", &self.options)
      .field("query", &self.query)
      .finish()
  }
}

/// Copy `base` with `spec` as its query, sharing the connection handle.
pub fn clone_with_query(base: &Session, spec: QuerySpec) -> Session {
  Session {
    connection: Arc::clone(&base.connection),
    options: base.options.clone(),
    query: Some(spec),
  }
}

/// Handle to a result set produced by [`Session::search`]
pub struct ResultSet {
  inner: Box<dyn RemoteResultSet>,
}

impl ResultSet {
  pub fn len(&self) -> usize {
    self.inner.total_count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Fetch records in `[offset, offset + count)`
  pub async fn fetch(&self, offset: usize, count: usize) -> Result<RecordPage> {
    if count == 0 {
      return Ok(RecordPage::default());
    }
    self.inner.fetch_range(offset, count).await
  }

  /// Fetch and decode records in `[offset, offset + count)`
  pub async fn records(&self, offset: usize, count: usize) -> Result<Vec<Record>> {
    Ok(self.fetch(offset, count).await?.map(Record::from).collect())
  }

  pub fn option(&self, key: &str) -> Option<String> {
    self.inner.option(key)
  }

  pub fn set_option(&mut self, key: &str, value: &str) -> &mut Self {
    self.inner.set_option(key, value);
    self
  }
}

impl fmt::Debug for ResultSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResultSet").field("len", &self.len()).finish()
  }
}
