//! Pull-driven, lazily paginated record stream.
//!
//! A [`RecordStream`] turns one query into a sequence of records. Nothing
//! touches the network until the first [`pull`](RecordStream::pull); from
//! there each pull walks the state machine below until it can hand back
//! one record, the end of the sequence, or an error:
//!
//! 1. terminated: end of sequence
//! 2. not connected: connect
//! 3. no result set: search, remember the total
//! 4. no records left in the current page: fetch the next page
//! 5. otherwise: emit the next record of the page
//!
//! Steps 2 to 4 each await exactly one backend call, so a single pull may
//! pass through several of them, but never two at once. Records are emitted
//! in offset order and only on demand; the only buffer is the current page.

use futures::Stream;
use parking_lot::Mutex;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::backend::{RecordPage, RemoteResultSet};
use crate::error::{Error, Result};
use crate::options::RetrievalOptions;
use crate::protocol::Phase;
use crate::query::QuerySpec;
use crate::record::Record;
use crate::session::Session;

#[derive(Debug, Clone, Copy)]
struct Cursor {
  phase: Phase,
  index: usize,
  total: Option<usize>,
}

/// Remote resources owned by the stream. Locked for the duration of a pull.
#[derive(Default)]
struct Resources {
  result_set: Option<Box<dyn RemoteResultSet>>,
  page: Option<RecordPage>,
  fresh_page: bool,
}

enum Step {
  Continue,
  Emit(Record),
  End,
  Fail(Error),
}

/// Lazily paginated stream over the results of one query.
///
/// Created by [`Session::stream`]. Dropping the stream cancels it.
pub struct RecordStream {
  id: Uuid,
  session: Session,
  query: QuerySpec,
  page_size: usize,
  cursor: Mutex<Cursor>,
  resources: tokio::sync::Mutex<Resources>,
  cancel: CancellationToken,
}

impl RecordStream {
  pub(crate) fn new(session: Session, query: QuerySpec, options: RetrievalOptions) -> Self {
    let id = Uuid::new_v4();
    debug!(
      stream_id = %id,
      query = %query,
      start_index = options.start_index,
      page_size = options.page_size,
      "stream created"
    );

    Self {
      id,
      session,
      query,
      page_size: options.page_size,
      cursor: Mutex::new(Cursor {
        phase: Phase::Idle,
        index: options.start_index,
        total: None,
      }),
      resources: tokio::sync::Mutex::new(Resources::default()),
      cancel: CancellationToken::new(),
    }
  }

  /// Identifier carried as `stream_id` in log events
  pub fn id(&self) -> Uuid {
    self.id
  }

  /// Current step of the state machine
  pub fn phase(&self) -> Phase {
    self.cursor.lock().phase
  }

  /// Offset of the next record to emit
  pub fn position(&self) -> usize {
    self.cursor.lock().index
  }

  /// Result set size, known once the search has completed
  pub fn total(&self) -> Option<usize> {
    self.cursor.lock().total
  }

  /// True once the stream has ended, failed or been cancelled
  pub fn is_terminated(&self) -> bool {
    self.phase() == Phase::Terminated
  }

  /// Request the next record.
  ///
  /// Returns `Ok(Some(record))`, `Ok(None)` at the end of the sequence, or
  /// the error that terminated the stream. After termination every pull
  /// returns `Ok(None)` without touching the backend. A pull issued while
  /// another is still pending fails with [`Error::ConcurrentPull`].
  pub async fn pull(&self) -> Result<Option<Record>> {
    let Ok(resources) = self.resources.try_lock() else {
      warn!(stream_id = %self.id, "pull issued while another is pending");
      return Err(Error::ConcurrentPull);
    };
    let mut pending = PendingPull {
      stream: self,
      resources,
    };

    {
      // Left behind by a pull whose future was dropped mid-call; holding the
      // lock means nothing is in flight any more.
      let mut cursor = self.cursor.lock();
      if cursor.phase.is_in_flight() {
        cursor.phase = Phase::Idle;
      }
    }

    loop {
      if self.cancel.is_cancelled() {
        self.terminate(&mut pending.resources);
        return Ok(None);
      }

      match self.resume(&mut pending.resources).await {
        Step::Continue => {}
        Step::Emit(record) => return Ok(Some(record)),
        Step::End => return Ok(None),
        Step::Fail(err) => return Err(err),
      }
    }
  }

  /// Stop the stream. Idempotent; a backend call in flight is abandoned
  /// and its outcome discarded.
  pub fn cancel(&self) {
    if self.cancel.is_cancelled() {
      return;
    }
    debug!(stream_id = %self.id, "stream cancelled");
    self.cancel.cancel();
    self.mark_terminated();

    // A pending pull releases the resources itself, when it wakes up or
    // when its future is dropped.
    if let Ok(mut resources) = self.resources.try_lock() {
      self.terminate(&mut resources);
    }
  }

  /// Adapt into a [`Stream`] that ends after the last record or the first error.
  pub fn into_stream(self) -> impl Stream<Item = Result<Record>> + Send {
    futures::stream::unfold(Some(self), |state| async move {
      let Some(stream) = state else {
        return None;
      };
      match stream.pull().await {
        Ok(Some(record)) => Some((Ok(record), Some(stream))),
        Ok(None) => None,
        Err(err) => Some((Err(err), None)),
      }
    })
  }

  /// Advance the state machine by one transition.
  async fn resume(&self, resources: &mut Resources) -> Step {
    if self.phase() == Phase::Terminated {
      return Step::End;
    }

    if !self.session.is_connected() {
      self.enter(Phase::Connecting);
      return match self.guarded(self.session.connect()).await {
        None => self.cancelled(resources),
        Some(Err(err)) => self.fail(resources, Error::Connection(err.message())),
        Some(Ok(())) => {
          self.enter(Phase::Idle);
          Step::Continue
        }
      };
    }

    if resources.result_set.is_none() {
      self.enter(Phase::Searching);
      let search = self
        .session
        .backend()
        .search(&self.query, self.session.options());
      return match self.guarded(search).await {
        None => self.cancelled(resources),
        Some(Err(err)) => self.fail(resources, Error::Search(err.message())),
        Some(Ok(set)) => {
          let total = set.total_count();
          {
            let mut cursor = self.cursor.lock();
            cursor.phase = Phase::Idle;
            cursor.total = Some(total);
            cursor.index = cursor.index.min(total);
          }
          debug!(stream_id = %self.id, total, "search complete");
          resources.result_set = Some(set);
          Step::Continue
        }
      };
    }

    let (index, total) = {
      let cursor = self.cursor.lock();
      (cursor.index, cursor.total.unwrap_or(0))
    };
    if index >= total {
      self.terminate(resources);
      return Step::End;
    }

    let page_ready = resources.page.as_ref().is_some_and(RecordPage::has_next);
    if !page_ready {
      if resources.fresh_page {
        warn!(stream_id = %self.id, offset = index, total, "server returned an empty page");
        self.terminate(resources);
        return Step::End;
      }

      let count = self.page_size.min(total - index);
      self.enter(Phase::Fetching);
      trace!(stream_id = %self.id, offset = index, count, "fetching page");
      let fetched = match resources.result_set.as_deref() {
        Some(set) => self.guarded(set.fetch_range(index, count)).await,
        None => return Step::Continue,
      };
      return match fetched {
        None => self.cancelled(resources),
        Some(Err(err)) => self.fail(resources, Error::Fetch(err.message())),
        Some(Ok(page)) => {
          trace!(stream_id = %self.id, offset = index, received = page.remaining(), "page loaded");
          resources.page = Some(page);
          resources.fresh_page = true;
          self.enter(Phase::Emitting);
          Step::Continue
        }
      };
    }

    let Some(raw) = resources.page.as_mut().and_then(Iterator::next) else {
      return Step::Continue;
    };
    resources.fresh_page = false;

    let index = {
      let mut cursor = self.cursor.lock();
      cursor.index += 1;
      cursor.phase = Phase::Emitting;
      cursor.index
    };
    if index >= total {
      self.terminate(resources);
    }
    Step::Emit(Record::from(raw))
  }

  /// Await `op` unless the stream is cancelled first. `None` means the
  /// outcome must be discarded.
  async fn guarded<T>(&self, op: impl Future<Output = Result<T>>) -> Option<Result<T>> {
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => None,
      outcome = op => (!self.cancel.is_cancelled()).then_some(outcome),
    }
  }

  fn enter(&self, phase: Phase) {
    let mut cursor = self.cursor.lock();
    debug_assert!(
      !(phase.is_in_flight() && cursor.phase.is_in_flight()),
      "backend call issued while {:?} is in flight",
      cursor.phase
    );
    cursor.phase = phase;
  }

  fn cancelled(&self, resources: &mut Resources) -> Step {
    trace!(stream_id = %self.id, "discarding outcome of cancelled call");
    self.terminate(resources);
    Step::End
  }

  fn fail(&self, resources: &mut Resources, err: Error) -> Step {
    warn!(stream_id = %self.id, error = %err, "stream failed");
    self.terminate(resources);
    Step::Fail(err)
  }

  fn terminate(&self, resources: &mut Resources) {
    resources.result_set = None;
    resources.page = None;
    resources.fresh_page = false;
    self.mark_terminated();
  }

  fn mark_terminated(&self) {
    let mut cursor = self.cursor.lock();
    if cursor.phase != Phase::Terminated {
      cursor.phase = Phase::Terminated;
      debug!(stream_id = %self.id, emitted_to = cursor.index, "stream terminated");
    }
  }
}

/// Lock held by a pull for its whole duration.
struct PendingPull<'a> {
  stream: &'a RecordStream,
  resources: tokio::sync::MutexGuard<'a, Resources>,
}

impl Drop for PendingPull<'_> {
  fn drop(&mut self) {
    // covers a pull future dropped while parked on a cancelled call
    if self.stream.cancel.is_cancelled() {
      self.stream.terminate(&mut self.resources);
    }
  }
}

impl Drop for RecordStream {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}
