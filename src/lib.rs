//! Async client for remote bibliographic search servers
//!
//! A [`Session`] describes one server and its options; attaching a query
//! yields a snapshot from which a [`RecordStream`] is created. The stream
//! connects, searches and fetches pages lazily, one backend call at a time,
//! and only as fast as the consumer pulls.
//!
//! The protocol itself is behind the [`SearchBackend`] trait.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use zoom_client::backend::memory::MemoryBackend;
//! use zoom_client::{RetrievalOptions, Session};
//!
//! #[tokio::main]
//! async fn main() -> zoom_client::Result<()> {
//!     let backend = MemoryBackend::with_records(vec![]);
//!     let session = Session::new(backend, "192.83.186.170:210/INNOPAC")?
//!         .set_option("preferredRecordSyntax", "usmarc");
//!
//!     let mut records = session
//!         .query("prefix", "@attr 1=4 dinosaur")?
//!         .stream(RetrievalOptions::default().page_size(10))?
//!         .into_stream()
//!         .boxed();
//!
//!     while let Some(record) = records.next().await {
//!         println!("{}", record?.json());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
mod error;
mod options;
pub mod protocol;
pub mod query;
mod record;
mod session;
mod stream;

pub use backend::{RecordPage, RemoteResultSet, SearchBackend};
pub use error::{Error, Result};
pub use options::{ConnectTarget, RetrievalOptions, SessionOptions};
pub use protocol::{Phase, QueryType, DEFAULT_PAGE_SIZE, DEFAULT_PORT};
pub use query::{QuerySpec, SortDir, SortKey};
pub use record::{RawRecord, Record, RecordField};
pub use session::{clone_with_query, ResultSet, Session};
pub use stream::RecordStream;
