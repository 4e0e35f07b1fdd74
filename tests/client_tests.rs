//! Session and error tests.

use serde_json::json;
use zoom_client::backend::memory::{Call, MemoryBackend};
use zoom_client::protocol::keys;
use zoom_client::{
  clone_with_query, Error, QuerySpec, QueryType, RawRecord, RetrievalOptions, Session, SortDir,
};

fn backend(n: usize) -> MemoryBackend {
  MemoryBackend::with_records((0..n).map(|i| RawRecord::new(json!({ "n": i }))).collect())
}

#[test]
fn test_session_defaults() {
  let session = Session::new(backend(0), "z3950.loc.gov").unwrap();
  assert_eq!(session.target().host, "z3950.loc.gov");
  assert_eq!(session.target().port, 210);
  assert_eq!(session.option(keys::IMPLEMENTATION_NAME), Some("zoom-client"));
  assert_eq!(session.option(keys::DATABASE_NAME), None);
}

#[test]
fn test_session_option_chain() {
  let session = Session::new(backend(0), "192.83.186.170:210/INNOPAC")
    .unwrap()
    .set_option(keys::PREFERRED_RECORD_SYNTAX, "usmarc")
    .set_option(keys::IMPLEMENTATION_NAME, "catalog-sync");

  assert_eq!(session.option(keys::PREFERRED_RECORD_SYNTAX), Some("usmarc"));
  assert_eq!(session.option(keys::IMPLEMENTATION_NAME), Some("catalog-sync"));
  assert_eq!(session.option(keys::DATABASE_NAME), Some("INNOPAC"));
}

#[test]
fn test_invalid_host_string() {
  assert!(matches!(
    Session::new(backend(0), ""),
    Err(Error::InvalidOptions(_))
  ));
}

#[test]
fn test_unknown_query_type() {
  let session = Session::new(backend(0), "localhost").unwrap();
  match session.query("sql", "SELECT 1") {
    Err(Error::InvalidQueryType(kind)) => assert_eq!(kind, "sql"),
    other => panic!("expected InvalidQueryType, got {:?}", other),
  }
}

#[test]
fn test_query_type_unsupported_by_backend() {
  let backend = MemoryBackend::builder()
    .query_types(vec![QueryType::Prefix])
    .build();
  let session = Session::new(backend, "localhost").unwrap();
  assert!(session.query("prefix", "@attr 1=4 x").is_ok());
  assert!(matches!(
    session.query("cql", "title=x"),
    Err(Error::InvalidQueryType(_))
  ));
}

#[test]
fn test_sort_requires_query() {
  let mut session = Session::new(backend(0), "localhost/Books")
    .unwrap()
    .set_option(keys::ELEMENT_SET_NAME, "B");
  assert!(matches!(
    session.sort("1=4", SortDir::Asc),
    Err(Error::NoActiveQuery)
  ));

  // the failed call leaves the session usable
  assert_eq!(session.option(keys::ELEMENT_SET_NAME), Some("B"));
  assert!(session.active_query().is_none());

  let mut sorted = session.prefix_query("@attr 1=4 x").unwrap();
  sorted
    .sort("1=4", SortDir::Asc)
    .unwrap()
    .sort("1=31", SortDir::Desc)
    .unwrap();
  assert_eq!(
    sorted.active_query().unwrap().sort_spec().as_deref(),
    Some("1=4 < 1=31 >")
  );
}

#[test]
fn test_stream_requires_query() {
  let session = Session::new(backend(0), "localhost").unwrap();
  assert!(matches!(
    session.stream(RetrievalOptions::default()),
    Err(Error::NoActiveQuery)
  ));
}

#[test]
fn test_stream_rejects_zero_page_size() {
  let session = Session::new(backend(0), "localhost")
    .unwrap()
    .prefix_query("x")
    .unwrap();
  assert!(matches!(
    session.stream(RetrievalOptions::default().page_size(0)),
    Err(Error::InvalidOptions(_))
  ));
}

#[test]
fn test_clone_with_query() {
  let base = Session::new(backend(0), "localhost/Books")
    .unwrap()
    .set_option(keys::ELEMENT_SET_NAME, "F");
  let snapshot = clone_with_query(&base, QuerySpec::cql("title=rust"));

  assert!(base.active_query().is_none());
  assert_eq!(snapshot.active_query(), Some(&QuerySpec::cql("title=rust")));
  assert_eq!(snapshot.option(keys::ELEMENT_SET_NAME), Some("F"));
  assert_eq!(snapshot.target(), base.target());
}

#[tokio::test]
async fn test_search_requires_query() {
  let b = backend(1);
  let session = Session::new(b.clone(), "localhost").unwrap();
  assert!(matches!(session.search().await, Err(Error::NoActiveQuery)));
  assert!(b.calls().is_empty());
}

#[tokio::test]
async fn test_connect_is_idempotent() {
  let b = backend(0);
  let session = Session::new(b.clone(), "localhost:2100").unwrap();
  session.connect().await.unwrap();
  session.connect().await.unwrap();
  assert!(session.is_connected());
  assert_eq!(
    b.calls(),
    vec![Call::Connect {
      host: "localhost".to_string(),
      port: 2100
    }]
  );
}

#[tokio::test]
async fn test_search_connects_and_fetches() {
  let b = backend(5);
  let session = Session::new(b.clone(), "localhost")
    .unwrap()
    .prefix_query("@attr 1=4 x")
    .unwrap();

  let mut results = session.search().await.unwrap();
  assert_eq!(results.len(), 5);
  assert!(!results.is_empty());
  assert!(session.is_connected());

  let records = results.records(1, 2).await.unwrap();
  assert_eq!(records.len(), 2);
  assert_eq!(records[0].json()["n"], 1);
  assert!(results.records(0, 0).await.unwrap().is_empty());

  results.set_option("schema", "marc21");
  assert_eq!(results.option("schema").as_deref(), Some("marc21"));
  assert_eq!(results.option("elementSetName"), None);
}

#[tokio::test]
async fn test_search_surfaces_backend_error() {
  let b = MemoryBackend::builder().fail_search("bad query").build();
  let session = Session::new(b, "localhost").unwrap().prefix_query("@").unwrap();
  match session.search().await {
    Err(Error::Search(msg)) => assert_eq!(msg, "bad query"),
    other => panic!("expected search error, got {:?}", other),
  }
}

#[test]
fn test_error_display() {
  let err = Error::Connection("refused".to_string());
  assert_eq!(format!("{}", err), "Connection error: refused");

  let err = Error::Search("bad attribute".to_string());
  assert_eq!(format!("{}", err), "Search error: bad attribute");

  let err = Error::Fetch("gone".to_string());
  assert_eq!(format!("{}", err), "Fetch error: gone");

  let err = Error::InvalidQueryType("sql".to_string());
  assert_eq!(format!("{}", err), "Invalid query type: sql");

  let err = Error::NoActiveQuery;
  assert_eq!(format!("{}", err), "No active query");

  let err = Error::ConcurrentPull;
  assert!(format!("{}", err).contains("pending"));
}

#[test]
fn test_error_message_strips_kind() {
  assert_eq!(Error::Fetch("gone".to_string()).message(), "gone");
  assert_eq!(Error::NoActiveQuery.message(), "No active query");
}

#[test]
fn test_error_from_json() {
  let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
  let err: Error = json_err.into();
  match err {
    Error::Serialization(_) => {}
    _ => panic!("Expected Serialization error"),
  }
}
