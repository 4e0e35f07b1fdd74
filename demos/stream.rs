//! Stream a result set page by page.
//!
//! Runs against the in-memory backend so it works offline:
//!
//! ```text
//! RUST_LOG=zoom_client=debug cargo run --example stream
//! ```

use futures::StreamExt;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use zoom_client::backend::memory::MemoryBackend;
use zoom_client::protocol::keys;
use zoom_client::{RawRecord, RecordField, RetrievalOptions, Session, SortDir};

#[tokio::main]
async fn main() -> zoom_client::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let catalog = (1..=45)
    .map(|n| {
      RawRecord::new(json!({ "id": n, "title": format!("Dinosaurs, volume {}", n) }))
        .with_syntax("usmarc")
        .with_database("INNOPAC")
    })
    .collect();
  let backend = MemoryBackend::with_records(catalog);

  let session = Session::new(backend, "192.83.186.170:210/INNOPAC")?
    .set_option(keys::PREFERRED_RECORD_SYNTAX, "usmarc");

  // Pull-based: each record is fetched only when asked for
  let mut query = session.query("prefix", "@attr 1=4 dinosaurs")?;
  query.sort("1=4", SortDir::Asc)?;
  let stream = query.stream(RetrievalOptions::default().page_size(10))?;
  for _ in 0..3 {
    if let Some(record) = stream.pull().await? {
      println!("{}", record.json());
    }
  }
  println!("stopped at {} of {:?}", stream.position(), stream.total());
  stream.cancel();

  // As a futures Stream, starting half way through
  let mut records = query
    .stream(RetrievalOptions::default().start_index(40))?
    .into_stream()
    .boxed();
  while let Some(record) = records.next().await {
    let record = record?;
    println!(
      "[{}] {}",
      record.get(RecordField::Database).unwrap_or_default(),
      record.json()["title"]
    );
  }

  // Direct access to the result set
  let results = query.search().await?;
  println!("{} records, last: {:?}", results.len(), results.records(44, 1).await?);

  Ok(())
}
