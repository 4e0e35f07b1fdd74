//! Records returned by a search.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A record as handed over by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
  /// Record syntax, e.g. `usmarc`
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub syntax: Option<String>,
  /// Database the record came from
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub database: Option<String>,
  /// JSON rendition of the record
  pub data: serde_json::Value,
  /// Human readable rendition, if the backend provides one
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub render: Option<String>,
}

impl RawRecord {
  pub fn new(data: serde_json::Value) -> Self {
    Self {
      syntax: None,
      database: None,
      data,
      render: None,
    }
  }

  pub fn with_syntax(mut self, syntax: impl Into<String>) -> Self {
    self.syntax = Some(syntax.into());
    self
  }

  pub fn with_database(mut self, database: impl Into<String>) -> Self {
    self.database = Some(database.into());
    self
  }

  pub fn with_render(mut self, render: impl Into<String>) -> Self {
    self.render = Some(render.into());
    self
  }
}

/// Textual views of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
  Render,
  Json,
  Syntax,
  Database,
}

/// A decoded record wrapping exactly one [`RawRecord`]
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
  raw: RawRecord,
}

impl Record {
  pub fn json(&self) -> &serde_json::Value {
    &self.raw.data
  }

  pub fn syntax(&self) -> Option<&str> {
    self.raw.syntax.as_deref()
  }

  pub fn database(&self) -> Option<&str> {
    self.raw.database.as_deref()
  }

  pub fn render(&self) -> Option<&str> {
    self.raw.render.as_deref()
  }

  /// Textual form of one field; `Render` falls back to pretty JSON.
  pub fn get(&self, field: RecordField) -> Option<String> {
    match field {
      RecordField::Render => self
        .raw
        .render
        .clone()
        .or_else(|| serde_json::to_string_pretty(&self.raw.data).ok()),
      RecordField::Json => serde_json::to_string(&self.raw.data).ok(),
      RecordField::Syntax => self.raw.syntax.clone(),
      RecordField::Database => self.raw.database.clone(),
    }
  }

  pub fn raw(&self) -> &RawRecord {
    &self.raw
  }

  pub fn into_raw(self) -> RawRecord {
    self.raw
  }
}

impl From<RawRecord> for Record {
  fn from(raw: RawRecord) -> Self {
    Self { raw }
  }
}

impl Serialize for Record {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.raw.data.serialize(serializer)
  }
}

impl fmt::Display for Record {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.get(RecordField::Render) {
      Some(text) => f.write_str(&text),
      None => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_record_fields() {
    let record = Record::from(
      RawRecord::new(json!({"title": "Dinosaurs"}))
        .with_syntax("usmarc")
        .with_database("INNOPAC"),
    );
    assert_eq!(record.json()["title"], "Dinosaurs");
    assert_eq!(record.get(RecordField::Syntax).as_deref(), Some("usmarc"));
    assert_eq!(record.get(RecordField::Database).as_deref(), Some("INNOPAC"));
    assert_eq!(
      record.get(RecordField::Json).as_deref(),
      Some(r#"{"title":"Dinosaurs"}"#)
    );
  }

  #[test]
  fn test_render_falls_back_to_json() {
    let plain = Record::from(RawRecord::new(json!({"a": 1})));
    assert!(plain.get(RecordField::Render).unwrap().contains("\"a\": 1"));

    let rendered = Record::from(RawRecord::new(json!({})).with_render("245 $a Dinosaurs"));
    assert_eq!(rendered.to_string(), "245 $a Dinosaurs");
  }

  #[test]
  fn test_record_serializes_as_payload() {
    let record = Record::from(RawRecord::new(json!({"id": 7})).with_syntax("xml"));
    assert_eq!(serde_json::to_value(&record).unwrap(), json!({"id": 7}));
  }
}
