//! Classification of decoded stream records.
//!
//! Each record is a JSON document with a `type` discriminator:
//!
//! ```text
//! {"type": "log", "message": "Checking database for AAPL revenue (2023)..."}
//! {"type": "result", "data": "Apple reported revenue of $383B in 2023."}
//! {"type": "result", "data": {"type": "chart", "title": "Revenue", "labels": [...], "datasets": [...]}}
//! ```
//!
//! Unknown discriminators are ignored so the backend can add event kinds
//! without breaking older clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Discriminator for progress notes.
pub const LOG: &str = "log";
/// Discriminator for the final answer.
pub const RESULT: &str = "result";
/// Discriminator inside a result's `data` document marking chart content.
pub const CHART: &str = "chart";

/// A record that could not be interpreted.
///
/// Never fatal: the record is dropped and the exchange continues.
#[derive(Debug, Error, PartialEq)]
pub enum MalformedRecord {
    #[error("record is not valid json: {0}")]
    Json(String),

    #[error("record is not a json object")]
    NotAnObject,

    #[error("'{kind}' record is missing field '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("invalid chart payload: {0}")]
    InvalidChart(String),
}

/// A classified event ready to be folded into the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// An intermediate progress note from the agent.
    Step(String),
    /// The single final answer of the exchange.
    Finalize(FinalAnswer),
}

/// The content delivered by a `result` event.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalAnswer {
    Text(String),
    Chart(ChartPayload),
}

/// Structured chart content: category labels and one or more named series.
///
/// Keys this client does not read (including the `type` discriminator) are
/// kept in `extra`, and values stay as the backend sent them, so the payload
/// serializes back to the document it was parsed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named numeric series, aligned positionally with the chart labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub data: Vec<Number>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChartPayload {
    /// Pair each label with the value of every dataset at the same position.
    ///
    /// A dataset shorter than the label list yields `None` for the missing
    /// positions.
    pub fn rows(&self) -> impl Iterator<Item = (&str, Vec<Option<f64>>)> + '_ {
        self.labels.iter().enumerate().map(|(i, label)| {
            let values = self
                .datasets
                .iter()
                .map(|dataset| dataset.data.get(i).and_then(Number::as_f64))
                .collect();
            (label.as_str(), values)
        })
    }
}

/// Classify one decoded record.
///
/// Returns `Ok(None)` for records with an unrecognised (or absent) `type`.
pub fn classify(record: &str) -> Result<Option<StreamEvent>, MalformedRecord> {
    let value: Value =
        serde_json::from_str(record).map_err(|e| MalformedRecord::Json(e.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(MalformedRecord::NotAnObject);
    };

    let kind = fields
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match kind.as_str() {
        LOG => match fields.remove("message") {
            Some(Value::String(message)) => Ok(Some(StreamEvent::Step(message))),
            _ => Err(MalformedRecord::MissingField {
                kind: LOG,
                field: "message",
            }),
        },
        RESULT => {
            let data = fields.remove("data").ok_or(MalformedRecord::MissingField {
                kind: RESULT,
                field: "data",
            })?;
            Ok(Some(StreamEvent::Finalize(final_answer(data)?)))
        }
        _ => Ok(None),
    }
}

/// Interpret the `data` field of a `result` record.
fn final_answer(data: Value) -> Result<FinalAnswer, MalformedRecord> {
    match data {
        Value::String(text) => Ok(FinalAnswer::Text(text)),
        data if data.get("type").and_then(Value::as_str) == Some(CHART) => {
            let chart: ChartPayload = serde_json::from_value(data)
                .map_err(|e| MalformedRecord::InvalidChart(e.to_string()))?;
            Ok(FinalAnswer::Chart(chart))
        }
        // Any other document is shown as its JSON text.
        other => Ok(FinalAnswer::Text(other.to_string())),
    }
}
