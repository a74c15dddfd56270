use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Timed record of one remote call within a trace
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpanRecord {
    /// UUID v7
    pub id: String,
    pub name: String,
    pub input: Value,
    pub output: Value,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub success: bool,
}

/// Full record of one recommendation request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TraceRecord {
    /// UUID v7, generated per trace
    pub trace_id: String,
    /// `x-request-id` of the request that produced the trace
    pub request_id: String,
    pub name: String,
    pub input: Value,
    /// In call order: embedding, search, generation
    pub spans: Vec<SpanRecord>,
    pub tags: BTreeSet<String>,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}
