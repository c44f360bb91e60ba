//! Access-log view model.

use crate::presentation::EMPTY_FIELD;
use crate::service::LogEntry;
use chrono::{DateTime, NaiveDateTime};

/// One rendered log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    pub date: String,
    pub action: String,
    pub user: String,
    pub result: String,
}

/// The log table as shown to the administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogView {
    /// Newest first.
    pub rows: Vec<LogRow>,
    /// Placeholder text when there is nothing to show.
    pub notice: Option<String>,
    /// Set when the logs could not be fetched.
    pub error: Option<String>,
}

impl LogView {
    pub fn from_entries(mut entries: Vec<LogEntry>) -> Self {
        if entries.is_empty() {
            return Self {
                notice: Some("No logs available.".to_string()),
                ..Self::default()
            };
        }

        // Unparseable timestamps sort last.
        entries.sort_by_key(|e| std::cmp::Reverse(parse_timestamp(&e.timestamp)));

        let rows = entries
            .into_iter()
            .map(|entry| LogRow {
                date: parse_timestamp(&entry.timestamp)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| entry.timestamp.clone()),
                action: entry.action,
                user: entry.user_id.unwrap_or_else(|| EMPTY_FIELD.to_string()),
                result: entry.result.unwrap_or_else(|| EMPTY_FIELD.to_string()),
            })
            .collect();

        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(format!("Error: {}", message.into())),
            ..Self::default()
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}
