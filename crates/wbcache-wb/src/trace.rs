//! Request-scoped debug trail.
//!
//! Every HTTP attempt made on behalf of one client operation is recorded as a
//! [`RequestRecord`] and returned to the caller inside a [`RequestTrace`].
//! Nothing here is global; a trace lives exactly as long as its operation.

use std::time::Duration;

use serde::Serialize;

/// Maximum number of characters of a response body kept in a record.
pub const BODY_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestRecord {
    pub method: String,
    pub url: String,
    /// Zero for the first try, then one per retry.
    pub attempt: u32,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    pub body_preview: Option<String>,
    pub error: Option<String>,
}

impl RequestRecord {
    #[must_use]
    pub fn new(method: &str, url: &str, attempt: u32) -> Self {
        Self {
            method: method.to_owned(),
            url: url.to_owned(),
            attempt,
            status: None,
            elapsed_ms: 0,
            body_preview: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: &str) -> Self {
        self.body_preview = Some(truncate_preview(body));
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: &impl std::fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    #[must_use]
    pub fn elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status.is_some_and(|s| !(200..300).contains(&s))
    }
}

/// All attempts made for one client operation, in issue order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestTrace {
    pub operation: String,
    pub records: Vec<RequestRecord>,
}

impl RequestTrace {
    #[must_use]
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_owned(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: RequestRecord) {
        tracing::debug!(
            operation = %self.operation,
            method = %record.method,
            url = %record.url,
            attempt = record.attempt,
            status = ?record.status,
            elapsed_ms = record.elapsed_ms,
            error = ?record.error,
            "wb request"
        );
        self.records.push(record);
    }

    /// Appends the records of a sub-operation, e.g. one batch of a fan-out.
    pub fn absorb(&mut self, other: RequestTrace) {
        self.records.extend(other.records);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.records.iter().filter(|r| r.is_failure()).count()
    }
}

fn truncate_preview(body: &str) -> String {
    match body.char_indices().nth(BODY_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_owned(),
    }
}
