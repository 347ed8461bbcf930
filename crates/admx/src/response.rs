//! 📬 What a transformation hands back, and what a publish hands back.
//!
//! [`TransformationResponse`] is sealed at birth: the output table, the
//! ordered failures, the count of rows that were attempted. Nothing mutates it
//! afterwards. The counts are derived, never stored twice, so they can't drift.

use std::fmt;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::common::OutputTable;

/// 💥 One row that didn't make it, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformError {
    pub failed_object: String,
    pub error_message: String,
}

impl TransformError {
    /// 🧯 Wraps an error. A non-empty `context` is prefixed as `"<context> | <error>"`.
    pub fn new(failed_object: impl Into<String>, error: &anyhow::Error, context: &str) -> Self {
        // -- {:#} walks the anyhow chain on one line, which is what a log reader wants
        let error_text = format!("{error:#}");
        let error_message = if context.is_empty() {
            error_text
        } else {
            format!("{context} | {error_text}")
        };
        Self {
            failed_object: failed_object.into(),
            error_message,
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transformation Error: {}", self.error_message)
    }
}

/// 📦 The immutable result of one transform pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformationResponse {
    transformed: OutputTable,
    errors: Vec<TransformError>,
    total_count: usize,
}

impl TransformationResponse {
    pub fn new(transformed: OutputTable, errors: Vec<TransformError>, total_count: usize) -> Self {
        Self {
            transformed,
            errors,
            total_count,
        }
    }

    /// An empty response: no rows, no failures, nothing attempted.
    pub fn empty(transformed: OutputTable) -> Self {
        Self::new(transformed, Vec::new(), 0)
    }

    pub fn transformed(&self) -> &OutputTable {
        &self.transformed
    }

    pub fn errors(&self) -> &[TransformError] {
        &self.errors
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn success_count(&self) -> usize {
        self.transformed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    /// 📜 The failures as a JSON array, or `""` when there aren't any.
    pub fn errors_to_json(&self) -> Result<String> {
        if self.errors.is_empty() {
            return Ok(String::new());
        }
        serde_json::to_string(&self.errors)
            .context("💀 could not serialize transformation errors, which is its own kind of error")
    }
}

impl fmt::Display for TransformationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total Count:\t{}\nSuccess Count:\t{}\nFailed Count:\t{}",
            self.total_count,
            self.success_count(),
            self.failed_count()
        )
    }
}

/// 📮 Outcome of one delivery attempt. Delivery failures end up here, not in an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResponse {
    pub publish_status: bool,
    pub message: String,
}

impl PublishResponse {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            publish_status: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            publish_status: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for PublishResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Publish Status: {} Message: {}",
            self.publish_status, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    #[test]
    fn the_one_where_the_error_message_gets_a_prefix() {
        let boom = anyhow!("bad time");
        assert_eq!(
            TransformError::new("app-1", &boom, "row failed").error_message,
            "row failed | bad time"
        );
        assert_eq!(TransformError::new("app-1", &boom, "").error_message, "bad time");
        assert_eq!(
            TransformError::new("app-1", &boom, "").to_string(),
            "Transformation Error: bad time"
        );
    }

    #[test]
    fn the_one_where_no_errors_means_an_empty_string() -> Result<()> {
        let response = TransformationResponse::empty(OutputTable::new(vec!["a".into()]));
        assert_eq!(response.errors_to_json()?, "");
        assert_eq!(response.total_count(), 0);
        assert_eq!(response.success_count(), 0);
        assert_eq!(response.failed_count(), 0);
        Ok(())
    }

    #[test]
    fn the_one_where_the_counts_add_up_and_the_json_reads_back() -> Result<()> {
        let mut table = OutputTable::new(vec!["applicationId".into()]);
        table.push_row(vec![json!("app-1")])?;
        let failure = TransformError::new("app-2", &anyhow!("nope"), "ctx");
        let response = TransformationResponse::new(table, vec![failure], 2);

        assert_eq!(response.success_count(), 1);
        assert_eq!(response.failed_count(), 1);
        assert_eq!(
            response.to_string(),
            "Total Count:\t2\nSuccess Count:\t1\nFailed Count:\t1"
        );

        let parsed: serde_json::Value = serde_json::from_str(&response.errors_to_json()?)?;
        assert_eq!(
            parsed,
            json!([{"failed_object": "app-2", "error_message": "ctx | nope"}])
        );
        Ok(())
    }

    #[test]
    fn the_one_where_publish_says_how_it_went() {
        assert_eq!(
            PublishResponse::failed("bucket on fire").to_string(),
            "Publish Status: false Message: bucket on fire"
        );
        assert!(PublishResponse::succeeded("ok").publish_status);
    }
}
