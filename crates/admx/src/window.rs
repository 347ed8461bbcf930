//! ⏱️ Time windows: which rows belong to this run.
//!
//! The transformer computes an effective instant for every joined row and then
//! asks a [`RowFilter`] whether the row stays. The job hands it an
//! [`IncrementalWindow`]: either the operator's override bounds, or "the last
//! `lookback_hours` hours up to now". Half-open, `[start, end)`, so two
//! back-to-back runs never both claim the row that landed on the seam. 🦆

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::common::SourceRow;

/// 🚪 Post-join gatekeeper. Says yes or no to one row, given its effective instant.
pub trait RowFilter: std::fmt::Debug + Send + Sync {
    fn keep(&self, row: &SourceRow, effective: DateTime<Utc>) -> bool;
}

/// 🎉 Lets everyone in. For benches, tests and the occasional full backfill.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepEverything;

impl RowFilter for KeepEverything {
    fn keep(&self, _row: &SourceRow, _effective: DateTime<Utc>) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl IncrementalWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            bail!(
                "💀 Window start {} is after window end {}. Time only goes one way, \
                 even in the data lake.",
                start.to_rfc3339(),
                end.to_rfc3339()
            );
        }
        Ok(Self { start, end })
    }

    /// 🧭 Builds the window for a run.
    ///
    /// Both overrides present: they are the window. Exactly one present: it's
    /// ignored with a warning and the lookback window is used. Neither: the
    /// last `lookback_hours` hours ending at `now`.
    pub fn resolve(
        override_start: Option<&str>,
        override_end: Option<&str>,
        lookback_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        match (override_start, override_end) {
            (Some(start), Some(end)) => {
                let start = parse_text_instant(start)
                    .with_context(|| format!("💀 override start date '{start}' is not ISO 8601"))?;
                let end = parse_text_instant(end)
                    .with_context(|| format!("💀 override end date '{end}' is not ISO 8601"))?;
                Self::new(start, end)
            }
            (start, end) => {
                if start.is_some() || end.is_some() {
                    warn!(
                        "⚠️ only one override date was given, both are needed. \
                         Falling back to the {lookback_hours}h lookback window."
                    );
                }
                Self::new(now - Duration::hours(i64::from(lookback_hours)), now)
            }
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl RowFilter for IncrementalWindow {
    fn keep(&self, _row: &SourceRow, effective: DateTime<Utc>) -> bool {
        self.contains(effective)
    }
}

/// 🕰️ Parses one timestamp cell into a UTC instant.
///
/// Strings may be RFC 3339, a naive `YYYY-MM-DD[ T]HH:MM:SS[.f]` (read as UTC)
/// or a bare `YYYY-MM-DD` (midnight UTC). Numbers are epoch milliseconds.
pub fn parse_instant(value: &Value) -> Result<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_text_instant(text),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .with_context(|| format!("💀 '{n}' is not a usable epoch-millis timestamp")),
        other => bail!("💀 expected a timestamp, got {other}"),
    }
}

fn parse_text_instant(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    // -- ISO 8601 also allows the offset without a colon: +0000
    if let Ok(instant) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(instant.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    bail!("💀 '{text}' does not look like any timestamp we know")
}

/// ⚖️ The later of the application's and the applicant's timestamps.
///
/// A missing or null side defers to the other side. Both missing, or a
/// present side that won't parse, is an error for this row.
pub fn effective_instant(
    application_time: Option<&Value>,
    applicant_time: Option<&Value>,
) -> Result<DateTime<Utc>> {
    let application = application_time
        .filter(|v| !v.is_null())
        .map(parse_instant)
        .transpose()
        .context("application time")?;
    let applicant = applicant_time
        .filter(|v| !v.is_null())
        .map(parse_instant)
        .transpose()
        .context("applicant time")?;

    match (application, applicant) {
        (Some(a), Some(b)) => Ok(a.max(b)),
        (Some(only), None) | (None, Some(only)) => Ok(only),
        (None, None) => bail!("💀 neither the application nor the applicant has a time"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0)
            .single()
            .expect("💀 test fixture date should exist")
    }

    #[test]
    fn the_one_where_every_timestamp_dialect_is_understood() -> Result<()> {
        let expected = at(2024, 3, 1, 12);
        assert_eq!(parse_instant(&json!("2024-03-01T12:00:00Z"))?, expected);
        assert_eq!(parse_instant(&json!("2024-03-01T14:00:00+02:00"))?, expected);
        assert_eq!(parse_instant(&json!("2024-03-01T12:00:00+0000"))?, expected);
        assert_eq!(
            parse_instant(&json!("2024-03-01T14:00:00.5+0200"))?,
            expected + Duration::milliseconds(500)
        );
        assert_eq!(parse_instant(&json!("2024-03-01 12:00:00"))?, expected);
        assert_eq!(parse_instant(&json!("2024-03-01T12:00:00.000"))?, expected);
        assert_eq!(parse_instant(&json!("2024-03-01"))?, at(2024, 3, 1, 0));
        assert_eq!(
            parse_instant(&json!(expected.timestamp_millis()))?,
            expected
        );
        assert!(parse_instant(&json!("last tuesday")).is_err());
        assert!(parse_instant(&json!(true)).is_err());
        Ok(())
    }

    #[test]
    fn the_one_where_the_later_clock_wins() -> Result<()> {
        let early = json!("2024-03-01T10:00:00Z");
        let late = json!("2024-03-01T12:00:00Z");
        assert_eq!(
            effective_instant(Some(&early), Some(&late))?,
            at(2024, 3, 1, 12)
        );
        assert_eq!(
            effective_instant(Some(&late), Some(&early))?,
            at(2024, 3, 1, 12)
        );
        assert_eq!(
            effective_instant(Some(&early), Some(&Value::Null))?,
            at(2024, 3, 1, 10)
        );
        assert_eq!(effective_instant(None, Some(&late))?, at(2024, 3, 1, 12));
        assert!(effective_instant(None, None).is_err());
        assert!(effective_instant(Some(&json!("nope")), Some(&late)).is_err());
        Ok(())
    }

    #[test]
    fn the_one_where_the_window_is_half_open() -> Result<()> {
        let window = IncrementalWindow::new(at(2024, 3, 1, 0), at(2024, 3, 2, 0))?;
        assert!(window.contains(at(2024, 3, 1, 0)));
        assert!(window.contains(at(2024, 3, 1, 23)));
        assert!(!window.contains(at(2024, 3, 2, 0)));
        assert!(!window.contains(at(2024, 2, 29, 23)));
        Ok(())
    }

    #[test]
    fn the_one_where_overrides_need_a_buddy() -> Result<()> {
        let now = at(2024, 3, 10, 6);

        let both = IncrementalWindow::resolve(
            Some("2024-01-01T00:00:00Z"),
            Some("2024-02-01T00:00:00Z"),
            24,
            now,
        )?;
        assert_eq!(both.start(), at(2024, 1, 1, 0));
        assert_eq!(both.end(), at(2024, 2, 1, 0));

        let lonely = IncrementalWindow::resolve(Some("2024-01-01T00:00:00Z"), None, 24, now)?;
        assert_eq!(lonely.start(), at(2024, 3, 9, 6));
        assert_eq!(lonely.end(), now);

        assert!(IncrementalWindow::resolve(Some("yesterday"), Some("today"), 24, now).is_err());
        assert!(
            IncrementalWindow::resolve(
                Some("2024-02-01T00:00:00Z"),
                Some("2024-01-01T00:00:00Z"),
                24,
                now
            )
            .is_err()
        );
        Ok(())
    }
}
