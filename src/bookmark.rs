//! Persisted watermark timestamp for the audit record stream
//!
//! A single line of text, UTC second precision with a literal trailing `Z`.
//! The bookmark is only rewritten after the records it covers are durably
//! written, so a crash before that point re-queries an overlapping window on
//! the next run and the seen cache absorbs the duplicates.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;

pub const BOOKMARK_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Read the persisted bookmark, falling back to `now - lookback` when the
/// file is absent or malformed. Never fatal.
pub fn load(path: impl AsRef<Path>, lookback: Duration) -> DateTime<Utc> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(raw) => match parse(raw.trim()) {
            Some(ts) => ts,
            None => {
                log::warn!(
                    "Malformed bookmark in {}, falling back to lookback window",
                    path.display()
                );
                default_bookmark(lookback)
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!(
                "No bookmark at {}, starting {} hours back",
                path.display(),
                lookback.num_hours()
            );
            default_bookmark(lookback)
        }
        Err(e) => {
            log::warn!("Unreadable bookmark at {}: {}", path.display(), e);
            default_bookmark(lookback)
        }
    }
}

/// Overwrite the persisted bookmark.
///
/// Callers must only commit after the records up to and including `ts` have
/// been durably written.
pub fn commit(path: impl AsRef<Path>, ts: DateTime<Utc>) -> io::Result<()> {
    fs::write(path.as_ref(), format_ts(ts))
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(BOOKMARK_FORMAT).to_string()
}

fn parse(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, BOOKMARK_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn default_bookmark(lookback: Duration) -> DateTime<Utc> {
    Utc::now() - lookback
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cold_start_default() {
        // Test: absent file yields now - lookback, not an error
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookmark");

        let lookback = Duration::hours(48);
        let loaded = load(&path, lookback);

        let expected = Utc::now() - lookback;
        let drift = (loaded - expected).num_seconds().abs();
        assert!(drift < 5, "default bookmark drifted {}s", drift);
    }

    #[test]
    fn test_commit_load_round_trip() {
        // Test: committed value reloads at second precision
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookmark");

        let ts = "2024-03-01T12:34:56Z";
        let parsed = parse(ts).unwrap();
        commit(&path, parsed).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), ts);
        assert_eq!(load(&path, Duration::hours(1)), parsed);
    }

    #[test]
    fn test_malformed_falls_back() {
        // Test: garbage content behaves like an absent file
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookmark");
        fs::write(&path, "not a timestamp").unwrap();

        let lookback = Duration::hours(2);
        let loaded = load(&path, lookback);
        let expected = Utc::now() - lookback;
        assert!((loaded - expected).num_seconds().abs() < 5);
    }

    #[test]
    fn test_format_ends_with_z() {
        let ts = parse("2024-03-01T00:00:00Z").unwrap();
        let formatted = format_ts(ts);
        assert!(formatted.ends_with('Z'));
        assert_eq!(formatted, "2024-03-01T00:00:00Z");
    }
}
