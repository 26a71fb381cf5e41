//! One-cycle sync orchestration: fetch, filter, materialize, commit
//!
//! Identifier ordering matters here: a record's ID is added to the seen
//! cache only after its artifact write has succeeded, so a seen-marked ID
//! always corresponds to durably stored data. A failure mid-cycle leaves the
//! remaining records unmarked and they are retried on the next run.

use crate::bookmark;
use crate::config::Config;
use crate::output::{ArtifactWriter, WriterError};
use crate::records::EventLogRecord;
use crate::salesforce::{RecordSource, SourceError};
use crate::seen_cache::SeenCache;
use chrono::Utc;

#[derive(Debug)]
pub enum SyncError {
    Source(SourceError),
    Writer(WriterError),
    Bookmark(std::io::Error),
}

impl From<SourceError> for SyncError {
    fn from(err: SourceError) -> Self {
        SyncError::Source(err)
    }
}

impl From<WriterError> for SyncError {
    fn from(err: WriterError) -> Self {
        SyncError::Writer(err)
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Source(e) => write!(f, "Source error: {}", e),
            SyncError::Writer(e) => write!(f, "Writer error: {}", e),
            SyncError::Bookmark(e) => write!(f, "Bookmark error: {}", e),
        }
    }
}

impl std::error::Error for SyncError {}

/// Counters reported at the end of a cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleSummary {
    pub logs_available: usize,
    pub logs_new: usize,
    pub audit_available: usize,
    pub audit_new: usize,
}

pub struct SyncPipeline<'a, S: RecordSource> {
    source: S,
    config: &'a Config,
    writer: ArtifactWriter,
}

impl<'a, S: RecordSource> SyncPipeline<'a, S> {
    pub fn new(source: S, config: &'a Config) -> Result<Self, WriterError> {
        let writer = ArtifactWriter::new(&config.output_path, config.output_mode)?;
        Ok(Self {
            source,
            config,
            writer,
        })
    }

    /// Run one full cycle: event log categories first, then the audit
    /// trail. The caller owns the cache and is responsible for flushing it
    /// afterwards on every exit path.
    pub async fn run_cycle(&self, cache: &mut SeenCache) -> Result<CycleSummary, SyncError> {
        let mut summary = CycleSummary::default();

        let pending = self.collect_new_logs(cache, &mut summary).await?;
        if pending.is_empty() {
            log::info!("No new event log files across all categories");
        } else {
            self.materialize_logs(&pending, cache).await?;
        }

        self.sync_audit_trail(cache, &mut summary).await?;

        Ok(summary)
    }

    /// Enumerate candidates per category and keep the unseen ones.
    async fn collect_new_logs(
        &self,
        cache: &SeenCache,
        summary: &mut CycleSummary,
    ) -> Result<Vec<EventLogRecord>, SyncError> {
        let mut pending = Vec::new();

        for event_type in &self.config.event_types {
            let records = self.source.list_event_logs(event_type).await?;
            let available = records.len();

            let new: Vec<EventLogRecord> = records
                .into_iter()
                .filter(|r| !cache.contains(&r.id))
                .collect();

            log::info!(
                "{}: {} log files available, {} new",
                event_type,
                available,
                new.len()
            );

            summary.logs_available += available;
            summary.logs_new += new.len();
            pending.extend(new);
        }

        Ok(pending)
    }

    /// Download and transcode each new log file. The ID is marked seen only
    /// once its artifact write has returned Ok.
    async fn materialize_logs(
        &self,
        pending: &[EventLogRecord],
        cache: &mut SeenCache,
    ) -> Result<(), SyncError> {
        for record in pending {
            let body = self.source.fetch_log_body(record).await?;
            let filename = format!("sf{}_{}.json", record.event_type, record.date_part());
            let rows = self.writer.write_csv_rows(&filename, &body)?;
            cache.add(record.id.clone());
            log::debug!("{}: wrote {} rows", filename, rows);
        }
        log::info!("{} new log files written", pending.len());
        Ok(())
    }

    /// Windowed audit query from the bookmark. The batch artifact is written
    /// first, then the IDs are marked seen, then the bookmark advances to
    /// the newest committed record. Nothing new means the bookmark is left
    /// untouched.
    async fn sync_audit_trail(
        &self,
        cache: &mut SeenCache,
        summary: &mut CycleSummary,
    ) -> Result<(), SyncError> {
        let since = bookmark::load(&self.config.bookmark_path, self.config.lookback());
        log::info!("Querying audit trail since {}", bookmark::format_ts(since));

        let records = self.source.list_audit_since(since).await?;
        summary.audit_available = records.len();

        let new: Vec<_> = records
            .into_iter()
            .filter(|r| !cache.contains(&r.id))
            .collect();
        summary.audit_new = new.len();

        if new.is_empty() {
            log::info!("No new audit records");
            return Ok(());
        }

        let filename = format!("sfAudit_{}.json", Utc::now().format("%Y-%m-%d"));
        self.writer.write_records(&filename, &new)?;

        let mut max_created = since;
        for record in &new {
            cache.add(record.id.clone());
            match record.created_at() {
                Some(ts) if ts > max_created => max_created = ts,
                Some(_) => {}
                None => log::warn!(
                    "Audit record {} has unparseable CreatedDate '{}'",
                    record.id,
                    record.created_date
                ),
            }
        }

        if max_created > since {
            bookmark::commit(&self.config.bookmark_path, max_created)
                .map_err(SyncError::Bookmark)?;
        }

        log::info!(
            "Wrote {} new audit records, bookmark at {}",
            new.len(),
            bookmark::format_ts(max_created)
        );
        Ok(())
    }
}
