//! NDJSON artifact writer - one JSON object per input row, keys sorted
//!
//! Artifacts are named per category and date so re-runs map onto the same
//! files. Whether an existing artifact is appended to or rewritten is a
//! configuration choice (`SFSYNC_OUTPUT_MODE`), not implied.

use crate::config::OutputMode;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum WriterError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Csv(csv::Error),
}

impl From<std::io::Error> for WriterError {
    fn from(err: std::io::Error) -> Self {
        WriterError::Io(err)
    }
}

impl From<serde_json::Error> for WriterError {
    fn from(err: serde_json::Error) -> Self {
        WriterError::Serialization(err)
    }
}

impl From<csv::Error> for WriterError {
    fn from(err: csv::Error) -> Self {
        WriterError::Csv(err)
    }
}

impl std::fmt::Display for WriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterError::Io(e) => write!(f, "IO error: {}", e),
            WriterError::Serialization(e) => write!(f, "Serialization error: {}", e),
            WriterError::Csv(e) => write!(f, "CSV error: {}", e),
        }
    }
}

impl std::error::Error for WriterError {}

pub struct ArtifactWriter {
    output_path: PathBuf,
    mode: OutputMode,
}

impl ArtifactWriter {
    /// Creates the output directory if it does not exist yet.
    pub fn new(output_path: impl AsRef<Path>, mode: OutputMode) -> Result<Self, WriterError> {
        let output_path = output_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_path)?;
        Ok(Self { output_path, mode })
    }

    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        self.output_path.join(filename)
    }

    fn open(&self, filename: &str) -> Result<BufWriter<File>, WriterError> {
        let path = self.artifact_path(filename);
        let file = match self.mode {
            OutputMode::Append => OpenOptions::new().create(true).append(true).open(&path)?,
            OutputMode::Overwrite => File::create(&path)?,
        };
        Ok(BufWriter::new(file))
    }

    /// Transcode a CSV body into NDJSON, one object per row keyed by the
    /// CSV header. Returns the number of rows written.
    pub fn write_csv_rows(&self, filename: &str, csv_body: &str) -> Result<usize, WriterError> {
        let mut reader = csv::Reader::from_reader(csv_body.as_bytes());
        let headers = reader.headers()?.clone();

        let mut writer = self.open(filename)?;
        let mut rows = 0;
        for result in reader.records() {
            let record = result?;
            // serde_json's map is ordered by key, which gives the sorted-key
            // output contract for free
            let mut obj = serde_json::Map::new();
            for (header, field) in headers.iter().zip(record.iter()) {
                obj.insert(
                    header.to_string(),
                    serde_json::Value::String(field.to_string()),
                );
            }
            let json = serde_json::to_string(&serde_json::Value::Object(obj))?;
            writeln!(writer, "{}", json)?;
            rows += 1;
        }
        writer.flush()?;
        Ok(rows)
    }

    /// Write a batch of serializable records as NDJSON with sorted keys.
    pub fn write_records<T: Serialize>(
        &self,
        filename: &str,
        records: &[T],
    ) -> Result<usize, WriterError> {
        let mut writer = self.open(filename)?;
        for record in records {
            let value = serde_json::to_value(record)?;
            let json = serde_json::to_string(&value)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_csv_transcode_sorts_keys() {
        // Test: CSV rows become one JSON object per line, keys sorted
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path(), OutputMode::Append).unwrap();

        let csv_body = "ZULU,ALPHA,MIKE\n1,2,3\n4,5,6\n";
        let rows = writer.write_csv_rows("out.json", csv_body).unwrap();
        assert_eq!(rows, 2);

        let content = fs::read_to_string(writer.artifact_path("out.json")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"ALPHA":"2","MIKE":"3","ZULU":"1"}"#);
        assert_eq!(lines[1], r#"{"ALPHA":"5","MIKE":"6","ZULU":"4"}"#);
    }

    #[test]
    fn test_append_mode_accumulates() {
        // Test: append mode keeps prior rows across writes
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path(), OutputMode::Append).unwrap();

        writer.write_csv_rows("a.json", "K\n1\n").unwrap();
        writer.write_csv_rows("a.json", "K\n2\n").unwrap();

        let content = fs::read_to_string(writer.artifact_path("a.json")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_overwrite_mode_replaces() {
        // Test: overwrite mode truncates the artifact each time
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path(), OutputMode::Overwrite).unwrap();

        writer.write_csv_rows("a.json", "K\n1\n2\n").unwrap();
        writer.write_csv_rows("a.json", "K\n9\n").unwrap();

        let content = fs::read_to_string(writer.artifact_path("a.json")).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert_eq!(content.lines().next().unwrap(), r#"{"K":"9"}"#);
    }

    #[test]
    fn test_write_records_sorted_keys() {
        // Test: serialized structs are emitted with sorted keys too
        #[derive(Serialize)]
        struct Row {
            zed: i32,
            alpha: i32,
        }

        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path(), OutputMode::Append).unwrap();
        writer
            .write_records("rows.json", &[Row { zed: 1, alpha: 2 }])
            .unwrap();

        let content = fs::read_to_string(writer.artifact_path("rows.json")).unwrap();
        assert_eq!(content.trim(), r#"{"alpha":2,"zed":1}"#);
    }

    #[test]
    fn test_creates_missing_output_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let writer = ArtifactWriter::new(&nested, OutputMode::Append).unwrap();
        writer.write_csv_rows("x.json", "K\n1\n").unwrap();
        assert!(nested.join("x.json").exists());
    }
}
