//! FileSink - appends records as JSON lines
//!
//! One file per stream, or with `split_by: writer` one file per writing
//! route output (`<route>__<output>.jsonl`, `external.jsonl` for samples
//! injected from outside the engine).

use contracts::{ContractError, DataSink, StreamRecord};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, instrument};

/// How records are spread over files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitBy {
    #[default]
    Stream,
    Writer,
}

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output directory
    pub base_path: PathBuf,
    pub split_by: SplitBy,
}

impl FileSinkConfig {
    pub fn from_params(params: &HashMap<String, String>) -> std::io::Result<Self> {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let split_by = match params.get("split_by").map(String::as_str) {
            None | Some("stream") => SplitBy::Stream,
            Some("writer") => SplitBy::Writer,
            Some(other) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("split_by must be 'stream' or 'writer', got '{other}'"),
                ))
            }
        };

        Ok(Self {
            base_path,
            split_by,
        })
    }
}

/// Sink writing `<base_path>/<stream or writer>.jsonl`
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    files: HashMap<String, BufWriter<File>>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            files: HashMap::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params)?)
    }

    /// File stem for `record`, restricted to `[A-Za-z0-9_-]`
    fn file_key(&self, record: &StreamRecord) -> String {
        let raw = match self.config.split_by {
            SplitBy::Stream => record.stream.as_str(),
            SplitBy::Writer => record.writer.as_deref().unwrap_or("external"),
        };
        let mut key = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '/' if self.config.split_by == SplitBy::Writer => key.push_str("__"),
                c if c.is_alphanumeric() || c == '-' || c == '_' => key.push(c),
                _ => key.push('_'),
            }
        }
        key
    }

    fn file_for(&mut self, key: String) -> std::io::Result<&mut BufWriter<File>> {
        if !self.files.contains_key(&key) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.config.base_path.join(format!("{key}.jsonl")))?;
            self.files.insert(key.clone(), BufWriter::new(file));
        }
        self.files
            .get_mut(&key)
            .ok_or_else(|| std::io::Error::other("output file missing"))
    }

    fn append_record(&mut self, record: &StreamRecord) -> std::io::Result<()> {
        let key = self.file_key(record);
        let writer = self.file_for(key)?;
        serde_json::to_writer(&mut *writer, record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.write_all(b"\n")
    }

    fn persist_record(&mut self, record: &StreamRecord) -> Result<(), ContractError> {
        self.append_record(record).map_err(|e| {
            error!(sink = %self.name, stream = %record.stream, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    fn flush_all(&mut self) -> Result<(), ContractError> {
        for file in self.files.values_mut() {
            file
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, record),
        fields(sink = %self.name, stream = %record.stream, sequence = record.sequence)
    )]
    async fn write(&mut self, record: &StreamRecord) -> Result<(), ContractError> {
        self.persist_record(record)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.flush_all()
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush_all()?;
        self.files.clear();
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::tests::record;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_sink_write() {
        let dir = tempdir().unwrap();
        let config = FileSinkConfig {
            base_path: dir.path().to_path_buf(),
            split_by: SplitBy::Stream,
        };

        let mut sink = FileSink::new("test_file", config).unwrap();
        sink.write(&record("Triangle", 1)).await.unwrap();
        sink.write(&record("Triangle", 2)).await.unwrap();
        sink.write(&record("Square", 1)).await.unwrap();
        sink.close().await.unwrap();

        let triangle = fs::read_to_string(dir.path().join("Triangle.jsonl")).unwrap();
        let lines: Vec<_> = triangle.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["stream"], "Triangle");
        assert_eq!(first["sequence"], 1);
        assert_eq!(first["sample"]["data"]["color"], "BLUE");

        assert!(dir.path().join("Square.jsonl").exists());
    }

    #[test]
    fn test_file_key_is_sanitized() {
        let dir = tempdir().unwrap();
        let params = HashMap::from([(
            "base_path".to_string(),
            dir.path().display().to_string(),
        )]);
        let sink = FileSink::from_params("f", &params).unwrap();
        assert_eq!(sink.file_key(&record("rt/shapes::Square", 1)), "rt_shapes__Square");
    }

    #[tokio::test]
    async fn test_split_by_writer() {
        let dir = tempdir().unwrap();
        let params = HashMap::from([
            ("base_path".to_string(), dir.path().display().to_string()),
            ("split_by".to_string(), "writer".to_string()),
        ]);
        let mut sink = FileSink::from_params("by_writer", &params).unwrap();

        let mut external = record("Square", 1);
        external.writer = None;
        sink.write(&record("Triangle", 1)).await.unwrap();
        sink.write(&record("Circle", 1)).await.unwrap();
        sink.write(&external).await.unwrap();
        sink.close().await.unwrap();

        let routed = fs::read_to_string(dir.path().join("shapes__Triangle.jsonl")).unwrap();
        assert_eq!(routed.lines().count(), 2);
        assert!(dir.path().join("external.jsonl").exists());
        assert!(!dir.path().join("Square.jsonl").exists());
    }

    #[test]
    fn test_unknown_split_rejected() {
        let params = HashMap::from([("split_by".to_string(), "instance".to_string())]);
        assert!(FileSinkConfig::from_params(&params).is_err());
    }
}
