//! JsonlSink - one JSON object per line

use contracts::{ContractError, EventSink, FinishedEvent};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Configuration for JsonlSink
#[derive(Debug, Clone)]
pub struct JsonlSinkConfig {
    /// Output file
    pub path: PathBuf,
    /// Append to an existing file instead of truncating it
    pub append: bool,
}

impl JsonlSinkConfig {
    /// Build from sink params (`path`, `append`)
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./events.jsonl"));
        let append = params
            .get("append")
            .is_some_and(|v| matches!(v.as_str(), "true" | "1" | "yes"));

        Self { path, append }
    }
}

/// Sink writing finished events as JSON lines
pub struct JsonlSink {
    name: String,
    config: JsonlSinkConfig,
    writer: Option<BufWriter<File>>,
    lines: u64,
}

impl JsonlSink {
    /// Open (or create) the output file
    pub fn new(name: impl Into<String>, config: JsonlSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(config.append)
            .truncate(!config.append)
            .open(&config.path)?;
        debug!(path = %config.path.display(), append = config.append, "JSONL output opened");

        Ok(Self {
            name: name.into(),
            config,
            writer: Some(BufWriter::new(file)),
            lines: 0,
        })
    }

    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, JsonlSinkConfig::from_params(params))
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, ContractError> {
        let name = &self.name;
        self.writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_write(name, "sink already closed"))
    }
}

impl EventSink for JsonlSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        level = "trace",
        name = "jsonl_sink_write",
        skip(self, event),
        fields(sink = %self.name, kind = %event.kind)
    )]
    async fn write(&mut self, event: &FinishedEvent) -> Result<(), ContractError> {
        let sink_name = self.name.clone();
        let writer = self.writer()?;
        serde_json::to_writer(&mut *writer, event)
            .map_err(|e| ContractError::sink_write(&sink_name, e.to_string()))?;
        writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    #[instrument(name = "jsonl_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            info!(
                sink = %self.name,
                path = %self.config.path.display(),
                lines = self.lines,
                "JsonlSink closed"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::tests::event;
    use tempfile::tempdir;

    fn read_events(path: &std::path::Path) -> Vec<FinishedEvent> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_jsonl_sink_writes_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("events.jsonl");
        let config = JsonlSinkConfig {
            path: path.clone(),
            append: false,
        };

        let mut sink = JsonlSink::new("jsonl", config).unwrap();
        sink.write(&event(1)).await.unwrap();
        sink.write(&event(2)).await.unwrap();
        sink.close().await.unwrap();

        let events = read_events(&path);
        assert_eq!(events, vec![event(1), event(2)]);
    }

    #[tokio::test]
    async fn test_jsonl_sink_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut params = HashMap::new();
        params.insert("path".to_string(), path.display().to_string());
        params.insert("append".to_string(), "true".to_string());

        for i in 0..2 {
            let mut sink = JsonlSink::from_params("jsonl", &params).unwrap();
            sink.write(&event(i)).await.unwrap();
            sink.close().await.unwrap();
        }

        assert_eq!(read_events(&path).len(), 2);
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let dir = tempdir().unwrap();
        let config = JsonlSinkConfig {
            path: dir.path().join("events.jsonl"),
            append: false,
        };

        let mut sink = JsonlSink::new("jsonl", config).unwrap();
        sink.close().await.unwrap();
        assert!(sink.write(&event(1)).await.is_err());
    }
}
