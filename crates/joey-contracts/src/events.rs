use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// JSONL log of one studio session.
///
/// Every line carries `type`, `session_id`, a per-session `seq` starting at 1
/// and an RFC 3339 `ts`. Those keys win over payload fields of the same name.
/// The file is opened once in append mode and kept for the session.
#[derive(Debug)]
pub struct EventWriter {
    path: PathBuf,
    session_id: String,
    file: File,
    seq: Cell<u64>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;
        Ok(Self {
            path,
            session_id: session_id.into(),
            file,
            seq: Cell::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn events_written(&self) -> u64 {
        self.seq.get()
    }

    /// Appends one event. Object payloads are flattened into the line; any
    /// other non-null payload lands under `data`.
    pub fn emit(&self, event_type: &str, payload: Value) -> Result<Value> {
        let mut event = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        let seq = self.seq.get() + 1;
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.session_id.clone()),
        );
        event.insert("seq".to_string(), Value::from(seq));
        event.insert(
            "ts".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );

        let line = serde_json::to_string(&event)?;
        let mut file = &self.file;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        self.seq.set(seq);
        Ok(Value::Object(event))
    }
}

/// Reads back every event type in file order. Unparseable lines are skipped.
pub fn read_event_types(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{read_event_types, EventWriter};

    #[test]
    fn emit_writes_one_line_with_session_fields() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123")?;

        let emitted = writer.emit("config_updated", json!({ "field": "scene" }))?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(content.lines().count(), 1);
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], json!("config_updated"));
        assert_eq!(parsed["session_id"], json!("session-123"));
        assert_eq!(parsed["seq"], json!(1));
        assert_eq!(parsed["field"], json!("scene"));
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn session_fields_cannot_be_overridden_by_payload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-123")?;

        let emitted = writer.emit(
            "session_started",
            json!({ "session_id": "other", "seq": 99, "provider": "dryrun" }),
        )?;
        assert_eq!(emitted["session_id"], json!("session-123"));
        assert_eq!(emitted["seq"], json!(1));
        assert_eq!(emitted["provider"], json!("dryrun"));

        let scalar = writer.emit("note", json!("hello"))?;
        assert_eq!(scalar["data"], json!("hello"));
        assert_eq!(scalar["seq"], json!(2));
        assert_eq!(writer.events_written(), 2);
        Ok(())
    }

    #[test]
    fn reopening_appends_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");

        let first = EventWriter::new(&path, "a")?;
        first.emit("generation_started", Value::Null)?;
        first.emit("generation_failed", Value::Null)?;
        drop(first);
        EventWriter::new(&path, "b")?.emit("generation_started", Value::Null)?;

        assert_eq!(
            read_event_types(&path)?,
            vec!["generation_started", "generation_failed", "generation_started"]
        );
        Ok(())
    }
}
