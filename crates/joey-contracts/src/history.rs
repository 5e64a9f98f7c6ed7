use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::JoeyConfig;

pub const HISTORY_LIMIT: usize = 10;

/// A past successful generation. Owns its configuration copy, so edits to the
/// live configuration never show up here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub image: String,
    pub config: JoeyConfig,
    pub created_at: String,
}

impl HistoryEntry {
    pub fn new(id: impl Into<String>, image: impl Into<String>, config: JoeyConfig) -> Self {
        Self {
            id: id.into(),
            image: image.into(),
            config,
            created_at: now_utc_iso(),
        }
    }
}

/// Newest-first list of generations, capped at [`HISTORY_LIMIT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<HistoryEntry>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Prepends `entry` and drops whatever falls past the limit.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(self.limit);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, false)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::{History, HistoryEntry, HISTORY_LIMIT};
    use crate::config::JoeyConfig;

    fn entry(idx: usize) -> HistoryEntry {
        let mut config = JoeyConfig::default();
        config.scene = format!("scene-{idx}");
        HistoryEntry::new(format!("id-{idx}"), format!("data:image/png;base64,{idx}"), config)
    }

    #[test]
    fn push_keeps_newest_first_and_caps_length() {
        let mut history = History::new();
        for idx in 0..15 {
            history.push(entry(idx));
            assert!(history.len() <= HISTORY_LIMIT);
        }
        assert_eq!(history.len(), 10);
        let ids: Vec<&str> = history.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "id-14", "id-13", "id-12", "id-11", "id-10", "id-9", "id-8", "id-7", "id-6",
                "id-5"
            ]
        );
        assert_eq!(history.latest().map(|e| e.config.scene.as_str()), Some("scene-14"));
    }

    #[test]
    fn find_and_get_address_entries() {
        let mut history = History::with_limit(3);
        history.push(entry(1));
        history.push(entry(2));
        assert_eq!(history.get(0).map(|e| e.id.as_str()), Some("id-2"));
        assert_eq!(history.find("id-1").map(|e| e.image.as_str()), Some("data:image/png;base64,1"));
        assert!(history.find("id-9").is_none());
        assert_eq!(history.limit(), 3);
    }

    #[test]
    fn created_at_is_rfc3339() -> anyhow::Result<()> {
        let item = entry(0);
        DateTime::parse_from_rfc3339(&item.created_at)?;
        Ok(())
    }
}
