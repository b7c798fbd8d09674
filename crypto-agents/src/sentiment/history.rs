use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use common::{AgentError, Result};
use serde::{Deserialize, Serialize};

const RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub sentiment_score: f64,
    pub num_tweets: usize,
}

/// Change between the two newest entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentChange {
    /// Difference on the 0-100 scale.
    pub percent_change: f64,
    pub elapsed_minutes: f64,
}

/// CSV-backed score history with a rolling 24 hour window.
pub struct SentimentHistory {
    path: PathBuf,
}

impl SentimentHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<SentimentHistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(storage_error)?;
        let mut entries = Vec::new();
        for row in reader.deserialize() {
            entries.push(row.map_err(storage_error)?);
        }
        Ok(entries)
    }

    pub fn save(&self, score: f64, num_tweets: usize) -> Result<()> {
        self.save_at(Utc::now(), score, num_tweets)
    }

    /// Append an entry and drop everything older than 24h before the newest.
    pub fn save_at(&self, timestamp: DateTime<Utc>, score: f64, num_tweets: usize) -> Result<()> {
        let mut entries = self.load()?;
        entries.push(SentimentHistoryEntry {
            timestamp,
            sentiment_score: score,
            num_tweets,
        });
        entries.sort_by_key(|e| e.timestamp);

        if let Some(newest) = entries.last().map(|e| e.timestamp) {
            let cutoff = newest - Duration::hours(RETENTION_HOURS);
            entries.retain(|e| e.timestamp >= cutoff);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = csv::Writer::from_path(&self.path).map_err(storage_error)?;
        for entry in &entries {
            writer.serialize(entry).map_err(storage_error)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn get_change(&self) -> Result<Option<SentimentChange>> {
        let entries = self.load()?;
        if entries.len() < 2 {
            return Ok(None);
        }
        let current = &entries[entries.len() - 1];
        let previous = &entries[entries.len() - 2];

        let percent_change = to_percent(current.sentiment_score) - to_percent(previous.sentiment_score);
        let elapsed_minutes = (current.timestamp - previous.timestamp).num_seconds() as f64 / 60.0;

        Ok(Some(SentimentChange {
            percent_change,
            elapsed_minutes,
        }))
    }

    pub fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.load()?.iter().map(|e| e.timestamp).max())
    }
}

/// Map a [-1, 1] score onto 0-100.
pub fn to_percent(score: f64) -> f64 {
    (score + 1.0) * 50.0
}

fn storage_error(err: csv::Error) -> AgentError {
    AgentError::StorageError(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_last_day_relative_to_newest() {
        let dir = tempfile::tempdir().unwrap();
        let history = SentimentHistory::new(dir.path().join("history.csv"));
        let now = Utc::now();

        history.save_at(now - Duration::hours(30), 0.1, 10).unwrap();
        history.save_at(now - Duration::hours(20), 0.2, 10).unwrap();
        history.save_at(now, 0.3, 12).unwrap();

        let entries = history.load().unwrap();
        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert!(now - entry.timestamp <= Duration::hours(24));
        }
    }

    #[test]
    fn change_needs_two_entries() {
        let dir = tempfile::tempdir().unwrap();
        let history = SentimentHistory::new(dir.path().join("history.csv"));
        assert!(history.get_change().unwrap().is_none());

        let now = Utc::now();
        history.save_at(now - Duration::minutes(15), 0.0, 5).unwrap();
        history.save_at(now, 0.2, 5).unwrap();

        let change = history.get_change().unwrap().unwrap();
        assert!((change.percent_change - 10.0).abs() < 1e-9);
        assert!((change.elapsed_minutes - 15.0).abs() < 1e-9);
        assert_eq!(history.latest_timestamp().unwrap().unwrap().timestamp(), now.timestamp());
    }

    #[test]
    fn creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let history = SentimentHistory::new(dir.path().join("nested/deeper/history.csv"));
        history.save(0.5, 3).unwrap();
        assert_eq!(history.load().unwrap().len(), 1);
    }
}
