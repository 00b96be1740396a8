//! Scoreboard - timestamped score history with windowed queries

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::util::time::Clock;

use super::backend::{ScoreBackend, StoreError};

/// How far back leaderboard queries look, and how long records are kept
pub fn score_window() -> Duration {
    Duration::hours(24)
}

/// One landing, as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub username: String,
    pub score: f64,
    pub when: DateTime<Utc>,
}

impl ScoreRecord {
    pub fn new(username: impl Into<String>, score: f64, when: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            score,
            when,
        }
    }
}

/// Aggregate for a single chatter
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStats {
    pub best: f64,
    pub attempts: usize,
}

/// Append-only score history. Every call goes through the backend.
pub struct ScoreStore {
    backend: Box<dyn ScoreBackend>,
    clock: Arc<dyn Clock>,
}

impl ScoreStore {
    pub fn new(backend: Box<dyn ScoreBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Append a record stamped with the current time
    pub fn record(&self, username: &str, score: f64) -> Result<(), StoreError> {
        let mut records = self.backend.load()?;
        records.push(ScoreRecord::new(username, score, self.clock.now()));
        self.backend.save(&records)
    }

    /// Highest score inside the window (earliest record wins a tie)
    pub fn top_within(&self, window: Duration) -> Result<Option<ScoreRecord>, StoreError> {
        let records = self.within(window)?;
        Ok(records.into_iter().fold(None, |best, r| match best {
            Some(b) if b.score >= r.score => Some(b),
            _ => Some(r),
        }))
    }

    /// Lowest score inside the window (earliest record wins a tie)
    pub fn low_within(&self, window: Duration) -> Result<Option<ScoreRecord>, StoreError> {
        let records = self.within(window)?;
        Ok(records.into_iter().fold(None, |low, r| match low {
            Some(l) if l.score <= r.score => Some(l),
            _ => Some(r),
        }))
    }

    /// Latest record per username, keeping the `limit` most recent users,
    /// returned oldest first
    pub fn recent_distinct_within(
        &self,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<ScoreRecord>, StoreError> {
        let records = self.within(window)?;

        let mut latest: HashMap<&str, (usize, &ScoreRecord)> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            let newer = latest
                .get(record.username.as_str())
                .map_or(true, |(_, seen)| record.when >= seen.when);
            if newer {
                latest.insert(record.username.as_str(), (idx, record));
            }
        }

        let mut picked: Vec<(usize, &ScoreRecord)> = latest.into_values().collect();
        picked.sort_by(|a, b| a.1.when.cmp(&b.1.when).then(a.0.cmp(&b.0)));

        let skip = picked.len().saturating_sub(limit);
        Ok(picked
            .into_iter()
            .skip(skip)
            .map(|(_, record)| record.clone())
            .collect())
    }

    /// Best score and attempt count for one chatter inside the window
    pub fn stats_for(
        &self,
        username: &str,
        window: Duration,
    ) -> Result<Option<PlayerStats>, StoreError> {
        let mine: Vec<ScoreRecord> = self
            .within(window)?
            .into_iter()
            .filter(|r| r.username.eq_ignore_ascii_case(username))
            .collect();

        Ok(mine.iter().map(|r| r.score).reduce(f64::max).map(|best| PlayerStats {
            best,
            attempts: mine.len(),
        }))
    }

    /// Remove every record
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.backend.save(&[])
    }

    /// Remove records belonging to the given usernames (case-insensitive)
    pub fn clear_for(&self, usernames: &[String]) -> Result<usize, StoreError> {
        let wanted: Vec<String> = usernames.iter().map(|u| u.to_lowercase()).collect();
        let mut records = self.backend.load()?;
        let before = records.len();
        records.retain(|r| !wanted.contains(&r.username.to_lowercase()));
        let removed = before - records.len();
        self.backend.save(&records)?;
        Ok(removed)
    }

    /// Delete records older than the window, returning how many went
    pub fn prune(&self, window: Duration) -> Result<usize, StoreError> {
        let cutoff = self.clock.now() - window;
        let mut records = self.backend.load()?;
        let before = records.len();
        records.retain(|r| r.when >= cutoff);
        let removed = before - records.len();
        self.backend.save(&records)?;
        Ok(removed)
    }

    /// Records inside the window, in insertion order. Stale records that the
    /// periodic prune has not removed yet are skipped here.
    fn within(&self, window: Duration) -> Result<Vec<ScoreRecord>, StoreError> {
        let cutoff = self.clock.now() - window;
        let mut records = self.backend.load()?;
        records.retain(|r| r.when >= cutoff);
        Ok(records)
    }
}
