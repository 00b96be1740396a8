//! Scoreboard persistence

pub mod backend;
pub mod scores;

pub use backend::{JsonFileBackend, MemoryBackend, ScoreBackend, StoreError};
pub use scores::{score_window, PlayerStats, ScoreRecord, ScoreStore};
