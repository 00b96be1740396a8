//! Game simulation modules

pub mod avatar;
pub mod landing;
pub mod physics;
pub mod pool;
pub mod queue;
pub mod round;
pub mod runner;
pub mod snapshot;

pub use avatar::{Appearance, Avatar, AvatarPhase};
pub use pool::{Pad, PoolKind};
pub use round::{Round, RoundPhase, RoundStatus};
pub use runner::{RoundHandle, RoundInput, RoundRunner};

use std::time::Duration;

/// Gameplay tuning shared by the physics world and the round
#[derive(Debug, Clone, Copy)]
pub struct GameTuning {
    pub screen_width: f32,
    pub screen_height: f32,

    /// Downward acceleration in px/s^2
    pub gravity: f32,
    /// Terminal fall speed once the parachute is out
    pub chute_gravity: f32,
    /// Spawn horizontal speed is drawn from [-max_velocity, max_velocity]
    pub max_velocity: f32,
    /// Randomized bump applied on wall and avatar contact
    pub bump_min: f32,
    pub bump_spread: f32,
    /// Horizontal restitution off the side walls
    pub wall_restitution: f32,

    pub avatar_size: f32,
    pub pad_width: f32,
    pub pad_height: f32,

    /// Quiet period after the last landing before the round ends itself
    pub end_wait: Duration,
    /// Bounds of the delay between queued drops
    pub min_queue_buffer: Duration,
    pub max_queue_buffer: Duration,
    /// Minimum gap between two landing evaluations of the same avatar
    pub landing_debounce: Duration,

    /// Chance that a plain drop gets a themed character instead of a sprite
    pub character_chance: f64,
    /// How many names !droprecent lists
    pub recent_scores: usize,
}

impl Default for GameTuning {
    fn default() -> Self {
        Self {
            screen_width: 1920.0,
            screen_height: 1080.0,
            gravity: 400.0,
            chute_gravity: 30.0,
            max_velocity: 600.0,
            bump_min: 20.0,
            bump_spread: 20.0,
            wall_restitution: 0.9,
            avatar_size: 64.0,
            pad_width: 240.0,
            pad_height: 60.0,
            end_wait: Duration::from_secs(60),
            min_queue_buffer: Duration::from_millis(100),
            max_queue_buffer: Duration::from_millis(300),
            landing_debounce: Duration::from_millis(100),
            character_chance: 0.3,
            recent_scores: 10,
        }
    }
}

/// How a drop wants to look
#[derive(Debug, Clone, PartialEq)]
pub enum DropVariant {
    /// Random sprite, sometimes a themed character
    Default,
    /// The koala character
    Koala,
    /// A chat emote; `id` is known when the platform sent one
    Emote { id: Option<u64>, name: String },
    /// First word of the drop arguments, used to pick a fallback sprite
    Hint(String),
}

/// Named events emitted by the command dispatcher and consumed by the round
#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    Drop {
        username: String,
        variant: DropVariant,
    },
    QueueDrop {
        delay_secs: Option<u64>,
    },
    StartDrop,
    ResetDrop,
    DropTop,
    DropLow,
    DropRecent,
    DropStats {
        username: String,
    },
    DropGame,
    ClearScores {
        usernames: Option<Vec<String>>,
    },
    Help {
        username: String,
    },
}
