//! WebSocket protocol message definitions
//! These are the wire types between the server and chat bridges / overlays

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::ChatUser;
use crate::game::{Appearance, AvatarPhase};

/// Messages sent from a bridge to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// A chat line as seen by the bridge
    Chat {
        text: String,
        user: ChatUser,
        /// The line was sent by the bot account itself
        #[serde(default)]
        self_echo: bool,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to bridges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        channel: String,
        server_time: u64,
    },

    /// Line the bridge should post to chat
    Say {
        channel: String,
        message: String,
    },

    /// Round state (sent at regular intervals while something is happening)
    Snapshot {
        /// Server tick number
        tick: u64,
        /// Present while the pad is visible
        pad: Option<PadSnapshot>,
        avatars: Vec<AvatarSnapshot>,
        /// Events that occurred since last snapshot
        events: Vec<GameEvent>,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Landing pad in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PadSnapshot {
    pub asset: String,
    /// "rectangular", "round" or "pile"
    pub pool: String,
    pub x: f32,
    pub width: f32,
    pub height: f32,
}

/// Avatar state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarSnapshot {
    pub avatar_id: Uuid,
    pub username: String,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub phase: AvatarPhase,
    pub appearance: Appearance,
    pub chute_deployed: bool,
    pub labels_attached: bool,
    pub opacity: f32,
    pub score: Option<f64>,
}

/// Why an avatar went out of play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossCause {
    /// Fell past the bottom of the play area
    OutOfBounds,
    /// Landed below the current winner, or was displaced by a better landing
    Outscored,
}

/// Round events (spawns, landings, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Pad shown at a new position
    RoundStarted {
        pad_x: f32,
        pad_asset: String,
        parachute_asset: String,
    },

    /// Queue opened; drops are being collected
    QueueOpened {
        auto_release_secs: Option<u64>,
    },

    /// Queue released into a fresh round
    QueueReleased {
        count: usize,
    },

    /// New avatar (the overlay plays the drop cue)
    AvatarSpawned {
        avatar_id: Uuid,
        username: String,
    },

    /// Accepted landing
    AvatarLanded {
        avatar_id: Uuid,
        username: String,
        score: f64,
    },

    /// Best landing of the round so far
    WinnerChanged {
        avatar_id: Uuid,
        username: String,
        score: f64,
    },

    AvatarLost {
        avatar_id: Uuid,
        username: String,
        cause: LossCause,
    },

    /// Pad hidden, avatars torn down
    RoundEnded,
}
