//! Snapshot building for overlays

use crate::ws::protocol::{AvatarSnapshot, GameEvent, PadSnapshot, ServerMsg};

use super::avatar::Avatar;
use super::pool::Pad;

/// Builds snapshots for network transmission
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message
    pub fn build(&self, tick: u64, pad: &Pad, avatars: &[Avatar], events: Vec<GameEvent>) -> ServerMsg {
        let pad = pad.visible.then(|| PadSnapshot {
            asset: pad.asset.clone(),
            pool: pad.kind.name().to_string(),
            x: pad.x,
            width: pad.width,
            height: pad.height,
        });

        let avatars = avatars
            .iter()
            .map(|a| AvatarSnapshot {
                avatar_id: a.id,
                username: a.username.clone(),
                x: a.body.x,
                y: a.body.y,
                vel_x: a.body.vel_x,
                vel_y: a.body.vel_y,
                phase: a.phase,
                appearance: a.appearance.clone(),
                chute_deployed: a.chute_deployed,
                labels_attached: a.labels_attached,
                opacity: a.opacity,
                score: a.score,
            })
            .collect();

        ServerMsg::Snapshot {
            tick,
            pad,
            avatars,
            events,
        }
    }
}
