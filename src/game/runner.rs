//! Authoritative round task: owns the [`Round`] and drives it from the tick,
//! incoming commands and the scoreboard tidy

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assets::{resolve_source, AssetCatalog};
use crate::util::time::{tick_delta, SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{GameEvent, ServerMsg};

use super::round::{Outbox, Round, RoundStatus, TextureRequest};
use super::snapshot::SnapshotBuilder;
use super::GameCommand;

/// How often expired scores are pruned
const TIDY_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Something for the round task to apply
#[derive(Debug, Clone)]
pub enum RoundInput {
    Command(GameCommand),
    /// Late result of a texture lookup (None keeps the placeholder)
    TextureResolved {
        avatar_id: Uuid,
        texture: Option<String>,
    },
}

/// Handle to the running round
#[derive(Clone)]
pub struct RoundHandle {
    input_tx: mpsc::Sender<RoundInput>,
    updates_tx: broadcast::Sender<ServerMsg>,
    status_rx: watch::Receiver<RoundStatus>,
}

impl RoundHandle {
    /// Queue a command; false once the round task is gone
    pub async fn send(&self, command: GameCommand) -> bool {
        self.input_tx.send(RoundInput::Command(command)).await.is_ok()
    }

    /// Chat lines and snapshots, as published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.updates_tx.subscribe()
    }

    /// Latest published round status
    pub fn status(&self) -> RoundStatus {
        self.status_rx.borrow().clone()
    }
}

/// The task that owns the round
pub struct RoundRunner {
    round: Round,
    channel: String,
    catalog: Arc<dyn AssetCatalog>,
    input_rx: mpsc::Receiver<RoundInput>,
    /// Texture lookups report back through here
    input_tx: mpsc::Sender<RoundInput>,
    updates_tx: broadcast::Sender<ServerMsg>,
    status_tx: watch::Sender<RoundStatus>,
    snapshot_builder: SnapshotBuilder,
    /// Events waiting for the next snapshot
    pending_events: Vec<GameEvent>,
}

impl RoundRunner {
    pub fn new(
        round: Round,
        channel: impl Into<String>,
        catalog: Arc<dyn AssetCatalog>,
    ) -> (Self, RoundHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (updates_tx, _) = broadcast::channel(64);
        let (status_tx, status_rx) = watch::channel(round.status());

        let handle = RoundHandle {
            input_tx: input_tx.clone(),
            updates_tx: updates_tx.clone(),
            status_rx,
        };

        let snapshot_interval = SIMULATION_TPS / SNAPSHOT_TPS;
        let runner = Self {
            round,
            channel: channel.into(),
            catalog,
            input_rx,
            input_tx,
            updates_tx,
            status_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            pending_events: Vec::new(),
        };

        (runner, handle)
    }

    /// Run the tick loop
    pub async fn run(mut self) {
        info!(channel = %self.channel, "Round task started");

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut tidy_interval = interval(TIDY_INTERVAL);
        tidy_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.round.tick(Instant::now(), tick_delta());
                    self.flush();
                    self.maybe_snapshot();
                }
                input = self.input_rx.recv() => {
                    let Some(input) = input else { break };
                    self.apply(input);
                    self.flush();
                }
                _ = tidy_interval.tick() => {
                    self.round.prune_scores();
                }
            }
        }

        info!(channel = %self.channel, "Round task stopped");
    }

    fn apply(&mut self, input: RoundInput) {
        match input {
            RoundInput::Command(command) => self.round.handle(command, Instant::now()),
            RoundInput::TextureResolved { avatar_id, texture } => {
                self.round.apply_texture(avatar_id, texture)
            }
        }
    }

    /// Publish what the round produced
    fn flush(&mut self) {
        let Outbox {
            events,
            chat,
            textures,
        } = self.round.take_outbox();

        for message in chat {
            let _ = self.updates_tx.send(ServerMsg::Say {
                channel: self.channel.clone(),
                message,
            });
        }

        if !events.is_empty() {
            self.pending_events.extend(events);
            self.snapshot_builder.force_next();
        }

        for request in textures {
            self.resolve_texture(request);
        }

        let status = self.round.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    /// Snapshots go out while a round is running, plus once more to carry
    /// any events left over (the round end, a queue opening, ...)
    fn maybe_snapshot(&mut self) {
        if !self.snapshot_builder.should_send() {
            return;
        }
        if !self.round.is_active() && self.pending_events.is_empty() {
            return;
        }

        let snapshot = self.snapshot_builder.build(
            self.round.tick_count(),
            self.round.pad(),
            self.round.avatars(),
            std::mem::take(&mut self.pending_events),
        );
        let _ = self.updates_tx.send(snapshot);
    }

    /// Look the texture up off the round task and report back
    fn resolve_texture(&self, request: TextureRequest) {
        let catalog = Arc::clone(&self.catalog);
        let input_tx = self.input_tx.clone();

        tokio::spawn(async move {
            let texture = match resolve_source(catalog.as_ref(), &request.source).await {
                Ok(texture) => Some(texture),
                Err(e) => {
                    warn!(avatar_id = %request.avatar_id, error = %e, "Texture lookup failed, keeping placeholder");
                    None
                }
            };

            let resolved = RoundInput::TextureResolved {
                avatar_id: request.avatar_id,
                texture,
            };
            if input_tx.send(resolved).await.is_err() {
                debug!(avatar_id = %request.avatar_id, "Round task gone before texture arrived");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetError;
    use crate::game::{DropVariant, GameTuning, RoundPhase};
    use crate::store::{MemoryBackend, ScoreStore};
    use crate::util::time::SystemClock;
    use async_trait::async_trait;
    use tokio::time::timeout;

    struct FixedCatalog;

    #[async_trait]
    impl AssetCatalog for FixedCatalog {
        fn select_character(&self, _theme: &str) -> Option<String> {
            Some("astronaut".to_string())
        }

        async fn resolve_texture(&self, id: &str) -> Result<String, AssetError> {
            Ok(format!("characters/{id}.png"))
        }
    }

    fn spawn_runner() -> RoundHandle {
        let store = ScoreStore::new(Box::new(MemoryBackend::default()), Arc::new(SystemClock));
        let round = Round::new(GameTuning::default(), "base", store, 3);
        let (runner, handle) = RoundRunner::new(round, "streamer", Arc::new(FixedCatalog));
        tokio::spawn(runner.run());
        handle
    }

    /// Wait for the first message matching `pick`
    async fn next_matching<T>(
        rx: &mut broadcast::Receiver<ServerMsg>,
        mut pick: impl FnMut(ServerMsg) -> Option<T>,
    ) -> T {
        timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Ok(msg) => {
                        if let Some(found) = pick(msg) {
                            return found;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => panic!("updates closed: {e}"),
                }
            }
        })
        .await
        .expect("timed out waiting for message")
    }

    #[tokio::test]
    async fn drop_is_announced_in_a_snapshot() {
        let handle = spawn_runner();
        let mut rx = handle.subscribe();

        assert!(
            handle
                .send(GameCommand::Drop {
                    username: "alice".into(),
                    variant: DropVariant::Default,
                })
                .await
        );

        let spawned = next_matching(&mut rx, |msg| match msg {
            ServerMsg::Snapshot { events, .. } => events.into_iter().find_map(|e| match e {
                GameEvent::AvatarSpawned { username, .. } => Some(username),
                _ => None,
            }),
            _ => None,
        })
        .await;
        assert_eq!(spawned, "alice");
    }

    #[tokio::test]
    async fn chat_replies_are_addressed_to_the_channel() {
        let handle = spawn_runner();
        let mut rx = handle.subscribe();

        handle.send(GameCommand::DropTop).await;

        let (channel, message) = next_matching(&mut rx, |msg| match msg {
            ServerMsg::Say { channel, message } => Some((channel, message)),
            _ => None,
        })
        .await;
        assert_eq!(channel, "streamer");
        assert_eq!(message, "VoteNay No data.");
    }

    #[tokio::test]
    async fn koala_texture_is_swapped_in() {
        let handle = spawn_runner();
        let mut rx = handle.subscribe();

        handle
            .send(GameCommand::Drop {
                username: "bob".into(),
                variant: DropVariant::Koala,
            })
            .await;

        let appearance = next_matching(&mut rx, |msg| match msg {
            ServerMsg::Snapshot { avatars, .. } => avatars
                .into_iter()
                .find(|a| a.username == "bob")
                .map(|a| a.appearance)
                .filter(|a| matches!(a, crate::game::Appearance::Texture(_))),
            _ => None,
        })
        .await;
        assert_eq!(
            appearance,
            crate::game::Appearance::Texture("characters/koala.png".into())
        );
    }

    #[tokio::test]
    async fn status_follows_the_round() {
        let handle = spawn_runner();
        let mut status = handle.status_rx.clone();
        assert_eq!(handle.status().phase, RoundPhase::Idle);

        handle
            .send(GameCommand::QueueDrop { delay_secs: None })
            .await;

        timeout(Duration::from_secs(2), async {
            while status.borrow_and_update().phase != RoundPhase::Queuing {
                status.changed().await.expect("status sender dropped");
            }
        })
        .await
        .expect("round never started queuing");
        assert_eq!(handle.status().phase, RoundPhase::Queuing);
    }
}
