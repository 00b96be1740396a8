//! Round state machine: the authoritative drop game core
//!
//! Synchronous and clock-free: every call takes the current `Instant`, and
//! anything the outside world should see is pushed into the outbox for the
//! runner to drain.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assets::themes::{emote_fallback_sprite, pad_for_theme, parachute_for_theme};
use crate::assets::TextureSource;
use crate::store::{score_window, ScoreRecord, ScoreStore};
use crate::ws::protocol::{GameEvent, LossCause};

use super::avatar::{Appearance, Avatar, AvatarPhase};
use super::landing::{LandingOutcome, LandingResolver};
use super::physics::{PhysicsSystem, WorldContact};
use super::pool::Pad;
use super::queue::{DropQueue, QueueDrain};
use super::{DropVariant, GameCommand, GameTuning};

/// Character used by `!drop koaladuru`
pub const KOALA_CHARACTER: &str = "koala";

/// One pending deferred action. Arming replaces whatever was pending, so
/// there is never more than one live timer of a kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Arm `delay` after `now`. A delay past what `Instant` can represent
    /// leaves the deadline disarmed and returns false.
    pub fn arm_after(&mut self, now: Instant, delay: Duration) -> bool {
        self.at = now.checked_add(delay);
        self.at.is_some()
    }

    pub fn cancel(&mut self) {
        self.at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.at
    }

    /// True once `now` has reached the deadline; disarms itself
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.at {
            Some(at) if now >= at => {
                self.at = None;
                true
            }
            _ => false,
        }
    }
}

/// Coarse round state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Idle,
    /// Collecting names, nothing falling yet
    Queuing,
    /// Releasing queued names one by one
    Draining,
    Active,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinnerSummary {
    pub username: String,
    pub score: f64,
}

/// Snapshot of the round for status queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundStatus {
    pub phase: RoundPhase,
    pub falling: usize,
    pub landed: usize,
    pub lost: usize,
    pub queued: usize,
    pub winner: Option<WinnerSummary>,
}

impl Default for RoundStatus {
    fn default() -> Self {
        Self {
            phase: RoundPhase::Idle,
            falling: 0,
            landed: 0,
            lost: 0,
            queued: 0,
            winner: None,
        }
    }
}

/// Texture to resolve off the round task
#[derive(Debug, Clone, PartialEq)]
pub struct TextureRequest {
    pub avatar_id: Uuid,
    pub source: TextureSource,
}

/// Everything the round produced since the last drain
#[derive(Debug, Default)]
pub struct Outbox {
    pub events: Vec<GameEvent>,
    pub chat: Vec<String>,
    pub textures: Vec<TextureRequest>,
}

/// The round
pub struct Round {
    tuning: GameTuning,
    theme: String,
    parachute: String,
    store: ScoreStore,
    rng: ChaCha8Rng,
    resolver: LandingResolver,
    pad: Pad,

    active: bool,
    queuing: bool,
    /// The queue was already handed to a drain this round
    released: bool,
    queue: DropQueue,
    drain: Option<QueueDrain>,

    droppers: HashMap<String, Uuid>,
    avatars: Vec<Avatar>,
    winner: Option<Uuid>,

    end_timer: Deadline,
    release_timer: Deadline,

    tick: u64,
    outbox: Outbox,
}

impl Round {
    pub fn new(tuning: GameTuning, theme: &str, store: ScoreStore, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let pad_asset = pad_for_theme(theme, &mut rng);
        let parachute = parachute_for_theme(theme, &mut rng).to_string();
        let pad = Pad::new(pad_asset, &tuning);

        info!(
            theme,
            pad = pad_asset,
            pool = pad.kind.name(),
            parachute = %parachute,
            "Round ready"
        );

        Self {
            resolver: LandingResolver::new(tuning.landing_debounce),
            tuning,
            theme: theme.to_string(),
            parachute,
            store,
            rng,
            pad,
            active: false,
            queuing: false,
            released: false,
            queue: DropQueue::new(),
            drain: None,
            droppers: HashMap::new(),
            avatars: Vec::new(),
            winner: None,
            end_timer: Deadline::default(),
            release_timer: Deadline::default(),
            tick: 0,
            outbox: Outbox::default(),
        }
    }

    /// Apply one dispatcher event
    pub fn handle(&mut self, command: GameCommand, now: Instant) {
        match command {
            GameCommand::Drop { username, variant } => self.on_drop(&username, false, variant, now),
            GameCommand::QueueDrop { delay_secs } => self.on_queue_drop(delay_secs, now),
            GameCommand::StartDrop => self.on_start_drop(now),
            GameCommand::ResetDrop => self.end(),
            GameCommand::DropTop => self.announce_top(),
            GameCommand::DropLow => self.announce_low(),
            GameCommand::DropRecent => self.announce_recent(),
            GameCommand::DropStats { username } => self.announce_stats(&username),
            GameCommand::DropGame => self.announce_status(),
            GameCommand::ClearScores { usernames } => self.clear_scores(usernames),
            GameCommand::Help { username } => self.say(help_text(&username)),
        }
    }

    /// Clear the round and show the pad somewhere new
    pub fn start(&mut self) {
        self.end_timer.cancel();
        self.avatars.clear();
        self.droppers.clear();
        self.winner = None;

        self.pad.reposition(&mut self.rng, self.tuning.screen_width);
        self.pad.visible = true;
        self.active = true;

        info!(pad_x = self.pad.x, pool = self.pad.kind.name(), "Round started");
        self.outbox.events.push(GameEvent::RoundStarted {
            pad_x: self.pad.x,
            pad_asset: self.pad.asset.clone(),
            parachute_asset: self.parachute.clone(),
        });
    }

    pub fn on_drop(&mut self, username: &str, from_queue: bool, variant: DropVariant, now: Instant) {
        if !self.active && !self.queuing {
            self.start();
        } else if self.active && self.queuing && !from_queue {
            debug!(username, "Drop ignored, queued round already released");
            return;
        }

        if self.queuing && !from_queue {
            if self.queue.enqueue(username) {
                info!(username, queued = self.queue.len(), "Drop queued");
            }
            return;
        }

        if self.droppers.contains_key(username) {
            debug!(username, "Drop ignored, already in this round");
            return;
        }

        self.end_timer.cancel();
        self.spawn(username, variant);
    }

    fn spawn(&mut self, username: &str, variant: DropVariant) {
        let (appearance, source) = self.appearance_for(&variant);
        let avatar = Avatar::spawn(username, appearance, &self.tuning, &mut self.rng);
        let avatar_id = avatar.id;

        info!(username, avatar_id = %avatar_id, x = avatar.body.x, "Avatar dropped");

        self.droppers.insert(username.to_string(), avatar_id);
        self.avatars.push(avatar);
        self.outbox.events.push(GameEvent::AvatarSpawned {
            avatar_id,
            username: username.to_string(),
        });

        if let Some(source) = source {
            self.outbox.textures.push(TextureRequest { avatar_id, source });
        }
    }

    /// Placeholder look plus, when there is one, the real texture to fetch
    fn appearance_for(&mut self, variant: &DropVariant) -> (Appearance, Option<TextureSource>) {
        match variant {
            DropVariant::Default => {
                let chance = if self.tuning.character_chance.is_finite() {
                    self.tuning.character_chance.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let source = self.rng.gen_bool(chance).then(|| TextureSource::Character {
                    theme: self.theme.clone(),
                });
                (Appearance::random_sprite(&mut self.rng), source)
            }
            DropVariant::Koala => (
                Appearance::random_sprite(&mut self.rng),
                Some(TextureSource::Named(KOALA_CHARACTER.to_string())),
            ),
            DropVariant::Emote { id, name } => (
                Appearance::Sprite(emote_fallback_sprite(name, &mut self.rng)),
                id.map(|id| TextureSource::Emote { id }),
            ),
            DropVariant::Hint(word) => (
                Appearance::Sprite(emote_fallback_sprite(word, &mut self.rng)),
                None,
            ),
        }
    }

    pub fn on_queue_drop(&mut self, delay_secs: Option<u64>, now: Instant) {
        if self.queuing {
            self.say("⚠️ A queue is already forming! Type !drop to join!".to_string());
            return;
        }

        self.queuing = true;
        self.released = false;

        let delay_secs = delay_secs.filter(|&secs| {
            let armed = self.release_timer.arm_after(now, Duration::from_secs(secs));
            if !armed {
                warn!(secs, "Auto-release delay out of range, waiting for !startdrop");
            }
            armed
        });

        match delay_secs {
            Some(secs) => {
                self.say(format!(
                    "🎯 Queue started! Type !drop to join. Auto-release in {secs} seconds!"
                ));
            }
            None => {
                self.say(
                    "🎯 Queue started! Type !drop to join. Moderators use !startdrop to release!"
                        .to_string(),
                );
            }
        }

        info!(auto_release_secs = ?delay_secs, "Queue opened");
        self.outbox.events.push(GameEvent::QueueOpened {
            auto_release_secs: delay_secs,
        });
    }

    pub fn on_start_drop(&mut self, now: Instant) {
        if !self.queuing || self.released {
            debug!("Start drop ignored, no queue waiting");
            return;
        }
        self.resolve_queue(now);
    }

    /// Start the round and release the holding set with staggered drops
    pub fn resolve_queue(&mut self, now: Instant) {
        self.release_timer.cancel();
        self.start();
        self.released = true;

        let names = self.queue.take_all();
        let count = names.len();
        info!(count, "Releasing queue");
        self.say(format!("🚀 Let's go! Releasing {count} parachuters! 🪂"));
        self.outbox.events.push(GameEvent::QueueReleased { count });

        self.drain = Some(QueueDrain::new(
            names,
            now,
            self.tuning.min_queue_buffer,
            self.tuning.max_queue_buffer,
        ));
        self.pump_drain(now);
    }

    /// Drop every queued name whose release time has come
    fn pump_drain(&mut self, now: Instant) {
        let mut due = Vec::new();
        let mut finished = false;

        if let Some(drain) = self.drain.as_mut() {
            while let Some(name) = drain.poll(now, &mut self.rng) {
                due.push(name);
            }
            finished = drain.is_finished();
        }

        for name in due {
            self.on_drop(&name, true, DropVariant::Default, now);
        }

        if finished {
            self.drain = None;
            self.arm_idle_end(now);
        }
    }

    /// Deactivate and tear everything down. Recorded scores stay.
    pub fn end(&mut self) {
        self.active = false;
        self.queuing = false;
        self.released = false;
        self.queue.clear();
        self.drain = None;
        self.end_timer.cancel();
        self.release_timer.cancel();

        self.pad.visible = false;
        self.avatars.clear();
        self.droppers.clear();
        self.winner = None;

        info!("Round ended");
        self.outbox.events.push(GameEvent::RoundEnded);
    }

    /// Advance timers and the world by one simulation tick
    pub fn tick(&mut self, now: Instant, dt: f32) {
        self.tick += 1;

        if self.release_timer.fire(now) && self.queuing && !self.released {
            info!("Queue auto-release");
            self.resolve_queue(now);
        }

        self.pump_drain(now);

        if self.active {
            self.step_world(now, dt);
        }

        if self.end_timer.fire(now) {
            info!("No landings for a while, ending round");
            self.end();
        }
    }

    fn step_world(&mut self, now: Instant, dt: f32) {
        let tuning = self.tuning;

        // Integrate
        let mut breached = Vec::new();
        for avatar in self.avatars.iter_mut().filter(|a| a.is_falling()) {
            let contact = PhysicsSystem::step(
                &mut avatar.body,
                &mut avatar.chute_deployed,
                &tuning,
                dt,
                &mut self.rng,
            );
            if contact == WorldContact::Bottom {
                breached.push(avatar.id);
            }
        }

        for id in &breached {
            self.lose(*id, LossCause::OutOfBounds);
        }

        // Avatar-avatar crashes
        let falling: Vec<usize> = (0..self.avatars.len())
            .filter(|&i| self.avatars[i].is_falling())
            .collect();
        for (n, &i) in falling.iter().enumerate() {
            for &j in &falling[n + 1..] {
                let (left, right) = self.avatars.split_at_mut(j);
                let (a, b) = (&mut left[i], &mut right[0]);
                if PhysicsSystem::overlaps(&a.body, &b.body) {
                    PhysicsSystem::resolve_crash(&mut a.body, &mut b.body, &tuning, &mut self.rng);
                }
            }
        }

        // Pad contact
        if self.pad.visible {
            let pad_body = self.pad.body();
            let mut landed = Vec::new();

            for avatar in self.avatars.iter_mut().filter(|a| a.is_falling()) {
                if !PhysicsSystem::overlaps(&avatar.body, &pad_body) {
                    continue;
                }
                match self.resolver.evaluate(avatar, &self.pad, now) {
                    LandingOutcome::Landed { score } => landed.push((avatar.id, score)),
                    LandingOutcome::Bounced => {
                        debug!(username = %avatar.username, vel_x = avatar.body.vel_x, "Bounced off the pool wall");
                    }
                    _ => {}
                }
            }

            for (id, score) in landed {
                self.on_landed(id, score, now);
            }
        }

        if !breached.is_empty() {
            self.arm_idle_end(now);
        }
    }

    /// Record the landing and settle who is winning
    fn on_landed(&mut self, id: Uuid, score: f64, now: Instant) {
        let username = match self.avatar(id) {
            Some(avatar) => avatar.username.clone(),
            None => return,
        };

        if let Err(e) = self.store.record(&username, score) {
            warn!(username = %username, score, error = %e, "Failed to record score");
        }

        self.arm_end(now);
        self.outbox.events.push(GameEvent::AvatarLanded {
            avatar_id: id,
            username: username.clone(),
            score,
        });

        let best = self
            .winner
            .and_then(|w| self.avatar(w))
            .and_then(|w| w.score);

        if matches!(best, Some(best) if score < best) {
            info!(username = %username, score, "Landed below the winner");
            self.lose(id, LossCause::Outscored);
            return;
        }

        if let Some(previous) = self.winner.replace(id) {
            self.lose(previous, LossCause::Outscored);
        }

        info!(username = %username, score, "New winner");
        self.outbox.events.push(GameEvent::WinnerChanged {
            avatar_id: id,
            username: username.clone(),
            score,
        });
        self.say(format!(
            "🎉 @{username} landed on the pad with a score of {score:.2}! 🏆 Type !drop to join the next round!"
        ));
    }

    fn lose(&mut self, id: Uuid, cause: LossCause) {
        if let Some(avatar) = self.avatars.iter_mut().find(|a| a.id == id) {
            if avatar.lose() {
                debug!(username = %avatar.username, ?cause, "Avatar lost");
                self.outbox.events.push(GameEvent::AvatarLost {
                    avatar_id: id,
                    username: avatar.username.clone(),
                    cause,
                });
            }
        }
    }

    /// Make sure a round with nothing left to happen still ends. Never
    /// touches an end timer that is already pending.
    fn arm_idle_end(&mut self, now: Instant) {
        if self.active
            && !self.end_timer.is_armed()
            && self.drain.is_none()
            && !self.avatars.iter().any(Avatar::is_falling)
        {
            debug!("Nothing left in the air, scheduling round end");
            self.arm_end(now);
        }
    }

    fn arm_end(&mut self, now: Instant) {
        if !self.end_timer.arm_after(now, self.tuning.end_wait) {
            warn!(end_wait = ?self.tuning.end_wait, "Round end wait out of range, ending on reset only");
        }
    }

    /// Swap in a resolved texture, if the avatar still exists
    pub fn apply_texture(&mut self, avatar_id: Uuid, texture: Option<String>) {
        let Some(avatar) = self.avatars.iter_mut().find(|a| a.id == avatar_id) else {
            debug!(avatar_id = %avatar_id, "Texture arrived after the avatar was gone");
            return;
        };

        match texture {
            Some(texture) => {
                debug!(username = %avatar.username, texture = %texture, "Texture applied");
                avatar.appearance = Appearance::Texture(texture);
            }
            None => debug!(username = %avatar.username, "Keeping placeholder sprite"),
        }
    }

    /// Periodic scoreboard tidy
    pub fn prune_scores(&mut self) {
        match self.store.prune(score_window()) {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Pruned expired scores"),
            Err(e) => warn!(error = %e, "Failed to prune scores"),
        }
    }

    fn announce_top(&mut self) {
        match self.store.top_within(score_window()) {
            Ok(Some(top)) => self.say(format!(
                "Poooound Highest score in the past 24 hours: {} {:.2}",
                top.username, top.score
            )),
            Ok(None) => self.say(NO_DATA.to_string()),
            Err(e) => warn!(error = %e, "Failed to read scores"),
        }
    }

    fn announce_low(&mut self) {
        match self.store.low_within(score_window()) {
            Ok(Some(low)) => self.say(format!(
                "ResidentSleeper Lowest score in the past 24 hours: {} {:.2}",
                low.username, low.score
            )),
            Ok(None) => self.say(NO_DATA.to_string()),
            Err(e) => warn!(error = %e, "Failed to read scores"),
        }
    }

    fn announce_recent(&mut self) {
        match self
            .store
            .recent_distinct_within(score_window(), self.tuning.recent_scores)
        {
            Ok(recent) if recent.is_empty() => self.say(NO_DATA.to_string()),
            Ok(recent) => self.say(format!("OhMyDog Recent drops: {}", recent_list(&recent))),
            Err(e) => warn!(error = %e, "Failed to read scores"),
        }
    }

    fn announce_stats(&mut self, username: &str) {
        match self.store.stats_for(username, score_window()) {
            Ok(Some(stats)) => self.say(format!(
                "@{username} 📊 Best score in the past 24 hours: {:.2} over {} drop{}",
                stats.best,
                stats.attempts,
                if stats.attempts == 1 { "" } else { "s" }
            )),
            Ok(None) => self.say(format!("@{username} {NO_DATA}")),
            Err(e) => warn!(error = %e, "Failed to read scores"),
        }
    }

    fn announce_status(&mut self) {
        let status = self.status();
        let winner = status
            .winner
            .map(|w| format!("{} ({:.2})", w.username, w.score))
            .unwrap_or_else(|| "none".to_string());
        self.say(format!(
            "🎮 Round: {} | falling: {} | landed: {} | queued: {} | winner: {}",
            phase_label(status.phase),
            status.falling,
            status.landed,
            status.queued,
            winner
        ));
    }

    fn clear_scores(&mut self, usernames: Option<Vec<String>>) {
        match usernames {
            None => match self.store.clear_all() {
                Ok(()) => {
                    info!("Scores cleared");
                    self.say("Scores cleared.".to_string());
                }
                Err(e) => warn!(error = %e, "Failed to clear scores"),
            },
            Some(who) => match self.store.clear_for(&who) {
                Ok(removed) => {
                    info!(removed, users = ?who, "Scores cleared for users");
                    self.say(format!("Scores cleared for {}.", who.join(", ")));
                }
                Err(e) => warn!(error = %e, "Failed to clear scores"),
            },
        }
    }

    fn say(&mut self, message: String) {
        self.outbox.chat.push(message);
    }

    fn avatar(&self, id: Uuid) -> Option<&Avatar> {
        self.avatars.iter().find(|a| a.id == id)
    }

    pub fn phase(&self) -> RoundPhase {
        if self.drain.is_some() {
            RoundPhase::Draining
        } else if self.active {
            RoundPhase::Active
        } else if self.queuing {
            RoundPhase::Queuing
        } else {
            RoundPhase::Idle
        }
    }

    pub fn status(&self) -> RoundStatus {
        let count = |phase: AvatarPhase| self.avatars.iter().filter(|a| a.phase == phase).count();

        RoundStatus {
            phase: self.phase(),
            falling: count(AvatarPhase::Falling),
            landed: count(AvatarPhase::Landed),
            lost: count(AvatarPhase::Lost),
            queued: self.queue.len() + self.drain.as_ref().map_or(0, QueueDrain::remaining),
            winner: self
                .winner
                .and_then(|w| self.avatar(w))
                .and_then(|w| {
                    w.score.map(|score| WinnerSummary {
                        username: w.username.clone(),
                        score,
                    })
                }),
        }
    }

    /// Take everything produced since the last call
    pub fn take_outbox(&mut self) -> Outbox {
        std::mem::take(&mut self.outbox)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_queuing(&self) -> bool {
        self.queuing
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn pad(&self) -> &Pad {
        &self.pad
    }

    pub fn avatars(&self) -> &[Avatar] {
        &self.avatars
    }

    pub fn end_deadline(&self) -> Option<Instant> {
        self.end_timer.due_at()
    }
}

const NO_DATA: &str = "VoteNay No data.";

fn recent_list(records: &[ScoreRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{} ({:.2})", r.username, r.score))
        .collect::<Vec<_>>()
        .join(", ")
}

fn phase_label(phase: RoundPhase) -> &'static str {
    match phase {
        RoundPhase::Idle => "idle",
        RoundPhase::Queuing => "queuing",
        RoundPhase::Draining => "releasing queue",
        RoundPhase::Active => "active",
    }
}

fn help_text(username: &str) -> String {
    format!(
        "@{username} 🎮 Commands: !drop (join game), !drop koaladuru (koala character), \
         !join (same as !drop), !droptop (top scores), !droplow (low scores), \
         !droprecent (recent), !dropstats (your stats). \
         Mods: !queuedrop, !startdrop, !resetdrop, !clearscores, !dropgame"
    )
}
