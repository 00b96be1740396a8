//! Landing resolver: decides what a pad contact means for one avatar

use std::time::{Duration, Instant};

use super::avatar::Avatar;
use super::pool::{LandingScore, Pad};

/// What a pad contact turned into
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LandingOutcome {
    /// Landed earlier; nothing to do
    AlreadyLanded,
    /// Evaluated too recently
    Debounced,
    /// Not close enough yet
    StillFalling,
    /// Hit a pool wall; horizontal velocity was reversed
    Bounced,
    /// Accepted, body frozen
    Landed { score: f64 },
}

pub struct LandingResolver {
    debounce: Duration,
}

impl LandingResolver {
    pub fn new(debounce: Duration) -> Self {
        Self { debounce }
    }

    /// Evaluate an avatar touching the pad. Winner bookkeeping and score
    /// persistence belong to the round.
    pub fn evaluate(&self, avatar: &mut Avatar, pad: &Pad, now: Instant) -> LandingOutcome {
        if avatar.is_landed {
            return LandingOutcome::AlreadyLanded;
        }

        if let Some(last) = avatar.last_landing_check {
            if now.saturating_duration_since(last) < self.debounce {
                return LandingOutcome::Debounced;
            }
        }
        avatar.last_landing_check = Some(now);

        if !pad.kind.accepts_landing(&avatar.body, pad) {
            if pad.kind.bounces_on_miss(&avatar.body, pad) {
                avatar.body.vel_x = -avatar.body.vel_x;
                return LandingOutcome::Bounced;
            }
            return LandingOutcome::StillFalling;
        }

        match pad.kind.score(&avatar.body, pad) {
            LandingScore::Graze => {
                avatar.body.vel_x = -avatar.body.vel_x;
                LandingOutcome::Bounced
            }
            LandingScore::Accepted(score) => {
                avatar.settle(score);
                LandingOutcome::Landed { score }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::avatar::Appearance;
    use crate::game::GameTuning;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup(asset: &str, offset: f32) -> (LandingResolver, Avatar, Pad) {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut pad = Pad::new(asset, &tuning);
        pad.x = 900.0;
        pad.visible = true;

        let mut avatar = Avatar::spawn("alice", Appearance::Sprite(1), &tuning, &mut rng);
        avatar.body.x = 900.0 + offset;
        avatar.body.y = pad.ground_level() - avatar.body.height / 2.0;
        avatar.body.vel_x = 120.0;

        (LandingResolver::new(tuning.landing_debounce), avatar, pad)
    }

    #[test]
    fn accepted_landing_freezes_and_scores() {
        let (resolver, mut avatar, pad) = setup("target_pool_red.png", 0.0);
        let now = Instant::now();

        assert_eq!(
            resolver.evaluate(&mut avatar, &pad, now),
            LandingOutcome::Landed { score: 100.0 }
        );
        assert!(avatar.is_landed);
        assert!(!avatar.body.enabled);

        // Write-once: later contacts are ignored
        assert_eq!(
            resolver.evaluate(&mut avatar, &pad, now + Duration::from_secs(1)),
            LandingOutcome::AlreadyLanded
        );
    }

    #[test]
    fn rim_graze_reverses_and_does_not_score() {
        let (resolver, mut avatar, pad) = setup("target_pool_blue.png", 140.0);

        assert_eq!(
            resolver.evaluate(&mut avatar, &pad, Instant::now()),
            LandingOutcome::Bounced
        );
        assert_eq!(avatar.body.vel_x, -120.0);
        assert!(!avatar.is_landed);
        assert_eq!(avatar.score, None);
    }

    #[test]
    fn repeat_contacts_inside_the_debounce_are_skipped() {
        let (resolver, mut avatar, pad) = setup("target_pool_blue.png", 140.0);
        let now = Instant::now();

        assert_eq!(resolver.evaluate(&mut avatar, &pad, now), LandingOutcome::Bounced);
        assert_eq!(
            resolver.evaluate(&mut avatar, &pad, now + Duration::from_millis(50)),
            LandingOutcome::Debounced
        );
        assert_eq!(avatar.body.vel_x, -120.0);
        assert_eq!(
            resolver.evaluate(&mut avatar, &pad, now + Duration::from_millis(100)),
            LandingOutcome::Bounced
        );
    }

    #[test]
    fn pile_lands_at_the_very_edge() {
        let (resolver, mut avatar, pad) = setup("easter_theme/eggs.png", 150.0);

        match resolver.evaluate(&mut avatar, &pad, Instant::now()) {
            LandingOutcome::Landed { score } => assert!(score >= 1.0),
            other => panic!("expected a landing, got {:?}", other),
        }
    }

    #[test]
    fn too_high_keeps_falling() {
        let (resolver, mut avatar, pad) = setup("winter_theme/snow.png", 0.0);
        avatar.body.y -= 100.0;

        assert_eq!(
            resolver.evaluate(&mut avatar, &pad, Instant::now()),
            LandingOutcome::StillFalling
        );
    }
}
