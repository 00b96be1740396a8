//! Avatar state (authoritative)

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use super::physics::Body;
use super::GameTuning;

/// Number of placeholder sprites (drop1..drop5)
pub const SPRITE_COUNT: u8 = 5;

/// Opacity of an avatar that lost
const LOST_OPACITY: f32 = 0.25;

/// Where an avatar is in its short life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarPhase {
    Falling,
    Landed,
    Lost,
}

/// What the overlay should draw for an avatar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Appearance {
    /// Placeholder sprite drop1..drop5
    Sprite(u8),
    /// Resolved texture (sprite path or emote URL)
    Texture(String),
}

impl Appearance {
    pub fn random_sprite<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Appearance::Sprite(rng.gen_range(1..=SPRITE_COUNT))
    }
}

/// One participant in a round
#[derive(Debug, Clone)]
pub struct Avatar {
    pub id: Uuid,
    pub username: String,
    pub body: Body,
    pub phase: AvatarPhase,
    /// Set once, on the first accepted landing
    pub is_landed: bool,
    /// None until landed
    pub score: Option<f64>,
    pub chute_deployed: bool,
    pub appearance: Appearance,
    /// Username and score labels follow the avatar while attached
    pub labels_attached: bool,
    pub opacity: f32,
    pub last_landing_check: Option<Instant>,
}

impl Avatar {
    /// Spawn at the top of the play area with a random position and drift
    pub fn spawn<R: Rng + ?Sized>(
        username: impl Into<String>,
        appearance: Appearance,
        tuning: &GameTuning,
        rng: &mut R,
    ) -> Self {
        let half = tuning.avatar_size / 2.0;
        let x = if tuning.screen_width > tuning.avatar_size {
            rng.gen_range(half..=tuning.screen_width - half)
        } else {
            tuning.screen_width / 2.0
        };

        let mut body = Body::new(x, half, tuning.avatar_size, tuning.avatar_size);
        if tuning.max_velocity > 0.0 {
            body.vel_x = rng.gen_range(-tuning.max_velocity..=tuning.max_velocity);
        }

        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            body,
            phase: AvatarPhase::Falling,
            is_landed: false,
            score: None,
            chute_deployed: false,
            appearance,
            labels_attached: true,
            opacity: 1.0,
            last_landing_check: None,
        }
    }

    pub fn is_falling(&self) -> bool {
        self.phase == AvatarPhase::Falling
    }

    /// Accept a landing: freeze on the pad with the score shown
    pub fn settle(&mut self, score: f64) {
        self.is_landed = true;
        self.score = Some(score);
        self.phase = AvatarPhase::Landed;
        self.chute_deployed = false;
        self.body.freeze();
    }

    /// Take the avatar out of play. Returns false if it already lost.
    pub fn lose(&mut self) -> bool {
        if self.phase == AvatarPhase::Lost {
            return false;
        }
        self.phase = AvatarPhase::Lost;
        self.chute_deployed = false;
        self.labels_attached = false;
        self.opacity = LOST_OPACITY;
        self.body.freeze();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn spawns_at_the_top_inside_the_play_area() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        for _ in 0..100 {
            let avatar = Avatar::spawn("alice", Appearance::Sprite(1), &tuning, &mut rng);
            assert_eq!(avatar.body.top(), 0.0);
            assert!(avatar.body.left() >= 0.0);
            assert!(avatar.body.right() <= tuning.screen_width);
            assert!(avatar.body.vel_x.abs() <= tuning.max_velocity);
            assert!(avatar.is_falling());
            assert_eq!(avatar.score, None);
        }
    }

    #[test]
    fn negative_max_velocity_spawns_without_drift() {
        let tuning = GameTuning {
            max_velocity: -5.0,
            ..GameTuning::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let avatar = Avatar::spawn("alice", Appearance::Sprite(1), &tuning, &mut rng);
        assert_eq!(avatar.body.vel_x, 0.0);
    }

    #[test]
    fn lose_is_idempotent() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut avatar = Avatar::spawn("bob", Appearance::Sprite(2), &tuning, &mut rng);

        assert!(avatar.lose());
        assert!(!avatar.lose());
        assert_eq!(avatar.phase, AvatarPhase::Lost);
        assert!(!avatar.labels_attached);
        assert!(!avatar.body.enabled);
        assert!(avatar.opacity < 1.0);
    }

    #[test]
    fn landed_winner_can_still_be_demoted() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut avatar = Avatar::spawn("carol", Appearance::Sprite(3), &tuning, &mut rng);

        avatar.settle(72.5);
        assert!(avatar.is_landed);
        assert_eq!(avatar.score, Some(72.5));

        assert!(avatar.lose());
        assert!(avatar.is_landed);
        assert_eq!(avatar.score, Some(72.5));
    }

    #[test]
    fn random_sprites_stay_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..100 {
            match Appearance::random_sprite(&mut rng) {
                Appearance::Sprite(n) => assert!((1..=SPRITE_COUNT).contains(&n)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
