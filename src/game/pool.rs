//! Target pad and the per-pool collision policy

use rand::Rng;

use super::physics::Body;
use super::GameTuning;

/// Bottom edge within this many pixels of the ground counts as touching
pub const LANDING_THRESHOLD: f32 = 5.0;
/// Walled pools only accept landings this far inside the pad edge
pub const WALL_BUFFER: f32 = 20.0;
/// Piles accept landings from a little higher up
pub const PILE_THRESHOLD: f32 = 40.0;

/// The pad image is taller than its collision body by this much
const PAD_BODY_TRIM: f32 = 10.0;

/// How a pad asset behaves when an avatar reaches it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoolKind {
    /// Square-walled pool
    Rectangular { wall_inset: f32, land_offset: f32 },
    /// Round tub (cauldron, heart)
    Round { wall_inset: f32, land_offset: f32 },
    /// Heap of leaves or snow: land on touch, never bounce
    Pile,
}

/// Result of scoring an accepted landing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LandingScore {
    Accepted(f64),
    /// Hit a pool wall: no score, bounce instead
    Graze,
}

impl PoolKind {
    /// Look up the collision descriptor for a pad asset path. Unknown assets
    /// are treated as piles.
    pub fn for_asset(asset: &str) -> Self {
        let asset = asset.to_ascii_lowercase();

        if asset.ends_with("target_pool_red.png") || asset.ends_with("target_pool_blue.png") {
            return PoolKind::Rectangular {
                wall_inset: 35.0,
                land_offset: 20.0,
            };
        }

        if asset.ends_with("cauldron/cauldron1.png") || asset.contains("valentines/") {
            return PoolKind::Round {
                wall_inset: 35.0,
                land_offset: 30.0,
            };
        }

        PoolKind::Pile
    }

    pub fn name(&self) -> &'static str {
        match self {
            PoolKind::Rectangular { .. } => "rectangular",
            PoolKind::Round { .. } => "round",
            PoolKind::Pile => "pile",
        }
    }

    fn walls(&self) -> Option<(f32, f32)> {
        match *self {
            PoolKind::Rectangular {
                wall_inset,
                land_offset,
            }
            | PoolKind::Round {
                wall_inset,
                land_offset,
            } => Some((wall_inset, land_offset)),
            PoolKind::Pile => None,
        }
    }

    pub fn is_walled(&self) -> bool {
        self.walls().is_some()
    }

    /// Landing test: the basic ground check or the pool-specific check
    pub fn accepts_landing(&self, avatar: &Body, pad: &Pad) -> bool {
        let bottom = avatar.bottom();
        let ground = pad.ground_level();
        let dx = (avatar.x - pad.x).abs();

        let basic = bottom >= ground - LANDING_THRESHOLD;

        let specific = match self.walls() {
            Some((_, land_offset)) => {
                bottom >= ground - land_offset && dx <= pad.half_width() - WALL_BUFFER
            }
            None => bottom >= ground - PILE_THRESHOLD && dx <= pad.half_width(),
        };

        basic || specific
    }

    /// Score an accepted landing in [0, 100]. Walled pools report a graze
    /// when the avatar sits past the wall inset.
    pub fn score(&self, avatar: &Body, pad: &Pad) -> LandingScore {
        let pos = f64::from((avatar.x - pad.x).abs());
        let half_width = f64::from(pad.half_width() + (avatar.width / 2.0).round());

        match self.walls() {
            Some((wall_inset, _)) => {
                let adjusted = half_width - f64::from(wall_inset);
                if adjusted <= 0.0 || pos > adjusted {
                    return LandingScore::Graze;
                }
                LandingScore::Accepted(((adjusted - pos) / adjusted * 100.0).clamp(0.0, 100.0))
            }
            None => {
                let raw = (half_width - pos) / half_width * 100.0;
                LandingScore::Accepted(raw.clamp(1.0, 100.0))
            }
        }
    }

    /// Whether a failed landing test should reverse the avatar horizontally
    pub fn bounces_on_miss(&self, avatar: &Body, pad: &Pad) -> bool {
        self.is_walled()
            && avatar.right() > pad.x - pad.half_width()
            && avatar.left() < pad.x + pad.half_width()
    }
}

/// The landing target, bottom-aligned with the play area
#[derive(Debug, Clone)]
pub struct Pad {
    pub asset: String,
    pub kind: PoolKind,
    /// Horizontal center
    pub x: f32,
    pub width: f32,
    pub height: f32,
    pub visible: bool,
    screen_height: f32,
}

impl Pad {
    pub fn new(asset: impl Into<String>, tuning: &GameTuning) -> Self {
        let asset = asset.into();
        Self {
            kind: PoolKind::for_asset(&asset),
            asset,
            x: tuning.screen_width / 2.0,
            width: tuning.pad_width,
            height: tuning.pad_height,
            visible: false,
            screen_height: tuning.screen_height,
        }
    }

    pub fn half_width(&self) -> f32 {
        self.width / 2.0
    }

    pub fn body_height(&self) -> f32 {
        self.height - PAD_BODY_TRIM
    }

    /// Y coordinate an avatar's bottom edge has to reach to be on the pad
    pub fn ground_level(&self) -> f32 {
        self.screen_height - self.body_height()
    }

    /// Collision body, centered inside the pad image
    pub fn body(&self) -> Body {
        let mut body = Body::new(
            self.x,
            self.screen_height - self.height / 2.0,
            self.width,
            self.body_height(),
        );
        body.enabled = self.visible;
        body
    }

    /// Pick a new horizontal position fully inside the play area
    pub fn reposition<R: Rng + ?Sized>(&mut self, rng: &mut R, screen_width: f32) {
        let half = self.half_width();
        self.x = if screen_width > self.width {
            rng.gen_range(half..=screen_width - half)
        } else {
            screen_width / 2.0
        };
    }
}
