//! Arcade physics: gravity, parachute clamp, world bounds and AABB contact

use rand::Rng;

use super::GameTuning;

/// Axis-aligned body, positioned by its center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub width: f32,
    pub height: f32,
    /// Disabled bodies are frozen and ignored by every collision check
    pub enabled: bool,
}

impl Body {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            width,
            height,
            enabled: true,
        }
    }

    pub fn left(&self) -> f32 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn top(&self) -> f32 {
        self.y - self.height / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Stop and stop simulating
    pub fn freeze(&mut self) {
        self.vel_x = 0.0;
        self.vel_y = 0.0;
        self.enabled = false;
    }
}

/// Which edge of the play area a body touched during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldContact {
    None,
    Side,
    Top,
    /// Fell out of the bottom of the play area
    Bottom,
}

/// Physics system for falling avatars
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one falling body by `dt` seconds.
    ///
    /// Deploys the parachute once the body has dropped a full body height,
    /// then caps the fall rate at the chute speed. Side and top walls bounce
    /// with a randomized bump; the bottom edge is reported, not resolved.
    pub fn step<R: Rng + ?Sized>(
        body: &mut Body,
        chute_deployed: &mut bool,
        tuning: &GameTuning,
        dt: f32,
        rng: &mut R,
    ) -> WorldContact {
        if !body.enabled {
            return WorldContact::None;
        }

        body.vel_y += tuning.gravity * dt;

        if !*chute_deployed && body.top() >= body.height {
            *chute_deployed = true;
        }
        if *chute_deployed {
            body.vel_y = body.vel_y.min(tuning.chute_gravity);
        }

        body.x += body.vel_x * dt;
        body.y += body.vel_y * dt;

        let mut contact = WorldContact::None;

        if body.left() < 0.0 {
            body.x = body.width / 2.0;
            body.vel_x = body.vel_x.abs() * tuning.wall_restitution;
            body.vel_y = -Self::bump(rng, tuning);
            contact = WorldContact::Side;
        } else if body.right() > tuning.screen_width {
            body.x = tuning.screen_width - body.width / 2.0;
            body.vel_x = -body.vel_x.abs() * tuning.wall_restitution;
            body.vel_y = -Self::bump(rng, tuning);
            contact = WorldContact::Side;
        }

        if body.top() < 0.0 {
            body.y = body.height / 2.0;
            body.vel_y = Self::bump(rng, tuning);
            contact = WorldContact::Top;
        }

        if body.bottom() >= tuning.screen_height {
            contact = WorldContact::Bottom;
        }

        contact
    }

    /// Randomized bump speed, always positive
    pub fn bump<R: Rng + ?Sized>(rng: &mut R, tuning: &GameTuning) -> f32 {
        rng.gen::<f32>() * tuning.bump_min + tuning.bump_spread
    }

    /// Check overlap between two enabled bodies
    pub fn overlaps(a: &Body, b: &Body) -> bool {
        a.enabled
            && b.enabled
            && a.left() < b.right()
            && a.right() > b.left()
            && a.top() < b.bottom()
            && a.bottom() > b.top()
    }

    /// Resolve a crash between two avatars: both hop upward and are pushed
    /// apart horizontally by half the overlap each
    pub fn resolve_crash<R: Rng + ?Sized>(
        a: &mut Body,
        b: &mut Body,
        tuning: &GameTuning,
        rng: &mut R,
    ) {
        a.vel_y = -Self::bump(rng, tuning);
        b.vel_y = -Self::bump(rng, tuning);

        let overlap = if a.x <= b.x {
            a.right() - b.left()
        } else {
            b.right() - a.left()
        };
        if overlap <= 0.0 {
            return;
        }

        let push = overlap / 2.0 + 0.1;
        if a.x <= b.x {
            a.x -= push;
            b.x += push;
        } else {
            a.x += push;
            b.x -= push;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const DT: f32 = 1.0 / 30.0;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn chute_caps_the_fall_rate() {
        let tuning = GameTuning::default();
        let mut body = Body::new(500.0, 32.0, 64.0, 64.0);
        let mut chute = false;
        let mut rng = rng();

        for _ in 0..120 {
            PhysicsSystem::step(&mut body, &mut chute, &tuning, DT, &mut rng);
        }

        assert!(chute);
        assert!(body.vel_y <= tuning.chute_gravity);
    }

    #[test]
    fn side_wall_reflects_with_restitution_and_bumps_up() {
        let tuning = GameTuning::default();
        let mut body = Body::new(40.0, 300.0, 64.0, 64.0);
        body.vel_x = -300.0;
        let mut chute = true;
        let mut rng = rng();

        let contact = PhysicsSystem::step(&mut body, &mut chute, &tuning, DT, &mut rng);

        assert_eq!(contact, WorldContact::Side);
        assert!((body.vel_x - 270.0).abs() < 1e-3);
        assert!(body.vel_y < 0.0);
        assert_eq!(body.left(), 0.0);
    }

    #[test]
    fn top_wall_pushes_down() {
        let tuning = GameTuning::default();
        let mut body = Body::new(500.0, 31.0, 64.0, 64.0);
        body.vel_y = -200.0;
        let mut chute = false;
        let mut rng = rng();

        let contact = PhysicsSystem::step(&mut body, &mut chute, &tuning, DT, &mut rng);

        assert_eq!(contact, WorldContact::Top);
        assert!(body.vel_y >= tuning.bump_spread);
    }

    #[test]
    fn bottom_edge_is_reported() {
        let tuning = GameTuning::default();
        let mut body = Body::new(500.0, tuning.screen_height - 31.0, 64.0, 64.0);
        let mut chute = true;
        let mut rng = rng();

        let contact = PhysicsSystem::step(&mut body, &mut chute, &tuning, DT, &mut rng);
        assert_eq!(contact, WorldContact::Bottom);
    }

    #[test]
    fn frozen_bodies_do_not_move_or_collide() {
        let tuning = GameTuning::default();
        let mut body = Body::new(500.0, 500.0, 64.0, 64.0);
        body.freeze();
        let other = Body::new(500.0, 500.0, 64.0, 64.0);
        let mut chute = false;
        let mut rng = rng();

        PhysicsSystem::step(&mut body, &mut chute, &tuning, DT, &mut rng);

        assert_eq!(body.y, 500.0);
        assert!(!PhysicsSystem::overlaps(&body, &other));
    }

    #[test]
    fn crash_separates_and_bumps_both() {
        let tuning = GameTuning::default();
        let mut a = Body::new(100.0, 200.0, 64.0, 64.0);
        let mut b = Body::new(140.0, 210.0, 64.0, 64.0);
        let mut rng = rng();

        assert!(PhysicsSystem::overlaps(&a, &b));
        PhysicsSystem::resolve_crash(&mut a, &mut b, &tuning, &mut rng);

        assert!(!PhysicsSystem::overlaps(&a, &b));
        assert!(a.vel_y < 0.0 && b.vel_y < 0.0);
        assert!(a.x < 100.0 && b.x > 140.0);
    }
}
