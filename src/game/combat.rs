//! Combat system - snowballs, travel and hit detection

use super::physics::PhysicsSystem;
use crate::config::GameTuning;

/// Active snowball in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Snowball {
    /// Entity that threw it; never hit by its own snowball
    pub owner_id: String,
    pub x: f32,
    pub y: f32,
    /// Direction in radians, fixed at spawn
    pub angle: f32,
    /// Remaining lifetime in milliseconds
    pub time_left: f32,
}

impl Snowball {
    /// Spawn a snowball at the thrower's position
    pub fn new(owner_id: impl Into<String>, x: f32, y: f32, angle: f32, tuning: &GameTuning) -> Self {
        Self {
            owner_id: owner_id.into(),
            x,
            y,
            angle: if angle.is_finite() { angle } else { 0.0 },
            time_left: tuning.snowball_lifetime_ms,
        }
    }

    /// Advance by `delta_ms` of wall-clock time, returns false once expired
    pub fn update(&mut self, delta_ms: f32, tuning: &GameTuning) -> bool {
        let step = tuning.snowball_speed * (delta_ms / tuning.tick_ms());
        self.x += self.angle.cos() * step;
        self.y += self.angle.sin() * step;
        self.time_left -= delta_ms;
        !self.is_expired()
    }

    pub fn is_expired(&self) -> bool {
        self.time_left <= 0.0
    }

    /// Consume the snowball after it struck something
    pub fn consume(&mut self) {
        self.time_left = -1.0;
    }

    /// Check collision with an entity whose top-left corner is at (x, y)
    pub fn check_hit(&self, x: f32, y: f32, size: f32) -> bool {
        PhysicsSystem::projectile_hits_body(self.x, self.y, x, y, size)
    }
}

/// A snowball striking an entity during a tick
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub shooter_id: String,
    pub target_id: String,
    /// Where the target stood when struck
    pub x: f32,
    pub y: f32,
}
