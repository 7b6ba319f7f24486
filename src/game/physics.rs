//! Collision resolution and movement constraints
//!
//! Everything here is pure: identical inputs always produce identical results.

use super::map::MapGrid;

/// Axis-aligned rectangle, `(x, y)` is the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    /// Hitbox of an entity whose top-left corner is at (x, y)
    pub fn square(x: f32, y: f32, size: f32) -> Self {
        Self {
            x,
            y,
            w: size,
            h: size,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }
}

/// Physics system for clamping and collision checks
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Strict overlap test: rectangles that only share an edge do not collide
    pub fn rects_overlap(a: &Rect, b: &Rect) -> bool {
        a.x < b.x + b.w && a.x + a.w > b.x && a.y < b.y + b.h && a.y + a.h > b.y
    }

    /// Whether an entity box overlaps any solid decal tile
    pub fn collides_with_map(map: &MapGrid, x: f32, y: f32, size: f32) -> bool {
        let body = Rect::square(x, y, size);
        map.solid_tiles_near(&body)
            .any(|tile| Self::rects_overlap(&body, &tile))
    }

    /// Whether a projectile point is within `radius` of the body center (inclusive)
    pub fn projectile_hits_body(px: f32, py: f32, x: f32, y: f32, size: f32) -> bool {
        let (cx, cy) = Rect::square(x, y, size).center();
        Self::distance(px, py, cx, cy) <= size / 2.0
    }

    /// Clamp a coordinate into `[0, max]`; non-finite values collapse to 0
    pub fn clamp_axis(v: f32, max: f32) -> f32 {
        if v.is_finite() {
            v.clamp(0.0, max)
        } else {
            0.0
        }
    }

    pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
        let dx = x2 - x1;
        let dy = y2 - y1;
        (dx * dx + dy * dy).sqrt()
    }

    /// Heading from (x1, y1) to (x2, y2) in radians
    pub fn angle_to(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
        let angle = (y2 - y1).atan2(x2 - x1);
        if angle.is_finite() {
            angle
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::Tile;

    fn walled_map() -> MapGrid {
        let mut grid = MapGrid::open(10, 32.0);
        grid.decal[2][3] = Some(Tile { id: 1, gid: 2 });
        grid
    }

    #[test]
    fn touching_edges_do_not_overlap() {
        let a = Rect::square(0.0, 0.0, 32.0);
        let b = Rect::square(32.0, 0.0, 32.0);
        assert!(!PhysicsSystem::rects_overlap(&a, &b));

        let c = Rect::square(31.9, 0.0, 32.0);
        assert!(PhysicsSystem::rects_overlap(&a, &c));
    }

    #[test]
    fn map_collision_uses_decal_tiles() {
        let map = walled_map();
        // Tile (row 2, col 3) spans x 96..128, y 64..96
        assert!(PhysicsSystem::collides_with_map(&map, 80.0, 50.0, 32.0));
        assert!(!PhysicsSystem::collides_with_map(&map, 64.0, 64.0, 32.0));
        assert!(!PhysicsSystem::collides_with_map(&map, 128.0, 64.0, 32.0));
        assert!(!PhysicsSystem::collides_with_map(&map, 0.0, 0.0, 32.0));
    }

    #[test]
    fn projectile_hit_radius_is_half_player_size() {
        // Body center at (116, 116)
        assert!(PhysicsSystem::projectile_hits_body(100.0, 116.0, 100.0, 100.0, 32.0));
        assert!(!PhysicsSystem::projectile_hits_body(99.0, 116.0, 100.0, 100.0, 32.0));
    }

    #[test]
    fn clamp_keeps_coordinates_in_world() {
        assert_eq!(PhysicsSystem::clamp_axis(-5.0, 3168.0), 0.0);
        assert_eq!(PhysicsSystem::clamp_axis(4000.0, 3168.0), 3168.0);
        assert_eq!(PhysicsSystem::clamp_axis(f32::NAN, 3168.0), 0.0);
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let map = walled_map();
        let first = PhysicsSystem::collides_with_map(&map, 90.5, 60.25, 32.0);
        for _ in 0..10 {
            assert_eq!(PhysicsSystem::collides_with_map(&map, 90.5, 60.25, 32.0), first);
        }
    }

    #[test]
    fn coincident_points_have_zero_angle() {
        assert_eq!(PhysicsSystem::angle_to(5.0, 5.0, 5.0, 5.0), 0.0);
    }
}
