//! Ray hit data shared by every probe.
//!
//! A probe either produces a [`CollisionData`] or nothing. Misses are the
//! common case and are never treated as errors.

use bevy::prelude::*;

/// Collision layer bits used by the traversal probes.
pub mod layers {
    /// Regular walkable or blocking geometry.
    pub const DEFAULT: u32 = 1;
    /// Geometry a character may hang from or climb.
    pub const CLIMBABLE: u32 = 1 << 1;
    /// Every layer.
    pub const ALL: u32 = u32::MAX;
}

/// Information about a raycast hit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionData {
    /// Distance along the ray to the hit point.
    pub distance: f32,
    /// Normal of the surface at the hit point.
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Entity that was hit (if any).
    pub entity: Option<Entity>,
}

impl CollisionData {
    /// Create a collision result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
        }
    }

    /// Angle between the hit normal and `up`, in degrees.
    ///
    /// 0 for a floor, 90 for a vertical wall, 180 for a ceiling.
    pub fn angle_to_up(&self, up: Vec3) -> f32 {
        self.normal.angle_between(up).to_degrees()
    }
}
