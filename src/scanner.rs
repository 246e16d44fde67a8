//! Environment probes.
//!
//! [`EnvironmentScanner`] is a per-call query object over a [`SceneQuery`].
//! It holds nothing between calls: every probe casts fresh rays and a miss is
//! simply `None`.

use bevy::prelude::*;

use crate::backend::{RaycastRequest, SceneQuery};
use crate::collision::CollisionData;
use crate::config::ScannerConfig;

/// Minimum up-component of a ledge top's normal for the ledge to be usable.
const MIN_LEDGE_TOP_NORMAL_Y: f32 = 0.5;

/// Geometry of a detected ledge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgeData {
    /// Point on the ledge surface.
    pub hit_point: Vec3,
    /// Normal of the probed face (the wall face for a forward ledge).
    pub hit_normal: Vec3,
    /// Where the hands grip.
    pub hang_point: Vec3,
    /// Where the character stands after climbing up.
    pub climb_up_point: Vec3,
    /// Whether the top surface is flat enough to grab.
    pub is_valid: bool,
    /// Entity the ledge belongs to, when the backend reports it.
    pub entity: Option<Entity>,
}

/// Result of a wall probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallCheckData {
    /// Whether a wall was hit.
    pub is_wall: bool,
    /// Distance to the wall, or the probe length when there is none.
    pub distance_to_wall: f32,
}

/// Stateless geometric probes around a character.
pub struct EnvironmentScanner<'a> {
    scene: &'a dyn SceneQuery,
    config: ScannerConfig,
    exclude: Option<Entity>,
}

impl<'a> EnvironmentScanner<'a> {
    /// Create a scanner over `scene`.
    pub fn new(scene: &'a dyn SceneQuery, config: ScannerConfig) -> Self {
        Self {
            scene,
            config,
            exclude: None,
        }
    }

    /// Ignore `entity` (usually the character's own collider).
    pub fn excluding(mut self, entity: Option<Entity>) -> Self {
        self.exclude = entity;
        self
    }

    /// Scanner configuration.
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    fn cast(&self, origin: Vec3, direction: Vec3, length: f32, mask: u32) -> Option<CollisionData> {
        self.scene.cast_ray(
            &RaycastRequest::new(origin, direction, length)
                .with_mask(mask)
                .excluding(self.exclude),
        )
    }

    /// Single forward probe at `height` above `origin` against obstacles.
    pub fn obstacle_check(
        &self,
        origin: Vec3,
        direction: Vec3,
        height: f32,
        range: f32,
    ) -> Option<CollisionData> {
        let direction = flatten(direction)?;
        self.cast(origin + Vec3::Y * height, direction, range, self.config.obstacle_mask)
    }

    /// Single forward probe at `height` above `origin` against climbable
    /// geometry.
    pub fn climbable_check(
        &self,
        origin: Vec3,
        direction: Vec3,
        height: f32,
        range: f32,
    ) -> Option<CollisionData> {
        let direction = flatten(direction)?;
        self.cast(origin + Vec3::Y * height, direction, range, self.config.climbable_mask)
    }

    /// Probe straight down from `origin` against obstacles.
    pub fn surface_below(&self, origin: Vec3, length: f32) -> Option<CollisionData> {
        self.cast(origin, Vec3::NEG_Y, length, self.config.obstacle_mask)
    }

    /// Whether a ray from `origin` along `direction` is unobstructed.
    pub fn is_clear(&self, origin: Vec3, direction: Vec3, distance: f32) -> bool {
        self.cast(origin, direction, distance, self.config.obstacle_mask)
            .is_none()
    }

    /// Find a grabbable ledge ahead.
    ///
    /// Casts forward at chest height for a wall, then down onto the wall top
    /// from just above and behind the wall hit. Fails when either cast misses.
    pub fn ledge_check(&self, origin: Vec3, direction: Vec3) -> Option<LedgeData> {
        let direction = flatten(direction)?;
        let config = &self.config;

        let wall = self.cast(
            origin + Vec3::Y * config.chest_height,
            direction,
            config.detection_range,
            config.climbable_mask,
        )?;

        let face_normal = flatten(wall.normal).unwrap_or(-direction);
        let probe_origin =
            wall.point + Vec3::Y * config.ledge_probe_height - face_normal * config.ledge_probe_inset;
        let top = self.cast(
            probe_origin,
            Vec3::NEG_Y,
            config.ledge_probe_height,
            config.climbable_mask,
        )?;

        Some(LedgeData {
            hit_point: top.point,
            hit_normal: face_normal,
            hang_point: top.point + Vec3::Y * config.hang_point_lift,
            climb_up_point: top.point - face_normal * config.climb_up_inset,
            is_valid: top.normal.y >= MIN_LEDGE_TOP_NORMAL_Y,
            entity: top.entity.or(wall.entity),
        })
    }

    /// Find a surface to drop onto below `origin`.
    ///
    /// Casts straight down from the origin and, when that misses, from a
    /// point offset along `direction`.
    pub fn drop_ledge_check(&self, origin: Vec3, direction: Vec3) -> Option<LedgeData> {
        let config = &self.config;
        let lift = Vec3::Y * config.drop_origin_lift;
        let forward = flatten(direction).unwrap_or(Vec3::ZERO);

        let hit = self
            .cast(origin + lift, Vec3::NEG_Y, config.drop_probe_length, config.climbable_mask)
            .or_else(|| {
                self.cast(
                    origin + forward * config.drop_forward_offset + lift,
                    Vec3::NEG_Y,
                    config.drop_probe_length,
                    config.climbable_mask,
                )
            })?;

        Some(LedgeData {
            hit_point: hit.point,
            hit_normal: hit.normal,
            hang_point: hit.point + Vec3::Y * config.hang_point_lift,
            climb_up_point: hit.point + Vec3::Y * config.drop_climb_up_lift,
            is_valid: true,
            entity: hit.entity,
        })
    }

    /// Probe for a wall from `point` along `direction`.
    pub fn wall_check(&self, point: Vec3, direction: Vec3, distance: f32) -> WallCheckData {
        match self.cast(point, direction, distance, self.config.obstacle_mask) {
            Some(hit) => WallCheckData {
                is_wall: true,
                distance_to_wall: hit.distance,
            },
            None => WallCheckData {
                is_wall: false,
                distance_to_wall: distance,
            },
        }
    }
}

/// Horizontal unit vector of `direction`, or `None` when it is vertical.
pub(crate) fn flatten(direction: Vec3) -> Option<Vec3> {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    flat.try_normalize()
}
