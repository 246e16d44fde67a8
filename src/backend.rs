//! Physics backend abstraction.
//!
//! This module defines the traits that physics backends must implement
//! to work with the traversal controllers. This allows easy swapping
//! between physics engines.

use bevy::ecs::system::{ReadOnlySystemParam, SystemParamItem};
use bevy::prelude::*;

use crate::collision::{layers, CollisionData};

/// Read-only access to the collision scene.
///
/// This is the only query the traversal core makes against world geometry.
/// Returning `None` is the normal answer for a ray that hits nothing.
pub trait SceneQuery {
    /// Cast a ray and return the closest hit, if any.
    fn cast_ray(&self, request: &RaycastRequest) -> Option<CollisionData>;
}

/// Trait for physics backend implementations.
///
/// A backend supplies scene access as a read-only system parameter and a
/// plugin that registers its sensor and finalize systems. The sensor
/// systems keep [`TraversalCharacter`](crate::host::TraversalCharacter)
/// ground state current; the finalize systems apply the displacement the
/// controllers accumulated during the tick.
///
/// # Example
///
/// For an implementation, see `Rapier3dBackend` behind the default
/// `rapier3d` feature.
pub trait TraversalBackend: 'static + Send + Sync {
    /// System parameter used to reach the collision scene.
    type Scene: ReadOnlySystemParam;

    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Expose the scene parameter as a [`SceneQuery`] for the duration of `f`.
    ///
    /// Returns `None` when the scene is not available this tick (for example
    /// before the physics context exists).
    fn with_scene<R>(
        scene: &SystemParamItem<'_, '_, Self::Scene>,
        f: impl FnOnce(&dyn SceneQuery) -> R,
    ) -> Option<R>;
}

/// Helper struct for building raycasts.
#[derive(Debug, Clone, Copy)]
pub struct RaycastRequest {
    /// Origin point of the ray.
    pub origin: Vec3,
    /// Direction of the ray (normalized).
    pub direction: Vec3,
    /// Maximum distance to cast.
    pub max_distance: f32,
    /// Layers the ray collides with.
    pub mask: u32,
    /// Entity to exclude from results.
    pub exclude: Option<Entity>,
}

impl RaycastRequest {
    /// Create a new raycast request against every layer.
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
            mask: layers::ALL,
            exclude: None,
        }
    }

    /// Restrict the ray to the given layer mask.
    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    /// Exclude an entity from the raycast.
    pub fn excluding(mut self, entity: Option<Entity>) -> Self {
        self.exclude = entity;
        self
    }

    /// Point along the ray at `distance`.
    #[inline]
    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}
