//! Oriented-box scene for unit tests.
//!
//! Answers raycasts with a slab test, so controller logic can be exercised
//! without a physics world. A ray starting inside a box does not hit it,
//! matching the Rapier backend.

use bevy::prelude::*;

use crate::backend::{RaycastRequest, SceneQuery};
use crate::collision::CollisionData;

#[derive(Debug, Clone, Copy)]
struct SceneBox {
    center: Vec3,
    rotation: Quat,
    half_extents: Vec3,
    layers: u32,
    entity: Option<Entity>,
}

impl SceneBox {
    fn cast(&self, request: &RaycastRequest) -> Option<(f32, Vec3)> {
        let inverse = self.rotation.inverse();
        let origin = inverse * (request.origin - self.center);
        let direction = inverse * request.direction;
        let half = self.half_extents;

        if origin.abs().cmplt(half).all() {
            return None;
        }

        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let (o, d, h) = (origin[axis], direction[axis], half[axis]);
            if d.abs() < 1e-8 {
                if o < -h || o > h {
                    return None;
                }
                continue;
            }
            let t1 = (-h - o) / d;
            let t2 = (h - o) / d;
            let (enter, exit, sign) = if t1 < t2 { (t1, t2, -1.0) } else { (t2, t1, 1.0) };
            if enter > t_near {
                t_near = enter;
                normal = Vec3::ZERO;
                normal[axis] = sign;
            }
            t_far = t_far.min(exit);
            if t_near > t_far {
                return None;
            }
        }

        if t_near < 0.0 || t_near > request.max_distance {
            return None;
        }
        Some((t_near, self.rotation * normal))
    }
}

/// A set of static oriented boxes.
#[derive(Debug, Clone, Default)]
pub(crate) struct BoxScene {
    boxes: Vec<SceneBox>,
}

impl BoxScene {
    pub(crate) fn add_box(
        &mut self,
        center: Vec3,
        rotation: Quat,
        half_extents: Vec3,
        layers: u32,
        entity: Option<Entity>,
    ) {
        self.boxes.push(SceneBox {
            center,
            rotation,
            half_extents,
            layers,
            entity,
        });
    }
}

impl SceneQuery for BoxScene {
    fn cast_ray(&self, request: &RaycastRequest) -> Option<CollisionData> {
        if request.direction == Vec3::ZERO {
            return None;
        }
        self.boxes
            .iter()
            .filter(|b| b.layers & request.mask != 0)
            .filter(|b| request.exclude.is_none() || b.entity != request.exclude)
            .filter_map(|b| {
                b.cast(request)
                    .map(|(distance, normal)| CollisionData::new(distance, normal, request.point_at(distance), b.entity))
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::layers;

    fn floor() -> BoxScene {
        let mut scene = BoxScene::default();
        scene.add_box(
            Vec3::new(0.0, -0.5, 0.0),
            Quat::IDENTITY,
            Vec3::new(10.0, 0.5, 10.0),
            layers::DEFAULT,
            None,
        );
        scene
    }

    #[test]
    fn ray_hits_box_face_with_normal() {
        let hit = floor()
            .cast_ray(&RaycastRequest::new(Vec3::new(1.0, 2.0, 1.0), Vec3::NEG_Y, 5.0))
            .expect("floor below");
        assert!((hit.distance - 2.0).abs() < 1e-5);
        assert!((hit.normal - Vec3::Y).length() < 1e-5);
        assert!((hit.point - Vec3::new(1.0, 0.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn ray_respects_length_mask_and_inside_start() {
        let scene = floor();
        let down = RaycastRequest::new(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 1.0);
        assert!(scene.cast_ray(&down).is_none());

        let masked = RaycastRequest::new(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 5.0).with_mask(layers::CLIMBABLE);
        assert!(scene.cast_ray(&masked).is_none());

        let inside = RaycastRequest::new(Vec3::new(0.0, -0.5, 0.0), Vec3::NEG_Y, 5.0);
        assert!(scene.cast_ray(&inside).is_none());
    }

    #[test]
    fn rotated_box_reports_slope_normal() {
        let mut scene = BoxScene::default();
        let tilt = Quat::from_rotation_x(30f32.to_radians());
        scene.add_box(Vec3::ZERO, tilt, Vec3::new(5.0, 0.1, 5.0), layers::DEFAULT, None);

        let hit = scene
            .cast_ray(&RaycastRequest::new(Vec3::new(0.0, 3.0, 0.0), Vec3::NEG_Y, 5.0))
            .expect("slope below");
        assert!((hit.angle_to_up(Vec3::Y) - 30.0).abs() < 0.01);
    }
}
