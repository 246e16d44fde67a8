//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature (on by default).
//!
//! Scene queries run against the default Rapier context. Layer masks map
//! onto Rapier collision groups: a collider is hit when its memberships
//! intersect the query mask. Motion goes through a
//! [`KinematicCharacterController`] when the character has one; otherwise it
//! is swept against the scene and written straight into the `Transform`.

use bevy::prelude::*;
use bevy_rapier3d::geometry::Group;
use bevy_rapier3d::prelude::*;

use crate::backend::{RaycastRequest, SceneQuery, TraversalBackend};
use crate::collision::CollisionData;
use crate::host::TraversalCharacter;
use crate::slope::SlopeMovement;
use crate::state::TraversalDisabled;

/// Rapier3D physics backend for the traversal controllers.
///
/// Collision queries use the `RapierContext` read through
/// [`ReadRapierContext`]; the backend never writes to the physics world
/// except through the character's own components.
pub struct Rapier3dBackend;

impl TraversalBackend for Rapier3dBackend {
    type Scene = ReadRapierContext<'static, 'static>;

    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn with_scene<R>(
        scene: &ReadRapierContext<'_, '_>,
        f: impl FnOnce(&dyn SceneQuery) -> R,
    ) -> Option<R> {
        let context = scene.single().ok()?;
        Some(f(&RapierScene { context: &context }))
    }
}

/// Tuning of the character motion applied by the Rapier backend.
#[derive(Resource, Reflect, Debug, Clone, Copy)]
#[reflect(Resource)]
pub struct Rapier3dSettings {
    /// Height above the feet the ground ray starts from.
    pub ground_ray_lift: f32,
    /// Extra ground ray length below the feet, used to report ground that
    /// is close but not touching.
    pub ground_ray_reach: f32,
    /// Maximum drop the character is snapped down onto ground.
    pub snap_distance: f32,
    /// Horizontal radius of the character body.
    pub body_radius: f32,
    /// Height above the feet of the horizontal collision sweep.
    pub sweep_height: f32,
}

impl Default for Rapier3dSettings {
    fn default() -> Self {
        Self {
            ground_ray_lift: 0.5,
            ground_ray_reach: 1.0,
            snap_distance: 0.2,
            body_radius: 0.3,
            sweep_height: 0.5,
        }
    }
}

/// [`SceneQuery`] over a Rapier context.
struct RapierScene<'a, 'c> {
    context: &'a RapierContext<'c>,
}

impl SceneQuery for RapierScene<'_, '_> {
    fn cast_ray(&self, request: &RaycastRequest) -> Option<CollisionData> {
        rapier_raycast(self.context, request)
    }
}

/// Perform a raycast using RapierContext.
///
/// Shapes containing the ray origin are skipped: a solid cast reports them
/// at distance zero with no usable normal.
fn rapier_raycast(context: &RapierContext, request: &RaycastRequest) -> Option<CollisionData> {
    if request.direction == Vec3::ZERO {
        return None;
    }
    let mut filter = QueryFilter::default()
        .exclude_sensors()
        .groups(CollisionGroups::new(
            Group::ALL,
            Group::from_bits_truncate(request.mask),
        ));
    if let Some(entity) = request.exclude {
        filter = filter.exclude_collider(entity).exclude_rigid_body(entity);
    }

    let mut closest: Option<CollisionData> = None;
    context.intersections_with_ray(
        request.origin,
        request.direction,
        request.max_distance,
        true,
        filter,
        |hit_entity, hit| {
            let nearer = closest.is_none_or(|c| hit.time_of_impact < c.distance);
            if hit.time_of_impact > f32::EPSILON && nearer {
                closest = Some(CollisionData::new(
                    hit.time_of_impact,
                    hit.normal,
                    hit.point,
                    Some(hit_entity),
                ));
            }
            true
        },
    );
    closest
}

/// Plugin that sets up Rapier3D-specific systems for the traversal controllers.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        use crate::TraversalSet;

        app.register_type::<Rapier3dSettings>();
        app.init_resource::<Rapier3dSettings>();

        app.add_systems(
            FixedUpdate,
            rapier_ground_detection.in_set(TraversalSet::Sensors),
        );
        app.add_systems(
            FixedUpdate,
            rapier_apply_motion.in_set(TraversalSet::Finalize),
        );
    }
}

/// Ground below `feet`, measured from the feet.
///
/// The ray starts slightly above the feet so ground the character sank into
/// is still found.
fn ground_below(
    scene: &dyn SceneQuery,
    settings: &Rapier3dSettings,
    entity: Entity,
    feet: Vec3,
) -> Option<CollisionData> {
    let request = RaycastRequest::new(
        feet + Vec3::Y * settings.ground_ray_lift,
        Vec3::NEG_Y,
        settings.ground_ray_lift + settings.ground_ray_reach,
    )
    .excluding(Some(entity));
    scene.cast_ray(&request).map(|mut hit| {
        hit.distance -= settings.ground_ray_lift;
        hit
    })
}

/// Rapier-specific ground detection.
fn rapier_ground_detection(
    rapier_context: ReadRapierContext,
    settings: Res<Rapier3dSettings>,
    mut q_characters: Query<(Entity, &Transform, &mut TraversalCharacter), Without<TraversalDisabled>>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };
    let scene = RapierScene { context: &context };

    for (entity, transform, mut character) in &mut q_characters {
        let ground = ground_below(&scene, &settings, entity, transform.translation);
        character.set_ground(ground);
    }
}

/// Hand the tick's motion to Rapier.
///
/// Free characters integrate their velocity, falling under gravity when no
/// integrator owns it. Characters under external control only receive their
/// accumulated motion. Without a character controller the motion is swept
/// horizontally against the scene and free characters are snapped onto
/// ground.
fn rapier_apply_motion(
    time: Res<Time>,
    rapier_context: ReadRapierContext,
    settings: Res<Rapier3dSettings>,
    mut q_characters: Query<
        (
            Entity,
            &mut Transform,
            &mut TraversalCharacter,
            Option<&mut KinematicCharacterController>,
            Has<SlopeMovement>,
        ),
        Without<TraversalDisabled>,
    >,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };
    let scene = RapierScene { context: &context };
    let dt = time.delta_secs();

    for (entity, mut transform, mut character, controller, has_integrator) in &mut q_characters {
        let mut motion = character.take_motion();
        let controlled = character.is_externally_controlled();

        if !controlled {
            if !has_integrator {
                if character.grounded && character.velocity.y < 0.0 {
                    character.velocity.y = 0.0;
                } else if !character.grounded {
                    character.velocity.y -= character.gravity * dt;
                }
            }
            motion += character.velocity * dt;
        }

        if let Some(mut controller) = controller {
            controller.translation = Some(motion);
            continue;
        }

        let horizontal = Vec3::new(motion.x, 0.0, motion.z);
        let allowed = sweep(&scene, &settings, entity, transform.translation, horizontal);
        transform.translation += allowed + Vec3::Y * motion.y;

        if controlled || character.velocity.y > 0.0 {
            continue;
        }
        if let Some(ground) = ground_below(&scene, &settings, entity, transform.translation) {
            if ground.distance <= settings.snap_distance {
                transform.translation.y = ground.point.y;
                if !has_integrator {
                    character.velocity.y = 0.0;
                }
            }
        }
    }
}

/// Part of a horizontal `motion` from `from` that stays clear of the scene.
///
/// Stops a body radius short of the first blocking face and keeps the part
/// of the remaining motion that slides along it.
fn sweep(
    scene: &dyn SceneQuery,
    settings: &Rapier3dSettings,
    entity: Entity,
    from: Vec3,
    motion: Vec3,
) -> Vec3 {
    let length = motion.length();
    if length < 1e-6 {
        return motion;
    }
    let direction = motion / length;
    let request = RaycastRequest::new(
        from + Vec3::Y * settings.sweep_height,
        direction,
        length + settings.body_radius,
    )
    .excluding(Some(entity));

    let Some(hit) = scene.cast_ray(&request) else {
        return motion;
    };
    let normal = Vec3::new(hit.normal.x, 0.0, hit.normal.z).normalize_or_zero();
    // Faces that do not oppose the motion never block it.
    if normal.dot(direction) >= 0.0 {
        return motion;
    }
    let free = (hit.distance - settings.body_radius).max(0.0);
    let blocked = direction * free;
    let rest = motion - blocked;
    blocked + rest - normal * rest.dot(normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::SystemState;
    use bevy::time::TimeUpdateStrategy;
    use std::time::Duration;

    fn create_test_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(TransformPlugin);
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());
        app.insert_resource(Time::<Fixed>::from_hz(60.0));
        app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(1.0 / 60.0)));
        app.finish();
        app.cleanup();
        app
    }

    fn spawn_cuboid(app: &mut App, center: Vec3, half: Vec3, groups: CollisionGroups) {
        let transform = Transform::from_translation(center);
        app.world_mut().spawn((
            transform,
            GlobalTransform::from(transform),
            RigidBody::Fixed,
            Collider::cuboid(half.x, half.y, half.z),
            groups,
        ));
    }

    /// Let Rapier pick up the colliders spawned so far.
    fn settle(app: &mut App) {
        for _ in 0..3 {
            app.update();
        }
    }

    fn with_scene<R>(app: &mut App, f: impl FnOnce(&dyn SceneQuery) -> R) -> Option<R> {
        let mut state = SystemState::<ReadRapierContext<'static, 'static>>::new(app.world_mut());
        let scene = state.get(app.world());
        Rapier3dBackend::with_scene(&scene, f)
    }

    fn cast(app: &mut App, request: RaycastRequest) -> Option<CollisionData> {
        with_scene(app, |scene| scene.cast_ray(&request)).flatten()
    }

    #[test]
    fn raycast_reports_surface_normal_and_respects_mask() {
        let mut app = create_test_app();
        spawn_cuboid(
            &mut app,
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(10.0, 0.5, 10.0),
            CollisionGroups::new(Group::GROUP_1, Group::ALL),
        );
        settle(&mut app);

        let down = RaycastRequest::new(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 5.0);
        let hit = cast(&mut app, down).expect("floor below the origin");
        assert!((hit.distance - 2.0).abs() < 0.01);
        assert!((hit.normal - Vec3::Y).length() < 0.01);

        let masked = down.with_mask(Group::GROUP_2.bits());
        assert!(cast(&mut app, masked).is_none());
    }

    #[test]
    fn raycast_from_inside_reaches_next_shape() {
        let mut app = create_test_app();
        let groups = CollisionGroups::new(Group::ALL, Group::ALL);
        spawn_cuboid(&mut app, Vec3::ZERO, Vec3::splat(1.0), groups);
        spawn_cuboid(&mut app, Vec3::new(0.0, 0.0, -4.0), Vec3::splat(0.5), groups);
        settle(&mut app);

        let hit = cast(&mut app, RaycastRequest::new(Vec3::ZERO, Vec3::NEG_Z, 10.0))
            .expect("second box behind the first");
        assert!((hit.distance - 3.5).abs() < 0.01, "got {}", hit.distance);
        assert!((hit.normal - Vec3::Z).length() < 0.01);
    }

    #[test]
    fn sweep_stops_before_wall_and_slides() {
        let mut app = create_test_app();
        spawn_cuboid(
            &mut app,
            Vec3::new(0.0, 1.0, -2.0),
            Vec3::new(5.0, 1.0, 0.5),
            CollisionGroups::new(Group::ALL, Group::ALL),
        );
        settle(&mut app);

        let settings = Rapier3dSettings::default();
        let entity = Entity::from_raw(9);
        let (straight, diagonal) = with_scene(&mut app, |scene| {
            (
                sweep(scene, &settings, entity, Vec3::ZERO, Vec3::new(0.0, 0.0, -3.0)),
                sweep(scene, &settings, entity, Vec3::ZERO, Vec3::new(1.0, 0.0, -3.0)),
            )
        })
        .expect("rapier context exists");

        assert!((straight.z + 1.2).abs() < 0.01, "stops a body radius before the face");
        assert!(diagonal.x > 0.5, "keeps the motion along the wall");
        assert!(diagonal.z > -1.5, "never penetrates the face");
    }

    #[test]
    fn ground_below_measures_from_feet() {
        let mut app = create_test_app();
        spawn_cuboid(
            &mut app,
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(10.0, 0.5, 10.0),
            CollisionGroups::new(Group::ALL, Group::ALL),
        );
        settle(&mut app);

        let settings = Rapier3dSettings::default();
        let entity = Entity::from_raw(3);
        let (standing, hovering, high) = with_scene(&mut app, |scene| {
            (
                ground_below(scene, &settings, entity, Vec3::ZERO),
                ground_below(scene, &settings, entity, Vec3::new(0.0, 0.4, 0.0)),
                ground_below(scene, &settings, entity, Vec3::new(0.0, 5.0, 0.0)),
            )
        })
        .expect("rapier context exists");

        assert!(standing.is_some_and(|g| g.distance.abs() < 0.01));
        assert!(hovering.is_some_and(|g| (g.distance - 0.4).abs() < 0.01));
        assert!(high.is_none(), "beyond the ground ray reach");
    }
}
