//! # `msg_traversal`
//!
//! Perception-driven traversal for 3D Bevy characters, with physics backend abstraction.
//!
//! This crate layers traversal on top of a character's own locomotion:
//! - Scans the environment with raycasts for obstacles, ledges and walls
//! - Classifies obstacles into parkour actions (step up, vault, climb up, wall run)
//!   and plays them with animation target matching
//! - Hangs from ledges on a graph of climb points, with stamina, shimmying and
//!   climbing up, and climbs walls freely
//! - Integrates momentum-preserving slope movement (walking, skiing, air control)
//!   with a fuel-gated jetpack
//! - Abstracts physics backend for easy swapping (Rapier3D by default)
//! - Drives Bevy's `AnimationPlayer` through an [`AnimationPlayerBinding`](animation::AnimationPlayerBinding)
//!
//! ## Architecture
//!
//! The character stays owned by its host. Controllers borrow it through the
//! [`TraversalHost`](host::TraversalHost) contract:
//! 1. Backend sensors probe the ground and keep [`TraversalCharacter`](host::TraversalCharacter) current
//! 2. Decision systems turn [`TraversalIntent`](intent::TraversalIntent) presses into actions
//! 3. A running action suspends host locomotion and accumulates root motion
//! 4. The backend applies the tick's motion and hands control back when the action ends
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use bevy_rapier3d::prelude::*;
//! use msg_traversal::prelude::*;
//!
//! fn spawn_character(
//!     mut commands: Commands,
//!     mut graphs: ResMut<Assets<AnimationGraph>>,
//!     assets: Res<AssetServer>,
//! ) {
//!     let mut graph = AnimationGraph::new();
//!     let entity = commands.spawn_empty().id();
//!     let binding = AnimationPlayerBinding::from_clips(
//!         entity,
//!         &mut graph,
//!         [("Vault", assets.load("hero.glb#Animation0"))],
//!     );
//!     commands.entity(entity).insert((
//!         Transform::default(),
//!         TraversalCharacter::new(),
//!         AnimationPlayer::default(),
//!         AnimationTransitions::new(),
//!         AnimationGraphHandle(graphs.add(graph)),
//!         binding,
//!         ParkourController::new(),
//!         ClimbController::default(),
//!     ));
//! }
//!
//! App::new()
//!     .add_plugins(DefaultPlugins)
//!     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
//!     .add_plugins(TraversalPlugin::<Rapier3dBackend>::default())
//!     .add_systems(Startup, spawn_character)
//!     .run();
//! ```

use std::marker::PhantomData;

use bevy::prelude::*;

pub mod animation;
pub mod backend;
pub mod climb;
pub mod climb_point;
pub mod collision;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod intent;
pub mod jetpack;
pub mod parkour;
pub mod scanner;
pub mod sequence;
pub mod slope;
pub mod state;
pub mod systems;

#[cfg(test)]
mod box_scene;
#[cfg(test)]
mod headless_animator;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::animation::{
        AnimationPlayerBinding, AnimationPlayers, AnimatorParameters, PlayerAnimator, RootMatch,
    };
    pub use crate::backend::{RaycastRequest, SceneQuery, TraversalBackend};
    pub use crate::climb::{ClimbController, ClimbEvent, ClimbInput, ClimbState, HangEndReason};
    pub use crate::climb_point::{ClimbAnchor, ClimbPoint, ClimbPointGraph, ClimbPointId};
    pub use crate::collision::{layers, CollisionData};
    pub use crate::config::{
        ActionProfile, ClimbConfig, JetpackConfig, ParkourConfig, ScannerConfig, SlopeConfig,
    };
    pub use crate::error::TraversalConfigError;
    pub use crate::events::{TraversalCommand, TraversalEvent};
    pub use crate::host::{CharacterHost, MatchTarget, TraversalAnimator, TraversalCharacter, TraversalHost};
    pub use crate::intent::{ButtonState, TraversalIntent};
    pub use crate::jetpack::SlopeJetpack;
    pub use crate::parkour::{ParkourAction, ParkourController, ParkourDecision, ParkourEnd};
    pub use crate::scanner::{EnvironmentScanner, LedgeData, WallCheckData};
    pub use crate::slope::{SlopeGround, SlopeInput, SlopeMovement};
    pub use crate::state::{ClimbingWall, Hanging, InParkourAction, Skiing, TraversalDisabled};
    pub use crate::{TraversalModules, TraversalPlugin, TraversalSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dSettings};
}

/// System sets of one traversal tick, chained in this order in `FixedUpdate`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalSet {
    /// Backend probes: ground state, scene mirroring.
    Sensors,
    /// Input is turned into actions.
    Decision,
    /// Running actions are stepped.
    Actions,
    /// Animators advance and apply root matching.
    Animation,
    /// Velocity integration for free characters.
    Physics,
    /// The backend applies the tick's motion.
    Finalize,
}

/// Traversal modules to run.
///
/// Supplied to [`TraversalPlugin`] once; systems of disabled modules are
/// never registered.
#[derive(Resource, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Resource)]
pub struct TraversalModules {
    /// Obstacle actions and the vertical jump.
    pub parkour: bool,
    /// Ledge hanging and wall climbing.
    pub climb: bool,
    /// Walking, skiing and air control.
    pub slope: bool,
    /// Jetpack thrust. Needs `slope`.
    pub jetpack: bool,
}

impl Default for TraversalModules {
    fn default() -> Self {
        Self {
            parkour: true,
            climb: true,
            slope: true,
            jetpack: true,
        }
    }
}

impl TraversalModules {
    /// No module enabled.
    pub fn none() -> Self {
        Self {
            parkour: false,
            climb: false,
            slope: false,
            jetpack: false,
        }
    }

    /// Builder: enable or disable parkour.
    pub fn with_parkour(mut self, enabled: bool) -> Self {
        self.parkour = enabled;
        self
    }

    /// Builder: enable or disable climbing.
    pub fn with_climb(mut self, enabled: bool) -> Self {
        self.climb = enabled;
        self
    }

    /// Builder: enable or disable slope movement.
    pub fn with_slope(mut self, enabled: bool) -> Self {
        self.slope = enabled;
        self
    }

    /// Builder: enable or disable the jetpack.
    pub fn with_jetpack(mut self, enabled: bool) -> Self {
        self.jetpack = enabled;
        self
    }
}

/// Main plugin for the traversal system.
///
/// This plugin is generic over a physics backend `B` which provides scene
/// queries and applies the motion the controllers produce.
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With the Rapier3D backend:
/// ```rust,ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use msg_traversal::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(TraversalPlugin::<Rapier3dBackend>::new(
///         TraversalModules::default().with_jetpack(false),
///     ))
///     .run();
/// ```
pub struct TraversalPlugin<B: backend::TraversalBackend> {
    modules: TraversalModules,
    _marker: PhantomData<B>,
}

impl<B: backend::TraversalBackend> TraversalPlugin<B> {
    /// Create the plugin with the given modules.
    pub fn new(modules: TraversalModules) -> Self {
        Self {
            modules,
            _marker: PhantomData,
        }
    }
}

impl<B: backend::TraversalBackend> Default for TraversalPlugin<B> {
    fn default() -> Self {
        Self::new(TraversalModules::default())
    }
}

impl<B: backend::TraversalBackend> Plugin for TraversalPlugin<B> {
    fn build(&self, app: &mut App) {
        let modules = self.modules;

        // Register core types
        app.register_type::<TraversalModules>();
        app.register_type::<config::ScannerConfig>();
        app.register_type::<config::ParkourConfig>();
        app.register_type::<config::ClimbConfig>();
        app.register_type::<config::SlopeConfig>();
        app.register_type::<config::JetpackConfig>();
        app.register_type::<host::TraversalCharacter>();
        app.register_type::<intent::TraversalIntent>();
        app.register_type::<slope::SlopeMovement>();
        app.register_type::<jetpack::SlopeJetpack>();
        app.register_type::<state::InParkourAction>();
        app.register_type::<state::Hanging>();
        app.register_type::<state::ClimbingWall>();
        app.register_type::<state::Skiing>();
        app.register_type::<state::TraversalDisabled>();

        app.add_event::<events::TraversalEvent>();
        app.add_event::<events::TraversalCommand>();
        app.init_resource::<climb_point::ClimbPointGraph>();
        app.insert_resource(modules);

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.configure_sets(
            FixedUpdate,
            (
                TraversalSet::Sensors,
                TraversalSet::Decision,
                TraversalSet::Actions,
                TraversalSet::Animation,
                TraversalSet::Physics,
                TraversalSet::Finalize,
            )
                .chain(),
        );

        app.add_systems(
            FixedUpdate,
            systems::validate_setup.before(TraversalSet::Sensors),
        );
        app.add_systems(
            FixedUpdate,
            (systems::apply_intents, systems::handle_commands)
                .chain()
                .in_set(TraversalSet::Decision),
        );

        if modules.parkour {
            app.add_systems(
                FixedUpdate,
                systems::parkour_decision::<B>
                    .after(systems::handle_commands)
                    .in_set(TraversalSet::Decision),
            );
            app.add_systems(
                FixedUpdate,
                systems::parkour_actions::<B>.in_set(TraversalSet::Actions),
            );
            app.add_observer(systems::on_parkour_removed);
        }

        if modules.climb {
            app.add_systems(
                FixedUpdate,
                climb_point::prune_climb_points.in_set(TraversalSet::Sensors),
            );
            app.add_systems(
                FixedUpdate,
                systems::climb_decision::<B>
                    .after(systems::handle_commands)
                    .after(systems::parkour_decision::<B>)
                    .in_set(TraversalSet::Decision),
            );
            app.add_systems(
                FixedUpdate,
                systems::climb_actions::<B>
                    .after(systems::parkour_actions::<B>)
                    .in_set(TraversalSet::Actions),
            );
            app.add_observer(systems::on_climb_removed);
        }

        if modules.parkour || modules.climb {
            app.add_systems(
                FixedUpdate,
                animation::drive_animation_bindings.in_set(TraversalSet::Animation),
            );
        }

        if modules.slope {
            app.add_systems(
                FixedUpdate,
                systems::slope_movement.in_set(TraversalSet::Physics),
            );
            app.add_observer(systems::on_slope_removed);
        }
        if modules.jetpack {
            if modules.slope {
                app.add_systems(
                    FixedUpdate,
                    systems::tick_jetpacks
                        .before(systems::slope_movement)
                        .in_set(TraversalSet::Physics),
                );
            } else {
                warn!("jetpack module needs the slope module; jetpack systems not registered");
            }
        }

        // Sync markers and latch input edges after every fixed tick
        app.add_systems(
            FixedPostUpdate,
            (systems::sync_state_markers, systems::latch_intents).chain(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modules_default_to_everything() {
        let modules = TraversalModules::default();
        assert!(modules.parkour && modules.climb && modules.slope && modules.jetpack);

        let modules = TraversalModules::none().with_slope(true);
        assert!(!modules.parkour && !modules.climb && modules.slope && !modules.jetpack);
    }
}
