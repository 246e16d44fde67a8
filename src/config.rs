//! Traversal configuration components.
//!
//! Every tunable of the scanner, the parkour and climb controllers, the
//! slope integrator and the jetpack lives here. Distances are in world
//! units (meters), angles in degrees, rates per second.

use bevy::prelude::*;

use crate::collision::layers;
use crate::error::{ensure_positive, TraversalConfigError};

/// Configuration for the environment probes.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct ScannerConfig {
    /// Layers obstacles are probed against.
    pub obstacle_mask: u32,
    /// Layers ledges and climbable walls are probed against.
    pub climbable_mask: u32,
    /// Forward range of the ledge probe.
    pub detection_range: f32,
    /// Height above the character origin of the forward ledge probe.
    pub chest_height: f32,
    /// How far above the wall hit the downward ledge probe starts.
    pub ledge_probe_height: f32,
    /// How far behind the wall face the downward ledge probe runs.
    pub ledge_probe_inset: f32,
    /// Offset above the ledge surface of the hand grip point.
    pub hang_point_lift: f32,
    /// Offset above a dropped-onto ledge of its climb-up point.
    pub drop_climb_up_lift: f32,
    /// How far behind the ledge face the climb-up point sits.
    pub climb_up_inset: f32,
    /// Forward offset of the fallback downward probe of the drop check.
    pub drop_forward_offset: f32,
    /// Length of the downward probes of the drop check.
    pub drop_probe_length: f32,
    /// Height above the origin the drop probes start from.
    pub drop_origin_lift: f32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            obstacle_mask: layers::ALL,
            climbable_mask: layers::ALL,
            detection_range: 0.8,
            chest_height: 1.3,
            ledge_probe_height: 1.0,
            ledge_probe_inset: 0.1,
            hang_point_lift: 0.1,
            drop_climb_up_lift: 1.5,
            climb_up_inset: 0.3,
            drop_forward_offset: 0.5,
            drop_probe_length: 1.5,
            drop_origin_lift: 0.1,
        }
    }
}

impl ScannerConfig {
    /// Builder: set the obstacle layer mask.
    pub fn with_obstacle_mask(mut self, mask: u32) -> Self {
        self.obstacle_mask = mask;
        self
    }

    /// Builder: set the climbable layer mask.
    pub fn with_climbable_mask(mut self, mask: u32) -> Self {
        self.climbable_mask = mask;
        self
    }

    /// Builder: set the ledge detection range.
    pub fn with_detection_range(mut self, range: f32) -> Self {
        self.detection_range = range;
        self
    }

    /// Check that the probe lengths are usable.
    pub fn validate(&self) -> Result<(), TraversalConfigError> {
        ensure_positive("detection_range", self.detection_range)?;
        ensure_positive("ledge_probe_height", self.ledge_probe_height)?;
        ensure_positive("drop_probe_length", self.drop_probe_length)
    }
}

/// Animation settings of one animation-matched parkour action.
#[derive(Reflect, Debug, Clone, PartialEq)]
pub struct ActionProfile {
    /// Animator state played for the action.
    pub state: String,
    /// Cross-fade duration into the state, in seconds.
    pub cross_fade: f32,
    /// Normalized time at which root matching starts.
    pub match_start: f32,
    /// Normalized time at which the root reaches the target.
    pub match_end: f32,
}

impl ActionProfile {
    /// Create a profile for `state` matching over `[match_start, match_end]`.
    pub fn new(state: impl Into<String>, match_start: f32, match_end: f32) -> Self {
        Self {
            state: state.into(),
            cross_fade: 0.2,
            match_start,
            match_end,
        }
    }

    /// Builder: set the cross-fade duration.
    pub fn with_cross_fade(mut self, seconds: f32) -> Self {
        self.cross_fade = seconds;
        self
    }

    fn validate(&self) -> Result<(), TraversalConfigError> {
        let valid = (0.0..=1.0).contains(&self.match_start)
            && (0.0..=1.0).contains(&self.match_end)
            && self.match_start <= self.match_end;
        if valid {
            Ok(())
        } else {
            Err(TraversalConfigError::InvalidMatchWindow {
                state: self.state.clone(),
                start: self.match_start,
                end: self.match_end,
            })
        }
    }
}

/// Configuration for the parkour decision engine and its actions.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct ParkourConfig {
    // === Perception ===
    /// Length of the forward obstacle probe.
    pub forward_ray_length: f32,
    /// Height above the origin of the forward obstacle probe.
    pub forward_ray_offset: f32,
    /// How far past the obstacle face the top probe looks down.
    pub top_probe_forward: f32,
    /// Height above the origin the top probe starts from.
    pub top_probe_height: f32,
    /// Clearance above the obstacle top required for a vault.
    pub vault_clearance: f32,

    // === Height bands (first match wins) ===
    /// Obstacles up to this height are stepped onto.
    pub step_up_height: f32,
    /// Obstacles up to this height use the medium step.
    pub medium_step_up_height: f32,
    /// Obstacles up to this height are vaulted when there is space on top.
    pub vault_height: f32,
    /// Obstacles up to this height are climbed.
    pub climb_up_height: f32,
    /// Distance past the obstacle top a vault lands.
    pub vault_landing_offset: f32,

    // === Wall run ===
    /// Minimum horizontal speed to start a wall run.
    pub min_wall_run_speed: f32,
    /// Lower bound (exclusive) of the wall normal angle to up, in degrees.
    pub wall_run_min_angle: f32,
    /// Upper bound (exclusive) of the wall normal angle to up, in degrees.
    pub wall_run_max_angle: f32,
    /// Lateral speed along the wall.
    pub wall_run_speed: f32,
    /// Maximum duration of a wall run, in seconds.
    pub wall_run_duration: f32,
    /// Downward acceleration while wall running.
    pub wall_run_gravity: f32,
    /// Upward speed at the start of a wall run.
    pub wall_run_initial_lift: f32,
    /// Length of the sideways probe that keeps the wall in contact.
    pub wall_run_probe_distance: f32,
    /// When true the run goes toward the character's right side of the wall
    /// tangent; when false toward its left.
    pub wall_run_follow_right: bool,

    // === Vertical jump ===
    /// Whether a jump with nothing to traverse plays the vertical jump.
    pub vertical_jump_enabled: bool,
    /// Delay after the host jump resolves before another action may start.
    pub vertical_jump_settle: f32,

    // === Watchdog ===
    /// Upper bound on an animation-matched action before it is cancelled.
    pub max_action_duration: f32,

    // === Animation ===
    /// Step up onto low obstacles.
    pub step_up: ActionProfile,
    /// Step up onto medium obstacles.
    pub medium_step_up: ActionProfile,
    /// Vault over an obstacle, landing past it.
    pub vault_over: ActionProfile,
    /// Vault onto an obstacle, landing on top.
    pub vault_on: ActionProfile,
    /// Climb up onto a tall obstacle.
    pub climb_up: ActionProfile,
    /// State played while wall running.
    pub wall_run_state: String,
    /// Trigger set for the vertical jump.
    pub jump_trigger: String,
}

impl Default for ParkourConfig {
    fn default() -> Self {
        Self {
            forward_ray_length: 0.8,
            forward_ray_offset: 0.25,
            top_probe_forward: 0.2,
            top_probe_height: 3.0,
            vault_clearance: 0.3,

            step_up_height: 0.4,
            medium_step_up_height: 0.8,
            vault_height: 1.2,
            climb_up_height: 2.2,
            vault_landing_offset: 1.5,

            min_wall_run_speed: 5.0,
            wall_run_min_angle: 70.0,
            wall_run_max_angle: 110.0,
            wall_run_speed: 6.0,
            wall_run_duration: 1.2,
            wall_run_gravity: 4.0,
            wall_run_initial_lift: 1.5,
            wall_run_probe_distance: 1.0,
            wall_run_follow_right: true,

            vertical_jump_enabled: true,
            vertical_jump_settle: 0.2,

            max_action_duration: 5.0,

            step_up: ActionProfile::new("StepUp", 0.3, 0.8),
            medium_step_up: ActionProfile::new("MediumStepUp", 0.2, 0.7),
            vault_over: ActionProfile::new("VaultOver", 0.1, 0.9),
            vault_on: ActionProfile::new("VaultOn", 0.1, 0.6),
            climb_up: ActionProfile::new("ClimbUp", 0.0, 0.9),
            wall_run_state: "WallRun".to_string(),
            jump_trigger: "Jump".to_string(),
        }
    }
}

impl ParkourConfig {
    /// Builder: set the four height band limits.
    pub fn with_height_bands(mut self, step_up: f32, medium_step_up: f32, vault: f32, climb_up: f32) -> Self {
        self.step_up_height = step_up;
        self.medium_step_up_height = medium_step_up;
        self.vault_height = vault;
        self.climb_up_height = climb_up;
        self
    }

    /// Builder: set the minimum wall-run speed.
    pub fn with_min_wall_run_speed(mut self, speed: f32) -> Self {
        self.min_wall_run_speed = speed;
        self
    }

    /// Builder: set the vault landing offset.
    pub fn with_vault_landing_offset(mut self, offset: f32) -> Self {
        self.vault_landing_offset = offset;
        self
    }

    /// Builder: set the wall-run duration.
    pub fn with_wall_run_duration(mut self, seconds: f32) -> Self {
        self.wall_run_duration = seconds;
        self
    }

    /// Builder: set the action watchdog.
    pub fn with_max_action_duration(mut self, seconds: f32) -> Self {
        self.max_action_duration = seconds;
        self
    }

    /// Check band ordering, match windows and durations.
    pub fn validate(&self) -> Result<(), TraversalConfigError> {
        ensure_positive("forward_ray_length", self.forward_ray_length)?;
        ensure_positive("step_up_height", self.step_up_height)?;
        ensure_positive("wall_run_duration", self.wall_run_duration)?;
        ensure_positive("max_action_duration", self.max_action_duration)?;

        let bands = [
            ("step_up_height", self.step_up_height),
            ("medium_step_up_height", self.medium_step_up_height),
            ("vault_height", self.vault_height),
            ("climb_up_height", self.climb_up_height),
        ];
        for pair in bands.windows(2) {
            if pair[1].1 < pair[0].1 {
                return Err(TraversalConfigError::UnorderedHeightBands {
                    lower: pair[0].0,
                    upper: pair[1].0,
                });
            }
        }

        let angles_valid = self.wall_run_min_angle >= 0.0
            && self.wall_run_max_angle <= 180.0
            && self.wall_run_min_angle < self.wall_run_max_angle;
        if !angles_valid {
            return Err(TraversalConfigError::InvalidAngleRange {
                min: self.wall_run_min_angle,
                max: self.wall_run_max_angle,
            });
        }

        for profile in [
            &self.step_up,
            &self.medium_step_up,
            &self.vault_over,
            &self.vault_on,
            &self.climb_up,
        ] {
            profile.validate()?;
        }
        Ok(())
    }
}

/// Configuration for ledge hanging and wall climbing.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct ClimbConfig {
    // === Stamina ===
    /// Stamina capacity.
    pub max_stamina: f32,
    /// Stamina lost per second while hanging.
    pub stamina_drain_rate: f32,
    /// Stamina regained per second while not hanging.
    pub stamina_regen_rate: f32,

    // === Hang pose ===
    /// Vertical distance from the grip point down to the hanging root.
    pub hang_reach: f32,
    /// Horizontal distance of the hanging root from the ledge face.
    pub hang_wall_distance: f32,
    /// Length of the brace probe toward the wall from the hanging root.
    pub wall_check_distance: f32,
    /// Height above the hanging root of the brace probe.
    pub wall_check_height: f32,
    /// Existing points closer than this are reused instead of synthesizing.
    pub point_reuse_distance: f32,
    /// Synthesized points closer than this to each other are linked.
    pub point_link_distance: f32,
    /// Synthesized points kept per ledge before the nearest is moved instead.
    pub max_synthesized_points: usize,

    // === Transitions ===
    /// Duration of the climb up from a hang.
    pub climb_up_duration: f32,
    /// Duration of one shimmy between neighboring points.
    pub shimmy_duration: f32,
    /// Lateral input below this magnitude is ignored.
    pub lateral_dead_zone: f32,
    /// Vertical input above this starts the climb up.
    pub climb_up_input: f32,
    /// Delay after leaving a hang before a new grab is accepted.
    pub regrab_delay: f32,

    // === Wall climbing ===
    /// Speed of free wall climbing.
    pub climb_speed: f32,
    /// Forward reach of the climbable wall probe.
    pub climb_reach: f32,

    // === Edge drop ===
    /// Forward distance probed for an edge when dropping to a hang.
    pub edge_probe_forward: f32,
    /// Depth below the standing surface of the edge face probe.
    pub edge_probe_depth: f32,

    // === Animation ===
    /// State played when hanging with a wall behind the legs.
    pub braced_hang_state: String,
    /// State played when hanging freely.
    pub free_hang_state: String,
    /// State played when climbing up from a hang.
    pub climb_up_state: String,
    /// State played while shimmying left.
    pub shimmy_left_state: String,
    /// State played while shimmying right.
    pub shimmy_right_state: String,
    /// State played while climbing a wall.
    pub wall_climb_state: String,
    /// Cross-fade used by every climb state.
    pub cross_fade: f32,
}

impl Default for ClimbConfig {
    fn default() -> Self {
        Self {
            max_stamina: 100.0,
            stamina_drain_rate: 10.0,
            stamina_regen_rate: 20.0,

            hang_reach: 1.9,
            hang_wall_distance: 0.35,
            wall_check_distance: 0.8,
            wall_check_height: 0.6,
            point_reuse_distance: 0.75,
            point_link_distance: 1.6,
            max_synthesized_points: 8,

            climb_up_duration: 0.8,
            shimmy_duration: 0.35,
            lateral_dead_zone: 0.3,
            climb_up_input: 0.5,
            regrab_delay: 0.3,

            climb_speed: 2.0,
            climb_reach: 0.8,

            edge_probe_forward: 0.6,
            edge_probe_depth: 0.3,

            braced_hang_state: "BracedHang".to_string(),
            free_hang_state: "FreeHang".to_string(),
            climb_up_state: "ClimbUpFromHang".to_string(),
            shimmy_left_state: "ShimmyLeft".to_string(),
            shimmy_right_state: "ShimmyRight".to_string(),
            wall_climb_state: "WallClimb".to_string(),
            cross_fade: 0.15,
        }
    }
}

impl ClimbConfig {
    /// Builder: set stamina capacity and rates.
    pub fn with_stamina(mut self, max: f32, drain_rate: f32, regen_rate: f32) -> Self {
        self.max_stamina = max;
        self.stamina_drain_rate = drain_rate;
        self.stamina_regen_rate = regen_rate;
        self
    }

    /// Builder: set the wall climbing speed.
    pub fn with_climb_speed(mut self, speed: f32) -> Self {
        self.climb_speed = speed;
        self
    }

    /// Builder: set the transition durations.
    pub fn with_durations(mut self, climb_up: f32, shimmy: f32) -> Self {
        self.climb_up_duration = climb_up;
        self.shimmy_duration = shimmy;
        self
    }

    /// Builder: set the re-grab delay.
    pub fn with_regrab_delay(mut self, seconds: f32) -> Self {
        self.regrab_delay = seconds;
        self
    }

    /// Check stamina and transition settings.
    pub fn validate(&self) -> Result<(), TraversalConfigError> {
        ensure_positive("max_stamina", self.max_stamina)?;
        ensure_positive("stamina_drain_rate", self.stamina_drain_rate)?;
        ensure_positive("climb_up_duration", self.climb_up_duration)?;
        ensure_positive("shimmy_duration", self.shimmy_duration)?;
        ensure_positive("max_synthesized_points", self.max_synthesized_points as f32)?;
        ensure_positive("climb_speed", self.climb_speed)
    }
}

/// Configuration for the slope/ski movement integrator.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct SlopeConfig {
    // === Walking ===
    /// Target speed of full walking input.
    pub walk_speed: f32,
    /// Rate at which walking velocity approaches the input target.
    pub ground_friction: f32,
    /// Horizontal speed above which grounded movement becomes skiing.
    pub min_speed_to_ski: f32,
    /// Hard horizontal speed cap (0 = uncapped).
    pub max_speed: f32,

    // === Slopes ===
    /// Slope angle (degrees) above which downhill acceleration applies.
    pub min_slope_angle_for_boost: f32,
    /// Base acceleration along the slope at 45 degrees.
    pub slope_acceleration: f32,
    /// Multiplier of the slope acceleration when moving downhill.
    pub downhill_speed_gain: f32,
    /// Multiplier of the slope deceleration when moving uphill.
    pub uphill_momentum_retention: f32,

    // === Skiing ===
    /// Speed bleed per second at a 180 degree turn.
    pub turning_friction: f32,
    /// Rate at which the turning penalty blends toward its target.
    pub turn_blend_rate: f32,
    /// Base ski friction per second (doubled on flat ground).
    pub ski_friction: f32,
    /// Steering acceleration at zero speed.
    pub steer_force: f32,
    /// Fraction of steering authority lost at the speed cap.
    pub steering_speed_falloff: f32,
    /// Backward input beyond this brakes.
    pub brake_threshold: f32,
    /// Braking speed bleed per second.
    pub brake_strength: f32,

    // === Vertical ===
    /// Upward speed set on a jump press.
    pub jump_force: f32,
    /// Vertical speed kept while grounded and falling.
    pub ground_stick: f32,

    // === Air ===
    /// Air acceleration scale.
    pub air_acceleration: f32,
    /// Air control multiplier right after leaving the ground.
    pub air_control_after_leaving: f32,
    /// Air control multiplier once airborne.
    pub air_control: f32,
}

impl Default for SlopeConfig {
    fn default() -> Self {
        Self {
            walk_speed: 6.0,
            ground_friction: 10.0,
            min_speed_to_ski: 8.0,
            max_speed: 25.0,

            min_slope_angle_for_boost: 5.0,
            slope_acceleration: 9.81,
            downhill_speed_gain: 1.2,
            uphill_momentum_retention: 0.4,

            turning_friction: 1.5,
            turn_blend_rate: 4.0,
            ski_friction: 0.05,
            steer_force: 12.0,
            steering_speed_falloff: 0.8,
            brake_threshold: 0.5,
            brake_strength: 1.5,

            jump_force: 6.0,
            ground_stick: -2.0,

            air_acceleration: 10.0,
            air_control_after_leaving: 0.6,
            air_control: 0.3,
        }
    }
}

impl SlopeConfig {
    /// Builder: set the walking speed.
    pub fn with_walk_speed(mut self, speed: f32) -> Self {
        self.walk_speed = speed;
        self
    }

    /// Builder: set the hard speed cap (0 = uncapped).
    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed;
        self
    }

    /// Builder: set the ski threshold speed.
    pub fn with_min_speed_to_ski(mut self, speed: f32) -> Self {
        self.min_speed_to_ski = speed;
        self
    }

    /// Builder: set the downhill/uphill slope multipliers.
    pub fn with_slope_response(mut self, downhill_gain: f32, uphill_retention: f32) -> Self {
        self.downhill_speed_gain = downhill_gain;
        self.uphill_momentum_retention = uphill_retention;
        self
    }

    /// Check that the integrator rates are usable.
    pub fn validate(&self) -> Result<(), TraversalConfigError> {
        ensure_positive("walk_speed", self.walk_speed)?;
        ensure_positive("ground_friction", self.ground_friction)?;
        if self.max_speed < 0.0 {
            return Err(TraversalConfigError::NonPositive {
                field: "max_speed",
                value: self.max_speed,
            });
        }
        Ok(())
    }
}

/// Configuration for the jetpack resource model.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct JetpackConfig {
    /// Fuel capacity.
    pub max_fuel: f32,
    /// Fuel consumed per second of thrust.
    pub fuel_consume_rate: f32,
    /// Fuel regained per second once the refill delay has passed.
    pub fuel_refill_rate: f32,
    /// Seconds since last use before fuel starts refilling.
    pub refill_delay: f32,
    /// Upward acceleration at low vertical speed.
    pub thrust_force: f32,
    /// Vertical speed at and above which thrust is zero.
    pub max_vertical_speed: f32,
}

impl Default for JetpackConfig {
    fn default() -> Self {
        Self {
            max_fuel: 100.0,
            fuel_consume_rate: 25.0,
            fuel_refill_rate: 15.0,
            refill_delay: 1.0,
            thrust_force: 20.0,
            max_vertical_speed: 8.0,
        }
    }
}

impl JetpackConfig {
    /// Builder: set fuel capacity and rates.
    pub fn with_fuel(mut self, max: f32, consume_rate: f32, refill_rate: f32) -> Self {
        self.max_fuel = max;
        self.fuel_consume_rate = consume_rate;
        self.fuel_refill_rate = refill_rate;
        self
    }

    /// Builder: set the thrust and its vertical speed limit.
    pub fn with_thrust(mut self, force: f32, max_vertical_speed: f32) -> Self {
        self.thrust_force = force;
        self.max_vertical_speed = max_vertical_speed;
        self
    }

    /// Check capacity and thrust limits.
    pub fn validate(&self) -> Result<(), TraversalConfigError> {
        ensure_positive("max_fuel", self.max_fuel)?;
        ensure_positive("max_vertical_speed", self.max_vertical_speed)
    }
}
