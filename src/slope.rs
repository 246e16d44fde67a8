//! Slope and ski movement.
//!
//! [`SlopeMovement`] integrates a character's velocity every physics tick.
//! Three regimes are distinguished: walking on ground, skiing on ground once
//! horizontal speed passes `min_speed_to_ski`, and airborne. Every regime
//! ends with the hard horizontal speed cap.

use bevy::prelude::*;

use crate::config::SlopeConfig;

/// Slope angle (degrees) at which the slope acceleration is unscaled.
const REFERENCE_SLOPE_ANGLE: f32 = 45.0;

/// Integrator input for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlopeInput {
    /// Desired horizontal direction in world space, length up to 1.
    pub direction: Vec3,
    /// Jump went down this tick.
    pub jump_pressed: bool,
    /// Jump is held.
    pub jump_held: bool,
}

/// Ground state seen by the integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeGround {
    /// Whether the character stands on ground.
    pub grounded: bool,
    /// Normal of the ground surface.
    pub normal: Vec3,
}

impl SlopeGround {
    /// In the air.
    pub const AIRBORNE: Self = Self {
        grounded: false,
        normal: Vec3::Y,
    };

    /// On ground with `normal`.
    pub fn on(normal: Vec3) -> Self {
        Self {
            grounded: true,
            normal: normal.normalize_or(Vec3::Y),
        }
    }

    /// Angle of the ground from horizontal, in degrees.
    pub fn slope_angle(&self) -> f32 {
        self.normal.angle_between(Vec3::Y).to_degrees()
    }
}

/// Continuous velocity integrator for walking, skiing and air movement.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
#[require(SlopeConfig)]
pub struct SlopeMovement {
    was_grounded: bool,
    turn_penalty: f32,
    current_speed: f32,
    skiing: bool,
    jumped: bool,
}

impl SlopeMovement {
    /// Create an integrator at rest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last tick was a grounded skiing tick.
    pub fn is_skiing(&self) -> bool {
        self.skiing
    }

    /// Horizontal speed after the last tick.
    pub fn current_speed(&self) -> f32 {
        self.current_speed
    }

    /// Whether the last tick started a jump.
    pub fn jumped(&self) -> bool {
        self.jumped
    }

    /// Integrate `velocity` over `dt`.
    ///
    /// `thrust` is the jetpack acceleration when a jetpack is active; it
    /// replaces gravity in the air.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        dt: f32,
        velocity: Vec3,
        input: SlopeInput,
        ground: SlopeGround,
        gravity: f32,
        thrust: Option<f32>,
        config: &SlopeConfig,
    ) -> Vec3 {
        let direction = horizontal(input.direction).clamp_length_max(1.0);
        let mut planar = horizontal(velocity);
        let mut vertical = velocity.y;
        self.jumped = false;

        if ground.grounded {
            if planar.length() > config.min_speed_to_ski {
                planar = self.ski(dt, planar, direction, ground, config);
            } else {
                self.turn_penalty = 0.0;
                let target = direction * config.walk_speed;
                let blend = 1.0 - (-config.ground_friction * dt).exp();
                planar = planar.lerp(target, blend);
            }

            if input.jump_pressed {
                vertical = config.jump_force;
                self.jumped = true;
            } else if !input.jump_held && vertical <= 0.0 {
                vertical = config.ground_stick;
            }
        } else {
            planar = cap_speed(planar, config.max_speed);
            match thrust {
                Some(thrust) => vertical += thrust * dt,
                None => vertical -= gravity * dt,
            }
            let control = if self.was_grounded {
                config.air_control_after_leaving
            } else {
                config.air_control
            };
            planar += direction * config.air_acceleration * control * dt;
        }

        planar = cap_speed(planar, config.max_speed);
        self.was_grounded = ground.grounded;
        self.current_speed = planar.length();
        self.skiing = ground.grounded && self.current_speed > config.min_speed_to_ski;
        planar + Vec3::Y * vertical
    }

    fn ski(&mut self, dt: f32, planar: Vec3, direction: Vec3, ground: SlopeGround, config: &SlopeConfig) -> Vec3 {
        let mut planar = cap_speed(planar, config.max_speed);

        let angle = ground.slope_angle();
        let on_slope = angle > config.min_slope_angle_for_boost;
        if on_slope {
            let downhill = horizontal(ground.normal).normalize_or_zero();
            let steepness = angle / REFERENCE_SLOPE_ANGLE;
            let response = if planar.dot(downhill) >= 0.0 {
                config.downhill_speed_gain
            } else {
                config.uphill_momentum_retention
            };
            planar += downhill * config.slope_acceleration * steepness * response * dt;
        }

        let speed = planar.length();
        let heading = planar.normalize_or_zero();

        // Turning penalty blends toward the angle between heading and input.
        let target_penalty = if direction.length_squared() > 1e-6 && heading != Vec3::ZERO {
            let turn = heading.angle_between(direction.normalize()).to_degrees();
            config.turning_friction * (turn / 180.0)
        } else {
            0.0
        };
        let blend = (config.turn_blend_rate * dt).min(1.0);
        self.turn_penalty += (target_penalty - self.turn_penalty) * blend;

        let friction = if on_slope {
            config.ski_friction
        } else {
            config.ski_friction * 2.0
        };
        let mut speed = speed * (1.0 - (self.turn_penalty + friction) * dt).max(0.0);

        let along = direction.dot(heading);
        if along < -config.brake_threshold {
            speed *= (1.0 - config.brake_strength * dt).max(0.0);
        }

        // Steering bends the heading; authority shrinks toward the cap.
        let authority = if config.max_speed > 0.0 {
            1.0 - config.steering_speed_falloff * (speed / config.max_speed).min(1.0)
        } else {
            1.0
        };
        let lateral = direction - heading * along;
        let steered = (heading * speed + lateral * config.steer_force * authority * dt).normalize_or_zero();
        planar = steered * speed;

        cap_speed(planar, config.max_speed)
    }
}

fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Rescale the horizontal part of `planar` to `max_speed` (0 = uncapped).
fn cap_speed(planar: Vec3, max_speed: f32) -> Vec3 {
    if max_speed > 0.0 {
        planar.clamp_length_max(max_speed)
    } else {
        planar
    }
}
