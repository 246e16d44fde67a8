//! Ledge hanging and wall climbing.
//!
//! [`ClimbController`] is a small state machine: hanging from a climb point
//! (with shimmying along the point graph and climbing up onto the ledge) and
//! free wall climbing. Hanging drains stamina; running out drops the
//! character immediately. Every path that took host control through the
//! start hook hands it back through the end hook exactly once.

use bevy::prelude::*;

use crate::climb_point::{ledge_anchors, ClimbPointGraph, ClimbPointId};
use crate::config::ClimbConfig;
use crate::host::{look_rotation, TraversalHost};
use crate::scanner::{flatten, EnvironmentScanner, LedgeData, WallCheckData};
use crate::sequence::{Delay, Interpolation, SequenceStatus};

/// Height above the feet of the wall probe used while climbing.
const WALL_CLIMB_PROBE_HEIGHT: f32 = 1.0;

/// Climb sub-state.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClimbState {
    /// Not climbing.
    #[default]
    None,
    /// Hanging from a climb point.
    Hanging,
    /// Hanging while moving to a neighboring point.
    Shimmying,
    /// Pulling up onto a ledge.
    ClimbingUp,
    /// Climbing a wall freely.
    Climbing,
}

/// Climb input for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClimbInput {
    /// Lateral axis (-1 left, +1 right).
    pub lateral: f32,
    /// Vertical axis (-1 down, +1 up).
    pub vertical: f32,
    /// Climb up from a hang.
    pub up_pressed: bool,
    /// Let go.
    pub drop_pressed: bool,
    /// Finish a wall climb at the top.
    pub finish_pressed: bool,
}

/// Why a hang ended.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangEndReason {
    /// The player let go.
    Dropped,
    /// Stamina ran out.
    StaminaDepleted,
    /// The ledge disappeared.
    LedgeLost,
    /// The hang was cancelled from outside.
    ForceStopped,
}

/// A discrete climb transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClimbEvent {
    /// A hang started on a point.
    HangStarted {
        /// The point grabbed.
        point: ClimbPointId,
        /// Whether the legs hang freely.
        free_hang: bool,
    },
    /// A hang ended without climbing up.
    HangEnded {
        /// Why it ended.
        reason: HangEndReason,
    },
    /// The character shimmied to a neighboring point.
    Shimmied {
        /// The new current point.
        point: ClimbPointId,
    },
    /// A climb-up onto a ledge ended.
    ClimbUpEnded {
        /// False when it was cancelled.
        completed: bool,
    },
    /// A wall climb started.
    WallClimbStarted,
    /// A wall climb ended.
    WallClimbEnded {
        /// True when finished at the top, false when dropped.
        finished: bool,
    },
}

/// Hang and climb state of a character.
#[derive(Component, Debug, Clone)]
#[require(ClimbConfig)]
pub struct ClimbController {
    state: ClimbState,
    stamina: f32,
    current_point: Option<ClimbPointId>,
    transition: Option<Interpolation>,
    wall_normal: Vec3,
    regrab: Option<Delay>,
}

impl Default for ClimbController {
    fn default() -> Self {
        Self::new(&ClimbConfig::default())
    }
}

impl ClimbController {
    /// Create an idle controller with full stamina.
    pub fn new(config: &ClimbConfig) -> Self {
        Self {
            state: ClimbState::None,
            stamina: config.max_stamina,
            current_point: None,
            transition: None,
            wall_normal: Vec3::ZERO,
            regrab: None,
        }
    }

    /// Current sub-state.
    pub fn state(&self) -> ClimbState {
        self.state
    }

    /// Whether the character hangs from a ledge.
    pub fn is_hanging(&self) -> bool {
        matches!(self.state, ClimbState::Hanging | ClimbState::Shimmying)
    }

    /// Whether the character climbs a wall.
    pub fn is_climbing(&self) -> bool {
        self.state == ClimbState::Climbing
    }

    /// Whether the controller holds host control.
    pub fn is_engaged(&self) -> bool {
        self.state != ClimbState::None
    }

    /// Remaining stamina.
    pub fn stamina(&self) -> f32 {
        self.stamina
    }

    /// Point the character hangs from.
    pub fn current_point(&self) -> Option<ClimbPointId> {
        self.current_point
    }

    /// Whether a new grab is accepted (the re-grab delay has passed).
    pub fn can_grab(&self) -> bool {
        self.regrab.is_none()
    }

    fn can_start(&self, host: &impl TraversalHost) -> bool {
        !self.is_engaged() && self.can_grab() && !host.prevent_action()
    }

    /// Probe for a wall behind a hanging character.
    ///
    /// Casts from `position` (the hanging root) toward the wall; a hit means
    /// the legs can brace against it.
    pub fn check_wall(
        scanner: &EnvironmentScanner,
        position: Vec3,
        toward_wall: Vec3,
        config: &ClimbConfig,
    ) -> WallCheckData {
        scanner.wall_check(
            position + Vec3::Y * config.wall_check_height,
            toward_wall,
            config.wall_check_distance,
        )
    }

    /// Start hanging from `point`.
    ///
    /// Rejected while already hanging or climbing, during the re-grab delay,
    /// without stamina, or when the host vetoes actions.
    pub fn start_hanging(
        &mut self,
        point: ClimbPointId,
        graph: &ClimbPointGraph,
        host: &mut impl TraversalHost,
        config: &ClimbConfig,
    ) -> Option<ClimbEvent> {
        if !self.can_start(host) || self.stamina <= 0.0 {
            return None;
        }
        let climb_point = graph.get(point)?;

        host.on_action_start();
        let state = if climb_point.free_hang {
            &config.free_hang_state
        } else {
            &config.braced_hang_state
        };
        host.animator().play(state, config.cross_fade);

        self.transition = Some(Interpolation::new(
            (host.position(), host.rotation()),
            (climb_point.mount.position, climb_point.mount.rotation),
            config.shimmy_duration,
        ));
        self.state = ClimbState::Hanging;
        self.current_point = Some(point);
        debug!("hang started on {point:?}");
        Some(ClimbEvent::HangStarted {
            point,
            free_hang: climb_point.free_hang,
        })
    }

    /// Let go of the ledge.
    pub fn stop_hanging(
        &mut self,
        host: &mut impl TraversalHost,
        reason: HangEndReason,
        config: &ClimbConfig,
    ) -> Option<ClimbEvent> {
        if !self.is_hanging() {
            return None;
        }
        self.release(host, config);
        debug!("hang ended: {reason:?}");
        Some(ClimbEvent::HangEnded { reason })
    }

    fn release(&mut self, host: &mut impl TraversalHost, config: &ClimbConfig) {
        self.state = ClimbState::None;
        self.current_point = None;
        self.transition = None;
        self.regrab = Some(Delay::new(config.regrab_delay));
        host.on_action_end();
    }

    /// Leave the hang and pull up onto the ledge.
    pub fn climb_up_from_hang(
        &mut self,
        graph: &ClimbPointGraph,
        host: &mut impl TraversalHost,
        config: &ClimbConfig,
    ) -> bool {
        if !self.is_hanging() {
            return false;
        }
        let Some(point) = self.current_point.and_then(|id| graph.get(id)) else {
            return false;
        };
        host.animator().play(&config.climb_up_state, config.cross_fade);
        self.transition = Some(Interpolation::new(
            (host.position(), host.rotation()),
            (point.dismount.position, point.dismount.rotation),
            config.climb_up_duration,
        ));
        self.state = ClimbState::ClimbingUp;
        self.current_point = None;
        true
    }

    /// Move to the neighbor of the current point lying in `direction`.
    ///
    /// Does nothing when no neighbor lies that way.
    pub fn shimmy(
        &mut self,
        direction: Vec3,
        graph: &ClimbPointGraph,
        host: &mut impl TraversalHost,
        config: &ClimbConfig,
    ) -> Option<ClimbEvent> {
        if self.state != ClimbState::Hanging || self.transition.is_some() {
            return None;
        }
        let next = graph.neighbor_in_direction(self.current_point?, direction)?;
        let point = graph.get(next)?;

        let state = if direction.dot(host.right()) >= 0.0 {
            &config.shimmy_right_state
        } else {
            &config.shimmy_left_state
        };
        host.animator().play(state, config.cross_fade);
        self.transition = Some(Interpolation::new(
            (host.position(), host.rotation()),
            (point.mount.position, point.mount.rotation),
            config.shimmy_duration,
        ));
        self.state = ClimbState::Shimmying;
        self.current_point = Some(next);
        Some(ClimbEvent::Shimmied { point: next })
    }

    /// Start climbing the climbable wall ahead.
    pub fn start_climbing(
        &mut self,
        scanner: &EnvironmentScanner,
        host: &mut impl TraversalHost,
        config: &ClimbConfig,
    ) -> Option<ClimbEvent> {
        if !self.can_start(host) {
            return None;
        }
        let wall = scanner.climbable_check(
            host.position(),
            host.forward(),
            WALL_CLIMB_PROBE_HEIGHT,
            config.climb_reach,
        )?;

        host.on_action_start();
        host.set_rotation(look_rotation(-wall.normal));
        host.animator().play(&config.wall_climb_state, config.cross_fade);
        self.wall_normal = wall.normal;
        self.state = ClimbState::Climbing;
        debug!("wall climb started");
        Some(ClimbEvent::WallClimbStarted)
    }

    /// Translate along the wall from climb input.
    ///
    /// Losing the wall drops the character.
    pub fn update_climbing(
        &mut self,
        dt: f32,
        input: ClimbInput,
        scanner: &EnvironmentScanner,
        host: &mut impl TraversalHost,
        config: &ClimbConfig,
    ) -> Option<ClimbEvent> {
        if !self.is_climbing() {
            return None;
        }
        let Some(wall) = scanner.climbable_check(
            host.position(),
            -self.wall_normal,
            WALL_CLIMB_PROBE_HEIGHT,
            config.climb_reach,
        ) else {
            return self.stop_climbing(host, config);
        };
        self.wall_normal = wall.normal;

        let axis = Vec2::new(input.lateral, input.vertical).clamp_length_max(1.0);
        let delta = (host.right() * axis.x + Vec3::Y * axis.y) * config.climb_speed * dt;
        host.animator().set_float("ClimbSpeed", axis.length());
        host.move_by(delta);
        None
    }

    /// End a wall climb at the top.
    ///
    /// With a ledge ahead the character pulls up onto it; otherwise control
    /// returns where it is.
    pub fn finish_climbing(
        &mut self,
        scanner: &EnvironmentScanner,
        host: &mut impl TraversalHost,
        config: &ClimbConfig,
    ) -> Option<ClimbEvent> {
        if !self.is_climbing() {
            return None;
        }
        let ledge = scanner
            .ledge_check(host.position(), host.forward())
            .filter(|l| l.is_valid);
        match ledge {
            Some(ledge) => {
                host.animator().play(&config.climb_up_state, config.cross_fade);
                self.transition = Some(Interpolation::new(
                    (host.position(), host.rotation()),
                    (ledge.climb_up_point, host.rotation()),
                    config.climb_up_duration,
                ));
                self.state = ClimbState::ClimbingUp;
            }
            None => {
                self.state = ClimbState::None;
                host.on_action_end();
            }
        }
        debug!("wall climb finished");
        Some(ClimbEvent::WallClimbEnded { finished: true })
    }

    /// Drop off the wall.
    pub fn stop_climbing(&mut self, host: &mut impl TraversalHost, config: &ClimbConfig) -> Option<ClimbEvent> {
        if !self.is_climbing() {
            return None;
        }
        self.release(host, config);
        debug!("wall climb dropped");
        Some(ClimbEvent::WallClimbEnded { finished: false })
    }

    /// Grab the ledge ahead, if any.
    pub fn try_grab_ledge(
        &mut self,
        scanner: &EnvironmentScanner,
        graph: &mut ClimbPointGraph,
        host: &mut impl TraversalHost,
        config: &ClimbConfig,
    ) -> Option<ClimbEvent> {
        if !self.can_start(host) {
            return None;
        }
        let ledge = scanner
            .ledge_check(host.position(), host.forward())
            .filter(|l| l.is_valid)?;
        self.hang_on(ledge, scanner, graph, host, config)
    }

    /// Step off the edge the character stands on and hang from it.
    pub fn try_drop_to_hang(
        &mut self,
        scanner: &EnvironmentScanner,
        graph: &mut ClimbPointGraph,
        host: &mut impl TraversalHost,
        config: &ClimbConfig,
    ) -> Option<ClimbEvent> {
        if !self.can_start(host) || !host.is_grounded() {
            return None;
        }
        let position = host.position();
        let forward = flatten(host.forward())?;
        let beyond = position + forward * config.edge_probe_forward;

        // Ground continuing ahead means there is no edge to drop from.
        let lift = scanner.config().drop_origin_lift;
        if scanner
            .surface_below(beyond + Vec3::Y * lift, lift + config.edge_probe_depth)
            .is_some()
        {
            return None;
        }

        let top = scanner.drop_ledge_check(position, forward)?;
        let face = scanner.wall_check(
            beyond - Vec3::Y * config.edge_probe_depth,
            -forward,
            config.edge_probe_forward,
        );
        if !face.is_wall {
            return None;
        }
        let face_point = beyond - Vec3::Y * config.edge_probe_depth - forward * face.distance_to_wall;
        let grip = Vec3::new(face_point.x, top.hang_point.y, face_point.z);

        let ledge = LedgeData {
            hit_point: top.hit_point,
            hit_normal: forward,
            hang_point: grip,
            climb_up_point: position,
            is_valid: true,
            entity: top.entity,
        };
        self.hang_on(ledge, scanner, graph, host, config)
    }

    fn hang_on(
        &mut self,
        ledge: LedgeData,
        scanner: &EnvironmentScanner,
        graph: &mut ClimbPointGraph,
        host: &mut impl TraversalHost,
        config: &ClimbConfig,
    ) -> Option<ClimbEvent> {
        let Some(entity) = ledge.entity else {
            debug!("ledge without an owning entity, not grabbing");
            return None;
        };
        let (mount, _) = ledge_anchors(ledge.hang_point, ledge.climb_up_point, ledge.hit_normal, config);
        let wall = Self::check_wall(scanner, mount.position, -ledge.hit_normal, config);
        let point = graph.get_or_create_point(entity, &ledge, !wall.is_wall, config);
        self.start_hanging(point, graph, host, config)
    }

    /// Step the controller by `dt`.
    ///
    /// While hanging this drains stamina and reacts to input; otherwise it
    /// regenerates stamina and counts down the re-grab delay.
    pub fn tick(
        &mut self,
        dt: f32,
        input: ClimbInput,
        scanner: &EnvironmentScanner,
        graph: &ClimbPointGraph,
        host: &mut impl TraversalHost,
        config: &ClimbConfig,
    ) -> Option<ClimbEvent> {
        if let Some(delay) = self.regrab.as_mut() {
            if delay.tick(dt).is_finished() {
                self.regrab = None;
            }
        }

        match self.state {
            ClimbState::None => {
                self.stamina = (self.stamina + config.stamina_regen_rate * dt).min(config.max_stamina);
                None
            }
            ClimbState::Hanging | ClimbState::Shimmying => self.tick_hanging(dt, input, graph, host, config),
            ClimbState::ClimbingUp => {
                self.stamina = (self.stamina + config.stamina_regen_rate * dt).min(config.max_stamina);
                let done = self
                    .transition
                    .as_mut()
                    .map_or(SequenceStatus::Completed, |t| t.tick(dt, host));
                if !done.is_finished() {
                    return None;
                }
                self.transition = None;
                self.state = ClimbState::None;
                self.regrab = Some(Delay::new(config.regrab_delay));
                host.on_action_end();
                debug!("climb up finished");
                Some(ClimbEvent::ClimbUpEnded { completed: true })
            }
            ClimbState::Climbing => {
                self.stamina = (self.stamina + config.stamina_regen_rate * dt).min(config.max_stamina);
                if input.drop_pressed {
                    self.stop_climbing(host, config)
                } else if input.finish_pressed {
                    self.finish_climbing(scanner, host, config)
                } else {
                    self.update_climbing(dt, input, scanner, host, config)
                }
            }
        }
    }

    fn tick_hanging(
        &mut self,
        dt: f32,
        input: ClimbInput,
        graph: &ClimbPointGraph,
        host: &mut impl TraversalHost,
        config: &ClimbConfig,
    ) -> Option<ClimbEvent> {
        self.stamina = (self.stamina - config.stamina_drain_rate * dt).max(0.0);
        if self.stamina <= 0.0 {
            return self.stop_hanging(host, HangEndReason::StaminaDepleted, config);
        }

        let Some(point) = self.current_point.and_then(|id| graph.get(id)) else {
            return self.stop_hanging(host, HangEndReason::LedgeLost, config);
        };
        let free_hang = point.free_hang;

        if let Some(transition) = self.transition.as_mut() {
            if !transition.tick(dt, host).is_finished() {
                return None;
            }
            self.transition = None;
            if self.state == ClimbState::Shimmying {
                let state = if free_hang {
                    &config.free_hang_state
                } else {
                    &config.braced_hang_state
                };
                host.animator().play(state, config.cross_fade);
                self.state = ClimbState::Hanging;
            }
            return None;
        }

        if input.drop_pressed {
            return self.stop_hanging(host, HangEndReason::Dropped, config);
        }
        if input.up_pressed || input.vertical > config.climb_up_input {
            self.climb_up_from_hang(graph, host, config);
            return None;
        }
        if input.lateral.abs() > config.lateral_dead_zone {
            let direction = host.right() * input.lateral.signum();
            return self.shimmy(direction, graph, host, config);
        }
        None
    }

    /// Abandon whatever the controller is doing, restoring host control.
    pub fn force_stop(&mut self, host: &mut impl TraversalHost, config: &ClimbConfig) -> Option<ClimbEvent> {
        let event = match self.state {
            ClimbState::None => return None,
            ClimbState::Hanging | ClimbState::Shimmying => ClimbEvent::HangEnded {
                reason: HangEndReason::ForceStopped,
            },
            ClimbState::ClimbingUp => ClimbEvent::ClimbUpEnded { completed: false },
            ClimbState::Climbing => ClimbEvent::WallClimbEnded { finished: false },
        };
        self.release(host, config);
        debug!("climb force-stopped");
        Some(event)
    }
}
