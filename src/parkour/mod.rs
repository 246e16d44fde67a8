//! Parkour controller.
//!
//! [`ParkourController`] scans ahead of the character, classifies the
//! obstacle by height and runs the chosen action as a resumable sequence:
//! animation-matched actions wait for their clip, match the root to the
//! target and wait for the clip to end; the wall run integrates lateral
//! motion along the wall; the vertical jump waits on the host's own jump.
//! At most one action runs at a time and the end hook always fires exactly
//! once for every start hook, whether the action completes, times out or is
//! force-stopped.

mod decision;

pub use decision::{
    classify_height, decide, is_wall_run_eligible, probe_obstacle, wall_run_direction,
    ObstacleInfo, ParkourAction, ParkourDecision,
};

use bevy::prelude::*;

use crate::config::{ActionProfile, ParkourConfig};
use crate::host::{look_rotation, MatchTarget, TraversalHost};
use crate::scanner::EnvironmentScanner;
use crate::sequence::{clip_finished, Delay, SequenceStatus};

/// How a parkour action ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParkourEnd {
    /// The action that ended.
    pub action: ParkourAction,
    /// Whether it ran to its natural end (false when cancelled).
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchPhase {
    WaitingForClipStart,
    MatchingTarget,
    WaitingForClipEnd,
}

/// An animation-matched action in progress.
#[derive(Debug, Clone)]
struct MatchedAction {
    profile: ActionProfile,
    target: MatchTarget,
    phase: MatchPhase,
    elapsed: f32,
    max_duration: f32,
}

impl MatchedAction {
    fn tick(&mut self, dt: f32, host: &mut impl TraversalHost) -> SequenceStatus {
        self.elapsed += dt;
        if self.elapsed > self.max_duration {
            warn!(
                "parkour action `{}` exceeded {}s, cancelling",
                self.profile.state, self.max_duration
            );
            return SequenceStatus::Cancelled;
        }

        let animator = host.animator();
        match self.phase {
            MatchPhase::WaitingForClipStart => {
                if animator.is_in_state(&self.profile.state) && !animator.is_in_transition() {
                    animator.match_target(self.target);
                    self.phase = MatchPhase::MatchingTarget;
                }
                SequenceStatus::Continue
            }
            MatchPhase::MatchingTarget => {
                if !animator.is_in_transition() && animator.normalized_time() >= self.target.end {
                    self.phase = MatchPhase::WaitingForClipEnd;
                }
                SequenceStatus::Continue
            }
            MatchPhase::WaitingForClipEnd => {
                if clip_finished(animator) {
                    SequenceStatus::Completed
                } else {
                    SequenceStatus::Continue
                }
            }
        }
    }
}

/// A wall run in progress.
#[derive(Debug, Clone, Copy)]
struct WallRun {
    velocity: Vec3,
    wall_normal: Vec3,
    remaining: f32,
}

impl WallRun {
    fn tick(
        &mut self,
        dt: f32,
        scanner: &EnvironmentScanner,
        host: &mut impl TraversalHost,
        config: &ParkourConfig,
    ) -> SequenceStatus {
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            return SequenceStatus::Completed;
        }

        let Some(wall) = scanner.obstacle_check(
            host.position(),
            -self.wall_normal,
            config.forward_ray_offset,
            config.wall_run_probe_distance,
        ) else {
            debug!("wall run lost the wall");
            return SequenceStatus::Completed;
        };
        self.wall_normal = wall.normal;

        self.velocity.y -= config.wall_run_gravity * dt;
        host.move_by(self.velocity * dt);
        SequenceStatus::Continue
    }
}

#[derive(Debug, Clone, Copy)]
enum JumpPhase {
    Airborne,
    Settling(Delay),
}

/// A vertical jump in progress.
#[derive(Debug, Clone, Copy)]
struct VerticalJump {
    phase: JumpPhase,
    settle: f32,
    remaining: f32,
}

impl VerticalJump {
    fn tick(&mut self, dt: f32, host: &impl TraversalHost) -> SequenceStatus {
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            return SequenceStatus::Cancelled;
        }
        match &mut self.phase {
            JumpPhase::Airborne => {
                if !host.is_jumping() {
                    self.phase = JumpPhase::Settling(Delay::new(self.settle));
                }
                SequenceStatus::Continue
            }
            JumpPhase::Settling(delay) => delay.tick(dt),
        }
    }
}

#[derive(Debug, Clone)]
enum ParkourSequence {
    Matched(MatchedAction),
    WallRun(WallRun),
    VerticalJump(VerticalJump),
}

/// Parkour state of a character.
#[derive(Component, Debug, Clone, Default)]
#[require(ParkourConfig)]
pub struct ParkourController {
    current_action: ParkourAction,
    sequence: Option<ParkourSequence>,
    last_decision: Option<ParkourDecision>,
}

impl ParkourController {
    /// Create an idle controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an action is running.
    pub fn in_action(&self) -> bool {
        self.sequence.is_some()
    }

    /// The running action, `None` when idle.
    pub fn current_action(&self) -> ParkourAction {
        self.current_action
    }

    /// Decision that started the running (or last) action.
    pub fn last_decision(&self) -> Option<&ParkourDecision> {
        self.last_decision.as_ref()
    }

    /// Whether the running action holds host control (every action except
    /// the vertical jump).
    pub fn holds_host_control(&self) -> bool {
        matches!(
            self.sequence,
            Some(ParkourSequence::Matched(_) | ParkourSequence::WallRun(_))
        )
    }

    /// Decide what the obstacle ahead calls for, without acting on it.
    ///
    /// The approach direction is the host's move direction, or its facing
    /// when it is not moving.
    pub fn decide(
        &self,
        scanner: &EnvironmentScanner,
        host: &impl TraversalHost,
        config: &ParkourConfig,
    ) -> Option<ParkourDecision> {
        let moving = host.move_direction();
        let direction = if moving.length_squared() > 1e-4 {
            moving
        } else {
            host.forward()
        };
        let velocity = host.velocity();
        let speed = Vec2::new(velocity.x, velocity.z).length();
        decide(
            scanner,
            host.position(),
            direction,
            host.right(),
            speed,
            config,
        )
    }

    /// Scan ahead and start the action the obstacle calls for.
    ///
    /// Returns false, without any state change, while an action is running,
    /// when the host vetoes actions, or when there is nothing to traverse.
    pub fn check_for_parkour(
        &mut self,
        scanner: &EnvironmentScanner,
        host: &mut impl TraversalHost,
        config: &ParkourConfig,
    ) -> bool {
        if self.in_action() || host.prevent_action() {
            return false;
        }
        match self.decide(scanner, host, config) {
            Some(decision) => self.execute(decision, host, config),
            None => false,
        }
    }

    /// Start `decision` through the host hooks.
    ///
    /// This is the entry point for actions decided elsewhere, such as ones
    /// replicated from a remote peer.
    pub fn execute(
        &mut self,
        decision: ParkourDecision,
        host: &mut impl TraversalHost,
        config: &ParkourConfig,
    ) -> bool {
        if self.in_action() || host.prevent_action() {
            return false;
        }

        let sequence = match decision.action {
            ParkourAction::None => return false,
            ParkourAction::VerticalJump => return self.vertical_jump(host, config),
            ParkourAction::WallRun => {
                host.on_action_start();
                host.set_rotation(look_rotation(decision.direction));
                host.animator().play(&config.wall_run_state, 0.1);
                ParkourSequence::WallRun(WallRun {
                    velocity: decision.direction * config.wall_run_speed
                        + Vec3::Y * config.wall_run_initial_lift,
                    wall_normal: decision.obstacle_normal,
                    remaining: config.wall_run_duration,
                })
            }
            action => {
                let profile = match action {
                    ParkourAction::StepUp => &config.step_up,
                    ParkourAction::MediumStepUp => &config.medium_step_up,
                    ParkourAction::VaultOver => &config.vault_over,
                    ParkourAction::VaultOn => &config.vault_on,
                    _ => &config.climb_up,
                };
                host.on_action_start();
                host.animator().play(&profile.state, profile.cross_fade);
                ParkourSequence::Matched(MatchedAction {
                    profile: profile.clone(),
                    target: MatchTarget::new(
                        decision.target_position,
                        decision.target_rotation,
                        profile.match_start,
                        profile.match_end,
                    ),
                    phase: MatchPhase::WaitingForClipStart,
                    elapsed: 0.0,
                    max_duration: config.max_action_duration,
                })
            }
        };

        debug!(
            "parkour {:?} started (height {:.2})",
            decision.action, decision.obstacle_height
        );
        self.current_action = decision.action;
        self.last_decision = Some(decision);
        self.sequence = Some(sequence);
        true
    }

    /// Jump in place without handing off host control.
    ///
    /// Only starts when grounded and idle.
    pub fn vertical_jump(&mut self, host: &mut impl TraversalHost, config: &ParkourConfig) -> bool {
        if self.in_action() || !host.is_grounded() || host.prevent_action() {
            return false;
        }
        host.animator().set_trigger(&config.jump_trigger);
        host.handle_vertical_jump();

        self.current_action = ParkourAction::VerticalJump;
        self.sequence = Some(ParkourSequence::VerticalJump(VerticalJump {
            phase: JumpPhase::Airborne,
            settle: config.vertical_jump_settle,
            remaining: config.max_action_duration,
        }));
        true
    }

    /// Step the running action. Returns how it ended, if it ended this tick.
    pub fn tick(
        &mut self,
        dt: f32,
        scanner: &EnvironmentScanner,
        host: &mut impl TraversalHost,
        config: &ParkourConfig,
    ) -> Option<ParkourEnd> {
        let status = match self.sequence.as_mut()? {
            ParkourSequence::Matched(action) => action.tick(dt, host),
            ParkourSequence::WallRun(run) => run.tick(dt, scanner, host, config),
            ParkourSequence::VerticalJump(jump) => jump.tick(dt, host),
        };
        match status {
            SequenceStatus::Continue => None,
            SequenceStatus::Completed => self.finish(host, true),
            SequenceStatus::Cancelled => self.finish(host, false),
        }
    }

    /// Abandon the running action, restoring host control.
    ///
    /// Returns `None` when nothing was running.
    pub fn force_stop(&mut self, host: &mut impl TraversalHost) -> Option<ParkourEnd> {
        self.finish(host, false)
    }

    fn finish(&mut self, host: &mut impl TraversalHost, completed: bool) -> Option<ParkourEnd> {
        let sequence = self.sequence.take()?;
        let action = std::mem::take(&mut self.current_action);
        match sequence {
            ParkourSequence::Matched(_) => {
                if !completed {
                    host.animator().clear_match_target();
                }
                host.on_action_end();
            }
            ParkourSequence::WallRun(_) => host.on_action_end(),
            ParkourSequence::VerticalJump(_) => {}
        }
        debug!(
            "parkour {action:?} {}",
            if completed { "completed" } else { "cancelled" }
        );
        Some(ParkourEnd { action, completed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless_animator::{AnimatorState, ClipLibrary};
    use crate::config::ScannerConfig;
    use crate::host::TraversalAnimator;
    use crate::box_scene::BoxScene;

    /// In-memory host that records hook calls.
    #[derive(Default)]
    struct TestHost {
        position: Vec3,
        rotation: Quat,
        velocity: Vec3,
        grounded: bool,
        prevent: bool,
        jumping: bool,
        animator: AnimatorState,
        starts: u32,
        ends: u32,
        moved: Vec3,
    }

    impl TraversalHost for TestHost {
        fn position(&self) -> Vec3 {
            self.position
        }
        fn rotation(&self) -> Quat {
            self.rotation
        }
        fn velocity(&self) -> Vec3 {
            self.velocity
        }
        fn is_grounded(&self) -> bool {
            self.grounded
        }
        fn gravity(&self) -> f32 {
            9.81
        }
        fn move_direction(&self) -> Vec3 {
            Vec3::ZERO
        }
        fn prevent_action(&self) -> bool {
            self.prevent
        }
        fn animator(&mut self) -> &mut dyn TraversalAnimator {
            &mut self.animator
        }
        fn on_action_start(&mut self) {
            self.starts += 1;
        }
        fn on_action_end(&mut self) {
            self.ends += 1;
        }
        fn move_by(&mut self, delta: Vec3) {
            self.moved += delta;
            self.position += delta;
        }
        fn set_position(&mut self, position: Vec3) {
            self.position = position;
        }
        fn set_rotation(&mut self, rotation: Quat) {
            self.rotation = rotation;
        }
        fn handle_vertical_jump(&mut self) {
            self.jumping = true;
        }
        fn is_jumping(&self) -> bool {
            self.jumping
        }
    }

    fn vault_block() -> BoxScene {
        let mut geometry = BoxScene::default();
        geometry.add_box(
            Vec3::new(0.0, 0.45, -0.7),
            Quat::IDENTITY,
            Vec3::new(2.0, 0.45, 0.2),
            u32::MAX,
            None,
        );
        geometry
    }

    fn tall_wall() -> BoxScene {
        let mut geometry = BoxScene::default();
        geometry.add_box(
            Vec3::new(0.0, 3.0, -1.0),
            Quat::IDENTITY,
            Vec3::new(20.0, 3.0, 0.5),
            u32::MAX,
            None,
        );
        geometry
    }

    fn config() -> ParkourConfig {
        ParkourConfig::default().with_height_bands(0.6, 0.8, 1.0, 2.2)
    }

    /// Step the controller and the animator together.
    fn step(
        controller: &mut ParkourController,
        scanner: &EnvironmentScanner,
        host: &mut TestHost,
        config: &ParkourConfig,
    ) -> Option<ParkourEnd> {
        let dt = 1.0 / 60.0;
        host.animator.advance(dt, &ClipLibrary::default());
        let mut transform = Transform::from_translation(host.position);
        host.animator.apply_root_match(&mut transform);
        host.position = transform.translation;
        controller.tick(dt, scanner, host, config)
    }

    #[test]
    fn vault_runs_to_completion() {
        let geometry = vault_block();
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        let config = config();
        let mut controller = ParkourController::new();
        let mut host = TestHost {
            grounded: true,
            ..default()
        };

        assert!(controller.check_for_parkour(&scanner, &mut host, &config));
        assert_eq!(controller.current_action(), ParkourAction::VaultOver);
        assert_eq!(host.starts, 1);

        let target = controller.last_decision().map(|d| d.target_position);
        let mut end = None;
        for _ in 0..240 {
            end = step(&mut controller, &scanner, &mut host, &config);
            if end.is_some() {
                break;
            }
        }

        assert_eq!(
            end,
            Some(ParkourEnd {
                action: ParkourAction::VaultOver,
                completed: true
            })
        );
        assert!(!controller.in_action());
        assert_eq!(controller.current_action(), ParkourAction::None);
        assert_eq!(host.ends, 1);
        let target = target.expect("decision recorded");
        assert!((host.position - target).length() < 1e-3, "root matched onto landing point");
    }

    #[test]
    fn second_check_is_rejected_while_in_action() {
        let geometry = vault_block();
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        let config = config();
        let mut controller = ParkourController::new();
        let mut host = TestHost::default();

        assert!(controller.check_for_parkour(&scanner, &mut host, &config));
        let before = controller.last_decision().copied();

        assert!(!controller.check_for_parkour(&scanner, &mut host, &config));
        assert_eq!(controller.last_decision().copied(), before);
        assert_eq!(host.starts, 1, "no second start hook");
    }

    #[test]
    fn host_veto_blocks_actions() {
        let geometry = vault_block();
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        let mut controller = ParkourController::new();
        let mut host = TestHost {
            prevent: true,
            ..default()
        };

        assert!(!controller.check_for_parkour(&scanner, &mut host, &config()));
        assert!(!controller.in_action());
        assert_eq!(host.starts, 0);
    }

    #[test]
    fn force_stop_mid_match_ends_once() {
        let geometry = vault_block();
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        let config = config();
        let mut controller = ParkourController::new();
        let mut host = TestHost::default();

        assert!(controller.check_for_parkour(&scanner, &mut host, &config));
        // Run into the match window.
        for _ in 0..30 {
            assert!(step(&mut controller, &scanner, &mut host, &config).is_none());
        }
        assert!(host.animator.match_request().is_some(), "mid-blend");

        let end = controller.force_stop(&mut host);
        assert_eq!(
            end,
            Some(ParkourEnd {
                action: ParkourAction::VaultOver,
                completed: false
            })
        );
        assert!(!controller.in_action());
        assert_eq!(host.ends, 1);
        assert!(host.animator.match_request().is_none());

        assert!(controller.force_stop(&mut host).is_none());
        assert!(step(&mut controller, &scanner, &mut host, &config).is_none());
        assert_eq!(host.ends, 1, "end hook fires exactly once");
    }

    #[test]
    fn watchdog_cancels_stuck_action() {
        let geometry = vault_block();
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        let config = config().with_max_action_duration(0.5);
        let mut controller = ParkourController::new();
        let mut host = TestHost::default();

        assert!(controller.check_for_parkour(&scanner, &mut host, &config));
        // The animator never advances, so the clip never starts.
        let mut end = None;
        for _ in 0..60 {
            end = controller.tick(1.0 / 60.0, &scanner, &mut host, &config);
            if end.is_some() {
                break;
            }
        }
        assert_eq!(end.map(|e| e.completed), Some(false));
        assert_eq!(host.ends, 1);
    }

    #[test]
    fn wall_run_moves_along_wall_and_ends() {
        let geometry = tall_wall();
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        let config = config().with_wall_run_duration(0.5);
        let mut controller = ParkourController::new();
        let mut host = TestHost {
            velocity: Vec3::new(0.0, 0.0, -7.0),
            ..default()
        };

        assert!(controller.check_for_parkour(&scanner, &mut host, &config));
        assert_eq!(controller.current_action(), ParkourAction::WallRun);

        let mut ticks = 0;
        while controller.tick(1.0 / 60.0, &scanner, &mut host, &config).is_none() {
            ticks += 1;
            assert!(ticks < 100, "wall run must end");
        }
        assert!(host.moved.x > 2.0, "ran to the right along the wall");
        assert_eq!(host.starts, 1);
        assert_eq!(host.ends, 1);
    }

    #[test]
    fn wall_run_ends_when_wall_is_lost() {
        let mut geometry = BoxScene::default();
        geometry.add_box(
            Vec3::new(0.0, 3.0, -1.0),
            Quat::IDENTITY,
            Vec3::new(0.5, 3.0, 0.5),
            u32::MAX,
            None,
        );
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        let config = config().with_wall_run_duration(5.0);
        let mut controller = ParkourController::new();
        let mut host = TestHost {
            velocity: Vec3::new(0.0, 0.0, -7.0),
            ..default()
        };

        assert!(controller.check_for_parkour(&scanner, &mut host, &config));
        let mut end = None;
        for _ in 0..60 {
            end = controller.tick(1.0 / 60.0, &scanner, &mut host, &config);
            if end.is_some() {
                break;
            }
        }
        assert_eq!(end.map(|e| e.completed), Some(true), "ended early on its own");
        assert!(host.moved.x < 1.5);
    }

    #[test]
    fn vertical_jump_skips_host_hooks() {
        let geometry = BoxScene::default();
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        let config = config();
        let mut controller = ParkourController::new();
        let mut host = TestHost::default();

        assert!(!controller.vertical_jump(&mut host, &config), "airborne");

        host.grounded = true;
        assert!(controller.vertical_jump(&mut host, &config));
        assert!(host.jumping);
        assert!(host.animator.take_trigger("Jump"));
        assert!(!controller.holds_host_control());

        assert!(controller.tick(0.1, &scanner, &mut host, &config).is_none());
        host.jumping = false;
        assert!(controller.tick(0.1, &scanner, &mut host, &config).is_none());
        let end = controller.tick(0.25, &scanner, &mut host, &config);
        assert_eq!(end.map(|e| e.action), Some(ParkourAction::VerticalJump));
        assert_eq!(host.starts + host.ends, 0);
    }

    #[test]
    fn execute_vault_on_from_remote_decision() {
        let geometry = BoxScene::default();
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        let config = config();
        let mut controller = ParkourController::new();
        let mut host = TestHost::default();

        let decision = ParkourDecision {
            action: ParkourAction::VaultOn,
            target_position: Vec3::new(0.0, 1.0, -1.0),
            target_rotation: Quat::IDENTITY,
            direction: Vec3::NEG_Z,
            obstacle_normal: Vec3::Z,
            obstacle_height: 1.0,
        };
        assert!(controller.execute(decision, &mut host, &config));
        assert_eq!(controller.current_action(), ParkourAction::VaultOn);

        host.animator.advance(1.0, &ClipLibrary::default());
        assert!(controller.tick(1.0 / 60.0, &scanner, &mut host, &config).is_none());
        assert!(host.animator.match_request().is_some());
    }
}
