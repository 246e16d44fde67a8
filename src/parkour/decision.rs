//! Obstacle classification.
//!
//! Everything here is a pure function of probe results and configuration.

use bevy::prelude::*;

use crate::collision::CollisionData;
use crate::config::ParkourConfig;
use crate::host::look_rotation;
use crate::scanner::{flatten, EnvironmentScanner};

/// Inset past the obstacle face used when the regular top probe overshoots a
/// thin obstacle.
const THIN_OBSTACLE_INSET: f32 = 0.05;

/// A parkour action.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParkourAction {
    /// No action.
    #[default]
    None,
    /// Step onto a low obstacle.
    StepUp,
    /// Step onto a medium obstacle.
    MediumStepUp,
    /// Vault over an obstacle, landing past it.
    VaultOver,
    /// Vault onto an obstacle, landing on top.
    VaultOn,
    /// Climb onto a tall obstacle.
    ClimbUp,
    /// Run along a wall.
    WallRun,
    /// Plain jump in place.
    VerticalJump,
}

impl ParkourAction {
    /// Whether the action is played as an animation-matched clip.
    pub fn is_matched(self) -> bool {
        matches!(
            self,
            Self::StepUp | Self::MediumStepUp | Self::VaultOver | Self::VaultOn | Self::ClimbUp
        )
    }
}

/// Perception summary of an obstacle ahead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleInfo {
    /// Forward probe hit on the obstacle face.
    pub hit: CollisionData,
    /// Top surface point, when one was found.
    pub top: Option<Vec3>,
    /// Height of the top above the character, infinite without a top.
    pub height: f32,
    /// Whether the space above the top is clear for a vault.
    pub has_space_on_top: bool,
}

/// The outcome of a parkour check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParkourDecision {
    /// Chosen action.
    pub action: ParkourAction,
    /// Root position the action ends at.
    pub target_position: Vec3,
    /// Root rotation the action ends at.
    pub target_rotation: Quat,
    /// Horizontal direction of travel (the wall run direction for a wall run).
    pub direction: Vec3,
    /// Normal of the obstacle face.
    pub obstacle_normal: Vec3,
    /// Height of the obstacle above the character.
    pub obstacle_height: f32,
}

/// Pick the action for an obstacle of `height` from the ordered bands.
///
/// Returns `None` when the obstacle is taller than every band, which leaves
/// only the wall run.
pub fn classify_height(height: f32, has_space_on_top: bool, config: &ParkourConfig) -> Option<ParkourAction> {
    if height <= config.step_up_height {
        Some(ParkourAction::StepUp)
    } else if height <= config.medium_step_up_height {
        Some(ParkourAction::MediumStepUp)
    } else if height <= config.vault_height && has_space_on_top {
        Some(ParkourAction::VaultOver)
    } else if height <= config.climb_up_height {
        Some(ParkourAction::ClimbUp)
    } else {
        None
    }
}

/// Whether a wall with `wall_normal` can be run along at `speed`.
pub fn is_wall_run_eligible(speed: f32, wall_normal: Vec3, config: &ParkourConfig) -> bool {
    if speed < config.min_wall_run_speed {
        return false;
    }
    let angle = wall_normal.angle_between(Vec3::Y).to_degrees();
    angle > config.wall_run_min_angle && angle < config.wall_run_max_angle
}

/// Lateral run direction along a wall.
///
/// The wall tangent `cross(normal, up)` is flipped so that it points to the
/// character's right (or left, when `follow_right` is false).
pub fn wall_run_direction(wall_normal: Vec3, right: Vec3, follow_right: bool) -> Vec3 {
    let tangent = wall_normal.cross(Vec3::Y).normalize_or_zero();
    let towards_right = tangent.dot(right) >= 0.0;
    if towards_right == follow_right {
        tangent
    } else {
        -tangent
    }
}

/// Probe the obstacle ahead of `position` along `direction`.
pub fn probe_obstacle(
    scanner: &EnvironmentScanner,
    position: Vec3,
    direction: Vec3,
    config: &ParkourConfig,
) -> Option<ObstacleInfo> {
    let direction = flatten(direction)?;
    let hit = scanner.obstacle_check(
        position,
        direction,
        config.forward_ray_offset,
        config.forward_ray_length,
    )?;

    let top = [config.top_probe_forward, THIN_OBSTACLE_INSET]
        .into_iter()
        .filter_map(|inset| {
            let above = Vec3::new(hit.point.x, position.y + config.top_probe_height, hit.point.z);
            scanner.surface_below(above + direction * inset, config.top_probe_height)
        })
        .map(|surface| surface.point)
        .find(|point| point.y - position.y >= config.forward_ray_offset);

    let height = top.map_or(f32::INFINITY, |point| point.y - position.y);
    let has_space_on_top = top.is_some_and(|point| {
        scanner.is_clear(
            point + Vec3::Y * config.vault_clearance,
            direction,
            config.vault_landing_offset,
        )
    });

    Some(ObstacleInfo {
        hit,
        top,
        height,
        has_space_on_top,
    })
}

/// Decide which action, if any, the obstacle ahead calls for.
pub fn decide(
    scanner: &EnvironmentScanner,
    position: Vec3,
    direction: Vec3,
    right: Vec3,
    speed: f32,
    config: &ParkourConfig,
) -> Option<ParkourDecision> {
    let direction = flatten(direction)?;
    let obstacle = probe_obstacle(scanner, position, direction, config)?;
    let normal = obstacle.hit.normal;

    if let (Some(action), Some(top)) = (
        classify_height(obstacle.height, obstacle.has_space_on_top, config),
        obstacle.top,
    ) {
        let target_position = match action {
            ParkourAction::VaultOver => top + direction * config.vault_landing_offset,
            _ => top,
        };
        return Some(ParkourDecision {
            action,
            target_position,
            target_rotation: look_rotation(-normal),
            direction,
            obstacle_normal: normal,
            obstacle_height: obstacle.height,
        });
    }

    if !is_wall_run_eligible(speed, normal, config) {
        return None;
    }
    let run = wall_run_direction(normal, right, config.wall_run_follow_right);
    Some(ParkourDecision {
        action: ParkourAction::WallRun,
        target_position: position,
        target_rotation: look_rotation(run),
        direction: run,
        obstacle_normal: normal,
        obstacle_height: obstacle.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use crate::box_scene::BoxScene;

    fn bands() -> ParkourConfig {
        ParkourConfig::default().with_height_bands(0.6, 0.8, 1.0, 2.2)
    }

    /// Block of `height` whose face is 0.5 m ahead along -Z.
    fn block(height: f32, depth: f32) -> BoxScene {
        let mut geometry = BoxScene::default();
        geometry.add_box(
            Vec3::new(0.0, height / 2.0, -0.5 - depth / 2.0),
            Quat::IDENTITY,
            Vec3::new(2.0, height / 2.0, depth / 2.0),
            u32::MAX,
            None,
        );
        geometry
    }

    #[test]
    fn height_bands_first_match_wins() {
        let config = bands();
        assert_eq!(classify_height(0.3, false, &config), Some(ParkourAction::StepUp));
        assert_eq!(classify_height(0.6, true, &config), Some(ParkourAction::StepUp));
        assert_eq!(classify_height(0.7, true, &config), Some(ParkourAction::MediumStepUp));
        assert_eq!(classify_height(0.9, true, &config), Some(ParkourAction::VaultOver));
        assert_eq!(classify_height(0.9, false, &config), Some(ParkourAction::ClimbUp));
        assert_eq!(classify_height(1.5, true, &config), Some(ParkourAction::ClimbUp));
        assert_eq!(classify_height(2.5, true, &config), None);
        assert_eq!(classify_height(f32::INFINITY, false, &config), None);
    }

    #[test]
    fn wall_run_speed_gate() {
        let config = ParkourConfig::default().with_min_wall_run_speed(5.0);
        assert!(!is_wall_run_eligible(4.9, Vec3::Z, &config));
        assert!(is_wall_run_eligible(5.1, Vec3::Z, &config));
    }

    #[test]
    fn wall_run_angle_gate_is_exclusive() {
        let config = ParkourConfig::default();
        let tilted = |degrees: f32| Quat::from_rotation_x(degrees.to_radians()) * Vec3::Y;
        assert!(is_wall_run_eligible(10.0, tilted(90.0), &config));
        assert!(is_wall_run_eligible(10.0, tilted(75.0), &config));
        assert!(!is_wall_run_eligible(10.0, tilted(60.0), &config));
        assert!(!is_wall_run_eligible(10.0, tilted(115.0), &config));
    }

    #[test]
    fn wall_run_direction_follows_right_side() {
        // Facing -Z toward a wall whose normal is +Z; right is +X.
        let run = wall_run_direction(Vec3::Z, Vec3::X, true);
        assert!((run - Vec3::X).length() < 1e-5);

        let run = wall_run_direction(Vec3::Z, Vec3::X, false);
        assert!((run - Vec3::NEG_X).length() < 1e-5);

        let run = wall_run_direction(Vec3::Z, Vec3::NEG_X, true);
        assert!((run - Vec3::NEG_X).length() < 1e-5);
    }

    #[test]
    fn vault_scenario_lands_past_obstacle() {
        let geometry = block(0.9, 0.4);
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        let config = bands();

        let decision = decide(&scanner, Vec3::ZERO, Vec3::NEG_Z, Vec3::X, 3.0, &config)
            .expect("obstacle ahead");
        assert_eq!(decision.action, ParkourAction::VaultOver);
        assert!((decision.obstacle_height - 0.9).abs() < 1e-4);

        let top = Vec3::new(0.0, 0.9, -0.5 - config.top_probe_forward);
        let expected = top + Vec3::NEG_Z * 1.5;
        assert!((decision.target_position - expected).length() < 1e-4);
        assert!((decision.target_rotation * Vec3::NEG_Z - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn blocked_top_turns_vault_into_climb() {
        let mut geometry = block(0.9, 0.4);
        // A wall behind the low block leaves no room to land.
        geometry.add_box(
            Vec3::new(0.0, 2.0, -1.5),
            Quat::IDENTITY,
            Vec3::new(2.0, 2.0, 0.3),
            u32::MAX,
            None,
        );
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());

        let decision = decide(&scanner, Vec3::ZERO, Vec3::NEG_Z, Vec3::X, 3.0, &bands())
            .expect("obstacle ahead");
        assert_eq!(decision.action, ParkourAction::ClimbUp);
    }

    #[test]
    fn low_and_medium_steps() {
        let config = bands();
        for (height, expected) in [(0.4, ParkourAction::StepUp), (0.7, ParkourAction::MediumStepUp)] {
            let geometry = block(height, 2.0);
            let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
            let decision = decide(&scanner, Vec3::ZERO, Vec3::NEG_Z, Vec3::X, 0.0, &config)
                .expect("obstacle ahead");
            assert_eq!(decision.action, expected, "height {height}");
            assert!((decision.target_position.y - height).abs() < 1e-4);
        }
    }

    #[test]
    fn tall_wall_needs_speed_for_wall_run() {
        let geometry = block(6.0, 1.0);
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        let config = bands().with_min_wall_run_speed(5.0);

        assert!(decide(&scanner, Vec3::ZERO, Vec3::NEG_Z, Vec3::X, 4.9, &config).is_none());

        let decision = decide(&scanner, Vec3::ZERO, Vec3::NEG_Z, Vec3::X, 5.1, &config)
            .expect("fast enough to wall run");
        assert_eq!(decision.action, ParkourAction::WallRun);
        assert!((decision.direction - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn nothing_ahead_is_no_decision() {
        let geometry = BoxScene::default();
        let scanner = EnvironmentScanner::new(&geometry, ScannerConfig::default());
        assert!(decide(&scanner, Vec3::ZERO, Vec3::NEG_Z, Vec3::X, 10.0, &bands()).is_none());
    }
}
