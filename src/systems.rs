//! Traversal systems.
//!
//! These systems drive the controllers from the ECS. The ones that probe the
//! scene are generic over the physics backend. Each builds a
//! [`CharacterHost`] over the character's components and an
//! [`EnvironmentScanner`] over the backend scene, then hands both to the
//! controller.

use bevy::ecs::system::StaticSystemParam;
use bevy::prelude::*;

use crate::animation::{AnimationPlayerBinding, AnimationPlayers};
use crate::backend::TraversalBackend;
use crate::climb::{ClimbController, ClimbInput};
use crate::climb_point::ClimbPointGraph;
use crate::config::{ClimbConfig, JetpackConfig, ParkourConfig, ScannerConfig, SlopeConfig};
use crate::error::TraversalConfigError;
use crate::events::{TraversalCommand, TraversalEvent};
use crate::host::{CharacterHost, TraversalCharacter, TraversalHost};
use crate::intent::TraversalIntent;
use crate::jetpack::SlopeJetpack;
use crate::parkour::{ParkourAction, ParkourController, ParkourEnd};
use crate::scanner::EnvironmentScanner;
use crate::slope::{SlopeGround, SlopeInput, SlopeMovement};
use crate::state::{ClimbingWall, Hanging, InParkourAction, Skiing, TraversalDisabled};

/// Components found on a freshly set-up traversal entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetupCapabilities {
    /// Has a [`TraversalCharacter`].
    pub character: bool,
    /// Has an [`AnimationPlayerBinding`].
    pub animator: bool,
    /// Has a [`ParkourController`].
    pub parkour: bool,
    /// Has a [`ClimbController`].
    pub climb: bool,
    /// Has a [`SlopeMovement`].
    pub slope: bool,
    /// Has a [`SlopeJetpack`].
    pub jetpack: bool,
}

fn require(present: bool, controller: &'static str, requires: &'static str) -> Result<(), TraversalConfigError> {
    if present {
        Ok(())
    } else {
        Err(TraversalConfigError::MissingCapability { controller, requires })
    }
}

/// Check that every controller on an entity has what it needs.
pub fn check_capabilities(caps: SetupCapabilities) -> Result<(), TraversalConfigError> {
    if caps.parkour {
        require(caps.character, "ParkourController", "TraversalCharacter")?;
        require(caps.animator, "ParkourController", "AnimationPlayerBinding")?;
    }
    if caps.climb {
        require(caps.character, "ClimbController", "TraversalCharacter")?;
        require(caps.animator, "ClimbController", "AnimationPlayerBinding")?;
    }
    if caps.slope {
        require(caps.character, "SlopeMovement", "TraversalCharacter")?;
    }
    if caps.jetpack {
        require(caps.slope, "SlopeJetpack", "SlopeMovement")?;
    }
    Ok(())
}

/// Validate newly added traversal components.
///
/// An entity with a missing capability or an invalid configuration is
/// logged and marked [`TraversalDisabled`].
#[allow(clippy::type_complexity)]
pub fn validate_setup(
    mut commands: Commands,
    q_new: Query<
        (
            Entity,
            (
                Has<TraversalCharacter>,
                Has<AnimationPlayerBinding>,
                Has<ParkourController>,
                Has<ClimbController>,
                Has<SlopeMovement>,
                Has<SlopeJetpack>,
            ),
            Option<&ScannerConfig>,
            Option<&ParkourConfig>,
            Option<&ClimbConfig>,
            Option<&SlopeConfig>,
            Option<&JetpackConfig>,
        ),
        (
            Without<TraversalDisabled>,
            Or<(
                Added<TraversalCharacter>,
                Added<ParkourController>,
                Added<ClimbController>,
                Added<SlopeMovement>,
                Added<SlopeJetpack>,
            )>,
        ),
    >,
) {
    for (entity, (character, animator, parkour, climb, slope, jetpack), scanner, parkour_config, climb_config, slope_config, jetpack_config) in
        &q_new
    {
        let caps = SetupCapabilities {
            character,
            animator,
            parkour,
            climb,
            slope,
            jetpack,
        };
        let result = check_capabilities(caps)
            .and_then(|()| scanner.map_or(Ok(()), ScannerConfig::validate))
            .and_then(|()| parkour_config.map_or(Ok(()), ParkourConfig::validate))
            .and_then(|()| climb_config.map_or(Ok(()), ClimbConfig::validate))
            .and_then(|()| slope_config.map_or(Ok(()), SlopeConfig::validate))
            .and_then(|()| jetpack_config.map_or(Ok(()), JetpackConfig::validate));

        if let Err(err) = result {
            error!("traversal disabled on {entity}: {err}");
            commands.entity(entity).insert(TraversalDisabled);
        }
    }
}

/// Copy the movement intent into the host state.
pub fn apply_intents(mut q_characters: Query<(&TraversalIntent, &mut TraversalCharacter), Without<TraversalDisabled>>) {
    for (intent, mut character) in &mut q_characters {
        character.move_direction = intent.movement;
    }
}

fn parkour_event(entity: Entity, end: ParkourEnd) -> TraversalEvent {
    TraversalEvent::ParkourEnded {
        entity,
        action: end.action,
        completed: end.completed,
    }
}

fn parkour_started(entity: Entity, parkour: &ParkourController, position: Vec3) -> TraversalEvent {
    let action = parkour.current_action();
    let target = match (action, parkour.last_decision()) {
        (ParkourAction::VerticalJump, _) | (_, None) => position,
        (_, Some(decision)) => decision.target_position,
    };
    TraversalEvent::ParkourStarted { entity, action, target }
}

/// Apply [`TraversalCommand`]s.
#[allow(clippy::type_complexity)]
pub fn handle_commands(
    mut commands_in: EventReader<TraversalCommand>,
    mut q_characters: Query<
        (
            &mut Transform,
            &mut TraversalCharacter,
            &mut AnimationPlayerBinding,
            Option<(&mut ParkourController, &ParkourConfig)>,
            Option<(&mut ClimbController, &ClimbConfig)>,
        ),
        Without<TraversalDisabled>,
    >,
    mut players: AnimationPlayers,
    mut events: EventWriter<TraversalEvent>,
) {
    for command in commands_in.read() {
        let entity = match *command {
            TraversalCommand::ExecuteParkour { entity, .. } | TraversalCommand::ForceStop { entity } => entity,
        };
        let Ok((mut transform, mut character, mut binding, mut parkour, mut climb)) = q_characters.get_mut(entity)
        else {
            warn!("traversal command for unknown character {entity}");
            continue;
        };
        let other_owner_active = climb.as_ref().is_some_and(|(climb, _)| climb.is_engaged());
        let mut animator = players.animator(&mut binding);
        let mut host = CharacterHost {
            entity,
            transform: &mut transform,
            character: &mut character,
            animator: &mut animator,
            other_owner_active,
        };

        match *command {
            TraversalCommand::ExecuteParkour { decision, .. } => {
                let Some((parkour, config)) = parkour.as_mut() else {
                    warn!("{entity} has no parkour controller to execute {:?}", decision.action);
                    continue;
                };
                if parkour.execute(decision, &mut host, config) {
                    let position = host.position();
                    events.write(parkour_started(entity, parkour, position));
                }
            }
            TraversalCommand::ForceStop { .. } => {
                if let Some((parkour, _)) = parkour.as_mut() {
                    if let Some(end) = parkour.force_stop(&mut host) {
                        events.write(parkour_event(entity, end));
                    }
                }
                if let Some((climb, config)) = climb.as_mut() {
                    if let Some(event) = climb.force_stop(&mut host, config) {
                        events.write(TraversalEvent::Climb { entity, event });
                    }
                }
            }
        }
    }
}

/// Start parkour on a jump press.
///
/// The obstacle ahead decides the action; with nothing to traverse the
/// press becomes a vertical jump when enabled. A press that starts anything
/// is consumed.
#[allow(clippy::type_complexity)]
pub fn parkour_decision<B: TraversalBackend>(
    scene: StaticSystemParam<B::Scene>,
    mut q_characters: Query<
        (
            Entity,
            &mut Transform,
            &mut TraversalCharacter,
            &mut AnimationPlayerBinding,
            &mut TraversalIntent,
            &mut ParkourController,
            &ParkourConfig,
            &ScannerConfig,
            Option<&ClimbController>,
        ),
        Without<TraversalDisabled>,
    >,
    mut players: AnimationPlayers,
    mut events: EventWriter<TraversalEvent>,
) {
    for (entity, mut transform, mut character, mut binding, mut intent, mut parkour, config, scanner_config, climb) in
        &mut q_characters
    {
        if !intent.jump.just_pressed() || parkour.in_action() {
            continue;
        }
        let mut animator = players.animator(&mut binding);
        let mut host = CharacterHost {
            entity,
            transform: &mut transform,
            character: &mut character,
            animator: &mut animator,
            other_owner_active: climb.is_some_and(ClimbController::is_engaged),
        };

        let started = B::with_scene(&*scene, |scene| {
            let scanner = EnvironmentScanner::new(scene, *scanner_config).excluding(host.collider_entity());
            parkour.check_for_parkour(&scanner, &mut host, config)
                || (config.vertical_jump_enabled && parkour.vertical_jump(&mut host, config))
        })
        .unwrap_or(false);

        if started {
            intent.jump.consume();
            let position = host.position();
            events.write(parkour_started(entity, &parkour, position));
        }
    }
}

/// Step running parkour actions.
#[allow(clippy::type_complexity)]
pub fn parkour_actions<B: TraversalBackend>(
    time: Res<Time>,
    scene: StaticSystemParam<B::Scene>,
    mut q_characters: Query<
        (
            Entity,
            &mut Transform,
            &mut TraversalCharacter,
            &mut AnimationPlayerBinding,
            &mut ParkourController,
            &ParkourConfig,
            &ScannerConfig,
        ),
        Without<TraversalDisabled>,
    >,
    mut players: AnimationPlayers,
    mut events: EventWriter<TraversalEvent>,
) {
    let dt = time.delta_secs();
    for (entity, mut transform, mut character, mut binding, mut parkour, config, scanner_config) in &mut q_characters {
        if !parkour.in_action() {
            continue;
        }
        let mut animator = players.animator(&mut binding);
        let mut host = CharacterHost {
            entity,
            transform: &mut transform,
            character: &mut character,
            animator: &mut animator,
            other_owner_active: false,
        };
        let end = B::with_scene(&*scene, |scene| {
            let scanner = EnvironmentScanner::new(scene, *scanner_config).excluding(host.collider_entity());
            parkour.tick(dt, &scanner, &mut host, config)
        })
        .flatten();

        if let Some(end) = end {
            events.write(parkour_event(entity, end));
        }
    }
}

/// Start hangs and wall climbs from interact and crouch presses.
#[allow(clippy::type_complexity)]
pub fn climb_decision<B: TraversalBackend>(
    scene: StaticSystemParam<B::Scene>,
    mut graph: ResMut<ClimbPointGraph>,
    mut q_characters: Query<
        (
            Entity,
            &mut Transform,
            &mut TraversalCharacter,
            &mut AnimationPlayerBinding,
            &mut TraversalIntent,
            &mut ClimbController,
            &ClimbConfig,
            &ScannerConfig,
            Option<&ParkourController>,
        ),
        Without<TraversalDisabled>,
    >,
    mut players: AnimationPlayers,
    mut events: EventWriter<TraversalEvent>,
) {
    for (entity, mut transform, mut character, mut binding, mut intent, mut climb, config, scanner_config, parkour) in
        &mut q_characters
    {
        let interact = intent.interact.just_pressed();
        let crouch = intent.crouch.just_pressed();
        if climb.is_engaged() || !(interact || crouch) {
            continue;
        }
        let mut animator = players.animator(&mut binding);
        let mut host = CharacterHost {
            entity,
            transform: &mut transform,
            character: &mut character,
            animator: &mut animator,
            other_owner_active: parkour.is_some_and(ParkourController::in_action),
        };

        let event = B::with_scene(&*scene, |scene| {
            let scanner = EnvironmentScanner::new(scene, *scanner_config).excluding(host.collider_entity());
            if interact {
                if let Some(event) = climb.try_grab_ledge(&scanner, &mut graph, &mut host, config) {
                    return Some(event);
                }
                climb.start_climbing(&scanner, &mut host, config)
            } else {
                climb.try_drop_to_hang(&scanner, &mut graph, &mut host, config)
            }
        })
        .flatten();

        if let Some(event) = event {
            if interact {
                intent.interact.consume();
            } else {
                intent.crouch.consume();
            }
            events.write(TraversalEvent::Climb { entity, event });
        }
    }
}

/// Climb axes of a world-space movement input relative to the character.
fn climb_input(intent: &TraversalIntent, host: &impl TraversalHost) -> ClimbInput {
    ClimbInput {
        lateral: intent.movement.dot(host.right()),
        vertical: intent.movement.dot(host.forward()),
        up_pressed: intent.jump.just_pressed(),
        drop_pressed: intent.drop.just_pressed(),
        finish_pressed: intent.finish.just_pressed(),
    }
}

/// Step every climb controller.
///
/// Runs for idle controllers too, which regenerate stamina and count down
/// the re-grab delay.
#[allow(clippy::type_complexity)]
pub fn climb_actions<B: TraversalBackend>(
    time: Res<Time>,
    scene: StaticSystemParam<B::Scene>,
    graph: Res<ClimbPointGraph>,
    mut q_characters: Query<
        (
            Entity,
            &mut Transform,
            &mut TraversalCharacter,
            &mut AnimationPlayerBinding,
            &mut TraversalIntent,
            &mut ClimbController,
            &ClimbConfig,
            &ScannerConfig,
        ),
        Without<TraversalDisabled>,
    >,
    mut players: AnimationPlayers,
    mut events: EventWriter<TraversalEvent>,
) {
    let dt = time.delta_secs();
    for (entity, mut transform, mut character, mut binding, mut intent, mut climb, config, scanner_config) in
        &mut q_characters
    {
        let engaged = climb.is_engaged();
        let mut animator = players.animator(&mut binding);
        let mut host = CharacterHost {
            entity,
            transform: &mut transform,
            character: &mut character,
            animator: &mut animator,
            other_owner_active: false,
        };
        let input = if engaged {
            climb_input(&intent, &host)
        } else {
            ClimbInput::default()
        };

        let event = B::with_scene(&*scene, |scene| {
            let scanner = EnvironmentScanner::new(scene, *scanner_config).excluding(host.collider_entity());
            climb.tick(dt, input, &scanner, &graph, &mut host, config)
        })
        .flatten();

        if engaged && input.up_pressed {
            intent.jump.consume();
        }
        if let Some(event) = event {
            events.write(TraversalEvent::Climb { entity, event });
        }
    }
}

/// Step jetpack fuel from thrust input.
///
/// Thrust is only requested in the air and while no action owns the
/// character.
pub fn tick_jetpacks(
    time: Res<Time>,
    mut q_jetpacks: Query<
        (&mut SlopeJetpack, &JetpackConfig, &TraversalCharacter, &TraversalIntent),
        Without<TraversalDisabled>,
    >,
) {
    let dt = time.delta_secs();
    for (mut jetpack, config, character, intent) in &mut q_jetpacks {
        let requested = intent.thrust.held() && !character.grounded && !character.is_externally_controlled();
        jetpack.tick(dt, requested, config);
    }
}

/// Integrate velocity for characters with [`SlopeMovement`].
///
/// Characters owned by a traversal action are skipped; their motion comes
/// from the action.
#[allow(clippy::type_complexity)]
pub fn slope_movement(
    time: Res<Time>,
    mut q_characters: Query<
        (
            &mut SlopeMovement,
            &SlopeConfig,
            &mut TraversalCharacter,
            &mut TraversalIntent,
            Option<(&SlopeJetpack, &JetpackConfig)>,
        ),
        Without<TraversalDisabled>,
    >,
) {
    let dt = time.delta_secs();
    for (mut movement, config, mut character, mut intent, jetpack) in &mut q_characters {
        if character.is_externally_controlled() {
            continue;
        }
        let ground = if character.grounded {
            SlopeGround::on(character.ground_normal())
        } else {
            SlopeGround::AIRBORNE
        };
        let thrust = jetpack
            .filter(|(jetpack, _)| jetpack.is_active())
            .map(|(jetpack, jetpack_config)| jetpack.thrust(character.velocity.y, jetpack_config));
        let input = SlopeInput {
            direction: character.move_direction,
            jump_pressed: intent.jump.just_pressed(),
            jump_held: intent.jump.held(),
        };

        let velocity = character.velocity;
        let gravity = character.gravity;
        character.velocity = movement.step(dt, velocity, input, ground, gravity, thrust, config);

        if movement.jumped() {
            intent.jump.consume();
            character.jumping = true;
        }
    }
}

/// Sync state marker components from controller state.
#[allow(clippy::type_complexity)]
pub fn sync_state_markers(
    mut commands: Commands,
    q_characters: Query<
        (
            Entity,
            Option<&ParkourController>,
            Option<&ClimbController>,
            Option<&SlopeMovement>,
            Option<&InParkourAction>,
            Option<&Hanging>,
            Has<ClimbingWall>,
            Has<Skiing>,
        ),
        Or<(With<ParkourController>, With<ClimbController>, With<SlopeMovement>)>,
    >,
) {
    for (entity, parkour, climb, slope, in_action, hanging, has_climbing, has_skiing) in &q_characters {
        let mut entity_commands = commands.entity(entity);

        let action = parkour.filter(|p| p.in_action()).map(ParkourController::current_action);
        match (action, in_action) {
            (Some(action), Some(marker)) if marker.action == action => {}
            (Some(action), _) => {
                entity_commands.insert(InParkourAction { action });
            }
            (None, Some(_)) => {
                entity_commands.remove::<InParkourAction>();
            }
            (None, None) => {}
        }

        let point = climb
            .filter(|c| c.is_hanging())
            .and_then(ClimbController::current_point);
        match (point, hanging) {
            (Some(point), Some(marker)) if marker.point == point => {}
            (Some(point), _) => {
                entity_commands.insert(Hanging { point });
            }
            (None, Some(_)) => {
                entity_commands.remove::<Hanging>();
            }
            (None, None) => {}
        }

        let climbing = climb.is_some_and(ClimbController::is_climbing);
        if climbing && !has_climbing {
            entity_commands.insert(ClimbingWall);
        } else if !climbing && has_climbing {
            entity_commands.remove::<ClimbingWall>();
        }

        let skiing = slope.is_some_and(SlopeMovement::is_skiing);
        if skiing && !has_skiing {
            entity_commands.insert(Skiing);
        } else if !skiing && has_skiing {
            entity_commands.remove::<Skiing>();
        }
    }
}

/// Latch button edges at the end of each fixed tick.
pub fn latch_intents(mut q_intents: Query<&mut TraversalIntent>) {
    for mut intent in &mut q_intents {
        intent.latch();
    }
}

/// Restore host control when a parkour controller is removed mid-action.
pub fn on_parkour_removed(
    trigger: Trigger<OnRemove, ParkourController>,
    mut commands: Commands,
    mut q_characters: Query<(
        &mut ParkourController,
        &mut Transform,
        &mut TraversalCharacter,
        &mut AnimationPlayerBinding,
    )>,
    mut players: AnimationPlayers,
    mut events: EventWriter<TraversalEvent>,
) {
    let entity = trigger.target();
    let Ok((mut parkour, mut transform, mut character, mut binding)) = q_characters.get_mut(entity) else {
        return;
    };
    let mut animator = players.animator(&mut binding);
    let mut host = CharacterHost {
        entity,
        transform: &mut transform,
        character: &mut character,
        animator: &mut animator,
        other_owner_active: false,
    };
    if let Some(end) = parkour.force_stop(&mut host) {
        debug!("parkour controller removed from {entity} mid-action");
        events.write(parkour_event(entity, end));
    }
    commands.entity(entity).try_remove::<InParkourAction>();
}

/// Restore host control when a climb controller is removed mid-hang or
/// mid-climb.
pub fn on_climb_removed(
    trigger: Trigger<OnRemove, ClimbController>,
    mut commands: Commands,
    mut q_characters: Query<(
        &mut ClimbController,
        &ClimbConfig,
        &mut Transform,
        &mut TraversalCharacter,
        &mut AnimationPlayerBinding,
    )>,
    mut players: AnimationPlayers,
    mut events: EventWriter<TraversalEvent>,
) {
    let entity = trigger.target();
    let Ok((mut climb, config, mut transform, mut character, mut binding)) = q_characters.get_mut(entity) else {
        return;
    };
    let mut animator = players.animator(&mut binding);
    let mut host = CharacterHost {
        entity,
        transform: &mut transform,
        character: &mut character,
        animator: &mut animator,
        other_owner_active: false,
    };
    if let Some(event) = climb.force_stop(&mut host, config) {
        debug!("climb controller removed from {entity} mid-climb");
        events.write(TraversalEvent::Climb { entity, event });
    }
    commands.entity(entity).try_remove::<(Hanging, ClimbingWall)>();
}

/// Drop the skiing marker with the slope controller.
pub fn on_slope_removed(trigger: Trigger<OnRemove, SlopeMovement>, mut commands: Commands) {
    commands.entity(trigger.target()).try_remove::<Skiing>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_setup_passes() {
        let caps = SetupCapabilities {
            character: true,
            animator: true,
            parkour: true,
            climb: true,
            slope: true,
            jetpack: true,
        };
        assert!(check_capabilities(caps).is_ok());
        assert!(check_capabilities(SetupCapabilities::default()).is_ok());
    }

    #[test]
    fn controllers_need_an_animator() {
        let caps = SetupCapabilities {
            character: true,
            climb: true,
            ..default()
        };
        assert_eq!(
            check_capabilities(caps),
            Err(TraversalConfigError::MissingCapability {
                controller: "ClimbController",
                requires: "AnimationPlayerBinding",
            })
        );
    }

    #[test]
    fn slope_needs_only_the_character() {
        let caps = SetupCapabilities {
            slope: true,
            ..default()
        };
        assert_eq!(
            check_capabilities(caps),
            Err(TraversalConfigError::MissingCapability {
                controller: "SlopeMovement",
                requires: "TraversalCharacter",
            })
        );

        let caps = SetupCapabilities {
            character: true,
            slope: true,
            ..default()
        };
        assert!(check_capabilities(caps).is_ok());
    }

    #[test]
    fn jetpack_needs_the_integrator() {
        let caps = SetupCapabilities {
            character: true,
            jetpack: true,
            ..default()
        };
        assert_eq!(
            check_capabilities(caps),
            Err(TraversalConfigError::MissingCapability {
                controller: "SlopeJetpack",
                requires: "SlopeMovement",
            })
        );
    }
}
