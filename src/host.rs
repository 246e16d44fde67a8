//! The character host contract.
//!
//! The traversal controllers never touch a character directly. Everything
//! they need from whoever owns the character goes through [`TraversalHost`],
//! and everything they need from the animation layer goes through
//! [`TraversalAnimator`]. [`CharacterHost`] implements the contract for a
//! Bevy entity.

use bevy::prelude::*;

use crate::collision::CollisionData;
use crate::config::ScannerConfig;
use crate::intent::TraversalIntent;

/// Root pose the animator should blend toward over part of the current clip.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct MatchTarget {
    /// Target root position.
    pub position: Vec3,
    /// Target root rotation.
    pub rotation: Quat,
    /// Normalized time at which blending starts.
    pub start: f32,
    /// Normalized time at which the root reaches the target.
    pub end: f32,
}

impl MatchTarget {
    /// Create a match target over `[start, end]` of the current clip.
    pub fn new(position: Vec3, rotation: Quat, start: f32, end: f32) -> Self {
        Self {
            position,
            rotation,
            start,
            end,
        }
    }
}

/// Animation capabilities the traversal controllers rely on.
pub trait TraversalAnimator {
    /// Play (or cross-fade into) a named state.
    fn play(&mut self, state: &str, cross_fade: f32);

    /// Set a float parameter.
    fn set_float(&mut self, name: &str, value: f32);

    /// Set a bool parameter.
    fn set_bool(&mut self, name: &str, value: bool);

    /// Set an int parameter.
    fn set_int(&mut self, name: &str, value: i32);

    /// Fire a trigger parameter.
    fn set_trigger(&mut self, name: &str);

    /// Name of the state currently playing. During a cross-fade this is
    /// still the source state.
    fn current_state(&self) -> Option<&str>;

    /// Playback progress of the current state (1.0 = end of clip).
    fn normalized_time(&self) -> f32;

    /// Whether a cross-fade is in progress.
    fn is_in_transition(&self) -> bool;

    /// Blend the root toward `target` over its normalized-time window.
    fn match_target(&mut self, target: MatchTarget);

    /// Drop any pending match target.
    fn clear_match_target(&mut self);

    /// Whether `state` is the state currently playing.
    fn is_in_state(&self, state: &str) -> bool {
        self.current_state() == Some(state)
    }
}

/// Capabilities the traversal controllers require from the character owner.
pub trait TraversalHost {
    /// Root position (feet).
    fn position(&self) -> Vec3;

    /// Root rotation.
    fn rotation(&self) -> Quat;

    /// Current velocity.
    fn velocity(&self) -> Vec3;

    /// Whether the character stands on ground.
    fn is_grounded(&self) -> bool;

    /// Magnitude of gravity acting on the character.
    fn gravity(&self) -> f32;

    /// Direction the character is trying to move in (world space).
    fn move_direction(&self) -> Vec3;

    /// Host veto over starting a new traversal action.
    fn prevent_action(&self) -> bool;

    /// The character's animator.
    fn animator(&mut self) -> &mut dyn TraversalAnimator;

    /// Suspend host locomotion and hand root control to the traversal core.
    fn on_action_start(&mut self);

    /// Resume host locomotion.
    fn on_action_end(&mut self);

    /// Apply a displacement, respecting collision.
    fn move_by(&mut self, delta: Vec3);

    /// Place the root directly (used by interpolated transitions).
    fn set_position(&mut self, position: Vec3);

    /// Rotate the root directly (used by interpolated transitions).
    fn set_rotation(&mut self, rotation: Quat);

    /// Start the host's own jump.
    fn handle_vertical_jump(&mut self);

    /// Whether the host jump started by [`Self::handle_vertical_jump`] is
    /// still in progress.
    fn is_jumping(&self) -> bool;

    /// Entity the probes should ignore (the character's own collider).
    fn collider_entity(&self) -> Option<Entity> {
        None
    }

    /// Facing direction.
    fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }

    /// Right-hand direction.
    fn right(&self) -> Vec3 {
        self.rotation() * Vec3::X
    }
}

/// Host-side state of a traversing character.
///
/// The character's own locomotion writes the movement fields; the backend
/// sensors keep the ground fields current; the traversal core flips
/// `external_control` through the start/end hooks and accumulates motion.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
#[require(ScannerConfig, TraversalIntent)]
pub struct TraversalCharacter {
    /// Whether the character stands on ground.
    pub grounded: bool,
    /// Ground hit from the last sensor pass.
    #[reflect(ignore)]
    pub ground: Option<CollisionData>,
    /// Magnitude of gravity.
    pub gravity: f32,
    /// Current velocity.
    pub velocity: Vec3,
    /// Direction the character is trying to move in.
    pub move_direction: Vec3,
    /// Veto over starting traversal actions (combat, vehicles, ...).
    pub prevent_action: bool,
    /// Upward speed of the host jump.
    pub jump_speed: f32,
    /// Length of the ground probe below the origin.
    pub ground_probe_length: f32,

    pub(crate) external_control: bool,
    pub(crate) jumping: bool,
    pub(crate) pending_motion: Vec3,
}

impl Default for TraversalCharacter {
    fn default() -> Self {
        Self {
            grounded: false,
            ground: None,
            gravity: 9.81,
            velocity: Vec3::ZERO,
            move_direction: Vec3::ZERO,
            prevent_action: false,
            jump_speed: 5.0,
            ground_probe_length: 0.15,
            external_control: false,
            jumping: false,
            pending_motion: Vec3::ZERO,
        }
    }
}

impl TraversalCharacter {
    /// Create a character state with default gravity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set gravity magnitude.
    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    /// Builder: set the host jump speed.
    pub fn with_jump_speed(mut self, speed: f32) -> Self {
        self.jump_speed = speed;
        self
    }

    /// Whether a traversal action currently owns the character.
    pub fn is_externally_controlled(&self) -> bool {
        self.external_control
    }

    /// Whether the host jump is in progress.
    pub fn is_jumping(&self) -> bool {
        self.jumping
    }

    /// Ground normal, or world up when no ground is known.
    pub fn ground_normal(&self) -> Vec3 {
        self.ground.map(|g| g.normal).unwrap_or(Vec3::Y)
    }

    /// Displacement accumulated this tick.
    pub fn pending_motion(&self) -> Vec3 {
        self.pending_motion
    }

    /// Accumulate a displacement to be applied by the backend.
    pub fn add_motion(&mut self, delta: Vec3) {
        self.pending_motion += delta;
    }

    /// Take the accumulated displacement, leaving zero.
    pub fn take_motion(&mut self) -> Vec3 {
        std::mem::take(&mut self.pending_motion)
    }

    /// Record a ground probe result and resolve jump landing.
    pub fn set_ground(&mut self, ground: Option<CollisionData>) {
        self.ground = ground;
        let rising = self.jumping && self.velocity.y > 0.0;
        self.grounded = !rising && ground.is_some_and(|g| g.distance <= self.ground_probe_length);
        if self.grounded && self.velocity.y <= 0.0 {
            self.jumping = false;
        }
    }
}

/// [`TraversalHost`] implementation over a character entity's components.
pub struct CharacterHost<'a> {
    /// The character entity.
    pub entity: Entity,
    /// Root transform.
    pub transform: &'a mut Transform,
    /// Host-side state.
    pub character: &'a mut TraversalCharacter,
    /// The character's animator.
    pub animator: &'a mut dyn TraversalAnimator,
    /// Another traversal controller on the same entity currently owns it.
    pub other_owner_active: bool,
}

impl TraversalHost for CharacterHost<'_> {
    fn position(&self) -> Vec3 {
        self.transform.translation
    }

    fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    fn velocity(&self) -> Vec3 {
        self.character.velocity
    }

    fn is_grounded(&self) -> bool {
        self.character.grounded
    }

    fn gravity(&self) -> f32 {
        self.character.gravity
    }

    fn move_direction(&self) -> Vec3 {
        self.character.move_direction
    }

    fn prevent_action(&self) -> bool {
        self.character.prevent_action || self.other_owner_active
    }

    fn animator(&mut self) -> &mut dyn TraversalAnimator {
        &mut *self.animator
    }

    fn on_action_start(&mut self) {
        self.character.external_control = true;
        self.character.velocity = Vec3::ZERO;
        self.character.pending_motion = Vec3::ZERO;
    }

    fn on_action_end(&mut self) {
        self.character.external_control = false;
    }

    fn move_by(&mut self, delta: Vec3) {
        self.character.add_motion(delta);
    }

    fn set_position(&mut self, position: Vec3) {
        self.transform.translation = position;
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
    }

    fn handle_vertical_jump(&mut self) {
        self.character.velocity.y = self.character.jump_speed;
        self.character.jumping = true;
        self.character.grounded = false;
    }

    fn is_jumping(&self) -> bool {
        self.character.jumping
    }

    fn collider_entity(&self) -> Option<Entity> {
        Some(self.entity)
    }
}

/// Rotation whose forward (-Z) looks along `direction`, keeping `Vec3::Y` up.
///
/// Falls back to identity for a degenerate direction.
pub fn look_rotation(direction: Vec3) -> Quat {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() < 1e-6 {
        return Quat::IDENTITY;
    }
    Transform::IDENTITY.looking_to(flat, Vec3::Y).rotation
}
