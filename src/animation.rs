//! Animation bridge.
//!
//! Controllers talk to animation through [`TraversalAnimator`]. For a Bevy
//! character that is a [`PlayerAnimator`]: an [`AnimationPlayerBinding`] on
//! the character maps traversal state names to nodes of the
//! [`AnimationGraph`] driven by an [`AnimationPlayer`] (usually on a child
//! entity of the loaded scene). State changes go through
//! [`AnimationTransitions`] so cross-fades blend on the player side.
//!
//! The binding keeps what the player has no notion of: parameters, the
//! state reported as current during a cross-fade, and root matching.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use bevy::animation::graph::{AnimationGraph, AnimationGraphHandle, AnimationNodeIndex, AnimationNodeType};
use bevy::animation::transition::AnimationTransitions;
use bevy::animation::{AnimationClip, AnimationPlayer};
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;

use crate::host::{MatchTarget, TraversalAnimator};

/// Float, bool, int and trigger parameters written by the controllers.
///
/// The game's own animation logic reads them back; triggers stay set until
/// consumed.
#[derive(Debug, Clone, Default)]
pub struct AnimatorParameters {
    floats: HashMap<String, f32>,
    bools: HashMap<String, bool>,
    ints: HashMap<String, i32>,
    triggers: HashSet<String>,
}

impl AnimatorParameters {
    /// Value of a float parameter.
    pub fn float(&self, name: &str) -> Option<f32> {
        self.floats.get(name).copied()
    }

    /// Value of a bool parameter.
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.bools.get(name).copied()
    }

    /// Value of an int parameter.
    pub fn int(&self, name: &str) -> Option<i32> {
        self.ints.get(name).copied()
    }

    /// Consume a fired trigger, returning whether it was set.
    pub fn take_trigger(&mut self, name: &str) -> bool {
        self.triggers.remove(name)
    }

    pub(crate) fn set_float(&mut self, name: &str, value: f32) {
        self.floats.insert(name.to_string(), value);
    }

    pub(crate) fn set_bool(&mut self, name: &str, value: bool) {
        self.bools.insert(name.to_string(), value);
    }

    pub(crate) fn set_int(&mut self, name: &str, value: i32) {
        self.ints.insert(name.to_string(), value);
    }

    pub(crate) fn set_trigger(&mut self, name: &str) {
        self.triggers.insert(name.to_string());
    }
}

/// A pending root match and the pose it blends from.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootMatch {
    request: Option<MatchTarget>,
    origin: Option<(Vec3, Quat)>,
}

impl RootMatch {
    /// Pending match target, if any.
    pub fn request(&self) -> Option<MatchTarget> {
        self.request
    }

    pub(crate) fn set(&mut self, target: MatchTarget) {
        self.request = Some(target);
        self.origin = None;
    }

    pub(crate) fn clear(&mut self) {
        self.request = None;
        self.origin = None;
    }

    /// Blend `transform` toward the pending target at `normalized_time`.
    ///
    /// Blending starts from the pose held when the clip first reaches the
    /// window start and lands exactly on the target at the window end. Nothing
    /// moves during a cross-fade.
    pub fn apply(&mut self, normalized_time: f32, in_transition: bool, transform: &mut Transform) {
        let Some(target) = self.request else {
            return;
        };
        if in_transition || normalized_time < target.start {
            return;
        }

        let (origin, origin_rotation) = *self
            .origin
            .get_or_insert((transform.translation, transform.rotation));

        let span = target.end - target.start;
        let alpha = if span <= f32::EPSILON {
            1.0
        } else {
            ((normalized_time - target.start) / span).clamp(0.0, 1.0)
        };

        transform.translation = origin.lerp(target.position, alpha);
        transform.rotation = origin_rotation.slerp(target.rotation, alpha);

        if alpha >= 1.0 {
            self.clear();
        }
    }
}

#[derive(Debug, Clone)]
struct Fade {
    target: String,
    remaining: f32,
}

/// Links a traversal character to the [`AnimationPlayer`] that animates it.
#[derive(Component, Debug, Clone)]
pub struct AnimationPlayerBinding {
    player: Entity,
    nodes: HashMap<String, AnimationNodeIndex>,
    current: Option<String>,
    fade: Option<Fade>,
    parameters: AnimatorParameters,
    root_match: RootMatch,
}

impl AnimationPlayerBinding {
    /// Bind to the player on `player` with no states mapped yet.
    pub fn new(player: Entity) -> Self {
        Self {
            player,
            nodes: HashMap::new(),
            current: None,
            fade: None,
            parameters: AnimatorParameters::default(),
            root_match: RootMatch::default(),
        }
    }

    /// Add one clip node per state to `graph` under its root and bind them.
    pub fn from_clips<S: Into<String>>(
        player: Entity,
        graph: &mut AnimationGraph,
        clips: impl IntoIterator<Item = (S, Handle<AnimationClip>)>,
    ) -> Self {
        let mut binding = Self::new(player);
        for (state, clip) in clips {
            let node = graph.add_clip(clip, 1.0, graph.root);
            binding.insert_state(state, node);
        }
        binding
    }

    /// Builder: map `state` to a graph node.
    pub fn with_state(mut self, state: impl Into<String>, node: AnimationNodeIndex) -> Self {
        self.insert_state(state, node);
        self
    }

    /// Map `state` to a graph node.
    pub fn insert_state(&mut self, state: impl Into<String>, node: AnimationNodeIndex) {
        self.nodes.insert(state.into(), node);
    }

    /// Entity carrying the [`AnimationPlayer`].
    pub fn player(&self) -> Entity {
        self.player
    }

    /// Graph node mapped to `state`.
    pub fn node(&self, state: &str) -> Option<AnimationNodeIndex> {
        self.nodes.get(state).copied()
    }

    /// Parameters written by the controllers.
    pub fn parameters(&self) -> &AnimatorParameters {
        &self.parameters
    }

    /// Mutable parameters, for consuming triggers.
    pub fn parameters_mut(&mut self) -> &mut AnimatorParameters {
        &mut self.parameters
    }

    /// Pending root match target, if any.
    pub fn match_request(&self) -> Option<MatchTarget> {
        self.root_match.request()
    }

    fn begin(&mut self, state: &str, cross_fade: f32) {
        if cross_fade <= 0.0 || self.current.is_none() {
            self.current = Some(state.to_string());
            self.fade = None;
        } else {
            self.fade = Some(Fade {
                target: state.to_string(),
                remaining: cross_fade,
            });
        }
    }

    /// Count down a running cross-fade by `dt` seconds.
    pub fn advance_fade(&mut self, dt: f32) {
        let Some(fade) = self.fade.as_mut() else {
            return;
        };
        fade.remaining -= dt;
        if fade.remaining <= 0.0 {
            let target = std::mem::take(&mut fade.target);
            self.fade = None;
            self.current = Some(target);
        }
    }
}

/// [`TraversalAnimator`] over a binding and its player.
///
/// Without a player (not spawned yet, or the entity lost it) states are
/// still tracked and every clip reads as finished, so running sequences
/// end instead of waiting forever.
pub struct PlayerAnimator<'a> {
    binding: &'a mut AnimationPlayerBinding,
    player: Option<(&'a mut AnimationPlayer, &'a mut AnimationTransitions)>,
    graph: Option<&'a AnimationGraph>,
    clips: Option<&'a Assets<AnimationClip>>,
}

impl<'a> PlayerAnimator<'a> {
    /// Assemble an animator from its parts.
    pub fn new(
        binding: &'a mut AnimationPlayerBinding,
        player: Option<(&'a mut AnimationPlayer, &'a mut AnimationTransitions)>,
        graph: Option<&'a AnimationGraph>,
        clips: Option<&'a Assets<AnimationClip>>,
    ) -> Self {
        Self {
            binding,
            player,
            graph,
            clips,
        }
    }

    fn clip_duration(&self, node: AnimationNodeIndex) -> Option<f32> {
        let AnimationNodeType::Clip(handle) = &self.graph?.get(node)?.node_type else {
            return None;
        };
        self.clips?.get(handle).map(AnimationClip::duration)
    }

    /// Blend `transform` toward the pending match target.
    pub fn apply_root_match(&mut self, transform: &mut Transform) {
        let normalized_time = self.normalized_time();
        let in_transition = self.is_in_transition();
        self.binding
            .root_match
            .apply(normalized_time, in_transition, transform);
    }
}

impl TraversalAnimator for PlayerAnimator<'_> {
    fn play(&mut self, state: &str, cross_fade: f32) {
        match (self.binding.node(state), self.player.as_mut()) {
            (Some(node), Some((player, transitions))) => {
                transitions.play(player, node, Duration::from_secs_f32(cross_fade.max(0.0)));
            }
            (None, _) => warn!("no animation node bound to state `{state}`"),
            (Some(_), None) => {}
        }
        self.binding.begin(state, cross_fade);
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.binding.parameters.set_float(name, value);
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        self.binding.parameters.set_bool(name, value);
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.binding.parameters.set_int(name, value);
    }

    fn set_trigger(&mut self, name: &str) {
        self.binding.parameters.set_trigger(name);
    }

    fn current_state(&self) -> Option<&str> {
        self.binding.current.as_deref()
    }

    /// Seek time of the current state's clip over the clip duration.
    fn normalized_time(&self) -> f32 {
        let Some(state) = self.binding.current.as_deref() else {
            return 0.0;
        };
        let Some(node) = self.binding.node(state) else {
            return 1.0;
        };
        let Some(active) = self.player.as_ref().and_then(|(player, _)| player.animation(node)) else {
            return 1.0;
        };
        if active.is_finished() {
            return 1.0;
        }
        match self.clip_duration(node) {
            Some(duration) if duration > 0.0 => (active.seek_time() / duration).max(0.0),
            // Clip still loading.
            _ => 0.0,
        }
    }

    fn is_in_transition(&self) -> bool {
        self.binding.fade.is_some()
    }

    fn match_target(&mut self, target: MatchTarget) {
        self.binding.root_match.set(target);
    }

    fn clear_match_target(&mut self) {
        self.binding.root_match.clear();
    }
}

/// Access to every animation player, for building [`PlayerAnimator`]s.
#[derive(SystemParam)]
pub struct AnimationPlayers<'w, 's> {
    players: Query<
        'w,
        's,
        (
            &'static mut AnimationPlayer,
            &'static mut AnimationTransitions,
            Option<&'static AnimationGraphHandle>,
        ),
    >,
    graphs: Option<Res<'w, Assets<AnimationGraph>>>,
    clips: Option<Res<'w, Assets<AnimationClip>>>,
}

impl AnimationPlayers<'_, '_> {
    /// Animator for the character owning `binding`.
    pub fn animator<'a>(&'a mut self, binding: &'a mut AnimationPlayerBinding) -> PlayerAnimator<'a> {
        let graphs = self.graphs.as_deref();
        let clips = self.clips.as_deref();
        let (player, graph) = match self.players.get_mut(binding.player) {
            Ok((player, transitions, handle)) => {
                let graph = handle.and_then(|handle| graphs?.get(&handle.0));
                (Some((player.into_inner(), transitions.into_inner())), graph)
            }
            Err(_) => {
                bevy::log::warn_once!("animation player {} not found", binding.player);
                (None, None)
            }
        };
        PlayerAnimator::new(binding, player, graph, clips)
    }
}

/// Step binding cross-fades and apply root matching.
pub fn drive_animation_bindings(
    time: Res<Time>,
    mut players: AnimationPlayers,
    mut q_bindings: Query<(&mut AnimationPlayerBinding, &mut Transform)>,
) {
    let dt = time.delta_secs();
    for (mut binding, mut transform) in &mut q_bindings {
        binding.advance_fade(dt);
        players.animator(&mut binding).apply_root_match(&mut transform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rig {
        binding: AnimationPlayerBinding,
        player: AnimationPlayer,
        transitions: AnimationTransitions,
        graph: AnimationGraph,
        clips: Assets<AnimationClip>,
    }

    fn clip(clips: &mut Assets<AnimationClip>, seconds: f32) -> Handle<AnimationClip> {
        let mut clip = AnimationClip::default();
        clip.set_duration(seconds);
        clips.add(clip)
    }

    fn rig() -> Rig {
        let mut clips = Assets::<AnimationClip>::default();
        let idle = clip(&mut clips, 1.0);
        let vault = clip(&mut clips, 2.0);
        let mut graph = AnimationGraph::new();
        let binding = AnimationPlayerBinding::from_clips(
            Entity::from_raw(1),
            &mut graph,
            [("Idle", idle), ("Vault", vault)],
        );
        Rig {
            binding,
            player: AnimationPlayer::default(),
            transitions: AnimationTransitions::new(),
            graph,
            clips,
        }
    }

    impl Rig {
        fn animator(&mut self) -> PlayerAnimator<'_> {
            PlayerAnimator::new(
                &mut self.binding,
                Some((&mut self.player, &mut self.transitions)),
                Some(&self.graph),
                Some(&self.clips),
            )
        }
    }

    #[test]
    fn play_starts_bound_node_on_player() {
        let mut rig = rig();
        rig.animator().play("Idle", 0.2);

        let node = rig.binding.node("Idle").expect("Idle is bound");
        assert!(rig.player.animation(node).is_some(), "player runs the Idle node");
        assert_eq!(rig.transitions.get_main_animation(), Some(node));
        assert!(rig.animator().is_in_state("Idle"), "first state has nothing to fade from");
        assert!(!rig.animator().is_in_transition());
    }

    #[test]
    fn normalized_time_is_seek_over_clip_duration() {
        let mut rig = rig();
        rig.animator().play("Vault", 0.0);
        let node = rig.binding.node("Vault").expect("Vault is bound");

        assert_eq!(rig.animator().normalized_time(), 0.0);
        if let Some(active) = rig.player.animation_mut(node) {
            active.seek_to(0.5);
        }
        assert!((rig.animator().normalized_time() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn cross_fade_reports_source_until_done() {
        let mut rig = rig();
        rig.animator().play("Idle", 0.0);
        rig.animator().play("Vault", 0.25);

        let vault = rig.binding.node("Vault");
        assert_eq!(rig.transitions.get_main_animation(), vault, "player blends toward Vault");
        assert!(rig.animator().is_in_transition());
        assert!(rig.animator().is_in_state("Idle"));

        rig.binding.advance_fade(0.125);
        assert!(rig.animator().is_in_transition());
        rig.binding.advance_fade(0.125);
        assert!(!rig.animator().is_in_transition());
        assert!(rig.animator().is_in_state("Vault"));
    }

    #[test]
    fn unbound_state_or_missing_player_reads_finished() {
        let mut rig = rig();
        rig.animator().play("Unknown", 0.0);
        assert!(rig.animator().is_in_state("Unknown"));
        assert_eq!(rig.animator().normalized_time(), 1.0);

        let mut binding = AnimationPlayerBinding::new(Entity::from_raw(2)).with_state("Idle", AnimationNodeIndex::new(1));
        let mut animator = PlayerAnimator::new(&mut binding, None, None, None);
        animator.play("Idle", 0.0);
        assert_eq!(animator.normalized_time(), 1.0);
    }

    #[test]
    fn root_match_follows_player_time() {
        let mut rig = rig();
        let mut transform = Transform::default();
        rig.animator().play("Idle", 0.0);
        let target = MatchTarget::new(Vec3::new(0.0, 1.0, -2.0), Quat::IDENTITY, 0.25, 0.75);
        rig.animator().match_target(target);
        let node = rig.binding.node("Idle").expect("Idle is bound");

        rig.animator().apply_root_match(&mut transform);
        assert_eq!(transform.translation, Vec3::ZERO, "before window start");

        for seek in [0.25, 0.5] {
            if let Some(active) = rig.player.animation_mut(node) {
                active.seek_to(seek);
            }
            rig.animator().apply_root_match(&mut transform);
        }
        assert!((transform.translation - Vec3::new(0.0, 0.5, -1.0)).length() < 1e-4);

        if let Some(active) = rig.player.animation_mut(node) {
            active.seek_to(0.75);
        }
        rig.animator().apply_root_match(&mut transform);
        assert!((transform.translation - target.position).length() < 1e-4);
        assert!(rig.binding.match_request().is_none(), "request cleared at window end");
    }

    #[test]
    fn parameters_and_triggers() {
        let mut rig = rig();
        let mut animator = rig.animator();
        animator.set_float("Speed", 2.5);
        animator.set_bool("Grounded", true);
        animator.set_int("Variant", 3);
        animator.set_trigger("Jump");

        let parameters = rig.binding.parameters_mut();
        assert_eq!(parameters.float("Speed"), Some(2.5));
        assert_eq!(parameters.bool("Grounded"), Some(true));
        assert_eq!(parameters.int("Variant"), Some(3));
        assert!(parameters.take_trigger("Jump"));
        assert!(!parameters.take_trigger("Jump"));
    }
}
