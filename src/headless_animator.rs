//! Scripted animator for unit tests.
//!
//! Steps cross-fades and clip time from fixed clip lengths, so controllers
//! can be driven without an animation player.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::animation::{AnimatorParameters, RootMatch};
use crate::host::{MatchTarget, TraversalAnimator};

/// Clip lengths by state name.
#[derive(Debug, Clone)]
pub(crate) struct ClipLibrary {
    lengths: HashMap<String, f32>,
    default_length: f32,
}

impl Default for ClipLibrary {
    fn default() -> Self {
        Self {
            lengths: HashMap::new(),
            default_length: 1.0,
        }
    }
}

impl ClipLibrary {
    pub(crate) fn with_clip(mut self, state: impl Into<String>, seconds: f32) -> Self {
        self.lengths.insert(state.into(), seconds.max(f32::EPSILON));
        self
    }

    fn length(&self, state: &str) -> f32 {
        self.lengths.get(state).copied().unwrap_or(self.default_length)
    }
}

#[derive(Debug, Clone)]
struct Transition {
    target: String,
    remaining: f32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct AnimatorState {
    current: Option<String>,
    normalized_time: f32,
    transition: Option<Transition>,
    parameters: AnimatorParameters,
    root_match: RootMatch,
}

impl AnimatorState {
    pub(crate) fn playing(state: impl Into<String>) -> Self {
        Self {
            current: Some(state.into()),
            ..default()
        }
    }

    pub(crate) fn take_trigger(&mut self, name: &str) -> bool {
        self.parameters.take_trigger(name)
    }

    pub(crate) fn match_request(&self) -> Option<MatchTarget> {
        self.root_match.request()
    }

    /// Step transitions and playback time by `dt` seconds.
    pub(crate) fn advance(&mut self, dt: f32, clips: &ClipLibrary) {
        if let Some(transition) = self.transition.as_mut() {
            transition.remaining -= dt;
            if transition.remaining <= 0.0 {
                let target = std::mem::take(&mut transition.target);
                self.transition = None;
                self.current = Some(target);
                self.normalized_time = 0.0;
                return;
            }
        }
        if let Some(current) = self.current.as_deref() {
            self.normalized_time += dt / clips.length(current);
        }
    }

    pub(crate) fn apply_root_match(&mut self, transform: &mut Transform) {
        let in_transition = self.transition.is_some();
        self.root_match
            .apply(self.normalized_time, in_transition, transform);
    }
}

impl TraversalAnimator for AnimatorState {
    fn play(&mut self, state: &str, cross_fade: f32) {
        if cross_fade <= 0.0 || self.current.is_none() {
            self.current = Some(state.to_string());
            self.normalized_time = 0.0;
            self.transition = None;
        } else {
            self.transition = Some(Transition {
                target: state.to_string(),
                remaining: cross_fade,
            });
        }
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.parameters.set_float(name, value);
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        self.parameters.set_bool(name, value);
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.parameters.set_int(name, value);
    }

    fn set_trigger(&mut self, name: &str) {
        self.parameters.set_trigger(name);
    }

    fn current_state(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn normalized_time(&self) -> f32 {
        self.normalized_time
    }

    fn is_in_transition(&self) -> bool {
        self.transition.is_some()
    }

    fn match_target(&mut self, target: MatchTarget) {
        self.root_match.set(target);
    }

    fn clear_match_target(&mut self) {
        self.root_match.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_fade_keeps_source_state_until_done() {
        let clips = ClipLibrary::default();
        let mut animator = AnimatorState::playing("Idle");
        animator.play("Vault", 0.25);
        assert!(animator.is_in_state("Idle"));

        animator.advance(0.25, &clips);
        assert!(!animator.is_in_transition());
        assert!(animator.is_in_state("Vault"));
        assert_eq!(animator.normalized_time(), 0.0);
    }

    #[test]
    fn normalized_time_uses_clip_length() {
        let clips = ClipLibrary::default().with_clip("Vault", 2.0);
        let mut animator = AnimatorState::playing("Vault");

        animator.advance(0.5, &clips);
        assert!((animator.normalized_time() - 0.25).abs() < 1e-6);
    }
}
