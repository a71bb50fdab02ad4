//! Dissolve animation engine
//!
//! Two states: idle, or dissolving from one composition to a target page
//! over a fixed duration. Progress is linear in time and the blend is a
//! linear alpha interpolation, `alpha = progress`.

use std::time::{Duration, Instant};

use crate::navigation::{Layer, NavigationState, blend_layers};

/// Progress of a dissolve that started at `started_at`, in `[0, 1]`.
///
/// Exactly `1.0` at and after `started_at + duration`.
#[must_use]
pub fn dissolve_progress(started_at: Instant, now: Instant, duration: Duration) -> f32 {
    if duration.is_zero() {
        return 1.0;
    }
    let elapsed = now.saturating_duration_since(started_at);
    if elapsed >= duration {
        return 1.0;
    }
    (elapsed.as_secs_f32() / duration.as_secs_f32()).clamp(0.0, 1.0)
}

/// One frame of a dissolve
#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    pub from: Vec<Layer>,
    pub to_index: usize,
    pub progress: f32,
}

impl Animation {
    /// Visible pages with weights for this frame, bottom to top
    #[must_use]
    pub fn layers(&self) -> Vec<Layer> {
        blend_layers(&self.from, self.to_index, self.progress)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AnimationState {
    #[default]
    Idle,
    Dissolving {
        from_index: usize,
        to_index: usize,
        started_at: Instant,
    },
}

/// Outcome of one engine tick
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationTick {
    pub animation: Option<Animation>,
    /// Set on the tick the dissolve finished, with the slide it landed on
    pub completed: Option<usize>,
}

#[derive(Debug, Default)]
pub struct AnimationEngine {
    state: AnimationState,
}

impl AnimationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> AnimationState {
        self.state
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        matches!(self.state, AnimationState::Dissolving { .. })
    }

    /// Advance to `now`. On completion the navigation state settles on the
    /// target and the engine goes back to idle.
    pub fn tick(&mut self, nav: &mut NavigationState, now: Instant) -> AnimationTick {
        let Some(transition) = nav.pending_transition() else {
            self.state = AnimationState::Idle;
            return AnimationTick {
                animation: None,
                completed: None,
            };
        };

        let progress = dissolve_progress(transition.started_at, now, nav.dissolve());
        if progress >= 1.0 {
            let completed = nav.complete_transition();
            self.state = AnimationState::Idle;
            return AnimationTick {
                animation: None,
                completed,
            };
        }

        self.state = AnimationState::Dissolving {
            from_index: transition.from_index,
            to_index: transition.to_index,
            started_at: transition.started_at,
        };
        AnimationTick {
            animation: Some(Animation {
                from: transition.from.clone(),
                to_index: transition.to_index,
                progress,
            }),
            completed: None,
        }
    }
}

/// Opacities for drawing weighted layers one over another with source-over
/// compositing so the result equals the weighted sum.
///
/// Layer `k` is drawn with `w_k / (w_0 + ... + w_k)`; the first is opaque.
#[must_use]
pub fn stacking_opacities(layers: &[Layer]) -> Vec<f32> {
    let mut running = 0.0f32;
    layers
        .iter()
        .map(|layer| {
            running += layer.weight;
            if running <= 0.0 {
                0.0
            } else {
                (layer.weight / running).clamp(0.0, 1.0)
            }
        })
        .collect()
}
