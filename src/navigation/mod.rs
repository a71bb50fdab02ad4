//! Navigation state: which slide is shown, the dissolve in progress, and
//! the presentation timer
//!
//! Mutations here are plain data updates. Nothing in this module performs
//! I/O or looks at the clock on its own; callers pass `now` in.

pub mod countdown;

use std::time::{Duration, Instant};

use log::{debug, info};

pub use countdown::{Countdown, CountdownDisplay, CountdownMode, format_clock};

use crate::animation::{Animation, dissolve_progress};
use crate::error::ShowError;

/// Layers lighter than this are folded into the rest. Folding moves at most
/// this much weight in one frame.
pub const MIN_LAYER_WEIGHT: f32 = 1.0 / 512.0;

/// One page's share of the visible frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Layer {
    pub page: usize,
    pub weight: f32,
}

impl Layer {
    #[must_use]
    pub const fn solid(page: usize) -> Self {
        Self { page, weight: 1.0 }
    }
}

/// A dissolve in progress
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub from_index: usize,
    pub to_index: usize,
    pub started_at: Instant,
    /// What was on screen when the dissolve started. A single solid layer
    /// unless the dissolve was retargeted mid-flight.
    pub from: Vec<Layer>,
}

impl Transition {
    /// The visible composition at `progress`
    #[must_use]
    pub fn layers_at(&self, progress: f32) -> Vec<Layer> {
        blend_layers(&self.from, self.to_index, progress)
    }
}

/// Fade `from` out and `to` in.
///
/// `to` gains `progress` of the weight it does not already hold. The same
/// amount is drained from the other layers oldest first (bottom of the
/// stack), so no page changes by more than the progress step between two
/// frames and a run of retargets leaves a bounded stack behind.
#[must_use]
pub fn blend_layers(from: &[Layer], to: usize, progress: f32) -> Vec<Layer> {
    let progress = progress.clamp(0.0, 1.0);
    let held: f32 = from.iter().filter(|l| l.page == to).map(|l| l.weight).sum();
    let mut drain = progress * (1.0 - held).max(0.0);
    let gained = held + drain;

    let mut layers = Vec::with_capacity(from.len() + 1);
    for layer in from.iter().filter(|l| l.page != to) {
        let take = drain.min(layer.weight);
        drain -= take;
        layers.push(Layer {
            page: layer.page,
            weight: layer.weight - take,
        });
    }
    let at = from
        .iter()
        .position(|l| l.page == to)
        .map_or(layers.len(), |i| i.min(layers.len()));
    layers.insert(
        at,
        Layer {
            page: to,
            weight: gained,
        },
    );
    normalize_layers(layers)
}

/// Drop negligible layers and make the weights sum to one. Order is
/// preserved (bottom to top).
#[must_use]
pub fn normalize_layers(mut layers: Vec<Layer>) -> Vec<Layer> {
    layers.retain(|l| l.weight >= MIN_LAYER_WEIGHT);
    let total: f32 = layers.iter().map(|l| l.weight).sum();
    if total > 0.0 {
        for layer in &mut layers {
            layer.weight /= total;
        }
    }
    layers
}

/// Result of a navigation command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavOutcome {
    /// Already there, or clamped at a boundary
    Unchanged,
    /// A dissolve towards `to` started (or `to` became current at once when
    /// the dissolve duration is zero)
    Started { from: usize, to: usize },
    /// The running dissolve now heads for `to`
    Retargeted { to: usize },
}

/// Read-only view of the navigation state for one frame.
///
/// Both windows render from the same snapshot, so they can never disagree
/// about which slide is up.
#[derive(Clone, Debug, PartialEq)]
pub struct NavSnapshot {
    pub page_count: usize,
    pub current_index: usize,
    pub target_index: usize,
    pub animation: Option<Animation>,
    pub countdown: Option<CountdownDisplay>,
}

impl NavSnapshot {
    /// Pages on screen, bottom to top, with their blend weights
    #[must_use]
    pub fn visible_layers(&self) -> Vec<Layer> {
        if self.page_count == 0 {
            return Vec::new();
        }
        match &self.animation {
            Some(animation) => animation.layers(),
            None => vec![Layer::solid(self.current_index)],
        }
    }

    /// The slide after the navigation target, if there is one
    #[must_use]
    pub fn next_index(&self) -> Option<usize> {
        let next = self.target_index + 1;
        (next < self.page_count).then_some(next)
    }
}

/// Current slide, pending dissolve and timer
#[derive(Clone, Debug)]
pub struct NavigationState {
    page_count: usize,
    current_index: usize,
    pending: Option<Transition>,
    countdown: Option<Countdown>,
    dissolve: Duration,
}

impl NavigationState {
    #[must_use]
    pub fn new(page_count: usize, dissolve: Duration) -> Self {
        Self {
            page_count,
            current_index: 0,
            pending: None,
            countdown: None,
            dissolve,
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn dissolve(&self) -> Duration {
        self.dissolve
    }

    #[must_use]
    pub fn pending_transition(&self) -> Option<&Transition> {
        self.pending.as_ref()
    }

    /// Where navigation is heading: the dissolve's destination, or the
    /// current slide when idle
    #[must_use]
    pub fn target_index(&self) -> usize {
        self.pending
            .as_ref()
            .map_or(self.current_index, |t| t.to_index)
    }

    /// Step forward or back, clamped to the deck. Hitting a boundary is not
    /// an error.
    pub fn advance(&mut self, delta: isize, now: Instant) -> NavOutcome {
        if self.page_count == 0 {
            return NavOutcome::Unchanged;
        }
        let last = self.page_count - 1;
        let target = self.target_index().saturating_add_signed(delta).min(last);
        self.go_to(target, now)
    }

    /// Go to a slide by index
    pub fn jump(&mut self, index: usize, now: Instant) -> Result<NavOutcome, ShowError> {
        if index >= self.page_count {
            return Err(ShowError::OutOfRange {
                index,
                len: self.page_count,
            });
        }
        Ok(self.go_to(index, now))
    }

    /// Called when the dissolve reaches full progress
    pub fn complete_transition(&mut self) -> Option<usize> {
        let transition = self.pending.take()?;
        self.current_index = transition.to_index;
        debug!("Dissolve settled on slide {}", self.current_index);
        Some(self.current_index)
    }

    fn go_to(&mut self, target: usize, now: Instant) -> NavOutcome {
        if target == self.target_index() {
            return NavOutcome::Unchanged;
        }

        if self.dissolve.is_zero() {
            let from = self.current_index;
            self.pending = None;
            self.current_index = target;
            return NavOutcome::Started { from, to: target };
        }

        match self.pending.take() {
            Some(running) => {
                let progress = dissolve_progress(running.started_at, now, self.dissolve);
                if progress >= 1.0 {
                    // Finished but not yet ticked: settle, then start fresh.
                    self.current_index = running.to_index;
                    return self.start_fresh(target, now);
                }
                // Latest wins: the blend on screen right now becomes the
                // starting point of a full-length dissolve to the new target.
                self.pending = Some(Transition {
                    from_index: self.current_index,
                    to_index: target,
                    started_at: now,
                    from: running.layers_at(progress),
                });
                debug!("Dissolve retargeted to slide {target}");
                NavOutcome::Retargeted { to: target }
            }
            None => self.start_fresh(target, now),
        }
    }

    fn start_fresh(&mut self, target: usize, now: Instant) -> NavOutcome {
        let from = self.current_index;
        if target == from {
            return NavOutcome::Unchanged;
        }
        self.pending = Some(Transition {
            from_index: from,
            to_index: target,
            started_at: now,
            from: vec![Layer::solid(from)],
        });
        debug!("Dissolve {from} -> {target}");
        NavOutcome::Started { from, to: target }
    }

    // === Countdown ===

    #[must_use]
    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    /// Start a fresh timer, replacing any previous one
    pub fn start_countdown(&mut self, duration: Duration, mode: CountdownMode, now: Instant) {
        let mut countdown = Countdown::new(duration, mode);
        countdown.resume(now);
        info!("Countdown started: {} ({mode:?})", format_clock(duration, false));
        self.countdown = Some(countdown);
    }

    pub fn pause_countdown(&mut self, now: Instant) {
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.pause(now);
            info!("Countdown paused");
        }
    }

    pub fn resume_countdown(&mut self, now: Instant) {
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.resume(now);
            info!("Countdown resumed");
        }
    }

    /// Pause a running timer, resume a paused one
    pub fn toggle_countdown(&mut self, now: Instant) {
        match self.countdown.as_ref().map(Countdown::is_running) {
            Some(true) => self.pause_countdown(now),
            Some(false) => self.resume_countdown(now),
            None => {}
        }
    }

    pub fn reset_countdown(&mut self, now: Instant) {
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.reset(now);
            info!("Countdown reset");
        }
    }

    #[must_use]
    pub fn countdown_display(&self, now: Instant) -> Option<CountdownDisplay> {
        self.countdown.as_ref().map(|c| c.display(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D: Duration = Duration::from_millis(350);

    fn nav(pages: usize) -> NavigationState {
        NavigationState::new(pages, D)
    }

    #[test]
    fn advance_clamps_at_both_ends() {
        let t0 = Instant::now();
        let mut state = NavigationState::new(3, Duration::ZERO);

        assert_eq!(state.advance(-1, t0), NavOutcome::Unchanged);
        assert_eq!(state.current_index(), 0);

        state.advance(1, t0);
        state.advance(1, t0);
        assert_eq!(state.current_index(), 2);
        assert_eq!(state.advance(1, t0), NavOutcome::Unchanged);
        assert_eq!(state.current_index(), 2);
    }

    #[test]
    fn advance_on_empty_deck_is_a_no_op() {
        let mut state = nav(0);
        assert_eq!(state.advance(1, Instant::now()), NavOutcome::Unchanged);
    }

    #[test]
    fn jump_out_of_range_leaves_state_unchanged() {
        let t0 = Instant::now();
        let mut state = nav(5);
        state.advance(1, t0);

        let err = state.jump(5, t0).unwrap_err();
        assert!(matches!(err, ShowError::OutOfRange { index: 5, len: 5 }));
        assert_eq!(state.current_index(), 0);
        assert_eq!(state.target_index(), 1);
    }

    #[test]
    fn advance_starts_a_dissolve_without_moving_current() {
        let t0 = Instant::now();
        let mut state = nav(5);

        assert_eq!(state.advance(1, t0), NavOutcome::Started { from: 0, to: 1 });
        assert_eq!(state.current_index(), 0);
        assert_eq!(state.target_index(), 1);

        assert_eq!(state.complete_transition(), Some(1));
        assert_eq!(state.current_index(), 1);
        assert!(state.pending_transition().is_none());
    }

    #[test]
    fn retarget_keeps_the_visible_blend() {
        let t0 = Instant::now();
        let mut state = nav(5);
        state.advance(1, t0);

        let halfway = t0 + D / 2;
        let before = state.pending_transition().unwrap().layers_at(0.5);

        assert_eq!(state.advance(1, halfway), NavOutcome::Retargeted { to: 2 });
        let after = state.pending_transition().unwrap();
        assert_eq!(after.to_index, 2);
        assert_eq!(after.started_at, halfway);

        // At progress zero the new dissolve shows exactly what was on screen.
        let start = after.layers_at(0.0);
        assert_eq!(start.len(), before.len());
        for (a, b) in start.iter().zip(&before) {
            assert_eq!(a.page, b.page);
            assert!((a.weight - b.weight).abs() < 1e-6);
        }
    }

    #[test]
    fn retarget_after_full_progress_settles_first() {
        let t0 = Instant::now();
        let mut state = nav(5);
        state.advance(1, t0);

        let outcome = state.advance(1, t0 + D * 2);
        assert_eq!(outcome, NavOutcome::Started { from: 1, to: 2 });
        assert_eq!(state.current_index(), 1);
    }

    #[test]
    fn advance_is_relative_to_the_target() {
        let t0 = Instant::now();
        let mut state = nav(5);
        state.advance(1, t0);
        state.advance(1, t0);
        state.advance(1, t0);
        assert_eq!(state.target_index(), 3);
    }

    #[test]
    fn negligible_layers_are_folded() {
        let layers = normalize_layers(vec![
            Layer { page: 0, weight: 0.0005 },
            Layer { page: 1, weight: 0.4995 },
            Layer { page: 2, weight: 0.5 },
        ]);
        assert_eq!(layers.len(), 2);
        assert!(layers.iter().all(|l| l.page != 0));
        let total: f32 = layers.iter().map(|l| l.weight).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn blend_drains_the_oldest_layer_first() {
        let from = [
            Layer { page: 0, weight: 0.25 },
            Layer { page: 1, weight: 0.75 },
        ];
        let layers = blend_layers(&from, 2, 0.5);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].page, 1);
        assert!((layers[0].weight - 0.5).abs() < 1e-6);
        assert_eq!(layers[1].page, 2);
        assert!((layers[1].weight - 0.5).abs() < 1e-6);
    }

    #[test]
    fn blend_back_to_a_fading_page_keeps_its_weight() {
        let from = [
            Layer { page: 3, weight: 0.6 },
            Layer { page: 4, weight: 0.4 },
        ];
        let start = blend_layers(&from, 3, 0.0);
        assert_eq!(start.len(), 2);
        for (a, b) in start.iter().zip(&from) {
            assert_eq!(a.page, b.page);
            assert!((a.weight - b.weight).abs() < 1e-6);
        }

        let done = blend_layers(&from, 3, 1.0);
        assert_eq!(done, vec![Layer::solid(3)]);
    }

    #[test]
    fn toggle_countdown_pauses_and_resumes() {
        let t0 = Instant::now();
        let mut state = nav(1);
        state.start_countdown(Duration::from_secs(60), CountdownMode::Down, t0);

        state.toggle_countdown(t0 + Duration::from_secs(10));
        let shown = state.countdown_display(t0 + Duration::from_secs(30)).unwrap();
        assert_eq!(shown.text, "00:50");
        assert!(!shown.running);

        state.toggle_countdown(t0 + Duration::from_secs(30));
        let shown = state.countdown_display(t0 + Duration::from_secs(35)).unwrap();
        assert_eq!(shown.text, "00:45");
    }
}
