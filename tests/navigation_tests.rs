use std::collections::HashMap;
use std::time::{Duration, Instant};

use pdfdeck::animation::{AnimationEngine, stacking_opacities};
use pdfdeck::navigation::{Layer, MIN_LAYER_WEIGHT, NavOutcome, NavigationState};

const D: Duration = Duration::from_millis(350);

/// Small deterministic generator so failures reproduce
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

#[test]
fn random_input_keeps_state_consistent() {
    for seed in 1..=20 {
        let mut rng = Lcg(seed);
        let pages = 1 + rng.below(9) as usize;
        let mut nav = NavigationState::new(pages, D);
        let mut engine = AnimationEngine::new();
        let mut now = Instant::now();

        for _ in 0..300 {
            match rng.below(4) {
                0 => {
                    let delta = rng.below(5) as isize - 2;
                    nav.advance(delta, now);
                }
                1 => {
                    let index = rng.below(pages as u64 + 2) as usize;
                    let result = nav.jump(index, now);
                    assert_eq!(result.is_err(), index >= pages, "seed {seed}");
                }
                _ => {}
            }
            now += Duration::from_millis(rng.below(120));
            let tick = engine.tick(&mut nav, now);

            assert!(nav.current_index() < pages, "seed {seed}");
            assert!(nav.target_index() < pages, "seed {seed}");

            if let Some(animation) = tick.animation {
                let layers = animation.layers();
                assert!(!layers.is_empty());
                let total: f32 = layers.iter().map(|l| l.weight).sum();
                assert!((total - 1.0).abs() < 1e-3, "seed {seed}: weights sum to {total}");
                assert!(layers.iter().all(|l| l.page < pages));

                let opacities = stacking_opacities(&layers);
                assert!(opacities.iter().all(|o| (0.0..=1.0).contains(o)));
            }
        }

        // Left alone long enough, every dissolve settles on the target.
        let target = nav.target_index();
        engine.tick(&mut nav, now + D);
        assert_eq!(nav.current_index(), target, "seed {seed}");
        assert!(nav.pending_transition().is_none());
    }
}

#[test]
fn advance_clamps_at_both_ends() {
    let now = Instant::now();
    let mut nav = NavigationState::new(3, Duration::ZERO);
    let mut engine = AnimationEngine::new();

    assert_eq!(nav.advance(-1, now), NavOutcome::Unchanged);
    nav.advance(10, now);
    engine.tick(&mut nav, now);
    assert_eq!(nav.current_index(), 2);
    assert_eq!(nav.advance(1, now), NavOutcome::Unchanged);
}

#[test]
fn rapid_advances_accumulate_on_the_target() {
    let t0 = Instant::now();
    let mut nav = NavigationState::new(10, D);
    let mut engine = AnimationEngine::new();

    nav.advance(1, t0);
    nav.advance(1, t0 + Duration::from_millis(50));
    nav.advance(1, t0 + Duration::from_millis(100));
    assert_eq!(nav.target_index(), 3);
    assert_eq!(nav.current_index(), 0);

    engine.tick(&mut nav, t0 + Duration::from_millis(100) + D);
    assert_eq!(nav.current_index(), 3);
}

#[test]
fn jump_out_of_range_leaves_state_alone() {
    let now = Instant::now();
    let mut nav = NavigationState::new(4, D);

    assert!(nav.jump(4, now).is_err());
    assert_eq!(nav.target_index(), 0);
    assert!(nav.pending_transition().is_none());
}

#[test]
fn empty_deck_never_moves() {
    let now = Instant::now();
    let mut nav = NavigationState::new(0, D);

    assert_eq!(nav.advance(1, now), NavOutcome::Unchanged);
    assert!(nav.jump(0, now).is_err());
    assert_eq!(nav.current_index(), 0);
}

#[test]
fn stepping_through_every_deck_size_stops_at_the_end() {
    for pages in 1..=8 {
        let now = Instant::now();
        let mut nav = NavigationState::new(pages, Duration::ZERO);
        for _ in 1..pages {
            nav.advance(1, now);
        }
        assert_eq!(nav.current_index(), pages - 1);
        assert_eq!(nav.advance(1, now), NavOutcome::Unchanged);
        assert_eq!(nav.current_index(), pages - 1);
    }
}

fn weights(layers: &[Layer]) -> HashMap<usize, f32> {
    let mut out = HashMap::new();
    for layer in layers {
        *out.entry(layer.page).or_insert(0.0) += layer.weight;
    }
    out
}

#[test]
fn held_key_retargets_never_pop() {
    let frame = Duration::from_millis(16);
    let repeat = Duration::from_millis(100);
    // A folded sliver can ride on top of one frame's blend step.
    let step = frame.as_secs_f32() / D.as_secs_f32() + MIN_LAYER_WEIGHT;

    let t0 = Instant::now();
    let mut nav = NavigationState::new(30, D);
    let mut engine = AnimationEngine::new();
    let mut previous = weights(&[Layer::solid(0)]);
    let mut next_press = t0;
    let mut retargets = 0;
    let mut most_layers = 0;

    for n in 1..=200u32 {
        let now = t0 + frame * n;
        // Hold the key for the first 1.2 s, then let the dissolve settle.
        while next_press <= now && next_press < t0 + Duration::from_millis(1200) {
            if matches!(nav.advance(1, next_press), NavOutcome::Retargeted { .. }) {
                retargets += 1;
            }
            next_press += repeat;
        }

        let layers = match engine.tick(&mut nav, now).animation {
            Some(animation) => animation.layers(),
            None => vec![Layer::solid(nav.current_index())],
        };
        most_layers = most_layers.max(layers.len());
        let current = weights(&layers);
        for page in previous.keys().chain(current.keys()) {
            let before = previous.get(page).copied().unwrap_or(0.0);
            let after = current.get(page).copied().unwrap_or(0.0);
            assert!(
                (after - before).abs() <= step + 1e-4,
                "page {page} jumped from {before} to {after} at frame {n}"
            );
        }
        previous = current;
    }

    assert!(retargets >= 5, "only {retargets} retargets");
    assert!(most_layers <= 6, "stack grew to {most_layers} layers");
    assert_eq!(nav.current_index(), nav.target_index());
    assert!(nav.pending_transition().is_none());
}
