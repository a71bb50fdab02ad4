//! Dual-window coordinator: one clock, one navigation state, two windows
//!
//! Every tick reads the clock once, advances the dissolve, then composes
//! both windows from the same [`NavSnapshot`]. Neither window can run ahead
//! of the other because nothing mutates navigation between the two
//! compose calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::animation::{Animation, AnimationEngine};
use crate::cache::{CacheConfig, Focus, PageCache};
use crate::clock::Clock;
use crate::deck::{Deck, DeckSource, Resolution};
use crate::display::{Display, Size, SurfaceId, WindowRole};
use crate::error::ShowError;
use crate::input::{Command, InputRouter, RepeatPolicy};
use crate::navigation::{CountdownMode, NavOutcome, NavSnapshot, NavigationState};
use crate::render::{Compositor, Resources, Style, WindowLayout};
use crate::settings::Settings;

/// How long startup waits for the first slide before showing placeholders
const STARTUP_WAIT: Duration = Duration::from_secs(2);

/// Everything the coordinator needs to know up front
#[derive(Clone, Debug, PartialEq)]
pub struct ShowConfig {
    pub dissolve: Duration,
    pub cache: CacheConfig,
    pub repeat: RepeatPolicy,
    pub fast_tick: Duration,
    pub slow_tick: Duration,
    /// Start a countdown of this length with the first frame
    pub countdown: Option<Duration>,
    pub countdown_mode: CountdownMode,
    pub style: Style,
    pub thumbnail_ratio: f32,
    /// Only show the first `n` pages
    pub page_limit: Option<usize>,
    pub audience_size: Size,
    pub presenter_size: Size,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ShowConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let fast_tick = Duration::from_millis(settings.fast_tick_ms.max(1));
        Self {
            dissolve: Duration::from_millis(settings.dissolve_ms),
            cache: CacheConfig {
                max_resident: settings.max_resident_bitmaps,
                prefetch_radius: settings.prefetch_radius,
                workers: settings.workers,
            },
            repeat: RepeatPolicy {
                delay: Duration::from_millis(settings.repeat_delay_ms),
                interval: Duration::from_millis(settings.repeat_interval_ms),
                min_press_gap: fast_tick,
            },
            fast_tick,
            slow_tick: Duration::from_millis(settings.slow_tick_ms).max(fast_tick),
            countdown: None,
            countdown_mode: settings.countdown_mode,
            style: Style {
                placeholder: settings.placeholder_color,
                timer: settings.timer_color,
                overtime: settings.overtime_color,
                ..Style::default()
            },
            thumbnail_ratio: settings.thumbnail_ratio,
            page_limit: None,
            audience_size: Size::new(1920, 1080),
            presenter_size: Size::new(1280, 800),
        }
    }
}

/// What happened during one tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub current_index: usize,
    pub target_index: usize,
    pub animating: bool,
    /// Slide a dissolve settled on during this tick
    pub completed: Option<usize>,
    /// Bitmaps that became resident since the previous tick
    pub produced: usize,
}

#[derive(Debug)]
struct WindowContext {
    role: WindowRole,
    surface: SurfaceId,
    layout: WindowLayout,
}

pub struct Coordinator<D: Display, C: Clock> {
    display: D,
    clock: C,
    deck: Deck,
    nav: NavigationState,
    animation: AnimationEngine,
    cache: PageCache,
    router: InputRouter,
    compositor: Compositor,
    windows: [WindowContext; 2],
    config: ShowConfig,
    frame_no: u64,
    countdown_started: bool,
    quit: bool,
}

impl<D: Display, C: Clock> Coordinator<D, C> {
    /// Load the deck, start the worker pool and open both windows.
    ///
    /// Fails with [`ShowError::LoadFailure`] when the document cannot be
    /// read, or a display error when a window cannot be created.
    pub fn new(
        mut display: D,
        clock: C,
        source: Arc<dyn DeckSource>,
        config: ShowConfig,
    ) -> Result<Self, ShowError> {
        let deck = source.describe()?.limited(config.page_limit);
        info!(
            "Loaded deck{}: {} pages, aspect {:.3}",
            deck.title().map(|t| format!(" \"{t}\"")).unwrap_or_default(),
            deck.len(),
            deck.aspect()
        );

        let mut open = |role: WindowRole, size: Size| -> Result<WindowContext, ShowError> {
            let surface = display.create_window(role, size)?;
            info!("Opened {role} window at {}", surface.size);
            Ok(WindowContext {
                role,
                surface: surface.id,
                layout: WindowLayout::for_role(
                    role,
                    surface.size,
                    deck.aspect(),
                    config.thumbnail_ratio,
                ),
            })
        };
        let windows = [
            open(WindowRole::Audience, config.audience_size)?,
            open(WindowRole::Presenter, config.presenter_size)?,
        ];

        let cache = PageCache::spawn(source, deck.len(), config.cache);

        Ok(Self {
            display,
            clock,
            nav: NavigationState::new(deck.len(), config.dissolve),
            animation: AnimationEngine::new(),
            cache,
            router: InputRouter::new(deck.len(), config.repeat),
            compositor: Compositor::new(config.style),
            windows,
            deck,
            config,
            frame_no: 0,
            countdown_started: false,
            quit: false,
        })
    }

    /// Run until quit. Failures inside the loop are logged, never returned.
    pub fn run(&mut self) {
        if !self.prime(STARTUP_WAIT) {
            warn!("First slide not ready after {STARTUP_WAIT:?}, starting anyway");
        }
        while !self.quit {
            self.tick();
            if self.quit {
                break;
            }
            let timeout = self.frame_interval(self.clock.now());
            self.process_input(timeout);
        }
        info!("Show ended after {} frames", self.frame_no);
    }

    /// Request what the first frame needs and wait for it
    pub fn prime(&mut self, timeout: Duration) -> bool {
        let snapshot = self.snapshot(None, self.clock.now());
        for ctx in &self.windows {
            for key in self.compositor.requirements(&snapshot, &ctx.layout) {
                self.cache.ensure(key.page, key.resolution);
            }
        }
        self.cache.wait_idle(timeout)
    }

    /// Poll the display and apply whatever commands came in
    pub fn process_input(&mut self, timeout: Duration) {
        let events = match self.display.poll_input(timeout) {
            Ok(events) => events,
            Err(e) => {
                warn!("Input polling failed: {e}");
                return;
            }
        };
        for event in events {
            let now = self.clock.now();
            if let Some(command) = self.router.route(event, now) {
                self.handle_command(command, now);
            }
        }
    }

    pub fn handle_command(&mut self, command: Command, now: Instant) {
        debug!("Command {command:?}");
        match command {
            Command::Advance(delta) => {
                let outcome = self.nav.advance(delta, now);
                if outcome == NavOutcome::Unchanged {
                    debug!("Advance by {delta} stays on slide {}", self.nav.target_index());
                }
            }
            Command::Jump(index) => {
                if let Err(e) = self.nav.jump(index, now) {
                    debug!("{e}");
                }
            }
            Command::ToggleCountdown => self.nav.toggle_countdown(now),
            Command::ResetCountdown => self.nav.reset_countdown(now),
            Command::Resize { role, size } => self.resize(role, size),
            Command::Quit => {
                info!("Quit requested");
                self.quit = true;
            }
        }
    }

    /// Render one frame to both windows
    pub fn tick(&mut self) -> FrameReport {
        let now = self.clock.now();

        if !self.countdown_started {
            self.countdown_started = true;
            if let Some(duration) = self.config.countdown {
                self.nav
                    .start_countdown(duration, self.config.countdown_mode, now);
            }
        }

        let produced = self.cache.poll();
        let tick = self.animation.tick(&mut self.nav, now);
        if let Some(index) = tick.completed {
            debug!("Frame {}: settled on slide {index}", self.frame_no);
        }

        let snapshot = self.snapshot(tick.animation, now);
        let focus = self.focus(&snapshot);
        self.cache.set_focus(focus);

        let windows: Vec<_> = self
            .windows
            .iter()
            .map(|ctx| (ctx.role, ctx.surface, ctx.layout))
            .collect();
        for (role, surface, layout) in windows {
            let mut resources = Resources::new();
            for key in self.compositor.requirements(&snapshot, &layout) {
                let lookup = self.cache.ensure(key.page, key.resolution);
                resources.insert(key, lookup);
            }
            self.prefetch_around(&snapshot, &layout);

            let list = self
                .compositor
                .compose(&snapshot, &layout, &resources, self.frame_no);
            if let Err(e) = self.display.submit_frame(surface, &list) {
                warn!("Dropped {role} frame {}: {e}", self.frame_no);
            }
        }
        if let Err(e) = self.display.end_frame() {
            warn!("Frame {} not presented: {e}", self.frame_no);
        }

        let report = FrameReport {
            frame: self.frame_no,
            current_index: snapshot.current_index,
            target_index: snapshot.target_index,
            animating: snapshot.animation.is_some(),
            completed: tick.completed,
            produced,
        };
        self.frame_no += 1;
        report
    }

    /// Re-lay out a window. Bitmaps at resolutions only the old layout
    /// used are dropped and the visible pages are requested again.
    pub fn resize(&mut self, role: WindowRole, size: Size) {
        let aspect = self.deck.aspect();
        let ratio = self.config.thumbnail_ratio;
        let idx = window_slot(role);
        let other = &self.windows[1 - idx].layout;
        let old = self.windows[idx].layout;
        if old.size == size {
            return;
        }

        let layout = WindowLayout::for_role(role, size, aspect, ratio);
        let keep: Vec<Resolution> = layout
            .resolutions()
            .into_iter()
            .chain(other.resolutions())
            .collect();
        for resolution in old.resolutions() {
            if keep.contains(&resolution) {
                continue;
            }
            let removed = self.cache.invalidate_resolution(resolution);
            info!("{role} window left {resolution}: dropped {removed} bitmaps");
        }
        self.windows[idx].layout = layout;
        info!("{role} window resized to {size}");

        let snapshot = self.snapshot(None, self.clock.now());
        for key in self.compositor.requirements(&snapshot, &layout) {
            self.cache.ensure(key.page, key.resolution);
        }
    }

    /// Block until outstanding rasterizations finish
    pub fn settle(&mut self, timeout: Duration) -> bool {
        self.cache.wait_idle(timeout)
    }

    /// Short while anything is moving, long when idle
    #[must_use]
    pub fn frame_interval(&self, now: Instant) -> Duration {
        if self.animation.is_animating()
            || self.nav.pending_transition().is_some()
            || self.router.is_holding(now)
            || self.cache.is_busy()
        {
            self.config.fast_tick
        } else {
            self.config.slow_tick
        }
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    #[must_use]
    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    #[must_use]
    pub fn navigation(&self) -> &NavigationState {
        &self.nav
    }

    #[must_use]
    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    #[must_use]
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    #[must_use]
    pub fn layout(&self, role: WindowRole) -> &WindowLayout {
        &self.windows[window_slot(role)].layout
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_no
    }

    fn snapshot(&self, animation: Option<Animation>, now: Instant) -> NavSnapshot {
        NavSnapshot {
            page_count: self.nav.page_count(),
            current_index: self.nav.current_index(),
            target_index: self.nav.target_index(),
            animation,
            countdown: self.nav.countdown_display(now),
        }
    }

    fn focus(&self, snapshot: &NavSnapshot) -> Focus {
        let active = self
            .windows
            .iter()
            .flat_map(|ctx| ctx.layout.resolutions())
            .collect();
        let target = snapshot.target_index;
        Focus::new(snapshot.current_index, active).with_pinned(
            snapshot
                .visible_layers()
                .iter()
                .map(|layer| layer.page)
                .chain([target, target + 1]),
        )
    }

    fn prefetch_around(&mut self, snapshot: &NavSnapshot, layout: &WindowLayout) {
        let radius = self.config.cache.prefetch_radius;
        let target = snapshot.target_index;
        let count = snapshot.page_count;
        self.cache
            .prefetch(prefetch_order(target, radius, count), layout.slide_resolution());
        if let Some(thumb) = layout.thumbnail_resolution() {
            // The thumbnail shows target + 1; warm the ones after it.
            let ahead = (target + 2..=target + 1 + radius).filter(|p| *p < count);
            self.cache.prefetch(ahead, thumb);
        }
    }
}

fn window_slot(role: WindowRole) -> usize {
    match role {
        WindowRole::Audience => 0,
        WindowRole::Presenter => 1,
    }
}

/// Pages within `radius` of `target`, nearest first, forward before back
fn prefetch_order(target: usize, radius: usize, count: usize) -> Vec<usize> {
    let mut pages = Vec::with_capacity(radius * 2);
    for d in 1..=radius {
        if target + d < count {
            pages.push(target + d);
        }
        if let Some(back) = target.checked_sub(d) {
            pages.push(back);
        }
    }
    pages
}
