//! Key map and key-repeat debouncing

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;

use super::{Command, Key, MouseButton, RawEvent};

/// How held keys and rapid presses are rate-limited
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepeatPolicy {
    /// A held key starts repeating after this long
    pub delay: Duration,
    /// Minimum spacing between repeats
    pub interval: Duration,
    /// Separate presses of the same key closer than this collapse into one
    pub min_press_gap: Duration,
}

impl Default for RepeatPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(400),
            interval: Duration::from_millis(100),
            min_press_gap: Duration::from_millis(16),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Step(isize),
    First,
    Last,
    ToggleCountdown,
    ResetCountdown,
    Quit,
}

impl Action {
    fn for_key(key: Key) -> Option<Self> {
        let action = match key {
            Key::PageDown | Key::Right | Key::Down | Key::Space | Key::Enter => Self::Step(1),
            Key::PageUp | Key::Left | Key::Up | Key::Backspace => Self::Step(-1),
            Key::Home => Self::First,
            Key::End => Self::Last,
            Key::Char('p' | 'P') => Self::ToggleCountdown,
            Key::Char('r' | 'R') => Self::ResetCountdown,
            Key::Char('q' | 'Q') | Key::Escape => Self::Quit,
            Key::Char(_) => return None,
        };
        Some(action)
    }

    fn direction(self) -> Option<isize> {
        match self {
            Self::Step(delta) => Some(delta.signum()),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct HeldKey {
    direction: Option<isize>,
    pressed_at: Instant,
    last_fired: Instant,
    last_seen: Instant,
}

/// Turns raw events into commands.
///
/// Only stepping keys repeat. Jumps, countdown keys and quit fire once per
/// press. Holding a forward and a backward key together repeats neither.
#[derive(Debug)]
pub struct InputRouter {
    page_count: usize,
    policy: RepeatPolicy,
    held: HashMap<Key, HeldKey>,
    last_press: HashMap<Key, Instant>,
}

impl InputRouter {
    #[must_use]
    pub fn new(page_count: usize, policy: RepeatPolicy) -> Self {
        Self {
            page_count,
            policy,
            held: HashMap::new(),
            last_press: HashMap::new(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RepeatPolicy {
        self.policy
    }

    pub fn route(&mut self, event: RawEvent, now: Instant) -> Option<Command> {
        match event {
            RawEvent::KeyDown { key, repeat } => self.key_down(key, repeat, now),
            RawEvent::KeyUp { key } => {
                self.held.remove(&key);
                None
            }
            RawEvent::MouseDown { button } => match button {
                MouseButton::Left => Some(Command::Advance(1)),
                MouseButton::Right => Some(Command::Advance(-1)),
                MouseButton::Middle => None,
            },
            RawEvent::Scroll { delta } => match delta.signum() {
                1 => Some(Command::Advance(1)),
                -1 => Some(Command::Advance(-1)),
                _ => None,
            },
            RawEvent::Resized { role, size } => Some(Command::Resize { role, size }),
            RawEvent::CloseRequested => Some(Command::Quit),
        }
    }

    /// True while a stepping key is down and may still repeat
    #[must_use]
    pub fn is_holding(&self, now: Instant) -> bool {
        self.held
            .values()
            .any(|held| held.direction.is_some() && self.recently_seen(held, now))
    }

    fn key_down(&mut self, key: Key, repeat: bool, now: Instant) -> Option<Command> {
        let action = Action::for_key(key)?;
        let direction = action.direction();

        if repeat {
            return self.key_repeat(key, action, now);
        }

        let collapsed = self
            .last_press
            .get(&key)
            .is_some_and(|at| now.saturating_duration_since(*at) < self.policy.min_press_gap);
        self.last_press.insert(key, now);
        self.held.insert(
            key,
            HeldKey {
                direction,
                pressed_at: now,
                last_fired: now,
                last_seen: now,
            },
        );
        if collapsed {
            debug!("Collapsed rapid press of {key:?}");
            return None;
        }
        self.command_for(action)
    }

    fn key_repeat(&mut self, key: Key, action: Action, now: Instant) -> Option<Command> {
        let direction = action.direction()?;

        let opposed = self.held.iter().any(|(other, held)| {
            *other != key
                && held.direction == Some(-direction)
                && self.recently_seen(held, now)
        });

        let policy = self.policy;
        let held = self.held.entry(key).or_insert(HeldKey {
            direction: Some(direction),
            pressed_at: now,
            last_fired: now,
            last_seen: now,
        });
        held.last_seen = now;

        if opposed {
            return None;
        }
        if now.saturating_duration_since(held.pressed_at) < policy.delay
            || now.saturating_duration_since(held.last_fired) < policy.interval
        {
            return None;
        }
        held.last_fired = now;
        self.command_for(action)
    }

    fn recently_seen(&self, held: &HeldKey, now: Instant) -> bool {
        now.saturating_duration_since(held.last_seen) <= self.policy.delay
    }

    fn command_for(&self, action: Action) -> Option<Command> {
        match action {
            Action::Step(delta) => Some(Command::Advance(delta)),
            Action::First => (self.page_count > 0).then_some(Command::Jump(0)),
            Action::Last => self.page_count.checked_sub(1).map(Command::Jump),
            Action::ToggleCountdown => Some(Command::ToggleCountdown),
            Action::ResetCountdown => Some(Command::ResetCountdown),
            Action::Quit => Some(Command::Quit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{Size, WindowRole};

    const MS: Duration = Duration::from_millis(1);

    fn router() -> InputRouter {
        InputRouter::new(10, RepeatPolicy::default())
    }

    #[test]
    fn key_map() {
        let mut r = router();
        let t = Instant::now();
        let mut press = |key, at| r.route(RawEvent::press(key), at);

        assert_eq!(press(Key::PageDown, t), Some(Command::Advance(1)));
        assert_eq!(press(Key::Space, t), Some(Command::Advance(1)));
        assert_eq!(press(Key::Left, t), Some(Command::Advance(-1)));
        assert_eq!(press(Key::Backspace, t), Some(Command::Advance(-1)));
        assert_eq!(press(Key::Home, t), Some(Command::Jump(0)));
        assert_eq!(press(Key::End, t), Some(Command::Jump(9)));
        assert_eq!(press(Key::Char('p'), t), Some(Command::ToggleCountdown));
        assert_eq!(press(Key::Char('r'), t), Some(Command::ResetCountdown));
        assert_eq!(press(Key::Escape, t), Some(Command::Quit));
        assert_eq!(press(Key::Char('x'), t), None);
    }

    #[test]
    fn mouse_scroll_and_window_events() {
        let mut r = router();
        let t = Instant::now();
        let left = RawEvent::MouseDown {
            button: MouseButton::Left,
        };
        assert_eq!(r.route(left, t), Some(Command::Advance(1)));
        assert_eq!(r.route(RawEvent::Scroll { delta: -3 }, t), Some(Command::Advance(-1)));
        assert_eq!(r.route(RawEvent::Scroll { delta: 0 }, t), None);

        let size = Size::new(800, 600);
        let resized = RawEvent::Resized {
            role: WindowRole::Presenter,
            size,
        };
        assert_eq!(
            r.route(resized, t),
            Some(Command::Resize {
                role: WindowRole::Presenter,
                size
            })
        );
        assert_eq!(r.route(RawEvent::CloseRequested, t), Some(Command::Quit));
    }

    #[test]
    fn end_on_empty_deck_does_nothing() {
        let mut r = InputRouter::new(0, RepeatPolicy::default());
        let t = Instant::now();
        assert_eq!(r.route(RawEvent::press(Key::End), t), None);
        assert_eq!(r.route(RawEvent::press(Key::Home), t), None);
    }

    /// Debounce interval: a held key fires on press, stays quiet for 400 ms,
    /// then repeats at most every 100 ms however fast the OS repeats.
    #[test]
    fn held_key_repeats_are_rate_limited() {
        let mut r = router();
        let t0 = Instant::now();
        let mut fired = 0;
        if r.route(RawEvent::press(Key::Right), t0).is_some() {
            fired += 1;
        }
        // OS auto-repeat every 30 ms for one second
        for i in 1..=33u32 {
            if r.route(RawEvent::repeat(Key::Right), t0 + MS * (30 * i)).is_some() {
                fired += 1;
            }
        }
        // press + repeats at 420, 540, 660, 780, 900 (first repeat each 100 ms window)
        assert_eq!(fired, 6);
    }

    #[test]
    fn no_repeat_before_delay() {
        let mut r = router();
        let t0 = Instant::now();
        r.route(RawEvent::press(Key::Right), t0);
        assert_eq!(r.route(RawEvent::repeat(Key::Right), t0 + MS * 399), None);
        assert_eq!(
            r.route(RawEvent::repeat(Key::Right), t0 + MS * 400),
            Some(Command::Advance(1))
        );
    }

    #[test]
    fn presses_faster_than_a_frame_collapse() {
        let mut r = router();
        let t0 = Instant::now();
        assert!(r.route(RawEvent::press(Key::Right), t0).is_some());
        r.route(RawEvent::KeyUp { key: Key::Right }, t0 + MS * 2);
        assert_eq!(r.route(RawEvent::press(Key::Right), t0 + MS * 5), None);
        r.route(RawEvent::KeyUp { key: Key::Right }, t0 + MS * 8);
        // A deliberate second press one frame later counts
        assert!(r.route(RawEvent::press(Key::Right), t0 + MS * 40).is_some());
    }

    #[test]
    fn opposing_keys_suppress_repeats() {
        let mut r = router();
        let t0 = Instant::now();
        r.route(RawEvent::press(Key::Right), t0);
        r.route(RawEvent::press(Key::Left), t0 + MS * 50);
        for ms in (60..1000).step_by(30) {
            assert_eq!(r.route(RawEvent::repeat(Key::Right), t0 + MS * ms), None);
            assert_eq!(r.route(RawEvent::repeat(Key::Left), t0 + MS * (ms + 1)), None);
        }
        r.route(RawEvent::KeyUp { key: Key::Left }, t0 + MS * 1000);
        assert_eq!(
            r.route(RawEvent::repeat(Key::Right), t0 + MS * 1030),
            Some(Command::Advance(1))
        );
    }

    #[test]
    fn countdown_and_quit_keys_never_repeat() {
        let mut r = router();
        let t0 = Instant::now();
        assert!(r.route(RawEvent::press(Key::Char('p')), t0).is_some());
        for ms in (450..2000).step_by(50) {
            assert_eq!(r.route(RawEvent::repeat(Key::Char('p')), t0 + MS * ms), None);
            assert_eq!(r.route(RawEvent::repeat(Key::Char('q')), t0 + MS * ms), None);
            assert_eq!(r.route(RawEvent::repeat(Key::End), t0 + MS * ms), None);
        }
    }

    #[test]
    fn holding_tracks_stepping_keys() {
        let mut r = router();
        let t0 = Instant::now();
        assert!(!r.is_holding(t0));
        r.route(RawEvent::press(Key::Right), t0);
        assert!(r.is_holding(t0 + MS * 100));
        r.route(RawEvent::KeyUp { key: Key::Right }, t0 + MS * 150);
        assert!(!r.is_holding(t0 + MS * 150));
    }
}
