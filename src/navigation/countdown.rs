//! Presentation timer shown on the presenter console

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

const HOUR: u64 = 60 * 60;

/// Whether the timer shows time left or time spent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CountdownMode {
    #[default]
    Down,
    Up,
}

/// What the presenter sees for the timer this frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownDisplay {
    pub text: String,
    /// Time is up. Not an error: the show goes on.
    pub expired: bool,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    mode: CountdownMode,
    duration: Duration,
    /// Elapsed time banked before the current run
    banked: Duration,
    running_since: Option<Instant>,
}

impl Countdown {
    /// A stopped timer at zero elapsed
    #[must_use]
    pub fn new(duration: Duration, mode: CountdownMode) -> Self {
        Self {
            mode,
            duration,
            banked: Duration::ZERO,
            running_since: None,
        }
    }

    #[must_use]
    pub fn mode(&self) -> CountdownMode {
        self.mode
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn resume(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(since) = self.running_since.take() {
            self.banked += now.saturating_duration_since(since);
        }
    }

    /// Back to zero elapsed; a running timer keeps running from `now`
    pub fn reset(&mut self, now: Instant) {
        self.banked = Duration::ZERO;
        if self.running_since.is_some() {
            self.running_since = Some(now);
        }
    }

    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Duration {
        let live = self
            .running_since
            .map_or(Duration::ZERO, |since| now.saturating_duration_since(since));
        self.banked + live
    }

    /// Time left, clamped at zero
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.duration.saturating_sub(self.elapsed(now))
    }

    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.elapsed(now) >= self.duration
    }

    #[must_use]
    pub fn display(&self, now: Instant) -> CountdownDisplay {
        let shown = match self.mode {
            CountdownMode::Down => self.remaining(now),
            CountdownMode::Up => self.elapsed(now),
        };
        let long_form = self.duration.as_secs() >= HOUR;
        CountdownDisplay {
            text: format_clock(shown, long_form),
            expired: self.is_expired(now),
            running: self.is_running(),
        }
    }
}

/// `MM:SS`, or `H:MM:SS` from one hour up (or when `long_form` is set)
#[must_use]
pub fn format_clock(value: Duration, long_form: bool) -> String {
    let total = value.as_secs();
    let (hours, minutes, seconds) = (total / HOUR, (total % HOUR) / 60, total % 60);
    if long_form || hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_minutes() -> Duration {
        Duration::from_secs(300)
    }

    #[test]
    fn format_clock_switches_to_hours() {
        assert_eq!(format_clock(Duration::from_secs(0), false), "00:00");
        assert_eq!(format_clock(Duration::from_secs(299), false), "04:59");
        assert_eq!(format_clock(Duration::from_secs(3_725), false), "1:02:05");
        assert_eq!(format_clock(Duration::from_secs(59), true), "0:00:59");
    }

    #[test]
    fn count_down_clamps_at_zero_and_expires() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new(five_minutes(), CountdownMode::Down);
        countdown.resume(t0);

        let shown = countdown.display(t0 + Duration::from_secs(1));
        assert_eq!(shown.text, "04:59");
        assert!(!shown.expired);

        let shown = countdown.display(t0 + Duration::from_secs(301));
        assert_eq!(shown.text, "00:00");
        assert!(shown.expired);
    }

    #[test]
    fn count_up_shows_elapsed() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new(Duration::from_secs(60), CountdownMode::Up);
        countdown.resume(t0);

        let shown = countdown.display(t0 + Duration::from_secs(75));
        assert_eq!(shown.text, "01:15");
        assert!(shown.expired);
    }

    #[test]
    fn pause_freezes_elapsed() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new(five_minutes(), CountdownMode::Down);
        countdown.resume(t0);
        countdown.pause(t0 + Duration::from_secs(10));

        assert_eq!(countdown.elapsed(t0 + Duration::from_secs(100)), Duration::from_secs(10));

        countdown.resume(t0 + Duration::from_secs(100));
        assert_eq!(countdown.elapsed(t0 + Duration::from_secs(105)), Duration::from_secs(15));
    }

    #[test]
    fn reset_keeps_running_state() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new(five_minutes(), CountdownMode::Down);
        countdown.resume(t0);
        countdown.reset(t0 + Duration::from_secs(30));

        assert!(countdown.is_running());
        assert_eq!(countdown.elapsed(t0 + Duration::from_secs(40)), Duration::from_secs(10));

        countdown.pause(t0 + Duration::from_secs(40));
        countdown.reset(t0 + Duration::from_secs(50));
        assert!(!countdown.is_running());
        assert_eq!(countdown.elapsed(t0 + Duration::from_secs(90)), Duration::ZERO);
    }
}
