//! In-game clock driven by scaled real-time deltas.

use std::{ops::Range, time::Duration};

use parkade_core::{ClockConfig, MINUTES_PER_DAY};

/// Longest scaled real-time delta a single tick may cover.
///
/// Larger products of tick delta and time scale saturate here.
pub(crate) const MAX_SCALED_TICK: Duration = Duration::from_secs(86_400);

/// Game time tracked as fractional minutes since day zero, 00:00.
#[derive(Clone, Debug)]
pub(crate) struct Clock {
    total_minutes: f64,
    minutes_per_second: f32,
    scale: f32,
    paused: bool,
}

/// Result of advancing the clock by one tick.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ClockAdvance {
    /// Real time after scaling; zero while paused.
    pub(crate) scaled_dt: Duration,
    /// Game minutes that elapsed.
    pub(crate) game_minutes: f32,
    /// Days whose last minute elapsed during the tick.
    pub(crate) finished_days: Range<u32>,
}

impl Clock {
    /// Creates a running clock at the configured start minute of day zero.
    pub(crate) fn new(config: &ClockConfig) -> Self {
        Self {
            total_minutes: f64::from(config.start_minute % MINUTES_PER_DAY),
            minutes_per_second: if config.minutes_per_second.is_finite() {
                config.minutes_per_second.max(0.0)
            } else {
                0.0
            },
            scale: 1.0,
            paused: false,
        }
    }

    /// Advances by the real-time delta, honouring pause and scale.
    pub(crate) fn advance(&mut self, dt: Duration) -> ClockAdvance {
        let day_before = self.day();
        let scaled_dt = if self.paused {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(dt.as_secs_f64() * f64::from(self.scale))
                .map_or(MAX_SCALED_TICK, |scaled| scaled.min(MAX_SCALED_TICK))
        };
        let game_minutes = scaled_dt.as_secs_f32() * self.minutes_per_second;
        self.total_minutes += f64::from(game_minutes);

        ClockAdvance {
            scaled_dt,
            game_minutes,
            finished_days: day_before..self.day(),
        }
    }

    /// Zero-based index of the current day.
    pub(crate) fn day(&self) -> u32 {
        let days = (self.total_minutes / f64::from(MINUTES_PER_DAY)).floor();
        if days >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            days as u32
        }
    }

    /// Whole minutes elapsed since midnight of the current day.
    pub(crate) fn minute_of_day(&self) -> u32 {
        let minutes = self.total_minutes.rem_euclid(f64::from(MINUTES_PER_DAY));
        (minutes.floor() as u32).min(MINUTES_PER_DAY - 1)
    }

    /// Fractional game minutes since day zero, 00:00.
    pub(crate) fn total_minutes(&self) -> f64 {
        self.total_minutes
    }

    /// Sets the time scale, clamping negative and non-finite values to zero.
    pub(crate) fn set_scale(&mut self, scale: f32) {
        self.scale = if scale.is_finite() { scale.max(0.0) } else { 0.0 };
    }

    /// Active time scale.
    pub(crate) fn scale(&self) -> f32 {
        self.scale
    }

    /// Freezes or resumes the clock.
    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Reports whether the clock ignores tick deltas.
    pub(crate) fn is_paused(&self) -> bool {
        self.paused
    }

    /// Display label such as `Day 1, 06:00`; days are numbered from one.
    pub(crate) fn label(&self) -> String {
        let minute = self.minute_of_day();
        format!(
            "Day {}, {:02}:{:02}",
            self.day().saturating_add(1),
            minute / 60,
            minute % 60
        )
    }
}
