#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Time-of-day driven spawning system that emits vehicle spawn commands.

use std::time::Duration;

use parkade_core::{Command, Event, SpawnSchedule, SpawnerPair};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Debug)]
pub struct Config {
    schedule: SpawnSchedule,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration using the provided schedule and seed.
    #[must_use]
    pub fn new(schedule: SpawnSchedule, rng_seed: u64) -> Self {
        Self { schedule, rng_seed }
    }
}

/// Pure system that emits one spawn command per elapsed spawn interval.
#[derive(Debug)]
pub struct Spawning {
    schedule: SpawnSchedule,
    accumulator: Duration,
    rng: ChaCha8Rng,
}

impl Spawning {
    /// Creates a new spawning system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            schedule: config.schedule,
            accumulator: Duration::ZERO,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Spawn interval in effect at the provided minute of the day.
    #[must_use]
    pub fn interval_at(&self, minute_of_day: u32) -> Duration {
        self.schedule.interval_at(minute_of_day)
    }

    /// Consumes events and the registered spawner pairs to emit spawn commands.
    pub fn handle(&mut self, events: &[Event], spawners: &[SpawnerPair], out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::GridConfigured { .. } => self.accumulator = Duration::ZERO,
                Event::TimeAdvanced {
                    dt, minute_of_day, ..
                } => {
                    if spawners.is_empty() || dt.is_zero() {
                        continue;
                    }
                    self.accumulator = self.accumulator.saturating_add(*dt);
                    let interval = self.interval_at(*minute_of_day);
                    for _ in 0..self.resolve_spawn_attempts(interval) {
                        let pair = self.select_spawner(spawners);
                        trace!(?pair, minute_of_day, "vehicle spawn requested");
                        out.push(Command::SpawnVehicle { pair });
                    }
                }
                _ => {}
            }
        }
    }

    fn resolve_spawn_attempts(&mut self, interval: Duration) -> usize {
        if interval.is_zero() {
            self.accumulator = Duration::ZERO;
            return 0;
        }

        let mut attempts = 0;
        while self.accumulator >= interval {
            self.accumulator -= interval;
            attempts += 1;
        }
        attempts
    }

    fn select_spawner(&mut self, spawners: &[SpawnerPair]) -> SpawnerPair {
        debug_assert!(!spawners.is_empty(), "select_spawner requires spawners");
        spawners[self.rng.gen_range(0..spawners.len())]
    }
}
