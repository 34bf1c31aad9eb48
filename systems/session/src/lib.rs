#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Single owner of the world and every lifecycle system.
//!
//! A [`Session`] applies a command to the world, hands the resulting events
//! to each system, applies the commands they emit and repeats until no new
//! events appear.

use std::time::Duration;

use parkade_core::{
    Command, Event, Messages, PedestrianSnapshot, ScenarioConfig, VehicleSnapshot,
};
use parkade_system_pedestrians::{self as pedestrians, Pedestrians};
use parkade_system_rating::Rating;
use parkade_system_spawning::{self as spawning, Spawning};
use parkade_system_vehicles::{self as vehicles, Vehicles};
use parkade_world::{
    self as world, query,
    transport::{GridTransport, TransportError},
    World,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

/// Upper bound on command/event rounds processed for a single external command.
pub const MAX_PUMP_ROUNDS: usize = 64;

/// World plus systems, advanced together.
#[derive(Debug)]
pub struct Session {
    world: World,
    spawning: Spawning,
    vehicles: Vehicles,
    pedestrians: Pedestrians,
    rating: Rating,
    messages: Messages,
}

impl Session {
    /// Builds a session for the scenario; every system draws from its own stream derived from the scenario seed.
    #[must_use]
    pub fn new(config: &ScenarioConfig) -> Self {
        let mut seeds = ChaCha8Rng::seed_from_u64(config.rng_seed);
        let spawning_seed: u64 = seeds.gen();
        let vehicles_seed: u64 = seeds.gen();
        let pedestrians_seed: u64 = seeds.gen();
        debug!(seed = config.rng_seed, "session created");

        Self {
            world: World::from_scenario(config),
            spawning: Spawning::new(spawning::Config::new(
                config.spawning.clone(),
                spawning_seed,
            )),
            vehicles: Vehicles::new(vehicles::Config::new(
                config.vehicles.clone(),
                vehicles_seed,
            )),
            pedestrians: Pedestrians::new(pedestrians::Config::new(
                config.pedestrians.clone(),
                pedestrians_seed,
            )),
            rating: Rating::new(),
            messages: config.messages.clone(),
        }
    }

    /// Read-only access to the authoritative world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Display strings configured for the scenario.
    #[must_use]
    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    /// Applies an external command and pumps the systems until quiescent.
    ///
    /// Returns every event raised along the way, in order.
    pub fn apply(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        self.pump(events)
    }

    /// Advances the simulation by a real-time delta.
    pub fn tick(&mut self, dt: Duration) -> Vec<Event> {
        self.apply(Command::Tick { dt })
    }

    /// Replaces the lot layout, discarding all agents.
    pub fn load_layout(&mut self, transport: &GridTransport) -> Result<Vec<Event>, TransportError> {
        let mut events = Vec::new();
        world::load_layout(&mut self.world, transport, &mut events)?;
        Ok(self.pump(events))
    }

    /// Snapshots of every live vehicle.
    #[must_use]
    pub fn vehicles(&self) -> Vec<VehicleSnapshot> {
        self.vehicles.snapshots()
    }

    /// Snapshots of every live pedestrian.
    #[must_use]
    pub fn pedestrians(&self) -> Vec<PedestrianSnapshot> {
        self.pedestrians.snapshots()
    }

    /// Number of days the rating system has reduced.
    #[must_use]
    pub fn rated_days(&self) -> u32 {
        self.rating.aggregations()
    }

    /// Dispatches events until no commands remain.
    ///
    /// `DayFinalized` is held back until everything else has settled, so
    /// outcomes reported in response to the tick that crosses midnight still
    /// count toward the day that just ended.
    fn pump(&mut self, mut events: Vec<Event>) -> Vec<Event> {
        let mut log = Vec::new();
        let mut deferred = Vec::new();
        let mut rounds = 0;

        loop {
            let settling = events
                .iter()
                .any(|event| !matches!(event, Event::DayFinalized { .. }));
            if settling {
                let (finalized, rest): (Vec<Event>, Vec<Event>) = events
                    .drain(..)
                    .partition(|event| matches!(event, Event::DayFinalized { .. }));
                deferred.extend(finalized);
                events = rest;
            } else {
                deferred.append(&mut events);
                events = std::mem::take(&mut deferred);
            }
            if events.is_empty() {
                break;
            }

            rounds += 1;
            if rounds > MAX_PUMP_ROUNDS {
                warn!(
                    pending = events.len() + deferred.len(),
                    "event pump did not settle"
                );
                log.append(&mut events);
                log.append(&mut deferred);
                break;
            }

            let mut commands = Vec::new();
            let spawners = query::vehicle_spawners(&self.world);
            self.spawning.handle(&events, &spawners, &mut commands);
            self.vehicles.handle(&events, &self.world, &mut commands);
            self.pedestrians.handle(&events, &self.world, &mut commands);
            self.rating.handle(&events, &mut commands);

            log.append(&mut events);
            for command in commands {
                world::apply(&mut self.world, command, &mut events);
            }
        }

        log
    }
}
