#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Vehicle lifecycle system.
//!
//! Vehicles appear when the world confirms a spawn, optionally compete for a
//! parking spot, drive along routes produced by the world's pathfinder, pay
//! for their stay and leave through their despawn cell. Every decision is
//! expressed as a command; the world arbitrates reservations and money.

use std::collections::{BTreeMap, BTreeSet};

use parkade_core::{
    AgentKind, AgentOutcome, CellCoord, Command, Event, Route, SpawnerPair, SpotKind,
    VehicleConfig, VehicleId, VehicleOutcome, VehicleSnapshot, VehicleState,
};
use parkade_world::{query, World};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

/// Configuration parameters required to construct the vehicle system.
#[derive(Clone, Debug)]
pub struct Config {
    vehicles: VehicleConfig,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration from the scenario's vehicle section and a seed.
    #[must_use]
    pub fn new(vehicles: VehicleConfig, rng_seed: u64) -> Self {
        Self { vehicles, rng_seed }
    }
}

/// Pure system that drives every vehicle through its lifecycle.
#[derive(Debug)]
pub struct Vehicles {
    config: VehicleConfig,
    rng: ChaCha8Rng,
    agents: BTreeMap<VehicleId, VehicleAgent>,
    pending_spots: BTreeSet<CellCoord>,
}

impl Vehicles {
    /// Creates a new vehicle system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: config.vehicles,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            agents: BTreeMap::new(),
            pending_spots: BTreeSet::new(),
        }
    }

    /// Consumes world events and the read-only world to emit vehicle commands.
    pub fn handle(&mut self, events: &[Event], world: &World, out: &mut Vec<Command>) {
        self.pending_spots.clear();
        let mut layout_changed = false;

        for event in events {
            match event {
                Event::GridConfigured { .. } => {
                    if !self.agents.is_empty() {
                        debug!(count = self.agents.len(), "vehicles discarded");
                    }
                    self.agents.clear();
                    layout_changed = false;
                }
                Event::LayoutChanged { .. } => layout_changed = true,
                Event::TimeAdvanced {
                    dt, game_minutes, ..
                } => self.advance(dt.as_secs_f32(), *game_minutes, world, out),
                Event::VehicleSpawned { vehicle, pair } => {
                    self.on_spawned(*vehicle, *pair, world, out);
                }
                Event::SpotReserved { vehicle, spot } => {
                    self.with_agent(*vehicle, |this, agent| {
                        this.on_reserved(agent, *spot, world, out);
                    });
                }
                Event::SpotReservationRejected { vehicle, spot, .. } => {
                    self.with_agent(*vehicle, |this, agent| {
                        this.on_rejected(agent, *spot, world, out);
                    });
                }
                Event::SpotReleased { vehicle, spot } => {
                    self.with_agent(*vehicle, |this, agent| {
                        this.on_released(agent, *spot, world, out);
                    });
                }
                Event::PedestrianReturned { vehicle, .. } => {
                    self.with_agent(*vehicle, |this, agent| {
                        if agent.state == VehicleState::Parking && agent.driver_away {
                            agent.driver_away = false;
                            this.begin_leaving(agent, world, out);
                        }
                    });
                }
                Event::VehicleDespawned { vehicle } => {
                    let _ = self.agents.remove(vehicle);
                }
                _ => {}
            }
        }

        if layout_changed {
            self.revalidate(world, out);
        }
    }

    /// Snapshot of a single vehicle.
    #[must_use]
    pub fn snapshot(&self, vehicle: VehicleId) -> Option<VehicleSnapshot> {
        self.agents.get(&vehicle).map(VehicleAgent::snapshot)
    }

    /// Snapshots of every live vehicle, ordered by identifier.
    #[must_use]
    pub fn snapshots(&self) -> Vec<VehicleSnapshot> {
        self.agents.values().map(VehicleAgent::snapshot).collect()
    }

    fn with_agent(&mut self, vehicle: VehicleId, f: impl FnOnce(&mut Self, &mut VehicleAgent)) {
        if let Some(mut agent) = self.agents.remove(&vehicle) {
            f(self, &mut agent);
            let _ = self.agents.insert(vehicle, agent);
        }
    }

    fn on_spawned(
        &mut self,
        vehicle: VehicleId,
        pair: SpawnerPair,
        world: &World,
        out: &mut Vec<Command>,
    ) {
        let mut agent = VehicleAgent::new(vehicle, pair);
        agent.potential_parker = chance(&mut self.rng, self.config.parker_probability);
        debug!(
            vehicle = vehicle.get(),
            parker = agent.potential_parker,
            "vehicle spawned"
        );

        if agent.potential_parker {
            self.request_spot(&mut agent, world, out);
        } else {
            self.head_for_exit(&mut agent, VehicleState::Moving, world, out);
        }
        let _ = self.agents.insert(vehicle, agent);
    }

    fn request_spot(&mut self, agent: &mut VehicleAgent, world: &World, out: &mut Vec<Command>) {
        let reachable: Vec<CellCoord> = query::vacant_spots(world)
            .into_iter()
            .filter(|spot| !self.pending_spots.contains(spot))
            .filter(|spot| query::find_path(world, agent.cell, *spot, AgentKind::Vehicle).is_ok())
            .collect();

        match reachable.choose(&mut self.rng) {
            Some(spot) => {
                agent.state = VehicleState::Spawning;
                agent.requested_spot = Some(*spot);
                let _ = self.pending_spots.insert(*spot);
                trace!(vehicle = agent.id.get(), ?spot, "spot requested");
                out.push(Command::ReserveSpot {
                    vehicle: agent.id,
                    spot: *spot,
                });
            }
            None => {
                debug!(vehicle = agent.id.get(), "no reachable vacant spot");
                agent.outcome = Some(VehicleOutcome::FailedToPark);
                self.head_for_exit(agent, VehicleState::Moving, world, out);
            }
        }
    }

    fn on_reserved(
        &mut self,
        agent: &mut VehicleAgent,
        spot: CellCoord,
        world: &World,
        out: &mut Vec<Command>,
    ) {
        if agent.requested_spot != Some(spot) {
            out.push(Command::ReleaseSpot {
                vehicle: agent.id,
                spot,
            });
            return;
        }
        agent.requested_spot = None;
        agent.reserved_spot = Some(spot);
        self.drive_to_spot(agent, spot, world, out);
    }

    fn drive_to_spot(
        &mut self,
        agent: &mut VehicleAgent,
        spot: CellCoord,
        world: &World,
        out: &mut Vec<Command>,
    ) {
        match query::find_path(world, agent.cell, spot, AgentKind::Vehicle) {
            Ok(route) if route.is_empty() => self.arrive_at_spot(agent, spot, world, out),
            Ok(route) => {
                debug!(
                    vehicle = agent.id.get(),
                    ?spot,
                    steps = route.len(),
                    "driving to spot"
                );
                agent.follow(route, Goal::Spot(spot), VehicleState::Moving);
            }
            Err(error) => {
                debug!(vehicle = agent.id.get(), %error, "reserved spot unreachable");
                self.release_reservation(agent, out);
                agent.outcome = Some(VehicleOutcome::FailedToPark);
                self.head_for_exit(agent, VehicleState::Moving, world, out);
            }
        }
    }

    fn on_rejected(
        &mut self,
        agent: &mut VehicleAgent,
        spot: CellCoord,
        world: &World,
        out: &mut Vec<Command>,
    ) {
        if agent.requested_spot != Some(spot) {
            return;
        }
        debug!(vehicle = agent.id.get(), ?spot, "reservation rejected");
        agent.requested_spot = None;
        agent.outcome = Some(VehicleOutcome::FailedToPark);
        self.head_for_exit(agent, VehicleState::Moving, world, out);
    }

    fn on_released(
        &mut self,
        agent: &mut VehicleAgent,
        spot: CellCoord,
        world: &World,
        out: &mut Vec<Command>,
    ) {
        if agent.reserved_spot != Some(spot) {
            return;
        }
        agent.reserved_spot = None;
        debug!(vehicle = agent.id.get(), ?spot, "reservation lost");

        match agent.state {
            VehicleState::Moving if agent.goal == Some(Goal::Spot(spot)) => {
                self.request_spot(agent, world, out);
            }
            VehicleState::Parking if !agent.driver_away => self.begin_leaving(agent, world, out),
            _ => {}
        }
    }

    fn arrive_at_spot(
        &mut self,
        agent: &mut VehicleAgent,
        spot: CellCoord,
        world: &World,
        out: &mut Vec<Command>,
    ) {
        agent.stop();
        let Some(kind) = query::spot_kind(world, spot) else {
            self.release_reservation(agent, out);
            agent.outcome = Some(VehicleOutcome::FailedToPark);
            self.head_for_exit(agent, VehicleState::Leaving, world, out);
            return;
        };

        let tier = self.config.rates.tier(kind);
        let cents_per_hour = query::parking_rate(world, kind);
        if cents_per_hour > tier.refusal_threshold {
            debug!(
                vehicle = agent.id.get(),
                ?kind,
                cents_per_hour,
                "driver refused the rate"
            );
            self.release_reservation(agent, out);
            agent.outcome = Some(VehicleOutcome::FailedToPark);
            self.head_for_exit(agent, VehicleState::Leaving, world, out);
            return;
        }

        agent.outcome = Some(if cents_per_hour > tier.penalty_threshold {
            VehicleOutcome::ParkedWithPenalty {
                penalty: tier.penalty,
            }
        } else {
            VehicleOutcome::Parked
        });

        let range = self.config.parking_minutes.normalized();
        let duration_minutes = if range.max > range.min && range.max.is_finite() {
            self.rng.gen_range(range.min..=range.max)
        } else {
            range.min
        };
        agent.parked = Some(ParkedStay {
            kind,
            cents_per_hour,
            elapsed_minutes: 0.0,
            duration_minutes,
        });
        agent.state = VehicleState::Parking;
        debug!(
            vehicle = agent.id.get(),
            ?spot,
            ?kind,
            duration_minutes,
            "vehicle parked"
        );

        if chance(&mut self.rng, self.config.driver_exit_probability) {
            agent.driver_away = true;
            out.push(Command::SpawnPedestrian {
                vehicle: agent.id,
                cell: spot,
            });
        }
    }

    fn begin_leaving(&mut self, agent: &mut VehicleAgent, world: &World, out: &mut Vec<Command>) {
        if let Some(stay) = agent.parked.take() {
            let cents = fee_cents(stay.cents_per_hour, stay.elapsed_minutes);
            if cents > 0 {
                out.push(Command::CollectParkingFee {
                    vehicle: agent.id,
                    kind: stay.kind,
                    cents,
                });
            }
        }
        self.release_reservation(agent, out);
        self.head_for_exit(agent, VehicleState::Leaving, world, out);
    }

    fn release_reservation(&mut self, agent: &mut VehicleAgent, out: &mut Vec<Command>) {
        if let Some(spot) = agent.reserved_spot.take() {
            out.push(Command::ReleaseSpot {
                vehicle: agent.id,
                spot,
            });
        }
    }

    fn head_for_exit(
        &mut self,
        agent: &mut VehicleAgent,
        state: VehicleState,
        world: &World,
        out: &mut Vec<Command>,
    ) {
        match query::find_path(world, agent.cell, agent.pair.despawn, AgentKind::Vehicle) {
            Ok(route) if route.is_empty() => self.despawn(agent, out),
            Ok(route) => agent.follow(route, Goal::Exit, state),
            Err(error) => {
                debug!(vehicle = agent.id.get(), %error, "vehicle stranded");
                if agent.potential_parker {
                    agent.outcome = Some(VehicleOutcome::FailedToPark);
                }
                self.despawn(agent, out);
            }
        }
    }

    fn despawn(&mut self, agent: &mut VehicleAgent, out: &mut Vec<Command>) {
        agent.stop();
        agent.state = VehicleState::Despawning;
        agent.reserved_spot = None;
        out.push(Command::DespawnVehicle { vehicle: agent.id });
        if let Some(outcome) = agent.outcome.take() {
            out.push(Command::ReportOutcome {
                outcome: AgentOutcome::Vehicle {
                    vehicle: agent.id,
                    outcome,
                },
            });
        }
    }

    fn advance(&mut self, seconds: f32, game_minutes: f32, world: &World, out: &mut Vec<Command>) {
        let distance = self.config.speed.max(0.0) * seconds;
        let ids: Vec<VehicleId> = self.agents.keys().copied().collect();
        for id in ids {
            self.with_agent(id, |this, agent| match agent.state {
                VehicleState::Moving | VehicleState::Leaving => {
                    if agent.travel(distance) {
                        this.arrive(agent, world, out);
                    }
                }
                VehicleState::Parking => {
                    let stay_over = agent.parked.as_mut().map_or(true, |stay| {
                        stay.elapsed_minutes += game_minutes;
                        stay.elapsed_minutes >= stay.duration_minutes
                    });
                    if stay_over && !agent.driver_away {
                        this.begin_leaving(agent, world, out);
                    }
                }
                VehicleState::Spawning | VehicleState::Despawning => {}
            });
        }
    }

    fn arrive(&mut self, agent: &mut VehicleAgent, world: &World, out: &mut Vec<Command>) {
        match agent.goal {
            Some(Goal::Spot(spot)) => self.arrive_at_spot(agent, spot, world, out),
            Some(Goal::Exit) => {
                trace!(vehicle = agent.id.get(), "vehicle reached its despawner");
                self.despawn(agent, out);
            }
            None => agent.stop(),
        }
    }

    fn revalidate(&mut self, world: &World, out: &mut Vec<Command>) {
        let ids: Vec<VehicleId> = self.agents.keys().copied().collect();
        for id in ids {
            self.with_agent(id, |this, agent| {
                if !matches!(agent.state, VehicleState::Moving | VehicleState::Leaving) {
                    return;
                }
                if query::is_route_valid(world, agent.cell, agent.remaining_path(), AgentKind::Vehicle)
                {
                    return;
                }
                debug!(vehicle = agent.id.get(), "route invalidated");
                match agent.goal {
                    Some(Goal::Spot(spot)) => this.drive_to_spot(agent, spot, world, out),
                    Some(Goal::Exit) | None => {
                        let state = agent.state;
                        this.head_for_exit(agent, state, world, out);
                    }
                }
            });
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Goal {
    Spot(CellCoord),
    Exit,
}

#[derive(Clone, Copy, Debug)]
struct ParkedStay {
    kind: SpotKind,
    cents_per_hour: u32,
    elapsed_minutes: f32,
    duration_minutes: f32,
}

#[derive(Clone, Debug)]
struct VehicleAgent {
    id: VehicleId,
    pair: SpawnerPair,
    cell: CellCoord,
    progress: f32,
    path: Vec<CellCoord>,
    cursor: usize,
    goal: Option<Goal>,
    state: VehicleState,
    potential_parker: bool,
    requested_spot: Option<CellCoord>,
    reserved_spot: Option<CellCoord>,
    parked: Option<ParkedStay>,
    driver_away: bool,
    outcome: Option<VehicleOutcome>,
}

impl VehicleAgent {
    fn new(id: VehicleId, pair: SpawnerPair) -> Self {
        Self {
            id,
            pair,
            cell: pair.spawn,
            progress: 0.0,
            path: Vec::new(),
            cursor: 0,
            goal: None,
            state: VehicleState::Spawning,
            potential_parker: false,
            requested_spot: None,
            reserved_spot: None,
            parked: None,
            driver_away: false,
            outcome: None,
        }
    }

    fn next_cell(&self) -> Option<CellCoord> {
        self.path.get(self.cursor).copied()
    }

    fn remaining_path(&self) -> &[CellCoord] {
        self.path.get(self.cursor..).unwrap_or(&[])
    }

    fn follow(&mut self, route: Route, goal: Goal, state: VehicleState) {
        self.path = route.into_cells();
        self.cursor = 0;
        self.progress = 0.0;
        self.goal = Some(goal);
        self.state = state;
    }

    fn stop(&mut self) {
        self.path.clear();
        self.cursor = 0;
        self.progress = 0.0;
        self.goal = None;
    }

    /// Moves `distance` cells along the path; returns `true` once the path is exhausted.
    fn travel(&mut self, mut distance: f32) -> bool {
        while let Some(next) = self.next_cell() {
            let remaining = 1.0 - self.progress;
            if distance < remaining {
                self.progress += distance;
                return false;
            }
            distance -= remaining;
            self.cell = next;
            self.cursor += 1;
            self.progress = 0.0;
        }
        true
    }

    fn position(&self) -> (f32, f32) {
        let from = (self.cell.column() as f32, self.cell.row() as f32);
        match self.next_cell() {
            Some(next) => {
                let to = (next.column() as f32, next.row() as f32);
                (
                    from.0 + (to.0 - from.0) * self.progress,
                    from.1 + (to.1 - from.1) * self.progress,
                )
            }
            None => from,
        }
    }

    fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            id: self.id,
            cell: self.cell,
            position: self.position(),
            state: self.state,
            reserved_spot: self.reserved_spot,
            potential_parker: self.potential_parker,
        }
    }
}

fn chance(rng: &mut ChaCha8Rng, probability: f64) -> bool {
    if probability.is_nan() {
        return false;
    }
    rng.gen_bool(probability.clamp(0.0, 1.0))
}

fn fee_cents(cents_per_hour: u32, minutes: f32) -> u64 {
    let cents = f64::from(cents_per_hour) * f64::from(minutes.max(0.0)) / 60.0;
    cents.round() as u64
}
