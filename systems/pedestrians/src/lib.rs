#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pedestrian lifecycle system.
//!
//! Drivers that step out of a parked vehicle walk to a destination, vanish
//! for a while, reappear and walk back. Either leg may be interrupted by a
//! need that detours the pedestrian to the nearest fixture able to satisfy
//! it. When the pedestrian is back at its vehicle the trip is summarised and
//! reported for rating.

use std::collections::BTreeMap;

use parkade_core::{
    AgentKind, AgentOutcome, CellCoord, Command, Event, FixtureId, MinuteRange, Need,
    NeedWeights, PedestrianConfig, PedestrianId, PedestrianOutcome, PedestrianSnapshot,
    PedestrianState, RespawnConfig, Route, VehicleId,
};
use parkade_world::{query, World};
use rand::{
    distributions::{Distribution, WeightedIndex},
    seq::SliceRandom,
    Rng, SeedableRng,
};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

/// Configuration parameters required to construct the pedestrian system.
#[derive(Clone, Debug)]
pub struct Config {
    pedestrians: PedestrianConfig,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration from the scenario's pedestrian section and a seed.
    #[must_use]
    pub fn new(pedestrians: PedestrianConfig, rng_seed: u64) -> Self {
        Self {
            pedestrians,
            rng_seed,
        }
    }
}

/// Pure system that walks pedestrians between their vehicle, a destination and need fixtures.
#[derive(Debug)]
pub struct Pedestrians {
    config: PedestrianConfig,
    rng: ChaCha8Rng,
    agents: BTreeMap<PedestrianId, PedestrianAgent>,
}

impl Pedestrians {
    /// Creates a new pedestrian system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: config.pedestrians,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            agents: BTreeMap::new(),
        }
    }

    /// Consumes world events and the read-only world to emit pedestrian commands.
    pub fn handle(&mut self, events: &[Event], world: &World, out: &mut Vec<Command>) {
        let mut layout_changed = false;

        for event in events {
            match event {
                Event::GridConfigured { .. } => {
                    if !self.agents.is_empty() {
                        debug!(count = self.agents.len(), "pedestrians discarded");
                    }
                    self.agents.clear();
                    layout_changed = false;
                }
                Event::LayoutChanged { .. } => layout_changed = true,
                Event::TimeAdvanced {
                    dt, game_minutes, ..
                } => self.advance(dt.as_secs_f32(), *game_minutes, world, out),
                Event::PedestrianSpawned {
                    pedestrian,
                    vehicle,
                    cell,
                } => self.on_spawned(*pedestrian, *vehicle, *cell, world, out),
                Event::FixtureRemoved { fixture, .. } => {
                    self.on_fixture_removed(*fixture, world, out);
                }
                Event::PedestrianReturned { pedestrian, .. } => {
                    let _ = self.agents.remove(pedestrian);
                }
                Event::VehicleDespawned { vehicle } => {
                    self.agents.retain(|_, agent| agent.vehicle != *vehicle);
                }
                _ => {}
            }
        }

        if layout_changed {
            self.revalidate(world, out);
        }
    }

    /// Snapshot of a single pedestrian.
    #[must_use]
    pub fn snapshot(&self, pedestrian: PedestrianId) -> Option<PedestrianSnapshot> {
        self.agents.get(&pedestrian).map(PedestrianAgent::snapshot)
    }

    /// Snapshots of every live pedestrian, ordered by identifier.
    #[must_use]
    pub fn snapshots(&self) -> Vec<PedestrianSnapshot> {
        self.agents.values().map(PedestrianAgent::snapshot).collect()
    }

    fn with_agent(
        &mut self,
        pedestrian: PedestrianId,
        f: impl FnOnce(&mut Self, &mut PedestrianAgent),
    ) {
        if let Some(mut agent) = self.agents.remove(&pedestrian) {
            f(self, &mut agent);
            let _ = self.agents.insert(pedestrian, agent);
        }
    }

    fn on_spawned(
        &mut self,
        pedestrian: PedestrianId,
        vehicle: VehicleId,
        cell: CellCoord,
        world: &World,
        out: &mut Vec<Command>,
    ) {
        let mut agent = PedestrianAgent::new(pedestrian, vehicle, cell);
        agent.destination = self.choose_destination(cell, world);
        debug!(
            pedestrian = pedestrian.get(),
            vehicle = vehicle.get(),
            destination = ?agent.destination,
            "pedestrian stepped out"
        );

        if agent.destination.is_some() {
            self.begin_leg(&mut agent, Leg::Outbound, world, out);
        } else {
            self.finish(&mut agent, out);
        }
        let _ = self.agents.insert(pedestrian, agent);
    }

    fn choose_destination(&mut self, from: CellCoord, world: &World) -> Option<CellCoord> {
        let reachable: Vec<CellCoord> = query::pedestrian_destinations(world)
            .into_iter()
            .filter(|cell| query::find_path(world, from, *cell, AgentKind::Pedestrian).is_ok())
            .collect();
        reachable.choose(&mut self.rng).copied()
    }

    fn begin_leg(
        &mut self,
        agent: &mut PedestrianAgent,
        leg: Leg,
        world: &World,
        out: &mut Vec<Command>,
    ) {
        if let Some(need) = draw_need(
            &mut self.rng,
            self.config.need_probability,
            &self.config.need_weights,
        ) {
            if self.begin_need(agent, need, leg, world) {
                return;
            }
        }
        self.continue_leg(agent, leg, world, out);
    }

    /// Starts a detour toward the nearest fixture satisfying `need`; returns `false` when none is reachable.
    fn begin_need(
        &mut self,
        agent: &mut PedestrianAgent,
        need: Need,
        leg: Leg,
        world: &World,
    ) -> bool {
        let mut best: Option<(u32, FixtureId, Route)> = None;
        for fixture in query::need_fixtures(world, need) {
            let Ok(route) = query::find_path(world, agent.cell, fixture.anchor, AgentKind::Pedestrian)
            else {
                continue;
            };
            if best
                .as_ref()
                .map_or(true, |(cost, _, _)| route.cost() < *cost)
            {
                best = Some((route.cost(), fixture.id, route));
            }
        }

        let Some((_, fixture, route)) = best else {
            debug!(pedestrian = agent.id.get(), ?need, "need cannot be satisfied");
            agent.unfulfilled.push(need);
            return false;
        };

        trace!(
            pedestrian = agent.id.get(),
            ?need,
            fixture = fixture.get(),
            "detouring to fixture"
        );
        agent.need = Some(ActiveNeed {
            need,
            fixture,
            remaining_minutes: self.config.fulfillment_minutes.max(0.0),
        });
        agent.resume = Some(leg);
        if route.is_empty() {
            agent.stop(PedestrianState::FulfillingNeed);
        } else {
            agent.follow(route, PedestrianState::GoingToNeed);
        }
        true
    }

    fn continue_leg(
        &mut self,
        agent: &mut PedestrianAgent,
        leg: Leg,
        world: &World,
        out: &mut Vec<Command>,
    ) {
        match leg {
            Leg::Outbound => {
                let route = agent.destination.and_then(|destination| {
                    query::find_path(world, agent.cell, destination, AgentKind::Pedestrian).ok()
                });
                match route {
                    Some(route) if route.is_empty() => {
                        agent.stop(PedestrianState::AtDestination);
                    }
                    Some(route) => agent.follow(route, PedestrianState::GoingToDestination),
                    None => {
                        debug!(pedestrian = agent.id.get(), "destination unreachable");
                        self.continue_leg(agent, Leg::Return, world, out);
                    }
                }
            }
            Leg::Return => {
                match query::find_path(world, agent.cell, agent.vehicle_cell, AgentKind::Pedestrian)
                {
                    Ok(route) if route.is_empty() => self.finish(agent, out),
                    Ok(route) => agent.follow(route, PedestrianState::ReturningToVehicle),
                    Err(error) => {
                        debug!(pedestrian = agent.id.get(), %error, "walked back to vehicle");
                        agent.cell = agent.vehicle_cell;
                        self.finish(agent, out);
                    }
                }
            }
        }
    }

    fn finish(&mut self, agent: &mut PedestrianAgent, out: &mut Vec<Command>) {
        agent.stop(PedestrianState::AtVehicle);
        if agent.reported {
            return;
        }
        agent.reported = true;
        let outcome = agent.outcome();
        debug!(
            pedestrian = agent.id.get(),
            walked = outcome.walked_cells,
            sidewalk = outcome.sidewalk_cells,
            "pedestrian back at vehicle"
        );
        out.push(Command::ReturnPedestrian {
            pedestrian: agent.id,
            vehicle: agent.vehicle,
        });
        out.push(Command::ReportOutcome {
            outcome: AgentOutcome::Pedestrian {
                pedestrian: agent.id,
                outcome,
            },
        });
    }

    fn advance(&mut self, seconds: f32, game_minutes: f32, world: &World, out: &mut Vec<Command>) {
        let distance = self.config.speed.max(0.0) * seconds;
        let ids: Vec<PedestrianId> = self.agents.keys().copied().collect();
        for id in ids {
            self.with_agent(id, |this, agent| {
                this.advance_agent(agent, distance, game_minutes, world, out);
            });
        }
    }

    fn advance_agent(
        &mut self,
        agent: &mut PedestrianAgent,
        distance: f32,
        game_minutes: f32,
        world: &World,
        out: &mut Vec<Command>,
    ) {
        match agent.state {
            PedestrianState::GoingToDestination
            | PedestrianState::ReturningToVehicle
            | PedestrianState::GoingToNeed => {
                let arrived = agent.travel(distance, |cell| query::is_sidewalk_like(world, cell));
                if arrived {
                    self.arrive(agent, out);
                }
            }
            PedestrianState::FulfillingNeed => {
                let done = agent.need.as_mut().map_or(true, |active| {
                    active.remaining_minutes -= game_minutes;
                    active.remaining_minutes <= 0.0
                });
                if done {
                    if let Some(active) = agent.need.take() {
                        trace!(pedestrian = agent.id.get(), need = ?active.need, "need fulfilled");
                        agent.fulfilled.push(active.need);
                    }
                    self.resume(agent, world, out);
                }
            }
            PedestrianState::AtDestination => {
                agent.respawn_remaining = respawn_delay(&mut self.rng, &self.config.respawn);
                agent.state = PedestrianState::Despawned;
                trace!(
                    pedestrian = agent.id.get(),
                    minutes = agent.respawn_remaining,
                    "pedestrian off the grid"
                );
            }
            PedestrianState::Despawned => {
                agent.respawn_remaining -= game_minutes;
                if agent.respawn_remaining <= 0.0 {
                    agent.state = PedestrianState::Respawning;
                    self.begin_leg(agent, Leg::Return, world, out);
                }
            }
            PedestrianState::Spawning
            | PedestrianState::Respawning
            | PedestrianState::AtVehicle => {}
        }
    }

    fn arrive(&mut self, agent: &mut PedestrianAgent, out: &mut Vec<Command>) {
        match agent.state {
            PedestrianState::GoingToDestination => {
                agent.stop(PedestrianState::AtDestination);
            }
            PedestrianState::ReturningToVehicle => self.finish(agent, out),
            PedestrianState::GoingToNeed => agent.stop(PedestrianState::FulfillingNeed),
            _ => {}
        }
    }

    fn resume(&mut self, agent: &mut PedestrianAgent, world: &World, out: &mut Vec<Command>) {
        let leg = agent.resume.take().unwrap_or(Leg::Return);
        self.continue_leg(agent, leg, world, out);
    }

    fn abandon_need(&mut self, agent: &mut PedestrianAgent, world: &World, out: &mut Vec<Command>) {
        if let Some(active) = agent.need.take() {
            debug!(pedestrian = agent.id.get(), need = ?active.need, "need abandoned");
            agent.unfulfilled.push(active.need);
        }
        self.resume(agent, world, out);
    }

    fn on_fixture_removed(&mut self, fixture: FixtureId, world: &World, out: &mut Vec<Command>) {
        let affected: Vec<PedestrianId> = self
            .agents
            .values()
            .filter(|agent| agent.need.is_some_and(|active| active.fixture == fixture))
            .map(|agent| agent.id)
            .collect();
        for id in affected {
            self.with_agent(id, |this, agent| this.abandon_need(agent, world, out));
        }
    }

    fn revalidate(&mut self, world: &World, out: &mut Vec<Command>) {
        let ids: Vec<PedestrianId> = self.agents.keys().copied().collect();
        for id in ids {
            self.with_agent(id, |this, agent| {
                if !agent.is_walking()
                    || query::is_route_valid(
                        world,
                        agent.cell,
                        agent.remaining_path(),
                        AgentKind::Pedestrian,
                    )
                {
                    return;
                }
                debug!(pedestrian = agent.id.get(), "route invalidated");
                match agent.state {
                    PedestrianState::GoingToNeed => this.abandon_need(agent, world, out),
                    PedestrianState::GoingToDestination => {
                        this.continue_leg(agent, Leg::Outbound, world, out);
                    }
                    _ => this.continue_leg(agent, Leg::Return, world, out),
                }
            });
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Leg {
    Outbound,
    Return,
}

#[derive(Clone, Copy, Debug)]
struct ActiveNeed {
    need: Need,
    fixture: FixtureId,
    remaining_minutes: f32,
}

#[derive(Clone, Debug)]
struct PedestrianAgent {
    id: PedestrianId,
    vehicle: VehicleId,
    vehicle_cell: CellCoord,
    cell: CellCoord,
    progress: f32,
    path: Vec<CellCoord>,
    cursor: usize,
    destination: Option<CellCoord>,
    state: PedestrianState,
    respawn_remaining: f32,
    need: Option<ActiveNeed>,
    resume: Option<Leg>,
    walked: Vec<CellCoord>,
    sidewalk_cells: u32,
    fulfilled: Vec<Need>,
    unfulfilled: Vec<Need>,
    reported: bool,
}

impl PedestrianAgent {
    fn new(id: PedestrianId, vehicle: VehicleId, cell: CellCoord) -> Self {
        Self {
            id,
            vehicle,
            vehicle_cell: cell,
            cell,
            progress: 0.0,
            path: Vec::new(),
            cursor: 0,
            destination: None,
            state: PedestrianState::Spawning,
            respawn_remaining: 0.0,
            need: None,
            resume: None,
            walked: Vec::new(),
            sidewalk_cells: 0,
            fulfilled: Vec::new(),
            unfulfilled: Vec::new(),
            reported: false,
        }
    }

    fn is_walking(&self) -> bool {
        matches!(
            self.state,
            PedestrianState::GoingToDestination
                | PedestrianState::ReturningToVehicle
                | PedestrianState::GoingToNeed
        )
    }

    fn next_cell(&self) -> Option<CellCoord> {
        self.path.get(self.cursor).copied()
    }

    fn remaining_path(&self) -> &[CellCoord] {
        self.path.get(self.cursor..).unwrap_or(&[])
    }

    fn follow(&mut self, route: Route, state: PedestrianState) {
        self.path = route.into_cells();
        self.cursor = 0;
        self.progress = 0.0;
        self.state = state;
    }

    fn stop(&mut self, state: PedestrianState) {
        self.path.clear();
        self.cursor = 0;
        self.progress = 0.0;
        self.state = state;
    }

    /// Walks `distance` cells, logging every entered cell; returns `true` once the path is exhausted.
    fn travel(&mut self, mut distance: f32, is_sidewalk: impl Fn(CellCoord) -> bool) -> bool {
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
            self.walked.push(next);
            if is_sidewalk(next) {
                self.sidewalk_cells += 1;
            }
        }
        true
    }

    fn outcome(&self) -> PedestrianOutcome {
        PedestrianOutcome {
            walked_cells: u32::try_from(self.walked.len()).unwrap_or(u32::MAX),
            sidewalk_cells: self.sidewalk_cells,
            fulfilled_needs: self.fulfilled.clone(),
            unfulfilled_needs: self.unfulfilled.clone(),
        }
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

    fn snapshot(&self) -> PedestrianSnapshot {
        PedestrianSnapshot {
            id: self.id,
            vehicle: self.vehicle,
            cell: self.cell,
            position: self.position(),
            state: self.state,
            need: self.need.map(|active| active.need),
        }
    }
}

/// Draws whether a need arises and which one, weighted by the configured weights.
fn draw_need(rng: &mut ChaCha8Rng, probability: f64, weights: &NeedWeights) -> Option<Need> {
    if probability.is_nan() || !rng.gen_bool(probability.clamp(0.0, 1.0)) {
        return None;
    }
    let distribution = WeightedIndex::new(Need::ALL.map(|need| weights.weight(need))).ok()?;
    Need::ALL.get(distribution.sample(rng)).copied()
}

fn respawn_delay(rng: &mut ChaCha8Rng, config: &RespawnConfig) -> f32 {
    let weights = config.bands.iter().map(|band| band.weight);
    let band = WeightedIndex::new(weights)
        .ok()
        .and_then(|distribution| config.bands.get(distribution.sample(rng)));
    let range = band.map_or(config.minutes, |band| band.minutes);
    uniform_minutes(rng, range)
}

fn uniform_minutes(rng: &mut ChaCha8Rng, range: MinuteRange) -> f32 {
    let range = range.normalized();
    if range.max > range.min && range.max.is_finite() {
        rng.gen_range(range.min..=range.max)
    } else {
        range.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkade_core::RespawnBand;

    #[test]
    fn zero_weight_need_is_never_drawn() {
        let weights = NeedWeights {
            trash: 0.6,
            thirst: 0.0,
            toilet: 0.4,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut counts: BTreeMap<Need, u32> = BTreeMap::new();
        for _ in 0..10_000 {
            let need = draw_need(&mut rng, 1.0, &weights).expect("need always drawn");
            *counts.entry(need).or_insert(0) += 1;
        }
        assert!(!counts.contains_key(&Need::Thirst));
        assert!(counts[&Need::Trash] > counts[&Need::Toilet]);
        assert!(counts[&Need::Toilet] > 0);
    }

    #[test]
    fn zero_probability_never_draws_a_need() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(draw_need(&mut rng, 0.0, &NeedWeights::default()), None);
        }
    }

    #[test]
    fn all_zero_weights_draw_nothing() {
        let weights = NeedWeights {
            trash: 0.0,
            thirst: 0.0,
            toilet: 0.0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(draw_need(&mut rng, 1.0, &weights), None);
    }

    #[test]
    fn respawn_delay_stays_inside_the_chosen_band() {
        let config = RespawnConfig {
            minutes: MinuteRange::new(500.0, 600.0),
            bands: vec![
                RespawnBand {
                    weight: 1.0,
                    minutes: MinuteRange::new(5.0, 10.0),
                },
                RespawnBand {
                    weight: 0.0,
                    minutes: MinuteRange::new(100.0, 200.0),
                },
            ],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..500 {
            let delay = respawn_delay(&mut rng, &config);
            assert!((5.0..=10.0).contains(&delay), "{delay}");
        }
    }

    #[test]
    fn respawn_delay_without_bands_uses_the_uniform_range() {
        let config = RespawnConfig {
            minutes: MinuteRange::new(40.0, 20.0),
            bands: Vec::new(),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..500 {
            let delay = respawn_delay(&mut rng, &config);
            assert!((20.0..=40.0).contains(&delay), "{delay}");
        }
    }

    #[test]
    fn travel_logs_every_entered_cell() {
        let start = CellCoord::new(0, 0);
        let mut agent = PedestrianAgent::new(PedestrianId::new(0), VehicleId::new(0), start);
        let cells = vec![CellCoord::new(1, 0), CellCoord::new(2, 0), CellCoord::new(3, 0)];
        agent.follow(Route::new(cells, 3), PedestrianState::GoingToDestination);

        assert!(!agent.travel(2.5, |cell| cell.column() == 2));
        assert_eq!(agent.walked.len(), 2);
        assert_eq!(agent.sidewalk_cells, 1);
        assert!(agent.travel(1.0, |_| false));
        let outcome = agent.outcome();
        assert_eq!(outcome.walked_cells, 3);
        assert_eq!(outcome.sidewalk_cells, 1);
    }
}
