#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Parkade.

mod clock;
mod grid;
mod navigation;
mod reservations;
mod rules;
pub mod transport;

use std::collections::{BTreeMap, BTreeSet};

use parkade_core::{
    BorderKind, CellCoord, CellPatch, Command, Edge, Event, FieldUpdate, FixtureKind, Orientation,
    PedestrianId, PlacementError, ScenarioConfig, SpawnerPair, SpotKind, VehicleId,
    WELCOME_BANNER,
};
use tracing::{debug, info};

use crate::{
    clock::Clock,
    grid::GridStore,
    reservations::ReservationLedger,
    transport::{GridTransport, TransportError},
};

pub use rules::{spot_open_edge, LANE_CROSSING_PENALTY};

/// Represents the authoritative Parkade world state.
#[derive(Debug)]
pub struct World {
    banner: &'static str,
    grid: GridStore,
    reservations: ReservationLedger,
    clock: Clock,
    economy: Economy,
    vehicle_spawners: BTreeSet<SpawnerPair>,
    pedestrian_destinations: BTreeSet<CellCoord>,
    vehicles: BTreeSet<VehicleId>,
    pedestrians: BTreeMap<PedestrianId, VehicleId>,
    next_vehicle_id: u32,
    next_pedestrian_id: u32,
    previous_day_rating: Option<f32>,
    last_rated_day: Option<u32>,
}

#[derive(Clone, Debug)]
struct Economy {
    starting_budget: i64,
    money: i64,
    meter_rate: u32,
    booth_rate: u32,
}

impl Economy {
    fn can_afford(&self, cost: u64) -> bool {
        i64::try_from(cost).is_ok_and(|cost| self.money >= cost)
    }

    fn spend(&mut self, cost: u64) {
        let cost = i64::try_from(cost).unwrap_or(i64::MAX);
        self.money = self.money.saturating_sub(cost);
    }

    fn earn(&mut self, cents: u64) {
        let cents = i64::try_from(cents).unwrap_or(i64::MAX);
        self.money = self.money.saturating_add(cents);
    }

    fn rate(&self, kind: SpotKind) -> u32 {
        match kind {
            SpotKind::Meter => self.meter_rate,
            SpotKind::Booth => self.booth_rate,
        }
    }

    fn set_rate(&mut self, kind: SpotKind, cents_per_hour: u32) {
        match kind {
            SpotKind::Meter => self.meter_rate = cents_per_hour,
            SpotKind::Booth => self.booth_rate = cents_per_hour,
        }
    }
}

impl World {
    /// Creates a world using the default scenario.
    #[must_use]
    pub fn new() -> Self {
        Self::from_scenario(&ScenarioConfig::default())
    }

    /// Creates a world sized, funded and timed according to the scenario.
    #[must_use]
    pub fn from_scenario(config: &ScenarioConfig) -> Self {
        let budget = i64::try_from(config.starting_budget).unwrap_or(i64::MAX);
        Self {
            banner: WELCOME_BANNER,
            grid: GridStore::new(config.grid.width, config.grid.height),
            reservations: ReservationLedger::new(),
            clock: Clock::new(&config.clock),
            economy: Economy {
                starting_budget: budget,
                money: budget,
                meter_rate: config.vehicles.rates.meter.cents_per_hour,
                booth_rate: config.vehicles.rates.booth.cents_per_hour,
            },
            vehicle_spawners: BTreeSet::new(),
            pedestrian_destinations: BTreeSet::new(),
            vehicles: BTreeSet::new(),
            pedestrians: BTreeMap::new(),
            next_vehicle_id: 0,
            next_pedestrian_id: 0,
            previous_day_rating: None,
            last_rated_day: None,
        }
    }

    fn discard_agents(&mut self) {
        self.vehicles.clear();
        self.pedestrians.clear();
        self.reservations.clear();
    }

    fn prune_registrations(&mut self) -> bool {
        let (width, height) = self.grid.dimensions();
        let spawners_before = self.vehicle_spawners.len();
        let destinations_before = self.pedestrian_destinations.len();
        self.vehicle_spawners.retain(|pair| {
            pair.spawn.is_within(width, height) && pair.despawn.is_within(width, height)
        });
        self.pedestrian_destinations
            .retain(|cell| cell.is_within(width, height));
        spawners_before != self.vehicle_spawners.len()
            || destinations_before != self.pedestrian_destinations.len()
    }

    fn configure_grid(&mut self, width: u32, height: u32, out_events: &mut Vec<Event>) {
        let dropped = self.grid.resize(width, height);
        self.discard_agents();
        for fixture in dropped {
            out_events.push(Event::FixtureRemoved {
                fixture: fixture.id,
                kind: fixture.kind,
                cells: fixture.cells(),
            });
        }
        if self.prune_registrations() {
            out_events.push(Event::SpawnersChanged);
        }
        info!(width, height, "grid configured");
        out_events.push(Event::GridConfigured { width, height });
    }

    fn tick(&mut self, dt: std::time::Duration, out_events: &mut Vec<Event>) {
        let advance = self.clock.advance(dt);
        out_events.push(Event::TimeAdvanced {
            dt: advance.scaled_dt,
            game_minutes: advance.game_minutes,
            day: self.clock.day(),
            minute_of_day: self.clock.minute_of_day(),
        });
        for day in advance.finished_days {
            info!(day, "day finalized");
            out_events.push(Event::DayFinalized { day });
        }
    }

    fn update_cell(&mut self, cell: CellCoord, patch: CellPatch, out_events: &mut Vec<Event>) {
        let result = self.surface_cost(cell, &patch).and_then(|cost| {
            if !self.economy.can_afford(cost) {
                return Err(PlacementError::InsufficientFunds);
            }
            let updated = self.grid.update_cell(cell, &patch)?;
            self.economy.spend(cost);
            Ok(updated)
        });

        match result {
            Ok(_) => out_events.push(Event::LayoutChanged { cells: vec![cell] }),
            Err(reason) => {
                debug!(?cell, %reason, "cell update rejected");
                out_events.push(Event::CellUpdateRejected { cell, reason });
            }
        }
    }

    fn surface_cost(&self, cell: CellCoord, patch: &CellPatch) -> Result<u64, PlacementError> {
        let data = self.grid.cell(cell).ok_or(PlacementError::OutOfBounds)?;
        if data.permanent && patch.edits_content() {
            return Err(PlacementError::Permanent);
        }
        Ok(match patch.surface {
            FieldUpdate::Set(surface) if data.surface != Some(surface) => surface.cost_per_tile(),
            _ => 0,
        })
    }

    fn set_border_segment(
        &mut self,
        cell: CellCoord,
        edge: Edge,
        kind: BorderKind,
        out_events: &mut Vec<Event>,
    ) {
        match self.grid.set_border_segment(cell, edge, kind) {
            Ok(_) => out_events.push(Event::LayoutChanged {
                cells: self.edge_cells(cell, edge),
            }),
            Err(reason) => {
                debug!(?cell, ?edge, %reason, "border segment rejected");
                out_events.push(Event::BorderSegmentRejected { cell, edge, reason });
            }
        }
    }

    fn remove_border_segment(&mut self, cell: CellCoord, edge: Edge, out_events: &mut Vec<Event>) {
        match self.grid.remove_border_segment(cell, edge) {
            Ok(Some(_)) => out_events.push(Event::LayoutChanged {
                cells: self.edge_cells(cell, edge),
            }),
            Ok(None) => {}
            Err(reason) => {
                debug!(?cell, ?edge, %reason, "border segment removal rejected");
                out_events.push(Event::BorderSegmentRejected { cell, edge, reason });
            }
        }
    }

    fn edge_cells(&self, cell: CellCoord, edge: Edge) -> Vec<CellCoord> {
        let mut cells = vec![cell];
        cells.extend(self.grid.neighbor(cell, edge));
        cells
    }

    fn place_fixture(
        &mut self,
        kind: FixtureKind,
        anchor: CellCoord,
        orientation: Orientation,
        out_events: &mut Vec<Event>,
    ) {
        let cost = kind.rules().cost;
        let replaced = self.grid.cell(anchor).and_then(|data| data.fixture);
        let result = self
            .grid
            .check_placement(kind, anchor, orientation)
            .and_then(|_| {
                if self.economy.can_afford(cost) {
                    Ok(())
                } else {
                    Err(PlacementError::InsufficientFunds)
                }
            })
            .and_then(|()| self.grid.place_fixture(kind, anchor, orientation));

        match result {
            Ok(fixture) => {
                self.economy.spend(cost);
                if let Some(spot) = replaced.filter(|_| kind == FixtureKind::ParkingMeter) {
                    out_events.push(Event::FixtureRemoved {
                        fixture: spot.id,
                        kind: spot.kind,
                        cells: spot.cells(),
                    });
                }
                let cells = fixture.cells();
                debug!(?kind, ?anchor, fixture = fixture.id.get(), "fixture placed");
                out_events.push(Event::FixturePlaced {
                    fixture: fixture.id,
                    kind,
                    cells: cells.clone(),
                });
                out_events.push(Event::LayoutChanged { cells });
            }
            Err(reason) => {
                debug!(?kind, ?anchor, %reason, "fixture placement rejected");
                out_events.push(Event::FixturePlacementRejected {
                    kind,
                    anchor,
                    reason,
                });
            }
        }
    }

    fn remove_fixture(&mut self, cell: CellCoord, out_events: &mut Vec<Event>) {
        let fixture = match self.grid.remove_fixture(cell) {
            Ok(fixture) => fixture,
            Err(reason) => {
                debug!(?cell, %reason, "fixture removal rejected");
                out_events.push(Event::FixtureRemovalRejected { cell, reason });
                return;
            }
        };

        let cells = fixture.cells();
        out_events.push(Event::FixtureRemoved {
            fixture: fixture.id,
            kind: fixture.kind,
            cells: cells.clone(),
        });

        if fixture.kind == FixtureKind::ParkingMeter {
            if let Ok(spot) =
                self.grid
                    .place_fixture(FixtureKind::ParkingSpot, fixture.anchor, fixture.orientation)
            {
                out_events.push(Event::FixturePlaced {
                    fixture: spot.id,
                    kind: spot.kind,
                    cells: spot.cells(),
                });
            }
        }

        for covered in &cells {
            if query::spot_kind(self, *covered).is_some() {
                continue;
            }
            if let Some(vehicle) = self.reservations.release_spot(*covered) {
                out_events.push(Event::SpotReleased {
                    vehicle,
                    spot: *covered,
                });
            }
        }
        out_events.push(Event::LayoutChanged { cells });
    }

    fn spawn_vehicle(&mut self, pair: SpawnerPair, out_events: &mut Vec<Event>) {
        if !self.vehicle_spawners.contains(&pair) {
            debug!(?pair, "spawn ignored for unregistered spawner");
            return;
        }
        let vehicle = VehicleId::new(self.next_vehicle_id);
        self.next_vehicle_id = self.next_vehicle_id.saturating_add(1);
        let _ = self.vehicles.insert(vehicle);
        out_events.push(Event::VehicleSpawned { vehicle, pair });
    }

    fn despawn_vehicle(&mut self, vehicle: VehicleId, out_events: &mut Vec<Event>) {
        if !self.vehicles.remove(&vehicle) {
            return;
        }
        for spot in self.reservations.release_vehicle(vehicle) {
            out_events.push(Event::SpotReleased { vehicle, spot });
        }
        self.pedestrians.retain(|_, owner| *owner != vehicle);
        out_events.push(Event::VehicleDespawned { vehicle });
    }

    fn reserve_spot(&mut self, vehicle: VehicleId, spot: CellCoord, out_events: &mut Vec<Event>) {
        if !self.vehicles.contains(&vehicle) || query::spot_kind(self, spot).is_none() {
            debug!(vehicle = vehicle.get(), ?spot, "reservation of unknown spot or vehicle");
            out_events.push(Event::SpotReservationRejected {
                vehicle,
                spot,
                holder: None,
            });
            return;
        }

        match self.reservations.try_reserve(spot, vehicle) {
            Ok(()) => out_events.push(Event::SpotReserved { vehicle, spot }),
            Err(holder) => {
                debug!(
                    vehicle = vehicle.get(),
                    holder = holder.get(),
                    ?spot,
                    "reservation contended"
                );
                out_events.push(Event::SpotReservationRejected {
                    vehicle,
                    spot,
                    holder: Some(holder),
                });
            }
        }
    }

    fn record_daily_rating(&mut self, day: u32, rating: Option<f32>, out_events: &mut Vec<Event>) {
        if self.last_rated_day.is_some_and(|last| day <= last) {
            debug!(day, "daily rating already recorded");
            return;
        }
        let rating = rating.map(|value| value.clamp(0.0, 100.0));
        self.last_rated_day = Some(day);
        self.previous_day_rating = rating;
        info!(day, ?rating, "daily rating recorded");
        out_events.push(Event::DailyRatingRecorded { day, rating });
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureGrid { width, height } => {
            world.configure_grid(width, height, out_events);
        }
        Command::Tick { dt } => world.tick(dt, out_events),
        Command::SetTimeScale { scale } => {
            world.clock.set_scale(scale);
            out_events.push(Event::ClockChanged {
                paused: world.clock.is_paused(),
                scale: world.clock.scale(),
            });
        }
        Command::SetPaused { paused } => {
            world.clock.set_paused(paused);
            out_events.push(Event::ClockChanged {
                paused,
                scale: world.clock.scale(),
            });
        }
        Command::UpdateCell { cell, patch } => world.update_cell(cell, patch, out_events),
        Command::SetBorderSegment { cell, edge, kind } => {
            world.set_border_segment(cell, edge, kind, out_events);
        }
        Command::RemoveBorderSegment { cell, edge } => {
            world.remove_border_segment(cell, edge, out_events);
        }
        Command::PlaceFixture {
            kind,
            anchor,
            orientation,
        } => world.place_fixture(kind, anchor, orientation, out_events),
        Command::RemoveFixture { cell } => world.remove_fixture(cell, out_events),
        Command::AddVehicleSpawner { pair } => {
            let (width, height) = world.grid.dimensions();
            if pair.spawn.is_within(width, height)
                && pair.despawn.is_within(width, height)
                && world.vehicle_spawners.insert(pair)
            {
                out_events.push(Event::SpawnersChanged);
            }
        }
        Command::RemoveVehicleSpawner { pair } => {
            if world.vehicle_spawners.remove(&pair) {
                out_events.push(Event::SpawnersChanged);
            }
        }
        Command::AddPedestrianDestination { cell } => {
            if world.grid.contains(cell) && world.pedestrian_destinations.insert(cell) {
                out_events.push(Event::SpawnersChanged);
            }
        }
        Command::RemovePedestrianDestination { cell } => {
            if world.pedestrian_destinations.remove(&cell) {
                out_events.push(Event::SpawnersChanged);
            }
        }
        Command::SetParkingRate {
            kind,
            cents_per_hour,
        } => {
            world.economy.set_rate(kind, cents_per_hour);
            out_events.push(Event::ParkingRateChanged {
                kind,
                cents_per_hour,
            });
        }
        Command::SpawnVehicle { pair } => world.spawn_vehicle(pair, out_events),
        Command::DespawnVehicle { vehicle } => world.despawn_vehicle(vehicle, out_events),
        Command::ReserveSpot { vehicle, spot } => world.reserve_spot(vehicle, spot, out_events),
        Command::ReleaseSpot { vehicle, spot } => {
            if world.reservations.release(spot, vehicle) {
                out_events.push(Event::SpotReleased { vehicle, spot });
            }
        }
        Command::CollectParkingFee {
            vehicle,
            kind,
            cents,
        } => {
            if world.vehicles.contains(&vehicle) {
                world.economy.earn(cents);
                debug!(vehicle = vehicle.get(), ?kind, cents, "parking fee collected");
                out_events.push(Event::ParkingFeeCollected { vehicle, cents });
            }
        }
        Command::SpawnPedestrian { vehicle, cell } => {
            if world.vehicles.contains(&vehicle) && world.grid.contains(cell) {
                let pedestrian = PedestrianId::new(world.next_pedestrian_id);
                world.next_pedestrian_id = world.next_pedestrian_id.saturating_add(1);
                let _ = world.pedestrians.insert(pedestrian, vehicle);
                out_events.push(Event::PedestrianSpawned {
                    pedestrian,
                    vehicle,
                    cell,
                });
            }
        }
        Command::ReturnPedestrian {
            pedestrian,
            vehicle,
        } => {
            if world.pedestrians.get(&pedestrian) == Some(&vehicle) {
                let _ = world.pedestrians.remove(&pedestrian);
                out_events.push(Event::PedestrianReturned {
                    pedestrian,
                    vehicle,
                });
            }
        }
        Command::ReportOutcome { outcome } => {
            out_events.push(Event::OutcomeReported { outcome });
        }
        Command::RecordDailyRating { day, rating } => {
            world.record_daily_rating(day, rating, out_events);
        }
    }
}

/// Replaces the world's layout with the transported one.
///
/// The world keeps its own dimensions: entries outside them are dropped.
/// Entries outside the transport's declared dimensions or inconsistent
/// fixtures fail the whole load and leave the world untouched. All agents
/// and reservations are discarded.
pub fn load_layout(
    world: &mut World,
    transport: &GridTransport,
    out_events: &mut Vec<Event>,
) -> Result<(), TransportError> {
    transport.validate()?;

    let (width, height) = world.grid.dimensions();
    world.grid = GridStore::restore(
        width,
        height,
        transport
            .cells
            .iter()
            .map(|(column, row, data)| (CellCoord::new(*column, *row), *data)),
        transport
            .segments
            .iter()
            .map(|(column, row, edge, kind)| (CellCoord::new(*column, *row), *edge, *kind)),
    );
    world.vehicle_spawners = transport.spawner_pairs().collect();
    world.pedestrian_destinations = transport
        .pedestrian_destinations
        .iter()
        .map(|(column, row)| CellCoord::new(*column, *row))
        .collect();
    let _ = world.prune_registrations();
    world.discard_agents();

    info!(
        width,
        height,
        cells = transport.cells.len(),
        "layout loaded"
    );
    out_events.push(Event::GridConfigured { width, height });
    out_events.push(Event::SpawnersChanged);
    Ok(())
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::collections::BTreeMap;

    use super::{rules, GridTransport, World};
    use crate::navigation;
    use parkade_core::{
        AgentKind, BorderKind, CellCoord, CellData, Direction, Edge, Fixture, FixtureKind,
        MetricsSnapshot, Need, NoPath, Route, SegmentKey, SpawnerPair, SpotKind, VehicleId,
    };

    /// Retrieves the welcome banner that adapters may display to players.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Number of columns and rows of the grid.
    #[must_use]
    pub fn dimensions(world: &World) -> (u32, u32) {
        world.grid.dimensions()
    }

    /// Copy of the cell record; `None` outside the grid.
    #[must_use]
    pub fn cell(world: &World, cell: CellCoord) -> Option<CellData> {
        world.grid.cell(cell)
    }

    /// Border kind stored on the edge, whichever side wrote it.
    #[must_use]
    pub fn segment(world: &World, cell: CellCoord, edge: Edge) -> Option<BorderKind> {
        world.grid.segment_for(cell, edge)
    }

    /// Key under which the edge's record exists, if any.
    #[must_use]
    pub fn find_existing_segment_key(
        world: &World,
        cell: CellCoord,
        edge: Edge,
    ) -> Option<SegmentKey> {
        world.grid.find_existing_segment_key(cell, edge)
    }

    /// Kind stored under the exact key.
    #[must_use]
    pub fn border_segment(world: &World, key: SegmentKey) -> Option<BorderKind> {
        world.grid.border_segment(key)
    }

    /// Evaluates the edge rules for one side of a move.
    #[must_use]
    pub fn is_edge_blocked(
        world: &World,
        cell: CellCoord,
        edge: Edge,
        agent: AgentKind,
        direction: Direction,
        is_entry: bool,
        one_way_check: bool,
    ) -> bool {
        rules::is_edge_blocked(
            &world.grid,
            cell,
            edge,
            agent,
            direction,
            is_entry,
            one_way_check,
        )
    }

    /// Penalty for leaving `from` in `direction`, on top of the unit step cost.
    #[must_use]
    pub fn edge_crossing_cost(
        world: &World,
        from: CellCoord,
        direction: Direction,
        agent: AgentKind,
    ) -> u32 {
        rules::edge_crossing_cost(&world.grid, from, direction, agent)
    }

    /// Reports whether a single step between adjacent cells is admissible.
    #[must_use]
    pub fn is_move_allowed(world: &World, from: CellCoord, to: CellCoord, agent: AgentKind) -> bool {
        rules::is_move_allowed(&world.grid, from, to, agent)
    }

    /// Cheapest admissible route, excluding `from` and including `to`.
    pub fn find_path(
        world: &World,
        from: CellCoord,
        to: CellCoord,
        agent: AgentKind,
    ) -> Result<Route, NoPath> {
        navigation::find_path(&world.grid, from, to, agent)
    }

    /// Reports whether every consecutive step of the remaining route is still admissible.
    #[must_use]
    pub fn is_route_valid(
        world: &World,
        from: CellCoord,
        remaining: &[CellCoord],
        agent: AgentKind,
    ) -> bool {
        let mut current = from;
        for next in remaining {
            if !is_move_allowed(world, current, *next, agent) {
                return false;
            }
            current = *next;
        }
        true
    }

    /// Fixture covering the cell, resolving second cells to their anchor.
    #[must_use]
    pub fn fixture_at(world: &World, cell: CellCoord) -> Option<Fixture> {
        world.grid.fixture_covering(cell)
    }

    /// Every placed fixture in anchor row-major order.
    #[must_use]
    pub fn fixtures(world: &World) -> Vec<Fixture> {
        world.grid.fixtures().collect()
    }

    /// Fixtures that satisfy the need, ordered by identifier.
    #[must_use]
    pub fn need_fixtures(world: &World, need: Need) -> Vec<Fixture> {
        let mut fixtures: Vec<Fixture> = world
            .grid
            .fixtures()
            .filter(|fixture| fixture.kind.rules().satisfies == Some(need))
            .collect();
        fixtures.sort_by_key(|fixture| fixture.id);
        fixtures
    }

    /// Payment style of the parking spot anchored at the cell.
    #[must_use]
    pub fn spot_kind(world: &World, cell: CellCoord) -> Option<SpotKind> {
        world
            .grid
            .cell(cell)
            .and_then(|data| data.fixture)
            .and_then(|fixture| fixture.kind.spot_kind())
    }

    /// Every parking spot cell, metered or not, in ascending order.
    #[must_use]
    pub fn parking_spots(world: &World) -> Vec<CellCoord> {
        let mut spots: Vec<CellCoord> = world
            .grid
            .fixtures()
            .filter(|fixture| fixture.kind.spot_kind().is_some())
            .map(|fixture| fixture.anchor)
            .collect();
        spots.sort();
        spots
    }

    /// Parking spots nobody holds, in ascending order.
    #[must_use]
    pub fn vacant_spots(world: &World) -> Vec<CellCoord> {
        parking_spots(world)
            .into_iter()
            .filter(|spot| world.reservations.holder(*spot).is_none())
            .collect()
    }

    /// Vehicle holding the spot.
    #[must_use]
    pub fn reservation_holder(world: &World, spot: CellCoord) -> Option<VehicleId> {
        world.reservations.holder(spot)
    }

    /// Current hourly rate for the spot kind, in cents.
    #[must_use]
    pub fn parking_rate(world: &World, kind: SpotKind) -> u32 {
        world.economy.rate(kind)
    }

    /// Registered spawner pairs in ascending order.
    #[must_use]
    pub fn vehicle_spawners(world: &World) -> Vec<SpawnerPair> {
        world.vehicle_spawners.iter().copied().collect()
    }

    /// Registered pedestrian destinations in ascending order.
    #[must_use]
    pub fn pedestrian_destinations(world: &World) -> Vec<CellCoord> {
        world.pedestrian_destinations.iter().copied().collect()
    }

    /// Reports whether pedestrians treat the cell as a sidewalk.
    #[must_use]
    pub fn is_sidewalk_like(world: &World, cell: CellCoord) -> bool {
        world
            .grid
            .cell(cell)
            .is_some_and(|data| data.is_sidewalk_like())
    }

    /// Current balance, in cents.
    #[must_use]
    pub fn money(world: &World) -> i64 {
        world.economy.money
    }

    /// Rating of the most recently finalized day.
    #[must_use]
    pub fn previous_day_rating(world: &World) -> Option<f32> {
        world.previous_day_rating
    }

    /// Read-only view of the clock.
    #[must_use]
    pub fn clock(world: &World) -> ClockView {
        ClockView {
            day: world.clock.day(),
            minute_of_day: world.clock.minute_of_day(),
            total_minutes: world.clock.total_minutes(),
            paused: world.clock.is_paused(),
            scale: world.clock.scale(),
        }
    }

    /// Display label such as `Day 1, 06:00`.
    #[must_use]
    pub fn clock_label(world: &World) -> String {
        world.clock.label()
    }

    /// Aggregate figures for win/lose evaluation.
    #[must_use]
    pub fn metrics(world: &World) -> MetricsSnapshot {
        let mut fixture_counts: BTreeMap<FixtureKind, u32> = BTreeMap::new();
        for fixture in world.grid.fixtures() {
            *fixture_counts.entry(fixture.kind).or_insert(0) += 1;
        }
        let parking_spots = u32::try_from(parking_spots(world).len()).unwrap_or(u32::MAX);

        MetricsSnapshot {
            profit: world
                .economy
                .money
                .saturating_sub(world.economy.starting_budget),
            money: world.economy.money,
            rating: world.previous_day_rating,
            parking_spots,
            fixture_counts,
        }
    }

    /// Captures the layout in transport form with sorted entries.
    #[must_use]
    pub fn export_layout(world: &World) -> GridTransport {
        let (width, height) = world.grid.dimensions();
        let mut cells: Vec<(u32, u32, CellData)> = world
            .grid
            .iter()
            .filter(|(_, data)| data.is_populated())
            .map(|(cell, data)| (cell.column(), cell.row(), *data))
            .collect();
        cells.sort_by_key(|(column, row, _)| (*column, *row));

        let mut segments: Vec<(u32, u32, Edge, BorderKind)> = world
            .grid
            .segments()
            .map(|(key, kind)| (key.cell().column(), key.cell().row(), key.edge(), kind))
            .collect();
        segments.sort_by_key(|(column, row, edge, _)| (*column, *row, *edge));

        GridTransport {
            width,
            height,
            cells,
            segments,
            vehicle_spawners: world
                .vehicle_spawners
                .iter()
                .map(|pair| {
                    [
                        pair.spawn.column(),
                        pair.spawn.row(),
                        pair.despawn.column(),
                        pair.despawn.row(),
                    ]
                })
                .collect(),
            pedestrian_destinations: world
                .pedestrian_destinations
                .iter()
                .map(|cell| (cell.column(), cell.row()))
                .collect(),
        }
    }

    /// Snapshot of the world clock.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct ClockView {
        /// Zero-based day index.
        pub day: u32,
        /// Whole minutes since midnight.
        pub minute_of_day: u32,
        /// Fractional minutes since day zero, 00:00.
        pub total_minutes: f64,
        /// Whether the clock is paused.
        pub paused: bool,
        /// Active time scale.
        pub scale: f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkade_core::{AgentOutcome, SurfaceKind, VehicleOutcome};
    use std::time::Duration;

    fn world_with_grid(width: u32, height: u32) -> World {
        World::from_scenario(&ScenarioConfig::with_grid(width, height))
    }

    fn run(world: &mut World, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        apply(world, command, &mut events);
        events
    }

    #[test]
    fn tick_emits_time_then_day_finalized() {
        let mut world = World::from_scenario(&ScenarioConfig {
            clock: parkade_core::ClockConfig {
                minutes_per_second: 1.0,
                start_minute: 1_430,
            },
            ..ScenarioConfig::default()
        });

        let events = run(
            &mut world,
            Command::Tick {
                dt: Duration::from_secs(20),
            },
        );

        assert!(matches!(
            events.first(),
            Some(Event::TimeAdvanced {
                day: 1,
                minute_of_day: 10,
                ..
            })
        ));
        assert_eq!(events.get(1), Some(&Event::DayFinalized { day: 0 }));
        assert_eq!(query::clock_label(&world), "Day 2, 00:10");
    }

    #[test]
    fn extreme_time_scale_ticks_without_panicking() {
        let mut world = World::from_scenario(&ScenarioConfig::default());
        let _ = run(&mut world, Command::SetTimeScale { scale: 1.0e30 });

        let events = run(
            &mut world,
            Command::Tick {
                dt: Duration::from_secs(1),
            },
        );

        assert!(matches!(
            events.first(),
            Some(Event::TimeAdvanced { dt, .. }) if *dt == Duration::from_secs(86_400)
        ));
        let finalized = events
            .iter()
            .filter(|event| matches!(event, Event::DayFinalized { .. }))
            .count();
        assert_eq!(finalized, 60);
    }

    #[test]
    fn fixture_purchase_checks_funds() {
        let mut world = World::from_scenario(&ScenarioConfig {
            starting_budget: 2_500,
            ..ScenarioConfig::with_grid(4, 4)
        });

        let placed = run(
            &mut world,
            Command::PlaceFixture {
                kind: FixtureKind::ParkingSpot,
                anchor: CellCoord::new(1, 1),
                orientation: Orientation::NORTH,
            },
        );
        assert!(matches!(placed.first(), Some(Event::FixturePlaced { .. })));
        assert_eq!(query::money(&world), 500);

        let rejected = run(
            &mut world,
            Command::PlaceFixture {
                kind: FixtureKind::ParkingMeter,
                anchor: CellCoord::new(1, 1),
                orientation: Orientation::NORTH,
            },
        );
        assert_eq!(
            rejected,
            vec![Event::FixturePlacementRejected {
                kind: FixtureKind::ParkingMeter,
                anchor: CellCoord::new(1, 1),
                reason: PlacementError::InsufficientFunds,
            }]
        );
        assert_eq!(query::money(&world), 500);
        assert_eq!(query::metrics(&world).profit, -2_000);
    }

    #[test]
    fn surfacing_charges_per_tile_once() {
        let mut world = world_with_grid(3, 3);
        let cell = CellCoord::new(0, 0);
        let budget = query::money(&world);

        let _ = run(
            &mut world,
            Command::UpdateCell {
                cell,
                patch: CellPatch::surface(SurfaceKind::Asphalt),
            },
        );
        let _ = run(
            &mut world,
            Command::UpdateCell {
                cell,
                patch: CellPatch::surface(SurfaceKind::Asphalt),
            },
        );

        assert_eq!(query::money(&world), budget - 300);
    }

    #[test]
    fn out_of_bounds_update_is_rejected() {
        let mut world = world_with_grid(3, 3);
        let cell = CellCoord::new(3, 3);
        let events = run(
            &mut world,
            Command::UpdateCell {
                cell,
                patch: CellPatch::surface(SurfaceKind::Grass),
            },
        );
        assert_eq!(
            events,
            vec![Event::CellUpdateRejected {
                cell,
                reason: PlacementError::OutOfBounds,
            }]
        );
    }

    #[test]
    fn spawn_requires_registered_pair() {
        let mut world = world_with_grid(4, 4);
        let pair = SpawnerPair::new(CellCoord::new(0, 0), CellCoord::new(3, 0));
        assert!(run(&mut world, Command::SpawnVehicle { pair }).is_empty());

        let _ = run(&mut world, Command::AddVehicleSpawner { pair });
        let events = run(&mut world, Command::SpawnVehicle { pair });
        assert_eq!(
            events,
            vec![Event::VehicleSpawned {
                vehicle: VehicleId::new(0),
                pair,
            }]
        );
    }

    #[test]
    fn removing_a_spot_releases_its_reservation() {
        let mut world = world_with_grid(4, 4);
        let pair = SpawnerPair::new(CellCoord::new(0, 0), CellCoord::new(3, 0));
        let spot = CellCoord::new(2, 2);
        let _ = run(&mut world, Command::AddVehicleSpawner { pair });
        let _ = run(&mut world, Command::SpawnVehicle { pair });
        let _ = run(
            &mut world,
            Command::PlaceFixture {
                kind: FixtureKind::ParkingSpot,
                anchor: spot,
                orientation: Orientation::NORTH,
            },
        );
        let vehicle = VehicleId::new(0);
        let _ = run(&mut world, Command::ReserveSpot { vehicle, spot });
        assert_eq!(query::reservation_holder(&world, spot), Some(vehicle));

        let events = run(&mut world, Command::RemoveFixture { cell: spot });

        assert!(events.contains(&Event::SpotReleased { vehicle, spot }));
        assert_eq!(query::reservation_holder(&world, spot), None);
    }

    #[test]
    fn removing_a_meter_restores_the_spot() {
        let mut world = world_with_grid(4, 4);
        let spot = CellCoord::new(1, 2);
        let facing = Orientation::new(2).expect("valid orientation");
        for kind in [FixtureKind::ParkingSpot, FixtureKind::ParkingMeter] {
            let _ = run(
                &mut world,
                Command::PlaceFixture {
                    kind,
                    anchor: spot,
                    orientation: facing,
                },
            );
        }
        assert_eq!(query::spot_kind(&world, spot), Some(SpotKind::Meter));

        let _ = run(&mut world, Command::RemoveFixture { cell: spot });

        assert_eq!(query::spot_kind(&world, spot), Some(SpotKind::Booth));
        assert_eq!(
            query::fixture_at(&world, spot).map(|fixture| fixture.orientation),
            Some(facing)
        );
    }

    #[test]
    fn daily_rating_is_recorded_once_per_day() {
        let mut world = world_with_grid(2, 2);
        let first = run(
            &mut world,
            Command::RecordDailyRating {
                day: 0,
                rating: Some(80.0),
            },
        );
        assert_eq!(first.len(), 1);

        let repeat = run(
            &mut world,
            Command::RecordDailyRating {
                day: 0,
                rating: Some(10.0),
            },
        );
        assert!(repeat.is_empty());
        assert_eq!(query::previous_day_rating(&world), Some(80.0));
    }

    #[test]
    fn outcomes_are_relayed() {
        let mut world = world_with_grid(2, 2);
        let outcome = AgentOutcome::Vehicle {
            vehicle: VehicleId::new(3),
            outcome: VehicleOutcome::FailedToPark,
        };
        assert_eq!(
            run(
                &mut world,
                Command::ReportOutcome {
                    outcome: outcome.clone()
                }
            ),
            vec![Event::OutcomeReported { outcome }]
        );
    }

    #[test]
    fn resize_discards_agents_and_prunes_spawners() {
        let mut world = world_with_grid(6, 6);
        let pair = SpawnerPair::new(CellCoord::new(0, 0), CellCoord::new(5, 5));
        let _ = run(&mut world, Command::AddVehicleSpawner { pair });
        let _ = run(&mut world, Command::SpawnVehicle { pair });

        let events = run(
            &mut world,
            Command::ConfigureGrid {
                width: 4,
                height: 4,
            },
        );

        assert_eq!(
            events,
            vec![
                Event::SpawnersChanged,
                Event::GridConfigured {
                    width: 4,
                    height: 4
                }
            ]
        );
        assert!(query::vehicle_spawners(&world).is_empty());
        assert!(run(
            &mut world,
            Command::DespawnVehicle {
                vehicle: VehicleId::new(0)
            }
        )
        .is_empty());
    }
}
