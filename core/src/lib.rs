#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Parkade simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and the lifecycle systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems to react to deterministically. Systems consume event streams,
//! query the world read-only, and respond exclusively with new command batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod config;
mod grid;
mod outcome;

pub use config::{
    ClockConfig, GridConfig, Messages, MinuteRange, NeedWeights, ParkingRates, PedestrianConfig,
    RateTier, RespawnBand, RespawnConfig, ScenarioConfig, SpawnSchedule, SpawnWindow,
    VehicleConfig,
};
pub use grid::{
    Blocking, BorderKind, CellData, CellPatch, FieldUpdate, Fixture, FixtureId, FixtureKind,
    FixtureRules, Orientation, SegmentKey, SpawnerPair, SurfaceKind, TravelFlags,
};
pub use outcome::{AgentOutcome, MetricsSnapshot, PedestrianOutcome, VehicleOutcome};

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Welcome to Parkade.";

/// Number of in-game minutes contained in a single day.
pub const MINUTES_PER_DAY: u32 = 1_440;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Resizes the grid, preserving content that still fits and clearing all agents.
    ConfigureGrid {
        /// Number of cell columns.
        width: u32,
        /// Number of cell rows.
        height: u32,
    },
    /// Advances the simulation clock by the provided real-time delta.
    Tick {
        /// Real time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Scales how quickly game time advances relative to real time.
    SetTimeScale {
        /// Multiplier applied to every tick delta. Negative values clamp to zero.
        scale: f32,
    },
    /// Freezes or resumes game time.
    SetPaused {
        /// Whether the clock should ignore tick deltas.
        paused: bool,
    },
    /// Merges a partial update into a cell record.
    UpdateCell {
        /// Cell receiving the update.
        cell: CellCoord,
        /// Fields to set, clear, or keep.
        patch: CellPatch,
    },
    /// Writes a border segment on one edge of a cell.
    SetBorderSegment {
        /// Cell whose edge is being marked.
        cell: CellCoord,
        /// Edge of the cell that receives the segment.
        edge: Edge,
        /// Kind of marking stored on the edge.
        kind: BorderKind,
    },
    /// Removes the border segment stored on one edge of a cell.
    RemoveBorderSegment {
        /// Cell whose edge is being cleared.
        cell: CellCoord,
        /// Edge of the cell to clear.
        edge: Edge,
    },
    /// Places a fixture anchored at the provided cell.
    PlaceFixture {
        /// Kind of fixture to construct.
        kind: FixtureKind,
        /// Cell that anchors the fixture.
        anchor: CellCoord,
        /// Facing of the fixture.
        orientation: Orientation,
    },
    /// Removes the fixture covering the provided cell.
    RemoveFixture {
        /// Either the anchor or the secondary cell of the fixture.
        cell: CellCoord,
    },
    /// Registers a vehicle spawner paired with its despawner.
    AddVehicleSpawner {
        /// Spawn and despawn cells.
        pair: SpawnerPair,
    },
    /// Unregisters a vehicle spawner pair.
    RemoveVehicleSpawner {
        /// Pair to remove.
        pair: SpawnerPair,
    },
    /// Registers a pedestrian destination cell.
    AddPedestrianDestination {
        /// Destination cell.
        cell: CellCoord,
    },
    /// Unregisters a pedestrian destination cell.
    RemovePedestrianDestination {
        /// Destination cell.
        cell: CellCoord,
    },
    /// Updates the hourly rate charged at spots of the given kind.
    SetParkingRate {
        /// Spot kind whose rate changes.
        kind: SpotKind,
        /// Price per in-game hour, in cents.
        cents_per_hour: u32,
    },
    /// Requests that the world allocate a vehicle at the pair's spawn cell.
    SpawnVehicle {
        /// Spawner pair the vehicle uses.
        pair: SpawnerPair,
    },
    /// Removes a vehicle from the world, releasing any reservation it holds.
    DespawnVehicle {
        /// Vehicle leaving the simulation.
        vehicle: VehicleId,
    },
    /// Attempts to reserve a parking spot for a vehicle.
    ReserveSpot {
        /// Vehicle requesting the spot.
        vehicle: VehicleId,
        /// Cell holding the parking spot.
        spot: CellCoord,
    },
    /// Releases a reservation held by a vehicle.
    ReleaseSpot {
        /// Vehicle releasing the spot.
        vehicle: VehicleId,
        /// Cell holding the parking spot.
        spot: CellCoord,
    },
    /// Credits a parking fee to the lot's account.
    CollectParkingFee {
        /// Vehicle paying the fee.
        vehicle: VehicleId,
        /// Kind of spot the vehicle used.
        kind: SpotKind,
        /// Amount paid, in cents.
        cents: u64,
    },
    /// Requests that the world allocate a pedestrian exiting a vehicle.
    SpawnPedestrian {
        /// Vehicle the driver exits.
        vehicle: VehicleId,
        /// Cell where the pedestrian appears.
        cell: CellCoord,
    },
    /// Reports that a pedestrian is back at its vehicle.
    ReturnPedestrian {
        /// Pedestrian that returned.
        pedestrian: PedestrianId,
        /// Vehicle the pedestrian returned to.
        vehicle: VehicleId,
    },
    /// Reports the terminal outcome of an agent for rating aggregation.
    ReportOutcome {
        /// Outcome being reported.
        outcome: AgentOutcome,
    },
    /// Stores the reduced rating for a finished day.
    RecordDailyRating {
        /// Day the rating summarises.
        day: u32,
        /// Rating in `[0, 100]`, absent when no agent was scored.
        rating: Option<f32>,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Announces that the grid was resized and all agents must be discarded.
    GridConfigured {
        /// Number of cell columns.
        width: u32,
        /// Number of cell rows.
        height: u32,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Scaled real time that elapsed; zero while paused.
        dt: Duration,
        /// Game minutes that elapsed.
        game_minutes: f32,
        /// Day index after advancing.
        day: u32,
        /// Minute of the day after advancing.
        minute_of_day: u32,
    },
    /// Raised exactly once when a day's last minute elapses.
    DayFinalized {
        /// Day that just finished.
        day: u32,
    },
    /// Announces a pause or time-scale change.
    ClockChanged {
        /// Whether the clock is paused.
        paused: bool,
        /// Active time scale.
        scale: f32,
    },
    /// Reports that traversability of the listed cells may have changed.
    LayoutChanged {
        /// Cells whose data, fixtures, or edges changed.
        cells: Vec<CellCoord>,
    },
    /// Reports that a cell update was rejected.
    CellUpdateRejected {
        /// Cell targeted by the update.
        cell: CellCoord,
        /// Reason the update failed.
        reason: PlacementError,
    },
    /// Reports that a border segment edit was rejected.
    BorderSegmentRejected {
        /// Cell targeted by the edit.
        cell: CellCoord,
        /// Edge targeted by the edit.
        edge: Edge,
        /// Reason the edit failed.
        reason: PlacementError,
    },
    /// Confirms that a fixture was placed.
    FixturePlaced {
        /// Identifier allocated to the fixture.
        fixture: FixtureId,
        /// Kind of fixture placed.
        kind: FixtureKind,
        /// Cells covered by the fixture.
        cells: Vec<CellCoord>,
    },
    /// Reports that a fixture placement was rejected.
    FixturePlacementRejected {
        /// Kind of fixture requested.
        kind: FixtureKind,
        /// Requested anchor cell.
        anchor: CellCoord,
        /// Reason the placement failed.
        reason: PlacementError,
    },
    /// Confirms that a fixture was removed.
    FixtureRemoved {
        /// Identifier of the removed fixture.
        fixture: FixtureId,
        /// Kind of the removed fixture.
        kind: FixtureKind,
        /// Cells the fixture covered.
        cells: Vec<CellCoord>,
    },
    /// Reports that a fixture removal was rejected.
    FixtureRemovalRejected {
        /// Cell targeted by the removal.
        cell: CellCoord,
        /// Reason the removal failed.
        reason: PlacementError,
    },
    /// Announces that the set of spawners or destinations changed.
    SpawnersChanged,
    /// Announces a new hourly rate.
    ParkingRateChanged {
        /// Spot kind whose rate changed.
        kind: SpotKind,
        /// New price per in-game hour, in cents.
        cents_per_hour: u32,
    },
    /// Confirms that a vehicle was allocated.
    VehicleSpawned {
        /// Identifier assigned to the vehicle.
        vehicle: VehicleId,
        /// Spawner pair the vehicle uses.
        pair: SpawnerPair,
    },
    /// Confirms that a vehicle left the simulation.
    VehicleDespawned {
        /// Identifier of the vehicle.
        vehicle: VehicleId,
    },
    /// Confirms that a reservation succeeded.
    SpotReserved {
        /// Vehicle now holding the spot.
        vehicle: VehicleId,
        /// Reserved spot.
        spot: CellCoord,
    },
    /// Reports that a reservation attempt failed.
    SpotReservationRejected {
        /// Vehicle that attempted the reservation.
        vehicle: VehicleId,
        /// Requested spot.
        spot: CellCoord,
        /// Current holder, when the spot was already taken.
        holder: Option<VehicleId>,
    },
    /// Confirms that a reservation was released.
    SpotReleased {
        /// Vehicle that held the spot.
        vehicle: VehicleId,
        /// Released spot.
        spot: CellCoord,
    },
    /// Confirms that a parking fee was credited.
    ParkingFeeCollected {
        /// Vehicle that paid.
        vehicle: VehicleId,
        /// Amount credited, in cents.
        cents: u64,
    },
    /// Confirms that a pedestrian was allocated.
    PedestrianSpawned {
        /// Identifier assigned to the pedestrian.
        pedestrian: PedestrianId,
        /// Vehicle the pedestrian belongs to.
        vehicle: VehicleId,
        /// Cell where the pedestrian appears.
        cell: CellCoord,
    },
    /// Confirms that a pedestrian is back at its vehicle.
    PedestrianReturned {
        /// Pedestrian that returned.
        pedestrian: PedestrianId,
        /// Vehicle the pedestrian returned to.
        vehicle: VehicleId,
    },
    /// Relays an agent outcome for rating aggregation.
    OutcomeReported {
        /// Reported outcome.
        outcome: AgentOutcome,
    },
    /// Confirms that a daily rating was stored.
    DailyRatingRecorded {
        /// Day the rating summarises.
        day: u32,
        /// Stored rating.
        rating: Option<f32>,
    },
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// Cell adjacent across the provided edge, if it lies inside `width` x `height`.
    #[must_use]
    pub fn neighbor(self, edge: Edge, width: u32, height: u32) -> Option<CellCoord> {
        let candidate = match edge {
            Edge::North => CellCoord::new(self.column, self.row.checked_sub(1)?),
            Edge::East => CellCoord::new(self.column.checked_add(1)?, self.row),
            Edge::South => CellCoord::new(self.column, self.row.checked_add(1)?),
            Edge::West => CellCoord::new(self.column.checked_sub(1)?, self.row),
        };

        if candidate.column < width && candidate.row < height {
            Some(candidate)
        } else {
            None
        }
    }

    /// Reports whether the coordinate lies inside `width` x `height`.
    #[must_use]
    pub const fn is_within(&self, width: u32, height: u32) -> bool {
        self.column < width && self.row < height
    }
}

/// One of the four sides of a grid cell, indexed clockwise from north.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Edge {
    /// Side facing decreasing rows (index 0).
    North,
    /// Side facing increasing columns (index 1).
    East,
    /// Side facing increasing rows (index 2).
    South,
    /// Side facing decreasing columns (index 3).
    West,
}

impl Edge {
    /// All edges in index order.
    pub const ALL: [Edge; 4] = [Edge::North, Edge::East, Edge::South, Edge::West];

    /// Numeric index of the edge (0=N, 1=E, 2=S, 3=W).
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    /// Edge for the provided index, if valid.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::North),
            1 => Some(Self::East),
            2 => Some(Self::South),
            3 => Some(Self::West),
            _ => None,
        }
    }

    /// The same physical edge seen from the neighbouring cell.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }
}

/// Cardinal travel directions available to agents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing column indices.
    West,
}

impl Direction {
    /// Expansion order used by the pathfinder.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Edge of the source cell crossed when travelling in this direction.
    #[must_use]
    pub const fn exit_edge(self) -> Edge {
        match self {
            Self::North => Edge::North,
            Self::East => Edge::East,
            Self::South => Edge::South,
            Self::West => Edge::West,
        }
    }

    /// Edge of the destination cell crossed when travelling in this direction.
    #[must_use]
    pub const fn entry_edge(self) -> Edge {
        self.exit_edge().opposite()
    }

    /// Edge on the traveller's right-hand side.
    #[must_use]
    pub const fn right_hand_edge(self) -> Edge {
        match self {
            Self::North => Edge::East,
            Self::East => Edge::South,
            Self::South => Edge::West,
            Self::West => Edge::North,
        }
    }

    /// Direction of a single 4-connected step, if `from` and `to` are adjacent.
    #[must_use]
    pub fn between(from: CellCoord, to: CellCoord) -> Option<Direction> {
        let column_diff = from.column().abs_diff(to.column());
        let row_diff = from.row().abs_diff(to.row());

        if column_diff + row_diff != 1 {
            return None;
        }

        if column_diff == 1 {
            if to.column() > from.column() {
                Some(Direction::East)
            } else {
                Some(Direction::West)
            }
        } else if to.row() > from.row() {
            Some(Direction::South)
        } else {
            Some(Direction::North)
        }
    }
}

/// Kind of agent asking to traverse the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// Cars and other wheeled traffic.
    Vehicle,
    /// People on foot.
    Pedestrian,
}

/// How a parking spot is paid for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpotKind {
    /// Spot fitted with its own meter.
    Meter,
    /// Spot paid for at a booth.
    Booth,
}

/// Transient requirement that sends a pedestrian to a fixture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Need {
    /// Wants to throw something away.
    Trash,
    /// Wants a drink.
    Thirst,
    /// Needs a toilet.
    Toilet,
}

impl Need {
    /// All needs in declaration order.
    pub const ALL: [Need; 3] = [Need::Trash, Need::Thirst, Need::Toilet];
}

/// Unique identifier assigned to a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(u32);

impl VehicleId {
    /// Creates a new vehicle identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a pedestrian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PedestrianId(u32);

impl PedestrianId {
    /// Creates a new pedestrian identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Lifecycle stage of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleState {
    /// Allocated and deciding where to go.
    Spawning,
    /// Travelling toward a reserved spot or straight to the despawner.
    Moving,
    /// Sitting in a reserved spot.
    Parking,
    /// Travelling from the spot to the despawner.
    Leaving,
    /// Reached the despawner and is being removed.
    Despawning,
}

/// Lifecycle stage of a pedestrian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PedestrianState {
    /// Just stepped out of its vehicle.
    Spawning,
    /// Walking to its destination.
    GoingToDestination,
    /// Standing at its destination.
    AtDestination,
    /// Off the grid until its respawn timer elapses.
    Despawned,
    /// Reappearing at its destination.
    Respawning,
    /// Walking back to its vehicle.
    ReturningToVehicle,
    /// Back at its vehicle.
    AtVehicle,
    /// Detouring to a fixture that satisfies its need.
    GoingToNeed,
    /// Using the fixture.
    FulfillingNeed,
}

/// Read-only description of a vehicle for presentation.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleSnapshot {
    /// Identifier of the vehicle.
    pub id: VehicleId,
    /// Cell the vehicle occupies.
    pub cell: CellCoord,
    /// Interpolated position measured in cells.
    pub position: (f32, f32),
    /// Lifecycle stage.
    pub state: VehicleState,
    /// Spot held by the vehicle, if any.
    pub reserved_spot: Option<CellCoord>,
    /// Whether the vehicle was designated a potential parker.
    pub potential_parker: bool,
}

/// Read-only description of a pedestrian for presentation.
#[derive(Clone, Debug, PartialEq)]
pub struct PedestrianSnapshot {
    /// Identifier of the pedestrian.
    pub id: PedestrianId,
    /// Vehicle the pedestrian belongs to.
    pub vehicle: VehicleId,
    /// Cell the pedestrian occupies.
    pub cell: CellCoord,
    /// Interpolated position measured in cells.
    pub position: (f32, f32),
    /// Lifecycle stage.
    pub state: PedestrianState,
    /// Active need, if any.
    pub need: Option<Need>,
}

/// Successful route produced by the pathfinder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    cells: Vec<CellCoord>,
    cost: u32,
}

impl Route {
    /// Creates a route from its cells (start excluded, goal included) and total cost.
    #[must_use]
    pub fn new(cells: Vec<CellCoord>, cost: u32) -> Self {
        Self { cells, cost }
    }

    /// Cells to visit in order, excluding the start and including the goal.
    #[must_use]
    pub fn cells(&self) -> &[CellCoord] {
        &self.cells
    }

    /// Number of steps along the route.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether the route requires no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Sum of the movement costs along the route.
    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Consumes the route, yielding its cells.
    #[must_use]
    pub fn into_cells(self) -> Vec<CellCoord> {
        self.cells
    }
}

/// Pathfinding found no admissible route between two cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("no path from {from:?} to {to:?}")]
pub struct NoPath {
    /// Requested start cell.
    pub from: CellCoord,
    /// Requested goal cell.
    pub to: CellCoord,
}

/// Reasons a grid edit may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum PlacementError {
    /// The requested cell lies outside the grid.
    #[error("cell lies outside the grid")]
    OutOfBounds,
    /// The cell is marked permanent and cannot be edited.
    #[error("cell is permanent")]
    Permanent,
    /// The cell already holds a fixture or belongs to one.
    #[error("cell is already occupied")]
    Occupied,
    /// A parking meter requires an existing parking spot.
    #[error("parking meter requires an underlying parking spot")]
    MissingParkingSpot,
    /// The second cell of a two-cell fixture is unavailable.
    #[error("second cell of the fixture is unavailable")]
    SecondaryCellBlocked,
    /// The lot cannot afford the edit.
    #[error("insufficient funds")]
    InsufficientFunds,
    /// No fixture covers the cell.
    #[error("no fixture at cell")]
    NoFixture,
}
