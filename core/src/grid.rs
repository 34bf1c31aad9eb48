//! Cell, fixture, and border records stored by the grid.

use serde::{Deserialize, Serialize};

use crate::{AgentKind, CellCoord, Edge, Need, SpotKind};

/// Ground surface laid on a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SurfaceKind {
    /// Bare earth.
    Dirt,
    /// Lawn.
    Grass,
    /// Loose stone.
    Gravel,
    /// Paved driving surface.
    Asphalt,
    /// Poured walking surface.
    Concrete,
}

impl SurfaceKind {
    /// Price of surfacing a single tile, in cents.
    #[must_use]
    pub const fn cost_per_tile(self) -> u64 {
        match self {
            Self::Dirt => 50,
            Self::Grass => 100,
            Self::Gravel => 150,
            Self::Asphalt => 300,
            Self::Concrete => 400,
        }
    }
}

/// Closed set of placeable fixtures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FixtureKind {
    /// Painted bay paid at a booth.
    ParkingSpot,
    /// Bay fitted with a meter; replaces an existing parking spot.
    ParkingMeter,
    /// Attended pay booth.
    ParkingBooth,
    /// Litter bin.
    TrashCan,
    /// Water fountain.
    DrinkingFountain,
    /// Single portable toilet.
    PortableToilet,
    /// Two-cell restroom building.
    RestroomBlock,
    /// Shade tree.
    Tree,
    /// Street light.
    LampPost,
    /// Seat.
    Bench,
    /// Post that stops cars.
    Bollard,
    /// Raised flower bed.
    Planter,
}

/// Which agent kinds a fixture stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Blocking {
    /// Everyone may enter the cell.
    Nobody,
    /// Only pedestrians may enter the cell.
    Vehicles,
    /// Only vehicles may enter the cell.
    Pedestrians,
    /// Nobody may enter the cell.
    Everyone,
}

impl Blocking {
    /// Reports whether the provided agent kind is stopped.
    #[must_use]
    pub const fn blocks(self, agent: AgentKind) -> bool {
        match (self, agent) {
            (Self::Everyone, _) => true,
            (Self::Vehicles, AgentKind::Vehicle) => true,
            (Self::Pedestrians, AgentKind::Pedestrian) => true,
            _ => false,
        }
    }
}

/// Static behaviour associated with a fixture kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixtureRules {
    /// Purchase price, in cents.
    pub cost: u64,
    /// Agents stopped from entering the covered cells.
    pub blocking: Blocking,
    /// Need the fixture satisfies, if any.
    pub satisfies: Option<Need>,
    /// Appeal added to every cell within `radius`.
    pub appeal: i32,
    /// Safety added to every cell within `radius`.
    pub safety: i32,
    /// Manhattan radius of the area of effect.
    pub radius: u32,
    /// Number of cells covered (one or two).
    pub footprint: u8,
}

const fn table_entry(
    cost: u64,
    blocking: Blocking,
    satisfies: Option<Need>,
    appeal: i32,
    safety: i32,
    radius: u32,
    footprint: u8,
) -> FixtureRules {
    FixtureRules {
        cost,
        blocking,
        satisfies,
        appeal,
        safety,
        radius,
        footprint,
    }
}

impl FixtureKind {
    /// Every fixture kind in declaration order.
    pub const ALL: [FixtureKind; 12] = [
        FixtureKind::ParkingSpot,
        FixtureKind::ParkingMeter,
        FixtureKind::ParkingBooth,
        FixtureKind::TrashCan,
        FixtureKind::DrinkingFountain,
        FixtureKind::PortableToilet,
        FixtureKind::RestroomBlock,
        FixtureKind::Tree,
        FixtureKind::LampPost,
        FixtureKind::Bench,
        FixtureKind::Bollard,
        FixtureKind::Planter,
    ];

    /// Lookup table describing the fixture's cost, blocking, and effects.
    #[must_use]
    pub const fn rules(self) -> FixtureRules {
        use Blocking::{Everyone, Nobody, Vehicles};
        match self {
            Self::ParkingSpot => table_entry(2_000, Nobody, None, 0, 0, 0, 1),
            Self::ParkingMeter => table_entry(1_500, Nobody, None, 0, 0, 0, 1),
            Self::ParkingBooth => table_entry(5_000, Everyone, None, 0, 2, 2, 1),
            Self::TrashCan => table_entry(300, Vehicles, Some(Need::Trash), 0, 0, 0, 1),
            Self::DrinkingFountain => table_entry(800, Vehicles, Some(Need::Thirst), 1, 0, 1, 1),
            Self::PortableToilet => table_entry(2_500, Vehicles, Some(Need::Toilet), -1, 0, 1, 1),
            Self::RestroomBlock => table_entry(8_000, Vehicles, Some(Need::Toilet), 0, 1, 1, 2),
            Self::Tree => table_entry(400, Everyone, None, 3, 0, 2, 1),
            Self::LampPost => table_entry(600, Vehicles, None, 0, 4, 3, 1),
            Self::Bench => table_entry(350, Vehicles, None, 1, 0, 1, 1),
            Self::Bollard => table_entry(200, Vehicles, None, 0, 1, 0, 1),
            Self::Planter => table_entry(300, Everyone, None, 2, 0, 1, 1),
        }
    }

    /// Payment style when the fixture is a parking spot.
    #[must_use]
    pub const fn spot_kind(self) -> Option<SpotKind> {
        match self {
            Self::ParkingSpot => Some(SpotKind::Booth),
            Self::ParkingMeter => Some(SpotKind::Meter),
            _ => None,
        }
    }
}

/// Facing of a fixture, one of four quarter turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Orientation(u8);

impl Orientation {
    /// Default facing.
    pub const NORTH: Orientation = Orientation(0);

    /// Creates an orientation from a value in `0..=3`.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value < 4 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Numeric value in `0..=3`.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Orientation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("orientation {value} is outside 0..=3"))
    }
}

impl From<Orientation> for u8 {
    fn from(orientation: Orientation) -> Self {
        orientation.0
    }
}

/// Unique identifier assigned to a placed fixture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FixtureId(u32);

impl FixtureId {
    /// Creates a new fixture identifier with the provided numeric value.
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

/// Fixture anchored in a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Identifier allocated by the world.
    pub id: FixtureId,
    /// Kind of fixture.
    pub kind: FixtureKind,
    /// Cell that owns the fixture.
    pub anchor: CellCoord,
    /// Facing of the fixture.
    pub orientation: Orientation,
    /// Whether any agent kind may enter the fixture's cells.
    pub passable: bool,
    /// Second cell covered by two-cell fixtures.
    pub secondary: Option<CellCoord>,
}

impl Fixture {
    /// Cells covered by the fixture, anchor first.
    #[must_use]
    pub fn cells(&self) -> Vec<CellCoord> {
        let mut cells = vec![self.anchor];
        cells.extend(self.secondary);
        cells
    }
}

/// Per-edge permission for vehicles to leave a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TravelFlags([bool; 4]);

impl TravelFlags {
    /// Flags allowing travel through every edge.
    pub const OPEN: TravelFlags = TravelFlags([true; 4]);

    /// Reports whether vehicles may leave through `edge`.
    #[must_use]
    pub const fn allows(self, edge: Edge) -> bool {
        self.0[edge.index() as usize]
    }

    /// Returns a copy with the permission for `edge` replaced.
    #[must_use]
    pub fn with(self, edge: Edge, allowed: bool) -> Self {
        let mut flags = self.0;
        flags[edge.index() as usize] = allowed;
        Self(flags)
    }
}

impl Default for TravelFlags {
    fn default() -> Self {
        Self::OPEN
    }
}

/// Complete record stored for a single cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellData {
    /// Surface laid on the cell.
    pub surface: Option<SurfaceKind>,
    /// Fixture anchored in the cell.
    pub fixture: Option<Fixture>,
    /// Anchor of the two-cell fixture covering this cell as its second cell.
    pub occupied_by: Option<CellCoord>,
    /// Whether the cell rejects edits.
    pub permanent: bool,
    /// Edges vehicles may leave through.
    pub travel: TravelFlags,
    /// Accumulated appeal from nearby fixtures.
    pub appeal: i32,
    /// Accumulated safety from nearby fixtures.
    pub safety: i32,
    /// Whether the cell behaves like a sidewalk regardless of surface.
    pub crosswalk: bool,
}

impl CellData {
    /// Reports whether the record differs from an untouched cell.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        *self != Self::default()
    }

    /// Reports whether pedestrians treat the cell as a sidewalk.
    #[must_use]
    pub fn is_sidewalk_like(&self) -> bool {
        self.crosswalk || self.surface == Some(SurfaceKind::Concrete)
    }

    /// Reports whether a fixture or a fixture's second cell covers the cell.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.fixture.is_some() || self.occupied_by.is_some()
    }
}

/// Change applied to a single field by [`CellPatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldUpdate<T> {
    /// Leave the field untouched.
    Keep,
    /// Replace the field.
    Set(T),
    /// Reset the field to its default.
    Clear,
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T> FieldUpdate<T> {
    /// Reports whether the update leaves the field untouched.
    #[must_use]
    pub const fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

/// Partial update merged into a cell record.
///
/// Fixtures and the appeal/safety accumulators are not patchable; they change
/// only through fixture placement so their invariants stay intact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPatch {
    /// Surface update.
    pub surface: FieldUpdate<SurfaceKind>,
    /// Permanence update.
    pub permanent: FieldUpdate<bool>,
    /// Travel permission update.
    pub travel: FieldUpdate<TravelFlags>,
    /// Crosswalk override update.
    pub crosswalk: FieldUpdate<bool>,
}

impl CellPatch {
    /// Patch that lays the provided surface.
    #[must_use]
    pub fn surface(surface: SurfaceKind) -> Self {
        Self {
            surface: FieldUpdate::Set(surface),
            ..Self::default()
        }
    }

    /// Reports whether the patch touches anything besides the permanence flag.
    #[must_use]
    pub const fn edits_content(&self) -> bool {
        !self.surface.is_keep() || !self.travel.is_keep() || !self.crosswalk.is_keep()
    }

    /// Merges the patch into `cell`.
    pub fn apply_to(&self, cell: &mut CellData) {
        match self.surface {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(surface) => cell.surface = Some(surface),
            FieldUpdate::Clear => cell.surface = None,
        }
        match self.permanent {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(permanent) => cell.permanent = permanent,
            FieldUpdate::Clear => cell.permanent = false,
        }
        match self.travel {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(travel) => cell.travel = travel,
            FieldUpdate::Clear => cell.travel = TravelFlags::OPEN,
        }
        match self.crosswalk {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(crosswalk) => cell.crosswalk = crosswalk,
            FieldUpdate::Clear => cell.crosswalk = false,
        }
    }
}

/// Marking stored on a cell edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BorderKind {
    /// Painted one-way line; vehicles keep it on their left.
    LaneLine,
    /// Raised kerb; stops vehicles but not pedestrians.
    Curb,
    /// Fence; stops everyone.
    Fence,
}

/// Identity of a border segment record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey {
    cell: CellCoord,
    edge: Edge,
}

impl SegmentKey {
    /// Key naming the edge exactly as written, without resolving shared edges.
    #[must_use]
    pub const fn local(cell: CellCoord, edge: Edge) -> Self {
        Self { cell, edge }
    }

    /// Shared key for the edge.
    ///
    /// Shared edges are stored on the cell with the smaller coordinate along
    /// the crossing axis, as its south or east edge. North edges of the first
    /// row and west edges of the first column stay local.
    #[must_use]
    pub fn canonical(cell: CellCoord, edge: Edge) -> Self {
        match edge {
            Edge::North if cell.row() > 0 => Self {
                cell: CellCoord::new(cell.column(), cell.row() - 1),
                edge: Edge::South,
            },
            Edge::West if cell.column() > 0 => Self {
                cell: CellCoord::new(cell.column() - 1, cell.row()),
                edge: Edge::East,
            },
            _ => Self { cell, edge },
        }
    }

    /// Cell the key is stored on.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Edge of [`SegmentKey::cell`] the key names.
    #[must_use]
    pub const fn edge(&self) -> Edge {
        self.edge
    }
}

/// Vehicle entry cell paired with its exit cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpawnerPair {
    /// Cell where vehicles appear.
    pub spawn: CellCoord,
    /// Cell where vehicles leave.
    pub despawn: CellCoord,
}

impl SpawnerPair {
    /// Creates a new spawner pair.
    #[must_use]
    pub const fn new(spawn: CellCoord, despawn: CellCoord) -> Self {
        Self { spawn, despawn }
    }
}
