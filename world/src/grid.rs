//! Dense cell storage and border segment records owned by the world.

use std::collections::BTreeMap;

use parkade_core::{
    Blocking, BorderKind, CellCoord, CellData, CellPatch, Edge, Fixture, FixtureId, FixtureKind,
    Orientation, PlacementError, SegmentKey,
};

/// Row-major cell records plus the border segments keyed by canonical edge identity.
#[derive(Clone, Debug)]
pub(crate) struct GridStore {
    width: u32,
    height: u32,
    cells: Vec<CellData>,
    segments: BTreeMap<SegmentKey, BorderKind>,
    next_fixture_id: u32,
}

impl GridStore {
    /// Creates an empty grid with the provided dimensions.
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![CellData::default(); cell_count(width, height)],
            segments: BTreeMap::new(),
            next_fixture_id: 0,
        }
    }

    /// Number of columns and rows.
    pub(crate) const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reports whether the coordinate addresses a stored cell.
    pub(crate) const fn contains(&self, cell: CellCoord) -> bool {
        cell.is_within(self.width, self.height)
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.width).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    /// Copy of the cell record, `None` outside the grid.
    pub(crate) fn cell(&self, cell: CellCoord) -> Option<CellData> {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied())
    }

    fn cell_mut(&mut self, cell: CellCoord) -> Option<&mut CellData> {
        let index = self.index(cell)?;
        self.cells.get_mut(index)
    }

    /// Neighbouring cell across `edge`, if it lies inside the grid.
    pub(crate) fn neighbor(&self, cell: CellCoord, edge: Edge) -> Option<CellCoord> {
        cell.neighbor(edge, self.width, self.height)
    }

    /// Iterates every cell coordinate with its record in row-major order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (CellCoord, &CellData)> + '_ {
        let width = self.width.max(1);
        self.cells.iter().enumerate().map(move |(index, data)| {
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            (CellCoord::new(index % width, index / width), data)
        })
    }

    /// Merges the patch into the cell record and returns the updated copy.
    ///
    /// Permanent cells only accept patches that touch the permanence flag.
    pub(crate) fn update_cell(
        &mut self,
        cell: CellCoord,
        patch: &CellPatch,
    ) -> Result<CellData, PlacementError> {
        let data = self.cell_mut(cell).ok_or(PlacementError::OutOfBounds)?;
        if data.permanent && patch.edits_content() {
            return Err(PlacementError::Permanent);
        }
        patch.apply_to(data);
        Ok(*data)
    }

    /// Kind stored under the exact key, without resolving shared edges.
    pub(crate) fn border_segment(&self, key: SegmentKey) -> Option<BorderKind> {
        self.segments.get(&key).copied()
    }

    /// Key under which a record for the edge currently exists.
    ///
    /// The canonical key is preferred; a record stored under the cell-local
    /// key is still found so edges written from either side resolve.
    pub(crate) fn find_existing_segment_key(
        &self,
        cell: CellCoord,
        edge: Edge,
    ) -> Option<SegmentKey> {
        let canonical = SegmentKey::canonical(cell, edge);
        if self.segments.contains_key(&canonical) {
            return Some(canonical);
        }
        let local = SegmentKey::local(cell, edge);
        if self.segments.contains_key(&local) {
            return Some(local);
        }
        let neighbor = self.neighbor(cell, edge)?;
        let mirrored = SegmentKey::local(neighbor, edge.opposite());
        self.segments.contains_key(&mirrored).then_some(mirrored)
    }

    /// Border kind on the edge, resolved through [`GridStore::find_existing_segment_key`].
    pub(crate) fn segment_for(&self, cell: CellCoord, edge: Edge) -> Option<BorderKind> {
        self.find_existing_segment_key(cell, edge)
            .and_then(|key| self.border_segment(key))
    }

    /// Stores a border segment under the canonical key for the edge.
    pub(crate) fn set_border_segment(
        &mut self,
        cell: CellCoord,
        edge: Edge,
        kind: BorderKind,
    ) -> Result<SegmentKey, PlacementError> {
        if !self.contains(cell) {
            return Err(PlacementError::OutOfBounds);
        }
        if let Some(existing) = self.find_existing_segment_key(cell, edge) {
            let _ = self.segments.remove(&existing);
        }
        let key = SegmentKey::canonical(cell, edge);
        let _ = self.segments.insert(key, kind);
        Ok(key)
    }

    /// Removes the record stored for the edge, returning its kind.
    pub(crate) fn remove_border_segment(
        &mut self,
        cell: CellCoord,
        edge: Edge,
    ) -> Result<Option<BorderKind>, PlacementError> {
        if !self.contains(cell) {
            return Err(PlacementError::OutOfBounds);
        }
        Ok(self
            .find_existing_segment_key(cell, edge)
            .and_then(|key| self.segments.remove(&key)))
    }

    /// Iterates all stored segments in key order.
    pub(crate) fn segments(&self) -> impl Iterator<Item = (SegmentKey, BorderKind)> + '_ {
        self.segments.iter().map(|(key, kind)| (*key, *kind))
    }

    /// Fixture covering the cell, resolving second cells to their anchor.
    pub(crate) fn fixture_covering(&self, cell: CellCoord) -> Option<Fixture> {
        let data = self.cell(cell)?;
        match (data.fixture, data.occupied_by) {
            (Some(fixture), _) => Some(fixture),
            (None, Some(anchor)) => self.cell(anchor).and_then(|anchor| anchor.fixture),
            (None, None) => None,
        }
    }

    /// Every placed fixture in anchor row-major order.
    pub(crate) fn fixtures(&self) -> impl Iterator<Item = Fixture> + '_ {
        self.cells.iter().filter_map(|data| data.fixture)
    }

    /// Validates a placement without mutating the grid.
    ///
    /// Returns the second cell for two-cell fixtures.
    pub(crate) fn check_placement(
        &self,
        kind: FixtureKind,
        anchor: CellCoord,
        orientation: Orientation,
    ) -> Result<Option<CellCoord>, PlacementError> {
        let data = self.cell(anchor).ok_or(PlacementError::OutOfBounds)?;
        if data.permanent {
            return Err(PlacementError::Permanent);
        }

        if kind == FixtureKind::ParkingMeter {
            return match data.fixture {
                Some(existing) if existing.kind == FixtureKind::ParkingSpot => Ok(None),
                Some(_) => Err(PlacementError::Occupied),
                None if data.occupied_by.is_some() => Err(PlacementError::Occupied),
                None => Err(PlacementError::MissingParkingSpot),
            };
        }

        if data.is_occupied() {
            return Err(PlacementError::Occupied);
        }

        if kind.rules().footprint < 2 {
            return Ok(None);
        }

        let secondary = secondary_cell(anchor, orientation, self.width, self.height)
            .ok_or(PlacementError::SecondaryCellBlocked)?;
        match self.cell(secondary) {
            Some(second) if !second.permanent && !second.is_occupied() => Ok(Some(secondary)),
            _ => Err(PlacementError::SecondaryCellBlocked),
        }
    }

    /// Places a fixture and writes its area of effect.
    ///
    /// A parking meter replaces the spot beneath it and keeps the spot's facing.
    pub(crate) fn place_fixture(
        &mut self,
        kind: FixtureKind,
        anchor: CellCoord,
        orientation: Orientation,
    ) -> Result<Fixture, PlacementError> {
        let secondary = self.check_placement(kind, anchor, orientation)?;

        let orientation = match self.cell(anchor).and_then(|data| data.fixture) {
            Some(spot) if kind == FixtureKind::ParkingMeter => {
                self.clear_fixture(spot);
                spot.orientation
            }
            _ => orientation,
        };

        let fixture = Fixture {
            id: self.allocate_fixture_id(),
            kind,
            anchor,
            orientation,
            passable: kind.rules().blocking != Blocking::Everyone,
            secondary,
        };
        self.write_fixture(fixture);
        Ok(fixture)
    }

    /// Removes the fixture covering the cell and withdraws its area of effect.
    pub(crate) fn remove_fixture(&mut self, cell: CellCoord) -> Result<Fixture, PlacementError> {
        if !self.contains(cell) {
            return Err(PlacementError::OutOfBounds);
        }
        let fixture = self
            .fixture_covering(cell)
            .ok_or(PlacementError::NoFixture)?;
        let permanent = fixture
            .cells()
            .into_iter()
            .any(|covered| self.cell(covered).is_some_and(|data| data.permanent));
        if permanent {
            return Err(PlacementError::Permanent);
        }
        self.clear_fixture(fixture);
        Ok(fixture)
    }

    fn allocate_fixture_id(&mut self) -> FixtureId {
        let id = FixtureId::new(self.next_fixture_id);
        self.next_fixture_id = self.next_fixture_id.saturating_add(1);
        id
    }

    fn write_fixture(&mut self, fixture: Fixture) {
        if let Some(data) = self.cell_mut(fixture.anchor) {
            data.fixture = Some(fixture);
        }
        if let Some(secondary) = fixture.secondary {
            if let Some(data) = self.cell_mut(secondary) {
                data.occupied_by = Some(fixture.anchor);
            }
        }
        self.spread_effects(&fixture, 1);
    }

    fn clear_fixture(&mut self, fixture: Fixture) {
        if let Some(data) = self.cell_mut(fixture.anchor) {
            data.fixture = None;
        }
        if let Some(secondary) = fixture.secondary {
            if let Some(data) = self.cell_mut(secondary) {
                data.occupied_by = None;
            }
        }
        self.spread_effects(&fixture, -1);
    }

    /// Adds (`sign = 1`) or withdraws (`sign = -1`) appeal and safety around the anchor.
    fn spread_effects(&mut self, fixture: &Fixture, sign: i32) {
        let rules = fixture.kind.rules();
        if rules.appeal == 0 && rules.safety == 0 {
            return;
        }
        let radius = rules.radius;
        let anchor = fixture.anchor;
        let min_column = anchor.column().saturating_sub(radius);
        let max_column = anchor
            .column()
            .saturating_add(radius)
            .min(self.width.saturating_sub(1));
        let min_row = anchor.row().saturating_sub(radius);
        let max_row = anchor
            .row()
            .saturating_add(radius)
            .min(self.height.saturating_sub(1));

        for row in min_row..=max_row {
            for column in min_column..=max_column {
                let cell = CellCoord::new(column, row);
                if anchor.manhattan_distance(cell) > radius {
                    continue;
                }
                if let Some(data) = self.cell_mut(cell) {
                    data.appeal += sign * rules.appeal;
                    data.safety += sign * rules.safety;
                }
            }
        }
    }

    /// Zeroes every accumulator and reapplies the effects of all fixtures.
    fn recompute_effects(&mut self) {
        for data in &mut self.cells {
            data.appeal = 0;
            data.safety = 0;
        }
        let fixtures: Vec<Fixture> = self.fixtures().collect();
        for fixture in &fixtures {
            self.spread_effects(fixture, 1);
        }
    }

    /// Resizes the grid, keeping records that still fit.
    ///
    /// Two-cell fixtures whose second cell falls outside are dropped along
    /// with their effects. Returns the fixtures that were dropped.
    pub(crate) fn resize(&mut self, width: u32, height: u32) -> Vec<Fixture> {
        let previous = std::mem::replace(self, Self::new(width, height));
        self.next_fixture_id = previous.next_fixture_id;

        let mut dropped = Vec::new();
        for (cell, data) in previous.iter() {
            if let Some(target) = self.cell_mut(cell) {
                *target = *data;
            } else if let Some(fixture) = data.fixture {
                dropped.push(fixture);
            }
        }
        self.segments = previous
            .segments
            .into_iter()
            .filter(|(key, _)| key.cell().is_within(width, height))
            .collect();

        dropped.extend(self.prune_orphans());
        self.recompute_effects();
        dropped
    }

    /// Removes fixtures whose second cell is missing and second-cell markers
    /// whose anchor no longer holds a matching fixture.
    fn prune_orphans(&mut self) -> Vec<Fixture> {
        let (width, height) = (self.width, self.height);
        let mut dropped = Vec::new();
        for data in &mut self.cells {
            if let Some(fixture) = data.fixture {
                let broken = fixture
                    .secondary
                    .is_some_and(|secondary| !secondary.is_within(width, height));
                if broken {
                    data.fixture = None;
                    dropped.push(fixture);
                }
            }
        }

        let markers: Vec<(CellCoord, CellCoord)> = self
            .iter()
            .filter_map(|(cell, data)| data.occupied_by.map(|anchor| (cell, anchor)))
            .collect();
        for (cell, anchor) in markers {
            let valid = self
                .cell(anchor)
                .and_then(|data| data.fixture)
                .is_some_and(|fixture| fixture.secondary == Some(cell));
            if !valid {
                if let Some(data) = self.cell_mut(cell) {
                    data.occupied_by = None;
                }
            }
        }
        dropped
    }

    /// Rebuilds the grid from transported records, dropping those outside the grid.
    pub(crate) fn restore<C, S>(width: u32, height: u32, cells: C, segments: S) -> Self
    where
        C: IntoIterator<Item = (CellCoord, CellData)>,
        S: IntoIterator<Item = (CellCoord, Edge, BorderKind)>,
    {
        let mut grid = Self::new(width, height);
        for (cell, data) in cells {
            if let Some(target) = grid.cell_mut(cell) {
                *target = data;
            }
        }
        for (cell, edge, kind) in segments {
            if grid.contains(cell) {
                let _ = grid.segments.insert(SegmentKey::canonical(cell, edge), kind);
            }
        }
        let _ = grid.prune_orphans();
        grid.next_fixture_id = grid
            .fixtures()
            .map(|fixture| fixture.id.get().saturating_add(1))
            .max()
            .unwrap_or(0);
        grid.recompute_effects();
        grid
    }
}

/// Second cell of a two-cell fixture: quarter turns rotate it E, S, W, N of the anchor.
pub(crate) fn secondary_cell(
    anchor: CellCoord,
    orientation: Orientation,
    width: u32,
    height: u32,
) -> Option<CellCoord> {
    let edge = Edge::from_index((orientation.get() + 1) % 4)?;
    anchor.neighbor(edge, width, height)
}

fn cell_count(width: u32, height: u32) -> usize {
    let count = u64::from(width) * u64::from(height);
    usize::try_from(count).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkade_core::{FieldUpdate, SurfaceKind};

    #[test]
    fn out_of_bounds_cells_return_none() {
        let grid = GridStore::new(4, 3);
        assert!(grid.cell(CellCoord::new(4, 0)).is_none());
        assert!(grid.cell(CellCoord::new(0, 3)).is_none());
        assert!(grid.cell(CellCoord::new(u32::MAX, u32::MAX)).is_none());
        assert!(grid.cell(CellCoord::new(3, 2)).is_some());
    }

    #[test]
    fn permanent_cells_reject_content_edits() {
        let mut grid = GridStore::new(3, 3);
        let cell = CellCoord::new(1, 1);
        let _ = grid
            .update_cell(
                cell,
                &CellPatch {
                    permanent: FieldUpdate::Set(true),
                    ..CellPatch::default()
                },
            )
            .expect("permanence is always editable");

        assert_eq!(
            grid.update_cell(cell, &CellPatch::surface(SurfaceKind::Asphalt)),
            Err(PlacementError::Permanent)
        );
        assert_eq!(grid.cell(cell).and_then(|data| data.surface), None);
    }

    #[test]
    fn segments_written_from_either_side_resolve() {
        let mut grid = GridStore::new(3, 3);
        let upper = CellCoord::new(1, 0);
        let lower = CellCoord::new(1, 1);

        let key = grid
            .set_border_segment(lower, Edge::North, BorderKind::Fence)
            .expect("in bounds");
        assert_eq!(key, SegmentKey::local(upper, Edge::South));
        assert_eq!(grid.segment_for(upper, Edge::South), Some(BorderKind::Fence));
        assert_eq!(grid.segment_for(lower, Edge::North), Some(BorderKind::Fence));

        assert_eq!(
            grid.remove_border_segment(upper, Edge::South),
            Ok(Some(BorderKind::Fence))
        );
        assert_eq!(grid.segment_for(lower, Edge::North), None);
    }

    #[test]
    fn legacy_local_records_are_found() {
        let mut grid = GridStore::new(3, 3);
        let lower = CellCoord::new(1, 1);
        let _ = grid
            .segments
            .insert(SegmentKey::local(lower, Edge::North), BorderKind::Curb);

        assert_eq!(
            grid.find_existing_segment_key(CellCoord::new(1, 0), Edge::South),
            Some(SegmentKey::local(lower, Edge::North))
        );
        assert_eq!(grid.segment_for(lower, Edge::North), Some(BorderKind::Curb));
    }

    #[test]
    fn area_of_effect_is_added_and_withdrawn() {
        let mut grid = GridStore::new(5, 5);
        let centre = CellCoord::new(2, 2);
        let tree = grid
            .place_fixture(FixtureKind::Tree, centre, Orientation::NORTH)
            .expect("empty cell");

        assert_eq!(grid.cell(centre).map(|data| data.appeal), Some(3));
        assert_eq!(grid.cell(CellCoord::new(0, 2)).map(|data| data.appeal), Some(3));
        assert_eq!(grid.cell(CellCoord::new(0, 0)).map(|data| data.appeal), Some(0));
        assert!(!tree.passable);

        let removed = grid.remove_fixture(centre).expect("fixture present");
        assert_eq!(removed.id, tree.id);
        assert!(grid.iter().all(|(_, data)| data.appeal == 0));
    }

    #[test]
    fn meter_requires_and_replaces_spot() {
        let mut grid = GridStore::new(3, 3);
        let cell = CellCoord::new(1, 1);
        assert_eq!(
            grid.place_fixture(FixtureKind::ParkingMeter, cell, Orientation::NORTH),
            Err(PlacementError::MissingParkingSpot)
        );

        let facing_east = Orientation::new(3).expect("valid orientation");
        let _ = grid
            .place_fixture(FixtureKind::ParkingSpot, cell, facing_east)
            .expect("empty cell");
        let meter = grid
            .place_fixture(FixtureKind::ParkingMeter, cell, Orientation::NORTH)
            .expect("spot present");

        assert_eq!(meter.orientation, facing_east);
        assert_eq!(grid.fixtures().count(), 1);
    }

    #[test]
    fn two_cell_fixture_marks_its_second_cell() {
        let mut grid = GridStore::new(4, 4);
        let anchor = CellCoord::new(1, 1);
        let restroom = grid
            .place_fixture(FixtureKind::RestroomBlock, anchor, Orientation::NORTH)
            .expect("room for both cells");
        let second = CellCoord::new(2, 1);

        assert_eq!(restroom.secondary, Some(second));
        assert_eq!(grid.cell(second).and_then(|data| data.occupied_by), Some(anchor));
        assert_eq!(grid.fixture_covering(second).map(|f| f.id), Some(restroom.id));
        assert_eq!(
            grid.place_fixture(FixtureKind::Bench, second, Orientation::NORTH),
            Err(PlacementError::Occupied)
        );

        let _ = grid.remove_fixture(second).expect("second cell resolves");
        assert!(grid.iter().all(|(_, data)| !data.is_occupied()));
    }

    #[test]
    fn two_cell_fixture_needs_free_second_cell() {
        let mut grid = GridStore::new(2, 2);
        assert_eq!(
            grid.place_fixture(FixtureKind::RestroomBlock, CellCoord::new(1, 0), Orientation::NORTH),
            Err(PlacementError::SecondaryCellBlocked)
        );
    }

    #[test]
    fn resize_drops_fixtures_whose_second_cell_falls_out() {
        let mut grid = GridStore::new(4, 4);
        let _ = grid
            .place_fixture(FixtureKind::RestroomBlock, CellCoord::new(2, 0), Orientation::NORTH)
            .expect("fits");
        let _ = grid
            .place_fixture(FixtureKind::Bench, CellCoord::new(0, 0), Orientation::NORTH)
            .expect("fits");
        let _ = grid
            .set_border_segment(CellCoord::new(3, 3), Edge::West, BorderKind::Fence)
            .expect("in bounds");

        let dropped = grid.resize(3, 3);

        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].kind, FixtureKind::RestroomBlock);
        assert_eq!(grid.fixtures().count(), 1);
        assert!(grid.iter().all(|(_, data)| data.occupied_by.is_none()));
        assert_eq!(grid.segments().count(), 0);
        assert_eq!(grid.cell(CellCoord::new(1, 0)).map(|data| data.appeal), Some(1));
    }
}
