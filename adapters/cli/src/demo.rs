//! Starter lot used when no layout is supplied.

use parkade_core::{
    BorderKind, CellCoord, CellPatch, Command, Edge, FixtureKind, Orientation, SpawnerPair,
    SurfaceKind,
};

/// Smallest grid the starter lot fits on.
pub(crate) const MIN_WIDTH: u32 = 8;
/// Smallest grid the starter lot fits on.
pub(crate) const MIN_HEIGHT: u32 = 6;

/// Commands that paint a road across the middle of the grid with a row of
/// bays above it and a sidewalk with amenities below it.
///
/// Returns nothing when the grid is smaller than the starter lot.
pub(crate) fn starter_lot(width: u32, height: u32) -> Vec<Command> {
    if width < MIN_WIDTH || height < MIN_HEIGHT {
        return Vec::new();
    }

    let road = height / 2;
    let sidewalk = road + 1;
    let mut commands = Vec::new();

    for column in 0..width {
        commands.push(Command::UpdateCell {
            cell: CellCoord::new(column, road),
            patch: CellPatch::surface(SurfaceKind::Asphalt),
        });
        commands.push(Command::SetBorderSegment {
            cell: CellCoord::new(column, road),
            edge: Edge::South,
            kind: BorderKind::Curb,
        });
        commands.push(Command::UpdateCell {
            cell: CellCoord::new(column, sidewalk),
            patch: CellPatch::surface(SurfaceKind::Concrete),
        });
    }

    for column in (2..width - 2).step_by(2) {
        commands.push(Command::PlaceFixture {
            kind: FixtureKind::ParkingSpot,
            anchor: CellCoord::new(column, road - 1),
            orientation: Orientation::NORTH,
        });
    }
    commands.push(Command::PlaceFixture {
        kind: FixtureKind::ParkingMeter,
        anchor: CellCoord::new(2, road - 1),
        orientation: Orientation::NORTH,
    });

    let amenities = [
        (FixtureKind::DrinkingFountain, width / 4),
        (FixtureKind::TrashCan, width / 2),
        (FixtureKind::PortableToilet, width * 3 / 4),
    ];
    for (kind, column) in amenities {
        commands.push(Command::PlaceFixture {
            kind,
            anchor: CellCoord::new(column, sidewalk + 1),
            orientation: Orientation::NORTH,
        });
    }
    commands.push(Command::PlaceFixture {
        kind: FixtureKind::LampPost,
        anchor: CellCoord::new(width / 2 + 1, road - 2),
        orientation: Orientation::NORTH,
    });

    commands.push(Command::AddVehicleSpawner {
        pair: SpawnerPair::new(CellCoord::new(0, road), CellCoord::new(width - 1, road)),
    });
    commands.push(Command::AddPedestrianDestination {
        cell: CellCoord::new(width - 1, height - 1),
    });

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkade_core::{Event, ScenarioConfig};
    use parkade_session::Session;
    use parkade_world::query;

    #[test]
    fn starter_lot_is_accepted_on_the_default_grid() {
        let config = ScenarioConfig::default();
        let mut session = Session::new(&config);
        let mut events = Vec::new();
        for command in starter_lot(config.grid.width, config.grid.height) {
            events.extend(session.apply(command));
        }

        assert!(
            !events.iter().any(|event| matches!(
                event,
                Event::FixturePlacementRejected { .. }
                    | Event::CellUpdateRejected { .. }
                    | Event::BorderSegmentRejected { .. }
            )),
            "starter lot rejected: {events:?}"
        );
        assert_eq!(query::parking_spots(session.world()).len(), 8);
        assert_eq!(query::vehicle_spawners(session.world()).len(), 1);
        assert!(query::money(session.world()) > 0);
    }

    #[test]
    fn tiny_grids_get_no_starter_lot() {
        assert!(starter_lot(MIN_WIDTH - 1, MIN_HEIGHT).is_empty());
        assert!(starter_lot(MIN_WIDTH, MIN_HEIGHT - 1).is_empty());
    }
}
