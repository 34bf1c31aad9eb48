//! Directional edge rules consulted by the pathfinder and by path revalidation.

use parkade_core::{AgentKind, BorderKind, CellCoord, Direction, Edge, Orientation};

use crate::grid::GridStore;

/// Extra cost a vehicle pays for crossing a lane line.
pub const LANE_CROSSING_PENALTY: u32 = 4;

/// The only edge through which vehicles may enter or leave a parking spot.
#[must_use]
pub const fn spot_open_edge(orientation: Orientation) -> Edge {
    match orientation.get() {
        0 => Edge::South,
        1 => Edge::West,
        2 => Edge::North,
        _ => Edge::East,
    }
}

/// Decides whether crossing `edge` of `cell` is forbidden.
///
/// `is_entry` marks the destination side of a move; otherwise the edge is
/// the corridor edge of the source cell. Rules are checked in priority
/// order: fences, curbs, parking-spot borders, blocking fixtures, lane-line
/// direction, then the source cell's travel flags.
pub(crate) fn is_edge_blocked(
    grid: &GridStore,
    cell: CellCoord,
    edge: Edge,
    agent: AgentKind,
    direction: Direction,
    is_entry: bool,
    one_way_check: bool,
) -> bool {
    let Some(data) = grid.cell(cell) else {
        return true;
    };
    let segment = grid.segment_for(cell, edge);

    if segment == Some(BorderKind::Fence) {
        return true;
    }

    let fixture = grid.fixture_covering(cell);
    if agent == AgentKind::Pedestrian {
        return is_entry
            && fixture.is_some_and(|fixture| fixture.kind.rules().blocking.blocks(agent));
    }

    if segment == Some(BorderKind::Curb) && (is_entry || edge == direction.exit_edge()) {
        return true;
    }

    if let Some(fixture) = fixture {
        if fixture.kind.spot_kind().is_some() && edge != spot_open_edge(fixture.orientation) {
            return true;
        }
        if is_entry && fixture.kind.rules().blocking.blocks(agent) {
            return true;
        }
    }

    if one_way_check {
        let right_hand = direction.right_hand_edge();
        if grid.segment_for(cell, right_hand) == Some(BorderKind::LaneLine) {
            return true;
        }
    }

    !is_entry && !data.travel.allows(edge)
}

/// Penalty added on top of the unit step cost when leaving `from` in `direction`.
pub(crate) fn edge_crossing_cost(
    grid: &GridStore,
    from: CellCoord,
    direction: Direction,
    agent: AgentKind,
) -> u32 {
    match agent {
        AgentKind::Vehicle
            if grid.segment_for(from, direction.exit_edge()) == Some(BorderKind::LaneLine) =>
        {
            LANE_CROSSING_PENALTY
        }
        _ => 0,
    }
}

/// Reports whether a single step from `from` to the adjacent `to` is admissible.
pub(crate) fn is_move_allowed(
    grid: &GridStore,
    from: CellCoord,
    to: CellCoord,
    agent: AgentKind,
) -> bool {
    if !grid.contains(from) || !grid.contains(to) {
        return false;
    }
    let Some(direction) = Direction::between(from, to) else {
        return false;
    };
    let one_way_check = agent == AgentKind::Vehicle;
    !is_edge_blocked(
        grid,
        from,
        direction.exit_edge(),
        agent,
        direction,
        false,
        one_way_check,
    ) && !is_edge_blocked(
        grid,
        to,
        direction.entry_edge(),
        agent,
        direction,
        true,
        one_way_check,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkade_core::{CellPatch, FieldUpdate, FixtureKind, TravelFlags};

    fn open_grid() -> GridStore {
        GridStore::new(5, 5)
    }

    #[test]
    fn fence_blocks_everyone_both_ways() {
        let mut grid = open_grid();
        let west = CellCoord::new(1, 2);
        let east = CellCoord::new(2, 2);
        let _ = grid
            .set_border_segment(west, Edge::East, BorderKind::Fence)
            .expect("in bounds");

        for agent in [AgentKind::Vehicle, AgentKind::Pedestrian] {
            assert!(!is_move_allowed(&grid, west, east, agent));
            assert!(!is_move_allowed(&grid, east, west, agent));
        }
    }

    #[test]
    fn curb_stops_vehicles_only() {
        let mut grid = open_grid();
        let north = CellCoord::new(2, 1);
        let south = CellCoord::new(2, 2);
        let _ = grid
            .set_border_segment(south, Edge::North, BorderKind::Curb)
            .expect("in bounds");

        assert!(!is_move_allowed(&grid, north, south, AgentKind::Vehicle));
        assert!(!is_move_allowed(&grid, south, north, AgentKind::Vehicle));
        assert!(is_move_allowed(&grid, north, south, AgentKind::Pedestrian));
        assert!(is_move_allowed(&grid, south, north, AgentKind::Pedestrian));
    }

    #[test]
    fn spot_is_entered_only_through_its_open_edge() {
        for value in 0..4 {
            let mut grid = open_grid();
            let spot = CellCoord::new(2, 2);
            let orientation = Orientation::new(value).expect("valid orientation");
            let _ = grid
                .place_fixture(FixtureKind::ParkingSpot, spot, orientation)
                .expect("empty cell");
            let open = spot_open_edge(orientation);

            for edge in Edge::ALL {
                let neighbor = spot.neighbor(edge, 5, 5).expect("interior cell");
                assert_eq!(
                    is_move_allowed(&grid, neighbor, spot, AgentKind::Vehicle),
                    edge == open,
                    "orientation {value} edge {edge:?}"
                );
                assert!(is_move_allowed(&grid, neighbor, spot, AgentKind::Pedestrian));
            }
        }
    }

    #[test]
    fn lane_line_keeps_traffic_on_the_right() {
        let mut grid = open_grid();
        let _ = grid
            .set_border_segment(CellCoord::new(0, 0), Edge::South, BorderKind::LaneLine)
            .expect("in bounds");

        let upper_west = CellCoord::new(1, 0);
        let upper_east = CellCoord::new(2, 0);
        let lower_west = CellCoord::new(1, 1);
        let lower_east = CellCoord::new(2, 1);
        let _ = grid
            .set_border_segment(upper_west, Edge::South, BorderKind::LaneLine)
            .expect("in bounds");
        let _ = grid
            .set_border_segment(upper_east, Edge::South, BorderKind::LaneLine)
            .expect("in bounds");

        assert!(is_move_allowed(&grid, upper_east, upper_west, AgentKind::Vehicle));
        assert!(!is_move_allowed(&grid, upper_west, upper_east, AgentKind::Vehicle));
        assert!(is_move_allowed(&grid, lower_west, lower_east, AgentKind::Vehicle));
        assert!(!is_move_allowed(&grid, lower_east, lower_west, AgentKind::Vehicle));
        assert!(is_move_allowed(&grid, upper_west, upper_east, AgentKind::Pedestrian));
    }

    #[test]
    fn crossing_a_lane_line_costs_extra() {
        let mut grid = open_grid();
        let upper = CellCoord::new(2, 1);
        let _ = grid
            .set_border_segment(upper, Edge::South, BorderKind::LaneLine)
            .expect("in bounds");

        assert!(is_move_allowed(&grid, upper, CellCoord::new(2, 2), AgentKind::Vehicle));
        assert_eq!(
            edge_crossing_cost(&grid, upper, Direction::South, AgentKind::Vehicle),
            LANE_CROSSING_PENALTY
        );
        assert_eq!(
            edge_crossing_cost(&grid, upper, Direction::South, AgentKind::Pedestrian),
            0
        );
        assert_eq!(
            edge_crossing_cost(&grid, upper, Direction::East, AgentKind::Vehicle),
            0
        );
    }

    #[test]
    fn cleared_travel_flag_blocks_vehicle_exit() {
        let mut grid = open_grid();
        let cell = CellCoord::new(2, 2);
        let _ = grid
            .update_cell(
                cell,
                &CellPatch {
                    travel: FieldUpdate::Set(TravelFlags::OPEN.with(Edge::East, false)),
                    ..CellPatch::default()
                },
            )
            .expect("editable");

        assert!(!is_move_allowed(&grid, cell, CellCoord::new(3, 2), AgentKind::Vehicle));
        assert!(is_move_allowed(&grid, CellCoord::new(3, 2), cell, AgentKind::Vehicle));
        assert!(is_move_allowed(&grid, cell, CellCoord::new(3, 2), AgentKind::Pedestrian));
    }

    #[test]
    fn blocking_fixtures_respect_agent_kind() {
        let mut grid = open_grid();
        let bench = CellCoord::new(2, 2);
        let _ = grid
            .place_fixture(FixtureKind::Bench, bench, Orientation::NORTH)
            .expect("empty cell");
        let from = CellCoord::new(1, 2);

        assert!(!is_move_allowed(&grid, from, bench, AgentKind::Vehicle));
        assert!(is_move_allowed(&grid, from, bench, AgentKind::Pedestrian));
    }

    #[test]
    fn non_adjacent_moves_are_rejected() {
        let grid = open_grid();
        assert!(!is_move_allowed(
            &grid,
            CellCoord::new(0, 0),
            CellCoord::new(1, 1),
            AgentKind::Pedestrian
        ));
        assert!(!is_move_allowed(
            &grid,
            CellCoord::new(4, 4),
            CellCoord::new(5, 4),
            AgentKind::Pedestrian
        ));
    }
}
