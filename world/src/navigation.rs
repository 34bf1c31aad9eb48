//! A* route search over the grid's 4-connected cells.

use std::{cmp::Reverse, collections::BinaryHeap};

use parkade_core::{AgentKind, CellCoord, Direction, NoPath, Route};

use crate::{grid::GridStore, rules};

/// Finds the cheapest admissible route from `from` to `to` for the agent kind.
///
/// Each step costs one plus the edge crossing penalty; the heuristic is the
/// Manhattan distance. Equal priorities pop in insertion order so results are
/// reproducible. The returned route excludes the start and includes the goal.
pub(crate) fn find_path(
    grid: &GridStore,
    from: CellCoord,
    to: CellCoord,
    agent: AgentKind,
) -> Result<Route, NoPath> {
    let no_path = NoPath { from, to };
    if !grid.contains(from) || !grid.contains(to) {
        return Err(no_path);
    }
    if from == to {
        return Ok(Route::new(Vec::new(), 0));
    }

    let (width, height) = grid.dimensions();
    let width_usize = usize::try_from(width).map_err(|_| no_path)?;
    let cell_count = width_usize
        .checked_mul(usize::try_from(height).map_err(|_| no_path)?)
        .ok_or(no_path)?;

    let mut best_cost = vec![u32::MAX; cell_count];
    let mut came_from: Vec<Option<CellCoord>> = vec![None; cell_count];
    let mut open = BinaryHeap::new();
    let mut sequence: u64 = 0;

    let start_index = index(width_usize, from).ok_or(no_path)?;
    best_cost[start_index] = 0;
    open.push(Reverse(OpenEntry {
        priority: from.manhattan_distance(to),
        sequence,
        cost: 0,
        cell: from,
    }));

    while let Some(Reverse(entry)) = open.pop() {
        let Some(current_index) = index(width_usize, entry.cell) else {
            continue;
        };
        if entry.cost > best_cost[current_index] {
            continue;
        }
        if entry.cell == to {
            return Ok(Route::new(
                reconstruct(&came_from, width_usize, from, to),
                entry.cost,
            ));
        }

        for direction in Direction::ALL {
            let Some(next) = grid.neighbor(entry.cell, direction.exit_edge()) else {
                continue;
            };
            if !rules::is_move_allowed(grid, entry.cell, next, agent) {
                continue;
            }
            let Some(next_index) = index(width_usize, next) else {
                continue;
            };

            let step = 1 + rules::edge_crossing_cost(grid, entry.cell, direction, agent);
            let tentative = entry.cost.saturating_add(step);
            if tentative >= best_cost[next_index] {
                continue;
            }

            best_cost[next_index] = tentative;
            came_from[next_index] = Some(entry.cell);
            sequence += 1;
            open.push(Reverse(OpenEntry {
                priority: tentative.saturating_add(next.manhattan_distance(to)),
                sequence,
                cost: tentative,
                cell: next,
            }));
        }
    }

    Err(no_path)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct OpenEntry {
    priority: u32,
    sequence: u64,
    cost: u32,
    cell: CellCoord,
}

fn reconstruct(
    came_from: &[Option<CellCoord>],
    width: usize,
    from: CellCoord,
    to: CellCoord,
) -> Vec<CellCoord> {
    let mut cells = vec![to];
    let mut current = to;
    while let Some(previous) = index(width, current).and_then(|offset| came_from[offset]) {
        if previous == from {
            break;
        }
        cells.push(previous);
        current = previous;
    }
    cells.reverse();
    cells
}

fn index(width: usize, cell: CellCoord) -> Option<usize> {
    let column = usize::try_from(cell.column()).ok()?;
    let row = usize::try_from(cell.row()).ok()?;
    row.checked_mul(width)?.checked_add(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkade_core::{BorderKind, Edge};

    #[test]
    fn empty_grid_path_runs_corner_to_corner() {
        let grid = GridStore::new(10, 10);
        let route = find_path(
            &grid,
            CellCoord::new(0, 0),
            CellCoord::new(9, 9),
            AgentKind::Vehicle,
        )
        .expect("open grid");

        assert_eq!(route.len(), 18);
        assert_eq!(route.cost(), 18);
        assert_eq!(route.cells().last(), Some(&CellCoord::new(9, 9)));
        assert!(!route.cells().contains(&CellCoord::new(0, 0)));
    }

    #[test]
    fn start_equal_to_goal_yields_empty_route() {
        let grid = GridStore::new(3, 3);
        let cell = CellCoord::new(1, 1);
        let route = find_path(&grid, cell, cell, AgentKind::Pedestrian).expect("trivial");
        assert!(route.is_empty());
        assert_eq!(route.cost(), 0);
    }

    #[test]
    fn out_of_bounds_endpoints_fail() {
        let grid = GridStore::new(3, 3);
        let outside = CellCoord::new(3, 0);
        assert_eq!(
            find_path(&grid, CellCoord::new(0, 0), outside, AgentKind::Vehicle),
            Err(NoPath {
                from: CellCoord::new(0, 0),
                to: outside,
            })
        );
    }

    #[test]
    fn fenced_off_goal_is_unreachable() {
        let mut grid = GridStore::new(3, 3);
        let goal = CellCoord::new(2, 2);
        let _ = grid
            .set_border_segment(goal, Edge::North, BorderKind::Fence)
            .expect("in bounds");
        let _ = grid
            .set_border_segment(goal, Edge::West, BorderKind::Fence)
            .expect("in bounds");

        assert!(find_path(&grid, CellCoord::new(0, 0), goal, AgentKind::Pedestrian).is_err());
    }

    #[test]
    fn fence_forces_a_detour() {
        let mut grid = GridStore::new(3, 2);
        let _ = grid
            .set_border_segment(CellCoord::new(1, 0), Edge::South, BorderKind::Fence)
            .expect("in bounds");
        let route = find_path(
            &grid,
            CellCoord::new(1, 0),
            CellCoord::new(1, 1),
            AgentKind::Pedestrian,
        )
        .expect("detour exists");

        assert_eq!(route.len(), 3);
        for pair in route.cells().windows(2) {
            assert_eq!(pair[0].manhattan_distance(pair[1]), 1);
        }
    }
}
