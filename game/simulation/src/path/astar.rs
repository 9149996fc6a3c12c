use ahash::AHashMap;
use common::*;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::grid::Grid;

pub type Cell = (i32, i32);

const SQRT2: f32 = std::f32::consts::SQRT_2;

const NEIGHBOURS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

#[derive(Copy, Clone)]
struct OpenEntry {
    f: f32,
    h: f32,
    seq: u64,
    cell: Cell,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_key() == other.cmp_key()
    }
}
impl Eq for OpenEntry {}
impl OpenEntry {
    fn cmp_key(&self) -> (OrderedFloat<f32>, OrderedFloat<f32>, u64) {
        (OrderedFloat(self.f), OrderedFloat(self.h), self.seq)
    }
}
impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // lower f wins; on tied f, lower h wins (§4.5 tie-breaking); on tied f and h, earlier
        // insertion wins so iteration order is deterministic regardless of hash-map iteration
        self.cmp_key().cmp(&other.cmp_key())
    }
}

fn octile_heuristic(a: Cell, b: Cell) -> f32 {
    let dx = (a.0 - b.0).unsigned_abs() as f32;
    let dy = (a.1 - b.1).unsigned_abs() as f32;
    let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
    hi + (SQRT2 - 1.0) * lo
}

/// Whether cutting the corner between `(from)` and `(from.0+dx, from.1+dy)` is allowed: both
/// orthogonal neighbours along the diagonal must be passable (§4.5).
fn diagonal_allowed(grid: &Grid, from: Cell, dx: i32, dy: i32) -> bool {
    if dx == 0 || dy == 0 {
        return true;
    }
    grid.is_passable(from.0 + dx, from.1) && grid.is_passable(from.0, from.1 + dy)
}

/// A* over the 8-connected grid with the octile heuristic (§4.5). Returns `None` if the goal
/// isn't reached within `max_expansions` node expansions.
pub fn astar(grid: &Grid, start: Cell, goal: Cell, max_expansions: u32) -> Option<Vec<Cell>> {
    if start == goal {
        return Some(vec![start]);
    }
    if !grid.in_bounds(start.0, start.1) || !grid.in_bounds(goal.0, goal.1) {
        return None;
    }
    if !grid.is_passable(goal.0, goal.1) {
        return None;
    }

    let mut open = BinaryHeap::new();
    let mut g_score: AHashMap<Cell, f32> = AHashMap::default();
    let mut came_from: AHashMap<Cell, Cell> = AHashMap::default();
    let mut closed: AHashMap<Cell, ()> = AHashMap::default();
    let mut seq = 0u64;

    g_score.insert(start, 0.0);
    open.push(Reverse(OpenEntry {
        f: octile_heuristic(start, goal),
        h: octile_heuristic(start, goal),
        seq,
        cell: start,
    }));

    let mut expansions = 0u32;

    while let Some(Reverse(current)) = open.pop() {
        let cell = current.cell;
        if closed.contains_key(&cell) {
            continue;
        }
        if cell == goal {
            return Some(reconstruct_path(&came_from, start, goal));
        }

        if expansions >= max_expansions {
            return None;
        }
        expansions += 1;
        closed.insert(cell, ());

        for &(dx, dy) in &NEIGHBOURS {
            let neighbour = (cell.0 + dx, cell.1 + dy);
            if !grid.in_bounds(neighbour.0, neighbour.1) || !grid.is_passable(neighbour.0, neighbour.1)
            {
                continue;
            }
            if !diagonal_allowed(grid, cell, dx, dy) {
                continue;
            }
            if closed.contains_key(&neighbour) {
                continue;
            }

            let step_cost = if dx != 0 && dy != 0 { SQRT2 } else { 1.0 };
            let tentative_g = g_score[&cell] + step_cost * grid.cost(neighbour.0, neighbour.1);

            let better = match g_score.get(&neighbour) {
                Some(&existing) => tentative_g < existing,
                None => true,
            };

            if better {
                came_from.insert(neighbour, cell);
                g_score.insert(neighbour, tentative_g);
                let h = octile_heuristic(neighbour, goal);
                seq += 1;
                open.push(Reverse(OpenEntry {
                    f: tentative_g + h,
                    h,
                    seq,
                    cell: neighbour,
                }));
            }
        }
    }

    None
}

fn reconstruct_path(came_from: &AHashMap<Cell, Cell>, start: Cell, goal: Cell) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        current = came_from[&current];
        path.push(current);
    }
    path.reverse();
    path
}

/// Bresenham-like grid raycast used by waypoint smoothing: true if every cell between `a` and `b`
/// (inclusive) is passable, respecting the same corner-cutting rule as the search itself.
fn line_of_sight(grid: &Grid, a: Cell, b: Cell) -> bool {
    let (mut x0, mut y0) = a;
    let (x1, y1) = b;

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if !grid.is_passable(x0, y0) {
            return false;
        }
        if (x0, y0) == (x1, y1) {
            return true;
        }
        let e2 = 2 * err;
        let (mut step_dx, mut step_dy) = (0, 0);
        if e2 >= dy {
            err += dy;
            x0 += sx;
            step_dx = sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
            step_dy = sy;
        }
        if step_dx != 0 && step_dy != 0 && !diagonal_allowed(grid, (x0 - step_dx, y0 - step_dy), step_dx, step_dy)
        {
            return false;
        }
    }
}

/// Greedy waypoint smoothing: repeatedly jump to the farthest waypoint with a clear line of sight
/// (§4.5). `O(k^2)` worst case, bounded for the short paths produced under the expansion budget.
pub fn smooth_path(grid: &Grid, path: &[Cell]) -> Vec<Cell> {
    if path.len() <= 2 {
        return path.to_vec();
    }

    let mut smoothed = vec![path[0]];
    let mut anchor = 0;

    while anchor < path.len() - 1 {
        let mut farthest = anchor + 1;
        for candidate in (anchor + 2..path.len()).rev() {
            if line_of_sight(grid, path[anchor], path[candidate]) {
                farthest = candidate;
                break;
            }
        }
        smoothed.push(path[farthest]);
        anchor = farthest;
    }

    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn start_equals_goal_returns_single_point() {
        let grid = Grid::new(10, 10, 128.0);
        let path = astar(&grid, (3, 3), (3, 3), 1000);
        assert_eq!(path, Some(vec![(3, 3)]));
    }

    #[test]
    fn straight_line_path_on_open_grid() {
        let grid = Grid::new(10, 10, 128.0);
        let path = astar(&grid, (0, 0), (5, 0), 1000).unwrap();
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(5, 0)));
    }

    #[test]
    fn unreachable_goal_returns_none() {
        let mut grid = Grid::new(5, 5, 128.0);
        // wall off the goal completely
        for x in 0..5 {
            grid.set_cost(x, 2, 1.0);
        }
        let cells: Vec<(i32, i32)> = (0..5).map(|x| (x, 2)).collect();
        for (x, y) in cells {
            let _ = grid.place_footprint(&[(x, y)]);
        }
        let path = astar(&grid, (0, 0), (0, 4), 10_000);
        assert_eq!(path, None);
    }

    #[test]
    fn budget_exhaustion_returns_none() {
        let grid = Grid::new(50, 50, 128.0);
        let path = astar(&grid, (0, 0), (49, 49), 2);
        assert_eq!(path, None);
    }

    #[test]
    fn corner_cutting_is_forbidden() {
        let mut grid = Grid::new(12, 12, 128.0);
        grid.place_footprint(&[(6, 5), (5, 6)]).unwrap();
        // (5,5) -> (6,6) diagonally would cut the corner between two impassable cells
        let path = astar(&grid, (5, 5), (6, 6), 1000).unwrap();
        // must detour rather than go directly diagonal
        assert!(path.len() > 2);
    }

    #[test]
    fn pathfinding_around_wall_gap() {
        let mut grid = Grid::new(16, 16, 128.0);
        // wall across y=8 except a gap at x=8
        let wall: Vec<(i32, i32)> = (0..16).filter(|&x| x != 8).map(|x| (x, 8)).collect();
        grid.place_footprint(&wall).unwrap();

        let path = astar(&grid, (0, 0), (10, 10), 4096).expect("path should exist through gap");
        assert!(path.len() <= 22);

        let smoothed = smooth_path(&grid, &path);
        assert!(smoothed.len() <= 6);
    }

    #[test]
    fn pathfinder_optimality_matches_bfs_within_octile_factor() {
        // uniform-cost open grid: A* with octile heuristic should find a path whose length is
        // within the diagonal-vs-manhattan factor of pure BFS (4-connected) shortest path.
        let grid = Grid::new(20, 20, 128.0);
        let start = (0, 0);
        let goal = (10, 6);

        let astar_path = astar(&grid, start, goal, 10_000).unwrap();
        let astar_cost: f32 = path_cost(&astar_path);

        let bfs_len = bfs_manhattan_distance(start, goal);
        assert!(astar_cost <= bfs_len as f32 + 1e-3);
    }

    fn path_cost(path: &[Cell]) -> f32 {
        path.windows(2)
            .map(|w| {
                let (dx, dy) = (w[1].0 - w[0].0, w[1].1 - w[0].1);
                if dx != 0 && dy != 0 {
                    SQRT2
                } else {
                    1.0
                }
            })
            .sum()
    }

    fn bfs_manhattan_distance(a: Cell, b: Cell) -> i32 {
        (a.0 - b.0).abs() + (a.1 - b.1).abs()
    }
}
