use common::*;

/// One cell of the uniform passability/cost grid (§4.4).
#[derive(Debug, Clone, Copy)]
pub struct Cell {
    pub passable: bool,
    /// Traversal cost, `1.0` by default; higher for rough terrain.
    pub cost: f32,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            passable: true,
            cost: 1.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum FootprintError {
    #[error("footprint cell ({0}, {1}) is out of bounds")]
    OutOfBounds(i32, i32),
    #[error("footprint cell ({0}, {1}) is already impassable")]
    Blocked(i32, i32),
}

/// Uniform grid of `cell_size`-world-unit cells (§4.4). Immutable after map load except for
/// building footprints, which are carved out on completion and restored on destruction.
pub struct Grid {
    width: i32,
    height: i32,
    cell_size: f32,
    cells: Vec<Cell>,
    /// Bumped whenever passability changes; invalidates the pathfinder cache (§4.5, GLOSSARY
    /// "Grid version").
    version: u64,
}

impl Grid {
    pub fn new(width: i32, height: i32, cell_size: f32) -> Self {
        Self {
            width,
            height,
            cell_size,
            cells: vec![Cell::default(); (width * height) as usize],
            version: 0,
        }
    }

    pub fn with_config(width: i32, height: i32) -> Self {
        let cfg = config::get();
        Self::new(width, height, cfg.grid.cell_size)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn world_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        ((x / self.cell_size).floor() as i32, (y / self.cell_size).floor() as i32)
    }

    pub fn cell_center(&self, cx: i32, cy: i32) -> (f32, f32) {
        (
            (cx as f32 + 0.5) * self.cell_size,
            (cy as f32 + 0.5) * self.cell_size,
        )
    }

    pub fn in_bounds(&self, cx: i32, cy: i32) -> bool {
        cx >= 0 && cy >= 0 && cx < self.width && cy < self.height
    }

    fn index(&self, cx: i32, cy: i32) -> Option<usize> {
        self.in_bounds(cx, cy)
            .then(|| (cy * self.width + cx) as usize)
    }

    pub fn cell(&self, cx: i32, cy: i32) -> Option<Cell> {
        self.index(cx, cy).map(|i| self.cells[i])
    }

    pub fn is_passable(&self, cx: i32, cy: i32) -> bool {
        self.cell(cx, cy).map(|c| c.passable).unwrap_or(false)
    }

    pub fn cost(&self, cx: i32, cy: i32) -> f32 {
        self.cell(cx, cy).map(|c| c.cost).unwrap_or(f32::INFINITY)
    }

    pub fn set_cost(&mut self, cx: i32, cy: i32, cost: f32) {
        if let Some(i) = self.index(cx, cy) {
            self.cells[i].cost = cost;
        }
    }

    /// Validates every footprint cell is in-bounds and passable, then marks them impassable and
    /// bumps [Self::version] (§4.4 "Building placement validates ... before committing").
    pub fn place_footprint(&mut self, cells: &[(i32, i32)]) -> Result<(), FootprintError> {
        for &(cx, cy) in cells {
            if !self.in_bounds(cx, cy) {
                return Err(FootprintError::OutOfBounds(cx, cy));
            }
            if !self.is_passable(cx, cy) {
                return Err(FootprintError::Blocked(cx, cy));
            }
        }

        for &(cx, cy) in cells {
            let i = self.index(cx, cy).unwrap();
            self.cells[i].passable = false;
        }
        self.version += 1;
        Ok(())
    }

    /// Restores a previously-placed footprint, e.g. on building destruction.
    pub fn clear_footprint(&mut self, cells: &[(i32, i32)]) {
        for &(cx, cy) in cells {
            if let Some(i) = self.index(cx, cy) {
                self.cells[i].passable = true;
            }
        }
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_to_cell_floor_divides() {
        let grid = Grid::new(64, 64, 128.0);
        assert_eq!(grid.world_to_cell(0.0, 0.0), (0, 0));
        assert_eq!(grid.world_to_cell(127.9, 0.0), (0, 0));
        assert_eq!(grid.world_to_cell(128.0, 0.0), (1, 0));
        assert_eq!(grid.world_to_cell(-1.0, -1.0), (-1, -1));
    }

    #[test]
    fn cell_center_round_trips_to_middle_of_cell() {
        let grid = Grid::new(64, 64, 128.0);
        let (x, y) = grid.cell_center(2, 3);
        assert_eq!(grid.world_to_cell(x, y), (2, 3));
        assert_eq!(x, 320.0);
        assert_eq!(y, 448.0);
    }

    #[test]
    fn footprint_requires_passable_in_bounds_cells() {
        let mut grid = Grid::new(4, 4, 128.0);
        assert!(grid.place_footprint(&[(0, 0), (1, 0)]).is_ok());
        assert!(!grid.is_passable(0, 0));
        let v1 = grid.version();

        // overlapping footprint fails and leaves grid unchanged
        assert!(matches!(
            grid.place_footprint(&[(1, 0), (2, 0)]),
            Err(FootprintError::Blocked(1, 0))
        ));
        assert!(grid.is_passable(2, 0));
        assert_eq!(grid.version(), v1);

        assert!(matches!(
            grid.place_footprint(&[(10, 10)]),
            Err(FootprintError::OutOfBounds(10, 10))
        ));
    }

    #[test]
    fn clearing_footprint_restores_passability_and_bumps_version() {
        let mut grid = Grid::new(4, 4, 128.0);
        grid.place_footprint(&[(0, 0)]).unwrap();
        let v1 = grid.version();
        grid.clear_footprint(&[(0, 0)]);
        assert!(grid.is_passable(0, 0));
        assert!(grid.version() > v1);
    }
}
