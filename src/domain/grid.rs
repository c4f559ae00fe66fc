//! Recursive 3x3 grid geometry
//!
//! A grid level divides the area selected at the previous level into nine
//! cells numbered like a phone keypad:
//!
//! ```text
//! 1 2 3
//! 4 5 6
//! 7 8 9
//! ```
//!
//! The hierarchy is stored as a flat path of selected cell indices from the
//! root, so resolving a coordinate is a plain walk over that path.

use tracing::warn;

use crate::domain::core::{Point, Rect, ScreenDimensions};

/// Rows and columns of every grid level
pub const GRID_SIZE: u32 = 3;
/// Number of cells per grid level
pub const CELL_COUNT: usize = 9;
/// Index of the center cell (key `5`)
pub const CENTER_CELL: usize = 4;
/// Smallest supported depth
pub const MIN_LEVELS: u8 = 2;
/// Deepest supported depth
pub const MAX_LEVELS: u8 = 4;

/// A single cell of a grid level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    /// Number shown on the overlay, 1-9
    pub number: u8,
}

impl Cell {
    /// Cell for a zero-based index, or `None` if the index is outside 0-8
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= CELL_COUNT {
            return None;
        }
        Some(Self {
            row: (index as u32) / GRID_SIZE,
            col: (index as u32) % GRID_SIZE,
            number: index as u8 + 1,
        })
    }

    pub fn index(&self) -> usize {
        (self.row * GRID_SIZE + self.col) as usize
    }
}

/// The default nine-cell layout in keypad order
pub fn default_cells() -> [Cell; CELL_COUNT] {
    let mut cells = [Cell {
        row: 0,
        col: 0,
        number: 1,
    }; CELL_COUNT];
    for (index, slot) in cells.iter_mut().enumerate() {
        *slot = Cell {
            row: (index as u32) / GRID_SIZE,
            col: (index as u32) % GRID_SIZE,
            number: index as u8 + 1,
        };
    }
    cells
}

/// One level of the grid hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: [Cell; CELL_COUNT],
    /// Selected cell indices from the root down to this level
    path: Vec<usize>,
    max_levels: u8,
    visible: bool,
}

impl Grid {
    /// Creates a visible level-1 grid covering the whole screen
    ///
    /// `max_levels` is clamped to [`MIN_LEVELS`]..=[`MAX_LEVELS`].
    pub fn root(max_levels: u8) -> Self {
        Self {
            cells: default_cells(),
            path: Vec::new(),
            max_levels: max_levels.clamp(MIN_LEVELS, MAX_LEVELS),
            visible: true,
        }
    }

    /// Creates a grid from an explicit path of selected cells
    ///
    /// Paths longer than `max_levels - 1` are truncated so the level
    /// invariant holds. Entries are not validated here; coordinate
    /// resolution skips invalid ones.
    pub fn from_path(path: Vec<usize>, max_levels: u8) -> Self {
        let mut grid = Self::root(max_levels);
        let mut path = path;
        path.truncate(grid.max_levels as usize - 1);
        grid.path = path;
        grid
    }

    pub fn cells(&self) -> &[Cell; CELL_COUNT] {
        &self.cells
    }

    /// Current depth, starting at 1 for the full-screen grid
    pub fn level(&self) -> u8 {
        self.path.len() as u8 + 1
    }

    pub fn max_levels(&self) -> u8 {
        self.max_levels
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Cell selected in the parent level to reach this one
    pub fn parent_cell(&self) -> Option<Cell> {
        self.path.last().and_then(|&index| Cell::from_index(index))
    }

    /// The grid one level up, or `None` at the root
    pub fn parent(&self) -> Option<Grid> {
        if self.path.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.path.pop();
        Some(parent)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// True when selecting a cell here produces a tap instead of a subgrid
    pub fn is_terminal(&self) -> bool {
        self.level() >= self.max_levels
    }

    /// Screen area covered by this level
    pub fn area(&self, screen: ScreenDimensions) -> Rect {
        let mut rect = screen.rect();
        for (depth, &index) in self.path.iter().enumerate() {
            match Cell::from_index(index) {
                Some(cell) => {
                    rect = rect.subdivide(GRID_SIZE, GRID_SIZE, cell.row, cell.col);
                }
                None => {
                    warn!(
                        level = depth + 1,
                        index, "grid path holds an invalid parent cell, skipping level"
                    );
                }
            }
        }
        rect
    }
}

/// Outcome of mapping a number key onto the current grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberKeyResult {
    pub valid: bool,
    /// True when the grid is at its deepest level and the selection must tap
    pub needs_terminal_click: bool,
    /// Zero-based cell index; `None` for invalid keys
    pub cell_index: Option<usize>,
}

impl NumberKeyResult {
    /// The `(false, false, -1)` result reported for rejected keys
    pub const INVALID: NumberKeyResult = NumberKeyResult {
        valid: false,
        needs_terminal_click: false,
        cell_index: None,
    };
}

/// Stateless grid navigation
pub struct GridNavigator;

impl GridNavigator {
    /// Returns the grid reached by selecting `cell_index` in `grid`
    ///
    /// Below the deepest level this is a fresh, visible level+1 grid whose
    /// parent is `grid`. At the deepest level no subgrid exists and `grid`
    /// comes back unchanged; callers take the terminal tap path instead.
    pub fn get_subgrid(grid: &Grid, cell_index: usize) -> Grid {
        if Cell::from_index(cell_index).is_none() {
            warn!(cell_index, "subgrid requested for invalid cell, keeping grid");
            return grid.clone();
        }

        if grid.is_terminal() {
            warn!(
                level = grid.level(),
                cell_index, "subgrid requested at max level, keeping grid"
            );
            return grid.clone();
        }

        let mut path = grid.path.clone();
        path.push(cell_index);
        Grid {
            cells: default_cells(),
            path,
            max_levels: grid.max_levels,
            visible: true,
        }
    }

    /// Resolves the absolute center of `cell_index` inside `grid`
    ///
    /// # Arguments
    /// * `grid` - Grid whose path locates the current area
    /// * `cell_index` - Zero-based cell inside that area
    /// * `screen` - Dimension snapshot the coordinates belong to
    ///
    /// # Returns
    /// The cell center, or the screen center if the index is invalid
    pub fn calculate_click_coordinates(
        grid: &Grid,
        cell_index: usize,
        screen: ScreenDimensions,
    ) -> Point {
        let Some(cell) = Cell::from_index(cell_index) else {
            warn!(cell_index, "invalid cell index, falling back to screen center");
            return screen.center();
        };

        grid.area(screen)
            .subdivide(GRID_SIZE, GRID_SIZE, cell.row, cell.col)
            .center()
    }

    /// Maps a number key (1-9) to a cell of `grid`
    ///
    /// Keys outside 1-9 produce [`NumberKeyResult::INVALID`].
    pub fn process_number_key(key_number: u8, grid: &Grid) -> NumberKeyResult {
        if !(1..=9).contains(&key_number) {
            warn!(key_number, "number key outside 1-9 ignored");
            return NumberKeyResult::INVALID;
        }

        let index = (key_number - 1) as usize;
        let row = index / GRID_SIZE as usize;
        let col = index % GRID_SIZE as usize;

        NumberKeyResult {
            valid: true,
            needs_terminal_click: grid.is_terminal(),
            cell_index: Some(row * GRID_SIZE as usize + col),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 0.01 && (a.y - b.y).abs() < 0.01
    }

    #[test]
    fn default_cells_follow_keypad_order() {
        let cells = default_cells();
        assert_eq!(cells[0], Cell { row: 0, col: 0, number: 1 });
        assert_eq!(cells[5], Cell { row: 1, col: 2, number: 6 });
        assert_eq!(cells[8], Cell { row: 2, col: 2, number: 9 });
        for (index, cell) in cells.iter().enumerate() {
            assert_eq!(cell.index(), index);
        }
    }

    #[test]
    fn root_grid_clamps_levels() {
        assert_eq!(Grid::root(1).max_levels(), MIN_LEVELS);
        assert_eq!(Grid::root(9).max_levels(), MAX_LEVELS);
        let grid = Grid::root(3);
        assert_eq!(grid.level(), 1);
        assert!(grid.is_visible());
        assert!(grid.parent().is_none());
        assert!(grid.parent_cell().is_none());
    }

    #[test]
    fn subgrid_links_to_parent() {
        let root = Grid::root(4);
        for index in 0..CELL_COUNT {
            let sub = GridNavigator::get_subgrid(&root, index);
            assert_eq!(sub.level(), 2);
            assert_eq!(sub.parent_cell(), Cell::from_index(index));
            assert_eq!(sub.parent(), Some(root.clone()));
            assert!(sub.is_visible());

            let deeper = GridNavigator::get_subgrid(&sub, 8);
            assert_eq!(deeper.level(), 3);
            assert_eq!(deeper.parent(), Some(sub.clone()));
        }
    }

    #[test]
    fn subgrid_at_max_level_keeps_grid() {
        let grid = GridNavigator::get_subgrid(&Grid::root(2), 4);
        assert!(grid.is_terminal());

        let same = GridNavigator::get_subgrid(&grid, 2);
        assert_eq!(same, grid);
        assert_eq!(same.level(), 2);
    }

    #[test]
    fn centered_path_keeps_screen_center() {
        let screen = ScreenDimensions::new(300, 300);
        let mut grid = Grid::root(3);
        grid = GridNavigator::get_subgrid(&grid, 4);
        grid = GridNavigator::get_subgrid(&grid, 4);
        assert_eq!(grid.level(), 3);

        let point = GridNavigator::calculate_click_coordinates(&grid, 4, screen);
        assert!(close(point, Point::new(150.0, 150.0)), "{point:?}");
    }

    #[test]
    fn click_coordinates_top_left_corner() {
        let screen = ScreenDimensions::new(900, 900);
        let grid = GridNavigator::get_subgrid(&Grid::root(3), 0);
        // Level 2 covers (0,0)-(300,300); cell 1 is (0,0)-(100,100)
        let point = GridNavigator::calculate_click_coordinates(&grid, 0, screen);
        assert!(close(point, Point::new(50.0, 50.0)), "{point:?}");

        let point = GridNavigator::calculate_click_coordinates(&grid, 8, screen);
        assert!(close(point, Point::new(250.0, 250.0)), "{point:?}");
    }

    #[test]
    fn click_coordinates_non_square_screen() {
        let screen = ScreenDimensions::new(1920, 1080);
        let grid = GridNavigator::get_subgrid(&Grid::root(2), 5);
        // Cell 6 at level 1: x 1280-1920, y 360-720
        let point = GridNavigator::calculate_click_coordinates(&grid, 4, screen);
        assert!(close(point, Point::new(1600.0, 540.0)), "{point:?}");
    }

    #[test]
    fn invalid_cell_falls_back_to_center() {
        let screen = ScreenDimensions::new(400, 200);
        let grid = GridNavigator::get_subgrid(&Grid::root(3), 0);
        let point = GridNavigator::calculate_click_coordinates(&grid, 12, screen);
        assert_eq!(point, screen.center());
    }

    #[test]
    fn invalid_path_entry_is_skipped() {
        let screen = ScreenDimensions::new(300, 300);
        let broken = Grid::from_path(vec![42, 8], 4);
        let expected = Grid::from_path(vec![8], 4);
        assert_eq!(broken.area(screen), expected.area(screen));

        let point = GridNavigator::calculate_click_coordinates(&broken, 4, screen);
        assert!(close(point, Point::new(250.0, 250.0)), "{point:?}");
    }

    #[test]
    fn from_path_respects_level_invariant() {
        let grid = Grid::from_path(vec![1, 2, 3, 4, 5], 3);
        assert_eq!(grid.level(), 3);
        assert_eq!(grid.path(), &[1, 2]);
    }

    #[test]
    fn number_key_mapping() {
        let grid = Grid::root(3);
        let result = GridNavigator::process_number_key(1, &grid);
        assert_eq!(
            result,
            NumberKeyResult {
                valid: true,
                needs_terminal_click: false,
                cell_index: Some(0)
            }
        );
        assert_eq!(GridNavigator::process_number_key(9, &grid).cell_index, Some(8));
        assert_eq!(GridNavigator::process_number_key(6, &grid).cell_index, Some(5));
    }

    #[test]
    fn number_key_out_of_range_is_invalid() {
        let grid = Grid::root(3);
        for key in [0u8, 10, 11, 200, 255] {
            assert_eq!(
                GridNavigator::process_number_key(key, &grid),
                NumberKeyResult::INVALID
            );
        }
    }

    #[test]
    fn number_key_reports_terminal_click() {
        let grid = GridNavigator::get_subgrid(&Grid::root(2), 4);
        let result = GridNavigator::process_number_key(5, &grid);
        assert!(result.valid);
        assert!(result.needs_terminal_click);
        assert_eq!(result.cell_index, Some(4));
    }
}
