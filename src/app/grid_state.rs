//! Grid state management
//!
//! Owns the visible grid (if any). Every mutation is a single replace under
//! the lock, followed by an observer notification with the new state.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::app::mode::{ModeCoordinator, OverlayMode};
use crate::config::Settings;
use crate::domain::core::{DisplayInfo, Point};
use crate::domain::grid::{CENTER_CELL, Grid, GridNavigator};
use crate::gesture::GestureManager;
use crate::lock;

/// Called with the new grid after every mutation; `None` means hidden
pub type GridObserver = Arc<dyn Fn(Option<&Grid>) + Send + Sync>;

/// What a number key did to the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKeyOutcome {
    /// No visible grid, or the key is not 1-9
    Ignored,
    /// Descended into the selected cell
    Descended,
    /// Tapped the selected cell at the deepest level
    Tapped,
    /// The tap could not be queued
    TapFailed,
}

pub struct GridStateManager {
    grid: Mutex<Option<Grid>>,
    settings: watch::Receiver<Settings>,
    display: watch::Receiver<DisplayInfo>,
    gestures: Arc<GestureManager>,
    coordinator: Arc<ModeCoordinator>,
    observer: Mutex<Option<GridObserver>>,
}

impl GridStateManager {
    pub fn new(
        settings: watch::Receiver<Settings>,
        display: watch::Receiver<DisplayInfo>,
        gestures: Arc<GestureManager>,
        coordinator: Arc<ModeCoordinator>,
    ) -> Self {
        Self {
            grid: Mutex::new(None),
            settings,
            display,
            gestures,
            coordinator,
            observer: Mutex::new(None),
        }
    }

    pub fn set_observer(&self, observer: GridObserver) {
        *lock(&self.observer) = Some(observer);
    }

    /// Snapshot of the current grid
    pub fn current(&self) -> Option<Grid> {
        lock(&self.grid).clone()
    }

    pub fn is_visible(&self) -> bool {
        lock(&self.grid).is_some()
    }

    fn root(&self) -> Grid {
        Grid::root(self.settings.borrow().grid_levels)
    }

    /// Applies `update` to the current grid as one replace and notifies
    fn mutate<F>(&self, update: F) -> Option<Grid>
    where
        F: FnOnce(Option<&Grid>) -> Option<Grid>,
    {
        let next = {
            let mut grid = lock(&self.grid);
            let next = update(grid.as_ref());
            *grid = next.clone();
            next
        };
        self.notify(next.as_ref());
        next
    }

    fn notify(&self, grid: Option<&Grid>) {
        let observer = lock(&self.observer).clone();
        if let Some(observer) = observer {
            observer(grid);
        }
    }

    /// Handles a number key while the grid is visible
    ///
    /// Below the deepest level the grid descends into the cell. At the
    /// deepest level the cell center is tapped, then the grid is hidden, or
    /// reset to the root when the overlay persists.
    pub fn handle_number_key(&self, key_number: u8) -> NumberKeyOutcome {
        let Some(grid) = self.current() else {
            return NumberKeyOutcome::Ignored;
        };

        let result = GridNavigator::process_number_key(key_number, &grid);
        let Some(cell_index) = result.cell_index.filter(|_| result.valid) else {
            return NumberKeyOutcome::Ignored;
        };

        if !result.needs_terminal_click {
            let next = self.mutate(|current| {
                current.map(|grid| GridNavigator::get_subgrid(grid, cell_index))
            });
            debug!(level = next.as_ref().map(Grid::level), cell_index, "grid descended");
            return NumberKeyOutcome::Descended;
        }

        let screen = self.display.borrow().dimensions;
        let point = GridNavigator::calculate_click_coordinates(&grid, cell_index, screen);
        info!(?point, cell_index, "terminal grid selection");
        let queued = self.gestures.tap(point);

        if self.settings.borrow().persist_overlay {
            let root = self.root();
            self.mutate(|_| Some(root));
        } else {
            self.hide_grid();
        }

        if queued {
            NumberKeyOutcome::Tapped
        } else {
            NumberKeyOutcome::TapFailed
        }
    }

    /// Shows a fresh root grid, or hides the visible one
    ///
    /// # Returns
    /// Whether the grid is visible afterwards
    pub fn toggle_grid_visibility(&self) -> bool {
        if self.is_visible() {
            self.hide_grid();
            false
        } else {
            self.show_grid();
            true
        }
    }

    pub fn show_grid(&self) {
        let root = self.root();
        self.mutate(|_| Some(root));
        debug!("grid shown");
    }

    /// Hides the grid and releases the grid mode
    pub fn hide_grid(&self) {
        self.mutate(|_| None);
        self.coordinator.deactivate(OverlayMode::Grid);
        debug!("grid hidden");
    }

    /// Collapses a visible grid back to level 1
    ///
    /// Only deeper grids are reset unless `force` is set, which is used when
    /// the screen or the level setting changed.
    pub fn reset_to_main_grid(&self, force: bool) {
        let root = self.root();
        let needs_reset = lock(&self.grid)
            .as_ref()
            .is_some_and(|grid| force || grid.level() > 1);
        if needs_reset {
            self.mutate(|current| current.map(|_| root));
            debug!(force, "grid reset to level 1");
        }
    }

    /// Center of `cell_index` in the current grid; screen center without one
    pub fn get_cell_coordinates(&self, cell_index: usize) -> Point {
        let screen = self.display.borrow().dimensions;
        match self.current() {
            Some(grid) => GridNavigator::calculate_click_coordinates(&grid, cell_index, screen),
            None => screen.center(),
        }
    }

    /// Coordinates scroll, zoom and tap keys act on: the center cell of the
    /// current level
    pub fn focus_coordinates(&self) -> Point {
        self.get_cell_coordinates(CENTER_CELL)
    }
}
