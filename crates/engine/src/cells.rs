//! Visible-cell state and the render pass that keeps the map in sync with it.
//!
//! The map itself is a black box reached through [`MapSurface`]. The store only
//! remembers what it drew for cells inside the current window; token values
//! are always re-resolved from the modified-cell record or the spawn function.

use std::collections::HashMap;

use tracing::debug;
use worldofbits_protocol::{CellStyle, GridCell, LatLng, LatLngBounds, MapCommand, Token};

use crate::config::GameConfig;
use crate::grid::{self, CellRange};
use crate::memento::ModifiedCells;
use crate::spawn::spawn;

pub type Handle = u64;

/// Largest half-width, in cells, of a render window on either axis.
pub const MAX_WINDOW_HALF_EXTENT: i32 = 50;

pub trait MapSurface {
    fn draw_cell(&mut self, cell: GridCell, bounds: LatLngBounds, style: CellStyle) -> Handle;
    fn update_cell(&mut self, handle: Handle, style: CellStyle);
    fn remove_cell(&mut self, handle: Handle);
    fn move_player_marker(&mut self, pos: LatLng);
    fn pan_to(&mut self, pos: LatLng);
}

/// Surface that turns every call into a [`MapCommand`] for the browser.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    next_handle: Handle,
    commands: Vec<MapCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_commands(&mut self) -> Vec<MapCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl MapSurface for RecordingSurface {
    fn draw_cell(&mut self, cell: GridCell, bounds: LatLngBounds, style: CellStyle) -> Handle {
        self.next_handle += 1;
        let handle = self.next_handle;
        self.commands.push(MapCommand::DrawCell {
            handle,
            cell,
            bounds,
            style,
        });
        handle
    }

    fn update_cell(&mut self, handle: Handle, style: CellStyle) {
        self.commands.push(MapCommand::UpdateCell { handle, style });
    }

    fn remove_cell(&mut self, handle: Handle) {
        self.commands.push(MapCommand::RemoveCell { handle });
    }

    fn move_player_marker(&mut self, pos: LatLng) {
        self.commands.push(MapCommand::MovePlayer { lat_lng: pos });
    }

    fn pan_to(&mut self, pos: LatLng) {
        self.commands.push(MapCommand::PanTo { lat_lng: pos });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellState {
    pub token: Option<Token>,
    pub interactable: bool,
    pub handle: Handle,
}

impl CellState {
    fn style(&self) -> CellStyle {
        CellStyle {
            token: self.token,
            interactable: self.interactable,
        }
    }
}

/// Everything a render pass reads but does not own.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub config: &'a GameConfig,
    pub modified: &'a ModifiedCells,
    pub player_cell: GridCell,
}

impl RenderContext<'_> {
    pub fn token_at(&self, cell: GridCell) -> Option<Token> {
        self.modified.resolve(cell, || spawn(self.config, cell))
    }

    pub fn in_reach(&self, cell: GridCell) -> bool {
        grid::chebyshev_distance(self.player_cell, cell) <= self.config.interaction_radius
    }

    fn style_for(&self, cell: GridCell) -> CellStyle {
        CellStyle {
            token: self.token_at(cell),
            interactable: self.in_reach(cell),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub drawn: usize,
    pub updated: usize,
    pub removed: usize,
    pub kept: usize,
}

#[derive(Debug, Default)]
pub struct CellStore {
    cells: HashMap<GridCell, CellState>,
    window: Option<CellRange>,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cell: GridCell) -> Option<&CellState> {
        self.cells.get(&cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn window(&self) -> Option<CellRange> {
        self.window
    }

    /// Brings the surface in line with `window`: cells that left it are
    /// removed, new cells are drawn and kept cells are restyled if their token
    /// or reachability changed.
    pub fn render(
        &mut self,
        ctx: &RenderContext<'_>,
        window: CellRange,
        surface: &mut impl MapSurface,
    ) -> RenderStats {
        let window = clamp_window(window);
        let mut stats = RenderStats::default();

        self.cells.retain(|cell, state| {
            if window.contains(*cell) {
                return true;
            }
            surface.remove_cell(state.handle);
            stats.removed += 1;
            false
        });

        for cell in window.cells() {
            let style = ctx.style_for(cell);
            match self.cells.get_mut(&cell) {
                Some(state) if state.style() == style => stats.kept += 1,
                Some(state) => {
                    state.token = style.token;
                    state.interactable = style.interactable;
                    surface.update_cell(state.handle, style);
                    stats.updated += 1;
                }
                None => {
                    let handle = surface.draw_cell(cell, grid::to_bounds(ctx.config, cell), style);
                    self.cells.insert(
                        cell,
                        CellState {
                            token: style.token,
                            interactable: style.interactable,
                            handle,
                        },
                    );
                    stats.drawn += 1;
                }
            }
        }

        self.window = Some(window);
        debug!(
            min = %window.min,
            max = %window.max,
            drawn = stats.drawn,
            updated = stats.updated,
            removed = stats.removed,
            kept = stats.kept,
            "render pass"
        );
        stats
    }

    /// Re-evaluates the current window, e.g. after the player moved.
    pub fn refresh(&mut self, ctx: &RenderContext<'_>, surface: &mut impl MapSurface) -> RenderStats {
        match self.window {
            Some(window) => self.render(ctx, window, surface),
            None => RenderStats::default(),
        }
    }

    /// Restyles one cell if it is on screen.
    pub fn redraw(&mut self, ctx: &RenderContext<'_>, cell: GridCell, surface: &mut impl MapSurface) {
        let Some(state) = self.cells.get_mut(&cell) else {
            return;
        };
        let style = ctx.style_for(cell);
        if state.style() != style {
            state.token = style.token;
            state.interactable = style.interactable;
            surface.update_cell(state.handle, style);
        }
    }

    /// Removes every drawn cell from the surface.
    pub fn clear(&mut self, surface: &mut impl MapSurface) {
        for (_, state) in self.cells.drain() {
            surface.remove_cell(state.handle);
        }
        self.window = None;
    }

    /// Drops all state without touching the surface, for when the surface
    /// itself was thrown away (a fresh browser page).
    pub fn forget(&mut self) {
        self.cells.clear();
        self.window = None;
    }
}

fn clamp_window(window: CellRange) -> CellRange {
    let max_width = 2 * MAX_WINDOW_HALF_EXTENT;
    let clamp_axis = |lo: i32, hi: i32| -> (i32, i32) {
        if i64::from(hi) - i64::from(lo) <= i64::from(max_width) {
            return (lo, hi);
        }
        let mid = ((i64::from(lo) + i64::from(hi)) / 2) as i32;
        (
            mid.saturating_sub(MAX_WINDOW_HALF_EXTENT),
            mid.saturating_add(MAX_WINDOW_HALF_EXTENT),
        )
    };
    let (min_i, max_i) = clamp_axis(window.min.i, window.max.i);
    let (min_j, max_j) = clamp_axis(window.min.j, window.max.j);
    CellRange {
        min: GridCell::new(min_i, min_j),
        max: GridCell::new(max_i, max_j),
    }
}
