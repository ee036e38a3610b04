//! Mapping between geographic coordinates and grid cells.

use worldofbits_protocol::{GridCell, LatLng, LatLngBounds};

use crate::config::GameConfig;

pub fn to_cell(config: &GameConfig, pos: LatLng) -> GridCell {
    let i = ((pos.lng - config.origin.lng) / config.cell_degrees).floor();
    let j = ((pos.lat - config.origin.lat) / config.cell_degrees).floor();
    GridCell::new(i as i32, j as i32)
}

pub fn to_bounds(config: &GameConfig, cell: GridCell) -> LatLngBounds {
    let size = config.cell_degrees;
    LatLngBounds {
        south_west: LatLng {
            lat: config.origin.lat + f64::from(cell.j) * size,
            lng: config.origin.lng + f64::from(cell.i) * size,
        },
        north_east: LatLng {
            lat: config.origin.lat + (f64::from(cell.j) + 1.0) * size,
            lng: config.origin.lng + (f64::from(cell.i) + 1.0) * size,
        },
    }
}

/// Whether `pos` is a real coordinate: finite, latitude within the poles and
/// longitude within one turn of the antimeridian.
pub fn on_map(pos: LatLng) -> bool {
    pos.lat.is_finite()
        && pos.lng.is_finite()
        && (-90.0..=90.0).contains(&pos.lat)
        && (-180.0..=180.0).contains(&pos.lng)
}

pub fn center(config: &GameConfig, cell: GridCell) -> LatLng {
    to_bounds(config, cell).center()
}

pub fn chebyshev_distance(a: GridCell, b: GridCell) -> u32 {
    let di = (i64::from(a.i) - i64::from(b.i)).unsigned_abs();
    let dj = (i64::from(a.j) - i64::from(b.j)).unsigned_abs();
    u32::try_from(di.max(dj)).unwrap_or(u32::MAX)
}

/// Inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub min: GridCell,
    pub max: GridCell,
}

impl CellRange {
    pub fn contains(&self, cell: GridCell) -> bool {
        (self.min.i..=self.max.i).contains(&cell.i) && (self.min.j..=self.max.j).contains(&cell.j)
    }

    pub fn len(&self) -> usize {
        let w = (i64::from(self.max.i) - i64::from(self.min.i) + 1).max(0);
        let h = (i64::from(self.max.j) - i64::from(self.min.j) + 1).max(0);
        usize::try_from(w * h).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cells(&self) -> impl Iterator<Item = GridCell> {
        let (min, max) = (self.min, self.max);
        (min.i..=max.i).flat_map(move |i| (min.j..=max.j).map(move |j| GridCell::new(i, j)))
    }
}

/// Cells covering `bounds`, grown by `margin` cells on each side.
pub fn visible_range(config: &GameConfig, bounds: LatLngBounds, margin: u32) -> CellRange {
    let a = to_cell(config, bounds.south_west);
    let b = to_cell(config, bounds.north_east);
    let m = i32::try_from(margin).unwrap_or(i32::MAX);
    CellRange {
        min: GridCell::new(a.i.min(b.i).saturating_sub(m), a.j.min(b.j).saturating_sub(m)),
        max: GridCell::new(a.i.max(b.i).saturating_add(m), a.j.max(b.j).saturating_add(m)),
    }
}
