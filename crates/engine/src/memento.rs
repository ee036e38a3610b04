//! Record of cells whose token differs from the deterministic default.

use std::collections::BTreeMap;

use worldofbits_protocol::{GridCell, Token};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifiedCells {
    cells: BTreeMap<GridCell, Option<Token>>,
}

impl ModifiedCells {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the cell was never modified; `Some(None)` when it was
    /// emptied.
    pub fn get(&self, cell: GridCell) -> Option<Option<Token>> {
        self.cells.get(&cell).copied()
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Stores `value` for `cell`. A value equal to the cell's default drops
    /// the record, so the store only ever holds divergent cells.
    pub fn record(&mut self, cell: GridCell, value: Option<Token>, default: Option<Token>) {
        if value == default {
            self.cells.remove(&cell);
        } else {
            self.cells.insert(cell, value);
        }
    }

    /// Current token of `cell`: the record if there is one, otherwise `default`.
    pub fn resolve(&self, cell: GridCell, default: impl FnOnce() -> Option<Token>) -> Option<Token> {
        match self.cells.get(&cell) {
            Some(value) => *value,
            None => default(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (GridCell, Option<Token>)> + '_ {
        self.cells.iter().map(|(cell, value)| (*cell, *value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

impl FromIterator<(GridCell, Option<Token>)> for ModifiedCells {
    fn from_iter<T: IntoIterator<Item = (GridCell, Option<Token>)>>(iter: T) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}
