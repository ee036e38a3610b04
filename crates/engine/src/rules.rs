use thiserror::Error;
use worldofbits_protocol::{GridCell, Token};

use crate::config::GameConfig;
use crate::grid::chebyshev_distance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Noop,
    Pickup,
    Place,
    Craft,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Noop => "noop",
            Action::Pickup => "pickup",
            Action::Place => "place",
            Action::Craft => "craft",
        }
    }
}

/// Result of a successful interaction: the new held token and cell token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interaction {
    pub action: Action,
    pub held: Option<Token>,
    pub cell: Option<Token>,
    /// Held token reached the win threshold. Advisory only.
    pub won: bool,
}

impl Interaction {
    pub fn mutates(&self) -> bool {
        self.action != Action::Noop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InteractionError {
    #[error("cell {cell} is {distance} cells away; reach is {radius}")]
    OutOfRange {
        cell: GridCell,
        distance: u32,
        radius: u32,
    },
    #[error("cannot combine {held} with {cell}; values must match")]
    Mismatch { held: Token, cell: Token },
    #[error("combining two {0} tokens would overflow")]
    Overflow(Token),
}

/// Applies the pickup / place / craft table to a click on `cell`.
pub fn interact(
    config: &GameConfig,
    player_cell: GridCell,
    cell: GridCell,
    held: Option<Token>,
    cell_token: Option<Token>,
) -> Result<Interaction, InteractionError> {
    let distance = chebyshev_distance(player_cell, cell);
    if distance > config.interaction_radius {
        return Err(InteractionError::OutOfRange {
            cell,
            distance,
            radius: config.interaction_radius,
        });
    }

    let (action, held, cell_token) = match (held, cell_token) {
        (None, None) => (Action::Noop, None, None),
        (None, Some(v)) => (Action::Pickup, Some(v), None),
        (Some(h), None) => (Action::Place, None, Some(h)),
        (Some(h), Some(v)) if h == v => {
            let doubled = h.checked_mul(2).ok_or(InteractionError::Overflow(h))?;
            (Action::Craft, Some(doubled), None)
        }
        (Some(h), Some(v)) => return Err(InteractionError::Mismatch { held: h, cell: v }),
    };

    Ok(Interaction {
        action,
        held,
        cell: cell_token,
        won: has_won(config, held),
    })
}

pub fn has_won(config: &GameConfig, held: Option<Token>) -> bool {
    held.is_some_and(|v| v >= config.win_threshold)
}
