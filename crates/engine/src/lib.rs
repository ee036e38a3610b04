//! Game core for World of Bits: a grid laid over the earth where cells hold
//! deterministically spawned tokens that the player picks up, places and
//! merges.

pub mod cells;
pub mod config;
pub mod grid;
pub mod memento;
pub mod movement;
pub mod persistence;
pub mod rules;
pub mod session;
pub mod spawn;

pub use cells::{CellState, CellStore, MapSurface, RecordingSurface, RenderContext};
pub use config::{ConfigError, GameConfig};
pub use memento::ModifiedCells;
pub use movement::MovementController;
pub use persistence::{KeyValueStore, LoadOutcome, MemoryStore, PersistenceError, SqliteStore};
pub use rules::{Action, Interaction, InteractionError};
pub use session::{GameSession, PlayerState};
