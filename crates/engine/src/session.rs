//! The game session: one explicit context object owning all mutable state.
//!
//! Every input event maps to one method. Each method runs to completion,
//! persists if it changed anything, and returns the [`UiUpdate`] the client
//! should apply.

use tracing::{debug, info, warn};
use worldofbits_protocol::{
    ClientDirective, Direction, GridCell, LatLng, LatLngBounds, Message, MovementMode,
    PersistedState, PositionErrorCode, PositionSample, StatusSnapshot, Token, UiUpdate,
};

use crate::cells::{CellStore, MapSurface, RecordingSurface, RenderContext};
use crate::config::{ConfigError, GameConfig};
use crate::grid;
use crate::memento::ModifiedCells;
use crate::movement::{Ignored, MovementController, SampleOutcome};
use crate::persistence::{self, KeyValueStore, LoadOutcome};
use crate::rules::{self, Action};
use crate::spawn::spawn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub position: LatLng,
    pub held: Option<Token>,
}

pub struct GameSession<S: KeyValueStore> {
    config: GameConfig,
    player: PlayerState,
    modified: ModifiedCells,
    cells: CellStore,
    movement: MovementController,
    surface: RecordingSurface,
    storage: S,
    pending_message: Option<Message>,
}

impl<S: KeyValueStore> GameSession<S> {
    /// A session with default state. Call [`GameSession::load`] to pick up a
    /// saved game.
    pub fn new(config: GameConfig, storage: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let player = PlayerState {
            position: config.start_position,
            held: None,
        };
        Ok(Self {
            config,
            player,
            modified: ModifiedCells::new(),
            cells: CellStore::new(),
            movement: MovementController::new(),
            surface: RecordingSurface::new(),
            storage,
            pending_message: None,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn player(&self) -> PlayerState {
        self.player
    }

    pub fn modified(&self) -> &ModifiedCells {
        &self.modified
    }

    pub fn cells(&self) -> &CellStore {
        &self.cells
    }

    pub fn movement(&self) -> &MovementController {
        &self.movement
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn player_cell(&self) -> GridCell {
        grid::to_cell(&self.config, self.player.position)
    }

    /// Current token of any cell, on screen or not.
    pub fn token_at(&self, cell: GridCell) -> Option<Token> {
        self.modified.resolve(cell, || spawn(&self.config, cell))
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            position: self.player.position,
            cell: self.player_cell(),
            held_token: self.player.held,
            movement: self.movement.mode(),
            won: rules::has_won(&self.config, self.player.held),
            modified_cells: self.modified.len(),
        }
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            player_lat_lng: self.player.position,
            held_token: self.player.held,
            modified_cell_states: self.modified.entries().collect(),
        }
    }

    /// Reads the saved game, once, at startup. A corrupt or unreadable save
    /// leaves the defaults in place; the reason is shown to the next client.
    pub fn load(&mut self) -> LoadOutcome {
        let outcome = match persistence::load(&mut self.storage, &self.config.storage_key) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "failed to read saved game");
                self.pending_message = Some(Message::warning(format!("Could not load saved game: {err}")));
                return LoadOutcome::Corrupt(err.to_string());
            }
        };
        match &outcome {
            LoadOutcome::Fresh => info!("no saved game; starting fresh"),
            LoadOutcome::Restored(state) => {
                self.apply(state);
                info!(
                    held = ?self.player.held,
                    modified = self.modified.len(),
                    "saved game restored"
                );
            }
            LoadOutcome::Corrupt(reason) => {
                self.pending_message = Some(Message::warning(format!(
                    "Saved game was unreadable and has been discarded ({reason})."
                )));
            }
        }
        outcome
    }

    fn apply(&mut self, state: &PersistedState) {
        self.player = PlayerState {
            position: state.player_lat_lng,
            held: state.held_token,
        };
        self.modified.clear();
        for &(cell, value) in &state.modified_cell_states {
            let default = spawn(&self.config, cell);
            self.modified.record(cell, value, default);
        }
    }

    /// A client (re)connected with an empty map. Everything previously drawn
    /// is forgotten and the requested movement strategy is started.
    pub fn attach(&mut self, mode: MovementMode) -> UiUpdate {
        self.cells.forget();
        let directives = self.movement.switch_to(mode);
        let pos = self.player.position;
        self.surface.move_player_marker(pos);
        self.surface.pan_to(pos);
        let message = self.pending_message.take();
        self.update("session.attach", directives, message)
    }

    pub fn viewport_changed(&mut self, bounds: LatLngBounds) -> UiUpdate {
        let window = grid::visible_range(&self.config, bounds, self.config.view_margin_cells);
        let (ctx, cells, surface) = self.render_parts();
        cells.render(&ctx, window, surface);
        self.update("viewport.changed", Vec::new(), None)
    }

    pub fn click(&mut self, cell: GridCell) -> UiUpdate {
        let default = spawn(&self.config, cell);
        let current = self.modified.resolve(cell, || default);
        let result = rules::interact(
            &self.config,
            self.player_cell(),
            cell,
            self.player.held,
            current,
        );
        let interaction = match result {
            Ok(interaction) => interaction,
            Err(err) => {
                debug!(%cell, error = %err, "interaction rejected");
                return self.update("cell.rejected", Vec::new(), Some(Message::error(err.to_string())));
            }
        };

        let mut message = None;
        if interaction.mutates() {
            self.player.held = interaction.held;
            self.modified.record(cell, interaction.cell, default);
            let (ctx, cells, surface) = self.render_parts();
            cells.redraw(&ctx, cell, surface);
            message = self.persist();
            info!(
                %cell,
                action = interaction.action.as_str(),
                held = ?self.player.held,
                cell_token = ?interaction.cell,
                "interaction"
            );
        }
        if interaction.won && matches!(interaction.action, Action::Pickup | Action::Craft) {
            if let Some(held) = self.player.held {
                let win = format!("You are holding a {held}. You win!");
                // A failed save stays visible next to the win.
                message = Some(match message {
                    Some(warning) => Message::warning(format!("{win} {}", warning.text)),
                    None => Message::info(win),
                });
            }
        }
        let event = format!("cell.{}", interaction.action.as_str());
        self.update(event, Vec::new(), message)
    }

    pub fn step(&mut self, direction: Direction) -> UiUpdate {
        match self
            .movement
            .on_step(self.player.position, direction, self.config.step_degrees)
        {
            Some(pos) => {
                let message = self.relocate(pos);
                self.update("player.moved", Vec::new(), message)
            }
            None => {
                debug!(?direction, "step ignored; buttons are not active");
                self.update("player.ignored", Vec::new(), None)
            }
        }
    }

    pub fn position_sample(&mut self, sample: PositionSample) -> UiUpdate {
        if !grid::on_map(sample.lat_lng) {
            warn!(
                watch = sample.watch,
                lat = sample.lat_lng.lat,
                lng = sample.lat_lng.lng,
                "position sample off the map"
            );
            let message = Message::warning("Ignored a location fix outside the map.");
            return self.update("player.ignored", Vec::new(), Some(message));
        }
        match self.movement.on_sample(sample, self.config.hysteresis_meters) {
            SampleOutcome::Accepted(pos) => {
                let message = self.relocate(pos);
                self.update("player.moved", Vec::new(), message)
            }
            SampleOutcome::Ignored(reason) => {
                if reason != Ignored::Jitter {
                    debug!(watch = sample.watch, ?reason, "position sample dropped");
                }
                self.update("player.ignored", Vec::new(), None)
            }
        }
    }

    pub fn position_error(&mut self, code: PositionErrorCode, watch: u64) -> UiUpdate {
        match self.movement.on_error(code, watch) {
            Some(outcome) => self.update(
                "position.error",
                outcome.directives,
                Some(Message::warning(outcome.message)),
            ),
            None => self.update("position.ignored", Vec::new(), None),
        }
    }

    /// Swaps the input method. Player and cell state are untouched.
    pub fn set_mode(&mut self, mode: MovementMode) -> UiUpdate {
        let directives = self.movement.switch_to(mode);
        self.update("movement.switched", directives, None)
    }

    /// Wipes the saved game and starts over at the start position.
    pub fn new_game(&mut self) -> UiUpdate {
        let mode = self.movement.mode();
        let directives = self.movement.switch_to(mode);
        let mut message = Some(Message::info("New game started."));
        if let Err(err) = persistence::reset(&mut self.storage, &self.config.storage_key) {
            warn!(error = %err, "failed to clear saved game");
            message = Some(Message::warning(format!("Could not clear saved game: {err}")));
        }

        self.player = PlayerState {
            position: self.config.start_position,
            held: None,
        };
        self.modified.clear();

        let window = self.cells.window();
        self.cells.clear(&mut self.surface);
        let pos = self.player.position;
        self.surface.move_player_marker(pos);
        self.surface.pan_to(pos);
        if let Some(window) = window {
            let (ctx, cells, surface) = self.render_parts();
            cells.render(&ctx, window, surface);
        }
        info!("new game");
        self.update("game.reset", directives, message)
    }

    fn relocate(&mut self, pos: LatLng) -> Option<Message> {
        let from = self.player_cell();
        self.player.position = pos;
        self.surface.move_player_marker(pos);
        self.surface.pan_to(pos);
        if self.player_cell() != from {
            let (ctx, cells, surface) = self.render_parts();
            cells.refresh(&ctx, surface);
        }
        debug!(lat = pos.lat, lng = pos.lng, cell = %self.player_cell(), "player moved");
        self.persist()
    }

    fn persist(&mut self) -> Option<Message> {
        let state = self.persisted_state();
        match persistence::save(&mut self.storage, &self.config.storage_key, &state) {
            Ok(()) => None,
            Err(err) => {
                warn!(error = %err, "failed to save game");
                Some(Message::warning(format!("Could not save game: {err}")))
            }
        }
    }

    fn render_parts(&mut self) -> (RenderContext<'_>, &mut CellStore, &mut RecordingSurface) {
        let player_cell = grid::to_cell(&self.config, self.player.position);
        (
            RenderContext {
                config: &self.config,
                modified: &self.modified,
                player_cell,
            },
            &mut self.cells,
            &mut self.surface,
        )
    }

    fn update(
        &mut self,
        event: impl Into<String>,
        directives: Vec<ClientDirective>,
        message: Option<Message>,
    ) -> UiUpdate {
        UiUpdate::new(event, self.status())
            .with_commands(self.surface.take_commands())
            .with_directives(directives)
            .with_message(message)
    }
}
