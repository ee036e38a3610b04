//! The single task that owns the game session.
//!
//! HTTP handlers never touch the session directly; they send a [`GameEvent`]
//! down a channel and wait for the [`UiUpdate`]. Events are handled one at a
//! time, in arrival order, each to completion.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use worldofbits_engine::{GameSession, KeyValueStore};
use worldofbits_protocol::{
    Direction, GridCell, LatLngBounds, MovementMode, PositionErrorCode, PositionSample, UiUpdate,
};

const QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Attach(MovementMode),
    Viewport(LatLngBounds),
    Click(GridCell),
    Step(Direction),
    Position(PositionSample),
    PositionError { code: PositionErrorCode, watch: u64 },
    SetMode(MovementMode),
    NewGame,
    Status,
}

impl GameEvent {
    fn name(&self) -> &'static str {
        match self {
            GameEvent::Attach(_) => "attach",
            GameEvent::Viewport(_) => "viewport",
            GameEvent::Click(_) => "click",
            GameEvent::Step(_) => "step",
            GameEvent::Position(_) => "position",
            GameEvent::PositionError { .. } => "position_error",
            GameEvent::SetMode(_) => "set_mode",
            GameEvent::NewGame => "new_game",
            GameEvent::Status => "status",
        }
    }
}

struct Envelope {
    event: GameEvent,
    reply: oneshot::Sender<UiUpdate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("game loop is not running")]
pub struct GameLoopClosed;

#[derive(Debug, Clone)]
pub struct GameHandle {
    tx: mpsc::Sender<Envelope>,
}

impl GameHandle {
    pub async fn send(&self, event: GameEvent) -> Result<UiUpdate, GameLoopClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { event, reply })
            .await
            .map_err(|_| GameLoopClosed)?;
        rx.await.map_err(|_| GameLoopClosed)
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope").field("event", &self.event).finish()
    }
}

/// Moves `session` onto its own task and returns a handle to feed it.
pub fn spawn_game_loop<S>(mut session: GameSession<S>) -> GameHandle
where
    S: KeyValueStore + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Envelope>(QUEUE_DEPTH);
    tokio::spawn(async move {
        while let Some(Envelope { event, reply }) = rx.recv().await {
            let name = event.name();
            let update = dispatch(&mut session, event);
            debug!(event = name, outcome = %update.event, "handled");
            // The caller may have gone away; the state change stands regardless.
            let _ = reply.send(update);
        }
        info!("game loop stopped");
    });
    GameHandle { tx }
}

fn dispatch<S: KeyValueStore>(session: &mut GameSession<S>, event: GameEvent) -> UiUpdate {
    match event {
        GameEvent::Attach(mode) => session.attach(mode),
        GameEvent::Viewport(bounds) => session.viewport_changed(bounds),
        GameEvent::Click(cell) => session.click(cell),
        GameEvent::Step(direction) => session.step(direction),
        GameEvent::Position(sample) => session.position_sample(sample),
        GameEvent::PositionError { code, watch } => session.position_error(code, watch),
        GameEvent::SetMode(mode) => session.set_mode(mode),
        GameEvent::NewGame => session.new_game(),
        GameEvent::Status => UiUpdate::new("status", session.status()),
    }
}
