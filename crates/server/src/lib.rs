use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};
use worldofbits_engine::{grid, GameConfig, GameSession, LoadOutcome, SqliteStore};
use worldofbits_protocol::{
    Direction, GridCell, LatLngBounds, MovementMode, PositionErrorCode, PositionSample, UiUpdate,
};

pub mod game_loop;
mod page;

pub use game_loop::{spawn_game_loop, GameEvent, GameHandle, GameLoopClosed};

#[derive(Clone)]
pub struct AppState {
    pub game: GameHandle,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/state", get(api_state))
        .route("/api/status", get(api_status))
        .route("/api/viewport", post(api_viewport))
        .route("/api/click", post(api_click))
        .route("/api/step", post(api_step))
        .route("/api/position", post(api_position))
        .route("/api/position/error", post(api_position_error))
        .route("/api/mode", post(api_mode))
        .route("/api/new-game", post(api_new_game))
        .with_state(Arc::new(state))
        .layer(
            ServiceBuilder::new()
                // The saved game belongs to whoever runs the server: only this
                // machine and the player's own tailnet devices may play it.
                .layer(middleware::from_fn(ip_allowlist))
                // Pages served from other origins must not be able to click
                // cells or wipe the save through the player's browser.
                .layer(local_only_cors())
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                )),
        )
}

async fn health() -> &'static str {
    "ok"
}

async fn index() -> Html<&'static str> {
    Html(page::INDEX_HTML)
}

async fn send(state: &AppState, event: GameEvent) -> ApiResult<UiUpdate> {
    state
        .game
        .send(event)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StateQuery {
    #[serde(default)]
    pub movement: Option<String>,
}

/// Called once per page load: the client's map is empty, so the session
/// forgets what it drew and restarts the requested movement strategy.
pub(crate) async fn api_state(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StateQuery>,
) -> ApiResult<UiUpdate> {
    let mode = MovementMode::from_query(query.movement.as_deref());
    send(&state, GameEvent::Attach(mode)).await
}

pub(crate) async fn api_status(State(state): State<Arc<AppState>>) -> ApiResult<UiUpdate> {
    send(&state, GameEvent::Status).await
}

pub(crate) async fn api_viewport(
    State(state): State<Arc<AppState>>,
    Json(bounds): Json<LatLngBounds>,
) -> ApiResult<UiUpdate> {
    // Longitude may run past the antimeridian while panning; latitude may not.
    let valid = [bounds.south_west, bounds.north_east]
        .iter()
        .all(|p| p.lng.is_finite() && p.lat.is_finite() && (-90.0..=90.0).contains(&p.lat));
    if !valid {
        return Err((
            StatusCode::BAD_REQUEST,
            "viewport bounds must be finite with latitude in [-90, 90]".to_string(),
        ));
    }
    send(&state, GameEvent::Viewport(bounds)).await
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClickInput {
    pub cell: GridCell,
}

pub(crate) async fn api_click(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ClickInput>,
) -> ApiResult<UiUpdate> {
    send(&state, GameEvent::Click(input.cell)).await
}

#[derive(Debug, Deserialize)]
pub(crate) struct StepInput {
    pub direction: Direction,
}

pub(crate) async fn api_step(
    State(state): State<Arc<AppState>>,
    Json(input): Json<StepInput>,
) -> ApiResult<UiUpdate> {
    send(&state, GameEvent::Step(input.direction)).await
}

pub(crate) async fn api_position(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<PositionSample>,
) -> ApiResult<UiUpdate> {
    if !grid::on_map(sample.lat_lng) {
        return Err((StatusCode::BAD_REQUEST, "position is off the map".to_string()));
    }
    send(&state, GameEvent::Position(sample)).await
}

#[derive(Debug, Deserialize)]
pub(crate) struct PositionErrorInput {
    pub code: PositionErrorCode,
    pub watch: u64,
}

pub(crate) async fn api_position_error(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PositionErrorInput>,
) -> ApiResult<UiUpdate> {
    send(
        &state,
        GameEvent::PositionError {
            code: input.code,
            watch: input.watch,
        },
    )
    .await
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModeInput {
    pub mode: MovementMode,
}

pub(crate) async fn api_mode(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ModeInput>,
) -> ApiResult<UiUpdate> {
    send(&state, GameEvent::SetMode(input.mode)).await
}

pub(crate) async fn api_new_game(State(state): State<Arc<AppState>>) -> ApiResult<UiUpdate> {
    send(&state, GameEvent::NewGame).await
}

/// Reads a YAML game config. Missing fields keep their defaults.
pub fn load_game_config(path: &Path) -> anyhow::Result<GameConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let config: GameConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("parse config: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(config)
}

/// Builds the session over `db_path`, restores any saved game and starts the
/// game loop.
pub fn start_game(config: GameConfig, db_path: PathBuf) -> anyhow::Result<GameHandle> {
    let store = SqliteStore::new(db_path);
    // Fail fast if sqlite is unavailable.
    store.open()?;
    let mut session = GameSession::new(config, store).context("invalid game config")?;
    match session.load() {
        LoadOutcome::Fresh => {}
        LoadOutcome::Restored(state) => info!(
            modified = state.modified_cell_states.len(),
            "resuming saved game"
        ),
        LoadOutcome::Corrupt(reason) => warn!(%reason, "saved game discarded"),
    }
    Ok(spawn_game_loop(session))
}

pub async fn serve(addr: SocketAddr, config: GameConfig, db_path: PathBuf) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    serve_listener(listener, config, db_path, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
    })
    .await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    config: GameConfig,
    db_path: PathBuf,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let state = AppState {
        game: start_game(config, db_path)?,
    };
    let app = build_router(state);
    let addr = listener.local_addr()?;
    info!(%addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(addr)
}

async fn ip_allowlist(
    axum::extract::ConnectInfo(peer): axum::extract::ConnectInfo<SocketAddr>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let ip = peer.ip();
    if is_allowed_peer_ip(ip) {
        return next.run(req).await;
    }
    warn!(%ip, "rejected peer");
    (StatusCode::FORBIDDEN, "forbidden").into_response()
}

fn is_allowed_peer_ip(ip: IpAddr) -> bool {
    if ip.is_loopback() {
        return true;
    }

    // 100.64.0.0/10: a phone on the same tailnet walks the map with its
    // real position.
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 100 && (64..=127).contains(&o[1])
        }
        IpAddr::V6(_v6) => false,
    }
}

fn local_only_cors() -> CorsLayer {
    use axum::http::Method;

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _req| {
            is_allowed_local_origin(origin)
        }))
}

fn is_allowed_local_origin(origin: &HeaderValue) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };
    is_http_origin_for_host(s, "localhost") || is_http_origin_for_host(s, "127.0.0.1")
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = origin.strip_prefix(scheme) {
            if let Some(after) = rest.strip_prefix(host) {
                // Nothing may follow the host except a port.
                return after.is_empty() || after.starts_with(':');
            }
        }
    }
    false
}

#[cfg(test)]
mod tests;
