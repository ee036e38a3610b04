use super::*;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use tower::ServiceExt;
use worldofbits_engine::MemoryStore;
use worldofbits_protocol::{ClientDirective, LatLng, MapCommand};

fn temp_db() -> PathBuf {
    std::env::temp_dir().join(format!(
        "worldofbits-server-test-{}.db",
        time::OffsetDateTime::now_utc().unix_timestamp_nanos()
    ))
}

/// Every cell spawns a 1; the player starts inside cell (0, 0).
fn ones_config() -> GameConfig {
    GameConfig {
        origin: LatLng::new(0.0, 0.0),
        start_position: LatLng::new(0.00005, 0.00005),
        spawn_probability: 1.0,
        base_values: vec![1],
        ..GameConfig::default()
    }
}

fn app_state(config: GameConfig, db: PathBuf) -> Arc<AppState> {
    Arc::new(AppState {
        game: start_game(config, db).unwrap(),
    })
}

fn click(cell: (i32, i32)) -> Json<ClickInput> {
    Json(ClickInput {
        cell: GridCell::new(cell.0, cell.1),
    })
}

#[tokio::test]
async fn click_pickup_and_craft_survive_restart() {
    let db = temp_db();
    let state = app_state(ones_config(), db.clone());

    let attach = api_state(
        State(state.clone()),
        Query(StateQuery {
            movement: Some("buttons".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(attach.0.event, "session.attach");
    assert_eq!(attach.0.directives, vec![ClientDirective::ShowMovementButtons]);

    let up = api_click(State(state.clone()), click((0, 0))).await.unwrap();
    assert_eq!(up.0.event, "cell.pickup");
    assert_eq!(up.0.status.held_token, Some(1));

    let up = api_click(State(state.clone()), click((0, 1))).await.unwrap();
    assert_eq!(up.0.event, "cell.craft");
    assert_eq!(up.0.status.held_token, Some(2));
    assert_eq!(up.0.status.modified_cells, 2);

    // A second server over the same database resumes the game.
    let resumed = app_state(ones_config(), db);
    let status = api_status(State(resumed)).await.unwrap();
    assert_eq!(status.0.status.held_token, Some(2));
    assert_eq!(status.0.status.modified_cells, 2);
}

#[tokio::test]
async fn out_of_reach_click_reports_error() {
    let state = app_state(ones_config(), temp_db());
    let up = api_click(State(state.clone()), click((40, 0))).await.unwrap();
    assert_eq!(up.0.event, "cell.rejected");
    assert!(up.0.message.is_some());
    assert_eq!(up.0.status.held_token, None);
    assert_eq!(up.0.status.modified_cells, 0);
}

#[tokio::test]
async fn viewport_draws_cells_and_rejects_nan() {
    let state = app_state(ones_config(), temp_db());
    let bounds = LatLngBounds {
        south_west: LatLng::new(-0.0001, -0.0001),
        north_east: LatLng::new(0.0002, 0.0002),
    };
    let up = api_viewport(State(state.clone()), Json(bounds)).await.unwrap();
    let drawn = up
        .0
        .commands
        .iter()
        .filter(|c| matches!(c, MapCommand::DrawCell { .. }))
        .count();
    // -1..=2 on each axis plus one cell of margin.
    assert_eq!(drawn, 36);

    let bad = LatLngBounds {
        south_west: LatLng::new(f64::NAN, 0.0),
        ..bounds
    };
    let err = api_viewport(State(state.clone()), Json(bad)).await.unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);

    let past_pole = LatLngBounds {
        north_east: LatLng::new(91.0, 0.0002),
        ..bounds
    };
    let err = api_viewport(State(state), Json(past_pole)).await.unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn far_viewport_keeps_game_loop_alive() {
    let state = app_state(ones_config(), temp_db());
    let far = LatLngBounds {
        south_west: LatLng::new(0.0, 1e9),
        north_east: LatLng::new(0.001, 1e9),
    };
    let up = api_viewport(State(state.clone()), Json(far)).await.unwrap();
    assert_eq!(up.0.event, "viewport.changed");

    let status = api_status(State(state)).await.unwrap();
    assert_eq!(status.0.status.cell, GridCell::new(0, 0));
}

#[tokio::test]
async fn off_map_position_is_rejected_and_save_survives() {
    let db = temp_db();
    let state = app_state(ones_config(), db.clone());
    api_state(
        State(state.clone()),
        Query(StateQuery {
            movement: Some("geolocation".to_string()),
        }),
    )
    .await
    .unwrap();
    api_click(State(state.clone()), click((0, 0))).await.unwrap();

    let sample = PositionSample {
        lat_lng: LatLng::new(95.0, 0.0),
        accuracy: 4.0,
        watch: 1,
    };
    let err = api_position(State(state), Json(sample)).await.unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);

    let resumed = app_state(ones_config(), db);
    let status = api_status(State(resumed)).await.unwrap();
    assert_eq!(status.0.status.held_token, Some(1));
    assert_eq!(status.0.status.position, ones_config().start_position);
}

#[tokio::test]
async fn mode_switch_and_stale_geolocation() {
    let state = app_state(ones_config(), temp_db());
    let up = api_state(
        State(state.clone()),
        Query(StateQuery {
            movement: Some("geolocation".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        up.0.directives,
        vec![ClientDirective::StartGeolocationWatch { watch: 1 }]
    );

    let up = api_mode(
        State(state.clone()),
        Json(ModeInput {
            mode: MovementMode::Buttons,
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        up.0.directives,
        vec![
            ClientDirective::StopGeolocationWatch,
            ClientDirective::ShowMovementButtons,
        ]
    );

    let sample = PositionSample {
        lat_lng: LatLng::new(1.0, 1.0),
        accuracy: 4.0,
        watch: 1,
    };
    let up = api_position(State(state.clone()), Json(sample)).await.unwrap();
    assert_eq!(up.0.event, "player.ignored");
    assert_eq!(up.0.status.position, ones_config().start_position);

    let up = api_step(
        State(state),
        Json(StepInput {
            direction: Direction::East,
        }),
    )
    .await
    .unwrap();
    assert_eq!(up.0.event, "player.moved");
    assert_eq!(up.0.status.cell, GridCell::new(1, 0));
}

#[tokio::test]
async fn permission_denied_falls_back_to_buttons() {
    let state = app_state(ones_config(), temp_db());
    api_state(
        State(state.clone()),
        Query(StateQuery {
            movement: Some("geolocation".to_string()),
        }),
    )
    .await
    .unwrap();
    let up = api_position_error(
        State(state),
        Json(PositionErrorInput {
            code: PositionErrorCode::PermissionDenied,
            watch: 1,
        }),
    )
    .await
    .unwrap();
    assert_eq!(up.0.status.movement, MovementMode::Buttons);
    assert!(up.0.message.is_some());
}

#[tokio::test]
async fn new_game_wipes_progress() {
    let state = app_state(ones_config(), temp_db());
    api_click(State(state.clone()), click((0, 0))).await.unwrap();
    let up = api_new_game(State(state.clone())).await.unwrap();
    assert_eq!(up.0.event, "game.reset");
    assert_eq!(up.0.status.held_token, None);
    assert_eq!(up.0.status.modified_cells, 0);
}

#[tokio::test]
async fn game_loop_serializes_events() {
    let session = GameSession::new(ones_config(), MemoryStore::new()).unwrap();
    let handle = spawn_game_loop(session);

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let h = handle.clone();
        tasks.push(tokio::spawn(async move {
            h.send(GameEvent::Step(Direction::North)).await.unwrap()
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }
    let status = handle.send(GameEvent::Status).await.unwrap();
    // Default movement is idle until a client attaches: steps are dropped.
    assert_eq!(status.status.cell, GridCell::new(0, 0));

    handle
        .send(GameEvent::Attach(MovementMode::Buttons))
        .await
        .unwrap();
    for _ in 0..10 {
        handle.send(GameEvent::Step(Direction::North)).await.unwrap();
    }
    let status = handle.send(GameEvent::Status).await.unwrap();
    assert_eq!(status.status.cell, GridCell::new(0, 10));
}

#[tokio::test]
async fn router_serves_page_and_blocks_strangers() {
    let app = build_router(AppState {
        game: spawn_game_loop(GameSession::new(ones_config(), MemoryStore::new()).unwrap()),
    });

    let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5555))));
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );

    let mut req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([8, 8, 8, 8], 5555))));
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn router_click_round_trip() {
    let app = build_router(AppState {
        game: spawn_game_loop(GameSession::new(ones_config(), MemoryStore::new()).unwrap()),
    });
    let mut req = Request::builder()
        .method("POST")
        .uri("/api/click")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"cell":"0,0"}"#))
        .unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5555))));
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let update: UiUpdate = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(update.status.held_token, Some(1));

    let mut req = Request::builder()
        .method("POST")
        .uri("/api/click")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"cell":"zero"}"#))
        .unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5555))));
    let res = app.oneshot(req).await.unwrap();
    assert!(res.status().is_client_error());
}

#[test]
fn yaml_config_overrides_defaults() {
    let path = temp_db().with_extension("yaml");
    std::fs::write(&path, "win_threshold: 64\ninteraction_radius: 5\n").unwrap();
    let config = load_game_config(&path).unwrap();
    assert_eq!(config.win_threshold, 64);
    assert_eq!(config.interaction_radius, 5);
    assert_eq!(config.base_values, GameConfig::default().base_values);

    std::fs::write(&path, "spawn_probability: 2.0\n").unwrap();
    assert!(load_game_config(&path).is_err());
}

#[test]
fn peer_allowlist() {
    assert!(is_allowed_peer_ip("127.0.0.1".parse().unwrap()));
    assert!(is_allowed_peer_ip("::1".parse().unwrap()));
    assert!(is_allowed_peer_ip("100.64.0.1".parse().unwrap()));
    assert!(is_allowed_peer_ip("100.127.255.255".parse().unwrap()));
    assert!(!is_allowed_peer_ip("100.128.0.1".parse().unwrap()));
    assert!(!is_allowed_peer_ip("192.168.1.10".parse().unwrap()));
}

#[test]
fn cors_origins_are_local_only() {
    let ok = |s: &'static str| is_allowed_local_origin(&HeaderValue::from_static(s));
    assert!(ok("http://localhost"));
    assert!(ok("http://localhost:39334"));
    assert!(ok("https://127.0.0.1:8080"));
    assert!(!ok("http://localhost.evil.com"));
    assert!(!ok("https://example.com"));
    assert!(!ok("null"));
}
