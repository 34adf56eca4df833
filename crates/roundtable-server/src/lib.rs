//! The entry layer: REST endpoints, WebSocket upgrade, and wiring.
//!
//! Thin by design — handlers validate input, delegate to the store,
//! engine, or hub, and translate the store's closed error set into
//! HTTP statuses. The realtime path hands the upgraded socket straight
//! to the hub crate's session loops.

pub mod config;
mod error;
mod extract;
mod routes;
mod validate;

pub use config::Config;
pub use error::ApiError;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use roundtable_engine::{Engine, RulesConfig};
use roundtable_hub::{spawn_hub, HubHandle, MoveRouter};
use roundtable_ratelimit::Limiter;
use roundtable_store::{GameStore, RoomStore, UserStore};
use roundtable_token::TokenService;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Request bodies above this size are rejected before decoding.
pub const MAX_BODY_BYTES: usize = 1 << 20;

/// Everything the handlers need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub users: UserStore,
    pub rooms: RoomStore,
    pub games: GameStore,
    pub tokens: TokenService,
    pub hub: HubHandle,
    pub move_router: Arc<MoveRouter>,
    pub limiter: Arc<dyn Limiter>,
}

impl AppState {
    /// Wires stores, engine, hub, and dispatch around one pool.
    /// Spawns the hub coordinator, so a runtime must be up.
    pub fn new(
        pool: PgPool,
        token_secret: Vec<u8>,
        limiter: Arc<dyn Limiter>,
    ) -> Self {
        let users = UserStore::new(pool.clone());
        let rooms = RoomStore::new(pool.clone());
        let games = GameStore::new(pool);
        let tokens = TokenService::new(token_secret);
        let hub = spawn_hub();
        let engine = Engine::new(games.clone(), RulesConfig::classic());
        let move_router = Arc::new(MoveRouter::new(
            hub.clone(),
            rooms.clone(),
            games.clone(),
            engine,
            Arc::clone(&limiter),
        ));

        Self {
            users,
            rooms,
            games,
            tokens,
            hub,
            move_router,
            limiter,
        }
    }
}

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    let rate_limited = middleware::from_fn_with_state(
        state.clone(),
        extract::rate_limit_by_ip,
    );

    // Bursty, unauthenticated-or-cheap mutations sit behind the
    // per-IP limiter; everything else is open or token-gated only.
    let limited = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/rooms", post(routes::rooms::create_room))
        .route("/rooms/{code}/join", post(routes::rooms::join_room))
        .route_layer(rate_limited);

    let open = Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/users/me", get(routes::auth::me))
        .route("/rooms/{code}", get(routes::rooms::get_room))
        .route("/rooms/{code}/games", post(routes::games::create_game))
        .route("/ws/rooms/{code}", get(routes::ws::room_ws));

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .merge(limited)
        .merge(open)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
