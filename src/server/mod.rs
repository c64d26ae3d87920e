//! HTTP surface.
//!
//! Authentication is delegated to the session gateway in front of the
//! service, which forwards the wallet it verified (see [`AuthenticatedWallet`]).

mod auth;
mod error;
mod handlers;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;
use uuid::Uuid;

pub use auth::AuthenticatedWallet;
pub use error::ApiError;

use crate::{config::ServerConfig, engine::AuctionEngine, logging::targets, prelude::*, Error};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AuctionEngine>,
}

impl AppState {
    pub fn new(engine: Arc<AuctionEngine>) -> Self {
        Self { engine }
    }
}

fn cors_layer(config: &ServerConfig) -> Result<CorsLayer> {
    if config.cors_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = config
        .cors_origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).map_err(|e| Error::Config(format!("invalid CORS origin '{o}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any))
}

pub fn router(state: AppState, config: &ServerConfig) -> Result<Router> {
    let api = Router::new()
        .route("/auctions", post(handlers::register_auction))
        .route("/auctions/top", get(handlers::top_running))
        .route("/auctions/:ledger_id", get(handlers::auction_detail))
        .route("/auctions/:ledger_id/bids", post(handlers::place_bid))
        .route("/auctions/:ledger_id/end", post(handlers::end_auction))
        .route("/auctions/:ledger_id/bidders", post(handlers::bidder_board))
        .route("/users/:wallet/auctions", get(handlers::hosted_by))
        .route("/users/:wallet/participated", get(handlers::participated_by))
        .route("/me/social-id", put(handlers::update_social_id))
        .route("/leaderboard", get(handlers::leaderboard));

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        info_span!(
            target: targets::SERVER,
            "request",
            id = %Uuid::new_v4(),
            method = %req.method(),
            path = %req.uri().path(),
        )
    });

    Ok(Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(config)?)
        .layer(trace)
        .with_state(state))
}
