use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState, AuthenticatedWallet};
use crate::{
    engine::amount_from_f64,
    errors::BidRejection,
    types::{parse_wallet, AuctionDraft, LedgerAuctionId, LedgerBid, LedgerBidders, MirrorBid},
    Error,
};

type ApiResult<T> = std::result::Result<T, ApiError>;

const IDEMPOTENCY_HEADER: &str = "idempotency-key";

#[derive(Debug, Deserialize)]
pub(super) struct LimitQuery {
    limit: Option<usize>,
}

/// Bid amount as sent by clients: a JSON number or a decimal string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BidAmount {
    Number(f64),
    Text(String),
}

impl BidAmount {
    fn to_decimal(&self) -> Result<Decimal, BidRejection> {
        match self {
            BidAmount::Number(n) => amount_from_f64(*n),
            BidAmount::Text(s) => Decimal::from_str(s.trim()).map_err(|_| BidRejection::InvalidAmount),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PlaceBidRequest {
    amount: BidAmount,
    #[serde(default)]
    idempotency_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct BidderListRequest {
    #[serde(default)]
    bidders: Option<Vec<LedgerBid>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SocialIdRequest {
    social_id: String,
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError(Error::InvalidRequest(e.to_string())))
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(super) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.engine.metrics().to_prometheus_text(),
    )
}

pub(super) async fn register_auction(
    State(state): State<AppState>,
    AuthenticatedWallet(host): AuthenticatedWallet,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let draft: AuctionDraft = parse_json(&body)?;
    let auction = state.engine.register_auction(host, draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "auction": auction })),
    ))
}

pub(super) async fn top_running(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Value>> {
    let auctions = state.engine.top_running(query.limit).await?;
    Ok(Json(json!({ "success": true, "auctions": auctions })))
}

pub(super) async fn auction_detail(
    State(state): State<AppState>,
    Path(ledger_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let auction = state
        .engine
        .auction_detail(&LedgerAuctionId::new(ledger_id))
        .await?;
    Ok(Json(json!({ "success": true, "auction": auction })))
}

pub(super) async fn place_bid(
    State(state): State<AppState>,
    AuthenticatedWallet(bidder): AuthenticatedWallet,
    Path(ledger_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: PlaceBidRequest = parse_json(&body)?;
    let amount = request.amount.to_decimal().map_err(Error::from)?;
    let idempotency_key = request.idempotency_key.or_else(|| {
        headers
            .get(IDEMPOTENCY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let record = state
        .engine
        .place_bid(MirrorBid {
            auction: LedgerAuctionId::new(ledger_id),
            bidder,
            amount,
            idempotency_key,
        })
        .await?;
    let status = if record.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(json!({ "success": true, "bid": record }))))
}

pub(super) async fn end_auction(
    State(state): State<AppState>,
    AuthenticatedWallet(caller): AuthenticatedWallet,
    Path(ledger_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let id = LedgerAuctionId::new(ledger_id);
    let request: BidderListRequest = if body.is_empty() {
        BidderListRequest::default()
    } else {
        parse_json(&body)?
    };
    let supplied = request
        .bidders
        .map(|entries| LedgerBidders::host_reported(id.clone(), entries));

    let result = state.engine.settle(caller, &id, supplied).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Auction ended successfully",
        "settlement": result,
    })))
}

pub(super) async fn bidder_board(
    State(state): State<AppState>,
    Path(ledger_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: BidderListRequest = parse_json(&body)?;
    let list = LedgerBidders::host_reported(
        LedgerAuctionId::new(ledger_id),
        request.bidders.unwrap_or_default(),
    );
    let board = state.engine.bidder_board(&list).await?;
    Ok(Json(json!({ "success": true, "data": board })))
}

pub(super) async fn hosted_by(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> ApiResult<Json<Value>> {
    let wallet = parse_wallet(&wallet)?;
    let hosted = state.engine.hosted_by(&wallet).await?;
    Ok(Json(json!({
        "success": true,
        "total": hosted.total(),
        "auctions": hosted,
    })))
}

pub(super) async fn participated_by(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> ApiResult<Json<Value>> {
    let wallet = parse_wallet(&wallet)?;
    let auctions = state.engine.participated_by(&wallet).await?;
    Ok(Json(json!({ "success": true, "auctions": auctions })))
}

pub(super) async fn update_social_id(
    State(state): State<AppState>,
    AuthenticatedWallet(wallet): AuthenticatedWallet,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: SocialIdRequest = parse_json(&body)?;
    let user = state
        .engine
        .update_social_id(wallet, &request.social_id)
        .await?;
    Ok(Json(json!({ "success": true, "user": user })))
}

pub(super) async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Value>> {
    let entries = state.engine.leaderboard(query.limit).await?;
    Ok(Json(json!({ "success": true, "leaderboard": entries })))
}
