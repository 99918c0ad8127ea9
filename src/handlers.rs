// region:    --- Imports
use crate::auth;
use crate::bidding::commands::{handle_place_bid as command_place_bid, PlaceBidCommand};
use crate::bidding::rules::BidRejection;
use crate::config::Config;
use crate::database::DatabaseManager;
use crate::feed::ChangeFeed;
use crate::query;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// endregion: --- Imports

// region:    --- App State

#[derive(Clone)]
pub struct AppState {
    pub db_manager: Arc<DatabaseManager>,
    pub feed: Arc<ChangeFeed>,
    pub config: Arc<Config>,
}

// endregion: --- App State

// region:    --- Params

#[derive(Debug, Deserialize)]
pub struct BidsParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatesParams {
    pub since: Option<u64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// endregion: --- Params

// region:    --- Command Handlers

/// 입찰 요청 처리
pub async fn handle_bid(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(cmd): Json<PlaceBidCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

    // 세션 확인: 인증은 외부 협력자, 신원 매핑만 소비한다
    let identity = match auth::current_identity(&headers) {
        Some(identity) => identity,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(BidRejection::Unauthenticated {
                    error: "Authentication required".to_string(),
                }),
            )
                .into_response()
        }
    };

    match command_place_bid(
        &state.db_manager,
        &state.feed,
        &identity,
        cmd,
        state.config.minimum_increment,
    )
    .await
    {
        Ok(accepted) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "bid_id": accepted.bid_id,
                "table_id": accepted.table_id,
                "new_bid": accepted.new_bid,
                "previous_bid": accepted.previous_bid,
                "new_version": accepted.new_version,
                "username": accepted.username,
                "message": accepted.message,
                "timestamp": accepted.timestamp,
            })),
        )
            .into_response(),
        Err(rejection) => {
            let status = match rejection {
                BidRejection::StorageUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, Json(rejection)).into_response()
        }
    }
}

/// 로그인: 자격 증명 -> 세션 쿠키 발급
pub async fn handle_login(Json(req): Json<LoginRequest>) -> impl IntoResponse {
    match auth::authenticate(&req.username, &req.password) {
        Some(identity) => (
            StatusCode::OK,
            [(header::SET_COOKIE, auth::session_cookie(&identity.username))],
            Json(serde_json::json!({
                "success": true,
                "user": identity,
            })),
        )
            .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "Invalid username or password",
                "error_code": "UNAUTHENTICATED"
            })),
        )
            .into_response(),
    }
}

/// 로그아웃: 세션 쿠키 제거
pub async fn handle_logout() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, auth::clear_session_cookie())],
        Json(serde_json::json!({ "success": true })),
    )
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 활성 테이블 목록 조회
pub async fn handle_get_tables(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 테이블 목록 조회", "HandlerQuery");
    match query::handlers::list_active_tables(&state.db_manager).await {
        Ok(tables) => {
            let count = tables.len();
            Json(serde_json::json!({
                "tables": tables,
                "count": count,
                "timestamp": Utc::now(),
            }))
            .into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 최근 입찰 원장 조회
pub async fn handle_get_recent_bids(
    State(state): State<AppState>,
    Query(params): Query<BidsParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    info!("{:<12} --> 최근 입찰 조회 limit: {}", "HandlerQuery", limit);
    match query::handlers::recent_bids(&state.db_manager, limit).await {
        Ok(bids) => {
            let count = bids.len();
            Json(serde_json::json!({
                "bids": bids,
                "count": count,
                "timestamp": Utc::now(),
            }))
            .into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 테이블 입찰 이력 조회
pub async fn handle_get_table_bids(
    State(state): State<AppState>,
    Path(table_id): Path<String>,
    Query(params): Query<BidsParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(10).clamp(1, 200);
    info!(
        "{:<12} --> 테이블 입찰 이력 조회 id: {}",
        "HandlerQuery", table_id
    );
    match query::handlers::bids_for_table(&state.db_manager, &table_id, limit).await {
        Ok(bids) => Json(serde_json::json!({ "bids": bids })).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 변경 롱폴: since 이후 변경이 생기거나 타임아웃까지 대기
pub async fn handle_get_updates(
    State(state): State<AppState>,
    Query(params): Query<UpdatesParams>,
) -> impl IntoResponse {
    let since = params.since.unwrap_or(0);
    let max_timeout = state.config.long_poll_timeout;
    let timeout = params
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(max_timeout)
        .min(max_timeout);

    let (seq, events) = state.feed.wait_for_change(since, timeout).await;
    Json(serde_json::json!({
        "seq": seq,
        "events": events,
        "timestamp": Utc::now(),
    }))
}

/// 헬스 체크
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let database_reachable = state.db_manager.is_reachable().await;
    let status = if database_reachable {
        "healthy"
    } else {
        "unhealthy"
    };
    let code = if database_reachable {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        code,
        Json(serde_json::json!({
            "status": status,
            "database_reachable": database_reachable,
            "timestamp": Utc::now(),
        })),
    )
}

// endregion: --- Query Handlers
