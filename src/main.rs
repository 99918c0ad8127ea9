// region:    --- Imports
use crate::config::Config;
use crate::database::DatabaseManager;
use crate::feed::ChangeFeed;
use crate::handlers::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Modules
mod auth;
mod bidding;
mod config;
mod database;
mod feed;
mod handlers;
mod query;
mod sync;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // 설정 로드
    let config = Arc::new(Config::from_env()?);

    // DatabaseManager 생성
    let db_manager = Arc::new(DatabaseManager::new(&config.database_url).await?);

    // 스키마 준비 (INIT_DB=recreate 일 때만 기존 데이터 삭제)
    let init_result = if std::env::var("INIT_DB").as_deref() == Ok("recreate") {
        db_manager.initialize_database().await
    } else {
        db_manager.ensure_schema().await
    };
    if let Err(e) = init_result {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // 프로세스 내 변경 피드 생성 (외부 브로커 없음)
    let change_feed = Arc::new(ChangeFeed::new(256));

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        db_manager: Arc::clone(&db_manager),
        feed: Arc::clone(&change_feed),
        config: Arc::clone(&config),
    };

    // 라우터 설정
    let routes_all = Router::new()
        .route("/tables", get(handlers::handle_get_tables))
        .route(
            "/bids",
            get(handlers::handle_get_recent_bids).post(handlers::handle_bid),
        )
        .route("/bids/:table_id", get(handlers::handle_get_table_bids))
        .route("/updates", get(handlers::handle_get_updates))
        .route("/health", get(handlers::handle_health))
        .route("/login", post(handlers::handle_login))
        .route("/logout", post(handlers::handle_logout))
        .layer(cors)
        .with_state(state);

    // 리스너 생성
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행 (Ctrl-C 수신 시 정상 종료)
    if let Err(err) = axum::serve(listener, routes_all.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("{:<12} --> Server error: {}", "Main", err);
    }

    // 종료 시 스토리지 핸들 정리
    db_manager.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("{:<12} --> 종료 시그널 수신 실패: {:?}", "Main", e);
    }
}
// endregion: --- Main
