// region:    --- Imports
use super::queries;
use crate::bidding::model::{Bid, Table};
use crate::database::DatabaseManager;
use sqlx::Error as SqlxError;
use tracing::info;

// endregion: --- Imports

// region:    --- Query Handlers

/// 활성 테이블 목록 조회
pub async fn list_active_tables(db_manager: &DatabaseManager) -> Result<Vec<Table>, SqlxError> {
    info!("{:<12} --> 활성 테이블 목록 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Table>(queries::GET_ACTIVE_TABLES)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 테이블 조회
pub async fn get_table(
    db_manager: &DatabaseManager,
    table_id: &str,
) -> Result<Option<Table>, SqlxError> {
    info!("{:<12} --> 테이블 조회 id: {}", "Query", table_id);
    let table_id = table_id.to_string();
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Table>(queries::GET_TABLE)
                    .bind(table_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 최근 입찰 원장 조회 (최신 순)
pub async fn recent_bids(db_manager: &DatabaseManager, limit: i64) -> Result<Vec<Bid>, SqlxError> {
    info!("{:<12} --> 최근 입찰 조회 limit: {}", "Query", limit);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Bid>(queries::GET_RECENT_BIDS)
                    .bind(limit)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 테이블 입찰 이력 조회 (최신 순)
pub async fn bids_for_table(
    db_manager: &DatabaseManager,
    table_id: &str,
    limit: i64,
) -> Result<Vec<Bid>, SqlxError> {
    info!("{:<12} --> 테이블 입찰 이력 조회 id: {}", "Query", table_id);
    let table_id = table_id.to_string();
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Bid>(queries::GET_TABLE_BIDS)
                    .bind(table_id)
                    .bind(limit)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

// endregion: --- Query Handlers
