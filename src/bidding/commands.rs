/// 입찰 커맨드 처리
/// 테이블 행 잠금(FOR UPDATE)을 직렬화 지점으로 하는 단일 트랜잭션으로
/// 검증과 커밋(원장 추가 + 집계 갱신)을 함께 수행한다.
// region:    --- Imports
use crate::auth::Identity;
use crate::bidding::model::Table;
use crate::bidding::rules::{validate_bid, BidRejection};
use crate::database::DatabaseManager;
use crate::feed::ChangeFeed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Commands

/// 입찰 명령
/// expected_version은 항상 필수이다. 누락 시 INVALID_INPUT으로 거절한다.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub table_id: String,
    pub bid_amount: i64,
    pub expected_version: Option<i64>,
}

/// 입찰 성공 결과
#[derive(Debug, Serialize, Clone)]
pub struct BidAccepted {
    pub bid_id: i64,
    pub table_id: String,
    pub new_bid: i64,
    pub previous_bid: i64,
    pub new_version: i64,
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// 트랜잭션 내부 오류: 거절(구조화 페이로드 유지) 또는 스토리지 오류
enum TxError {
    Rejected(Box<BidRejection>),
    Db(sqlx::Error),
}

impl From<sqlx::Error> for TxError {
    fn from(e: sqlx::Error) -> Self {
        TxError::Db(e)
    }
}

// endregion: --- Commands

// region:    --- Place Bid

/// 입찰 처리
/// 같은 테이블에 대한 동시 입찰은 행 잠금으로 직렬화되어
/// 버전 값 하나당 최대 한 건만 성공한다. 다른 테이블끼리는 독립적으로 진행된다.
pub async fn handle_place_bid(
    db_manager: &DatabaseManager,
    feed: &ChangeFeed,
    identity: &Identity,
    cmd: PlaceBidCommand,
    minimum_increment: i64,
) -> Result<BidAccepted, BidRejection> {
    info!(
        "{:<12} --> 입찰 요청 처리 시작: user={} table={} amount={}",
        "Command", identity.username, cmd.table_id, cmd.bid_amount
    );

    // 트랜잭션 진입 전 입력 검증
    if cmd.bid_amount <= 0 {
        return Err(BidRejection::InvalidInput {
            error: "bid_amount must be a positive integer".to_string(),
        });
    }
    if cmd.table_id.trim().is_empty() {
        return Err(BidRejection::InvalidInput {
            error: "table_id is required".to_string(),
        });
    }
    let expected_version = cmd.expected_version.ok_or_else(|| BidRejection::InvalidInput {
        error: "expected_version is required".to_string(),
    })?;

    let table_id = cmd.table_id.clone();
    let bid_amount = cmd.bid_amount;
    let user_id = identity.id;
    let username = identity.username.clone();

    let result = db_manager
        .transaction(move |tx| {
            Box::pin(async move {
                let now = Utc::now();

                // 1. 테이블 행 잠금 (같은 테이블에 대한 동시 커밋 직렬화)
                let table = sqlx::query_as::<_, Table>(
                    "SELECT * FROM tables WHERE id = $1 FOR UPDATE",
                )
                .bind(&table_id)
                .fetch_optional(&mut **tx)
                .await?;

                let table = match table {
                    Some(t) if t.is_active => t,
                    _ => {
                        return Err(TxError::Rejected(Box::new(BidRejection::InvalidInput {
                            error: format!("Unknown or inactive table: {}", table_id),
                        })))
                    }
                };

                // 2. 규칙 검증 (버전 -> 금액 -> 증가 단위 -> 시간)
                validate_bid(&table, bid_amount, expected_version, minimum_increment, now)
                    .map_err(|r| TxError::Rejected(Box::new(r)))?;

                // 3. 원장 추가 (previous_bid는 커밋 직전 현재가)
                let bid_id = sqlx::query_scalar::<_, i64>(
                    "INSERT INTO bids (table_id, user_id, username, bid_amount, previous_bid, bid_time, is_winning)
                     VALUES ($1, $2, $3, $4, $5, $6, TRUE)
                     RETURNING id",
                )
                .bind(&table_id)
                .bind(user_id)
                .bind(&username)
                .bind(bid_amount)
                .bind(table.current_bid)
                .bind(now)
                .fetch_one(&mut **tx)
                .await?;

                // 4. 집계 갱신 (유일한 쓰기 경로)
                sqlx::query(
                    "UPDATE tables
                     SET current_bid = $1,
                         highest_bidder_id = $2,
                         highest_bidder_username = $3,
                         bid_count = bid_count + 1,
                         version = version + 1,
                         updated_at = $4
                     WHERE id = $5",
                )
                .bind(bid_amount)
                .bind(user_id)
                .bind(&username)
                .bind(now)
                .bind(&table_id)
                .execute(&mut **tx)
                .await?;

                Ok(BidAccepted {
                    bid_id,
                    table_id: table_id.clone(),
                    new_bid: bid_amount,
                    previous_bid: table.current_bid,
                    new_version: table.version + 1,
                    username: username.clone(),
                    message: "Bid placed successfully".to_string(),
                    timestamp: now,
                })
            })
        })
        .await;

    match result {
        Ok(accepted) => {
            info!(
                "{:<12} --> 입찰 성공: table={} bid={} version={}",
                "Command", accepted.table_id, accepted.new_bid, accepted.new_version
            );
            // 커밋 이후에만 변경 이벤트 발행
            feed.publish_table_change(
                &accepted.table_id,
                accepted.bid_id,
                accepted.new_bid,
                accepted.new_version,
                accepted.timestamp,
            );
            Ok(accepted)
        }
        Err(TxError::Rejected(rejection)) => {
            info!(
                "{:<12} --> 입찰 거절: table={} code={}",
                "Command", cmd.table_id, rejection.code()
            );
            Err(*rejection)
        }
        Err(TxError::Db(e)) => {
            warn!("{:<12} --> 스토리지 오류: {:?}", "Command", e);
            Err(BidRejection::StorageUnavailable {
                error: "Storage temporarily unavailable, retry later".to_string(),
            })
        }
    }
}

// endregion: --- Place Bid
