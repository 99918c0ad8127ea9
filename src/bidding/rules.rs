/// 입찰 검증 규칙
/// 데이터베이스 없이 단독으로 검증 가능하도록 순수 함수로 분리되어 있다.
/// 실제 커밋은 commands 모듈의 트랜잭션 안에서 같은 규칙을 적용한다.
// region:    --- Imports
use crate::bidding::model::Table;
use chrono::{DateTime, Utc};
use serde::Serialize;

// endregion: --- Imports

// region:    --- Rejection Taxonomy

/// 입찰 거절 사유
/// 모든 거절은 호출자가 추가 왕복 없이 재시도할 수 있도록
/// 서버 기준 현재 상태(current_bid / minimum_bid / current_version)를 함께 싣는다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "error_code")]
pub enum BidRejection {
    /// 세션 없음. 재시도 의미 없음.
    #[serde(rename = "UNAUTHENTICATED")]
    Unauthenticated { error: String },
    /// 잘못된 입력 (금액/테이블 참조/누락된 expected_version). 재시도 의미 없음.
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput { error: String },
    /// 낙관적 잠금 불일치. 호출자는 최신 상태로 갱신 후 재제출 가능.
    #[serde(rename = "STALE_VERSION")]
    StaleVersion {
        error: String,
        current_bid: i64,
        minimum_bid: i64,
        current_version: i64,
    },
    /// 현재가 이하 입찰
    #[serde(rename = "BID_TOO_LOW")]
    BidTooLow {
        error: String,
        current_bid: i64,
        minimum_bid: i64,
        current_version: i64,
    },
    /// 최소 증가 단위 미달
    #[serde(rename = "BELOW_MINIMUM_INCREMENT")]
    BelowMinimumIncrement {
        error: String,
        current_bid: i64,
        minimum_bid: i64,
        current_version: i64,
    },
    /// 입찰 가능 시간 외. 해당 테이블에 대해서는 종료 상태.
    #[serde(rename = "WINDOW_CLOSED")]
    WindowClosed {
        error: String,
        current_bid: i64,
        minimum_bid: i64,
        current_version: i64,
    },
    /// 스토리지 일시 장애. 재시도 가능.
    #[serde(rename = "STORAGE_UNAVAILABLE")]
    StorageUnavailable { error: String },
}

impl BidRejection {
    /// 에러 코드 문자열 (로깅/분기 용)
    pub fn code(&self) -> &'static str {
        match self {
            BidRejection::Unauthenticated { .. } => "UNAUTHENTICATED",
            BidRejection::InvalidInput { .. } => "INVALID_INPUT",
            BidRejection::StaleVersion { .. } => "STALE_VERSION",
            BidRejection::BidTooLow { .. } => "BID_TOO_LOW",
            BidRejection::BelowMinimumIncrement { .. } => "BELOW_MINIMUM_INCREMENT",
            BidRejection::WindowClosed { .. } => "WINDOW_CLOSED",
            BidRejection::StorageUnavailable { .. } => "STORAGE_UNAVAILABLE",
        }
    }
}

// endregion: --- Rejection Taxonomy

// region:    --- Validation

/// 잠금된 테이블 행에 대해 입찰 규칙을 평가한다.
/// 검증 순서: 버전 -> 금액 -> 증가 단위 -> 입찰 시간.
/// 통과 시 Ok(()), 거절 시 서버 기준 상태가 포함된 BidRejection.
pub fn validate_bid(
    table: &Table,
    amount: i64,
    expected_version: i64,
    minimum_increment: i64,
    now: DateTime<Utc>,
) -> Result<(), BidRejection> {
    let minimum_bid = table.current_bid + minimum_increment;

    // 낙관적 잠금 검증
    if expected_version != table.version {
        return Err(BidRejection::StaleVersion {
            error: format!(
                "Table state has changed (expected version {}, current {}). Refresh and retry.",
                expected_version, table.version
            ),
            current_bid: table.current_bid,
            minimum_bid,
            current_version: table.version,
        });
    }

    // 현재가 초과 검증
    if amount <= table.current_bid {
        return Err(BidRejection::BidTooLow {
            error: format!(
                "Bid must be higher than the current bid of {}",
                table.current_bid
            ),
            current_bid: table.current_bid,
            minimum_bid,
            current_version: table.version,
        });
    }

    // 최소 증가 단위 검증
    if amount < minimum_bid {
        return Err(BidRejection::BelowMinimumIncrement {
            error: format!(
                "Bid must be at least {} ({} more than current bid)",
                minimum_bid, minimum_increment
            ),
            current_bid: table.current_bid,
            minimum_bid,
            current_version: table.version,
        });
    }

    // 입찰 시간 검증: 시작 시각 포함, 종료 시각은 불포함
    if now < table.bidding_starts_at || now >= table.bidding_ends_at {
        return Err(BidRejection::WindowClosed {
            error: "Bidding is not open for this table".to_string(),
            current_bid: table.current_bid,
            minimum_bid,
            current_version: table.version,
        });
    }

    Ok(())
}

// endregion: --- Validation

// endregion: --- Tests
