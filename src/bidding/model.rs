use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 테이블(경매 대상) 모델
// id는 "43/44" 같은 복합 테이블 이름을 허용하기 위해 문자열이다.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Table {
    pub id: String,
    pub category: String,
    pub pax: String,
    pub base_price: i64,
    pub current_bid: i64,
    pub highest_bidder_id: Option<i64>,
    pub highest_bidder_username: Option<String>,
    pub bid_count: i64,
    pub version: i64,
    pub is_active: bool,
    pub bidding_starts_at: DateTime<Utc>,
    pub bidding_ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// 입찰 원장 모델 (append-only, 수정/삭제 없음)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Bid {
    pub id: i64,
    pub table_id: String,
    pub user_id: i64,
    pub username: String,
    pub bid_amount: i64,
    pub previous_bid: i64,
    pub bid_time: DateTime<Utc>,
    pub is_winning: bool,
}
