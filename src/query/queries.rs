/// 활성 테이블 조회 (카테고리, 이름 순 정렬)
pub const GET_ACTIVE_TABLES: &str =
    "SELECT * FROM tables WHERE is_active = TRUE ORDER BY category ASC, id ASC";

/// 테이블 조회
pub const GET_TABLE: &str = "SELECT * FROM tables WHERE id = $1";

/// 최근 입찰 조회 (최신 순)
pub const GET_RECENT_BIDS: &str = r#"
    SELECT id, table_id, user_id, username, bid_amount, previous_bid, bid_time, is_winning
    FROM bids
    ORDER BY bid_time DESC, id DESC
    LIMIT $1
"#;

/// 테이블 입찰 이력 조회 (최신 순)
pub const GET_TABLE_BIDS: &str = r#"
    SELECT id, table_id, user_id, username, bid_amount, previous_bid, bid_time, is_winning
    FROM bids
    WHERE table_id = $1
    ORDER BY bid_time DESC, id DESC
    LIMIT $2
"#;
