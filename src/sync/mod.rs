/// 읽기 동기화 계층 (클라이언트 측)
/// 주기적 전체 폴링을 수렴의 기반으로 삼고, 서버 변경 피드 롱폴을
/// 지연 최적화로 얹는다. 낙관적 갱신은 테이블별 상태 기계로 관리하며
/// 서버 응답이 항상 로컬 상태를 이긴다.
// region:    --- Imports
use crate::auth::SESSION_COOKIE_NAME;
use crate::bidding::model::{Bid, Table};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Sync Config

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    /// 전체 갱신 폴링 주기 (수렴 보장의 기반)
    pub poll_interval: Duration,
    /// 조회 실패 시 점진적 재시도 지연
    pub retry_delays: Vec<Duration>,
    /// 푸시 채널 재연결 최대 시도 횟수. 초과 시 폴링 전용으로 전환.
    pub max_reconnect_attempts: u32,
    pub long_poll_timeout: Duration,
}

impl SyncConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval: Duration::from_secs(3),
            retry_delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
            max_reconnect_attempts: 5,
            long_poll_timeout: Duration::from_secs(25),
        }
    }
}

// endregion: --- Sync Config

// region:    --- Table Sync State

/// 테이블별 낙관적 갱신 상태 기계
/// Idle -> Submitting -> (Committed | Rejected) -> Idle
/// 모든 전이는 명시적 서버 응답으로만 일어난다.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSyncState {
    Idle,
    Submitting { amount: i64, expected_version: i64 },
    Committed { new_version: i64 },
    Rejected { error_code: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// 푸시 채널 포기 후 폴링 전용 모드 (수렴은 계속 보장됨)
    PollOnly,
    Disconnected,
}

/// 클라이언트가 보는 테이블 뷰
#[derive(Debug, Clone)]
pub struct TableView {
    pub table: Table,
    pub sync: TableSyncState,
}

#[derive(Debug)]
struct ClientState {
    tables: HashMap<String, TableView>,
    recent_bids: Vec<Bid>,
    last_seq: u64,
    connection: ConnectionStatus,
}

impl ClientState {
    fn new() -> Self {
        Self {
            tables: HashMap::new(),
            recent_bids: Vec::new(),
            last_seq: 0,
            connection: ConnectionStatus::Connecting,
        }
    }

    /// 서버 기준 상태 반영: 로컬 뷰는 무조건 덮어쓴다 (서버 우선)
    fn apply_authoritative_tables(&mut self, tables: Vec<Table>) {
        let mut next = HashMap::with_capacity(tables.len());
        for table in tables {
            let sync = self
                .tables
                .get(&table.id)
                .map(|v| v.sync.clone())
                .unwrap_or(TableSyncState::Idle);
            next.insert(table.id.clone(), TableView { table, sync });
        }
        self.tables = next;
    }

    /// 낙관적 투영: 제출 직후 로컬에서 먼저 반영한다.
    /// 다음 서버 응답/갱신에서 반드시 조정된다.
    fn apply_optimistic(&mut self, table_id: &str, amount: i64, username: &str) -> Option<i64> {
        let view = self.tables.get_mut(table_id)?;
        let expected_version = view.table.version;
        view.sync = TableSyncState::Submitting {
            amount,
            expected_version,
        };
        view.table.current_bid = amount;
        view.table.highest_bidder_username = Some(username.to_string());
        view.table.bid_count += 1;
        view.table.version += 1;
        Some(expected_version)
    }

    fn settle(&mut self, table_id: &str, outcome: TableSyncState) {
        if let Some(view) = self.tables.get_mut(table_id) {
            view.sync = outcome;
        }
    }

    /// 결과 확인 후 상태 기계를 Idle로 복귀
    fn settle_idle(&mut self, table_id: &str) {
        if let Some(view) = self.tables.get_mut(table_id) {
            view.sync = TableSyncState::Idle;
        }
    }
}

// endregion: --- Table Sync State

// region:    --- Wire Types

#[derive(Debug, Deserialize)]
struct TablesResponse {
    tables: Vec<Table>,
}

#[derive(Debug, Deserialize)]
struct BidsResponse {
    bids: Vec<Bid>,
}

// 롱폴 응답에서 클라이언트가 쓰는 것은 시퀀스 번호뿐이다.
// seq가 전진하면 전체 갱신으로 동기화하므로 이벤트 목록은 받지 않는다.
#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    seq: u64,
}

/// 입찰 결과 (성공/거절 공용)
/// 거절 시 서버 기준 current_bid / minimum_bid / current_version이 채워져
/// 추가 왕복 없이 수정 재시도가 가능하다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BidResult {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub current_bid: Option<i64>,
    pub minimum_bid: Option<i64>,
    pub current_version: Option<i64>,
    pub bid_id: Option<i64>,
    pub new_bid: Option<i64>,
    pub new_version: Option<i64>,
}

// endregion: --- Wire Types

// region:    --- Bidding Client

pub struct BiddingClient {
    http: reqwest::Client,
    config: SyncConfig,
    username: String,
    state: Arc<Mutex<ClientState>>,
}

impl BiddingClient {
    pub fn new(config: SyncConfig, username: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            username: username.into(),
            state: Arc::new(Mutex::new(ClientState::new())),
        }
    }

    /// 현재 로컬 테이블 뷰 (카테고리, 이름 순)
    pub fn tables(&self) -> Vec<TableView> {
        let state = self.state.lock().unwrap();
        let mut views: Vec<TableView> = state.tables.values().cloned().collect();
        views.sort_by(|a, b| {
            (a.table.category.as_str(), a.table.id.as_str())
                .cmp(&(b.table.category.as_str(), b.table.id.as_str()))
        });
        views
    }

    pub fn recent_bids(&self) -> Vec<Bid> {
        self.state.lock().unwrap().recent_bids.clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.state.lock().unwrap().connection
    }

    pub fn table_sync_state(&self, table_id: &str) -> Option<TableSyncState> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table_id)
            .map(|v| v.sync.clone())
    }

    /// 점진적 재시도를 포함한 GET (1s, 3s, 5s 지연 후 포기)
    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, reqwest::Error> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut attempt = 0;
        loop {
            let result = async {
                self.http
                    .get(&url)
                    .header("Cache-Control", "no-cache")
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<T>()
                    .await
            }
            .await;

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.retry_delays.len() => {
                    warn!(
                        "{:<12} --> 조회 실패, 재시도 {}/{}: {}",
                        "Sync",
                        attempt + 1,
                        self.config.retry_delays.len(),
                        e
                    );
                    tokio::time::sleep(self.config.retry_delays[attempt]).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 서버 기준 전체 갱신. 로컬 낙관적 투영은 무조건 덮어쓰인다.
    pub async fn refresh(&self) -> Result<(), reqwest::Error> {
        let tables: TablesResponse = self.fetch_json("/tables").await?;
        let bids: BidsResponse = self.fetch_json("/bids").await?;

        let mut state = self.state.lock().unwrap();
        state.apply_authoritative_tables(tables.tables);
        state.recent_bids = bids.bids;
        Ok(())
    }

    /// 입찰 제출
    /// 로컬 버전을 expected_version으로 항상 동봉하고, 낙관적으로 먼저
    /// 투영한 뒤 서버 응답으로 상태 기계를 전이시킨다. 거절/오류 시
    /// 전체 갱신으로 되돌린다.
    pub async fn place_bid(&self, table_id: &str, amount: i64) -> BidResult {
        // 낙관적 투영 + expected_version 확보
        let expected_version = {
            let mut state = self.state.lock().unwrap();
            match state.apply_optimistic(table_id, amount, &self.username) {
                Some(v) => v,
                None => {
                    return BidResult {
                        error: Some(format!("Unknown table: {}", table_id)),
                        error_code: Some("INVALID_INPUT".to_string()),
                        ..Default::default()
                    }
                }
            }
        };

        let url = format!("{}/bids", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .header(
                reqwest::header::COOKIE,
                format!("{}={}", SESSION_COOKIE_NAME, self.username),
            )
            .json(&serde_json::json!({
                "table_id": table_id,
                "bid_amount": amount,
                "expected_version": expected_version,
            }))
            .send()
            .await;

        let result = match response {
            Ok(resp) => {
                let ok = resp.status().is_success();
                match resp.json::<BidResult>().await {
                    Ok(mut body) => {
                        body.success = ok;
                        body
                    }
                    Err(e) => BidResult {
                        error: Some(e.to_string()),
                        error_code: Some("NETWORK_ERROR".to_string()),
                        ..Default::default()
                    },
                }
            }
            Err(e) => BidResult {
                error: Some(e.to_string()),
                error_code: Some("NETWORK_ERROR".to_string()),
                ..Default::default()
            },
        };

        // 서버 응답으로 상태 기계 전이
        {
            let mut state = self.state.lock().unwrap();
            if result.success {
                state.settle(
                    table_id,
                    TableSyncState::Committed {
                        new_version: result.new_version.unwrap_or(expected_version + 1),
                    },
                );
            } else {
                info!(
                    "{:<12} --> 입찰 거절됨: table={} code={:?}",
                    "Sync", table_id, result.error_code
                );
                state.settle(
                    table_id,
                    TableSyncState::Rejected {
                        error_code: result
                            .error_code
                            .clone()
                            .unwrap_or_else(|| "NETWORK_ERROR".to_string()),
                    },
                );
            }
        }

        // 성공/실패 모두 서버 기준으로 조정 (서버 우선)
        if let Err(e) = self.refresh().await {
            warn!("{:<12} --> 입찰 후 갱신 실패: {}", "Sync", e);
        }
        self.state.lock().unwrap().settle_idle(table_id);

        result
    }

    /// 폴링 루프와 푸시 루프 시작. UI/호출자를 차단하지 않는다.
    pub fn start(self: &Arc<Self>) {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poller.config.poll_interval);
            loop {
                interval.tick().await;
                if let Err(e) = poller.refresh().await {
                    warn!("{:<12} --> 폴링 갱신 실패: {}", "Sync", e);
                    poller.state.lock().unwrap().connection = ConnectionStatus::Disconnected;
                }
            }
        });

        let pusher = Arc::clone(self);
        tokio::spawn(async move {
            pusher.push_loop().await;
        });
    }

    /// 푸시(롱폴) 루프: 변경 감지 시 즉시 갱신.
    /// 연결 실패는 지수 백오프로 재시도하며 한도 초과 시 폴링 전용 모드로 남는다.
    async fn push_loop(&self) {
        let mut reconnect_attempts: u32 = 0;
        loop {
            let since = self.state.lock().unwrap().last_seq;
            let path = format!(
                "/updates?since={}&timeout_ms={}",
                since,
                self.config.long_poll_timeout.as_millis()
            );
            let url = format!("{}{}", self.config.base_url, path);

            let result = async {
                self.http
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<UpdatesResponse>()
                    .await
            }
            .await;

            match result {
                Ok(updates) => {
                    reconnect_attempts = 0;
                    {
                        let mut state = self.state.lock().unwrap();
                        state.connection = ConnectionStatus::Connected;
                    }
                    if updates.seq > since {
                        self.state.lock().unwrap().last_seq = updates.seq;
                        if let Err(e) = self.refresh().await {
                            warn!("{:<12} --> 푸시 후 갱신 실패: {}", "Sync", e);
                        }
                    }
                }
                Err(e) => {
                    reconnect_attempts += 1;
                    if reconnect_attempts > self.config.max_reconnect_attempts {
                        warn!(
                            "{:<12} --> 푸시 채널 포기, 폴링 전용 모드로 전환: {}",
                            "Sync", e
                        );
                        self.state.lock().unwrap().connection = ConnectionStatus::PollOnly;
                        return;
                    }
                    let backoff = Duration::from_secs(1 << reconnect_attempts.min(6));
                    warn!(
                        "{:<12} --> 푸시 채널 재연결 대기 {}s (시도 {}/{})",
                        "Sync",
                        backoff.as_secs(),
                        reconnect_attempts,
                        self.config.max_reconnect_attempts
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

// endregion: --- Bidding Client

// endregion: --- Tests
