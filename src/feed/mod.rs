/// 서비스 내장 변경 피드
/// 외부 브로커 없이 프로세스 내 broadcast 채널로 테이블 변경을 전파한다.
/// 푸시는 지연 최적화일 뿐이며, 폴링만으로도 최종 수렴이 보장된다.
// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

// endregion: --- Imports

// region:    --- Change Event

/// 커밋된 입찰로 인한 테이블 변경 이벤트
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChangeEvent {
    pub seq: u64,
    pub table_id: String,
    pub bid_id: i64,
    pub new_bid: i64,
    pub new_version: i64,
    pub timestamp: DateTime<Utc>,
}

// endregion: --- Change Event

// region:    --- Change Feed

pub struct ChangeFeed {
    seq: AtomicU64,
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            seq: AtomicU64::new(0),
            sender,
        }
    }

    /// 마지막으로 발행된 시퀀스 번호
    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// 변경 이벤트 발행. 트랜잭션 커밋 이후에만 호출되어야 한다.
    /// 구독자가 없어도 발행 자체는 성공으로 처리한다.
    pub fn publish_table_change(
        &self,
        table_id: &str,
        bid_id: i64,
        new_bid: i64,
        new_version: i64,
        timestamp: DateTime<Utc>,
    ) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let event = ChangeEvent {
            seq,
            table_id: table_id.to_string(),
            bid_id,
            new_bid,
            new_version,
            timestamp,
        };
        debug!(
            "{:<12} --> 변경 이벤트 발행: seq={} table={}",
            "Feed", seq, table_id
        );
        let _ = self.sender.send(event);
        seq
    }

    /// 롱폴 대기: since 이후의 변경이 생길 때까지 timeout 한도 내에서 기다린다.
    /// 이미 지나간 변경은 재생하지 않는다. 반환된 seq가 since보다 크면
    /// 클라이언트는 전체 갱신으로 동기화한다.
    pub async fn wait_for_change(&self, since: u64, timeout: Duration) -> (u64, Vec<ChangeEvent>) {
        // 수신 누락을 막기 위해 구독을 먼저 연 뒤 현재 시퀀스를 확인한다
        let mut receiver = self.sender.subscribe();
        let current = self.last_seq();
        if current > since {
            return (current, Vec::new());
        }

        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Ok(event)) => {
                let seq = event.seq;
                (seq, vec![event])
            }
            // 채널 지연/종료 시에는 현재 시퀀스만 알려 폴링으로 수렴하게 한다
            Ok(Err(_)) => (self.last_seq(), Vec::new()),
            Err(_) => (self.last_seq(), Vec::new()),
        }
    }
}

// endregion: --- Change Feed

// endregion: --- Tests
