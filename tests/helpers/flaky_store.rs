// ==========================================
// 故障注入存储 + 进度记录
// ==========================================
// 包装真实的 SqliteCatalogStore，按记录键注入瞬时 / 永久错误
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use game_catalog_ingest::domain::{EntityKind, RecordOutcome, UpsertBatch};
use game_catalog_ingest::importer::{ProgressEvent, ProgressSink};
use game_catalog_ingest::repository::{CatalogStore, SqliteCatalogStore, StoreError, StoreResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// 包含 key 的批次前 times 次调用失败
#[derive(Debug, Clone)]
pub struct FailureRule {
    pub kind: EntityKind,
    pub key: String,
    pub times: u32,
    pub transient: bool,
}

impl FailureRule {
    pub fn transient(kind: EntityKind, key: &str, times: u32) -> Self {
        Self {
            kind,
            key: key.to_string(),
            times,
            transient: true,
        }
    }

    pub fn permanent(kind: EntityKind, key: &str) -> Self {
        Self {
            kind,
            key: key.to_string(),
            times: u32::MAX,
            transient: false,
        }
    }
}

pub struct FlakyStore {
    inner: SqliteCatalogStore,
    rules: Vec<FailureRule>,
    fired: Mutex<Vec<u32>>,
    calls: Mutex<Vec<EntityKind>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: SqliteCatalogStore) -> Self {
        Self {
            inner,
            rules: Vec::new(),
            fired: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_rule(mut self, rule: FailureRule) -> Self {
        self.rules.push(rule);
        self.fired.lock().unwrap().push(0);
        self
    }

    /// 每次 upsert 前等待
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 某类实体的 upsert 调用次数
    pub fn calls_for(&self, kind: EntityKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|k| **k == kind)
            .count()
    }

    /// 同时进行中的 upsert 调用数峰值
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn injected_failure(&self, batch: &UpsertBatch) -> Option<StoreError> {
        let keys = batch.record_keys();
        let mut fired = self.fired.lock().unwrap();
        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.kind != batch.kind() || !keys.iter().any(|k| k == &rule.key) {
                continue;
            }
            if fired[idx] < rule.times {
                fired[idx] += 1;
                return Some(if rule.transient {
                    StoreError::Busy("database is locked".to_string())
                } else {
                    StoreError::Rejected(format!("record '{}' refused", rule.key))
                });
            }
        }
        None
    }
}

#[async_trait]
impl CatalogStore for FlakyStore {
    async fn upsert(&self, batch: &UpsertBatch) -> StoreResult<Vec<RecordOutcome>> {
        self.calls.lock().unwrap().push(batch.kind());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = match self.injected_failure(batch) {
            Some(err) => Err(err),
            None => self.inner.upsert(batch).await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn existing_slugs(&self, slugs: &[String]) -> StoreResult<Vec<String>> {
        self.inner.existing_slugs(slugs).await
    }

    async fn count(&self, kind: EntityKind) -> StoreResult<u64> {
        self.inner.count(kind).await
    }

    fn max_concurrent_writers(&self) -> usize {
        self.inner.max_concurrent_writers()
    }
}

/// 记录所有进度事件
#[derive(Default)]
pub struct RecordingProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgressSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn on_batch_complete(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
