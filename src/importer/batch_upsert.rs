// ==========================================
// 游戏目录站 - 批量写入引擎
// ==========================================
// 职责:
// - 按 batch_size 切分草稿，逐批幂等 upsert
// - 瞬时错误按指数退避重试，永久错误立即失败
// - 批次失败只影响本批，其余批次照常执行
// - 同种实体的批次在固定大小的工作池内并发
// - 截止时间后不再启动新批次（已开始的批次跑完）
// ==========================================
// 并发: Semaphore 限制同时写入的批次数，FuturesUnordered 收集完成顺序
// 约束: 工作池大小不超过存储的安全并发写入数
// ==========================================

use crate::config::ImportConfig;
use crate::domain::{BatchReport, BatchStatus, Draft, EntityKind, RecordOutcome, UpsertBatch};
use crate::importer::dependency_resolver::ParentState;
use crate::importer::progress::{ProgressSink, ProgressTracker};
use crate::importer::retry_policy::RetryPolicy;
use crate::repository::CatalogStore;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error, warn};

// ==========================================
// PlannedBatch - 待写入批次
// ==========================================
#[derive(Debug, Clone)]
pub struct PlannedBatch {
    pub kind: EntityKind,
    pub batch_no: usize, // 同种实体内从 1 开始
    /// 与 payload 中记录一一对应的来源行号
    pub rows: Vec<usize>,
    pub keys: Vec<String>,
    pub payload: UpsertBatch,
}

impl PlannedBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 按固定大小切分草稿
pub fn partition<T: Clone>(
    drafts: &[Draft<T>],
    batch_size: usize,
    wrap: fn(Vec<T>) -> UpsertBatch,
) -> Vec<PlannedBatch> {
    drafts
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(idx, chunk)| {
            let payload = wrap(chunk.iter().map(|d| d.record.clone()).collect());
            PlannedBatch {
                kind: payload.kind(),
                batch_no: idx + 1,
                rows: chunk.iter().map(|d| d.row_index).collect(),
                keys: payload.record_keys(),
                payload,
            }
        })
        .collect()
}

// ==========================================
// BatchResult - 批次执行结果
// ==========================================
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub kind: EntityKind,
    pub batch_no: usize,
    pub rows: Vec<usize>,
    pub keys: Vec<String>,
    pub attempts: u32,
    pub status: BatchStatus,
    pub error: Option<String>,
    /// 仅 Committed / Partial 时非空，与 rows 一一对应
    pub outcomes: Vec<RecordOutcome>,
    /// 因截止时间未开始或放弃重试
    pub timed_out: bool,
}

impl BatchResult {
    fn from_planned(batch: PlannedBatch, attempts: u32, status: BatchStatus) -> Self {
        Self {
            kind: batch.kind,
            batch_no: batch.batch_no,
            rows: batch.rows,
            keys: batch.keys,
            attempts,
            status,
            error: None,
            outcomes: Vec::new(),
            timed_out: false,
        }
    }

    fn not_started(batch: PlannedBatch) -> Self {
        let mut result = Self::from_planned(batch, 0, BatchStatus::NotStarted);
        result.timed_out = true;
        result
    }

    fn failed(batch: PlannedBatch, attempts: u32, error: String) -> Self {
        let mut result = Self::from_planned(batch, attempts, BatchStatus::Failed);
        result.error = Some(error);
        result
    }

    fn completed(batch: PlannedBatch, attempts: u32, outcomes: Vec<RecordOutcome>) -> Self {
        let status = if outcomes.iter().all(RecordOutcome::is_committed) {
            BatchStatus::Committed
        } else {
            BatchStatus::Partial
        };
        let mut result = Self::from_planned(batch, attempts, status);
        result.outcomes = outcomes;
        result
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn committed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_committed()).count()
    }

    /// 实际提交给存储的记录数
    pub fn attempted_count(&self) -> usize {
        if self.attempts == 0 {
            0
        } else {
            self.size()
        }
    }

    pub fn to_report(&self) -> BatchReport {
        BatchReport {
            kind: self.kind,
            batch_no: self.batch_no,
            size: self.size(),
            attempts: self.attempts,
            retries: self.retries(),
            status: self.status,
            error: self.error.clone(),
        }
    }

    /// 每条记录的父状态（用于游戏批次）
    pub fn record_states(&self) -> impl Iterator<Item = (&str, ParentState)> + '_ {
        self.keys.iter().enumerate().map(move |(idx, key)| {
            let state = match self.status {
                BatchStatus::NotStarted => ParentState::NotAttempted,
                BatchStatus::Failed => ParentState::Failed,
                BatchStatus::Committed | BatchStatus::Partial => match self.outcomes.get(idx) {
                    Some(outcome) if outcome.is_committed() => ParentState::Committed,
                    _ => ParentState::Failed,
                },
            };
            (key.as_str(), state)
        })
    }
}

/// 游戏批次结果 → slug 状态表
pub fn parent_states(game_results: &[BatchResult]) -> HashMap<String, ParentState> {
    game_results
        .iter()
        .flat_map(|result| result.record_states())
        .map(|(slug, state)| (slug.to_string(), state))
        .collect()
}

// ==========================================
// BatchUpsertEngine - 批量写入引擎
// ==========================================
pub struct BatchUpsertEngine {
    store: Arc<dyn CatalogStore>,
    sink: Arc<dyn ProgressSink>,
    policy: RetryPolicy,
    batch_size: usize,
    workers: usize,
}

impl BatchUpsertEngine {
    /// 创建引擎
    ///
    /// # 参数
    /// - store: 注入的存储接口
    /// - config: 已校验的导入配置
    /// - sink: 进度接收端
    pub fn new(
        store: Arc<dyn CatalogStore>,
        config: &ImportConfig,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let workers = config.effective_workers(store.max_concurrent_writers());
        Self {
            store,
            sink,
            policy: RetryPolicy::from_config(config),
            batch_size: config.batch_size.max(1),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 按配置的批次大小切分
    pub fn plan<T: Clone>(
        &self,
        drafts: &[Draft<T>],
        wrap: fn(Vec<T>) -> UpsertBatch,
    ) -> Vec<PlannedBatch> {
        partition(drafts, self.batch_size, wrap)
    }

    /// 执行一组同种实体的批次（批次之间无顺序要求）
    ///
    /// # 返回
    /// - 按 batch_no 排序的结果（每个批次恰好一条）
    pub async fn run_batches(
        &self,
        batches: Vec<PlannedBatch>,
        deadline: Instant,
        tracker: &mut ProgressTracker,
    ) -> Vec<BatchResult> {
        if batches.is_empty() {
            return Vec::new();
        }

        let total = batches.len();
        debug!(
            kind = %batches[0].kind,
            batches = total,
            workers = self.workers,
            "开始执行批次"
        );

        let semaphore = Semaphore::new(self.workers);
        let semaphore = &semaphore;
        let mut futs = FuturesUnordered::new();
        for batch in batches {
            futs.push(async move {
                // 许可在 future 内部获取，排队的批次不阻塞其它批次完成
                match semaphore.acquire().await {
                    Ok(_permit) => self.execute(batch, deadline).await,
                    Err(_) => BatchResult::not_started(batch),
                }
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(result) = futs.next().await {
            let event = tracker.record(
                result.kind,
                result.batch_no,
                result.status,
                result.attempted_count(),
                result.committed_count(),
            );
            self.sink.on_batch_complete(&event);
            results.push(result);
        }

        results.sort_by_key(|r| r.batch_no);
        results
    }

    /// 单批次：重试直到成功 / 永久错误 / 次数耗尽 / 截止时间
    async fn execute(&self, batch: PlannedBatch, deadline: Instant) -> BatchResult {
        let mut attempts = 0u32;
        let mut last_error = String::new();

        loop {
            if Instant::now() >= deadline {
                if attempts == 0 {
                    warn!(kind = %batch.kind, batch_no = batch.batch_no, "运行超时，批次未开始");
                    return BatchResult::not_started(batch);
                }
                warn!(
                    kind = %batch.kind,
                    batch_no = batch.batch_no,
                    attempts,
                    "运行超时，放弃重试"
                );
                let mut result = BatchResult::failed(
                    batch,
                    attempts,
                    format!("{}; retries abandoned, run timed out", last_error),
                );
                result.timed_out = true;
                return result;
            }

            attempts += 1;
            match self.store.upsert(&batch.payload).await {
                Ok(outcomes) if outcomes.len() == batch.len() => {
                    debug!(
                        kind = %batch.kind,
                        batch_no = batch.batch_no,
                        attempts,
                        size = batch.len(),
                        "批次写入完成"
                    );
                    return BatchResult::completed(batch, attempts, outcomes);
                }
                Ok(outcomes) => {
                    let message = format!(
                        "store returned {} outcomes for {} records",
                        outcomes.len(),
                        batch.len()
                    );
                    error!(kind = %batch.kind, batch_no = batch.batch_no, %message, "批次结果数量不符");
                    return BatchResult::failed(batch, attempts, message);
                }
                Err(e) if self.policy.should_retry(attempts, &e) => {
                    let delay = self.policy.delay_after(attempts);
                    warn!(
                        kind = %batch.kind,
                        batch_no = batch.batch_no,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "批次写入瞬时失败，退避后重试"
                    );
                    last_error = e.to_string();
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        kind = %batch.kind,
                        batch_no = batch.batch_no,
                        attempts,
                        transient = e.is_transient(),
                        error = %e,
                        "批次写入失败"
                    );
                    return BatchResult::failed(batch, attempts, e.to_string());
                }
            }
        }
    }
}
