// ==========================================
// 游戏目录站 - 导入进度事件
// ==========================================
// 用途: 每个批次结束后发布累计进度（外部可观测性）
// 说明:
// - ProgressSink 是外部接收端接口，默认实现写 tracing 日志
// - NoOpProgressSink 用于不关心进度的调用方
// ==========================================

use crate::domain::{BatchStatus, EntityKind};
use serde::Serialize;
use tracing::{debug, info};

// ==========================================
// ProgressEvent - 进度事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub run_id: String,
    pub kind: EntityKind,
    pub batch_no: usize,
    pub status: BatchStatus,
    /// 以下为本次运行累计值（记录数）
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

// ==========================================
// ProgressSink Trait
// ==========================================
pub trait ProgressSink: Send + Sync {
    fn on_batch_complete(&self, event: &ProgressEvent);
}

/// 写 tracing 日志的进度接收端
pub struct TracingProgressSink {
    enabled: bool,
}

impl TracingProgressSink {
    /// enabled=false 时降为 debug 级别
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl ProgressSink for TracingProgressSink {
    fn on_batch_complete(&self, event: &ProgressEvent) {
        if self.enabled {
            info!(
                run_id = %event.run_id,
                kind = %event.kind,
                batch_no = event.batch_no,
                status = ?event.status,
                attempted = event.attempted,
                succeeded = event.succeeded,
                failed = event.failed,
                "批次完成"
            );
        } else {
            debug!(
                run_id = %event.run_id,
                kind = %event.kind,
                batch_no = event.batch_no,
                attempted = event.attempted,
                succeeded = event.succeeded,
                failed = event.failed,
                "批次完成"
            );
        }
    }
}

/// 空实现
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn on_batch_complete(&self, _event: &ProgressEvent) {}
}

// ==========================================
// ProgressTracker - 累计计数
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    run_id: String,
    attempted: usize,
    succeeded: usize,
    failed: usize,
}

impl ProgressTracker {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    /// 累加一个批次并生成事件
    pub fn record(
        &mut self,
        kind: EntityKind,
        batch_no: usize,
        status: BatchStatus,
        attempted: usize,
        succeeded: usize,
    ) -> ProgressEvent {
        self.attempted += attempted;
        self.succeeded += succeeded;
        self.failed += attempted - succeeded.min(attempted);

        ProgressEvent {
            run_id: self.run_id.clone(),
            kind,
            batch_no,
            status,
            attempted: self.attempted,
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_is_cumulative() {
        let mut tracker = ProgressTracker::new("run-1");

        let first = tracker.record(EntityKind::Game, 1, BatchStatus::Committed, 5, 5);
        assert_eq!((first.attempted, first.succeeded, first.failed), (5, 5, 0));

        let second = tracker.record(EntityKind::Game, 2, BatchStatus::Failed, 5, 0);
        assert_eq!((second.attempted, second.succeeded, second.failed), (10, 5, 5));

        let third = tracker.record(EntityKind::Tag, 1, BatchStatus::Partial, 3, 2);
        assert_eq!((third.attempted, third.succeeded, third.failed), (13, 7, 6));
        assert_eq!(third.run_id, "run-1");
    }
}
