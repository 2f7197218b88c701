// ==========================================
// 游戏目录站 - 导入报告汇总
// ==========================================
// 职责: 汇总各阶段结果为一份 ImportReport
// 规则:
// - success = 无失败的游戏批次，且没有因超时未开始的游戏批次
// - 标签 / 推荐位 / 分类失败写入报告，但不影响 success
// ==========================================

use crate::domain::{
    BatchReport, BatchStatus, EntityCounts, EntityKind, ImportReport, ImportTotals,
    ImportWarning, RecordOutcome, RowError, RowErrorKind, RunStage,
};
use crate::importer::batch_upsert::BatchResult;
use crate::importer::dependency_resolver::ResolvedPlan;
use crate::importer::row_validator::ValidatedDrafts;
use std::collections::BTreeMap;
use std::time::Instant;

pub const SKIPPED_PARENT_FAILED: &str = "skipped — dependent parent failed";
pub const SKIPPED_PARENT_INVALID: &str = "skipped — dependent parent failed validation";
pub const SKIPPED_PARENT_NOT_ATTEMPTED: &str = "skipped — dependent parent not attempted";
pub const NOT_ATTEMPTED_TIMEOUT: &str = "not attempted — run timed out";

// ==========================================
// ReportBuilder
// ==========================================
pub struct ReportBuilder {
    run_id: String,
    started: Instant,
    totals: ImportTotals,
    entities: BTreeMap<EntityKind, EntityCounts>,
    errors: Vec<RowError>,
    warnings: Vec<ImportWarning>,
    batches: Vec<BatchReport>,
    timed_out: bool,
}

impl ReportBuilder {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started: Instant::now(),
            totals: ImportTotals::default(),
            entities: EntityKind::ALL
                .iter()
                .map(|kind| (*kind, EntityCounts::default()))
                .collect(),
            errors: Vec::new(),
            warnings: Vec::new(),
            batches: Vec::new(),
            timed_out: false,
        }
    }

    pub fn record_parse(&mut self, warnings: Vec<ImportWarning>) {
        self.warnings.extend(warnings);
    }

    /// 取走校验阶段的错误与警告
    pub fn record_validation(&mut self, drafts: &mut ValidatedDrafts) {
        self.totals.read = drafts.rows_read;
        self.totals.validated = drafts.games.len();
        self.totals.excluded = drafts.excluded_rows;
        self.errors.append(&mut drafts.errors);
        self.warnings.append(&mut drafts.warnings);
    }

    pub fn record_resolution(&mut self, plan: &mut ResolvedPlan) {
        self.totals.duplicates = plan.duplicates;
        self.warnings.append(&mut plan.warnings);
    }

    /// 父游戏失败 / 未尝试导致跳过的依赖记录
    pub fn record_skipped(&mut self, skipped: Vec<RowError>) {
        self.errors.extend(skipped);
    }

    pub fn record_batches(&mut self, results: &[BatchResult]) {
        for result in results {
            self.record_batch(result);
        }
    }

    fn record_batch(&mut self, result: &BatchResult) {
        self.batches.push(result.to_report());
        self.timed_out |= result.timed_out;

        let kind = result.kind;
        let field = key_field(kind);
        let is_game = kind == EntityKind::Game;
        let mut errors = Vec::new();
        let counts = self.entities.entry(kind).or_default();

        match result.status {
            BatchStatus::NotStarted => {
                counts.skipped += result.size();
                if is_game {
                    self.totals.not_attempted += result.size();
                }
                for (row_index, key) in result.rows.iter().zip(&result.keys) {
                    errors.push(row_error(
                        *row_index,
                        field,
                        format!("{} ({})", NOT_ATTEMPTED_TIMEOUT, key),
                        RowErrorKind::Timeout,
                        kind,
                    ));
                }
            }
            BatchStatus::Failed => {
                counts.attempted += result.size();
                counts.failed += result.size();
                if is_game {
                    self.totals.failed += result.size();
                }
                let reason = result.error.clone().unwrap_or_default();
                for (row_index, key) in result.rows.iter().zip(&result.keys) {
                    errors.push(row_error(
                        *row_index,
                        field,
                        format!("batch {} failed for '{}': {}", result.batch_no, key, reason),
                        RowErrorKind::Store,
                        kind,
                    ));
                }
            }
            BatchStatus::Committed | BatchStatus::Partial => {
                counts.attempted += result.size();
                for ((row_index, key), outcome) in
                    result.rows.iter().zip(&result.keys).zip(&result.outcomes)
                {
                    match outcome {
                        RecordOutcome::Inserted => counts.inserted += 1,
                        RecordOutcome::Updated => counts.updated += 1,
                        RecordOutcome::Rejected(reason) => {
                            counts.failed += 1;
                            errors.push(row_error(
                                *row_index,
                                field,
                                format!("'{}' rejected by store: {}", key, reason),
                                RowErrorKind::Store,
                                kind,
                            ));
                        }
                    }
                }
                if is_game {
                    let committed = result.committed_count();
                    self.totals.committed += committed;
                    self.totals.failed += result.size() - committed;
                }
            }
        }

        self.errors.extend(errors);
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// 生成最终报告
    pub fn build(mut self, stage: RunStage) -> ImportReport {
        for error in &self.errors {
            if error.kind == RowErrorKind::Skipped {
                self.entities.entry(error.entity).or_default().skipped += 1;
            }
        }

        let success = !self.batches.iter().any(|b| {
            b.kind == EntityKind::Game
                && matches!(b.status, BatchStatus::Failed | BatchStatus::NotStarted)
        });

        self.errors
            .sort_by_key(|e| (e.row_index, error_kind_rank(e.kind)));

        ImportReport {
            run_id: self.run_id,
            success,
            timed_out: self.timed_out,
            stage,
            totals: self.totals,
            entities: self.entities,
            errors: self.errors,
            warnings: self.warnings,
            batches: self.batches,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

/// 行级错误中标识记录的字段
fn key_field(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Game => "slug",
        EntityKind::Category => "category",
        EntityKind::Tag => "tags",
        EntityKind::HeroSlot => "hero",
    }
}

fn error_kind_rank(kind: RowErrorKind) -> u8 {
    match kind {
        RowErrorKind::Validation => 0,
        RowErrorKind::Store => 1,
        RowErrorKind::Timeout => 2,
        RowErrorKind::Skipped => 3,
    }
}

fn row_error(
    row_index: usize,
    field: &str,
    reason: String,
    kind: RowErrorKind,
    entity: EntityKind,
) -> RowError {
    RowError {
        row_index,
        field: field.to_string(),
        reason,
        kind,
        entity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_result(status: BatchStatus, outcomes: Vec<RecordOutcome>) -> BatchResult {
        BatchResult {
            kind: EntityKind::Game,
            batch_no: 1,
            rows: vec![2, 3],
            keys: vec!["a".to_string(), "b".to_string()],
            attempts: if status == BatchStatus::NotStarted { 0 } else { 1 },
            status,
            error: match status {
                BatchStatus::Failed => Some("database is locked".to_string()),
                _ => None,
            },
            outcomes,
            timed_out: status == BatchStatus::NotStarted,
        }
    }

    #[test]
    fn test_failed_game_batch_flips_success() {
        let mut builder = ReportBuilder::new("run");
        builder.record_batches(&[game_result(BatchStatus::Failed, Vec::new())]);
        let report = builder.build(RunStage::Completed);

        assert!(!report.success);
        assert_eq!(report.totals.failed, 2);
        assert_eq!(report.entity(EntityKind::Game).failed, 2);
        assert!(report
            .errors
            .iter()
            .all(|e| e.kind == RowErrorKind::Store && e.field == "slug"));
    }

    #[test]
    fn test_partial_batch_counts_rejections() {
        let mut builder = ReportBuilder::new("run");
        builder.record_batches(&[game_result(
            BatchStatus::Partial,
            vec![
                RecordOutcome::Updated,
                RecordOutcome::Rejected("constraint".to_string()),
            ],
        )]);
        let report = builder.build(RunStage::Completed);

        assert!(report.success);
        assert_eq!(report.totals.committed, 1);
        assert_eq!(report.totals.failed, 1);
        assert_eq!(report.entity(EntityKind::Game).updated, 1);
        assert_eq!(report.errors_for_row(3).count(), 1);
    }

    #[test]
    fn test_not_started_marks_timeout() {
        let mut builder = ReportBuilder::new("run");
        builder.record_batches(&[game_result(BatchStatus::NotStarted, Vec::new())]);
        let report = builder.build(RunStage::Completed);

        assert!(!report.success);
        assert!(report.timed_out);
        assert_eq!(report.totals.not_attempted, 2);
        assert!(report.errors[0].reason.starts_with(NOT_ATTEMPTED_TIMEOUT));
    }

    #[test]
    fn test_dependent_failures_do_not_flip_success() {
        let mut builder = ReportBuilder::new("run");
        let mut tag_result = game_result(BatchStatus::Failed, Vec::new());
        tag_result.kind = EntityKind::Tag;
        builder.record_batches(&[tag_result]);
        builder.record_skipped(vec![RowError {
            row_index: 9,
            field: "hero".to_string(),
            reason: SKIPPED_PARENT_FAILED.to_string(),
            kind: RowErrorKind::Skipped,
            entity: EntityKind::HeroSlot,
        }]);
        let report = builder.build(RunStage::Completed);

        assert!(report.success);
        assert_eq!(report.entity(EntityKind::Tag).failed, 2);
        assert_eq!(report.entity(EntityKind::HeroSlot).skipped, 1);
    }
}
