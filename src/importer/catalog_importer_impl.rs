// ==========================================
// 游戏目录站 - 目录导入器实现
// ==========================================
// 职责: 串联导入管道，从上传文件到落库 + 报告
// 流程: 解析 → 校验/规范化 → 依赖解析 → 分类/游戏写入 → 标签写入 → 推荐位写入 → 报告
// 状态: Parsing → Validating → Resolving → PersistingGames → PersistingTags
//       → PersistingHero → Completed；只有解析失败进入 Aborted
// ==========================================

use crate::config::{ImportConfig, RUN_TIMEOUT_SECS_RANGE};
use crate::domain::{ImportReport, RunStage, UpsertBatch};
use crate::importer::batch_upsert::{parent_states, BatchUpsertEngine};
use crate::importer::catalog_importer_trait::{
    CatalogImporter, DependencyResolver, FieldMapper, RowValidator,
};
use crate::importer::data_cleaner::DataCleaner as DataCleanerImpl;
use crate::importer::dependency_resolver::DependencyResolver as DependencyResolverImpl;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper as FieldMapperImpl;
use crate::importer::file_parser::{ParsedSheet, UniversalFileParser};
use crate::importer::progress::{ProgressSink, ProgressTracker, TracingProgressSink};
use crate::importer::report_builder::ReportBuilder;
use crate::importer::row_validator::RowValidator as RowValidatorImpl;
use crate::importer::source_file::SourceFile;
use crate::repository::CatalogStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// StageTracker - 运行阶段状态机
// ==========================================
struct StageTracker {
    stage: RunStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: RunStage::Parsing,
        }
    }

    fn advance(&mut self, next: RunStage) {
        if self.stage.is_terminal() {
            warn!(stage = %self.stage, to = %next, "运行已结束，忽略阶段迁移");
            return;
        }
        if !self.stage.can_transition_to(next) {
            // 代码路径固定，出现即为实现错误
            warn!(from = %self.stage, to = %next, "非法阶段迁移");
        }
        debug!(from = %self.stage, to = %next, "阶段迁移");
        self.stage = next;
    }

    fn current(&self) -> RunStage {
        self.stage
    }
}

/// 运行截止时间，越界时退回最长运行时长
fn run_deadline(start: Instant, timeout: Duration) -> Instant {
    start.checked_add(timeout).unwrap_or_else(|| {
        warn!(timeout_secs = timeout.as_secs(), "运行时长越界，使用上限");
        start + Duration::from_secs(RUN_TIMEOUT_SECS_RANGE.1)
    })
}

// ==========================================
// CatalogImporterImpl - 目录导入器实现
// ==========================================
pub struct CatalogImporterImpl {
    // 注入的存储接口
    store: Arc<dyn CatalogStore>,

    // 已校验的导入配置
    config: ImportConfig,

    // 进度接收端
    sink: Arc<dyn ProgressSink>,

    // 导入组件
    file_parser: UniversalFileParser,
    field_mapper: Box<dyn FieldMapper>,
    row_validator: Box<dyn RowValidator>,
    dependency_resolver: Box<dyn DependencyResolver>,
}

impl CatalogImporterImpl {
    /// 使用默认组件创建导入器
    ///
    /// # 参数
    /// - store: 目录存储
    /// - config: 导入配置（创建时校验范围）
    ///
    /// # 返回
    /// - Err(InvalidConfig): 配置超出范围
    pub fn new(store: Arc<dyn CatalogStore>, config: ImportConfig) -> ImportResult<Self> {
        let sink = Arc::new(TracingProgressSink::new(config.enable_progress_log));
        Self::with_components(
            store,
            config,
            sink,
            Box::new(FieldMapperImpl),
            Box::new(RowValidatorImpl::new(Box::new(DataCleanerImpl))),
            Box::new(DependencyResolverImpl),
        )
    }

    /// 使用默认组件和自定义进度接收端
    pub fn with_sink(
        store: Arc<dyn CatalogStore>,
        config: ImportConfig,
        sink: Arc<dyn ProgressSink>,
    ) -> ImportResult<Self> {
        Self::with_components(
            store,
            config,
            sink,
            Box::new(FieldMapperImpl),
            Box::new(RowValidatorImpl::new(Box::new(DataCleanerImpl))),
            Box::new(DependencyResolverImpl),
        )
    }

    /// 创建导入器（全部组件注入）
    pub fn with_components(
        store: Arc<dyn CatalogStore>,
        config: ImportConfig,
        sink: Arc<dyn ProgressSink>,
        field_mapper: Box<dyn FieldMapper>,
        row_validator: Box<dyn RowValidator>,
        dependency_resolver: Box<dyn DependencyResolver>,
    ) -> ImportResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            sink,
            file_parser: UniversalFileParser,
            field_mapper,
            row_validator,
            dependency_resolver,
        })
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// 阶段 0: 大小检查 + 解析
    fn parse_source(&self, source: &SourceFile) -> ImportResult<ParsedSheet> {
        let size = source.size()?;
        if size > self.config.max_upload_bytes {
            return Err(ImportError::FileTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }
        self.file_parser
            .parse(source.path(), self.field_mapper.as_ref())
    }
}

#[async_trait::async_trait]
impl CatalogImporter for CatalogImporterImpl {
    /// 导入一份上传的表格
    ///
    /// # 参数
    /// - source: 源文件（本次调用独占，任一退出路径都会删除）
    ///
    /// # 返回
    /// - Ok(ImportReport): 导入报告（部分失败也在报告内）
    /// - Err: 解析失败（运行进入 Aborted）
    #[instrument(skip(self, source), fields(run_id))]
    async fn import(&self, source: SourceFile) -> ImportResult<ImportReport> {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        let run_started_at = Utc::now();
        let deadline = run_deadline(Instant::now(), self.config.run_timeout());

        let mut stage = StageTracker::new();
        let mut report = ReportBuilder::new(&run_id);

        info!(
            run_id = %run_id,
            file_path = %source.path().display(),
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "开始导入游戏目录"
        );

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let sheet = match self.parse_source(&source) {
            Ok(sheet) => sheet,
            Err(e) => {
                stage.advance(RunStage::Aborted);
                error!(run_id = %run_id, error = %e, "文件解析失败，导入中止");
                return Err(e);
            }
        };
        // 解析完成即释放源文件
        drop(source);
        info!(rows = sheet.rows.len(), "文件解析完成");
        report.record_parse(sheet.warnings);

        // === 步骤 2: 校验/规范化 ===
        stage.advance(RunStage::Validating);
        debug!("步骤 2: 行校验");
        let mut drafts = self.row_validator.validate(&sheet.rows, run_started_at);
        info!(
            valid = drafts.games.len(),
            excluded = drafts.excluded_rows,
            "行校验完成"
        );
        report.record_validation(&mut drafts);

        // === 步骤 3: 依赖解析 ===
        stage.advance(RunStage::Resolving);
        debug!("步骤 3: 依赖解析");
        let mut plan = self
            .dependency_resolver
            .resolve(drafts, self.store.as_ref())
            .await;
        report.record_resolution(&mut plan);

        let engine = BatchUpsertEngine::new(self.store.clone(), &self.config, self.sink.clone());
        let mut tracker = ProgressTracker::new(&run_id);

        // === 步骤 4: 写入分类 + 游戏 ===
        stage.advance(RunStage::PersistingGames);
        debug!(workers = engine.workers(), "步骤 4: 写入分类与游戏");
        let category_results = engine
            .run_batches(
                engine.plan(&plan.categories, UpsertBatch::Categories),
                deadline,
                &mut tracker,
            )
            .await;
        report.record_batches(&category_results);

        let game_results = engine
            .run_batches(
                engine.plan(&plan.games, UpsertBatch::Games),
                deadline,
                &mut tracker,
            )
            .await;
        report.record_batches(&game_results);

        // 父游戏结果决定依赖记录放行或跳过
        let released = plan.release_dependents(&parent_states(&game_results));
        if !released.skipped.is_empty() {
            warn!(skipped = released.skipped.len(), "父游戏未落库，依赖记录已跳过");
        }
        report.record_skipped(released.skipped);

        // === 步骤 5: 写入标签 ===
        stage.advance(RunStage::PersistingTags);
        debug!(tags = released.tags.len(), "步骤 5: 写入标签");
        let tag_results = engine
            .run_batches(
                engine.plan(&released.tags, UpsertBatch::Tags),
                deadline,
                &mut tracker,
            )
            .await;
        report.record_batches(&tag_results);

        // === 步骤 6: 写入推荐位 ===
        stage.advance(RunStage::PersistingHero);
        debug!(hero_slots = released.hero_slots.len(), "步骤 6: 写入推荐位");
        let hero_results = engine
            .run_batches(
                engine.plan(&released.hero_slots, UpsertBatch::HeroSlots),
                deadline,
                &mut tracker,
            )
            .await;
        report.record_batches(&hero_results);

        if report.timed_out() {
            warn!(run_id = %run_id, "导入运行超时，结果为部分完成");
        }

        stage.advance(RunStage::Completed);
        let report = report.build(stage.current());

        info!(
            run_id = %run_id,
            success = report.success,
            read = report.totals.read,
            committed = report.totals.committed,
            failed = report.totals.failed,
            excluded = report.totals.excluded,
            elapsed_ms = report.elapsed_ms,
            "导入完成"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_deadline_never_overflows() {
        let start = Instant::now();
        assert_eq!(
            run_deadline(start, Duration::from_secs(5)),
            start + Duration::from_secs(5)
        );

        let capped = run_deadline(start, Duration::MAX);
        assert_eq!(
            capped,
            start + Duration::from_secs(RUN_TIMEOUT_SECS_RANGE.1)
        );
    }

    #[test]
    fn test_stage_tracker_walks_pipeline() {
        let mut stage = StageTracker::new();
        for next in [
            RunStage::Validating,
            RunStage::Resolving,
            RunStage::PersistingGames,
            RunStage::PersistingTags,
            RunStage::PersistingHero,
            RunStage::Completed,
        ] {
            assert!(stage.current().can_transition_to(next));
            stage.advance(next);
        }
        assert!(stage.current().is_terminal());
    }
}
