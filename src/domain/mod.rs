// ==========================================
// 游戏目录站 - 领域模型层
// ==========================================
// 职责: 定义目录实体、导入报告、运行阶段
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod catalog;
pub mod import_report;
pub mod types;

// 重导出核心类型
pub use catalog::{
    CategoryConfig, Draft, GameRecord, HeroSlot, RecordOutcome, TagAssociation, UpsertBatch,
    DEFAULT_CATEGORY_MAX_GAMES,
};
pub use import_report::{
    BatchReport, BatchStatus, EntityCounts, ImportReport, ImportTotals, ImportWarning, RowError,
    RowErrorKind, WarningCode,
};
pub use types::{EntityKind, RunStage};
