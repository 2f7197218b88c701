// ==========================================
// 游戏目录站 - 导入报告模型
// ==========================================
// 用途: 导入接口返回值（每次调用恰好一份）
// 序列化: camelCase JSON，供上传接口直接返回
// ==========================================

use crate::domain::types::{EntityKind, RunStage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ImportReport - 导入结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub run_id: String,
    /// 游戏批次零失败且未因超时遗漏游戏批次
    pub success: bool,
    pub timed_out: bool,
    pub stage: RunStage,
    pub totals: ImportTotals,
    pub entities: BTreeMap<EntityKind, EntityCounts>,
    pub errors: Vec<RowError>,
    pub warnings: Vec<ImportWarning>,
    pub batches: Vec<BatchReport>,
    pub elapsed_ms: u64,
}

impl ImportReport {
    pub fn entity(&self, kind: EntityKind) -> EntityCounts {
        self.entities.get(&kind).cloned().unwrap_or_default()
    }

    pub fn batches_of(&self, kind: EntityKind) -> impl Iterator<Item = &BatchReport> {
        self.batches.iter().filter(move |b| b.kind == kind)
    }

    pub fn errors_for_row(&self, row_index: usize) -> impl Iterator<Item = &RowError> {
        self.errors.iter().filter(move |e| e.row_index == row_index)
    }
}

// ==========================================
// ImportTotals - 行级汇总（以表格数据行为单位）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTotals {
    pub read: usize,          // 读取的非空数据行
    pub validated: usize,     // 校验通过
    pub excluded: usize,      // 校验失败被剔除
    pub duplicates: usize,    // 同一上传内重复 slug 被覆盖
    pub committed: usize,     // 游戏条目已落库
    pub failed: usize,        // 游戏条目写入失败
    pub not_attempted: usize, // 因超时未尝试
}

// ==========================================
// EntityCounts - 按实体种类的计数
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCounts {
    pub attempted: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl EntityCounts {
    pub fn committed(&self) -> usize {
        self.inserted + self.updated
    }
}

// ==========================================
// RowError - 行级错误
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row_index: usize,
    pub field: String,
    pub reason: String,
    pub kind: RowErrorKind,
    pub entity: EntityKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorKind {
    /// 校验失败，行被剔除
    Validation,
    /// 写入失败（独立失败）
    Store,
    /// 父游戏失败，依赖记录被跳过
    Skipped,
    /// 运行超时，未尝试写入
    Timeout,
}

// ==========================================
// ImportWarning - 警告
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportWarning {
    pub row_index: Option<usize>,
    pub code: WarningCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// 表头重复映射到同一列
    DuplicateColumn,
    /// 派生 slug 冲突，已追加数字后缀
    SlugSuffixed,
    /// 显式 slug 被规范化
    SlugNormalized,
    /// 同一上传内重复 slug，后行覆盖前行
    DuplicateSlug,
    /// 标记值无法识别，按 false 处理
    InvalidFlag,
}

// ==========================================
// BatchReport - 批次执行记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub kind: EntityKind,
    pub batch_no: usize, // 同种实体内从 1 开始
    pub size: usize,
    pub attempts: u32,
    pub retries: u32,
    pub status: BatchStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// 全部记录写入
    Committed,
    /// 批次写入成功但部分记录被拒绝
    Partial,
    /// 重试耗尽或永久错误
    Failed,
    /// 超时后未开始
    NotStarted,
}
