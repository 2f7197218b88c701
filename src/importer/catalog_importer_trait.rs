// ==========================================
// 游戏目录站 - 目录导入 Trait
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// 管道: 解析 → 表头映射 → 清洗/校验 → 依赖解析 → 批量写入 → 报告
// ==========================================

use crate::domain::ImportReport;
use crate::importer::dependency_resolver::ResolvedPlan;
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::HeaderMapping;
use crate::importer::file_parser::{RawRow, SheetGrid};
use crate::importer::row_validator::ValidatedDrafts;
use crate::importer::source_file::SourceFile;
use crate::repository::CatalogStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

// ==========================================
// CatalogImporter Trait
// ==========================================
// 用途: 目录导入主接口
// 实现者: CatalogImporterImpl
#[async_trait]
pub trait CatalogImporter: Send + Sync {
    /// 导入一份上传的表格
    ///
    /// # 参数
    /// - source: 独占的源文件，导入结束时删除
    ///
    /// # 返回
    /// - Ok(ImportReport): 每次调用恰好一份报告（含部分失败）
    /// - Err: 仅解析阶段致命错误 / 配置无效
    async fn import(&self, source: SourceFile) -> ImportResult<ImportReport>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 0）
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 读取第一个工作表为单元格网格（首个非空行为表头）
    ///
    /// # 返回
    /// - Ok(SheetGrid): 表头 + 带行号的数据行
    /// - Err: 文件无法按表格解码
    fn read_grid(&self, path: &Path) -> ImportResult<SheetGrid>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 表头 → 标准列映射（阶段 1）
// 实现者: FieldMapper
pub trait FieldMapper: Send + Sync {
    /// 映射表头
    ///
    /// # 返回
    /// - Ok(HeaderMapping): 每个表头位置对应的标准列（未知列为 None）
    /// - Err: 表头缺失或缺少必需列
    fn map_headers(&self, headers: &[String]) -> ImportResult<HeaderMapping>;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// 用途: 单元格清洗/解析接口（阶段 2）
// 实现者: DataCleaner
// 约定: Err(String) 为面向用户的行级原因
pub trait DataCleaner: Send + Sync {
    /// 生成 slug（小写，仅保留 [a-z0-9-]，合并连续连字符，去首尾连字符）
    fn slugify(&self, text: &str) -> String;

    /// 解析布尔标记（空值为 false）
    fn parse_flag(&self, value: Option<&str>) -> Result<bool, String>;

    /// 校验嵌入链接（必须是绝对 http(s) 地址）
    fn clean_embed_url(&self, value: &str) -> Result<String, String>;

    /// 校验图片链接（绝对 http(s) 地址或站内根路径）
    fn clean_asset_url(&self, value: &str) -> Result<String, String>;

    /// 解析发布日期
    fn parse_publish_date(&self, value: &str) -> Result<DateTime<Utc>, String>;

    /// 解析非负排序值
    fn parse_display_order(&self, value: &str) -> Result<i64, String>;

    /// 拆分标签列表（去重、小写）
    fn split_tags(&self, value: &str) -> Vec<String>;
}

// ==========================================
// RowValidator Trait
// ==========================================
// 用途: 原始行 → 类型化草稿（阶段 2）
// 实现者: RowValidator
pub trait RowValidator: Send + Sync {
    /// 校验并规范化所有行
    ///
    /// # 参数
    /// - rows: 解析出的原始行
    /// - run_started_at: 本次运行时间戳（缺省发布时间 / updated_at）
    ///
    /// # 返回
    /// - ValidatedDrafts: 草稿 + 行级错误 + 警告（不会失败）
    fn validate(&self, rows: &[RawRow], run_started_at: DateTime<Utc>) -> ValidatedDrafts;
}

// ==========================================
// DependencyResolver Trait
// ==========================================
// 用途: 去重 + 按父游戏分组依赖记录（阶段 3）
// 实现者: DependencyResolver
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// 生成写入计划
    ///
    /// # 参数
    /// - drafts: 校验通过的草稿
    /// - store: 用于查询已落库 slug（只读）
    async fn resolve(&self, drafts: ValidatedDrafts, store: &dyn CatalogStore) -> ResolvedPlan;
}
