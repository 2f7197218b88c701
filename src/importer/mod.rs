// ==========================================
// 游戏目录站 - 导入层
// ==========================================
// 职责: 上传表格 → 目录数据（游戏 / 分类 / 标签 / 推荐位）
// 支持: CSV, Excel, ODS
// ==========================================

// 模块声明
pub mod batch_upsert;
pub mod catalog_importer_impl;
pub mod catalog_importer_trait;
pub mod data_cleaner;
pub mod dependency_resolver;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod progress;
pub mod report_builder;
pub mod retry_policy;
pub mod row_validator;
pub mod source_file;

// 重导出核心类型
pub use batch_upsert::{BatchResult, BatchUpsertEngine, PlannedBatch};
pub use catalog_importer_impl::CatalogImporterImpl;
pub use data_cleaner::DataCleaner as DataCleanerImpl;
pub use dependency_resolver::{
    DependencyResolver as DependencyResolverImpl, ParentState, ResolvedPlan,
};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{Column, FieldMapper as FieldMapperImpl, HeaderMapping};
pub use file_parser::{CsvParser, ExcelParser, ParsedSheet, RawRow, UniversalFileParser};
pub use progress::{NoOpProgressSink, ProgressEvent, ProgressSink, TracingProgressSink};
pub use report_builder::ReportBuilder;
pub use retry_policy::RetryPolicy;
pub use row_validator::{RowValidator as RowValidatorImpl, ValidatedDrafts};
pub use source_file::SourceFile;

// 重导出 Trait 接口
pub use catalog_importer_trait::{
    CatalogImporter, DataCleaner, DependencyResolver, FieldMapper, FileParser, RowValidator,
};
