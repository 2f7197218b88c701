// ==========================================
// 游戏目录站 - 表格批量导入核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 上传表格 → 游戏 / 分类 / 标签 / 推荐位 的一致写入
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与报告
pub mod domain;

// 数据仓储层 - 目录存储
pub mod repository;

// 导入层 - 表格导入管道
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{EntityKind, ImportReport, RunStage};

// 配置
pub use config::{ConfigManager, ImportConfig, LogLevel};

// 导入
pub use importer::{CatalogImporter, CatalogImporterImpl, ImportError, SourceFile};

// 存储
pub use repository::{CatalogStore, SqliteCatalogStore};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "游戏目录站导入管道";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
