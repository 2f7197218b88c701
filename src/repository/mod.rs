// ==========================================
// 游戏目录站 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供目录存储接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod catalog_store;
pub mod error;
pub mod sqlite_catalog_store;

// 重导出核心仓储
pub use catalog_store::CatalogStore;
pub use error::{StoreError, StoreResult};
pub use sqlite_catalog_store::{SqliteCatalogStore, DEFAULT_POOL_SIZE};
