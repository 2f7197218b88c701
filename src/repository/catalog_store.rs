// ==========================================
// 游戏目录站 - 目录存储 Trait
// ==========================================
// 职责: 定义导入管道消费的存储接口（不包含实现）
// 红线: 存储层不含业务规则，只做 upsert / 计数 / 查询
// 注入: 管道通过构造参数接收 Arc<dyn CatalogStore>，不读取全局客户端
// ==========================================

use crate::domain::{EntityKind, RecordOutcome, UpsertBatch};
use crate::repository::error::StoreResult;
use async_trait::async_trait;

// ==========================================
// CatalogStore Trait
// ==========================================
// 实现者: SqliteCatalogStore（使用 rusqlite）
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// 幂等写入一批记录（按 batch.unique_key() 插入或更新）
    ///
    /// # 返回
    /// - Ok(Vec<RecordOutcome>): 与输入记录一一对应的结果
    /// - Err(StoreError): 整批失败（瞬时错误可重试）
    ///
    /// # 约定
    /// - 重复提交同一批次不产生重复行
    /// - 单条记录被拒绝不影响同批次其他记录
    async fn upsert(&self, batch: &UpsertBatch) -> StoreResult<Vec<RecordOutcome>>;

    /// 查询已存在的游戏 slug
    ///
    /// # 返回
    /// - 输入中已落库的 slug 子集
    async fn existing_slugs(&self, slugs: &[String]) -> StoreResult<Vec<String>>;

    /// 统计某类实体的行数（只读）
    async fn count(&self, kind: EntityKind) -> StoreResult<u64>;

    /// 存储可安全承受的并发写入数
    fn max_concurrent_writers(&self) -> usize;
}
