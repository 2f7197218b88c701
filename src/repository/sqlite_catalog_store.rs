// ==========================================
// 游戏目录站 - SQLite 目录存储实现
// ==========================================
// 职责: CatalogStore 的 rusqlite 实现
// 策略: 每批一个事务，INSERT ... ON CONFLICT DO UPDATE
// 并发: 固定大小连接池（WAL），操作在 spawn_blocking 中执行，max_concurrent_writers = 池大小
// ==========================================

use crate::db::{enable_wal, init_catalog_schema, open_sqlite_connection};
use crate::domain::{
    CategoryConfig, EntityKind, GameRecord, HeroSlot, RecordOutcome, TagAssociation, UpsertBatch,
};
use crate::repository::catalog_store::CatalogStore;
use crate::repository::error::{StoreError, StoreResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Params, Transaction, TransactionBehavior};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// 默认连接池大小
pub const DEFAULT_POOL_SIZE: usize = 4;

// ==========================================
// SqliteCatalogStore
// ==========================================
pub struct SqliteCatalogStore {
    pool: Vec<Arc<Mutex<Connection>>>,
    next: AtomicUsize,
}

impl SqliteCatalogStore {
    /// 打开数据库并初始化目录表
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - pool_size: 连接数（至少 1）
    pub fn new(db_path: &str, pool_size: usize) -> StoreResult<Self> {
        let pool_size = pool_size.max(1);
        let mut pool = Vec::with_capacity(pool_size);

        for idx in 0..pool_size {
            let conn = open_sqlite_connection(db_path)?;
            if idx == 0 {
                enable_wal(&conn)?;
                init_catalog_schema(&conn)?;
            }
            pool.push(Arc::new(Mutex::new(conn)));
        }

        debug!(db_path = %db_path, pool_size, "目录存储已打开");
        Ok(Self {
            pool,
            next: AtomicUsize::new(0),
        })
    }

    /// 在阻塞线程池上使用一个连接执行同步操作
    async fn with_connection<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(self.connection());
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::LockError(e.to_string()))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Other(anyhow::Error::new(e).context("存储任务执行失败")))?
    }

    /// 轮询取一个连接
    fn connection(&self) -> &Arc<Mutex<Connection>> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        &self.pool[idx]
    }

    fn exists<P: Params>(tx: &Transaction, sql: &str, key: P) -> StoreResult<bool> {
        let found = tx
            .prepare_cached(sql)?
            .query_row(key, |_row| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// 执行单条写入，永久错误转为 Rejected，瞬时错误向上抛出
    fn record_outcome(
        existed: bool,
        result: rusqlite::Result<usize>,
    ) -> StoreResult<RecordOutcome> {
        match result {
            Ok(_) if existed => Ok(RecordOutcome::Updated),
            Ok(_) => Ok(RecordOutcome::Inserted),
            Err(e) => {
                let err = StoreError::from(e);
                if err.is_transient() {
                    Err(err)
                } else {
                    Ok(RecordOutcome::Rejected(err.to_string()))
                }
            }
        }
    }

    fn upsert_games_tx(tx: &Transaction, games: &[GameRecord]) -> StoreResult<Vec<RecordOutcome>> {
        let mut outcomes = Vec::with_capacity(games.len());
        for game in games {
            let existed = Self::exists(tx, "SELECT 1 FROM games WHERE slug = ?1", params![game.slug])?;
            let result = tx
                .prepare_cached(
                    r#"
                    INSERT INTO games (
                        slug, title, description, embed_url, image_url, thumbnail_url,
                        category, is_new, is_hot, is_original, instructions,
                        published_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    ON CONFLICT(slug) DO UPDATE SET
                        title = excluded.title,
                        description = excluded.description,
                        embed_url = excluded.embed_url,
                        image_url = excluded.image_url,
                        thumbnail_url = excluded.thumbnail_url,
                        category = excluded.category,
                        is_new = excluded.is_new,
                        is_hot = excluded.is_hot,
                        is_original = excluded.is_original,
                        instructions = excluded.instructions,
                        published_at = excluded.published_at,
                        updated_at = excluded.updated_at
                    "#,
                )?
                .execute(params![
                    game.slug,
                    game.title,
                    game.description,
                    game.embed_url,
                    game.image_url,
                    game.thumbnail_url,
                    game.category,
                    game.is_new as i32,
                    game.is_hot as i32,
                    game.is_original as i32,
                    game.instructions,
                    game.published_at.to_rfc3339(),
                    game.updated_at.to_rfc3339(),
                ]);
            outcomes.push(Self::record_outcome(existed, result)?);
        }
        Ok(outcomes)
    }

    fn upsert_categories_tx(
        tx: &Transaction,
        categories: &[CategoryConfig],
    ) -> StoreResult<Vec<RecordOutcome>> {
        let mut outcomes = Vec::with_capacity(categories.len());
        for category in categories {
            let existed = Self::exists(
                tx,
                "SELECT 1 FROM category_config WHERE category_key = ?1",
                params![category.category_key],
            )?;
            // 冲突时只刷新标题，保留首页展示相关的人工设置
            let result = tx
                .prepare_cached(
                    r#"
                    INSERT INTO category_config (
                        category_key, title, show_on_home, display_order, max_games
                    ) VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(category_key) DO UPDATE SET
                        title = excluded.title
                    "#,
                )?
                .execute(params![
                    category.category_key,
                    category.title,
                    category.show_on_home as i32,
                    category.display_order,
                    category.max_games,
                ]);
            outcomes.push(Self::record_outcome(existed, result)?);
        }
        Ok(outcomes)
    }

    fn upsert_tags_tx(tx: &Transaction, tags: &[TagAssociation]) -> StoreResult<Vec<RecordOutcome>> {
        let mut outcomes = Vec::with_capacity(tags.len());
        for tag in tags {
            let existed = Self::exists(
                tx,
                "SELECT 1 FROM game_tags WHERE game_slug = ?1 AND tag = ?2",
                params![tag.game_slug, tag.tag],
            )?;
            let result = tx
                .prepare_cached(
                    r#"
                    INSERT INTO game_tags (game_slug, tag) VALUES (?1, ?2)
                    ON CONFLICT(game_slug, tag) DO NOTHING
                    "#,
                )?
                .execute(params![tag.game_slug, tag.tag]);
            outcomes.push(Self::record_outcome(existed, result)?);
        }
        Ok(outcomes)
    }

    fn upsert_hero_slots_tx(
        tx: &Transaction,
        slots: &[HeroSlot],
    ) -> StoreResult<Vec<RecordOutcome>> {
        let mut outcomes = Vec::with_capacity(slots.len());
        for slot in slots {
            let existed = Self::exists(
                tx,
                "SELECT 1 FROM hero_slots WHERE game_slug = ?1",
                params![slot.game_slug],
            )?;
            let result = tx
                .prepare_cached(
                    r#"
                    INSERT INTO hero_slots (game_slug, display_order, active) VALUES (?1, ?2, ?3)
                    ON CONFLICT(game_slug) DO UPDATE SET
                        display_order = excluded.display_order,
                        active = excluded.active
                    "#,
                )?
                .execute(params![slot.game_slug, slot.display_order, slot.active as i32]);
            outcomes.push(Self::record_outcome(existed, result)?);
        }
        Ok(outcomes)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn upsert(&self, batch: &UpsertBatch) -> StoreResult<Vec<RecordOutcome>> {
        let batch = batch.clone();
        self.with_connection(move |conn| {
            // IMMEDIATE: 开始即取写锁，并发写入在 busy_timeout 内排队
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let outcomes = match &batch {
                UpsertBatch::Games(v) => Self::upsert_games_tx(&tx, v)?,
                UpsertBatch::Categories(v) => Self::upsert_categories_tx(&tx, v)?,
                UpsertBatch::Tags(v) => Self::upsert_tags_tx(&tx, v)?,
                UpsertBatch::HeroSlots(v) => Self::upsert_hero_slots_tx(&tx, v)?,
            };
            tx.commit()?;

            debug!(
                kind = %batch.kind(),
                unique_key = ?batch.unique_key(),
                size = batch.len(),
                "批次写入提交"
            );
            Ok(outcomes)
        })
        .await
    }

    async fn existing_slugs(&self, slugs: &[String]) -> StoreResult<Vec<String>> {
        let slugs = slugs.to_vec();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare_cached("SELECT slug FROM games WHERE slug = ?1")?;
            let mut existing = Vec::new();
            for slug in &slugs {
                if let Some(found) = stmt
                    .query_row([slug], |row| row.get::<_, String>(0))
                    .optional()?
                {
                    existing.push(found);
                }
            }
            Ok(existing)
        })
        .await
    }

    async fn count(&self, kind: EntityKind) -> StoreResult<u64> {
        self.with_connection(move |conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    fn max_concurrent_writers(&self) -> usize {
        self.pool.len()
    }
}
