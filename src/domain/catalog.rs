// ==========================================
// 游戏目录站 - 目录领域模型
// ==========================================
// 职责: 游戏条目 / 标签关联 / 分类配置 / 推荐位
// 外键约定: 依赖实体一律以 slug（业务键）引用父游戏
// ==========================================

use crate::domain::types::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// GameRecord - 游戏条目
// ==========================================
// 唯一键: slug（全库唯一，不仅是本次上传）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub embed_url: String,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub category: String, // 分类键
    pub is_new: bool,
    pub is_hot: bool,
    pub is_original: bool,
    pub instructions: String,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// TagAssociation - 标签关联
// ==========================================
// 唯一键: (game_slug, tag)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagAssociation {
    pub game_slug: String,
    pub tag: String,
}

// ==========================================
// CategoryConfig - 分类配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub category_key: String,
    pub title: String,
    pub show_on_home: bool,
    pub display_order: i64,
    pub max_games: i64,
}

/// 分类首页默认展示数量
pub const DEFAULT_CATEGORY_MAX_GAMES: i64 = 12;

// ==========================================
// HeroSlot - 首页推荐位
// ==========================================
// 唯一键: game_slug，必须能解析到已存在的游戏
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroSlot {
    pub game_slug: String,
    pub display_order: i64,
    pub active: bool,
}

// ==========================================
// Draft<T> - 带来源行号的待写入记录
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct Draft<T> {
    pub row_index: usize,
    pub record: T,
}

impl<T> Draft<T> {
    pub fn new(row_index: usize, record: T) -> Self {
        Self { row_index, record }
    }
}

// ==========================================
// UpsertBatch - 一次写入调用的载荷
// ==========================================
#[derive(Debug, Clone)]
pub enum UpsertBatch {
    Games(Vec<GameRecord>),
    Categories(Vec<CategoryConfig>),
    Tags(Vec<TagAssociation>),
    HeroSlots(Vec<HeroSlot>),
}

impl UpsertBatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            UpsertBatch::Games(_) => EntityKind::Game,
            UpsertBatch::Categories(_) => EntityKind::Category,
            UpsertBatch::Tags(_) => EntityKind::Tag,
            UpsertBatch::HeroSlots(_) => EntityKind::HeroSlot,
        }
    }

    /// 冲突键，与 kind 一一对应
    pub fn unique_key(&self) -> &'static [&'static str] {
        self.kind().unique_key()
    }

    pub fn len(&self) -> usize {
        match self {
            UpsertBatch::Games(v) => v.len(),
            UpsertBatch::Categories(v) => v.len(),
            UpsertBatch::Tags(v) => v.len(),
            UpsertBatch::HeroSlots(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 每条记录的业务键（用于日志与报告）
    pub fn record_keys(&self) -> Vec<String> {
        match self {
            UpsertBatch::Games(v) => v.iter().map(|g| g.slug.clone()).collect(),
            UpsertBatch::Categories(v) => v.iter().map(|c| c.category_key.clone()).collect(),
            UpsertBatch::Tags(v) => v
                .iter()
                .map(|t| format!("{}#{}", t.game_slug, t.tag))
                .collect(),
            UpsertBatch::HeroSlots(v) => v.iter().map(|h| h.game_slug.clone()).collect(),
        }
    }
}

// ==========================================
// RecordOutcome - 单条记录写入结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOutcome {
    Inserted,
    Updated,
    Rejected(String),
}

impl RecordOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, RecordOutcome::Inserted | RecordOutcome::Updated)
    }
}
