// ==========================================
// 游戏目录站 - 领域类型定义
// ==========================================
// 职责: 实体种类、导入运行阶段
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 实体种类 (Entity Kind)
// ==========================================
// 每种实体对应一张表和一个唯一键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Game,
    Category,
    Tag,
    HeroSlot,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Game,
        EntityKind::Category,
        EntityKind::Tag,
        EntityKind::HeroSlot,
    ];

    /// 表名
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Game => "games",
            EntityKind::Category => "category_config",
            EntityKind::Tag => "game_tags",
            EntityKind::HeroSlot => "hero_slots",
        }
    }

    /// upsert 冲突键（列名列表）
    pub fn unique_key(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Game => &["slug"],
            EntityKind::Category => &["category_key"],
            EntityKind::Tag => &["game_slug", "tag"],
            EntityKind::HeroSlot => &["game_slug"],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Game => write!(f, "game"),
            EntityKind::Category => write!(f, "category"),
            EntityKind::Tag => write!(f, "tag"),
            EntityKind::HeroSlot => write!(f, "hero_slot"),
        }
    }
}

// ==========================================
// 导入运行阶段 (Run Stage)
// ==========================================
// Parsing → Validating → Resolving → PersistingGames → PersistingTags
//   → PersistingHero → Completed
// Aborted 只能从 Parsing 进入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Parsing,
    Validating,
    Resolving,
    PersistingGames,
    PersistingTags,
    PersistingHero,
    Completed,
    Aborted,
}

impl RunStage {
    /// 判断阶段迁移是否合法
    pub fn can_transition_to(&self, next: RunStage) -> bool {
        use RunStage::*;
        matches!(
            (self, next),
            (Parsing, Validating)
                | (Parsing, Aborted)
                | (Validating, Resolving)
                | (Resolving, PersistingGames)
                | (PersistingGames, PersistingTags)
                | (PersistingTags, PersistingHero)
                | (PersistingHero, Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Completed | RunStage::Aborted)
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Parsing => "PARSING",
            RunStage::Validating => "VALIDATING",
            RunStage::Resolving => "RESOLVING",
            RunStage::PersistingGames => "PERSISTING_GAMES",
            RunStage::PersistingTags => "PERSISTING_TAGS",
            RunStage::PersistingHero => "PERSISTING_HERO",
            RunStage::Completed => "COMPLETED",
            RunStage::Aborted => "ABORTED",
        };
        write!(f, "{}", s)
    }
}
