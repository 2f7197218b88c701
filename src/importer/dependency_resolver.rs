// ==========================================
// 游戏目录站 - 依赖解析器
// ==========================================
// 职责:
// - 同一上传内重复 slug 去重（后行覆盖前行，记录警告）
// - 按父游戏 slug 分组标签/推荐位，父游戏失败时整组跳过
// - 查询已落库 slug，预估新增/更新数量
// ==========================================

use crate::domain::{
    CategoryConfig, Draft, EntityKind, GameRecord, HeroSlot, ImportWarning, RowError,
    RowErrorKind, TagAssociation, WarningCode,
};
use crate::importer::catalog_importer_trait::DependencyResolver as DependencyResolverTrait;
use crate::importer::report_builder::{SKIPPED_PARENT_FAILED, SKIPPED_PARENT_NOT_ATTEMPTED};
use crate::importer::row_validator::ValidatedDrafts;
use crate::repository::CatalogStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

// ==========================================
// ParentState - 父游戏写入结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentState {
    Committed,
    Failed,
    NotAttempted,
}

// ==========================================
// DependentGroup - 同一父游戏的依赖记录
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct DependentGroup {
    pub tags: Vec<Draft<TagAssociation>>,
    pub hero: Option<Draft<HeroSlot>>,
}

// ==========================================
// ResolvedPlan - 写入计划
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ResolvedPlan {
    pub categories: Vec<Draft<CategoryConfig>>,
    /// 去重后的游戏（按行号排序）
    pub games: Vec<Draft<GameRecord>>,
    /// 父 slug → 依赖记录
    pub dependents: BTreeMap<String, DependentGroup>,
    pub duplicates: usize,
    pub warnings: Vec<ImportWarning>,
}

/// 按父游戏状态放行的依赖记录
#[derive(Debug, Clone, Default)]
pub struct ReleasedDependents {
    pub tags: Vec<Draft<TagAssociation>>,
    pub hero_slots: Vec<Draft<HeroSlot>>,
    pub skipped: Vec<RowError>,
}

impl ResolvedPlan {
    pub fn tag_count(&self) -> usize {
        self.dependents.values().map(|g| g.tags.len()).sum()
    }

    pub fn hero_count(&self) -> usize {
        self.dependents.values().filter(|g| g.hero.is_some()).count()
    }

    /// 父游戏已提交的依赖放行，其余整组记为 skipped
    pub fn release_dependents(&self, parents: &HashMap<String, ParentState>) -> ReleasedDependents {
        let mut released = ReleasedDependents::default();

        for (slug, group) in &self.dependents {
            let state = parents
                .get(slug)
                .copied()
                .unwrap_or(ParentState::Failed);

            if state == ParentState::Committed {
                released.tags.extend(group.tags.iter().cloned());
                released.hero_slots.extend(group.hero.iter().cloned());
                continue;
            }

            let reason = match state {
                ParentState::NotAttempted => SKIPPED_PARENT_NOT_ATTEMPTED,
                _ => SKIPPED_PARENT_FAILED,
            };
            for tag in &group.tags {
                released.skipped.push(RowError {
                    row_index: tag.row_index,
                    field: "tags".to_string(),
                    reason: format!("{} (tag '{}')", reason, tag.record.tag),
                    kind: RowErrorKind::Skipped,
                    entity: EntityKind::Tag,
                });
            }
            if let Some(hero) = &group.hero {
                released.skipped.push(RowError {
                    row_index: hero.row_index,
                    field: "hero".to_string(),
                    reason: reason.to_string(),
                    kind: RowErrorKind::Skipped,
                    entity: EntityKind::HeroSlot,
                });
            }
        }

        released
    }
}

// ==========================================
// DependencyResolver 实现
// ==========================================
pub struct DependencyResolver;

impl DependencyResolver {
    /// 后行覆盖前行；返回 (保留的游戏, slug → 生效行号, 重复数, 警告)
    fn dedupe_games(
        games: Vec<Draft<GameRecord>>,
    ) -> (Vec<Draft<GameRecord>>, HashMap<String, usize>, usize, Vec<ImportWarning>) {
        let mut winners: HashMap<String, Draft<GameRecord>> = HashMap::new();
        let mut warnings = Vec::new();
        let mut duplicates = 0;

        for draft in games {
            let slug = draft.record.slug.clone();
            if let Some(previous) = winners.insert(slug.clone(), draft) {
                duplicates += 1;
                let winner_row = winners.get(&slug).map(|d| d.row_index).unwrap_or_default();
                warnings.push(ImportWarning {
                    row_index: Some(previous.row_index),
                    code: WarningCode::DuplicateSlug,
                    message: format!(
                        "slug '{}' repeated; row {} overrides row {}",
                        slug, winner_row, previous.row_index
                    ),
                });
            }
        }

        let winner_rows: HashMap<String, usize> = winners
            .iter()
            .map(|(slug, draft)| (slug.clone(), draft.row_index))
            .collect();
        let mut kept: Vec<Draft<GameRecord>> = winners.into_values().collect();
        kept.sort_by_key(|d| d.row_index);

        (kept, winner_rows, duplicates, warnings)
    }
}

#[async_trait]
impl DependencyResolverTrait for DependencyResolver {
    async fn resolve(&self, drafts: ValidatedDrafts, store: &dyn CatalogStore) -> ResolvedPlan {
        let ValidatedDrafts {
            games,
            tags,
            hero_slots,
            categories,
            ..
        } = drafts;

        let (games, winner_rows, duplicates, warnings) = Self::dedupe_games(games);

        // 依赖记录只跟随生效行
        let mut dependents: BTreeMap<String, DependentGroup> = BTreeMap::new();
        for tag in tags {
            if winner_rows.get(&tag.record.game_slug) == Some(&tag.row_index) {
                dependents
                    .entry(tag.record.game_slug.clone())
                    .or_default()
                    .tags
                    .push(tag);
            }
        }
        for hero in hero_slots {
            if winner_rows.get(&hero.record.game_slug) == Some(&hero.row_index) {
                let slug = hero.record.game_slug.clone();
                dependents.entry(slug).or_default().hero = Some(hero);
            }
        }

        let slugs: Vec<String> = games.iter().map(|g| g.record.slug.clone()).collect();
        let existing_slugs: HashSet<String> = if slugs.is_empty() {
            HashSet::new()
        } else {
            match store.existing_slugs(&slugs).await {
                Ok(found) => found.into_iter().collect(),
                Err(e) => {
                    // 只影响预估日志，写入仍按 upsert 结果统计
                    warn!(error = %e, "查询已存在 slug 失败");
                    HashSet::new()
                }
            }
        };

        info!(
            games = games.len(),
            expected_inserts = games.len().saturating_sub(existing_slugs.len()),
            expected_updates = existing_slugs.len(),
            duplicates,
            "依赖解析完成"
        );

        let plan = ResolvedPlan {
            categories,
            games,
            dependents,
            duplicates,
            warnings,
        };
        debug!(tags = plan.tag_count(), hero_slots = plan.hero_count(), "依赖分组完成");
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SqliteCatalogStore;
    use chrono::Utc;

    fn game(row_index: usize, slug: &str, title: &str) -> Draft<GameRecord> {
        let now = Utc::now();
        Draft::new(
            row_index,
            GameRecord {
                slug: slug.to_string(),
                title: title.to_string(),
                description: String::new(),
                embed_url: "https://play.example.com/embed".to_string(),
                image_url: None,
                thumbnail_url: None,
                category: "arcade".to_string(),
                is_new: false,
                is_hot: false,
                is_original: false,
                instructions: String::new(),
                published_at: now,
                updated_at: now,
            },
        )
    }

    fn tag(row_index: usize, slug: &str, tag: &str) -> Draft<TagAssociation> {
        Draft::new(
            row_index,
            TagAssociation {
                game_slug: slug.to_string(),
                tag: tag.to_string(),
            },
        )
    }

    #[test]
    fn test_dedupe_last_row_wins() {
        let games = vec![
            game(2, "space-run", "Old"),
            game(3, "cave", "Cave"),
            game(4, "space-run", "New"),
        ];

        let (kept, winners, duplicates, warnings) = DependencyResolver::dedupe_games(games);

        assert_eq!(duplicates, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].record.slug, "cave");
        assert_eq!(kept[1].record.title, "New");
        assert_eq!(winners.get("space-run"), Some(&4));
        assert_eq!(warnings[0].row_index, Some(2));
        assert_eq!(warnings[0].code, WarningCode::DuplicateSlug);
    }

    #[test]
    fn test_release_dependents_skips_failed_parents() {
        let mut plan = ResolvedPlan::default();
        plan.dependents.insert(
            "ok".to_string(),
            DependentGroup {
                tags: vec![tag(2, "ok", "puzzle")],
                hero: None,
            },
        );
        plan.dependents.insert(
            "bad".to_string(),
            DependentGroup {
                tags: vec![tag(3, "bad", "puzzle"), tag(3, "bad", "arcade")],
                hero: Some(Draft::new(
                    3,
                    HeroSlot {
                        game_slug: "bad".to_string(),
                        display_order: 1,
                        active: true,
                    },
                )),
            },
        );

        let mut parents = HashMap::new();
        parents.insert("ok".to_string(), ParentState::Committed);
        parents.insert("bad".to_string(), ParentState::Failed);

        let released = plan.release_dependents(&parents);

        assert_eq!(released.tags.len(), 1);
        assert!(released.hero_slots.is_empty());
        assert_eq!(released.skipped.len(), 3);
        assert!(released
            .skipped
            .iter()
            .all(|e| e.kind == RowErrorKind::Skipped && e.row_index == 3));
    }

    fn hero(row_index: usize, slug: &str, order: i64) -> Draft<HeroSlot> {
        Draft::new(
            row_index,
            HeroSlot {
                game_slug: slug.to_string(),
                display_order: order,
                active: true,
            },
        )
    }

    #[tokio::test]
    async fn test_resolve_groups_dependents_of_winning_rows() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let store =
            SqliteCatalogStore::new(temp_file.path().to_str().unwrap(), 1).unwrap();

        let drafts = ValidatedDrafts {
            rows_read: 3,
            games: vec![
                game(2, "space-run", "Old"),
                game(3, "cave", "Cave"),
                game(4, "space-run", "New"),
            ],
            tags: vec![
                tag(2, "space-run", "old-tag"),
                tag(3, "cave", "puzzle"),
                tag(4, "space-run", "arcade"),
            ],
            hero_slots: vec![hero(2, "space-run", 1), hero(3, "cave", 2), hero(4, "space-run", 3)],
            ..ValidatedDrafts::default()
        };

        let plan = DependencyResolver.resolve(drafts, &store).await;

        assert_eq!(plan.games.len(), 2);
        assert_eq!(plan.duplicates, 1);
        assert_eq!(plan.tag_count(), 2);
        assert_eq!(plan.hero_count(), 2);

        let space_run = &plan.dependents["space-run"];
        assert_eq!(space_run.tags.len(), 1);
        assert_eq!(space_run.tags[0].record.tag, "arcade");
        let winner_hero = space_run.hero.as_ref().unwrap();
        assert_eq!(winner_hero.row_index, 4);
        assert_eq!(winner_hero.record.display_order, 3);
        assert!(plan.dependents["cave"].hero.is_some());
    }
}
