// ==========================================
// 游戏目录站 - 行校验/规范化
// ==========================================
// 职责: 原始行 → GameRecord / TagAssociation / HeroSlot / CategoryConfig 草稿
// 规则:
// - 必填: title / embed_url / category
// - 校验失败的行被剔除并记录行级错误，其它行继续
// - slug 未给出时由 title 派生，本次运行内冲突追加 -2、-3 …
// - 显式 slug 先收集，派生 slug 不会与之冲突
// ==========================================

use crate::domain::{
    CategoryConfig, Draft, EntityKind, GameRecord, HeroSlot, ImportWarning, RowError,
    RowErrorKind, TagAssociation, WarningCode, DEFAULT_CATEGORY_MAX_GAMES,
};
use crate::importer::catalog_importer_trait::{
    DataCleaner, RowValidator as RowValidatorTrait,
};
use crate::importer::field_mapper::Column;
use crate::importer::file_parser::RawRow;
use crate::importer::report_builder::SKIPPED_PARENT_INVALID;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 派生 slug 为空时（例如纯中文标题）的基础值
pub const FALLBACK_SLUG_BASE: &str = "game";

// ==========================================
// ValidatedDrafts - 校验输出
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ValidatedDrafts {
    pub rows_read: usize,
    pub games: Vec<Draft<GameRecord>>,
    pub tags: Vec<Draft<TagAssociation>>,
    pub hero_slots: Vec<Draft<HeroSlot>>,
    pub categories: Vec<Draft<CategoryConfig>>,
    /// 校验错误 + 被剔除行的依赖记录（skipped）
    pub errors: Vec<RowError>,
    pub warnings: Vec<ImportWarning>,
    pub excluded_rows: usize,
}

/// 通过字段校验、尚未确定 slug 的行
struct CheckedRow {
    row_index: usize,
    explicit_slug: Option<String>,
    game: GameRecord,
    category_title: String,
    tags: Vec<String>,
    hero: bool,
    hero_order: Option<i64>,
}

// ==========================================
// RowValidator 实现
// ==========================================
pub struct RowValidator {
    cleaner: Box<dyn DataCleaner>,
}

impl RowValidator {
    pub fn new(cleaner: Box<dyn DataCleaner>) -> Self {
        Self { cleaner }
    }

    /// 字段级校验（不涉及跨行规则）
    fn check_row(
        &self,
        row: &RawRow,
        run_started_at: DateTime<Utc>,
        warnings: &mut Vec<ImportWarning>,
    ) -> Result<CheckedRow, Vec<RowError>> {
        let mut errors = Vec::new();
        let mut fail = |column: Column, reason: String| {
            errors.push(validation_error(row.row_index, column, reason));
        };

        let title = row.get(Column::Title);
        if title.is_none() {
            fail(Column::Title, "required field is empty".to_string());
        }

        let embed_url = match row.get(Column::EmbedUrl) {
            None => {
                fail(Column::EmbedUrl, "required field is empty".to_string());
                None
            }
            Some(raw) => self
                .cleaner
                .clean_embed_url(raw)
                .map_err(|reason| fail(Column::EmbedUrl, reason))
                .ok(),
        };

        let category = match row.get(Column::Category) {
            None => {
                fail(Column::Category, "required field is empty".to_string());
                None
            }
            Some(raw) => {
                let key = self.cleaner.slugify(raw);
                if key.is_empty() {
                    fail(
                        Column::Category,
                        format!("category '{}' does not yield a usable key", raw),
                    );
                    None
                } else {
                    Some((key, raw.to_string()))
                }
            }
        };

        let explicit_slug = match row.get(Column::Slug) {
            None => None,
            Some(raw) => {
                let slug = self.cleaner.slugify(raw);
                if slug.is_empty() {
                    fail(
                        Column::Slug,
                        format!("slug '{}' is empty after normalisation", raw),
                    );
                } else if slug != raw {
                    warnings.push(ImportWarning {
                        row_index: Some(row.row_index),
                        code: WarningCode::SlugNormalized,
                        message: format!("slug '{}' normalised to '{}'", raw, slug),
                    });
                }
                Some(slug)
            }
        };

        let image_url = self.optional_asset(row, Column::ImageUrl, &mut fail);
        let thumbnail_url = self.optional_asset(row, Column::ThumbnailUrl, &mut fail);

        let published_at = match row.get(Column::PublishDate) {
            None => Some(run_started_at),
            Some(raw) => self
                .cleaner
                .parse_publish_date(raw)
                .map_err(|reason| fail(Column::PublishDate, reason))
                .ok(),
        };

        let hero_order = match row.get(Column::HeroOrder) {
            None => None,
            Some(raw) => self
                .cleaner
                .parse_display_order(raw)
                .map_err(|reason| fail(Column::HeroOrder, reason))
                .ok(),
        };

        // 标记解析失败只产生警告，按 false 处理
        let mut flag = |column: Column| match self.cleaner.parse_flag(row.get(column)) {
            Ok(value) => value,
            Err(reason) => {
                warnings.push(ImportWarning {
                    row_index: Some(row.row_index),
                    code: WarningCode::InvalidFlag,
                    message: format!("{}: {}; treated as false", column, reason),
                });
                false
            }
        };
        let is_new = flag(Column::IsNew);
        let is_hot = flag(Column::IsHot);
        let is_original = flag(Column::IsOriginal);
        let hero = flag(Column::Hero) || row.get(Column::HeroOrder).is_some();

        match (title, embed_url, category, published_at) {
            (Some(title), Some(embed_url), Some((category, category_title)), Some(published_at))
                if errors.is_empty() =>
            {
                Ok(CheckedRow {
                    row_index: row.row_index,
                    explicit_slug,
                    game: GameRecord {
                        slug: String::new(),
                        title: title.to_string(),
                        description: row.get(Column::Description).unwrap_or("").to_string(),
                        embed_url,
                        thumbnail_url: thumbnail_url.or_else(|| image_url.clone()),
                        image_url,
                        category,
                        is_new,
                        is_hot,
                        is_original,
                        instructions: row.get(Column::Instructions).unwrap_or("").to_string(),
                        published_at,
                        updated_at: run_started_at,
                    },
                    category_title,
                    tags: row
                        .get(Column::Tags)
                        .map(|raw| self.cleaner.split_tags(raw))
                        .unwrap_or_default(),
                    hero,
                    hero_order,
                })
            }
            _ => Err(errors),
        }
    }

    fn optional_asset(
        &self,
        row: &RawRow,
        column: Column,
        fail: &mut impl FnMut(Column, String),
    ) -> Option<String> {
        let raw = row.get(column)?;
        self.cleaner
            .clean_asset_url(raw)
            .map_err(|reason| fail(column, reason))
            .ok()
    }

    /// 派生 slug，与已占用集合冲突时追加数字后缀
    fn derive_slug(
        &self,
        row_index: usize,
        title: &str,
        taken: &mut HashSet<String>,
        warnings: &mut Vec<ImportWarning>,
    ) -> String {
        let mut base = self.cleaner.slugify(title);
        if base.is_empty() {
            base = FALLBACK_SLUG_BASE.to_string();
        }

        let mut slug = base.clone();
        let mut suffix = 2;
        while taken.contains(&slug) {
            slug = format!("{}-{}", base, suffix);
            suffix += 1;
        }

        if slug != base {
            warnings.push(ImportWarning {
                row_index: Some(row_index),
                code: WarningCode::SlugSuffixed,
                message: format!(
                    "derived slug '{}' already used in this upload; assigned '{}'",
                    base, slug
                ),
            });
        }
        taken.insert(slug.clone());
        slug
    }

    /// 被剔除行的标签 / 推荐位记为 skipped
    fn skip_dependents(&self, row: &RawRow, errors: &mut Vec<RowError>) {
        if let Some(raw) = row.get(Column::Tags) {
            for tag in self.cleaner.split_tags(raw) {
                errors.push(RowError {
                    row_index: row.row_index,
                    field: Column::Tags.field_name().to_string(),
                    reason: format!("{} (tag '{}')", SKIPPED_PARENT_INVALID, tag),
                    kind: RowErrorKind::Skipped,
                    entity: EntityKind::Tag,
                });
            }
        }

        let hero_flag = matches!(self.cleaner.parse_flag(row.get(Column::Hero)), Ok(true));
        if hero_flag || row.get(Column::HeroOrder).is_some() {
            errors.push(RowError {
                row_index: row.row_index,
                field: Column::Hero.field_name().to_string(),
                reason: SKIPPED_PARENT_INVALID.to_string(),
                kind: RowErrorKind::Skipped,
                entity: EntityKind::HeroSlot,
            });
        }
    }
}

impl RowValidatorTrait for RowValidator {
    fn validate(&self, rows: &[RawRow], run_started_at: DateTime<Utc>) -> ValidatedDrafts {
        let mut out = ValidatedDrafts {
            rows_read: rows.len(),
            ..ValidatedDrafts::default()
        };

        // === 第 1 遍: 字段校验 ===
        let mut checked = Vec::with_capacity(rows.len());
        for row in rows {
            match self.check_row(row, run_started_at, &mut out.warnings) {
                Ok(row) => checked.push(row),
                Err(errors) => {
                    debug!(row_index = row.row_index, errors = errors.len(), "行校验失败");
                    out.excluded_rows += 1;
                    out.errors.extend(errors);
                    self.skip_dependents(row, &mut out.errors);
                }
            }
        }

        // === 第 2 遍: slug 分配（显式 slug 优先占位）===
        let mut taken: HashSet<String> = checked
            .iter()
            .filter_map(|row| row.explicit_slug.clone())
            .collect();
        for row in &mut checked {
            row.game.slug = match row.explicit_slug.take() {
                Some(slug) => slug,
                None => self.derive_slug(row.row_index, &row.game.title, &mut taken, &mut out.warnings),
            };
        }

        // === 第 3 遍: 生成草稿 ===
        // 未指定顺序的推荐位依次排在最大显式顺序之后
        let max_explicit_order = checked
            .iter()
            .filter_map(|row| row.hero_order)
            .max()
            .unwrap_or(0);
        let mut implicit_heroes = 0i64;
        let mut category_index: HashMap<String, usize> = HashMap::new();

        for row in checked {
            if !category_index.contains_key(&row.game.category) {
                let display_order = out.categories.len() as i64 + 1;
                category_index.insert(row.game.category.clone(), out.categories.len());
                out.categories.push(Draft::new(
                    row.row_index,
                    CategoryConfig {
                        category_key: row.game.category.clone(),
                        title: row.category_title.clone(),
                        show_on_home: true,
                        display_order,
                        max_games: DEFAULT_CATEGORY_MAX_GAMES,
                    },
                ));
            }

            for tag in &row.tags {
                out.tags.push(Draft::new(
                    row.row_index,
                    TagAssociation {
                        game_slug: row.game.slug.clone(),
                        tag: tag.clone(),
                    },
                ));
            }

            if row.hero {
                let display_order = match row.hero_order {
                    Some(order) => order,
                    None => {
                        implicit_heroes += 1;
                        max_explicit_order + implicit_heroes
                    }
                };
                out.hero_slots.push(Draft::new(
                    row.row_index,
                    HeroSlot {
                        game_slug: row.game.slug.clone(),
                        display_order,
                        active: true,
                    },
                ));
            }

            out.games.push(Draft::new(row.row_index, row.game));
        }

        debug!(
            valid = out.games.len(),
            excluded = out.excluded_rows,
            tags = out.tags.len(),
            hero_slots = out.hero_slots.len(),
            categories = out.categories.len(),
            "行校验完成"
        );
        out
    }
}

fn validation_error(row_index: usize, column: Column, reason: String) -> RowError {
    RowError {
        row_index,
        field: column.field_name().to_string(),
        reason,
        kind: RowErrorKind::Validation,
        entity: EntityKind::Game,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::data_cleaner::DataCleaner as DataCleanerImpl;

    fn validator() -> RowValidator {
        RowValidator::new(Box::new(DataCleanerImpl))
    }

    fn game_row(row_index: usize, title: &str) -> RawRow {
        RawRow::new(row_index)
            .with(Column::Title, title)
            .with(Column::EmbedUrl, "https://play.example.com/embed")
            .with(Column::Category, "Arcade")
    }

    #[test]
    fn test_missing_title_is_excluded() {
        let rows = vec![
            game_row(2, "Space Run"),
            RawRow::new(3)
                .with(Column::EmbedUrl, "https://play.example.com/x")
                .with(Column::Category, "Arcade")
                .with(Column::Tags, "puzzle, arcade"),
            game_row(4, "Cave Quest"),
        ];

        let out = validator().validate(&rows, Utc::now());

        assert_eq!(out.games.len(), 2);
        assert_eq!(out.excluded_rows, 1);
        let validation: Vec<&RowError> = out
            .errors
            .iter()
            .filter(|e| e.kind == RowErrorKind::Validation)
            .collect();
        assert_eq!(validation.len(), 1);
        assert_eq!(validation[0].row_index, 3);
        assert_eq!(validation[0].field, "title");

        let skipped = out
            .errors
            .iter()
            .filter(|e| e.kind == RowErrorKind::Skipped && e.entity == EntityKind::Tag)
            .count();
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_multiple_field_errors_reported_together() {
        let rows = vec![RawRow::new(2)
            .with(Column::Title, "Broken")
            .with(Column::EmbedUrl, "/relative/embed")
            .with(Column::Category, "Arcade")
            .with(Column::PublishDate, "someday")];

        let out = validator().validate(&rows, Utc::now());

        let fields: Vec<&str> = out.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["embed_url", "publish_date"]);
        assert!(out.games.is_empty());
    }

    #[test]
    fn test_derived_slug_collision_suffixed() {
        let rows = vec![
            game_row(2, "Space Run"),
            game_row(3, "Space  Run!"),
            game_row(4, "Space Run"),
        ];

        let out = validator().validate(&rows, Utc::now());

        let slugs: Vec<&str> = out.games.iter().map(|g| g.record.slug.as_str()).collect();
        assert_eq!(slugs, vec!["space-run", "space-run-2", "space-run-3"]);
        let suffixed = out
            .warnings
            .iter()
            .filter(|w| w.code == WarningCode::SlugSuffixed)
            .count();
        assert_eq!(suffixed, 2);
    }

    #[test]
    fn test_derived_slug_avoids_explicit_slug() {
        let rows = vec![
            game_row(2, "Space Run"),
            game_row(3, "Another Title").with(Column::Slug, "space-run"),
        ];

        let out = validator().validate(&rows, Utc::now());

        assert_eq!(out.games[0].record.slug, "space-run-2");
        assert_eq!(out.games[1].record.slug, "space-run");
    }

    #[test]
    fn test_explicit_slug_normalized_with_warning() {
        let rows = vec![game_row(2, "Space Run").with(Column::Slug, "Space_Run")];

        let out = validator().validate(&rows, Utc::now());

        assert_eq!(out.games[0].record.slug, "space-run");
        assert_eq!(out.warnings[0].code, WarningCode::SlugNormalized);
    }

    #[test]
    fn test_non_latin_title_falls_back() {
        let rows = vec![game_row(2, "俄罗斯方块"), game_row(3, "贪吃蛇")];

        let out = validator().validate(&rows, Utc::now());

        assert_eq!(out.games[0].record.slug, "game");
        assert_eq!(out.games[1].record.slug, "game-2");
    }

    #[test]
    fn test_defaults_and_tags() {
        let now = Utc::now();
        let rows = vec![game_row(2, "Space Run")
            .with(Column::Tags, "Puzzle; Arcade, puzzle")
            .with(Column::ImageUrl, "/images/space.png")
            .with(Column::IsHot, "maybe")];

        let out = validator().validate(&rows, now);
        let game = &out.games[0].record;

        assert!(!game.is_new);
        assert!(!game.is_hot);
        assert_eq!(game.published_at, now);
        assert_eq!(game.thumbnail_url.as_deref(), Some("/images/space.png"));
        assert_eq!(out.tags.len(), 2);
        assert!(out.tags.iter().all(|t| t.record.game_slug == "space-run"));
        assert_eq!(out.warnings[0].code, WarningCode::InvalidFlag);
    }

    #[test]
    fn test_categories_in_first_appearance_order() {
        let rows = vec![
            game_row(2, "A").with(Column::Category, "Puzzle Games"),
            game_row(3, "B"),
            game_row(4, "C").with(Column::Category, "puzzle games"),
        ];

        let out = validator().validate(&rows, Utc::now());

        assert_eq!(out.categories.len(), 2);
        assert_eq!(out.categories[0].record.category_key, "puzzle-games");
        assert_eq!(out.categories[0].record.title, "Puzzle Games");
        assert_eq!(out.categories[0].record.display_order, 1);
        assert_eq!(out.categories[1].record.category_key, "arcade");
        assert_eq!(out.games[2].record.category, "puzzle-games");
    }

    #[test]
    fn test_hero_order_assignment() {
        let rows = vec![
            game_row(2, "A").with(Column::Hero, "yes"),
            game_row(3, "B").with(Column::HeroOrder, "5"),
            game_row(4, "C").with(Column::Hero, "1"),
            game_row(5, "D").with(Column::HeroOrder, "-2"),
            game_row(6, "E").with(Column::HeroOrder, "1"),
            game_row(7, "F").with(Column::Hero, "yes"),
        ];

        let out = validator().validate(&rows, Utc::now());

        let orders: Vec<(String, i64)> = out
            .hero_slots
            .iter()
            .map(|h| (h.record.game_slug.clone(), h.record.display_order))
            .collect();
        assert_eq!(
            orders,
            vec![
                ("a".to_string(), 6),
                ("b".to_string(), 5),
                ("c".to_string(), 7),
                ("e".to_string(), 1),
                ("f".to_string(), 8)
            ]
        );
        let distinct: HashSet<i64> = orders.iter().map(|(_, order)| *order).collect();
        assert_eq!(distinct.len(), orders.len());
        assert!(out
            .errors
            .iter()
            .any(|e| e.row_index == 5 && e.field == "hero_order"));
    }
}
