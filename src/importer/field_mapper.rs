// ==========================================
// 游戏目录站 - 字段映射器实现
// ==========================================
// 职责: 源表头 → 标准列映射（别名表固定、可枚举）
// 规则: 表头只保留字母/数字并转小写后比较
// ==========================================

use crate::domain::{ImportWarning, WarningCode};
use crate::importer::catalog_importer_trait::FieldMapper as FieldMapperTrait;
use crate::importer::error::{ImportError, ImportResult};
use std::fmt;

// ==========================================
// Column - 标准列
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Slug,
    Title,
    Description,
    EmbedUrl,
    ImageUrl,
    ThumbnailUrl,
    Category,
    Tags,
    IsNew,
    IsHot,
    IsOriginal,
    Instructions,
    PublishDate,
    Hero,
    HeroOrder,
}

impl Column {
    pub const ALL: [Column; 15] = [
        Column::Slug,
        Column::Title,
        Column::Description,
        Column::EmbedUrl,
        Column::ImageUrl,
        Column::ThumbnailUrl,
        Column::Category,
        Column::Tags,
        Column::IsNew,
        Column::IsHot,
        Column::IsOriginal,
        Column::Instructions,
        Column::PublishDate,
        Column::Hero,
        Column::HeroOrder,
    ];

    /// 必需列
    pub const REQUIRED: [Column; 3] = [Column::Title, Column::EmbedUrl, Column::Category];

    /// 报告中使用的字段名
    pub fn field_name(&self) -> &'static str {
        match self {
            Column::Slug => "slug",
            Column::Title => "title",
            Column::Description => "description",
            Column::EmbedUrl => "embed_url",
            Column::ImageUrl => "image_url",
            Column::ThumbnailUrl => "thumbnail_url",
            Column::Category => "category",
            Column::Tags => "tags",
            Column::IsNew => "is_new",
            Column::IsHot => "is_hot",
            Column::IsOriginal => "is_original",
            Column::Instructions => "instructions",
            Column::PublishDate => "publish_date",
            Column::Hero => "hero",
            Column::HeroOrder => "hero_order",
        }
    }

    /// 可接受的表头别名
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::Slug => &["slug", "game slug", "game id", "identifier", "id"],
            Column::Title => &["title", "name", "game title", "game name", "标题", "游戏名称"],
            Column::Description => &["description", "desc", "summary", "描述"],
            Column::EmbedUrl => &["embed url", "embed", "game url", "iframe url", "url", "嵌入链接"],
            Column::ImageUrl => &["image url", "image", "cover", "cover url", "图片"],
            Column::ThumbnailUrl => &["thumbnail url", "thumbnail", "thumb", "缩略图"],
            Column::Category => &["category", "category key", "genre", "分类"],
            Column::Tags => &["tags", "tag", "keywords", "标签"],
            Column::IsNew => &["is new", "new", "新游戏"],
            Column::IsHot => &["is hot", "hot", "热门"],
            Column::IsOriginal => &["is original", "original", "原创"],
            Column::Instructions => &["instructions", "how to play", "controls", "玩法说明"],
            Column::PublishDate => &[
                "publish date",
                "published at",
                "published",
                "release date",
                "发布日期",
            ],
            Column::Hero => &["hero", "featured", "is featured", "推荐位"],
            Column::HeroOrder => &["hero order", "featured order", "推荐位顺序"],
        }
    }

    /// 按表头识别标准列
    pub fn from_header(header: &str) -> Option<Column> {
        let key = normalize_header(header);
        if key.is_empty() {
            return None;
        }
        Column::ALL.into_iter().find(|column| {
            column
                .aliases()
                .iter()
                .any(|alias| normalize_header(alias) == key)
        })
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field_name())
    }
}

/// 表头规范化：只保留字母/数字（含中日韩文字），转小写
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

// ==========================================
// HeaderMapping - 表头映射结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct HeaderMapping {
    /// 与表头位置一一对应，未知/重复列为 None
    pub columns: Vec<Option<Column>>,
    pub warnings: Vec<ImportWarning>,
}

impl HeaderMapping {
    pub fn position(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == Some(column))
    }

    pub fn contains(&self, column: Column) -> bool {
        self.position(column).is_some()
    }
}

// ==========================================
// FieldMapper 实现
// ==========================================
pub struct FieldMapper;

impl FieldMapperTrait for FieldMapper {
    fn map_headers(&self, headers: &[String]) -> ImportResult<HeaderMapping> {
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ImportError::MissingHeader);
        }

        let mut mapping = HeaderMapping::default();
        for header in headers {
            let column = Column::from_header(header);
            match column {
                Some(col) if mapping.contains(col) => {
                    mapping.warnings.push(ImportWarning {
                        row_index: None, // 由解析器回填表头行号
                        code: WarningCode::DuplicateColumn,
                        message: format!(
                            "header '{}' maps to column '{}' which is already mapped; ignored",
                            header.trim(),
                            col
                        ),
                    });
                    mapping.columns.push(None);
                }
                _ => mapping.columns.push(column),
            }
        }

        let missing: Vec<String> = Column::REQUIRED
            .iter()
            .filter(|col| !mapping.contains(**col))
            .map(|col| col.field_name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::UnrecognizedHeader { missing });
        }

        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_header_normalization() {
        assert_eq!(Column::from_header("Embed_URL"), Some(Column::EmbedUrl));
        assert_eq!(Column::from_header("embedUrl"), Some(Column::EmbedUrl));
        assert_eq!(Column::from_header(" embed url "), Some(Column::EmbedUrl));
        assert_eq!(Column::from_header("游戏名称"), Some(Column::Title));
        assert_eq!(Column::from_header("Hero Order"), Some(Column::HeroOrder));
        assert_eq!(Column::from_header("Rating"), None);
        assert_eq!(Column::from_header("  "), None);
    }

    #[test]
    fn test_map_headers_ignores_unknown_columns() {
        let mapper = FieldMapper;
        let mapping = mapper
            .map_headers(&headers(&["Title", "Rating", "Embed URL", "Genre"]))
            .unwrap();

        assert_eq!(
            mapping.columns,
            vec![
                Some(Column::Title),
                None,
                Some(Column::EmbedUrl),
                Some(Column::Category)
            ]
        );
        assert!(mapping.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_column_first_wins() {
        let mapper = FieldMapper;
        let mapping = mapper
            .map_headers(&headers(&["name", "title", "url", "category"]))
            .unwrap();

        assert_eq!(mapping.position(Column::Title), Some(0));
        assert_eq!(mapping.columns[1], None);
        assert_eq!(mapping.warnings.len(), 1);
        assert_eq!(mapping.warnings[0].code, WarningCode::DuplicateColumn);
        assert_eq!(mapping.warnings[0].row_index, None);
    }

    #[test]
    fn test_missing_required_columns() {
        let mapper = FieldMapper;
        let err = mapper
            .map_headers(&headers(&["title", "description"]))
            .unwrap_err();

        match err {
            ImportError::UnrecognizedHeader { missing } => {
                assert_eq!(missing, vec!["embed_url", "category"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_blank_header_row() {
        let mapper = FieldMapper;
        let err = mapper.map_headers(&headers(&["", " "])).unwrap_err();
        assert!(matches!(err, ImportError::MissingHeader));
    }
}
