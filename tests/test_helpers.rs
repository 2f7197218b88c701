// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、测试表格内容、导入配置
// ==========================================

#![allow(dead_code)]

use game_catalog_ingest::config::ImportConfig;
use game_catalog_ingest::db::{init_catalog_schema, open_sqlite_connection};
use game_catalog_ingest::importer::SourceFile;
use std::error::Error;
use tempfile::NamedTempFile;

/// 测试表格的表头
pub const CSV_HEADER: &str = "slug,title,embed_url,category,tags,hero,hero_order";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_catalog_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 一行游戏数据（slug 为 game-01 形式）
pub fn game_row(n: usize, tags: &str, hero: &str) -> String {
    format!(
        "game-{n:02},Game {n},https://play.example.com/embed/{n},Action,\"{tags}\",{hero},",
        n = n,
        tags = tags,
        hero = hero
    )
}

/// n 行游戏数据组成的 CSV，每行两个标签
pub fn games_csv(n: usize) -> String {
    let mut lines = vec![CSV_HEADER.to_string()];
    for i in 1..=n {
        lines.push(game_row(i, "arcade, casual", ""));
    }
    lines.join("\n")
}

/// 由 CSV 文本创建上传源文件
pub fn csv_source(content: &str) -> SourceFile {
    SourceFile::from_bytes(content.as_bytes(), "csv", 1024 * 1024).expect("写入临时文件失败")
}

/// 第 n 条数据行的行号（表头为第 1 行）
pub fn row_of(n: usize) -> usize {
    n + 1
}

/// 快速退避的测试配置
pub fn fast_config(batch_size: usize, max_retries: u32) -> ImportConfig {
    ImportConfig {
        batch_size,
        max_retries,
        enable_progress_log: false,
        worker_count: 2,
        base_backoff_ms: 1,
        max_backoff_ms: 5,
        ..ImportConfig::default()
    }
}
