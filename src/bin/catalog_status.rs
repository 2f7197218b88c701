// 只读工具: 输出目录库中各类实体的行数（JSON）
//
// Usage:
//   cargo run --bin catalog-status -- [db_path]

use game_catalog_ingest::db::get_default_db_path;
use game_catalog_ingest::domain::EntityKind;
use game_catalog_ingest::logging;
use game_catalog_ingest::repository::{CatalogStore, SqliteCatalogStore};
use std::collections::BTreeMap;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(get_default_db_path);

    let store = SqliteCatalogStore::new(&db_path, 1)?;

    let mut counts = BTreeMap::new();
    for kind in EntityKind::ALL {
        counts.insert(kind.to_string(), store.count(kind).await?);
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "dbPath": db_path,
            "counts": counts,
        }))?
    );
    Ok(())
}
