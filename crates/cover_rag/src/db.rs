use std::collections::HashSet;
use std::path::Path;

use cover_core::error::AppError;
use rusqlite::Connection;

const MIGRATION_0001: (&str, &str) = (
    "0001_graph.sql",
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../migrations/0001_graph.sql"
    )),
);

const MIGRATION_0002: (&str, &str) = (
    "0002_ingest_checkpoints.sql",
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../migrations/0002_ingest_checkpoints.sql"
    )),
);

const MIGRATION_0003: (&str, &str) = (
    "0003_ingest_checkpoint_keys.sql",
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../migrations/0003_ingest_checkpoint_keys.sql"
    )),
);

fn migrations() -> Vec<(&'static str, &'static str)> {
    vec![MIGRATION_0001, MIGRATION_0002, MIGRATION_0003]
}

pub fn open(path: &Path) -> Result<Connection, AppError> {
    Connection::open(path).map_err(|e| {
        AppError::new("CONFIG_GRAPH_OPEN_FAILED", "Failed to open graph database")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

pub fn open_in_memory() -> Result<Connection, AppError> {
    Connection::open_in_memory().map_err(|e| {
        AppError::new(
            "CONFIG_GRAPH_OPEN_FAILED",
            "Failed to open in-memory graph database",
        )
        .with_details(e.to_string())
    })
}

/// Applies each migration exactly once, in order. Safe to call on every startup.
pub fn migrate(conn: &mut Connection) -> Result<(), AppError> {
    conn.execute_batch(
        r#"
      PRAGMA foreign_keys = ON;
      CREATE TABLE IF NOT EXISTS _migrations (
        name TEXT PRIMARY KEY NOT NULL,
        applied_at TEXT NOT NULL
      );
    "#,
    )
    .map_err(|e| {
        AppError::new(
            "CONFIG_GRAPH_MIGRATION_FAILED",
            "Failed to ensure migrations table exists",
        )
        .with_details(e.to_string())
    })?;

    let applied: HashSet<String> = {
        let mut stmt = conn.prepare("SELECT name FROM _migrations").map_err(|e| {
            AppError::new(
                "CONFIG_GRAPH_MIGRATION_FAILED",
                "Failed to query applied migrations",
            )
            .with_details(e.to_string())
        })?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| {
                AppError::new(
                    "CONFIG_GRAPH_MIGRATION_FAILED",
                    "Failed to read applied migrations",
                )
                .with_details(e.to_string())
            })?;
        rows.collect::<Result<HashSet<_>, _>>().map_err(|e| {
            AppError::new(
                "CONFIG_GRAPH_MIGRATION_FAILED",
                "Failed to read applied migration row",
            )
            .with_details(e.to_string())
        })?
    };

    for (name, sql) in migrations() {
        if applied.contains(name) {
            continue;
        }

        let tx = conn.transaction().map_err(|e| {
            AppError::new(
                "CONFIG_GRAPH_MIGRATION_FAILED",
                "Failed to start migration transaction",
            )
            .with_details(e.to_string())
        })?;
        tx.execute_batch(sql).map_err(|e| {
            AppError::new(
                "CONFIG_GRAPH_MIGRATION_FAILED",
                format!("Migration {name} failed"),
            )
            .with_details(e.to_string())
        })?;
        tx.execute(
            "INSERT INTO _migrations(name, applied_at) VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ','now'))",
            [name],
        )
        .map_err(|e| {
            AppError::new(
                "CONFIG_GRAPH_MIGRATION_FAILED",
                format!("Failed to record migration {name}"),
            )
            .with_details(e.to_string())
        })?;
        tx.commit().map_err(|e| {
            AppError::new(
                "CONFIG_GRAPH_MIGRATION_FAILED",
                "Failed to commit migration transaction",
            )
            .with_details(e.to_string())
        })?;
    }

    Ok(())
}
