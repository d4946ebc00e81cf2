use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::history::{HistoryStore, StatSnapshot};

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS player_history (
            account_id INTEGER NOT NULL,
            start_time INTEGER NOT NULL,
            snapshot_json TEXT NOT NULL,
            stored_at TEXT NOT NULL,
            PRIMARY KEY (account_id, start_time)
        );
        CREATE INDEX IF NOT EXISTS idx_history_start_time ON player_history(start_time);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Writes every snapshot not yet on disk. Rows already stored for the same
/// account and start time are left as they are. Returns the number inserted.
pub fn save_store(conn: &mut Connection, store: &HistoryStore) -> Result<usize> {
    let stored_at = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin history transaction")?;
    let mut inserted = 0usize;
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO player_history(account_id, start_time, snapshot_json, stored_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(account_id, start_time) DO NOTHING",
            )
            .context("prepare history insert")?;
        for account_id in store.accounts() {
            for (start_time, snapshot) in store.get_history(account_id) {
                let json = serde_json::to_string(&snapshot).context("serialize snapshot")?;
                inserted += stmt
                    .execute(params![account_id, start_time, json, stored_at])
                    .context("insert history row")?;
            }
        }
    }
    tx.commit().context("commit history transaction")?;
    Ok(inserted)
}

pub fn load_store(conn: &Connection) -> Result<HistoryStore> {
    let store = HistoryStore::new();
    let mut stmt = conn
        .prepare(
            "SELECT account_id, start_time, snapshot_json
             FROM player_history
             ORDER BY account_id ASC, start_time ASC",
        )
        .context("prepare history query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .context("query history")?;

    for row in rows {
        let (account_id, start_time, json) = row.context("decode history row")?;
        let snapshot = serde_json::from_str::<StatSnapshot>(&json).with_context(|| {
            format!("invalid snapshot for account {account_id} at {start_time}")
        })?;
        store.append(account_id, start_time, snapshot)?;
    }
    Ok(store)
}
