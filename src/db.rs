use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use crate::error::Result;

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn create_pool(db_path: &Path) -> Result<DbPool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let manager = SqliteConnectionManager::file(db_path);
    let pool = Pool::builder().max_size(4).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    Ok(pool)
}

/// Create the base tables. Columns of `sales` are nullable on purpose: rows are
/// stored as ingested and cleaned on load.
pub fn init_db(pool: &DbPool) -> Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS sales (
            sale_date TEXT,
            category TEXT,
            city TEXT,
            product_name TEXT,
            discount_percent REAL,
            quantity_sold INTEGER,
            net_amount REAL,
            invoice_id TEXT
        );",
    )?;

    Ok(())
}

/// Open a pool and bring the schema up to date.
pub fn open(db_path: &Path) -> Result<DbPool> {
    let pool = create_pool(db_path)?;
    init_db(&pool)?;
    crate::migrations::run_pending(&pool)?;
    Ok(pool)
}

pub fn table_exists(pool: &DbPool, name: &str) -> Result<bool> {
    let conn = pool.get()?;
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pool_returns_valid_pool() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.sqlite");
        let pool = create_pool(&db_path).unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch("SELECT 1").unwrap();
    }

    #[test]
    fn create_pool_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("deep").join("test.sqlite");
        let pool = create_pool(&db_path).unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch("SELECT 1").unwrap();
    }

    #[test]
    fn init_db_creates_tables() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_pool(&dir.path().join("test.sqlite")).unwrap();
        assert!(!table_exists(&pool, "sales").unwrap());
        init_db(&pool).unwrap();

        assert!(table_exists(&pool, "sales").unwrap());
        assert!(table_exists(&pool, "migrations").unwrap());
    }

    #[test]
    fn init_db_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_pool(&dir.path().join("test.sqlite")).unwrap();
        init_db(&pool).unwrap();
        init_db(&pool).unwrap();
    }

    #[test]
    fn open_applies_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open(&dir.path().join("test.sqlite")).unwrap();
        assert!(table_exists(&pool, "pipeline_runs").unwrap());
    }
}
