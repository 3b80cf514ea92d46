use crate::db::DbPool;
use crate::error::Result;

pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

pub fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            name: "001_initial_schema",
            sql: "-- base tables are created by init_db
                  SELECT 1;",
        },
        Migration {
            name: "002_sales_indexes",
            sql: "CREATE INDEX IF NOT EXISTS idx_sales_date_category ON sales(sale_date, category);
                  CREATE INDEX IF NOT EXISTS idx_sales_date_city ON sales(sale_date, city);
                  CREATE INDEX IF NOT EXISTS idx_sales_product_discount ON sales(product_name, discount_percent);",
        },
        Migration {
            name: "003_pipeline_runs",
            sql: "CREATE TABLE IF NOT EXISTS pipeline_runs (
                      id INTEGER PRIMARY KEY AUTOINCREMENT,
                      started_at INTEGER NOT NULL,
                      finished_at INTEGER NOT NULL,
                      outcome TEXT NOT NULL CHECK(outcome IN ('no_data','no_anomalies','report_written','failed')),
                      transactions INTEGER NOT NULL DEFAULT 0,
                      anomalies INTEGER NOT NULL DEFAULT 0,
                      report_path TEXT,
                      error TEXT
                  );
                  CREATE INDEX IF NOT EXISTS idx_pipeline_runs_started ON pipeline_runs(started_at);",
        },
    ]
}

pub fn run_pending(pool: &DbPool) -> Result<Vec<String>> {
    let conn = pool.get()?;
    let applied_set: std::collections::HashSet<String> = conn
        .prepare("SELECT name FROM migrations ORDER BY id")?
        .query_map([], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();

    let mut newly_applied = Vec::new();

    for migration in all_migrations() {
        if !applied_set.contains(migration.name) {
            conn.execute_batch(migration.sql)?;
            conn.execute("INSERT INTO migrations (name) VALUES (?1)", [migration.name])?;
            tracing::debug!(migration = migration.name, "Applied migration");
            newly_applied.push(migration.name.to_string());
        }
    }

    Ok(newly_applied)
}

pub fn applied(pool: &DbPool) -> Result<Vec<String>> {
    let conn = pool.get()?;
    let names: Vec<String> = conn
        .prepare("SELECT name FROM migrations ORDER BY id")?
        .query_map([], |row| row.get(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(names)
}
