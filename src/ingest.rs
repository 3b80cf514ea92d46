use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::db::DbPool;
use crate::error::{Error, Result};

pub const REQUIRED_COLUMNS: [&str; 8] = [
    "sale_date",
    "category",
    "city",
    "product_name",
    "discount_percent",
    "quantity_sold",
    "net_amount",
    "invoice_id",
];

/// One CSV line. Empty or malformed cells become `None` and are stored as NULL.
#[derive(Debug, Deserialize)]
struct CsvSale {
    sale_date: Option<String>,
    category: Option<String>,
    city: Option<String>,
    product_name: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    discount_percent: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    quantity_sold: Option<i64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    net_amount: Option<f64>,
    invoice_id: Option<String>,
}

/// Replace the contents of `sales` with the rows of a CSV export.
///
/// The delete and all inserts run in one transaction, so a bad file leaves the
/// previous data in place. Returns the number of rows stored.
pub fn ingest_csv(pool: &DbPool, csv_path: &Path) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)?;

    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "{} is missing required columns: {}",
            csv_path.display(),
            missing.join(", ")
        )));
    }

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM sales", [])?;
    let mut count = 0usize;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO sales (sale_date, category, city, product_name, discount_percent, quantity_sold, net_amount, invoice_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for record in reader.deserialize::<CsvSale>() {
            let sale = record?;
            stmt.execute(rusqlite::params![
                sale.sale_date,
                sale.category,
                sale.city,
                sale.product_name,
                sale.discount_percent,
                sale.quantity_sold,
                sale.net_amount,
                sale.invoice_id,
            ])?;
            count += 1;
        }
    }
    tx.commit()?;

    info!(rows = count, path = %csv_path.display(), "Loaded sales CSV into database");
    Ok(count)
}
