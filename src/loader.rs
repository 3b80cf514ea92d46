use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::ValueRef;
use tracing::{debug, info, warn};

use crate::db::{self, DbPool};
use crate::error::Result;
use crate::types::sales::{RawSale, Transaction};

const SELECT_SALES: &str = "SELECT sale_date, category, city, product_name, discount_percent, quantity_sold, net_amount, invoice_id FROM sales";

/// Resolve a stored timestamp to its calendar day.
pub fn parse_sale_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// A raw row becomes a transaction only when every field is present and the
/// date resolves.
pub fn clean(raw: RawSale) -> Option<Transaction> {
    Some(Transaction {
        sale_date: parse_sale_date(raw.sale_date.as_deref()?)?,
        category: raw.category?,
        city: raw.city?,
        product_name: raw.product_name?,
        discount_percent: raw.discount_percent?,
        quantity_sold: raw.quantity_sold?,
        net_amount: raw.net_amount?,
        invoice_id: raw.invoice_id?,
    })
}

// Cells are read by storage class: a value of the wrong type becomes `None`
// and the row is dropped by `clean` instead of failing the whole read.
fn cell_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().map(str::to_string),
        _ => None,
    }
}

fn cell_real(value: ValueRef<'_>) -> Option<f64> {
    let parsed = match value {
        ValueRef::Real(f) => Some(f),
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn cell_integer(value: ValueRef<'_>) -> Option<i64> {
    match value {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(f as i64),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
        _ => None,
    }
}

fn read_raw(pool: &DbPool, limit: Option<u32>) -> Result<Vec<RawSale>> {
    let conn = pool.get()?;
    let sql = match limit {
        Some(n) => format!("{} LIMIT {}", SELECT_SALES, n),
        None => SELECT_SALES.to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(RawSale {
            sale_date: cell_text(row.get_ref(0)?),
            category: cell_text(row.get_ref(1)?),
            city: cell_text(row.get_ref(2)?),
            product_name: cell_text(row.get_ref(3)?),
            discount_percent: cell_real(row.get_ref(4)?),
            quantity_sold: cell_integer(row.get_ref(5)?),
            net_amount: cell_real(row.get_ref(6)?),
            invoice_id: cell_text(row.get_ref(7)?),
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Load every usable sales row. `None` means the `sales` table does not exist yet.
pub fn load_transactions(pool: &DbPool) -> Result<Option<Vec<Transaction>>> {
    if !db::table_exists(pool, "sales")? {
        warn!("No sales table found; run setup-db first");
        return Ok(None);
    }

    let raw = read_raw(pool, None)?;
    let total = raw.len();
    let transactions: Vec<Transaction> = raw.into_iter().filter_map(clean).collect();
    let dropped = total - transactions.len();
    if dropped > 0 {
        warn!(dropped, total, "Dropped sales rows with missing or unparseable fields");
    } else {
        debug!(total, "All sales rows usable");
    }
    info!(rows = transactions.len(), "Loaded transactions");
    Ok(Some(transactions))
}

/// First `limit` rows as stored, NULLs included.
pub fn preview(pool: &DbPool, limit: u32) -> Result<Vec<RawSale>> {
    if !db::table_exists(pool, "sales")? {
        return Ok(Vec::new());
    }
    read_raw(pool, Some(limit))
}
