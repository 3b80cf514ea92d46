use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One cleaned sales event. Every field is present; rows with gaps are
/// dropped by the loader before they reach this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sale_date: NaiveDate,
    pub category: String,
    pub city: String,
    pub product_name: String,
    pub discount_percent: f64,
    pub quantity_sold: i64,
    pub net_amount: f64,
    pub invoice_id: String,
}

/// A `sales` row exactly as stored, NULLs included. Used for previews.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSale {
    pub sale_date: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub product_name: Option<String>,
    pub discount_percent: Option<f64>,
    pub quantity_sold: Option<i64>,
    pub net_amount: Option<f64>,
    pub invoice_id: Option<String>,
}
