use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateCategoryRow {
    pub sale_date: NaiveDate,
    pub category: String,
    pub total_revenue: f64,
    pub total_quantity: i64,
    pub avg_discount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateCityRow {
    pub sale_date: NaiveDate,
    pub city: String,
    pub total_revenue: f64,
    pub total_quantity: i64,
    pub avg_discount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDiscountRow {
    pub product_name: String,
    pub discount_percent: f64,
    pub total_revenue: f64,
    pub total_quantity: i64,
    pub transaction_count: u64,
}

/// The three summary tables the classifier consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateTables {
    pub date_category: Vec<DateCategoryRow>,
    pub date_city: Vec<DateCityRow>,
    pub product_discount: Vec<ProductDiscountRow>,
}
