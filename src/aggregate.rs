use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::aggregate::{AggregateTables, DateCategoryRow, DateCityRow, ProductDiscountRow};
use crate::types::sales::Transaction;

/// Discount percentage usable as an ordered map key.
#[derive(Debug, Clone, Copy)]
struct DiscountKey(f64);

impl PartialEq for DiscountKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DiscountKey {}

impl PartialOrd for DiscountKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DiscountKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Default)]
struct Totals {
    revenue: f64,
    quantity: i64,
    discount_sum: f64,
    count: u64,
}

impl Totals {
    fn add(&mut self, tx: &Transaction) {
        self.revenue += tx.net_amount;
        self.quantity += tx.quantity_sold;
        self.discount_sum += tx.discount_percent;
        self.count += 1;
    }

    fn avg_discount(&self) -> f64 {
        self.discount_sum / self.count as f64
    }
}

fn group_by<K: Ord>(
    transactions: &[Transaction],
    key: impl Fn(&Transaction) -> K,
) -> BTreeMap<K, Totals> {
    let mut groups: BTreeMap<K, Totals> = BTreeMap::new();
    for tx in transactions {
        groups.entry(key(tx)).or_default().add(tx);
    }
    groups
}

/// Per (day, category) revenue, quantity and mean discount, ordered by key.
pub fn by_date_category(transactions: &[Transaction]) -> Vec<DateCategoryRow> {
    group_by(transactions, |tx| (tx.sale_date, tx.category.clone()))
        .into_iter()
        .map(|((sale_date, category), t): ((NaiveDate, String), Totals)| DateCategoryRow {
            sale_date,
            category,
            total_revenue: t.revenue,
            total_quantity: t.quantity,
            avg_discount: t.avg_discount(),
        })
        .collect()
}

/// Per (day, city) revenue, quantity and mean discount, ordered by key.
pub fn by_date_city(transactions: &[Transaction]) -> Vec<DateCityRow> {
    group_by(transactions, |tx| (tx.sale_date, tx.city.clone()))
        .into_iter()
        .map(|((sale_date, city), t)| DateCityRow {
            sale_date,
            city,
            total_revenue: t.revenue,
            total_quantity: t.quantity,
            avg_discount: t.avg_discount(),
        })
        .collect()
}

/// Per (product, discount tier) revenue, quantity and transaction count.
pub fn by_product_discount(transactions: &[Transaction]) -> Vec<ProductDiscountRow> {
    group_by(transactions, |tx| {
        (tx.product_name.clone(), DiscountKey(tx.discount_percent))
    })
    .into_iter()
    .map(|((product_name, discount), t)| ProductDiscountRow {
        product_name,
        discount_percent: discount.0,
        total_revenue: t.revenue,
        total_quantity: t.quantity,
        transaction_count: t.count,
    })
    .collect()
}

pub fn aggregate(transactions: &[Transaction]) -> AggregateTables {
    AggregateTables {
        date_category: by_date_category(transactions),
        date_city: by_date_city(transactions),
        product_discount: by_product_discount(transactions),
    }
}
