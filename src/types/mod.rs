pub mod aggregate;
pub mod anomaly;
pub mod config;
pub mod run;
pub mod sales;
