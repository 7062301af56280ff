//! Sales report and dashboard queries.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::domain::reporting::{dashboard_window, DashboardStats, DateRange, Granularity, SalesReport};
use crate::infra::{Store, StoreError};

#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn Store>,
    default_top_n: usize,
}

impl ReportService {
    pub fn new(store: Arc<dyn Store>, default_top_n: usize) -> Self { Self { store, default_top_n } }

    pub async fn sales_report(
        &self,
        range: DateRange,
        granularity: Granularity,
        top_n: Option<usize>,
    ) -> Result<SalesReport, StoreError> {
        let records = self.store.order_records(range.starts_at(), range.ends_before()).await?;
        let top_n = top_n.filter(|n| *n > 0).unwrap_or(self.default_top_n);
        tracing::debug!(start = %range.start(), end = %range.end(), orders = records.len(), "building sales report");
        Ok(SalesReport::build(range, granularity, top_n, &records))
    }

    pub async fn dashboard(&self, today: NaiveDate) -> Result<DashboardStats, StoreError> {
        let window = dashboard_window(today);
        let records = self.store.order_records(window.starts_at(), window.ends_before()).await?;
        let threshold = self.store.settings().await?.low_stock_threshold;
        let low_stock = self.store.count_low_stock(threshold).await?;
        Ok(DashboardStats::build(today, &records, low_stock))
    }
}
