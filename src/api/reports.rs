//! Reporting endpoints (admin only).

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::{AppError, AppState, CurrentUser};
use crate::domain::access::Capability;
use crate::domain::reporting::{DashboardStats, DateRange, Granularity, SalesReport};

#[derive(Debug, Deserialize)]
pub struct SalesReportQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub granularity: Granularity,
    pub top: Option<usize>,
}

pub async fn sales_report(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<SalesReportQuery>,
) -> Result<Json<SalesReport>, AppError> {
    current.require(Capability::Administer)?;
    let range = DateRange::new(query.start_date, query.end_date)?;
    Ok(Json(state.reports.sales_report(range, query.granularity, query.top).await?))
}

pub async fn dashboard_stats(State(state): State<AppState>, current: CurrentUser) -> Result<Json<DashboardStats>, AppError> {
    current.require(Capability::Administer)?;
    Ok(Json(state.reports.dashboard(Utc::now().date_naive()).await?))
}
