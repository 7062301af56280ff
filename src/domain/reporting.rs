//! Sales reporting.
//!
//! Stores hand over the orders of a period as [`OrderRecord`]s (order plus
//! product and cashier names); everything below is plain aggregation.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::Money;

pub const DEFAULT_TOP_N: usize = 5;
/// Longest report span, roughly ten years of days.
pub const MAX_RANGE_DAYS: i64 = 3660;
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;
const UNKNOWN_CASHIER: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("date {0} is outside the years 1 to 9999")]
    OutOfBounds(NaiveDate),
    #[error("range spans {days} days, the limit is {max}")]
    TooLong { days: i64, max: i64 },
}

/// Inclusive range of calendar days, read as UTC day boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DateRange { start: NaiveDate, end: NaiveDate }

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if let Some(date) = [start, end].into_iter().find(|d| !(MIN_YEAR..=MAX_YEAR).contains(&d.year())) {
            return Err(ReportError::OutOfBounds(date));
        }
        if start > end { return Err(ReportError::InvalidRange { start, end }); }
        let days = (end - start).num_days() + 1;
        if days > MAX_RANGE_DAYS { return Err(ReportError::TooLong { days, max: MAX_RANGE_DAYS }); }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate { self.start }
    pub fn end(&self) -> NaiveDate { self.end }

    /// First instant inside the range.
    pub fn starts_at(&self) -> DateTime<Utc> { midnight(self.start) }

    /// First instant after the range.
    pub fn ends_before(&self) -> DateTime<Utc> {
        midnight(self.end.succ_opt().unwrap_or(self.end))
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool { at >= self.starts_at() && at < self.ends_before() }
}

fn midnight(day: NaiveDate) -> DateTime<Utc> { Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)) }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity { #[default] Day, Week, Month }

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self { Self::Day => "day", Self::Week => "week", Self::Month => "month" }
    }

    pub fn bucket_start(self, day: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => day,
            Self::Week => day.checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_monday()))).unwrap_or(day),
            Self::Month => day.with_day(1).unwrap_or(day),
        }
    }

    fn next(self, bucket: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => bucket.succ_opt(),
            Self::Week => bucket.checked_add_days(Days::new(7)),
            Self::Month => bucket.checked_add_months(Months::new(1)),
        }
    }

    pub fn label(self, bucket: NaiveDate) -> String {
        match self {
            Self::Day => bucket.format("%Y-%m-%d").to_string(),
            Self::Week => bucket.format("%G-W%V").to_string(),
            Self::Month => bucket.format("%Y-%m").to_string(),
        }
    }
}

/// One persisted order with the names reports need.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub total_amount: Money,
    /// Cashier display name, `None` when the user no longer exists.
    pub cashier: Option<String>,
    pub items: Vec<ItemRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub product_id: Uuid,
    pub product_name: String,
    pub category: String,
    pub quantity: u32,
    pub price_at_purchase: Money,
}

/// Chart entry: a name and a value (units or money, per chart).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportItem { pub name: String, pub value: Decimal }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesTimePoint { pub period: String, pub total_sales: Money }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub total_amount: Money,
    pub items_summary: String,
    pub status: OrderStatus,
    pub user_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub granularity: Granularity,
    pub total_revenue: Money,
    pub total_orders: u64,
    pub average_ticket: Money,
    /// Units sold per product.
    pub top_products: Vec<ReportItem>,
    /// Revenue per category.
    pub sales_by_category: Vec<ReportItem>,
    pub sales_over_time: Vec<SalesTimePoint>,
    pub detailed_sales: Vec<OrderDetail>,
}

impl SalesReport {
    pub fn build(range: DateRange, granularity: Granularity, top_n: usize, records: &[OrderRecord]) -> Self {
        let in_range: Vec<&OrderRecord> = records.iter().filter(|r| range.contains(r.created_at)).collect();
        let paid: Vec<&OrderRecord> = in_range.iter().copied().filter(|r| r.status == OrderStatus::Paid).collect();

        let total_revenue: Money = paid.iter().map(|r| r.total_amount).sum();
        let total_orders = paid.len() as u64;

        Self {
            start_date: range.start(),
            end_date: range.end(),
            granularity,
            total_revenue,
            total_orders,
            average_ticket: average_ticket(total_revenue, total_orders),
            top_products: top_products(&paid, top_n),
            sales_by_category: sales_by_category(&paid),
            sales_over_time: sales_over_time(range, granularity, &paid),
            detailed_sales: detailed_sales(&in_range),
        }
    }
}

/// Revenue per order; zero when there are no orders.
pub fn average_ticket(revenue: Money, orders: u64) -> Money { revenue.split(orders).unwrap_or(Money::ZERO) }

/// Highest value first; equal values by name, then by product id.
fn rank(totals: HashMap<Uuid, (String, Decimal)>) -> Vec<(Uuid, ReportItem)> {
    let mut entries: Vec<(Uuid, ReportItem)> =
        totals.into_iter().map(|(id, (name, value))| (id, ReportItem { name, value })).collect();
    entries.sort_by(|(a_id, a), (b_id, b)| by_value_then_name(a, b).then_with(|| a_id.cmp(b_id)));
    entries
}

fn ranked(totals: HashMap<Uuid, (String, Decimal)>) -> Vec<ReportItem> {
    rank(totals).into_iter().map(|(_, item)| item).collect()
}

fn by_value_then_name(a: &ReportItem, b: &ReportItem) -> Ordering {
    b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name))
}

fn top_products(paid: &[&OrderRecord], top_n: usize) -> Vec<ReportItem> {
    let mut units: HashMap<Uuid, (String, Decimal)> = HashMap::new();
    for item in paid.iter().flat_map(|r| &r.items) {
        let entry = units.entry(item.product_id).or_insert_with(|| (item.product_name.clone(), Decimal::ZERO));
        entry.1 += Decimal::from(item.quantity);
    }
    let mut items = ranked(units);
    items.truncate(top_n);
    items
}

fn sales_by_category(paid: &[&OrderRecord]) -> Vec<ReportItem> {
    let mut revenue: HashMap<String, Decimal> = HashMap::new();
    for item in paid.iter().flat_map(|r| &r.items) {
        *revenue.entry(item.category.clone()).or_default() += item.price_at_purchase.multiply(item.quantity).amount();
    }
    let mut items: Vec<ReportItem> = revenue.into_iter().map(|(name, value)| ReportItem { name, value }).collect();
    items.sort_by(by_value_then_name);
    items
}

fn sales_over_time(range: DateRange, granularity: Granularity, paid: &[&OrderRecord]) -> Vec<SalesTimePoint> {
    let mut per_bucket: HashMap<NaiveDate, Money> = HashMap::new();
    for record in paid {
        let bucket = granularity.bucket_start(record.created_at.date_naive());
        let slot = per_bucket.entry(bucket).or_default();
        *slot = *slot + record.total_amount;
    }

    let mut points = Vec::new();
    let mut bucket = Some(granularity.bucket_start(range.start()));
    while let Some(current) = bucket.filter(|b| *b <= range.end()) {
        points.push(SalesTimePoint {
            period: granularity.label(current),
            total_sales: per_bucket.get(&current).copied().unwrap_or_default(),
        });
        bucket = granularity.next(current);
    }
    points
}

fn detailed_sales(in_range: &[&OrderRecord]) -> Vec<OrderDetail> {
    let mut details: Vec<OrderDetail> = in_range.iter().map(|r| OrderDetail {
        id: r.id,
        created_at: r.created_at,
        total_amount: r.total_amount,
        items_summary: items_summary(&r.items),
        status: r.status,
        user_name: r.cashier.clone().unwrap_or_else(|| UNKNOWN_CASHIER.to_string()),
    }).collect();
    details.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    details
}

/// `"2x Latte, 1x Brownie"`
pub fn items_summary(items: &[ItemRecord]) -> String {
    items.iter().map(|i| format!("{}x {}", i.quantity, i.product_name)).collect::<Vec<_>>().join(", ")
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub sales_this_week: Money,
    pub sales_last_week: Money,
    pub orders_this_week: u64,
    pub orders_last_week: u64,
    pub sales_change_pct: Decimal,
    pub orders_change_pct: Decimal,
    pub low_stock_items_count: u64,
    pub top_products: Vec<String>,
}

/// Days the dashboard needs: Monday of last week through `today`.
pub fn dashboard_window(today: NaiveDate) -> DateRange {
    let this_week = Granularity::Week.bucket_start(today);
    DateRange { start: previous_week(this_week), end: today }
}

fn previous_week(monday: NaiveDate) -> NaiveDate { monday.checked_sub_days(Days::new(7)).unwrap_or(monday) }

impl DashboardStats {
    pub fn build(today: NaiveDate, records: &[OrderRecord], low_stock_items_count: u64) -> Self {
        let this_week = Granularity::Week.bucket_start(today);
        let last_week = previous_week(this_week);
        let window = dashboard_window(today);

        let (mut current, mut previous): (Vec<&OrderRecord>, Vec<&OrderRecord>) = (Vec::new(), Vec::new());
        for record in records.iter().filter(|r| r.status == OrderStatus::Paid && window.contains(r.created_at)) {
            let day = record.created_at.date_naive();
            if day >= this_week { current.push(record) } else if day >= last_week { previous.push(record) }
        }

        let sales_this_week: Money = current.iter().map(|r| r.total_amount).sum();
        let sales_last_week: Money = previous.iter().map(|r| r.total_amount).sum();
        let orders_this_week = current.len() as u64;
        let orders_last_week = previous.len() as u64;

        Self {
            sales_this_week,
            sales_last_week,
            orders_this_week,
            orders_last_week,
            sales_change_pct: percentage_change(sales_this_week.amount(), sales_last_week.amount()),
            orders_change_pct: percentage_change(Decimal::from(orders_this_week), Decimal::from(orders_last_week)),
            low_stock_items_count,
            top_products: top_products(&current, DEFAULT_TOP_N).into_iter().map(|i| i.name).collect(),
        }
    }
}

/// Week-over-week change in percent. With nothing last week the change is
/// 100 when anything happened this week, else 0.
pub fn percentage_change(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        return if current > Decimal::ZERO { Decimal::ONE_HUNDRED } else { Decimal::ZERO };
    }
    ((current - previous) / previous * Decimal::ONE_HUNDRED).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate { NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap() }
    fn at(s: &str, hour: u32) -> DateTime<Utc> { Utc.from_utc_datetime(&day(s).and_hms_opt(hour, 0, 0).unwrap()) }
    fn money(cents: i64) -> Money { Money::new(Decimal::new(cents, 2)) }

    fn item(id: Uuid, name: &str, category: &str, quantity: u32, cents: i64) -> ItemRecord {
        ItemRecord { product_id: id, product_name: name.into(), category: category.into(), quantity, price_at_purchase: money(cents) }
    }

    fn record(when: DateTime<Utc>, status: OrderStatus, total: i64, items: Vec<ItemRecord>) -> OrderRecord {
        OrderRecord { id: Uuid::now_v7(), created_at: when, status, total_amount: money(total), cashier: Some("Ana".into()), items }
    }

    #[test]
    fn test_cancelled_orders_do_not_count() {
        let range = DateRange::new(day("2024-03-01"), day("2024-03-31")).unwrap();
        let records = vec![
            record(at("2024-03-02", 9), OrderStatus::Paid, 1000, vec![]),
            record(at("2024-03-03", 9), OrderStatus::Paid, 2000, vec![]),
            record(at("2024-03-04", 9), OrderStatus::Cancelled, 5000, vec![]),
        ];
        let report = SalesReport::build(range, Granularity::Day, DEFAULT_TOP_N, &records);
        assert_eq!(report.total_revenue, money(3000));
        assert_eq!(report.total_orders, 2);
        assert_eq!(report.average_ticket, money(1500));
        assert_eq!(report.detailed_sales.len(), 3);
    }

    #[test]
    fn test_average_ticket_with_no_orders_is_zero() {
        let range = DateRange::new(day("2024-03-01"), day("2024-03-01")).unwrap();
        let report = SalesReport::build(range, Granularity::Day, DEFAULT_TOP_N, &[]);
        assert_eq!(report.average_ticket, Money::ZERO);
        assert_eq!(report.sales_over_time.len(), 1);
    }

    #[test]
    fn test_range_is_inclusive_of_end_day() {
        let range = DateRange::new(day("2024-03-01"), day("2024-03-02")).unwrap();
        assert!(range.contains(at("2024-03-02", 23)));
        assert!(!range.contains(at("2024-03-03", 0)));
        assert!(!range.contains(at("2024-02-29", 23)));
        assert!(DateRange::new(day("2024-03-02"), day("2024-03-01")).is_err());
    }

    #[test]
    fn test_range_rejects_extreme_dates_and_long_spans() {
        assert_eq!(DateRange::new(NaiveDate::MIN, day("2024-01-01")), Err(ReportError::OutOfBounds(NaiveDate::MIN)));
        assert_eq!(DateRange::new(day("2024-01-01"), NaiveDate::MAX), Err(ReportError::OutOfBounds(NaiveDate::MAX)));
        assert!(matches!(DateRange::new(day("0001-01-01"), day("9999-12-31")), Err(ReportError::TooLong { .. })));
        assert!(DateRange::new(day("2015-01-01"), day("2024-12-31")).is_ok());
        assert!(DateRange::new(day("0001-01-01"), day("0001-01-07")).is_ok());
    }

    #[test]
    fn test_week_bucket_at_the_calendar_edge() {
        // NaiveDate::MIN is not a Monday and has no earlier days to step back to.
        assert_eq!(Granularity::Week.bucket_start(NaiveDate::MIN), NaiveDate::MIN);
        let window = dashboard_window(NaiveDate::MIN);
        assert_eq!(window.start(), NaiveDate::MIN);
        let stats = DashboardStats::build(NaiveDate::MIN, &[], 0);
        assert_eq!(stats.orders_this_week, 0);

        let range = DateRange::new(day("0001-01-01"), day("0001-01-10")).unwrap();
        let weeks = SalesReport::build(range, Granularity::Week, 5, &[]).sales_over_time;
        assert_eq!(weeks.len(), 2);
    }

    #[test]
    fn test_sales_over_time_fills_gaps() {
        let range = DateRange::new(day("2024-03-01"), day("2024-03-04")).unwrap();
        let records = vec![
            record(at("2024-03-01", 8), OrderStatus::Paid, 500, vec![]),
            record(at("2024-03-01", 17), OrderStatus::Paid, 250, vec![]),
            record(at("2024-03-04", 12), OrderStatus::Paid, 100, vec![]),
        ];
        let report = SalesReport::build(range, Granularity::Day, DEFAULT_TOP_N, &records);
        let series: Vec<(&str, Money)> = report.sales_over_time.iter().map(|p| (p.period.as_str(), p.total_sales)).collect();
        assert_eq!(series, vec![
            ("2024-03-01", money(750)),
            ("2024-03-02", Money::ZERO),
            ("2024-03-03", Money::ZERO),
            ("2024-03-04", money(100)),
        ]);
    }

    #[test]
    fn test_monthly_and_weekly_buckets() {
        let range = DateRange::new(day("2024-01-15"), day("2024-03-02")).unwrap();
        let months: Vec<String> = SalesReport::build(range, Granularity::Month, 5, &[]).sales_over_time.into_iter().map(|p| p.period).collect();
        assert_eq!(months, ["2024-01", "2024-02", "2024-03"]);
        let range = DateRange::new(day("2024-03-06"), day("2024-03-12")).unwrap();
        let weeks: Vec<String> = SalesReport::build(range, Granularity::Week, 5, &[]).sales_over_time.into_iter().map(|p| p.period).collect();
        assert_eq!(weeks, ["2024-W10", "2024-W11"]);
    }

    #[test]
    fn test_top_products_by_units_with_name_tiebreak() {
        let (latte, mocha, scone) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let range = DateRange::new(day("2024-03-01"), day("2024-03-31")).unwrap();
        let records = vec![
            record(at("2024-03-02", 9), OrderStatus::Paid, 0, vec![item(mocha, "Mocha", "Café", 2, 400), item(scone, "Scone", "Panadería", 3, 200)]),
            record(at("2024-03-03", 9), OrderStatus::Paid, 0, vec![item(latte, "Latte", "Café", 2, 350)]),
            record(at("2024-03-03", 10), OrderStatus::Cancelled, 0, vec![item(latte, "Latte", "Café", 9, 350)]),
        ];
        let report = SalesReport::build(range, Granularity::Day, 2, &records);
        let top: Vec<(&str, Decimal)> = report.top_products.iter().map(|i| (i.name.as_str(), i.value)).collect();
        assert_eq!(top, vec![("Scone", Decimal::from(3)), ("Latte", Decimal::from(2))]);
        let categories: Vec<(&str, Decimal)> = report.sales_by_category.iter().map(|i| (i.name.as_str(), i.value)).collect();
        assert_eq!(categories, vec![("Café", Decimal::new(1500, 2)), ("Panadería", Decimal::new(600, 2))]);
    }

    #[test]
    fn test_tied_products_rank_the_same_every_time() {
        let mut ids: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        ids.sort();
        // Same units everywhere; two names shared by four products each.
        let totals = || -> HashMap<Uuid, (String, Decimal)> {
            ids.iter().rev().enumerate().map(|(n, id)| (*id, (format!("P{}", n % 2), Decimal::TWO))).collect()
        };

        let first: Vec<Uuid> = rank(totals()).into_iter().map(|(id, _)| id).collect();
        for _ in 0..20 {
            let again: Vec<Uuid> = rank(totals()).into_iter().map(|(id, _)| id).collect();
            assert_eq!(again, first);
        }
        let names: Vec<String> = ranked(totals()).into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["P0", "P0", "P0", "P0", "P1", "P1", "P1", "P1"]);
        let p0: Vec<Uuid> = first[..4].to_vec();
        let mut sorted = p0.clone();
        sorted.sort();
        assert_eq!(p0, sorted);
    }

    #[test]
    fn test_items_summary_and_unknown_cashier() {
        let range = DateRange::new(day("2024-03-01"), day("2024-03-01")).unwrap();
        let mut r = record(at("2024-03-01", 9), OrderStatus::Paid, 900, vec![
            item(Uuid::now_v7(), "Café", "Café", 2, 300), item(Uuid::now_v7(), "Pan", "Panadería", 1, 300),
        ]);
        r.cashier = None;
        let report = SalesReport::build(range, Granularity::Day, 5, &[r]);
        assert_eq!(report.detailed_sales[0].items_summary, "2x Café, 1x Pan");
        assert_eq!(report.detailed_sales[0].user_name, "unknown");
    }

    #[test]
    fn test_percentage_change_rule() {
        assert_eq!(percentage_change(Decimal::TEN, Decimal::ZERO), Decimal::ONE_HUNDRED);
        assert_eq!(percentage_change(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percentage_change(Decimal::from(15), Decimal::TEN), Decimal::from(50));
        assert_eq!(percentage_change(Decimal::from(5), Decimal::TEN), Decimal::from(-50));
    }

    #[test]
    fn test_dashboard_splits_weeks() {
        // 2024-03-13 is a Wednesday; this week starts on the 11th.
        let today = day("2024-03-13");
        let latte = Uuid::now_v7();
        let records = vec![
            record(at("2024-03-11", 9), OrderStatus::Paid, 1500, vec![item(latte, "Latte", "Café", 3, 500)]),
            record(at("2024-03-05", 9), OrderStatus::Paid, 1000, vec![]),
            record(at("2024-03-01", 9), OrderStatus::Paid, 9900, vec![]),
            record(at("2024-03-12", 9), OrderStatus::Cancelled, 9900, vec![]),
        ];
        let stats = DashboardStats::build(today, &records, 2);
        assert_eq!(stats.sales_this_week, money(1500));
        assert_eq!(stats.sales_last_week, money(1000));
        assert_eq!(stats.orders_this_week, 1);
        assert_eq!(stats.sales_change_pct, Decimal::from(50));
        assert_eq!(stats.orders_change_pct, Decimal::ZERO);
        assert_eq!(stats.top_products, vec!["Latte".to_string()]);
        assert_eq!(stats.low_stock_items_count, 2);
    }
}
