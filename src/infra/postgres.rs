//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{ProductFilter, Store, StoreError};
use crate::domain::aggregates::{BusinessSettings, Order, OrderItem, Product, User};
use crate::domain::checkout::{self, Cancellation, CheckoutRequest, Placement};
use crate::domain::reporting::{ItemRecord, OrderRecord};
use crate::domain::value_objects::{Money, PaymentMethod, Sku};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    category: String,
    price: Decimal,
    stock: i32,
    image_url: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let sku = Sku::new(row.sku).map_err(|e| StoreError::DataCorruption(format!("invalid SKU in database: {e}")))?;
        Ok(Self {
            id: row.id, sku, name: row.name, category: row.category, price: Money::new(row.price),
            stock: non_negative(row.stock, "stock")?, image_url: row.image_url, active: row.active,
            created_at: row.created_at, updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    hashed_password: String,
    full_name: Option<String>,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse().map_err(|e| StoreError::DataCorruption(format!("{e} for user {}", row.id)))?;
        Ok(Self {
            id: row.id, email: row.email, hashed_password: row.hashed_password, full_name: row.full_name,
            role, is_active: row.is_active, created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    status: String,
    payment_method: String,
    subtotal: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    user_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    price_at_purchase: Decimal,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id, order_id: row.order_id, product_id: row.product_id,
            quantity: non_negative(row.quantity, "quantity")?, price_at_purchase: Money::new(row.price_at_purchase),
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        let status = self.status.parse().map_err(|e| StoreError::DataCorruption(format!("{e} for order {}", self.id)))?;
        let payment_method = PaymentMethod::new(self.payment_method)
            .ok_or_else(|| StoreError::DataCorruption(format!("blank payment method on order {}", self.id)))?;
        Ok(Order {
            id: self.id, created_at: self.created_at, status, payment_method,
            subtotal: Money::new(self.subtotal), tax_amount: Money::new(self.tax_amount),
            total_amount: Money::new(self.total_amount), user_id: self.user_id, items,
        })
    }
}

/// Order header joined with the cashier's name, for reports.
#[derive(Debug, sqlx::FromRow)]
struct OrderRecordRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    status: String,
    total_amount: Decimal,
    cashier: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRecordRow {
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    category: String,
    quantity: i32,
    price_at_purchase: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    business_name: String,
    tax_id: Option<String>,
    tax_rate: Decimal,
    currency_symbol: String,
    low_stock_threshold: i32,
}

fn non_negative(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::DataCorruption(format!("negative {column}: {value}")))
}

fn to_i32(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Conflict(format!("value {value} is out of range")))
}

/// Unique-constraint violations become `Conflict`; everything else stays a
/// database error.
fn map_unique(err: sqlx::Error, what: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(format!("{what} already exists")),
        _ => StoreError::Database(err),
    }
}

const PRODUCT_COLUMNS: &str = "id, sku, name, category, price, stock, image_url, active, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, hashed_password, full_name, role, is_active, created_at";

// =============================================================================
// Store
// =============================================================================

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub fn pool(&self) -> &PgPool { &self.pool }

    /// Load and row-lock products in id order, so concurrent checkouts
    /// touching the same rows queue up instead of deadlocking.
    async fn lock_products(tx: &mut Transaction<'_, Postgres>, ids: &[Uuid]) -> Result<HashMap<Uuid, Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;
        rows.into_iter().map(|row| Product::try_from(row).map(|p| (p.id, p))).collect()
    }

    async fn write_stock(tx: &mut Transaction<'_, Postgres>, products: &[Product]) -> Result<(), StoreError> {
        for product in products {
            sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
                .bind(product.id).bind(to_i32(product.stock)?)
                .execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn load_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, StoreError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, quantity, price_at_purchase FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let pattern = filter.search_term().map(|t| format!("%{t}%"));
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE active \
             AND ($1::TEXT IS NULL OR name ILIKE $1 OR sku ILIKE $1) \
             AND ($2::TEXT IS NULL OR category = $2) \
             ORDER BY name, id"
        ))
        .bind(pattern)
        .bind(filter.category())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_product(&self, id: Uuid) -> Result<Product, StoreError> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND active"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn insert_product(&self, p: &Product) -> Result<(), StoreError> {
        sqlx::query(&format!("INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"))
            .bind(p.id).bind(p.sku.as_str()).bind(&p.name).bind(&p.category).bind(p.price.amount())
            .bind(to_i32(p.stock)?).bind(&p.image_url).bind(p.active).bind(p.created_at).bind(p.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique(e, &format!("SKU {}", p.sku)))?;
        Ok(())
    }

    async fn update_product(&self, p: &Product) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE products SET sku = $2, name = $3, category = $4, price = $5, stock = $6, image_url = $7, updated_at = $8 \
             WHERE id = $1 AND active",
        )
        .bind(p.id).bind(p.sku.as_str()).bind(&p.name).bind(&p.category).bind(p.price.amount())
        .bind(to_i32(p.stock)?).bind(&p.image_url).bind(p.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, &format!("SKU {}", p.sku)))?;
        if result.rows_affected() == 0 { return Err(StoreError::NotFound); }
        Ok(())
    }

    async fn archive_product(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET active = FALSE, updated_at = NOW() WHERE id = $1 AND active")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 { return Err(StoreError::NotFound); }
        Ok(())
    }

    async fn count_low_stock(&self, threshold: u32) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE active AND stock <= $1")
            .bind(i64::from(threshold))
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY email"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_user(&self, id: Uuid) -> Result<User, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn insert_user(&self, u: &User) -> Result<(), StoreError> {
        sqlx::query(&format!("INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"))
            .bind(u.id).bind(&u.email).bind(&u.hashed_password).bind(&u.full_name)
            .bind(u.role.as_str()).bind(u.is_active).bind(u.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique(e, &format!("email {}", u.email)))?;
        Ok(())
    }

    async fn update_user(&self, u: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET email = $2, hashed_password = $3, full_name = $4, role = $5, is_active = $6 WHERE id = $1",
        )
        .bind(u.id).bind(&u.email).bind(&u.hashed_password).bind(&u.full_name).bind(u.role.as_str()).bind(u.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, &format!("email {}", u.email)))?;
        if result.rows_affected() == 0 { return Err(StoreError::NotFound); }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let (orders,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if orders > 0 {
            return Err(StoreError::Conflict("user has recorded sales; deactivate instead".to_string()));
        }
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *tx).await?;
        if result.rows_affected() == 0 { return Err(StoreError::NotFound); }
        tx.commit().await?;
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn settings(&self) -> Result<BusinessSettings, StoreError> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT business_name, tax_id, tax_rate, currency_symbol, low_stock_threshold FROM business_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        match row {
            None => Ok(BusinessSettings::default()),
            Some(row) => Ok(BusinessSettings {
                business_name: row.business_name, tax_id: row.tax_id, tax_rate: row.tax_rate,
                currency_symbol: row.currency_symbol, low_stock_threshold: non_negative(row.low_stock_threshold, "low_stock_threshold")?,
            }),
        }
    }

    async fn save_settings(&self, s: &BusinessSettings) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO business_settings (id, business_name, tax_id, tax_rate, currency_symbol, low_stock_threshold) \
             VALUES (1, $1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET business_name = $1, tax_id = $2, tax_rate = $3, currency_symbol = $4, low_stock_threshold = $5",
        )
        .bind(&s.business_name).bind(&s.tax_id).bind(s.tax_rate).bind(&s.currency_symbol).bind(to_i32(s.low_stock_threshold)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn place_order(&self, request: &CheckoutRequest) -> Result<Placement, StoreError> {
        let settings = self.settings().await?;
        let mut tx = self.pool.begin().await?;
        let catalog = Self::lock_products(&mut tx, &request.product_ids()).await?;
        // Dropping `tx` on the error path rolls back and releases the locks.
        let placement = checkout::place_order(request, catalog, &settings, Utc::now())?;

        let order = &placement.order;
        sqlx::query(
            "INSERT INTO orders (id, created_at, status, payment_method, subtotal, tax_amount, total_amount, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order.id).bind(order.created_at).bind(order.status.as_str()).bind(order.payment_method.as_str())
        .bind(order.subtotal.amount()).bind(order.tax_amount.amount()).bind(order.total_amount.amount()).bind(order.user_id)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, quantity, price_at_purchase) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(item.id).bind(item.order_id).bind(item.product_id).bind(to_i32(item.quantity)?).bind(item.price_at_purchase.amount())
            .execute(&mut *tx)
            .await?;
        }

        Self::write_stock(&mut tx, &placement.products).await?;
        tx.commit().await?;
        Ok(placement)
    }

    async fn cancel_order(&self, id: Uuid) -> Result<Cancellation, StoreError> {
        let mut tx = self.pool.begin().await?;
        let header = sqlx::query_as::<_, OrderRow>(
            "SELECT id, created_at, status, payment_method, subtotal, tax_amount, total_amount, user_id \
             FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;
        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, quantity, price_at_purchase FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(OrderItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;
        let order = header.into_order(items)?;

        let mut ids: Vec<Uuid> = order.items.iter().map(|i| i.product_id).collect();
        ids.sort();
        ids.dedup();
        let catalog = Self::lock_products(&mut tx, &ids).await?;
        let cancellation = checkout::cancel_order(order, catalog)?;

        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id).bind(cancellation.order.status.as_str())
            .execute(&mut *tx)
            .await?;
        Self::write_stock(&mut tx, &cancellation.products).await?;
        tx.commit().await?;
        Ok(cancellation)
    }

    async fn get_order(&self, id: Uuid) -> Result<Order, StoreError> {
        let header = sqlx::query_as::<_, OrderRow>(
            "SELECT id, created_at, status, payment_method, subtotal, tax_amount, total_amount, user_id FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        let items = self.load_items(id).await?;
        header.into_order(items)
    }

    async fn order_records(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<OrderRecord>, StoreError> {
        let headers = sqlx::query_as::<_, OrderRecordRow>(
            "SELECT o.id, o.created_at, o.status, o.total_amount, \
                    COALESCE(NULLIF(u.full_name, ''), u.email) AS cashier \
             FROM orders o LEFT JOIN users u ON u.id = o.user_id \
             WHERE o.created_at >= $1 AND o.created_at < $2 \
             ORDER BY o.created_at",
        )
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        if headers.is_empty() { return Ok(Vec::new()); }

        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let item_rows = sqlx::query_as::<_, ItemRecordRow>(
            "SELECT i.order_id, i.product_id, p.name AS product_name, p.category, i.quantity, i.price_at_purchase \
             FROM order_items i JOIN products p ON p.id = i.product_id \
             WHERE i.order_id = ANY($1) ORDER BY i.id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<ItemRecord>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id).or_default().push(ItemRecord {
                product_id: row.product_id, product_name: row.product_name, category: row.category,
                quantity: non_negative(row.quantity, "quantity")?, price_at_purchase: Money::new(row.price_at_purchase),
            });
        }

        headers.into_iter().map(|h| {
            let status = h.status.parse().map_err(|e| StoreError::DataCorruption(format!("{e} for order {}", h.id)))?;
            Ok(OrderRecord {
                id: h.id, created_at: h.created_at, status, total_amount: Money::new(h.total_amount),
                cashier: h.cashier, items: items.remove(&h.id).unwrap_or_default(),
            })
        }).collect()
    }
}
