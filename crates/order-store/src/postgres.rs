use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CatalogItem, Customer, EmailAddress, ErrorReport, ErrorSeverity, ErrorSource, LineItem,
    NewOrder, Order, OrderId, OrderStatus, PastOrder, Result, StoreError,
    store::{CatalogStore, CustomerStore, ErrorLog, OrderStore, validate_line_items},
};

const ORDER_COLUMNS: &str = "id, customer_name, customer_phone, customer_email, submitted_at, line_items, status, tracking_link";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let email: String = row.try_get("customer_email")?;
        let status: String = row.try_get("status")?;
        let line_items: serde_json::Value = row.try_get("line_items")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_name: row.try_get("customer_name")?,
            customer_phone: row.try_get("customer_phone")?,
            customer_email: EmailAddress::parse(&email)
                .map_err(|e| StoreError::CorruptRecord(e.to_string()))?,
            submitted_at: row.try_get::<NaiveDateTime, _>("submitted_at")?,
            line_items: serde_json::from_value(line_items)?,
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| StoreError::CorruptRecord(e.to_string()))?,
            tracking_link: row.try_get("tracking_link")?,
        })
    }

    fn row_to_customer(row: PgRow) -> Result<Customer> {
        let email: String = row.try_get("email")?;
        let past_orders: serde_json::Value = row.try_get("past_orders")?;

        Ok(Customer {
            email: EmailAddress::parse(&email)
                .map_err(|e| StoreError::CorruptRecord(e.to_string()))?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            past_orders: serde_json::from_value(past_orders)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn row_to_catalog_item(row: PgRow) -> Result<CatalogItem> {
        let quantity: i64 = row.try_get("quantity_on_hand")?;
        Ok(CatalogItem {
            name: row.try_get("name")?,
            quantity_on_hand: u32::try_from(quantity).map_err(|_| {
                StoreError::CorruptRecord(format!("quantity_on_hand out of range: {quantity}"))
            })?,
        })
    }

    fn row_to_error_report(row: PgRow) -> Result<ErrorReport> {
        let source: String = row.try_get("source")?;
        let severity: String = row.try_get("severity")?;

        Ok(ErrorReport {
            email: row.try_get("email")?,
            message: row.try_get("message")?,
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            source: parse_source(&source)?,
            severity: parse_severity(&severity)?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    async fn ensure_order_exists(&self, id: OrderId) -> Result<()> {
        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        exists.map(|_| ()).ok_or(StoreError::OrderNotFound(id))
    }
}

fn parse_source(value: &str) -> Result<ErrorSource> {
    match value {
        "Customer" => Ok(ErrorSource::Customer),
        "System" => Ok(ErrorSource::System),
        other => Err(StoreError::CorruptRecord(format!(
            "unknown error source: {other}"
        ))),
    }
}

fn parse_severity(value: &str) -> Result<ErrorSeverity> {
    match value {
        "Low" => Ok(ErrorSeverity::Low),
        "Medium" => Ok(ErrorSeverity::Medium),
        "High" => Ok(ErrorSeverity::High),
        "Critical" => Ok(ErrorSeverity::Critical),
        other => Err(StoreError::CorruptRecord(format!(
            "unknown error severity: {other}"
        ))),
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn catalog_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM catalog_items ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    async fn get_item(&self, name: &str) -> Result<Option<CatalogItem>> {
        let row = sqlx::query("SELECT name, quantity_on_hand FROM catalog_items WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_catalog_item).transpose()
    }

    async fn put_item(&self, item: CatalogItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_items (name, quantity_on_hand)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET quantity_on_hand = EXCLUDED.quantity_on_hand
            "#,
        )
        .bind(&item.name)
        .bind(i64::from(item.quantity_on_hand))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn try_decrement(&self, name: &str, quantity: u32) -> Result<bool> {
        // The WHERE guard makes check-and-decrement one statement.
        let result = sqlx::query(
            r#"
            UPDATE catalog_items
            SET quantity_on_hand = quantity_on_hand - $2
            WHERE name = $1 AND quantity_on_hand >= $2
            "#,
        )
        .bind(name)
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self))]
    async fn restock(&self, name: &str, quantity: u32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_items (name, quantity_on_hand)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE
                SET quantity_on_hand = catalog_items.quantity_on_hand + EXCLUDED.quantity_on_hand
            "#,
        )
        .bind(name)
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for PostgresStore {
    async fn find_customer(&self, email: &EmailAddress) -> Result<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT email, name, phone, address, past_orders, created_at
            FROM customers
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_customer).transpose()
    }

    #[tracing::instrument(skip(self, customer), fields(customer = %customer.email))]
    async fn insert_customer_if_absent(&self, customer: Customer) -> Result<Customer> {
        let past_orders = serde_json::to_value(&customer.past_orders)?;

        sqlx::query(
            r#"
            INSERT INTO customers (email, name, phone, address, past_orders, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(customer.email.as_str())
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(past_orders)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        self.find_customer(&customer.email)
            .await?
            .ok_or_else(|| StoreError::InvalidRecord(format!("customer {} vanished", customer.email)))
    }

    async fn append_past_order(&self, email: &EmailAddress, summary: PastOrder) -> Result<()> {
        let summary = serde_json::to_value(&summary)?;

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET past_orders = past_orders || jsonb_build_array($2::jsonb)
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .bind(summary)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvalidRecord(format!(
                "no customer with email {email}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(customer = %order.customer_email))]
    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        validate_line_items(&order.line_items)?;
        let line_items = serde_json::to_value(&order.line_items)?;

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO orders (customer_name, customer_phone, customer_email, submitted_at, line_items, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(order.customer_email.as_str())
        .bind(order.submitted_at)
        .bind(line_items)
        .bind(order.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(order_id = %id, "Order inserted");
        Ok(order.into_order(OrderId::from_uuid(id)))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn orders_submitted_between(
        &self,
        email: &EmailAddress,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE customer_email = $1 AND submitted_at >= $2 AND submitted_at <= $3
            ORDER BY submitted_at DESC, seq DESC
            "#
        ))
        .bind(email.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn latest_order_for(&self, email: &EmailAddress) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE customer_email = $1
            ORDER BY submitted_at DESC, seq DESC
            LIMIT 1
            "#
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn set_tracking_link(&self, id: OrderId, link: &str) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET tracking_link = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(link)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, items), fields(order_id = %id))]
    async fn replace_line_items(
        &self,
        id: OrderId,
        expected: OrderStatus,
        items: &[LineItem],
    ) -> Result<bool> {
        validate_line_items(items)?;
        let line_items = serde_json::to_value(items)?;

        let result =
            sqlx::query("UPDATE orders SET line_items = $3 WHERE id = $1 AND status = $2")
                .bind(id.as_uuid())
                .bind(expected.as_str())
                .bind(line_items)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        self.ensure_order_exists(id).await?;
        Ok(false)
    }

    #[tracing::instrument(skip(self), fields(order_id = %id))]
    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .bind(next.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        self.ensure_order_exists(id).await?;
        Ok(false)
    }
}

#[async_trait]
impl ErrorLog for PostgresStore {
    async fn record_error(&self, report: ErrorReport) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO intake_errors (email, message, order_id, source, severity, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&report.email)
        .bind(&report.message)
        .bind(report.order_id.map(|id| id.as_uuid()))
        .bind(report.source.as_str())
        .bind(report.severity.as_str())
        .bind(report.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_errors(&self, limit: usize) -> Result<Vec<ErrorReport>> {
        let rows = sqlx::query(
            r#"
            SELECT email, message, order_id, source, severity, recorded_at
            FROM intake_errors
            ORDER BY recorded_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_error_report).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_and_severity_roundtrip() {
        for source in [ErrorSource::Customer, ErrorSource::System] {
            assert_eq!(parse_source(source.as_str()).unwrap(), source);
        }
        for severity in [
            ErrorSeverity::Low,
            ErrorSeverity::Medium,
            ErrorSeverity::High,
            ErrorSeverity::Critical,
        ] {
            assert_eq!(parse_severity(severity.as_str()).unwrap(), severity);
        }
        assert!(matches!(
            parse_severity("severe"),
            Err(StoreError::CorruptRecord(_))
        ));
    }
}
