//! Postgres implementation of Repository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::{
    CartItem, CustomerSnapshot, NewOrder, Order, OrderItem, OrderStatus, PaymentRecord, Product, User,
};
use crate::ports::{Repository, RepositoryError, RepositoryResult};
use crate::validation::MAX_LINE_QUANTITY;

const ORDER_COLUMNS: &str = "id, user_id, total, currency, status, payment_method, payment_status, \
     verification, gateway, gateway_order_id, gateway_payment_id, signature, customer_name, \
     customer_phone, customer_email, shipping_address, pincode, cancellation_reason, created_at, updated_at";

/// Postgres-backed repository.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Catalog upsert, used by seeding and tests.
    pub async fn upsert_product(&self, product: &Product) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, in_stock, is_deal, deal_price, deal_expiry)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                in_stock = EXCLUDED.in_stock,
                is_deal = EXCLUDED.is_deal,
                deal_price = EXCLUDED.deal_price,
                deal_expiry = EXCLUDED.deal_expiry
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.price)
        .bind(product.in_stock)
        .bind(product.is_deal)
        .bind(&product.deal_price)
        .bind(product.deal_expiry)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stores a user with the digest of their session token.
    pub async fn insert_user(&self, user: &User, token_hash: &str) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO users (id, name, email, phone, token_hash, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(token_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Tells a missing row apart from one in the wrong state after a conditional update.
    async fn missing_or_conflict(&self, order_id: Uuid, expected: OrderStatus) -> RepositoryError {
        let current: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await;

        match current {
            Ok(Some(status)) => RepositoryError::Conflict(format!(
                "order {} is {}, expected {}",
                order_id, status, expected
            )),
            Ok(None) => RepositoryError::NotFound(order_id.to_string()),
            Err(err) => err.into(),
        }
    }
}

async fn insert_payment(conn: &mut PgConnection, payment: &PaymentRecord) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, order_id, gateway, gateway_order_id, gateway_payment_id, signature,
            amount, currency, status, verification, raw_response, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(payment.id)
    .bind(payment.order_id)
    .bind(&payment.gateway)
    .bind(&payment.gateway_order_id)
    .bind(&payment.gateway_payment_id)
    .bind(&payment.signature)
    .bind(&payment.amount)
    .bind(&payment.currency)
    .bind(payment.status.as_str())
    .bind(payment.verification.as_str())
    .bind(&payment.raw_response)
    .bind(payment.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

async fn clear_cart(conn: &mut PgConnection, user_id: Uuid) -> RepositoryResult<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user_by_token_hash(&self, token_hash: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, phone, created_at FROM users WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_domain))
    }

    async fn get_user(&self, id: Uuid) -> RepositoryResult<User> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, email, phone, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn get_products(&self, ids: &[String]) -> RepositoryResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, price, in_stock, is_deal, deal_price, deal_expiry FROM products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ProductRow::into_domain).collect())
    }

    async fn add_to_cart(&self, user_id: Uuid, product_id: &str, quantity: i32) -> RepositoryResult<CartItem> {
        let row = sqlx::query_as::<_, CartRow>(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity, added_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, $4)
            RETURNING user_id, product_id, quantity, added_at
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(MAX_LINE_QUANTITY)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_domain())
    }

    async fn list_cart(&self, user_id: Uuid) -> RepositoryResult<Vec<CartItem>> {
        let rows = sqlx::query_as::<_, CartRow>(
            "SELECT user_id, product_id, quantity, added_at FROM cart_items WHERE user_id = $1 ORDER BY added_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CartRow::into_domain).collect())
    }

    async fn create_order(
        &self,
        new_order: &NewOrder,
        payment: Option<&PaymentRecord>,
        clear_cart_for: Option<Uuid>,
    ) -> RepositoryResult<Order> {
        let order = &new_order.order;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
             $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) RETURNING {cols}",
            cols = ORDER_COLUMNS
        ))
        .bind(order.id)
        .bind(order.user_id)
        .bind(&order.total)
        .bind(&order.currency)
        .bind(order.status.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.verification.as_str())
        .bind(&order.gateway)
        .bind(&order.gateway_order_id)
        .bind(&order.gateway_payment_id)
        .bind(&order.signature)
        .bind(&order.customer.name)
        .bind(&order.customer.phone)
        .bind(&order.customer.email)
        .bind(&order.customer.address)
        .bind(&order.customer.pincode)
        .bind(&order.cancellation_reason)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        for item in &new_order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(&item.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(payment) = payment {
            insert_payment(&mut *tx, payment).await?;
        }
        if let Some(user_id) = clear_cart_for {
            clear_cart(&mut *tx, user_id).await?;
        }

        tx.commit().await?;
        row.into_domain()
    }

    async fn confirm_order(
        &self,
        order_id: Uuid,
        payment: &PaymentRecord,
        clear_cart_for: Option<Uuid>,
    ) -> RepositoryResult<Order> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders SET
                status = 'confirmed',
                payment_status = 'completed',
                verification = $2,
                gateway = $3,
                gateway_order_id = $4,
                gateway_payment_id = $5,
                signature = $6,
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(payment.verification.as_str())
        .bind(&payment.gateway)
        .bind(&payment.gateway_order_id)
        .bind(&payment.gateway_payment_id)
        .bind(&payment.signature)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(self.missing_or_conflict(order_id, OrderStatus::Pending).await);
        };

        insert_payment(&mut *tx, payment).await?;
        if let Some(user_id) = clear_cart_for {
            clear_cart(&mut *tx, user_id).await?;
        }

        tx.commit().await?;
        row.into_domain()
    }

    async fn attach_gateway_order(
        &self,
        order_id: Uuid,
        gateway: &str,
        gateway_order_id: &str,
    ) -> RepositoryResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET gateway = $2, gateway_order_id = $3, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(gateway)
        .bind(gateway_order_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_domain(),
            None => Err(self.missing_or_conflict(order_id, OrderStatus::Pending).await),
        }
    }

    async fn get_order(&self, id: Uuid) -> RepositoryResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn get_order_items(&self, order_id: Uuid) -> RepositoryResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, product_name, quantity, unit_price FROM order_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderItemRow::into_domain).collect())
    }

    async fn find_order_by_payment_id(&self, gateway_payment_id: &str) -> RepositoryResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE gateway_payment_id = $1",
            ORDER_COLUMNS
        ))
        .bind(gateway_payment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_domain).transpose()
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_domain).collect()
    }

    async fn transition_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        reason: Option<&str>,
    ) -> RepositoryResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET status = $3, cancellation_reason = COALESCE($4, cancellation_reason), \
             updated_at = NOW() WHERE id = $1 AND status = $2 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_domain(),
            None => Err(self.missing_or_conflict(order_id, from).await),
        }
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_domain(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    price: BigDecimal,
    in_stock: bool,
    is_deal: bool,
    deal_price: Option<BigDecimal>,
    deal_expiry: Option<DateTime<Utc>>,
}

impl ProductRow {
    fn into_domain(self) -> Product {
        Product {
            id: self.id,
            name: self.name,
            price: self.price,
            in_stock: self.in_stock,
            is_deal: self.is_deal,
            deal_price: self.deal_price,
            deal_expiry: self.deal_expiry,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    user_id: Uuid,
    product_id: String,
    quantity: i32,
    added_at: DateTime<Utc>,
}

impl CartRow {
    fn into_domain(self) -> CartItem {
        CartItem {
            user_id: self.user_id,
            product_id: self.product_id,
            quantity: self.quantity,
            added_at: self.added_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Option<Uuid>,
    total: BigDecimal,
    currency: String,
    status: String,
    payment_method: String,
    payment_status: String,
    verification: String,
    gateway: Option<String>,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    signature: Option<String>,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    shipping_address: String,
    pincode: String,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_domain(self) -> RepositoryResult<Order> {
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            total: self.total,
            currency: self.currency,
            status: self.status.parse().map_err(RepositoryError::Storage)?,
            payment_method: self.payment_method.parse().map_err(RepositoryError::Storage)?,
            payment_status: self.payment_status.parse().map_err(RepositoryError::Storage)?,
            verification: self.verification.parse().map_err(RepositoryError::Storage)?,
            gateway: self.gateway,
            gateway_order_id: self.gateway_order_id,
            gateway_payment_id: self.gateway_payment_id,
            signature: self.signature,
            customer: CustomerSnapshot {
                name: self.customer_name,
                phone: self.customer_phone,
                email: self.customer_email,
                address: self.shipping_address,
                pincode: self.pincode,
            },
            cancellation_reason: self.cancellation_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: String,
    product_name: String,
    quantity: i32,
    unit_price: BigDecimal,
}

impl OrderItemRow {
    fn into_domain(self) -> OrderItem {
        OrderItem {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            product_name: self.product_name,
            quantity: self.quantity,
            unit_price: self.unit_price,
        }
    }
}
