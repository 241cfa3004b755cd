use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartEntry, CartLine, CartLineId, Money, Order, OrderId, OrderLine, OrderLineId, OrderQuery,
    OrderStatus, Product, ProductId, Result, ShippingDetails, StoreError, UserId,
    store::{CartStore, OrderStore, ProductStore, Storage, Transaction},
};

const PRODUCT_COLUMNS: &str =
    "id, seller_id, name, description, price_cents, stock, is_active, created_at, updated_at";

const ORDER_COLUMNS: &str =
    "id, user_id, total_cents, status, address, phone, created_at, updated_at";

/// PostgreSQL-backed storage.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a new PostgreSQL storage handle.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// Transaction over [`PostgresStorage`]. Dropping it rolls back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn load_lines(&mut self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLine>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, price_cents, position
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            let order_id: Uuid = row.try_get("order_id")?;
            lines.entry(order_id).or_default().push(row_to_line(&row)?);
        }
        Ok(lines)
    }
}

#[async_trait]
impl ProductStore for PostgresTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| row_to_product(&row, "")).transpose()
    }

    async fn get_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(|row| row_to_product(row, "")).collect()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, name, description, price_cents, stock, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.seller_id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(to_int(product.stock, "stock")?)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_price(&mut self, id: ProductId, price: Money) -> Result<()> {
        let result =
            sqlx::query("UPDATE products SET price_cents = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(price.cents())
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(product_not_found(id));
        }
        Ok(())
    }

    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> Result<u32> {
        let delta_int = i32::try_from(delta)
            .map_err(|_| StoreError::OutOfRange(format!("stock delta {delta}")))?;

        // Check and update in one statement; the row lock taken by UPDATE
        // serializes concurrent adjustments of the same product.
        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1 AND stock + $2 >= 0
            RETURNING stock
            "#,
        )
        .bind(id.as_uuid())
        .bind(delta_int)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(stock) = updated {
            return from_int(stock, "stock");
        }

        let current: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        match current {
            Some(available) => Err(StoreError::InsufficientStock {
                product_id: id,
                requested: u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX),
                available: from_int(available, "stock")?,
            }),
            None => Err(product_not_found(id)),
        }
    }
}

#[async_trait]
impl CartStore for PostgresTransaction {
    async fn list_cart(&mut self, user_id: UserId) -> Result<Vec<CartEntry>> {
        // Locking the cart rows serializes concurrent checkouts of one cart.
        let rows = sqlx::query(
            r#"
            SELECT c.id AS line_id, c.user_id, c.product_id, c.quantity,
                   c.created_at AS line_created_at, c.updated_at AS line_updated_at,
                   p.id AS p_id, p.seller_id AS p_seller_id, p.name AS p_name,
                   p.description AS p_description, p.price_cents AS p_price_cents,
                   p.stock AS p_stock, p.is_active AS p_is_active,
                   p.created_at AS p_created_at, p.updated_at AS p_updated_at
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.seq ASC
            FOR UPDATE OF c
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CartEntry {
                    line: CartLine {
                        id: CartLineId::from_uuid(row.try_get("line_id")?),
                        user_id: UserId::from_uuid(row.try_get("user_id")?),
                        product_id: ProductId::from_uuid(row.try_get("product_id")?),
                        quantity: from_int(row.try_get("quantity")?, "quantity")?,
                        created_at: row.try_get("line_created_at")?,
                        updated_at: row.try_get("line_updated_at")?,
                    },
                    product: row_to_product(row, "p_")?,
                })
            })
            .collect()
    }

    async fn merge_cart_line(&mut self, line: &CartLine) -> Result<CartLine> {
        // The conflicting row is locked by the upsert, so concurrent merges
        // wait for each other and add up.
        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, product_id) DO UPDATE SET
                quantity = cart_items.quantity + EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at
            RETURNING id, user_id, product_id, quantity, created_at, updated_at
            "#,
        )
        .bind(line.id.as_uuid())
        .bind(line.user_id.as_uuid())
        .bind(line.product_id.as_uuid())
        .bind(to_int(line.quantity, "quantity")?)
        .bind(line.created_at)
        .bind(line.updated_at)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_cart_line(&row)
    }

    async fn get_cart_line(
        &mut self,
        user_id: UserId,
        id: CartLineId,
    ) -> Result<Option<CartLine>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, product_id, quantity, created_at, updated_at
            FROM cart_items
            WHERE id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| row_to_cart_line(&row)).transpose()
    }

    async fn save_cart_line(&mut self, line: &CartLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(line.id.as_uuid())
        .bind(line.user_id.as_uuid())
        .bind(line.product_id.as_uuid())
        .bind(to_int(line.quantity, "quantity")?)
        .bind(line.created_at)
        .bind(line.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_cart_line(&mut self, user_id: UserId, id: CartLineId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrderStore for PostgresTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_cents, status, address, phone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(&order.shipping.address)
        .bind(&order.shipping.phone)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, price_cents, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(line.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(to_int(line.quantity, "quantity")?)
            .bind(line.price.cents())
            .bind(to_int(line.position, "position")?)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut lines = self.load_lines(&[id.as_uuid()]).await?;
        let order = row_to_order(&row, lines.remove(&id.as_uuid()).unwrap_or_default())?;
        Ok(Some(order))
    }

    async fn list_orders(&mut self, query: &OrderQuery) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(to_bigint(limit, "limit")?);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(to_bigint(offset, "offset")?);
        }

        let rows = sqlx_query.fetch_all(&mut *self.tx).await?;
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut lines = self.load_lines(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| row_to_order(row, lines.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn transition_status(
        &mut self,
        id: OrderId,
        expected: Option<OrderStatus>,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = match expected {
            Some(expected) => {
                sqlx::query(
                    "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 AND status = $4",
                )
                .bind(id.as_uuid())
                .bind(next.as_str())
                .bind(at)
                .bind(expected.as_str())
                .execute(&mut *self.tx)
                .await?
            }
            None => {
                sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
                    .bind(id.as_uuid())
                    .bind(next.as_str())
                    .bind(at)
                    .execute(&mut *self.tx)
                    .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn row_to_product(row: &PgRow, prefix: &str) -> Result<Product> {
    let column = |name: &str| format!("{prefix}{name}");
    Ok(Product {
        id: ProductId::from_uuid(row.try_get(column("id").as_str())?),
        seller_id: UserId::from_uuid(row.try_get(column("seller_id").as_str())?),
        name: row.try_get(column("name").as_str())?,
        description: row.try_get(column("description").as_str())?,
        price: Money::from_cents(row.try_get(column("price_cents").as_str())?),
        stock: from_int(row.try_get(column("stock").as_str())?, "stock")?,
        is_active: row.try_get(column("is_active").as_str())?,
        created_at: row.try_get(column("created_at").as_str())?,
        updated_at: row.try_get(column("updated_at").as_str())?,
    })
}

fn row_to_cart_line(row: &PgRow) -> Result<CartLine> {
    Ok(CartLine {
        id: CartLineId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        quantity: from_int(row.try_get("quantity")?, "quantity")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line(row: &PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        id: OrderLineId::from_uuid(row.try_get("id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        quantity: from_int(row.try_get("quantity")?, "quantity")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        position: from_int(row.try_get("position")?, "position")?,
    })
}

fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        lines,
        total: Money::from_cents(row.try_get("total_cents")?),
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        shipping: ShippingDetails {
            address: row.try_get("address")?,
            phone: row.try_get("phone")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn to_int(value: u32, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::OutOfRange(format!("{field} {value}")))
}

fn to_bigint(value: usize, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange(format!("{field} {value}")))
}

fn from_int(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {field}: {value}")))
}

fn product_not_found(id: ProductId) -> StoreError {
    StoreError::NotFound {
        entity: "Product",
        id: id.to_string(),
    }
}
