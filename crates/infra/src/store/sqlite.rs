//! SQLite-backed inventory store implementation.
//!
//! Relations:
//!
//! | table | key | notes |
//! |-------|-----|-------|
//! | `warehouses` | `name` | address, capacity |
//! | `brands` | `name` | quality checked to 1..=5 |
//! | `products` | `sku` | name, price, brand FK, kind tag |
//! | `book_products` / `consumable_products` / `electronics_products` | `sku` | kind-specific column, cascade on product delete |
//! | `stock` | `(warehouse_name, sku)` | quantity, FKs to warehouses and products |
//!
//! ## Error Mapping
//!
//! | SQLx error | StoreError |
//! |------------|------------|
//! | unique violation on `warehouses` insert | `DuplicateWarehouse` |
//! | foreign key violation | `MissingReference` |
//! | anything else | `Database` |
//!
//! ## Isolation
//!
//! Transactions opened through one store (and its clones) run one at a time:
//! `begin` waits on a shared lock that the transaction holds until it
//! commits, rolls back or ends. Two deferred transactions that both read
//! before writing cannot both upgrade to a writer (`SQLITE_BUSY`), so a
//! second caller waits here instead. Other processes sharing the file are
//! only covered by SQLite's busy timeout.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::instrument;

use stockroom_core::{Sku, WarehouseName};
use stockroom_inventory::{StockRow, Warehouse};
use stockroom_products::{Brand, ProductKind, ProductRecord};

use super::r#trait::{InventoryStore, StoreError, StoreResult, StoreTransaction};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS warehouses (
        name     TEXT PRIMARY KEY,
        address  TEXT NOT NULL,
        capacity INTEGER NOT NULL CHECK (capacity >= 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS brands (
        name    TEXT PRIMARY KEY,
        quality INTEGER NOT NULL CHECK (quality BETWEEN 1 AND 5)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        sku   TEXT PRIMARY KEY,
        name  TEXT NOT NULL,
        price INTEGER NOT NULL,
        brand TEXT NOT NULL REFERENCES brands (name),
        kind  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS book_products (
        sku    TEXT PRIMARY KEY REFERENCES products (sku) ON DELETE CASCADE,
        author TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS consumable_products (
        sku             TEXT PRIMARY KEY REFERENCES products (sku) ON DELETE CASCADE,
        expiration_date TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS electronics_products (
        sku             TEXT PRIMARY KEY REFERENCES products (sku) ON DELETE CASCADE,
        warranty_period TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock (
        warehouse_name TEXT NOT NULL REFERENCES warehouses (name),
        sku            TEXT NOT NULL REFERENCES products (sku),
        quantity       INTEGER NOT NULL CHECK (quantity >= 0),
        PRIMARY KEY (warehouse_name, sku)
    )
    "#,
];

/// SQLite-backed inventory store.
///
/// Cheap to clone; clones share the connection pool and the transaction lock.
#[derive(Debug, Clone)]
pub struct SqliteInventoryStore {
    pool: SqlitePool,
    serial: Arc<Mutex<()>>,
}

impl SqliteInventoryStore {
    /// Connect to `url` and create the schema if it does not exist yet.
    ///
    /// In-memory databases live as long as their connection, so for those
    /// the pool keeps exactly one connection and never retires it.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| map_sqlx_error("parse_url", e))?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:");
        let max_connections = if in_memory && max_connections > 1 {
            tracing::warn!(max_connections, "in-memory SQLite is private to one connection; using 1");
            1
        } else {
            max_connections.max(1)
        };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self {
            pool,
            serial: Arc::default(),
        };
        store.init().await?;
        Ok(store)
    }

    /// Fresh private in-memory database on a single connection.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn init(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("create_schema", e))?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl InventoryStore for SqliteInventoryStore {
    type Transaction = SqliteTransaction;

    async fn begin(&self) -> StoreResult<Self::Transaction> {
        let turn = self.serial.clone().lock_owned().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(SqliteTransaction {
            tx: Some(tx),
            turn: Some(turn),
        })
    }
}

/// An open SQLite transaction. `None` once committed, rolled back or ended.
pub struct SqliteTransaction {
    tx: Option<Transaction<'static, Sqlite>>,
    /// Released right after `tx` is finished.
    turn: Option<OwnedMutexGuard<()>>,
}

impl SqliteTransaction {
    fn conn(&mut self) -> StoreResult<&mut SqliteConnection> {
        self.tx.as_deref_mut().ok_or(StoreError::TransactionClosed)
    }

    async fn fetch_warehouses(&mut self, first: Option<&WarehouseName>) -> StoreResult<Vec<Warehouse>> {
        let conn = self.conn()?;
        let rows = sqlx::query(
            r#"
            SELECT name, address, capacity
            FROM warehouses
            ORDER BY CASE WHEN name = ?1 THEN 0 ELSE 1 END, name
            "#,
        )
        .bind(first.map(|f| f.as_str()))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("select_warehouses", e))?;

        rows.iter().map(warehouse_from_row).collect()
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn list_warehouses(&mut self) -> StoreResult<Vec<Warehouse>> {
        self.fetch_warehouses(None).await
    }

    async fn list_warehouses_ordered_first(
        &mut self,
        first: &WarehouseName,
    ) -> StoreResult<Vec<Warehouse>> {
        self.fetch_warehouses(Some(first)).await
    }

    #[instrument(skip(self, warehouse), fields(warehouse = %warehouse.name), err)]
    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> StoreResult<()> {
        let capacity = to_i64(warehouse.capacity, "capacity")?;
        let conn = self.conn()?;
        sqlx::query("INSERT INTO warehouses (name, address, capacity) VALUES (?1, ?2, ?3)")
            .bind(warehouse.name.as_str())
            .bind(&warehouse.address)
            .bind(capacity)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateWarehouse(warehouse.name.clone())
                } else {
                    map_sqlx_error("insert_warehouse", e)
                }
            })?;
        Ok(())
    }

    async fn used_capacity(&mut self, warehouse: &WarehouseName) -> StoreResult<u64> {
        let conn = self.conn()?;
        let used: i64 = sqlx::query(
            "SELECT COALESCE(SUM(quantity), 0) AS used FROM stock WHERE warehouse_name = ?1",
        )
        .bind(warehouse.as_str())
        .fetch_one(&mut *conn)
        .await
        .and_then(|row| row.try_get("used"))
        .map_err(|e| map_sqlx_error("select_used_capacity", e))?;
        to_u64(used, "used capacity")
    }

    async fn products_in_warehouse(
        &mut self,
        warehouse: &WarehouseName,
    ) -> StoreResult<Vec<(ProductRecord, u64)>> {
        let conn = self.conn()?;
        let rows = sqlx::query(
            r#"
            SELECT
                p.sku, p.name, p.price, p.kind,
                b.name AS brand_name, b.quality AS brand_quality,
                bp.author, cp.expiration_date, ep.warranty_period,
                s.quantity
            FROM stock s
            JOIN products p ON p.sku = s.sku
            JOIN brands b ON b.name = p.brand
            LEFT JOIN book_products bp ON bp.sku = p.sku
            LEFT JOIN consumable_products cp ON cp.sku = p.sku
            LEFT JOIN electronics_products ep ON ep.sku = p.sku
            WHERE s.warehouse_name = ?1 AND s.quantity > 0
            ORDER BY p.sku
            "#,
        )
        .bind(warehouse.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("select_products_by_warehouse", e))?;

        rows.iter()
            .map(|row| -> StoreResult<(ProductRecord, u64)> {
                let quantity: i64 = get(row, "quantity")?;
                Ok((record_from_row(row)?, to_u64(quantity, "quantity")?))
            })
            .collect()
    }

    async fn product_kind_by_sku(&mut self, sku: &Sku) -> StoreResult<Option<String>> {
        let conn = self.conn()?;
        let row = sqlx::query("SELECT kind FROM products WHERE sku = ?1")
            .bind(sku.as_str())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("select_product_kind", e))?;
        row.map(|r| get::<String>(&r, "kind")).transpose()
    }

    #[instrument(skip(self, product), fields(sku = %product.sku), err)]
    async fn upsert_product_and_increment_stock(
        &mut self,
        warehouse: &WarehouseName,
        product: &ProductRecord,
        quantity: u64,
    ) -> StoreResult<()> {
        let kind: ProductKind = product
            .kind
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("unknown product kind '{}'", product.kind)))?;
        let price = to_i64(product.price, "price")?;
        let quantity = to_i64(quantity, "quantity")?;
        let conn = self.conn()?;

        sqlx::query("INSERT OR IGNORE INTO brands (name, quality) VALUES (?1, ?2)")
            .bind(product.brand.name())
            .bind(i64::from(product.brand.quality()))
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("insert_brand", e))?;

        sqlx::query(
            "INSERT OR IGNORE INTO products (sku, name, price, brand, kind) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(product.sku.as_str())
        .bind(&product.name)
        .bind(price)
        .bind(product.brand.name())
        .bind(&product.kind)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        let missing = |attribute: &str| {
            StoreError::Corrupt(format!("product {} of kind {kind} has no {attribute}", product.sku))
        };
        let inserted = match kind {
            ProductKind::Book => {
                let author = product.author.as_deref().ok_or_else(|| missing("author"))?;
                sqlx::query("INSERT OR IGNORE INTO book_products (sku, author) VALUES (?1, ?2)")
                    .bind(product.sku.as_str())
                    .bind(author)
                    .execute(&mut *conn)
                    .await
            }
            ProductKind::Consumable => {
                let expiration_date = product
                    .expiration_date
                    .ok_or_else(|| missing("expiration date"))?;
                sqlx::query(
                    "INSERT OR IGNORE INTO consumable_products (sku, expiration_date) VALUES (?1, ?2)",
                )
                .bind(product.sku.as_str())
                .bind(expiration_date)
                .execute(&mut *conn)
                .await
            }
            ProductKind::Electronics => {
                let warranty = product
                    .warranty_period
                    .as_deref()
                    .ok_or_else(|| missing("warranty period"))?;
                sqlx::query(
                    "INSERT OR IGNORE INTO electronics_products (sku, warranty_period) VALUES (?1, ?2)",
                )
                .bind(product.sku.as_str())
                .bind(warranty)
                .execute(&mut *conn)
                .await
            }
        };
        inserted.map_err(|e| map_sqlx_error("insert_product_kind", e))?;

        sqlx::query(
            r#"
            INSERT INTO stock (warehouse_name, sku, quantity)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (warehouse_name, sku)
            DO UPDATE SET quantity = quantity + excluded.quantity
            "#,
        )
        .bind(warehouse.as_str())
        .bind(product.sku.as_str())
        .bind(quantity)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("upsert_stock", e))?;

        Ok(())
    }

    async fn stock_by_sku_ordered_first(
        &mut self,
        first: &WarehouseName,
        sku: &Sku,
    ) -> StoreResult<Vec<StockRow>> {
        let conn = self.conn()?;
        let rows = sqlx::query(
            r#"
            SELECT warehouse_name, sku, quantity
            FROM stock
            WHERE sku = ?1
            ORDER BY CASE WHEN warehouse_name = ?2 THEN 0 ELSE 1 END, warehouse_name
            "#,
        )
        .bind(sku.as_str())
        .bind(first.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("select_stock_by_sku", e))?;

        rows.iter()
            .map(|row| -> StoreResult<StockRow> {
                let quantity: i64 = get(row, "quantity")?;
                Ok(StockRow {
                    warehouse: parse_name(get(row, "warehouse_name")?)?,
                    sku: parse_sku(get(row, "sku")?)?,
                    quantity: to_u64(quantity, "quantity")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn decrement_stock(
        &mut self,
        warehouse: &WarehouseName,
        sku: &Sku,
        amount: u64,
    ) -> StoreResult<u64> {
        let conn = self.conn()?;
        let held: Option<i64> = sqlx::query(
            "SELECT quantity FROM stock WHERE warehouse_name = ?1 AND sku = ?2",
        )
        .bind(warehouse.as_str())
        .bind(sku.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("select_stock_quantity", e))?
        .map(|row| get(&row, "quantity"))
        .transpose()?;

        let Some(held) = held else {
            return Ok(0);
        };
        let removed = to_u64(held, "quantity")?.min(amount);
        if removed == 0 {
            return Ok(0);
        }

        sqlx::query(
            "UPDATE stock SET quantity = quantity - ?1 WHERE warehouse_name = ?2 AND sku = ?3",
        )
        .bind(to_i64(removed, "quantity")?)
        .bind(warehouse.as_str())
        .bind(sku.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("decrement_stock", e))?;

        Ok(removed)
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        let committed = tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e));
        self.turn = None;
        committed
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        let rolled_back = tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e));
        self.turn = None;
        rolled_back
    }

    fn end(&mut self) {
        // sqlx rolls a dropped, unfinished transaction back on the connection's next use.
        if self.tx.take().is_some() {
            tracing::debug!("sqlite transaction ended without commit; rolling back");
        }
        self.turn = None;
    }
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("column {column}: {e}")))
}

fn warehouse_from_row(row: &SqliteRow) -> StoreResult<Warehouse> {
    let capacity: i64 = get(row, "capacity")?;
    Ok(Warehouse {
        name: parse_name(get(row, "name")?)?,
        address: get(row, "address")?,
        capacity: to_u64(capacity, "capacity")?,
    })
}

fn record_from_row(row: &SqliteRow) -> StoreResult<ProductRecord> {
    let price: i64 = get(row, "price")?;
    let quality: i64 = get(row, "brand_quality")?;
    let quality = u8::try_from(quality)
        .map_err(|_| StoreError::Corrupt(format!("brand quality {quality} out of range")))?;
    let brand = Brand::new(get::<String>(row, "brand_name")?, quality)
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(ProductRecord {
        sku: parse_sku(get(row, "sku")?)?,
        name: get(row, "name")?,
        price: to_u64(price, "price")?,
        brand,
        kind: get(row, "kind")?,
        author: get(row, "author")?,
        expiration_date: get::<Option<NaiveDate>>(row, "expiration_date")?,
        warranty_period: get(row, "warranty_period")?,
    })
}

fn parse_name(raw: String) -> StoreResult<WarehouseName> {
    WarehouseName::new(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn parse_sku(raw: String) -> StoreResult<Sku> {
    Sku::new(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn to_i64(value: u64, what: &str) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{what} {value} does not fit a SQLite integer")))
}

fn to_u64(value: i64, what: &str) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {what} {value}")))
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            StoreError::MissingReference(format!("{operation}: {}", db_err.message()))
        }
        sqlx::Error::Database(db_err) => StoreError::Database {
            operation,
            message: db_err.message().to_string(),
        },
        other => StoreError::Database {
            operation,
            message: other.to_string(),
        },
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
