//! Table store.
//!
//! One duckdb connection behind a generic CRUD surface. Per-entity knowledge
//! (table name, DDL, row mapping) lives in a [`TableRecord`] impl; the store
//! and the typed [`Table`] handle are written once, not per entity.
//!
//! Id assignment: each table handle owns an atomic counter seeded from the
//! table's current row count at construction, before any insert is accepted.
//! Ids are 1-based and advance on each accepted create.

use anyhow::{bail, Context, Result};
use duckdb::{params, Connection};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{Category, Department, Product, HOME_PARENT_ID};

// ── Record trait ──────────────────────────────────────────────────────────────

/// Per-entity configuration for the generic store.
pub trait TableRecord: Sized {
    const TABLE: &'static str;
    const DDL: &'static str;
    /// Secondary indexes; empty when the primary key is enough.
    const INDEX_SQL: &'static str = "";
    /// Column list shared by `read` and `list`.
    const SELECT_SQL: &'static str;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn insert(&self, conn: &Connection) -> duckdb::Result<usize>;
    fn update_row(&self, conn: &Connection) -> duckdb::Result<usize>;
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self>;
}

// ── Store ─────────────────────────────────────────────────────────────────────

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Create the entity's table. The DDL is `IF NOT EXISTS`, so an already
    /// existing table is not an error.
    pub fn create_table<T: TableRecord>(&self) -> Result<()> {
        debug!("Ensuring table {}", T::TABLE);
        self.conn
            .execute_batch(T::DDL)
            .with_context(|| format!("DDL failed for {}", T::TABLE))?;
        if !T::INDEX_SQL.is_empty() {
            self.conn
                .execute_batch(T::INDEX_SQL)
                .with_context(|| format!("Index creation failed for {}", T::TABLE))?;
        }
        Ok(())
    }

    /// Block until the catalog reports the entity's table as queryable.
    pub fn wait_table_active<T: TableRecord>(&self) -> Result<()> {
        for _ in 0..50 {
            let mut stmt = self.conn.prepare(
                "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
            )?;
            let visible: i64 = stmt.query_row(params![T::TABLE], |r| r.get(0))?;
            if visible > 0 {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        bail!("Table {} did not become active", T::TABLE)
    }

    pub fn ensure_table<T: TableRecord>(&self) -> Result<()> {
        self.create_table::<T>()?;
        self.wait_table_active::<T>()
    }

    /// Open a typed handle; seeds the id counter from the current table size.
    pub fn table<T: TableRecord>(&self) -> Result<Table<'_, T>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT count(*) FROM {}", T::TABLE))?;
        let count: i64 = stmt.query_row([], |r| r.get(0))?;
        info!("Table {} holds {} records", T::TABLE, count);

        Ok(Table {
            conn: &self.conn,
            next_id: AtomicI64::new(count),
            _marker: PhantomData,
        })
    }

    pub fn count<T: TableRecord>(&self) -> Result<i64> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT count(*) FROM {}", T::TABLE))?;
        Ok(stmt.query_row([], |r| r.get(0))?)
    }

    // ── Query surface ─────────────────────────────────────────────────────────

    pub fn list_departments(&self) -> Result<Vec<Department>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY id", Department::SELECT_SQL))?;
        let departments = stmt
            .query_map([], |row| Department::from_row(row))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(departments)
    }

    pub fn top_home_products(&self, limit: usize) -> Result<Vec<Product>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE parent_id = ? ORDER BY id LIMIT ?",
            Product::SELECT_SQL
        ))?;
        let products = stmt
            .query_map(params![HOME_PARENT_ID, limit as i64], |row| {
                Product::from_row(row)
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(products)
    }

    pub fn top_department_products(
        &self,
        department_id: i64,
        limit: usize,
    ) -> Result<Vec<Product>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE parent_id = ? ORDER BY id LIMIT ?",
            Product::SELECT_SQL
        ))?;
        let products = stmt
            .query_map(params![department_id, limit as i64], |row| {
                Product::from_row(row)
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(products)
    }
}

// ── Typed table handle ────────────────────────────────────────────────────────

pub struct Table<'a, T: TableRecord> {
    conn: &'a Connection,
    next_id: AtomicI64,
    _marker: PhantomData<T>,
}

impl<'a, T: TableRecord> Table<'a, T> {
    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The id the next accepted create will receive.
    pub fn next_id(&self) -> i64 {
        self.next_id.load(Ordering::SeqCst) + 1
    }

    /// Insert one record; returns it with the store-assigned id.
    pub fn create(&self, mut record: T) -> Result<T> {
        record.set_id(self.allocate_id());
        record
            .insert(self.conn)
            .with_context(|| format!("insert into {} (id {})", T::TABLE, record.id()))?;
        Ok(record)
    }

    /// Insert a batch in one transaction; returns the records with their
    /// store-assigned ids, in input order.
    pub fn create_from_list(&self, records: Vec<T>) -> Result<Vec<T>> {
        if records.is_empty() {
            return Ok(records);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = Vec::with_capacity(records.len());
        for mut record in records {
            record.set_id(self.allocate_id());
            record
                .insert(&tx)
                .with_context(|| format!("insert into {} (id {})", T::TABLE, record.id()))?;
            inserted.push(record);
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn read(&self, id: i64) -> Result<Option<T>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE id = ?", T::SELECT_SQL))?;
        let mut rows = stmt.query_map(params![id], |row| T::from_row(row))?;
        match rows.next() {
            Some(record) => Ok(Some(record?)),
            None => Ok(None),
        }
    }

    pub fn update(&self, record: &T) -> Result<()> {
        record
            .update_row(self.conn)
            .with_context(|| format!("update {} (id {})", T::TABLE, record.id()))?;
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        self.conn
            .execute(&format!("DELETE FROM {} WHERE id = ?", T::TABLE), params![id])
            .with_context(|| format!("delete from {} (id {})", T::TABLE, id))?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<T>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY id", T::SELECT_SQL))?;
        let records = stmt
            .query_map([], |row| T::from_row(row))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }
}

// ── Entity configuration ──────────────────────────────────────────────────────

impl TableRecord for Department {
    const TABLE: &'static str = "departments";

    const DDL: &'static str = r#"
CREATE TABLE IF NOT EXISTS departments (
    id          BIGINT PRIMARY KEY,
    name        VARCHAR NOT NULL,
    href        VARCHAR NOT NULL,
    scraped_at  TIMESTAMP NOT NULL
);
"#;

    const SELECT_SQL: &'static str = "SELECT id, name, href, scraped_at FROM departments";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn insert(&self, conn: &Connection) -> duckdb::Result<usize> {
        conn.execute(
            "INSERT INTO departments (id, name, href, scraped_at) VALUES (?, ?, ?, ?)",
            params![self.id, self.name, self.href, self.scraped_at],
        )
    }

    fn update_row(&self, conn: &Connection) -> duckdb::Result<usize> {
        conn.execute(
            "UPDATE departments SET name = ?, href = ?, scraped_at = ? WHERE id = ?",
            params![self.name, self.href, self.scraped_at, self.id],
        )
    }

    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Department {
            id: row.get(0)?,
            name: row.get(1)?,
            href: row.get(2)?,
            scraped_at: row.get(3)?,
        })
    }
}

impl TableRecord for Product {
    const TABLE: &'static str = "products";

    const DDL: &'static str = r#"
CREATE TABLE IF NOT EXISTS products (
    id          BIGINT PRIMARY KEY,
    name        VARCHAR NOT NULL,
    price       VARCHAR NOT NULL,
    rating      VARCHAR NOT NULL,
    parent_kind VARCHAR NOT NULL,
    parent_id   BIGINT NOT NULL,
    scraped_at  TIMESTAMP NOT NULL
);
"#;

    const INDEX_SQL: &'static str =
        "CREATE INDEX IF NOT EXISTS idx_products_parent ON products (parent_id);";

    const SELECT_SQL: &'static str =
        "SELECT id, name, price, rating, parent_kind, parent_id, scraped_at FROM products";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn insert(&self, conn: &Connection) -> duckdb::Result<usize> {
        conn.execute(
            r#"INSERT INTO products (id, name, price, rating, parent_kind, parent_id, scraped_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                self.id,
                self.name,
                self.price,
                self.rating,
                self.parent_kind,
                self.parent_id,
                self.scraped_at
            ],
        )
    }

    fn update_row(&self, conn: &Connection) -> duckdb::Result<usize> {
        conn.execute(
            r#"UPDATE products
               SET name = ?, price = ?, rating = ?, parent_kind = ?, parent_id = ?, scraped_at = ?
               WHERE id = ?"#,
            params![
                self.name,
                self.price,
                self.rating,
                self.parent_kind,
                self.parent_id,
                self.scraped_at,
                self.id
            ],
        )
    }

    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            price: row.get(2)?,
            rating: row.get(3)?,
            parent_kind: row.get(4)?,
            parent_id: row.get(5)?,
            scraped_at: row.get(6)?,
        })
    }
}

impl TableRecord for Category {
    const TABLE: &'static str = "categories";

    const DDL: &'static str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id            BIGINT PRIMARY KEY,
    name          VARCHAR NOT NULL,
    href          VARCHAR NOT NULL,
    department_id BIGINT NOT NULL,
    scraped_at    TIMESTAMP NOT NULL
);
"#;

    const INDEX_SQL: &'static str =
        "CREATE INDEX IF NOT EXISTS idx_categories_department ON categories (department_id);";

    const SELECT_SQL: &'static str =
        "SELECT id, name, href, department_id, scraped_at FROM categories";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn insert(&self, conn: &Connection) -> duckdb::Result<usize> {
        conn.execute(
            "INSERT INTO categories (id, name, href, department_id, scraped_at) VALUES (?, ?, ?, ?, ?)",
            params![self.id, self.name, self.href, self.department_id, self.scraped_at],
        )
    }

    fn update_row(&self, conn: &Connection) -> duckdb::Result<usize> {
        conn.execute(
            "UPDATE categories SET name = ?, href = ?, department_id = ?, scraped_at = ? WHERE id = ?",
            params![self.name, self.href, self.department_id, self.scraped_at, self.id],
        )
    }

    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            href: row.get(2)?,
            department_id: row.get(3)?,
            scraped_at: row.get(4)?,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn department(name: &str) -> Department {
        Department {
            id: 0,
            name: name.to_string(),
            href: format!("/dept/{}", name.to_lowercase()),
            scraped_at: Utc::now().naive_utc(),
        }
    }

    fn product(name: &str, parent_id: i64) -> Product {
        Product {
            id: 0,
            name: name.to_string(),
            price: "$ 9.99".to_string(),
            rating: "4.5 out of 5".to_string(),
            parent_kind: if parent_id == HOME_PARENT_ID {
                "Home Page".to_string()
            } else {
                "Department : Test".to_string()
            },
            parent_id,
            scraped_at: Utc::now().naive_utc(),
        }
    }

    fn store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.ensure_table::<Department>().unwrap();
        store.ensure_table::<Product>().unwrap();
        store.ensure_table::<Category>().unwrap();
        store
    }

    #[test]
    fn create_assigns_monotonic_ids_from_one() {
        let store = store();
        let departments = store.table::<Department>().unwrap();

        assert_eq!(departments.next_id(), 1);
        let a = departments.create(department("Books")).unwrap();
        let b = departments.create(department("Toys")).unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(departments.next_id(), 3);
    }

    #[test]
    fn counter_reseeds_from_table_size() {
        let store = store();
        {
            let departments = store.table::<Department>().unwrap();
            departments.create(department("Books")).unwrap();
            departments.create(department("Toys")).unwrap();
        }

        // A fresh handle must pick up where the table left off.
        let departments = store.table::<Department>().unwrap();
        assert_eq!(departments.next_id(), 3);
        let c = departments.create(department("Garden")).unwrap();
        assert_eq!(c.id, 3);
    }

    #[test]
    fn batch_insert_returns_records_with_ids_in_order() {
        let store = store();
        let products = store.table::<Product>().unwrap();

        let inserted = products
            .create_from_list(vec![
                product("First", HOME_PARENT_ID),
                product("Second", HOME_PARENT_ID),
                product("Third", HOME_PARENT_ID),
            ])
            .unwrap();

        assert_eq!(
            inserted.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(store.count::<Product>().unwrap(), 3);
    }

    #[test]
    fn read_update_delete_round_trip() {
        let store = store();
        let departments = store.table::<Department>().unwrap();

        let mut dept = departments.create(department("Books")).unwrap();
        assert_eq!(departments.read(dept.id).unwrap().unwrap().name, "Books");

        dept.name = "Books & Media".to_string();
        departments.update(&dept).unwrap();
        assert_eq!(
            departments.read(dept.id).unwrap().unwrap().name,
            "Books & Media"
        );

        departments.delete(dept.id).unwrap();
        assert!(departments.read(dept.id).unwrap().is_none());
    }

    #[test]
    fn read_missing_id_is_none_not_error() {
        let store = store();
        let departments = store.table::<Department>().unwrap();
        assert!(departments.read(99).unwrap().is_none());
    }

    #[test]
    fn query_surface_filters_by_parent() {
        let store = store();
        let products = store.table::<Product>().unwrap();

        products
            .create_from_list(vec![
                product("Home A", HOME_PARENT_ID),
                product("Home B", HOME_PARENT_ID),
                product("Home C", HOME_PARENT_ID),
                product("Home D", HOME_PARENT_ID),
                product("Dept A", 2),
                product("Dept B", 2),
                product("Other Dept", 5),
            ])
            .unwrap();

        let home = store.top_home_products(3).unwrap();
        assert_eq!(home.len(), 3);
        assert!(home.iter().all(|p| p.parent_id == HOME_PARENT_ID));

        let dept = store.top_department_products(2, 3).unwrap();
        assert_eq!(
            dept.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["Dept A", "Dept B"]
        );
    }

    #[test]
    fn create_table_tolerates_existing_table() {
        let store = store();
        // Second ensure is a no-op, not an error.
        store.ensure_table::<Department>().unwrap();
        store.create_table::<Department>().unwrap();
    }

    #[test]
    fn categories_link_to_their_department() {
        let store = store();
        let categories = store.table::<Category>().unwrap();

        let cat = categories
            .create(Category {
                id: 0,
                name: "Sci-Fi".to_string(),
                href: "/cat/scifi".to_string(),
                department_id: 4,
                scraped_at: Utc::now().naive_utc(),
            })
            .unwrap();

        let read_back = categories.read(cat.id).unwrap().unwrap();
        assert_eq!(read_back.department_id, 4);
    }
}
