use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::Config;
use crate::models::{Client, Invoice, InvoiceItem, User};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The record does not exist or is owned by somebody else.
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `database_url` and run
    /// pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    /// Open a private in-memory database. The pool is pinned to a single
    /// connection that is never reclaimed; a reclaimed connection would
    /// drop the in-memory database with it.
    pub async fn open_in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    // User operations
    pub async fn create_user(&self, user: &User) -> Result<i64, DbError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (username, password_hash, first_name, last_name, email,
                               company, address1, address2, country, phone, company_logo)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.company)
        .bind(&user.address1)
        .bind(&user.address2)
        .bind(&user.country)
        .bind(&user.phone)
        .bind(&user.company_logo)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn get_user(&self, id: i64) -> Result<User, DbError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)?;

        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Delete a user. Owned clients and invoices go with it through the
    /// cascading foreign keys.
    pub async fn delete_user(&self, id: i64) -> Result<(), DbError> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // Client operations
    pub async fn create_client(&self, client: &Client) -> Result<i64, DbError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO clients (first_name, last_name, email, company,
                                 address1, address2, country, phone, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email)
        .bind(&client.company)
        .bind(&client.address1)
        .bind(&client.address2)
        .bind(&client.country)
        .bind(&client.phone)
        .bind(client.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn get_clients(&self, owner_id: i64) -> Result<Vec<Client>, DbError> {
        let clients =
            sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE created_by = ? ORDER BY id ASC")
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(clients)
    }

    pub async fn get_client(&self, id: i64, owner_id: i64) -> Result<Client, DbError> {
        let client =
            sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ? AND created_by = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(DbError::NotFound)?;

        Ok(client)
    }

    pub async fn update_client(&self, client: &Client) -> Result<(), DbError> {
        let rows = sqlx::query(
            r#"
            UPDATE clients
            SET first_name = ?, last_name = ?, email = ?, company = ?,
                address1 = ?, address2 = ?, country = ?, phone = ?
            WHERE id = ? AND created_by = ?
            "#,
        )
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email)
        .bind(&client.company)
        .bind(&client.address1)
        .bind(&client.address2)
        .bind(&client.country)
        .bind(&client.phone)
        .bind(client.id)
        .bind(client.created_by)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    /// Delete a client and, through the cascade, every invoice billed to it.
    pub async fn delete_client(&self, id: i64, owner_id: i64) -> Result<(), DbError> {
        let rows = sqlx::query("DELETE FROM clients WHERE id = ? AND created_by = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    pub async fn get_invoices_by_client(
        &self,
        client_id: i64,
        owner_id: i64,
    ) -> Result<Vec<Invoice>, DbError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE client_id = ? AND user_id = ? ORDER BY id ASC",
        )
        .bind(client_id)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    // Invoice operations
    pub async fn get_invoices(&self, owner_id: i64) -> Result<Vec<Invoice>, DbError> {
        let invoices =
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE user_id = ? ORDER BY id ASC")
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(invoices)
    }

    /// Page of the owner's invoices, newest creation date first.
    pub async fn recent_invoices(
        &self,
        owner_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Invoice>, DbError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE user_id = ?
            ORDER BY create_date DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    pub async fn get_invoice(&self, id: i64, owner_id: i64) -> Result<Invoice, DbError> {
        let invoice =
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(DbError::NotFound)?;

        Ok(invoice)
    }

    pub async fn delete_invoice(&self, id: i64, owner_id: i64) -> Result<(), DbError> {
        let rows = sqlx::query("DELETE FROM invoices WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    pub async fn get_invoice_items(&self, invoice_id: i64) -> Result<Vec<InvoiceItem>, DbError> {
        let items = sqlx::query_as::<_, InvoiceItem>(
            "SELECT * FROM invoice_items WHERE invoice_id = ? ORDER BY id ASC",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    pub async fn get_invoice_with_items(
        &self,
        id: i64,
        owner_id: i64,
    ) -> Result<(Invoice, Vec<InvoiceItem>), DbError> {
        let invoice = self.get_invoice(id, owner_id).await?;
        let items = self.get_invoice_items(id).await?;
        Ok((invoice, items))
    }

    // Total synchronization
    //
    // The cached invoice total is refreshed inside the transaction of the
    // write that made it stale. A NULL aggregate (no items) or a zero
    // aggregate (all zero subtotals) leaves the cached value untouched, so
    // emptying an invoice keeps its last written total; `computed_total`
    // reads the live value.

    /// Insert (`id == 0`) or update a line item, then refresh the parent
    /// invoice's cached total in the same transaction.
    pub async fn record_item(&self, item: &InvoiceItem) -> Result<i64, DbError> {
        let mut tx = self.pool.begin().await?;

        let item_id = Self::record_item_in_tx(&mut tx, item).await?;

        tx.commit().await?;

        Ok(item_id)
    }

    async fn record_item_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        item: &InvoiceItem,
    ) -> Result<i64, DbError> {
        let item_id = if item.id == 0 {
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO invoice_items (invoice_id, description, quantity, rate_cents, tax_cents)
                VALUES (?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(item.invoice_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.rate_cents)
            .bind(item.tax_cents)
            .fetch_one(&mut **tx)
            .await?
        } else {
            let rows = sqlx::query(
                r#"
                UPDATE invoice_items
                SET description = ?, quantity = ?, rate_cents = ?, tax_cents = ?
                WHERE id = ?
                "#,
            )
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.rate_cents)
            .bind(item.tax_cents)
            .bind(item.id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

            if rows == 0 {
                return Err(DbError::NotFound);
            }

            item.id
        };

        Self::sync_invoice_total(tx, item.invoice_id).await?;

        Ok(item_id)
    }

    /// Insert (`id == 0`) or update an invoice, then refresh its cached
    /// total if it already has line items. Updates touch `title`,
    /// `client_id` and `invoice_terms` only; `create_date` is stamped at
    /// insert and never rewritten, and the cached total is owned by the
    /// synchronization below, not by the caller's struct.
    pub async fn record_invoice(&self, invoice: &Invoice) -> Result<i64, DbError> {
        let mut tx = self.pool.begin().await?;

        let invoice_id = Self::record_invoice_in_tx(&mut tx, invoice).await?;

        tx.commit().await?;

        Ok(invoice_id)
    }

    async fn record_invoice_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        invoice: &Invoice,
    ) -> Result<i64, DbError> {
        let invoice_id = if invoice.id == 0 {
            let today = chrono::Utc::now().date_naive();

            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO invoices (title, user_id, client_id, invoice_total_cents,
                                      create_date, invoice_terms)
                VALUES (?, ?, ?, 0, ?, ?)
                RETURNING id
                "#,
            )
            .bind(&invoice.title)
            .bind(invoice.user_id)
            .bind(invoice.client_id)
            .bind(today)
            .bind(&invoice.invoice_terms)
            .fetch_one(&mut **tx)
            .await?
        } else {
            let rows = sqlx::query(
                "UPDATE invoices SET title = ?, client_id = ?, invoice_terms = ? WHERE id = ? AND user_id = ?",
            )
            .bind(&invoice.title)
            .bind(invoice.client_id)
            .bind(&invoice.invoice_terms)
            .bind(invoice.id)
            .bind(invoice.user_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

            if rows == 0 {
                return Err(DbError::NotFound);
            }

            invoice.id
        };

        let items: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM invoice_items WHERE invoice_id = ?")
                .bind(invoice_id)
                .fetch_one(&mut **tx)
                .await?;

        if items > 0 {
            Self::sync_invoice_total(tx, invoice_id).await?;
        }

        Ok(invoice_id)
    }

    async fn sync_invoice_total(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        invoice_id: i64,
    ) -> Result<(), DbError> {
        let subtotal: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(quantity * rate_cents) FROM invoice_items WHERE invoice_id = ?",
        )
        .bind(invoice_id)
        .fetch_one(&mut **tx)
        .await?;

        // NULL or zero: keep whatever total is already cached.
        if let Some(total) = subtotal.filter(|t| *t != 0) {
            sqlx::query("UPDATE invoices SET invoice_total_cents = ? WHERE id = ?")
                .bind(total)
                .bind(invoice_id)
                .execute(&mut **tx)
                .await?;

            tracing::debug!(invoice_id, total_cents = total, "invoice total recomputed");
        }

        Ok(())
    }

    /// Live total in cents, ignoring the cache. An unsaved invoice has no
    /// rows to sum, so its struct value stands in.
    pub async fn computed_total(&self, invoice: &Invoice) -> Result<i64, DbError> {
        if !invoice.is_saved() {
            return Ok(invoice.invoice_total_cents);
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity * rate_cents), 0) FROM invoice_items WHERE invoice_id = ?",
        )
        .bind(invoice.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Record the invoice, then replace its item set with `items`, all in
    /// one transaction; a failure at any step rolls the whole save back.
    /// Editing deletes the previous items first; the deletes themselves do
    /// not refresh the total, each re-recorded item does.
    pub async fn save_invoice_with_items(
        &self,
        invoice: &Invoice,
        items: &[InvoiceItem],
    ) -> Result<i64, DbError> {
        let mut tx = self.pool.begin().await?;

        let invoice_id = Self::record_invoice_in_tx(&mut tx, invoice).await?;

        if invoice.is_saved() {
            sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?")
                .bind(invoice_id)
                .execute(&mut *tx)
                .await?;
        }

        for item in items {
            let mut item = item.clone();
            item.id = 0;
            item.invoice_id = invoice_id;
            Self::record_item_in_tx(&mut tx, &item).await?;
        }

        tx.commit().await?;

        Ok(invoice_id)
    }
}

/// Initialize the database connection pool
pub async fn init(config: &Config) -> Result<Database, DbError> {
    Database::connect(config.database_url()).await
}
