//! SQLite store with embedded migrations and the follower cursor.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::info;

use super::RegistryStore;
use crate::errors::{RegistryError, Result};
use crate::events::{CustodyEvent, EventRecord};
use crate::model::{Batch, BatchStatus, Role, Snapshot, User, Weather};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url` and run pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let url = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite:{database_url}")
        };
        let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

        // Every connection to `:memory:` is its own database, so pin to one.
        let in_memory = url.contains(":memory:");
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied successfully");
        Ok(Self { pool })
    }

    async fn insert_batch_tx(tx: &mut Transaction<'_, Sqlite>, batch: &Batch) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO batches
                (batch_id, owner_registration_id, crop_name, quantity, variant, condition,
                 contamination_level, latitude, longitude, location_label,
                 rainfall, humidity, temperature, wind_speed, pressure,
                 signature_hash, transaction_hash, block_number, status, supply_chain_stage,
                 current_holder, previous_actor, next_actor, transport_method, quality_notes,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                    ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)
            "#,
        )
        .bind(&batch.batch_id)
        .bind(&batch.owner_registration_id)
        .bind(&batch.crop_name)
        .bind(quantity_to_sql(batch.quantity)?)
        .bind(&batch.variant)
        .bind(&batch.condition)
        .bind(&batch.contamination_level)
        .bind(batch.latitude)
        .bind(batch.longitude)
        .bind(&batch.location_label)
        .bind(batch.weather.rainfall)
        .bind(batch.weather.humidity)
        .bind(batch.weather.temperature)
        .bind(batch.weather.wind_speed)
        .bind(batch.weather.pressure)
        .bind(&batch.signature_hash)
        .bind(&batch.transaction_hash)
        .bind(batch.block_number)
        .bind(batch.status.as_str())
        .bind(&batch.supply_chain_stage)
        .bind(&batch.current_holder)
        .bind(&batch.previous_actor)
        .bind(&batch.next_actor)
        .bind(&batch.transport_method)
        .bind(serde_json::to_string(&batch.quality_notes)?)
        .bind(batch.created_at)
        .bind(batch.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_user_tx(tx: &mut Transaction<'_, Sqlite>, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (wallet_address, name, email, registration_id, role, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.wallet_address)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.registration_id)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn set_counter_tx(tx: &mut Transaction<'_, Sqlite>, role: Role, counter: u32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_counters (role, counter) VALUES (?1, ?2)
            ON CONFLICT (role) DO UPDATE SET counter = excluded.counter
            "#,
        )
        .bind(role.as_str())
        .bind(i64::from(counter))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_event_tx(tx: &mut Transaction<'_, Sqlite>, event: &EventRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO events
                (id, event_type, batch_id, actor, counterparty, detail, source, ledger, tx_hash, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(event.id)
        .bind(&event.event_type)
        .bind(&event.batch_id)
        .bind(&event.actor)
        .bind(&event.counterparty)
        .bind(&event.detail)
        .bind(&event.source)
        .bind(event.ledger)
        .bind(&event.tx_hash)
        .bind(event.timestamp)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Log `event`, skipping it if it duplicates a stored ledger event.
    /// Returns the number of rows written.
    async fn append_event_tx(tx: &mut Transaction<'_, Sqlite>, ev: &CustodyEvent) -> Result<u64> {
        let rows_affected = sqlx::query(
            r#"
            INSERT OR IGNORE INTO events
                (event_type, batch_id, actor, counterparty, detail, source, ledger, tx_hash, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&ev.event_type)
        .bind(&ev.batch_id)
        .bind(&ev.actor)
        .bind(&ev.counterparty)
        .bind(&ev.detail)
        .bind(&ev.source)
        .bind(ev.ledger)
        .bind(&ev.tx_hash)
        .bind(ev.timestamp)
        .execute(&mut **tx)
        .await?
        .rows_affected();
        Ok(rows_affected)
    }

    async fn delete_all_tx(tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
        for table in ["users", "role_counters", "batches", "events"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────

const USER_COLUMNS: &str = "wallet_address, name, email, registration_id, role, created_at";

const BATCH_COLUMNS: &str = r#"
    batch_id, owner_registration_id, crop_name, quantity, variant, condition,
    contamination_level, latitude, longitude, location_label,
    rainfall, humidity, temperature, wind_speed, pressure,
    signature_hash, transaction_hash, block_number, status, supply_chain_stage,
    current_holder, previous_actor, next_actor, transport_method, quality_notes,
    created_at, updated_at
"#;

const EVENT_COLUMNS: &str =
    "id, event_type, batch_id, actor, counterparty, detail, source, ledger, tx_hash, timestamp";

#[derive(FromRow)]
struct UserRow {
    wallet_address: String,
    name: String,
    email: String,
    registration_id: String,
    role: String,
    created_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = RegistryError;

    fn try_from(row: UserRow) -> Result<Self> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|_| RegistryError::InvalidInput(format!("stored role {:?}", row.role)))?;
        Ok(User {
            wallet_address: row.wallet_address,
            name: row.name,
            email: row.email,
            registration_id: row.registration_id,
            role,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct BatchRow {
    batch_id: String,
    owner_registration_id: String,
    crop_name: String,
    quantity: i64,
    variant: String,
    condition: String,
    contamination_level: String,
    latitude: i64,
    longitude: i64,
    location_label: String,
    rainfall: i64,
    humidity: i64,
    temperature: i64,
    wind_speed: i64,
    pressure: i64,
    signature_hash: String,
    transaction_hash: Option<String>,
    block_number: Option<i64>,
    status: String,
    supply_chain_stage: String,
    current_holder: String,
    previous_actor: Option<String>,
    next_actor: Option<String>,
    transport_method: Option<String>,
    quality_notes: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<BatchRow> for Batch {
    type Error = RegistryError;

    fn try_from(row: BatchRow) -> Result<Self> {
        let status = row
            .status
            .parse::<BatchStatus>()
            .map_err(|_| RegistryError::InvalidInput(format!("stored status {:?}", row.status)))?;
        let quantity = u64::try_from(row.quantity)
            .map_err(|_| RegistryError::InvalidInput(format!("stored quantity {}", row.quantity)))?;
        Ok(Batch {
            batch_id: row.batch_id,
            owner_registration_id: row.owner_registration_id,
            crop_name: row.crop_name,
            quantity,
            variant: row.variant,
            condition: row.condition,
            contamination_level: row.contamination_level,
            latitude: row.latitude,
            longitude: row.longitude,
            location_label: row.location_label,
            weather: Weather {
                rainfall: row.rainfall,
                humidity: row.humidity,
                temperature: row.temperature,
                wind_speed: row.wind_speed,
                pressure: row.pressure,
            },
            signature_hash: row.signature_hash,
            transaction_hash: row.transaction_hash,
            block_number: row.block_number,
            status,
            supply_chain_stage: row.supply_chain_stage,
            current_holder: row.current_holder,
            previous_actor: row.previous_actor,
            next_actor: row.next_actor,
            transport_method: row.transport_method,
            quality_notes: serde_json::from_str(&row.quality_notes)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn quantity_to_sql(quantity: u64) -> Result<i64> {
    i64::try_from(quantity)
        .map_err(|_| RegistryError::InvalidInput(format!("quantity {quantity} is too large")))
}

fn rows_into<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = RegistryError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ─────────────────────────────────────────────────────────
// Store implementation
// ─────────────────────────────────────────────────────────

#[async_trait]
impl RegistryStore for SqliteStore {
    async fn get_user(&self, address: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE wallet_address = ?1"
        ))
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_registration_id(&self, registration_id: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE registration_id = ?1"
        ))
        .bind(registration_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn role_counter(&self, role: Role) -> Result<u32> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT counter FROM role_counters WHERE role = ?1")
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v as u32).unwrap_or(0))
    }

    async fn insert_user(&self, user: &User, counter: u32, event: &CustodyEvent) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_user_tx(&mut tx, user).await?;
        Self::set_counter_tx(&mut tx, user.role, counter).await?;
        Self::append_event_tx(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, registration_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows_into(rows)
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>> {
        let row: Option<BatchRow> = sqlx::query_as(&format!(
            "SELECT {BATCH_COLUMNS} FROM batches WHERE batch_id = ?1"
        ))
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Batch::try_from).transpose()
    }

    async fn insert_batch(&self, batch: &Batch, event: &CustodyEvent) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_batch_tx(&mut tx, batch).await?;
        Self::append_event_tx(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_batch(&self, batch: &Batch, event: &CustodyEvent) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE batches SET
                signature_hash = ?2, transaction_hash = ?3, block_number = ?4, status = ?5,
                supply_chain_stage = ?6, current_holder = ?7, previous_actor = ?8,
                next_actor = ?9, transport_method = ?10, quality_notes = ?11, updated_at = ?12
            WHERE batch_id = ?1
            "#,
        )
        .bind(&batch.batch_id)
        .bind(&batch.signature_hash)
        .bind(&batch.transaction_hash)
        .bind(batch.block_number)
        .bind(batch.status.as_str())
        .bind(&batch.supply_chain_stage)
        .bind(&batch.current_holder)
        .bind(&batch.previous_actor)
        .bind(&batch.next_actor)
        .bind(&batch.transport_method)
        .bind(serde_json::to_string(&batch.quality_notes)?)
        .bind(batch.updated_at)
        .execute(&mut *tx)
        .await?;
        Self::append_event_tx(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_batches(&self) -> Result<Vec<Batch>> {
        let rows: Vec<BatchRow> = sqlx::query_as(&format!(
            "SELECT {BATCH_COLUMNS} FROM batches ORDER BY seq ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows_into(rows)
    }

    async fn list_batches_by_status(&self, status: BatchStatus) -> Result<Vec<Batch>> {
        let rows: Vec<BatchRow> = sqlx::query_as(&format!(
            "SELECT {BATCH_COLUMNS} FROM batches WHERE status = ?1 ORDER BY seq ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows_into(rows)
    }

    async fn append_events(&self, events: &[CustodyEvent]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0usize;
        for ev in events {
            count += Self::append_event_tx(&mut tx, ev).await? as usize;
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn events_for_batch(&self, batch_id: &str) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query_as::<_, EventRecord>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE batch_id = ?1 ORDER BY timestamp ASC, id ASC"
        ))
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn all_events(&self) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query_as::<_, EventRecord>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn last_ledger(&self) -> Result<i64> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT last_ledger FROM follower_cursor WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v).unwrap_or(0))
    }

    async fn cursor(&self) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT last_cursor FROM follower_cursor WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(v,)| v))
    }

    async fn save_cursor(&self, last_ledger: i64, cursor: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE follower_cursor SET last_ledger = ?1, last_cursor = ?2 WHERE id = 1")
            .bind(last_ledger)
            .bind(cursor)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let counters: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, counter FROM role_counters")
                .fetch_all(&self.pool)
                .await?;
        let counters = counters
            .into_iter()
            .filter_map(|(role, counter)| Some((role.parse::<Role>().ok()?, counter as u32)))
            .collect();

        Ok(Snapshot {
            users: self.list_users().await?,
            batches: self.list_batches().await?,
            counters,
            events: self.all_events().await?,
        })
    }

    async fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::delete_all_tx(&mut tx).await?;
        for user in &snapshot.users {
            Self::insert_user_tx(&mut tx, user).await?;
        }
        for (role, counter) in &snapshot.counters {
            Self::set_counter_tx(&mut tx, *role, *counter).await?;
        }
        for batch in &snapshot.batches {
            Self::insert_batch_tx(&mut tx, batch).await?;
        }
        for event in &snapshot.events {
            Self::insert_event_tx(&mut tx, event).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::delete_all_tx(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
