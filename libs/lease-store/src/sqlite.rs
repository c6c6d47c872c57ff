use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow},
    ConnectOptions, Row,
};

use crate::{Lease, LeaseKey, LeaseStatus, LeaseStore};

/// Sqlite-backed [`LeaseStore`]. Timestamps are stored as epoch seconds,
/// statuses as their text form.
#[derive(Debug)]
pub struct SqliteStore {
    inner: SqlitePool,
}

impl Clone for SqliteStore {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl SqliteStore {
    pub async fn new(uri: impl AsRef<str>) -> Result<Self, sqlx::Error> {
        let opts = SqliteConnectOptions::from_str(uri.as_ref())?
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .create_if_missing(true)
            // make sqlite log queries at trace level so we don't get a bloated log on `info`
            .log_statements(tracing::log::LevelFilter::Trace);

        let inner = SqlitePool::connect_with(opts).await?;
        sqlx::migrate!("./migrations").run(&inner).await?;
        Ok(Self { inner })
    }
}

fn epoch_secs(time: DateTime<Utc>) -> i64 {
    time.timestamp()
}

fn to_datetime(secs: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| sqlx::Error::Decode("expires_at out of range".into()))
}

fn row_to_lease(row: &SqliteRow) -> Result<Lease, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<LeaseStatus>()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
    let expires_at: i64 = row.try_get("expires_at")?;

    Ok(Lease {
        slice_name: row.try_get("slice_name")?,
        res_type: row.try_get("res_type")?,
        res_name: row.try_get("res_name")?,
        owner: row.try_get("owner")?,
        status,
        expires_at: to_datetime(expires_at)?,
    })
}

#[async_trait]
impl LeaseStore for SqliteStore {
    type Error = sqlx::Error;

    async fn insert(&self, lease: &Lease) -> Result<(), Self::Error> {
        sqlx::query(
            r#"INSERT INTO leases
                (slice_name, res_type, res_name, owner, status, expires_at)
            VALUES
                (?1, ?2, ?3, ?4, ?5, ?6)"#,
        )
        .bind(&lease.slice_name)
        .bind(&lease.res_type)
        .bind(&lease.res_name)
        .bind(&lease.owner)
        .bind(lease.status.as_str())
        .bind(epoch_secs(lease.expires_at))
        .execute(&self.inner)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &LeaseKey) -> Result<Option<Lease>, Self::Error> {
        sqlx::query(
            "SELECT * FROM leases WHERE slice_name = ?1 AND res_type = ?2 AND res_name = ?3",
        )
        .bind(&key.slice_name)
        .bind(&key.res_type)
        .bind(&key.res_name)
        .fetch_optional(&self.inner)
        .await?
        .map(|row| row_to_lease(&row))
        .transpose()
    }

    async fn list_slice(&self, slice_name: &str) -> Result<Vec<Lease>, Self::Error> {
        sqlx::query("SELECT * FROM leases WHERE slice_name = ?1 ORDER BY res_type, res_name")
            .bind(slice_name)
            .fetch_all(&self.inner)
            .await?
            .iter()
            .map(row_to_lease)
            .collect()
    }

    async fn slice_names(&self) -> Result<Vec<String>, Self::Error> {
        sqlx::query("SELECT DISTINCT slice_name FROM leases ORDER BY slice_name")
            .fetch_all(&self.inner)
            .await?
            .iter()
            .map(|row| row.try_get::<String, _>("slice_name"))
            .collect()
    }

    async fn update(&self, lease: &Lease) -> Result<Option<Lease>, Self::Error> {
        sqlx::query(
            r#"
            UPDATE leases
            SET
                owner = ?4, status = ?5, expires_at = ?6
            WHERE
                slice_name = ?1 AND res_type = ?2 AND res_name = ?3
            RETURNING *
            "#,
        )
        .bind(&lease.slice_name)
        .bind(&lease.res_type)
        .bind(&lease.res_name)
        .bind(&lease.owner)
        .bind(lease.status.as_str())
        .bind(epoch_secs(lease.expires_at))
        .fetch_optional(&self.inner)
        .await?
        .map(|row| row_to_lease(&row))
        .transpose()
    }

    async fn delete(&self, key: &LeaseKey) -> Result<Option<Lease>, Self::Error> {
        let mut trans = self.inner.begin().await?;
        let cur = sqlx::query(
            "SELECT * FROM leases WHERE slice_name = ?1 AND res_type = ?2 AND res_name = ?3",
        )
        .bind(&key.slice_name)
        .bind(&key.res_type)
        .bind(&key.res_name)
        .fetch_optional(&mut *trans)
        .await?
        .map(|row| row_to_lease(&row))
        .transpose()?;

        sqlx::query("DELETE FROM leases WHERE slice_name = ?1 AND res_type = ?2 AND res_name = ?3")
            .bind(&key.slice_name)
            .bind(&key.res_type)
            .bind(&key.res_name)
            .execute(&mut *trans)
            .await?;

        trans.commit().await?;
        Ok(cur)
    }

    async fn expired(&self, now: DateTime<Utc>) -> Result<Vec<Lease>, Self::Error> {
        sqlx::query("SELECT * FROM leases WHERE expires_at < ?1")
            .bind(epoch_secs(now))
            .fetch_all(&self.inner)
            .await?
            .iter()
            .map(row_to_lease)
            .collect()
    }
}
