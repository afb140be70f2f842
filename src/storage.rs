//! Namespaced key-value storage.
//!
//! A small JSON key-value store on SQLite. Every key is prefixed with the
//! configured namespace (`<namespace>:<key>`), so several tools can share
//! one database file and [`KvStore::clear_namespace`] only touches this
//! namespace's keys.
//!
//! Course-scoped helpers store one value per course under
//! `course:<courseId>`.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::{db, migrate};

#[derive(Clone)]
pub struct KvStore {
    pool: SqlitePool,
    namespace: String,
}

impl KvStore {
    /// Connect to the configured database and ensure the table exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::open_pool(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool, &config.storage.namespace))
    }

    pub fn new(pool: SqlitePool, namespace: &str) -> Self {
        Self {
            pool,
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    pub async fn get_local(&self, key: &str) -> Result<Option<Value>> {
        let row: Option<String> = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(self.key(key))
            .fetch_optional(&self.pool)
            .await?;

        row.map(|raw| {
            serde_json::from_str::<Value>(&raw)
                .with_context(|| format!("Corrupt value stored under '{}'", key))
        })
        .transpose()
    }

    /// Like [`get_local`](Self::get_local), falling back to `default` when
    /// the key is absent.
    pub async fn get_local_or(&self, key: &str, default: Value) -> Result<Value> {
        Ok(self.get_local(key).await?.unwrap_or(default))
    }

    pub async fn set_local(&self, key: &str, value: &Value) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(self.key(key))
        .bind(serde_json::to_string(value)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a key. Returns whether it existed.
    pub async fn remove_local(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(self.key(key))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every key in this namespace. Returns how many were removed.
    pub async fn clear_namespace(&self) -> Result<u64> {
        let prefix = format!("{}:", self.namespace);
        let result = sqlx::query("DELETE FROM kv WHERE substr(key, 1, length(?1)) = ?1")
            .bind(prefix)
            .execute(&self.pool)
            .await?;
        tracing::debug!(
            namespace = %self.namespace,
            removed = result.rows_affected(),
            "cleared namespace"
        );
        Ok(result.rows_affected())
    }

    pub async fn get_course_cache(&self, course_id: &str) -> Result<Option<Value>> {
        self.get_local(&course_key(course_id)).await
    }

    pub async fn set_course_cache(&self, course_id: &str, value: &Value) -> Result<()> {
        self.set_local(&course_key(course_id), value).await
    }

    pub async fn remove_course_cache(&self, course_id: &str) -> Result<bool> {
        self.remove_local(&course_key(course_id)).await
    }
}

fn course_key(course_id: &str) -> String {
    format!("course:{}", course_id)
}
