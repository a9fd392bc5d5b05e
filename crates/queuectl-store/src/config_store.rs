//! SQLite-backed Config Service.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use queuectl_core::config::{self, ConfigValue};
use queuectl_core::error::Result;
use queuectl_core::store::ConfigStore;

pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn get_all(&self) -> Result<BTreeMap<String, ConfigValue>> {
        let mut merged: BTreeMap<String, ConfigValue> = config::defaults()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        let rows = sqlx::query("SELECT key, value, value_type FROM config")
            .fetch_all(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;

        for row in rows {
            let key: String = row.try_get("key").map_err(anyhow::Error::from)?;
            let value: String = row.try_get("value").map_err(anyhow::Error::from)?;
            let value_type: String = row.try_get("value_type").map_err(anyhow::Error::from)?;

            let parsed = match value_type.as_str() {
                "int" => ConfigValue::Int(value.parse().unwrap_or_default()),
                "float" => ConfigValue::Float(value.parse().unwrap_or_default()),
                _ => ConfigValue::Str(value),
            };
            merged.insert(key, parsed);
        }

        Ok(merged)
    }

    async fn set(&self, key: &str, value: ConfigValue) -> Result<()> {
        let (raw, value_type) = match &value {
            ConfigValue::Int(v) => (v.to_string(), "int"),
            ConfigValue::Float(v) => (v.to_string(), "float"),
            ConfigValue::Str(v) => (v.clone(), "str"),
        };

        sqlx::query(
            r#"
            INSERT INTO config (key, value, value_type) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, value_type = excluded.value_type
            "#,
        )
        .bind(key)
        .bind(raw)
        .bind(value_type)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        Ok(())
    }
}
