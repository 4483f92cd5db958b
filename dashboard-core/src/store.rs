use anyhow::{Context, Result, anyhow};
use log::info;
use rusqlite::{Connection, OptionalExtension, params};
use std::{
    collections::HashMap,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use crate::model::AppConfig;

/// Persistent home of the user configuration.
pub trait ConfigStore: Send + Sync {
    /// Saved configuration, or `None` on first run.
    fn get(&self) -> Result<Option<AppConfig>>;

    fn set(&self, config: &AppConfig) -> Result<()>;
}

const KEY_API_KEY: &str = "api_key";
const KEY_ZIP_CODE: &str = "zip_code";
const KEY_LAT: &str = "lat";
const KEY_LON: &str = "lon";
const KEY_CITY: &str = "city_name";
const KEY_STATE: &str = "state_abbr";

/// SQLite-backed key/value settings table.
pub struct SqliteConfigStore {
    conn: Mutex<Connection>,
}

impl SqliteConfigStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
        let store = Self::from_connection(conn)?;

        info!("Config store opened at {}", path.display());
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                key   TEXT PRIMARY KEY,
                value TEXT
            );",
        )
        .context("failed to create settings table")?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("config store lock poisoned"))
    }

    /// Read a single raw value.
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()
            .with_context(|| format!("failed to read setting '{key}'"))?;

        Ok(value.flatten())
    }

    fn all_values(&self) -> Result<HashMap<String, String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value FROM settings WHERE value IS NOT NULL")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }
}

impl ConfigStore for SqliteConfigStore {
    fn get(&self) -> Result<Option<AppConfig>> {
        let values = self.all_values()?;

        let (Some(api_key), Some(lat), Some(lon)) =
            (values.get(KEY_API_KEY), values.get(KEY_LAT), values.get(KEY_LON))
        else {
            return Ok(None);
        };
        if api_key.is_empty() {
            return Ok(None);
        }

        let latitude = lat
            .parse::<f64>()
            .with_context(|| format!("stored latitude '{lat}' is not a number"))?;
        let longitude = lon
            .parse::<f64>()
            .with_context(|| format!("stored longitude '{lon}' is not a number"))?;

        Ok(Some(AppConfig {
            api_key: api_key.clone(),
            zip_code: values.get(KEY_ZIP_CODE).cloned().unwrap_or_default(),
            latitude,
            longitude,
            city_name: values.get(KEY_CITY).cloned().unwrap_or_default(),
            state_abbr: values.get(KEY_STATE).cloned().filter(|s| !s.is_empty()),
        }))
    }

    fn set(&self, config: &AppConfig) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("failed to begin settings transaction")?;

        let latitude = config.latitude.to_string();
        let longitude = config.longitude.to_string();
        let state = config.state_abbr.clone().unwrap_or_default();
        let rows = [
            (KEY_API_KEY, config.api_key.as_str()),
            (KEY_ZIP_CODE, config.zip_code.as_str()),
            (KEY_LAT, latitude.as_str()),
            (KEY_LON, longitude.as_str()),
            (KEY_CITY, config.city_name.as_str()),
            (KEY_STATE, state.as_str()),
        ];

        for (key, value) in rows {
            tx.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .with_context(|| format!("failed to write setting '{key}'"))?;
        }

        tx.commit().context("failed to commit settings")?;
        info!("Configuration saved for ZIP {}", config.zip_code);
        Ok(())
    }
}
