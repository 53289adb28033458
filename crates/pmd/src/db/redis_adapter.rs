//! Redis access for CONFIG_DB and STATE_DB.
//!
//! Uses a real redis connection manager in production and an in-memory
//! hash map under `cfg(test)`.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};
#[cfg(not(test))]
use tracing::info;

use super::{ConfigSnapshot, ConfigStore, FieldValues, InterfaceRow, SubsystemRow};
use crate::config::DatabaseConfig;
#[cfg(not(test))]
use crate::error::PmdError;
use crate::error::PmdResult;
use crate::tables::{
    fields, table_key, CFG_INTERFACE_TABLE_NAME, CFG_SUBSYSTEM_TABLE_NAME, DAEMON_KEY,
    KEY_SEPARATOR, STATE_DAEMON_TABLE_NAME, STATE_PM_INFO_TABLE_NAME,
};

/// Connection to one Redis database.
#[derive(Clone)]
pub struct RedisAdapter {
    db_name: String,
    host: String,
    port: u16,
    db_number: u32,

    #[cfg(test)]
    data: std::sync::Arc<tokio::sync::Mutex<HashMap<String, HashMap<String, String>>>>,

    #[cfg(not(test))]
    connection: std::sync::Arc<tokio::sync::Mutex<Option<redis::aio::ConnectionManager>>>,
}

impl std::fmt::Debug for RedisAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisAdapter")
            .field("db_name", &self.db_name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_number", &self.db_number)
            .finish()
    }
}

impl RedisAdapter {
    pub fn new(
        db_name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        db_number: u32,
    ) -> Self {
        Self {
            db_name: db_name.into(),
            host: host.into(),
            port,
            db_number,
            #[cfg(test)]
            data: std::sync::Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            #[cfg(not(test))]
            connection: std::sync::Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    pub fn config_db(config: &DatabaseConfig) -> Self {
        Self::new(
            "CONFIG_DB",
            config.redis_host.as_str(),
            config.redis_port,
            config.config_db_number,
        )
    }

    pub fn state_db(config: &DatabaseConfig) -> Self {
        Self::new(
            "STATE_DB",
            config.redis_host.as_str(),
            config.redis_port,
            config.state_db_number,
        )
    }

    #[cfg(not(test))]
    pub async fn connect(&mut self) -> PmdResult<()> {
        let redis_url = format!("redis://{}:{}/{}", self.host, self.port, self.db_number);
        let client = redis::Client::open(redis_url.as_str())
            .map_err(|e| PmdError::Database(format!("Failed to create Redis client: {}", e)))?;

        let manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| {
                PmdError::Database(format!("Failed to connect to {}: {}", self.db_name, e))
            })?;

        *self.connection.lock().await = Some(manager);

        info!(
            db = %self.db_name,
            host = %self.host,
            port = self.port,
            "Connected to Redis"
        );
        Ok(())
    }

    #[cfg(test)]
    pub async fn connect(&mut self) -> PmdResult<()> {
        Ok(())
    }

    #[cfg(not(test))]
    async fn conn(&self) -> PmdResult<redis::aio::ConnectionManager> {
        self.connection
            .lock()
            .await
            .clone()
            .ok_or_else(|| PmdError::Database(format!("{} is not connected", self.db_name)))
    }

    pub async fn hgetall(&self, _key: &str) -> PmdResult<HashMap<String, String>> {
        #[cfg(test)]
        {
            let key = _key;
            let data = self.data.lock().await;
            Ok(data.get(key).cloned().unwrap_or_default())
        }

        #[cfg(not(test))]
        {
            let key = _key;
            let mut conn = self.conn().await?;
            redis::AsyncCommands::hgetall(&mut conn, key)
                .await
                .map_err(|e| PmdError::Database(format!("HGETALL {} failed: {}", key, e)))
        }
    }

    pub async fn hset(&mut self, _key: &str, _fields: &[(String, String)]) -> PmdResult<()> {
        #[cfg(test)]
        {
            let key = _key;
            let fields = _fields;
            let mut data = self.data.lock().await;
            let entry = data.entry(key.to_string()).or_default();
            for (field, value) in fields {
                entry.insert(field.clone(), value.clone());
            }
            Ok(())
        }

        #[cfg(not(test))]
        {
            let key = _key;
            let fields = _fields;
            if fields.is_empty() {
                return Ok(());
            }
            let mut conn = self.conn().await?;
            let _: () = redis::AsyncCommands::hset_multiple(&mut conn, key, fields)
                .await
                .map_err(|e| PmdError::Database(format!("HSET {} failed: {}", key, e)))?;
            Ok(())
        }
    }

    /// Replaces the whole hash at `key` with `fields` in one transaction.
    /// An empty `fields` leaves the key deleted.
    pub async fn replace_hash(&mut self, _key: &str, _fields: &[(String, String)]) -> PmdResult<()> {
        #[cfg(test)]
        {
            let key = _key;
            let fields = _fields;
            let mut data = self.data.lock().await;
            data.remove(key);
            if !fields.is_empty() {
                data.insert(key.to_string(), fields.iter().cloned().collect());
            }
            Ok(())
        }

        #[cfg(not(test))]
        {
            let key = _key;
            let fields = _fields;
            let mut conn = self.conn().await?;
            let mut pipe = redis::pipe();
            pipe.atomic(); // DEL and HSET land together
            pipe.del(key).ignore();
            if !fields.is_empty() {
                pipe.hset_multiple(key, fields).ignore();
            }
            let _: () = pipe
                .query_async(&mut conn)
                .await
                .map_err(|e| PmdError::Database(format!("replace {} failed: {}", key, e)))?;
            Ok(())
        }
    }

    /// Keys matching `pattern`. Only a trailing `*` wildcard is honoured in
    /// test mode.
    pub async fn keys(&self, _pattern: &str) -> PmdResult<Vec<String>> {
        #[cfg(test)]
        {
            let pattern = _pattern;
            let data = self.data.lock().await;
            let mut keys: Vec<String> = data
                .keys()
                .filter(|k| match pattern.strip_suffix('*') {
                    Some(prefix) => k.starts_with(prefix),
                    None => k.as_str() == pattern,
                })
                .cloned()
                .collect();
            keys.sort();
            Ok(keys)
        }

        #[cfg(not(test))]
        {
            let pattern = _pattern;
            let mut conn = self.conn().await?;
            redis::AsyncCommands::keys(&mut conn, pattern)
                .await
                .map_err(|e| PmdError::Database(format!("KEYS {} failed: {}", pattern, e)))
        }
    }

    pub fn database_name(&self) -> &str {
        &self.db_name
    }

    pub fn db_number(&self) -> u32 {
        self.db_number
    }
}

/// [`ConfigStore`] backed by CONFIG_DB and STATE_DB.
#[derive(Debug, Clone)]
pub struct RedisConfigStore {
    config_db: RedisAdapter,
    state_db: RedisAdapter,
}

impl RedisConfigStore {
    pub fn new(config_db: RedisAdapter, state_db: RedisAdapter) -> Self {
        Self {
            config_db,
            state_db,
        }
    }

    /// Connects both databases.
    pub async fn connect(config: &DatabaseConfig) -> PmdResult<Self> {
        let mut config_db = RedisAdapter::config_db(config);
        let mut state_db = RedisAdapter::state_db(config);
        config_db.connect().await?;
        state_db.connect().await?;
        Ok(Self::new(config_db, state_db))
    }

    /// Reads every `TABLE|name` hash of `table` as (name, key, fields).
    async fn read_table(&self, table: &str) -> PmdResult<Vec<(String, String, FieldValues)>> {
        let prefix = format!("{}{}", table, KEY_SEPARATOR);
        let mut rows = Vec::new();
        for key in self.config_db.keys(&format!("{}*", prefix)).await? {
            let Some(name) = key.strip_prefix(&prefix) else {
                continue;
            };
            let mut fvs: FieldValues = self.config_db.hgetall(&key).await?.into_iter().collect();
            fvs.sort();
            rows.push((name.to_string(), key.clone(), fvs));
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows)
    }
}

#[async_trait]
impl ConfigStore for RedisConfigStore {
    async fn load_snapshot(&mut self) -> PmdResult<ConfigSnapshot> {
        let subsystems = self
            .read_table(CFG_SUBSYSTEM_TABLE_NAME)
            .await?
            .into_iter()
            .map(|(name, key, _)| SubsystemRow { name, key })
            .collect();

        let mut interfaces = Vec::new();
        for (name, key, fvs) in self.read_table(CFG_INTERFACE_TABLE_NAME).await? {
            match InterfaceRow::from_field_values(&name, &key, &fvs) {
                Some(row) => interfaces.push(row),
                None => warn!(interface = %name, "Interface row has no subsystem, skipping"),
            }
        }

        Ok(ConfigSnapshot {
            subsystems,
            interfaces,
        })
    }

    async fn publish_pm_info(&mut self, instance: &str, pm_info: &FieldValues) -> PmdResult<()> {
        let key = table_key(STATE_PM_INFO_TABLE_NAME, instance);
        self.state_db.replace_hash(&key, pm_info).await?;
        debug!(key = %key, fields = pm_info.len(), "Published pm_info");
        Ok(())
    }

    async fn set_daemon_ready(&mut self) -> PmdResult<()> {
        let key = table_key(STATE_DAEMON_TABLE_NAME, DAEMON_KEY);
        self.state_db
            .hset(&key, &[(fields::CUR_HW.to_string(), "1".to_string())])
            .await
    }
}
