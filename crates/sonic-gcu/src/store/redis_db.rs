//! Redis-backed CONFIG_DB and STATE_DB access.
//!
//! CONFIG_DB entries live in hashes named `TABLE|key`. List-valued fields
//! are stored under `field@` as comma-joined strings, and an entry without
//! fields holds the placeholder `NULL: NULL` so that the hash exists.

use super::{ConfigStore, StateStore, StoreError, StoreResult};
use crate::scope::Scope;
use crate::value::{ConfigObject, ConfigValue};
use redis::{Commands, Connection};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

const TABLE_SEPARATOR: char = '|';
const LIST_SUFFIX: char = '@';
const NULL_FIELD: &str = "NULL";

/// Redis database selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedisDb {
    /// CONFIG_DB (database 4) - switch configuration
    ConfigDb = 4,
    /// STATE_DB (database 6) - hardware state and capabilities
    StateDb = 6,
}

/// Configuration for a Redis connection.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: RedisDb,
}

impl RedisConfig {
    pub fn new(host: impl Into<String>, port: u16, db: RedisDb) -> Self {
        Self {
            host: host.into(),
            port,
            db,
        }
    }

    /// Creates CONFIG_DB connection config.
    pub fn config_db(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, RedisDb::ConfigDb)
    }

    /// Creates STATE_DB connection config.
    pub fn state_db(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, RedisDb::StateDb)
    }

    fn uri(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db as u8)
    }

    fn connect(&self) -> StoreResult<Connection> {
        let uri = self.uri();
        let client = redis::Client::open(uri.as_str())
            .map_err(|e| StoreError::backend("connect", format!("{}: {}", uri, e)))?;
        let connection = client
            .get_connection()
            .map_err(|e| StoreError::backend("connect", format!("{}: {}", uri, e)))?;
        info!("Connected to Redis: {} (db={})", self.host, self.db as u8);
        Ok(connection)
    }
}

fn command_error(operation: &str) -> impl FnOnce(redis::RedisError) -> StoreError + '_ {
    move |e| StoreError::backend(operation, e.to_string())
}

/// Converts a stored hash into an entry object.
fn decode_entry(fields: HashMap<String, String>) -> ConfigValue {
    let mut entry = ConfigObject::new();
    for (field, value) in fields {
        if field == NULL_FIELD {
            continue;
        }
        match field.strip_suffix(LIST_SUFFIX) {
            Some(name) => {
                let items = value
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(ConfigValue::string)
                    .collect();
                entry.insert(name.to_string(), ConfigValue::Array(items));
            }
            None => {
                entry.insert(field, ConfigValue::string(value));
            }
        }
    }
    ConfigValue::Object(entry)
}

/// Converts an entry object into hash field/value pairs.
fn encode_entry(table: &str, key: &str, value: &ConfigValue) -> StoreResult<Vec<(String, String)>> {
    let entry = value
        .as_object()
        .ok_or_else(|| StoreError::invalid_value(table, key, "entry must be an object"))?;
    if entry.is_empty() {
        return Ok(vec![(NULL_FIELD.to_string(), NULL_FIELD.to_string())]);
    }
    let mut pairs = Vec::with_capacity(entry.len());
    for (field, v) in entry {
        match v {
            ConfigValue::Array(items) => {
                let joined = items
                    .iter()
                    .map(|item| {
                        item.scalar_string().ok_or_else(|| {
                            StoreError::invalid_value(table, key, format!("nested list in '{}'", field))
                        })
                    })
                    .collect::<StoreResult<Vec<_>>>()?
                    .join(",");
                pairs.push((format!("{}{}", field, LIST_SUFFIX), joined));
            }
            ConfigValue::Scalar(s) => pairs.push((field.clone(), s.to_db_string())),
            ConfigValue::Object(_) => {
                return Err(StoreError::invalid_value(
                    table,
                    key,
                    format!("field '{}' cannot hold an object", field),
                ))
            }
        }
    }
    Ok(pairs)
}

fn hash_key(table: &str, key: &str) -> String {
    format!("{}{}{}", table, TABLE_SEPARATOR, key)
}

/// CONFIG_DB in Redis.
pub struct RedisConfigStore {
    connection: RefCell<Connection>,
}

impl RedisConfigStore {
    pub fn connect(config: &RedisConfig) -> StoreResult<Self> {
        Ok(Self {
            connection: RefCell::new(config.connect()?),
        })
    }

    fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.connection
            .borrow_mut()
            .keys(pattern)
            .map_err(command_error("keys"))
    }

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.connection
            .borrow_mut()
            .hgetall(key)
            .map_err(command_error("hgetall"))
    }
}

impl ConfigStore for RedisConfigStore {
    fn get_config(&self) -> StoreResult<ConfigValue> {
        let mut tree: BTreeMap<String, ConfigObject> = BTreeMap::new();
        for redis_key in self.keys("*")? {
            let Some((table, key)) = redis_key.split_once(TABLE_SEPARATOR) else {
                continue;
            };
            let entry = decode_entry(self.hgetall(&redis_key)?);
            tree.entry(table.to_string())
                .or_default()
                .insert(key.to_string(), entry);
        }
        debug!(tables = tree.len(), "Read CONFIG_DB snapshot");
        Ok(ConfigValue::Object(
            tree.into_iter()
                .map(|(table, entries)| (table, ConfigValue::Object(entries)))
                .collect(),
        ))
    }

    fn get_table(&self, table: &str) -> StoreResult<Option<ConfigValue>> {
        let prefix = hash_key(table, "");
        let keys = self.keys(&format!("{}*", prefix))?;
        if keys.is_empty() {
            return Ok(None);
        }
        let mut entries = ConfigObject::new();
        for redis_key in keys {
            let key = redis_key[prefix.len()..].to_string();
            entries.insert(key, decode_entry(self.hgetall(&redis_key)?));
        }
        Ok(Some(ConfigValue::Object(entries)))
    }

    fn get_entry(&self, table: &str, key: &str) -> StoreResult<Option<ConfigValue>> {
        let fields = self.hgetall(&hash_key(table, key))?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(decode_entry(fields)))
    }

    fn set_entry(&mut self, table: &str, key: &str, value: &ConfigValue) -> StoreResult<()> {
        let pairs = encode_entry(table, key, value)?;
        let redis_key = hash_key(table, key);
        redis::pipe()
            .atomic()
            .del(&redis_key)
            .ignore()
            .hset_multiple(&redis_key, pairs.as_slice())
            .ignore()
            .query::<()>(self.connection.get_mut())
            .map_err(command_error("set_entry"))
    }

    fn delete_entry(&mut self, table: &str, key: &str) -> StoreResult<()> {
        let result: redis::RedisResult<()> = self.connection.get_mut().del(hash_key(table, key));
        result.map_err(command_error("del"))
    }

    fn delete_table(&mut self, table: &str) -> StoreResult<()> {
        let keys = self.keys(&format!("{}*", hash_key(table, "")))?;
        if keys.is_empty() {
            return Ok(());
        }
        let result: redis::RedisResult<()> = self.connection.get_mut().del(keys);
        result.map_err(command_error("del"))
    }
}

/// STATE_DB in Redis, one connection per scope.
#[derive(Default)]
pub struct RedisStateStore {
    connections: BTreeMap<Scope, RefCell<Connection>>,
}

impl RedisStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(mut self, scope: Scope, config: &RedisConfig) -> StoreResult<Self> {
        self.connections
            .insert(scope, RefCell::new(config.connect()?));
        Ok(self)
    }
}

impl StateStore for RedisStateStore {
    fn get_field(
        &self,
        scope: Scope,
        table: &str,
        key: &str,
        field: &str,
    ) -> StoreResult<Option<String>> {
        let Some(connection) = self.connections.get(&scope) else {
            return Ok(None);
        };
        connection
            .borrow_mut()
            .hget(hash_key(table, key), field)
            .map_err(command_error("hget"))
    }
}
