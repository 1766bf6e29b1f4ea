//! Database instance models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a database instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseStatus {
    Created,
    Provisioning,
    Running,
    Stopped,
    Failed,
    Deleting,
}

impl DatabaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseStatus::Created => "created",
            DatabaseStatus::Provisioning => "provisioning",
            DatabaseStatus::Running => "running",
            DatabaseStatus::Stopped => "stopped",
            DatabaseStatus::Failed => "failed",
            DatabaseStatus::Deleting => "deleting",
        }
    }
}

impl std::fmt::Display for DatabaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_redis_port() -> u16 {
    6379
}

fn default_mongo_port() -> u16 {
    27017
}

fn default_clickhouse_port() -> u16 {
    9000
}

fn default_clickhouse_http_port() -> u16 {
    8123
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_postgres_port")]
    pub port: u16,
    pub database_name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Shared by MySQL and MariaDB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MySqlConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    pub database_name: String,
    pub username: String,
    pub password: String,
    pub root_password: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Shared by Redis, KeyDB and Dragonfly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_mongo_port")]
    pub port: u16,
    pub database_name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_clickhouse_port")]
    pub port: u16,
    #[serde(default = "default_clickhouse_http_port")]
    pub http_port: u16,
    pub database_name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Engine type together with its configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum DatabaseEngine {
    #[serde(rename = "postgresql")]
    PostgreSql(PostgresConfig),
    #[serde(rename = "mysql")]
    MySql(MySqlConfig),
    #[serde(rename = "mariadb")]
    MariaDb(MySqlConfig),
    #[serde(rename = "redis")]
    Redis(KeyValueConfig),
    #[serde(rename = "keydb")]
    KeyDb(KeyValueConfig),
    #[serde(rename = "dragonfly")]
    Dragonfly(KeyValueConfig),
    #[serde(rename = "mongodb")]
    MongoDb(MongoConfig),
    #[serde(rename = "clickhouse")]
    ClickHouse(ClickHouseConfig),
}

/// A managed database container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInstance {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub environment_id: String,
    pub engine: DatabaseEngine,
    pub status: DatabaseStatus,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub connection_string: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
