//! Per-engine container configuration for database instances

use std::collections::BTreeMap;

use crate::containers::manager::WorkloadDescriptor;
use crate::models::database::{DatabaseEngine, DatabaseInstance};
use crate::utils::slugify;

impl DatabaseEngine {
    pub fn kind(&self) -> &'static str {
        match self {
            DatabaseEngine::PostgreSql(_) => "postgresql",
            DatabaseEngine::MySql(_) => "mysql",
            DatabaseEngine::MariaDb(_) => "mariadb",
            DatabaseEngine::Redis(_) => "redis",
            DatabaseEngine::KeyDb(_) => "keydb",
            DatabaseEngine::Dragonfly(_) => "dragonfly",
            DatabaseEngine::MongoDb(_) => "mongodb",
            DatabaseEngine::ClickHouse(_) => "clickhouse",
        }
    }

    /// Image tag used when the config does not pin a version
    pub fn default_version(&self) -> &'static str {
        match self {
            DatabaseEngine::PostgreSql(_) => "16-alpine",
            DatabaseEngine::MySql(_) => "8.4",
            DatabaseEngine::MariaDb(_) => "11.6",
            DatabaseEngine::Redis(_) => "7.4-alpine",
            DatabaseEngine::KeyDb(_) => "v6.3.4",
            DatabaseEngine::Dragonfly(_) => "v1.23.1",
            DatabaseEngine::MongoDb(_) => "8.0",
            DatabaseEngine::ClickHouse(_) => "24.12.1.1823",
        }
    }

    fn repository(&self) -> &'static str {
        match self {
            DatabaseEngine::PostgreSql(_) => "postgres",
            DatabaseEngine::MySql(_) => "mysql",
            DatabaseEngine::MariaDb(_) => "mariadb",
            DatabaseEngine::Redis(_) => "redis",
            DatabaseEngine::KeyDb(_) => "eqalpha/keydb",
            DatabaseEngine::Dragonfly(_) => "dragonflydb/dragonfly",
            DatabaseEngine::MongoDb(_) => "mongo",
            DatabaseEngine::ClickHouse(_) => "clickhouse/clickhouse-server",
        }
    }

    fn version(&self) -> Option<&str> {
        match self {
            DatabaseEngine::PostgreSql(c) => c.version.as_deref(),
            DatabaseEngine::MySql(c) | DatabaseEngine::MariaDb(c) => c.version.as_deref(),
            DatabaseEngine::Redis(c) | DatabaseEngine::KeyDb(c) | DatabaseEngine::Dragonfly(c) => {
                c.version.as_deref()
            }
            DatabaseEngine::MongoDb(c) => c.version.as_deref(),
            DatabaseEngine::ClickHouse(c) => c.version.as_deref(),
        }
    }

    pub fn image(&self) -> String {
        let version = self
            .version()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.default_version());
        format!("{}:{}", self.repository(), version)
    }

    pub fn port(&self) -> u16 {
        match self {
            DatabaseEngine::PostgreSql(c) => c.port,
            DatabaseEngine::MySql(c) | DatabaseEngine::MariaDb(c) => c.port,
            DatabaseEngine::Redis(c) | DatabaseEngine::KeyDb(c) | DatabaseEngine::Dragonfly(c) => {
                c.port
            }
            DatabaseEngine::MongoDb(c) => c.port,
            DatabaseEngine::ClickHouse(c) => c.port,
        }
    }

    fn data_path(&self) -> &'static str {
        match self {
            DatabaseEngine::PostgreSql(_) => "/var/lib/postgresql/data",
            DatabaseEngine::MySql(_) | DatabaseEngine::MariaDb(_) => "/var/lib/mysql",
            DatabaseEngine::Redis(_) | DatabaseEngine::KeyDb(_) | DatabaseEngine::Dragonfly(_) => {
                "/data"
            }
            DatabaseEngine::MongoDb(_) => "/data/db",
            DatabaseEngine::ClickHouse(_) => "/var/lib/clickhouse",
        }
    }

    fn environment(&self) -> BTreeMap<String, String> {
        fn vars(pairs: &[(&str, &str)], extra: &BTreeMap<String, String>) -> BTreeMap<String, String> {
            let mut env: BTreeMap<String, String> = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            env.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
            env
        }

        match self {
            DatabaseEngine::PostgreSql(c) => vars(
                &[
                    ("POSTGRES_DB", c.database_name.as_str()),
                    ("POSTGRES_USER", c.username.as_str()),
                    ("POSTGRES_PASSWORD", c.password.as_str()),
                    ("PGDATA", "/var/lib/postgresql/data/pgdata"),
                ],
                &c.environment,
            ),
            DatabaseEngine::MySql(c) => vars(
                &[
                    ("MYSQL_DATABASE", c.database_name.as_str()),
                    ("MYSQL_USER", c.username.as_str()),
                    ("MYSQL_PASSWORD", c.password.as_str()),
                    ("MYSQL_ROOT_PASSWORD", c.root_password.as_str()),
                ],
                &c.environment,
            ),
            DatabaseEngine::MariaDb(c) => vars(
                &[
                    ("MARIADB_DATABASE", c.database_name.as_str()),
                    ("MARIADB_USER", c.username.as_str()),
                    ("MARIADB_PASSWORD", c.password.as_str()),
                    ("MARIADB_ROOT_PASSWORD", c.root_password.as_str()),
                ],
                &c.environment,
            ),
            DatabaseEngine::Redis(c) | DatabaseEngine::KeyDb(c) | DatabaseEngine::Dragonfly(c) => {
                vars(&[], &c.environment)
            }
            DatabaseEngine::MongoDb(c) => vars(
                &[
                    ("MONGO_INITDB_DATABASE", c.database_name.as_str()),
                    ("MONGO_INITDB_ROOT_USERNAME", c.username.as_str()),
                    ("MONGO_INITDB_ROOT_PASSWORD", c.password.as_str()),
                ],
                &c.environment,
            ),
            DatabaseEngine::ClickHouse(c) => vars(
                &[
                    ("CLICKHOUSE_DB", c.database_name.as_str()),
                    ("CLICKHOUSE_USER", c.username.as_str()),
                    ("CLICKHOUSE_PASSWORD", c.password.as_str()),
                ],
                &c.environment,
            ),
        }
    }

    fn command(&self) -> Vec<String> {
        let (mut command, password) = match self {
            DatabaseEngine::Redis(c) => (vec!["redis-server"], c.password.as_deref()),
            DatabaseEngine::KeyDb(c) => (vec!["keydb-server"], c.password.as_deref()),
            DatabaseEngine::Dragonfly(c) => {
                (vec!["dragonfly", "--logtostderr"], c.password.as_deref())
            }
            _ => return Vec::new(),
        };
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            command.push("--requirepass");
            command.push(password);
        }
        command.into_iter().map(String::from).collect()
    }

    /// Client connection string reaching the published port on the host
    pub fn connection_string(&self) -> String {
        match self {
            DatabaseEngine::PostgreSql(c) => format!(
                "postgresql://{}:{}@localhost:{}/{}",
                c.username, c.password, c.port, c.database_name
            ),
            DatabaseEngine::MySql(c) | DatabaseEngine::MariaDb(c) => format!(
                "mysql://{}:{}@localhost:{}/{}",
                c.username, c.password, c.port, c.database_name
            ),
            DatabaseEngine::Redis(c) | DatabaseEngine::KeyDb(c) | DatabaseEngine::Dragonfly(c) => {
                match c.password.as_deref().filter(|p| !p.is_empty()) {
                    Some(password) => format!("redis://:{}@localhost:{}", password, c.port),
                    None => format!("redis://localhost:{}", c.port),
                }
            }
            DatabaseEngine::MongoDb(c) => format!(
                "mongodb://{}:{}@localhost:{}/{}",
                c.username, c.password, c.port, c.database_name
            ),
            DatabaseEngine::ClickHouse(c) => format!(
                "clickhouse://{}:{}@localhost:{}/{}",
                c.username, c.password, c.port, c.database_name
            ),
        }
    }
}

pub fn database_container_name(database: &DatabaseInstance) -> String {
    format!(
        "mooring-{}-{}-{}",
        slugify(&database.project_id),
        slugify(&database.environment_id),
        slugify(&database.name)
    )
}

/// Descriptor for a database container. Data lives in a named volume per
/// instance so it survives container recreation.
pub fn database_workload(database: &DatabaseInstance) -> WorkloadDescriptor {
    let engine = &database.engine;
    let port = engine.port().to_string();

    let mut volumes = BTreeMap::new();
    volumes.insert(
        format!("mooring-{}-{}", engine.kind(), database.id),
        engine.data_path().to_string(),
    );

    WorkloadDescriptor {
        image: engine.image(),
        name: database_container_name(database),
        ports: BTreeMap::from([(port.clone(), port)]),
        environment: engine.environment(),
        volumes,
        restart_policy: Some("unless-stopped".to_string()),
        command: engine.command(),
        ..Default::default()
    }
}
