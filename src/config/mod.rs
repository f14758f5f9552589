//! Configuration layer: typed settings with layered precedence (defaults → file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, MigrateArgs, ServeArgs, ServeOverrides};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "realworld";
const ENV_PREFIX: &str = "REALWORLD";
const MASK: &str = "****";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DOCS_PATH: &str = "config/doc.html";
const DEFAULT_JWT_SECRET: &str = "secret-key";
const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 240 * 60 * 60;
const DEFAULT_DB_MAX_OPEN: u32 = 50;
const DEFAULT_DB_MAX_IDLE: u32 = 5;
const DEFAULT_DB_MAX_LIFETIME_SECS: u64 = 86_400;
const DEFAULT_CACHE_PREFIX: &str = "rewalworld-";
const DEFAULT_CACHE_TTL_SECS: u64 = 60;
const DEFAULT_CACHE_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_REDIS_ENDPOINT: &str = "localhost:6379";
const DEFAULT_REDIS_COMMAND_TIMEOUT_SECS: u64 = 3;
const DEFAULT_REDIS_DIAL_TIMEOUT_SECS: u64 = 5;
const DEFAULT_REDIS_POOL_SIZE: usize = 10;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub jwt: JwtSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    /// Deadline applied to every request; in-flight work is dropped when it elapses.
    pub request_timeout: Duration,
    pub graceful_shutdown: Duration,
    pub docs: DocsSettings,
}

#[derive(Debug, Clone)]
pub struct DocsSettings {
    pub enabled: bool,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub session_timeout: Duration,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &MASK)
            .field("session_timeout", &self.session_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub migrate: bool,
    pub max_open: NonZeroU32,
    pub max_idle: u32,
    pub max_lifetime: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub kind: CacheKind,
    pub prefix: String,
    pub ttl: Duration,
    pub memory_capacity: NonZeroUsize,
    pub redis: RedisSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Redis,
    Memory,
}

impl CacheKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheKind::Redis => "redis",
            CacheKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub cluster: bool,
    pub endpoints: Vec<String>,
    pub command_timeout: Duration,
    pub dial_timeout: Duration,
    pub pool_size: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("cache.redis.endpoints"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => {
            if let Some(url) = args.database_url.as_ref() {
                raw.database.url = Some(url.clone());
            }
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            jwt,
            database,
            cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            jwt: build_jwt_settings(jwt)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
        })
    }

    /// Flat, dotted view of the effective settings with secrets masked, for start-up logs.
    pub fn redacted(&self) -> Value {
        let mut flat = Map::new();
        let mut put = |key: &str, value: Value| {
            flat.insert(key.to_string(), value);
        };

        put("server.addr", json!(self.server.addr.to_string()));
        put(
            "server.timeout_seconds",
            json!(self.server.request_timeout.as_secs()),
        );
        put(
            "server.graceful_shutdown_seconds",
            json!(self.server.graceful_shutdown.as_secs()),
        );
        put("server.docs.enabled", json!(self.server.docs.enabled));
        put(
            "server.docs.path",
            json!(self.server.docs.path.display().to_string()),
        );
        put("logging.level", json!(self.logging.level.to_string()));
        put(
            "logging.json",
            json!(matches!(self.logging.format, LogFormat::Json)),
        );
        put("jwt.secret", json!(MASK));
        put(
            "jwt.session_timeout_seconds",
            json!(self.jwt.session_timeout.as_secs()),
        );
        put(
            "database.url",
            json!(self.database.url.as_deref().map(mask_url_password)),
        );
        put("database.migrate", json!(self.database.migrate));
        put("database.pool.max_open", json!(self.database.max_open.get()));
        put("database.pool.max_idle", json!(self.database.max_idle));
        put(
            "database.pool.max_lifetime_seconds",
            json!(self.database.max_lifetime.as_secs()),
        );
        put("cache.enabled", json!(self.cache.enabled));
        put("cache.kind", json!(self.cache.kind.as_str()));
        put("cache.prefix", json!(self.cache.prefix));
        put("cache.ttl_seconds", json!(self.cache.ttl.as_secs()));
        put(
            "cache.memory.capacity",
            json!(self.cache.memory_capacity.get()),
        );
        put("cache.redis.cluster", json!(self.cache.redis.cluster));
        put(
            "cache.redis.endpoints",
            json!(
                self.cache
                    .redis
                    .endpoints
                    .iter()
                    .map(|endpoint| mask_url_password(endpoint))
                    .collect::<Vec<_>>()
            ),
        );
        put(
            "cache.redis.command_timeout_seconds",
            json!(self.cache.redis.command_timeout.as_secs()),
        );
        put(
            "cache.redis.dial_timeout_seconds",
            json!(self.cache.redis.dial_timeout.as_secs()),
        );
        put("cache.redis.pool_size", json!(self.cache.redis.pool_size.get()));

        Value::Object(flat)
    }
}

/// Replace the password component of a URL-shaped value; other values pass through.
fn mask_url_password(value: &str) -> String {
    match Url::parse(value) {
        Ok(mut url) if url.password().is_some() => {
            if url.set_password(Some(MASK)).is_err() {
                return MASK.to_string();
            }
            url.to_string()
        }
        _ => value.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    jwt: RawJwtSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(timeout) = overrides.server_timeout {
            self.server.timeout_seconds = Some(timeout);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(migrate) = overrides.database_migrate {
            self.database.migrate = Some(migrate);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(kind) = overrides.cache_kind.as_ref() {
            self.cache.kind = Some(kind.clone());
        }
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let request_timeout = positive_secs(
        server
            .timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        "server.timeout_seconds",
    )?;
    let graceful_shutdown = positive_secs(
        server
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        "server.graceful_shutdown_seconds",
    )?;

    let docs_path = server
        .docs
        .path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCS_PATH));
    let docs_enabled = server.docs.enabled.unwrap_or(false);
    if docs_enabled && docs_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "server.docs.path",
            "path must not be empty when docs are enabled",
        ));
    }

    Ok(ServerSettings {
        addr,
        request_timeout,
        graceful_shutdown,
        docs: DocsSettings {
            enabled: docs_enabled,
            path: docs_path,
        },
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_jwt_settings(jwt: RawJwtSettings) -> Result<JwtSettings, LoadError> {
    let secret = jwt
        .secret
        .unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string());
    if secret.is_empty() {
        return Err(LoadError::invalid("jwt.secret", "secret must not be empty"));
    }

    let session_timeout = positive_secs(
        jwt.session_timeout_seconds
            .unwrap_or(DEFAULT_SESSION_TIMEOUT_SECS),
        "jwt.session_timeout_seconds",
    )?;

    Ok(JwtSettings {
        secret,
        session_timeout,
    })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_open = non_zero_u32(
        database.pool.max_open.unwrap_or(DEFAULT_DB_MAX_OPEN).into(),
        "database.pool.max_open",
    )?;
    let max_idle = database.pool.max_idle.unwrap_or(DEFAULT_DB_MAX_IDLE);
    if max_idle > max_open.get() {
        return Err(LoadError::invalid(
            "database.pool.max_idle",
            "must not exceed database.pool.max_open",
        ));
    }
    let max_lifetime = positive_secs(
        database
            .pool
            .max_lifetime_seconds
            .unwrap_or(DEFAULT_DB_MAX_LIFETIME_SECS),
        "database.pool.max_lifetime_seconds",
    )?;

    Ok(DatabaseSettings {
        url,
        migrate: database.migrate.unwrap_or(false),
        max_open,
        max_idle,
        max_lifetime,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let kind = match cache.kind.as_deref().map(str::trim) {
        None | Some("redis") => CacheKind::Redis,
        Some("memory") => CacheKind::Memory,
        Some(other) => {
            return Err(LoadError::invalid(
                "cache.kind",
                format!("unknown cache kind `{other}` (expected redis|memory)"),
            ));
        }
    };

    let prefix = cache
        .prefix
        .unwrap_or_else(|| DEFAULT_CACHE_PREFIX.to_string());
    let ttl = positive_secs(
        cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        "cache.ttl_seconds",
    )?;
    let memory_capacity = NonZeroUsize::new(
        cache
            .memory
            .capacity
            .unwrap_or(DEFAULT_CACHE_MEMORY_CAPACITY),
    )
    .ok_or_else(|| LoadError::invalid("cache.memory.capacity", "must be greater than zero"))?;

    let redis = build_redis_settings(cache.redis)?;
    let enabled = cache.enabled.unwrap_or(false);
    if enabled && kind == CacheKind::Redis && redis.endpoints.is_empty() {
        return Err(LoadError::invalid(
            "cache.redis.endpoints",
            "at least one endpoint is required when the redis cache is enabled",
        ));
    }

    Ok(CacheSettings {
        enabled,
        kind,
        prefix,
        ttl,
        memory_capacity,
        redis,
    })
}

fn build_redis_settings(redis: RawRedisSettings) -> Result<RedisSettings, LoadError> {
    let endpoints = redis
        .endpoints
        .unwrap_or_else(|| vec![DEFAULT_REDIS_ENDPOINT.to_string()])
        .into_iter()
        .map(|endpoint| endpoint.trim().to_string())
        .filter(|endpoint| !endpoint.is_empty())
        .collect();

    let command_timeout = positive_secs(
        redis
            .command_timeout_seconds
            .unwrap_or(DEFAULT_REDIS_COMMAND_TIMEOUT_SECS),
        "cache.redis.command_timeout_seconds",
    )?;
    let dial_timeout = positive_secs(
        redis
            .dial_timeout_seconds
            .unwrap_or(DEFAULT_REDIS_DIAL_TIMEOUT_SECS),
        "cache.redis.dial_timeout_seconds",
    )?;
    let pool_size = NonZeroUsize::new(redis.pool_size.unwrap_or(DEFAULT_REDIS_POOL_SIZE))
        .ok_or_else(|| LoadError::invalid("cache.redis.pool_size", "must be greater than zero"))?;

    Ok(RedisSettings {
        cluster: redis.cluster.unwrap_or(false),
        endpoints,
        command_timeout,
        dial_timeout,
        pool_size,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    timeout_seconds: Option<u64>,
    graceful_shutdown_seconds: Option<u64>,
    docs: RawDocsSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDocsSettings {
    enabled: Option<bool>,
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJwtSettings {
    secret: Option<String>,
    session_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    migrate: Option<bool>,
    pool: RawPoolSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPoolSettings {
    max_open: Option<u32>,
    max_idle: Option<u32>,
    max_lifetime_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    kind: Option<String>,
    prefix: Option<String>,
    ttl_seconds: Option<u64>,
    memory: RawMemoryCacheSettings,
    redis: RawRedisSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMemoryCacheSettings {
    capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    cluster: Option<bool>,
    endpoints: Option<Vec<String>>,
    command_timeout_seconds: Option<u64>,
    dial_timeout_seconds: Option<u64>,
    pool_size: Option<usize>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;
