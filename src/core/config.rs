use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub retention: RetentionConfig,
    pub admin: AdminConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Which physical store holds uploaded file bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    MinIO,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory holding one blob per file id (local backend)
    pub local_dir: PathBuf,
    pub minio: MinIOConfig,
}

/// MinIO/S3 storage configuration for file blobs
#[derive(Debug, Clone)]
pub struct MinIOConfig {
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    /// Access key for authentication
    pub access_key: String,
    /// Secret key for authentication
    pub secret_key: String,
    /// Bucket name for storing files
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Key prefix under which blobs are stored
    pub prefix: String,
}

/// Retention windows and sweep cadence for the lifecycle engine
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Period of the expiration sweep (the trash purge is chained after it)
    pub expiration_sweep_interval: Duration,
    /// Period of the file-request, account and audit purge sweeps
    pub maintenance_sweep_interval: Duration,
    pub trash_retention_days: i64,
    pub account_purge_days: i64,
    pub file_request_grace_days: i64,
    pub audit_retention_days: i64,
    pub audit_max_size_mb: i64,
    /// Maximum rows fetched per due-item query
    pub sweep_batch_size: i64,
    pub sweeps_enabled: bool,
}

/// Credentials for the basic-auth protected admin API
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            retention: RetentionConfig::from_env()?,
            admin: AdminConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
        })
    }
}

/// Read an environment variable, falling back to `default` when unset,
/// and parse it into `T`
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid value, got '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_env("PORT", 3000u16)?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        Ok(Self {
            url,
            max_connections: parse_env("DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            min_connections: parse_env("DB_MIN_CONNECTIONS", Self::DEFAULT_MIN_CONNECTIONS)?,
            acquire_timeout_secs: parse_env(
                "DB_ACQUIRE_TIMEOUT_SECS",
                Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
            idle_timeout_secs: parse_env("DB_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT_SECS)?,
            max_lifetime_secs: parse_env("DB_MAX_LIFETIME_SECS", Self::DEFAULT_MAX_LIFETIME_SECS)?,
        })
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, String> {
        let backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => StorageBackend::Local,
            "minio" | "s3" => StorageBackend::MinIO,
            other => return Err(format!("Unsupported STORAGE_BACKEND: {}", other)),
        };

        let local_dir = env::var("STORAGE_LOCAL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/blobs"));

        Ok(Self {
            backend,
            local_dir,
            minio: MinIOConfig::from_env()?,
        })
    }
}

impl MinIOConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            endpoint: env::var("MINIO_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            access_key: env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
            secret_key: env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
            bucket: env::var("MINIO_BUCKET").unwrap_or_else(|_| "fileshare-blobs".to_string()),
            region: env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            prefix: env::var("MINIO_PREFIX").unwrap_or_else(|_| "files".to_string()),
        })
    }
}

impl RetentionConfig {
    const DEFAULT_EXPIRATION_SWEEP_INTERVAL_SECS: u64 = 6 * 60 * 60;
    const DEFAULT_MAINTENANCE_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;
    const DEFAULT_TRASH_RETENTION_DAYS: i64 = 5;
    const DEFAULT_ACCOUNT_PURGE_DAYS: i64 = 90;
    const DEFAULT_FILE_REQUEST_GRACE_DAYS: i64 = 10;
    const DEFAULT_AUDIT_RETENTION_DAYS: i64 = 90;
    const DEFAULT_AUDIT_MAX_SIZE_MB: i64 = 100;
    const DEFAULT_SWEEP_BATCH_SIZE: i64 = 500;

    pub fn from_env() -> Result<Self, String> {
        let expiration_secs = parse_env(
            "EXPIRATION_SWEEP_INTERVAL_SECS",
            Self::DEFAULT_EXPIRATION_SWEEP_INTERVAL_SECS,
        )?;
        let maintenance_secs = parse_env(
            "MAINTENANCE_SWEEP_INTERVAL_SECS",
            Self::DEFAULT_MAINTENANCE_SWEEP_INTERVAL_SECS,
        )?;
        if expiration_secs == 0 || maintenance_secs == 0 {
            return Err("Sweep intervals must be greater than zero".to_string());
        }

        let sweep_batch_size = parse_env("SWEEP_BATCH_SIZE", Self::DEFAULT_SWEEP_BATCH_SIZE)?;
        if sweep_batch_size <= 0 {
            return Err("SWEEP_BATCH_SIZE must be greater than zero".to_string());
        }

        Ok(Self {
            expiration_sweep_interval: Duration::from_secs(expiration_secs),
            maintenance_sweep_interval: Duration::from_secs(maintenance_secs),
            trash_retention_days: parse_env(
                "TRASH_RETENTION_DAYS",
                Self::DEFAULT_TRASH_RETENTION_DAYS,
            )?,
            account_purge_days: parse_env("ACCOUNT_PURGE_DAYS", Self::DEFAULT_ACCOUNT_PURGE_DAYS)?,
            file_request_grace_days: parse_env(
                "FILE_REQUEST_GRACE_DAYS",
                Self::DEFAULT_FILE_REQUEST_GRACE_DAYS,
            )?,
            audit_retention_days: parse_env(
                "AUDIT_RETENTION_DAYS",
                Self::DEFAULT_AUDIT_RETENTION_DAYS,
            )?,
            audit_max_size_mb: parse_env("AUDIT_MAX_SIZE_MB", Self::DEFAULT_AUDIT_MAX_SIZE_MB)?,
            sweep_batch_size,
            sweeps_enabled: parse_env("SWEEPS_ENABLED", true)?,
        })
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            expiration_sweep_interval: Duration::from_secs(
                Self::DEFAULT_EXPIRATION_SWEEP_INTERVAL_SECS,
            ),
            maintenance_sweep_interval: Duration::from_secs(
                Self::DEFAULT_MAINTENANCE_SWEEP_INTERVAL_SECS,
            ),
            trash_retention_days: Self::DEFAULT_TRASH_RETENTION_DAYS,
            account_purge_days: Self::DEFAULT_ACCOUNT_PURGE_DAYS,
            file_request_grace_days: Self::DEFAULT_FILE_REQUEST_GRACE_DAYS,
            audit_retention_days: Self::DEFAULT_AUDIT_RETENTION_DAYS,
            audit_max_size_mb: Self::DEFAULT_AUDIT_MAX_SIZE_MB,
            sweep_batch_size: Self::DEFAULT_SWEEP_BATCH_SIZE,
            sweeps_enabled: true,
        }
    }
}

impl AdminConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("ADMIN_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty());

        Ok(Self { username, password })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Fileshare Admin API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "File and account lifecycle administration".to_string());

        Ok(Self {
            title,
            version,
            description,
        })
    }
}
