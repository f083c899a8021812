use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub registration: RegistrationMode,
    pub access_token_minutes: i64,
    pub max_upload_size: usize,
    pub chunk_size: usize,
    pub cors_origins: Vec<String>,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationMode {
    Open,
    /// Only the first account may register.
    Closed,
}

/// GridFS default chunk size (255 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| format!("Missing required environment variable: {key}"))
        };
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let host: IpAddr = or("PULPDOCS_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid PULPDOCS_HOST: {e}"))?;

        let port: u16 = or("PULPDOCS_PORT", "3001")
            .parse()
            .map_err(|e| format!("Invalid PULPDOCS_PORT: {e}"))?;

        let registration = match or("PULPDOCS_REGISTRATION", "open").as_str() {
            "open" => RegistrationMode::Open,
            "closed" => RegistrationMode::Closed,
            other => {
                return Err(format!(
                    "Invalid PULPDOCS_REGISTRATION: {other:?} (expected \"open\" or \"closed\")"
                ));
            }
        };

        let access_token_minutes: i64 = or("PULPDOCS_ACCESS_TOKEN_MINUTES", "60")
            .parse()
            .map_err(|e| format!("Invalid PULPDOCS_ACCESS_TOKEN_MINUTES: {e}"))?;
        if access_token_minutes <= 0 {
            return Err("PULPDOCS_ACCESS_TOKEN_MINUTES must be positive".to_string());
        }

        let max_upload_size: usize = or("PULPDOCS_MAX_UPLOAD_SIZE", "26214400")
            .parse()
            .map_err(|e| format!("Invalid PULPDOCS_MAX_UPLOAD_SIZE: {e}"))?;

        let chunk_size: usize = or("PULPDOCS_CHUNK_SIZE", &DEFAULT_CHUNK_SIZE.to_string())
            .parse()
            .map_err(|e| format!("Invalid PULPDOCS_CHUNK_SIZE: {e}"))?;
        if chunk_size == 0 {
            return Err("PULPDOCS_CHUNK_SIZE must be greater than zero".to_string());
        }

        let cors_origins: Vec<String> = or("PULPDOCS_CORS_ORIGINS", "")
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();

        let log_level = or("PULPDOCS_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            registration,
            access_token_minutes,
            max_upload_size,
            chunk_size,
            cors_origins,
            log_level,
        })
    }
}
