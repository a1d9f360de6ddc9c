use serde::Deserialize;

/// Which record store backs the company collection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum StoreBackend {
    /// Postgres jsonb document table.
    Postgres { database_url: String },
    /// PostgREST-compatible HTTP endpoint (e.g. a Supabase project).
    Rest { base_url: String, api_key: String },
    /// In-process store; data is lost on restart.
    Memory,
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Postgres { .. } => "postgres",
            StoreBackend::Rest { .. } => "rest",
            StoreBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub backend: StoreBackend,
    pub collection: String,
    pub store_timeout_secs: u64,
    pub preload_on_startup: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .trim()
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => StoreBackend::Postgres {
                database_url: database_url_from_env()?,
            },
            "rest" => StoreBackend::Rest {
                base_url: std::env::var("REST_STORE_URL")
                    .map_err(|_| anyhow::anyhow!("REST_STORE_URL environment variable required"))
                    .and_then(|url| validate_http_url("REST_STORE_URL", url))?,
                api_key: std::env::var("REST_STORE_KEY")
                    .map_err(|_| anyhow::anyhow!("REST_STORE_KEY environment variable required"))
                    .and_then(|key| {
                        if key.trim().is_empty() {
                            anyhow::bail!("REST_STORE_KEY cannot be empty");
                        }
                        Ok(key)
                    })?,
            },
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!(
                "STORE_BACKEND must be one of postgres, rest, memory (got '{}')",
                other
            ),
        };

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            backend,
            collection: std::env::var("COMPANIES_COLLECTION")
                .ok()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "companies".to_string()),
            store_timeout_secs: std::env::var("STORE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .ok()
                .filter(|secs: &u64| *secs > 0)
                .ok_or_else(|| anyhow::anyhow!("STORE_TIMEOUT_SECS must be a positive number"))?,
            preload_on_startup: parse_bool(
                "PRELOAD_ON_STARTUP",
                std::env::var("PRELOAD_ON_STARTUP").ok(),
                true,
            )?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Store backend: {}", config.backend.name());
        match &config.backend {
            StoreBackend::Postgres { database_url } => {
                let prefix: String = database_url.chars().take(20).collect();
                tracing::debug!("Database URL: {}...", prefix);
            }
            StoreBackend::Rest { base_url, .. } => tracing::debug!("REST store URL: {}", base_url),
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store, data will not survive restarts")
            }
        }
        tracing::debug!("Collection: {}", config.collection);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

/// Reads `DB_URL` or `DATABASE_URL`.
pub fn database_url_from_env() -> anyhow::Result<String> {
    std::env::var("DB_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required"))
        .and_then(|url| {
            if url.trim().is_empty() {
                anyhow::bail!("DB_URL cannot be empty");
            }
            if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
            }
            Ok(url)
        })
}

fn validate_http_url(var: &str, raw: String) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        anyhow::bail!("{} cannot be empty", var);
    }
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", var, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", var);
    }
    Ok(trimmed.to_string())
}

fn parse_bool(var: &str, raw: Option<String>, default: bool) -> anyhow::Result<bool> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{} must be a boolean (got '{}')", var, other),
    }
}
