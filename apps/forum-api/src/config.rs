/// Forum API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Maximum number of pooled database connections.
    pub db_pool_size: usize,
}

const DEFAULT_DB_POOL_SIZE: usize = 20;

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_var("DATABASE_URL"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            db_pool_size: pool_size(std::env::var("DB_POOL_SIZE").ok()),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

/// Parse the pool size, falling back to the default on absent, unparseable,
/// or zero values.
fn pool_size(raw: Option<String>) -> usize {
    raw.and_then(|v| v.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_DB_POOL_SIZE)
}
