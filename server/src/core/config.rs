use chrono::Duration;
use dotenv::dotenv;
use std::env;
use tracing::info;

const INSECURE_DEFAULT_SECRET: &str = "local-development-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub server_host: String,
    pub server_port: u16,
    pub max_connections: u32,
    pub invitation_ttl_hours: i64,
    pub media_root: String,
    pub public_base_url: String,
    pub app_env: String,
}

impl Config {
    /// Loads the configuration from environment variables, reading `.env` first.
    pub fn from_env() -> Result<Self, String> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://grocery.db".to_string());

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            eprintln!("WARNING: JWT_SECRET not set, using default (not secure for production!)");
            INSECURE_DEFAULT_SECRET.to_string()
        });

        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| "Invalid SERVER_PORT: must be a number between 0-65535".to_string())?;

        let max_connections = env::var("MAX_DB_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .map_err(|_| "Invalid MAX_DB_CONNECTIONS: must be a positive number".to_string())?;

        let invitation_ttl_hours = env::var("INVITATION_TTL_HOURS")
            .unwrap_or_else(|_| "168".to_string())
            .parse::<i64>()
            .map_err(|_| "Invalid INVITATION_TTL_HOURS: must be a number of hours".to_string())?;

        let media_root = env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string());

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}/media", server_host, server_port));

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_audience,
            server_host,
            server_port,
            max_connections,
            invitation_ttl_hours,
            media_root,
            public_base_url,
            app_env,
        })
    }

    pub fn invitation_ttl(&self) -> Duration {
        Duration::hours(self.invitation_ttl_hours)
    }

    /// Logs the effective configuration with secrets masked.
    pub fn print_info(&self) {
        info!(
            environment = %self.app_env,
            address = %format!("{}:{}", self.server_host, self.server_port),
            database = %Self::mask_url(&self.database_url),
            max_connections = self.max_connections,
            invitation_ttl_hours = self.invitation_ttl_hours,
            media_root = %self.media_root,
            jwt_secret = if self.jwt_secret == INSECURE_DEFAULT_SECRET {
                "USING DEFAULT (INSECURE!)"
            } else {
                "custom secret configured"
            },
            "Server configuration"
        );
    }

    /// Hides credentials embedded in a database URL.
    fn mask_url(url: &str) -> String {
        if let Some(at_pos) = url.find('@') {
            if let Some(scheme_end) = url.find("://") {
                let scheme = &url[..scheme_end + 3];
                let after_at = &url[at_pos..];
                return format!("{}***{}", scheme, after_at);
            }
        }
        url.to_string()
    }
}
