use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub public_url: String,
    pub session_ttl_hours: i64,
    pub smtp: Option<SmtpConfig>,
    pub from_email: String,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub user: String,
    pub pass: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let smtp = match std::env::var("SMTP_SERVER") {
            Ok(server) if !server.is_empty() => Some(SmtpConfig {
                server,
                user: require_env("SMTP_USER")?,
                pass: require_env("SMTP_PASS")?,
            }),
            _ => None,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: optional_env("S3_BUCKET", crate::backend::RESUME_BUCKET),
            s3_endpoint: require_env("S3_ENDPOINT")?,
            s3_region: optional_env("S3_REGION", "us-east-1"),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            public_url: optional_env("PUBLIC_URL", &format!("http://localhost:{port}")),
            session_ttl_hours: optional_env("SESSION_TTL_HOURS", "24")
                .parse::<i64>()
                .context("SESSION_TTL_HOURS must be a whole number of hours")?,
            smtp,
            from_email: optional_env("FROM_EMAIL", "no-reply@localhost"),
            port,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }

    /// Where a magic link lands after sign-in.
    pub fn sign_in_redirect(&self) -> String {
        format!("{}/", self.public_url.trim_end_matches('/'))
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/review_test".to_string(),
            s3_bucket: "resumes".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            public_url: "http://localhost:8080".to_string(),
            session_ttl_hours: 24,
            smtp: None,
            from_email: "no-reply@localhost".to_string(),
            port: 8080,
            rust_log: "debug".to_string(),
        }
    }
}
