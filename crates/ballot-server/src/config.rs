use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

const DEFAULT_DB_PATH: &str = "ballot.db";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Runtime settings, read from `BALLOT_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub cors_origins: Vec<String>,
    pub seed_demo: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("BALLOT_JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.into());
        if jwt_secret.trim().is_empty() {
            bail!("BALLOT_JWT_SECRET must not be empty");
        }

        let db_path = PathBuf::from(lookup("BALLOT_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into()));
        let host = lookup("BALLOT_HOST").unwrap_or_else(|| DEFAULT_HOST.into());
        let port = match lookup("BALLOT_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid BALLOT_PORT: {raw:?}"))?,
            None => DEFAULT_PORT,
        };
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        let cors_origins = lookup("BALLOT_CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.into())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();

        let seed_demo = lookup("BALLOT_SEED_DEMO")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Config {
            jwt_secret,
            db_path,
            addr,
            cors_origins,
            seed_demo,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}
