//! Runtime settings read from `PENSION_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;

/// Used when `PENSION_JWT_SECRET` is unset. Tokens signed with it are only
/// fit for local development.
const DEV_JWT_SECRET: &str = "pension-development-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub admin: AdminCredentials,
    /// Base URL of the web client, used to build password reset links.
    pub client_url: String,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
}

/// The single administrator login. Not stored with the customers.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    /// `None` disables admin login.
    pub password: Option<String>,
    pub email: String,
}

fn parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    get(key).and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let jwt_secret = match get("PENSION_JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!("PENSION_JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };
        let admin = AdminCredentials {
            username: get("PENSION_ADMIN_USERNAME").unwrap_or_else(|| "admin".into()),
            password: get("PENSION_ADMIN_PASSWORD").filter(|p| !p.is_empty()),
            email: get("PENSION_ADMIN_EMAIL").unwrap_or_else(|| "admin@pension.local".into()),
        };
        if admin.password.is_none() {
            tracing::warn!("PENSION_ADMIN_PASSWORD not set, admin login disabled");
        }

        Self {
            bind: get("PENSION_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&get, "PENSION_PORT").unwrap_or(3000),
            data_dir: PathBuf::from(get("PENSION_DATA_DIR").unwrap_or_else(|| "./data".into())),
            jwt_secret,
            admin,
            client_url: get("PENSION_CLIENT_URL")
                .unwrap_or_else(|| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            metrics_port: parsed(&get, "PENSION_METRICS_PORT"),
            compact_threshold: parsed(&get, "PENSION_COMPACT_THRESHOLD").unwrap_or(1000),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("pension.wal")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Link sent to a customer who asked for a password reset.
    pub fn reset_url(&self, token: &str) -> String {
        format!("{}/reset-password/{token}", self.client_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]);
        assert_eq!(c.listen_addr(), "0.0.0.0:3000");
        assert_eq!(c.data_dir, PathBuf::from("./data"));
        assert_eq!(c.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(c.admin.username, "admin");
        assert!(c.admin.password.is_none());
        assert_eq!(c.metrics_port, None);
        assert_eq!(c.compact_threshold, 1000);
    }

    #[test]
    fn overrides() {
        let c = config(&[
            ("PENSION_PORT", "8080"),
            ("PENSION_JWT_SECRET", "s3cret"),
            ("PENSION_ADMIN_PASSWORD", "hunter2"),
            ("PENSION_CLIENT_URL", "https://pension.example/"),
            ("PENSION_METRICS_PORT", "9090"),
        ]);
        assert_eq!(c.port, 8080);
        assert_eq!(c.jwt_secret, "s3cret");
        assert_eq!(c.admin.password.as_deref(), Some("hunter2"));
        assert_eq!(c.metrics_port, Some(9090));
        assert_eq!(
            c.reset_url("abc"),
            "https://pension.example/reset-password/abc"
        );
    }

    #[test]
    fn bad_numbers_fall_back() {
        let c = config(&[("PENSION_PORT", "eighty"), ("PENSION_COMPACT_THRESHOLD", "-1")]);
        assert_eq!(c.port, 3000);
        assert_eq!(c.compact_threshold, 1000);
    }
}
