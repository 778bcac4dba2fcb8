use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::metadata::MetadataMode;
use crate::route::NamingConvention;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub routes: RoutesConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Required to serve; absent in offline CLI use
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    /// SQLSTATE prefix of signalled application errors
    pub app_error_state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesConfig {
    pub prefix: String,
    pub segment_separator: String,
    pub hyphenate: bool,
    pub metadata_mode: MetadataMode,
    pub validators_dir: Option<PathBuf>,
}

impl RoutesConfig {
    pub fn naming(&self) -> NamingConvention {
        NamingConvention {
            prefix: self.prefix.clone(),
            segment_separator: self.segment_separator.clone(),
            hyphenate: self.hyphenate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,
    pub jwt_audience: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Environment defaults selected by `APP_ENV`, then per-variable overrides
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(lookup)
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Server overrides
        if let Some(v) = lookup("PROCROUTE_PORT").or_else(|| lookup("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Some(v) = lookup("SERVER_BODY_LIMIT_BYTES") {
            self.server.body_limit_bytes = v.parse().unwrap_or(self.server.body_limit_bytes);
        }

        // Database overrides
        if let Some(v) = lookup("DATABASE_URL") {
            self.database.url = Some(v).filter(|v| !v.is_empty());
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Some(v) = lookup("DATABASE_APP_ERROR_STATE") {
            if !v.trim().is_empty() {
                self.database.app_error_state = v.trim().to_string();
            }
        }

        // Route overrides
        if let Some(v) = lookup("ROUTES_PREFIX") {
            self.routes.prefix = v;
        }
        if let Some(v) = lookup("ROUTES_SEGMENT_SEPARATOR") {
            if !v.is_empty() {
                self.routes.segment_separator = v;
            }
        }
        if let Some(v) = lookup("ROUTES_HYPHENATE") {
            self.routes.hyphenate = v.parse().unwrap_or(self.routes.hyphenate);
        }
        if let Some(v) = lookup("ROUTES_METADATA_MODE") {
            self.routes.metadata_mode = v.parse().unwrap_or(self.routes.metadata_mode);
        }
        if let Some(v) = lookup("ROUTES_VALIDATORS_DIR") {
            self.routes.validators_dir = Some(PathBuf::from(v)).filter(|p| !p.as_os_str().is_empty());
        }

        // Security overrides
        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Some(v) = lookup("JWT_SECRET") {
            self.security.jwt_secret = Some(v).filter(|v| !v.is_empty());
        }
        if let Some(v) = lookup("JWT_AUDIENCE") {
            self.security.jwt_audience = split_list(&v);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                body_limit_bytes: 10 * 1024 * 1024, // 10MB
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                app_error_state: "45".to_string(),
            },
            routes: RoutesConfig::default(),
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: None,
                jwt_audience: Vec::new(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                body_limit_bytes: 5 * 1024 * 1024, // 5MB
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                app_error_state: "45".to_string(),
            },
            routes: RoutesConfig::default(),
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: None,
                jwt_audience: Vec::new(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                body_limit_bytes: 2 * 1024 * 1024, // 2MB
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                app_error_state: "45".to_string(),
            },
            routes: RoutesConfig::default(),
            security: SecurityConfig {
                enable_cors: false,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: None,
                jwt_audience: Vec::new(),
            },
        }
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        let naming = NamingConvention::default();
        Self {
            prefix: naming.prefix,
            segment_separator: naming.segment_separator,
            hyphenate: naming.hyphenate,
            metadata_mode: MetadataMode::Strict,
            validators_dir: None,
        }
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
