//! Gateway configuration module.
//!
//! Supports loading configuration from:
//! 1. Config file (TOML, JSON, or YAML)
//! 2. Environment variables (with prefix)
//!
//! Environment variables take precedence over config file values.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::ProviderEnv;
use crate::error::GateError;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Hosted auth/database provider
    pub provider: ProviderConfig,
    /// Access-control gate routes and timeouts
    pub gate: GateConfig,
    /// Session cookie naming
    pub cookies: CookieConfig,
    /// Dashboard renderer that allowed requests are forwarded to
    pub upstream: UpstreamConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

/// Deployment environment. Only `Development` exposes error details.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl std::str::FromStr for Environment {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(GateError::Config(format!("unknown environment: {}", other))),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server port (default: 8090)
    pub port: u16,
    /// Bind address (default: "0.0.0.0")
    pub bind: String,
    /// Public base URL, used for recovery links and cookie security
    pub public_url: String,
    /// Deployment environment (default: production)
    pub environment: Environment,
}

/// Identity provider / profile store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Project URL, e.g. "https://abcd.supabase.co"
    pub url: String,
    /// Public (anon) API key sent as `apikey`
    pub anon_key: String,
    /// HTTP timeout in seconds (default: 10)
    pub timeout_secs: u64,
}

/// Route namespaces and lookup budget for the access gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Where unauthenticated users are sent (default: "/auth/login")
    pub login_path: String,
    /// Login-type namespaces; authenticated users are bounced to their landing
    pub auth_prefixes: Vec<String>,
    /// Password update pages, open in both states
    pub recovery_paths: Vec<String>,
    /// Admin-only namespace (default: "/admin")
    pub admin_prefix: String,
    /// Non-admin namespace (default: "/user")
    pub user_prefix: String,
    /// Sign-out endpoint (default: "/auth/signout")
    pub signout_path: String,
    /// Paths that never reach the gate
    pub excluded_prefixes: Vec<String>,
    /// Budget for each provider lookup in milliseconds (default: 3000)
    pub lookup_timeout_ms: u64,
}

/// Session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Session cookie name; derived from the provider URL when empty
    pub name: String,
    /// Prefix shared by every provider cookie, purged on sign-out (default: "sb-")
    pub namespace_prefix: String,
    /// Force the `Secure` attribute; derived from `server.public_url` when unset
    pub secure: Option<bool>,
    /// `Max-Age` of the session cookie in seconds (default: 400 days)
    pub max_age_secs: i64,
}

/// Upstream dashboard renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Renderer base URL (default: "http://localhost:3000")
    pub base_url: String,
    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins (comma-separated or array)
    pub allowed_origins: Vec<String>,
    /// Allow credentials (default: true)
    pub allow_credentials: bool,
}

// Default implementations

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8090,
            bind: "0.0.0.0".to_string(),
            public_url: "http://localhost:8090".to_string(),
            environment: Environment::Production,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            timeout_secs: 10,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            login_path: "/auth/login".to_string(),
            auth_prefixes: vec![
                "/auth".to_string(),
                "/login".to_string(),
                "/reset-password".to_string(),
            ],
            recovery_paths: vec![
                "/auth/update-password".to_string(),
                "/update-password".to_string(),
            ],
            admin_prefix: "/admin".to_string(),
            user_prefix: "/user".to_string(),
            signout_path: "/auth/signout".to_string(),
            excluded_prefixes: vec![
                "/_next/static".to_string(),
                "/_next/image".to_string(),
                "/_next".to_string(),
                "/favicon.ico".to_string(),
                "/api".to_string(),
                "/health".to_string(),
                "/static".to_string(),
            ],
            lookup_timeout_ms: 3000,
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace_prefix: "sb-".to_string(),
            secure: None,
            max_age_secs: 400 * 24 * 60 * 60,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:8090".to_string(),
                "http://localhost:3000".to_string(),
            ],
            allow_credentials: true,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from file and environment variables.
    /// Environment variables override file values.
    pub fn load() -> anyhow::Result<Self> {
        // Start with defaults
        let mut config = Self::default();

        // Try to load from config file if specified
        if let Ok(config_path) = std::env::var("GATEWAY_CONFIG") {
            config = Self::from_file(&config_path)?;
            tracing::info!("Loaded configuration from: {}", config_path);
        }

        // Provider credentials from SUPABASE_* (optional)
        if let Some(env) = ProviderEnv::from_env() {
            env.apply(&mut config.provider);
        }

        // Override with environment variables
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a file (supports TOML, JSON, YAML)
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config: GatewayConfig = match extension {
            "toml" => toml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            _ => {
                // Try to detect format
                if content.trim().starts_with('{') {
                    serde_json::from_str(&content)?
                } else if content.contains("---") || content.contains(": ") {
                    serde_yaml::from_str(&content)?
                } else {
                    toml::from_str(&content)?
                }
            }
        };

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Server config
        if let Ok(val) = std::env::var("GATEWAY_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("GATEWAY_BIND") {
            self.server.bind = val;
        }
        if let Ok(val) = std::env::var("GATEWAY_PUBLIC_URL").or_else(|_| std::env::var("NEXT_PUBLIC_URL")) {
            self.server.public_url = val;
        }
        if let Ok(val) = std::env::var("GATEWAY_ENV") {
            match val.parse() {
                Ok(env) => self.server.environment = env,
                Err(e) => tracing::warn!("Ignoring GATEWAY_ENV: {}", e),
            }
        }

        // Provider config
        if let Ok(val) = std::env::var("PROVIDER_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.provider.timeout_secs = secs;
            }
        }

        // Gate config
        if let Ok(val) = std::env::var("GATE_LOGIN_PATH") {
            self.gate.login_path = val;
        }
        if let Ok(val) = std::env::var("GATE_SIGNOUT_PATH") {
            self.gate.signout_path = val;
        }
        if let Ok(val) = std::env::var("GATE_EXCLUDED_PREFIXES") {
            self.gate.excluded_prefixes = split_list(&val);
        }
        if let Ok(val) = std::env::var("GATE_LOOKUP_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.gate.lookup_timeout_ms = ms;
            }
        }

        // Cookie config
        if let Ok(val) = std::env::var("SESSION_COOKIE_NAME") {
            self.cookies.name = val;
        }
        if let Ok(val) = std::env::var("SESSION_COOKIE_MAX_AGE_SECS") {
            if let Ok(secs) = val.parse() {
                self.cookies.max_age_secs = secs;
            }
        }

        // Upstream config
        if let Ok(val) = std::env::var("UPSTREAM_BASE_URL") {
            self.upstream.base_url = val;
        }
        if let Ok(val) = std::env::var("UPSTREAM_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.upstream.timeout_secs = secs;
            }
        }

        // CORS config
        if let Ok(val) = std::env::var("CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = split_list(&val);
        }
        if let Ok(val) = std::env::var("CORS_ALLOW_CREDENTIALS") {
            self.cors.allow_credentials = val.parse().unwrap_or(true);
        }
    }

    /// Reject configurations the gate cannot run with.
    pub fn validate(&self) -> Result<(), GateError> {
        if self.provider.url.trim().is_empty() {
            return Err(GateError::Config("provider url is not set (SUPABASE_URL)".to_string()));
        }
        if self.provider.anon_key.trim().is_empty() {
            return Err(GateError::Config("provider anon key is not set (SUPABASE_ANON_KEY)".to_string()));
        }
        let gate = &self.gate;
        let paths = [&gate.login_path, &gate.admin_prefix, &gate.user_prefix, &gate.signout_path];
        for path in paths.into_iter().chain(&gate.auth_prefixes).chain(&gate.recovery_paths) {
            if !path.starts_with('/') {
                return Err(GateError::Config(format!("route '{}' must start with '/'", path)));
            }
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.server.environment == Environment::Development
    }

    /// Session cookie name: configured value, or `sb-<project-ref>-auth-token`
    /// where the project ref is the first label of the provider host.
    pub fn session_cookie_name(&self) -> String {
        if !self.cookies.name.is_empty() {
            return self.cookies.name.clone();
        }
        let project_ref = url::Url::parse(&self.provider.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.split('.').next().unwrap_or(h).to_string()))
            .unwrap_or_else(|| "local".to_string());
        format!("{}{}-auth-token", self.cookies.namespace_prefix, project_ref)
    }

    /// Whether session cookies carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.cookies
            .secure
            .unwrap_or_else(|| self.server.public_url.starts_with("https://"))
    }

    /// Absolute URL of the password update page, for recovery emails.
    pub fn recovery_redirect_url(&self) -> String {
        let page = self
            .gate
            .recovery_paths
            .first()
            .map(String::as_str)
            .unwrap_or("/auth/update-password");
        format!("{}{}", self.server.public_url.trim_end_matches('/'), page)
    }

    /// Get CORS allowed origins as comma-separated string
    pub fn cors_origins_string(&self) -> String {
        self.cors.allowed_origins.join(",")
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.provider.url = "https://abcdefgh.supabase.co".to_string();
        config.provider.anon_key = "anon".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 8090);
        assert_eq!(config.gate.login_path, "/auth/login");
        assert_eq!(config.gate.lookup_timeout_ms, 3000);
        assert_eq!(config.server.environment, Environment::Production);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_content = r#"
[server]
port = 9090
environment = "development"

[provider]
url = "https://xyz.supabase.co"
anon_key = "key"

[gate]
login_path = "/login"
"#;
        let config: GatewayConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.port, 9090);
        assert!(config.is_development());
        assert_eq!(config.gate.login_path, "/login");
        // Defaults should still be applied for missing fields
        assert_eq!(config.gate.signout_path, "/auth/signout");
        assert_eq!(config.cookies.namespace_prefix, "sb-");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = "server:\n  port: 7000\nupstream:\n  base_url: http://renderer:3000\n";
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.upstream.base_url, "http://renderer:3000");
    }

    #[test]
    fn test_cookie_name_derived_from_project_ref() {
        let config = configured();
        assert_eq!(config.session_cookie_name(), "sb-abcdefgh-auth-token");

        let mut named = configured();
        named.cookies.name = "sb-custom".to_string();
        assert_eq!(named.session_cookie_name(), "sb-custom");
    }

    #[test]
    fn test_validate_requires_provider() {
        assert!(GatewayConfig::default().validate().is_err());
        assert!(configured().validate().is_ok());

        let mut bad = configured();
        bad.gate.login_path = "auth/login".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_secure_cookies_follow_public_url() {
        let mut config = configured();
        assert!(!config.secure_cookies());
        config.server.public_url = "https://dash.example.com".to_string();
        assert!(config.secure_cookies());
        config.cookies.secure = Some(false);
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_recovery_redirect_url() {
        let mut config = configured();
        config.server.public_url = "https://dash.example.com/".to_string();
        assert_eq!(
            config.recovery_redirect_url(),
            "https://dash.example.com/auth/update-password"
        );
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }
}
