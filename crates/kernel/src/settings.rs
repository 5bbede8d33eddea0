use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "SHELF_ENV";
const CONFIG_DIR_ENV: &str = "SHELF_CONFIG_DIR";
const ENV_PREFIX: &str = "SHELF";

/// Platform variables honoured verbatim, mapped onto `platform.*` keys.
const PLATFORM_ENV_ALIASES: &[(&str, &str)] = &[
    ("SUPABASE_URL", "platform.url"),
    ("SUPABASE_ANON_KEY", "platform.anon_key"),
    ("SUPABASE_JWT_SECRET", "platform.jwt_secret"),
];

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub platform: PlatformSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// `SHELF_*` variables and the platform's own variables.
    ///
    /// Fails when any of the platform URL, public key or signing secret is
    /// missing.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        Self::from_vars(std::env::vars().collect())
    }

    /// Same as [`Settings::load`] but reads variables from `vars` instead of
    /// the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        let environment_name = vars
            .get(ENV_VAR_NAME)
            .cloned()
            .unwrap_or_else(|| DEFAULT_ENV.to_string());
        let environment: Environment = environment_name.parse()?;

        let config_dir = match vars.get(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()
                .map(|cwd| cwd.join("config"))
                .context("unable to resolve current directory")?,
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment_name));

        let mut builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars.clone())),
            );

        for (var, key) in PLATFORM_ENV_ALIASES {
            builder = builder
                .set_override_option(*key, vars.get(*var).cloned())
                .with_context(|| format!("failed to apply {}", var))?;
        }

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = environment;
        settings.platform.ensure_complete()?;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8000
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            cors_origins: Vec::new(),
        }
    }
}

/// Connection details for the hosted table/auth platform.
#[derive(Clone, Deserialize)]
pub struct PlatformSettings {
    #[serde(default)]
    pub url: String,
    /// Public (anonymous) API key sent as `apikey` on every call.
    #[serde(default)]
    pub anon_key: String,
    /// Secret the platform signs access tokens with.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "PlatformSettings::default_table")]
    pub table: String,
    #[serde(default = "PlatformSettings::default_audience")]
    pub audience: String,
}

impl PlatformSettings {
    fn default_table() -> String {
        "books".to_string()
    }

    fn default_audience() -> String {
        "authenticated".to_string()
    }

    /// Error out naming every required value that is absent.
    pub fn ensure_complete(&self) -> anyhow::Result<()> {
        let missing: Vec<&str> = [
            ("SUPABASE_URL", &self.url),
            ("SUPABASE_ANON_KEY", &self.anon_key),
            ("SUPABASE_JWT_SECRET", &self.jwt_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            bail!(
                "missing required environment variables: {}",
                missing.join(", ")
            );
        }
        Ok(())
    }
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            jwt_secret: String::new(),
            table: Self::default_table(),
            audience: Self::default_audience(),
        }
    }
}

impl fmt::Debug for PlatformSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformSettings")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("table", &self.table)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        map.entry(CONFIG_DIR_ENV.to_string())
            .or_insert_with(|| "/nonexistent/shelf-config".to_string());
        map
    }

    fn platform_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("SUPABASE_URL", "https://project.example.co"),
            ("SUPABASE_ANON_KEY", "anon-key"),
            ("SUPABASE_JWT_SECRET", "super-secret"),
        ]
    }

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_platform_table_is_books() {
        let settings = Settings::default();
        assert_eq!(settings.platform.table, "books");
        assert_eq!(settings.platform.audience, "authenticated");
    }

    #[test]
    fn loads_platform_values_from_supabase_variables() {
        let settings = Settings::from_vars(vars(&platform_vars())).unwrap();

        assert_eq!(settings.platform.url, "https://project.example.co");
        assert_eq!(settings.platform.anon_key, "anon-key");
        assert_eq!(settings.platform.jwt_secret, "super-secret");
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn prefixed_variables_override_nested_keys() {
        let mut pairs = platform_vars();
        pairs.push(("SHELF_SERVER__PORT", "9090"));
        pairs.push(("SHELF_PLATFORM__TABLE", "reading_list"));
        pairs.push(("SHELF_TELEMETRY__LOG_FORMAT", "json"));

        let settings = Settings::from_vars(vars(&pairs)).unwrap();

        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.platform.table, "reading_list");
        assert_eq!(settings.telemetry.log_format, LogFormat::Json);
    }

    #[test]
    fn missing_platform_values_fail_fast() {
        let err = Settings::from_vars(vars(&[("SUPABASE_URL", "https://x.example.co")]))
            .unwrap_err()
            .to_string();

        assert!(err.contains("SUPABASE_ANON_KEY"));
        assert!(err.contains("SUPABASE_JWT_SECRET"));
        assert!(!err.contains("SUPABASE_URL"));
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let mut pairs = platform_vars();
        pairs.push(("SHELF_ENV", "qa"));

        assert!(Settings::from_vars(vars(&pairs)).is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let settings = Settings::from_vars(vars(&platform_vars())).unwrap();
        let rendered = format!("{:?}", settings.platform);

        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("anon-key"));
    }
}
