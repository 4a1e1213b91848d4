//! Server configuration.
//!
//! Values come from environment variables and can be overridden on the command
//! line through [`ServerArgs`].

use std::env;
use std::str::FromStr;

use arrrg_derive::CommandLine;

use crate::error::{Error, Result};
use crate::upstream::{API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Default requests-per-minute cap.
const DEFAULT_RATE_LIMIT_RPM: u64 = 60;

/// Command-line arguments for messagegpt-server.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ServerArgs {
    /// Address to bind.
    #[arrrg(optional, "Address to bind (default: 0.0.0.0)", "HOST")]
    pub host: Option<String>,

    /// Port to bind.
    #[arrrg(optional, "Port to listen on (default: 3001)", "PORT")]
    pub port: Option<u16>,

    /// Upstream model.
    #[arrrg(optional, "Model to complete with (default: gpt-4o-mini)", "MODEL")]
    pub model: Option<String>,

    /// Upstream base URL.
    #[arrrg(optional, "OpenAI-compatible API base URL", "URL")]
    pub base_url: Option<String>,

    /// Requests-per-minute cap.
    #[arrrg(optional, "Requests per minute before returning 429 (0 disables)", "N")]
    pub rate_limit: Option<u64>,
}

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Origins allowed by CORS. Empty (or `*`) allows any origin.
    pub allowed_origins: Vec<String>,
    /// Requests allowed per minute; `None` disables the limiter.
    pub rate_limit_per_minute: Option<u64>,
    /// Bearer token callers must present; `None` disables the check.
    pub auth_token: Option<String>,
    /// Upstream API key.
    pub api_key: Option<String>,
    /// Upstream base URL.
    pub base_url: String,
    /// Upstream model.
    pub model: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            allowed_origins: Vec::new(),
            rate_limit_per_minute: Some(DEFAULT_RATE_LIMIT_RPM),
            auth_token: None,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// Recognized keys: `HOST`, `PORT`, `ALLOWED_ORIGINS` (comma separated),
    /// `RATE_LIMIT_RPM`, `AUTH_TOKEN`, `OPENAI_API_KEY`, `OPENAI_BASE_URL` and
    /// `OPENAI_MODEL`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let rate_limit_per_minute = match get("RATE_LIMIT_RPM") {
            Some(value) => parse_or(
                "RATE_LIMIT_RPM",
                &value,
                defaults.rate_limit_per_minute,
                |rpm: u64| Some(rpm).filter(|rpm| *rpm > 0),
            ),
            None => defaults.rate_limit_per_minute,
        };
        let port = match get("PORT") {
            Some(value) => parse_or("PORT", &value, defaults.port, |port: u16| port),
            None => defaults.port,
        };

        Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            allowed_origins,
            rate_limit_per_minute,
            auth_token: get("AUTH_TOKEN"),
            api_key: get(API_KEY_ENV),
            base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model: get("OPENAI_MODEL").unwrap_or(defaults.model),
        }
    }

    /// Apply command-line overrides.
    pub fn with_args(mut self, args: ServerArgs) -> Self {
        if let Some(host) = args.host {
            self.host = host;
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(model) = args.model {
            self.model = model;
        }
        if let Some(base_url) = args.base_url {
            self.base_url = base_url;
        }
        if let Some(rpm) = args.rate_limit {
            self.rate_limit_per_minute = Some(rpm).filter(|rpm| *rpm > 0);
        }
        self
    }

    /// The `host:port` pair to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Return the upstream API key or fail with a configuration error.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::configuration(format!("{API_KEY_ENV} must be set to reach the provider"))
        })
    }
}

/// Parse `value` and map it, keeping `default` when it does not parse.
fn parse_or<T: FromStr, U>(
    key: &str,
    value: &str,
    default: U,
    map: impl FnOnce(T) -> U,
) -> U {
    match value.trim().parse::<T>() {
        Ok(parsed) => map(parsed),
        Err(_) => {
            tracing::warn!(key, value, "ignoring unparseable setting; using the default");
            default
        }
    }
}
