use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RECIPIENT: &str = "test@example.com";
const DEFAULT_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 5;
const DEFAULT_RATE_LIMIT_MAX: u32 = 10;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    /// `None` when any of host, user or password is missing.
    pub smtp: Option<SmtpConfig>,
    pub notifications: NotificationConfig,
    pub recaptcha: RecaptchaConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let smtp = SmtpConfig::from_env()?;
        let notifications = NotificationConfig::from_env();
        let recaptcha = RecaptchaConfig::from_env()?;
        let rate_limit = RateLimitConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            smtp,
            notifications,
            recaptcha,
            rate_limit,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// SMTP relay credentials. Only built when the relay is fully described.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub timeout: Duration,
}

impl SmtpConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let (Some(host), Some(username), Some(password)) = (
            non_empty_var("SMTP_HOST"),
            non_empty_var("SMTP_USER"),
            non_empty_var("SMTP_PASSWORD"),
        ) else {
            return Ok(None);
        };

        let port = parse_var("SMTP_PORT", DEFAULT_SMTP_PORT)?;
        let timeout = parse_var("SMTP_TIMEOUT_SECS", DEFAULT_SMTP_TIMEOUT_SECS)?;
        let from = non_empty_var("SMTP_FROM").unwrap_or_else(|| username.clone());

        Ok(Some(Self {
            host,
            port,
            username,
            password,
            from,
            timeout: Duration::from_secs(timeout),
        }))
    }

    /// Port 465 speaks TLS from the first byte; everything else upgrades via STARTTLS.
    pub fn implicit_tls(&self) -> bool {
        self.port == 465
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Where notifications go and what callers are told when delivery fails.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub recipients: Vec<String>,
    pub support_email: Option<String>,
}

impl NotificationConfig {
    fn from_env() -> Self {
        let recipients = non_empty_var("NOTIFY_TO")
            .or_else(|| non_empty_var("SMTP_USER"))
            .unwrap_or_else(|| DEFAULT_RECIPIENT.to_string())
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            recipients,
            support_email: non_empty_var("SUPPORT_EMAIL"),
        }
    }
}

/// Bot-score verification settings.
#[derive(Clone)]
pub struct RecaptchaConfig {
    pub secret_key: Option<String>,
    pub site_key: Option<String>,
    pub verify_url: String,
    pub min_score: Option<f64>,
    pub timeout: Duration,
}

impl RecaptchaConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let min_score = match non_empty_var("RECAPTCHA_MIN_SCORE") {
            Some(raw) => Some(raw.parse::<f64>().map_err(|_| ConfigError::InvalidNumber {
                key: "RECAPTCHA_MIN_SCORE",
                value: raw,
            })?),
            None => None,
        };
        let timeout = parse_var("RECAPTCHA_TIMEOUT_SECS", DEFAULT_VERIFY_TIMEOUT_SECS)?;

        Ok(Self {
            secret_key: non_empty_var("RECAPTCHA_SECRET_KEY"),
            site_key: non_empty_var("RECAPTCHA_SITE_KEY"),
            verify_url: non_empty_var("RECAPTCHA_VERIFY_URL")
                .unwrap_or_else(|| DEFAULT_VERIFY_URL.to_string()),
            min_score,
            timeout: Duration::from_secs(timeout),
        })
    }
}

impl fmt::Debug for RecaptchaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecaptchaConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("site_key", &self.site_key)
            .field("verify_url", &self.verify_url)
            .field("min_score", &self.min_score)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Fixed-window limits applied per client identity.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_requests = parse_var("RATE_LIMIT_MAX_REQUESTS", DEFAULT_RATE_LIMIT_MAX)?;
        let window = parse_var("RATE_LIMIT_WINDOW_SECS", DEFAULT_RATE_LIMIT_WINDOW_SECS)?;
        Ok(Self {
            max_requests,
            window: Duration::from_secs(window),
        })
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX,
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        None => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be numeric (found '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
