use axum::http::HeaderValue;
use clap::{Parser, ValueEnum};
use paylink_checkout::{
    sms, stripe, CheckoutLinksConfig, SenderIdentity, StripeConfig, TwilioConfig,
    WooCommerceConfig,
};
use paylink_core::ConfigError;
use paylink_shortener::policy::DEFAULT_ALLOWED_HOSTS;
use paylink_store::UpstashConfig;
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use url::Url;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
pub const APP_BASE_URL_ENV: &str = "APP_BASE_URL";
pub const SHOP_NAME_ENV: &str = "SHOP_NAME";
pub const CURRENCY_ENV: &str = "CHECKOUT_CURRENCY";
pub const STRIPE_SECRET_KEY_ENV: &str = "STRIPE_SECRET_KEY";
pub const STRIPE_WEBHOOK_SECRET_ENV: &str = "STRIPE_WEBHOOK_SECRET";
pub const STRIPE_API_BASE_ENV: &str = "STRIPE_API_BASE";
pub const TWILIO_ACCOUNT_SID_ENV: &str = "TWILIO_ACCOUNT_SID";
pub const TWILIO_AUTH_TOKEN_ENV: &str = "TWILIO_AUTH_TOKEN";
pub const TWILIO_MESSAGING_SERVICE_SID_ENV: &str = "TWILIO_MESSAGING_SERVICE_SID";
pub const TWILIO_FROM_ENV: &str = "TWILIO_FROM";
pub const TWILIO_API_BASE_ENV: &str = "TWILIO_API_BASE";
pub const WC_BASE_URL_ENV: &str = "WC_BASE_URL";
pub const WC_CONSUMER_KEY_ENV: &str = "WC_CONSUMER_KEY";
pub const WC_CONSUMER_SECRET_ENV: &str = "WC_CONSUMER_SECRET";
pub const REDIS_URL_ENV: &str = "REDIS_URL";
pub const UPSTASH_REST_URL_ENV: &str = "UPSTASH_REDIS_REST_URL";
pub const UPSTASH_REST_TOKEN_ENV: &str = "UPSTASH_REDIS_REST_TOKEN";
pub const SHORT_LINK_HOSTS_ENV: &str = "SHORT_LINK_ALLOWED_HOSTS";
pub const API_KEY_ENV: &str = "API_KEY";
pub const CORS_ORIGINS_ENV: &str = "CORS_ORIGINS";
pub const HTTP_TIMEOUT_ENV: &str = "HTTP_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CURRENCY: &str = "jpy";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "pretty")]
    Pretty,
    #[value(name = "json")]
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "paylink-gateway", version)]
pub struct Cli {
    #[arg(long, env = HOST_ENV, default_value = DEFAULT_HOST)]
    pub host: IpAddr,

    #[arg(long, env = PORT_ENV, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Public origin of this service; short links are `{public-base-url}/p/{token}`.
    #[arg(long, env = PUBLIC_BASE_URL_ENV)]
    pub public_base_url: Option<String>,

    /// Storefront origin hosting the payment success and cancel pages.
    #[arg(long, env = APP_BASE_URL_ENV)]
    pub app_base_url: Option<String>,

    #[arg(long, env = SHOP_NAME_ENV, default_value = "")]
    pub shop_name: String,

    #[arg(long, env = CURRENCY_ENV, default_value = DEFAULT_CURRENCY)]
    pub currency: String,

    #[arg(long, env = STRIPE_SECRET_KEY_ENV, hide_env_values = true)]
    pub stripe_secret_key: Option<String>,

    #[arg(long, env = STRIPE_WEBHOOK_SECRET_ENV, hide_env_values = true)]
    pub stripe_webhook_secret: Option<String>,

    #[arg(long, env = STRIPE_API_BASE_ENV, default_value = stripe::DEFAULT_API_BASE)]
    pub stripe_api_base: String,

    #[arg(long, env = TWILIO_ACCOUNT_SID_ENV)]
    pub twilio_account_sid: Option<String>,

    #[arg(long, env = TWILIO_AUTH_TOKEN_ENV, hide_env_values = true)]
    pub twilio_auth_token: Option<String>,

    #[arg(long, env = TWILIO_MESSAGING_SERVICE_SID_ENV)]
    pub twilio_messaging_service_sid: Option<String>,

    #[arg(long, env = TWILIO_FROM_ENV)]
    pub twilio_from: Option<String>,

    #[arg(long, env = TWILIO_API_BASE_ENV, default_value = sms::DEFAULT_API_BASE)]
    pub twilio_api_base: String,

    #[arg(long, env = WC_BASE_URL_ENV)]
    pub wc_base_url: Option<String>,

    #[arg(long, env = WC_CONSUMER_KEY_ENV)]
    pub wc_consumer_key: Option<String>,

    #[arg(long, env = WC_CONSUMER_SECRET_ENV, hide_env_values = true)]
    pub wc_consumer_secret: Option<String>,

    /// Redis for short links; takes precedence over Upstash.
    #[arg(long, env = REDIS_URL_ENV, hide_env_values = true)]
    pub redis_url: Option<String>,

    #[arg(long, env = UPSTASH_REST_URL_ENV)]
    pub upstash_rest_url: Option<String>,

    #[arg(long, env = UPSTASH_REST_TOKEN_ENV, hide_env_values = true)]
    pub upstash_rest_token: Option<String>,

    /// Hosts short links may redirect to.
    #[arg(long, env = SHORT_LINK_HOSTS_ENV, value_delimiter = ',')]
    pub short_link_allowed_hosts: Vec<String>,

    /// When set, order routes require a matching `x-api-key` header.
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = CORS_ORIGINS_ENV, value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    #[arg(long, env = HTTP_TIMEOUT_ENV, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub http_timeout_secs: u64,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Backend for short links.
#[derive(Debug, Clone)]
pub enum StoreSettings {
    Redis { url: String },
    Upstash(UpstashConfig),
    /// Short links are off; checkout URLs are handed out unshortened.
    Disabled,
}

impl Display for StoreSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreSettings::Redis { .. } => write!(f, "redis"),
            StoreSettings::Upstash(_) => write!(f, "upstash"),
            StoreSettings::Disabled => write!(f, "disabled"),
        }
    }
}

/// Validated process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen_addr: SocketAddr,
    pub links: CheckoutLinksConfig,
    pub stripe: StripeConfig,
    pub webhook_secret: Option<String>,
    pub twilio: Option<TwilioConfig>,
    pub woocommerce: Option<WooCommerceConfig>,
    pub store: StoreSettings,
    pub allowed_hosts: Vec<String>,
    pub api_key: Option<String>,
    pub cors_origins: Vec<HeaderValue>,
    pub http_timeout: Duration,
    pub log_format: LogFormat,
}

/// Blank values count as unset.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    present(value).ok_or(ConfigError::Missing(name))
}

fn http_url(value: String, name: &'static str) -> Result<String, ConfigError> {
    let url = Url::parse(&value).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("expected an http(s) URL, got '{value}'"),
        });
    }
    Ok(value.trim_end_matches('/').to_string())
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let listen_addr = SocketAddr::new(cli.host, cli.port);

        let stripe = StripeConfig::builder()
            .secret_key(required(cli.stripe_secret_key, STRIPE_SECRET_KEY_ENV)?)
            .api_base(http_url(cli.stripe_api_base, STRIPE_API_BASE_ENV)?)
            .build();

        let app_base_url = required(cli.app_base_url, APP_BASE_URL_ENV)?;
        let app_base_url = http_url(app_base_url, APP_BASE_URL_ENV)?;
        let public_base_url = match present(cli.public_base_url) {
            Some(url) => http_url(url, PUBLIC_BASE_URL_ENV)?,
            None => format!("http://localhost:{}", cli.port),
        };
        let currency = cli.currency.trim().to_ascii_lowercase();
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(ConfigError::Invalid {
                name: CURRENCY_ENV,
                reason: format!("expected a three-letter ISO code, got '{}'", cli.currency),
            });
        }
        let links = CheckoutLinksConfig::builder()
            .app_base_url(app_base_url)
            .public_base_url(public_base_url)
            .currency(currency)
            .shop_name(cli.shop_name.trim())
            .build();

        let twilio = match present(cli.twilio_account_sid) {
            Some(account_sid) => {
                let auth_token = required(cli.twilio_auth_token, TWILIO_AUTH_TOKEN_ENV)?;
                let sender = SenderIdentity::resolve(
                    present(cli.twilio_messaging_service_sid),
                    present(cli.twilio_from),
                )
                .ok_or(ConfigError::Missing("TWILIO_MESSAGING_SERVICE_SID or TWILIO_FROM"))?;
                Some(
                    TwilioConfig::builder()
                        .account_sid(account_sid)
                        .auth_token(auth_token)
                        .sender(sender)
                        .api_base(http_url(cli.twilio_api_base, TWILIO_API_BASE_ENV)?)
                        .build(),
                )
            }
            None => None,
        };

        let woocommerce = match present(cli.wc_base_url) {
            Some(base_url) => Some(
                WooCommerceConfig::builder()
                    .base_url(http_url(base_url, WC_BASE_URL_ENV)?)
                    .consumer_key(required(cli.wc_consumer_key, WC_CONSUMER_KEY_ENV)?)
                    .consumer_secret(required(cli.wc_consumer_secret, WC_CONSUMER_SECRET_ENV)?)
                    .build(),
            ),
            None => None,
        };

        let store = match (present(cli.redis_url), present(cli.upstash_rest_url)) {
            (Some(url), _) => StoreSettings::Redis { url },
            (None, Some(rest_url)) => StoreSettings::Upstash(
                UpstashConfig::builder()
                    .rest_url(http_url(rest_url, UPSTASH_REST_URL_ENV)?)
                    .rest_token(required(cli.upstash_rest_token, UPSTASH_REST_TOKEN_ENV)?)
                    .build(),
            ),
            (None, None) => StoreSettings::Disabled,
        };

        let allowed_hosts = {
            let hosts = cli
                .short_link_allowed_hosts
                .into_iter()
                .filter_map(|h| present(Some(h)))
                .collect::<Vec<_>>();
            if hosts.is_empty() {
                DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect()
            } else {
                hosts
            }
        };

        let cors_origins = cli
            .cors_origins
            .into_iter()
            .filter_map(|o| present(Some(o)))
            .map(|origin| {
                HeaderValue::from_str(&origin).map_err(|e| ConfigError::Invalid {
                    name: CORS_ORIGINS_ENV,
                    reason: format!("'{origin}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if cli.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: HTTP_TIMEOUT_ENV,
                reason: "must be at least one second".to_string(),
            });
        }

        Ok(Self {
            listen_addr,
            links,
            stripe,
            webhook_secret: present(cli.stripe_webhook_secret),
            twilio,
            woocommerce,
            store,
            allowed_hosts,
            api_key: present(cli.api_key),
            cors_origins,
            http_timeout: Duration::from_secs(cli.http_timeout_secs),
            log_format: cli.log_format,
        })
    }

    pub fn sms_enabled(&self) -> bool {
        self.twilio.is_some()
    }

    /// The webhook route needs both the signing secret and the order API.
    pub fn webhooks_enabled(&self) -> bool {
        self.webhook_secret.is_some() && self.woocommerce.is_some()
    }
}
