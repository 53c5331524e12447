use url::{Position, Url};

/// Hosts that serve Stripe-hosted checkout and payment-link pages.
pub const DEFAULT_ALLOWED_HOSTS: [&str; 3] =
    ["checkout.stripe.com", "buy.stripe.com", "pay.stripe.com"];

/// Allow-list for redirect targets.
///
/// `/p/{token}` is public and unauthenticated, so only HTTPS URLs on a trusted
/// payment host with a non-empty path may be stored. Anything else would turn
/// the service into an open redirector.
#[derive(Debug, Clone)]
pub struct TargetPolicy {
    allowed_hosts: Vec<String>,
}

impl TargetPolicy {
    pub fn new<I, S>(allowed_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    pub fn is_allowed(&self, target: &str) -> bool {
        let Ok(url) = Url::parse(target) else {
            return false;
        };

        if url.scheme() != "https" || url.port().is_some() {
            return false;
        }
        if !url.username().is_empty() || url.password().is_some() {
            return false;
        }
        // `Url` lowercases the host during parsing.
        let Some(host) = url.host_str() else {
            return false;
        };
        if !self.allowed_hosts.iter().any(|allowed| allowed == host) {
            return false;
        }

        // Something must follow the leading slash.
        url[Position::BeforePath..].len() > 1
    }
}

impl Default for TargetPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_HOSTS)
    }
}
