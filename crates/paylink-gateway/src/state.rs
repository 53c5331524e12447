use crate::config::Settings;
use paylink_checkout::{
    CheckoutLinks, OrderApi, PaymentProvider, SmsSender, StripeClient, TwilioClient,
    WebhookProcessor, WebhookVerifier, WooCommerceClient,
};
use paylink_core::LinkStore;
use paylink_shortener::{RandomTokenGenerator, ShortLinkService, TargetPolicy};
use std::sync::Arc;

/// Signature check plus order reconciliation for `/webhooks/stripe`.
#[derive(Clone)]
pub struct Webhooks {
    pub verifier: WebhookVerifier,
    pub processor: WebhookProcessor,
}

#[derive(Clone)]
pub struct AppState {
    links: CheckoutLinks,
    webhooks: Option<Webhooks>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(links: CheckoutLinks, webhooks: Option<Webhooks>, api_key: Option<String>) -> Self {
        Self {
            links,
            webhooks,
            api_key: api_key.map(Arc::from),
        }
    }

    /// Wires the provider clients described by `settings` onto one HTTP client.
    pub fn from_settings(
        settings: &Settings,
        http: reqwest::Client,
        store: Option<Arc<dyn LinkStore>>,
    ) -> Self {
        let shortener = ShortLinkService::with_generator(
            store,
            RandomTokenGenerator::default(),
            TargetPolicy::new(&settings.allowed_hosts),
        );
        let payments: Arc<dyn PaymentProvider> =
            Arc::new(StripeClient::new(http.clone(), settings.stripe.clone()));
        let sms = settings.twilio.clone().map(|config| {
            Arc::new(TwilioClient::new(http.clone(), config)) as Arc<dyn SmsSender>
        });
        let links = CheckoutLinks::new(payments, shortener, sms, settings.links.clone());

        let webhooks = match (&settings.webhook_secret, &settings.woocommerce) {
            (Some(secret), Some(woocommerce)) => {
                let orders: Arc<dyn OrderApi> =
                    Arc::new(WooCommerceClient::new(http.clone(), woocommerce.clone()));
                Some(Webhooks {
                    verifier: WebhookVerifier::new(secret.clone()),
                    processor: WebhookProcessor::new(orders),
                })
            }
            _ => None,
        };

        Self::new(links, webhooks, settings.api_key.clone())
    }

    pub fn links(&self) -> &CheckoutLinks {
        &self.links
    }

    pub fn webhooks(&self) -> Option<&Webhooks> {
        self.webhooks.as_ref()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}
