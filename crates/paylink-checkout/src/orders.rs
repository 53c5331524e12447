use crate::http::{read_json, transport_error, truncate_body};
use async_trait::async_trait;
use paylink_core::{ConfigError, OrderId, Provider, Result, UpstreamError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use typed_builder::TypedBuilder;
use url::Url;

pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_COMPLETED: &str = "completed";

/// An order as returned by the order-management API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
    pub id: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl Order {
    /// Payment has already been recorded for this order.
    pub fn is_settled(&self) -> bool {
        matches!(self.status.as_str(), STATUS_PROCESSING | STATUS_COMPLETED)
    }
}

#[async_trait]
pub trait OrderApi: Send + Sync + 'static {
    async fn get_order(&self, id: OrderId) -> Result<Order>;

    async fn update_order_status(&self, id: OrderId, status: &str) -> Result<Order>;
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct WooCommerceConfig {
    /// Shop root, e.g. `https://shop.example.com`.
    #[builder(setter(into))]
    pub base_url: String,
    #[builder(setter(into))]
    pub consumer_key: String,
    #[builder(setter(into))]
    pub consumer_secret: String,
}

/// WooCommerce REST v3 client.
#[derive(Debug, Clone)]
pub struct WooCommerceClient {
    http: reqwest::Client,
    config: WooCommerceConfig,
}

#[derive(Serialize)]
struct StatusUpdate<'a> {
    status: &'a str,
}

impl WooCommerceClient {
    pub fn new(http: reqwest::Client, config: WooCommerceConfig) -> Self {
        Self { http, config }
    }

    fn order_url(&self, id: OrderId) -> Result<Url> {
        let raw = format!(
            "{}/wp-json/wc/v3/orders/{id}",
            self.config.base_url.trim_end_matches('/')
        );
        let mut url = Url::parse(&raw).map_err(|e| ConfigError::Invalid {
            name: "WC_BASE_URL",
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("consumer_key", &self.config.consumer_key)
            .append_pair("consumer_secret", &self.config.consumer_secret);
        Ok(url)
    }

    async fn into_order(
        method: &'static str,
        id: OrderId,
        response: reqwest::Response,
    ) -> Result<Order> {
        let status = response.status();
        if status.is_success() {
            return Ok(read_json(Provider::WooCommerce, response).await?);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Provider::WooCommerce, e))?;
        warn!(order_id = %id, method, status = status.as_u16(), "order api request failed");
        Err(UpstreamError::Provider {
            provider: Provider::WooCommerce,
            status: Some(status.as_u16()),
            code: None,
            message: format!(
                "{method} order {id} failed: {} {}",
                status.as_u16(),
                truncate_body(&body)
            ),
        }
        .into())
    }
}

#[async_trait]
impl OrderApi for WooCommerceClient {
    async fn get_order(&self, id: OrderId) -> Result<Order> {
        debug!(order_id = %id, "fetching order");
        let response = self
            .http
            .get(self.order_url(id)?)
            .send()
            .await
            .map_err(|e| transport_error(Provider::WooCommerce, e))?;
        Self::into_order("GET", id, response).await
    }

    async fn update_order_status(&self, id: OrderId, status: &str) -> Result<Order> {
        debug!(order_id = %id, status, "updating order status");
        let response = self
            .http
            .put(self.order_url(id)?)
            .json(&StatusUpdate { status })
            .send()
            .await
            .map_err(|e| transport_error(Provider::WooCommerce, e))?;
        Self::into_order("PUT", id, response).await
    }
}
