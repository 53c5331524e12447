use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{require_api_key, API_KEY_HEADER};
use crate::handlers::{
    checkout_status_handler, checkout_url_handler, health_handler, redirect_handler,
    send_payment_handler, stripe_webhook_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    /// Builds the router. Optional routes are mounted only when their
    /// collaborators are configured.
    pub fn router(state: AppState, cors_origins: &[HeaderValue]) -> Router {
        let mut orders =
            Router::new().route("/{order_id}/checkout-url", post(checkout_url_handler));
        if state.links().sms_enabled() {
            orders = orders.route("/{order_id}/send-payment", post(send_payment_handler));
        }
        let orders = orders.route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/api/checkout-status", get(checkout_status_handler))
            .nest("/api/orders", orders)
            .route("/p/{token}", get(redirect_handler));
        if state.webhooks().is_some() {
            router = router.route("/webhooks/stripe", post(stripe_webhook_handler));
        }

        if !cors_origins.is_empty() {
            router = router.layer(cors_layer(cors_origins));
        }

        router.layer(TraceLayer::new_for_http()).with_state(state)
    }
}

fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins.iter().cloned()))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)])
}
