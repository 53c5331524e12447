mod checkout;
mod health;
mod orders;
mod redirect;
mod webhook;

pub use checkout::checkout_status_handler;
pub use health::health_handler;
pub use orders::{checkout_url_handler, send_payment_handler};
pub use redirect::redirect_handler;
pub use webhook::stripe_webhook_handler;
