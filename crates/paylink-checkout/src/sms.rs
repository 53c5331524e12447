use crate::http::{read_json, transport_error, truncate_body};
use async_trait::async_trait;
use paylink_core::{PhoneNumber, Provider, Result, UpstreamError};
use serde::Deserialize;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_API_BASE: &str = "https://api.twilio.com";

/// Twilio error code for messages to unverified numbers from trial accounts.
pub const UNVERIFIED_RECIPIENT_CODE: u32 = 21608;

/// Who a message is sent as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderIdentity {
    /// A messaging service SID (`MG...`); takes precedence when configured.
    MessagingService(String),
    /// A plain sender number.
    From(String),
}

impl SenderIdentity {
    /// Picks the messaging service when present, else the sender number.
    pub fn resolve(messaging_service_sid: Option<String>, from: Option<String>) -> Option<Self> {
        messaging_service_sid
            .filter(|sid| !sid.is_empty())
            .map(SenderIdentity::MessagingService)
            .or_else(|| from.filter(|f| !f.is_empty()).map(SenderIdentity::From))
    }

    fn form_field(&self) -> (&'static str, &str) {
        match self {
            SenderIdentity::MessagingService(sid) => ("MessagingServiceSid", sid),
            SenderIdentity::From(number) => ("From", number),
        }
    }
}

/// Acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SmsReceipt {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait SmsSender: Send + Sync + 'static {
    async fn send(&self, to: &PhoneNumber, body: &str) -> Result<SmsReceipt>;
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct TwilioConfig {
    #[builder(setter(into))]
    pub account_sid: String,
    #[builder(setter(into))]
    pub auth_token: String,
    pub sender: SenderIdentity,
    #[builder(default = DEFAULT_API_BASE.to_string(), setter(into))]
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct TwilioClient {
    http: reqwest::Client,
    config: TwilioConfig,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

impl TwilioClient {
    pub fn new(http: reqwest::Client, config: TwilioConfig) -> Self {
        Self { http, config }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioClient {
    async fn send(&self, to: &PhoneNumber, body: &str) -> Result<SmsReceipt> {
        let sender = self.config.sender.form_field();
        let form = [("To", to.as_str()), ("Body", body), sender];

        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(Provider::Twilio, e))?;

        let status = response.status();
        if status.is_success() {
            let receipt: SmsReceipt = read_json(Provider::Twilio, response).await?;
            info!(message_sid = %receipt.sid, "sms accepted");
            return Ok(receipt);
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(Provider::Twilio, e))?;
        let parsed = serde_json::from_str::<TwilioErrorBody>(&text).ok();
        let code = parsed.as_ref().and_then(|b| b.code);

        if code == Some(UNVERIFIED_RECIPIENT_CODE) {
            warn!(to = %to, "sms recipient is not verified for this account");
            return Err(UpstreamError::UnverifiedRecipient {
                phone: to.to_string(),
            }
            .into());
        }

        warn!(status = status.as_u16(), code = ?code, "twilio request failed");
        Err(UpstreamError::Provider {
            provider: Provider::Twilio,
            status: Some(status.as_u16()),
            code: code.map(|c| c.to_string()),
            message: parsed
                .and_then(|b| b.message)
                .unwrap_or_else(|| truncate_body(&text)),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use paylink_core::Error;
    use serde_json::json;

    fn client(server: &MockServer, sender: SenderIdentity) -> TwilioClient {
        let config = TwilioConfig::builder()
            .account_sid("AC123")
            .auth_token("secret")
            .sender(sender)
            .api_base(server.base_url())
            .build();
        TwilioClient::new(reqwest::Client::new(), config)
    }

    fn phone() -> PhoneNumber {
        "+819012345678".parse().unwrap()
    }

    #[test]
    fn messaging_service_takes_precedence() {
        assert_eq!(
            SenderIdentity::resolve(Some("MG1".into()), Some("+15550001111".into())),
            Some(SenderIdentity::MessagingService("MG1".into()))
        );
        assert_eq!(
            SenderIdentity::resolve(None, Some("+15550001111".into())),
            Some(SenderIdentity::From("+15550001111".into()))
        );
        assert_eq!(SenderIdentity::resolve(Some(String::new()), None), None);
    }

    #[tokio::test]
    async fn send_posts_form_with_messaging_service() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/2010-04-01/Accounts/AC123/Messages.json")
                    .header_exists("authorization")
                    .form_urlencoded_tuple("To", "+819012345678")
                    .form_urlencoded_tuple("Body", "hello")
                    .form_urlencoded_tuple("MessagingServiceSid", "MG1");
                then.status(201)
                    .json_body(json!({ "sid": "SM1", "status": "queued" }));
            })
            .await;

        let receipt = client(&server, SenderIdentity::MessagingService("MG1".into()))
            .send(&phone(), "hello")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(receipt.sid, "SM1");
        assert_eq!(receipt.status.as_deref(), Some("queued"));
    }

    #[tokio::test]
    async fn send_uses_from_number_without_messaging_service() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/2010-04-01/Accounts/AC123/Messages.json")
                    .form_urlencoded_tuple("From", "+15550001111");
                then.status(201).json_body(json!({ "sid": "SM2" }));
            })
            .await;

        client(&server, SenderIdentity::From("+15550001111".into()))
            .send(&phone(), "hello")
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unverified_recipient_is_distinct() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(400).json_body(json!({
                    "code": 21608,
                    "message": "The number is unverified. Trial accounts cannot send messages to unverified numbers",
                    "status": 400
                }));
            })
            .await;

        let err = client(&server, SenderIdentity::From("+15550001111".into()))
            .send(&phone(), "hello")
            .await
            .unwrap_err();

        assert_eq!(err.code(), "SMS_RECIPIENT_UNVERIFIED");
        assert!(matches!(
            err,
            Error::Upstream(UpstreamError::UnverifiedRecipient { ref phone })
                if phone == "+819012345678"
        ));
    }

    #[tokio::test]
    async fn other_errors_keep_code_and_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(401).json_body(json!({
                    "code": 20003,
                    "message": "Authenticate",
                    "status": 401
                }));
            })
            .await;

        let err = client(&server, SenderIdentity::From("+15550001111".into()))
            .send(&phone(), "hello")
            .await
            .unwrap_err();

        assert_eq!(err.code(), "SMS_PROVIDER_ERROR");
        match err {
            Error::Upstream(UpstreamError::Provider {
                status, code, message, ..
            }) => {
                assert_eq!(status, Some(401));
                assert_eq!(code.as_deref(), Some("20003"));
                assert_eq!(message, "Authenticate");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
