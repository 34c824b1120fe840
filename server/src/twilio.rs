use async_trait::async_trait;
use omw_session::{notify::{NotificationRequest, SmsGateway}, DeliveryError};
use serde::Deserialize;

use crate::config::TwilioConfig;

/// Sends SMS through the Twilio Messages API.
#[derive(Clone)]
pub struct TwilioGateway {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from: String,
    base_url: String,
}

#[derive(Deserialize)]
struct CreatedMessage {
    sid: String,
}

#[derive(Deserialize)]
struct TwilioError {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

impl TwilioGateway {
    pub fn new(config: &TwilioConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from: config.phone_number.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SmsGateway for TwilioGateway {
    async fn deliver(&self, request: &NotificationRequest) -> Result<String, DeliveryError> {
        let url = format!("{}/2010-04-01/Accounts/{}/Messages.json", self.base_url, self.account_sid);

        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", request.recipient_phone.as_str()),
                ("From", self.from.as_str()),
                ("Body", request.body.as_str()),
            ])
            .send()
            .await
            .map_err(|err| DeliveryError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<TwilioError>().await {
                Ok(TwilioError { message, code: Some(code) }) => format!("{message} (code {code})"),
                Ok(TwilioError { message, code: None }) => message,
                Err(_) => format!("Twilio returned {status}"),
            };
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreatedMessage = response
            .json()
            .await
            .map_err(|err| DeliveryError::InvalidResponse(err.to_string()))?;

        Ok(created.sid)
    }
}
