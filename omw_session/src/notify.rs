use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveTime, TimeDelta};
use omw_lib::{
    profile::Profile,
    sms::{ErrorBody, SendSmsRequest, SendSmsResponse},
};

use crate::{session::TrackingSession, DeliveryError, NotifyError, PreconditionError, ValidationError};

/// A message ready to go out. Built at send time and not kept around.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub recipient_phone: String,
    pub body: String,
    pub link: String,
    pub sender: Profile,
}

/// Delivers an SMS and returns the provider's message id.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn deliver(&self, request: &NotificationRequest) -> Result<String, DeliveryError>;
}

/// Opens a URI with the device, e.g. the native messaging app for `sms:` URIs.
pub trait IntentLauncher: Send + Sync {
    fn launch(&self, uri: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Delivered { message_id: String },
    /// The gateway failed and the message was handed to the device instead.
    FallbackLaunched { reason: DeliveryError },
    Failed { reason: DeliveryError },
}

impl SendOutcome {
    /// Text for the confirmation or error banner. The fallback has no feedback.
    pub fn banner(&self) -> Option<String> {
        match self {
            SendOutcome::Delivered { .. } => Some("Message sent successfully!".into()),
            SendOutcome::FallbackLaunched { .. } => None,
            SendOutcome::Failed { reason } => Some(reason.to_string()),
        }
    }
}

pub fn arrival_time(now: NaiveTime, eta_minutes: u32) -> NaiveTime {
    now + TimeDelta::minutes(eta_minutes as i64)
}

/// `2:12 PM` style clock time.
pub fn format_clock(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

pub fn compose_body(profile: &Profile, eta_minutes: u32, arrival: NaiveTime, link: &str) -> String {
    let name = match profile.profession() {
        Some(profession) => format!("{} {}", profession, profile.first_name.trim()),
        None => profile.first_name.trim().to_string(),
    };

    format!(
        "{name} ETA in {eta_minutes} min at {} click to see map {link}",
        format_clock(arrival)
    )
}

pub fn sms_intent_uri(phone: &str, body: &str) -> String {
    format!("sms:{}?body={}", phone, urlencoding::encode(body))
}

/// Builds the notification for the current session using the local wall clock.
pub fn compose(session: &TrackingSession, profile: &Profile, recipient_phone: &str) -> Result<NotificationRequest, NotifyError> {
    compose_at(session, profile, recipient_phone, Local::now().time())
}

pub fn compose_at(
    session: &TrackingSession,
    profile: &Profile,
    recipient_phone: &str,
    now: NaiveTime,
) -> Result<NotificationRequest, NotifyError> {
    if !profile.has_first_name() {
        return Err(ValidationError::MissingFirstName.into());
    }

    let recipient_phone = recipient_phone.trim();
    if recipient_phone.is_empty() {
        return Err(ValidationError::MissingPhoneNumber.into());
    }

    let active = session.active().ok_or(PreconditionError::NotTracking)?;
    let eta_minutes = active
        .route_metrics
        .as_ref()
        .map(|metrics| metrics.eta_minutes)
        .ok_or(PreconditionError::NoEta)?;

    let arrival = arrival_time(now, eta_minutes);

    Ok(NotificationRequest {
        recipient_phone: recipient_phone.to_string(),
        body: compose_body(profile, eta_minutes, arrival, &active.share_link),
        link: active.share_link.clone(),
        sender: profile.clone(),
    })
}

/// Sends notifications through a gateway with the device intent as fallback.
#[derive(Clone)]
pub struct Notifier {
    gateway: Arc<dyn SmsGateway>,
    launcher: Option<Arc<dyn IntentLauncher>>,
}

impl Notifier {
    pub fn new(gateway: Arc<dyn SmsGateway>, launcher: Option<Arc<dyn IntentLauncher>>) -> Self {
        Self { gateway, launcher }
    }

    /// Never fails. Every path ends in an outcome the caller can show.
    pub async fn send(&self, request: &NotificationRequest) -> SendOutcome {
        let reason = match self.gateway.deliver(request).await {
            Ok(message_id) => {
                tracing::info!("Message {} delivered to {}", message_id, request.recipient_phone);
                return SendOutcome::Delivered { message_id };
            }
            Err(err) => err,
        };

        tracing::warn!("{}, falling back to device messaging", reason);

        match &self.launcher {
            Some(launcher) => {
                launcher.launch(&sms_intent_uri(&request.recipient_phone, &request.body));
                SendOutcome::FallbackLaunched { reason }
            }
            None => {
                tracing::error!("No device messaging available");
                SendOutcome::Failed { reason }
            }
        }
    }
}

/// Gateway that relays through the `/api/send-sms` endpoint.
#[derive(Clone)]
pub struct HttpRelayGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRelayGateway {
    /// `endpoint` is the full URL of the send-sms route.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SmsGateway for HttpRelayGateway {
    async fn deliver(&self, request: &NotificationRequest) -> Result<String, DeliveryError> {
        let payload = SendSmsRequest {
            phone_number: request.recipient_phone.clone(),
            first_name: request.sender.first_name.clone(),
            profession: request.sender.profession().map(str::to_string),
            tracking_link: request.link.clone(),
            message: Some(request.body.clone()),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|err| DeliveryError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(ErrorBody { error, details: Some(details) }) => format!("{error}: {details}"),
                Ok(ErrorBody { error, details: None }) => error,
                Err(_) => format!("relay returned {status}"),
            };
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: SendSmsResponse = response
            .json()
            .await
            .map_err(|err| DeliveryError::InvalidResponse(err.to_string()))?;

        if !body.success {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message: "relay reported failure".into(),
            });
        }

        Ok(body.message_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use omw_lib::{
        position::{LatLng, PositionSample},
        route::RouteMetrics,
    };
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn two_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(14, 0, 0).unwrap()
    }

    fn session_with_eta(profile: &Profile, eta_minutes: u32) -> TrackingSession {
        let mut session = TrackingSession::new("https://omw.app");
        session.start(profile, "1 Main St").unwrap();
        let request = session
            .on_position_update(&PositionSample::now(LatLng::new(1., 1.)))
            .unwrap();
        let metrics = RouteMetrics {
            distance_miles: 4.2,
            eta_minutes,
            path: vec![],
        };
        session.on_route_resolved(&request, Ok(metrics)).unwrap();
        session
    }

    struct FailingGateway;

    #[async_trait]
    impl SmsGateway for FailingGateway {
        async fn deliver(&self, _request: &NotificationRequest) -> Result<String, DeliveryError> {
            Err(DeliveryError::Request("connection refused".into()))
        }
    }

    struct OkGateway;

    #[async_trait]
    impl SmsGateway for OkGateway {
        async fn deliver(&self, _request: &NotificationRequest) -> Result<String, DeliveryError> {
            Ok("SM123".into())
        }
    }

    #[derive(Default)]
    struct RecordingLauncher {
        launched: Mutex<Vec<String>>,
    }

    impl IntentLauncher for RecordingLauncher {
        fn launch(&self, uri: &str) {
            self.launched.lock().unwrap().push(uri.to_string());
        }
    }

    #[test]
    fn body_with_profession() {
        let profile = Profile::new("Sam", Some("Electrician".into()));
        let session = session_with_eta(&profile, 12);

        let request = compose_at(&session, &profile, "+15550100", two_pm()).unwrap();
        let link = session.share_link().unwrap();

        assert!(request.body.contains("Electrician Sam ETA in 12 min at 2:12 PM"), "{}", request.body);
        assert!(request.body.ends_with(&format!("click to see map {link}")));
        assert_eq!(request.link, link);
        assert_eq!(request.recipient_phone, "+15550100");
    }

    #[test]
    fn body_without_profession_has_no_stray_separator() {
        let profile = Profile::new("Sam", None);
        let session = session_with_eta(&profile, 12);

        let request = compose_at(&session, &profile, "+15550100", two_pm()).unwrap();
        let link = session.share_link().unwrap();

        assert_eq!(request.body, format!("Sam ETA in 12 min at 2:12 PM click to see map {link}"));
    }

    #[test]
    fn arrival_wraps_past_midnight() {
        let late = NaiveTime::from_hms_opt(23, 50, 0).unwrap();
        assert_eq!(format_clock(arrival_time(late, 20)), "12:10 AM");
        assert_eq!(format_clock(arrival_time(two_pm(), 0)), "2:00 PM");
    }

    #[test]
    fn compose_needs_an_eta() {
        let profile = Profile::new("Sam", None);
        let mut session = TrackingSession::new("https://omw.app");

        assert_eq!(
            compose_at(&session, &profile, "+15550100", two_pm()),
            Err(NotifyError::Precondition(PreconditionError::NotTracking))
        );

        session.start(&profile, "1 Main St").unwrap();
        assert_eq!(
            compose_at(&session, &profile, "+15550100", two_pm()),
            Err(NotifyError::Precondition(PreconditionError::NoEta))
        );
        assert_eq!(
            compose_at(&session, &profile, " ", two_pm()),
            Err(NotifyError::Validation(ValidationError::MissingPhoneNumber))
        );
    }

    #[test]
    fn compose_rejects_blank_first_name() {
        let session = session_with_eta(&Profile::new("Sam", None), 12);
        let cleared = Profile::new("  ", Some("Electrician".into()));

        assert_eq!(
            compose_at(&session, &cleared, "+15550100", two_pm()),
            Err(NotifyError::Validation(ValidationError::MissingFirstName))
        );
    }

    #[test]
    fn intent_uri_encodes_body() {
        assert_eq!(
            sms_intent_uri("+15550100", "Sam ETA in 5 min at 2:05 PM"),
            "sms:+15550100?body=Sam%20ETA%20in%205%20min%20at%202%3A05%20PM"
        );
    }

    #[tokio::test]
    async fn delivery_error_launches_fallback_once() {
        let profile = Profile::new("Sam", Some("Electrician".into()));
        let session = session_with_eta(&profile, 12);
        let request = compose_at(&session, &profile, "+15550100", two_pm()).unwrap();

        let launcher = Arc::new(RecordingLauncher::default());
        let notifier = Notifier::new(Arc::new(FailingGateway), Some(launcher.clone()));

        let outcome = notifier.send(&request).await;
        assert!(matches!(outcome, SendOutcome::FallbackLaunched { .. }));
        assert_eq!(outcome.banner(), None);

        let launched = launcher.launched.lock().unwrap();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0], sms_intent_uri("+15550100", &request.body));
    }

    #[tokio::test]
    async fn delivered_message_skips_fallback() {
        let profile = Profile::new("Sam", None);
        let session = session_with_eta(&profile, 3);
        let request = compose_at(&session, &profile, "+15550100", two_pm()).unwrap();

        let launcher = Arc::new(RecordingLauncher::default());
        let notifier = Notifier::new(Arc::new(OkGateway), Some(launcher.clone()));

        let outcome = notifier.send(&request).await;
        assert_eq!(outcome, SendOutcome::Delivered { message_id: "SM123".into() });
        assert!(outcome.banner().is_some());
        assert!(launcher.launched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_launcher_surfaces_error() {
        let profile = Profile::new("Sam", None);
        let session = session_with_eta(&profile, 3);
        let request = compose_at(&session, &profile, "+15550100", two_pm()).unwrap();

        let outcome = Notifier::new(Arc::new(FailingGateway), None).send(&request).await;
        assert_eq!(
            outcome.banner().as_deref(),
            Some("Failed to send message: connection refused")
        );
    }

    #[tokio::test]
    async fn relay_posts_composed_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/send-sms"))
            .and(body_partial_json(serde_json::json!({
                "phoneNumber": "+15550100",
                "firstName": "Sam",
                "profession": "Electrician",
                "message": "hello",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": true, "messageId": "SM42"})),
            )
            .mount(&server)
            .await;

        let gateway = HttpRelayGateway::new(format!("{}/api/send-sms", server.uri()));
        let request = NotificationRequest {
            recipient_phone: "+15550100".into(),
            body: "hello".into(),
            link: "https://omw.app/track/abc".into(),
            sender: Profile::new("Sam", Some("Electrician".into())),
        };

        assert_eq!(gateway.deliver(&request).await, Ok("SM42".into()));
    }

    #[tokio::test]
    async fn relay_error_body_becomes_delivery_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": "Failed to send SMS",
                "details": "invalid number",
            })))
            .mount(&server)
            .await;

        let gateway = HttpRelayGateway::new(format!("{}/api/send-sms", server.uri()));
        let request = NotificationRequest {
            recipient_phone: "123".into(),
            body: "hello".into(),
            link: "https://omw.app/track/abc".into(),
            sender: Profile::new("Sam", None),
        };

        assert_eq!(
            gateway.deliver(&request).await,
            Err(DeliveryError::Rejected {
                status: 500,
                message: "Failed to send SMS: invalid number".into(),
            })
        );
    }
}
