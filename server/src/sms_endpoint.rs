use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use omw_lib::{
    profile::Profile,
    sms::{ErrorBody, SendSmsRequest, SendSmsResponse},
};
use omw_session::notify::NotificationRequest;
use tower_http::cors::{Any, CorsLayer};

use crate::server_state::ServerState;

pub const SEND_SMS_PATH: &str = "/api/send-sms";

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(
            SEND_SMS_PATH,
            post(send_sms).options(preflight).fallback(method_not_allowed),
        )
        .with_state(state)
        .layer(cors())
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Body used when the client did not compose one.
pub fn default_message(first_name: &str, profession: Option<&str>, tracking_link: &str) -> String {
    let profession_text = profession.map(|p| format!(" ({p})")).unwrap_or_default();
    format!("Hi! {first_name}{profession_text} is on the way. Track my location: {tracking_link}")
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::new("Method not allowed", None)),
    )
        .into_response()
}

fn send_failed(details: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("Failed to send SMS", Some(details.into()))),
    )
        .into_response()
}

async fn send_sms(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<SendSmsRequest>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            tracing::warn!("Rejected send-sms body: {}", rejection.body_text());
            return send_failed(rejection.body_text());
        }
    };

    let phone_number = payload.phone_number.trim();
    if phone_number.is_empty() {
        return send_failed("phoneNumber is required");
    }

    let sender = Profile::new(payload.first_name.trim(), payload.profession.clone());
    let body = payload
        .message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| default_message(&sender.first_name, sender.profession(), &payload.tracking_link));

    let request = NotificationRequest {
        recipient_phone: phone_number.to_string(),
        body,
        link: payload.tracking_link.clone(),
        sender,
    };

    match state.gateway.deliver(&request).await {
        Ok(message_id) => {
            tracing::info!("SMS {} sent to {}", message_id, request.recipient_phone);
            (StatusCode::OK, Json(SendSmsResponse::sent(message_id))).into_response()
        }
        Err(err) => {
            tracing::error!("SMS delivery failed: {}", err);
            send_failed(err.detail())
        }
    }
}
