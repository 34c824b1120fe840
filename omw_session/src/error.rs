use thiserror::Error;

/// Missing user input. Blocks the action that needed it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter your first name")]
    MissingFirstName,
    #[error("Please enter a destination")]
    MissingDestination,
    #[error("Please enter a phone number")]
    MissingPhoneNumber,
}

/// Device or geolocation failure. Tracking keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Unable to get location: permission denied")]
    PermissionDenied,
    #[error("Unable to get location: position unavailable")]
    PositionUnavailable,
    #[error("Unable to get location: timed out")]
    Timeout,
    #[error("Unable to get location: {0}")]
    Other(String),
}

/// Routing service failure. The previous route metrics stay in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("Could not reach the routing service: {0}")]
    Request(String),
    #[error("Could not calculate route. Please check address. ({0})")]
    Status(String),
    #[error("Could not calculate route. Please check address.")]
    NoRoute,
    #[error("Routing service sent an unreadable response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("Start tracking before sending a message")]
    NotTracking,
    #[error("No ETA yet, wait for the route to be calculated")]
    NoEta,
}

/// Notification send failure. Triggers the device intent fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Failed to send message: {0}")]
    Request(String),
    #[error("Failed to send message: {message}")]
    Rejected { status: u16, message: String },
    #[error("Failed to send message: unreadable response ({0})")]
    InvalidResponse(String),
}

impl DeliveryError {
    /// The underlying reason without the user-facing prefix.
    pub fn detail(&self) -> &str {
        match self {
            DeliveryError::Request(detail) | DeliveryError::InvalidResponse(detail) => detail,
            DeliveryError::Rejected { message, .. } => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
}

#[derive(Debug, Error)]
pub enum ProfileStoreError {
    #[error("profile store io error: {0}")]
    Io(String),
    #[error("profile file is malformed: {0}")]
    Format(String),
}
